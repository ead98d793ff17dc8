/*!
 * End-to-end command tests against the scripted bibliographic service
 */

use std::sync::Arc;

use zotcite::app_config::Config;
use zotcite::app_controller::{random_link_key, CommandOutcome, Controller, LINK_KEY_LEN};
use zotcite::bib_file::BibFile;
use zotcite::citation::Dialect;
use zotcite::document::Document;
use zotcite::errors::CiteError;
use zotcite::providers::mock::MockService;
use zotcite::session::Session;

use crate::common::{create_temp_dir, create_test_file, keys, RecordingInterface};

fn controller(service: MockService) -> Controller {
    Controller::with_service(Config::default(), Arc::new(service))
}

#[tokio::test]
async fn test_addCitation_outsideMarker_shouldInsertNewMarker() {
    let controller = controller(MockService::single_library().with_picks(&["doe2020", "lee2021"]));
    let mut doc = Document::new("See results.", Dialect::Markdown).with_cursor(4);

    let outcome = controller.add_citation(&mut doc).await.unwrap();

    assert_eq!(outcome, CommandOutcome::Completed);
    assert_eq!(doc.text(), "See [@doe2020; @lee2021]results.");
}

#[tokio::test]
async fn test_addCitation_insideLatexMarker_shouldExtendIt() {
    let controller = controller(MockService::single_library().with_picks(&["b"]));
    let mut doc = Document::new(r"Known \cite{a} fact", Dialect::Latex).with_cursor(13);

    controller.add_citation(&mut doc).await.unwrap();

    assert_eq!(doc.text(), r"Known \cite{a, b} fact");
}

#[tokio::test]
async fn test_addCitation_withUnsupportedDocument_shouldSkipWithoutPicking() {
    let service = MockService::single_library().with_picks(&["a"]);
    let log = service.call_log();
    let controller = controller(service);
    let mut doc = Document::new("plain text", Dialect::Unsupported);

    let outcome = controller.add_citation(&mut doc).await.unwrap();

    assert_eq!(outcome, CommandOutcome::Skipped);
    assert_eq!(doc.text(), "plain text");
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_addCitation_withEmptyPick_shouldReturnNoSelection() {
    let controller = controller(MockService::single_library());
    let mut doc = Document::new("x", Dialect::Markdown);

    let result = controller.add_citation(&mut doc).await;

    assert!(matches!(result, Err(CiteError::NoSelection)));
    assert!(!doc.is_dirty());
}

#[tokio::test]
async fn test_exportBibliography_shouldWriteDedupedKeysAndRememberName() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "paper.md", "Intro [@a; @b] and again [@a].").unwrap();
    let doc = Document::load(&path).unwrap();
    let service = MockService::single_library();
    let log = service.call_log();
    let controller = controller(service);
    let mut session = Session::new();
    let mut ui = RecordingInterface::answering("out.bib");

    let outcome = controller
        .export_bibliography(&doc, &mut session, &mut ui, None)
        .await
        .unwrap();

    assert_eq!(outcome, CommandOutcome::Completed);
    assert_eq!(ui.prompted_with, vec!["ref.bib"]);
    let written = std::fs::read_to_string(dir.path().join("out.bib")).unwrap();
    assert_eq!(written, format!("{}\n", MockService::render(&keys(&["a", "b"]), 1)));
    assert_eq!(session.last_used_name.as_deref(), Some("out.bib"));
    assert_eq!(*log.lock().unwrap(), vec!["groups", "export:1:a,b"]);
}

#[tokio::test]
async fn test_exportBibliography_withTemplateName_shouldResolveAgainstDocument() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "chapter.md", "[@k]").unwrap();
    let doc = Document::load(&path).unwrap();
    let controller = controller(MockService::single_library());
    let mut session = Session::new();
    let mut ui = RecordingInterface::answering("${fileBasenameNoExtension}.bib");

    controller.export_bibliography(&doc, &mut session, &mut ui, None).await.unwrap();

    assert!(dir.path().join("chapter.bib").exists());
    assert_eq!(session.last_used_name.as_deref(), Some("${fileBasenameNoExtension}.bib"));
}

#[tokio::test]
async fn test_exportBibliography_withUnsavedDocument_shouldFailBeforeAnyCall() {
    let service = MockService::single_library();
    let log = service.call_log();
    let controller = controller(service);
    let doc = Document::new("[@a]", Dialect::Markdown);
    let mut session = Session::new();
    let mut ui = RecordingInterface::answering("out.bib");

    let result = controller.export_bibliography(&doc, &mut session, &mut ui, None).await;

    assert!(matches!(result, Err(CiteError::Validation(_))));
    assert!(ui.prompted_with.is_empty());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_exportBibliography_withInvalidName_shouldFailWithoutSideEffects() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "paper.md", "[@a]").unwrap();
    let doc = Document::load(&path).unwrap();
    let service = MockService::single_library();
    let log = service.call_log();
    let controller = controller(service);
    let mut session = Session::new();
    let mut ui = RecordingInterface::answering("refs.txt");

    let result = controller.export_bibliography(&doc, &mut session, &mut ui, None).await;

    assert!(matches!(result, Err(CiteError::Validation(_))));
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(session.last_used_name, None);
    assert!(!dir.path().join("refs.txt").exists());
}

#[tokio::test]
async fn test_exportBibliography_withNoKeys_shouldReportNoKeyDetected() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "paper.md", "No citations here.").unwrap();
    let doc = Document::load(&path).unwrap();
    let controller = controller(MockService::single_library());
    let mut ui = RecordingInterface::answering("out.bib");

    let result = controller.export_bibliography(&doc, &mut Session::new(), &mut ui, None).await;

    match result {
        Err(CiteError::Validation(message)) => assert_eq!(message, "No key detected."),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_exportBibliography_withDismissedPrompt_shouldSkip() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "paper.md", "[@a]").unwrap();
    let doc = Document::load(&path).unwrap();
    let controller = controller(MockService::single_library());
    let mut session = Session::new();
    session.remember("last.bib");
    let mut ui = RecordingInterface::default();

    let outcome = controller.export_bibliography(&doc, &mut session, &mut ui, None).await.unwrap();

    assert_eq!(outcome, CommandOutcome::Skipped);
    assert_eq!(ui.prompted_with, vec!["last.bib"]);
}

#[tokio::test]
async fn test_exportBibliography_whenCancelled_shouldWriteNothing() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "paper.md", "[@k1; @k2]").unwrap();
    let doc = Document::load(&path).unwrap();
    let service = MockService::new()
        .with_collection("Lib1", 1)
        .with_collection("Lib2", 2)
        .with_item("k1", "Lib1")
        .with_item("k2", "Lib2");
    let controller = controller(service);
    controller.cancellation().cancel();
    let mut session = Session::new();
    let mut ui = RecordingInterface::answering("out.bib");

    let outcome = controller.export_bibliography(&doc, &mut session, &mut ui, None).await.unwrap();

    assert_eq!(outcome, CommandOutcome::Cancelled);
    assert!(!dir.path().join("out.bib").exists());
    assert_eq!(session.last_used_name, None);
    assert!(!ui.statuses.is_empty());
}

#[tokio::test]
async fn test_exportBibliography_cancelledAtPrompt_shouldStopBeforeAnyLookup() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "paper.md", "[@k1]").unwrap();
    let doc = Document::load(&path).unwrap();
    let service = MockService::single_library();
    let log = service.call_log();
    let controller = controller(service);
    controller.cancellation().cancel();
    let mut ui = RecordingInterface::answering("out.bib");

    let outcome = controller
        .export_bibliography(&doc, &mut Session::new(), &mut ui, None)
        .await
        .unwrap();

    assert_eq!(outcome, CommandOutcome::Cancelled);
    assert_eq!(ui.prompted_with.len(), 1);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_exportBibliography_withFailingKey_shouldWriteRestAndReportError() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "paper.md", "[@k1; @k2; @gone]").unwrap();
    let doc = Document::load(&path).unwrap();
    let service = MockService::new()
        .with_collection("Lib1", 1)
        .with_collection("Lib2", 2)
        .with_item("k1", "Lib1")
        .with_failing_key("k2", "search failed");
    let controller = controller(service);
    let mut ui = RecordingInterface::answering("out.bib");

    let outcome = controller
        .export_bibliography(&doc, &mut Session::new(), &mut ui, None)
        .await
        .unwrap();

    assert_eq!(outcome, CommandOutcome::CompletedWithErrors(vec!["search failed".to_string()]));
    assert_eq!(ui.errors.len(), 1);
    assert_eq!(BibFile::new(dir.path().join("out.bib")).keys().unwrap(), vec!["k1"]);
}

#[tokio::test]
async fn test_citeWithBibliography_runTwice_shouldAppendOnlyNewEntries() {
    let dir = create_temp_dir().unwrap();
    let existing = MockService::render(&keys(&["doe2020"]), 1);
    create_test_file(dir.path(), "ref.bib", &format!("{}\n", existing)).unwrap();
    let path = create_test_file(dir.path(), "paper.md", "Claim. ").unwrap();
    let mut doc = Document::load(&path).unwrap();
    doc.set_cursor(doc.text().len());

    let service = MockService::single_library().with_picks(&["doe2020", "new2022"]);
    let log = service.call_log();
    let controller = controller(service);
    let session = Session::new();
    let mut ui = RecordingInterface::default();

    for _ in 0..2 {
        let outcome = controller
            .cite_with_bibliography(&mut doc, &session, &mut ui, None)
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Completed);
    }

    let bib = BibFile::new(dir.path().join("ref.bib"));
    assert_eq!(bib.keys().unwrap(), vec!["doe2020", "new2022"]);
    let exports: Vec<String> = log.lock().unwrap().iter().filter(|c| c.starts_with("export")).cloned().collect();
    assert_eq!(exports, vec!["export:1:new2022"]);
    assert_eq!(doc.text(), "Claim. [@doe2020; @new2022; @doe2020; @new2022]");
}

#[tokio::test]
async fn test_citeWithBibliography_whenLibrariesFail_shouldKeepInsertedMarker() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "paper.md", "See results.").unwrap();
    let mut doc = Document::load(&path).unwrap();
    doc.set_cursor(4);
    let controller = controller(MockService::new().with_picks(&["k1"]).with_collections_error("offline"));
    let mut ui = RecordingInterface::default();

    let outcome = controller
        .cite_with_bibliography(&mut doc, &Session::new(), &mut ui, None)
        .await
        .unwrap();

    assert_eq!(outcome, CommandOutcome::CompletedWithErrors(vec!["offline".to_string()]));
    assert_eq!(doc.text(), "See [@k1]results.");
    assert!(doc.is_dirty());
    assert_eq!(ui.errors, vec!["offline"]);
    assert!(!dir.path().join("ref.bib").exists());

    doc.save().unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "See [@k1]results.");
}

#[tokio::test]
async fn test_addCitation_cancelledWhilePicking_shouldLeaveDocumentAlone() {
    let service = MockService::single_library().with_picks(&["a"]);
    let log = service.call_log();
    let controller = controller(service);
    controller.cancellation().cancel();
    let mut doc = Document::new("See results.", Dialect::Markdown).with_cursor(4);

    let outcome = controller.add_citation(&mut doc).await.unwrap();

    assert_eq!(outcome, CommandOutcome::Cancelled);
    assert_eq!(doc.text(), "See results.");
    assert!(!doc.is_dirty());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_citeMarkdownBibliography_cancelledWhilePicking_shouldNotFetch() {
    let service = MockService::single_library().with_picks(&["a"]);
    let log = service.call_log();
    let controller = controller(service);
    controller.cancellation().cancel();
    let mut doc = Document::new("Text", Dialect::Markdown);
    let mut ui = RecordingInterface::default();

    let outcome = controller.cite_markdown_bibliography(&mut doc, &mut ui).await.unwrap();

    assert_eq!(outcome, CommandOutcome::Cancelled);
    assert_eq!(doc.text(), "Text");
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_citeWithBibliography_withUnsavedDocument_shouldFailBeforePicking() {
    let service = MockService::single_library().with_picks(&["a"]);
    let log = service.call_log();
    let controller = controller(service);
    let mut doc = Document::new("x", Dialect::Markdown);

    let result = controller
        .cite_with_bibliography(&mut doc, &Session::new(), &mut RecordingInterface::default(), None)
        .await;

    assert!(matches!(result, Err(CiteError::Validation(_))));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_citeMarkdownBibliography_shouldAddFootnotesForNewKeysOnly() {
    let service = MockService::single_library().with_picks(&["a", "b"]);
    let controller = controller(service);
    let mut doc = Document::new("Claim.\n\n[^a]: Old entry.", Dialect::Markdown).with_cursor(6);
    let mut ui = RecordingInterface::default();

    let outcome = controller.cite_markdown_bibliography(&mut doc, &mut ui).await.unwrap();

    assert_eq!(outcome, CommandOutcome::Completed);
    let style = &controller.config().bibliography_style;
    let expected = format!(
        "Claim.[^a][^b]\n\n[^a]: Old entry.\n[^b]: {}",
        MockService::render_entry("b", style).trim_end()
    );
    assert_eq!(doc.text(), expected);
}

#[tokio::test]
async fn test_citeMarkdownBibliography_withFailingEntry_shouldSkipItAndReport() {
    let service = MockService::single_library()
        .with_picks(&["a", "b"])
        .with_failing_entry("a", "style not found");
    let controller = controller(service);
    let mut doc = Document::new("Claim.", Dialect::Markdown).with_cursor(6);
    let mut ui = RecordingInterface::default();

    let outcome = controller.cite_markdown_bibliography(&mut doc, &mut ui).await.unwrap();

    assert_eq!(outcome, CommandOutcome::CompletedWithErrors(vec!["style not found".to_string()]));
    assert!(doc.text().contains("[^b]: Entry for b"));
    assert!(!doc.text().contains("[^a]: "));
    assert_eq!(ui.errors, vec!["style not found"]);
}

#[tokio::test]
async fn test_citeMarkdownBibliography_withLatexDocument_shouldSkip() {
    let controller = controller(MockService::single_library().with_picks(&["a"]));
    let mut doc = Document::new("x", Dialect::Latex);
    let outcome = controller
        .cite_markdown_bibliography(&mut doc, &mut RecordingInterface::default())
        .await
        .unwrap();
    assert_eq!(outcome, CommandOutcome::Skipped);
}

#[test]
fn test_addHyperlinkCitation_shouldInsertMarkerAndDefinition() {
    let controller = controller(MockService::new());
    let mut doc = Document::new("Read this.", Dialect::Markdown).with_cursor(9);

    let outcome = controller.add_hyperlink_citation(&mut doc, " https://example.org/a \n").unwrap();

    assert_eq!(outcome, CommandOutcome::Completed);
    let text = doc.text();
    let key = &text[11..11 + LINK_KEY_LEN];
    assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(text, format!("Read this[^{}].\n[^{}]: <https://example.org/a>", key, key));
}

#[test]
fn test_addHyperlinkCitation_withEmptyUrl_shouldFailValidation() {
    let controller = controller(MockService::new());
    let mut doc = Document::new("x", Dialect::Markdown);
    match controller.add_hyperlink_citation(&mut doc, "  ") {
        Err(CiteError::Validation(message)) => assert_eq!(message, "No Data in Clipboard."),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_addHyperlinkCitation_withLatexDocument_shouldSkip() {
    let controller = controller(MockService::new());
    let mut doc = Document::new("x", Dialect::Latex);
    assert_eq!(
        controller.add_hyperlink_citation(&mut doc, "https://example.org").unwrap(),
        CommandOutcome::Skipped
    );
    assert_eq!(doc.text(), "x");
}

#[test]
fn test_randomLinkKey_shouldBeAlphanumericOfFixedLength() {
    let a = random_link_key();
    let b = random_link_key();
    assert_eq!(a.len(), LINK_KEY_LEN);
    assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_ne!(a, b);
}
