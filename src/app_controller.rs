use log::{debug, info, warn};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use rand::distr::Alphanumeric;

use crate::app_config::Config;
use crate::bib_file::{filter_new_keys, resolve_bib_path, validate_bib_name, BibFile};
use crate::cancellation::{CancellableTask, Cancellation, TaskOutcome};
use crate::citation::planner::{render_footnote_definition, render_footnote_marker, render_link_definition};
use crate::citation::{
    flatten_keys, plan_insertion, scan_full, unique_keys, BibliographyMerger, CiteKey, Dialect,
    MarkerGrammar, MergeProgress, MergeReport, MergeStatus,
};
use crate::document::{Document, InsertAt};
use crate::errors::CiteError;
use crate::providers::better_bibtex::BetterBibTeX;
use crate::providers::BibliographyService;
use crate::session::Session;

// @module: Application controller for citation commands

/// Length of keys generated for hyperlink footnotes
pub const LINK_KEY_LEN: usize = 8;

/// Prompts and notifications shown to the user
pub trait UserInterface {
    /// Ask for a bibliography file name; `None` when dismissed
    fn prompt_file_name(&mut self, default: &str) -> Option<String>;

    /// Transient status text
    fn status(&mut self, message: &str);

    fn info(&mut self, message: &str);

    fn error(&mut self, message: &str);
}

/// How a command finished when it did not fail outright
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed,
    /// Work was done, but some lookups failed; messages are user-facing
    CompletedWithErrors(Vec<String>),
    /// Nothing to do: unsupported document, dismissed prompt
    Skipped,
    Cancelled,
}

/// Main application controller for citation commands
pub struct Controller {
    // @field: App configuration
    config: Config,
    service: Arc<dyn BibliographyService>,
    cancellation: Cancellation,
    show_progress: bool,
}

impl Controller {
    // @method: Create a controller talking to Better BibTeX
    pub fn with_config(config: Config) -> Self {
        let service = Arc::new(BetterBibTeX::from_config(&config));
        Self::with_service(config, service)
    }

    /// Create a controller over any bibliographic service
    pub fn with_service(config: Config, service: Arc<dyn BibliographyService>) -> Self {
        Self {
            config,
            service,
            cancellation: Cancellation::new(),
            show_progress: false,
        }
    }

    /// Render merge progress on stderr
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token that aborts a running merge when cancelled
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    fn grammar(&self, dialect: Dialect) -> MarkerGrammar {
        MarkerGrammar::new(dialect).with_charset(self.config.key_charset())
    }

    /// Insert a citation marker for `keys` at the cursor, extending the
    /// marker under the cursor when there is one. Returns the offset used.
    pub fn insert_cite_keys(&self, doc: &mut Document, keys: &[CiteKey]) -> Option<usize> {
        let grammar = self.grammar(doc.dialect());
        let insertion = plan_insertion(doc.text(), doc.cursor(), &grammar, self.config.window_radius, keys)?;
        debug!("Inserting '{}' at offset {}", insertion.text, insertion.offset);
        Some(doc.insert(InsertAt::Offset(insertion.offset), &insertion.text))
    }

    /// Export every key cited in the document to a `.bib` file
    pub async fn export_bibliography(
        &self,
        doc: &Document,
        session: &mut Session,
        ui: &mut dyn UserInterface,
        workspace: Option<&Path>,
    ) -> Result<CommandOutcome, CiteError> {
        if !doc.dialect().is_supported() {
            return Ok(CommandOutcome::Skipped);
        }
        let Some(document_path) = doc.path() else {
            return Err(CiteError::Validation("Save the document before exporting its bibliography.".to_string()));
        };

        let answer = ui.prompt_file_name(session.effective_bib_name(&self.config));
        if self.cancellation.is_cancelled() {
            ui.status("Bibliography export cancelled.");
            return Ok(CommandOutcome::Cancelled);
        }
        let Some(name) = answer else {
            debug!("Export dismissed");
            return Ok(CommandOutcome::Skipped);
        };
        let name = name.trim().to_string();
        validate_bib_name(&name)?;

        let keys = unique_keys(&flatten_keys(&scan_full(doc.text(), &self.grammar(doc.dialect()))));
        if keys.is_empty() {
            return Err(CiteError::Validation("No key detected.".to_string()));
        }

        info!("Exporting {} key(s) to {}", keys.len(), name);
        ui.status("Fetching bibliography...");

        let report = match self.merge(keys).await {
            TaskOutcome::Ok(report) => report,
            TaskOutcome::Err(e) => return Err(e),
            TaskOutcome::Cancelled => {
                ui.status("Bibliography export cancelled.");
                return Ok(CommandOutcome::Cancelled);
            }
        };

        let path = resolve_bib_path(&name, document_path, workspace);
        if report.text.trim().is_empty() {
            warn!("Nothing was exported, leaving {:?} untouched", path);
        } else {
            BibFile::new(&path)
                .overwrite(&report.text)
                .map_err(|e| CiteError::File(e.to_string()))?;
            session.remember(name);
            ui.info(&format!("Bibliography exported to {}", path.display()));
        }

        Ok(self.finish(report, ui))
    }

    /// Pick keys and insert a citation marker only
    pub async fn add_citation(&self, doc: &mut Document) -> Result<CommandOutcome, CiteError> {
        if !doc.dialect().is_supported() {
            return Ok(CommandOutcome::Skipped);
        }
        let Some(keys) = self.pick_keys().await? else {
            return Ok(CommandOutcome::Cancelled);
        };
        self.insert_cite_keys(doc, &keys);
        Ok(CommandOutcome::Completed)
    }

    /// Pick keys, insert a marker, and append entries missing from the `.bib` file
    pub async fn cite_with_bibliography(
        &self,
        doc: &mut Document,
        session: &Session,
        ui: &mut dyn UserInterface,
        workspace: Option<&Path>,
    ) -> Result<CommandOutcome, CiteError> {
        if !doc.dialect().is_supported() {
            return Ok(CommandOutcome::Skipped);
        }
        let Some(document_path) = doc.path().map(Path::to_path_buf) else {
            return Err(CiteError::Validation("Save the document before citing into a bibliography.".to_string()));
        };

        let name = session.effective_bib_name(&self.config).to_string();
        validate_bib_name(&name)?;
        let bib = BibFile::new(resolve_bib_path(&name, &document_path, workspace));

        let Some(keys) = self.pick_keys().await? else {
            return Ok(CommandOutcome::Cancelled);
        };
        self.insert_cite_keys(doc, &keys);

        // The marker is in the document now; later failures keep it
        let existing = match bib.keys() {
            Ok(existing) => existing,
            Err(e) => return Ok(kept_edit(CiteError::File(e.to_string()), ui)),
        };
        let new_keys = filter_new_keys(&keys, &existing);
        if new_keys.is_empty() {
            info!("Every picked entry is already in {:?}", bib.path());
            return Ok(CommandOutcome::Completed);
        }

        ui.status("Fetching bibliography...");
        let report = match self.merge(new_keys).await {
            TaskOutcome::Ok(report) => report,
            TaskOutcome::Err(e) => return Ok(kept_edit(e, ui)),
            TaskOutcome::Cancelled => {
                ui.status("Citation cancelled, bibliography left unchanged.");
                return Ok(CommandOutcome::Cancelled);
            }
        };

        if !report.text.trim().is_empty() {
            if let Err(e) = bib.append(&report.text) {
                return Ok(kept_edit(CiteError::File(e.to_string()), ui));
            }
            info!("Appended bibliography to {:?}", bib.path());
        }

        Ok(self.finish(report, ui))
    }

    /// Pick keys, insert footnote markers, and add one footnote line per new key
    pub async fn cite_markdown_bibliography(
        &self,
        doc: &mut Document,
        ui: &mut dyn UserInterface,
    ) -> Result<CommandOutcome, CiteError> {
        if doc.dialect() != Dialect::Markdown {
            return Ok(CommandOutcome::Skipped);
        }

        let existing = flatten_keys(&scan_full(doc.text(), &self.grammar(doc.dialect())));
        let Some(keys) = self.pick_keys().await? else {
            return Ok(CommandOutcome::Cancelled);
        };
        doc.insert(InsertAt::Cursor, &render_footnote_marker(&keys));

        let mut errors = Vec::new();
        for key in filter_new_keys(&keys, &existing) {
            let fetched = self
                .until_cancelled(
                    self.service
                        .fetch_single_entry_bibliography(&key, &self.config.bibliography_style),
                )
                .await;
            match fetched {
                Ok(None) => {
                    ui.status("Citation cancelled.");
                    return Ok(CommandOutcome::Cancelled);
                }
                Ok(Some(text)) => {
                    doc.append_line(&render_footnote_definition(&key, &text));
                }
                Err(e) => {
                    warn!("Failed to fetch bibliography for '{}': {}", key, e);
                    ui.error(&e.to_string());
                    errors.push(e.to_string());
                }
            }
        }

        if errors.is_empty() {
            Ok(CommandOutcome::Completed)
        } else {
            Ok(CommandOutcome::CompletedWithErrors(errors))
        }
    }

    /// Insert a footnote pointing at `url` under a fresh random key
    pub fn add_hyperlink_citation(&self, doc: &mut Document, url: &str) -> Result<CommandOutcome, CiteError> {
        if doc.dialect() != Dialect::Markdown {
            return Ok(CommandOutcome::Skipped);
        }
        let url = url.trim();
        if url.is_empty() {
            return Err(CiteError::Validation("No Data in Clipboard.".to_string()));
        }

        let key = random_link_key();
        doc.insert(InsertAt::Cursor, &render_footnote_marker(std::slice::from_ref(&key)));
        doc.append_line(&render_link_definition(&key, url));
        Ok(CommandOutcome::Completed)
    }

    /// Run the interactive picker; `None` when cancelled while it is open
    async fn pick_keys(&self) -> Result<Option<Vec<CiteKey>>, CiteError> {
        let picked = self.until_cancelled(self.service.pick_keys()).await?;
        if picked.is_none() {
            info!("Key selection cancelled");
        }
        Ok(picked)
    }

    /// Await a service call unless the controller is cancelled first
    async fn until_cancelled<T, F>(&self, call: F) -> Result<Option<T>, CiteError>
    where
        F: Future<Output = Result<T, CiteError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Ok(None),
            result = call => result.map(Some),
        }
    }

    async fn merge(&self, keys: Vec<CiteKey>) -> TaskOutcome<MergeReport, CiteError> {
        let merger = BibliographyMerger::new(Arc::clone(&self.service), self.config.latex_bib_style.clone());
        let progress_bar = self.progress_bar();
        let bar = progress_bar.clone();

        let task = CancellableTask::spawn_with(self.cancellation.child(), move |cancellation| async move {
            merger
                .merge(&keys, &cancellation, |event| report_progress(&bar, event))
                .await
        });

        let outcome = task.join().await;
        progress_bar.finish_and_clear();
        outcome
    }

    fn finish(&self, report: MergeReport, ui: &mut dyn UserInterface) -> CommandOutcome {
        match report.status() {
            MergeStatus::Succeeded => CommandOutcome::Completed,
            MergeStatus::CompletedWithErrors => {
                let errors = report.reportable_errors();
                ui.error(&format!("Completed with errors: {}", errors.join("; ")));
                CommandOutcome::CompletedWithErrors(errors)
            }
        }
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress_bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar
    }
}

fn report_progress(bar: &ProgressBar, event: MergeProgress) {
    match event {
        MergeProgress::Started { total } => bar.set_length(total),
        MergeProgress::ResolvingKey(key) => bar.set_message(format!("Resolving {}", key)),
        MergeProgress::FetchingCollection(name) => bar.set_message(format!("Exporting {}", name)),
        MergeProgress::Advanced => bar.inc(1),
    }
}

/// Report a failure that happened after the document was edited
fn kept_edit(error: CiteError, ui: &mut dyn UserInterface) -> CommandOutcome {
    warn!("Citation inserted, but the bibliography was not updated: {}", error);
    ui.error(&error.to_string());
    CommandOutcome::CompletedWithErrors(vec![error.to_string()])
}

/// Random alphanumeric key for hyperlink footnotes
pub fn random_link_key() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(LINK_KEY_LEN)
        .map(char::from)
        .collect()
}
