/*!
 * Tests for full and windowed document scans
 */

use zotcite::citation::{flatten_keys, scan_full, scan_window, Dialect, MarkerGrammar, DEFAULT_WINDOW_RADIUS};

#[test]
fn test_scanFull_withSeveralMarkers_shouldReturnSpansLeftToRight() {
    let grammar = MarkerGrammar::new(Dialect::Markdown);
    let text = "A [@z1] then [@a1; @m1] and [^b1].";
    let spans = scan_full(text, &grammar);

    assert_eq!(spans.len(), 3);
    assert!(spans.windows(2).all(|w| w[0].end <= w[1].start));
    for span in &spans {
        assert!(span.start < span.end);
        assert!(text[span.start..span.end].starts_with('['));
        assert!(text[span.start..span.end].ends_with(']'));
    }
    assert_eq!(flatten_keys(&spans), vec!["z1", "a1", "m1", "b1"]);
}

#[test]
fn test_scanFull_withLatexDocument_shouldKeepTextualOrder() {
    let grammar = MarkerGrammar::new(Dialect::Latex);
    let text = r"\citet{zeta} shows \cite{alpha, beta} while \citep{alpha}.";
    let keys = flatten_keys(&scan_full(text, &grammar));
    assert_eq!(keys, vec!["zeta", "alpha", "beta", "alpha"]);
}

#[test]
fn test_scanFull_withUnsupportedDialect_shouldReturnNothing() {
    let grammar = MarkerGrammar::new(Dialect::Unsupported);
    assert!(scan_full("[@a] \\cite{b}", &grammar).is_empty());
}

#[test]
fn test_scanWindow_withUnsupportedDialect_shouldReturnEmptyScan() {
    let grammar = MarkerGrammar::new(Dialect::Unsupported);
    let scan = scan_window("[@a]", 1, &grammar, DEFAULT_WINDOW_RADIUS);
    assert_eq!(scan.window_start, 0);
    assert!(scan.spans.is_empty());
}

#[test]
fn test_scanWindow_farFromMarker_shouldNotSeeIt() {
    let grammar = MarkerGrammar::new(Dialect::Markdown);
    let text = format!("[@early]{}end", " ".repeat(200));
    let scan = scan_window(&text, text.len(), &grammar, DEFAULT_WINDOW_RADIUS);
    assert!(scan.spans.is_empty());
    assert_eq!(scan.window_start, text.len() - DEFAULT_WINDOW_RADIUS);
}

#[test]
fn test_scanWindow_shouldReturnWindowRelativeOffsets() {
    let grammar = MarkerGrammar::new(Dialect::Markdown);
    let text = format!("{}[@k]", "x".repeat(100));
    let cursor = 102;
    let scan = scan_window(&text, cursor, &grammar, 10);

    assert_eq!(scan.window_start, 92);
    assert_eq!(scan.spans[0].start, 8);
    let absolute: Vec<_> = scan.absolute_spans().collect();
    assert_eq!(absolute[0].start, 100);
    assert_eq!(absolute[0].end, 104);
}

#[test]
fn test_scanWindow_withCursorPastEnd_shouldClamp() {
    let grammar = MarkerGrammar::new(Dialect::Markdown);
    let scan = scan_window("[@a]", 99, &grammar, 2);
    assert_eq!(scan.window_start, 2);
    assert!(scan.spans.is_empty());
}

#[test]
fn test_scanWindow_cuttingThroughMarker_shouldMissIt() {
    let grammar = MarkerGrammar::new(Dialect::Markdown);
    let text = "[@abcdefgh]";
    let scan = scan_window(text, 0, &grammar, 4);
    assert!(scan.spans.is_empty());
}
