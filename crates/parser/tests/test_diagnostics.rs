//! Integration tests for rendered diagnostics.
//!
//! Runs real sources through the front end and checks the reports they
//! produce: header codes, source snippets, caret placement, notes, and
//! the traceless forms used for configuration and IO failures.

use redscript_parser::error::Severity;
use redscript_parser::{parse_source, preprocess, Error, Report, ReportConfig, RsConfig};

/// Renders `error` the way the driver does for non-tty output.
fn render(error: &Error, source: Option<&str>) -> String {
    Report::new(error, source)
        .with_config(ReportConfig::minimal())
        .render(Severity::Error)
}

#[test]
fn test_syntax_errors_render_with_a_snippet() {
    let source = "x: int = ;";
    let error = parse_source("main.rsc", source).unwrap_err();
    let rendered = render(&error, Some(source));

    assert!(rendered.starts_with("[RS:E0001] SyntaxError "));
    assert!(rendered.contains("-- main.rsc:1:"));
    assert!(rendered.contains("| x: int = ;"));
    assert!(rendered.contains("^ error here"));
}

#[test]
fn test_unclosed_scopes_report_eof() {
    let error = parse_source("main.rsc", "method: void f() {").unwrap_err();
    assert_eq!(error.code().as_str(), "E0002");
    assert_eq!(error.kind.name(), "UnexpectedEOF");
    assert_eq!(error.kind.message(), "Expected '}'.");
}

#[test]
fn test_notes_follow_the_snippet() {
    let source = "method: void f() {\n    x: int = \"s\";\n}\n";
    let error = parse_source("main.rsc", source).unwrap_err();
    let rendered = render(&error, Some(source));

    assert!(rendered.contains("  = note: in function 'f'"));
    let snippet = rendered.find("error here").unwrap();
    let note = rendered.find("= note:").unwrap();
    assert!(note > snippet);
}

#[test]
fn test_warnings_render_under_their_own_severity() {
    let outcome = parse_source("main.rsc", "if (1 == 1) {\n}\n").unwrap();
    assert_eq!(outcome.warnings.len(), 1);

    let rendered = Report::new(&outcome.warnings[0], Some("if (1 == 1) {\n}\n"))
        .with_config(ReportConfig::minimal())
        .render(Severity::Warning);
    assert!(rendered.starts_with(
        "[RS:E0001] SyntaxError Comparing two constant values is not good practice.\n"
    ));
    assert!(rendered.contains("| if (1 == 1) {"));
}

#[test]
fn test_config_errors_carry_a_hint() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rs.config"), "{\"lib\": ").unwrap();

    let error = *RsConfig::load(dir.path()).unwrap_err();
    assert_eq!(error.code().as_str(), "E0005");

    // No trace; the report names the file without a snippet.
    let rendered = render(&error, None);
    assert!(rendered.contains("ConfigError"));
    assert!(rendered.contains("rs.config"));
    assert!(rendered.contains("= note: expected JSON like"));
}

#[test]
fn test_missing_entry_files_surface_the_io_failure() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("absent.rsc");
    let error = preprocess(&entry, &RsConfig::default()).unwrap_err();

    assert!(error.kind.message().starts_with("Could not open file:"));
    let rendered = render(&error, None);
    assert!(rendered.contains("absent.rsc"));
}

#[test]
fn test_unterminated_strings_are_eof_errors() {
    let error = parse_source("main.rsc", "s: string = \"oops;\n").unwrap_err();
    assert_eq!(error.code().as_str(), "E0002");
    assert_eq!(error.kind.message(), "Unterminated string literal.");
}

#[test]
fn test_display_stays_compact() {
    let error = parse_source("main.rsc", "return 5;").unwrap_err();
    assert_eq!(
        error.to_string(),
        "[RS:E0001] Return statements can only exist inside a function."
    );
}
