//! Error formatting and display.

use super::codes::Severity;
use super::types::Error;
use crate::lexer::{KEYWORDS, TYPE_NAMES};
use owo_colors::OwoColorize;

/// Configuration for rendered reports.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Whether to colorize output (disabled when not writing to a tty).
    pub colors: bool,
    /// Whether to include the source snippet under the header.
    pub show_snippet: bool,
}

impl ReportConfig {
    pub fn new() -> Self {
        ReportConfig {
            colors: true,
            show_snippet: true,
        }
    }

    /// Plain text, header only. Used by tests and non-tty output.
    pub fn minimal() -> Self {
        ReportConfig {
            colors: false,
            show_snippet: true,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig::new()
    }
}

/// Renders an [`Error`] against the source text of the file it occurred in.
pub struct Report<'a> {
    error: &'a Error,
    source: Option<&'a str>,
    config: ReportConfig,
}

impl<'a> Report<'a> {
    pub fn new(error: &'a Error, source: Option<&'a str>) -> Self {
        Report {
            error,
            source,
            config: ReportConfig::new(),
        }
    }

    pub fn with_config(mut self, config: ReportConfig) -> Self {
        self.config = config;
        self
    }

    /// Format the full report.
    ///
    /// Layout:
    ///
    /// ```text
    /// [RS:E0001] Expected ';' after expression.
    ///
    ///      -- main.rsc:3:14 --
    ///
    ///       |
    ///   3   | x : int = 1 + 2
    ///       |              ^ error here
    ///   = note: in call to 'helper'
    /// ```
    pub fn render(&self, severity: Severity) -> String {
        let mut output = String::new();
        let message = self.error.kind.message();
        let label = format!("[RS:{}]", self.error.code());

        if self.config.colors {
            match severity {
                Severity::Error => {
                    output.push_str(&format!(
                        "{} {} {}\n",
                        label.bold().red(),
                        self.error.kind.name().bold(),
                        message
                    ));
                }
                Severity::Warning => {
                    output.push_str(&format!(
                        "{} {} {}\n",
                        label.bold().yellow(),
                        self.error.kind.name().bold(),
                        message
                    ));
                }
            }
        } else {
            output.push_str(&format!("{} {} {}\n", label, self.error.kind.name(), message));
        }

        if let Some(trace) = &self.error.trace {
            let location = format!("{}:{}:{}", self.error.file, trace.line, trace.caret);
            if self.config.colors {
                output.push_str(&format!("\n     -- {} --\n\n", location.cyan()));
            } else {
                output.push_str(&format!("\n     -- {location} --\n\n"));
            }

            if self.config.show_snippet {
                if let Some(line_text) = self.source.and_then(|src| line_at(src, trace.line)) {
                    self.push_snippet(&mut output, trace.line, line_text, trace.caret, trace.start);
                }
            }
        } else if !self.error.file.is_empty() {
            output.push_str(&format!("\n     -- {} --\n", self.error.file));
        }

        for note in &self.error.notes {
            if self.config.colors {
                output.push_str(&format!("  = {}: {note}\n", "note".cyan().bold()));
            } else {
                output.push_str(&format!("  = note: {note}\n"));
            }
        }

        output
    }

    fn push_snippet(
        &self,
        output: &mut String,
        line: u32,
        line_text: &str,
        caret: u32,
        start: Option<u32>,
    ) {
        let shown = if self.config.colors {
            highlight(line_text)
        } else {
            line_text.to_string()
        };
        output.push_str("      |\n");
        output.push_str(&format!("{line:>4}  | {shown}\n"));

        // Underline either the single caret column or the start..=caret span.
        let mut underline = String::new();
        match start {
            Some(start) => {
                for _ in 1..start {
                    underline.push(' ');
                }
                for _ in start..=caret {
                    underline.push('^');
                }
            }
            None => {
                for _ in 1..caret {
                    underline.push(' ');
                }
                underline.push('^');
            }
        }
        underline.push_str(" error here");
        if self.config.colors {
            output.push_str(&format!("      | {}\n", underline.red()));
        } else {
            output.push_str(&format!("      | {underline}\n"));
        }
    }
}

fn line_at(source: &str, line: u32) -> Option<&str> {
    source.split('\n').nth(line.saturating_sub(1) as usize)
}

/// Colorize keywords and builtin type names inside a source line.
fn highlight(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut word = String::new();
    for ch in line.chars().chain(std::iter::once('\0')) {
        if ch.is_alphanumeric() || ch == '_' {
            word.push(ch);
            continue;
        }
        if !word.is_empty() {
            if KEYWORDS.contains_key(word.as_str()) {
                out.push_str(&format!("{}", word.purple().bold()));
            } else if TYPE_NAMES.contains_key(word.as_str()) {
                out.push_str(&format!("{}", word.green()));
            } else {
                out.push_str(&word);
            }
            word.clear();
        }
        if ch != '\0' {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lexer::Trace;
    use text_size::{TextRange, TextSize};

    fn trace(line: u32, caret: u32) -> Trace {
        Trace::new(
            TextRange::new(TextSize::new(0), TextSize::new(1)),
            line,
            caret,
        )
    }

    #[test]
    fn renders_header_location_and_caret() {
        let err = Error::new(
            ErrorKind::Syntax("Expected ';'.".into()),
            "main.rsc",
            Some(trace(2, 9)),
        );
        let source = "method : void main() {\nx : int 1;\n}\n";
        let rendered = Report::new(&err, Some(source))
            .with_config(ReportConfig::minimal())
            .render(Severity::Error);

        assert!(rendered.starts_with("[RS:E0001] SyntaxError Expected ';'.\n"));
        assert!(rendered.contains("-- main.rsc:2:9 --"));
        assert!(rendered.contains("   2  | x : int 1;"));
        assert!(rendered.contains("      |         ^ error here"));
    }

    #[test]
    fn spanned_trace_underlines_range() {
        let mut t = trace(1, 8);
        t.start = Some(5);
        let err = Error::new(ErrorKind::Syntax("Bad value.".into()), "a.rsc", Some(t));
        let rendered = Report::new(&err, Some("abc defg hij"))
            .with_config(ReportConfig::minimal())
            .render(Severity::Error);
        assert!(rendered.contains("      |     ^^^^ error here"));
    }

    #[test]
    fn notes_render_after_snippet() {
        let err = Error::new(ErrorKind::Syntax("Bad call.".into()), "a.rsc", Some(trace(1, 1)))
            .with_note("in call to 'helper'");
        let rendered = Report::new(&err, Some("x"))
            .with_config(ReportConfig::minimal())
            .render(Severity::Error);
        assert!(rendered.ends_with("  = note: in call to 'helper'\n"));
    }

    #[test]
    fn missing_trace_renders_header_only() {
        let err = Error::new(ErrorKind::Config("No rsconfig.json found.".into()), "", None);
        let rendered = Report::new(&err, None)
            .with_config(ReportConfig::minimal())
            .render(Severity::Error);
        assert_eq!(rendered, "[RS:E0005] ConfigError No rsconfig.json found.\n");
    }
}
