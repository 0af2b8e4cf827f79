//! Error codes shared by every compiler stage.

use std::fmt;

/// Severity attached to a rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Diagnostic that does not stop compilation (e.g. an unknown
    /// instruction skipped by the backend).
    Warning,
    /// Fatal; compilation aborts at the first one.
    Error,
}

/// Stable error codes. The numbering groups by stage only loosely since the
/// parser and backend share several kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed source construct.
    E0001,
    /// Token stream ended mid-construct.
    E0002,
    /// Operation not expressible on the target (mixed register classes,
    /// unsupported operator).
    E0003,
    /// File imported more than once.
    E0004,
    /// Project configuration missing or malformed.
    E0005,
    /// Invariant violation while lowering IR to commands.
    E0006,
    /// Inline-native call without a registered implementation.
    E0007,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E0001 => "E0001",
            ErrorCode::E0002 => "E0002",
            ErrorCode::E0003 => "E0003",
            ErrorCode::E0004 => "E0004",
            ErrorCode::E0005 => "E0005",
            ErrorCode::E0006 => "E0006",
            ErrorCode::E0007 => "E0007",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
