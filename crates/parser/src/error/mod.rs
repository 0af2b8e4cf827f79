//! Error handling for the redscript compiler.
//!
//! Every stage reports through the same [`Error`] type: a kind carrying the
//! message, the file it occurred in, an optional source position, and any
//! notes (such as the call chain that led into a generic instantiation).
//! Compilation is fail-fast; the first error aborts the pipeline and is
//! rendered by [`Report`].

pub mod codes;
pub mod formatter;
pub mod types;

pub use codes::{ErrorCode, Severity};
pub use formatter::{Report, ReportConfig};
pub use types::{Error, ErrorKind};

/// Result type used across lexing, preprocessing and parsing. Errors are
/// boxed since the success path is hit far more often than the failure path.
pub type ParseResult<T> = Result<T, Box<Error>>;
