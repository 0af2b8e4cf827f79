//! The unified compiler error type.

use super::codes::ErrorCode;
use crate::lexer::Trace;
use thin_vec::ThinVec;

/// What went wrong. Each variant carries the human-readable message; the
/// code and class name derive from the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax(String),
    UnexpectedEof(String),
    UnsupportedOperation(String),
    AlreadyIncluded(String),
    Config(String),
    ByteCode(String),
    NativeImpl(String),
}

impl ErrorKind {
    pub fn code(&self) -> ErrorCode {
        match self {
            ErrorKind::Syntax(_) => ErrorCode::E0001,
            ErrorKind::UnexpectedEof(_) => ErrorCode::E0002,
            ErrorKind::UnsupportedOperation(_) => ErrorCode::E0003,
            ErrorKind::AlreadyIncluded(_) => ErrorCode::E0004,
            ErrorKind::Config(_) => ErrorCode::E0005,
            ErrorKind::ByteCode(_) => ErrorCode::E0006,
            ErrorKind::NativeImpl(_) => ErrorCode::E0007,
        }
    }

    /// Class name shown in the report header.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Syntax(_) => "SyntaxError",
            ErrorKind::UnexpectedEof(_) => "UnexpectedEOF",
            ErrorKind::UnsupportedOperation(_) => "UnsupportedOperation",
            ErrorKind::AlreadyIncluded(_) => "AlreadyIncluded",
            ErrorKind::Config(_) => "ConfigError",
            ErrorKind::ByteCode(_) => "ByteCodeError",
            ErrorKind::NativeImpl(_) => "NativeImplError",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ErrorKind::Syntax(message)
            | ErrorKind::UnexpectedEof(message)
            | ErrorKind::UnsupportedOperation(message)
            | ErrorKind::AlreadyIncluded(message)
            | ErrorKind::Config(message)
            | ErrorKind::ByteCode(message)
            | ErrorKind::NativeImpl(message) => message,
        }
    }
}

/// A compiler error with enough context to render a source snippet.
#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    /// File the error was raised in; empty for errors with no file context.
    pub file: String,
    /// Position within `file`. Configuration errors have none.
    pub trace: Option<Trace>,
    /// Extra lines rendered below the snippet, most commonly the chain of
    /// function calls that led into a generic instantiation.
    pub notes: ThinVec<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, file: &str, trace: Option<Trace>) -> Self {
        Error {
            kind,
            file: file.to_string(),
            trace,
            notes: ThinVec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_notes<I>(mut self, notes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.notes.extend(notes.into_iter().map(Into::into));
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.kind.code()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[RS:{}] {}", self.code(), self.kind.message())
    }
}

impl std::error::Error for Error {}
