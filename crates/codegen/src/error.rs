//! Errors raised while lowering byte code to datapack commands.

use redscript_parser::{Error, ErrorKind};
use thiserror::Error as ThisError;

pub type CodegenResult<T> = Result<T, CodegenError>;

/// A fatal backend failure. Unlike parse errors these carry no source
/// trace: by the time byte code reaches the backend the offending
/// source construct is long gone, so the message has to stand alone.
#[derive(Debug, ThisError)]
pub enum CodegenError {
    /// The instruction stream violated a structural invariant the
    /// parser is supposed to uphold.
    #[error("{0}")]
    ByteCode(String),

    /// A `__native__` function had no handler, or its arguments did
    /// not match what the handler expects.
    #[error("{0}")]
    NativeImpl(String),

    /// The operation is valid byte code but has no command sequence.
    #[error("{0}")]
    Unsupported(String),

    #[error("failed to write datapack: {0}")]
    Io(#[from] std::io::Error),
}

impl CodegenError {
    /// Bridges into the shared diagnostic type so the driver can render
    /// backend failures through the same report pipeline as parse
    /// errors.
    pub fn into_diagnostic(self) -> Error {
        let kind = match self {
            CodegenError::ByteCode(message) => ErrorKind::ByteCode(message),
            CodegenError::NativeImpl(message) => ErrorKind::NativeImpl(message),
            CodegenError::Unsupported(message) => ErrorKind::UnsupportedOperation(message),
            CodegenError::Io(source) => {
                ErrorKind::ByteCode(format!("failed to write datapack: {source}"))
            }
        };
        Error::new(kind, "", None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redscript_parser::error::ErrorCode;

    #[test]
    fn diagnostic_keeps_the_error_code() {
        let err = CodegenError::ByteCode("bad stream".into());
        assert_eq!(err.into_diagnostic().kind.code(), ErrorCode::E0006);

        let err = CodegenError::NativeImpl("no mapping".into());
        assert_eq!(err.into_diagnostic().kind.code(), ErrorCode::E0007);
    }
}
