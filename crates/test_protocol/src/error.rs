use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while encoding or decoding protocol artifacts
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("required argument TestClassName missing")]
    MissingTestName,

    #[error("required argument {0} missing")]
    MissingArgument(&'static str),

    #[error("Malformed batch line {line}: '{content}'")]
    MalformedBatchLine { line: usize, content: String },

    #[error("Malformed formatter specification: '{0}'")]
    MalformedFormatter(String),
}

impl ProtocolError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
