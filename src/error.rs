use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum BfError {
    #[error("failed to open source file {path}")]
    SourceUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unbalanced brackets: unmatched '{bracket}' at byte {index}")]
    UnbalancedBrackets { bracket: char, index: usize },

    #[error("failed to allocate {size} bytes of executable memory: {source}")]
    ExecAllocFailed {
        size: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to change memory protection to read/execute: {source}")]
    ProtectFailed {
        #[source]
        source: std::io::Error,
    },
}
