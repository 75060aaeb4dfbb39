use std::path::PathBuf;

use crate::types::DictKind;

/// Error type returned by jieba-ffi public APIs.
#[derive(Debug, thiserror::Error)]
pub enum JiebaError {
    /// Dynamic library could not be loaded.
    #[error("failed to load library: {0}")]
    LibraryLoad(String),
    /// Required symbol could not be resolved from the library.
    #[error("failed to load symbol: {0}")]
    SymbolLoad(String),
    /// Rust string contained an interior `NUL` byte for C interop.
    #[error("string contains NUL byte: {0}")]
    NulByte(#[from] std::ffi::NulError),
    /// User-provided arguments were invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Dictionary overrides must be given all together or not at all.
    #[error("expected 0 or 5 dictionary paths, got {0}")]
    DictPathCount(usize),
    /// A dictionary file required for construction does not exist.
    #[error("{kind} dictionary file does not exist: {}", path.display())]
    MissingDictionary {
        /// Which of the five dictionaries is missing.
        kind: DictKind,
        /// The offending path.
        path: PathBuf,
    },
    /// The native engine rejected its dictionaries.
    #[error("jieba construction failed: {0}")]
    Construction(String),
    /// An operation was invoked on a handle that was already freed.
    #[error("jieba instance has been freed (called `{operation}`)")]
    Freed {
        /// Name of the rejected operation.
        operation: &'static str,
    },
    /// The process-wide shared instance was observed in the freed state.
    #[error("shared jieba instance has been freed")]
    SharedFreed,
    /// The native engine returned data that violates its contract.
    #[error("jieba api error: {0}")]
    Api(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, JiebaError>;
