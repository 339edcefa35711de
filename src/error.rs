use thiserror::Error;

/// Error type returned by iconv-rs public APIs.
#[derive(Debug, Error)]
pub enum IconvError {
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
    /// The engine does not know how to convert between the two charsets.
    #[error("unsupported conversion from {from} to {to}")]
    UnsupportedCharset {
        /// Target charset identifier, as passed to `open`.
        to: String,
        /// Source charset identifier, as passed to `open`.
        from: String,
    },
    /// Allocation or release failure inside the engine.
    #[error("resource error: {message}")]
    Resource {
        /// Description of the failing engine call.
        message: String,
        /// Output produced before the failure, when raised mid-conversion.
        output: Vec<u8>,
    },
    /// Input contained a byte sequence that is invalid in the source charset.
    #[error("invalid byte sequence at input offset {position}")]
    InvalidSequence {
        /// Offset of the first unconverted input byte.
        position: usize,
        /// Output produced before the failure.
        output: Vec<u8>,
    },
    /// Input ended in the middle of a multi-byte sequence.
    #[error("incomplete byte sequence at input offset {position}")]
    IncompleteSequence {
        /// Offset of the first unconverted input byte.
        position: usize,
        /// Output produced before the failure.
        output: Vec<u8>,
    },
    /// Input character has no representation in the target charset.
    #[error("character at input offset {position} is not representable in the target charset")]
    Unrepresentable {
        /// Offset of the first unconverted input byte.
        position: usize,
        /// Output produced before the failure.
        output: Vec<u8>,
    },
}

impl IconvError {
    pub(crate) fn resource(message: impl Into<String>) -> Self {
        IconvError::Resource {
            message: message.into(),
            output: Vec::new(),
        }
    }

    /// Output converted before the failure point, if this error carries any.
    ///
    /// Only conversion-time errors carry output; an empty slice means the
    /// failure happened before anything was produced.
    pub fn partial_output(&self) -> Option<&[u8]> {
        match self {
            IconvError::Resource { output, .. }
            | IconvError::InvalidSequence { output, .. }
            | IconvError::IncompleteSequence { output, .. }
            | IconvError::Unrepresentable { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Consumes the error and returns its partial output (empty if none).
    pub fn into_partial_output(self) -> Vec<u8> {
        match self {
            IconvError::Resource { output, .. }
            | IconvError::InvalidSequence { output, .. }
            | IconvError::IncompleteSequence { output, .. }
            | IconvError::Unrepresentable { output, .. } => output,
            _ => Vec::new(),
        }
    }

    /// Input offset where conversion stopped, for conversion-time errors.
    pub fn position(&self) -> Option<usize> {
        match self {
            IconvError::InvalidSequence { position, .. }
            | IconvError::IncompleteSequence { position, .. }
            | IconvError::Unrepresentable { position, .. } => Some(*position),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IconvError>;
