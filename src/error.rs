use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by an image processing capability.
///
/// These stay at the capability seam; the tiling engine folds them into
/// [`TilingError::ProcessingFailure`].
#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    /// Filesystem error while reading or writing an image
    #[error("I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Source image could not be decoded
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Output image could not be encoded
    #[error("Failed to encode {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// The operation finished but the expected output file is absent
    #[error("Operation produced no output at {path}")]
    MissingOutput { path: PathBuf },

    /// Arguments the capability cannot act on (empty source list, zero size)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors that can occur while reading or writing pyramidal TIFF files.
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF), got {0}")]
    InvalidVersion(u16),

    /// File is too small to contain the structure being read
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Output would exceed the 4 GiB addressable by classic TIFF
    #[error("Classic TIFF offset overflow at {0} bytes")]
    OffsetOverflow(u64),

    /// Tile payload could not be produced
    #[error("Tile encoding failed: {0}")]
    Encode(String),

    /// Underlying read or write failed
    #[error("I/O error: {0}")]
    Io(String),
}

/// The tiling engine's error taxonomy.
///
/// Any failure inside a conversion surfaces as exactly one of these. Only
/// [`TilingError::CleanupFailure`] is treated as non-fatal by the drivers.
#[derive(Debug, Clone, Error)]
pub enum TilingError {
    /// Bad geometry input (zero image or tile dimension)
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),

    /// Attempt to merge a horizontal stripe with a vertical one
    #[error("Cannot merge stripes with different orientation ({left} and {right})")]
    OrientationMismatch { left: String, right: String },

    /// A delegated image operation failed or produced no output
    #[error("{operation} failed: {message}")]
    ProcessingFailure { operation: String, message: String },

    /// A temporary artifact could not be removed
    #[error("Could not delete {path}: {message}")]
    CleanupFailure { path: PathBuf, message: String },

    /// The target tileset location already exists
    #[error("Target '{path}' already exists")]
    DirectoryConflict { path: PathBuf },

    /// A finished tileset failed a completeness check
    #[error("Validation failed at {path}: {reason}")]
    ValidationFailure { path: PathBuf, reason: String },

    /// Filesystem error outside the image capability
    #[error("I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },
}

impl TilingError {
    /// Build a `ProcessingFailure` for a named operation.
    pub fn processing(operation: impl Into<String>, message: impl ToString) -> Self {
        TilingError::ProcessingFailure {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Build a `ValidationFailure` naming the offending path.
    pub fn validation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TilingError::ValidationFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build an `Io` error from a std I/O error.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        TilingError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether a conversion may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TilingError::CleanupFailure { .. })
    }
}

impl From<ProcessorError> for TilingError {
    fn from(err: ProcessorError) -> Self {
        let operation = match &err {
            ProcessorError::Io { .. } => "image i/o",
            ProcessorError::Decode { .. } => "decode",
            ProcessorError::Encode { .. } => "encode",
            ProcessorError::MissingOutput { .. } => "image operation",
            ProcessorError::InvalidArgument(_) => "image operation",
        };
        TilingError::processing(operation, err)
    }
}

impl From<TiffError> for TilingError {
    fn from(err: TiffError) -> Self {
        TilingError::processing("pyramidal tiff", err)
    }
}
