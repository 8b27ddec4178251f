use thiserror::Error;

/// All failures reported by this crate.
#[derive(Debug, Error)]
pub enum SpzError {
    /// The underlying byte source or sink failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The input is not a well-formed .spz stream.
    #[error("Failed to decode spz data: {0}")]
    Decode(String),

    /// The splat could not be serialized.
    #[error("Failed to encode spz data: {0}")]
    Encode(String),

    /// The parallel arrays disagree on the point count or SH width.
    #[error("invalid splat shape: {0}")]
    Shape(String),

    /// The header names a version this build cannot handle.
    #[error("unsupported spz version {0}")]
    UnsupportedVersion(u32),
}

pub type Result<T> = std::result::Result<T, SpzError>;
