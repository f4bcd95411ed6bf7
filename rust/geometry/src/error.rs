use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or transforming geometry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    #[error("Degenerate transform: {0}")]
    DegenerateTransform(String),
}
