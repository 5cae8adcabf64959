use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("No image attached")]
    NotMounted,

    #[error("Session already has an image attached")]
    AlreadyActive,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Out of slots: record table is full")]
    OutOfSlots,

    #[error("Out of range: {requested} bytes exceeds maximum file size of {max} bytes")]
    OutOfRange { requested: usize, max: usize },

    #[error("Out of space: no free blocks available")]
    OutOfSpace,

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid block index: {0}")]
    InvalidBlock(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FsError>;
