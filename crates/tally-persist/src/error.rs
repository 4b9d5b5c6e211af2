use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("Duplicate usage id: {0}")]
    DuplicateKey(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Store not initialized: {0} (call open() first)")]
    NotInitialized(String),

    #[error("Timestamp out of range: {0}")]
    InvalidTimestamp(i64),

    #[error("{field} does not fit in an SQLite integer: {value}")]
    ValueOutOfRange { field: &'static str, value: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PersistError>;
