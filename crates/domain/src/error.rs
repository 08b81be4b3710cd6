/// Shared error type used across all plcbridge crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Session establishment failed (address unresolvable, refused,
    /// timed out). Terminal for the current unit of work.
    #[error("connection: {0}")]
    Connection(String),

    /// An operation on an open session failed.
    #[error("protocol: {0}")]
    Protocol(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The catalog transaction failed; nothing was committed.
    #[error("storage: {0}")]
    Storage(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
