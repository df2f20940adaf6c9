use thiserror::Error;

/// Errors raised at the crate's I/O boundaries (storage, config, export, dictionaries).
///
/// The session engine itself never fails; it recovers locally.
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("dictionary `{0}` not found")]
    DictionaryNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
