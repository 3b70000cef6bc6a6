use thiserror::Error;

/// Why a fetch attempt did not produce a snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("API {status}")]
    Status { status: u16 },

    #[error("invalid API base {base:?}: {reason}")]
    InvalidUrl { base: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed arrivals response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("encoding snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}
