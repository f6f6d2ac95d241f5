//! Error types shared across the crate.

/// Failures talking to the search and save endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(reqwest::StatusCode),
}

/// Failures editing the note buffer.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("position {0} is outside the buffer or not on a char boundary")]
    InvalidPosition(usize),
    #[error("no suggestion at index {0}")]
    NoSuchSuggestion(usize),
}

/// Failures loading the development host configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bind address {0:?}")]
    InvalidBind(String),
    #[error("invalid timeout {0:?}")]
    InvalidTimeout(String),
    #[error("cannot read catalog: {0}")]
    CatalogIo(#[from] std::io::Error),
    #[error("cannot parse catalog: {0}")]
    CatalogJson(#[from] serde_json::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;
