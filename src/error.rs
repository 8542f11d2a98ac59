use std::sync::Arc;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors outside the decision engine itself. Targeting, rotation and variant selection are total
/// and never produce an error.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The configuration store cannot serve reads (e.g., no snapshot has been loaded yet).
    #[error("configuration store is unavailable")]
    StoreUnavailable,
    #[error("invalid configuration url")]
    InvalidBaseUrl(#[source] url::ParseError),
    #[error("unauthorized to fetch bar configuration")]
    Unauthorized,
    #[error("error parsing configuration")]
    ConfigurationParse(#[source] Arc<serde_json::Error>),
    #[error("poller thread panicked")]
    PollerThreadPanicked,
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    #[error(transparent)]
    Io(Arc<std::io::Error>),
    #[error(transparent)]
    Network(Arc<reqwest::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::ConfigurationParse(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::Network(Arc::new(value.without_url()))
    }
}
