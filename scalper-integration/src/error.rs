use crate::retry::Retryable;
use reqwest::Error;
use thiserror::Error;

/// All socket IO related errors generated in `scalper-integration`.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("Deserialising JSON error: {error} for payload: {payload}")]
    Deserialise {
        error: serde_json::Error,
        payload: String,
    },

    #[error("Deserialising JSON error: {error} for binary payload: {payload:?}")]
    DeserialiseBinary {
        error: serde_json::Error,
        payload: Vec<u8>,
    },

    #[error("Serialising JSON error: {0}")]
    Serialise(serde_json::Error),

    #[error("error parsing Url: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("HTTP request timed out")]
    HttpTimeout(reqwest::Error),

    /// REST http response error
    #[error("HTTP response (status={0}) error: {1}")]
    HttpResponse(reqwest::StatusCode, String),
}

impl From<reqwest::Error> for SocketError {
    fn from(error: Error) -> Self {
        match error {
            error if error.is_timeout() => SocketError::HttpTimeout(error),
            error => SocketError::Http(error),
        }
    }
}

impl Retryable for SocketError {
    fn is_retryable(&self) -> bool {
        match self {
            SocketError::HttpTimeout(_) | SocketError::Http(_) => true,
            SocketError::HttpResponse(status, _) => status.is_server_error(),
            SocketError::Deserialise { .. }
            | SocketError::DeserialiseBinary { .. }
            | SocketError::Serialise(_)
            | SocketError::UrlParse(_) => false,
        }
    }
}
