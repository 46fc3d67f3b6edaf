use scalper_integration::{SocketError, retry::Retryable};
use thiserror::Error;

/// All errors generated while consulting the judge.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JudgeError {
    #[error("judge call timed out")]
    Timeout,

    #[error("judge rate limited")]
    RateLimited,

    #[error("judge circuit breaker open")]
    CircuitOpen,

    #[error("judge service error (status={status}): {body}")]
    Service { status: u16, body: String },

    #[error("judge response failed validation: {0}")]
    Validation(String),

    #[error("judge transport error: {0}")]
    Transport(String),
}

impl Retryable for JudgeError {
    fn is_retryable(&self) -> bool {
        match self {
            JudgeError::Timeout | JudgeError::Transport(_) => true,
            JudgeError::Service { status, .. } => *status >= 500,
            JudgeError::RateLimited | JudgeError::CircuitOpen | JudgeError::Validation(_) => false,
        }
    }
}

impl From<SocketError> for JudgeError {
    /// Maps transport failures onto the judge taxonomy. Failures the socket layer considers
    /// fatal (eg/ serialisation, malformed urls) become [`JudgeError::Validation`] so they are
    /// never retried.
    fn from(error: SocketError) -> Self {
        let retryable = error.is_retryable();
        match error {
            SocketError::HttpTimeout(_) => JudgeError::Timeout,
            SocketError::HttpResponse(status, _) if status.as_u16() == 429 => {
                JudgeError::RateLimited
            }
            SocketError::HttpResponse(status, body) => JudgeError::Service {
                status: status.as_u16(),
                body,
            },
            SocketError::Deserialise { error, .. } | SocketError::DeserialiseBinary { error, .. } => {
                JudgeError::Validation(error.to_string())
            }
            other if retryable => JudgeError::Transport(other.to_string()),
            other => JudgeError::Validation(other.to_string()),
        }
    }
}
