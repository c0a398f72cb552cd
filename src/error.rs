use thiserror::Error;

pub const NO_CONNECTIVITY_MESSAGE: &str = "No Internet Connection";

// Every variant surfaces as `FetchStatus::Error` with its display text, so
// messages pass through undecorated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("{}", NO_CONNECTIVITY_MESSAGE)]
    NoConnectivity,

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Response(String),

    #[error("Response contained no payload")]
    MissingPayload,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportFailure {
    pub message: String,
}

impl TransportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<serde_json::Error> for TransportFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<TransportFailure> for FetchError {
    fn from(failure: TransportFailure) -> Self {
        FetchError::Transport(failure.message)
    }
}
