//! Error taxonomy for remote calls.

use sqlbridge_protocol::ServerFault;

/// The HTTP exchange could not be completed.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("HTTP error: {0}")]
    Request(#[source] reqwest::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e)
        } else {
            Self::Request(e)
        }
    }
}

/// Server-side failure carried by a well-formed HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("remote error {status}: {message}")]
pub struct RemoteFault {
    pub status: u16,
    pub code: Option<i32>,
    pub sql_state: Option<String>,
    pub message: String,
}

impl RemoteFault {
    pub(crate) fn from_server_fault(status: u16, fault: &ServerFault) -> Self {
        Self {
            status,
            code: fault.code(),
            sql_state: fault.sql_state().map(str::to_string),
            message: fault.message().to_string(),
        }
    }
}

/// Outcome of a failed remote call or upload.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Remote(#[from] RemoteFault),
}

impl From<reqwest::Error> for CallError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.into())
    }
}

impl CallError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Timeout))
    }

    /// Returns the server fault, if this is a remote protocol error.
    pub fn remote_fault(&self) -> Option<&RemoteFault> {
        match self {
            Self::Remote(f) => Some(f),
            _ => None,
        }
    }
}
