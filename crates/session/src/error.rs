//! Session error types.

use sqlbridge_transport::{CallError, TransportError};

/// Errors produced by connection and transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Call(#[from] CallError),

    #[error("invalid state: {0}")]
    State(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        Self::Call(e.into())
    }
}

impl SessionError {
    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Call(e) if e.is_cancelled())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Call(CallError::Transport(_)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Call(CallError::Remote(_)))
    }

    pub fn is_state(&self) -> bool {
        matches!(self, Self::State(_))
    }
}
