//! Raw responses and their classification.

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use sqlbridge_protocol::ServerFault;

use crate::error::{CallError, RemoteFault, TransportError};

/// Status and body of a completed HTTP exchange.
///
/// Returned for every HTTP-level response, including non-2xx. Use
/// [`classify`](Self::classify) to turn it into a success or a
/// [`RemoteFault`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    status: u16,
    body: Vec<u8>,
}

impl RemoteResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Body decoded as UTF-8 (lossy).
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// `true` for a 2xx status.
    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the server-side failure this response carries, if any.
    ///
    /// Any non-2xx status is a fault. A 2xx body is a fault only when it is
    /// a [`ServerFault`] envelope.
    pub fn fault(&self) -> Option<RemoteFault> {
        let envelope = ServerFault::from_body(&self.body);
        if !self.is_success_status() {
            return Some(match envelope {
                Some(f) => RemoteFault::from_server_fault(self.status, &f),
                None => RemoteFault {
                    status: self.status,
                    code: None,
                    sql_state: None,
                    message: self.fallback_message(),
                },
            });
        }
        envelope.map(|f| RemoteFault::from_server_fault(self.status, &f))
    }

    /// `true` when the response carries no fault.
    pub fn is_success(&self) -> bool {
        self.fault().is_none()
    }

    /// Splits responses into success and [`CallError::Remote`].
    pub fn classify(self) -> Result<Self, CallError> {
        match self.fault() {
            Some(fault) => Err(CallError::Remote(fault)),
            None => Ok(self),
        }
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    fn fallback_message(&self) -> String {
        let text = self.text();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            format!("HTTP {}", self.status)
        } else {
            trimmed.to_string()
        }
    }
}
