use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a remote call that carries a single string argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallArgument {
    pub value: String,
}

impl CallArgument {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Failure envelope returned by the server inside an otherwise successful
/// HTTP response (for example a SQL error).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFault {
    pub error: FaultBody,
}

/// The `error` member of a [`ServerFault`].
///
/// Servers send either a bare message string or a structured object.
/// Anything else non-null is kept as-is in `Other`; it still marks a fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FaultBody {
    Detailed(FaultDetail),
    Message(String),
    Other(Value),
}

/// Structured server-side error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_state: Option<String>,
    pub message: String,
}

impl ServerFault {
    /// Parses a response body as a fault envelope.
    ///
    /// Returns `None` when the body is not JSON, is not an object, or has no
    /// non-null `error` member.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        let Value::Object(mut map) = serde_json::from_slice::<Value>(body).ok()? else {
            return None;
        };
        let error = map.remove("error").filter(|v| !v.is_null())?;
        let error = serde_json::from_value(error.clone()).unwrap_or(FaultBody::Other(error));
        Some(Self { error })
    }

    /// Human-readable message. Unrecognized `error` shapes render as their
    /// JSON text.
    pub fn message(&self) -> Cow<'_, str> {
        match &self.error {
            FaultBody::Detailed(d) => Cow::Borrowed(&d.message),
            FaultBody::Message(m) => Cow::Borrowed(m),
            FaultBody::Other(v) => Cow::Owned(v.to_string()),
        }
    }

    /// Server error code, if supplied.
    pub fn code(&self) -> Option<i32> {
        match &self.error {
            FaultBody::Detailed(d) => d.code,
            FaultBody::Message(_) => None,
            FaultBody::Other(v) => v
                .get("code")
                .and_then(Value::as_i64)
                .and_then(|c| i32::try_from(c).ok()),
        }
    }

    /// SQLSTATE, if supplied.
    pub fn sql_state(&self) -> Option<&str> {
        match &self.error {
            FaultBody::Detailed(d) => d.sql_state.as_deref(),
            FaultBody::Message(_) => None,
            FaultBody::Other(v) => v.get("sqlState").and_then(Value::as_str),
        }
    }
}

/// Result set returned by `execute_query`. Cells are passed through as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryResult {
    /// Returns the index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of `execute_update`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub update_count: i64,
}
