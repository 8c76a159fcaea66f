//! Transaction isolation levels and their wire tokens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Token sent for any isolation value outside the known set.
pub const UNKNOWN_TOKEN: &str = "UNKNOWN";

/// Transaction isolation level negotiated with the remote session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsolationLevel {
    #[default]
    #[serde(rename = "NONE")]
    Unspecified,
    #[serde(rename = "READ_UNCOMMITTED")]
    ReadUncommitted,
    #[serde(rename = "READ_COMMITTED")]
    ReadCommitted,
    #[serde(rename = "REPEATABLE_READ")]
    RepeatableRead,
    #[serde(rename = "SERIALIZABLE")]
    Serializable,
}

impl IsolationLevel {
    /// All levels, in ascending strictness.
    pub const ALL: [IsolationLevel; 5] = [
        Self::Unspecified,
        Self::ReadUncommitted,
        Self::ReadCommitted,
        Self::RepeatableRead,
        Self::Serializable,
    ];

    /// Returns the fixed wire token for this level.
    pub fn wire_token(self) -> &'static str {
        match self {
            Self::Unspecified => "NONE",
            Self::ReadUncommitted => "READ_UNCOMMITTED",
            Self::ReadCommitted => "READ_COMMITTED",
            Self::RepeatableRead => "REPEATABLE_READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }

    /// Parses a wire token. Returns `None` for unknown tokens, including
    /// `"UNKNOWN"` itself.
    pub fn from_wire_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.wire_token() == token)
    }

    /// Numeric code used by connection-level APIs (JDBC/ODBC numbering).
    pub fn code(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::ReadUncommitted => 1,
            Self::ReadCommitted => 2,
            Self::RepeatableRead => 4,
            Self::Serializable => 8,
        }
    }

    /// Maps a numeric code back to a level.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.code() == code)
    }
}

/// Maps a raw numeric isolation value to its wire token.
///
/// Values outside the known set map to `"UNKNOWN"`.
pub fn isolation_to_wire_token(raw: i32) -> &'static str {
    IsolationLevel::from_code(raw).map_or(UNKNOWN_TOKEN, IsolationLevel::wire_token)
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_token())
    }
}

/// Error returned when a string is not a known isolation token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown isolation level: {0}")]
pub struct ParseIsolationError(pub String);

impl FromStr for IsolationLevel {
    type Err = ParseIsolationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::from_wire_token(&normalized).ok_or_else(|| ParseIsolationError(s.to_string()))
    }
}
