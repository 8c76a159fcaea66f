use std::fmt;

use serde::{Deserialize, Serialize};

/// Multipart field carrying the blob identifier as plain text.
pub const BLOB_ID_FIELD: &str = "blob_id";

/// Multipart file field carrying the blob bytes.
pub const BLOB_FILE_FIELD: &str = "file";

/// Size of each read from an upload source (64 KiB).
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Request timeout in milliseconds; `0` defers to the transport default.
pub const DEFAULT_TIMEOUT_MS: u64 = 0;

/// Highest value the progress indicator may show before an upload completes.
pub const PROGRESS_CEILING: u8 = 99;

/// Value the progress indicator shows once an upload has completed.
pub const PROGRESS_COMPLETE: u8 = 100;

/// Wire value for a boolean argument set to true.
pub const WIRE_TRUE: &str = "true";

/// Wire value for a boolean argument set to false.
pub const WIRE_FALSE: &str = "false";

/// Remote operation identifier.
///
/// The serialized form doubles as the URL path segment appended to the
/// connection's base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "set_auto_commit")]
    SetAutoCommit,
    #[serde(rename = "rollback")]
    Rollback,
    #[serde(rename = "set_transaction_isolation")]
    SetTransactionIsolation,
    #[serde(rename = "execute_update")]
    ExecuteUpdate,
    #[serde(rename = "execute_query")]
    ExecuteQuery,
    #[serde(rename = "close")]
    Close,
}

impl Operation {
    /// Returns the path segment for this operation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetAutoCommit => "set_auto_commit",
            Self::Rollback => "rollback",
            Self::SetTransactionIsolation => "set_transaction_isolation",
            Self::ExecuteUpdate => "execute_update",
            Self::ExecuteQuery => "execute_query",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the wire value for a boolean argument.
pub fn wire_bool(value: bool) -> &'static str {
    if value { WIRE_TRUE } else { WIRE_FALSE }
}
