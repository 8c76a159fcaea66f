//! Connection and transaction semantics over the stateless remote API.
//!
//! The remote server only sees independent HTTP calls. This crate keeps the
//! session state locally (auto-commit flag, isolation level, closed flag)
//! and turns begin/commit/rollback into the fixed call sequences the server
//! understands:
//!
//! - **begin**: `set_auto_commit("false")`, then a [`TransactionController`]
//! - **commit**: `set_auto_commit("true")`
//! - **rollback**: `rollback`, then `set_auto_commit("true")`
//!
//! [`RemoteConnection`] is the facade that owns one transport and one
//! session. BLOB uploads are routed through `sqlbridge-blob` on the same
//! transport.

pub mod connection;
pub mod error;
pub mod state;
pub mod transaction;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience.
pub use connection::RemoteConnection;
pub use error::SessionError;
pub use state::SessionState;
pub use transaction::{TransactionController, TransactionState};
