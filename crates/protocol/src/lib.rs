//! Wire vocabulary shared by every sqlbridge crate.
//!
//! Nothing here performs I/O. The transport, blob and session crates agree
//! on operation names, isolation-level tokens and payload shapes through
//! the types in this crate.

pub mod constants;
pub mod envelope;
pub mod isolation;

// Re-export primary types for convenience.
pub use constants::Operation;
pub use envelope::{CallArgument, FaultBody, FaultDetail, QueryResult, ServerFault, UpdateResult};
pub use isolation::{IsolationLevel, ParseIsolationError, isolation_to_wire_token};
