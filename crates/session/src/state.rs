use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use sqlbridge_protocol::IsolationLevel;

/// Local mirror of one remote session.
///
/// Shared between the connection and its transaction controllers. The
/// auto-commit flag is `true` except between a successful begin and the
/// commit or rollback that ends it.
#[derive(Debug)]
pub struct SessionState {
    auto_commit: AtomicBool,
    isolation: AtomicI32,
    closed: AtomicBool,
    leaked: AtomicUsize,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            auto_commit: AtomicBool::new(true),
            isolation: AtomicI32::new(IsolationLevel::Unspecified.code()),
            closed: AtomicBool::new(false),
            leaked: AtomicUsize::new(0),
        }
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::Acquire)
    }

    pub(crate) fn set_auto_commit(&self, enabled: bool) {
        self.auto_commit.store(enabled, Ordering::Release);
    }

    /// Isolation level last confirmed by the server.
    pub fn isolation(&self) -> IsolationLevel {
        IsolationLevel::from_code(self.isolation.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub(crate) fn set_isolation(&self, level: IsolationLevel) {
        self.isolation.store(level.code(), Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the session closed. Returns `false` if it already was.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Number of transaction controllers dropped without commit or rollback.
    pub fn leaked_transactions(&self) -> usize {
        self.leaked.load(Ordering::Relaxed)
    }

    pub(crate) fn record_leak(&self) {
        self.leaked.fetch_add(1, Ordering::Relaxed);
    }
}
