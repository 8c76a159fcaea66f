//! Transaction controller: commit and rollback as remote call sequences.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use sqlbridge_protocol::constants::WIRE_TRUE;
use sqlbridge_protocol::{IsolationLevel, Operation};
use sqlbridge_transport::{CallError, RemoteCall, RemoteTransport};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::state::SessionState;

/// Lifecycle of a [`TransactionController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransactionState {
    /// Begun; commit or rollback may be called.
    Active = 0,
    /// A commit or rollback is in flight.
    Completing = 1,
    Committed = 2,
    RolledBack = 3,
    /// A commit or rollback failed. The remote session state is unknown
    /// and must be re-synchronized by the caller.
    Indeterminate = 4,
}

impl TransactionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Active,
            1 => Self::Completing,
            2 => Self::Committed,
            3 => Self::RolledBack,
            _ => Self::Indeterminate,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack | Self::Indeterminate)
    }
}

/// One transaction span on a remote session.
///
/// Single-use: exactly one of [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) ends it. The isolation level is fixed at
/// construction. The controller never issues the isolation-setting call;
/// the connection must have negotiated it beforehand.
///
/// Dropping the controller sends nothing to the server. Dropping it before
/// a commit or rollback has succeeded logs a leaked-transaction warning and
/// bumps [`SessionState::leaked_transactions`]. A commit or rollback whose
/// future is dropped mid-flight leaves the controller `Indeterminate`.
pub struct TransactionController {
    transport: Arc<dyn RemoteTransport>,
    session: Arc<SessionState>,
    isolation: IsolationLevel,
    state: AtomicU8,
}

impl TransactionController {
    /// Creates a controller for a transaction that has already been begun
    /// on the remote session (auto-commit off).
    pub fn new(
        transport: Arc<dyn RemoteTransport>,
        session: Arc<SessionState>,
        isolation: IsolationLevel,
    ) -> Self {
        Self {
            transport,
            session,
            isolation,
            state: AtomicU8::new(TransactionState::Active as u8),
        }
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn isolation_wire_token(&self) -> &'static str {
        self.isolation.wire_token()
    }

    pub fn state(&self) -> TransactionState {
        TransactionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Commits by switching the remote session back to auto-commit.
    ///
    /// Issues exactly one `set_auto_commit("true")`. Not cancellable.
    pub async fn commit(&self) -> Result<(), SessionError> {
        self.begin_completion("commit")?;
        let _abandoned = AbandonGuard(&self.state);

        let result = self
            .invoke(RemoteCall::with_argument(Operation::SetAutoCommit, WIRE_TRUE))
            .await;

        self.complete(result, TransactionState::Committed)
    }

    /// Rolls back, then switches the remote session back to auto-commit.
    ///
    /// Issues `rollback` followed by `set_auto_commit("true")`. A failed
    /// `rollback` is returned without issuing the second call. Not
    /// cancellable.
    pub async fn rollback(&self) -> Result<(), SessionError> {
        self.begin_completion("rollback")?;
        let _abandoned = AbandonGuard(&self.state);

        let result = async {
            self.invoke(RemoteCall::new(Operation::Rollback)).await?;
            self.invoke(RemoteCall::with_argument(Operation::SetAutoCommit, WIRE_TRUE))
                .await
        }
        .await;

        self.complete(result, TransactionState::RolledBack)
    }

    fn begin_completion(&self, action: &str) -> Result<(), SessionError> {
        if let Err(current) = self.state.compare_exchange(
            TransactionState::Active as u8,
            TransactionState::Completing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            let current = TransactionState::from_u8(current);
            return Err(SessionError::state(format!(
                "cannot {action}: transaction is {current:?}"
            )));
        }

        if self.session.is_closed() {
            self.state
                .store(TransactionState::Indeterminate as u8, Ordering::Release);
            return Err(SessionError::state(format!(
                "cannot {action}: connection is closed"
            )));
        }

        debug!(action, isolation = %self.isolation, "completing transaction");
        Ok(())
    }

    fn complete(
        &self,
        result: Result<(), CallError>,
        success: TransactionState,
    ) -> Result<(), SessionError> {
        match result {
            Ok(()) => {
                self.session.set_auto_commit(true);
                self.state.store(success as u8, Ordering::Release);
                info!(outcome = ?success, isolation = %self.isolation, "transaction finished");
                Ok(())
            }
            Err(e) => {
                self.state
                    .store(TransactionState::Indeterminate as u8, Ordering::Release);
                warn!(error = %e, target_state = ?success, "transaction completion failed");
                Err(e.into())
            }
        }
    }

    async fn invoke(&self, call: RemoteCall) -> Result<(), CallError> {
        self.transport.call(&call, None).await?.classify()?;
        Ok(())
    }
}

/// Marks an in-flight completion `Indeterminate` if its future is dropped
/// before [`TransactionController::complete`] runs.
struct AbandonGuard<'a>(&'a AtomicU8);

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        let abandoned = self
            .0
            .compare_exchange(
                TransactionState::Completing as u8,
                TransactionState::Indeterminate as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if abandoned {
            warn!("transaction completion abandoned before the server answered");
        }
    }
}

impl Drop for TransactionController {
    fn drop(&mut self) {
        let state = self.state();
        if matches!(state, TransactionState::Committed | TransactionState::RolledBack) {
            return;
        }
        self.session.record_leak();
        warn!(
            isolation = %self.isolation,
            ?state,
            "leaked transaction: controller dropped without a successful commit or rollback"
        );
    }
}

impl std::fmt::Debug for TransactionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionController")
            .field("isolation", &self.isolation)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
