//! Connection facade: one transport, one session.

use std::sync::Arc;

use sqlbridge_blob::{CancelPolicy, ProgressIndicator, UploadJob, UploadStreamer};
use sqlbridge_protocol::constants::wire_bool;
use sqlbridge_protocol::{IsolationLevel, Operation, QueryResult, UpdateResult};
use sqlbridge_transport::{
    HttpTransport, RemoteCall, RemoteResponse, RemoteTransport, TransportConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::SessionError;
use crate::state::SessionState;
use crate::transaction::TransactionController;

/// A logical database connection over the remote HTTP API.
///
/// All calls share one [`RemoteTransport`]. Calls are independent async
/// operations; the connection holds no lock across them.
pub struct RemoteConnection {
    transport: Arc<dyn RemoteTransport>,
    session: Arc<SessionState>,
    upload_chunk_size: usize,
}

impl RemoteConnection {
    /// Opens a connection backed by an [`HttpTransport`].
    pub fn connect(config: TransportConfig) -> Result<Self, SessionError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    /// Opens a connection on an existing transport.
    pub fn with_transport(transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            transport,
            session: Arc::new(SessionState::new()),
            upload_chunk_size: 0,
        }
    }

    /// Sets the read size used for BLOB uploads. `0` uses the default.
    pub fn with_upload_chunk_size(mut self, chunk_size: usize) -> Self {
        self.upload_chunk_size = chunk_size;
        self
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn auto_commit(&self) -> bool {
        self.session.auto_commit()
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    pub async fn set_auto_commit(&self, enabled: bool) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.call(
            RemoteCall::with_argument(Operation::SetAutoCommit, wire_bool(enabled)),
            None,
        )
        .await?;
        self.session.set_auto_commit(enabled);
        Ok(())
    }

    /// Sends the isolation level's wire token and records it locally once
    /// the server accepts it.
    pub async fn set_transaction_isolation(
        &self,
        level: IsolationLevel,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.call(
            RemoteCall::with_argument(Operation::SetTransactionIsolation, level.wire_token()),
            None,
        )
        .await?;
        self.session.set_isolation(level);
        Ok(())
    }

    /// Begins a transaction by turning auto-commit off.
    ///
    /// `level` is recorded on the returned controller only; call
    /// [`set_transaction_isolation`](Self::set_transaction_isolation) first
    /// if the server must apply it.
    pub async fn begin(&self, level: IsolationLevel) -> Result<TransactionController, SessionError> {
        self.ensure_open()?;
        if !self.session.auto_commit() {
            return Err(SessionError::state("a transaction is already active"));
        }

        self.set_auto_commit(false).await?;
        info!(isolation = %level, "transaction begun");

        Ok(TransactionController::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.session),
            level,
        ))
    }

    /// Runs a statement and returns the affected row count.
    pub async fn execute_update(
        &self,
        sql: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<i64, SessionError> {
        self.ensure_open()?;
        let resp = self
            .call(RemoteCall::with_argument(Operation::ExecuteUpdate, sql), cancel)
            .await?;
        let result: UpdateResult = serde_json::from_slice(resp.body())?;
        Ok(result.update_count)
    }

    /// Runs a query and returns its rows.
    pub async fn execute_query(
        &self,
        sql: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<QueryResult, SessionError> {
        self.ensure_open()?;
        let resp = self
            .call(RemoteCall::with_argument(Operation::ExecuteQuery, sql), cancel)
            .await?;
        Ok(serde_json::from_slice(resp.body())?)
    }

    /// Streams a BLOB to the server on this connection's transport.
    ///
    /// The response is classified; a server-side rejection is returned as
    /// a remote error.
    pub async fn upload_blob(
        &self,
        job: UploadJob,
        progress: Option<Arc<ProgressIndicator>>,
        cancel: &CancellationToken,
        policy: CancelPolicy,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        UploadStreamer::new(Arc::clone(&self.transport))
            .with_chunk_size(self.upload_chunk_size)
            .upload(job, progress, cancel, policy)
            .await?
            .classify()?;
        Ok(())
    }

    /// Closes the remote session. Closing twice is a no-op.
    ///
    /// The connection counts as closed even if the remote call fails.
    pub async fn close(&self) -> Result<(), SessionError> {
        if !self.session.mark_closed() {
            return Ok(());
        }
        debug!("closing connection");
        self.call(RemoteCall::new(Operation::Close), None).await?;
        Ok(())
    }

    async fn call(
        &self,
        call: RemoteCall,
        cancel: Option<&CancellationToken>,
    ) -> Result<RemoteResponse, SessionError> {
        let resp = self.transport.call(&call, cancel).await?.classify()?;
        debug!(operation = %call.operation, status = resp.status(), "remote call ok");
        Ok(resp)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.session.is_closed() {
            return Err(SessionError::state("connection is closed"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, Recorded};
    use crate::transaction::TransactionState;
    use sqlbridge_transport::CallError;
    use std::io::Cursor;

    fn connection() -> (Arc<MockTransport>, RemoteConnection) {
        let transport = Arc::new(MockTransport::new());
        let conn = RemoteConnection::with_transport(transport.clone());
        (transport, conn)
    }

    #[tokio::test]
    async fn begin_commit_cycle() {
        let (transport, conn) = connection();
        assert!(conn.auto_commit());

        let tx = conn.begin(IsolationLevel::RepeatableRead).await.unwrap();
        assert!(!conn.auto_commit());
        assert_eq!(tx.isolation_wire_token(), "REPEATABLE_READ");

        tx.commit().await.unwrap();
        assert!(conn.auto_commit());

        assert_eq!(
            transport.recorded(),
            vec![
                Recorded::call(Operation::SetAutoCommit, Some("false")),
                Recorded::call(Operation::SetAutoCommit, Some("true")),
            ]
        );
    }

    #[tokio::test]
    async fn begin_does_not_send_isolation() {
        let (transport, conn) = connection();
        let tx = conn.begin(IsolationLevel::Serializable).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(
            transport
                .recorded()
                .iter()
                .all(|r| !matches!(r, Recorded::Call(Operation::SetTransactionIsolation, _)))
        );
    }

    #[tokio::test]
    async fn nested_begin_is_rejected() {
        let (transport, conn) = connection();
        let tx = conn.begin(IsolationLevel::Unspecified).await.unwrap();

        let err = conn.begin(IsolationLevel::Unspecified).await.unwrap_err();
        assert!(err.is_state());
        assert_eq!(transport.recorded().len(), 1);

        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn failed_begin_keeps_auto_commit() {
        let (transport, conn) = connection();
        transport.push_ok(503, "unavailable");

        let err = conn.begin(IsolationLevel::Unspecified).await.unwrap_err();
        assert!(err.is_remote());
        assert!(conn.auto_commit());
    }

    #[tokio::test]
    async fn isolation_is_sent_as_wire_token() {
        let (transport, conn) = connection();
        conn.set_transaction_isolation(IsolationLevel::ReadCommitted)
            .await
            .unwrap();

        assert_eq!(
            transport.recorded(),
            vec![Recorded::call(
                Operation::SetTransactionIsolation,
                Some("READ_COMMITTED")
            )]
        );
        assert_eq!(conn.session().isolation(), IsolationLevel::ReadCommitted);
    }

    #[tokio::test]
    async fn rejected_isolation_is_not_recorded() {
        let (transport, conn) = connection();
        transport.push_ok(400, "unsupported");

        assert!(
            conn.set_transaction_isolation(IsolationLevel::Serializable)
                .await
                .is_err()
        );
        assert_eq!(conn.session().isolation(), IsolationLevel::Unspecified);
    }

    #[tokio::test]
    async fn execute_update_returns_count() {
        let (transport, conn) = connection();
        transport.push_ok(200, r#"{"updateCount":3}"#);

        let count = conn
            .execute_update("DELETE FROM t WHERE id < 4", None)
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(
            transport.recorded(),
            vec![Recorded::call(
                Operation::ExecuteUpdate,
                Some("DELETE FROM t WHERE id < 4")
            )]
        );
    }

    #[tokio::test]
    async fn execute_query_decodes_rows() {
        let (transport, conn) = connection();
        transport.push_ok(200, r#"{"columns":["id","name"],"rows":[[1,"a"],[2,"b"]]}"#);

        let result = conn.execute_query("SELECT id, name FROM t", None).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.column_index("name"), Some(1));
        assert_eq!(result.rows[1][1], serde_json::json!("b"));
    }

    #[tokio::test]
    async fn execute_query_malformed_body_is_json_error() {
        let (transport, conn) = connection();
        transport.push_ok(200, "not json");

        let err = conn.execute_query("SELECT 1", None).await.unwrap_err();
        assert!(matches!(err, SessionError::Json(_)), "{err:?}");
    }

    #[tokio::test]
    async fn sql_fault_is_remote_error() {
        let (transport, conn) = connection();
        transport.push_ok(
            200,
            r#"{"error":{"code":942,"sqlState":"42000","message":"no such table"}}"#,
        );

        let err = conn.execute_update("DROP TABLE x", None).await.unwrap_err();
        let SessionError::Call(call) = &err else {
            panic!("expected call error, got {err:?}");
        };
        let fault = call.remote_fault().unwrap();
        assert_eq!(fault.code, Some(942));
        assert_eq!(fault.sql_state.as_deref(), Some("42000"));
    }

    #[tokio::test]
    async fn cancellation_token_is_threaded_through() {
        let (transport, conn) = connection();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = conn
            .execute_query("SELECT 1", Some(&cancel))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(transport.cancel_seen(), vec![true]);
    }

    #[tokio::test]
    async fn upload_blob_uses_same_transport() {
        let (transport, conn) = connection();
        let conn = conn.with_upload_chunk_size(16);
        let indicator = Arc::new(ProgressIndicator::new(0));

        conn.upload_blob(
            UploadJob::new("photo", Cursor::new(vec![9u8; 64]), 64),
            Some(Arc::clone(&indicator)),
            &CancellationToken::new(),
            CancelPolicy::Honor,
        )
        .await
        .unwrap();

        assert_eq!(
            transport.recorded(),
            vec![Recorded::Upload {
                blob_id: "photo".into(),
                bytes: 64
            }]
        );
        assert_eq!(indicator.get(), 100);
    }

    #[tokio::test]
    async fn rejected_upload_is_remote_error() {
        let (transport, conn) = connection();
        transport.push_ok(413, "too large");
        let indicator = Arc::new(ProgressIndicator::new(0));

        let err = conn
            .upload_blob(
                UploadJob::new("big", Cursor::new(vec![0u8; 100]), 100),
                Some(Arc::clone(&indicator)),
                &CancellationToken::new(),
                CancelPolicy::Honor,
            )
            .await
            .unwrap_err();

        assert!(err.is_remote());
        assert!(indicator.get() < 100);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_further_calls() {
        let (transport, conn) = connection();
        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert!(conn.is_closed());

        assert!(conn.execute_update("SELECT 1", None).await.unwrap_err().is_state());
        assert!(conn.set_auto_commit(true).await.unwrap_err().is_state());
        assert!(conn.begin(IsolationLevel::Unspecified).await.unwrap_err().is_state());

        assert_eq!(
            transport.recorded(),
            vec![Recorded::call(Operation::Close, None)]
        );
    }

    #[tokio::test]
    async fn close_failure_still_closes() {
        let (transport, conn) = connection();
        transport.push(Err(CallError::Cancelled));

        assert!(conn.close().await.is_err());
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn transaction_outlives_closed_connection_as_state_error() {
        let (_, conn) = connection();
        let tx = conn.begin(IsolationLevel::Unspecified).await.unwrap();
        conn.close().await.unwrap();

        assert!(tx.commit().await.unwrap_err().is_state());
        assert_eq!(tx.state(), TransactionState::Indeterminate);
    }
}
