//! Recording transport shared by the session tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures_util::StreamExt;
use sqlbridge_protocol::Operation;
use sqlbridge_transport::{
    BoxFuture, CallError, MultipartUpload, RemoteCall, RemoteResponse, RemoteTransport,
};
use tokio_util::sync::CancellationToken;

/// One request as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Recorded {
    Call(Operation, Option<String>),
    Upload { blob_id: String, bytes: usize },
}

impl Recorded {
    pub(crate) fn call(op: Operation, arg: Option<&str>) -> Self {
        Self::Call(op, arg.map(str::to_string))
    }
}

/// Answers requests from a script, defaulting to `200 {}` once it runs out.
#[derive(Default)]
pub(crate) struct MockTransport {
    script: Mutex<VecDeque<Result<RemoteResponse, CallError>>>,
    recorded: Mutex<Vec<Recorded>>,
    cancel_seen: Mutex<Vec<bool>>,
    stall: bool,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A transport that records each call and then never answers.
    pub(crate) fn stalled() -> Self {
        Self {
            stall: true,
            ..Self::default()
        }
    }

    pub(crate) fn push(&self, outcome: Result<RemoteResponse, CallError>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub(crate) fn push_ok(&self, status: u16, body: &str) {
        self.push(Ok(RemoteResponse::new(status, body)));
    }

    pub(crate) fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    /// Whether each request carried a cancellation token, in order.
    pub(crate) fn cancel_seen(&self) -> Vec<bool> {
        self.cancel_seen.lock().unwrap().clone()
    }

    fn next(&self) -> Result<RemoteResponse, CallError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RemoteResponse::new(200, "{}")))
    }
}

impl RemoteTransport for MockTransport {
    fn call<'a>(
        &'a self,
        call: &'a RemoteCall,
        cancel: Option<&'a CancellationToken>,
    ) -> BoxFuture<'a, Result<RemoteResponse, CallError>> {
        Box::pin(async move {
            self.recorded
                .lock()
                .unwrap()
                .push(Recorded::Call(call.operation, call.argument.clone()));
            self.cancel_seen.lock().unwrap().push(cancel.is_some());
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(CallError::Cancelled);
            }
            if self.stall {
                std::future::pending::<()>().await;
            }
            self.next()
        })
    }

    fn send_multipart<'a>(
        &'a self,
        mut upload: MultipartUpload,
        cancel: Option<&'a CancellationToken>,
    ) -> BoxFuture<'a, Result<RemoteResponse, CallError>> {
        Box::pin(async move {
            self.cancel_seen.lock().unwrap().push(cancel.is_some());
            let mut bytes = 0;
            while let Some(chunk) = upload.body.next().await {
                if cancel.is_some_and(CancellationToken::is_cancelled) {
                    return Err(CallError::Cancelled);
                }
                bytes += chunk.map_err(sqlbridge_transport::TransportError::from)?.len();
            }
            let blob_id = upload
                .fields
                .iter()
                .find(|(name, _)| name == "blob_id")
                .map(|(_, value)| value.clone())
                .unwrap_or_default();
            self.recorded
                .lock()
                .unwrap()
                .push(Recorded::Upload { blob_id, bytes });
            self.next()
        })
    }
}
