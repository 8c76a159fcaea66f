//! BLOB upload streamer.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use sqlbridge_protocol::constants::{BLOB_FILE_FIELD, BLOB_ID_FIELD, DEFAULT_UPLOAD_CHUNK_SIZE};
use sqlbridge_transport::{CallError, MultipartUpload, RemoteResponse, RemoteTransport};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::BLOB_MIME_TYPE;
use crate::progress::{ObserverSet, PercentTracker, ProgressIndicator, ProgressObserver};
use crate::source::{BoxedReader, ProgressStream, ReleaseGuard, SourceSlot};

/// Whether an upload reacts to its cancellation token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CancelPolicy {
    /// A fired token aborts the in-flight request with [`CallError::Cancelled`].
    #[default]
    Honor,
    /// The token is ignored; the upload runs to completion or failure.
    Ignore,
}

/// One BLOB upload: identifier, source and advisory total length.
///
/// A `total_len` of zero or less means the length is unknown.
pub struct UploadJob {
    pub blob_id: String,
    pub total_len: i64,
    reader: BoxedReader,
}

impl UploadJob {
    pub fn new<R>(blob_id: impl Into<String>, reader: R, total_len: i64) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            blob_id: blob_id.into(),
            total_len,
            reader: Box::new(reader),
        }
    }

    /// Opens `path` and uses its size as the total length.
    pub async fn from_file(blob_id: impl Into<String>, path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(Self::new(blob_id, file, i64::try_from(len).unwrap_or(0)))
    }
}

impl fmt::Debug for UploadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadJob")
            .field("blob_id", &self.blob_id)
            .field("total_len", &self.total_len)
            .finish_non_exhaustive()
    }
}

/// Sends upload jobs through a [`RemoteTransport`].
pub struct UploadStreamer {
    transport: Arc<dyn RemoteTransport>,
    chunk_size: usize,
    observers: Vec<Arc<dyn ProgressObserver>>,
}

impl UploadStreamer {
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            transport,
            chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            observers: Vec::new(),
        }
    }

    /// Sets the read size per chunk. `0` restores the default.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = if chunk_size == 0 {
            DEFAULT_UPLOAD_CHUNK_SIZE
        } else {
            chunk_size
        };
        self
    }

    /// Registers an observer that receives every raw chunk callback.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Uploads `job` and returns the raw response.
    ///
    /// The source is released before this returns, on every path. The
    /// indicator is set to 100 only when the response carries no fault; on
    /// any failure it keeps the last value reached.
    pub async fn upload(
        &self,
        job: UploadJob,
        progress: Option<Arc<ProgressIndicator>>,
        cancel: &CancellationToken,
        policy: CancelPolicy,
    ) -> Result<RemoteResponse, CallError> {
        let UploadJob {
            blob_id,
            total_len,
            reader,
        } = job;

        let slot = SourceSlot::new(reader);
        let _guard = ReleaseGuard(slot.clone());

        let tracker = progress.map(|indicator| Arc::new(PercentTracker::new(indicator, total_len)));
        let mut observers = Vec::with_capacity(self.observers.len() + 1);
        if let Some(tracker) = &tracker {
            observers.push(Arc::clone(tracker) as Arc<dyn ProgressObserver>);
        }
        observers.extend(self.observers.iter().cloned());

        let body = ProgressStream::new(
            slot.clone(),
            self.chunk_size,
            total_len,
            Arc::new(ObserverSet(observers)),
        );
        let upload = MultipartUpload {
            fields: vec![(BLOB_ID_FIELD.to_string(), blob_id.clone())],
            file_field: BLOB_FILE_FIELD.to_string(),
            file_name: blob_id.clone(),
            mime_type: BLOB_MIME_TYPE.to_string(),
            body: Box::pin(body),
        };

        let cancel = match policy {
            CancelPolicy::Honor => Some(cancel),
            CancelPolicy::Ignore => None,
        };

        info!(blob_id = %blob_id, total_len, ?policy, "blob upload started");
        let result = self.transport.send_multipart(upload, cancel).await;

        if slot.release() {
            debug!(blob_id = %blob_id, "upload source released");
        }

        match &result {
            Ok(resp) if resp.is_success() => {
                if let Some(tracker) = &tracker {
                    tracker.finish();
                }
                info!(blob_id = %blob_id, status = resp.status(), "blob upload completed");
            }
            Ok(resp) => {
                warn!(blob_id = %blob_id, status = resp.status(), "blob upload rejected by server");
            }
            Err(CallError::Cancelled) => info!(blob_id = %blob_id, "blob upload cancelled"),
            Err(e) => warn!(blob_id = %blob_id, error = %e, "blob upload failed"),
        }

        result
    }
}
