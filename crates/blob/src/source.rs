//! Upload source ownership and the progress-reporting body stream.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tokio::io::{AsyncRead, ReadBuf};

use crate::progress::ProgressObserver;

pub(crate) type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Holds the upload source until it is released.
///
/// The body stream reads through the slot; the streamer releases it when
/// the upload returns. Releasing drops the reader, and a released slot
/// reads as end-of-stream.
#[derive(Clone)]
pub(crate) struct SourceSlot {
    inner: Arc<Mutex<Option<BoxedReader>>>,
}

impl SourceSlot {
    pub(crate) fn new(reader: BoxedReader) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(reader))),
        }
    }

    /// Drops the reader. Returns `true` on the call that actually dropped it.
    pub(crate) fn release(&self) -> bool {
        let reader = self.lock().take();
        reader.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<BoxedReader>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the slot when dropped, so the source is closed even when the
/// upload future is abandoned.
pub(crate) struct ReleaseGuard(pub(crate) SourceSlot);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Reads the source in fixed-size chunks and reports each one.
pub(crate) struct ProgressStream {
    slot: SourceSlot,
    scratch: Vec<u8>,
    total_len: i64,
    transferred: u64,
    observer: Arc<dyn ProgressObserver>,
}

impl ProgressStream {
    pub(crate) fn new(
        slot: SourceSlot,
        chunk_size: usize,
        total_len: i64,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            slot,
            scratch: vec![0u8; chunk_size.max(1)],
            total_len,
            transferred: 0,
            observer,
        }
    }

    fn percent(&self) -> Option<u8> {
        if self.total_len <= 0 {
            return None;
        }
        let pct = self.transferred.saturating_mul(100) / self.total_len as u64;
        Some(pct.min(100) as u8)
    }
}

impl Stream for ProgressStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let chunk = {
            let mut guard = this.slot.lock();
            let Some(reader) = guard.as_mut() else {
                return Poll::Ready(None);
            };

            let mut buf = ReadBuf::new(&mut this.scratch);
            match Pin::new(reader).poll_read(cx, &mut buf) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(Ok(())) => {
                    if buf.filled().is_empty() {
                        return Poll::Ready(None);
                    }
                    Bytes::copy_from_slice(buf.filled())
                }
            }
        };

        let n = chunk.len() as u64;
        this.transferred += n;
        let percent = this.percent();
        this.observer.on_progress(n, percent);

        Poll::Ready(Some(Ok(chunk)))
    }
}
