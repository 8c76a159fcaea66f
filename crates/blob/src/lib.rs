//! Streaming BLOB upload with progress tracking.
//!
//! An [`UploadJob`] pairs a blob identifier with a readable source. The
//! [`UploadStreamer`] sends it as a two-part multipart body (`blob_id` text
//! field and a `file` part named after the blob), feeds per-chunk progress
//! into an optional shared [`ProgressIndicator`], and releases the source
//! on every exit path.

mod progress;
mod source;
mod streamer;

pub use progress::{PercentTracker, ProgressIndicator, ProgressObserver};
pub use streamer::{CancelPolicy, UploadJob, UploadStreamer};

/// MIME type of the streamed file part.
pub const BLOB_MIME_TYPE: &str = "application/octet-stream";
