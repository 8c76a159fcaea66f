//! Transport caller for the sqlbridge driver.
//!
//! Every remote operation is a single stateless `POST` against the
//! configured base URL. This crate owns the HTTP client, applies
//! credentials, proxy and timeout uniformly, and turns responses into
//! either a raw [`RemoteResponse`] or a typed [`CallError`].

pub mod client;
pub mod config;
pub mod error;
pub mod response;

pub use client::{
    BoxFuture, ByteStream, HttpTransport, MultipartUpload, RemoteCall, RemoteTransport,
};
pub use config::{Credentials, ProxyConfig, TransportConfig};
pub use error::{CallError, RemoteFault, TransportError};
pub use response::RemoteResponse;
