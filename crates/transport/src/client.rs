//! HTTP transport caller.
//!
//! Async client built on `reqwest`. One [`HttpTransport`] is created per
//! logical connection; calls and uploads share its client, proxy,
//! credentials and timeout.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use reqwest::multipart::{Form, Part};
use sqlbridge_protocol::{CallArgument, Operation};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{Credentials, TransportConfig};
use crate::error::{CallError, TransportError};
use crate::response::RemoteResponse;

/// Header carrying a per-request UUID for log correlation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Boxed future returned by [`RemoteTransport`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Single-use body stream for uploads.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static>>;

/// A named remote operation with at most one string argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub operation: Operation,
    pub argument: Option<String>,
}

impl RemoteCall {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            argument: None,
        }
    }

    pub fn with_argument(operation: Operation, argument: impl Into<String>) -> Self {
        Self {
            operation,
            argument: Some(argument.into()),
        }
    }
}

/// A multipart request: plain text fields followed by one streamed file part.
pub struct MultipartUpload {
    pub fields: Vec<(String, String)>,
    pub file_field: String,
    pub file_name: String,
    pub mime_type: String,
    pub body: ByteStream,
}

impl fmt::Debug for MultipartUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartUpload")
            .field("fields", &self.fields)
            .field("file_field", &self.file_field)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// Abstract transport to the remote database.
///
/// [`HttpTransport`] is the production implementation. Keeping the session
/// and blob logic behind this trait lets them be tested with mocks.
pub trait RemoteTransport: Send + Sync {
    /// Issues one named operation. Non-2xx responses are returned, not
    /// raised; only transport failures and cancellation are errors here.
    fn call<'a>(
        &'a self,
        call: &'a RemoteCall,
        cancel: Option<&'a CancellationToken>,
    ) -> BoxFuture<'a, Result<RemoteResponse, CallError>>;

    /// Posts a multipart body to the upload endpoint.
    fn send_multipart<'a>(
        &'a self,
        upload: MultipartUpload,
        cancel: Option<&'a CancellationToken>,
    ) -> BoxFuture<'a, Result<RemoteResponse, CallError>>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    http: reqwest::Client,
    config: TransportConfig,
}

impl HttpTransport {
    /// Builds the HTTP client for `config`.
    ///
    /// Without an explicit proxy the client ignores proxy environment
    /// variables; the config is the only source of transport settings.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        config.validate()?;

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        builder = match &config.proxy {
            Some(proxy) => builder.proxy(proxy.to_reqwest()?),
            None => builder.no_proxy(),
        };
        let http = builder.build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Performs `POST <base>/<operation>`.
    pub async fn call_remote(
        &self,
        call: &RemoteCall,
        cancel: Option<&CancellationToken>,
    ) -> Result<RemoteResponse, CallError> {
        let url = self.config.operation_url(call.operation.as_str());
        let request_id = uuid::Uuid::new_v4().to_string();

        let mut req = self.post(&url, &request_id);
        if let Some(argument) = &call.argument {
            req = req.json(&CallArgument::new(argument.clone()));
        }

        debug!(operation = %call.operation, request_id = %request_id, "remote call");
        let result = exchange(req, cancel).await;
        log_outcome(call.operation.as_str(), &request_id, &result);
        result
    }

    /// Performs `POST <base>` with a multipart body.
    pub async fn upload_multipart(
        &self,
        upload: MultipartUpload,
        cancel: Option<&CancellationToken>,
    ) -> Result<RemoteResponse, CallError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        debug!(file = %upload.file_name, request_id = %request_id, "multipart upload");

        let form = build_form(upload)?;
        let req = self.post(self.config.upload_url(), &request_id).multipart(form);

        let result = exchange(req, cancel).await;
        log_outcome("upload", &request_id, &result);
        result
    }

    fn post(&self, url: &str, request_id: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.post(url).header(REQUEST_ID_HEADER, request_id);
        req = match &self.config.credentials {
            Credentials::None => req,
            Credentials::Basic { username, password } => req.basic_auth(username, Some(password)),
            Credentials::Bearer { token } => req.bearer_auth(token),
        };
        if let Some(timeout) = self.config.timeout() {
            req = req.timeout(timeout);
        }
        req
    }
}

impl RemoteTransport for HttpTransport {
    fn call<'a>(
        &'a self,
        call: &'a RemoteCall,
        cancel: Option<&'a CancellationToken>,
    ) -> BoxFuture<'a, Result<RemoteResponse, CallError>> {
        Box::pin(self.call_remote(call, cancel))
    }

    fn send_multipart<'a>(
        &'a self,
        upload: MultipartUpload,
        cancel: Option<&'a CancellationToken>,
    ) -> BoxFuture<'a, Result<RemoteResponse, CallError>> {
        Box::pin(self.upload_multipart(upload, cancel))
    }
}

/// Sends the request and reads the whole body, racing `cancel` if given.
async fn exchange(
    req: reqwest::RequestBuilder,
    cancel: Option<&CancellationToken>,
) -> Result<RemoteResponse, CallError> {
    let exchange = async {
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok::<_, TransportError>(RemoteResponse::new(status, body.to_vec()))
    };

    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(CallError::Cancelled),
            result = exchange => Ok(result?),
        },
        None => Ok(exchange.await?),
    }
}

fn build_form(upload: MultipartUpload) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for (name, value) in upload.fields {
        form = form.text(name, value);
    }
    let part = Part::stream(reqwest::Body::wrap_stream(upload.body))
        .file_name(upload.file_name)
        .mime_str(&upload.mime_type)?;
    Ok(form.part(upload.file_field, part))
}

fn log_outcome(operation: &str, request_id: &str, result: &Result<RemoteResponse, CallError>) {
    match result {
        Ok(resp) => debug!(operation, request_id, status = resp.status(), "response received"),
        Err(CallError::Cancelled) => debug!(operation, request_id, "request cancelled"),
        Err(e) => warn!(operation, request_id, error = %e, "request failed"),
    }
}
