//! HTTP transport abstraction for testability.
//!
//! The conversion stages never talk to `reqwest` directly. They go through
//! [`HttpTransport`], which lets tests script server responses without a
//! network and lets the CLI swap in a client with custom timeouts.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Default timeout for API requests in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default overall budget for a model download in seconds.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors raised below the API envelope layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The host could not be reached (DNS, refused connection, no route).
    #[error("network unreachable: {0}")]
    Offline(String),

    /// The request did not complete within the client timeout.
    #[error("request timed out: {0}")]
    TimedOut(String),

    /// A download returned a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// Writing the downloaded body failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller's cancellation token fired mid-transfer.
    #[error("transfer cancelled")]
    Cancelled,

    /// Any other client-side failure.
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            TransportError::Offline(e.to_string())
        } else if e.is_timeout() {
            TransportError::TimedOut(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Status and body of a completed API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text for error reporting.
    pub fn body_text(&self) -> String {
        if self.body.is_empty() {
            "(empty body)".to_string()
        } else {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }
}

/// A single file part for a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Form field name.
    pub field: &'static str,
    /// File name reported to the server.
    pub file_name: String,
    /// MIME type of the payload.
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// Trait for the HTTP operations the conversion pipeline needs.
///
/// Request methods return the raw status and body; interpreting non-2xx
/// statuses is left to the caller so each stage can attach its own error
/// kind. `download` is different: it streams straight to disk and reports
/// a non-2xx status as [`TransportError::Status`].
pub trait HttpTransport: Send + Sync {
    /// POST a multipart form with one file part.
    fn post_multipart<'a>(
        &'a self,
        url: &'a str,
        bearer: &'a str,
        part: FilePart,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>>;

    /// POST a JSON body.
    fn post_json<'a>(
        &'a self,
        url: &'a str,
        bearer: &'a str,
        body: serde_json::Value,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>>;

    /// GET a resource.
    fn get<'a>(
        &'a self,
        url: &'a str,
        bearer: &'a str,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>>;

    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// The token is checked between chunks.
    fn download<'a>(
        &'a self,
        url: &'a str,
        dest: &'a Path,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<u64, TransportError>>;
}

/// Real transport implementation using async reqwest.
///
/// API calls and downloads use separate clients. The API client applies
/// `timeout` to the whole request. The download client applies it only to
/// connecting and to the gap between body reads, so a slow but steady
/// transfer runs until the larger download budget.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    download_client: Client,
    timeout: Duration,
    download_timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport with the default request timeout.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    /// Creates a transport with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        Self::with_timeouts(timeout, Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS))
    }

    /// Creates a transport with custom request and download budgets.
    ///
    /// The download budget is never shorter than the request timeout.
    pub fn with_timeouts(
        timeout: Duration,
        download_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let download_timeout = download_timeout.max(timeout);

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to create HTTP client: {}", e)))?;

        let download_client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .timeout(download_timeout)
            .build()
            .map_err(|e| {
                TransportError::Other(format!("failed to create download client: {}", e))
            })?;

        Ok(Self {
            client,
            download_client,
            timeout,
            download_timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn download_timeout(&self) -> Duration {
        self.download_timeout
    }

    async fn collect(response: reqwest::Response) -> Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        trace!(status, bytes = body.len(), "Response received");
        Ok(HttpResponse::new(status, body.to_vec()))
    }

    async fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, TransportError> {
        let response = self.download_client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let file = tokio::fs::File::create(dest).await?;
        let mut writer = tokio::io::BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                return Err(TransportError::Cancelled);
            }
            let chunk = chunk?;
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        writer.flush().await?;
        debug!(url, bytes = written, dest = %dest.display(), "Download streamed");
        Ok(written)
    }
}

impl HttpTransport for ReqwestTransport {
    fn post_multipart<'a>(
        &'a self,
        url: &'a str,
        bearer: &'a str,
        part: FilePart,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            let field = part.field;
            let file_part = Part::bytes(part.bytes)
                .file_name(part.file_name)
                .mime_str(part.mime)
                .map_err(|e| TransportError::Other(format!("invalid MIME type: {}", e)))?;
            let form = Form::new().part(field, file_part);

            let response = self
                .client
                .post(url)
                .bearer_auth(bearer)
                .multipart(form)
                .send()
                .await?;
            Self::collect(response).await
        })
    }

    fn post_json<'a>(
        &'a self,
        url: &'a str,
        bearer: &'a str,
        body: serde_json::Value,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(url)
                .bearer_auth(bearer)
                .json(&body)
                .send()
                .await?;
            Self::collect(response).await
        })
    }

    fn get<'a>(
        &'a self,
        url: &'a str,
        bearer: &'a str,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            let response = self.client.get(url).bearer_auth(bearer).send().await?;
            Self::collect(response).await
        })
    }

    fn download<'a>(
        &'a self,
        url: &'a str,
        dest: &'a Path,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<u64, TransportError>> {
        Box::pin(self.stream_to_file(url, dest, cancel))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A request observed by [`MockTransport`].
    #[derive(Debug, Clone, PartialEq)]
    pub enum Recorded {
        Multipart { url: String, file_name: String },
        Json { url: String, body: serde_json::Value },
        Get { url: String },
        Download { url: String },
    }

    /// Scripted transport for testing.
    ///
    /// API calls pop responses from `responses` in order; downloads pop from
    /// `downloads` and write the scripted bytes to the destination.
    #[derive(Default)]
    pub struct MockTransport {
        pub responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        pub downloads: Mutex<VecDeque<Result<Vec<u8>, TransportError>>>,
        pub recorded: Mutex<Vec<Recorded>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(self, status: u16, body: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(HttpResponse::new(status, body.as_bytes().to_vec())));
            self
        }

        pub fn fail(self, error: TransportError) -> Self {
            self.responses.lock().unwrap().push_back(Err(error));
            self
        }

        pub fn serve_download(self, bytes: &[u8]) -> Self {
            self.downloads.lock().unwrap().push_back(Ok(bytes.to_vec()));
            self
        }

        pub fn fail_download(self, error: TransportError) -> Self {
            self.downloads.lock().unwrap().push_back(Err(error));
            self
        }

        pub fn recorded(&self) -> Vec<Recorded> {
            self.recorded.lock().unwrap().clone()
        }

        fn next_response(&self) -> Result<HttpResponse, TransportError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("no scripted response".into())))
        }
    }

    impl HttpTransport for MockTransport {
        fn post_multipart<'a>(
            &'a self,
            url: &'a str,
            _bearer: &'a str,
            part: FilePart,
        ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
            self.recorded.lock().unwrap().push(Recorded::Multipart {
                url: url.to_string(),
                file_name: part.file_name,
            });
            let response = self.next_response();
            Box::pin(async move { response })
        }

        fn post_json<'a>(
            &'a self,
            url: &'a str,
            _bearer: &'a str,
            body: serde_json::Value,
        ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
            self.recorded.lock().unwrap().push(Recorded::Json {
                url: url.to_string(),
                body,
            });
            let response = self.next_response();
            Box::pin(async move { response })
        }

        fn get<'a>(
            &'a self,
            url: &'a str,
            _bearer: &'a str,
        ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
            self.recorded.lock().unwrap().push(Recorded::Get {
                url: url.to_string(),
            });
            let response = self.next_response();
            Box::pin(async move { response })
        }

        fn download<'a>(
            &'a self,
            url: &'a str,
            dest: &'a Path,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<u64, TransportError>> {
            self.recorded.lock().unwrap().push(Recorded::Download {
                url: url.to_string(),
            });
            let scripted = self
                .downloads
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("no scripted download".into())));
            Box::pin(async move {
                let bytes = scripted?;
                tokio::fs::write(dest, &bytes).await?;
                Ok(bytes.len() as u64)
            })
        }
    }

    #[test]
    fn test_http_response_success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
        assert!(!HttpResponse::new(500, "").is_success());
    }

    #[test]
    fn test_http_response_body_text() {
        assert_eq!(HttpResponse::new(500, "").body_text(), "(empty body)");
        assert_eq!(HttpResponse::new(500, "boom").body_text(), "boom");
    }

    #[test]
    fn test_reqwest_transport_timeouts() {
        let transport = ReqwestTransport::new().unwrap();
        assert_eq!(transport.timeout().as_secs(), DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(
            transport.download_timeout().as_secs(),
            DEFAULT_DOWNLOAD_TIMEOUT_SECS
        );

        let transport = ReqwestTransport::with_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(transport.timeout().as_secs(), 5);
        assert_eq!(
            transport.download_timeout().as_secs(),
            DEFAULT_DOWNLOAD_TIMEOUT_SECS
        );

        let transport =
            ReqwestTransport::with_timeouts(Duration::from_secs(90), Duration::from_secs(30))
                .unwrap();
        assert_eq!(transport.download_timeout().as_secs(), 90);
    }

    /// Serves one HTTP response on a local port, sending the body one byte
    /// at a time with `gap` between bytes. Returns the download URL.
    async fn trickle_server(body: &'static [u8], gap: Duration) -> String {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;

            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: model/gltf-binary\r\nContent-Length: {}\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            for byte in body {
                tokio::time::sleep(gap).await;
                if socket.write_all(&[*byte]).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
            }
        });

        format!("http://{}/model.glb", addr)
    }

    #[tokio::test]
    async fn test_slow_download_outlasts_request_timeout() {
        let url = trickle_server(b"glTF", Duration::from_millis(600)).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("model.glb");

        // 4 bytes at 600ms each take longer than the 1s request timeout.
        let transport = ReqwestTransport::with_timeout(Duration::from_secs(1)).unwrap();
        let written = transport
            .download(&url, &dest, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(written, 4);
        assert_eq!(std::fs::read(&dest).unwrap(), b"glTF");
    }

    #[tokio::test]
    async fn test_stalled_download_times_out() {
        let url = trickle_server(b"glTF", Duration::from_secs(5)).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("model.glb");

        let transport = ReqwestTransport::with_timeout(Duration::from_millis(500)).unwrap();
        let result = transport
            .download(&url, &dest, &CancellationToken::new())
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_refused_connection_is_offline() {
        let transport = ReqwestTransport::with_timeout(Duration::from_secs(5)).unwrap();
        let result = transport.get("http://127.0.0.1:1/task/x", "key").await;
        assert!(matches!(result, Err(TransportError::Offline(_))));
    }

    #[tokio::test]
    async fn test_mock_transport_replays_in_order() {
        let mock = MockTransport::new().respond(200, "first").respond(500, "second");

        let first = mock.get("http://a", "k").await.unwrap();
        let second = mock.get("http://b", "k").await.unwrap();
        assert_eq!(first.body, b"first");
        assert_eq!(second.status, 500);
        assert!(mock.get("http://c", "k").await.is_err());
        assert_eq!(mock.recorded().len(), 3);
    }
}
