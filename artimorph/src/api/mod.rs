//! Remote image-to-model API access.
//!
//! Two layers:
//! - [`HttpTransport`] moves bytes (real implementation: [`ReqwestTransport`]).
//! - [`ApiClient`] knows the endpoint layout and attaches the bearer token.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use artimorph::api::{ApiClient, ReqwestTransport};
//!
//! let transport = Arc::new(ReqwestTransport::new()?);
//! let api = ApiClient::new(transport, "https://api.tripo3d.ai/v2/openapi", "sk-...");
//! println!("{}", api.task_status_url("task_123"));
//! ```

pub mod envelope;
mod http;

use std::fmt;
use std::sync::Arc;

pub use envelope::EnvelopeError;
pub use http::{
    BoxFuture, FilePart, HttpResponse, HttpTransport, ReqwestTransport, TransportError,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};

#[cfg(test)]
pub use http::tests::{MockTransport, Recorded};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.tripo3d.ai/v2/openapi";

/// Endpoint-aware handle on the remote API.
///
/// Cheap to clone; the transport is shared.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            transport,
            base_url,
            api_key: api_key.into(),
        }
    }

    pub fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn upload_url(&self) -> String {
        format!("{}/upload/sts", self.base_url)
    }

    pub fn task_url(&self) -> String {
        format!("{}/task", self.base_url)
    }

    pub fn task_status_url(&self, task_id: &str) -> String {
        format!("{}/task/{}", self.base_url, task_id)
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
