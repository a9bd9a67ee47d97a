//! Client for the Otter.ai web API and the object store it delegates uploads to.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::http::{HttpTransport, DEFAULT_TIMEOUT};
use crate::OtterError;

pub mod auth;
pub mod finalize;
pub mod upload;

pub use auth::Credentials;
pub use finalize::TranscriptRecord;
pub use upload::{AudioFile, UploadPolicy, UploadReceipt};

/// Service root used when no other base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://otter.ai";

pub(crate) const CSRF_COOKIE: &str = "csrftoken";
pub(crate) const SESSION_COOKIE: &str = "sessionid";
pub(crate) const CSRF_HEADER: &str = "X-Csrftoken";

/// Authenticated session identifier, sent as the `sessionid` cookie
#[derive(Clone, PartialEq, Eq)]
pub struct Session(String);

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Session(<redacted>)")
    }
}

/// Otter API client over an injectable transport
#[derive(Clone)]
pub struct OtterClient {
    transport: Arc<dyn HttpTransport>,
    base_url: Url,
    api_timeout: Duration,
}

impl OtterClient {
    /// Create a client rooted at `base_url` (normally [`DEFAULT_BASE_URL`])
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            transport,
            base_url: Url::parse(base_url)?,
            api_timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Timeout the transport applies to Otter API calls; upload budgets build on it
    pub fn with_api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }

    pub(crate) fn api_timeout(&self) -> Duration {
        self.api_timeout
    }

    /// URL of an endpoint under `/forward/api/v1/`
    pub(crate) fn api_url(&self, endpoint: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("forward/api/v1/{}", endpoint));
        url.set_query(None);
        url
    }

    /// Shareable transcript URL for an Otter transcript id
    pub fn transcript_url(&self, otid: &str) -> String {
        format!("{}/u/{}", self.base_url.as_str().trim_end_matches('/'), otid)
    }

    pub(crate) fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }
}

/// Reject envelopes whose `status` is present and not "ok"
pub(crate) fn ensure_ok_status(status: Option<&str>, body: &str) -> Result<(), OtterError> {
    match status {
        Some(status) if !status.eq_ignore_ascii_case("ok") => Err(OtterError::protocol(
            format!("service reported status \"{}\"", status),
            body,
        )),
        _ => Ok(()),
    }
}
