use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method, StatusCode};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::OtterError;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout for establishing a connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Byte source for a file part; read once, front to back
pub type FileReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// File part of a multipart form
pub struct FilePart {
    pub field_name: String,
    pub file_name: String,
    /// Length in bytes if known up front
    pub length: Option<u64>,
    pub reader: FileReader,
}

/// multipart/form-data body that keeps its parts in insertion order
#[derive(Default)]
pub struct MultipartForm {
    fields: Vec<(String, String)>,
    file: Option<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text field
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Set the file part. It is always encoded after every text field.
    pub fn file(mut self, part: FilePart) -> Self {
        self.file = Some(part);
        self
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn file_part(&self) -> Option<&FilePart> {
        self.file.as_ref()
    }

    pub fn into_parts(self) -> (Vec<(String, String)>, Option<FilePart>) {
        (self.fields, self.file)
    }
}

/// Request body variants used by the Otter API and the object store
pub enum RequestBody {
    Empty,
    Json(String),
    Multipart(MultipartForm),
}

/// Transport-agnostic HTTP request
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub basic_auth: Option<(String, String)>,
    pub body: RequestBody,
    /// Overrides the transport's default timeout for this request
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            cookies: Vec::new(),
            basic_auth: None,
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((username.into(), password.into()));
        self
    }

    pub fn json_body(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Json(body.into());
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Render outgoing cookies as a single `Cookie` header value
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }

        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

// Cookie values, credentials and form values are secrets; only names are printed.
impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cookie_names: Vec<&str> = self.cookies.iter().map(|(n, _)| n.as_str()).collect();
        let header_names: Vec<&str> = self.headers.iter().map(|(n, _)| n.as_str()).collect();
        let body = match &self.body {
            RequestBody::Empty => "empty",
            RequestBody::Json(_) => "json",
            RequestBody::Multipart(_) => "multipart",
        };

        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &header_names)
            .field("cookies", &cookie_names)
            .field("basic_auth", &self.basic_auth.as_ref().map(|_| "<redacted>"))
            .field("body", &body)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Transport-agnostic HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// Cookies from `Set-Cookie` headers, in the order received
    pub cookies: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            cookies: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of the first cookie with this name
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as UTF-8, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// The single capability the API client needs from the network
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and wait for the complete response
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, OtterError>;
}

/// `reqwest`-backed transport with explicit timeouts
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport whose requests time out after `timeout` unless they set their own
    pub fn new(timeout: Duration) -> Result<Self, OtterError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, OtterError> {
        tracing::debug!("{} {}", request.method, redact_query(&request.url));

        let cookie_header = request.cookie_header();
        let mut builder = self.client.request(request.method, &request.url);

        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(cookies) = cookie_header {
            builder = builder.header(COOKIE, cookies);
        }
        if let Some((username, password)) = request.basic_auth {
            builder = builder.basic_auth(username, Some(password));
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.header(CONTENT_TYPE, "application/json").body(body),
            RequestBody::Multipart(form) => builder.multipart(into_reqwest_form(form)?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let cookies = response
            .cookies()
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect();
        let body = response.bytes().await?.to_vec();

        tracing::debug!("HTTP {} ({} bytes)", status, body.len());

        Ok(HttpResponse {
            status,
            cookies,
            body,
        })
    }
}

fn into_reqwest_form(form: MultipartForm) -> Result<reqwest::multipart::Form, OtterError> {
    let (fields, file) = form.into_parts();
    let mut out = reqwest::multipart::Form::new();

    for (name, value) in fields {
        out = out.text(name, value);
    }

    if let Some(file) = file {
        let body = reqwest::Body::wrap_stream(read_chunks(file.reader));
        // A known length lets reqwest send Content-Length; S3 rejects chunked POST uploads.
        let part = match file.length {
            Some(length) => reqwest::multipart::Part::stream_with_length(body, length),
            None => reqwest::multipart::Part::stream(body),
        };
        let part = part
            .file_name(file.file_name)
            .mime_str("application/octet-stream")?;
        out = out.part(file.field_name, part);
    }

    Ok(out)
}

/// Stream the reader in fixed-size chunks without buffering the whole file
fn read_chunks(reader: FileReader) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + Sync + 'static {
    stream::try_unfold(reader, |mut reader| async move {
        let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        buf.truncate(read);
        Ok(Some((buf, reader)))
    })
}

/// Strip the query string so usernames and object keys stay out of the logs
fn redact_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
