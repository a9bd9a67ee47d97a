use serde::{de, Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

use super::{ensure_ok_status, OtterClient, Session, SESSION_COOKIE};
use crate::http::{FilePart, FileReader, HttpRequest, MultipartForm};
use crate::OtterError;

/// Signed S3 POST policy handed out by `speech_upload_params`.
///
/// Values are kept byte-for-byte as received: the signature covers them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadPolicy {
    #[serde(rename = "x-amz-algorithm")]
    pub algorithm: String,
    #[serde(rename = "x-amz-signature")]
    pub signature: String,
    /// Object store endpoint the form is POSTed to
    pub form_action: String,
    pub key: String,
    #[serde(rename = "x-amz-date")]
    pub date: String,
    pub policy: String,
    #[serde(rename = "x-amz-credential")]
    pub credential: String,
    #[serde(deserialize_with = "status_code_string")]
    pub success_action_status: String,
    pub acl: String,
}

impl UploadPolicy {
    /// Form fields in the order the object store receives them
    pub fn form_fields(&self) -> [(&'static str, &str); 8] {
        [
            ("x-amz-algorithm", self.algorithm.as_str()),
            ("x-amz-signature", self.signature.as_str()),
            ("key", self.key.as_str()),
            ("x-amz-date", self.date.as_str()),
            ("policy", self.policy.as_str()),
            ("success_action_status", self.success_action_status.as_str()),
            ("x-amz-credential", self.credential.as_str()),
            ("acl", self.acl.as_str()),
        ]
    }
}

// success_action_status arrives as a JSON number; the form needs "201", not "201.0".
fn status_code_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => {
            if let Some(code) = n.as_u64() {
                Ok(code.to_string())
            } else if let Some(code) = n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0) {
                Ok(format!("{}", code as u64))
            } else {
                Ok(n.to_string())
            }
        }
        other => Err(de::Error::custom(format!(
            "expected a number or string for success_action_status, got {}",
            other
        ))),
    }
}

#[derive(Deserialize)]
struct UploadParamsEnvelope {
    status: Option<String>,
    data: Option<serde_json::Value>,
}

/// Acknowledgement returned by the object store after a successful POST
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename = "PostResponse")]
pub struct UploadReceipt {
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Bucket")]
    pub bucket: String,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "ETag")]
    pub etag: String,
}

// Slowest uplink an upload is expected to survive, in bytes per second.
const MIN_UPLOAD_RATE: u64 = 32 * 1024;

// Used when the file size is unknown.
const UNSIZED_UPLOAD_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);

/// Deadline for the object store POST: the API timeout plus the time to send the file
pub(crate) fn upload_timeout(api_timeout: Duration, length: Option<u64>) -> Duration {
    match length {
        Some(bytes) => api_timeout + Duration::from_secs(bytes / MIN_UPLOAD_RATE),
        None => UNSIZED_UPLOAD_TIMEOUT.max(api_timeout),
    }
}

/// Named audio byte stream to upload
pub struct AudioFile {
    name: String,
    length: Option<u64>,
    reader: FileReader,
}

impl AudioFile {
    /// Open a file on disk; the upload uses its file name and size
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Ok(Self {
            name,
            length: Some(length),
            reader: Box::new(file),
        })
    }

    pub fn from_reader(name: impl Into<String>, reader: FileReader, length: Option<u64>) -> Self {
        Self {
            name: name.into(),
            length,
            reader,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }
}

/// Build the object store form: policy fields first, file last
pub(crate) fn build_upload_form(file: AudioFile, policy: &UploadPolicy) -> MultipartForm {
    let form = policy
        .form_fields()
        .into_iter()
        .fold(MultipartForm::new(), |form, (name, value)| form.text(name, value));

    form.file(FilePart {
        field_name: "file".to_string(),
        file_name: file.name,
        length: file.length,
        reader: file.reader,
    })
}

pub(crate) fn parse_upload_params(body: &str) -> Result<UploadPolicy, OtterError> {
    let envelope: UploadParamsEnvelope = serde_json::from_str(body)
        .map_err(|e| OtterError::parse(format!("invalid upload params JSON: {}", e), body))?;

    ensure_ok_status(envelope.status.as_deref(), body)?;

    let data = envelope
        .data
        .ok_or_else(|| OtterError::parse("upload params response has no data", body))?;

    serde_json::from_value(data)
        .map_err(|e| OtterError::parse(format!("incomplete upload policy: {}", e), body))
}

pub(crate) fn parse_upload_receipt(body: &str) -> Result<UploadReceipt, OtterError> {
    quick_xml::de::from_str(body)
        .map_err(|e| OtterError::parse(format!("invalid object store XML: {}", e), body))
}

impl OtterClient {
    /// Request a one-time signed upload policy for the session
    pub async fn get_upload_params(&self, session: &Session) -> Result<UploadPolicy, OtterError> {
        let request = HttpRequest::get(self.api_url("speech_upload_params"))
            .cookie(SESSION_COOKIE, session.as_str());

        let response = self.transport().execute(request).await?;
        let policy = parse_upload_params(&response.text())?;

        tracing::debug!("Received upload policy for key {}", policy.key);
        Ok(policy)
    }

    /// POST the file straight to the object store using the signed policy.
    ///
    /// The policy is consumed: it authorizes exactly one upload.
    pub async fn upload(&self, file: AudioFile, policy: UploadPolicy) -> Result<UploadReceipt, OtterError> {
        tracing::info!("Uploading {} to object store", file.name());

        let timeout = upload_timeout(self.api_timeout(), file.length());
        let form = build_upload_form(file, &policy);
        let request = HttpRequest::post(policy.form_action)
            .multipart(form)
            .timeout(timeout);
        let response = self.transport().execute(request).await?;

        if !response.is_success() {
            return Err(OtterError::Upload {
                status: response.status.as_u16(),
                body: response.text(),
            });
        }

        let receipt = parse_upload_receipt(&response.text())?;
        tracing::debug!("Object stored as {}/{}", receipt.bucket, receipt.key);
        Ok(receipt)
    }
}
