use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::otter::{AudioFile, Credentials, OtterClient, Session, TranscriptRecord};
use crate::OtterError;

/// Transcription result handed to the output layer
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionResult {
    /// Shareable transcript URL
    pub transcript_url: String,

    /// Record returned by the finalize call
    pub record: TranscriptRecord,
}

/// Pipeline stage, used to annotate errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Login,
    UploadParameters,
    ObjectStoreUpload,
    Finalize,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStep::Login => write!(f, "login"),
            PipelineStep::UploadParameters => write!(f, "upload parameters"),
            PipelineStep::ObjectStoreUpload => write!(f, "object store upload"),
            PipelineStep::Finalize => write!(f, "finalize"),
        }
    }
}

/// First error hit by the pipeline, tagged with the step that produced it
#[derive(thiserror::Error, Debug)]
#[error("{step} failed")]
pub struct PipelineError {
    pub step: PipelineStep,
    #[source]
    pub source: OtterError,
}

impl PipelineError {
    pub fn kind(&self) -> &OtterError {
        &self.source
    }
}

trait StepContext<T> {
    fn step(self, step: PipelineStep) -> Result<T, PipelineError>;
}

impl<T> StepContext<T> for Result<T, OtterError> {
    fn step(self, step: PipelineStep) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError { step, source })
    }
}

/// Login → upload params → object store upload → finalize
pub struct TranscriptionPipeline {
    client: OtterClient,
    show_progress: bool,
}

impl TranscriptionPipeline {
    /// Create a new transcription pipeline
    pub fn new(client: OtterClient) -> Self {
        Self {
            client,
            show_progress: true,
        }
    }

    /// Enable or disable progress spinners
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run the whole pipeline for one file
    pub async fn transcribe_file(
        &self,
        credentials: Credentials,
        file: AudioFile,
    ) -> Result<TranscriptionResult, PipelineError> {
        let session = self.login(credentials).await?;
        self.upload_speech(&session, file).await
    }

    /// Log in and return the session
    pub async fn login(&self, credentials: Credentials) -> Result<Session, PipelineError> {
        let progress = self.spinner("Logging in to Otter...");
        let session = self.client.login(credentials).await.step(PipelineStep::Login);
        progress.finish_and_clear();
        session
    }

    /// Upload a file for an existing session and finalize it into a transcript
    pub async fn upload_speech(
        &self,
        session: &Session,
        file: AudioFile,
    ) -> Result<TranscriptionResult, PipelineError> {
        let progress = self.spinner("Requesting upload parameters...");

        let result = async {
            let policy = self
                .client
                .get_upload_params(session)
                .await
                .step(PipelineStep::UploadParameters)?;

            progress.set_message(format!("Uploading {}...", file.name()));
            let receipt = self
                .client
                .upload(file, policy)
                .await
                .step(PipelineStep::ObjectStoreUpload)?;

            progress.set_message("Finalizing upload...");
            let record = self
                .client
                .notify(session, &receipt)
                .await
                .step(PipelineStep::Finalize)?;

            Ok::<_, PipelineError>(TranscriptionResult {
                transcript_url: self.client.transcript_url(&record.otid),
                record,
            })
        }
        .await;

        match &result {
            Ok(_) => progress.finish_with_message("Upload complete"),
            Err(_) => progress.abandon(),
        }

        result
    }

    fn spinner(&self, message: &'static str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            progress.set_style(style);
        }
        progress.set_message(message);
        progress.enable_steady_tick(Duration::from_millis(100));
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::ScriptedTransport;
    use crate::http::HttpResponse;
    use reqwest::StatusCode;
    use std::sync::Arc;

    const PARAMS_BODY: &str = r#"{"status":"ok","data":{
        "x-amz-algorithm":"AWS4-HMAC-SHA256","x-amz-signature":"sig",
        "form_action":"https://s3.example.com/bucket","key":"speech/k1",
        "x-amz-date":"20240102T030405Z","policy":"cG9saWN5",
        "x-amz-credential":"AKIA/20240102/us-west-2/s3/aws4_request",
        "success_action_status":201,"acl":"private"}}"#;

    const RECEIPT_XML: &str = "<PostResponse><Location>https://s3.example.com/bucket/speech%2Fk1</Location>\
        <Bucket>bucket</Bucket><Key>speech/k1</Key><ETag>\"e1\"</ETag></PostResponse>";

    fn pipeline(transport: Arc<ScriptedTransport>) -> TranscriptionPipeline {
        let client = OtterClient::new(transport, "https://otter.ai").unwrap();
        TranscriptionPipeline::new(client).with_progress(false)
    }

    fn audio() -> AudioFile {
        AudioFile::from_reader("a.mp3", Box::new(std::io::Cursor::new(b"audio".to_vec())), Some(5))
    }

    fn happy_path(otid: &str) -> ScriptedTransport {
        ScriptedTransport::new()
            .respond(HttpResponse::ok().with_cookie("csrftoken", "abc123"))
            .respond(HttpResponse::ok().with_cookie("sessionid", "sess456"))
            .respond(HttpResponse::ok().with_body(PARAMS_BODY))
            .respond(HttpResponse::new(StatusCode::CREATED).with_body(RECEIPT_XML))
            .respond(HttpResponse::ok().with_cookie("csrftoken", "def789"))
            .respond(HttpResponse::ok().with_body(format!(r#"{{"status":"ok","otid":"{}"}}"#, otid)))
    }

    #[tokio::test]
    async fn test_transcribe_file_builds_transcript_url() {
        let transport = Arc::new(happy_path("xyz"));
        let result = pipeline(transport.clone())
            .transcribe_file(Credentials::new("alice", "secret"), audio())
            .await
            .unwrap();

        assert_eq!(result.transcript_url, "https://otter.ai/u/xyz");
        assert_eq!(result.record.otid, "xyz");

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            [
                "https://otter.ai/forward/api/v1/login_csrf",
                "https://otter.ai/forward/api/v1/login?username=alice",
                "https://otter.ai/forward/api/v1/speech_upload_params",
                "https://s3.example.com/bucket",
                "https://otter.ai/forward/api/v1/login_csrf",
                "https://otter.ai/forward/api/v1/finish_speech_upload?bucket=bucket&key=speech%2Fk1&language=en&country=US&userid=821301",
            ]
        );
    }

    #[tokio::test]
    async fn test_session_attached_to_authenticated_calls() {
        let transport = Arc::new(happy_path("q1"));
        pipeline(transport.clone())
            .transcribe_file(Credentials::new("alice", "secret"), audio())
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests[2].cookie("sessionid"), Some("sess456"));
        assert_eq!(requests[5].cookie("sessionid"), Some("sess456"));
        // Each CSRF-protected call uses the token fetched for it.
        assert_eq!(requests[1].cookie("csrftoken"), Some("abc123"));
        assert_eq!(requests[5].cookie("csrftoken"), Some("def789"));
        // The object store never sees Otter cookies.
        assert!(requests[3].cookies.is_empty());
    }

    #[tokio::test]
    async fn test_login_failure_stops_pipeline() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(HttpResponse::ok().with_cookie("csrftoken", "abc123"))
                .respond(HttpResponse::new(StatusCode::UNAUTHORIZED)),
        );
        let err = pipeline(transport.clone())
            .transcribe_file(Credentials::new("alice", "wrong"), audio())
            .await
            .unwrap_err();

        assert_eq!(err.step, PipelineStep::Login);
        assert!(matches!(err.kind(), OtterError::Authentication { .. }));
        assert_eq!(err.to_string(), "login failed");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_failure_is_tagged_and_skips_finalize() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(HttpResponse::ok().with_body(PARAMS_BODY))
                .respond(HttpResponse::new(StatusCode::FORBIDDEN).with_body("denied")),
        );
        let err = pipeline(transport.clone())
            .upload_speech(&Session::new("sess456"), audio())
            .await
            .unwrap_err();

        assert_eq!(err.step, PipelineStep::ObjectStoreUpload);
        assert!(matches!(err.kind(), OtterError::Upload { status: 403, .. }));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_network_error_keeps_its_kind() {
        let transport = Arc::new(
            ScriptedTransport::new().fail(OtterError::Network("dns failure".to_string())),
        );
        let err = pipeline(transport)
            .upload_speech(&Session::new("s"), audio())
            .await
            .unwrap_err();

        assert_eq!(err.step, PipelineStep::UploadParameters);
        assert!(matches!(err.kind(), OtterError::Network(_)));
    }

    #[tokio::test]
    async fn test_finalize_failure_is_tagged() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(HttpResponse::ok().with_body(PARAMS_BODY))
                .respond(HttpResponse::new(StatusCode::CREATED).with_body(RECEIPT_XML))
                .respond(HttpResponse::ok().with_cookie("csrftoken", "t"))
                .respond(HttpResponse::ok().with_body(r#"{"status":"ok"}"#)),
        );
        let err = pipeline(transport)
            .upload_speech(&Session::new("s"), audio())
            .await
            .unwrap_err();

        assert_eq!(err.step, PipelineStep::Finalize);
        assert!(matches!(err.kind(), OtterError::Protocol { .. }));
    }
}
