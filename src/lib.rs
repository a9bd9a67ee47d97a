//! Otter Transcribe - A Rust CLI tool for sending audio files to Otter.ai
//!
//! This library implements the upload pipeline used by the `transcribe` binary: CSRF token
//! acquisition, session login, signed upload-policy negotiation, a direct POST to the object
//! store and the finalize call that turns the upload into a transcript.

pub mod cli;
pub mod config;
pub mod http;
pub mod otter;
pub mod output;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, OutputFormat};
pub use config::{Config, CredentialSource};
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use otter::{AudioFile, Credentials, OtterClient, Session, TranscriptRecord, UploadPolicy, UploadReceipt};
pub use transcribe::{PipelineError, PipelineStep, TranscriptionPipeline, TranscriptionResult};

/// Result type used by the application layer
pub type Result<T> = anyhow::Result<T>;

/// Error types produced by the Otter API client
#[derive(thiserror::Error, Debug)]
pub enum OtterError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed (HTTP {status}); check your username and password")]
    Authentication { status: u16 },

    #[error("Unexpected response from service: {message}")]
    Protocol { message: String, body: String },

    #[error("Failed to parse response: {message}")]
    Parse { message: String, body: String },

    #[error("Object store upload failed: HTTP {status}: {body}")]
    Upload { status: u16, body: String },
}

impl OtterError {
    pub(crate) fn protocol(message: impl Into<String>, body: impl Into<String>) -> Self {
        OtterError::Protocol {
            message: message.into(),
            body: body.into(),
        }
    }

    pub(crate) fn parse(message: impl Into<String>, body: impl Into<String>) -> Self {
        OtterError::Parse {
            message: message.into(),
            body: body.into(),
        }
    }

    /// Raw response body attached to the error, if any
    pub fn body(&self) -> Option<&str> {
        match self {
            OtterError::Protocol { body, .. }
            | OtterError::Parse { body, .. }
            | OtterError::Upload { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for OtterError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "request timed out"
        } else if err.is_connect() {
            "connection failed"
        } else {
            "transport error"
        };
        OtterError::Network(format!("{}: {}", kind, err))
    }
}
