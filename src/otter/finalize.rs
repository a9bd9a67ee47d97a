use serde::{Deserialize, Serialize};

use super::{ensure_ok_status, OtterClient, Session, UploadReceipt, CSRF_COOKIE, CSRF_HEADER, SESSION_COOKIE};
use crate::http::HttpRequest;
use crate::OtterError;

// Locale and account parameters the web app sends with every finish call.
const FINISH_LANGUAGE: &str = "en";
const FINISH_COUNTRY: &str = "US";
const FINISH_USER_ID: &str = "821301";

/// Transcript record returned once Otter accepts the upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub speech_id: Option<String>,
    #[serde(default)]
    pub upload_id: Option<serde_json::Number>,
    /// Public transcript id, the last path segment of the share URL
    pub otid: String,
}

pub(crate) fn parse_transcript_record(body: &str) -> Result<TranscriptRecord, OtterError> {
    let record: TranscriptRecord = serde_json::from_str(body)
        .map_err(|e| OtterError::protocol(format!("invalid finish_speech_upload response: {}", e), body))?;

    ensure_ok_status(record.status.as_deref(), body)?;

    if record.otid.is_empty() {
        return Err(OtterError::protocol("finish_speech_upload returned an empty otid", body));
    }

    Ok(record)
}

impl OtterClient {
    /// Tell Otter the object is in the bucket and get the transcript record back
    pub async fn notify(&self, session: &Session, receipt: &UploadReceipt) -> Result<TranscriptRecord, OtterError> {
        let csrf_token = self.fetch_csrf_token().await?;

        let mut url = self.api_url("finish_speech_upload");
        url.query_pairs_mut()
            .append_pair("bucket", &receipt.bucket)
            .append_pair("key", &receipt.key)
            .append_pair("language", FINISH_LANGUAGE)
            .append_pair("country", FINISH_COUNTRY)
            .append_pair("userid", FINISH_USER_ID);

        let request = HttpRequest::post(url)
            .cookie(SESSION_COOKIE, session.as_str())
            .cookie(CSRF_COOKIE, csrf_token.as_str())
            .header(CSRF_HEADER, csrf_token)
            .json_body("{}");

        let response = self.transport().execute(request).await?;
        let record = parse_transcript_record(&response.text())?;

        tracing::info!("Upload finalized as transcript {}", record.otid);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::ScriptedTransport;
    use crate::http::HttpResponse;
    use reqwest::Method;
    use std::sync::Arc;

    fn receipt() -> UploadReceipt {
        UploadReceipt {
            location: "https://s3.example.com/speech-bucket/uploads%2F42%2Fa+b.mp3".to_string(),
            bucket: "speech-bucket".to_string(),
            key: "uploads/42/a b.mp3".to_string(),
            etag: "\"abc\"".to_string(),
        }
    }

    #[test]
    fn test_parse_full_record() {
        let record = parse_transcript_record(
            r#"{"status":"OK","speech_id":"22WBXKS6KFKOOXUT","upload_id":1234567,"otid":"Xy9-AbC"}"#,
        )
        .unwrap();
        assert_eq!(record.speech_id.as_deref(), Some("22WBXKS6KFKOOXUT"));
        assert_eq!(record.upload_id.as_ref().and_then(|n| n.as_u64()), Some(1234567));
        assert_eq!(record.otid, "Xy9-AbC");
    }

    #[test]
    fn test_parse_minimal_record() {
        let record = parse_transcript_record(r#"{"status":"ok","otid":"xyz"}"#).unwrap();
        assert_eq!(record.otid, "xyz");
        assert_eq!(record.speech_id, None);
    }

    #[test]
    fn test_parse_record_errors_are_protocol_errors() {
        for body in [
            "not json",
            r#"{"status":"ok"}"#,
            r#"{"status":"ok","otid":""}"#,
            r#"{"status":"failed","otid":"xyz"}"#,
        ] {
            assert!(
                matches!(parse_transcript_record(body), Err(OtterError::Protocol { .. })),
                "body {}",
                body
            );
        }
    }

    #[tokio::test]
    async fn test_notify_fetches_fresh_csrf_and_sends_cookies() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(HttpResponse::ok().with_cookie("csrftoken", "fresh789"))
                .respond(HttpResponse::ok().with_body(r#"{"status":"ok","otid":"xyz"}"#)),
        );
        let client = OtterClient::new(transport.clone(), "https://otter.ai").unwrap();

        let record = client.notify(&Session::new("sess456"), &receipt()).await.unwrap();
        assert_eq!(record.otid, "xyz");

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, "https://otter.ai/forward/api/v1/login_csrf");

        let finish = &requests[1];
        assert_eq!(finish.method, Method::POST);
        assert_eq!(
            finish.url,
            "https://otter.ai/forward/api/v1/finish_speech_upload?bucket=speech-bucket&key=uploads%2F42%2Fa+b.mp3&language=en&country=US&userid=821301"
        );
        assert_eq!(finish.cookie("sessionid"), Some("sess456"));
        assert_eq!(finish.cookie("csrftoken"), Some("fresh789"));
        assert_eq!(finish.header("X-Csrftoken"), Some("fresh789"));
        assert_eq!(finish.json_body.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_notify_without_csrf_cookie_sends_nothing_else() {
        let transport = Arc::new(ScriptedTransport::new().respond(HttpResponse::ok().with_body("no cookie")));
        let client = OtterClient::new(transport.clone(), "https://otter.ai").unwrap();

        let err = client.notify(&Session::new("s"), &receipt()).await.unwrap_err();
        assert!(matches!(err, OtterError::Protocol { .. }));
        assert_eq!(transport.requests().len(), 1);
    }
}
