use std::fmt;

use super::{OtterClient, Session, CSRF_COOKIE, CSRF_HEADER, SESSION_COOKIE};
use crate::http::HttpRequest;
use crate::OtterError;

/// Otter account credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl OtterClient {
    /// Fetch a fresh anti-CSRF token from the `csrftoken` cookie of the login_csrf endpoint.
    ///
    /// Tokens are single use: every state-changing call fetches its own.
    pub async fn fetch_csrf_token(&self) -> Result<String, OtterError> {
        let request = HttpRequest::get(self.api_url("login_csrf"));
        let response = self.transport().execute(request).await?;

        match response.cookie(CSRF_COOKIE) {
            Some(token) => {
                tracing::debug!("Received CSRF token");
                Ok(token.to_string())
            }
            None => Err(OtterError::protocol(
                format!("no {} cookie in login_csrf response (HTTP {})", CSRF_COOKIE, response.status),
                response.text(),
            )),
        }
    }

    /// Log in with HTTP basic auth and return the `sessionid` cookie.
    pub async fn login(&self, credentials: Credentials) -> Result<Session, OtterError> {
        let csrf_token = self.fetch_csrf_token().await?;

        let mut url = self.api_url("login");
        url.query_pairs_mut()
            .append_pair("username", &credentials.username);

        let request = HttpRequest::post(url)
            .cookie(CSRF_COOKIE, csrf_token.as_str())
            .header(CSRF_HEADER, csrf_token)
            .basic_auth(credentials.username, credentials.password);

        let response = self.transport().execute(request).await?;

        match response.cookie(SESSION_COOKIE) {
            Some(session_id) => {
                tracing::info!("Logged in to Otter");
                Ok(Session::new(session_id))
            }
            None => {
                tracing::debug!("Login response without session cookie: {}", response.text());
                Err(OtterError::Authentication {
                    status: response.status.as_u16(),
                })
            }
        }
    }
}
