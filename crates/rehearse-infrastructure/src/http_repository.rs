//! HTTP-backed session repository.
//!
//! Request/response adapter over the session backend's REST surface. Each
//! session-returning endpoint yields the backend's full current view of the
//! session; the sync engine swaps that view in wholesale.
//!
//! No retry or backoff here: failures surface as errors and the caller
//! decides what to keep.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use rehearse_core::error::{RehearseError, Result};
use rehearse_core::session::{RetryContext, Session, SessionPatch, SessionRepository};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const TARGET: &str = "http_repository";

/// Session repository that talks to the backend over HTTP.
#[derive(Clone)]
pub struct HttpSessionRepository {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct StartRequest<'a> {
    role: &'a str,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    patches: &'a [SessionPatch],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DraftRequest<'a> {
    text: &'a str,
    is_final: bool,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    text: &'a str,
}

impl HttpSessionRepository {
    /// Creates a repository against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
            bearer_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// `REHEARSE_API_URL` is required; `REHEARSE_API_TOKEN` is optional.
    pub fn try_from_env() -> Result<Self> {
        let base_url = env::var("REHEARSE_API_URL").map_err(|_| {
            RehearseError::persistence("REHEARSE_API_URL not found in environment variables")
        })?;
        let mut repository = Self::new(base_url);
        if let Ok(token) = env::var("REHEARSE_API_TOKEN") {
            repository = repository.with_bearer_token(token);
        }
        Ok(repository)
    }

    /// Sets the bearer token sent with every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    /// Sends a prepared request and checks the status.
    ///
    /// Non-2xx responses become `Persistence` errors carrying the backend's
    /// error body, except the statuses the caller opted to handle itself.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .authorize(request.timeout(self.timeout))
            .send()
            .await
            .map_err(|e| RehearseError::persistence(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RehearseError::persistence(format!(
                "backend error ({status}): {body}"
            )));
        }
        Ok(response)
    }

    async fn parse_session(response: reqwest::Response) -> Result<Session> {
        response
            .json::<Session>()
            .await
            .map_err(|e| RehearseError::persistence(format!("failed to parse session: {e}")))
    }
}

#[async_trait]
impl SessionRepository for HttpSessionRepository {
    async fn create(&self, role: &str) -> Result<Session> {
        let request = self
            .client
            .post(self.url("/session/start"))
            .json(&StartRequest { role });
        let response = self.send(request).await?;
        Self::parse_session(response).await
    }

    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        let request = self.client.get(self.url(&format!("/session/{session_id}")));
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::parse_session(response).await?))
    }

    async fn update(&self, session_id: &str, patches: &[SessionPatch]) -> Result<Session> {
        let request = self
            .client
            .patch(self.url(&format!("/session/{session_id}")))
            .json(&UpdateRequest { patches });
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RehearseError::not_found("session", session_id));
        }
        Self::parse_session(response).await
    }

    async fn save_draft(&self, session_id: &str, question_id: &str, draft: &str) -> Result<()> {
        let request = self
            .client
            .put(self.url(&format!(
                "/session/{session_id}/questions/{question_id}/answer"
            )))
            .json(&DraftRequest {
                text: draft,
                is_final: false,
            });
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RehearseError::not_found("session", session_id));
        }
        tracing::debug!(target: TARGET, session_id, question_id, "draft saved");
        Ok(())
    }

    async fn submit_answer(
        &self,
        session_id: &str,
        question_id: &str,
        text: &str,
    ) -> Result<Session> {
        let request = self
            .client
            .post(self.url(&format!(
                "/session/{session_id}/questions/{question_id}/submit"
            )))
            .json(&SubmitRequest { text });
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RehearseError::not_found("session", session_id));
        }
        Self::parse_session(response).await
    }

    async fn request_analysis(&self, session_id: &str, question_id: &str) -> Result<Session> {
        let request = self.client.post(self.url(&format!(
            "/session/{session_id}/questions/{question_id}/analysis"
        )));
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RehearseError::not_found("session", session_id));
        }
        Self::parse_session(response).await
    }

    async fn retry_question(
        &self,
        session_id: &str,
        question_id: &str,
        context: &RetryContext,
    ) -> Result<Session> {
        let request = self
            .client
            .post(self.url(&format!(
                "/session/{session_id}/questions/{question_id}/retry"
            )))
            .json(context);
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RehearseError::not_found("session", session_id));
        }
        Self::parse_session(response).await
    }

    async fn reset(&self, session_id: &str) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("/session/{session_id}/reset")));
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RehearseError::not_found("session", session_id));
        }
        tracing::debug!(target: TARGET, session_id, "session reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let repository = HttpSessionRepository::new("https://api.example.com/");
        assert_eq!(
            repository.url("/session/s-1"),
            "https://api.example.com/session/s-1"
        );
    }

    #[test]
    fn builder_sets_token_and_timeout() {
        let repository = HttpSessionRepository::new("https://api.example.com")
            .with_bearer_token("secret")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(repository.bearer_token.as_deref(), Some("secret"));
        assert_eq!(repository.timeout, Duration::from_secs(5));
    }
}
