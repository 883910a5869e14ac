use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::endpoints;
use super::messages::{
    AudioUpload, CardIdentity, CardSelectionResult, ChildCardsResult, ParentMessageResult,
    SessionInitiationArgs, SessionStartResult, SessionTopicInfo, timestamp_header,
};
use super::timezone::TimezoneProvider;
use crate::error::{Result, SessionError};

/// Backend operations the session core depends on
#[async_trait::async_trait]
pub trait SessionApi: Send + Sync {
    /// Create a session for a topic; returns the new session id
    async fn create_session(&self, topic: &SessionTopicInfo) -> Result<String>;

    /// Start a created session; returns the first turn id and parent guides
    async fn start_session(&self, session_id: &str) -> Result<SessionStartResult>;

    /// Submit the parent's recorded utterance for a turn
    async fn submit_parent_audio(
        &self,
        session_id: &str,
        turn_id: &str,
        upload: AudioUpload,
    ) -> Result<ParentMessageResult>;

    /// Append a card to the child's interim selection
    async fn append_child_card(&self, session_id: &str, card: &CardIdentity) -> Result<CardSelectionResult>;

    /// Remove the last card from the child's interim selection
    async fn pop_last_child_card(&self, session_id: &str) -> Result<CardSelectionResult>;

    /// Confirm the child's selection; returns guides for the next parent turn
    async fn confirm_child_cards(&self, session_id: &str) -> Result<ChildCardsResult>;

    /// Persist and close the session
    async fn end_session(&self, session_id: &str) -> Result<()>;

    /// Discard the session on the server
    async fn abort_session(&self, session_id: &str) -> Result<()>;
}

/// HTTP client for the dyad backend
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timezone: Arc<dyn TimezoneProvider>,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for `{address}/api/v1`
    ///
    /// `timeout` applies to whole requests; `None` leaves requests unbounded.
    pub fn new(
        address: &str,
        timezone: Arc<dyn TimezoneProvider>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let base_url = format!("{}{}", address.trim_end_matches('/'), endpoints::API_PREFIX);
        info!("Backend API at {}", base_url);

        Ok(Self {
            http,
            base_url,
            timezone,
            token: None,
        })
    }

    /// Authenticate requests with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn resolve_timezone(&self) -> Result<String> {
        self.timezone
            .timezone()
            .await
            .map_err(|e| SessionError::Network(format!("Failed to resolve timezone: {e}")))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let timezone = self.resolve_timezone().await?;

        let mut request = request
            .header("Timezone", timezone)
            .header("Timestamp", timestamp_header(chrono::Utc::now()));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        debug!("Backend error {}: {}", status, body);
        Err(SessionError::from_server(status.as_u16(), body))
    }
}

#[async_trait::async_trait]
impl SessionApi for ApiClient {
    async fn create_session(&self, topic: &SessionTopicInfo) -> Result<String> {
        let timezone = self.resolve_timezone().await?;
        let args = SessionInitiationArgs {
            topic: topic.clone(),
            timezone,
        };

        let response = self
            .send(self.http.post(self.url(endpoints::SESSION_NEW)).json(&args))
            .await?;
        let session_id: String = response.json().await?;

        info!("Created session {}", session_id);
        Ok(session_id)
    }

    async fn start_session(&self, session_id: &str) -> Result<SessionStartResult> {
        let url = self.url(&endpoints::for_session(endpoints::SESSION_START, session_id));
        let response = self.send(self.http.post(url)).await?;
        Ok(response.json().await?)
    }

    async fn submit_parent_audio(
        &self,
        session_id: &str,
        turn_id: &str,
        upload: AudioUpload,
    ) -> Result<ParentMessageResult> {
        let url = self.url(&endpoints::for_session(endpoints::PARENT_MESSAGE_AUDIO, session_id));
        debug!("Uploading {} ({} bytes) to {}", upload.file_name, upload.bytes.len(), url);

        let file_part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)?;
        let form = Form::new()
            .text("turn_id", turn_id.to_string())
            .part("file", file_part);

        let response = self.send(self.http.post(url).multipart(form)).await?;
        Ok(response.json().await?)
    }

    async fn append_child_card(&self, session_id: &str, card: &CardIdentity) -> Result<CardSelectionResult> {
        let url = self.url(&endpoints::for_session(endpoints::CHILD_ADD_CARD, session_id));
        let response = self.send(self.http.post(url).json(card)).await?;
        Ok(response.json().await?)
    }

    async fn pop_last_child_card(&self, session_id: &str) -> Result<CardSelectionResult> {
        let url = self.url(&endpoints::for_session(endpoints::CHILD_POP_LAST_CARD, session_id));
        let response = self.send(self.http.put(url)).await?;
        Ok(response.json().await?)
    }

    async fn confirm_child_cards(&self, session_id: &str) -> Result<ChildCardsResult> {
        let url = self.url(&endpoints::for_session(endpoints::CHILD_CONFIRM_CARDS, session_id));
        let response = self.send(self.http.post(url)).await?;
        Ok(response.json().await?)
    }

    async fn end_session(&self, session_id: &str) -> Result<()> {
        let url = self.url(&endpoints::for_session(endpoints::SESSION_END, session_id));
        self.send(self.http.put(url)).await?;
        info!("Session {} ended", session_id);
        Ok(())
    }

    async fn abort_session(&self, session_id: &str) -> Result<()> {
        let url = self.url(&endpoints::for_session(endpoints::SESSION_ABORT, session_id));
        self.send(self.http.delete(url)).await?;
        info!("Session {} aborted", session_id);
        Ok(())
    }
}
