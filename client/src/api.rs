use std::time::Duration;

use chat_shared::{
    ChatRequest, ChatResponse, Configuration, ConfigurationId, Conversation, ConversationId,
    FeedbackRequest, HealthStatus, Message, API_PREFIX,
};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config::ClientConfig;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport { source, .. } | Self::Decode { source, .. } => source.is_timeout(),
            Self::Build(_) | Self::Status { .. } => false,
        }
    }
}

/// Typed wrapper over the backend's JSON API.
///
/// Every call is a fresh round trip: no retries, no caching. Cloning is cheap
/// and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_prefix: String,
}

impl ApiClient {
    /// Client for `base_url` with the default prefix and no request timeout.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::build(base_url, API_PREFIX, None)
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::build(
            &config.base_url,
            &config.api_prefix,
            config.request_timeout(),
        )
    }

    fn build(base_url: &str, api_prefix: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build().map_err(ApiError::Build)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_prefix: format!("/{}", api_prefix.trim_matches('/')),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.api_prefix, path)
    }

    pub async fn send_message(
        &self,
        message: &str,
        conversation_id: Option<ConversationId>,
    ) -> Result<ChatResponse, ApiError> {
        let request = ChatRequest {
            message: message.to_string(),
            conversation_id,
        };
        self.post_json(self.api_url("/chat"), &request).await
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.get_json(self.api_url("/conversations")).await
    }

    pub async fn conversation_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, ApiError> {
        self.get_json(self.api_url(&format!("/conversations/{conversation_id}/messages")))
            .await
    }

    pub async fn submit_feedback(&self, feedback: FeedbackRequest) -> Result<(), ApiError> {
        let url = self.api_url("/feedback");
        let request = self.client.post(&url).json(&feedback);
        let response = request.send().await.map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;
        check(url, response).await.map(drop)
    }

    pub async fn list_configurations(&self) -> Result<Vec<Configuration>, ApiError> {
        self.get_json(self.api_url("/configurations")).await
    }

    pub async fn activate_configuration(
        &self,
        configuration_id: ConfigurationId,
    ) -> Result<(), ApiError> {
        let url = self.api_url(&format!("/configurations/{configuration_id}/activate"));
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        check(url, response).await.map(drop)
    }

    /// `GET /health` on the server root, outside the API prefix.
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get_json(format!("{}/health", self.base_url)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ApiError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        decode(url, response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        decode(url, response).await
    }
}

async fn check(url: String, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { url, status, body })
}

async fn decode<T: DeserializeOwned>(url: String, response: Response) -> Result<T, ApiError> {
    let response = check(url.clone(), response).await?;
    response
        .json::<T>()
        .await
        .map_err(|source| ApiError::Decode { url, source })
}
