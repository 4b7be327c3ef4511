//! Development backend speaking the chat client's `/api/v1` contract.
//!
//! Replies are canned echoes tagged with the active personality; state lives
//! in memory and is optionally snapshotted to a JSON file after each change.

pub mod config;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chat_shared::{
    ChatRequest, ChatResponse, Configuration, ConfigurationId, Conversation, ConversationId,
    FeedbackReceipt, FeedbackRequest, HealthStatus, Message, API_PREFIX,
};
use serde_json::json;
use tokio::fs;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use config::AppConfig;
use store::{Store, StoreError};

pub struct AppState {
    store: Mutex<Store>,
    history_file: Option<PathBuf>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: Store, history_file: Option<PathBuf>) -> SharedState {
        Arc::new(Self {
            store: Mutex::new(store),
            history_file,
        })
    }

    /// Seeds configurations from `config` and restores the history snapshot
    /// when one exists.
    pub async fn load(config: &AppConfig) -> Result<SharedState> {
        let mut store = Store::seeded(config);
        if let Some(path) = &config.history_file {
            if fs::try_exists(path).await.unwrap_or(false) {
                let content = fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed to read history {}", path.display()))?;
                let snapshot: Store = serde_json::from_str(&content)
                    .with_context(|| format!("invalid history file {}", path.display()))?;
                store = store.with_history(snapshot);
                tracing::info!("Restored history from {}", path.display());
            }
        }
        Ok(Self::new(store, config.history_file.clone()))
    }

    /// Writes the snapshot if a history file is configured. Failures are
    /// logged, never returned to the caller.
    async fn persist(&self, store: &Store) {
        let Some(path) = &self.history_file else {
            return;
        };
        match serde_json::to_string(store) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json).await {
                    tracing::error!("Failed to save history to {}: {}", path.display(), e);
                }
            }
            Err(e) => tracing::error!("Failed to serialize history: {}", e),
        }
    }
}

/// Error body shaped like `{ "detail": "..." }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub fn router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/chat", post(chat))
        .route("/conversations", get(list_conversations))
        .route("/conversations/{id}/messages", get(conversation_messages))
        .route("/feedback", post(submit_feedback))
        .route("/configurations", get(list_configurations))
        .route("/configurations/{id}/activate", post(activate_configuration));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest(API_PREFIX, api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Adaptive Chatbot development API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::healthy())
}

async fn chat(
    State(state): State<SharedState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    tracing::debug!(conversation_id = ?request.conversation_id, "received: {}", request.message);

    let mut store = state.store.lock().await;
    let response = store.chat(&request.message, request.conversation_id)?;
    state.persist(&store).await;

    Ok(Json(response))
}

async fn list_conversations(State(state): State<SharedState>) -> Json<Vec<Conversation>> {
    Json(state.store.lock().await.conversations())
}

async fn conversation_messages(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = state.store.lock().await.messages(ConversationId::new(id))?;
    Ok(Json(messages))
}

async fn submit_feedback(
    State(state): State<SharedState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackReceipt>, ApiError> {
    let mut store = state.store.lock().await;
    let receipt = store.record_feedback(request)?;
    tracing::info!(
        message_id = %request.message_id,
        "feedback recorded: {}",
        request.feedback_type.as_str()
    );
    state.persist(&store).await;

    Ok(Json(receipt))
}

async fn list_configurations(State(state): State<SharedState>) -> Json<Vec<Configuration>> {
    Json(state.store.lock().await.configurations())
}

async fn activate_configuration(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut store = state.store.lock().await;
    let config = store.activate(ConfigurationId::new(id))?;
    tracing::info!("Switching configuration to: {}", config.name);
    let body = json!({ "id": config.id, "name": config.name, "activated": true });

    Ok(Json(body))
}
