use chat_shared::{
    ChatResponse, Configuration, Conversation, ConversationId, FeedbackKind, HealthStatus, Message,
    MessageId,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::state::SendTicket;

/// Results of background requests, delivered back to the UI loop.
///
/// Only the send round trip reports failures here; every other request logs
/// its own error and posts nothing.
#[derive(Debug, Clone)]
pub enum AppEvent {
    SendCompleted {
        ticket: SendTicket,
        outcome: Result<ChatResponse, String>,
    },
    FeedbackRecorded {
        message_id: MessageId,
        kind: FeedbackKind,
    },
    ConfigurationsLoaded(Vec<Configuration>),
    /// Activation succeeded. `configurations` is the reloaded list, if that
    /// reload worked.
    ConfigurationActivated {
        configurations: Option<Vec<Configuration>>,
    },
    ConversationsListed(Vec<Conversation>),
    ConversationLoaded {
        id: ConversationId,
        messages: Vec<Message>,
    },
    BackendHealth(Result<HealthStatus, String>),
}

#[derive(Clone, Debug)]
pub struct AppEventSender {
    pub app_event_tx: UnboundedSender<AppEvent>,
}

impl AppEventSender {
    pub fn new(app_event_tx: UnboundedSender<AppEvent>) -> Self {
        Self { app_event_tx }
    }

    /// Send an event to the UI loop. If the loop is gone the event is
    /// dropped and logged.
    pub fn send(&self, event: AppEvent) {
        if let Err(e) = self.app_event_tx.send(event) {
            tracing::error!("failed to send app event: {e}");
        }
    }
}
