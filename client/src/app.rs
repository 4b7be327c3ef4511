use chat_shared::{ConfigurationId, ConversationId, FeedbackKind, FeedbackRequest, MessageId};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::api::ApiClient;
use crate::app_event::{AppEvent, AppEventSender};
use crate::state::{Applied, ChatEvent, ChatState, PendingSend, Rejection};

/// Status line after an activation whose follow-up list reload failed.
pub const PERSONALITY_LIST_STALE: &str =
    "Personality changed, but the list could not be refreshed";

/// Selection and overlay state that only matters for drawing.
#[derive(Debug, Default)]
pub struct ViewState {
    /// Index into the message list of the highlighted assistant reply.
    pub selected_reply: Option<usize>,
    /// Cursor in the personality picker while it is open.
    pub personality_cursor: Option<usize>,
    pub history_cursor: usize,
    pub status: Option<String>,
}

/// Owns the chat state and turns user intents into backend requests.
///
/// Requests run on spawned tasks; their results come back as [`AppEvent`]s
/// and are folded in by [`App::handle_event`] on the UI loop.
pub struct App {
    state: ChatState,
    api: ApiClient,
    tx: AppEventSender,
    pub view: ViewState,
    pub should_quit: bool,
}

impl App {
    pub fn new(api: ApiClient, tx: AppEventSender) -> Self {
        Self {
            state: ChatState::default(),
            api,
            tx,
            view: ViewState::default(),
            should_quit: false,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    /// Initial requests issued once the UI is up.
    pub fn start(&self) {
        self.load_configurations();
        self.check_health();
    }

    fn apply(&mut self, event: ChatEvent) -> Result<Applied, Rejection> {
        let result = self.state.apply(event);
        if let Err(rejection) = &result {
            tracing::debug!(?rejection, "chat event rejected");
        }
        result
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        let _ = self.apply(ChatEvent::InputChanged(input.into()));
    }

    /// Sends the current draft. Returns false when nothing was sent.
    pub fn submit(&mut self) -> bool {
        match self.apply(ChatEvent::SendRequested) {
            Ok(Applied::Send(pending)) => {
                self.spawn_send(pending);
                true
            }
            _ => false,
        }
    }

    fn spawn_send(&self, pending: PendingSend) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let PendingSend {
                ticket,
                content,
                conversation_id,
            } = pending;
            let outcome = match api.send_message(&content, conversation_id).await {
                Ok(response) => Ok(response),
                Err(e) => {
                    tracing::error!("Failed to send message: {e}");
                    Err(e.to_string())
                }
            };
            tx.send(AppEvent::SendCompleted { ticket, outcome });
        });
    }

    pub fn rate(&self, message_id: MessageId, kind: FeedbackKind) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let request = FeedbackRequest {
                message_id,
                feedback_type: kind,
            };
            match api.submit_feedback(request).await {
                Ok(()) => tx.send(AppEvent::FeedbackRecorded { message_id, kind }),
                Err(e) => tracing::error!("Failed to send feedback for message {message_id}: {e}"),
            }
        });
    }

    pub fn load_configurations(&self) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            match api.list_configurations().await {
                Ok(configurations) => tx.send(AppEvent::ConfigurationsLoaded(configurations)),
                Err(e) => tracing::error!("Failed to load configurations: {e}"),
            }
        });
    }

    pub fn switch_configuration(&self, configuration_id: ConfigurationId) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Err(e) = api.activate_configuration(configuration_id).await {
                tracing::error!("Failed to change configuration to {configuration_id}: {e}");
                return;
            }
            let configurations = match api.list_configurations().await {
                Ok(configurations) => Some(configurations),
                Err(e) => {
                    tracing::error!("Failed to load configurations: {e}");
                    None
                }
            };
            tx.send(AppEvent::ConfigurationActivated { configurations });
        });
    }

    pub fn new_conversation(&mut self) {
        let _ = self.apply(ChatEvent::ConversationCleared);
        self.view.selected_reply = None;
    }

    pub fn browse_conversations(&self) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            match api.list_conversations().await {
                Ok(conversations) => tx.send(AppEvent::ConversationsListed(conversations)),
                Err(e) => tracing::error!("Failed to load conversations: {e}"),
            }
        });
    }

    pub fn load_conversation(&self, id: ConversationId) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            match api.conversation_messages(id).await {
                Ok(messages) => tx.send(AppEvent::ConversationLoaded { id, messages }),
                Err(e) => tracing::error!("Failed to load conversation {id}: {e}"),
            }
        });
    }

    fn check_health(&self) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let health = api.health().await.map_err(|e| e.to_string());
            tx.send(AppEvent::BackendHealth(health));
        });
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::SendCompleted { ticket, outcome } => {
                let event = match outcome {
                    Ok(response) => ChatEvent::SendSucceeded { ticket, response },
                    Err(reason) => ChatEvent::SendFailed { ticket, reason },
                };
                if let Ok(Applied::StaleCompletion(ticket)) = self.apply(event) {
                    tracing::info!(?ticket, "dropped reply for a conversation no longer shown");
                }
            }
            AppEvent::FeedbackRecorded { message_id, kind } => {
                let _ = self.apply(ChatEvent::FeedbackApplied { message_id, kind });
            }
            AppEvent::ConfigurationsLoaded(configurations) => {
                let _ = self.apply(ChatEvent::ConfigurationsLoaded(configurations));
            }
            AppEvent::ConfigurationActivated { configurations } => {
                let refreshed = configurations.is_some();
                if let Some(configurations) = configurations {
                    let _ = self.apply(ChatEvent::ConfigurationsLoaded(configurations));
                }
                let _ = self.apply(ChatEvent::ConfigurationSwitched);
                self.view.selected_reply = None;
                self.view.status = if refreshed {
                    self.state
                        .active_configuration()
                        .map(|config| format!("Personality: {}", config.name))
                } else {
                    Some(PERSONALITY_LIST_STALE.to_string())
                };
            }
            AppEvent::ConversationsListed(conversations) => {
                let _ = self.apply(ChatEvent::ConversationsListed(conversations));
                self.view.history_cursor = 0;
            }
            AppEvent::ConversationLoaded { id, messages } => {
                let _ = self.apply(ChatEvent::ConversationLoaded { id, messages });
                self.view.selected_reply = None;
            }
            AppEvent::BackendHealth(health) => {
                self.view.status = Some(match health {
                    Ok(status) if status.is_healthy() => {
                        format!("Connected to {}", self.api.base_url())
                    }
                    Ok(status) => format!("Backend reports '{}'", status.status),
                    Err(e) => {
                        tracing::warn!("Backend health check failed: {e}");
                        format!("Backend unreachable at {}", self.api.base_url())
                    }
                });
            }
        }
    }

    /// The highlighted reply, if it is still present and rateable.
    pub fn selected_message_id(&self) -> Option<MessageId> {
        let index = self.view.selected_reply?;
        self.state
            .messages
            .get(index)
            .filter(|message| message.is_rateable())
            .and_then(|message| message.id)
    }

    fn move_reply_selection(&mut self, forward: bool) {
        let rateable: Vec<usize> = self
            .state
            .messages
            .iter()
            .enumerate()
            .filter(|(_, message)| message.is_rateable())
            .map(|(index, _)| index)
            .collect();
        let (Some(&first), Some(&last)) = (rateable.first(), rateable.last()) else {
            self.view.selected_reply = None;
            return;
        };

        self.view.selected_reply = Some(match self.view.selected_reply {
            None if forward => first,
            None => last,
            Some(current) if forward => rateable
                .iter()
                .copied()
                .find(|&index| index > current)
                .unwrap_or(last),
            Some(current) => rateable
                .iter()
                .rev()
                .copied()
                .find(|&index| index < current)
                .unwrap_or(first),
        });
    }

    fn rate_selected(&mut self, kind: FeedbackKind) {
        match self.selected_message_id() {
            Some(message_id) => self.rate(message_id, kind),
            None => self.view.status = Some("Select a reply with Up/Down first".to_string()),
        }
    }

    fn open_personality_picker(&mut self) {
        if self.state.configurations.is_empty() {
            self.load_configurations();
        }
        let cursor = self
            .state
            .configurations
            .iter()
            .position(|config| config.is_active)
            .unwrap_or(0);
        self.view.personality_cursor = Some(cursor);
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.state.show_conversations {
            self.handle_history_key(key);
        } else if self.view.personality_cursor.is_some() {
            self.handle_personality_key(key);
        } else {
            self.handle_chat_key(key);
        }
    }

    fn handle_history_key(&mut self, key: KeyEvent) {
        let count = self.state.conversations.len();
        match key.code {
            KeyCode::Esc => {
                let _ = self.apply(ChatEvent::HistoryClosed);
            }
            KeyCode::Up => self.view.history_cursor = self.view.history_cursor.saturating_sub(1),
            KeyCode::Down if count > 0 => {
                self.view.history_cursor = (self.view.history_cursor + 1).min(count - 1);
            }
            KeyCode::Enter => {
                if let Some(conversation) = self.state.conversations.get(self.view.history_cursor) {
                    self.load_conversation(conversation.id);
                }
            }
            _ => {}
        }
    }

    fn handle_personality_key(&mut self, key: KeyEvent) {
        let count = self.state.configurations.len();
        let Some(cursor) = self.view.personality_cursor else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.view.personality_cursor = None,
            KeyCode::Up => self.view.personality_cursor = Some(cursor.saturating_sub(1)),
            KeyCode::Down if count > 0 => {
                self.view.personality_cursor = Some((cursor + 1).min(count - 1));
            }
            KeyCode::Enter => {
                // Re-picking the active personality keeps the conversation.
                if let Some(config) = self
                    .state
                    .configurations
                    .get(cursor)
                    .filter(|config| !config.is_active)
                {
                    self.switch_configuration(config.id);
                }
                self.view.personality_cursor = None;
            }
            _ => {}
        }
    }

    fn handle_chat_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('n') => self.new_conversation(),
                KeyCode::Char('o') => self.browse_conversations(),
                KeyCode::Char('p') => self.open_personality_picker(),
                KeyCode::Char('u') => self.rate_selected(FeedbackKind::ThumbsUp),
                KeyCode::Char('d') => self.rate_selected(FeedbackKind::ThumbsDown),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => {
                self.submit();
            }
            KeyCode::Up => self.move_reply_selection(false),
            KeyCode::Down => self.move_reply_selection(true),
            KeyCode::Backspace => {
                let mut input = self.state.input.clone();
                input.pop();
                self.set_input(input);
            }
            KeyCode::Char(c) => {
                let mut input = self.state.input.clone();
                input.push(c);
                self.set_input(input);
            }
            _ => {}
        }
    }
}
