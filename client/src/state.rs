//! Client-visible chat state and the closed set of transitions over it.
//!
//! [`ChatState`] is the single owner of everything the screen shows. It is
//! only ever changed through [`ChatState::apply`], which either accepts an
//! event and reports what happened or rejects it and leaves the state as it
//! was.

use chat_shared::{
    ChatResponse, Configuration, Conversation, ConversationId, FeedbackKind, Message, MessageId,
    Role,
};
use serde::Serialize;

/// Shown in place of a reply when a send fails for any reason.
pub const SEND_ERROR_TEXT: &str = "Sorry, I encountered an error. Please try again.";

/// Identifies one send round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SendTicket(pub u64);

/// Lifecycle of the one send the client allows in flight.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SendState {
    #[default]
    Idle,
    Sending {
        ticket: SendTicket,
        /// Conversation generation the request was issued from.
        generation: u64,
    },
    Failed {
        reason: String,
    },
}

impl SendState {
    pub fn active_ticket(&self) -> Option<SendTicket> {
        match self {
            Self::Sending { ticket, .. } => Some(*ticket),
            Self::Idle | Self::Failed { .. } => None,
        }
    }
}

/// Everything needed to issue the request for an accepted send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub ticket: SendTicket,
    pub content: String,
    pub conversation_id: Option<ConversationId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    InputChanged(String),
    SendRequested,
    SendSucceeded {
        ticket: SendTicket,
        response: ChatResponse,
    },
    SendFailed {
        ticket: SendTicket,
        reason: String,
    },
    FeedbackApplied {
        message_id: MessageId,
        kind: FeedbackKind,
    },
    ConfigurationsLoaded(Vec<Configuration>),
    /// A configuration was activated; the current conversation is dropped.
    ConfigurationSwitched,
    ConversationsListed(Vec<Conversation>),
    HistoryClosed,
    ConversationLoaded {
        id: ConversationId,
        messages: Vec<Message>,
    },
    ConversationCleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Updated,
    /// The send was accepted and its request should now be issued.
    Send(PendingSend),
    /// A send finished after its conversation was replaced. The send state
    /// was released but the reply was dropped.
    StaleCompletion(SendTicket),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    BlankInput,
    AlreadySending { active: SendTicket },
    NoActiveSend,
    TicketMismatch {
        active: SendTicket,
        attempted: SendTicket,
    },
    UnknownMessage(MessageId),
}

pub type ApplyResult = Result<Applied, Rejection>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ChatState {
    pub messages: Vec<Message>,
    pub input: String,
    pub send: SendState,
    pub current_conversation_id: Option<ConversationId>,
    pub configurations: Vec<Configuration>,
    pub conversations: Vec<Conversation>,
    pub show_conversations: bool,
    /// Bumped whenever the message list is replaced wholesale.
    generation: u64,
    next_ticket: u64,
}

impl ChatState {
    pub fn is_loading(&self) -> bool {
        matches!(self.send, SendState::Sending { .. })
    }

    pub fn active_configuration(&self) -> Option<&Configuration> {
        self.configurations.iter().find(|config| config.is_active)
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == Some(id))
    }

    pub fn apply(&mut self, event: ChatEvent) -> ApplyResult {
        match event {
            ChatEvent::InputChanged(input) => self.apply_input(input),
            ChatEvent::SendRequested => self.apply_send_requested(),
            ChatEvent::SendSucceeded { ticket, response } => {
                self.apply_send_succeeded(ticket, response)
            }
            ChatEvent::SendFailed { ticket, reason } => self.apply_send_failed(ticket, reason),
            ChatEvent::FeedbackApplied { message_id, kind } => {
                self.apply_feedback(message_id, kind)
            }
            ChatEvent::ConfigurationsLoaded(configurations) => {
                self.configurations = configurations;
                Ok(Applied::Updated)
            }
            ChatEvent::ConfigurationSwitched | ChatEvent::ConversationCleared => {
                self.replace_conversation(None, Vec::new());
                Ok(Applied::Updated)
            }
            ChatEvent::ConversationsListed(conversations) => {
                self.conversations = conversations;
                self.show_conversations = true;
                Ok(Applied::Updated)
            }
            ChatEvent::HistoryClosed => {
                self.show_conversations = false;
                Ok(Applied::Updated)
            }
            ChatEvent::ConversationLoaded { id, messages } => {
                let visible = messages
                    .into_iter()
                    .filter(|message| message.role != Role::System)
                    .collect();
                self.replace_conversation(Some(id), visible);
                self.show_conversations = false;
                Ok(Applied::Updated)
            }
        }
    }

    fn apply_input(&mut self, input: String) -> ApplyResult {
        if let Some(active) = self.send.active_ticket() {
            return Err(Rejection::AlreadySending { active });
        }
        self.input = input;
        Ok(Applied::Updated)
    }

    fn apply_send_requested(&mut self) -> ApplyResult {
        if let Some(active) = self.send.active_ticket() {
            return Err(Rejection::AlreadySending { active });
        }
        let content = self.input.trim();
        if content.is_empty() {
            return Err(Rejection::BlankInput);
        }
        let content = content.to_string();

        self.next_ticket += 1;
        let ticket = SendTicket(self.next_ticket);
        self.messages.push(Message::user(content.clone()));
        self.input.clear();
        self.send = SendState::Sending {
            ticket,
            generation: self.generation,
        };

        Ok(Applied::Send(PendingSend {
            ticket,
            content,
            conversation_id: self.current_conversation_id,
        }))
    }

    /// Releases the send state for `ticket`. Returns whether the reply still
    /// belongs to the conversation on screen.
    fn finish_send(&mut self, ticket: SendTicket) -> Result<bool, Rejection> {
        match self.send {
            SendState::Sending {
                ticket: active,
                generation,
            } if active == ticket => Ok(generation == self.generation),
            SendState::Sending { ticket: active, .. } => Err(Rejection::TicketMismatch {
                active,
                attempted: ticket,
            }),
            SendState::Idle | SendState::Failed { .. } => Err(Rejection::NoActiveSend),
        }
    }

    fn apply_send_succeeded(&mut self, ticket: SendTicket, response: ChatResponse) -> ApplyResult {
        let current = self.finish_send(ticket)?;
        self.send = SendState::Idle;
        if !current {
            return Ok(Applied::StaleCompletion(ticket));
        }

        self.messages
            .push(Message::assistant(response.message_id, response.response));
        if self.current_conversation_id.is_none() {
            self.current_conversation_id = Some(response.conversation_id);
        }
        Ok(Applied::Updated)
    }

    fn apply_send_failed(&mut self, ticket: SendTicket, reason: String) -> ApplyResult {
        let current = self.finish_send(ticket)?;
        self.send = SendState::Failed { reason };
        if !current {
            return Ok(Applied::StaleCompletion(ticket));
        }

        self.messages.push(Message::system(SEND_ERROR_TEXT));
        Ok(Applied::Updated)
    }

    fn apply_feedback(&mut self, message_id: MessageId, kind: FeedbackKind) -> ApplyResult {
        let mut found = false;
        for message in self
            .messages
            .iter_mut()
            .filter(|message| message.id == Some(message_id))
        {
            message.feedback = Some(kind);
            found = true;
        }
        if found {
            Ok(Applied::Updated)
        } else {
            Err(Rejection::UnknownMessage(message_id))
        }
    }

    fn replace_conversation(&mut self, id: Option<ConversationId>, messages: Vec<Message>) {
        self.messages = messages;
        self.current_conversation_id = id;
        self.generation += 1;
    }
}
