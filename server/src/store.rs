use std::collections::BTreeSet;

use chat_shared::{
    ChatResponse, Configuration, ConfigurationId, Conversation, ConversationId, FeedbackKind,
    FeedbackReceipt, FeedbackRequest, Message, MessageId, Role, Timestamp,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Conversation not found")]
    ConversationNotFound(ConversationId),
    #[error("Configuration {0} not found")]
    ConfigurationNotFound(ConfigurationId),
    #[error("Message {0} not found")]
    MessageNotFound(MessageId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredConversation {
    id: ConversationId,
    title: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredFeedback {
    id: i64,
    message_id: MessageId,
    kind: FeedbackKind,
    created_at: Timestamp,
}

/// Everything the development backend knows. Serializable so it can be
/// snapshotted to disk between runs.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Store {
    configurations: Vec<Configuration>,
    conversations: Vec<StoredConversation>,
    feedback: Vec<StoredFeedback>,
    next_conversation_id: i64,
    next_message_id: i64,
}

impl Store {
    pub fn seeded(config: &AppConfig) -> Self {
        let now = Timestamp::now();
        let default = config
            .configurations
            .iter()
            .position(|seed| seed.name == config.default);
        let mut configurations: Vec<Configuration> = config
            .configurations
            .iter()
            .enumerate()
            .map(|(index, seed)| Configuration {
                id: ConfigurationId::new(index as i64 + 1),
                name: seed.name.clone(),
                description: seed.description.clone(),
                version: 1,
                is_active: Some(index) == default,
                tags: seed.tags.iter().cloned().collect::<BTreeSet<_>>(),
                updated_at: now,
            })
            .collect();

        if default.is_none() {
            if let Some(first) = configurations.first_mut() {
                tracing::warn!(
                    "Default configuration '{}' not found, activating '{}'",
                    config.default,
                    first.name
                );
                first.is_active = true;
            }
        }

        Self {
            configurations,
            ..Self::default()
        }
    }

    /// Carries conversations and feedback over from a snapshot. The seeded
    /// configurations are kept.
    pub fn with_history(mut self, history: Store) -> Self {
        self.conversations = history.conversations;
        self.feedback = history.feedback;
        self.next_conversation_id = history.next_conversation_id;
        self.next_message_id = history.next_message_id;
        self
    }

    fn active_configuration(&self) -> Option<&Configuration> {
        self.configurations.iter().find(|c| c.is_active)
    }

    fn allocate_message_id(&mut self) -> MessageId {
        self.next_message_id += 1;
        MessageId::new(self.next_message_id)
    }

    fn stored_message(&mut self, role: Role, content: String) -> (MessageId, Message) {
        let id = self.allocate_message_id();
        let message = Message {
            id: Some(id),
            role,
            content,
            created_at: Some(Timestamp::now()),
            feedback: None,
        };
        (id, message)
    }

    fn open_conversation(&mut self) -> usize {
        self.next_conversation_id += 1;
        let now = Timestamp::now();
        let prompt = match self.active_configuration() {
            Some(config) => format!(
                "You are the {} assistant. {}",
                config.name,
                config.description.as_deref().unwrap_or_default()
            ),
            None => "You are a helpful assistant.".to_string(),
        };
        let (_, system) = self.stored_message(Role::System, prompt.trim_end().to_string());

        self.conversations.push(StoredConversation {
            id: ConversationId::new(self.next_conversation_id),
            title: None,
            created_at: now,
            updated_at: now,
            messages: vec![system],
        });
        self.conversations.len() - 1
    }

    fn conversation_index(&self, id: ConversationId) -> Result<usize, StoreError> {
        self.conversations
            .iter()
            .position(|conversation| conversation.id == id)
            .ok_or(StoreError::ConversationNotFound(id))
    }

    /// Records the user's message and a canned echo reply.
    pub fn chat(
        &mut self,
        message: &str,
        conversation_id: Option<ConversationId>,
    ) -> Result<ChatResponse, StoreError> {
        let index = match conversation_id {
            Some(id) => self.conversation_index(id)?,
            None => self.open_conversation(),
        };

        let personality = self
            .active_configuration()
            .map(|config| config.name.clone())
            .unwrap_or_else(|| "Default".to_string());
        let reply = format!("Echo [{personality}]: {message}");

        let (_, user) = self.stored_message(Role::User, message.to_string());
        let (message_id, assistant) = self.stored_message(Role::Assistant, reply.clone());

        let conversation = &mut self.conversations[index];
        conversation.messages.push(user);
        conversation.messages.push(assistant);
        conversation.updated_at = Timestamp::now();

        Ok(ChatResponse {
            response: reply,
            conversation_id: conversation.id,
            message_id,
        })
    }

    /// Summaries, most recently updated first.
    pub fn conversations(&self) -> Vec<Conversation> {
        let mut summaries: Vec<Conversation> = self
            .conversations
            .iter()
            .map(|conversation| Conversation {
                id: conversation.id,
                title: conversation.title.clone(),
                created_at: conversation.created_at,
                updated_at: conversation.updated_at,
                message_count: conversation.messages.len() as u64,
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        summaries
    }

    pub fn messages(&self, id: ConversationId) -> Result<Vec<Message>, StoreError> {
        let index = self.conversation_index(id)?;
        let messages = &self.conversations[index].messages;
        // Only reachable through a restored snapshot; live conversations
        // always start with their system prompt.
        if messages.is_empty() {
            return Err(StoreError::ConversationNotFound(id));
        }
        Ok(messages.clone())
    }

    pub fn record_feedback(
        &mut self,
        request: FeedbackRequest,
    ) -> Result<FeedbackReceipt, StoreError> {
        let known = self
            .conversations
            .iter()
            .flat_map(|conversation| conversation.messages.iter())
            .any(|message| message.id == Some(request.message_id));
        if !known {
            return Err(StoreError::MessageNotFound(request.message_id));
        }

        let id = self.feedback.len() as i64 + 1;
        self.feedback.push(StoredFeedback {
            id,
            message_id: request.message_id,
            kind: request.feedback_type,
            created_at: Timestamp::now(),
        });
        Ok(FeedbackReceipt {
            status: "recorded".to_string(),
            feedback_id: id,
        })
    }

    pub fn configurations(&self) -> Vec<Configuration> {
        self.configurations.clone()
    }

    /// Makes `id` the only active configuration.
    pub fn activate(&mut self, id: ConfigurationId) -> Result<&Configuration, StoreError> {
        let index = self
            .configurations
            .iter()
            .position(|config| config.id == id)
            .ok_or(StoreError::ConfigurationNotFound(id))?;

        for (i, config) in self.configurations.iter_mut().enumerate() {
            config.is_active = i == index;
        }
        let config = &mut self.configurations[index];
        config.updated_at = Timestamp::now();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedConfiguration;
    use pretty_assertions::assert_eq;

    fn store() -> Store {
        Store::seeded(&AppConfig::default())
    }

    #[test]
    fn seeds_exactly_one_active_configuration() {
        let store = store();
        let active: Vec<_> = store
            .configurations()
            .into_iter()
            .filter(|c| c.is_active)
            .map(|c| c.name)
            .collect();
        assert_eq!(active, vec!["Friendly".to_string()]);
    }

    #[test]
    fn unknown_default_falls_back_to_first() {
        let config = AppConfig {
            default: "Missing".into(),
            ..AppConfig::default()
        };
        let store = Store::seeded(&config);
        assert_eq!(store.active_configuration().unwrap().name, "Friendly");
    }

    #[test]
    fn repeated_default_name_activates_only_the_first() {
        let mut config = AppConfig::default();
        config.configurations.push(SeedConfiguration {
            name: "Friendly".into(),
            description: None,
            tags: Vec::new(),
        });

        let store = Store::seeded(&config);

        let active: Vec<ConfigurationId> = store
            .configurations()
            .iter()
            .filter(|c| c.is_active)
            .map(|c| c.id)
            .collect();
        assert_eq!(active, vec![ConfigurationId::new(1)]);
    }

    #[test]
    fn restored_conversation_without_messages_is_not_found() {
        let snapshot: Store = serde_json::from_value(serde_json::json!({
            "configurations": [],
            "conversations": [{
                "id": 3,
                "title": null,
                "created_at": "2024-05-01T10:00:00",
                "updated_at": "2024-05-01T10:00:00",
                "messages": []
            }],
            "feedback": [],
            "next_conversation_id": 3,
            "next_message_id": 0
        }))
        .unwrap();
        let store = store().with_history(snapshot);

        assert_eq!(store.conversations().len(), 1);
        assert_eq!(
            store.messages(ConversationId::new(3)),
            Err(StoreError::ConversationNotFound(ConversationId::new(3)))
        );
    }

    #[test]
    fn first_chat_opens_conversation_with_system_prompt() {
        let mut store = store();

        let reply = store.chat("hello", None).unwrap();

        assert_eq!(reply.response, "Echo [Friendly]: hello");
        let messages = store.messages(reply.conversation_id).unwrap();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(messages[2].id, Some(reply.message_id));
    }

    #[test]
    fn chat_in_unknown_conversation_fails() {
        let mut store = store();
        assert_eq!(
            store.chat("hi", Some(ConversationId::new(40))),
            Err(StoreError::ConversationNotFound(ConversationId::new(40)))
        );
    }

    #[test]
    fn activation_keeps_a_single_active_configuration() {
        let mut store = store();

        let activated = store.activate(ConfigurationId::new(2)).unwrap();
        assert_eq!(activated.name, "Formal");

        let flags: Vec<bool> = store.configurations().iter().map(|c| c.is_active).collect();
        assert_eq!(flags, vec![false, true]);
        assert!(store.activate(ConfigurationId::new(9)).is_err());
        assert_eq!(store.chat("x", None).unwrap().response, "Echo [Formal]: x");
    }

    #[test]
    fn conversations_are_listed_newest_first() {
        let mut store = store();
        let first = store.chat("one", None).unwrap().conversation_id;
        let second = store.chat("two", None).unwrap().conversation_id;
        store.chat("again", Some(first)).unwrap();

        let ids: Vec<ConversationId> = store.conversations().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(store.conversations()[0].message_count, 5);
    }

    #[test]
    fn feedback_requires_a_known_message() {
        let mut store = store();
        let reply = store.chat("hi", None).unwrap();

        let receipt = store
            .record_feedback(FeedbackRequest {
                message_id: reply.message_id,
                feedback_type: FeedbackKind::ThumbsUp,
            })
            .unwrap();
        assert_eq!(receipt.status, "recorded");

        assert_eq!(
            store.record_feedback(FeedbackRequest {
                message_id: MessageId::new(999),
                feedback_type: FeedbackKind::ThumbsDown,
            }),
            Err(StoreError::MessageNotFound(MessageId::new(999)))
        );
    }

    #[test]
    fn snapshot_survives_a_round_trip_with_new_seeds() {
        let mut original = store();
        let reply = original.chat("remember me", None).unwrap();
        let json = serde_json::to_string(&original).unwrap();

        let restored: Store = serde_json::from_str(&json).unwrap();
        let mut store = Store::seeded(&AppConfig::default()).with_history(restored);

        assert_eq!(store.messages(reply.conversation_id).unwrap().len(), 3);
        let next = store.chat("and me", None).unwrap();
        assert_ne!(next.conversation_id, reply.conversation_id);
    }
}
