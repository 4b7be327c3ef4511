//! Wire contracts of the chat backend's `/api/v1` surface.
//!
//! Shared by the terminal client and the development backend so both ends
//! agree on field names and encodings.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Path prefix every API route lives under.
pub const API_PREFIX: &str = "/api/v1";

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

integer_id!(
    /// Backend-assigned message identifier.
    MessageId
);
integer_id!(
    /// Backend-assigned conversation identifier.
    ConversationId
);
integer_id!(
    /// Backend-assigned configuration ("personality") identifier.
    ConfigurationId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Client-side error markers. Never sent to the backend.
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    ThumbsUp,
    ThumbsDown,
}

impl FeedbackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThumbsUp => "thumbs_up",
            Self::ThumbsDown => "thumbs_down",
        }
    }
}

/// A point in time as exchanged with the backend.
///
/// The backend writes naive UTC datetimes (`2024-05-01T12:30:00.123456`);
/// offset-qualified RFC 3339 strings are accepted as well. Always written
/// back out as RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self(dt.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| Self(naive.and_utc()))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackKind>,
}

impl Message {
    fn local(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            created_at: None,
            feedback: None,
        }
    }

    /// A message typed by the user that the backend has not confirmed yet.
    pub fn user(content: impl Into<String>) -> Self {
        Self::local(Role::User, content)
    }

    pub fn assistant(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            ..Self::local(Role::Assistant, content)
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::local(Role::System, content)
    }

    /// Only assistant replies with a backend id can be rated.
    pub fn is_rateable(&self) -> bool {
        self.role == Role::Assistant && self.id.is_some()
    }
}

/// Summary row of the "previous conversations" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub message_count: u64,
}

impl Conversation {
    pub const UNTITLED: &'static str = "Untitled Conversation";

    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => Self::UNTITLED,
        }
    }
}

/// A backend behavior profile. Exactly one is expected to be active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub id: ConfigurationId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: u32,
    pub is_active: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub updated_at: Timestamp,
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

/// Reply of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
}

/// Body of `POST /feedback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub message_id: MessageId,
    pub feedback_type: FeedbackKind,
}

/// What the backend answers to `POST /feedback`. Clients need not read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackReceipt {
    pub status: String,
    pub feedback_id: i64,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
