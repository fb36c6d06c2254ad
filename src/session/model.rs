//! Session data model: conversations, messages, and title derivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SessionDefaults;

/// Unique identifier of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message before it is appended. The store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub image_url: Option<String>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            image_url: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            image_url: None,
        }
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// A message stored in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    /// Attached image (data URI or remote URL). Never changes once set.
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set when the content was replaced through an edit.
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    pub(crate) fn from_new(new: NewMessage) -> Self {
        Self {
            id: MessageId::new(),
            role: new.role,
            content: new.content,
            image_url: new.image_url,
            created_at: Utc::now(),
            edited_at: None,
        }
    }
}

/// Where a session's title came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleSource {
    /// Placeholder or creation title; may still be derived.
    Default,
    /// Taken from the first user message.
    Derived,
    /// Set explicitly by the user; never re-derived.
    Renamed,
}

/// A conversation with its own messages and settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub title_source: TitleSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Chronological order, which is also display order.
    pub messages: Vec<Message>,
    pub persona: String,
    pub language: String,
}

impl Session {
    pub(crate) fn new(title: Option<&str>, defaults: &SessionDefaults) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            title: title
                .map(str::to_string)
                .unwrap_or_else(|| defaults.title.clone()),
            title_source: TitleSource::Default,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            persona: defaults.persona.clone(),
            language: defaults.language.clone(),
        }
    }

    /// Find a message by id.
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Append a message, deriving the title when this is the opening user
    /// message of an untitled session.
    pub(crate) fn push_message(&mut self, message: Message, title_max_chars: usize) {
        let opens_session = self.messages.is_empty();
        if opens_session
            && message.role == Role::User
            && self.title_source == TitleSource::Default
            && !message.content.is_empty()
        {
            self.title = derive_title(&message.content, title_max_chars);
            self.title_source = TitleSource::Derived;
        }
        self.updated_at = message.created_at;
        self.messages.push(message);
    }
}

/// Partial settings update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub persona: Option<String>,
    pub language: Option<String>,
}

impl SettingsUpdate {
    pub fn persona(persona: impl Into<String>) -> Self {
        Self {
            persona: Some(persona.into()),
            language: None,
        }
    }

    pub fn language(language: impl Into<String>) -> Self {
        Self {
            persona: None,
            language: Some(language.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.persona.is_none() && self.language.is_none()
    }
}

/// Title for a session: the first `max_chars` characters of `content`,
/// with `…` appended when anything was cut.
pub fn derive_title(content: &str, max_chars: usize) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
