//! Capabilities: the AI-backed features the assistant can hand work to.
//!
//! The core treats every capability as an opaque async call
//! (`invoke(capability, input) -> output | error`). Only the chat and image
//! capabilities have typed bodies here because the router itself calls them;
//! the other capabilities are reached through view switches.

pub mod http;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;
use crate::session::{Message, Role};

pub use http::HttpCapabilityClient;

/// Stable identifier of a capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityId {
    /// Free-form conversation in a session.
    #[default]
    Chat,
    /// Step-by-step homework solving.
    Homework,
    Explain,
    Summarize,
    /// Idea brainstorming.
    Ideas,
    /// Image generation from a prompt.
    Imagine,
    Flashcards,
}

impl CapabilityId {
    pub const ALL: [CapabilityId; 7] = [
        Self::Chat,
        Self::Homework,
        Self::Explain,
        Self::Summarize,
        Self::Ideas,
        Self::Imagine,
        Self::Flashcards,
    ];

    /// URL-safe name, also used as the backend route.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Homework => "homework",
            Self::Explain => "explain",
            Self::Summarize => "summarize",
            Self::Ideas => "ideas",
            Self::Imagine => "imagine",
            Self::Flashcards => "flashcards",
        }
    }
}

impl std::fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl std::str::FromStr for CapabilityId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.slug() == s)
            .ok_or_else(|| format!("Unknown capability: {}", s))
    }
}

/// The external AI backend.
#[async_trait]
pub trait CapabilityInvoker: Send + Sync {
    /// Run one capability. The core only looks at pass/fail and the typed
    /// fields it asked for.
    async fn invoke(
        &self,
        capability: CapabilityId,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, CapabilityError>;
}

/// Invoke a capability with typed request and response bodies.
pub async fn invoke_typed<I, O>(
    invoker: &dyn CapabilityInvoker,
    capability: CapabilityId,
    input: &I,
) -> Result<O, CapabilityError>
where
    I: Serialize + Sync,
    O: DeserializeOwned,
{
    let input = serde_json::to_value(input)?;
    let output = invoker.invoke(capability, input).await?;
    serde_json::from_value(output).map_err(|e| CapabilityError::InvalidResponse {
        capability,
        reason: e.to_string(),
    })
}

// ── Chat ────────────────────────────────────────────────────────────────

/// One prior turn sent along with a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// An inline image attached to a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    pub url: String,
    pub content_type: String,
}

static DATA_URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:(.*?);base64,").expect("valid data URI regex"));

impl ImageAttachment {
    /// Build an attachment from a base64 data URI. Returns `None` for
    /// anything else (including remote URLs).
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let content_type = DATA_URI_RE.captures(uri)?.get(1)?.as_str();
        if content_type.is_empty() {
            return None;
        }
        Some(Self {
            url: uri.to_string(),
            content_type: content_type.to_string(),
        })
    }
}

/// Input of the chat capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    /// The conversation before `message`.
    pub chat_history: Vec<HistoryEntry>,
    pub persona: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,
}

/// Output of the chat capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

// ── Image generation ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    pub image_url: String,
}
