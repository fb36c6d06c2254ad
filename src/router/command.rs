//! Slash command table: maps each command token to the capability it opens
//! and the seed payload it hands over.

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityId;

/// Leading character that marks a line as a possible command.
pub const COMMAND_SENTINEL: char = '/';

/// Known slash commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `/study <question>`, homework solving.
    Study,
    /// `/explain <topic>`
    Explain,
    /// `/summarize <text>`
    Summarize,
    /// `/idea <topic>`, brainstorming.
    Idea,
    /// `/imagine <prompt>` generates an image inside the chat session.
    Imagine,
    /// `/flashcards <topic>`
    Flashcards,
}

/// What the router does with a recognised command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Hand the seed to another capability's view.
    SwitchView,
    /// Generate an image and post it into the current session.
    GenerateImage,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Self::Study,
        Self::Explain,
        Self::Summarize,
        Self::Idea,
        Self::Imagine,
        Self::Flashcards,
    ];

    /// Command token including the sentinel.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Study => "/study",
            Self::Explain => "/explain",
            Self::Summarize => "/summarize",
            Self::Idea => "/idea",
            Self::Imagine => "/imagine",
            Self::Flashcards => "/flashcards",
        }
    }

    /// Look up a token, ignoring ASCII case.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.token().eq_ignore_ascii_case(token))
    }

    pub fn capability(&self) -> CapabilityId {
        match self {
            Self::Study => CapabilityId::Homework,
            Self::Explain => CapabilityId::Explain,
            Self::Summarize => CapabilityId::Summarize,
            Self::Idea => CapabilityId::Ideas,
            Self::Imagine => CapabilityId::Imagine,
            Self::Flashcards => CapabilityId::Flashcards,
        }
    }

    pub fn action(&self) -> CommandAction {
        match self {
            Self::Imagine => CommandAction::GenerateImage,
            _ => CommandAction::SwitchView,
        }
    }

    /// Build this command's seed payload from its argument text.
    pub fn seed(&self, argument: impl Into<String>) -> SeedPayload {
        let argument = argument.into();
        match self {
            Self::Study => SeedPayload::Question { question: argument },
            Self::Explain | Self::Idea | Self::Flashcards => SeedPayload::Topic { topic: argument },
            Self::Summarize => SeedPayload::Text { text: argument },
            Self::Imagine => SeedPayload::Prompt { prompt: argument },
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Data pre-filling a capability's input. Serializes as a single-key object,
/// e.g. `{"topic": "photosynthesis"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedPayload {
    Question { question: String },
    Topic { topic: String },
    Text { text: String },
    Prompt { prompt: String },
}

impl SeedPayload {
    /// The seeded text, whichever key it lives under.
    pub fn value(&self) -> &str {
        match self {
            Self::Question { question } => question,
            Self::Topic { topic } => topic,
            Self::Text { text } => text,
            Self::Prompt { prompt } => prompt,
        }
    }
}
