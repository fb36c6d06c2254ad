//! Conversation sessions: data model and the in-memory store that owns them.

pub mod model;
pub mod store;

pub use model::{
    Message, MessageId, NewMessage, Role, Session, SessionId, SettingsUpdate, TitleSource,
    derive_title,
};
pub use store::{SessionStore, StoreEvent};
