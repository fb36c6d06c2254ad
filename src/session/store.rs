//! Session store: in-memory session collection with broadcast of every
//! mutation to subscribed views.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::model::{
    Message, MessageId, NewMessage, Session, SessionId, SettingsUpdate, TitleSource,
};
use crate::config::SessionDefaults;
use crate::error::StoreError;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Change notification published by each store mutation, in the order the
/// mutations were applied.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    SessionCreated { session: Session },
    SessionDeleted { id: SessionId },
    ActiveSessionChanged { id: SessionId },
    MessageAppended {
        session_id: SessionId,
        message: Message,
    },
    MessageEdited {
        session_id: SessionId,
        message: Message,
    },
    SessionUpdated { session: Session },
}

struct StoreState {
    /// Display order: most recently active first.
    sessions: Vec<Session>,
    active: Option<SessionId>,
}

impl StoreState {
    fn position(&self, id: SessionId) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    fn get_mut(&mut self, id: SessionId) -> Result<&mut Session, StoreError> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::SessionNotFound { id })
    }
}

/// Owner of all conversation sessions and the active-session pointer.
///
/// Every operation takes the single lock for its whole duration, so callers
/// on different tasks never observe a half-applied update.
pub struct SessionStore {
    state: Mutex<StoreState>,
    defaults: SessionDefaults,
    tx: broadcast::Sender<StoreEvent>,
}

impl SessionStore {
    /// Create a store holding one fresh, active session.
    pub fn new(defaults: SessionDefaults) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        let initial = Session::new(None, &defaults);
        info!(session_id = %initial.id, "Session store initialized");
        Arc::new(Self {
            state: Mutex::new(StoreState {
                active: Some(initial.id),
                sessions: vec![initial],
            }),
            defaults,
            tx,
        })
    }

    /// Subscribe to store change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send while the caller still holds the state lock, so events go out in
    /// the order mutations were applied. `send` never blocks.
    fn publish(&self, _state: &StoreState, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    /// Create a new session at the front of the list and make it active.
    pub fn create_session(&self, title: Option<&str>) -> Session {
        let session = Session::new(title, &self.defaults);
        {
            let mut state = self.lock();
            state.sessions.insert(0, session.clone());
            state.active = Some(session.id);
            self.publish(
                &state,
                StoreEvent::SessionCreated {
                    session: session.clone(),
                },
            );
            self.publish(&state, StoreEvent::ActiveSessionChanged { id: session.id });
        }

        info!(session_id = %session.id, "Session created");
        session
    }

    /// Delete a session. Deleting the active session activates the first
    /// remaining one, or a fresh session when none remain.
    pub fn delete_session(&self, id: SessionId) -> Result<(), StoreError> {
        {
            let mut state = self.lock();
            let index = state
                .position(id)
                .ok_or(StoreError::SessionNotFound { id })?;
            state.sessions.remove(index);
            self.publish(&state, StoreEvent::SessionDeleted { id });

            if state.active == Some(id) {
                let next = match state.sessions.first() {
                    Some(next) => next.id,
                    None => {
                        let fresh = Session::new(None, &self.defaults);
                        let fresh_id = fresh.id;
                        debug!(session_id = %fresh_id, "Last session deleted, created replacement");
                        state.sessions.push(fresh.clone());
                        self.publish(&state, StoreEvent::SessionCreated { session: fresh });
                        fresh_id
                    }
                };
                state.active = Some(next);
                self.publish(&state, StoreEvent::ActiveSessionChanged { id: next });
            }
        }

        info!(session_id = %id, "Session deleted");
        Ok(())
    }

    /// Make an existing session the active one.
    pub fn set_active_session(&self, id: SessionId) -> Result<(), StoreError> {
        {
            let mut state = self.lock();
            if state.position(id).is_none() {
                warn!(session_id = %id, "Cannot activate unknown session");
                return Err(StoreError::SessionNotFound { id });
            }
            state.active = Some(id);
            self.publish(&state, StoreEvent::ActiveSessionChanged { id });
        }

        debug!(session_id = %id, "Active session changed");
        Ok(())
    }

    /// Append a message to the active session.
    ///
    /// Returns the id of the session it landed in together with the stored
    /// message.
    pub fn append_message(&self, new: NewMessage) -> Result<(SessionId, Message), StoreError> {
        let mut state = self.lock();
        let session_id = state.active.ok_or(StoreError::NoActiveSession)?;
        let message = self.push_locked(&mut state, session_id, new)?;
        Ok((session_id, message))
    }

    /// Append a message to a specific session, regardless of which one is
    /// active. Used to deliver replies to the session that asked.
    pub fn append_message_to(
        &self,
        session_id: SessionId,
        new: NewMessage,
    ) -> Result<Message, StoreError> {
        let mut state = self.lock();
        self.push_locked(&mut state, session_id, new)
    }

    fn push_locked(
        &self,
        state: &mut StoreState,
        session_id: SessionId,
        new: NewMessage,
    ) -> Result<Message, StoreError> {
        let index = state
            .position(session_id)
            .ok_or(StoreError::SessionNotFound { id: session_id })?;

        let mut session = state.sessions.remove(index);
        let message = Message::from_new(new);
        session.push_message(message.clone(), self.defaults.title_max_chars);
        state.sessions.insert(0, session);

        debug!(
            session_id = %session_id,
            message_id = %message.id,
            role = %message.role,
            "Message appended"
        );
        self.publish(
            state,
            StoreEvent::MessageAppended {
                session_id,
                message: message.clone(),
            },
        );
        Ok(message)
    }

    /// Replace the content of one message. Ordering and title are untouched.
    pub fn edit_message(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        content: impl Into<String>,
    ) -> Result<Message, StoreError> {
        let edited = {
            let mut state = self.lock();
            let session = state.get_mut(session_id)?;
            let message = session
                .messages
                .iter_mut()
                .find(|m| m.id == message_id)
                .ok_or(StoreError::MessageNotFound {
                    session_id,
                    message_id,
                })?;
            message.content = content.into();
            message.edited_at = Some(Utc::now());
            let edited = message.clone();
            self.publish(
                &state,
                StoreEvent::MessageEdited {
                    session_id,
                    message: edited.clone(),
                },
            );
            edited
        };

        debug!(session_id = %session_id, message_id = %message_id, "Message edited");
        Ok(edited)
    }

    /// Merge persona/language into a session's settings.
    pub fn update_session_settings(
        &self,
        session_id: SessionId,
        update: SettingsUpdate,
    ) -> Result<Session, StoreError> {
        let updated = {
            let mut state = self.lock();
            let session = state.get_mut(session_id)?;
            if let Some(persona) = update.persona {
                session.persona = persona;
            }
            if let Some(language) = update.language {
                session.language = language;
            }
            session.updated_at = Utc::now();
            let updated = session.clone();
            self.publish(
                &state,
                StoreEvent::SessionUpdated {
                    session: updated.clone(),
                },
            );
            updated
        };

        info!(
            session_id = %session_id,
            persona = %updated.persona,
            language = %updated.language,
            "Session settings updated"
        );
        Ok(updated)
    }

    /// Give a session an explicit title that derivation will not replace.
    pub fn rename_session(
        &self,
        session_id: SessionId,
        title: impl Into<String>,
    ) -> Result<Session, StoreError> {
        let mut state = self.lock();
        let session = state.get_mut(session_id)?;
        session.title = title.into();
        session.title_source = TitleSource::Renamed;
        session.updated_at = Utc::now();
        let renamed = session.clone();
        self.publish(
            &state,
            StoreEvent::SessionUpdated {
                session: renamed.clone(),
            },
        );
        Ok(renamed)
    }

    /// Snapshot of all sessions, most recently active first.
    pub fn sessions(&self) -> Vec<Session> {
        self.lock().sessions.clone()
    }

    /// Snapshot of one session.
    pub fn session(&self, id: SessionId) -> Option<Session> {
        self.lock().sessions.iter().find(|s| s.id == id).cloned()
    }

    pub fn active_session_id(&self) -> Option<SessionId> {
        self.lock().active
    }

    /// Snapshot of the active session.
    pub fn active_session(&self) -> Option<Session> {
        let state = self.lock();
        let id = state.active?;
        state.sessions.iter().find(|s| s.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().sessions.is_empty()
    }
}
