//! View selection: the sink that receives capability switches and toasts,
//! and a concrete selector that remembers the active view and its seed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::capability::{CapabilityId, CapabilityInvoker};
use crate::error::CapabilityError;
use crate::router::SeedPayload;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Request to show another capability pre-filled with a seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSwitch {
    pub capability: CapabilityId,
    pub seed: SeedPayload,
}

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Info,
    Error,
}

/// Short user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub kind: ToastKind,
    pub title: String,
    pub description: String,
}

impl Toast {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Info,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Receiver of routing side effects owned by the view layer.
pub trait ViewSink: Send + Sync {
    /// Show `switch.capability` seeded with `switch.seed`.
    fn switch_view(&self, switch: ViewSwitch);

    /// Show a toast.
    fn notify(&self, toast: Toast);
}

/// Event emitted by the `ViewSelector`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    Switched { capability: CapabilityId },
    Toast { toast: Toast },
}

struct ViewState {
    active: CapabilityId,
    seed: Option<ViewSwitch>,
}

/// Tracks which capability view is showing and the seed waiting for it.
pub struct ViewSelector {
    state: Mutex<ViewState>,
    tx: broadcast::Sender<ViewEvent>,
}

impl ViewSelector {
    /// Start on the chat view with no seed.
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            state: Mutex::new(ViewState {
                active: CapabilityId::Chat,
                seed: None,
            }),
            tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Currently showing capability.
    pub fn active(&self) -> CapabilityId {
        self.lock().active
    }

    /// Manual selection (e.g. a tab click). Drops any pending seed.
    pub fn select(&self, capability: CapabilityId) {
        {
            let mut state = self.lock();
            state.active = capability;
            state.seed = None;
        }
        let _ = self.tx.send(ViewEvent::Switched { capability });
    }

    /// Take the seed waiting for `capability`. Returns it at most once.
    pub fn take_seed(&self, capability: CapabilityId) -> Option<SeedPayload> {
        let mut state = self.lock();
        if state.seed.as_ref()?.capability != capability {
            return None;
        }
        state.seed.take().map(|switch| switch.seed)
    }

    /// Run `capability` with the seed waiting for it, then return to chat.
    ///
    /// Returns `None` when no seed is waiting. A failure is also shown as an
    /// error toast.
    pub async fn run_seeded(
        &self,
        capabilities: &dyn CapabilityInvoker,
        capability: CapabilityId,
    ) -> Option<Result<serde_json::Value, CapabilityError>> {
        let seed = self.take_seed(capability)?;
        info!(capability = %capability, "Running seeded view");

        let result = match serde_json::to_value(&seed) {
            Ok(input) => capabilities.invoke(capability, input).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = &result {
            warn!(capability = %capability, error = %e, "Seeded capability failed");
            self.notify(Toast::error("Error", failure_description(capability)));
        }
        self.select(CapabilityId::Chat);
        Some(result)
    }
}

fn failure_description(capability: CapabilityId) -> &'static str {
    match capability {
        CapabilityId::Homework => "Failed to get help with your homework. Please try again.",
        CapabilityId::Explain => "Failed to get an explanation. Please try again.",
        CapabilityId::Summarize => "Failed to summarize the text. Please try again.",
        CapabilityId::Ideas => "Failed to brainstorm ideas. Please try again.",
        CapabilityId::Flashcards => "Failed to create flashcards. Please try again.",
        CapabilityId::Imagine => "Could not generate the image.",
        CapabilityId::Chat => "Failed to get a response from the AI.",
    }
}

impl ViewSink for ViewSelector {
    fn switch_view(&self, switch: ViewSwitch) {
        let capability = switch.capability;
        {
            let mut state = self.lock();
            state.active = capability;
            state.seed = Some(switch);
        }
        debug!(capability = %capability, "View switched with seed");
        let _ = self.tx.send(ViewEvent::Switched { capability });
    }

    fn notify(&self, toast: Toast) {
        let _ = self.tx.send(ViewEvent::Toast { toast });
    }
}
