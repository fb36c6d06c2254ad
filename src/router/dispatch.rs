//! Input router: turns one submitted line into a session message, a view
//! switch, or an image generation, and delivers capability replies back to
//! the session that asked.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use super::command::CommandAction;
use super::parser::{InputParser, ParsedInput};
use crate::capability::{
    CapabilityId, CapabilityInvoker, ChatReply, ChatRequest, HistoryEntry, ImageAttachment,
    ImageRequest, ImageResult, invoke_typed,
};
use crate::error::{CapabilityError, RouteError, StoreError};
use crate::session::{Message, NewMessage, Role, SessionId, SessionStore};
use crate::view::{Toast, ViewSink, ViewSwitch};

const CHAT_FAILURE_REPLY: &str = "Sorry, something went wrong.";
const IMAGE_PLACEHOLDER: &str = "Generating image...";
const IMAGE_FAILURE_REPLY: &str = "Sorry, I failed to generate the image.";

/// One submission from the input box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInput {
    pub text: String,
    /// Attached image (data URI or remote URL). Ignored by commands.
    pub image_url: Option<String>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_url: None,
        }
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// What a submission led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Nothing to do (blank input or a command missing its argument).
    Ignored,
    /// Another capability's view was opened with a seed.
    SwitchedView(ViewSwitch),
    /// The capability answered and its reply was appended.
    Replied {
        session_id: SessionId,
        reply: Message,
    },
    /// The capability failed and a failure message was appended instead.
    Recovered {
        session_id: SessionId,
        reply: Message,
        error: String,
    },
    /// The originating session was deleted before the reply arrived.
    Discarded { session_id: SessionId },
}

/// Clears the busy flag when dropped, whatever path the request took.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A claimed submission slot, see `InputRouter::try_reserve`.
pub struct SubmitPermit {
    router: InputRouter,
    _guard: BusyGuard,
}

impl SubmitPermit {
    /// Run one submission, releasing the slot when it finishes.
    pub async fn submit(self, input: UserInput) -> Result<RouteOutcome, RouteError> {
        match self.router.begin(input)? {
            Step::Done(outcome) => Ok(outcome),
            Step::Pending(pending) => Ok(self.router.complete(pending).await),
        }
    }
}

/// The work left after the synchronous part of a submission: one capability
/// call whose reply belongs to `session_id`.
#[derive(Debug)]
enum PendingReply {
    Chat {
        session_id: SessionId,
        request: ChatRequest,
    },
    Image {
        session_id: SessionId,
        prompt: String,
    },
}

/// Result of the synchronous part of a submission.
enum Step {
    /// Finished without a capability call.
    Done(RouteOutcome),
    Pending(PendingReply),
}

impl PendingReply {
    fn session_id(&self) -> SessionId {
        match self {
            Self::Chat { session_id, .. } | Self::Image { session_id, .. } => *session_id,
        }
    }
}

/// Routes user input for the active session.
///
/// Cheap to clone; spawn `submit` on a task so the UI can keep switching and
/// deleting sessions while a reply is outstanding.
#[derive(Clone)]
pub struct InputRouter {
    store: Arc<SessionStore>,
    capabilities: Arc<dyn CapabilityInvoker>,
    views: Arc<dyn ViewSink>,
    sending: Arc<AtomicBool>,
}

impl InputRouter {
    pub fn new(
        store: Arc<SessionStore>,
        capabilities: Arc<dyn CapabilityInvoker>,
        views: Arc<dyn ViewSink>,
    ) -> Self {
        Self {
            store,
            capabilities,
            views,
            sending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a submission is in flight.
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Claim the single submission slot without waiting.
    ///
    /// The router stays busy until the returned permit is used or dropped.
    pub fn try_reserve(&self) -> Result<SubmitPermit, RouteError> {
        let Some(guard) = BusyGuard::acquire(&self.sending) else {
            debug!("Submission rejected while another is in flight");
            return Err(RouteError::Busy);
        };
        Ok(SubmitPermit {
            router: self.clone(),
            _guard: guard,
        })
    }

    /// Handle one submission end to end.
    ///
    /// Rejected with `RouteError::Busy` while another submission is in flight.
    /// Capability failures never surface as errors: they become a failure
    /// message in the originating session plus a toast.
    pub async fn submit(&self, input: UserInput) -> Result<RouteOutcome, RouteError> {
        self.try_reserve()?.submit(input).await
    }

    /// Synchronous part of a submission: classify, append what must appear
    /// right away, and capture the session the reply belongs to.
    fn begin(&self, input: UserInput) -> Result<Step, StoreError> {
        if input.text.trim().is_empty() && input.image_url.is_none() {
            return Ok(Step::Done(RouteOutcome::Ignored));
        }

        match InputParser::parse(&input.text) {
            ParsedInput::Command {
                command,
                argument,
                raw,
            } => match command.action() {
                CommandAction::SwitchView => {
                    let switch = ViewSwitch {
                        capability: command.capability(),
                        seed: command.seed(argument),
                    };
                    info!(command = %command, capability = %switch.capability, "Switching view");
                    self.views.switch_view(switch.clone());
                    Ok(Step::Done(RouteOutcome::SwitchedView(switch)))
                }
                CommandAction::GenerateImage => {
                    let prompt = argument;
                    if prompt.trim().is_empty() {
                        return Ok(Step::Done(RouteOutcome::Ignored));
                    }
                    let (session_id, _) = self.store.append_message(NewMessage::user(raw))?;
                    self.store
                        .append_message_to(session_id, NewMessage::assistant(IMAGE_PLACEHOLDER))?;
                    info!(session_id = %session_id, "Generating image");
                    Ok(Step::Pending(PendingReply::Image { session_id, prompt }))
                }
            },
            ParsedInput::Message { content } => {
                let image = input.image_url.as_deref().and_then(|url| {
                    let attachment = ImageAttachment::from_data_uri(url);
                    if attachment.is_none() {
                        warn!("Attached image is not a data URI, sending text only");
                    }
                    attachment
                });

                let (session_id, sent) = self.store.append_message(NewMessage {
                    role: Role::User,
                    content: content.clone(),
                    image_url: input.image_url,
                })?;
                let session = self
                    .store
                    .session(session_id)
                    .ok_or(StoreError::SessionNotFound { id: session_id })?;

                let request = ChatRequest {
                    message: content,
                    chat_history: session
                        .messages
                        .iter()
                        .take_while(|m| m.id != sent.id)
                        .map(HistoryEntry::from)
                        .collect(),
                    persona: session.persona,
                    language: session.language,
                    image,
                };

                Ok(Step::Pending(PendingReply::Chat {
                    session_id,
                    request,
                }))
            }
        }
    }

    /// Await the capability and post its reply to the captured session.
    async fn complete(&self, pending: PendingReply) -> RouteOutcome {
        let session_id = pending.session_id();

        let (result, failure_reply, failure_toast) = match pending {
            PendingReply::Chat { request, .. } => {
                let result = invoke_typed::<_, ChatReply>(
                    self.capabilities.as_ref(),
                    CapabilityId::Chat,
                    &request,
                )
                .await
                .map(|reply| NewMessage::assistant(reply.response));
                (
                    result,
                    CHAT_FAILURE_REPLY,
                    Toast::error("An error occurred", "Failed to get a response from the AI."),
                )
            }
            PendingReply::Image { prompt, .. } => {
                let result = invoke_typed::<_, ImageResult>(
                    self.capabilities.as_ref(),
                    CapabilityId::Imagine,
                    &ImageRequest {
                        prompt: prompt.clone(),
                    },
                )
                .await
                .map(|image| {
                    NewMessage::assistant(format!(
                        "Here is your generated image for: \"{prompt}\""
                    ))
                    .with_image(image.image_url)
                });
                (
                    result,
                    IMAGE_FAILURE_REPLY,
                    Toast::error("Image Generation Failed", "Could not generate the image."),
                )
            }
        };

        match result {
            Ok(reply) => self.deliver(session_id, reply, None),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Capability call failed");
                self.views.notify(failure_toast);
                self.deliver(session_id, NewMessage::assistant(failure_reply), Some(e))
            }
        }
    }

    fn deliver(
        &self,
        session_id: SessionId,
        reply: NewMessage,
        error: Option<CapabilityError>,
    ) -> RouteOutcome {
        match self.store.append_message_to(session_id, reply) {
            Ok(reply) => match error {
                None => RouteOutcome::Replied { session_id, reply },
                Some(e) => RouteOutcome::Recovered {
                    session_id,
                    reply,
                    error: e.to_string(),
                },
            },
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    error = %e,
                    "Reply arrived for a deleted session, discarding"
                );
                self.views.notify(Toast::info(
                    "Reply discarded",
                    "The conversation was deleted before the reply arrived.",
                ));
                RouteOutcome::Discarded { session_id }
            }
        }
    }
}
