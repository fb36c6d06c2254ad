//! Integration tests for the input router wired to a real session store and
//! view selector.
//!
//! The capability backend is a stub that can hold a reply until the test
//! releases it, so session changes can happen while a request is in flight.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Notify, broadcast};
use tokio::time::timeout;

use clarity_assist::capability::{CapabilityId, CapabilityInvoker};
use clarity_assist::config::SessionDefaults;
use clarity_assist::error::{CapabilityError, RouteError};
use clarity_assist::router::{InputRouter, RouteOutcome, SeedPayload, UserInput};
use clarity_assist::session::{Role, SessionStore, StoreEvent};
use clarity_assist::view::{ToastKind, ViewEvent, ViewSelector, ViewSink};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Stub backend. Holds every call until `release` is notified, then answers
/// per capability.
struct GatedBackend {
    gate: Notify,
    gated: bool,
    fail: bool,
    calls: Mutex<Vec<CapabilityId>>,
}

impl GatedBackend {
    fn new(gated: bool, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            gate: Notify::new(),
            gated,
            fail,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl CapabilityInvoker for GatedBackend {
    async fn invoke(
        &self,
        capability: CapabilityId,
        input: Value,
    ) -> Result<Value, CapabilityError> {
        self.calls.lock().unwrap().push(capability);
        if self.gated {
            self.gate.notified().await;
        }
        if self.fail {
            return Err(CapabilityError::Rejected {
                capability,
                status: 503,
                body: "unavailable".into(),
            });
        }
        match capability {
            CapabilityId::Imagine => {
                let prompt = input["prompt"].as_str().unwrap_or("x");
                Ok(json!({ "imageUrl": format!("https://img.example/{prompt}.png") }))
            }
            _ => {
                let message = input["message"].as_str().unwrap_or("");
                Ok(json!({ "response": format!("echo: {message}") }))
            }
        }
    }
}

fn wire(backend: Arc<GatedBackend>) -> (InputRouter, Arc<SessionStore>, Arc<ViewSelector>) {
    let store = SessionStore::new(SessionDefaults::default());
    let views = ViewSelector::new();
    let router = InputRouter::new(
        Arc::clone(&store),
        backend,
        Arc::clone(&views) as Arc<dyn ViewSink>,
    );
    (router, store, views)
}

/// Wait until the store broadcasts a message with `content`.
async fn wait_for_message(rx: &mut broadcast::Receiver<StoreEvent>, content: &str) {
    loop {
        if let StoreEvent::MessageAppended { message, .. } = rx.recv().await.unwrap()
            && message.content == content
        {
            return;
        }
    }
}

#[tokio::test]
async fn image_reply_lands_in_originating_session_after_switch() {
    timeout(TEST_TIMEOUT, async {
        let backend = GatedBackend::new(true, false);
        let (router, store, _views) = wire(Arc::clone(&backend));
        let mut events = store.subscribe();
        let origin = store.active_session_id().unwrap();

        let task = tokio::spawn({
            let router = router.clone();
            async move { router.submit(UserInput::text("/imagine sunset")).await }
        });

        wait_for_message(&mut events, "Generating image...").await;
        let other = store.create_session(None);
        assert_eq!(store.active_session_id(), Some(other.id));
        assert!(router.is_sending());

        backend.release();
        let outcome = task.await.unwrap().unwrap();

        assert!(matches!(
            outcome,
            RouteOutcome::Replied { session_id, .. } if session_id == origin
        ));
        let origin_messages = store.session(origin).unwrap().messages;
        assert_eq!(origin_messages.len(), 3);
        assert_eq!(
            origin_messages[2].image_url.as_deref(),
            Some("https://img.example/sunset.png")
        );
        assert!(store.session(other.id).unwrap().messages.is_empty());
        assert!(!router.is_sending());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn chat_reply_for_deleted_session_is_discarded() {
    timeout(TEST_TIMEOUT, async {
        let backend = GatedBackend::new(true, false);
        let (router, store, views) = wire(Arc::clone(&backend));
        let mut events = store.subscribe();
        let mut view_events = views.subscribe();
        let origin = store.active_session_id().unwrap();

        let task = tokio::spawn({
            let router = router.clone();
            async move { router.submit(UserInput::text("hello")).await }
        });

        wait_for_message(&mut events, "hello").await;
        store.delete_session(origin).unwrap();
        backend.release();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, RouteOutcome::Discarded { session_id: origin });
        assert!(store.session(origin).is_none());
        for session in store.sessions() {
            assert!(session.messages.is_empty());
        }

        match view_events.recv().await.unwrap() {
            ViewEvent::Toast { toast } => assert_eq!(toast.kind, ToastKind::Info),
            other => panic!("Expected Toast, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn second_submission_is_rejected_while_first_is_pending() {
    timeout(TEST_TIMEOUT, async {
        let backend = GatedBackend::new(true, false);
        let (router, store, _views) = wire(Arc::clone(&backend));
        let mut events = store.subscribe();

        let task = tokio::spawn({
            let router = router.clone();
            async move { router.submit(UserInput::text("first")).await }
        });
        wait_for_message(&mut events, "first").await;

        assert!(matches!(
            router.submit(UserInput::text("second")).await,
            Err(RouteError::Busy)
        ));

        backend.release();
        task.await.unwrap().unwrap();

        let contents: Vec<String> = store
            .active_session()
            .unwrap()
            .messages
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["first".to_string(), "echo: first".to_string()]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn switch_command_seeds_view_once() {
    timeout(TEST_TIMEOUT, async {
        let backend = GatedBackend::new(false, false);
        let (router, store, views) = wire(Arc::clone(&backend));

        let outcome = router
            .submit(UserInput::text("/study what is 2+2?"))
            .await
            .unwrap();

        assert!(matches!(outcome, RouteOutcome::SwitchedView(_)));
        assert_eq!(views.active(), CapabilityId::Homework);
        assert_eq!(
            views.take_seed(CapabilityId::Homework),
            Some(SeedPayload::Question {
                question: "what is 2+2?".into()
            })
        );
        assert_eq!(views.take_seed(CapabilityId::Homework), None);
        assert!(store.active_session().unwrap().messages.is_empty());
        assert!(backend.calls.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn conversation_round_trip_derives_title_and_orders_sessions() {
    timeout(TEST_TIMEOUT, async {
        let backend = GatedBackend::new(false, false);
        let (router, store, _views) = wire(backend);
        let first = store.active_session_id().unwrap();
        let second = store.create_session(None).id;

        router
            .submit(UserInput::text("Explain the difference between mitosis and meiosis"))
            .await
            .unwrap();

        let session = store.session(second).unwrap();
        assert_eq!(session.title, "Explain the difference between…");
        assert_eq!(session.messages[1].role, Role::Assistant);

        store.set_active_session(first).unwrap();
        router.submit(UserInput::text("hi")).await.unwrap();

        let order: Vec<_> = store.sessions().into_iter().map(|s| s.id).collect();
        assert_eq!(order, vec![first, second]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn backend_failure_is_recovered_with_toast() {
    timeout(TEST_TIMEOUT, async {
        let backend = GatedBackend::new(false, true);
        let (router, store, views) = wire(backend);
        let mut view_events = views.subscribe();

        let outcome = router.submit(UserInput::text("hello")).await.unwrap();

        match outcome {
            RouteOutcome::Recovered { error, reply, .. } => {
                assert!(error.contains("503"), "error was {error}");
                assert_eq!(reply.content, "Sorry, something went wrong.");
            }
            other => panic!("Expected Recovered, got {other:?}"),
        }
        assert_eq!(store.active_session().unwrap().messages.len(), 2);
        match view_events.recv().await.unwrap() {
            ViewEvent::Toast { toast } => assert_eq!(toast.kind, ToastKind::Error),
            other => panic!("Expected Toast, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}
