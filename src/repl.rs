//! Terminal front end: stdin/stdout loop that drives the session store and
//! the input router.
//!
//! Lines starting with `:` manage sessions; everything else goes through the
//! router, so slash commands behave exactly as they would in any other UI.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt, stream};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::error;

use crate::capability::{CapabilityId, CapabilityInvoker};
use crate::error::RouteError;
use crate::router::{Command, InputRouter, RouteOutcome, SubmitPermit, UserInput};
use crate::session::{Role, Session, SessionStore, SettingsUpdate, StoreEvent};
use crate::view::{ToastKind, ViewEvent, ViewSelector};

type LineStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Session management command typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    New(Option<String>),
    List,
    /// 1-based position in the session list.
    Switch(usize),
    /// 1-based position; `None` deletes the active session.
    Delete(Option<usize>),
    Rename(String),
    Persona(String),
    Language(String),
    /// 1-based message position in the active session, new content.
    Edit(usize, String),
    /// Image for the next message.
    Attach(String),
    Show,
    Help,
    Quit,
}

impl ReplCommand {
    /// Parse a `:`-prefixed line. Returns `None` for regular input.
    pub fn parse(line: &str) -> Option<Result<Self, String>> {
        let body = line.strip_prefix(':')?;
        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };

        let required = |what: &str| -> Result<String, String> {
            if rest.is_empty() {
                Err(format!(":{name} needs {what}"))
            } else {
                Ok(rest.to_string())
            }
        };
        let index = |raw: &str| -> Result<usize, String> {
            raw.parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("{raw:?} is not a position (1, 2, ...)"))
        };

        let parsed = match name {
            "new" => Ok(Self::New((!rest.is_empty()).then(|| rest.to_string()))),
            "list" | "ls" => Ok(Self::List),
            "switch" | "sw" => required("a position").and_then(|r| index(&r)).map(Self::Switch),
            "delete" | "rm" => {
                if rest.is_empty() {
                    Ok(Self::Delete(None))
                } else {
                    index(rest).map(|n| Self::Delete(Some(n)))
                }
            }
            "rename" => required("a title").map(Self::Rename),
            "persona" => required("a persona").map(Self::Persona),
            "language" | "lang" => required("a language").map(Self::Language),
            "edit" => match rest.split_once(char::is_whitespace) {
                Some((position, content)) if !content.trim().is_empty() => {
                    index(position).map(|n| Self::Edit(n, content.trim().to_string()))
                }
                _ => Err(":edit needs a position and new text".to_string()),
            },
            "attach" => required("an image URL").map(Self::Attach),
            "show" => Ok(Self::Show),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(format!("Unknown command :{other} (try :help)")),
        };
        Some(parsed)
    }
}

/// Read stdin line by line as a stream.
fn stdin_lines() -> LineStream {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let reader = BufReader::new(tokio::io::stdin());
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF
                Err(e) => {
                    error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|line| (line, rx))
    }))
}

/// Interactive terminal session.
pub struct Repl {
    store: Arc<SessionStore>,
    router: InputRouter,
    views: Arc<ViewSelector>,
    capabilities: Arc<dyn CapabilityInvoker>,
    attachment: Option<String>,
}

impl Repl {
    pub fn new(
        store: Arc<SessionStore>,
        router: InputRouter,
        views: Arc<ViewSelector>,
        capabilities: Arc<dyn CapabilityInvoker>,
    ) -> Self {
        Self {
            store,
            router,
            views,
            capabilities,
            attachment: None,
        }
    }

    /// Run until `:quit` or end of input.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut lines = stdin_lines();
        let mut store_events = self.store.subscribe();
        let mut view_events = self.views.subscribe();

        print_help();
        eprint!("> ");

        loop {
            tokio::select! {
                line = lines.next() => {
                    let Some(line) = line else { break };
                    if !self.handle_line(line.trim_end()) {
                        break;
                    }
                    eprint!("> ");
                }
                event = store_events.recv() => match event {
                    Ok(event) => self.show_store_event(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        eprintln!("(missed {n} updates)");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                event = view_events.recv() => match event {
                    Ok(event) => self.show_view_event(event),
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        Ok(())
    }

    /// Returns `false` when the loop should stop.
    fn handle_line(&mut self, line: &str) -> bool {
        match ReplCommand::parse(line) {
            Some(Ok(ReplCommand::Quit)) => return false,
            Some(Ok(command)) => self.run_command(command),
            Some(Err(message)) => eprintln!("{message}"),
            None => self.submit(line),
        }
        true
    }

    /// Claim the router before taking the pending attachment, so a refused
    /// line leaves the attachment for the next one.
    fn prepare_submission(&mut self, line: &str) -> Result<(SubmitPermit, UserInput), RouteError> {
        let permit = self.router.try_reserve()?;
        let mut input = UserInput::text(line);
        input.image_url = self.attachment.take();
        Ok((permit, input))
    }

    fn submit(&mut self, line: &str) {
        let (permit, input) = match self.prepare_submission(line) {
            Ok(prepared) => prepared,
            Err(_) => {
                eprintln!("⏳ Still waiting for the previous reply");
                return;
            }
        };

        tokio::spawn(async move {
            match permit.submit(input).await {
                Ok(RouteOutcome::SwitchedView(switch)) => {
                    println!(
                        "\n→ {} view opened with {:?}\n",
                        switch.capability,
                        switch.seed.value()
                    );
                }
                Ok(_) => {}
                Err(RouteError::Busy) => eprintln!("⏳ Still waiting for the previous reply"),
                Err(e) => eprintln!("❌ {e}"),
            }
        });
    }

    fn run_command(&mut self, command: ReplCommand) {
        let result = match command {
            ReplCommand::New(title) => {
                let session = self.store.create_session(title.as_deref());
                println!("Started \"{}\"", session.title);
                Ok(())
            }
            ReplCommand::List => {
                self.print_sessions();
                Ok(())
            }
            ReplCommand::Switch(position) => self
                .session_at(position)
                .and_then(|s| self.store.set_active_session(s.id).map_err(|e| e.to_string())),
            ReplCommand::Delete(position) => {
                let target = match position {
                    Some(position) => self.session_at(position).map(|s| s.id),
                    None => self
                        .store
                        .active_session_id()
                        .ok_or_else(|| "No active session".to_string()),
                };
                target.and_then(|id| self.store.delete_session(id).map_err(|e| e.to_string()))
            }
            ReplCommand::Rename(title) => self.with_active(|store, id| {
                store.rename_session(id, title).map(|_| ())
            }),
            ReplCommand::Persona(persona) => self.with_active(|store, id| {
                store
                    .update_session_settings(id, SettingsUpdate::persona(persona))
                    .map(|_| ())
            }),
            ReplCommand::Language(language) => self.with_active(|store, id| {
                store
                    .update_session_settings(id, SettingsUpdate::language(language))
                    .map(|_| ())
            }),
            ReplCommand::Edit(position, content) => match self.store.active_session() {
                Some(session) => match session.messages.get(position - 1) {
                    Some(message) => self
                        .store
                        .edit_message(session.id, message.id, content)
                        .map(|_| ())
                        .map_err(|e| e.to_string()),
                    None => Err(format!("No message #{position}")),
                },
                None => Err("No active session".to_string()),
            },
            ReplCommand::Attach(url) => {
                println!("📎 Image attached to your next message");
                self.attachment = Some(url);
                Ok(())
            }
            ReplCommand::Show => {
                match self.store.active_session() {
                    Some(session) => print_session(&session),
                    None => eprintln!("No active session"),
                }
                Ok(())
            }
            ReplCommand::Help => {
                print_help();
                Ok(())
            }
            ReplCommand::Quit => Ok(()),
        };

        if let Err(message) = result {
            eprintln!("❌ {message}");
        }
    }

    fn with_active<F>(&self, f: F) -> Result<(), String>
    where
        F: FnOnce(&SessionStore, crate::session::SessionId) -> Result<(), crate::error::StoreError>,
    {
        let id = self
            .store
            .active_session_id()
            .ok_or_else(|| "No active session".to_string())?;
        f(&self.store, id).map_err(|e| e.to_string())
    }

    fn session_at(&self, position: usize) -> Result<Session, String> {
        self.store
            .sessions()
            .into_iter()
            .nth(position - 1)
            .ok_or_else(|| format!("No session #{position}"))
    }

    fn print_sessions(&self) {
        let active = self.store.active_session_id();
        for (i, session) in self.store.sessions().iter().enumerate() {
            let marker = if Some(session.id) == active { "*" } else { " " };
            println!(
                "{marker} {}. {} ({} messages, {} / {}, created {})",
                i + 1,
                session.title,
                session.messages.len(),
                session.persona,
                session.language,
                session.created_at.format("%H:%M:%S"),
            );
        }
    }

    fn show_store_event(&self, event: StoreEvent) {
        match event {
            StoreEvent::MessageAppended {
                session_id,
                message,
            } if message.role == Role::Assistant => {
                let elsewhere = self.store.active_session_id() != Some(session_id);
                if elsewhere {
                    let title = self
                        .store
                        .session(session_id)
                        .map(|s| s.title)
                        .unwrap_or_default();
                    println!("\n[{title}]");
                }
                println!("\n{}", message.content);
                if let Some(url) = &message.image_url {
                    println!("🖼  {}", preview(url));
                }
                println!();
            }
            StoreEvent::ActiveSessionChanged { id } => {
                if let Some(session) = self.store.session(id) {
                    println!("Now in \"{}\"", session.title);
                }
            }
            _ => {}
        }
    }

    fn show_view_event(&self, event: ViewEvent) {
        match event {
            ViewEvent::Toast { toast } => match toast.kind {
                ToastKind::Error => eprintln!("❌ {}: {}", toast.title, toast.description),
                ToastKind::Info => eprintln!("ℹ️  {}: {}", toast.title, toast.description),
            },
            ViewEvent::Switched { capability } if capability != CapabilityId::Chat => {
                let views = Arc::clone(&self.views);
                let capabilities = Arc::clone(&self.capabilities);
                tokio::spawn(async move {
                    if let Some(Ok(output)) =
                        views.run_seeded(capabilities.as_ref(), capability).await
                    {
                        println!("\n{}\n", render_output(&output));
                    }
                });
            }
            ViewEvent::Switched { .. } => {}
        }
    }
}

/// Human-readable form of a capability result: string fields as paragraphs,
/// string lists as bullets, anything else as pretty JSON.
fn render_output(output: &serde_json::Value) -> String {
    use serde_json::Value;

    let Value::Object(fields) = output else {
        return match output {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        };
    };

    let mut sections = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        let body = match value {
            Value::String(text) => text.clone(),
            Value::Array(items) if items.iter().all(Value::is_string) => items
                .iter()
                .filter_map(Value::as_str)
                .map(|item| format!("  • {item}"))
                .collect::<Vec<_>>()
                .join("\n"),
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        };
        sections.push(format!("{key}:\n{body}"));
    }
    sections.join("\n\n")
}

fn preview(url: &str) -> String {
    const MAX: usize = 80;
    if url.chars().count() > MAX {
        format!("{}…", url.chars().take(MAX).collect::<String>())
    } else {
        url.to_string()
    }
}

fn print_session(session: &Session) {
    println!("── {} ──", session.title);
    for (i, message) in session.messages.iter().enumerate() {
        let edited = if message.edited_at.is_some() { " (edited)" } else { "" };
        println!("{}. {}: {}{}", i + 1, message.role, message.content, edited);
    }
}

fn print_help() {
    let commands: Vec<&str> = Command::ALL.iter().map(|c| c.token()).collect();
    eprintln!("Type a message and press Enter. Capability commands: {}", commands.join(" "));
    eprintln!("Sessions: :new [title]  :list  :switch N  :delete [N]  :rename T  :show");
    eprintln!("Settings: :persona P  :language L  :edit N text  :attach URL  :quit");
}
