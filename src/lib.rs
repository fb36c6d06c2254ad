//! Clarity Assist: session store and input routing for a multi-capability
//! AI assistant.

pub mod app;
pub mod capability;
pub mod config;
pub mod error;
pub mod repl;
pub mod router;
pub mod session;
pub mod view;
