//! Application wiring: builds the store, view selector, router and
//! capability backend from configuration.

use std::sync::Arc;

use tracing::info;

use crate::capability::{CapabilityInvoker, HttpCapabilityClient};
use crate::config::AssistConfig;
use crate::error::Result;
use crate::repl::Repl;
use crate::router::InputRouter;
use crate::session::SessionStore;
use crate::view::{ViewSelector, ViewSink};

/// All long-lived components of one assistant process.
pub struct Assistant {
    pub store: Arc<SessionStore>,
    pub views: Arc<ViewSelector>,
    pub router: InputRouter,
    pub capabilities: Arc<dyn CapabilityInvoker>,
}

impl Assistant {
    /// Build from `CLARITY_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary configuration lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = AssistConfig::from_lookup(lookup)?;
        Self::from_config(&config)
    }

    /// Build with the HTTP capability backend described by `config`.
    pub fn from_config(config: &AssistConfig) -> Result<Self> {
        let capabilities: Arc<dyn CapabilityInvoker> =
            Arc::new(HttpCapabilityClient::from_config(config)?);
        info!(url = %config.capability_url, "Capability backend configured");
        Ok(Self::with_capabilities(config, capabilities))
    }

    /// Build around an existing capability backend.
    pub fn with_capabilities(
        config: &AssistConfig,
        capabilities: Arc<dyn CapabilityInvoker>,
    ) -> Self {
        let store = SessionStore::new(config.session.clone());
        let views = ViewSelector::new();
        let router = InputRouter::new(
            Arc::clone(&store),
            Arc::clone(&capabilities),
            Arc::clone(&views) as Arc<dyn ViewSink>,
        );
        Self {
            store,
            views,
            router,
            capabilities,
        }
    }

    /// Hand everything to a terminal session.
    pub fn into_repl(self) -> Repl {
        Repl::new(self.store, self.router, self.views, self.capabilities)
    }
}
