//! HTTP capability backend: posts each invocation to `<base_url>/<slug>`.
//!
//! Request body: `{"data": <input>}`. Success body: `{"result": <output>}`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CapabilityId, CapabilityInvoker};
use crate::config::AssistConfig;
use crate::error::CapabilityError;

/// Longest error body kept in a `Rejected` error.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Serialize)]
struct InvokeEnvelope<'a> {
    data: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct ResultEnvelope {
    result: serde_json::Value,
}

/// Capability invoker talking to a remote flow server.
pub struct HttpCapabilityClient {
    base_url: String,
    api_key: Option<SecretString>,
    client: reqwest::Client,
}

impl HttpCapabilityClient {
    /// Build a client from application configuration.
    pub fn from_config(config: &AssistConfig) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CapabilityError::RequestFailed {
                capability: CapabilityId::Chat,
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: config.capability_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    fn endpoint(&self, capability: CapabilityId) -> String {
        format!("{}/{}", self.base_url, capability.slug())
    }
}

#[async_trait]
impl CapabilityInvoker for HttpCapabilityClient {
    async fn invoke(
        &self,
        capability: CapabilityId,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, CapabilityError> {
        let url = self.endpoint(capability);
        debug!(capability = %capability, url = %url, "Invoking capability");

        let mut request = self
            .client
            .post(&url)
            .json(&InvokeEnvelope { data: &input });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let resp = request
            .send()
            .await
            .map_err(|e| CapabilityError::RequestFailed {
                capability,
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            warn!(capability = %capability, status = %status, "Capability rejected request");
            return Err(CapabilityError::Rejected {
                capability,
                status: status.as_u16(),
                body,
            });
        }

        let envelope: ResultEnvelope = resp
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse {
                capability,
                reason: e.to_string(),
            })?;

        Ok(envelope.result)
    }
}
