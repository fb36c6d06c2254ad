//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Persona given to every new session.
pub const DEFAULT_PERSONA: &str = "Helpful Assistant";

/// Language given to every new session.
pub const DEFAULT_LANGUAGE: &str = "English";

/// Title shown until one is derived from the first user message.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Number of characters kept when deriving a title.
pub const DEFAULT_TITLE_MAX_CHARS: usize = 30;

const DEFAULT_CAPABILITY_URL: &str = "http://127.0.0.1:3400";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Defaults applied to newly created sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDefaults {
    pub title: String,
    pub persona: String,
    pub language: String,
    /// Maximum characters of the first user message kept as the title.
    pub title_max_chars: usize,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            persona: DEFAULT_PERSONA.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AssistConfig {
    /// Base URL of the capability backend.
    pub capability_url: String,
    /// Optional bearer token sent to the capability backend.
    pub api_key: Option<SecretString>,
    /// Per-request timeout for capability calls.
    pub request_timeout: Duration,
    pub session: SessionDefaults,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            capability_url: DEFAULT_CAPABILITY_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            session: SessionDefaults::default(),
        }
    }
}

impl AssistConfig {
    /// Load configuration from `CLARITY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();

        let capability_url = get("CLARITY_CAPABILITY_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.capability_url);

        let api_key = get("CLARITY_API_KEY").map(SecretString::from);

        let request_timeout = match get("CLARITY_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number("CLARITY_REQUEST_TIMEOUT_SECS", &raw)?),
            None => defaults.request_timeout,
        };

        let title_max_chars = match get("CLARITY_TITLE_MAX_CHARS") {
            Some(raw) => parse_number("CLARITY_TITLE_MAX_CHARS", &raw)? as usize,
            None => DEFAULT_TITLE_MAX_CHARS,
        };
        if title_max_chars == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CLARITY_TITLE_MAX_CHARS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let session = SessionDefaults {
            title: DEFAULT_TITLE.to_string(),
            persona: get("CLARITY_DEFAULT_PERSONA").unwrap_or(defaults.session.persona),
            language: get("CLARITY_DEFAULT_LANGUAGE").unwrap_or(defaults.session.language),
            title_max_chars,
        };

        Ok(Self {
            capability_url,
            api_key,
            request_timeout,
            session,
        })
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?} is not a number ({e})"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AssistConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.capability_url, DEFAULT_CAPABILITY_URL);
        assert!(config.api_key.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.session, SessionDefaults::default());
    }

    #[test]
    fn reads_overrides() {
        let config = AssistConfig::from_lookup(lookup(&[
            ("CLARITY_CAPABILITY_URL", "https://flows.example.com/"),
            ("CLARITY_API_KEY", "secret-key"),
            ("CLARITY_REQUEST_TIMEOUT_SECS", "5"),
            ("CLARITY_DEFAULT_PERSONA", "Pirate"),
            ("CLARITY_DEFAULT_LANGUAGE", "French"),
            ("CLARITY_TITLE_MAX_CHARS", "12"),
        ]))
        .unwrap();

        assert_eq!(config.capability_url, "https://flows.example.com");
        assert_eq!(config.api_key.unwrap().expose_secret(), "secret-key");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.session.persona, "Pirate");
        assert_eq!(config.session.language, "French");
        assert_eq!(config.session.title_max_chars, 12);
    }

    #[test]
    fn blank_values_fall_back() {
        let config =
            AssistConfig::from_lookup(lookup(&[("CLARITY_DEFAULT_PERSONA", "   ")])).unwrap();
        assert_eq!(config.session.persona, DEFAULT_PERSONA);
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        let err = AssistConfig::from_lookup(lookup(&[("CLARITY_REQUEST_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "CLARITY_REQUEST_TIMEOUT_SECS"
        ));
    }

    #[test]
    fn rejects_zero_title_length() {
        let err =
            AssistConfig::from_lookup(lookup(&[("CLARITY_TITLE_MAX_CHARS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
