//! # Configuration
//!
//! Environment-driven configuration for the orchestration subsystem.
//! All keys are read from `MEDIAGEN_*` environment variables, e.g.
//! `MEDIAGEN_CALLBACK_SECRET`, `MEDIAGEN_KIE_API_KEY`.
//!
//! Provider API keys are optional at load time: a deployment only
//! configures the vendors it uses. Absence of a key becomes a hard
//! [`OrchestrationError::Configuration`] at first use of that provider.

use serde::Deserialize;

use crate::constants::{CONFIG_ENV_PREFIX, PROVIDER_REQUEST_TIMEOUT_MS};
use crate::errors::{OrchestrationError, OrchestrationResult};
use crate::providers::ProviderKind;

/// Process-wide configuration for the generation subsystem.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaGenConfig {
    /// Public base URL under which the webhook callback endpoint is
    /// reachable, e.g. `https://app.example.com/api/generation/callback`.
    pub callback_base_url: String,

    /// Shared secret for signing callback URLs. Never sent to providers.
    pub callback_secret: String,

    /// Default provider tag used when a request does not name one.
    #[serde(default)]
    pub default_provider: Option<String>,

    /// API key for the Kie adapter.
    #[serde(default)]
    pub kie_api_key: Option<String>,

    /// API key for the PiApi adapter.
    #[serde(default)]
    pub piapi_api_key: Option<String>,

    /// API token for the Replicate adapter.
    #[serde(default)]
    pub replicate_api_token: Option<String>,

    /// Timeout applied to outbound provider requests, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    PROVIDER_REQUEST_TIMEOUT_MS
}

impl MediaGenConfig {
    /// Load configuration from `MEDIAGEN_*` environment variables.
    pub fn from_env() -> OrchestrationResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix(CONFIG_ENV_PREFIX))
            .build()
            .map_err(|e| OrchestrationError::Configuration(e.to_string()))?;

        settings
            .try_deserialize::<MediaGenConfig>()
            .map_err(|e| OrchestrationError::Configuration(e.to_string()))
    }

    /// API key for the given provider.
    ///
    /// Missing configuration is a fatal construction error for that
    /// provider, never a silent fallback.
    pub fn provider_api_key(&self, kind: ProviderKind) -> OrchestrationResult<&str> {
        let key = match kind {
            ProviderKind::Kie => self.kie_api_key.as_deref(),
            ProviderKind::PiApi => self.piapi_api_key.as_deref(),
            ProviderKind::Replicate => self.replicate_api_token.as_deref(),
        };

        key.filter(|k| !k.is_empty()).ok_or_else(|| {
            OrchestrationError::Configuration(format!(
                "no API key configured for provider '{kind}'"
            ))
        })
    }
}
