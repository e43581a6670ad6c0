//! # Provider Registry
//!
//! Lazily constructs and memoizes one adapter instance per provider tag for
//! the lifetime of the process. Construction requires the provider's API key
//! from configuration; a missing key is a fatal construction error, never a
//! silent fallback.
//!
//! The cache is an explicit mutex-guarded map rather than hidden global
//! state, so tests can seed stub adapters with [`ProviderRegistry::insert`]
//! or wipe the cache with [`ProviderRegistry::reset`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::config::MediaGenConfig;
use crate::constants::DEFAULT_PROVIDER;
use crate::errors::{OrchestrationError, OrchestrationResult};
use crate::providers::{
    GenerationProvider, KieProvider, PiApiProvider, ProviderKind, ReplicateProvider,
};

pub struct ProviderRegistry {
    config: Arc<MediaGenConfig>,
    providers: Mutex<HashMap<ProviderKind, Arc<dyn GenerationProvider>>>,
}

impl ProviderRegistry {
    pub fn new(config: Arc<MediaGenConfig>) -> Self {
        Self {
            config,
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Return the adapter for the given provider tag, constructing and
    /// caching it on first use.
    pub fn provider(&self, kind: ProviderKind) -> OrchestrationResult<Arc<dyn GenerationProvider>> {
        let mut providers = self.providers.lock();

        if let Some(provider) = providers.get(&kind) {
            return Ok(Arc::clone(provider));
        }

        let provider = self.construct(kind)?;
        providers.insert(kind, Arc::clone(&provider));
        info!(provider = %kind, "Constructed provider adapter");
        Ok(provider)
    }

    /// The configured default provider tag, falling back to the fixed
    /// default when unset. A configured tag that does not name a known
    /// provider is a configuration error.
    pub fn default_kind(&self) -> OrchestrationResult<ProviderKind> {
        let tag = self
            .config
            .default_provider
            .as_deref()
            .unwrap_or(DEFAULT_PROVIDER);

        tag.parse::<ProviderKind>()
            .map_err(OrchestrationError::Configuration)
    }

    /// The default provider's adapter, resolved through the same memoized
    /// construction path as explicit lookups.
    pub fn default_provider(&self) -> OrchestrationResult<Arc<dyn GenerationProvider>> {
        self.provider(self.default_kind()?)
    }

    /// Seed an adapter instance, replacing any cached one for its tag.
    /// Intended for tests substituting stub providers.
    pub fn insert(&self, provider: Arc<dyn GenerationProvider>) {
        self.providers.lock().insert(provider.kind(), provider);
    }

    /// Drop all cached adapters.
    pub fn reset(&self) {
        self.providers.lock().clear();
    }

    fn construct(&self, kind: ProviderKind) -> OrchestrationResult<Arc<dyn GenerationProvider>> {
        let api_key = self.config.provider_api_key(kind)?;
        let timeout_ms = self.config.request_timeout_ms;

        Ok(match kind {
            ProviderKind::Kie => Arc::new(KieProvider::new(api_key, timeout_ms)?),
            ProviderKind::PiApi => Arc::new(PiApiProvider::new(api_key, timeout_ms)?),
            ProviderKind::Replicate => Arc::new(ReplicateProvider::new(api_key, timeout_ms)?),
        })
    }
}
