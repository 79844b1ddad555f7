//! Lookup from [`Provider`] to a configured adapter.

use std::collections::HashMap;
use std::sync::Arc;

use modelforge_core::provider::Provider;
use serde::Serialize;

use crate::adapter::ProviderAdapter;
use crate::config::ProvidersConfig;
use crate::error::ProviderError;
use crate::meshy::MeshyAdapter;
use crate::mock::MockAdapter;
use crate::photogrammetry::PhotogrammetryAdapter;
use crate::replicate::ReplicateAdapter;

/// Availability of one provider, as reported by the providers endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: Provider,
    pub display_name: &'static str,
    pub configured: bool,
    /// Why the provider is unavailable, when it is.
    pub reason: Option<String>,
}

/// The set of adapters built from [`ProvidersConfig`].
///
/// Providers that failed to build are kept with the reason so selecting them
/// produces [`ProviderError::Misconfigured`] naming what is missing.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
    unavailable: HashMap<Provider, String>,
}

impl ProviderRegistry {
    /// An empty registry. Every lookup is a misconfiguration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ProvidersConfig) -> Self {
        let mut registry = Self::new();
        registry.insert(Arc::new(MockAdapter));

        match &config.meshy {
            Some(cfg) => registry.insert_built(
                Provider::Meshy,
                MeshyAdapter::new(cfg.clone(), config.http_timeout),
            ),
            None => registry.mark_unavailable(Provider::Meshy, "MESHY_API_KEY is not set"),
        }

        match &config.replicate {
            Some(cfg) => registry.insert_built(
                Provider::Replicate,
                ReplicateAdapter::new(cfg.clone(), config.http_timeout),
            ),
            None => registry.mark_unavailable(
                Provider::Replicate,
                "REPLICATE_API_TOKEN and REPLICATE_MODEL must be set",
            ),
        }

        match &config.photogrammetry {
            Some(cfg) => registry.insert_built(
                Provider::Photogrammetry,
                PhotogrammetryAdapter::new(cfg.clone(), config.http_timeout),
            ),
            None => registry.mark_unavailable(
                Provider::Photogrammetry,
                "PHOTOGRAMMETRY_BASE_URL is not set",
            ),
        }

        registry
    }

    /// Register (or replace) the adapter for its provider.
    pub fn insert(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        let provider = adapter.provider();
        self.unavailable.remove(&provider);
        self.adapters.insert(provider, adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.insert(adapter);
        self
    }

    fn insert_built<A>(&mut self, provider: Provider, built: Result<A, ProviderError>)
    where
        A: ProviderAdapter + 'static,
    {
        match built {
            Ok(adapter) => self.insert(Arc::new(adapter)),
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Provider adapter could not be built");
                self.mark_unavailable(provider, e.to_string());
            }
        }
    }

    fn mark_unavailable(&mut self, provider: Provider, reason: impl Into<String>) {
        self.adapters.remove(&provider);
        self.unavailable.insert(provider, reason.into());
    }

    /// The adapter for `provider`, or a misconfiguration error.
    pub fn get(&self, provider: Provider) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        self.adapters.get(&provider).cloned().ok_or_else(|| {
            let reason = self
                .unavailable
                .get(&provider)
                .cloned()
                .unwrap_or_else(|| "no adapter registered".into());
            ProviderError::misconfigured(provider, reason)
        })
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.adapters.contains_key(&provider)
    }

    /// Availability of every provider, in display order.
    pub fn describe(&self) -> Vec<ProviderInfo> {
        Provider::ALL
            .into_iter()
            .map(|provider| {
                let configured = self.is_configured(provider);
                ProviderInfo {
                    name: provider,
                    display_name: provider.display_name(),
                    configured,
                    reason: (!configured).then(|| {
                        self.unavailable
                            .get(&provider)
                            .cloned()
                            .unwrap_or_else(|| "no adapter registered".into())
                    }),
                }
            })
            .collect()
    }
}
