use modelforge_core::provider::Provider;

/// Errors raised by provider adapters.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Inputs violate a provider constraint. Raised before any network call.
    #[error("{0}")]
    Precondition(String),

    /// The provider is not configured (credentials or endpoint missing).
    #[error("provider misconfigured: {provider} ({reason})")]
    Misconfigured { provider: Provider, reason: String },

    /// The provider refused the call because of a quota or plan limit
    /// (HTTP 402).
    #[error("{} quota or plan limit reached: {body}", provider.display_name())]
    QuotaExceeded { provider: Provider, body: String },

    /// The provider returned a non-2xx status code.
    #[error("{} API error ({status}): {body}", provider.display_name())]
    Api {
        provider: Provider,
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A 2xx response that lacks a field the adapter depends on.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    pub fn misconfigured(provider: Provider, reason: impl Into<String>) -> Self {
        Self::Misconfigured {
            provider,
            reason: reason.into(),
        }
    }
}
