//! Plan request type — the single input to the flow orchestrator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{FallbackChain, RetryConfig};

/// Per-request overrides of engine configuration.
///
/// Any field left `None` falls back to the engine-level setting. Overrides
/// apply to the whole flow (gate and all specialists) for this request only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestOverrides {
    /// Replace the retry/backoff configuration.
    pub retry: Option<RetryConfig>,
    /// Replace the strict-mode flag.
    pub strict: Option<bool>,
    /// Replace the fallback chain.
    pub chain: Option<FallbackChain>,
}

impl RequestOverrides {
    pub fn is_empty(&self) -> bool {
        self.retry.is_none() && self.strict.is_none() && self.chain.is_none()
    }
}

/// A single travel-planning request. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Unique request id, tags every log line and artifact of this flow.
    pub id: Uuid,
    /// Free-text user query.
    pub query: String,
    /// Optional provider label; restricts the fallback chain to entries of
    /// that provider. An unknown label is a configuration error.
    pub provider_hint: Option<String>,
    /// Optional per-request configuration overrides.
    pub overrides: Option<RequestOverrides>,
}

impl PlanRequest {
    /// Create a request for a query with a fresh id and no overrides.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            provider_hint: None,
            overrides: None,
        }
    }

    /// Pin an explicit provider for this request.
    pub fn with_provider_hint(mut self, provider: impl Into<String>) -> Self {
        self.provider_hint = Some(provider.into());
        self
    }

    /// Attach configuration overrides.
    pub fn with_overrides(mut self, overrides: RequestOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }
}
