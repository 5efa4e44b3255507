//! Engine configuration: retry policy, fallback chains, gate threshold.
//!
//! Configuration is constructed once, passed by value or `Arc`, and read-only
//! for the duration of a request. The core performs no ambient environment
//! lookups; credential and env loading belong to the embedding layer.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::{HermesError, Result};
use crate::domain::plan::SpecialistId;
use crate::domain::request::PlanRequest;
use crate::provider::ModelTarget;

/// Retry and backoff policy for one invocation family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts against a single (provider, model) target.
    pub max_attempts_per_model: u32,
    /// Delay before the second attempt; doubles per subsequent attempt.
    pub base_delay: Duration,
    /// Ceiling for the computed backoff delay.
    pub max_delay: Duration,
    /// Add up to 50% uniform jitter to each backoff delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_model: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Backoff delay between attempt `attempt` and the next one on the same
    /// target: `base_delay * 2^(attempt-1)`, capped at `max_delay`.
    /// Jitter, when enabled, is applied by the invoker on top of this.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Ordered, non-empty sequence of (provider, model) targets tried in order.
/// The first entry is primary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FallbackChain(Vec<ModelTarget>);

impl FallbackChain {
    /// Build a chain from targets. An empty chain is a configuration error.
    pub fn new(targets: Vec<ModelTarget>) -> Result<Self> {
        if targets.is_empty() {
            return Err(HermesError::Configuration(
                "fallback chain must not be empty".to_string(),
            ));
        }
        Ok(Self(targets))
    }

    /// A chain with a single target.
    pub fn single(target: ModelTarget) -> Self {
        Self(vec![target])
    }

    /// Append a fallback target.
    pub fn with_fallback(mut self, target: ModelTarget) -> Self {
        self.0.push(target);
        self
    }

    pub fn targets(&self) -> &[ModelTarget] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn primary(&self) -> &ModelTarget {
        &self.0[0]
    }

    /// Restrict the chain to entries of one provider, preserving order.
    /// An unknown provider label is a configuration error.
    pub fn restricted_to(&self, provider: &str) -> Result<Self> {
        let targets: Vec<ModelTarget> = self
            .0
            .iter()
            .filter(|t| t.provider == provider)
            .cloned()
            .collect();
        if targets.is_empty() {
            return Err(HermesError::Configuration(format!(
                "provider hint '{provider}' matches no fallback chain entry"
            )));
        }
        Ok(Self(targets))
    }
}

impl Default for FallbackChain {
    /// The stock provider priority: Gemini, then Claude, then OpenAI.
    fn default() -> Self {
        Self(vec![
            ModelTarget::new("gemini", "gemini-2.0-flash"),
            ModelTarget::new("anthropic", "claude-3-sonnet-20240229"),
            ModelTarget::new("openai", "gpt-4-turbo"),
        ])
    }
}

/// Immutable engine configuration shared by all stages of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Gate pass threshold; `score >= threshold` proceeds to fan-out.
    pub confidence_threshold: f32,
    /// Retry/backoff policy for every invocation.
    pub retry: RetryConfig,
    /// Strict mode: unrecovered invocation errors become fatal flow errors
    /// instead of placeholder sections. Flow-level, never per-specialist.
    pub strict: bool,
    /// Fallback chain used by the gate and, by default, every specialist.
    pub chain: FallbackChain,
    /// Per-specialist chain overrides.
    pub specialist_chains: BTreeMap<SpecialistId, FallbackChain>,
    /// End-to-end deadline for one flow, including all retries and backoff.
    pub flow_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            retry: RetryConfig::default(),
            strict: false,
            chain: FallbackChain::default(),
            specialist_chains: BTreeMap::new(),
            flow_timeout: None,
        }
    }
}

impl EngineConfig {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_chain(mut self, chain: FallbackChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_specialist_chain(mut self, id: SpecialistId, chain: FallbackChain) -> Self {
        self.specialist_chains.insert(id, chain);
        self
    }

    pub fn with_flow_timeout(mut self, timeout: Duration) -> Self {
        self.flow_timeout = Some(timeout);
        self
    }

    /// Resolve the effective settings for one request: apply per-request
    /// overrides, then the provider hint.
    ///
    /// A request-level chain override replaces the flow chain *and* clears
    /// per-specialist chain overrides — the request asked for one specific
    /// chain everywhere.
    pub fn effective(&self, request: &PlanRequest) -> Result<EffectiveSettings> {
        let overrides = request.overrides.clone().unwrap_or_default();

        let retry = overrides.retry.unwrap_or_else(|| self.retry.clone());
        let strict = overrides.strict.unwrap_or(self.strict);

        let (mut chain, mut specialist_chains) = match overrides.chain {
            Some(chain) => (chain, BTreeMap::new()),
            None => (self.chain.clone(), self.specialist_chains.clone()),
        };

        if let Some(provider) = &request.provider_hint {
            chain = chain.restricted_to(provider)?;
            let mut restricted = BTreeMap::new();
            for (id, specialist_chain) in specialist_chains {
                restricted.insert(id, specialist_chain.restricted_to(provider)?);
            }
            specialist_chains = restricted;
        }

        Ok(EffectiveSettings {
            retry,
            strict,
            chain,
            specialist_chains,
        })
    }
}

/// Settings in force for one request after override and hint resolution.
#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub retry: RetryConfig,
    pub strict: bool,
    pub chain: FallbackChain,
    pub specialist_chains: BTreeMap<SpecialistId, FallbackChain>,
}

impl EffectiveSettings {
    /// The chain a given specialist should use.
    pub fn chain_for(&self, id: SpecialistId) -> &FallbackChain {
        self.specialist_chains.get(&id).unwrap_or(&self.chain)
    }
}
