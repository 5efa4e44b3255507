//! Model provider boundary.
//!
//! The core consumes completion backends through [`ModelProvider`], an async
//! trait whose errors arrive pre-classified as transient (retry the same
//! target) or permanent (advance the fallback chain). Implementations:
//! - [`fakes::FakeProvider`] — deterministic offline mode
//! - [`fakes::ScriptedProvider`] — scripted outcomes for tests
//! - [`http::HttpModelProvider`] — reqwest adapter for a JSON endpoint

pub mod fakes;
pub mod http;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One (provider, model) completion target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelTarget {
    pub provider: String,
    pub model: String,
}

impl ModelTarget {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ModelTarget {
    /// Provider-prefixed model naming, e.g. `gemini/gemini-2.0-flash`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Classified completion failure.
///
/// Transient errors are retried against the same target with backoff;
/// permanent errors advance the fallback chain immediately.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider timeout: {0}")]
    Timeout(String),

    #[error("provider overloaded: {0}")]
    Overloaded(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("transport error: {detail}")]
    Transport { detail: String, transient: bool },
}

impl ProviderError {
    /// Whether the same target is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout(_)
            | ProviderError::Overloaded(_)
            | ProviderError::RateLimited(_) => true,
            ProviderError::MalformedRequest(_) | ProviderError::AuthFailed(_) => false,
            ProviderError::Transport { transient, .. } => *transient,
        }
    }
}

/// A generative-text completion backend.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Produce a completion for `prompt` against `target`.
    async fn complete(&self, target: &ModelTarget, prompt: &str)
        -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display_is_provider_prefixed() {
        let target = ModelTarget::new("gemini", "gemini-2.0-flash");
        assert_eq!(target.to_string(), "gemini/gemini-2.0-flash");
    }

    #[test]
    fn test_error_classification() {
        assert!(ProviderError::Timeout("read timed out".into()).is_transient());
        assert!(ProviderError::Overloaded("503".into()).is_transient());
        assert!(ProviderError::RateLimited("429".into()).is_transient());
        assert!(!ProviderError::MalformedRequest("400".into()).is_transient());
        assert!(!ProviderError::AuthFailed("401".into()).is_transient());
        assert!(ProviderError::Transport {
            detail: "connection reset".into(),
            transient: true
        }
        .is_transient());
        assert!(!ProviderError::Transport {
            detail: "unsupported endpoint".into(),
            transient: false
        }
        .is_transient());
    }
}
