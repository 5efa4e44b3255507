//! HTTP completion provider adapter.
//!
//! Speaks a minimal JSON completion protocol: `POST {base_url}/v1/complete`
//! with `{provider, model, prompt}`, expecting `{"text": "..."}` back.
//! Status codes are classified into the transient/permanent taxonomy the
//! invoker consumes; the adapter itself never retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ModelProvider, ModelTarget, ProviderError};

/// Configuration for the HTTP provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProviderConfig {
    /// Completion endpoint base URL.
    pub base_url: String,
    /// Bearer token, if the endpoint requires one.
    pub api_key: Option<String>,
    /// Per-request socket timeout. Expiry is classified as transient.
    pub request_timeout: Duration,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl HttpProviderConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Read `HERMES_PROVIDER_URL` / `HERMES_PROVIDER_KEY` from the
    /// environment. Convenience for binaries; the core never calls this.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("HERMES_PROVIDER_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            api_key: std::env::var("HERMES_PROVIDER_KEY").ok(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    provider: &'a str,
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    text: String,
}

/// reqwest-backed [`ModelProvider`].
pub struct HttpModelProvider {
    config: HttpProviderConfig,
    client: reqwest::Client,
}

impl HttpModelProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hermes-core/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::Transport {
                detail: format!("failed to build HTTP client: {e}"),
                transient: false,
            })?;

        Ok(Self { config, client })
    }

    fn classify_status(status: StatusCode, body: String) -> ProviderError {
        match status {
            StatusCode::REQUEST_TIMEOUT => ProviderError::Timeout(body),
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(body),
            StatusCode::SERVICE_UNAVAILABLE => ProviderError::Overloaded(body),
            StatusCode::BAD_REQUEST => ProviderError::MalformedRequest(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthFailed(body),
            s if s.as_u16() == 529 => ProviderError::Overloaded(body),
            s if s.is_server_error() => ProviderError::Transport {
                detail: format!("{s}: {body}"),
                transient: true,
            },
            s => ProviderError::Transport {
                detail: format!("{s}: {body}"),
                transient: false,
            },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_connect() {
            // Connection refused/reset is worth retrying.
            ProviderError::Transport {
                detail: err.to_string(),
                transient: true,
            }
        } else {
            ProviderError::Transport {
                detail: err.to_string(),
                transient: false,
            }
        }
    }
}

#[async_trait]
impl ModelProvider for HttpModelProvider {
    async fn complete(
        &self,
        target: &ModelTarget,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/v1/complete", self.config.base_url);
        debug!(target = %target, url = %url, "dispatching completion request");

        let mut request = self.client.post(&url).json(&CompletionRequest {
            provider: &target.provider,
            model: &target.model,
            prompt,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        let completion: CompletionResponse =
            response.json().await.map_err(|e| ProviderError::Transport {
                detail: format!("malformed completion body: {e}"),
                transient: false,
            })?;

        Ok(completion.text)
    }
}
