//! Resilient invocation: retry with backoff and multi-model fallback.
//!
//! One logical inference call walks the fallback chain in order. Transient
//! failures retry the same target with exponential backoff; permanent
//! failures advance to the next target immediately. Every outcome is an
//! explicit tagged value — success, exhaustion with full attempt history,
//! or cancellation. Backoff sleeps race the flow-level cancel signal, so a
//! deadline terminates them at once.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{FallbackChain, RetryConfig};
use crate::provider::{ModelProvider, ModelTarget};

/// Successful terminal outcome of one logical inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationOutcome {
    pub content: String,
    /// The (provider, model) that produced the completion.
    pub resolved: ModelTarget,
    /// Cumulative attempts across the whole fallback chain.
    pub attempts: u32,
}

/// One failed attempt, retained only inside the terminal failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Cumulative attempt index (1-based).
    pub attempt: u32,
    pub target: ModelTarget,
    pub transient: bool,
    pub latency_ms: u64,
    pub error: String,
}

/// Terminal failure of one logical inference call.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("fallback chain exhausted after {attempts} attempts; last error: {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: String,
        history: Vec<AttemptRecord>,
    },

    #[error("invocation cancelled: {reason}")]
    Cancelled { reason: String },
}

/// A cancel receiver that never fires. For callers outside a flow deadline.
pub fn never_cancel() -> watch::Receiver<bool> {
    let (_tx, rx) = watch::channel(false);
    rx
}

/// Resolve when the cancel signal goes true. Never resolves if the sender
/// is dropped without cancelling.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Makes one logical inference call resilient.
pub struct ResilientInvoker {
    provider: Arc<dyn ModelProvider>,
    retry: RetryConfig,
}

impl ResilientInvoker {
    pub fn new(provider: Arc<dyn ModelProvider>, retry: RetryConfig) -> Self {
        Self { provider, retry }
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Walk `chain` until a completion succeeds, every target is exhausted,
    /// or `cancel` fires.
    ///
    /// Total attempts never exceed `max_attempts_per_model * chain.len()`.
    pub async fn invoke(
        &self,
        chain: &FallbackChain,
        prompt: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<InvocationOutcome, InvokeError> {
        let mut attempts = 0u32;
        let mut history: Vec<AttemptRecord> = Vec::new();

        for target in chain.targets() {
            let mut target_attempt = 0u32;
            while target_attempt < self.retry.max_attempts_per_model {
                if *cancel.borrow() {
                    return Err(InvokeError::Cancelled {
                        reason: "cancel signal observed before attempt".to_string(),
                    });
                }

                target_attempt += 1;
                attempts += 1;
                let started = Instant::now();
                debug!(target = %target, attempt = attempts, "dispatching attempt");

                let result = tokio::select! {
                    result = self.provider.complete(target, prompt) => result,
                    _ = cancelled(&mut cancel) => {
                        return Err(InvokeError::Cancelled {
                            reason: "cancel signal fired mid-attempt".to_string(),
                        });
                    }
                };
                let latency_ms = started.elapsed().as_millis() as u64;

                match result {
                    Ok(content) => {
                        debug!(target = %target, attempts, latency_ms, "attempt succeeded");
                        return Ok(InvocationOutcome {
                            content,
                            resolved: target.clone(),
                            attempts,
                        });
                    }
                    Err(err) => {
                        let transient = err.is_transient();
                        warn!(
                            target = %target,
                            attempt = attempts,
                            transient,
                            error = %err,
                            "attempt failed"
                        );
                        history.push(AttemptRecord {
                            attempt: attempts,
                            target: target.clone(),
                            transient,
                            latency_ms,
                            error: err.to_string(),
                        });

                        if !transient {
                            // Permanent: abandon this target, advance the chain.
                            break;
                        }
                        if target_attempt < self.retry.max_attempts_per_model {
                            let delay = self.backoff_with_jitter(target_attempt);
                            debug!(target = %target, delay_ms = delay.as_millis() as u64, "backing off");
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = cancelled(&mut cancel) => {
                                    return Err(InvokeError::Cancelled {
                                        reason: "cancel signal fired during backoff".to_string(),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        let last_error = history
            .last()
            .map(|r| r.error.clone())
            .unwrap_or_else(|| "no attempts were made".to_string());
        Err(InvokeError::Exhausted {
            attempts,
            last_error,
            history,
        })
    }

    fn backoff_with_jitter(&self, target_attempt: u32) -> Duration {
        let delay = self.retry.backoff_delay(target_attempt);
        if !self.retry.jitter {
            return delay;
        }
        let max_extra = (delay / 2).as_millis() as u64;
        if max_extra == 0 {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0..=max_extra);
        delay + Duration::from_millis(extra)
    }
}
