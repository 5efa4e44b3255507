//! Confidence gate — the first pipeline stage.
//!
//! Issues exactly one resilient invocation against the gating prompt and
//! parses a relevance score in [0, 1] from the completion. A parse failure
//! or terminal invocation failure yields score 0.0 with the failure recorded
//! as rationale — the gate never silently defaults to "pass".

use std::sync::OnceLock;

use regex::Regex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::FallbackChain;
use crate::domain::error::{HermesError, Result};
use crate::domain::plan::ConfidenceResult;
use crate::invoker::{InvokeError, ResilientInvoker};
use crate::prompts::{PromptLibrary, PROMPT_VERSION};
use crate::provider::ModelTarget;

/// Agent/task ids of the gating prompt in the prompt library.
pub const GATE_AGENT: &str = "confidence";
pub const GATE_TASK: &str = "score";

/// Gate stage output: the confidence result plus invocation metadata the
/// flow reports at the top level.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub result: ConfidenceResult,
    /// Target that produced the score, absent when the invocation failed.
    pub resolved: Option<ModelTarget>,
    pub attempts: u32,
}

/// Single-invocation threshold gate.
#[derive(Debug, Clone)]
pub struct ConfidenceGate {
    threshold: f32,
}

impl ConfidenceGate {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// The sole pass condition: `score >= threshold`.
    pub fn passes(&self, result: &ConfidenceResult) -> bool {
        result.score >= self.threshold
    }

    /// Run the gating inference for `query`.
    ///
    /// A missing gating template is a fatal configuration error. A terminal
    /// invocation failure is fatal in strict mode; otherwise it becomes a
    /// zero-score result carrying the failure as rationale.
    pub async fn assess(
        &self,
        invoker: &ResilientInvoker,
        chain: &FallbackChain,
        prompts: &dyn PromptLibrary,
        query: &str,
        strict: bool,
        cancel: watch::Receiver<bool>,
    ) -> Result<GateOutcome> {
        let template = prompts
            .resolve(GATE_AGENT, GATE_TASK, PROMPT_VERSION)
            .ok_or_else(|| HermesError::MissingTemplate {
                agent: GATE_AGENT.to_string(),
                task: GATE_TASK.to_string(),
                version: PROMPT_VERSION,
            })?;
        let prompt = template.render(&[("query", query)]);

        match invoker.invoke(chain, &prompt, cancel).await {
            Ok(outcome) => {
                let result = match parse_score(&outcome.content) {
                    Some(score) => {
                        debug!(score, attempts = outcome.attempts, "gate scored query");
                        ConfidenceResult {
                            score,
                            rationale: outcome.content,
                        }
                    }
                    None => {
                        warn!(content = %outcome.content, "gate response had no parsable score");
                        ConfidenceResult::failed(format!(
                            "failed to parse confidence score from: {}",
                            outcome.content
                        ))
                    }
                };
                Ok(GateOutcome {
                    result,
                    resolved: Some(outcome.resolved),
                    attempts: outcome.attempts,
                })
            }
            Err(err) => {
                if strict || matches!(err, InvokeError::Cancelled { .. }) {
                    return Err(err.into());
                }
                warn!(error = %err, "gate invocation failed terminally");
                let attempts = match &err {
                    InvokeError::Exhausted { attempts, .. } => *attempts,
                    InvokeError::Cancelled { .. } => 0,
                };
                Ok(GateOutcome {
                    result: ConfidenceResult::failed(err.to_string()),
                    resolved: None,
                    attempts,
                })
            }
        }
    }
}

/// Extract a confidence score from a completion.
///
/// Tries strict JSON first, then a `"score": <float>` fragment, then a bare
/// float. Out-of-range values are clamped into [0, 1].
fn parse_score(content: &str) -> Option<f32> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(content.trim()) {
        if let Some(score) = value.get("score").and_then(|s| s.as_f64()) {
            return Some(clamp_score(score as f32));
        }
    }

    static SCORE_RE: OnceLock<Regex> = OnceLock::new();
    let re = SCORE_RE
        .get_or_init(|| Regex::new(r#""score"\s*:\s*([0-9]*\.?[0-9]+)"#).expect("valid regex"));
    if let Some(caps) = re.captures(content) {
        if let Ok(score) = caps[1].parse::<f32>() {
            return Some(clamp_score(score));
        }
    }

    content.trim().parse::<f32>().ok().map(clamp_score)
}

fn clamp_score(score: f32) -> f32 {
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::RetryConfig;
    use crate::invoker::never_cancel;
    use crate::prompts::default_library;
    use crate::provider::fakes::{ScriptedOutcome, ScriptedProvider};
    use crate::provider::ProviderError;

    fn chain() -> FallbackChain {
        FallbackChain::single(ModelTarget::new("primary", "model-a"))
    }

    fn invoker(provider: Arc<ScriptedProvider>) -> ResilientInvoker {
        ResilientInvoker::new(
            provider,
            RetryConfig {
                max_attempts_per_model: 1,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_parse_score_strict_json() {
        assert_eq!(parse_score("{\"score\": 0.95}"), Some(0.95));
        assert_eq!(parse_score("{\"score\": 0}"), Some(0.0));
    }

    #[test]
    fn test_parse_score_wrapped_text() {
        assert_eq!(
            parse_score("Here is my verdict: {\"score\": 0.72} as requested"),
            Some(0.72)
        );
    }

    #[test]
    fn test_parse_score_bare_float() {
        assert_eq!(parse_score("0.4"), Some(0.4));
        assert_eq!(parse_score(" 0.4 \n"), Some(0.4));
    }

    #[test]
    fn test_parse_score_clamps_out_of_range() {
        assert_eq!(parse_score("{\"score\": 17.5}"), Some(1.0));
        assert_eq!(parse_score("{\"score\": -3}"), Some(0.0));
    }

    #[test]
    fn test_parse_score_garbage_is_none() {
        assert_eq!(parse_score("I cannot help with that"), None);
        assert_eq!(parse_score(""), None);
    }

    #[tokio::test]
    async fn test_gate_scores_and_resolves_target() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.script(
            "primary/model-a",
            vec![ScriptedOutcome::Succeed("{\"score\": 0.95}".into())],
        );

        let gate = ConfidenceGate::new(0.6);
        let outcome = gate
            .assess(
                &invoker(provider),
                &chain(),
                &default_library(),
                "Plan a weekend trip to Paris",
                false,
                never_cancel(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.result.score, 0.95);
        assert!(gate.passes(&outcome.result));
        assert_eq!(outcome.resolved.unwrap().provider, "primary");
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_unparsable_response_scores_zero() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.script(
            "primary/model-a",
            vec![ScriptedOutcome::Succeed("certainly!".into())],
        );

        let gate = ConfidenceGate::new(0.6);
        let outcome = gate
            .assess(
                &invoker(provider),
                &chain(),
                &default_library(),
                "query",
                false,
                never_cancel(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.result.score, 0.0);
        assert!(!gate.passes(&outcome.result));
        assert!(outcome.result.rationale.contains("failed to parse"));
    }

    #[tokio::test]
    async fn test_terminal_failure_scores_zero_in_non_strict_mode() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.script(
            "primary/model-a",
            vec![ScriptedOutcome::Fail(ProviderError::AuthFailed(
                "401".into(),
            ))],
        );

        let gate = ConfidenceGate::new(0.6);
        let outcome = gate
            .assess(
                &invoker(provider),
                &chain(),
                &default_library(),
                "query",
                false,
                never_cancel(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.result.score, 0.0);
        assert!(outcome.resolved.is_none());
        assert!(outcome.result.rationale.contains("exhausted"));
    }

    #[tokio::test]
    async fn test_terminal_failure_is_fatal_in_strict_mode() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.script(
            "primary/model-a",
            vec![ScriptedOutcome::Fail(ProviderError::AuthFailed(
                "401".into(),
            ))],
        );

        let gate = ConfidenceGate::new(0.6);
        let result = gate
            .assess(
                &invoker(provider),
                &chain(),
                &default_library(),
                "query",
                true,
                never_cancel(),
            )
            .await;

        assert!(matches!(result, Err(HermesError::Invoke(_))));
    }

    #[tokio::test]
    async fn test_missing_template_is_configuration_error() {
        let provider = Arc::new(ScriptedProvider::new());
        let gate = ConfidenceGate::new(0.6);
        let empty = crate::prompts::StaticPromptLibrary::new();

        let result = gate
            .assess(
                &invoker(provider),
                &chain(),
                &empty,
                "query",
                false,
                never_cancel(),
            )
            .await;

        assert!(matches!(
            result,
            Err(HermesError::MissingTemplate { .. })
        ));
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let gate = ConfidenceGate::new(0.6);
        let at_threshold = ConfidenceResult {
            score: 0.6,
            rationale: String::new(),
        };
        let below = ConfidenceResult {
            score: 0.59,
            rationale: String::new(),
        };
        assert!(gate.passes(&at_threshold));
        assert!(!gate.passes(&below));
    }
}
