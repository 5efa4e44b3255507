//! Flow orchestrator — the top-level state machine.
//!
//! `Init → Gating → (Rejected | FanningOut → Synthesizing → Completed)`,
//! with `Failed` reserved for non-recoverable internal faults (configuration
//! errors, strict-mode fatal propagation, deadline expiry outside fan-out).
//! The orchestrator owns the end-to-end deadline and broadcasts cancellation
//! to every in-flight task through a watch channel.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::domain::error::HermesError;
use crate::domain::plan::{FlowState, TravelPlan};
use crate::domain::request::PlanRequest;
use crate::gate::ConfidenceGate;
use crate::invoker::ResilientInvoker;
use crate::obs;
use crate::prompts::PromptLibrary;
use crate::provider::ModelProvider;
use crate::specialists::{fan_out, SpecialistTask};
use crate::synthesis::synthesize;

/// Rejection message for queries below the confidence threshold.
const NOT_TRAVEL_RELATED: &str = "The query does not appear to be travel-related.";

/// The response envelope — the only externally observable output of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_plan: Option<TravelPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub query: String,
}

impl PlanResponse {
    fn completed(query: &str, plan: TravelPlan) -> Self {
        Self {
            success: true,
            confidence_score: Some(plan.confidence_score),
            resolved_provider: Some(plan.resolved_provider.clone()),
            travel_plan: Some(plan),
            error: None,
            query: query.to_string(),
        }
    }

    fn rejected(query: &str, score: f32) -> Self {
        Self {
            success: false,
            confidence_score: Some(score),
            resolved_provider: None,
            travel_plan: None,
            error: Some(NOT_TRAVEL_RELATED.to_string()),
            query: query.to_string(),
        }
    }

    fn failed(query: &str, error: &HermesError) -> Self {
        Self {
            success: false,
            confidence_score: None,
            resolved_provider: None,
            travel_plan: None,
            error: Some(error.to_string()),
            query: query.to_string(),
        }
    }
}

/// Sequences gate, fan-out, and synthesis for one request at a time.
pub struct FlowOrchestrator {
    config: EngineConfig,
    provider: Arc<dyn ModelProvider>,
    prompts: Arc<dyn PromptLibrary>,
}

impl FlowOrchestrator {
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn ModelProvider>,
        prompts: Arc<dyn PromptLibrary>,
    ) -> Self {
        Self {
            config,
            provider,
            prompts,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one request through the full pipeline.
    ///
    /// Never returns an error: every failure mode is encoded in the
    /// [`PlanResponse`] envelope.
    pub async fn plan_trip(&self, request: PlanRequest) -> PlanResponse {
        let started = Instant::now();
        let request_id = request.id.to_string();
        let _span = obs::FlowSpan::enter(&request_id);
        obs::emit_flow_started(&request_id, &request.query);

        let (state, response) = self.run(&request).await;

        obs::emit_flow_finished(
            &request_id,
            state,
            started.elapsed().as_millis() as u64,
            response.success,
        );
        response
    }

    async fn run(&self, request: &PlanRequest) -> (FlowState, PlanResponse) {
        let request_id = request.id.to_string();
        let mut state = FlowState::Init;

        let settings = match self.config.effective(request) {
            Ok(settings) => settings,
            Err(err) => {
                obs::emit_flow_fault(&request_id, &err);
                advance(&mut state, FlowState::Failed);
                return (state, PlanResponse::failed(&request.query, &err));
            }
        };

        // One cancel broadcast per flow; the sender stays here, receivers go
        // to every invocation so a deadline reaches backoff sleeps too.
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let deadline = self
            .config
            .flow_timeout
            .map(|t| tokio::time::Instant::now() + t);

        let invoker = ResilientInvoker::new(Arc::clone(&self.provider), settings.retry.clone());
        let gate = ConfidenceGate::new(self.config.confidence_threshold);

        // --- Gating ------------------------------------------------------
        advance(&mut state, FlowState::Gating);
        let gate_future = gate.assess(
            &invoker,
            &settings.chain,
            self.prompts.as_ref(),
            &request.query,
            settings.strict,
            cancel_rx.clone(),
        );
        let gate_outcome = match deadline {
            Some(at) => tokio::select! {
                outcome = gate_future => outcome,
                _ = tokio::time::sleep_until(at) => {
                    Err(HermesError::Cancelled(
                        "flow deadline exceeded during gating".to_string(),
                    ))
                }
            },
            None => gate_future.await,
        };
        let gate_outcome = match gate_outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                obs::emit_flow_fault(&request_id, &err);
                advance(&mut state, FlowState::Failed);
                return (state, PlanResponse::failed(&request.query, &err));
            }
        };

        let passed = gate.passes(&gate_outcome.result);
        obs::emit_gate_evaluated(
            &request_id,
            gate_outcome.result.score,
            gate.threshold(),
            passed,
        );

        if !passed {
            advance(&mut state, FlowState::Rejected);
            return (
                state,
                PlanResponse::rejected(&request.query, gate_outcome.result.score),
            );
        }

        let resolved_provider = gate_outcome
            .resolved
            .as_ref()
            .map(|t| t.provider.clone())
            .unwrap_or_else(|| "unknown".to_string());

        // --- Fan-out -----------------------------------------------------
        advance(&mut state, FlowState::FanningOut);
        let tasks = match SpecialistTask::resolve_all(self.prompts.as_ref()) {
            Ok(tasks) => tasks,
            Err(err) => {
                obs::emit_flow_fault(&request_id, &err);
                advance(&mut state, FlowState::Failed);
                return (state, PlanResponse::failed(&request.query, &err));
            }
        };

        let fan_future = fan_out(
            Arc::clone(&self.provider),
            &settings,
            tasks,
            &request.query,
            cancel_rx,
        );
        tokio::pin!(fan_future);
        let fan_result = match deadline {
            Some(at) => tokio::select! {
                result = &mut fan_future => result,
                _ = tokio::time::sleep_until(at) => {
                    // Deadline during the barrier wait: broadcast the cancel
                    // and still join every task. Completed results are
                    // preserved and fed to synthesis (partial-result policy).
                    debug!("flow deadline hit during fan-out; cancelling specialists");
                    let _ = cancel_tx.send(true);
                    fan_future.await
                }
            },
            None => fan_future.await,
        };
        let results = match fan_result {
            Ok(results) => results,
            Err(err) => {
                obs::emit_flow_fault(&request_id, &err);
                advance(&mut state, FlowState::Failed);
                return (state, PlanResponse::failed(&request.query, &err));
            }
        };

        for result in &results {
            obs::emit_specialist_finished(
                &request_id,
                result.id.as_str(),
                result.success,
                result.attempts,
            );
        }

        // --- Synthesis ---------------------------------------------------
        advance(&mut state, FlowState::Synthesizing);
        let plan = synthesize(&results, gate_outcome.result.score, &resolved_provider);

        advance(&mut state, FlowState::Completed);
        (state, PlanResponse::completed(&request.query, plan))
    }
}

/// Apply a strictly-forward state transition.
fn advance(state: &mut FlowState, next: FlowState) {
    debug_assert!(
        state.can_advance_to(next),
        "illegal flow transition {state} -> {next}"
    );
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::{default_library, StaticPromptLibrary};
    use crate::provider::fakes::FakeProvider;

    fn orchestrator_with(prompts: Arc<dyn PromptLibrary>) -> FlowOrchestrator {
        FlowOrchestrator::new(
            EngineConfig::default(),
            Arc::new(FakeProvider::new()),
            prompts,
        )
    }

    #[tokio::test]
    async fn test_unknown_provider_hint_fails_flow() {
        let orchestrator = orchestrator_with(Arc::new(default_library()));
        let request = PlanRequest::new("Plan a trip to Rome").with_provider_hint("mistral");

        let response = orchestrator.plan_trip(request).await;

        assert!(!response.success);
        assert!(response.confidence_score.is_none());
        assert!(response.travel_plan.is_none());
        assert!(response.error.unwrap().contains("invalid configuration"));
    }

    #[tokio::test]
    async fn test_missing_gate_template_fails_flow() {
        let orchestrator = orchestrator_with(Arc::new(StaticPromptLibrary::new()));
        let request = PlanRequest::new("Plan a trip to Rome");

        let response = orchestrator.plan_trip(request).await;

        assert!(!response.success);
        assert!(response
            .error
            .unwrap()
            .contains("prompt template not found"));
    }

    #[tokio::test]
    async fn test_missing_specialist_template_fails_flow_after_gate() {
        // Gate template present, specialists absent: the flow passes the
        // gate, then fails with a configuration error.
        let library = StaticPromptLibrary::new().with_template(
            "confidence",
            "score",
            crate::prompts::PROMPT_VERSION,
            "rate with a \"score\": {query}",
        );
        let orchestrator = orchestrator_with(Arc::new(library));
        let request = PlanRequest::new("Plan a weekend trip to Paris");

        let response = orchestrator.plan_trip(request).await;

        assert!(!response.success);
        assert!(response
            .error
            .unwrap()
            .contains("prompt template not found"));
    }

    #[test]
    fn test_rejection_envelope_shape() {
        let response = PlanResponse::rejected("What's the weather on Mars?", 0.1);
        assert!(!response.success);
        assert_eq!(response.confidence_score, Some(0.1));
        assert!(response.travel_plan.is_none());

        let json = serde_json::to_value(&response).unwrap();
        // Absent fields are omitted from the serialized envelope.
        assert!(json.get("travel_plan").is_none());
        assert!(json.get("resolved_provider").is_none());
        assert!(json.get("confidence_score").is_some());
    }
}
