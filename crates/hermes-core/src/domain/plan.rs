//! Plan artifacts: specialist identifiers, stage results, the final
//! travel plan, and the flow state machine.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::ModelTarget;

/// Placeholder content written into a section whose specialist failed
/// terminally in non-strict mode.
pub const PLACEHOLDER_CONTENT: &str = "[section unavailable]";

/// The fixed set of specialist agents fanned out per approved request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistId {
    /// Real-time, location-specific information (weather, events, advisories).
    Information,
    /// Emergency contacts, risk areas, insurance guidance.
    Safety,
    /// Restaurants, attractions, personalized experiences.
    Experience,
    /// Transport, accommodation, scheduling.
    Logistics,
    /// Budget allocation and expense tracking.
    Finance,
}

impl SpecialistId {
    /// All specialists, in deterministic fan-out order.
    pub const ALL: [SpecialistId; 5] = [
        SpecialistId::Information,
        SpecialistId::Safety,
        SpecialistId::Experience,
        SpecialistId::Logistics,
        SpecialistId::Finance,
    ];

    /// Stable identifier used as a section key and prompt-library agent id.
    pub fn as_str(self) -> &'static str {
        match self {
            SpecialistId::Information => "information",
            SpecialistId::Safety => "safety",
            SpecialistId::Experience => "experience",
            SpecialistId::Logistics => "logistics",
            SpecialistId::Finance => "finance",
        }
    }
}

impl fmt::Display for SpecialistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the single gating inference. Produced once per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    /// Relevance score in 0.0–1.0.
    pub score: f32,
    /// Model rationale, or the failure detail when scoring failed.
    pub rationale: String,
}

impl ConfidenceResult {
    /// A zero-score result recording why scoring failed. The gate never
    /// silently defaults to "pass".
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            rationale: detail.into(),
        }
    }
}

/// Terminal outcome of one specialist task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistResult {
    pub id: SpecialistId,
    /// Section content on success, placeholder marker on terminal failure.
    pub content: String,
    pub success: bool,
    /// Captured terminal error, if any.
    pub error: Option<String>,
    /// Provider attempts consumed across the whole fallback chain.
    pub attempts: u32,
    /// The (provider, model) that actually produced the content.
    pub resolved: Option<ModelTarget>,
}

/// One specialist-level failure surfaced on the final plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistFailure {
    pub id: SpecialistId,
    pub error: String,
}

/// Aggregated structured output — the terminal artifact of a request.
/// Never mutated after synthesis returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelPlan {
    /// Sections keyed by specialist identifier, deterministic order.
    pub sections: BTreeMap<SpecialistId, String>,
    /// True iff the confidence gate passed. Partial specialist failure does
    /// not flip this flag; see `specialist_failures`.
    pub success: bool,
    pub confidence_score: f32,
    /// Flow-level provider label (from the gate's resolved target).
    pub resolved_provider: String,
    pub specialist_failures: Vec<SpecialistFailure>,
    pub generated_at: DateTime<Utc>,
}

/// Flow progress for one request. Transitions are strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Init,
    Gating,
    Rejected,
    FanningOut,
    Synthesizing,
    Completed,
    Failed,
}

impl FlowState {
    /// Position in the forward order. Terminal states share the top rank.
    fn rank(self) -> u8 {
        match self {
            FlowState::Init => 0,
            FlowState::Gating => 1,
            FlowState::FanningOut => 2,
            FlowState::Synthesizing => 3,
            FlowState::Rejected | FlowState::Completed | FlowState::Failed => 4,
        }
    }

    /// Whether the flow has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FlowState::Rejected | FlowState::Completed | FlowState::Failed
        )
    }

    /// Whether `next` is a legal strictly-forward transition from `self`.
    pub fn can_advance_to(self, next: FlowState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowState::Init => "init",
            FlowState::Gating => "gating",
            FlowState::Rejected => "rejected",
            FlowState::FanningOut => "fanning_out",
            FlowState::Synthesizing => "synthesizing",
            FlowState::Completed => "completed",
            FlowState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specialist_ids_are_stable() {
        assert_eq!(SpecialistId::ALL.len(), 5);
        let keys: Vec<&str> = SpecialistId::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            keys,
            vec!["information", "safety", "experience", "logistics", "finance"]
        );
    }

    #[test]
    fn test_specialist_id_serde_snake_case() {
        let json = serde_json::to_string(&SpecialistId::Information).unwrap();
        assert_eq!(json, "\"information\"");
        let back: SpecialistId = serde_json::from_str("\"logistics\"").unwrap();
        assert_eq!(back, SpecialistId::Logistics);
    }

    #[test]
    fn test_flow_state_forward_only() {
        assert!(FlowState::Init.can_advance_to(FlowState::Gating));
        assert!(FlowState::Gating.can_advance_to(FlowState::Rejected));
        assert!(FlowState::Gating.can_advance_to(FlowState::FanningOut));
        assert!(FlowState::FanningOut.can_advance_to(FlowState::Synthesizing));
        assert!(FlowState::Synthesizing.can_advance_to(FlowState::Completed));

        // No re-entry or backwards motion.
        assert!(!FlowState::FanningOut.can_advance_to(FlowState::Gating));
        assert!(!FlowState::Completed.can_advance_to(FlowState::Gating));
        assert!(!FlowState::Rejected.can_advance_to(FlowState::FanningOut));
        assert!(!FlowState::Failed.can_advance_to(FlowState::Completed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(FlowState::Rejected.is_terminal());
        assert!(FlowState::Completed.is_terminal());
        assert!(FlowState::Failed.is_terminal());
        assert!(!FlowState::Gating.is_terminal());
    }

    #[test]
    fn test_confidence_failed_is_zero() {
        let result = ConfidenceResult::failed("provider exhausted");
        assert_eq!(result.score, 0.0);
        assert!(result.rationale.contains("provider exhausted"));
    }
}
