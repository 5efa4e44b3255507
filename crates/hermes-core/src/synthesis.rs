//! Synthesis — deterministic aggregation of specialist outcomes.
//!
//! Runs strictly after the fan-out barrier, single-threaded over the
//! collected results. Successful sections are included verbatim; failed
//! specialists contribute the placeholder marker and an entry in
//! `specialist_failures`.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::debug;

use crate::domain::plan::{SpecialistFailure, SpecialistResult, TravelPlan};

/// Join the complete set of specialist results into one [`TravelPlan`].
///
/// Synthesis only runs after the confidence gate passed, so the plan's
/// `success` flag is true by construction — partial specialist failure does
/// not flip it; degradation is visible in `specialist_failures` instead.
pub fn synthesize(
    results: &[SpecialistResult],
    confidence_score: f32,
    resolved_provider: &str,
) -> TravelPlan {
    let mut sections = BTreeMap::new();
    let mut specialist_failures = Vec::new();

    for result in results {
        sections.insert(result.id, result.content.clone());
        if !result.success {
            specialist_failures.push(SpecialistFailure {
                id: result.id,
                error: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown failure".to_string()),
            });
        }
    }

    debug!(
        sections = sections.len(),
        failures = specialist_failures.len(),
        "synthesized travel plan"
    );

    TravelPlan {
        sections,
        success: true,
        confidence_score,
        resolved_provider: resolved_provider.to_string(),
        specialist_failures,
        generated_at: Utc::now(),
    }
}
