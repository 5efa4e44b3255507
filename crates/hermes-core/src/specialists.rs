//! Specialist fan-out — one independent inference task per specialist.
//!
//! Each specialist runs in its own tokio task with its own resilient
//! invocation over its own fallback chain. Failure of one task never
//! cancels or degrades a sibling; the stage returns only once every task
//! has reached a terminal outcome (a join barrier, not a race).

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::config::EffectiveSettings;
use crate::domain::error::{HermesError, Result};
use crate::domain::plan::{SpecialistId, SpecialistResult, PLACEHOLDER_CONTENT};
use crate::invoker::{InvokeError, ResilientInvoker};
use crate::prompts::{PromptLibrary, PromptTemplate, PROMPT_VERSION};
use crate::provider::ModelProvider;

/// Task id each specialist agent registers in the prompt library.
fn library_task(id: SpecialistId) -> &'static str {
    match id {
        SpecialistId::Information => "research",
        SpecialistId::Safety => "assess",
        SpecialistId::Experience => "curate",
        SpecialistId::Logistics => "plan",
        SpecialistId::Finance => "budget",
    }
}

/// One specialist's unit of work: identifier plus resolved template.
/// A plain value — no inheritance, one instance per specialist.
#[derive(Debug, Clone)]
pub struct SpecialistTask {
    pub id: SpecialistId,
    pub template: PromptTemplate,
}

impl SpecialistTask {
    /// Resolve tasks for the full specialist set. Any missing template is a
    /// fatal configuration error before a single task launches.
    pub fn resolve_all(prompts: &dyn PromptLibrary) -> Result<Vec<SpecialistTask>> {
        SpecialistId::ALL
            .iter()
            .map(|&id| {
                let agent = id.as_str();
                let task = library_task(id);
                let template = prompts.resolve(agent, task, PROMPT_VERSION).ok_or_else(|| {
                    HermesError::MissingTemplate {
                        agent: agent.to_string(),
                        task: task.to_string(),
                        version: PROMPT_VERSION,
                    }
                })?;
                Ok(SpecialistTask { id, template })
            })
            .collect()
    }

    fn prompt_for(&self, query: &str) -> String {
        self.template.render(&[("query", query)])
    }
}

/// Run every specialist task concurrently and join them all.
///
/// In non-strict mode a terminal invocation failure becomes a placeholder
/// section with the error captured on the result. In strict mode it aborts
/// the stage with a fatal error — but only after the barrier, so sibling
/// outcomes are never cut short. Cancellation-classified failures are
/// absorbed in either mode (partial-result policy).
#[instrument(skip_all, fields(specialists = tasks.len()))]
pub async fn fan_out(
    provider: Arc<dyn ModelProvider>,
    settings: &EffectiveSettings,
    tasks: Vec<SpecialistTask>,
    query: &str,
    cancel: watch::Receiver<bool>,
) -> Result<Vec<SpecialistResult>> {
    let mut handles = Vec::with_capacity(tasks.len());

    for task in tasks {
        let invoker = ResilientInvoker::new(Arc::clone(&provider), settings.retry.clone());
        let chain = settings.chain_for(task.id).clone();
        let prompt = task.prompt_for(query);
        let cancel = cancel.clone();
        let strict = settings.strict;
        let id = task.id;

        let handle = tokio::spawn(async move {
            match invoker.invoke(&chain, &prompt, cancel).await {
                Ok(outcome) => {
                    debug!(specialist = %id, attempts = outcome.attempts, "specialist succeeded");
                    Ok(SpecialistResult {
                        id,
                        content: outcome.content,
                        success: true,
                        error: None,
                        attempts: outcome.attempts,
                        resolved: Some(outcome.resolved),
                    })
                }
                Err(err) => {
                    warn!(specialist = %id, error = %err, "specialist failed terminally");
                    let cancelled = matches!(err, InvokeError::Cancelled { .. });
                    if strict && !cancelled {
                        return Err(HermesError::from(err));
                    }
                    let attempts = match &err {
                        InvokeError::Exhausted { attempts, .. } => *attempts,
                        InvokeError::Cancelled { .. } => 0,
                    };
                    Ok(SpecialistResult {
                        id,
                        content: PLACEHOLDER_CONTENT.to_string(),
                        success: false,
                        error: Some(err.to_string()),
                        attempts,
                        resolved: None,
                    })
                }
            }
        });
        handles.push((id, handle));
    }

    // Join barrier: every task reaches a terminal outcome before we return.
    let mut results = Vec::with_capacity(handles.len());
    let mut fatal: Option<HermesError> = None;

    for (id, handle) in handles {
        match handle.await {
            Ok(Ok(result)) => results.push(result),
            Ok(Err(err)) => {
                // Strict-mode fatal; keep joining the remaining tasks first.
                if fatal.is_none() {
                    fatal = Some(err);
                }
            }
            Err(join_err) => {
                warn!(specialist = %id, error = %join_err, "specialist task panicked");
                results.push(SpecialistResult {
                    id,
                    content: PLACEHOLDER_CONTENT.to_string(),
                    success: false,
                    error: Some(format!("specialist task failed: {join_err}")),
                    attempts: 0,
                    resolved: None,
                });
            }
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(results),
    }
}
