//! Hermes Core Library
//!
//! Resilient orchestration engine for confidence-gated travel planning:
//! a single gating inference, a parallel specialist fan-out, and a
//! deterministic synthesis stage, with every provider call wrapped in a
//! retry/backoff/multi-model-fallback layer.

pub mod config;
pub mod domain;
pub mod flow;
pub mod gate;
pub mod invoker;
pub mod obs;
pub mod prompts;
pub mod provider;
pub mod specialists;
pub mod synthesis;
pub mod telemetry;

pub use config::{EffectiveSettings, EngineConfig, FallbackChain, RetryConfig};

pub use domain::{
    ConfidenceResult, FlowState, HermesError, PlanRequest, RequestOverrides, Result,
    SpecialistFailure, SpecialistId, SpecialistResult, TravelPlan, PLACEHOLDER_CONTENT,
};

pub use flow::{FlowOrchestrator, PlanResponse};

pub use gate::{ConfidenceGate, GateOutcome};

pub use invoker::{never_cancel, AttemptRecord, InvocationOutcome, InvokeError, ResilientInvoker};

pub use prompts::{default_library, PromptLibrary, PromptTemplate, StaticPromptLibrary};

pub use provider::fakes::{FakeProvider, ScriptedOutcome, ScriptedProvider};
pub use provider::http::{HttpModelProvider, HttpProviderConfig};
pub use provider::{ModelProvider, ModelTarget, ProviderError};

pub use specialists::{fan_out, SpecialistTask};

pub use synthesis::synthesize;

pub use obs::FlowSpan;
pub use telemetry::init_tracing;

/// Hermes version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
