//! Hermes domain model: requests, plan artifacts, and error taxonomy.

pub mod error;
pub mod plan;
pub mod request;

pub use error::{HermesError, Result};
pub use plan::{
    ConfidenceResult, FlowState, SpecialistFailure, SpecialistId, SpecialistResult, TravelPlan,
    PLACEHOLDER_CONTENT,
};
pub use request::{PlanRequest, RequestOverrides};
