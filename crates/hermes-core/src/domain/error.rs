//! Domain-level error taxonomy for Hermes.
//!
//! One enum per layer, bridged with `#[from]`:
//! - [`crate::provider::ProviderError`] — classified transport failures,
//!   absorbed by the invoker
//! - [`crate::invoker::InvokeError`] — terminal invocation outcomes
//! - [`HermesError`] — flow-level faults (configuration, cancellation)
//!
//! "Query not relevant" is deliberately NOT an error: it is the `Rejected`
//! terminal flow outcome carried in the response envelope.

use crate::invoker::InvokeError;

/// Hermes flow-level errors.
///
/// Configuration variants are always fatal regardless of strict mode.
#[derive(Debug, thiserror::Error)]
pub enum HermesError {
    #[error("prompt template not found: {agent}/{task} v{version}")]
    MissingTemplate {
        agent: String,
        task: String,
        version: u32,
    },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("flow cancelled: {0}")]
    Cancelled(String),

    #[error("invocation error: {0}")]
    Invoke(#[from] InvokeError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HermesError {
    /// Whether this error denotes a cancellation (deadline or external
    /// signal) rather than a configuration or provider fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, HermesError::Cancelled(_))
            || matches!(self, HermesError::Invoke(InvokeError::Cancelled { .. }))
    }
}

/// Result type for Hermes domain operations.
pub type Result<T> = std::result::Result<T, HermesError>;
