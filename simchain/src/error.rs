//! Error taxonomy for mapping load, engine sessions, and case execution.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for core and session operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Failures raised by the orchestration core.
///
/// Disposal failures are deliberately absent: they are recorded as
/// [`crate::core::types::Diagnostic`]s and can never replace a run's outcome.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("mapping document not found: {origin}")]
    ConfigNotFound { origin: String },

    #[error("mapping document {origin} is malformed: {reason}")]
    ConfigMalformed { origin: String, reason: String },

    #[error("mapping document {origin} must contain a non-empty `{section}` mapping")]
    ConfigMissingSection {
        origin: String,
        section: &'static str,
    },

    #[error("`{section}` in {origin} is invalid: {reason}")]
    ConfigInvalidSection {
        origin: String,
        section: &'static str,
        reason: String,
    },

    #[error("model not found: {}", path.display())]
    ModelNotFound { path: PathBuf },

    #[error("engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    #[error("input `{name}` is not declared in input_paths")]
    UnknownInputName { name: String },

    #[error("engine address not found: {address}")]
    AddressNotFound { address: String },

    #[error("engine execution failed: {reason}")]
    EngineExecutionFailed { reason: String },

    #[error("engine {operation} failed: {reason}")]
    EngineFault {
        operation: &'static str,
        reason: String,
    },

    #[error("upstream output `{name}` is absent and the binding requires it")]
    MissingUpstreamValue { name: String },
}

/// Coarse grouping used to pick a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Mapping documents or case inputs are wrong; nothing was opened.
    Invalid,
    /// The engine could not be opened for the model.
    Open,
    /// A session was open and the run failed inside it.
    Run,
}

impl SimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimError::ConfigNotFound { .. }
            | SimError::ConfigMalformed { .. }
            | SimError::ConfigMissingSection { .. }
            | SimError::ConfigInvalidSection { .. }
            | SimError::UnknownInputName { .. } => ErrorKind::Invalid,
            SimError::ModelNotFound { .. } | SimError::EngineUnavailable { .. } => ErrorKind::Open,
            SimError::AddressNotFound { .. }
            | SimError::EngineExecutionFailed { .. }
            | SimError::EngineFault { .. }
            | SimError::MissingUpstreamValue { .. } => ErrorKind::Run,
        }
    }
}
