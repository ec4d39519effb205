//! Error types for the Trellis engine.
//!
//! Runtime step failures are represented by [`EngineError`]. Each variant
//! carries the identifiers needed to diagnose the failure (tool id, URL,
//! reference expression, template path) and maps to a stable error code and
//! a machine-readable kind consumed by step results.
//!
//! Graph validation has its own error type; see
//! [`crate::workflow::validation::ValidationError`].

use thiserror::Error;

/// Errors raised while executing a single step.
///
/// These never abort a run: the executor converts them into FAILED step
/// results and skips the remaining steps.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A reference expression could not be resolved against run state.
    #[error("E101: cannot resolve '{reference}': {cause}")]
    StateResolution {
        /// The reference expression that failed to resolve.
        reference: String,
        /// Reason for the failure.
        cause: String,
    },

    /// Strict template rendering found a missing key.
    #[error("E102: missing template key '{key}' at {path}")]
    Template {
        /// The placeholder name with no value.
        key: String,
        /// Location of the placeholder within the template structure.
        path: String,
    },

    /// The HTTP call failed: network error, non-2xx status, or unparseable
    /// response.
    #[error("E201: dispatch failed for tool '{tool}' at {url}{}: {cause}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Dispatch {
        /// The tool being called.
        tool: String,
        /// The request URL.
        url: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Reason for the failure.
        cause: String,
    },

    /// Strict response extraction missed a path.
    #[error("E202: response extraction failed for tool '{tool}': field '{path}' not found")]
    Extraction {
        /// The tool whose response was being projected.
        tool: String,
        /// The dotted path that did not resolve.
        path: String,
    },

    /// A critical step check failed.
    #[error("E301: {stage} check failed: {cause}")]
    CheckFailed {
        /// Which data was checked ("input" or "output").
        stage: String,
        /// Joined check failure messages.
        cause: String,
    },

    /// The run was cancelled while this step was executing.
    #[error("E401: cancelled")]
    Cancelled,

    /// A bug: state the engine should have made unrepresentable.
    #[error("E901: internal error: {cause}")]
    Internal {
        /// Description of the inconsistency.
        cause: String,
    },
}

impl EngineError {
    /// Get the stable error code (e.g. "E101").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::StateResolution { .. } => "E101",
            Self::Template { .. } => "E102",
            Self::Dispatch { .. } => "E201",
            Self::Extraction { .. } => "E202",
            Self::CheckFailed { .. } => "E301",
            Self::Cancelled => "E401",
            Self::Internal { .. } => "E901",
        }
    }

    /// Machine-readable kind, recorded as `error_kind` on failed step results.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StateResolution { .. } => "state_resolution",
            Self::Template { .. } => "template",
            Self::Dispatch { .. } => "dispatch",
            Self::Extraction { .. } => "extraction",
            Self::CheckFailed { .. } => "check",
            Self::Cancelled => "cancelled",
            Self::Internal { .. } => "internal",
        }
    }

    /// Check if this error carries an HTTP status.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Dispatch { status, .. } => *status,
            _ => None,
        }
    }
}

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;
