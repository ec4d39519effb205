//! Validation error types.

/// A workflow validation failure.
///
/// Raised before any step runs; a workflow that fails validation is never
/// executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The type of error.
    pub kind: ValidationErrorKind,
    /// The location in the workflow (e.g. "steps.step_2.input_mapping.x").
    pub location: String,
    /// Human-readable error message.
    pub message: String,
}

/// Types of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A step id is empty.
    MissingId,
    /// Two steps share an id.
    DuplicateId,
    /// An edge endpoint names a step that does not exist.
    InvalidReference,
    /// The edge set contains a cycle.
    CycleDetected,
    /// An input mapping references a step that is not a transitive
    /// predecessor.
    UnreachableReference,
    /// A step names a tool absent from the registry.
    UnknownTool,
    /// A tool definition violates its structural invariants.
    InvalidToolConfig,
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MissingId => "MISSING_ID",
            Self::DuplicateId => "DUPLICATE_ID",
            Self::InvalidReference => "INVALID_REFERENCE",
            Self::CycleDetected => "CYCLE_DETECTED",
            Self::UnreachableReference => "UNREACHABLE_REFERENCE",
            Self::UnknownTool => "UNKNOWN_TOOL",
            Self::InvalidToolConfig => "INVALID_TOOL_CONFIG",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(
        kind: ValidationErrorKind,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a duplicate-id error.
    pub fn duplicate_id(location: impl Into<String>, id: &str) -> Self {
        Self::new(
            ValidationErrorKind::DuplicateId,
            location,
            format!("duplicate step id '{id}'"),
        )
    }

    /// Create an invalid-reference error.
    pub fn invalid_reference(location: impl Into<String>, reference: &str) -> Self {
        Self::new(
            ValidationErrorKind::InvalidReference,
            location,
            format!("reference to non-existent step '{reference}'"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_location() {
        let err = ValidationError::duplicate_id("steps[1]", "step_1");
        let msg = err.to_string();
        assert!(msg.contains("DUPLICATE_ID"));
        assert!(msg.contains("steps[1]"));
        assert!(msg.contains("step_1"));
    }
}
