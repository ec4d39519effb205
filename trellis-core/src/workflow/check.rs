//! Declarative step checks.
//!
//! A check asserts something about a step's resolved inputs (before the
//! call) or its output (after). Critical checks fail the step; non-critical
//! ones surface as warnings on the step result.

use serde::{Deserialize, Serialize};

/// Which data a check runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckTarget {
    /// The resolved input mapping, before the HTTP call.
    Input,
    /// The step output, after the HTTP call.
    Output,
}

impl std::fmt::Display for CheckTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Output => "output",
        })
    }
}

/// The assertion a check performs on the field it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// The field exists and is not null.
    NotNull,
    /// The field is not null, `""`, `[]`, or `{}`.
    NotEmpty,
    /// String or array length is at least the `value` parameter.
    MinLength,
    /// The field's string form matches the `value` regex.
    Regex,
    /// The field's JSON type equals the `value` parameter
    /// (`string`, `number`, `bool`, `array`, `object`).
    Type,
}

/// One declarative assertion attached to a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCheck {
    /// Input or output data.
    pub target: CheckTarget,

    /// Dotted path into the checked data.
    pub field: String,

    /// The assertion to run.
    pub check: CheckKind,

    /// Parameter for `min_length`, `regex`, and `type` checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Override for the generated failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Critical failures fail the step; others become warnings.
    #[serde(default = "default_critical")]
    pub critical: bool,
}

fn default_critical() -> bool {
    true
}

impl StepCheck {
    /// Create a check with default criticality.
    pub fn new(target: CheckTarget, field: impl Into<String>, check: CheckKind) -> Self {
        Self {
            target,
            field: field.into(),
            check,
            value: None,
            message: None,
            critical: true,
        }
    }

    /// Set the check parameter.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Downgrade failures to warnings.
    #[must_use]
    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }
}
