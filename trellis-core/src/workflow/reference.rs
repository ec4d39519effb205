//! Reference expressions - the data-flow language of input mappings.
//!
//! Every input-mapping value is one of:
//!
//! - `$input.<dotted-path>` - drawn from the run's user inputs
//! - `<step_id>.<dotted-path>` - drawn from a completed step's output
//! - anything without a `.` - a literal string
//!
//! The grammar is positional: a string containing a `.` that is not an
//! `$input` reference is always read as a step reference, and validation
//! rejects it if the prefix is not a known predecessor step.

/// Prefix marking a user-input reference.
pub const INPUT_PREFIX: &str = "$input.";

/// A parsed reference expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `$input.<path>`: traverse the run's user inputs.
    UserInput {
        /// Dotted path into the user inputs.
        path: String,
    },
    /// `<step_id>.<path>`: traverse a completed step's output.
    StepOutput {
        /// The referenced step.
        step_id: String,
        /// Dotted path into that step's output.
        path: String,
    },
    /// A literal string value.
    Literal(String),
}

impl Reference {
    /// Parse a raw mapping value into a reference.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Some(path) = raw.strip_prefix(INPUT_PREFIX) {
            return Self::UserInput {
                path: path.to_string(),
            };
        }
        if let Some((step_id, path)) = raw.split_once('.') {
            return Self::StepOutput {
                step_id: step_id.to_string(),
                path: path.to_string(),
            };
        }
        Self::Literal(raw.to_string())
    }

    /// The referenced step id, for step-output references.
    #[must_use]
    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::StepOutput { step_id, .. } => Some(step_id),
            _ => None,
        }
    }
}
