//! Workflow validation: edge inference, structural checks, cycle detection,
//! and reachability analysis.

mod error;
mod inference;
mod validator;

pub use error::{ValidationError, ValidationErrorKind};
pub use inference::infer_edges;
pub use validator::{validate, WorkflowValidator};
