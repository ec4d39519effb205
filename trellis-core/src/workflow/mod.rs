//! Workflow definitions - the static step graph.
//!
//! A workflow is an ordered list of steps plus a set of directed edges.
//! Steps reference tools and carry an input mapping whose values are
//! reference expressions (see [`reference`]). Validation normalises the edge
//! set by adding edges implied by those references.

pub mod check;
pub mod reference;
pub mod validation;

pub use check::{CheckKind, CheckTarget, StepCheck};
pub use reference::Reference;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A directed edge between two steps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source step id.
    pub from_step_id: String,
    /// Target step id.
    pub to_step_id: String,
}

impl Edge {
    /// Create a new edge.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from_step_id: from.into(),
            to_step_id: to.into(),
        }
    }
}

/// A node in the workflow graph, bound to one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique step id (conventionally `step_1`, `step_2`, ...). Lexicographic
    /// order of ids breaks scheduling ties, so ids double as a stable sort key.
    pub id: String,

    /// Human-readable label.
    #[serde(default)]
    pub name: String,

    /// The tool this step invokes.
    pub tool_id: String,

    /// Input name -> reference expression.
    #[serde(default)]
    pub input_mapping: BTreeMap<String, String>,

    /// Declarative checks run against resolved inputs and the output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<StepCheck>,
}

impl Step {
    /// Create a new step.
    pub fn new(id: impl Into<String>, tool_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            tool_id: tool_id.into(),
            input_mapping: BTreeMap::new(),
            checks: Vec::new(),
        }
    }

    /// Set the human-readable label.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Map an input name to a reference expression.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, reference: impl Into<String>) -> Self {
        self.input_mapping.insert(name.into(), reference.into());
        self
    }

    /// Attach a check.
    #[must_use]
    pub fn with_check(mut self, check: StepCheck) -> Self {
        self.checks.push(check);
        self
    }
}

/// The static graph description: steps, edges, input mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique workflow identifier.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Definition version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// When the definition was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// The steps, in declaration order.
    pub steps: Vec<Step>,

    /// Directed edges. Validation adds edges implied by input-mapping
    /// references; explicit edges are never removed.
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    /// Create a new workflow with no steps.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: None,
            created_at: None,
            steps: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Add a step.
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Add an explicit edge.
    #[must_use]
    pub fn with_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge::new(from, to));
        self
    }

    /// Get a step by id.
    #[must_use]
    pub fn get_step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Check whether a step with the given id exists.
    #[must_use]
    pub fn has_step(&self, id: &str) -> bool {
        self.steps.iter().any(|s| s.id == id)
    }

    /// Iterate step ids in declaration order.
    pub fn step_ids(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.id.as_str())
    }

    /// Iterate edges into a given step.
    pub fn edges_to<'a>(&'a self, step_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.to_step_id == step_id)
    }

    /// Iterate edges out of a given step.
    pub fn edges_from<'a>(&'a self, step_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.from_step_id == step_id)
    }
}
