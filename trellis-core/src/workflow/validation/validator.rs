//! Workflow validation logic.
//!
//! Validation runs a fixed sequence of passes; the first failure aborts.
//! Pass two (edge inference) writes the completed edge set back onto the
//! workflow, so a workflow that validated is also normalised: its edge set
//! is closed under "references imply edges" and safe to schedule.
//!
//! Iteration orders are sorted by step id throughout, so reported cycles and
//! errors are identical across runs.

use super::error::{ValidationError, ValidationErrorKind};
use super::inference::infer_edges;
use crate::registry::ToolRegistry;
use crate::workflow::reference::Reference;
use crate::workflow::Workflow;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Validator for workflows against a tool registry.
pub struct WorkflowValidator<'a> {
    tools: &'a ToolRegistry,
}

/// Validate and normalise a workflow in place.
///
/// On success the workflow's edge set has been replaced with the complete,
/// deduplicated set. On failure the workflow may already carry the inferred
/// edges; callers that need the original should validate a clone.
pub fn validate(workflow: &mut Workflow, tools: &ToolRegistry) -> Result<(), ValidationError> {
    WorkflowValidator::new(tools).validate(workflow)
}

impl<'a> WorkflowValidator<'a> {
    /// Create a validator using the given registry for tool resolution.
    pub fn new(tools: &'a ToolRegistry) -> Self {
        Self { tools }
    }

    /// Run all validation passes; the first failure aborts.
    pub fn validate(&self, workflow: &mut Workflow) -> Result<(), ValidationError> {
        self.check_step_ids(workflow)?;
        workflow.edges = infer_edges(workflow);
        self.check_edge_references(workflow)?;
        self.check_no_cycles(workflow)?;
        self.check_mapping_reachability(workflow)?;
        self.check_tools(workflow)?;
        Ok(())
    }

    fn check_step_ids(&self, workflow: &Workflow) -> Result<(), ValidationError> {
        let mut seen = BTreeSet::new();
        for (idx, step) in workflow.steps.iter().enumerate() {
            let location = format!("steps[{idx}]");
            if step.id.is_empty() {
                return Err(ValidationError::new(
                    ValidationErrorKind::MissingId,
                    location,
                    "step id must not be empty",
                ));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(ValidationError::duplicate_id(location, &step.id));
            }
        }
        Ok(())
    }

    fn check_edge_references(&self, workflow: &Workflow) -> Result<(), ValidationError> {
        for (idx, edge) in workflow.edges.iter().enumerate() {
            let location = format!("edges[{idx}]");
            if !workflow.has_step(&edge.from_step_id) {
                return Err(ValidationError::invalid_reference(
                    format!("{location}.from_step_id"),
                    &edge.from_step_id,
                ));
            }
            if !workflow.has_step(&edge.to_step_id) {
                return Err(ValidationError::invalid_reference(
                    format!("{location}.to_step_id"),
                    &edge.to_step_id,
                ));
            }
        }
        Ok(())
    }

    /// Three-colour depth-first search over outgoing edges; a grey-to-grey
    /// traversal is a cycle, reported with the path around it.
    fn check_no_cycles(&self, workflow: &Workflow) -> Result<(), ValidationError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Colour {
            White,
            Grey,
            Black,
        }

        let adjacency = outgoing_adjacency(workflow);
        let mut colour: BTreeMap<&str, Colour> = workflow
            .step_ids()
            .map(|id| (id, Colour::White))
            .collect();

        fn dfs<'w>(
            node: &'w str,
            adjacency: &BTreeMap<&'w str, BTreeSet<&'w str>>,
            colour: &mut BTreeMap<&'w str, Colour>,
            stack: &mut Vec<&'w str>,
        ) -> Option<Vec<String>> {
            colour.insert(node, Colour::Grey);
            stack.push(node);
            if let Some(neighbours) = adjacency.get(node) {
                for &next in neighbours {
                    match colour[next] {
                        Colour::Grey => {
                            // Close the loop for the report.
                            let start = stack.iter().position(|&n| n == next).unwrap_or(0);
                            let mut cycle: Vec<String> =
                                stack[start..].iter().map(|s| s.to_string()).collect();
                            cycle.push(next.to_string());
                            return Some(cycle);
                        }
                        Colour::White => {
                            if let Some(cycle) = dfs(next, adjacency, colour, stack) {
                                return Some(cycle);
                            }
                        }
                        Colour::Black => {}
                    }
                }
            }
            stack.pop();
            colour.insert(node, Colour::Black);
            None
        }

        // Sorted roots keep the reported cycle stable.
        let roots: Vec<&str> = colour.keys().copied().collect();
        for root in roots {
            if colour[root] == Colour::White {
                let mut stack = Vec::new();
                if let Some(cycle) = dfs(root, &adjacency, &mut colour, &mut stack) {
                    return Err(ValidationError::new(
                        ValidationErrorKind::CycleDetected,
                        "edges",
                        format!("cycle detected: {}", cycle.join(" -> ")),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Every step reference in an input mapping must point at a transitive
    /// predecessor of the referencing step.
    fn check_mapping_reachability(&self, workflow: &Workflow) -> Result<(), ValidationError> {
        let step_ids: BTreeSet<&str> = workflow.step_ids().collect();
        let predecessors = transitive_predecessors(workflow);

        for step in &workflow.steps {
            for (input, value) in &step.input_mapping {
                let Reference::StepOutput { step_id, .. } = Reference::parse(value) else {
                    continue;
                };
                let location = format!("steps.{}.input_mapping.{input}", step.id);
                if !step_ids.contains(step_id.as_str()) {
                    return Err(ValidationError::invalid_reference(location, &step_id));
                }
                let reachable = predecessors
                    .get(step.id.as_str())
                    .is_some_and(|preds| preds.contains(step_id.as_str()));
                if !reachable {
                    return Err(ValidationError::new(
                        ValidationErrorKind::UnreachableReference,
                        location,
                        format!(
                            "step '{}' references '{step_id}', which is not one of its predecessors",
                            step.id
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_tools(&self, workflow: &Workflow) -> Result<(), ValidationError> {
        for step in &workflow.steps {
            let location = format!("steps.{}.tool_id", step.id);
            let Some(tool) = self.tools.get(&step.tool_id) else {
                return Err(ValidationError::new(
                    ValidationErrorKind::UnknownTool,
                    location,
                    format!("tool '{}' not found in registry", step.tool_id),
                ));
            };
            if let Err(cause) = tool.check_invariants() {
                return Err(ValidationError::new(
                    ValidationErrorKind::InvalidToolConfig,
                    location,
                    cause,
                ));
            }
        }
        Ok(())
    }
}

/// Outgoing adjacency with sorted neighbour sets.
fn outgoing_adjacency<'w>(workflow: &'w Workflow) -> BTreeMap<&'w str, BTreeSet<&'w str>> {
    let mut adjacency: BTreeMap<&str, BTreeSet<&str>> =
        workflow.step_ids().map(|id| (id, BTreeSet::new())).collect();
    for edge in &workflow.edges {
        if let Some(neighbours) = adjacency.get_mut(edge.from_step_id.as_str()) {
            neighbours.insert(&edge.to_step_id);
        }
    }
    adjacency
}

/// Transitive predecessor sets, per step, via breadth-first walk over
/// incoming edges.
fn transitive_predecessors<'w>(workflow: &'w Workflow) -> BTreeMap<&'w str, BTreeSet<&'w str>> {
    let mut direct: BTreeMap<&str, BTreeSet<&str>> =
        workflow.step_ids().map(|id| (id, BTreeSet::new())).collect();
    for edge in &workflow.edges {
        if let Some(preds) = direct.get_mut(edge.to_step_id.as_str()) {
            preds.insert(&edge.from_step_id);
        }
    }

    let mut result = BTreeMap::new();
    for id in workflow.step_ids() {
        let mut all = BTreeSet::new();
        let mut queue: VecDeque<&str> = direct.get(id).into_iter().flatten().copied().collect();
        while let Some(pred) = queue.pop_front() {
            if all.insert(pred) {
                queue.extend(direct.get(pred).into_iter().flatten().copied());
            }
        }
        result.insert(id, all);
    }
    result
}
