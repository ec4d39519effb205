//! Workflow graph representation and deterministic topological ordering.

use std::collections::{BTreeMap, BTreeSet};
use trellis_core::error::{EngineError, Result};
use trellis_core::workflow::Workflow;

/// The workflow step graph, indexed for scheduling queries.
///
/// Built from a validated workflow: every edge endpoint is assumed to name
/// an existing step. All internal collections are ordered, so every
/// iteration this type exposes is deterministic.
#[derive(Debug)]
pub struct WorkflowGraph {
    /// All step ids.
    nodes: BTreeSet<String>,
    /// Outgoing neighbours, sorted per node.
    outgoing: BTreeMap<String, BTreeSet<String>>,
    /// Incoming neighbours, sorted per node.
    incoming: BTreeMap<String, BTreeSet<String>>,
}

impl WorkflowGraph {
    /// Build the graph from a workflow's steps and edges.
    #[must_use]
    pub fn from_workflow(workflow: &Workflow) -> Self {
        let nodes: BTreeSet<String> = workflow.steps.iter().map(|s| s.id.clone()).collect();
        let mut outgoing: BTreeMap<String, BTreeSet<String>> =
            nodes.iter().map(|id| (id.clone(), BTreeSet::new())).collect();
        let mut incoming = outgoing.clone();

        for edge in &workflow.edges {
            if let Some(neighbours) = outgoing.get_mut(&edge.from_step_id) {
                neighbours.insert(edge.to_step_id.clone());
            }
            if let Some(neighbours) = incoming.get_mut(&edge.to_step_id) {
                neighbours.insert(edge.from_step_id.clone());
            }
        }

        Self {
            nodes,
            outgoing,
            incoming,
        }
    }

    /// Number of steps in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct predecessors of a step, in sorted order.
    pub fn predecessors(&self, step_id: &str) -> impl Iterator<Item = &str> {
        self.incoming
            .get(step_id)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Direct successors of a step, in sorted order.
    pub fn successors(&self, step_id: &str) -> impl Iterator<Item = &str> {
        self.outgoing
            .get(step_id)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Kahn's algorithm with deterministic tie-breaking.
    ///
    /// The frontier is kept sorted, so among steps whose dependencies are all
    /// satisfied, the lexicographically smallest id runs first. Two
    /// equivalent workflows therefore always produce identical orderings.
    ///
    /// The validator has already rejected cyclic graphs; a non-covering
    /// result here is an internal error.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .map(|id| (id.as_str(), self.incoming[id].len()))
            .collect();

        // Sorted frontier: BTreeSet pops the smallest id first.
        let mut frontier: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(&node) = frontier.iter().next() {
            frontier.remove(node);
            order.push(node.to_string());

            for next in self.successors(node) {
                let degree = in_degree
                    .get_mut(next)
                    .ok_or_else(|| EngineError::Internal {
                        cause: format!("edge to unknown step '{next}'"),
                    })?;
                *degree -= 1;
                if *degree == 0 {
                    frontier.insert(next);
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck: Vec<&str> = self
                .nodes
                .iter()
                .map(String::as_str)
                .filter(|id| !order.iter().any(|o| o == id))
                .collect();
            return Err(EngineError::Internal {
                cause: format!(
                    "topological sort left steps unordered (undetected cycle?): {}",
                    stuck.join(", ")
                ),
            });
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::workflow::Step;

    fn workflow(ids: &[&str], edges: &[(&str, &str)]) -> Workflow {
        let mut wf = Workflow::new("wf", "test");
        for id in ids {
            wf = wf.with_step(Step::new(*id, "t"));
        }
        for (from, to) in edges {
            wf = wf.with_edge(*from, *to);
        }
        wf
    }

    #[test]
    fn linear_chain_sorts_in_order() {
        let graph = WorkflowGraph::from_workflow(&workflow(
            &["step_1", "step_2", "step_3"],
            &[("step_1", "step_2"), ("step_2", "step_3")],
        ));
        assert_eq!(
            graph.topological_sort().unwrap(),
            vec!["step_1", "step_2", "step_3"]
        );
    }

    #[test]
    fn ties_break_lexicographically() {
        // No edges at all: pure tie-break.
        let graph = WorkflowGraph::from_workflow(&workflow(&["step_3", "step_1", "step_2"], &[]));
        assert_eq!(
            graph.topological_sort().unwrap(),
            vec!["step_1", "step_2", "step_3"]
        );
    }

    #[test]
    fn diamond_sorts_deterministically() {
        let graph = WorkflowGraph::from_workflow(&workflow(
            &["step_1", "step_2", "step_3", "step_4"],
            &[
                ("step_1", "step_2"),
                ("step_1", "step_3"),
                ("step_2", "step_4"),
                ("step_3", "step_4"),
            ],
        ));
        assert_eq!(
            graph.topological_sort().unwrap(),
            vec!["step_1", "step_2", "step_3", "step_4"]
        );
    }

    #[test]
    fn order_respects_every_edge() {
        let wf = workflow(
            &["a", "b", "c", "d", "e"],
            &[("e", "a"), ("a", "c"), ("b", "c"), ("c", "d")],
        );
        let graph = WorkflowGraph::from_workflow(&wf);
        let order = graph.topological_sort().unwrap();
        assert_eq!(order.len(), 5);
        let position =
            |id: &str| order.iter().position(|o| o == id).expect("id in order");
        for edge in &wf.edges {
            assert!(position(&edge.from_step_id) < position(&edge.to_step_id));
        }
    }

    #[test]
    fn cycle_is_an_internal_error() {
        let graph = WorkflowGraph::from_workflow(&workflow(
            &["a", "b"],
            &[("a", "b"), ("b", "a")],
        ));
        let err = graph.topological_sort().unwrap_err();
        assert!(matches!(err, EngineError::Internal { .. }));
    }

    #[test]
    fn empty_graph_sorts_to_empty() {
        let graph = WorkflowGraph::from_workflow(&workflow(&[], &[]));
        assert!(graph.topological_sort().unwrap().is_empty());
        assert!(graph.is_empty());
    }

    #[test]
    fn predecessor_and_successor_queries() {
        let graph = WorkflowGraph::from_workflow(&workflow(
            &["a", "b", "c"],
            &[("a", "c"), ("b", "c")],
        ));
        let preds: Vec<_> = graph.predecessors("c").collect();
        assert_eq!(preds, vec!["a", "b"]);
        let succs: Vec<_> = graph.successors("a").collect();
        assert_eq!(succs, vec!["c"]);
    }
}
