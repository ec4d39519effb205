//! Edge inference from input-mapping references.
//!
//! The planner that produces workflows often omits edges that are implied by
//! data flow: a mapping value `step_1.items` means the containing step
//! depends on `step_1`. Inference scans every mapping and emits the implied
//! edges so the scheduler sees the complete graph.

use crate::workflow::reference::INPUT_PREFIX;
use crate::workflow::{Edge, Workflow};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// A mapping value shaped like a step reference: an identifier prefix
/// followed by a dot and a non-empty path.
fn step_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\..+$").expect("step reference regex is valid")
    })
}

/// Compute the complete edge set: declared edges plus edges implied by step
/// references in input mappings, deduplicated.
///
/// Pure: the caller (the validator) writes the result back onto the
/// workflow. Running inference on its own output is a no-op.
#[must_use]
pub fn infer_edges(workflow: &Workflow) -> Vec<Edge> {
    let step_ids: BTreeSet<&str> = workflow.steps.iter().map(|s| s.id.as_str()).collect();
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();

    // Declared edges first, in declaration order, duplicates dropped.
    let mut merged = Vec::new();
    for edge in &workflow.edges {
        if seen.insert((edge.from_step_id.clone(), edge.to_step_id.clone())) {
            merged.push(edge.clone());
        }
    }

    let mut inferred: BTreeSet<(String, String)> = BTreeSet::new();
    for step in &workflow.steps {
        for value in step.input_mapping.values() {
            if value.starts_with(INPUT_PREFIX) {
                continue;
            }
            let Some(caps) = step_ref_re().captures(value) else {
                continue;
            };
            let referenced = &caps[1];
            if referenced != step.id && step_ids.contains(referenced) {
                let pair = (referenced.to_string(), step.id.clone());
                if !seen.contains(&pair) {
                    inferred.insert(pair);
                }
            }
        }
    }

    // Inferred edges appended in sorted order for stable output.
    for (from, to) in inferred {
        merged.push(Edge::new(from, to));
    }
    merged
}
