//! Per-run state: user inputs and completed step outputs.
//!
//! One `StateManager` exists per run. The executor is its only writer, and
//! steps are serialised, so readers always observe every predecessor's
//! recorded output.

use serde_json::{Map, Value};
use std::collections::HashMap;
use trellis_core::error::{EngineError, Result};
use trellis_core::value;
use trellis_core::workflow::Reference;

/// Resolves input mappings against user inputs and recorded step outputs.
#[derive(Debug)]
pub struct StateManager {
    user_inputs: Value,
    step_outputs: HashMap<String, Value>,
}

impl StateManager {
    /// Create a state manager for a run with the given user inputs.
    #[must_use]
    pub fn new(user_inputs: Value) -> Self {
        Self {
            user_inputs,
            step_outputs: HashMap::new(),
        }
    }

    /// Record a completed step's output.
    pub fn record(&mut self, step_id: impl Into<String>, output: Value) {
        self.step_outputs.insert(step_id.into(), output);
    }

    /// Get a recorded output.
    #[must_use]
    pub fn output_of(&self, step_id: &str) -> Option<&Value> {
        self.step_outputs.get(step_id)
    }

    /// Resolve an input mapping to a flat name -> value map.
    pub fn resolve<'m, I>(&self, input_mapping: I) -> Result<Map<String, Value>>
    where
        I: IntoIterator<Item = (&'m String, &'m String)>,
    {
        let mut resolved = Map::new();
        for (name, raw) in input_mapping {
            resolved.insert(name.clone(), self.resolve_reference(raw)?);
        }
        Ok(resolved)
    }

    /// Resolve a single reference expression.
    pub fn resolve_reference(&self, raw: &str) -> Result<Value> {
        match Reference::parse(raw) {
            Reference::UserInput { path } => value::traverse(&self.user_inputs, &path)
                .map(Value::clone)
                .map_err(|e| EngineError::StateResolution {
                    reference: raw.to_string(),
                    cause: format!("missing user input: {e}"),
                }),
            Reference::StepOutput { step_id, path } => {
                let output = self.step_outputs.get(&step_id).ok_or_else(|| {
                    EngineError::StateResolution {
                        reference: raw.to_string(),
                        cause: format!("no output recorded for step '{step_id}'"),
                    }
                })?;
                value::traverse(output, &path).map(Value::clone).map_err(|e| {
                    EngineError::StateResolution {
                        reference: raw.to_string(),
                        cause: format!("step '{step_id}' output: {e}"),
                    }
                })
            }
            Reference::Literal(text) => Ok(Value::String(text)),
        }
    }
}
