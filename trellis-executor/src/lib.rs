//! Trellis Executor - deterministic workflow execution.
//!
//! This crate turns a validated workflow into a finished run:
//! - Topological scheduling with lexicographic tie-breaking ([`scheduler`])
//! - Per-run state and reference resolution ([`state`])
//! - HTTP dispatch over structured and legacy tool shapes ([`dispatch`])
//! - Declarative step checks ([`checks`])
//! - The sequential run executor and its observer hooks ([`executor`],
//!   [`events`])
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//! use trellis_core::{Step, ToolDefinition, ToolRegistry, Workflow};
//! use trellis_executor::{Engine, EngineConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tools = ToolRegistry::new();
//! tools.register(ToolDefinition::new("search", "Search", "https://api.example.com"));
//!
//! let workflow = Workflow::new("wf_demo", "Demo")
//!     .with_step(Step::new("step_1", "search").with_input("q", "$input.query"));
//!
//! let engine = Engine::new(EngineConfig::default())?;
//! let run = engine
//!     .execute(
//!         &workflow,
//!         &tools,
//!         json!({"query": "rust"}),
//!         &Default::default(),
//!         CancellationToken::new(),
//!     )
//!     .await?;
//! println!("run {} finished: {:?}", run.id, run.status);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checks;
pub mod dispatch;
pub mod events;
pub mod executor;
pub mod scheduler;
pub mod state;

pub use checks::{run_checks, CheckOutcome};
pub use dispatch::{DispatchConfig, Dispatcher};
pub use events::{ChannelObserver, FnObserver, NoopObserver, RunObserver};
pub use executor::{Engine, EngineConfig, ExecuteError};
pub use scheduler::WorkflowGraph;
pub use state::StateManager;
