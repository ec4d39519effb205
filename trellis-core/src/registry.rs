//! Tool registry - the set of endpoints a workflow may call.
//!
//! The registry is an in-memory map from tool id to definition. Definitions
//! are registered directly or loaded from a directory of YAML files, one
//! tool per file. The registry is read-only for the duration of a run and
//! may be shared across runs.

use crate::tool::ToolDefinition;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Error loading tool definitions from disk.
#[derive(Debug)]
pub enum RegistryLoadError {
    /// I/O error reading a file or directory.
    Io {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// A file did not parse as a tool definition.
    Parse {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying YAML error.
        source: serde_yaml::Error,
    },
}

impl std::fmt::Display for RegistryLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read tool file '{}': {}", path.display(), source)
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse tool file '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for RegistryLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// An immutable collection of tool definitions, keyed by tool id.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous definition with the same id.
    pub fn register(&mut self, tool: ToolDefinition) {
        self.tools.insert(tool.id.clone(), tool);
    }

    /// Get a tool by id.
    #[must_use]
    pub fn get(&self, tool_id: &str) -> Option<&ToolDefinition> {
        self.tools.get(tool_id)
    }

    /// Check whether a tool with the given id exists.
    #[must_use]
    pub fn contains(&self, tool_id: &str) -> bool {
        self.tools.contains_key(tool_id)
    }

    /// Iterate all tools in id order.
    pub fn tools(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Load every `*.yaml` / `*.yml` file in `directory` as a tool
    /// definition.
    pub fn load_directory(&mut self, directory: &Path) -> Result<(), RegistryLoadError> {
        let entries = std::fs::read_dir(directory).map_err(|e| RegistryLoadError::Io {
            path: directory.to_path_buf(),
            source: e,
        })?;

        // Sorted for a deterministic load order.
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("yaml" | "yml")
                )
            })
            .collect();
        paths.sort();

        for path in paths {
            let content = std::fs::read_to_string(&path).map_err(|e| RegistryLoadError::Io {
                path: path.clone(),
                source: e,
            })?;
            let tool: ToolDefinition =
                serde_yaml::from_str(&content).map_err(|e| RegistryLoadError::Parse {
                    path: path.clone(),
                    source: e,
                })?;
            tracing::debug!(tool_id = %tool.id, path = %path.display(), "loaded tool definition");
            self.register(tool);
        }
        Ok(())
    }
}

impl FromIterator<ToolDefinition> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = ToolDefinition>>(iter: I) -> Self {
        let mut registry = Self::new();
        for tool in iter {
            registry.register(tool);
        }
        registry
    }
}
