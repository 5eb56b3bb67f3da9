// SPDX-License-Identifier: MIT

//! Typed error handling for scribe-rs
//!
//! Structural problems (cycles, dangling references) and transport failures
//! are fatal and surface as [`ScribeError`]. Quality verdicts from an
//! evaluator are never errors; they are handled inside the engine's attempt
//! loop.

use thiserror::Error;

/// Top-level error type for scribe-rs
#[derive(Debug, Error)]
pub enum ScribeError {
    /// The workflow graph cannot be ordered
    #[error("Cannot execute workflow: {0}")]
    Dependency(#[from] DependencyError),

    /// Workflow definition errors (loading, construction)
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// The generation service failed while producing a node's output
    #[error("Generation failed for node '{node_id}': {source}")]
    Generation {
        node_id: String,
        #[source]
        source: ModelError,
    },

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper for compatibility
    #[error("{0}")]
    Other(String),
}

/// Structural errors found while ordering a workflow graph
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DependencyError {
    /// These nodes could not be scheduled because they sit on or behind a cycle
    #[error("Circular dependency detected involving nodes: {}", .node_ids.join(", "))]
    Cycle { node_ids: Vec<String> },

    /// A node references a node id that is not part of the workflow
    #[error("Node '{dependent_id}' depends on missing node '{missing_id}'")]
    Missing {
        dependent_id: String,
        missing_id: String,
    },
}

/// Workflow-specific errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Two nodes share the same id
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    /// File not found when loading workflow
    #[error("Workflow file not found: {0}")]
    FileNotFound(String),
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Non-success status returned by the provider
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// The fragment stream broke off mid-response
    #[error("Stream error: {0}")]
    Stream(String),

    /// HTTP transport errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ScribeError {
    /// Create a generation error for a node
    pub fn generation(node_id: impl Into<String>, source: ModelError) -> Self {
        Self::Generation {
            node_id: node_id.into(),
            source,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<&str> for ScribeError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for ScribeError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

pub type Result<T> = std::result::Result<T, ScribeError>;
