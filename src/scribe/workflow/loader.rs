//! Workflow loader - YAML/JSON file loading and parsing
//!
//! This module handles loading workflow definitions from disk. Files ending
//! in `.json` are parsed as JSON, everything else as YAML.

use super::types::WorkflowDefinition;
use crate::adk::error::{Result, WorkflowError};
use std::fs;
use std::path::Path;

/// Loads workflow definitions from YAML or JSON files
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow definition from a file
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowDefinition> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WorkflowError::FileNotFound(path.display().to_string()).into());
        }

        let content = fs::read_to_string(path)?;
        let def = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::parse_json(&content)?,
            _ => Self::parse_yaml(&content)?,
        };

        log::info!(
            "Loaded workflow '{}' with {} nodes from {}",
            def.name,
            def.nodes.len(),
            path.display()
        );
        Ok(def)
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<WorkflowDefinition> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parse a workflow definition from a JSON string
    pub fn parse_json(content: &str) -> Result<WorkflowDefinition> {
        Ok(serde_json::from_str(content)?)
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}
