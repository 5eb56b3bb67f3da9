// SPDX-License-Identifier: MIT

//! Run-scoped memo of accepted node outputs

use std::collections::HashMap;

use crate::scribe::workflow::types::NodeId;

/// Accepted outputs for the current run
///
/// Created empty when a run starts and written only by the engine. A later
/// write for the same node replaces the earlier one.
#[derive(Debug, Default, Clone)]
pub struct OutputCache {
    outputs: HashMap<NodeId, String>,
}

impl OutputCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, node_id: &str, output: String) {
        self.outputs.insert(node_id.to_string(), output);
    }

    pub fn get(&self, node_id: &str) -> Option<&str> {
        self.outputs.get(node_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn into_outputs(self) -> HashMap<NodeId, String> {
        self.outputs
    }
}
