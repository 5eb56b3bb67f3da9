// SPDX-License-Identifier: MIT

//! Workflow data model
//!
//! Nodes carry two prompt block lists (system and user). A block is either
//! static text or a reference to another node's accepted output; references
//! are the only source of dependency edges in a workflow.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::adk::error::{DependencyError, WorkflowError};
use crate::adk::model::GenerationParams;

pub type NodeId = String;

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Static prompt text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(default = "generate_id")]
    pub id: String,
    #[serde(default)]
    pub content: String,
}

/// Placeholder resolved at assembly time to another node's accepted output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualBlockReference {
    #[serde(default = "generate_id")]
    pub id: String,
    #[serde(alias = "sourceNodeId")]
    pub source_node_id: NodeId,
    #[serde(
        default,
        alias = "displayName",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
}

impl VirtualBlockReference {
    /// Label used when the reference cannot be resolved
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.source_node_id)
    }
}

/// One prompt atom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Text(TextBlock),
    Virtual(VirtualBlockReference),
}

impl Block {
    pub fn text(content: impl Into<String>) -> Self {
        Block::Text(TextBlock {
            id: generate_id(),
            content: content.into(),
        })
    }

    pub fn reference(source_node_id: impl Into<String>) -> Self {
        Block::Virtual(VirtualBlockReference {
            id: generate_id(),
            source_node_id: source_node_id.into(),
            display_name: None,
        })
    }

    pub fn named_reference(
        source_node_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Block::Virtual(VirtualBlockReference {
            id: generate_id(),
            source_node_id: source_node_id.into(),
            display_name: Some(display_name.into()),
        })
    }
}

/// Ordered block sequence; order is concatenation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlockList {
    #[serde(default = "generate_id")]
    pub id: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Default for TextBlockList {
    fn default() -> Self {
        Self {
            id: generate_id(),
            blocks: Vec::new(),
        }
    }
}

impl TextBlockList {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            id: generate_id(),
            blocks,
        }
    }

    /// Referenced node ids, deduplicated by first occurrence
    pub fn dependencies(&self) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.references()
            .filter(|r| seen.insert(r.source_node_id.as_str()))
            .map(|r| r.source_node_id.clone())
            .collect()
    }

    pub fn references(&self) -> impl Iterator<Item = &VirtualBlockReference> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Virtual(r) => Some(r),
            Block::Text(_) => None,
        })
    }
}

/// Per-node overrides layered over the global generation defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, alias = "maxTokens", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationParams {
    /// Copy of these parameters with a node's hints layered on top
    pub fn with_hints(&self, hints: &ParameterHints) -> GenerationParams {
        let mut params = self.clone();
        if let Some(temperature) = hints.temperature {
            params.temperature = temperature;
        }
        if let Some(max_tokens) = hints.max_tokens {
            params.max_tokens = max_tokens;
        }
        params
    }
}

/// A single generation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "systemPrompt")]
    pub system_prompt: TextBlockList,
    #[serde(default, alias = "userPrompt")]
    pub user_prompt: TextBlockList,
    #[serde(
        default,
        alias = "parameterHints",
        skip_serializing_if = "Option::is_none"
    )]
    pub parameter_hints: Option<ParameterHints>,
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            system_prompt: TextBlockList::default(),
            user_prompt: TextBlockList::default(),
            parameter_hints: None,
        }
    }

    pub fn with_system(mut self, blocks: Vec<Block>) -> Self {
        self.system_prompt = TextBlockList::new(blocks);
        self
    }

    pub fn with_user(mut self, blocks: Vec<Block>) -> Self {
        self.user_prompt = TextBlockList::new(blocks);
        self
    }

    pub fn with_hints(mut self, hints: ParameterHints) -> Self {
        self.parameter_hints = Some(hints);
        self
    }

    /// Source nodes referenced from either prompt.
    ///
    /// System prompt references come first; a source referenced from both
    /// lists is reported once.
    pub fn dependencies(&self) -> Vec<NodeId> {
        let mut deps = self.system_prompt.dependencies();
        let mut seen: HashSet<NodeId> = deps.iter().cloned().collect();
        for dep in self.user_prompt.dependencies() {
            if seen.insert(dep.clone()) {
                deps.push(dep);
            }
        }
        deps
    }

    /// Generation parameters for this node
    pub fn resolve_params(&self, defaults: &GenerationParams) -> GenerationParams {
        match &self.parameter_hints {
            Some(hints) => defaults.with_hints(hints),
            None => defaults.clone(),
        }
    }
}

/// Insertion-ordered node mapping with unique ids
///
/// Iteration follows insertion order, which for a loaded workflow is the
/// order nodes appear in the file. The scheduler uses it to break ties
/// between nodes that become ready at the same time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<NodeDefinition>", into = "Vec<NodeDefinition>")]
pub struct NodeMap {
    nodes: Vec<NodeDefinition>,
    /// HashMap for O(1) node lookups
    index: HashMap<NodeId, usize>,
}

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NodeDefinition) -> Result<(), WorkflowError> {
        if self.index.contains_key(&node.id) {
            return Err(WorkflowError::DuplicateNode(node.id));
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&NodeDefinition> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.nodes.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl TryFrom<Vec<NodeDefinition>> for NodeMap {
    type Error = WorkflowError;

    fn try_from(nodes: Vec<NodeDefinition>) -> Result<Self, Self::Error> {
        let mut map = NodeMap::new();
        for node in nodes {
            map.insert(node)?;
        }
        Ok(map)
    }
}

impl From<NodeMap> for Vec<NodeDefinition> {
    fn from(map: NodeMap) -> Self {
        map.nodes
    }
}

/// A named graph of nodes connected through virtual block references
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default = "generate_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: NodeMap,
}

impl WorkflowDefinition {
    pub fn new(
        name: impl Into<String>,
        nodes: Vec<NodeDefinition>,
    ) -> Result<Self, WorkflowError> {
        Ok(Self {
            id: generate_id(),
            name: name.into(),
            nodes: NodeMap::try_from(nodes)?,
        })
    }

    /// Validate the graph and compute the execution order
    pub fn execution_order(&self) -> Result<Vec<NodeId>, DependencyError> {
        super::graph::build(&self.nodes)
    }
}
