// SPDX-License-Identifier: MIT

//! Agent port - optional context retrieval and output evaluation
//!
//! Two independent capabilities can be plugged into the engine:
//! - a [`ContextProvider`] that supplies background text before generation
//! - an [`Evaluator`] that checks generated text and decides whether to keep it
//!
//! Either may be absent. Without an evaluator no quality gating happens at
//! all, which is different from an evaluator that approves everything.

pub mod context;
pub mod monitor;

pub use context::DirectoryContextProvider;
pub use monitor::LlmEvaluator;

use crate::adk::error::Result;
use crate::scribe::workflow::types::NodeDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

/// Ephemeral context injected into one node's prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
    /// Prepended to the system prompt
    #[serde(default)]
    pub system_prefix: String,
    /// Appended to the user prompt
    #[serde(default)]
    pub user_suffix: String,
    /// Where the context came from, in retrieval order
    #[serde(default)]
    pub sources: Vec<String>,
}

impl AgentContext {
    pub fn is_empty(&self) -> bool {
        self.system_prefix.is_empty() && self.user_suffix.is_empty()
    }
}

/// An evaluator's verdict
///
/// Any unrecognized value deserializes as [`Decision::Approve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Decision {
    Approve,
    Retry,
    FlagHuman,
}

impl Decision {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "retry" => Decision::Retry,
            "flag_human" => Decision::FlagHuman,
            _ => Decision::Approve,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Retry => "retry",
            Decision::FlagHuman => "flag_human",
        }
    }
}

impl From<String> for Decision {
    fn from(value: String) -> Self {
        Decision::parse(&value)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one check dimension (e.g. "timeline", "world_rules")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    #[serde(default = "unknown_dimension")]
    pub dimension: String,
    #[serde(default = "default_passed")]
    pub passed: bool,
    #[serde(default)]
    pub detail: String,
}

fn unknown_dimension() -> String {
    "unknown".to_string()
}

fn default_passed() -> bool {
    true
}

/// Verdict produced by an evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(default = "default_decision")]
    pub decision: Decision,
    #[serde(
        default = "default_confidence",
        deserialize_with = "deserialize_confidence"
    )]
    confidence: f32,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub checks: Vec<CheckResult>,
}

fn default_decision() -> Decision {
    Decision::Approve
}

fn default_confidence() -> f32 {
    0.5
}

fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Models sometimes quote the number
#[derive(Deserialize)]
#[serde(untagged)]
enum RawConfidence {
    Number(f32),
    Text(String),
}

fn deserialize_confidence<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f32, D::Error> {
    let value = match Option::<RawConfidence>::deserialize(d)? {
        Some(RawConfidence::Number(n)) => Some(n),
        Some(RawConfidence::Text(s)) => s.trim().parse::<f32>().ok(),
        None => None,
    };
    Ok(value.map(clamp_confidence).unwrap_or_else(default_confidence))
}

impl Evaluation {
    pub fn new(decision: Decision, confidence: f32, reason: impl Into<String>) -> Self {
        Self {
            decision,
            confidence: clamp_confidence(confidence),
            reason: reason.into(),
            checks: Vec::new(),
        }
    }

    pub fn approve(reason: impl Into<String>) -> Self {
        Self::new(Decision::Approve, 1.0, reason)
    }

    /// Always within `[0, 1]`
    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// Role A: supplies retrieval-derived background for a node
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Errors and `None` never abort a run; the node just runs without context.
    async fn get_context(&self, node_id: &str, node: &NodeDefinition)
        -> Result<Option<AgentContext>>;
}

/// Role C: checks generated text after each attempt
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Implementations absorb their own faults and return `None` or a
    /// low-confidence approval instead of failing.
    async fn evaluate(
        &self,
        node_id: &str,
        output: &str,
        context: Option<&AgentContext>,
    ) -> Option<Evaluation>;
}

/// The pluggable agent capabilities handed to the engine
#[derive(Clone, Default)]
pub struct AgentPort {
    pub context: Option<Arc<dyn ContextProvider>>,
    pub evaluator: Option<Arc<dyn Evaluator>>,
}

impl AgentPort {
    /// No context, no gating
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(provider);
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }
}
