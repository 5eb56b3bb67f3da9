// SPDX-License-Identifier: MIT

//! LLM-backed evaluator - low-level factual checking only
//!
//! Checks generated passages for continuity errors, entity contradictions and
//! timeline problems against reference material. It makes no creative
//! judgment; that is left to the human reviewer.

use super::{AgentContext, Decision, Evaluation, Evaluator};
use crate::adk::model::{GenerationParams, GenerationRequest, Model};
use async_trait::async_trait;
use std::sync::Arc;

const CHECK_SYSTEM_PROMPT: &str = "You are a factual consistency checker for a novel. \
Your job is to check whether a new passage contains any factual errors relative to the \
established context. Check ONLY for objective errors:\n\
- Character consistency: names, appearances, abilities, relationships\n\
- Timeline: chronological order, time references, ages\n\
- World rules: established magic systems, geography, laws of the world\n\
- Continuity: references to past events, object states, location of characters\n\n\
Do NOT judge writing quality, style, creativity, or artistic choices.\n\n\
Respond in JSON format:\n\
{\"decision\": \"approve\"|\"retry\"|\"flag_human\", \"confidence\": 0.0-1.0, \
\"reason\": \"...\", \"checks\": [{\"dimension\": \"...\", \"passed\": true/false, \
\"detail\": \"...\"}]}";

/// Evaluator that asks a model to check each output
pub struct LlmEvaluator {
    model: Arc<dyn Model>,
    params: GenerationParams,
    /// Extra reference material checked in addition to the node's context
    reference: Option<String>,
}

impl LlmEvaluator {
    pub fn new(model: Arc<dyn Model>) -> Self {
        // Low temperature for analytical work
        let params = GenerationParams {
            temperature: 0.3,
            streaming: false,
            ..GenerationParams::default()
        };
        Self {
            model,
            params,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    fn gather_reference(&self, context: Option<&AgentContext>) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(ctx) = context {
            if !ctx.system_prefix.is_empty() {
                parts.push(&ctx.system_prefix);
            }
        }
        if let Some(reference) = self.reference.as_deref() {
            if !reference.trim().is_empty() {
                parts.push(reference);
            }
        }
        parts.join("\n\n")
    }

    /// Parse the model's reply, falling back to a low-confidence approval
    fn parse_evaluation(response: &str) -> Evaluation {
        let mut text = response.trim();
        if let Some((_, rest)) = text.split_once("```json") {
            text = rest.split("```").next().unwrap_or(rest).trim();
        } else if let Some((_, rest)) = text.split_once("```") {
            text = rest.split("```").next().unwrap_or(rest).trim();
        }

        match serde_json::from_str::<Evaluation>(text) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                log::warn!("Could not parse evaluation response: {}", e);
                Evaluation::new(
                    Decision::Approve,
                    0.3,
                    "Could not parse evaluation response.",
                )
            }
        }
    }
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    async fn evaluate(
        &self,
        node_id: &str,
        output: &str,
        context: Option<&AgentContext>,
    ) -> Option<Evaluation> {
        let reference = self.gather_reference(context);
        if reference.is_empty() {
            return Some(Evaluation::new(
                Decision::Approve,
                0.5,
                "No reference material available for checking.",
            ));
        }

        let user = format!(
            "## Reference Context\n{}\n\n## New Passage to Check\n{}\n\n\
             Check the new passage for factual consistency errors against the reference \
             context. Respond in the JSON format specified.",
            reference, output
        );
        let request =
            GenerationRequest::new(CHECK_SYSTEM_PROMPT.to_string(), user, self.params.clone());

        match self.model.generate(&request).await {
            Ok(response) => Some(Self::parse_evaluation(&response)),
            Err(e) => {
                log::warn!("Evaluation of node {} failed: {}", node_id, e);
                Some(Evaluation::new(
                    Decision::Approve,
                    0.3,
                    format!("Evaluation failed: {}", e),
                ))
            }
        }
    }
}
