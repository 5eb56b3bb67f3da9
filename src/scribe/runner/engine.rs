// SPDX-License-Identifier: MIT

//! Execution engine
//!
//! Runs nodes in dependency order. Each node goes through
//! build prompt -> generate -> evaluate -> decide, where the decision either
//! accepts the output, retries generation, or escalates to the observer.
//! The number of attempts per node is bounded by `max_retries + 1`.

use super::cache::OutputCache;
use super::observer::{HumanDecision, WorkflowObserver};
use super::prompt::build_prompt;
use crate::adk::error::{Result, ScribeError};
use crate::adk::model::{GenerationParams, GenerationRequest, Model};
use crate::scribe::agent::{AgentContext, AgentPort, Decision};
use crate::scribe::config::EngineConfig;
use crate::scribe::workflow::types::{NodeDefinition, NodeId, WorkflowDefinition};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Outputs of a finished run plus how many attempts each node took
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub outputs: HashMap<NodeId, String>,
    pub attempts: HashMap<NodeId, u32>,
}

/// What to do with the output of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Accept,
    Retry,
}

pub struct Engine {
    model: Arc<dyn Model>,
    agents: AgentPort,
    config: EngineConfig,
}

impl Engine {
    /// Engine without context retrieval or evaluation
    pub fn new(model: Arc<dyn Model>, config: EngineConfig) -> Self {
        Self {
            model,
            agents: AgentPort::none(),
            config,
        }
    }

    pub fn with_agents(mut self, agents: AgentPort) -> Self {
        self.agents = agents;
        self
    }

    /// Run every node and return the accepted output of each
    pub async fn run(
        &self,
        workflow: &WorkflowDefinition,
        observer: &dyn WorkflowObserver,
    ) -> Result<HashMap<NodeId, String>> {
        Ok(self.run_with_report(workflow, observer).await?.outputs)
    }

    pub async fn run_with_report(
        &self,
        workflow: &WorkflowDefinition,
        observer: &dyn WorkflowObserver,
    ) -> Result<RunReport> {
        // Structural problems abort before anything is generated
        let order = workflow.execution_order()?;
        log::info!("Running workflow {} ({} nodes)", workflow.name, order.len());

        let mut cache = OutputCache::new();
        let mut attempts = HashMap::with_capacity(order.len());

        for node_id in &order {
            let node = workflow.nodes.get(node_id).ok_or_else(|| {
                ScribeError::other(format!("scheduled node {} is not in the workflow", node_id))
            })?;
            let used = self.run_node(node_id, node, &mut cache, observer).await?;
            attempts.insert(node_id.clone(), used);
        }

        Ok(RunReport {
            outputs: cache.into_outputs(),
            attempts,
        })
    }

    /// Run one node to acceptance and return the number of attempts used
    async fn run_node(
        &self,
        node_id: &str,
        node: &NodeDefinition,
        cache: &mut OutputCache,
        observer: &dyn WorkflowObserver,
    ) -> Result<u32> {
        observer.on_node_start(node_id, &node.name);
        let started = Instant::now();

        let params = node.resolve_params(&self.config.defaults);
        let context = self.fetch_context(node_id, node).await;
        let max_attempts = self.config.max_retries.saturating_add(1);

        let mut attempt = 0;
        let output = loop {
            attempt += 1;
            let (system, user) = build_prompt(node, cache, context.as_ref());
            let output = self
                .generate(node_id, system, user, &params, observer)
                .await?;

            let has_attempts_left = attempt < max_attempts;
            match self
                .decide(node_id, &output, context.as_ref(), has_attempts_left, observer)
                .await
            {
                Verdict::Accept => break output,
                Verdict::Retry => {
                    log::info!(
                        "Retrying node {} (attempt {}/{})",
                        node_id,
                        attempt + 1,
                        max_attempts
                    );
                }
            }
        };

        log::info!(
            "Node {} accepted after {} attempt(s) in {:?}",
            node_id,
            attempt,
            started.elapsed()
        );
        cache.set(node_id, output);
        if let Some(accepted) = cache.get(node_id) {
            observer.on_node_complete(node_id, accepted);
        }
        Ok(attempt)
    }

    /// Context is optional; a failing provider never aborts the run
    async fn fetch_context(&self, node_id: &str, node: &NodeDefinition) -> Option<AgentContext> {
        let provider = self.agents.context.as_ref()?;
        match provider.get_context(node_id, node).await {
            Ok(Some(ctx)) if !ctx.is_empty() => Some(ctx),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Context retrieval for node {} failed: {}", node_id, e);
                None
            }
        }
    }

    async fn generate(
        &self,
        node_id: &str,
        system: String,
        user: String,
        params: &GenerationParams,
        observer: &dyn WorkflowObserver,
    ) -> Result<String> {
        log::debug!(
            "Generating node {} (system {} chars, user {} chars)",
            node_id,
            system.len(),
            user.len()
        );
        let request = GenerationRequest::new(system, user, params.clone());

        if !params.streaming {
            return self
                .model
                .generate(&request)
                .await
                .map_err(|e| ScribeError::generation(node_id, e));
        }

        let mut stream = self
            .model
            .generate_stream(&request)
            .await
            .map_err(|e| ScribeError::generation(node_id, e))?;

        let mut output = String::new();
        while let Some(fragment) = stream.next().await {
            let fragment = fragment.map_err(|e| ScribeError::generation(node_id, e))?;
            observer.on_node_streaming_chunk(node_id, &fragment);
            output.push_str(&fragment);
        }
        Ok(output)
    }

    async fn decide(
        &self,
        node_id: &str,
        output: &str,
        context: Option<&AgentContext>,
        has_attempts_left: bool,
        observer: &dyn WorkflowObserver,
    ) -> Verdict {
        let Some(evaluator) = self.agents.evaluator.as_ref() else {
            return Verdict::Accept;
        };
        let Some(evaluation) = evaluator.evaluate(node_id, output, context).await else {
            return Verdict::Accept;
        };

        observer.on_node_evaluation(node_id, evaluation.decision, &evaluation.reason);

        let wants_retry = match evaluation.decision {
            Decision::Approve => false,
            Decision::Retry => true,
            Decision::FlagHuman => {
                observer.on_human_decision(node_id, &evaluation.reason) == HumanDecision::Retry
            }
        };

        if wants_retry && has_attempts_left {
            Verdict::Retry
        } else {
            if wants_retry {
                log::warn!("Node {} exhausted its retries, accepting last output", node_id);
            }
            Verdict::Accept
        }
    }
}
