// SPDX-License-Identifier: MIT

//! Observer - callback sink for run progress
//!
//! The engine reports node starts, streamed fragments, evaluation verdicts and
//! completions, and asks the observer for a decision whenever an evaluator
//! escalates to a human.

use crate::scribe::agent::Decision;
use std::io::{self, BufRead, Write};

/// A human reviewer's answer to an escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumanDecision {
    Approve,
    Retry,
}

impl HumanDecision {
    /// `"retry"` means retry; anything else approves
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("retry") {
            HumanDecision::Retry
        } else {
            HumanDecision::Approve
        }
    }
}

/// Progress callbacks invoked by the engine
///
/// Every method has a no-op default; a non-interactive observer approves
/// every escalation.
pub trait WorkflowObserver: Send + Sync {
    fn on_node_start(&self, _node_id: &str, _name: &str) {}

    /// Fragments of one node arrive in production order
    fn on_node_streaming_chunk(&self, _node_id: &str, _chunk: &str) {}

    fn on_node_complete(&self, _node_id: &str, _output: &str) {}

    fn on_node_evaluation(&self, _node_id: &str, _decision: Decision, _reason: &str) {}

    fn on_human_decision(&self, _node_id: &str, _reason: &str) -> HumanDecision {
        HumanDecision::Approve
    }
}

/// Ignores everything and approves every escalation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

/// Reports progress through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl WorkflowObserver for LogObserver {
    fn on_node_start(&self, node_id: &str, name: &str) {
        log::info!("Running node {} ({})", name, node_id);
    }

    fn on_node_streaming_chunk(&self, node_id: &str, chunk: &str) {
        log::trace!("Node {} chunk: {:?}", node_id, chunk);
    }

    fn on_node_complete(&self, node_id: &str, output: &str) {
        log::info!("Node {} completed ({} chars)", node_id, output.chars().count());
    }

    fn on_node_evaluation(&self, node_id: &str, decision: Decision, reason: &str) {
        log::info!("Node {} evaluation: {} ({})", node_id, decision, reason);
    }

    fn on_human_decision(&self, node_id: &str, reason: &str) -> HumanDecision {
        log::warn!(
            "Node {} flagged for human review, auto-approving: {}",
            node_id,
            reason
        );
        HumanDecision::Approve
    }
}

/// Terminal progress for the `scribe` binary
///
/// Progress goes to stderr; streamed text goes to stdout when `stream` is
/// set. Escalations prompt on stdin only when `interactive` is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct CliObserver {
    pub stream: bool,
    pub interactive: bool,
}

impl CliObserver {
    pub fn new(stream: bool, interactive: bool) -> Self {
        Self {
            stream,
            interactive,
        }
    }

    /// Map a typed answer to a decision: n, r and retry ask for another attempt
    fn parse_response(response: &str) -> HumanDecision {
        match response.trim().to_ascii_lowercase().as_str() {
            "n" | "r" | "retry" => HumanDecision::Retry,
            _ => HumanDecision::Approve,
        }
    }
}

fn short_id(node_id: &str) -> &str {
    match node_id.char_indices().nth(8) {
        Some((idx, _)) => &node_id[..idx],
        None => node_id,
    }
}

impl WorkflowObserver for CliObserver {
    fn on_node_start(&self, node_id: &str, name: &str) {
        eprintln!("\n--- Running node: {} ({}) ---", name, short_id(node_id));
    }

    fn on_node_streaming_chunk(&self, _node_id: &str, chunk: &str) {
        if self.stream {
            let mut stdout = io::stdout();
            let _ = write!(stdout, "{}", chunk);
            let _ = stdout.flush();
        }
    }

    fn on_node_complete(&self, node_id: &str, output: &str) {
        eprintln!(
            "\n--- Completed: {} ({} chars) ---",
            short_id(node_id),
            output.chars().count()
        );
    }

    fn on_node_evaluation(&self, _node_id: &str, decision: Decision, reason: &str) {
        let icon = match decision {
            Decision::Approve => "+",
            Decision::Retry => "~",
            Decision::FlagHuman => "!",
        };
        eprintln!("  [{}] Evaluation: {} - {}", icon, decision, reason);
    }

    fn on_human_decision(&self, node_id: &str, reason: &str) -> HumanDecision {
        eprintln!("\n  [!] Human review needed for {}: {}", short_id(node_id), reason);
        if !self.interactive {
            eprintln!("  Non-interactive run, accepting output.");
            return HumanDecision::Approve;
        }

        eprint!("  Accept this output? [y/n/r(etry)]: ");
        let _ = io::stderr().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => Self::parse_response(&line),
            Err(e) => {
                log::warn!("Could not read review answer, accepting: {}", e);
                HumanDecision::Approve
            }
        }
    }
}
