// SPDX-License-Identifier: MIT

//! Directory-backed context provider
//!
//! Reads reference documents (outline, style guide, character sheets, ...)
//! from a local directory and injects them into every node's system prompt,
//! bounded by a character budget.

use super::{AgentContext, ContextProvider};
use crate::adk::error::Result;
use crate::scribe::workflow::types::NodeDefinition;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Roughly 25-30K tokens of prose
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 100_000;

const CONTEXT_HEADER: &str = "## Project Context (auto-retrieved)\n\n\
The following context was automatically retrieved from the project knowledge base. \
Use it to maintain consistency with established characters, plot, and world rules.\n\n";

const TRUNCATION_MARKER: &str = "\n[...truncated]";

pub struct DirectoryContextProvider {
    dir: PathBuf,
    max_chars: usize,
}

impl DirectoryContextProvider {
    pub fn new(dir: impl Into<PathBuf>, max_chars: usize) -> Self {
        Self {
            dir: dir.into(),
            max_chars,
        }
    }

    /// Reference documents in path order
    async fn documents(&self) -> Result<Vec<(PathBuf, String)>> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext == "md" || ext == "txt")
            {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let content = fs::read_to_string(&path).await?;
            if !content.trim().is_empty() {
                documents.push((path, content));
            }
        }
        Ok(documents)
    }

    /// Pack documents into a context, stopping once the budget is spent
    fn assemble(&self, documents: Vec<(PathBuf, String)>) -> Option<AgentContext> {
        let mut parts = Vec::new();
        let mut sources = Vec::new();
        let mut remaining = self.max_chars;

        for (path, content) in documents {
            if remaining == 0 {
                break;
            }
            let label = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut entry = format!("### {}\n{}\n", label, content.trim_end());
            let len = entry.chars().count();
            if len > remaining {
                entry = entry.chars().take(remaining).collect();
                entry.push_str(TRUNCATION_MARKER);
            }
            remaining = remaining.saturating_sub(len);
            parts.push(entry);
            sources.push(path.display().to_string());
        }

        if parts.is_empty() {
            return None;
        }

        Some(AgentContext {
            system_prefix: format!("{}{}", CONTEXT_HEADER, parts.join("\n")),
            user_suffix: String::new(),
            sources,
        })
    }
}

#[async_trait]
impl ContextProvider for DirectoryContextProvider {
    async fn get_context(
        &self,
        node_id: &str,
        _node: &NodeDefinition,
    ) -> Result<Option<AgentContext>> {
        let documents = self.documents().await?;
        let context = self.assemble(documents);
        if let Some(ctx) = &context {
            log::debug!(
                "Context for node {}: {} chars from {} sources",
                node_id,
                ctx.system_prefix.len(),
                ctx.sources.len()
            );
        }
        Ok(context)
    }
}
