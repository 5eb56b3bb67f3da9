// SPDX-License-Identifier: MIT

//! Configuration for the scribe binary and engine
//!
//! Settings come from an optional YAML file and are then overridden by
//! environment variables (`OPENAI_API_KEY`, `OPENAI_BASE_URL`, `SCRIBE_MODEL`,
//! `SCRIBE_AGENT_MODEL`). The engine itself only ever sees an explicit
//! [`EngineConfig`].

use crate::adk::error::{Result, ScribeError};
use crate::adk::model::openai::{OpenAIModel, DEFAULT_BASE_URL};
use crate::adk::model::GenerationParams;
use crate::scribe::agent::context::DEFAULT_MAX_CONTEXT_CHARS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "scribe.yaml";

/// Settings that drive one engine instance
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Extra attempts allowed after the first one for each node
    pub max_retries: u32,
    /// Generation parameters before per-node hints are applied
    pub defaults: GenerationParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            defaults: GenerationParams::default(),
        }
    }
}

/// Connection to an OpenAI-compatible endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl LlmConfig {
    fn with_model(model: &str) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    pub fn build_model(&self) -> Result<OpenAIModel> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            ScribeError::config(format!(
                "no API key configured for model '{}' (set OPENAI_API_KEY)",
                self.model
            ))
        })?;
        Ok(OpenAIModel::with_endpoint(
            self.base_url.clone(),
            api_key,
            self.model.clone(),
        ))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::with_model("gpt-4o")
    }
}

fn default_agent_llm() -> LlmConfig {
    LlmConfig::with_model("gpt-4o-mini")
}

/// Where reference documents for the context provider live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub max_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScribeConfig {
    /// Model that generates node output
    pub user_llm: LlmConfig,
    /// Model used by the evaluator
    pub agent_llm: LlmConfig,
    pub defaults: GenerationParams,
    pub max_retries: u32,
    pub context: ContextConfig,
}

impl Default for ScribeConfig {
    fn default() -> Self {
        Self {
            user_llm: LlmConfig::default(),
            agent_llm: default_agent_llm(),
            defaults: GenerationParams::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            context: ContextConfig::default(),
        }
    }
}

impl ScribeConfig {
    /// Load configuration and apply environment overrides.
    ///
    /// An explicit path must exist. Without one, `scribe.yaml` in the working
    /// directory is used when present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ScribeError::config(format!(
                        "config file not found: {}",
                        p.display()
                    )));
                }
                Self::from_yaml(&std::fs::read_to_string(p)?)?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_yaml(&std::fs::read_to_string(DEFAULT_CONFIG_FILE)?)?
            }
            None => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply overrides from a key lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.user_llm.api_key.get_or_insert_with(|| key.clone());
            self.agent_llm.api_key.get_or_insert(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.user_llm.base_url = url.clone();
            self.agent_llm.base_url = url;
        }
        if let Some(model) = lookup("SCRIBE_MODEL") {
            self.user_llm.model = model;
        }
        if let Some(model) = lookup("SCRIBE_AGENT_MODEL") {
            self.agent_llm.model = model;
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_retries: self.max_retries,
            defaults: self.defaults.clone(),
        }
    }
}
