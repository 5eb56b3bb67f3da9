// SPDX-License-Identifier: MIT

//! Model module - the generation port and its implementations
//!
//! This module provides the core [`Model`] trait and the request types the
//! engine sends through it. Implementations live in their own submodules:
//! - [openai] - OpenAI-compatible chat completions API
//! - [sse] - incremental server-sent-events parser used for streaming

pub mod openai;
pub mod sse;

use crate::adk::error::ModelError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

/// Ordered, finite sequence of text fragments from a streaming generation
pub type FragmentStream = BoxStream<'static, Result<String, ModelError>>;

/// Sampling parameters for a single generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub stop_sequences: Vec<String>,
    pub streaming: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
            top_p: 1.0,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            stop_sequences: Vec::new(),
            streaming: true,
        }
    }
}

/// A fully assembled prompt plus the parameters to generate it with
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub params: GenerationParams,
}

impl GenerationRequest {
    pub fn new(system: String, user: String, params: GenerationParams) -> Self {
        Self {
            system,
            user,
            params,
        }
    }
}

/// Core trait for text generation backends
///
/// Concatenating every fragment of [`Model::generate_stream`] must equal the
/// result of [`Model::generate`] for the same request.
#[async_trait]
pub trait Model: Send + Sync {
    /// Generate the full response text, blocking until it is complete
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ModelError>;

    /// Generate the response as a stream of fragments
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<FragmentStream, ModelError> {
        // Default implementation falls back to generate()
        let text = self.generate(request).await?;
        Ok(stream::once(async move { Ok(text) }).boxed())
    }
}
