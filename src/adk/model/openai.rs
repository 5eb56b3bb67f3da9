// SPDX-License-Identifier: MIT

//! OpenAI Model - chat completions API implementation
//!
//! Works against any OpenAI-compatible endpoint (OpenAI, Ollama, vLLM,
//! OpenRouter, ...).

use super::sse::SseParser;
use super::{FragmentStream, GenerationRequest, Model};
use crate::adk::error::ModelError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use std::collections::VecDeque;
use std::fmt;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat model
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAIModel {
    /// Create a model for an explicit endpoint and key
    pub fn with_endpoint(base_url: String, api_key: String, model_name: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Build the chat completions request body
    fn request_body(&self, request: &GenerationRequest, stream: bool) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if !request.system.is_empty() {
            messages.push(json!({ "role": "system", "content": request.system }));
        }
        messages.push(json!({ "role": "user", "content": request.user }));

        let params = &request.params;
        let mut body = json!({
            "model": self.model_name,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "top_p": params.top_p,
            "presence_penalty": params.presence_penalty,
            "frequency_penalty": params.frequency_penalty,
            "stream": stream,
        });

        if !params.stop_sequences.is_empty() {
            body["stop"] = json!(params.stop_sequences);
        }

        body
    }

    async fn send(&self, body: &serde_json::Value) -> Result<Response, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ModelError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let message = resp.text().await?;
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp)
    }

    /// Extract the message text from a non-streaming response
    fn parse_completion(response: &serde_json::Value) -> Result<String, ModelError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ModelError::InvalidResponse("No choices in OpenAI response".into()))?;

        Ok(choice["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    /// Extract the text delta from one streamed chunk, if it carries any
    fn parse_stream_delta(data: &str) -> Result<Option<String>, ModelError> {
        let chunk: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| ModelError::InvalidResponse(format!("bad stream chunk: {}", e)))?;

        Ok(chunk["choices"]
            .as_array()
            .and_then(|c| c.first())
            .and_then(|c| c["delta"]["content"].as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string))
    }
}

/// Decoder state for one streamed response
struct StreamState<B, E> {
    bytes: BoxStream<'static, Result<B, E>>,
    // Bytes of a UTF-8 sequence split across network chunks
    carry: Vec<u8>,
    parser: SseParser,
    pending: VecDeque<String>,
    finished: bool,
}

impl<B: AsRef<[u8]>, E> StreamState<B, E> {
    /// Decode one network chunk, queueing every complete text delta
    fn decode(&mut self, chunk: &[u8]) -> Result<(), ModelError> {
        self.carry.extend_from_slice(chunk);
        let valid = match std::str::from_utf8(&self.carry) {
            Ok(s) => s.len(),
            // Only an incomplete sequence at the very end may wait for more bytes
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(ModelError::Stream(format!(
                    "invalid UTF-8 in response body: {}",
                    e
                )))
            }
        };
        let text = String::from_utf8_lossy(&self.carry[..valid]).into_owned();
        self.carry.drain(..valid);

        for event in self.parser.feed(&text) {
            if event.is_done() {
                self.finished = true;
                break;
            }
            if let Some(delta) = OpenAIModel::parse_stream_delta(&event.data)? {
                self.pending.push_back(delta);
            }
        }
        Ok(())
    }

    /// The body ended; anything still buffered means the response was cut off
    fn finish(&mut self) -> Result<(), ModelError> {
        self.finished = true;
        if !self.carry.is_empty() {
            return Err(ModelError::Stream(
                "response ended inside a UTF-8 sequence".into(),
            ));
        }
        if self.parser.has_pending() {
            return Err(ModelError::Stream(
                "response ended before the last event was complete".into(),
            ));
        }
        Ok(())
    }
}

/// Turn a raw chat-completions SSE body into a stream of text fragments
fn decode_fragments<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = StreamState {
        bytes: bytes.boxed(),
        carry: Vec::new(),
        parser: SseParser::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(fragment) = st.pending.pop_front() {
                return Some((Ok(fragment), st));
            }
            if st.finished {
                return None;
            }

            let step = match st.bytes.next().await {
                Some(Ok(chunk)) => st.decode(chunk.as_ref()),
                Some(Err(e)) => Err(ModelError::Stream(e.to_string())),
                None => st.finish(),
            };
            if let Err(e) = step {
                st.finished = true;
                st.pending.clear();
                return Some((Err(e), st));
            }
        }
    })
    .boxed()
}

#[async_trait]
impl Model for OpenAIModel {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ModelError> {
        let body = self.request_body(request, false);
        let resp_json: serde_json::Value = self.send(&body).await?.json().await?;
        log::debug!("OpenAI response: {}", resp_json);

        Self::parse_completion(&resp_json)
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<FragmentStream, ModelError> {
        let body = self.request_body(request, true);
        let resp = self.send(&body).await?;
        Ok(decode_fragments(resp.bytes_stream()))
    }
}
