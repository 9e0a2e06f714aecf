// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat model clients.
//!
//! The default backend is Groq's OpenAI-compatible chat completions API.
//! Calls are blocking and are not retried.

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Trait implemented by concrete LLM providers.
pub trait LlmProvider {
    fn model_id(&self) -> &str;

    fn answer(&self, request: &ProviderRequest) -> Result<String>;
}

/// Request envelope shared by the providers.
pub struct ProviderRequest<'a> {
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint; Groq by
/// default.
pub struct GroqProvider {
    api_key: String,
    model: String,
    endpoint: String,
    client: Client,
}

impl GroqProvider {
    pub fn new(api_key: String, model: String, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build LLM HTTP client")?;
        Ok(Self {
            api_key,
            model,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl LlmProvider for GroqProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn answer(&self, request: &ProviderRequest) -> Result<String> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid LLM API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: request.prompt,
            }],
        };

        tracing::debug!(model = %self.model, endpoint = %self.endpoint, "calling chat completions");
        let resp = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .context("failed to call chat completions")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("LLM returned {}: {}", status, text);
        }
        let parsed: ChatResponse = resp.json().context("failed to parse LLM response")?;
        let answer = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .unwrap_or_default();
        if answer.trim().is_empty() {
            bail!("LLM response missing text content");
        }
        Ok(answer)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
