//! OpenAI-compatible remote backend.
//!
//! One struct serves every chat-completions endpoint; the constructors
//! pin the base URL, default model, and API-key environment variable
//! per vendor.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RemoteProviderConfig;
use crate::error::ProviderError;
use crate::provider::{Summarizer, UnitContext};
use crate::summarize::prompt::SYSTEM_PROMPT;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const CEREBRAS_BASE_URL: &str = "https://api.cerebras.ai/v1";
const CEREBRAS_DEFAULT_MODEL: &str = "llama3.1-8b";

/// Error bodies echoed into diagnostics are clipped to this length.
const MAX_ERROR_BODY_CHARS: usize = 300;

pub struct RemoteProvider {
    id: &'static str,
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl RemoteProvider {
    pub fn openai(config: &RemoteProviderConfig) -> Result<Self, ProviderError> {
        Self::build(
            "openai",
            "OPENAI_API_KEY",
            OPENAI_BASE_URL,
            OPENAI_DEFAULT_MODEL,
            config,
        )
    }

    pub fn cerebras(config: &RemoteProviderConfig) -> Result<Self, ProviderError> {
        Self::build(
            "cerebras",
            "CEREBRAS_API_KEY",
            CEREBRAS_BASE_URL,
            CEREBRAS_DEFAULT_MODEL,
            config,
        )
    }

    fn build(
        id: &'static str,
        env_var: &'static str,
        default_base_url: &str,
        default_model: &str,
        config: &RemoteProviderConfig,
    ) -> Result<Self, ProviderError> {
        let api_key = resolve_api_key(env_var, config)
            .ok_or(ProviderError::MissingCredentials { provider: id, env_var })?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|source| ProviderError::Request { provider: id, source })?;
        Ok(Self {
            id,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url.to_string()),
            api_key,
            client,
        })
    }
}

/// Environment wins over the config file; blank values count as unset.
fn resolve_api_key(env_var: &str, config: &RemoteProviderConfig) -> Option<String> {
    if let Ok(key) = std::env::var(env_var)
        && !key.trim().is_empty()
    {
        return Some(key);
    }
    config.api_key.clone().filter(|key| !key.trim().is_empty())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait::async_trait]
impl Summarizer for RemoteProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, ctx: &UnitContext<'_>) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &ctx.prompt,
                },
            ],
            temperature: 0.2,
            max_tokens: 120,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(provider = self.id, model = %self.model, unit = %ctx.unit.id, "Requesting summary");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|source| ProviderError::Request { provider: self.id, source })?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            return Err(ProviderError::Api {
                provider: self.id,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: self.id,
                    detail: e.to_string(),
                })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        let bullet = clean_completion(&content);
        if bullet.is_empty() {
            return Err(ProviderError::InvalidResponse {
                provider: self.id,
                detail: "empty completion".to_string(),
            });
        }
        Ok(bullet)
    }
}

/// Reduce a completion to one bullet line: first non-empty line, list
/// markers and surrounding quotes stripped.
fn clean_completion(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    line.trim_start_matches(['-', '*', '•'])
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}
