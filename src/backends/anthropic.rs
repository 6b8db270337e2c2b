use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::cli::Provider;
use crate::provider::{ChatMessage, GenerateOptions, LlmBackend, Role};

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Served when the models endpoint cannot be reached.
pub const KNOWN_ANTHROPIC_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-opus-4-20250514",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
    "claude-3-haiku-20240307",
];

pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicBackend {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: ANTHROPIC_API_BASE.to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }

    async fn fetch_models(&self) -> Result<Vec<String>> {
        let resp = self
            .request(reqwest::Method::GET, "/v1/models")
            .send()
            .await
            .context("failed to reach anthropic models endpoint")?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("anthropic model listing failed: HTTP {status}"));
        }
        let body = resp
            .json::<Value>()
            .await
            .context("invalid anthropic model listing response")?;
        Ok(parse_model_ids(&body))
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn default_model(&self) -> &str {
        DEFAULT_ANTHROPIC_MODEL
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        match self.fetch_models().await {
            Ok(models) if !models.is_empty() => Ok(models),
            Ok(_) => Ok(fallback_models()),
            Err(err) => {
                tracing::warn!(error = %err, "anthropic model listing failed, using known models");
                Ok(fallback_models())
            }
        }
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<String> {
        let resp = self
            .request(reqwest::Method::POST, "/v1/messages")
            .json(&messages_request_body(messages, options))
            .send()
            .await
            .context("failed to reach anthropic messages endpoint")?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "anthropic provider request failed: HTTP {status}: {}",
                detail.trim()
            ));
        }
        let body = resp
            .json::<Value>()
            .await
            .context("invalid anthropic messages response")?;
        extract_text(&body)
    }
}

fn fallback_models() -> Vec<String> {
    KNOWN_ANTHROPIC_MODELS
        .iter()
        .map(|m| (*m).to_string())
        .collect()
}

pub fn parse_model_ids(body: &Value) -> Vec<String> {
    body.get("data")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

pub fn messages_request_body(messages: &[ChatMessage], options: &GenerateOptions) -> Value {
    // System turns go in the top-level field, never inside `messages`.
    let wire = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect::<Vec<_>>();
    let mut body = json!({
        "model": options.model,
        "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": wire,
    });
    if let Some(system) = options.system.as_deref().filter(|s| !s.trim().is_empty()) {
        body["system"] = json!(system);
    }
    body
}

pub fn extract_text(body: &Value) -> Result<String> {
    let parts = body
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("anthropic response missing content"))?;
    let text = parts
        .iter()
        .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        return Err(anyhow::anyhow!("anthropic response contained no text"));
    }
    Ok(text)
}
