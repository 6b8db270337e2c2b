use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::cli::Provider;
use crate::provider::{ChatMessage, GenerateOptions, LlmBackend};

pub const DEFAULT_OLLAMA_MODEL: &str = "gpt-oss:20b";

/// Client for a local Ollama server's native chat API.
pub struct OllamaBackend {
    client: reqwest::Client,
    host_root: String,
}

impl OllamaBackend {
    pub fn new(client: reqwest::Client, host_root: impl Into<String>) -> Self {
        Self {
            client,
            host_root: host_root.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host_root.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    fn default_model(&self) -> &str {
        DEFAULT_OLLAMA_MODEL
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .with_context(|| format!("failed to reach ollama at '{}'", self.host_root))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("ollama model listing failed: HTTP {status}"));
        }
        let body = resp
            .json::<Value>()
            .await
            .context("invalid ollama model listing response")?;
        Ok(parse_model_names(&body))
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<String> {
        let resp = self
            .client
            .post(self.url("/api/chat"))
            .json(&chat_request_body(messages, options))
            .send()
            .await
            .with_context(|| format!("failed to reach ollama at '{}'", self.host_root))?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "ollama chat request failed: HTTP {status}: {}",
                detail.trim()
            ));
        }
        let body = resp
            .json::<Value>()
            .await
            .context("invalid ollama chat response")?;
        body.get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("ollama chat response missing message content"))
    }
}

pub fn parse_model_names(body: &Value) -> Vec<String> {
    body.get("models")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

pub fn chat_request_body(messages: &[ChatMessage], options: &GenerateOptions) -> Value {
    let mut wire = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = options.system.as_deref().filter(|s| !s.trim().is_empty()) {
        wire.push(json!({ "role": "system", "content": system }));
    }
    wire.extend(
        messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content })),
    );
    json!({
        "model": options.model,
        "messages": wire,
        "stream": false,
    })
}
