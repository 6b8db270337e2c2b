use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::ValueEnum;

use crate::backends::anthropic::AnthropicBackend;
use crate::backends::ollama::OllamaBackend;
use crate::cli::Provider;
use crate::config::RuntimeConfig;

pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    pub model: String,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
}

/// The model travels in [`GenerateOptions`]; backends hold no active model.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn provider(&self) -> Provider;

    fn default_model(&self) -> &str;

    async fn list_models(&self) -> Result<Vec<String>>;

    async fn generate(&self, messages: &[ChatMessage], options: &GenerateOptions)
    -> Result<String>;
}

pub trait BackendFactory: Send + Sync {
    fn build(&self, provider: Provider) -> Result<Arc<dyn LlmBackend>>;

    /// Providers that can be built right now, in display order.
    fn available(&self) -> Vec<Provider>;
}

#[derive(Debug, Clone)]
pub struct HttpBackendFactory {
    client: reqwest::Client,
    ollama_host: String,
}

impl HttpBackendFactory {
    pub fn new(cfg: &RuntimeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            ollama_host: cfg.ollama_host.clone(),
        })
    }
}

impl BackendFactory for HttpBackendFactory {
    fn build(&self, provider: Provider) -> Result<Arc<dyn LlmBackend>> {
        match resolve_provider(provider) {
            Provider::Anthropic => {
                let api_key = std::env::var(ANTHROPIC_API_KEY_ENV)
                    .ok()
                    .filter(|value| !value.trim().is_empty())
                    .context("ANTHROPIC_API_KEY is required for Anthropic provider")?;
                Ok(Arc::new(AnthropicBackend::new(self.client.clone(), api_key)))
            }
            Provider::Ollama | Provider::Auto => Ok(Arc::new(OllamaBackend::new(
                self.client.clone(),
                self.ollama_host.clone(),
            ))),
        }
    }

    fn available(&self) -> Vec<Provider> {
        let mut providers = vec![Provider::Ollama];
        if env_present(ANTHROPIC_API_KEY_ENV) {
            providers.push(Provider::Anthropic);
        }
        providers
    }
}

pub fn validate_model_for_provider(provider: Provider, model_name: &str) -> Result<()> {
    let is_valid = match provider {
        Provider::Anthropic => model_name.starts_with("claude"),
        Provider::Ollama | Provider::Auto => !model_name.trim().is_empty(),
    };

    if is_valid {
        return Ok(());
    }

    Err(anyhow::anyhow!(
        "model '{}' is not compatible with provider '{}'",
        model_name,
        provider
    ))
}

/// Anthropic when its API key is present, otherwise the local Ollama server.
pub fn detect_provider() -> Provider {
    if env_present(ANTHROPIC_API_KEY_ENV) {
        return Provider::Anthropic;
    }
    Provider::Ollama
}

pub fn resolve_provider(provider: Provider) -> Provider {
    match provider {
        Provider::Auto => detect_provider(),
        p => p,
    }
}

pub fn env_present(key: &str) -> bool {
    std::env::var(key)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}

pub fn parse_provider_name(value: &str) -> Result<Provider> {
    match Provider::from_str(value.trim(), true) {
        Ok(Provider::Auto) | Err(_) => Err(anyhow::anyhow!(
            "invalid provider '{}'. Supported values: ollama, anthropic",
            value.trim()
        )),
        Ok(provider) => Ok(provider),
    }
}
