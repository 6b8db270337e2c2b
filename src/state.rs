use std::sync::Arc;

use crate::cli::Provider;
use crate::provider::{ChatMessage, LlmBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub prompt: String,
    pub response: String,
}

impl Exchange {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    exchanges: Vec<Exchange>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenEstimate {
    pub user: usize,
    pub assistant: usize,
}

impl TokenEstimate {
    pub fn total(self) -> usize {
        self.user + self.assistant
    }
}

impl Transcript {
    pub fn push(&mut self, exchange: Exchange) {
        self.exchanges.push(exchange);
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Rough token counts at four characters per token.
    pub fn approx_tokens(&self) -> TokenEstimate {
        let (user_chars, assistant_chars) =
            self.exchanges
                .iter()
                .fold((0usize, 0usize), |(user, assistant), exchange| {
                    (
                        user + exchange.prompt.chars().count(),
                        assistant + exchange.response.chars().count(),
                    )
                });
        TokenEstimate {
            user: user_chars / 4,
            assistant: assistant_chars / 4,
        }
    }
}

/// Replays the transcript as alternating user/assistant turns and ends with
/// `prompt` as the final user turn.
pub fn build_context(exchanges: &[Exchange], prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(exchanges.len() * 2 + 1);
    for exchange in exchanges {
        messages.push(ChatMessage::user(exchange.prompt.clone()));
        messages.push(ChatMessage::assistant(exchange.response.clone()));
    }
    messages.push(ChatMessage::user(prompt));
    messages
}

/// Tasks receive clones; only the controller replaces the live binding.
#[derive(Clone)]
pub struct BackendBinding {
    pub provider: Provider,
    pub model: String,
    pub backend: Arc<dyn LlmBackend>,
}

impl BackendBinding {
    pub fn new(backend: Arc<dyn LlmBackend>, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| backend.default_model().to_string());
        Self {
            provider: backend.provider(),
            model,
            backend,
        }
    }

    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            provider: self.provider,
            model: model.into(),
            backend: Arc::clone(&self.backend),
        }
    }
}

impl std::fmt::Debug for BackendBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendBinding")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPicker {
    models: Vec<String>,
    current: String,
    filter: String,
    filtered: Vec<usize>,
    selected: usize,
}

impl ModelPicker {
    pub fn new(models: Vec<String>, current: impl Into<String>) -> Self {
        let filtered = (0..models.len()).collect();
        Self {
            models,
            current: current.into(),
            filter: String::new(),
            filtered,
            selected: 0,
        }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn push_filter(&mut self, ch: char) {
        self.filter.push(ch);
        self.refilter();
    }

    pub fn pop_filter(&mut self) {
        if self.filter.pop().is_some() {
            self.refilter();
        }
    }

    fn refilter(&mut self) {
        let needle = self.filter.to_lowercase();
        self.filtered = self
            .models
            .iter()
            .enumerate()
            .filter(|(_, name)| name.to_lowercase().contains(&needle))
            .map(|(idx, _)| idx)
            .collect();
        self.selected = 0;
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.filtered.len() {
            self.selected += 1;
        }
    }

    pub fn visible(&self) -> impl Iterator<Item = &str> + '_ {
        self.filtered.iter().map(|idx| self.models[*idx].as_str())
    }

    pub fn visible_len(&self) -> usize {
        self.filtered.len()
    }

    pub fn selected(&self) -> Option<&str> {
        self.filtered
            .get(self.selected)
            .map(|idx| self.models[*idx].as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPicker {
    providers: Vec<Provider>,
    current: Provider,
    selected: usize,
}

impl ProviderPicker {
    /// Selection starts on `current` when it is listed.
    pub fn new(providers: Vec<Provider>, current: Provider) -> Self {
        let selected = providers
            .iter()
            .position(|provider| *provider == current)
            .unwrap_or(0);
        Self {
            providers,
            current,
            selected,
        }
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn current(&self) -> Provider {
        self.current
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.providers.len() {
            self.selected += 1;
        }
    }

    pub fn selected(&self) -> Option<Provider> {
        self.providers.get(self.selected).copied()
    }
}
