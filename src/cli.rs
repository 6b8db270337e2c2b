use clap::{Parser, ValueEnum};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Auto,
    Ollama,
    Anthropic,
}

impl Provider {
    pub fn label(self) -> &'static str {
        match self {
            Provider::Auto => "auto",
            Provider::Ollama => "ollama",
            Provider::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

const CLI_EXAMPLES: &str = "Examples:\n\
  chatterm\n\
  chatterm --provider ollama --model llama3.2\n\
  chatterm --provider anthropic --model claude-sonnet-4-20250514\n\
  chatterm --profile work --config-path ~/.chatterm/config.toml\n\
  chatterm --no-history --log-filter debug\n\
\n\
In the session:\n\
  - Type /help for the command list and keyboard shortcuts.\n\
  - Use /provider and /model to switch backends, or /model <id> to switch directly.\n\
  - Press Ctrl+C twice to quit.";

#[derive(Debug, Parser)]
#[command(name = "chatterm")]
#[command(about = "Interactive terminal chat session for local and hosted LLM backends")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "CHATTERM_PROVIDER", value_enum, default_value_t = Provider::Auto)]
    pub provider: Provider,

    #[arg(long, env = "CHATTERM_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "CHATTERM_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(long, env = "CHATTERM_CONFIG")]
    pub config_path: Option<String>,

    #[arg(long, env = "OLLAMA_BASE_URL")]
    pub ollama_host: Option<String>,

    #[arg(long, env = "CHATTERM_HISTORY_DIR")]
    pub history_dir: Option<String>,

    #[arg(long, env = "CHATTERM_HISTORY_CAPACITY")]
    pub history_capacity: Option<usize>,

    #[arg(long, env = "CHATTERM_NO_HISTORY", default_value_t = false)]
    pub no_history: bool,

    #[arg(long, env = "CHATTERM_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    #[arg(long, env = "CHATTERM_ANALYSIS_TIMEOUT_SECS")]
    pub analysis_timeout_secs: Option<u64>,

    #[arg(long, env = "CHATTERM_INTERRUPT_WINDOW_MS")]
    pub interrupt_window_ms: Option<u64>,

    #[arg(long, env = "CHATTERM_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "CHATTERM_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    pub log_filter: String,
}
