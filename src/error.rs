#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Provider,
    Network,
    History,
    Input,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Provider => "PROVIDER",
            ErrorCategory::Network => "NETWORK",
            ErrorCategory::History => "HISTORY",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Provider => {
                "Set ANTHROPIC_API_KEY or run with --provider ollama against a running Ollama server."
            }
            ErrorCategory::Network => {
                "Check that the backend is reachable (OLLAMA_BASE_URL) or raise --request-timeout-secs."
            }
            ErrorCategory::History => {
                "Check permissions on ~/.chatterm or run with --no-history."
            }
            ErrorCategory::Input => "Run chatterm --help and correct command arguments.",
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture ~/.chatterm/chatterm.log and open an issue."
            }
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("timed out")
        || msg.contains("failed to reach")
        || msg.contains("connection refused")
    {
        return ErrorCategory::Network;
    }

    if msg.contains("api_key") || msg.contains("provider") || msg.contains("no models available")
    {
        return ErrorCategory::Provider;
    }

    if msg.contains("invalid value")
        || msg.contains("unknown argument")
        || msg.contains("profile")
        || msg.contains("not compatible")
    {
        return ErrorCategory::Input;
    }

    if msg.contains("history") {
        return ErrorCategory::History;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error) -> String {
    let category = categorize_error(err);
    format!(
        "[{}] {}\nHint: {}",
        category.code(),
        redact_sensitive_text(&format!("{err:#}")),
        category.hint()
    )
}

/// One-line form shown inside the session.
pub fn display_error(err: &anyhow::Error) -> String {
    let rendered = format!("{err:#}");
    let single_line = rendered.split_whitespace().collect::<Vec<_>>().join(" ");
    redact_sensitive_text(&single_line)
}

pub fn redact_sensitive_text(text: &str) -> String {
    redact_api_keys(text)
}

pub fn redact_api_keys(text: &str) -> String {
    const KEY_PREFIX: &str = "sk-";
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;

    while let Some(offset) = text[cursor..].find(KEY_PREFIX) {
        let start = cursor + offset;
        out.push_str(&text[cursor..start]);

        let remainder = &text[start..];
        let end = remainder
            .find(|ch: char| {
                ch.is_whitespace() || matches!(ch, '"' | '\'' | ',' | ';' | ')' | ']' | '}')
            })
            .unwrap_or(remainder.len());
        out.push_str("sk-[REDACTED]");
        cursor = start + end;
    }

    out.push_str(&text[cursor..]);
    out
}
