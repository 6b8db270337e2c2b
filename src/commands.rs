use crate::cli::Provider;
use crate::provider::parse_provider_name;
use crate::state::{BackendBinding, TokenEstimate, Transcript};

pub const COMMAND_PREFIX: char = '/';

/// Slash commands in display and completion order.
pub const COMMAND_PALETTE: &[(&str, &str)] = &[
    ("/init", "Analyze repository and generate AGENTS.md"),
    ("/model", "Show current model and select from available models"),
    ("/provider", "Switch between LLM providers (Anthropic, Ollama)"),
    ("/status", "Show current session status and configuration"),
    ("/help", "Show available commands"),
    ("/clear", "Clear chat history"),
    ("/clearhistory", "Clear command history"),
    ("/exit", "Exit the application"),
    ("/quit", "Exit the application"),
];

const KEYBOARD_SHORTCUTS: &[(&str, &str)] = &[
    ("Tab", "Complete command"),
    ("Up/Down", "Navigate completions or input history"),
    ("Enter", "Send message or select completion"),
    ("Alt+Enter", "New line"),
    ("Esc", "Cancel model/provider selection"),
    ("Ctrl+C", "Press twice to exit"),
    ("Ctrl+D", "Exit on an empty line"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Init,
    Model(Option<String>),
    Provider(Option<String>),
    Status,
    Help,
    Clear,
    ClearHistory,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedChatCommand {
    NotACommand,
    Command(ChatCommand),
    UnknownCommand(String),
}

/// Command names match exactly; arguments follow the first whitespace.
pub fn parse_chat_command(line: &str) -> ParsedChatCommand {
    if !line.starts_with(COMMAND_PREFIX) {
        return ParsedChatCommand::NotACommand;
    }

    let trimmed = line.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let arg = parts
        .next()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    match command {
        "/init" => ParsedChatCommand::Command(ChatCommand::Init),
        "/model" => ParsedChatCommand::Command(ChatCommand::Model(arg)),
        "/provider" => ParsedChatCommand::Command(ChatCommand::Provider(arg)),
        "/status" => ParsedChatCommand::Command(ChatCommand::Status),
        "/help" => ParsedChatCommand::Command(ChatCommand::Help),
        "/clear" => ParsedChatCommand::Command(ChatCommand::Clear),
        "/clearhistory" => ParsedChatCommand::Command(ChatCommand::ClearHistory),
        "/exit" | "/quit" => ParsedChatCommand::Command(ChatCommand::Exit),
        _ => ParsedChatCommand::UnknownCommand(trimmed.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Immediate {
    Help(String),
    ClearTranscript,
    ClearHistory,
    Exit,
    UnknownCommand(String),
    InvalidArgument(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred {
    Status(StatusSnapshot),
    ListModels,
    ListProviders,
    Analyze,
    SwitchModel(String),
    SwitchProvider(Provider),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Chat(String),
    Immediate(Immediate),
    Deferred(Deferred),
}

/// Read-only view of the session that commands may consult.
pub struct DispatchContext<'a> {
    pub binding: &'a BackendBinding,
    pub transcript: &'a Transcript,
    pub history_len: usize,
    pub persistence_enabled: bool,
    pub log_level: &'a str,
}

/// Session facts captured at dispatch time for `/status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub provider: Provider,
    pub model: String,
    pub message_count: usize,
    pub tokens: TokenEstimate,
    pub commands_count: usize,
    pub persistence_enabled: bool,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub snapshot: StatusSnapshot,
    pub repository_initialized: bool,
}

pub fn dispatch(line: &str, ctx: &DispatchContext<'_>) -> Dispatch {
    let command = match parse_chat_command(line) {
        ParsedChatCommand::NotACommand => return Dispatch::Chat(line.trim().to_string()),
        ParsedChatCommand::UnknownCommand(text) => {
            return Dispatch::Immediate(Immediate::UnknownCommand(text));
        }
        ParsedChatCommand::Command(command) => command,
    };

    match command {
        ChatCommand::Help => Dispatch::Immediate(Immediate::Help(help_text())),
        ChatCommand::Clear => Dispatch::Immediate(Immediate::ClearTranscript),
        ChatCommand::ClearHistory => Dispatch::Immediate(Immediate::ClearHistory),
        ChatCommand::Exit => Dispatch::Immediate(Immediate::Exit),
        ChatCommand::Init => Dispatch::Deferred(Deferred::Analyze),
        ChatCommand::Status => Dispatch::Deferred(Deferred::Status(StatusSnapshot {
            provider: ctx.binding.provider,
            model: ctx.binding.model.clone(),
            message_count: ctx.transcript.len(),
            tokens: ctx.transcript.approx_tokens(),
            commands_count: ctx.history_len,
            persistence_enabled: ctx.persistence_enabled,
            log_level: ctx.log_level.to_string(),
        })),
        ChatCommand::Model(None) => Dispatch::Deferred(Deferred::ListModels),
        ChatCommand::Model(Some(model)) => Dispatch::Deferred(Deferred::SwitchModel(model)),
        ChatCommand::Provider(None) => Dispatch::Deferred(Deferred::ListProviders),
        ChatCommand::Provider(Some(name)) => match parse_provider_name(&name) {
            Ok(provider) => Dispatch::Deferred(Deferred::SwitchProvider(provider)),
            Err(err) => Dispatch::Immediate(Immediate::InvalidArgument(err.to_string())),
        },
    }
}

pub fn unknown_command_message(text: &str) -> String {
    format!("unknown command: {text}, type /help for available commands")
}

pub fn help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for (name, description) in COMMAND_PALETTE {
        help.push_str(&format!("  {name:<14} - {description}\n"));
    }
    help.push_str("\nKeyboard shortcuts:\n");
    for (key, description) in KEYBOARD_SHORTCUTS {
        help.push_str(&format!("  {key:<10} - {description}\n"));
    }
    help
}

pub fn format_status(report: &StatusReport) -> String {
    let s = &report.snapshot;
    let persistence = if s.persistence_enabled {
        "Enabled"
    } else {
        "Disabled"
    };
    let repository = if report.repository_initialized {
        "AGENTS.md loaded"
    } else {
        "Not initialized (run /init)"
    };
    format!(
        "Session Status\n\n\
         LLM Configuration\n\
         \x20 Provider: {}\n\
         \x20 Model: {}\n\n\
         Chat History\n\
         \x20 Messages: {}\n\
         \x20 User tokens: ~{}\n\
         \x20 Assistant tokens: ~{}\n\
         \x20 Total tokens: ~{}\n\n\
         Command History\n\
         \x20 Commands saved: {}\n\
         \x20 Persistence: {}\n\n\
         Environment\n\
         \x20 Log level: {}\n\
         \x20 Repository context: {}",
        s.provider,
        s.model,
        s.message_count,
        s.tokens.user,
        s.tokens.assistant,
        s.tokens.total(),
        s.commands_count,
        persistence,
        s.log_level,
        repository,
    )
}
