/// ANSI styling shared by the frame renderer.
use crate::cli::Provider;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const REVERSE: &str = "\x1b[7m";
pub const CYAN: &str = "\x1b[36m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const RED: &str = "\x1b[31m";
pub const BOLD_CYAN: &str = "\x1b[1;36m";
pub const BOLD_RED: &str = "\x1b[1;31m";

pub const PROMPT: &str = "> ";
pub const CONTINUATION: &str = "  ";
pub const SELECTED_MARKER: &str = "▸ ";
pub const UNSELECTED_MARKER: &str = "  ";

pub fn paint(style: &str, text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    format!("{style}{text}{RESET}")
}

pub fn welcome_lines(provider: Provider, model: &str) -> Vec<String> {
    vec![
        paint(BOLD_CYAN, "chatterm"),
        paint(DIM, &format!("Connected to {provider} using {model}.")),
        paint(
            DIM,
            "Type a message, or /help for commands. Press Ctrl+C twice to quit.",
        ),
        String::new(),
    ]
}

pub fn footer(provider: Provider, model: &str, busy: bool) -> String {
    let state = if busy { "thinking" } else { "ready" };
    paint(DIM, &format!("{provider} · {model} · {state}"))
}
