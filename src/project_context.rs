use std::path::Path;

use anyhow::{Context, Result};

pub const BASE_SYSTEM_PROMPT: &str = "You are a helpful assistant running in a terminal chat session. \
Answer concisely and use Markdown code blocks for code.";

pub fn marker_exists(marker_path: &Path) -> bool {
    marker_path.is_file()
}

/// Content of the project marker file, `None` when it is absent.
pub fn load_marker(marker_path: &Path) -> Result<Option<String>> {
    if !marker_exists(marker_path) {
        return Ok(None);
    }
    let content = std::fs::read_to_string(marker_path)
        .with_context(|| format!("failed to read '{}'", marker_path.display()))?;
    Ok(Some(content).filter(|c| !c.trim().is_empty()))
}

/// Base instructions, prefixed with the project marker when one exists.
/// A marker that cannot be read is logged and skipped.
pub fn system_prompt(marker_path: &Path) -> String {
    match load_marker(marker_path) {
        Ok(Some(context)) => format!(
            "# Repository Context from {}\n\n{}\n\n---\n\n# System Instructions\n\n{}",
            marker_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| marker_path.display().to_string()),
            context.trim_end(),
            BASE_SYSTEM_PROMPT
        ),
        Ok(None) => BASE_SYSTEM_PROMPT.to_string(),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring unreadable project context");
            BASE_SYSTEM_PROMPT.to_string()
        }
    }
}
