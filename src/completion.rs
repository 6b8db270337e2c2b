use crate::commands::{COMMAND_PALETTE, COMMAND_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Suggestions {
    pub candidates: Vec<&'static str>,
    pub show: bool,
}

/// Prefix-matches the command palette against `buffer`, case-insensitively,
/// keeping palette order.
pub fn suggest(buffer: &str) -> Suggestions {
    suggest_from(buffer, COMMAND_PALETTE.iter().map(|(name, _)| *name))
}

pub fn suggest_from<I>(buffer: &str, vocabulary: I) -> Suggestions
where
    I: IntoIterator<Item = &'static str>,
{
    // Leading whitespace makes the line a chat prompt.
    if !buffer.starts_with(COMMAND_PREFIX) {
        return Suggestions::default();
    }

    let needle = buffer.to_lowercase();
    let candidates = vocabulary
        .into_iter()
        .filter(|candidate| candidate.to_lowercase().starts_with(&needle))
        .collect::<Vec<_>>();
    let show = candidates.first().is_some_and(|first| *first != buffer);
    Suggestions { candidates, show }
}

pub fn describe(command: &str) -> Option<&'static str> {
    COMMAND_PALETTE
        .iter()
        .find(|(name, _)| *name == command)
        .map(|(_, description)| *description)
}
