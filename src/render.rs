use std::io::{self, Write};

use crossterm::cursor::{MoveTo, Show};
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::{QueueableCommand, queue};

use crate::completion;
use crate::controller::{Mode, Session};
use crate::state::{Exchange, ModelPicker, ProviderPicker};
use crate::theme::{self, paint};

const MAX_OVERLAY_ROWS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub lines: Vec<String>,
    /// Column and row of the terminal cursor.
    pub cursor: (u16, u16),
}

/// Lays out the whole screen for `session`. Pure so it can be tested.
pub fn frame(session: &Session, width: u16, height: u16) -> Frame {
    let width = usize::from(width.max(8));
    let height = usize::from(height.max(4));

    let mut bottom = Vec::new();
    if let Some(error) = session.last_error() {
        for line in wrap(&format!("Error: {error}"), width) {
            bottom.push(paint(theme::BOLD_RED, &line));
        }
    } else if let Some(info) = session.info_message() {
        for line in wrap(info, width) {
            bottom.push(paint(theme::YELLOW, &line));
        }
    }

    let mut cursor_in_bottom = None;
    match session.mode() {
        Mode::ModelPicking { picker, .. } => bottom.extend(model_picker_lines(picker, width)),
        Mode::ProviderPicking { picker, .. } => {
            bottom.extend(provider_picker_lines(picker, width))
        }
        Mode::Busy { .. } => bottom.push(paint(theme::DIM, theme::PROMPT.trim_end())),
        Mode::Normal | Mode::CommandSuggesting { .. } | Mode::Quitting => {
            let (input, (col, row)) = input_lines(session, width);
            cursor_in_bottom = Some((col, bottom.len() + row));
            bottom.extend(input);
            if let Mode::CommandSuggesting {
                candidates,
                selected,
            } = session.mode()
            {
                bottom.extend(suggestion_lines(candidates, *selected, width));
            }
        }
    }
    bottom.push(theme::footer(
        session.binding().provider,
        &session.binding().model,
        session.is_busy(),
    ));

    let mut body = if session.transcript().is_empty() && !session.is_busy() {
        theme::welcome_lines(session.binding().provider, &session.binding().model)
    } else {
        transcript_lines(session.transcript().exchanges(), width)
    };
    if let Some(pending) = session.pending_prompt() {
        body.extend(prompt_lines(pending, width));
        body.push(paint(theme::DIM, "  Thinking..."));
    }

    let room = height.saturating_sub(bottom.len());
    let skip = body.len().saturating_sub(room);
    let mut lines = Vec::with_capacity(height);
    lines.extend(std::iter::repeat_n(String::new(), room.saturating_sub(body.len())));
    lines.extend(body.into_iter().skip(skip));
    let top = lines.len();
    lines.extend(bottom);

    let overflow = lines.len().saturating_sub(height);
    if overflow > 0 {
        lines.drain(..overflow);
    }

    let cursor = match cursor_in_bottom {
        Some((col, row)) => {
            let row = (top + row).saturating_sub(overflow).min(height - 1);
            (clamp_u16(col.min(width - 1)), clamp_u16(row))
        }
        None => (0, clamp_u16(height - 1)),
    };
    Frame { lines, cursor }
}

pub fn draw<W: Write>(out: &mut W, frame: &Frame) -> io::Result<()> {
    for (row, line) in frame.lines.iter().enumerate() {
        queue!(
            out,
            MoveTo(0, clamp_u16(row)),
            Clear(ClearType::CurrentLine),
            Print(line)
        )?;
    }
    out.queue(MoveTo(frame.cursor.0, frame.cursor.1))?
        .queue(Show)?;
    out.flush()
}

fn clamp_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// Hard-wraps on char boundaries, keeping explicit newlines.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for line in text.split('\n') {
        let chars = line.chars().collect::<Vec<_>>();
        if chars.is_empty() {
            out.push(String::new());
            continue;
        }
        for chunk in chars.chunks(width) {
            out.push(chunk.iter().collect());
        }
    }
    out
}

fn prompt_lines(prompt: &str, width: usize) -> Vec<String> {
    wrap(prompt, width.saturating_sub(theme::PROMPT.len()))
        .into_iter()
        .enumerate()
        .map(|(idx, line)| {
            let lead = if idx == 0 {
                theme::PROMPT
            } else {
                theme::CONTINUATION
            };
            paint(theme::BOLD_CYAN, &format!("{lead}{line}"))
        })
        .collect()
}

fn transcript_lines(exchanges: &[Exchange], width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for exchange in exchanges {
        lines.extend(prompt_lines(&exchange.prompt, width));
        lines.extend(wrap(&exchange.response, width));
        lines.push(String::new());
    }
    lines
}

/// Composer rows plus the cursor position relative to the first row.
fn input_lines(session: &Session, width: usize) -> (Vec<String>, (usize, usize)) {
    let text = session.composer().text();
    let inner = width.saturating_sub(theme::PROMPT.len()).max(1);
    let before = text
        .chars()
        .take(session.composer().cursor())
        .collect::<String>();

    let mut rows = Vec::new();
    for (idx, logical) in text.split('\n').enumerate() {
        let lead = if idx == 0 {
            theme::PROMPT
        } else {
            theme::CONTINUATION
        };
        for (part_idx, part) in wrap(logical, inner).into_iter().enumerate() {
            let lead = if part_idx == 0 {
                lead
            } else {
                theme::CONTINUATION
            };
            rows.push(format!("{}{part}", paint(theme::BOLD_CYAN, lead)));
        }
    }

    let mut row = 0;
    let mut col = 0;
    let logical_before = before.split('\n').collect::<Vec<_>>();
    for (idx, logical) in text.split('\n').enumerate() {
        if idx + 1 < logical_before.len() {
            row += wrap(logical, inner).len();
            continue;
        }
        let on_line = logical_before.get(idx).map_or(0, |l| l.chars().count());
        row += on_line / inner;
        col = theme::PROMPT.len() + on_line % inner;
        break;
    }
    (rows, (col, row))
}

fn suggestion_lines(candidates: &[&'static str], selected: usize, width: usize) -> Vec<String> {
    let start = selected.saturating_sub(MAX_OVERLAY_ROWS - 1);
    candidates
        .iter()
        .enumerate()
        .skip(start)
        .take(MAX_OVERLAY_ROWS)
        .map(|(idx, name)| {
            let description = completion::describe(name).unwrap_or_default();
            let row = truncate(&format!("  {name:<14} {description}"), width);
            if idx == selected {
                paint(theme::REVERSE, &row)
            } else {
                paint(theme::DIM, &row)
            }
        })
        .collect()
}

fn model_picker_lines(picker: &ModelPicker, width: usize) -> Vec<String> {
    let mut lines = vec![
        paint(
            theme::BOLD,
            &truncate(
                &format!("Select a model (current: {})", picker.current()),
                width,
            ),
        ),
        paint(
            theme::DIM,
            &truncate(
                &format!(
                    "Filter: {}  (type to filter, Enter to select, Esc to cancel)",
                    picker.filter()
                ),
                width,
            ),
        ),
    ];
    if picker.visible_len() == 0 {
        lines.push(paint(theme::DIM, "  (no matching models)"));
        return lines;
    }
    let start = picker
        .selected_index()
        .saturating_sub(MAX_OVERLAY_ROWS - 1);
    for (idx, model) in picker.visible().enumerate().skip(start).take(MAX_OVERLAY_ROWS) {
        lines.push(picker_row(
            model,
            idx == picker.selected_index(),
            model == picker.current(),
            width,
        ));
    }
    lines
}

fn provider_picker_lines(picker: &ProviderPicker, width: usize) -> Vec<String> {
    let mut lines = vec![paint(
        theme::BOLD,
        &truncate(
            "Select a provider (Enter to select, Esc to cancel)",
            width,
        ),
    )];
    for (idx, provider) in picker.providers().iter().enumerate() {
        lines.push(picker_row(
            provider.label(),
            idx == picker.selected_index(),
            *provider == picker.current(),
            width,
        ));
    }
    lines
}

fn picker_row(label: &str, selected: bool, current: bool, width: usize) -> String {
    let marker = if selected {
        theme::SELECTED_MARKER
    } else {
        theme::UNSELECTED_MARKER
    };
    let suffix = if current { " (current)" } else { "" };
    let row = truncate(&format!("{marker}{label}{suffix}"), width);
    if selected {
        paint(theme::GREEN, &row)
    } else {
        row
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}
