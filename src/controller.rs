//! The session state machine.
//!
//! [`Session`] is the only writer of session state. Every keystroke and every
//! deferred task result arrives as a [`SessionEvent`]; handling one mutates
//! the session to completion and returns the follow-up [`Task`]s to run.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use serde_json::json;

use crate::commands::{
    self, Deferred, Dispatch, DispatchContext, Immediate, format_status, unknown_command_message,
};
use crate::completion;
use crate::composer::Composer;
use crate::error::display_error;
use crate::history::{Direction, HistoryCursor, HistoryLog};
use crate::state::{
    BackendBinding, Exchange, ModelPicker, ProviderPicker, Transcript, build_context,
};
use crate::tasks::{Task, TaskOutcome, TaskResult};
use crate::telemetry::TelemetrySink;

pub const INTERRUPT_HINT: &str = "Press Ctrl+C again to exit";
pub const HISTORY_CLEARED: &str = "Command history cleared successfully.";
pub const TRANSCRIPT_CLEARED: &str = "Chat history cleared";

#[derive(Debug)]
pub enum SessionEvent {
    Key(KeyEvent),
    Task(TaskOutcome),
    /// The interrupt window armed under this generation has elapsed.
    InterruptExpired(u64),
    Resize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    CommandSuggesting {
        candidates: Vec<&'static str>,
        selected: usize,
    },
    ModelPicking {
        picker: ModelPicker,
        /// Line that opened the picker.
        origin: String,
    },
    ProviderPicking {
        picker: ProviderPicker,
        origin: String,
    },
    Busy {
        pending_prompt: String,
        request_id: u64,
    },
    Quitting,
}

#[derive(Debug, Clone, Copy, Default)]
struct InterruptState {
    armed: bool,
    generation: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    /// Shown by `/status`.
    pub log_level: String,
}

pub struct Session {
    mode: Mode,
    transcript: Transcript,
    composer: Composer,
    history: HistoryLog,
    cursor: HistoryCursor,
    binding: BackendBinding,
    last_error: Option<String>,
    info_message: Option<String>,
    next_request_id: u64,
    interrupt: InterruptState,
    settings: SessionSettings,
    telemetry: TelemetrySink,
}

impl Session {
    pub fn new(
        binding: BackendBinding,
        history: HistoryLog,
        settings: SessionSettings,
        telemetry: TelemetrySink,
    ) -> Self {
        Self {
            mode: Mode::Normal,
            transcript: Transcript::default(),
            composer: Composer::default(),
            history,
            cursor: HistoryCursor::default(),
            binding,
            last_error: None,
            info_message: None,
            next_request_id: 1,
            interrupt: InterruptState::default(),
            settings,
            telemetry,
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn history_cursor(&self) -> &HistoryCursor {
        &self.cursor
    }

    pub fn binding(&self) -> &BackendBinding {
        &self.binding
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn info_message(&self) -> Option<&str> {
        self.info_message.as_deref()
    }

    pub fn interrupt_armed(&self) -> bool {
        self.interrupt.armed
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.mode, Mode::Busy { .. })
    }

    pub fn is_quitting(&self) -> bool {
        matches!(self.mode, Mode::Quitting)
    }

    pub fn pending_prompt(&self) -> Option<&str> {
        match &self.mode {
            Mode::Busy { pending_prompt, .. } => Some(pending_prompt),
            _ => None,
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<Task> {
        match event {
            SessionEvent::Key(key) => self.handle_key(key),
            SessionEvent::Task(outcome) => self.handle_outcome(outcome),
            SessionEvent::InterruptExpired(generation) => {
                self.expire_interrupt(generation);
                Vec::new()
            }
            SessionEvent::Resize => Vec::new(),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Task> {
        if key.kind == KeyEventKind::Release || self.is_quitting() {
            return Vec::new();
        }

        self.last_error = None;
        self.info_message = None;

        let interrupt = is_ctrl(&key, 'c');
        if !interrupt {
            self.interrupt.armed = false;
        }

        match self.mode {
            Mode::ModelPicking { .. } => return self.handle_model_picker_key(key),
            Mode::ProviderPicking { .. } => return self.handle_provider_picker_key(key),
            _ => {}
        }

        if interrupt {
            return self.handle_interrupt();
        }
        if is_ctrl(&key, 'd') && self.composer.is_empty() && !self.is_busy() {
            self.quit("eof");
            return Vec::new();
        }

        let plain = key.modifiers.difference(KeyModifiers::SHIFT).is_empty();
        match key.code {
            KeyCode::Tab if plain => {
                self.accept_suggestion();
                return Vec::new();
            }
            KeyCode::Up if plain => {
                self.handle_vertical(Direction::Back);
                return Vec::new();
            }
            KeyCode::Down if plain => {
                self.handle_vertical(Direction::Forward);
                return Vec::new();
            }
            KeyCode::Enter if key.modifiers.is_empty() => return self.handle_enter(),
            _ => {}
        }

        if self.is_busy() {
            return Vec::new();
        }
        self.handle_editor_key(key);
        Vec::new()
    }

    fn handle_interrupt(&mut self) -> Vec<Task> {
        if self.interrupt.armed {
            self.quit("interrupt");
            return Vec::new();
        }
        self.interrupt.armed = true;
        self.interrupt.generation += 1;
        self.info_message = Some(INTERRUPT_HINT.to_string());
        vec![Task::ArmInterrupt {
            generation: self.interrupt.generation,
        }]
    }

    fn expire_interrupt(&mut self, generation: u64) {
        if !self.interrupt.armed || generation != self.interrupt.generation {
            return;
        }
        self.interrupt.armed = false;
        if self.info_message.as_deref() == Some(INTERRUPT_HINT) {
            self.info_message = None;
        }
    }

    fn quit(&mut self, reason: &str) {
        tracing::info!(reason = reason, "session quitting");
        self.mode = Mode::Quitting;
    }

    fn accept_suggestion(&mut self) {
        let Mode::CommandSuggesting {
            candidates,
            selected,
        } = &self.mode
        else {
            return;
        };
        if let Some(candidate) = candidates.get(*selected) {
            self.composer.set_text(*candidate);
            self.cursor.reset(self.composer.text());
            self.refresh_suggestions();
        }
    }

    fn handle_vertical(&mut self, direction: Direction) {
        match &mut self.mode {
            Mode::CommandSuggesting {
                candidates,
                selected,
            } => match direction {
                Direction::Back => *selected = selected.saturating_sub(1),
                Direction::Forward => {
                    if *selected + 1 < candidates.len() {
                        *selected += 1;
                    }
                }
            },
            Mode::Normal => {
                if let Some(text) =
                    self.cursor
                        .navigate(direction, &self.history, self.composer.text())
                {
                    self.composer.set_text(text);
                }
            }
            _ => {}
        }
    }

    fn handle_enter(&mut self) -> Vec<Task> {
        match &self.mode {
            Mode::Normal => {}
            Mode::CommandSuggesting {
                candidates,
                selected,
            } => {
                if let Some(candidate) = candidates.get(*selected) {
                    self.composer.set_text(*candidate);
                }
            }
            _ => return Vec::new(),
        }

        if self.composer.text().trim().is_empty() {
            return Vec::new();
        }
        let line = self.composer.take();
        self.mode = Mode::Normal;
        self.submit(line)
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        let before = self.composer.text().to_string();
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);

        match key.code {
            KeyCode::Enter => self.composer.insert_newline(),
            KeyCode::Char('j') if ctrl => self.composer.insert_newline(),
            KeyCode::Char('w') if ctrl => {
                self.composer.delete_word_back();
            }
            KeyCode::Char('u') if ctrl => {
                self.composer.delete_to_start();
            }
            KeyCode::Char('d') if ctrl => {
                self.composer.delete();
            }
            KeyCode::Char('a') if ctrl => self.composer.move_home(),
            KeyCode::Char('e') if ctrl => self.composer.move_end(),
            KeyCode::Char(ch) if !ctrl && !alt => self.composer.insert_char(ch),
            KeyCode::Backspace => {
                self.composer.backspace();
            }
            KeyCode::Delete => {
                self.composer.delete();
            }
            KeyCode::Left => self.composer.move_left(),
            KeyCode::Right => self.composer.move_right(),
            KeyCode::Home => self.composer.move_home(),
            KeyCode::End => self.composer.move_end(),
            _ => {}
        }

        if self.composer.text() != before {
            self.cursor.reset(self.composer.text());
            self.refresh_suggestions();
        }
    }

    fn refresh_suggestions(&mut self) {
        if !matches!(self.mode, Mode::Normal | Mode::CommandSuggesting { .. }) {
            return;
        }
        let suggestions = completion::suggest(self.composer.text());
        self.mode = if suggestions.show {
            Mode::CommandSuggesting {
                candidates: suggestions.candidates,
                selected: 0,
            }
        } else {
            Mode::Normal
        };
    }

    fn handle_model_picker_key(&mut self, key: KeyEvent) -> Vec<Task> {
        let Mode::ModelPicking { picker, origin } = &mut self.mode else {
            return Vec::new();
        };
        if key.code == KeyCode::Esc || is_ctrl(&key, 'c') {
            self.mode = Mode::Normal;
            return Vec::new();
        }

        match key.code {
            KeyCode::Up => picker.move_up(),
            KeyCode::Down => picker.move_down(),
            KeyCode::Backspace => picker.pop_filter(),
            KeyCode::Enter => {
                let Some(model) = picker.selected().map(str::to_string) else {
                    return Vec::new();
                };
                let origin = std::mem::take(origin);
                self.mode = Mode::Normal;
                let request_id = self.allocate_request_id();
                return vec![Task::SwitchModel {
                    request_id,
                    origin,
                    binding: self.binding.clone(),
                    model,
                }];
            }
            KeyCode::Char(ch)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                picker.push_filter(ch)
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_provider_picker_key(&mut self, key: KeyEvent) -> Vec<Task> {
        let Mode::ProviderPicking { picker, origin } = &mut self.mode else {
            return Vec::new();
        };
        if key.code == KeyCode::Esc || is_ctrl(&key, 'c') {
            self.mode = Mode::Normal;
            return Vec::new();
        }

        match key.code {
            KeyCode::Up => picker.move_up(),
            KeyCode::Down => picker.move_down(),
            KeyCode::Enter => {
                let Some(provider) = picker.selected() else {
                    return Vec::new();
                };
                let origin = std::mem::take(origin);
                self.mode = Mode::Normal;
                let request_id = self.allocate_request_id();
                return vec![Task::SwitchProvider {
                    request_id,
                    origin,
                    provider,
                }];
            }
            _ => {}
        }
        Vec::new()
    }

    fn allocate_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    fn enter_busy(&mut self, pending_prompt: String) -> u64 {
        let request_id = self.allocate_request_id();
        self.mode = Mode::Busy {
            pending_prompt,
            request_id,
        };
        request_id
    }

    fn submit(&mut self, line: String) -> Vec<Task> {
        if let Err(err) = self.history.add(&line) {
            tracing::warn!(error = %err, "failed to persist history");
            self.last_error = Some(display_error(&err));
        }
        self.cursor.reset("");

        let dispatch = {
            let ctx = DispatchContext {
                binding: &self.binding,
                transcript: &self.transcript,
                history_len: self.history.len(),
                persistence_enabled: self.history.is_persistent(),
                log_level: &self.settings.log_level,
            };
            commands::dispatch(&line, &ctx)
        };
        self.telemetry.emit(
            "command.dispatched",
            json!({ "kind": dispatch_kind(&dispatch) }),
        );

        match dispatch {
            Dispatch::Chat(prompt) => {
                let messages = build_context(self.transcript.exchanges(), &prompt);
                let request_id = self.enter_busy(prompt);
                vec![Task::Generate {
                    request_id,
                    binding: self.binding.clone(),
                    messages,
                }]
            }
            Dispatch::Immediate(effect) => {
                self.apply_immediate(line.trim(), effect);
                Vec::new()
            }
            Dispatch::Deferred(deferred) => {
                let origin = line.trim().to_string();
                let request_id = self.enter_busy(origin.clone());
                let binding = self.binding.clone();
                let task = match deferred {
                    Deferred::Status(snapshot) => Task::Status {
                        request_id,
                        snapshot,
                    },
                    Deferred::ListModels => Task::ListModels {
                        request_id,
                        binding,
                    },
                    Deferred::ListProviders => Task::ListProviders { request_id },
                    Deferred::Analyze => Task::Analyze {
                        request_id,
                        binding,
                    },
                    Deferred::SwitchModel(model) => Task::SwitchModel {
                        request_id,
                        origin,
                        binding,
                        model,
                    },
                    Deferred::SwitchProvider(provider) => Task::SwitchProvider {
                        request_id,
                        origin,
                        provider,
                    },
                };
                vec![task]
            }
        }
    }

    fn apply_immediate(&mut self, line: &str, effect: Immediate) {
        match effect {
            Immediate::Help(text) => self.transcript.push(Exchange::new(line, text)),
            Immediate::ClearTranscript => {
                self.transcript.clear();
                self.info_message = Some(TRANSCRIPT_CLEARED.to_string());
            }
            Immediate::ClearHistory => match self.history.clear() {
                Ok(()) => {
                    self.cursor.reset("");
                    self.transcript.push(Exchange::new(line, HISTORY_CLEARED));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to clear history");
                    self.last_error = Some(format!(
                        "failed to clear history: {}",
                        display_error(&err)
                    ));
                }
            },
            Immediate::Exit => self.quit("command"),
            Immediate::UnknownCommand(text) => {
                self.last_error = Some(unknown_command_message(&text));
            }
            Immediate::InvalidArgument(message) => self.last_error = Some(message),
        }
    }

    /// Ends `Busy` when `request_id` is the one in flight, returning its prompt.
    fn take_pending(&mut self, request_id: u64) -> Option<String> {
        let in_flight = matches!(
            &self.mode,
            Mode::Busy { request_id: current, .. } if *current == request_id
        );
        if !in_flight {
            return None;
        }
        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Busy { pending_prompt, .. } => Some(pending_prompt),
            _ => None,
        }
    }

    fn handle_outcome(&mut self, outcome: TaskOutcome) -> Vec<Task> {
        let TaskOutcome { request_id, result } = outcome;
        let is_switch = matches!(
            result,
            TaskResult::ModelSwitched { .. } | TaskResult::ProviderSwitched { .. }
        );
        let pending = self.take_pending(request_id);
        if pending.is_none() && !is_switch {
            tracing::debug!(request_id, "discarding stale task outcome");
            return Vec::new();
        }
        let prompt = pending.unwrap_or_default();

        match result {
            TaskResult::Reply(Ok(response)) => {
                self.transcript.push(Exchange::new(prompt, response));
            }
            TaskResult::Status(report) => {
                self.transcript
                    .push(Exchange::new(prompt, format_status(&report)));
            }
            TaskResult::Models(Ok(models)) => {
                self.mode = Mode::ModelPicking {
                    picker: ModelPicker::new(models, self.binding.model.clone()),
                    origin: prompt,
                };
            }
            TaskResult::Providers(providers) => {
                if providers.is_empty() {
                    self.last_error = Some("no providers available".to_string());
                } else {
                    self.mode = Mode::ProviderPicking {
                        picker: ProviderPicker::new(providers, self.binding.provider),
                        origin: prompt,
                    };
                }
            }
            TaskResult::Analysis(Ok(message)) => {
                self.transcript.push(Exchange::new(prompt, message));
            }
            TaskResult::ModelSwitched {
                origin,
                result: Ok(binding),
            } => {
                let response = format!("Switched to model: {}", binding.model);
                self.apply_binding(binding, "model.switched");
                self.transcript.push(Exchange::new(origin, response));
            }
            TaskResult::ProviderSwitched {
                origin,
                result: Ok(binding),
            } => {
                let response = format!(
                    "Switched to provider: {}\nCurrent model: {}",
                    binding.provider, binding.model
                );
                self.apply_binding(binding, "provider.switched");
                self.transcript.push(Exchange::new(origin, response));
            }
            TaskResult::Reply(Err(message))
            | TaskResult::Models(Err(message))
            | TaskResult::Analysis(Err(message))
            | TaskResult::ModelSwitched {
                result: Err(message),
                ..
            }
            | TaskResult::ProviderSwitched {
                result: Err(message),
                ..
            } => self.last_error = Some(message),
        }
        Vec::new()
    }

    fn apply_binding(&mut self, binding: BackendBinding, event: &str) {
        tracing::info!(
            provider = %binding.provider,
            model = %binding.model,
            "Switched backend binding"
        );
        self.telemetry.emit(
            event,
            json!({
                "provider": binding.provider.label(),
                "model": binding.model,
            }),
        );
        self.binding = binding;
    }
}

fn is_ctrl(key: &KeyEvent, ch: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char(c) if c.eq_ignore_ascii_case(&ch))
}

fn dispatch_kind(dispatch: &Dispatch) -> &'static str {
    match dispatch {
        Dispatch::Chat(_) => "chat",
        Dispatch::Immediate(_) => "immediate",
        Dispatch::Deferred(_) => "deferred",
    }
}
