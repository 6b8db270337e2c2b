use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    self, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::analyzer::LlmRepoAnalyzer;
use crate::config::RuntimeConfig;
use crate::controller::{Session, SessionEvent, SessionSettings};
use crate::history::HistoryLog;
use crate::provider::{BackendFactory, HttpBackendFactory, resolve_provider};
use crate::render;
use crate::state::BackendBinding;
use crate::tasks::{EventSender, TaskRunner, TaskTimeouts};
use crate::telemetry::TelemetrySink;

/// Restores the terminal on drop, including early returns.
struct TerminalGuard;

impl TerminalGuard {
    fn enter(out: &mut Stdout) -> Result<Self> {
        enable_raw_mode().context("failed to enable raw terminal mode")?;
        execute!(out, EnterAlternateScreen).context("failed to enter alternate screen")?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

pub fn open_history(cfg: &RuntimeConfig) -> HistoryLog {
    if cfg.history_enabled {
        HistoryLog::open(
            cfg.history_path(),
            Some(cfg.legacy_history_path.as_path()),
            cfg.history_capacity,
        )
    } else {
        HistoryLog::in_memory(cfg.history_capacity)
    }
}

pub async fn run_session(cfg: RuntimeConfig) -> Result<()> {
    let factory: Arc<dyn BackendFactory> = Arc::new(HttpBackendFactory::new(&cfg)?);
    let provider = resolve_provider(cfg.provider);
    let backend = factory.build(provider)?;
    let binding = BackendBinding::new(backend, cfg.model.clone());

    let telemetry = TelemetrySink::new(&cfg);
    telemetry.emit(
        "session.started",
        json!({ "provider": binding.provider.label(), "model": binding.model }),
    );
    tracing::info!(provider = %binding.provider, model = %binding.model, "session started");

    let mut session = Session::new(
        binding,
        open_history(&cfg),
        SessionSettings {
            log_level: cfg.log_filter.clone(),
        },
        telemetry.clone(),
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let runner = TaskRunner::new(
        EventSender::new(tx.clone()),
        factory,
        Arc::new(LlmRepoAnalyzer),
        TaskTimeouts::from_config(&cfg),
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        cfg.marker_path.clone(),
    );

    install_panic_hook();
    let mut stdout = io::stdout();
    let guard = TerminalGuard::enter(&mut stdout)?;
    spawn_input_reader(tx);

    let result = event_loop(&mut session, &runner, rx, &mut stdout).await;
    drop(guard);

    telemetry.emit(
        "session.ended",
        json!({ "exchanges": session.transcript().len() }),
    );
    result
}

async fn event_loop(
    session: &mut Session,
    runner: &TaskRunner,
    mut rx: UnboundedReceiver<SessionEvent>,
    out: &mut Stdout,
) -> Result<()> {
    redraw(session, out)?;
    while let Some(event) = rx.recv().await {
        let tasks = session.handle_event(event);
        runner.spawn_all(tasks);
        if session.is_quitting() {
            break;
        }
        redraw(session, out)?;
    }
    Ok(())
}

fn redraw(session: &Session, out: &mut Stdout) -> Result<()> {
    let (width, height) = terminal::size().context("failed to read terminal size")?;
    let frame = render::frame(session, width, height);
    render::draw(out, &frame).context("failed to draw frame")
}

/// Blocking crossterm reader feeding the session channel until it closes.
fn spawn_input_reader(tx: UnboundedSender<SessionEvent>) {
    tokio::task::spawn_blocking(move || {
        while !tx.is_closed() {
            match event::poll(Duration::from_millis(100)) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "terminal event poll failed");
                    break;
                }
            }
            let forwarded = match event::read() {
                Ok(Event::Key(key)) => SessionEvent::Key(key),
                Ok(Event::Resize(_, _)) => SessionEvent::Resize,
                Ok(_) => continue,
                Err(err) => {
                    tracing::warn!(error = %err, "terminal event read failed");
                    break;
                }
            };
            if tx.send(forwarded).is_err() {
                break;
            }
        }
    });
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}
