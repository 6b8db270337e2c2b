//! Deferred work. Each task runs on the tokio runtime and reports back as a
//! single [`SessionEvent`]; nothing here touches session state.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::UnboundedSender;

use crate::analyzer::RepoAnalyzer;
use crate::cli::Provider;
use crate::commands::{StatusReport, StatusSnapshot};
use crate::config::RuntimeConfig;
use crate::controller::SessionEvent;
use crate::error::display_error;
use crate::project_context;
use crate::provider::{BackendFactory, ChatMessage, GenerateOptions, validate_model_for_provider};
use crate::state::BackendBinding;

#[derive(Debug)]
pub enum Task {
    Generate {
        request_id: u64,
        binding: BackendBinding,
        messages: Vec<ChatMessage>,
    },
    Status {
        request_id: u64,
        snapshot: StatusSnapshot,
    },
    ListModels {
        request_id: u64,
        binding: BackendBinding,
    },
    ListProviders {
        request_id: u64,
    },
    Analyze {
        request_id: u64,
        binding: BackendBinding,
    },
    SwitchModel {
        request_id: u64,
        origin: String,
        binding: BackendBinding,
        model: String,
    },
    SwitchProvider {
        request_id: u64,
        origin: String,
        provider: Provider,
    },
    ArmInterrupt {
        generation: u64,
    },
}

#[derive(Debug)]
pub struct TaskOutcome {
    pub request_id: u64,
    pub result: TaskResult,
}

/// Failures arrive already rendered as one displayable line.
#[derive(Debug)]
pub enum TaskResult {
    Reply(Result<String, String>),
    Status(StatusReport),
    Models(Result<Vec<String>, String>),
    Providers(Vec<Provider>),
    Analysis(Result<String, String>),
    ModelSwitched {
        origin: String,
        result: Result<BackendBinding, String>,
    },
    ProviderSwitched {
        origin: String,
        result: Result<BackendBinding, String>,
    },
}

/// Sends into the session channel; a closed channel only means the session
/// already ended, so failures are logged and dropped.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: UnboundedSender<SessionEvent>,
}

impl EventSender {
    pub fn new(tx: UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    pub fn send(&self, event: SessionEvent) {
        if let Err(err) = self.tx.send(event) {
            tracing::debug!("session event dropped: {err}");
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TaskTimeouts {
    pub request: Duration,
    pub models: Duration,
    pub analysis: Duration,
    pub interrupt_window: Duration,
}

impl TaskTimeouts {
    pub fn from_config(cfg: &RuntimeConfig) -> Self {
        Self {
            request: cfg.request_timeout(),
            models: cfg.models_timeout(),
            analysis: cfg.analysis_timeout(),
            interrupt_window: cfg.interrupt_window(),
        }
    }
}

#[derive(Clone)]
pub struct TaskRunner {
    events: EventSender,
    factory: Arc<dyn BackendFactory>,
    analyzer: Arc<dyn RepoAnalyzer>,
    timeouts: TaskTimeouts,
    project_root: PathBuf,
    marker_path: PathBuf,
}

impl TaskRunner {
    pub fn new(
        events: EventSender,
        factory: Arc<dyn BackendFactory>,
        analyzer: Arc<dyn RepoAnalyzer>,
        timeouts: TaskTimeouts,
        project_root: PathBuf,
        marker_path: PathBuf,
    ) -> Self {
        Self {
            events,
            factory,
            analyzer,
            timeouts,
            project_root,
            marker_path,
        }
    }

    pub fn spawn_all(&self, tasks: Vec<Task>) {
        for task in tasks {
            self.spawn(task);
        }
    }

    pub fn spawn(&self, task: Task) {
        let runner = self.clone();
        tokio::spawn(async move {
            let event = runner.execute(task).await;
            runner.events.send(event);
        });
    }

    /// Runs one task to completion and returns the event it produces.
    pub async fn execute(&self, task: Task) -> SessionEvent {
        match task {
            Task::ArmInterrupt { generation } => {
                tokio::time::sleep(self.timeouts.interrupt_window).await;
                SessionEvent::InterruptExpired(generation)
            }
            Task::Generate {
                request_id,
                binding,
                messages,
            } => {
                let options = GenerateOptions {
                    model: binding.model.clone(),
                    system: Some(project_context::system_prompt(&self.marker_path)),
                    max_tokens: None,
                };
                let result = with_timeout(
                    self.timeouts.request,
                    "generation",
                    binding.backend.generate(&messages, &options),
                )
                .await;
                outcome(request_id, TaskResult::Reply(render(result)))
            }
            Task::Status {
                request_id,
                snapshot,
            } => outcome(
                request_id,
                TaskResult::Status(StatusReport {
                    snapshot,
                    repository_initialized: project_context::marker_exists(&self.marker_path),
                }),
            ),
            Task::ListModels {
                request_id,
                binding,
            } => {
                let result = with_timeout(self.timeouts.models, "model listing", async {
                    let models = binding.backend.list_models().await?;
                    if models.is_empty() {
                        return Err(anyhow::anyhow!(
                            "no models available for provider '{}'",
                            binding.provider
                        ));
                    }
                    Ok(models)
                })
                .await;
                outcome(request_id, TaskResult::Models(render(result)))
            }
            Task::ListProviders { request_id } => {
                outcome(request_id, TaskResult::Providers(self.factory.available()))
            }
            Task::Analyze {
                request_id,
                binding,
            } => {
                let result = with_timeout(
                    self.timeouts.analysis,
                    "repository analysis",
                    self.analyze(&binding),
                )
                .await;
                outcome(request_id, TaskResult::Analysis(render(result)))
            }
            Task::SwitchModel {
                request_id,
                origin,
                binding,
                model,
            } => {
                let result = validate_model_for_provider(binding.provider, &model)
                    .map(|()| binding.with_model(model));
                outcome(
                    request_id,
                    TaskResult::ModelSwitched {
                        origin,
                        result: render(result),
                    },
                )
            }
            Task::SwitchProvider {
                request_id,
                origin,
                provider,
            } => {
                let result = self
                    .factory
                    .build(provider)
                    .map(|backend| BackendBinding::new(backend, None));
                outcome(
                    request_id,
                    TaskResult::ProviderSwitched {
                        origin,
                        result: render(result),
                    },
                )
            }
        }
    }

    async fn analyze(&self, binding: &BackendBinding) -> Result<String> {
        if project_context::marker_exists(&self.marker_path) {
            return Ok(format!(
                "{} already exists. Repository has been analyzed previously.",
                self.marker_display()
            ));
        }

        let started = std::time::Instant::now();
        let content = self.analyzer.analyze(&self.project_root, binding).await?;
        tokio::fs::write(&self.marker_path, content)
            .await
            .map_err(|err| {
                anyhow::anyhow!("failed to write '{}': {err}", self.marker_path.display())
            })?;
        Ok(format!(
            "Repository analysis completed in {:.1?}.\n{} has been generated with project context.",
            started.elapsed(),
            self.marker_display()
        ))
    }

    fn marker_display(&self) -> String {
        self.marker_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.marker_path.display().to_string())
    }
}

fn outcome(request_id: u64, result: TaskResult) -> SessionEvent {
    SessionEvent::Task(TaskOutcome { request_id, result })
}

fn render<T>(result: Result<T>) -> Result<T, String> {
    result.map_err(|err| display_error(&err))
}

async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "{what} timed out after {}s",
            limit.as_secs_f32()
        )),
    }
}
