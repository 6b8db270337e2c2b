use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};

use crate::config::RuntimeConfig;

pub fn unix_ms_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Append-only JSONL sink for session lifecycle events.
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    target: Option<PathBuf>,
    session: String,
    write_lock: Arc<Mutex<()>>,
}

impl TelemetrySink {
    pub fn new(cfg: &RuntimeConfig) -> Self {
        if !cfg.telemetry_enabled {
            return Self::disabled();
        }
        let session = format!("{}-{}-{}", cfg.profile, unix_ms_now(), std::process::id());
        Self::to_file(cfg.telemetry_path.clone(), session)
    }

    pub fn to_file(path: PathBuf, session: impl Into<String>) -> Self {
        Self {
            target: Some(path),
            session: session.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn disabled() -> Self {
        Self {
            target: None,
            session: String::new(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Payload object fields are flattened next to `event`, `session` and `at_ms`.
    pub fn emit(&self, event: &str, payload: Value) {
        let Some(path) = self.target.as_ref() else {
            return;
        };

        let mut record = match payload {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            other => Map::from_iter([("data".to_string(), other)]),
        };
        record.insert("event".to_string(), json!(event));
        record.insert("session".to_string(), json!(self.session));
        record.insert("at_ms".to_string(), json!(unix_ms_now()));

        if let Err(err) = self.append(path, &Value::Object(record)) {
            tracing::warn!(event, path = %path.display(), error = %err, "telemetry write failed");
        }
    }

    fn append(&self, path: &Path, record: &Value) -> Result<()> {
        let mut line = serde_json::to_vec(record).context("failed to encode telemetry event")?;
        line.push(b'\n');

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create '{}'", dir.display()))?;
        }

        let _held = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(&line))
            .with_context(|| format!("failed to append to '{}'", path.display()))
    }
}
