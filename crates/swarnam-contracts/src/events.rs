use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::session::{SessionObserver, SessionState};

/// Append-only writer for `events.jsonl`.
///
/// Each line is one compact JSON object with `type`, `run_id`, `ts` and the
/// full session snapshot under `state`.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    inner: Arc<SnapshotWriterInner>,
}

#[derive(Debug)]
struct SnapshotWriterInner {
    path: PathBuf,
    run_id: String,
    lock: Mutex<()>,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SnapshotWriterInner {
                path: path.into(),
                run_id: run_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn run_id(&self) -> &str {
        &self.inner.run_id
    }

    pub fn emit(&self, transition: &str, state: &SessionState) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(transition.to_string()));
        event.insert(
            "run_id".to_string(),
            Value::String(self.inner.run_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        event.insert("state".to_string(), serde_json::to_value(state)?);

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("snapshot writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

impl SessionObserver for SnapshotWriter {
    fn on_transition(&self, transition: &str, state: &SessionState) {
        if let Err(err) = self.emit(transition, state) {
            tracing::warn!(
                path = %self.inner.path.display(),
                "failed to append session snapshot: {err:#}"
            );
        }
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
