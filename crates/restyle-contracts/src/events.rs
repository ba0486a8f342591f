use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Keys the journal owns on every record.
const RESERVED_KEYS: [&str; 4] = ["type", "session_id", "seq", "ts"];

/// Append-only `events.jsonl` journal for one session. Records carry a
/// per-session `seq` starting at 0.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<Journal>,
}

#[derive(Debug)]
struct Journal {
    path: PathBuf,
    session_id: String,
    next_seq: Mutex<u64>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Journal {
                path: path.into(),
                session_id: session_id.into(),
                next_seq: Mutex::new(0),
            }),
        }
    }

    pub fn for_new_session(path: impl Into<PathBuf>) -> Self {
        Self::new(path, format!("session-{}", uuid::Uuid::new_v4()))
    }

    /// Appends one record. Object payloads are merged into the record
    /// (reserved keys are dropped); any other non-null payload lands under
    /// `data`.
    pub fn emit(&self, event_type: &str, payload: Value) -> anyhow::Result<Value> {
        let mut next_seq = self
            .inner
            .next_seq
            .lock()
            .map_err(|_| anyhow::anyhow!("journal lock poisoned"))?;

        let mut record = Map::new();
        record.insert("type".to_string(), Value::String(event_type.to_string()));
        record.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        record.insert("seq".to_string(), Value::from(*next_seq));
        record.insert("ts".to_string(), Value::String(now_utc_iso()));
        match payload {
            Value::Object(fields) => {
                for (key, value) in fields {
                    if RESERVED_KEYS.contains(&key.as_str()) {
                        tracing::debug!(key = %key, event_type, "dropping reserved journal key");
                        continue;
                    }
                    record.insert(key, value);
                }
            }
            Value::Null => {}
            other => {
                record.insert("data".to_string(), other);
            }
        }

        let path = &self.inner.path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .with_context(|| format!("failed to append to {}", path.display()))?;

        *next_seq += 1;
        Ok(Value::Object(record))
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
