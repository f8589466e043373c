/// College Stats — Logger
/// JSONL event stream for fetch and batch runs

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct EventLogger {
    log_dir: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir }
    }

    pub fn dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }

    /// Like `log`, but a failed write only ends up as a warning.
    pub fn log_quiet<T: Serialize>(&self, event: &T) {
        if let Err(e) = self.log(event) {
            tracing::warn!("event log write failed in {:?}: {}", self.log_dir, e);
        }
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event typy ────────────────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct FetchOkEvent {
    pub ts:         String,
    pub event:      &'static str,   // "FETCH_OK"
    pub index:      i64,
    pub player:     String,
    pub pos:        String,
    pub schema_id:  String,
    pub rows:       usize,
    pub output:     String,
    pub elapsed_ms: u64,
}

#[derive(Serialize, Debug)]
pub struct FetchFailedEvent {
    pub ts:         String,
    pub event:      &'static str,   // "FETCH_FAILED"
    pub index:      i64,
    pub kind:       String,
    pub retriable:  bool,
    pub message:    String,
    pub elapsed_ms: u64,
}

#[derive(Serialize, Debug)]
pub struct BatchAttemptEvent {
    pub ts:          String,
    pub event:       &'static str,  // "BATCH_ATTEMPT"
    pub index:       i64,
    pub attempt:     u32,
    pub outcome:     String,        // "ok" | "timeout" | "exit_N"
    pub kind:        Option<String>,
    pub disposition: String,        // "done" | "retry" | "give_up"
}

#[derive(Serialize, Debug)]
pub struct BatchItemDoneEvent {
    pub ts:       String,
    pub event:    &'static str,     // "BATCH_ITEM_DONE"
    pub index:    i64,
    pub attempts: u32,
    pub fetched:  bool,
    pub reason:   Option<String>,
}

#[derive(Serialize, Debug)]
pub struct BatchSummaryEvent {
    pub ts:        String,
    pub event:     &'static str,    // "BATCH_SUMMARY"
    pub start:     i64,
    pub end:       i64,
    pub fetched:   usize,
    pub abandoned: usize,
    pub attempts:  u64,
}
