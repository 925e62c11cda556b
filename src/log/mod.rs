//! Structured execution log — JSON lines per run.
//!
//! A scenario run can write a `.jsonl` file capturing every state change,
//! every diagnostic command issued and every classification decision. Each
//! line is a self-contained JSON object carrying a timestamp and the run id,
//! so several runs appended to one file can still be told apart.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// A structured event in the execution log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    pub run_id: Uuid,
    #[serde(flatten)]
    pub event: LogEvent,
}

/// All event types that can appear in the execution log.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    /// A scenario run started against a channel.
    RunStarted { channel: String },
    /// The scenario reached a new state.
    StateEntered { state: String },
    /// A diagnostic command was sent.
    CommandIssued { command: String, response_len: usize },
    /// A probe response was checked against an expectation.
    Classified {
        command: String,
        expected: String,
        passed: bool,
    },
    /// A neighborhood sweep finished.
    SweepCompleted {
        center: String,
        probes: u64,
        unsafe_addresses: u64,
        unknown: u64,
    },
    /// The scenario reached `Done`.
    RunCompleted { summary: String },
    /// The scenario aborted.
    RunFailed { state: String, reason: String },
}

/// Writer for JSON lines execution logs.
pub struct ExecutionLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
    run_id: Uuid,
}

impl ExecutionLog {
    /// Create a new execution log, writing to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Appends to an existing file.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file: {}", path.display()))?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            run_id: Uuid::new_v4(),
        })
    }

    /// Log an event.
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let entry = LogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            run_id: self.run_id,
            event,
        };

        let json = serde_json::to_string(&entry).context("failed to serialize log entry")?;

        debug!(event = %json, "execution log");

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("execution log writer poisoned"))?;
        writeln!(writer, "{json}").context("failed to write log entry")?;
        writer.flush().context("failed to flush log")?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}
