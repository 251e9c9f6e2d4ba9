//! Progress reporting and the append-only address progress log.

use chrono::{DateTime, TimeDelta, Utc};
use csv::{ReaderBuilder, Writer, WriterBuilder};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::ScoutError;

/// `hh:mm:ss`, negative spans clamp to zero.
pub fn format_eta(span: TimeDelta) -> String {
    let secs = span.num_seconds().max(0);
    let (h, rest) = (secs / 3600, secs % 3600);
    format!("{h:02}:{:02}:{:02}", rest / 60, rest % 60)
}

/// Rolling mean of recent item durations.
#[derive(Debug, Clone)]
pub struct EtaTracker {
    started: DateTime<Utc>,
    window: usize,
    recent: VecDeque<TimeDelta>,
}

impl EtaTracker {
    pub fn new(window: usize) -> Self {
        Self {
            started: Utc::now(),
            window: window.max(1),
            recent: VecDeque::new(),
        }
    }

    pub fn record(&mut self, took: TimeDelta) {
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(took);
    }

    /// Estimated time to process `remaining` more items.
    pub fn eta(&self, remaining: usize) -> TimeDelta {
        if self.recent.is_empty() {
            return TimeDelta::zero();
        }
        let total: i64 = self.recent.iter().map(TimeDelta::num_milliseconds).sum();
        let mean = total / self.recent.len() as i64;
        TimeDelta::milliseconds(mean.saturating_mul(remaining as i64))
    }

    pub fn elapsed(&self) -> TimeDelta {
        Utc::now() - self.started
    }
}

/// `<output stem>_progress.csv` next to the output table.
pub fn progress_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let progress = match name.strip_suffix(".csv") {
        Some(stem) => format!("{stem}_progress.csv"),
        None => format!("{name}_progress.csv"),
    };
    output.with_file_name(progress)
}

/// Append-only `url,direccion` log, flushed after every entry.
pub struct ProgressLog {
    path: PathBuf,
    writer: Writer<File>,
}

impl ProgressLog {
    /// Addresses already logged, in input order. Empty cells are `None`.
    pub fn read(path: &Path) -> Result<Vec<Option<String>>, ScoutError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| ScoutError::csv(path, e))?;
        let index = reader
            .headers()
            .map_err(|e| ScoutError::csv(path, e))?
            .iter()
            .position(|h| h == "direccion")
            .unwrap_or(1);

        let mut addresses = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ScoutError::csv(path, e))?;
            let address = record
                .get(index)
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string);
            addresses.push(address);
        }
        Ok(addresses)
    }

    /// Open for appending; writes the header when the file is new.
    pub fn open(path: &Path) -> Result<Self, ScoutError> {
        let fresh = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ScoutError::io(path, e))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if fresh {
            writer
                .write_record(["url", "direccion"])
                .map_err(|e| ScoutError::csv(path, e))?;
            writer.flush().map_err(|e| ScoutError::io(path, e))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn append(&mut self, url: &str, address: Option<&str>) -> Result<(), ScoutError> {
        self.writer
            .write_record([url, address.unwrap_or_default()])
            .map_err(|e| ScoutError::csv(&self.path, e))?;
        self.writer
            .flush()
            .map_err(|e| ScoutError::io(&self.path, e))
    }
}
