//! Daily append-only capture logs of raw datagrams.
//!
//! Line format: `<unix timestamp as decimal float>\t<lowercase hex payload>\n`.

use anyhow::Context;
use chrono::{Local, NaiveDate, TimeZone};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

pub const CAPTURE_EXTENSION: &str = "tsv";

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRecord {
    pub timestamp: f64,
    pub payload: Vec<u8>,
}

impl CaptureRecord {
    pub fn new(timestamp: f64, payload: Vec<u8>) -> Self {
        Self { timestamp, payload }
    }

    /// Stamps `payload` with the current wall clock.
    pub fn now(payload: &[u8]) -> Self {
        Self::new(unix_now(), payload.to_vec())
    }

    /// The persisted line, without the trailing newline. The timestamp always
    /// carries a fractional part, so whole seconds are written as `N.0`.
    pub fn to_line(&self) -> String {
        format!("{:?}\t{}", self.timestamp, hex::encode(&self.payload))
    }
}

pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Local calendar day a capture timestamp belongs to.
pub fn capture_day(timestamp: f64) -> NaiveDate {
    let secs = timestamp.floor() as i64;
    match Local.timestamp_opt(secs, 0).single() {
        Some(dt) => dt.date_naive(),
        None => Local::now().date_naive(),
    }
}

/// `<dir>/<YYYY-MM-DD>.tsv`
pub fn capture_path(dir: &Path, day: NaiveDate) -> PathBuf {
    dir.join(format!("{}.{}", day.format("%Y-%m-%d"), CAPTURE_EXTENSION))
}

struct OpenLog {
    day: NaiveDate,
    path: PathBuf,
    writer: BufWriter<File>,
}

pub struct CaptureWriter {
    dir: PathBuf,
    current: Option<OpenLog>,
    records_written: u64,
}

impl CaptureWriter {
    /// Creates the capture directory if needed. No file is opened until the first append.
    pub fn new<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating capture directory {}", dir.display()))?;
        Ok(Self { dir, current: None, records_written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|log| log.path.as_path())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Appends one record, rotating first if its day differs from the open file's.
    pub fn append(&mut self, record: &CaptureRecord) -> anyhow::Result<()> {
        let day = capture_day(record.timestamp);
        let log = self.log_for(day)?;

        writeln!(log.writer, "{}", record.to_line())
            .with_context(|| format!("writing capture {}", log.path.display()))?;
        log.writer
            .flush()
            .with_context(|| format!("flushing capture {}", log.path.display()))?;
        self.records_written += 1;
        Ok(())
    }

    fn log_for(&mut self, day: NaiveDate) -> anyhow::Result<&mut OpenLog> {
        let stale = self.current.as_ref().map_or(true, |log| log.day != day);
        if stale {
            if let Some(old) = self.current.take() {
                info!("Rotating capture log {} -> {}", old.day, day);
                Self::finish(old);
            }
            let path = capture_path(&self.dir, day);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening capture {}", path.display()))?;
            info!("Capturing to {}", path.display());
            self.current = Some(OpenLog { day, path, writer: BufWriter::new(file) });
        }
        self.current.as_mut().context("capture log not open")
    }

    fn finish(mut log: OpenLog) {
        if let Err(e) = log.writer.flush() {
            warn!("Failed to flush capture {}: {}", log.path.display(), e);
        }
    }

    /// Flushes and closes the open file, if any.
    pub fn close(&mut self) {
        if let Some(log) = self.current.take() {
            Self::finish(log);
        }
    }
}

impl Drop for CaptureWriter {
    fn drop(&mut self) {
        self.close();
    }
}
