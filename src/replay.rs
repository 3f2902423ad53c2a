//! Reads capture logs back and hands each record to a callback.

use anyhow::{bail, Context};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::capture::{CaptureRecord, CAPTURE_EXTENSION};
use crate::config::DEFAULT_PORT;

/// Source address reported for replayed datagrams.
pub const REPLAY_SOURCE: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT);

/// Parses one capture line: exactly one tab between a float timestamp and hex payload.
pub fn parse_record(line: &str) -> anyhow::Result<CaptureRecord> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 2 {
        bail!("expected 2 tab-separated fields, found {}", fields.len());
    }
    let timestamp: f64 = fields[0]
        .trim()
        .parse()
        .with_context(|| format!("invalid timestamp {:?}", fields[0]))?;
    if !timestamp.is_finite() {
        bail!("invalid timestamp {:?}", fields[0]);
    }
    let payload = hex::decode(fields[1].trim()).context("invalid hex payload")?;
    Ok(CaptureRecord::new(timestamp, payload))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaySource {
    File(PathBuf),
    Directory(PathBuf),
    Stdin,
}

impl ReplaySource {
    /// `-` is standard input, a directory replays every log inside it, anything else is a file.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            return ReplaySource::Stdin;
        }
        let path = PathBuf::from(arg);
        if path.is_dir() {
            ReplaySource::Directory(path)
        } else {
            ReplaySource::File(path)
        }
    }
}

/// Capture logs in `dir`, sorted by file name.
pub fn capture_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading replay directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == CAPTURE_EXTENSION) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub files: usize,
    pub records: u64,
    pub skipped: u64,
    /// Files in a directory replay that could not be opened or read through.
    pub failed_files: usize,
    pub diagnostics: Vec<String>,
}

pub struct Replayer {
    running: Arc<AtomicBool>,
}

impl Default for Replayer {
    fn default() -> Self {
        Self::new(Arc::new(AtomicBool::new(true)))
    }
}

impl Replayer {
    /// `running` is checked before each line; clearing it stops the replay.
    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self { running }
    }

    pub fn replay<F>(&self, source: &ReplaySource, mut on_record: F) -> anyhow::Result<ReplaySummary>
    where
        F: FnMut(CaptureRecord),
    {
        let mut summary = ReplaySummary::default();
        match source {
            ReplaySource::File(path) => {
                self.replay_file(path, &mut summary, &mut on_record)?;
            }
            ReplaySource::Directory(dir) => {
                let files = capture_files(dir)?;
                info!("Replaying {} capture files from {}", files.len(), dir.display());
                for path in files {
                    if !self.running.load(Ordering::Relaxed) {
                        break;
                    }
                    if let Err(e) = self.replay_file(&path, &mut summary, &mut on_record) {
                        let diagnostic = format!("{}: {:#}; moving to next file", path.display(), e);
                        warn!("{}", diagnostic);
                        summary.failed_files += 1;
                        summary.diagnostics.push(diagnostic);
                    }
                }
            }
            ReplaySource::Stdin => {
                let stdin = io::stdin();
                summary.files += 1;
                self.replay_lines(stdin.lock(), "<stdin>", &mut summary, &mut on_record)?;
            }
        }
        Ok(summary)
    }

    fn replay_file<F>(&self, path: &Path, summary: &mut ReplaySummary, on_record: &mut F) -> anyhow::Result<()>
    where
        F: FnMut(CaptureRecord),
    {
        let file = File::open(path).with_context(|| format!("opening replay file {}", path.display()))?;
        info!("Replaying {}", path.display());
        summary.files += 1;
        self.replay_lines(BufReader::new(file), &path.display().to_string(), summary, on_record)
    }

    /// Feeds every well-formed line to `on_record`; malformed lines are counted and skipped.
    pub fn replay_lines<R, F>(
        &self,
        reader: R,
        origin: &str,
        summary: &mut ReplaySummary,
        on_record: &mut F,
    ) -> anyhow::Result<()>
    where
        R: BufRead,
        F: FnMut(CaptureRecord),
    {
        for (i, line) in reader.split(b'\n').enumerate() {
            if !self.running.load(Ordering::Relaxed) {
                info!("Replay stopped at {}:{}", origin, i + 1);
                break;
            }
            let bytes = line.with_context(|| format!("reading {}", origin))?;
            let line = String::from_utf8_lossy(&bytes);
            if line.trim().is_empty() {
                continue;
            }
            match parse_record(&line) {
                Ok(record) => {
                    summary.records += 1;
                    on_record(record);
                }
                Err(e) => {
                    let diagnostic = format!("{}:{}: skipped malformed record: {:#}", origin, i + 1, e);
                    warn!("{}", diagnostic);
                    summary.skipped += 1;
                    summary.diagnostics.push(diagnostic);
                }
            }
        }
        Ok(())
    }
}
