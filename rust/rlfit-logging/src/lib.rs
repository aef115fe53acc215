//! rlfit-logging: NDJSON run events + tracing setup.
//!
//! Human-facing diagnostics go through `tracing` on stderr. The optional
//! event file is append-only NDJSON, one object per pipeline step.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Event schema version, carried in every event as `v`.
pub const EVENT_SCHEMA_VERSION: u32 = 1;

/// Install a stderr `fmt` subscriber at `level`. Safe to call more than once.
pub fn init_tracing(level: tracing::Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

pub fn now_ms() -> u64 {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    d.as_millis() as u64
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// blake3 of a file's contents, streamed.
pub fn hash_file(path: impl AsRef<Path>) -> io::Result<String> {
    let mut h = blake3::Hasher::new();
    let mut f = File::open(path)?;
    io::copy(&mut f, &mut h)?;
    Ok(h.finalize().to_hex().to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct InputFileV1 {
    pub path: String,
    pub rows: u64,
    pub blake3: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputsLoadedEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub v: u32,

    pub trials: InputFileV1,
    pub summary: InputFileV1,
}

impl InputsLoadedEventV1 {
    pub fn new(trials: InputFileV1, summary: InputFileV1) -> Self {
        Self {
            event: "inputs_loaded",
            ts_ms: now_ms(),
            v: EVENT_SCHEMA_VERSION,
            trials,
            summary,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreparedEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub v: u32,

    pub subject: String,
    pub trials: u64,
    pub f_cor_sum: u64,
    pub f_inc_sum: u64,
    pub warnings: Vec<String>,
}

impl PreparedEventV1 {
    pub fn new(
        subject: impl Into<String>,
        trials: u64,
        f_cor_sum: u64,
        f_inc_sum: u64,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            event: "prepared",
            ts_ms: now_ms(),
            v: EVENT_SCHEMA_VERSION,
            subject: subject.into(),
            trials,
            f_cor_sum,
            f_inc_sum,
            warnings,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FitFinishedEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub v: u32,

    pub subject: String,
    pub backend: String,
    pub ok: bool,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl FitFinishedEventV1 {
    pub fn new(
        subject: impl Into<String>,
        backend: impl Into<String>,
        elapsed_ms: u64,
        error: Option<String>,
    ) -> Self {
        Self {
            event: "fit_finished",
            ts_ms: now_ms(),
            v: EVENT_SCHEMA_VERSION,
            subject: subject.into(),
            backend: backend.into(),
            ok: error.is_none(),
            elapsed_ms,
            error,
        }
    }
}

#[derive(Debug)]
pub enum NdjsonError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for NdjsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NdjsonError::Io(e) => write!(f, "io: {e}"),
            NdjsonError::Json(e) => write!(f, "json: {e}"),
        }
    }
}

impl std::error::Error for NdjsonError {}

impl From<io::Error> for NdjsonError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for NdjsonError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Append-only NDJSON writer.
///
/// Contract: each call writes exactly one JSON object followed by a newline.
pub struct NdjsonWriter {
    w: BufWriter<File>,
    lines_since_flush: u64,
    flush_every_lines: u64,
}

impl NdjsonWriter {
    /// Open a file for append. Creates it if it doesn't exist.
    pub fn open_append(path: impl AsRef<Path>) -> Result<Self, NdjsonError> {
        Self::open_append_with_flush(path, 0)
    }

    /// `flush_every_lines=0` disables periodic flushing.
    pub fn open_append_with_flush(
        path: impl AsRef<Path>,
        flush_every_lines: u64,
    ) -> Result<Self, NdjsonError> {
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            w: BufWriter::new(f),
            lines_since_flush: 0,
            flush_every_lines,
        })
    }

    pub fn write_event<T: Serialize>(&mut self, event: &T) -> Result<(), NdjsonError> {
        let mut buf = serde_json::to_vec(event)?;
        buf.push(b'\n');
        self.w.write_all(&buf)?;
        self.lines_since_flush += 1;
        if self.flush_every_lines > 0 && self.lines_since_flush >= self.flush_every_lines {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), NdjsonError> {
        self.w.flush()?;
        self.lines_since_flush = 0;
        Ok(())
    }
}

impl Drop for NdjsonWriter {
    fn drop(&mut self) {
        let _ = self.w.flush();
    }
}
