//! rlssm via a Python subprocess.
//!
//! Exchange is file-based through a private temp dir: the prepared table as
//! CSV, the request as JSON, and the fit summary written back as text.
//! stdout is inherited; stderr is relayed line by line and its tail kept for
//! error reports.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Instant;

use rlfit_core::PythonConfig;
use rlfit_data::ModelTable;

use crate::backend::{FitRequest, FitResult, ModelBackend, ModelError};

/// Driver script shipped with the binary.
pub const EMBEDDED_DRIVER: &str = include_str!("../../../python/rlssm_fit.py");

/// Env var consulted when no interpreter is configured.
pub const PYTHON_ENV: &str = "RLFIT_PYTHON";

const DEFAULT_PYTHON: &str = "python3";
const STDERR_TAIL_BYTES: usize = 8 * 1024;

/// Configured interpreter, else `$RLFIT_PYTHON`, else `python3`.
pub fn resolve_python(configured: Option<&str>) -> String {
    if let Some(exe) = configured {
        return exe.to_string();
    }
    match std::env::var(PYTHON_ENV) {
        Ok(s) if !s.trim().is_empty() => s,
        _ => DEFAULT_PYTHON.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct PythonBackend {
    exe: String,
    driver: Option<PathBuf>,
}

impl PythonBackend {
    pub fn new(exe: impl Into<String>) -> Self {
        Self {
            exe: exe.into(),
            driver: None,
        }
    }

    pub fn from_config(cfg: &PythonConfig) -> Self {
        Self {
            exe: resolve_python(cfg.exe.as_deref()),
            driver: cfg.driver.clone(),
        }
    }

    /// Run `path` instead of the embedded driver.
    pub fn with_driver(mut self, path: impl Into<PathBuf>) -> Self {
        self.driver = Some(path.into());
        self
    }

    pub fn exe(&self) -> &str {
        &self.exe
    }

    fn driver_path(&self, work: &Path) -> Result<PathBuf, ModelError> {
        if let Some(p) = &self.driver {
            return Ok(p.clone());
        }
        let p = work.join("rlssm_fit.py");
        fs::write(&p, EMBEDDED_DRIVER)?;
        Ok(p)
    }
}

impl ModelBackend for PythonBackend {
    fn name(&self) -> &str {
        "rlssm-python"
    }

    fn fit(&self, data: &ModelTable, req: &FitRequest) -> Result<FitResult, ModelError> {
        if data.is_empty() {
            return Err(ModelError::EmptyData);
        }

        let work = tempfile::Builder::new().prefix("rlfit-").tempdir()?;
        let data_path = work.path().join("data.csv");
        let req_path = work.path().join("request.json");
        let out_path = work.path().join("summary.txt");

        data.write_csv(File::create(&data_path)?)?;
        fs::write(&req_path, serde_json::to_vec_pretty(req)?)?;
        let driver = self.driver_path(work.path())?;

        tracing::info!(
            python = %self.exe,
            trials = data.len(),
            chains = req.n_chains,
            iter = req.n_iter,
            warmup = req.n_warmup,
            "starting rlssm fit"
        );

        let t0 = Instant::now();
        let mut child = Command::new(&self.exe)
            .arg(&driver)
            .arg("--data")
            .arg(&data_path)
            .arg("--request")
            .arg(&req_path)
            .arg("--out")
            .arg(&out_path)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ModelError::Spawn {
                program: self.exe.clone(),
                source,
            })?;

        let stderr = child.stderr.take();
        let (status, tail) = relay_and_wait(&mut child, stderr, STDERR_TAIL_BYTES)?;
        let elapsed = t0.elapsed();

        if !status.success() {
            let t = tail.trim();
            return Err(ModelError::Failed {
                status,
                stderr_tail: (!t.is_empty()).then(|| t.to_string()),
            });
        }

        let summary = match fs::read_to_string(&out_path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ModelError::MissingSummary)
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(elapsed_s = elapsed.as_secs_f64(), "rlssm fit finished");
        Ok(FitResult {
            backend: self.name().to_string(),
            summary,
            elapsed,
        })
    }
}

/// Relay `stderr` to our own stderr, then reap `child` whether or not the
/// relay succeeded.
pub(crate) fn relay_and_wait<R: std::io::Read>(
    child: &mut Child,
    stderr: Option<R>,
    max_bytes: usize,
) -> Result<(ExitStatus, String), ModelError> {
    let relayed = match stderr {
        Some(err) => relay_stderr(err, &mut std::io::stderr(), max_bytes),
        None => Ok(String::new()),
    };
    let status = child.wait()?;
    Ok((status, relayed?))
}

/// Copy `src` to `sink` line by line, returning the last `max_bytes` seen.
pub(crate) fn relay_stderr<R: std::io::Read, W: Write>(
    src: R,
    sink: &mut W,
    max_bytes: usize,
) -> Result<String, ModelError> {
    let mut rd = BufReader::new(src);
    let mut tail: VecDeque<u8> = VecDeque::with_capacity(max_bytes);
    let mut line = Vec::new();
    loop {
        line.clear();
        if rd.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        // A closed terminal must not fail the fit.
        let _ = sink.write_all(&line);
        for &b in &line {
            if tail.len() == max_bytes {
                tail.pop_front();
            }
            tail.push_back(b);
        }
    }
    let _ = sink.flush();
    let bytes: Vec<u8> = tail.into_iter().collect();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
