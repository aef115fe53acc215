//! Load → prepare → fit, with optional NDJSON events.

use std::io::Write;
use std::path::Path;
use std::time::Instant;

use rlfit_core::{Config, ConfigError, DataConfig};
use rlfit_data::{DataError, PrepareError, Prepared, Table};
use rlfit_logging::{
    FitFinishedEventV1, InputFileV1, InputsLoadedEventV1, NdjsonError, NdjsonWriter,
    PreparedEventV1,
};
use rlfit_model::{FitRequest, FitResult, ModelBackend, ModelError};
use thiserror::Error;

/// Rows of the summary table echoed at debug level.
const SUMMARY_TAIL_ROWS: usize = 5;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Data(#[from] DataError),
    #[error("{0}")]
    Prepare(#[from] PrepareError),
    #[error("{0}")]
    Model(#[from] ModelError),
    #[error("event log: {0}")]
    Events(#[from] NdjsonError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Inputs {
    pub trials: Table,
    pub summary: Table,
}

pub fn load_inputs(cfg: &DataConfig) -> Result<Inputs, RunError> {
    let trials = rlfit_data::read_trials(&cfg.trials_path)?;
    let summary = rlfit_data::read_summary(&cfg.summary_path)?;
    tracing::info!(
        trials = trials.len(),
        summary = summary.len(),
        "loaded input tables"
    );
    for row in summary.tail(SUMMARY_TAIL_ROWS) {
        tracing::debug!(row = %row.join("\t"), "summary tail");
    }
    Ok(Inputs { trials, summary })
}

fn input_file(path: &Path, rows: usize) -> InputFileV1 {
    InputFileV1 {
        path: path.display().to_string(),
        rows: rows as u64,
        blake3: rlfit_logging::hash_file(path).ok(),
    }
}

/// Validate the config, load both tables, log `inputs_loaded`.
fn load_logged(cfg: &Config, events: Option<&mut NdjsonWriter>) -> Result<Inputs, RunError> {
    rlfit_core::validate_config(cfg).map_err(RunError::InvalidConfig)?;

    let inputs = load_inputs(&cfg.data)?;
    if let Some(ev) = events {
        ev.write_event(&InputsLoadedEventV1::new(
            input_file(&cfg.data.trials_path, inputs.trials.len()),
            input_file(&cfg.data.summary_path, inputs.summary.len()),
        ))?;
    }
    Ok(inputs)
}

fn prepare_logged(
    cfg: &Config,
    inputs: &Inputs,
    events: Option<&mut NdjsonWriter>,
) -> Result<Prepared, RunError> {
    let prepared = rlfit_data::prepare(&inputs.trials, &cfg.data)?;
    if let Some(ev) = events {
        ev.write_event(&PreparedEventV1::new(
            prepared.subject.clone(),
            prepared.table.len() as u64,
            prepared.table.f_cor_sum(),
            prepared.table.f_inc_sum(),
            prepared.warnings.iter().map(ToString::to_string).collect(),
        ))?;
    }
    Ok(prepared)
}

/// Load both tables and prepare the configured subject.
pub fn run_prepare(
    cfg: &Config,
    mut events: Option<&mut NdjsonWriter>,
) -> Result<(Inputs, Prepared), RunError> {
    let inputs = load_logged(cfg, events.as_deref_mut())?;
    let prepared = prepare_logged(cfg, &inputs, events)?;
    Ok((inputs, prepared))
}

/// Full run: print row counts, fit, print the fit summary.
pub fn run_fit<W: Write>(
    cfg: &Config,
    backend: &dyn ModelBackend,
    mut events: Option<&mut NdjsonWriter>,
    out: &mut W,
) -> Result<FitResult, RunError> {
    let inputs = load_logged(cfg, events.as_deref_mut())?;
    writeln!(out, "Number of rows in trial table: {}", inputs.trials.len())?;
    writeln!(out, "Number of rows in summary table: {}", inputs.summary.len())?;

    let prepared = prepare_logged(cfg, &inputs, events.as_deref_mut())?;
    writeln!(
        out,
        "Trials for subject {}: {}",
        prepared.subject,
        prepared.table.len()
    )?;

    let req = FitRequest::from(&cfg.fit);
    let t0 = Instant::now();
    let res = backend.fit(&prepared.table, &req);
    let elapsed_ms = t0.elapsed().as_millis() as u64;

    if let Some(ev) = events {
        ev.write_event(&FitFinishedEventV1::new(
            prepared.subject.clone(),
            backend.name(),
            elapsed_ms,
            res.as_ref().err().map(ToString::to_string),
        ))?;
        ev.flush()?;
    }

    let fit = res?;
    writeln!(out, "{fit}")?;
    Ok(fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::time::Duration;

    use rlfit_data::ModelTable;
    use serde_json::Value;

    /// Records what it was asked to fit.
    #[derive(Default)]
    struct RecordingBackend {
        calls: RefCell<Vec<(ModelTable, FitRequest)>>,
        fail: bool,
    }

    impl ModelBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        fn fit(&self, data: &ModelTable, req: &FitRequest) -> Result<FitResult, ModelError> {
            self.calls.borrow_mut().push((data.clone(), req.clone()));
            if self.fail {
                return Err(ModelError::MissingSummary);
            }
            Ok(FitResult {
                backend: self.name().to_string(),
                summary: format!("fitted {} trials\n", data.len()),
                elapsed: Duration::from_millis(1),
            })
        }
    }

    fn setup(trials_csv: &str) -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let trials = dir.path().join("trials.csv");
        let summary = dir.path().join("summary.txt");
        fs::write(&trials, trials_csv).unwrap();
        fs::write(&summary, "subject_id\tacc\nsub1\t0.7\nsub2\t0.6\nsub3\t0.9\n").unwrap();
        let mut cfg = Config::default();
        cfg.data.trials_path = trials;
        cfg.data.summary_path = summary;
        (dir, cfg)
    }

    const TRIALS: &str = "\
subject_id,choice_1,reward,correct_option
sub1,1,1,1
sub1,2,0,1
sub2,1,1,0
sub1,1,1,1
";

    #[test]
    fn fit_prints_counts_and_summary() {
        let (_dir, cfg) = setup(TRIALS);
        let backend = RecordingBackend::default();
        let mut out = Vec::new();
        let res = run_fit(&cfg, &backend, None, &mut out).unwrap();
        assert_eq!(res.summary, "fitted 3 trials\n");

        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("Number of rows in trial table: 4"), "{s}");
        assert!(s.contains("Number of rows in summary table: 3"), "{s}");
        assert!(s.contains("Trials for subject sub1: 3"), "{s}");
        assert!(s.trim_end().ends_with("fitted 3 trials"), "{s}");

        let calls = backend.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, FitRequest::from(&cfg.fit));
        assert_eq!(calls[0].0.f_cor_sum(), 2);
    }

    #[test]
    fn invalid_reward_never_reaches_the_model() {
        let (_dir, cfg) = setup("subject_id,choice_1,reward\nsub1,1,1\nsub1,2,3\n");
        let backend = RecordingBackend::default();
        let mut out = Vec::new();
        let err = run_fit(&cfg, &backend, None, &mut out).unwrap_err();
        assert!(matches!(
            err,
            RunError::Prepare(PrepareError::InvalidReward { .. })
        ));
        assert!(backend.calls.borrow().is_empty());
    }

    #[test]
    fn missing_correct_option_still_fits() {
        let (_dir, cfg) = setup("subject_id,choice_1,reward\nsub1,1,1\nsub1,2,0\n");
        let backend = RecordingBackend::default();
        let mut out = Vec::new();
        run_fit(&cfg, &backend, None, &mut out).unwrap();

        let calls = backend.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0]
            .0
            .rows()
            .iter()
            .all(|r| r.cor_option.is_none() && r.inc_option.is_none()));
    }

    #[test]
    fn invalid_config_stops_before_loading() {
        let mut cfg = Config::default();
        cfg.data.trials_path = "/nonexistent/trials.csv".into();
        cfg.fit.n_warmup = cfg.fit.n_iter;
        let backend = RecordingBackend::default();
        let err = run_fit(&cfg, &backend, None, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, RunError::InvalidConfig(_)));
    }

    #[test]
    fn missing_summary_file_is_a_data_error() {
        let (_dir, mut cfg) = setup(TRIALS);
        cfg.data.summary_path = "/nonexistent/summary.txt".into();
        let backend = RecordingBackend::default();
        let err = run_fit(&cfg, &backend, None, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, RunError::Data(DataError::Open { .. })));
        assert!(backend.calls.borrow().is_empty());
    }

    #[test]
    fn events_cover_each_step() {
        let (dir, cfg) = setup("subject_id,choice_1,reward\nsub1,1,1\nsub1,2,0\n");
        let path = dir.path().join("events.ndjson");
        let backend = RecordingBackend::default();
        {
            let mut ev = NdjsonWriter::open_append(&path).unwrap();
            run_fit(&cfg, &backend, Some(&mut ev), &mut Vec::new()).unwrap();
        }

        let vals: Vec<Value> = fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let kinds: Vec<&str> = vals.iter().map(|v| v["event"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["inputs_loaded", "prepared", "fit_finished"]);
        assert_eq!(vals[0]["trials"]["rows"], 2);
        assert!(vals[0]["trials"]["blake3"].is_string());
        assert_eq!(vals[1]["f_cor_sum"], 1);
        assert_eq!(vals[1]["warnings"].as_array().unwrap().len(), 1);
        assert_eq!(vals[2]["ok"], true);
        assert_eq!(vals[2]["backend"], "recording");
    }

    #[test]
    fn failed_fit_is_logged_then_returned() {
        let (dir, cfg) = setup(TRIALS);
        let path = dir.path().join("events.ndjson");
        let backend = RecordingBackend {
            fail: true,
            ..Default::default()
        };
        let err = {
            let mut ev = NdjsonWriter::open_append(&path).unwrap();
            run_fit(&cfg, &backend, Some(&mut ev), &mut Vec::new()).unwrap_err()
        };
        assert!(matches!(err, RunError::Model(ModelError::MissingSummary)));

        let last = fs::read_to_string(&path).unwrap();
        let last: Value = serde_json::from_str(last.lines().last().unwrap()).unwrap();
        assert_eq!(last["event"], "fit_finished");
        assert_eq!(last["ok"], false);
    }
}
