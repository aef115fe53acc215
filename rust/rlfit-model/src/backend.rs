use std::fmt;
use std::process::ExitStatus;
use std::time::Duration;

use rlfit_core::FitConfig;
use rlfit_data::{DataError, ModelTable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("data: {0}")]
    Data(#[from] DataError),
    #[error("refusing to fit an empty table")]
    EmptyData,
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("rlssm driver failed: {status}{}", stderr_suffix(.stderr_tail))]
    Failed {
        status: ExitStatus,
        stderr_tail: Option<String>,
    },
    #[error("rlssm driver exited successfully but wrote no fit summary")]
    MissingSummary,
}

fn stderr_suffix(tail: &Option<String>) -> String {
    match tail {
        Some(t) => format!("\n--- driver_stderr_tail ---\n{t}"),
        None => String::new(),
    }
}

/// Constructor + `fit()` arguments for `RLModel_2A`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRequest {
    pub hierarchical_levels: u32,
    pub k: u32,
    pub initial_value_learning: f64,
    pub n_chains: u32,
    pub n_iter: u32,
    pub n_warmup: u32,
    pub print_diagnostics: bool,
}

impl From<&FitConfig> for FitRequest {
    fn from(c: &FitConfig) -> Self {
        Self {
            hierarchical_levels: c.hierarchical_levels,
            k: c.k,
            initial_value_learning: c.initial_value_learning,
            n_chains: c.n_chains,
            n_iter: c.n_iter,
            n_warmup: c.n_warmup,
            print_diagnostics: c.print_diagnostics,
        }
    }
}

/// What a backend hands back: the library's own textual rendering of the fit.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub backend: String,
    pub summary: String,
    pub elapsed: Duration,
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.summary.trim_end())
    }
}

/// The external model. Implementations own the sampler; callers own the data.
pub trait ModelBackend {
    /// Short identifier used in logs and events.
    fn name(&self) -> &str;

    fn fit(&self, data: &ModelTable, req: &FitRequest) -> Result<FitResult, ModelError>;
}
