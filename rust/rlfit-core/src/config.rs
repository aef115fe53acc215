//! Configuration schema for rlfit.
//!
//! One YAML file describes where the experiment data lives, which subject to
//! fit, and the hyperparameters handed to the rlssm model. Every section has
//! defaults, so a partial file (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Input files and subject selection.
    #[serde(default)]
    pub data: DataConfig,
    /// Model hyperparameters and MCMC controls.
    #[serde(default)]
    pub fit: FitConfig,
    /// Python interpreter used to run the rlssm driver.
    #[serde(default)]
    pub python: PythonConfig,
}

/// Input data configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// Trial-by-trial table (comma-separated).
    #[serde(default = "default_trials_path")]
    pub trials_path: PathBuf,
    /// Per-subject summary statistics (tab-separated). Loaded and counted only.
    #[serde(default = "default_summary_path")]
    pub summary_path: PathBuf,
    /// Subject identifier to select from the trial table.
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Input column names.
    #[serde(default)]
    pub columns: ColumnsConfig,
}

fn default_trials_path() -> PathBuf {
    PathBuf::from("online_data_for_matlab.txt")
}

fn default_summary_path() -> PathBuf {
    PathBuf::from("summary_stats_subs.txt")
}

fn default_subject() -> String {
    "sub1".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            trials_path: default_trials_path(),
            summary_path: default_summary_path(),
            subject: default_subject(),
            columns: ColumnsConfig::default(),
        }
    }
}

/// Names of the input columns in the trial table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnsConfig {
    #[serde(default = "default_col_subject")]
    pub subject: String,
    #[serde(default = "default_col_choice")]
    pub choice: String,
    #[serde(default = "default_col_reward")]
    pub reward: String,
    /// Optional column; when absent the option identifiers are left missing.
    #[serde(default = "default_col_correct_option")]
    pub correct_option: String,
}

fn default_col_subject() -> String {
    "subject_id".to_string()
}

fn default_col_choice() -> String {
    "choice_1".to_string()
}

fn default_col_reward() -> String {
    "reward".to_string()
}

fn default_col_correct_option() -> String {
    "correct_option".to_string()
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            subject: default_col_subject(),
            choice: default_col_choice(),
            reward: default_col_reward(),
            correct_option: default_col_correct_option(),
        }
    }
}

/// rlssm `RLModel_2A` construction + `fit()` arguments.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FitConfig {
    /// Hierarchy depth passed to the model constructor (1 = single subject).
    #[serde(default = "default_hierarchical_levels")]
    pub hierarchical_levels: u32,
    /// Number of options per trial.
    #[serde(default = "default_k")]
    pub k: u32,
    /// Initial Q-value for every option.
    #[serde(default = "default_initial_value_learning")]
    pub initial_value_learning: f64,
    #[serde(default = "default_n_chains")]
    pub n_chains: u32,
    #[serde(default = "default_n_iter")]
    pub n_iter: u32,
    #[serde(default = "default_n_warmup")]
    pub n_warmup: u32,
    /// Ask the library to print its sampler diagnostics after fitting.
    #[serde(default = "default_print_diagnostics")]
    pub print_diagnostics: bool,
}

fn default_hierarchical_levels() -> u32 {
    1
}

fn default_k() -> u32 {
    2
}

fn default_initial_value_learning() -> f64 {
    0.5
}

fn default_n_chains() -> u32 {
    2
}

fn default_n_iter() -> u32 {
    1000
}

fn default_n_warmup() -> u32 {
    500
}

fn default_print_diagnostics() -> bool {
    true
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            hierarchical_levels: default_hierarchical_levels(),
            k: default_k(),
            initial_value_learning: default_initial_value_learning(),
            n_chains: default_n_chains(),
            n_iter: default_n_iter(),
            n_warmup: default_n_warmup(),
            print_diagnostics: default_print_diagnostics(),
        }
    }
}

/// Python subprocess settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PythonConfig {
    /// Interpreter to run. If None, `RLFIT_PYTHON` is consulted, then `python3`.
    #[serde(default)]
    pub exe: Option<String>,
    /// Replace the embedded driver script with a file on disk.
    #[serde(default)]
    pub driver: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
