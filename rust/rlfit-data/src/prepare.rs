//! Single-subject preparation: select, derive, validate, project.
//!
//! The output column set is what rlssm's `RLModel_2A.fit` reads from its
//! `data` frame: `choice, reward, block_label, trial_block, f_cor, f_inc,
//! cor_option, inc_option`.

use std::fmt;
use std::io::Write;

use rlfit_core::{ColumnsConfig, DataConfig};
use serde::Serialize;
use thiserror::Error;

use crate::table::{DataError, Table};

/// Only one experimental block is modeled.
pub const BLOCK_LABEL: u32 = 1;

/// Output columns, in order.
pub const MODEL_COLUMNS: [&str; 8] = [
    "choice",
    "reward",
    "block_label",
    "trial_block",
    "f_cor",
    "f_inc",
    "cor_option",
    "inc_option",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrepareError {
    #[error("the column '{0}' is missing in the trial table")]
    MissingColumn(String),
    #[error("no trials for subject '{0}'")]
    NoTrialsForSubject(String),
    #[error("the '{column}' column contains values other than 0 and 1 (trial {trial}: {value:?})")]
    InvalidReward {
        column: String,
        trial: u32,
        value: String,
    },
    #[error("the '{column}' column must hold integer option ids (trial {trial}: {value:?})")]
    InvalidOption {
        column: String,
        trial: u32,
        value: String,
    },
}

/// Non-fatal conditions hit while preparing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepareWarning {
    /// `cor_option`/`inc_option` were left missing for every trial.
    MissingCorrectOption { column: String },
}

impl fmt::Display for PrepareWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrepareWarning::MissingCorrectOption { column } => write!(
                f,
                "the column '{column}' is missing; setting 'cor_option' and 'inc_option' to missing"
            ),
        }
    }
}

/// One trial in the shape the model expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRow {
    pub choice: String,
    pub reward: u8,
    pub block_label: u32,
    pub trial_block: u32,
    pub f_cor: u8,
    pub f_inc: u8,
    pub cor_option: Option<i64>,
    pub inc_option: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelTable {
    rows: Vec<ModelRow>,
}

impl ModelTable {
    pub fn new(rows: Vec<ModelRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ModelRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn f_cor_sum(&self) -> u64 {
        self.rows.iter().map(|r| r.f_cor as u64).sum()
    }

    pub fn f_inc_sum(&self) -> u64 {
        self.rows.iter().map(|r| r.f_inc as u64).sum()
    }

    /// Write as CSV with a header row. Missing option ids become empty cells.
    pub fn write_csv<W: Write>(&self, w: W) -> Result<(), DataError> {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(w);
        wtr.write_record(MODEL_COLUMNS)?;
        for r in &self.rows {
            wtr.serialize(r)?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, DataError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Result of preparing one subject.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub subject: String,
    pub table: ModelTable,
    pub warnings: Vec<PrepareWarning>,
}

/// Keep only the rows whose `column` equals `subject`.
pub fn select_subject(table: &Table, column: &str, subject: &str) -> Result<Table, PrepareError> {
    let idx = table
        .column_index(column)
        .ok_or_else(|| PrepareError::MissingColumn(column.to_string()))?;
    let out = table.filter_rows(|r| r[idx] == subject);
    if out.is_empty() {
        return Err(PrepareError::NoTrialsForSubject(subject.to_string()));
    }
    Ok(out)
}

/// Derive the model columns from one subject's rows.
///
/// Every reward is validated before any row is built.
pub fn derive(
    rows: &Table,
    cols: &ColumnsConfig,
) -> Result<(ModelTable, Vec<PrepareWarning>), PrepareError> {
    let choice_idx = rows
        .column_index(&cols.choice)
        .ok_or_else(|| PrepareError::MissingColumn(cols.choice.clone()))?;
    let reward_idx = rows
        .column_index(&cols.reward)
        .ok_or_else(|| PrepareError::MissingColumn(cols.reward.clone()))?;
    let correct_idx = rows.column_index(&cols.correct_option);

    let rewards = rows
        .rows()
        .iter()
        .zip(1u32..)
        .map(|(r, trial)| {
            parse_reward(&r[reward_idx]).ok_or_else(|| PrepareError::InvalidReward {
                column: cols.reward.clone(),
                trial,
                value: r[reward_idx].clone(),
            })
        })
        .collect::<Result<Vec<u8>, _>>()?;

    let mut warnings = Vec::new();
    if correct_idx.is_none() {
        let w = PrepareWarning::MissingCorrectOption {
            column: cols.correct_option.clone(),
        };
        tracing::warn!("{w}");
        warnings.push(w);
    }

    let mut out = Vec::with_capacity(rows.len());
    for ((r, reward), trial_block) in rows.rows().iter().zip(rewards).zip(1u32..) {
        let (cor_option, inc_option) = match correct_idx {
            Some(i) => {
                let invalid = || PrepareError::InvalidOption {
                    column: cols.correct_option.clone(),
                    trial: trial_block,
                    value: r[i].clone(),
                };
                let cor = parse_option(&r[i]).ok_or_else(invalid)?;
                // inc_option = 1 - cor_option has to fit in an i64.
                let inc = cor
                    .map(|c| 1i64.checked_sub(c).ok_or_else(invalid))
                    .transpose()?;
                (cor, inc)
            }
            None => (None, None),
        };
        out.push(ModelRow {
            choice: r[choice_idx].clone(),
            reward,
            block_label: BLOCK_LABEL,
            trial_block,
            f_cor: (reward == 1) as u8,
            f_inc: (reward == 0) as u8,
            cor_option,
            inc_option,
        });
    }

    Ok((ModelTable::new(out), warnings))
}

/// Select `cfg.subject` from the trial table and derive its model table.
pub fn prepare(trials: &Table, cfg: &DataConfig) -> Result<Prepared, PrepareError> {
    let rows = select_subject(trials, &cfg.columns.subject, &cfg.subject)?;
    let (table, warnings) = derive(&rows, &cfg.columns)?;
    tracing::debug!(
        subject = %cfg.subject,
        trials = table.len(),
        f_cor = table.f_cor_sum(),
        f_inc = table.f_inc_sum(),
        "prepared subject"
    );
    Ok(Prepared {
        subject: cfg.subject.clone(),
        table,
        warnings,
    })
}

/// 0/1 coded reward; `1.0`-style floats are accepted.
fn parse_reward(cell: &str) -> Option<u8> {
    let v: f64 = cell.trim().parse().ok()?;
    if v == 0.0 {
        Some(0)
    } else if v == 1.0 {
        Some(1)
    } else {
        None
    }
}

/// Integer option id. `Some(None)` for an empty cell, `None` if unparseable.
fn parse_option(cell: &str) -> Option<Option<i64>> {
    let s = cell.trim();
    if s.is_empty() {
        return Some(None);
    }
    if let Ok(v) = s.parse::<i64>() {
        return Some(Some(v));
    }
    let v: f64 = s.parse().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(Some(v as i64))
    } else {
        None
    }
}
