use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Field delimiter of the trial-by-trial table.
pub const TRIALS_DELIMITER: u8 = b',';
/// Field delimiter of the summary-statistics table.
pub const SUMMARY_DELIMITER: u8 = b'\t';

#[derive(Debug, Error)]
pub enum DataError {
    #[error("{path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("no header row")]
    NoHeader,
    #[error("row {row} has {found} cells, header has {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// A delimited text table held as strings, header row first.
///
/// Cells are kept verbatim; typing happens where a column is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Every row must have one cell per header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, DataError> {
        if let Some((i, r)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != headers.len())
        {
            return Err(DataError::RowWidth {
                row: i + 1,
                expected: headers.len(),
                found: r.len(),
            });
        }
        Ok(Self { headers, rows })
    }

    pub fn read_delimited(path: impl AsRef<Path>, delimiter: u8) -> Result<Self, DataError> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|source| DataError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(f, delimiter)
    }

    /// Parse a table from any reader. Ragged rows are an error.
    pub fn from_reader<R: Read>(r: R, delimiter: u8) -> Result<Self, DataError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(r);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(DataError::NoHeader);
        }

        let mut rows = Vec::new();
        for rec in rdr.records() {
            let rec = rec?;
            rows.push(rec.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of one column, top to bottom.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a str> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| r[idx].as_str()))
    }

    /// Last `n` rows (fewer if the table is shorter).
    pub fn tail(&self, n: usize) -> &[Vec<String>] {
        let start = self.rows.len().saturating_sub(n);
        &self.rows[start..]
    }

    /// New table with the same header and the rows for which `keep` is true, order preserved.
    pub fn filter_rows(&self, mut keep: impl FnMut(&[String]) -> bool) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}

/// Load the comma-separated trial table.
pub fn read_trials(path: impl AsRef<Path>) -> Result<Table, DataError> {
    Table::read_delimited(path, TRIALS_DELIMITER)
}

/// Load the tab-separated summary table.
pub fn read_summary(path: impl AsRef<Path>) -> Result<Table, DataError> {
    Table::read_delimited(path, SUMMARY_DELIMITER)
}
