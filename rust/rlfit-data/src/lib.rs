//! rlfit-data: trial tables and single-subject preparation for rlssm.

pub mod prepare;
pub mod table;

pub use prepare::{
    derive, prepare, select_subject, ModelRow, ModelTable, PrepareError, PrepareWarning, Prepared,
    BLOCK_LABEL, MODEL_COLUMNS,
};
pub use table::{read_summary, read_trials, DataError, Table};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
