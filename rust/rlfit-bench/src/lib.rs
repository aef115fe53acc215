//! Synthetic trial tables for the rlfit benchmarks.

use rlfit_data::{DataError, Table};

/// `subjects` subjects with `trials` trials each, interleaved.
pub fn synthetic_trials(subjects: usize, trials: usize) -> Result<Table, DataError> {
    // Simple deterministic xorshift64, no rand dependency.
    let mut x: u64 = 0x1234_5678_9ABC_DEF0;
    let mut next = move || {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        x
    };

    let headers = ["subject_id", "choice_1", "reward", "correct_option"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut rows = Vec::with_capacity(subjects * trials);
    for _ in 0..trials {
        for s in 0..subjects {
            let r = next();
            rows.push(vec![
                format!("sub{}", s + 1),
                ((r % 2) + 1).to_string(),
                ((r >> 8) % 2).to_string(),
                ((r >> 16) % 2).to_string(),
            ]);
        }
    }
    Table::new(headers, rows)
}
