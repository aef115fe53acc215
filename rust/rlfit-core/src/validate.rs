use crate::Config;

pub fn validate_config(cfg: &Config) -> Result<(), String> {
    // data
    if cfg.data.trials_path.as_os_str().is_empty() {
        return Err("data.trials_path must be non-empty".to_string());
    }
    if cfg.data.summary_path.as_os_str().is_empty() {
        return Err("data.summary_path must be non-empty".to_string());
    }
    if cfg.data.subject.trim().is_empty() {
        return Err("data.subject must be non-empty".to_string());
    }
    let cols = &cfg.data.columns;
    for (name, v) in [
        ("data.columns.subject", &cols.subject),
        ("data.columns.choice", &cols.choice),
        ("data.columns.reward", &cols.reward),
        ("data.columns.correct_option", &cols.correct_option),
    ] {
        if v.trim().is_empty() {
            return Err(format!("{name} must be non-empty"));
        }
    }

    // fit
    // The prepared table holds one subject and no participant column.
    if cfg.fit.hierarchical_levels != 1 {
        return Err("fit.hierarchical_levels must be 1 (single-subject fit)".to_string());
    }
    if cfg.fit.k < 2 {
        return Err("fit.k must be >= 2".to_string());
    }
    if !cfg.fit.initial_value_learning.is_finite() {
        return Err("fit.initial_value_learning must be finite".to_string());
    }
    if cfg.fit.n_chains < 1 {
        return Err("fit.n_chains must be >= 1".to_string());
    }
    if cfg.fit.n_iter <= cfg.fit.n_warmup {
        return Err("fit.n_iter must be > fit.n_warmup".to_string());
    }

    // python
    if let Some(exe) = cfg.python.exe.as_deref() {
        if exe.trim().is_empty() {
            return Err("python.exe must be non-empty when set".to_string());
        }
    }

    Ok(())
}
