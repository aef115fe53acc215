//! rlfit: prepare one subject's trials and fit rlssm's RL model.
//!
//! Subcommands:
//! - fit
//! - prepare
//! - show-config

mod pipeline;

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use rlfit_core::Config;
use rlfit_logging::NdjsonWriter;
use rlfit_model::PythonBackend;

use crate::pipeline::RunError;

#[derive(Parser)]
#[command(name = "rlfit")]
#[command(about = "rlfit - single-subject rlssm fitting from trial tables")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

/// Where the data comes from. Flags override the config file.
#[derive(Args, Clone, Debug)]
struct InputArgs {
    /// YAML config (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trial-by-trial table (comma-separated)
    #[arg(long)]
    trials: Option<PathBuf>,

    /// Summary statistics table (tab-separated)
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Subject identifier to fit
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the subject and run the rlssm fit
    Fit {
        #[command(flatten)]
        input: InputArgs,

        /// Python interpreter (overrides python.exe and $RLFIT_PYTHON)
        #[arg(long)]
        python: Option<String>,

        /// Append NDJSON run events to this file
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Prepare the subject and write the model table as CSV
    Prepare {
        #[command(flatten)]
        input: InputArgs,

        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the effective configuration as YAML
    ShowConfig {
        #[command(flatten)]
        input: InputArgs,
    },
}

fn load_config(input: &InputArgs) -> Result<Config, RunError> {
    let mut cfg = match &input.config {
        Some(p) => Config::load(p)?,
        None => Config::default(),
    };
    if let Some(p) = &input.trials {
        cfg.data.trials_path = p.clone();
    }
    if let Some(p) = &input.summary {
        cfg.data.summary_path = p.clone();
    }
    if let Some(s) = &input.subject {
        cfg.data.subject = s.clone();
    }
    Ok(cfg)
}

fn cmd_fit(
    input: &InputArgs,
    python: Option<String>,
    events: Option<PathBuf>,
) -> Result<(), RunError> {
    let mut cfg = load_config(input)?;
    if python.is_some() {
        cfg.python.exe = python;
    }
    let backend = PythonBackend::from_config(&cfg.python);
    let mut events = match events {
        Some(p) => Some(NdjsonWriter::open_append(p)?),
        None => None,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    pipeline::run_fit(&cfg, &backend, events.as_mut(), &mut out)?;
    Ok(())
}

fn cmd_prepare(input: &InputArgs, out: Option<PathBuf>) -> Result<(), RunError> {
    let cfg = load_config(input)?;
    let (_, prepared) = pipeline::run_prepare(&cfg, None)?;
    match out {
        Some(p) => {
            prepared.table.write_csv(File::create(&p)?)?;
            tracing::info!(path = %p.display(), trials = prepared.table.len(), "wrote model table");
        }
        None => {
            let stdout = io::stdout();
            prepared.table.write_csv(stdout.lock())?;
        }
    }
    Ok(())
}

fn cmd_show_config(input: &InputArgs) -> Result<(), RunError> {
    let cfg = load_config(input)?;
    let yaml = cfg.to_yaml()?;
    io::stdout().write_all(yaml.as_bytes())?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    rlfit_logging::init_tracing(cli.log_level);

    let res = match cli.command {
        Commands::Fit {
            input,
            python,
            events,
        } => cmd_fit(&input, python, events),
        Commands::Prepare { input, out } => cmd_prepare(&input, out),
        Commands::ShowConfig { input } => cmd_show_config(&input),
    };

    if let Err(e) = res {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
