//! rlfit-model: the external rlssm model behind a `ModelBackend` seam.

pub mod backend;
pub mod python;

pub use backend::{FitRequest, FitResult, ModelBackend, ModelError};
pub use python::{resolve_python, PythonBackend, EMBEDDED_DRIVER, PYTHON_ENV};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


#[cfg(test)]
mod python_tests;
