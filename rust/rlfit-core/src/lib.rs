//! rlfit-core: configuration shared by the rlfit crates.

pub mod config;
pub mod validate;

pub use config::{ColumnsConfig, Config, ConfigError, DataConfig, FitConfig, PythonConfig};
pub use validate::validate_config;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_nonempty() {
        assert!(!VERSION.is_empty());
    }
}
