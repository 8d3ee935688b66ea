use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod overrides;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use overrides::ConfigOverrides;
pub use settings::{
    CalibrationParams, Config, CorrelationParams, IndicatorParams, LogSettings, RiskParams,
    SimulationParams,
};

/// The prefix for environment overrides, e.g. `BANKVAULT__SIMULATION__PATHS=5000`.
pub const ENV_PREFIX: &str = "BANKVAULT";

/// Loads the application configuration.
///
/// Sources are layered in order: built-in defaults, the TOML file at `path`
/// (`config.toml` when `None`; a missing default file is not an error), then
/// `BANKVAULT__*` environment variables. The result is validated before it is
/// returned.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let file = match path {
        Some(p) => config::File::from(p).required(true),
        None => config::File::with_name("config.toml").required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[simulation]\npaths = 500\nseed = 7\n\n[correlation]\nwindow = 10\nlookback = 30"
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();

        assert_eq!(config.simulation.paths, 500);
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.simulation.horizon_days, 30);
        assert_eq!(config.correlation.window, 10);
        assert_eq!(config.indicators.ma_long, 200);
    }

    #[test]
    fn invalid_file_values_fail_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[correlation]\nwindow = 50\nlookback = 10").unwrap();

        assert!(matches!(
            load_config(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = load_config(Some(Path::new("/nonexistent/bankvault.toml")));
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
