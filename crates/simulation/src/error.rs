use configuration::error::ConfigError;
use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Not enough data: {0}")]
    NoData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid model or simulation parameters: {0}")]
    InvalidParameters(String),

    #[error("Simulation of {cells} matrix cells exceeds the limit of {limit}")]
    ResourceLimit { cells: usize, limit: usize },

    #[error("Non-finite value encountered in {0}")]
    NonFinite(String),
}

impl From<CoreError> for SimulationError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoData(msg) => SimulationError::NoData(msg),
            other => SimulationError::InvalidInput(other.to_string()),
        }
    }
}

impl From<ConfigError> for SimulationError {
    fn from(err: ConfigError) -> Self {
        SimulationError::InvalidParameters(err.to_string())
    }
}
