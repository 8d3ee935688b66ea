use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Not enough data to perform calculation: {0}")]
    NoData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Error in calculation: {0}")]
    Calculation(String),
}

impl From<CoreError> for AnalyticsError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoData(msg) => AnalyticsError::NoData(msg),
            other => AnalyticsError::InvalidInput(other.to_string()),
        }
    }
}

impl From<configuration::error::ConfigError> for AnalyticsError {
    fn from(err: configuration::error::ConfigError) -> Self {
        AnalyticsError::InvalidParameters(err.to_string())
    }
}
