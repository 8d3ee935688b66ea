use configuration::error::ConfigError;
use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("No tick data available: {0}")]
    NoData(String),

    #[error("Tick history is malformed: {0}")]
    InvalidInput(String),

    #[error("Indicator engine received invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("An error occurred during indicator calculation: {0}")]
    Calculation(String),
}

impl From<CoreError> for IndicatorError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::NoData(msg) => IndicatorError::NoData(msg),
            CoreError::InvalidInput(field, msg) => {
                IndicatorError::InvalidInput(format!("{}: {}", field, msg))
            }
        }
    }
}

impl From<ConfigError> for IndicatorError {
    fn from(error: ConfigError) -> Self {
        IndicatorError::InvalidParameters(error.to_string())
    }
}

impl From<ta::errors::TaError> for IndicatorError {
    fn from(error: ta::errors::TaError) -> Self {
        IndicatorError::Calculation(format!("{:?}", error))
    }
}
