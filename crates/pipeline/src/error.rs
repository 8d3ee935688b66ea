use analytics::AnalyticsError;
use indicatif::style::TemplateError;
use indicators::IndicatorError;
use serde_json::Error as JsonError;
use simulation::SimulationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] configuration::error::ConfigError),

    #[error("Indicator calculation failed: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("Analytics calculation failed: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("Simulation failed: {0}")]
    Simulation(#[from] SimulationError),

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("Record sink error: {0}")]
    Sink(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] JsonError),

    #[error("Progress bar template error: {0}")]
    ProgressBarTemplate(String),
}

impl From<TemplateError> for PipelineError {
    fn from(error: TemplateError) -> Self {
        PipelineError::ProgressBarTemplate(error.to_string())
    }
}
