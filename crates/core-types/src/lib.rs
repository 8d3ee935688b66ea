pub mod error;
pub mod schema;
pub mod stats;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use error::CoreError;
pub use schema::{ColumnSchema, Record, SqlType, TableSchema};
pub use structs::{
    validate_history, CorrelationRow, Ohlc, RiskSummaryRow, StepVolatilityRow, TechnicalFeatureRow,
    Tick, VolatilityParameters,
};
