//! # Bankvault Analytics
//!
//! Cross-instrument correlation and the risk summary of simulated price paths.
//!
//! ## Architectural Principles
//!
//! - **Layer 2 Logic:** This is a pure logic crate. It has no knowledge of external systems.
//!   It depends on `core-types` (Layer 0), `configuration` for its parameters and
//!   `simulation` (Layer 1) for the ensemble it summarises.
//! - **Stateless Calculation:** `CorrelationEngine` and `RiskAggregator` are stateless
//!   calculators. Undefined statistics surface as NaN or `+∞`, never as zero.
//!
//! ## Public API
//!
//! - `CorrelationEngine`: rolling pairwise correlation rows from a multi-instrument history.
//! - `RiskAggregator`: step summaries, risk metrics and sensitivities of an ensemble.
//! - `RiskReport`: the standardized output of the aggregator.
//! - `SimulationQuality`: simulated versus historical return moments.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod aggregator;
pub mod correlation;
pub mod error;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use aggregator::RiskAggregator;
pub use correlation::CorrelationEngine;
pub use error::AnalyticsError;
pub use report::{
    RiskMetrics, RiskReport, SensitivityEstimate, SimulationQuality, TailRisk, ThresholdProbability,
};
