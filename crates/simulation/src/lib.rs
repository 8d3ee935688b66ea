//! # Stochastic-Volatility Simulation
//!
//! Calibrates a Heston model to an instrument's daily history and simulates
//! forward price paths from it.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** Pure numeric code. It depends only on `core-types` and
//!   `configuration`; randomness is injected by the caller as any `rand::Rng`, so
//!   seeding and stream independence are the caller's decision.
//! - **Calibration never throws on thin data:** a short or degenerate history
//!   yields `Calibration::Fallback` with simple variance-based parameters.
//!
//! ## Public API
//!
//! - `VolatilityCalibrator` / `Calibration`: history → model parameters.
//! - `PathSimulator` / `SimulatedPathEnsemble`: parameters → `(steps + 1, paths)` price matrix.
//! - `SimulationError`: the specific error types that can be returned from this crate.

pub mod calibration;
pub mod error;
pub mod paths;

pub use calibration::{
    yang_zhang, Calibration, CalibrationDiagnostics, FallbackReason, VolatilityCalibrator,
};
pub use error::SimulationError;
pub use paths::{FellerAdjustment, PathSimulator, SimulatedPathEnsemble, VARIANCE_FLOOR};
