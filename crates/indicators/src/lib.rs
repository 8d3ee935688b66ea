//! # Technical Indicator Engine
//!
//! Turns the ordered daily tick history of one instrument into per-tick
//! technical feature rows: moving averages, rolling volatility, volume average,
//! RSI, MACD and Bollinger bands.
//!
//! ## Architectural Principles
//!
//! - **Pure transform:** no I/O and no state between calls. The same history
//!   always yields the same rows.
//! - **Explicit gaps:** a feature whose window is not yet filled is `None`, never
//!   a zero.
//!
//! ## Public API
//!
//! - `IndicatorEngine`: builds feature rows from a tick slice.
//! - `series`: the column-wise calculations the engine is assembled from.
//! - `IndicatorError`: the specific error types returned from this crate.

pub mod engine;
pub mod error;
pub mod series;

pub use engine::IndicatorEngine;
pub use error::IndicatorError;
