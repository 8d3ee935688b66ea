use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The root configuration structure for the entire application.
///
/// Every section falls back to its defaults when it is missing from the file,
/// so an empty (or absent) `config.toml` is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub indicators: IndicatorParams,
    pub correlation: CorrelationParams,
    pub calibration: CalibrationParams,
    pub simulation: SimulationParams,
    pub risk: RiskParams,
    pub logging: LogSettings,
}

impl Config {
    /// Validates every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.indicators.validate()?;
        self.correlation.validate()?;
        self.calibration.validate()?;
        self.simulation.validate()?;
        self.risk.validate()?;
        Ok(())
    }
}

fn require(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(message.to_string()))
    }
}

/// Window sizes and periods for the technical indicator transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub ma_short: usize,
    pub ma_long: usize,
    pub std_window: usize,
    pub volume_window: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_window: usize,
    pub bb_multiplier: f64,
    /// Decimal places kept on every emitted feature value.
    pub precision: u32,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ma_short: 50,
            ma_long: 200,
            std_window: 50,
            volume_window: 50,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_window: 20,
            bb_multiplier: 2.0,
            precision: 3,
        }
    }
}

impl IndicatorParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let windows = [
            self.ma_short,
            self.ma_long,
            self.volume_window,
            self.rsi_period,
            self.macd_fast,
            self.macd_slow,
            self.macd_signal,
        ];
        require(windows.iter().all(|w| *w > 0), "indicator windows must be greater than zero")?;
        // A sample standard deviation needs at least two observations.
        require(self.std_window >= 2, "std_window must be at least 2")?;
        require(self.bb_window >= 2, "bb_window must be at least 2")?;
        require(
            self.macd_fast < self.macd_slow,
            "macd_fast must be less than macd_slow",
        )?;
        require(
            self.bb_multiplier.is_finite() && self.bb_multiplier >= 0.0,
            "bb_multiplier must be a non-negative number",
        )?;
        require(self.precision <= 12, "precision must be at most 12 decimal places")
    }
}

/// Parameters for the rolling cross-instrument correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationParams {
    /// Number of observations in each rolling window.
    pub window: usize,
    /// Number of most recent ticks kept per instrument. Equal to `window` by
    /// default, which yields only the latest correlation of each pair.
    pub lookback: usize,
}

impl Default for CorrelationParams {
    fn default() -> Self {
        Self { window: 20, lookback: 20 }
    }
}

impl CorrelationParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(self.window >= 2, "correlation window must be at least 2")?;
        require(
            self.lookback >= self.window,
            "correlation lookback must be at least the window size",
        )
    }
}

/// Parameters for the stochastic-volatility calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    pub window: usize,
    /// Shrink the window to half the available history when the history is short.
    pub adaptive_window: bool,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self { window: 60, adaptive_window: true }
    }
}

impl CalibrationParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(self.window >= 2, "calibration window must be at least 2")
    }
}

/// Parameters for the Monte Carlo path simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Simulation horizon in trading days.
    pub horizon_days: usize,
    pub steps_per_day: usize,
    pub paths: usize,
    pub antithetic: bool,
    /// Base seed for the random streams. A random seed is drawn when absent.
    pub seed: Option<u64>,
    /// Upper bound on `(steps + 1) * paths`, checked before allocating.
    pub max_matrix_cells: usize,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            horizon_days: 30,
            steps_per_day: 4,
            paths: 2000,
            antithetic: true,
            seed: None,
            max_matrix_cells: 50_000_000,
        }
    }
}

impl SimulationParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(self.horizon_days > 0, "horizon_days must be greater than zero")?;
        require(self.steps_per_day > 0, "steps_per_day must be greater than zero")?;
        require(self.paths > 0, "paths must be greater than zero")?;
        let cells = self.matrix_cells().ok_or_else(|| {
            ConfigError::ValidationError("simulation matrix size overflows".to_string())
        })?;
        require(cells <= self.max_matrix_cells, "simulation matrix exceeds max_matrix_cells")
    }

    /// Number of simulated steps. Saturates; `validate` rejects sizes that overflow.
    pub fn steps(&self) -> usize {
        self.horizon_days.saturating_mul(self.steps_per_day)
    }

    /// `(steps + 1) * paths`, or `None` when that does not fit in a `usize`.
    pub fn matrix_cells(&self) -> Option<usize> {
        self.horizon_days
            .checked_mul(self.steps_per_day)?
            .checked_add(1)?
            .checked_mul(self.paths)
    }

    /// Size of one simulation step in years.
    pub fn dt(&self) -> f64 {
        1.0 / 252.0 / self.steps_per_day as f64
    }
}

/// Parameters for the risk aggregation over the simulated ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParams {
    /// Tail probabilities for VaR / CVaR, e.g. 0.05 for the 5% tail.
    pub confidence_levels: Vec<f64>,
    /// Terminal return thresholds for the exceedance probabilities.
    pub return_thresholds: Vec<f64>,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            confidence_levels: vec![0.01, 0.05, 0.10],
            return_thresholds: vec![-0.2, -0.1, -0.05, 0.0, 0.05, 0.1, 0.2],
        }
    }
}

impl RiskParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(
            self.confidence_levels.iter().all(|c| *c > 0.0 && *c < 1.0),
            "confidence levels must lie strictly between 0 and 1",
        )?;
        require(
            self.return_thresholds.iter().all(|t| t.is_finite()),
            "return thresholds must be finite",
        )
    }
}

/// Where and how verbosely to log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Directory for daily-rolling log files. Logs go to stdout only when absent.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "bankvault".to_string(),
        }
    }
}
