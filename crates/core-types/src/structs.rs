use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

/// A single daily OHLCV bar for one instrument.
///
/// Prices are kept as `Decimal` exactly as they arrive from the data source. The
/// numeric engines work in `f64` and convert at the boundary through the
/// `*_f64` accessors below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// The `f64` view of a tick's prices, used by the calibration maths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Tick {
    pub fn close_f64(&self) -> Result<f64, CoreError> {
        decimal_to_f64("close", self.close)
    }

    pub fn volume_f64(&self) -> Result<f64, CoreError> {
        decimal_to_f64("volume", self.volume)
    }

    pub fn ohlc_f64(&self) -> Result<Ohlc, CoreError> {
        Ok(Ohlc {
            open: decimal_to_f64("open", self.open)?,
            high: decimal_to_f64("high", self.high)?,
            low: decimal_to_f64("low", self.low)?,
            close: decimal_to_f64("close", self.close)?,
        })
    }
}

fn decimal_to_f64(field: &str, value: Decimal) -> Result<f64, CoreError> {
    value
        .to_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CoreError::InvalidInput(field.to_string(), value.to_string()))
}

/// Checks that `ticks` is a well-formed history for a single instrument.
///
/// The history must be non-empty, belong to one instrument, be strictly ascending
/// by timestamp (no duplicates), carry positive prices and a non-negative volume.
pub fn validate_history(ticks: &[Tick]) -> Result<(), CoreError> {
    let first = ticks
        .first()
        .ok_or_else(|| CoreError::NoData("tick history is empty".to_string()))?;

    for (i, tick) in ticks.iter().enumerate() {
        if tick.instrument != first.instrument {
            return Err(CoreError::InvalidInput(
                "instrument".to_string(),
                format!("expected {} but found {} at index {}", first.instrument, tick.instrument, i),
            ));
        }
        if i > 0 && tick.timestamp <= ticks[i - 1].timestamp {
            return Err(CoreError::InvalidInput(
                "timestamp".to_string(),
                format!("history is not strictly ascending at index {}", i),
            ));
        }
        let prices = [tick.open, tick.high, tick.low, tick.close];
        if prices.iter().any(|p| *p <= Decimal::ZERO) {
            return Err(CoreError::InvalidInput(
                "price".to_string(),
                format!("non-positive price at {}", tick.timestamp),
            ));
        }
        if tick.volume < Decimal::ZERO {
            return Err(CoreError::InvalidInput(
                "volume".to_string(),
                format!("negative volume at {}", tick.timestamp),
            ));
        }
    }

    Ok(())
}

/// One row of derived technical features, aligned 1:1 with an input tick.
///
/// Every derived field is `None` until enough history exists to fill its window,
/// or when the statistic is undefined (e.g. the oscillator on a flat series).
/// A `None` is never the same thing as a zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalFeatureRow {
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
    pub close: Decimal,
    pub volume: Decimal,
    pub ma_short: Option<Decimal>,
    pub ma_long: Option<Decimal>,
    pub rolling_std: Option<Decimal>,
    pub volume_avg: Option<Decimal>,
    pub rsi: Option<Decimal>,
    pub macd: Option<Decimal>,
    pub macd_signal: Option<Decimal>,
    pub bb_upper: Option<Decimal>,
    pub bb_lower: Option<Decimal>,
}

/// The correlation between two instruments' returns over the window ending at `timestamp`.
///
/// `instrument_a` always sorts before `instrument_b`. `correlation` is NaN when the
/// statistic is undefined (fewer than two overlapping returns, or a flat series).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRow {
    pub instrument_a: String,
    pub instrument_b: String,
    pub timestamp: DateTime<Utc>,
    pub correlation: f64,
}

impl CorrelationRow {
    pub fn is_defined(&self) -> bool {
        !self.correlation.is_nan()
    }
}

/// Per-step summary of a simulated price distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummaryRow {
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
    pub mean_price: f64,
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

impl RiskSummaryRow {
    /// The percentile columns in ascending quantile order.
    pub fn percentiles(&self) -> [f64; 6] {
        [self.p5, self.p10, self.p25, self.p75, self.p90, self.p95]
    }
}

/// Annualised cross-path volatility of simulated step returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepVolatilityRow {
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
    pub volatility: f64,
}

/// Parameters of the Heston stochastic-volatility model.
///
/// Variances (`v0`, `theta`) are per trading day; `kappa`, `xi` and `mu` are
/// expressed on the annual clock used by the simulator's `dt`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityParameters {
    /// Initial variance.
    pub v0: f64,
    /// Long-run variance.
    pub theta: f64,
    /// Mean-reversion rate.
    pub kappa: f64,
    /// Volatility of volatility.
    pub xi: f64,
    /// Correlation between price and variance shocks.
    pub rho: f64,
    /// Drift.
    pub mu: f64,
    /// The last close of the calibration history.
    pub spot: f64,
}

impl VolatilityParameters {
    /// `2·κ·θ > ξ²`, the condition keeping the continuous variance process positive.
    pub fn satisfies_feller(&self) -> bool {
        2.0 * self.kappa * self.theta > self.xi * self.xi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn tick(instrument: &str, day: i64, close: Decimal) -> Tick {
        Tick {
            instrument: instrument.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1000),
        }
    }

    #[test]
    fn empty_history_is_no_data() {
        assert!(matches!(validate_history(&[]), Err(CoreError::NoData(_))));
    }

    #[test]
    fn rejects_mixed_instruments() {
        let ticks = vec![tick("AAPL", 0, dec!(10)), tick("MSFT", 1, dec!(11))];
        assert!(matches!(validate_history(&ticks), Err(CoreError::InvalidInput(field, _)) if field == "instrument"));
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let ticks = vec![tick("AAPL", 0, dec!(10)), tick("AAPL", 0, dec!(11))];
        assert!(validate_history(&ticks).is_err());
    }

    #[test]
    fn rejects_non_positive_prices() {
        let ticks = vec![tick("AAPL", 0, dec!(10)), tick("AAPL", 1, dec!(0))];
        assert!(validate_history(&ticks).is_err());
    }

    #[test]
    fn converts_prices_to_f64() {
        let t = tick("AAPL", 0, dec!(101.25));
        assert_eq!(t.close_f64().unwrap(), 101.25);
        assert_eq!(t.ohlc_f64().unwrap().high, 101.25);
    }

    #[test]
    fn feller_condition() {
        let mut params = VolatilityParameters {
            v0: 0.04,
            theta: 0.04,
            kappa: 2.0,
            xi: 0.3,
            rho: -0.3,
            mu: 0.05,
            spot: 100.0,
        };
        assert!(params.satisfies_feller());
        params.xi = 0.5;
        assert!(!params.satisfies_feller());
    }

    #[test]
    fn undefined_correlation_is_reported() {
        let row = CorrelationRow {
            instrument_a: "A".to_string(),
            instrument_b: "B".to_string(),
            timestamp: Utc::now(),
            correlation: f64::NAN,
        };
        assert!(!row.is_defined());
    }
}
