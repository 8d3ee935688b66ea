use crate::error::IndicatorError;
use crate::series::{bollinger_bands, macd, moving_average, rolling_std, rsi};
use configuration::IndicatorParams;
use core_types::{validate_history, TechnicalFeatureRow, Tick};
use rust_decimal::prelude::*;

/// A stateless transform from an ordered tick history to technical feature rows.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    params: IndicatorParams,
}

impl IndicatorEngine {
    /// Creates a new `IndicatorEngine`, validating the window configuration.
    pub fn new(params: IndicatorParams) -> Result<Self, IndicatorError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Computes one feature row per tick.
    ///
    /// `ticks` must be the ascending history of a single instrument. An empty
    /// history is reported as `IndicatorError::NoData`.
    pub fn compute(&self, ticks: &[Tick]) -> Result<Vec<TechnicalFeatureRow>, IndicatorError> {
        validate_history(ticks)?;

        let p = &self.params;
        let closes = ticks.iter().map(Tick::close_f64).collect::<Result<Vec<_>, _>>()?;
        let volumes = ticks.iter().map(Tick::volume_f64).collect::<Result<Vec<_>, _>>()?;

        let ma_short = moving_average(&closes, p.ma_short)?;
        let ma_long = moving_average(&closes, p.ma_long)?;
        let std = rolling_std(&closes, p.std_window)?;
        let volume_avg = moving_average(&volumes, p.volume_window)?;
        let rsi = rsi(&closes, p.rsi_period)?;
        let macd = macd(&closes, p.macd_fast, p.macd_slow, p.macd_signal)?;
        let bands = bollinger_bands(&closes, p.bb_window, p.bb_multiplier)?;

        let dp = p.precision;
        let rows: Vec<TechnicalFeatureRow> = ticks
            .iter()
            .enumerate()
            .map(|(i, tick)| TechnicalFeatureRow {
                instrument: tick.instrument.clone(),
                timestamp: tick.timestamp,
                close: tick.close.round_dp(dp),
                volume: tick.volume.round_dp(dp),
                ma_short: round(ma_short[i], dp),
                ma_long: round(ma_long[i], dp),
                rolling_std: round(std[i], dp),
                volume_avg: round(volume_avg[i], dp),
                rsi: round(rsi[i], dp),
                macd: round(macd.macd[i], dp),
                macd_signal: round(macd.signal[i], dp),
                bb_upper: round(bands.upper[i], dp),
                bb_lower: round(bands.lower[i], dp),
            })
            .collect();

        tracing::debug!(
            instrument = %ticks[0].instrument,
            rows = rows.len(),
            "Computed technical features"
        );

        Ok(rows)
    }
}

/// Converts an indicator value to a `Decimal` rounded to `dp` places.
/// Non-finite values stay undefined rather than becoming zero.
fn round(value: Option<f64>, dp: u32) -> Option<Decimal> {
    value
        .filter(|v| v.is_finite())
        .and_then(Decimal::from_f64)
        .map(|d| d.round_dp(dp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_keeps_three_places() {
        assert_eq!(round(Some(1.23456), 3), Decimal::from_str("1.235").ok());
        assert_eq!(round(Some(f64::NAN), 3), None);
        assert_eq!(round(Some(f64::INFINITY), 3), None);
        assert_eq!(round(None, 3), None);
    }

    #[test]
    fn empty_history_is_no_data() {
        let engine = IndicatorEngine::new(IndicatorParams::default()).unwrap();
        assert!(matches!(engine.compute(&[]), Err(IndicatorError::NoData(_))));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let params = IndicatorParams { macd_fast: 30, ..IndicatorParams::default() };
        assert!(matches!(
            IndicatorEngine::new(params),
            Err(IndicatorError::InvalidParameters(_))
        ));
    }
}
