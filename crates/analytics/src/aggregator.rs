use crate::error::AnalyticsError;
use crate::report::{
    RiskMetrics, RiskReport, SensitivityEstimate, SimulationQuality, TailRisk, ThresholdProbability,
};
use chrono::{DateTime, Duration, Utc};
use configuration::RiskParams;
use core_types::{stats, RiskSummaryRow, StepVolatilityRow, Tick};
use ndarray::{Array2, ArrayView1};
use simulation::SimulatedPathEnsemble;

/// Percentiles reported for every simulated step, in `RiskSummaryRow` column order.
const SUMMARY_PERCENTILES: [f64; 6] = [5.0, 10.0, 25.0, 75.0, 90.0, 95.0];

/// Reference price bump for the empirical sensitivities.
const BUMP: f64 = 0.01;

/// Added to ratio denominators so a zero-dispersion ensemble stays finite.
const RATIO_EPSILON: f64 = 1e-8;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// A stateless calculator turning a simulated ensemble into a `RiskReport`.
#[derive(Debug, Clone)]
pub struct RiskAggregator {
    params: RiskParams,
}

impl RiskAggregator {
    pub fn new(params: RiskParams) -> Self {
        Self { params }
    }

    /// The main entry point for summarising a simulation run.
    ///
    /// # Arguments
    ///
    /// * `instrument` - The instrument the ensemble was simulated for.
    /// * `ensemble` - Simulated prices shaped `(steps + 1, paths)`.
    /// * `spot` - The price every return is measured against.
    /// * `start` - Timestamp of row 0; step `i` is `start + i / steps_per_day` days.
    pub fn aggregate(
        &self,
        instrument: &str,
        ensemble: &SimulatedPathEnsemble,
        spot: f64,
        start: DateTime<Utc>,
    ) -> Result<RiskReport, AnalyticsError> {
        let prices = &ensemble.prices;
        if prices.nrows() < 2 || prices.ncols() == 0 {
            return Err(AnalyticsError::NoData(format!(
                "ensemble of shape {:?} has no simulated steps",
                prices.dim()
            )));
        }
        if ensemble.steps_per_day == 0 {
            return Err(AnalyticsError::InvalidInput("steps_per_day must be positive".to_string()));
        }
        if !spot.is_finite() || spot <= 0.0 {
            return Err(AnalyticsError::InvalidInput(format!(
                "spot must be positive and finite, got {}",
                spot
            )));
        }
        if prices.iter().any(|s| !s.is_finite()) {
            return Err(AnalyticsError::Calculation("ensemble contains non-finite prices".to_string()));
        }

        let timestamps = step_timestamps(start, prices.nrows(), ensemble.steps_per_day);
        let summary = self.calculate_summary(instrument, prices, &timestamps);
        let step_volatility =
            self.calculate_step_volatility(instrument, prices, &timestamps, ensemble.steps_per_day);

        let terminal = prices.row(prices.nrows() - 1);
        let returns: Vec<f64> = terminal.iter().map(|s| s / spot - 1.0).collect();

        let (max_drawdown_mean, max_drawdown_p95) = self.calculate_drawdown(prices, spot);
        let (sharpe_ratio, sortino_ratio) = self.calculate_ratios(&returns);
        let metrics = RiskMetrics {
            tail: self.calculate_tail_risk(&returns),
            max_drawdown_mean,
            max_drawdown_p95,
            exceedance: self.calculate_exceedance(&returns),
            sharpe_ratio,
            sortino_ratio,
        };
        let sensitivities = self.calculate_sensitivities(prices, &returns);

        tracing::debug!(
            instrument,
            steps = prices.nrows() - 1,
            paths = prices.ncols(),
            sharpe_ratio,
            "Aggregated simulated ensemble"
        );

        Ok(RiskReport { summary, step_volatility, metrics, sensitivities })
    }

    /// Compares the ensemble's per-step log returns with the daily log returns
    /// of `history`, the bars the simulation was calibrated on.
    ///
    /// Historical volatility uses the sample deviation, simulated volatility the
    /// population deviation over every step of every path; each is annualised
    /// by its own step length.
    pub fn assess_quality(
        &self,
        history: &[Tick],
        ensemble: &SimulatedPathEnsemble,
    ) -> Result<SimulationQuality, AnalyticsError> {
        let closes = history.iter().map(Tick::close_f64).collect::<Result<Vec<_>, _>>()?;
        if closes.len() < 2 {
            return Err(AnalyticsError::NoData(format!(
                "quality check needs at least two historical closes, got {}",
                closes.len()
            )));
        }
        let prices = &ensemble.prices;
        if prices.nrows() < 2 || prices.ncols() == 0 {
            return Err(AnalyticsError::NoData(format!(
                "ensemble of shape {:?} has no simulated steps",
                prices.dim()
            )));
        }
        if ensemble.steps_per_day == 0 {
            return Err(AnalyticsError::InvalidInput("steps_per_day must be positive".to_string()));
        }

        let historical: Vec<f64> = closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let mut simulated = Vec::with_capacity((prices.nrows() - 1) * prices.ncols());
        for t in 1..prices.nrows() {
            simulated.extend(
                prices.row(t).iter().zip(prices.row(t - 1).iter()).map(|(curr, prev)| (curr / prev).ln()),
            );
        }

        let historical_vol = stats::std_dev(&historical, 1) * 252f64.sqrt();
        let simulated_vol =
            stats::std_dev(&simulated, 0) * (252.0 * ensemble.steps_per_day as f64).sqrt();
        let quality = SimulationQuality {
            historical_vol,
            simulated_vol,
            vol_difference: (historical_vol - simulated_vol).abs() / historical_vol,
            historical_skew: stats::skewness(&historical),
            simulated_skew: stats::skewness(&simulated),
            historical_kurtosis: stats::excess_kurtosis(&historical),
            simulated_kurtosis: stats::excess_kurtosis(&simulated),
        };
        tracing::debug!(
            historical_vol,
            simulated_vol,
            vol_difference = quality.vol_difference,
            "Assessed simulation quality"
        );
        Ok(quality)
    }

    /// Mean and percentile bands of every row.
    fn calculate_summary(
        &self,
        instrument: &str,
        prices: &Array2<f64>,
        timestamps: &[DateTime<Utc>],
    ) -> Vec<RiskSummaryRow> {
        prices
            .rows()
            .into_iter()
            .zip(timestamps)
            .map(|(row, timestamp)| {
                let sorted = stats::sorted(&to_vec(row));
                let [p5, p10, p25, p75, p90, p95] =
                    SUMMARY_PERCENTILES.map(|q| stats::percentile_sorted(&sorted, q));
                RiskSummaryRow {
                    instrument: instrument.to_string(),
                    timestamp: *timestamp,
                    mean_price: stats::mean(&sorted),
                    p5,
                    p10,
                    p25,
                    p75,
                    p90,
                    p95,
                }
            })
            .collect()
    }

    /// Cross-path population std of step returns, annualised to trading days.
    fn calculate_step_volatility(
        &self,
        instrument: &str,
        prices: &Array2<f64>,
        timestamps: &[DateTime<Utc>],
        steps_per_day: usize,
    ) -> Vec<StepVolatilityRow> {
        let annualise = (252.0 * steps_per_day as f64).sqrt();
        (1..prices.nrows())
            .map(|t| {
                let step_returns: Vec<f64> = prices
                    .row(t)
                    .iter()
                    .zip(prices.row(t - 1).iter())
                    .map(|(curr, prev)| curr / prev - 1.0)
                    .collect();
                StepVolatilityRow {
                    instrument: instrument.to_string(),
                    timestamp: timestamps[t],
                    volatility: stats::std_dev(&step_returns, 0) * annualise,
                }
            })
            .collect()
    }

    /// VaR as the `c`-quantile of terminal returns; CVaR as the mean at or below it.
    fn calculate_tail_risk(&self, returns: &[f64]) -> Vec<TailRisk> {
        let sorted = stats::sorted(returns);
        self.params
            .confidence_levels
            .iter()
            .map(|&confidence| {
                let value_at_risk = stats::percentile_sorted(&sorted, confidence * 100.0);
                let tail: Vec<f64> =
                    sorted.iter().copied().take_while(|r| *r <= value_at_risk).collect();
                TailRisk {
                    confidence,
                    value_at_risk,
                    conditional_value_at_risk: stats::mean(&tail),
                }
            })
            .collect()
    }

    /// Per-path maximum drawdown of cumulative return, summarised by mean and p95.
    fn calculate_drawdown(&self, prices: &Array2<f64>, spot: f64) -> (f64, f64) {
        let max_drawdowns: Vec<f64> = prices
            .columns()
            .into_iter()
            .map(|path| {
                let mut peak = f64::NEG_INFINITY;
                let mut max_drawdown = 0.0f64;
                for price in path.iter() {
                    let cumulative = price / spot - 1.0;
                    if cumulative > peak {
                        peak = cumulative;
                    }
                    let drawdown = cumulative - peak;
                    if drawdown < max_drawdown {
                        max_drawdown = drawdown;
                    }
                }
                max_drawdown
            })
            .collect();

        (stats::mean(&max_drawdowns), stats::percentile(&max_drawdowns, 95.0))
    }

    fn calculate_exceedance(&self, returns: &[f64]) -> Vec<ThresholdProbability> {
        let total = returns.len() as f64;
        self.params
            .return_thresholds
            .iter()
            .map(|&threshold| ThresholdProbability {
                threshold,
                probability: returns.iter().filter(|r| **r > threshold).count() as f64 / total,
            })
            .collect()
    }

    /// Sharpe and Sortino ratios of terminal returns with a zero risk-free rate.
    fn calculate_ratios(&self, returns: &[f64]) -> (f64, f64) {
        let mean_return = stats::mean(returns);
        let sharpe = mean_return / (stats::std_dev(returns, 0) + RATIO_EPSILON);

        let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        let sortino = if downside.is_empty() {
            f64::INFINITY
        } else {
            mean_return / (stats::std_dev(&downside, 0) + RATIO_EPSILON)
        };

        (sharpe, sortino)
    }

    fn calculate_sensitivities(&self, prices: &Array2<f64>, returns: &[f64]) -> SensitivityEstimate {
        let rows = prices.nrows();
        let mid = rows / 2;
        let mean_at = |t: usize| stats::mean(&to_vec(prices.row(t)));
        let squared: Vec<f64> = returns.iter().map(|r| r * r).collect();

        SensitivityEstimate {
            delta: stats::mean(returns) / BUMP,
            gamma: stats::mean(&squared) / (BUMP * BUMP),
            theta: (mean_at(mid) - mean_at(rows - 1)) / (rows - mid) as f64,
        }
    }
}

/// Timestamp of each row: `start + i · (1 day / steps_per_day)`.
fn step_timestamps(start: DateTime<Utc>, rows: usize, steps_per_day: usize) -> Vec<DateTime<Utc>> {
    (0..rows)
        .map(|i| start + Duration::milliseconds(MILLIS_PER_DAY * i as i64 / steps_per_day as i64))
        .collect()
}

fn to_vec(row: ArrayView1<f64>) -> Vec<f64> {
    row.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray::array;

    fn ensemble(prices: Array2<f64>, steps_per_day: usize) -> SimulatedPathEnsemble {
        let variances = Array2::from_elem(prices.dim(), 0.04);
        SimulatedPathEnsemble {
            prices,
            variances,
            dt: 1.0 / 252.0 / steps_per_day as f64,
            steps_per_day,
            feller_adjustment: None,
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn step_timestamps_subdivide_the_day() {
        let stamps = step_timestamps(start(), 5, 4);
        assert_eq!(stamps[0], start());
        assert_eq!(stamps[1], start() + Duration::hours(6));
        assert_eq!(stamps[4], start() + Duration::days(1));
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        // Path 0 rises to +20% then falls to -10%: drawdown -30%. Path 1 only rises.
        let prices = array![[100.0, 100.0], [120.0, 105.0], [90.0, 110.0]];
        let aggregator = RiskAggregator::new(RiskParams::default());
        let (mean, p95) = aggregator.calculate_drawdown(&prices, 100.0);
        assert!((mean - (-0.15)).abs() < 1e-12);
        assert!((p95 - (-0.015)).abs() < 1e-12);
    }

    #[test]
    fn sortino_is_infinite_without_losing_paths() {
        let aggregator = RiskAggregator::new(RiskParams::default());
        let (sharpe, sortino) = aggregator.calculate_ratios(&[0.01, 0.02, 0.03]);
        assert!(sharpe > 0.0);
        assert_eq!(sortino, f64::INFINITY);
    }

    #[test]
    fn rejects_degenerate_ensembles() {
        let aggregator = RiskAggregator::new(RiskParams::default());
        let single_row = ensemble(array![[100.0, 100.0]], 1);
        assert!(matches!(
            aggregator.aggregate("X", &single_row, 100.0, start()),
            Err(AnalyticsError::NoData(_))
        ));
        let valid = ensemble(array![[100.0], [101.0]], 1);
        assert!(matches!(
            aggregator.aggregate("X", &valid, -1.0, start()),
            Err(AnalyticsError::InvalidInput(_))
        ));
    }

    #[test]
    fn quality_compares_simulated_and_historical_moments() {
        use rust_decimal::prelude::*;

        let up = 0.1f64.exp();
        let history: Vec<Tick> = [100.0, 100.0 * up, 100.0, 100.0 * up, 100.0]
            .iter()
            .enumerate()
            .map(|(i, close)| {
                let close = Decimal::from_f64(*close).unwrap();
                Tick {
                    instrument: "X".to_string(),
                    timestamp: start() + Duration::days(i as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: Decimal::ONE,
                }
            })
            .collect();
        // One step; log returns of +0.1, -0.1, +0.1, -0.1 across the paths.
        let prices = array![[100.0, 100.0, 100.0, 100.0], [100.0 * up, 100.0 / up, 100.0 * up, 100.0 / up]];

        let aggregator = RiskAggregator::new(RiskParams::default());
        let quality = aggregator.assess_quality(&history, &ensemble(prices, 1)).unwrap();

        let sqrt_year = 252f64.sqrt();
        // Sample deviation of four +/-0.1 returns is 0.1 * sqrt(4/3); the population one is 0.1.
        assert!((quality.historical_vol - 0.1 * (4.0f64 / 3.0).sqrt() * sqrt_year).abs() < 1e-6);
        assert!((quality.simulated_vol - 0.1 * sqrt_year).abs() < 1e-9);
        assert!((quality.vol_difference - (1.0 - 0.75f64.sqrt())).abs() < 1e-5);
        assert!(quality.simulated_skew.abs() < 1e-9);
        assert!((quality.simulated_kurtosis + 6.0).abs() < 1e-6);
        assert_eq!(quality.to_map().len(), 7);

        assert!(matches!(
            aggregator.assess_quality(&history[..1], &ensemble(array![[1.0], [1.0]], 1)),
            Err(AnalyticsError::NoData(_))
        ));
    }

    #[test]
    fn sensitivities_follow_terminal_returns() {
        // Rows: 100 / 104 / 110 for both paths, so every terminal return is +10%.
        let prices = array![[100.0, 100.0], [104.0, 104.0], [110.0, 110.0]];
        let aggregator = RiskAggregator::new(RiskParams::default());
        let report = aggregator.aggregate("X", &ensemble(prices, 1), 100.0, start()).unwrap();

        let s = report.sensitivities;
        assert!((s.delta - 10.0).abs() < 1e-9);
        assert!((s.gamma - 100.0).abs() < 1e-9);
        // mid = 1: (104 - 110) / (3 - 1)
        assert!((s.theta - (-3.0)).abs() < 1e-9);
    }
}
