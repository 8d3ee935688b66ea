use core_types::{RiskSummaryRow, StepVolatilityRow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value-at-Risk and Conditional VaR of terminal returns at one tail probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TailRisk {
    /// Tail probability, e.g. 0.05 for the 5% tail.
    pub confidence: f64,
    pub value_at_risk: f64,
    pub conditional_value_at_risk: f64,
}

/// Fraction of paths whose terminal return is strictly above `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProbability {
    pub threshold: f64,
    /// Fraction in [0, 1].
    pub probability: f64,
}

/// Distributional risk measures over the terminal step of a simulated ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub tail: Vec<TailRisk>,
    /// Mean over paths of each path's maximum drawdown (a non-positive return).
    pub max_drawdown_mean: f64,
    pub max_drawdown_p95: f64,
    pub exceedance: Vec<ThresholdProbability>,
    pub sharpe_ratio: f64,
    /// `+∞` when no path closes below spot.
    pub sortino_ratio: f64,
}

impl RiskMetrics {
    /// Flattens the metrics into named scalars, e.g. `VaR_5%`, `CVaR_5%`,
    /// `prob_return_gt_-10%`.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        for tail in &self.tail {
            let label = percent_label(tail.confidence);
            map.insert(format!("VaR_{}", label), tail.value_at_risk);
            map.insert(format!("CVaR_{}", label), tail.conditional_value_at_risk);
        }
        map.insert("max_drawdown_mean".to_string(), self.max_drawdown_mean);
        map.insert("max_drawdown_p95".to_string(), self.max_drawdown_p95);
        for exceedance in &self.exceedance {
            map.insert(
                format!("prob_return_gt_{}", percent_label(exceedance.threshold)),
                exceedance.probability,
            );
        }
        map.insert("sharpe_ratio".to_string(), self.sharpe_ratio);
        map.insert("sortino_ratio".to_string(), self.sortino_ratio);
        map
    }
}

/// Empirical sensitivities of the simulated ensemble.
///
/// These describe the simulated distribution and are not option Greeks:
/// `delta` is the mean terminal return per 1% bump, `gamma` the mean squared
/// terminal return per (1%)², and `theta` the average decline in the mean price
/// per step between the midpoint and the final step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityEstimate {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
}

impl SensitivityEstimate {
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("delta".to_string(), self.delta),
            ("gamma".to_string(), self.gamma),
            ("theta".to_string(), self.theta),
        ])
    }
}

/// How closely the simulated returns reproduce the instrument's own history.
///
/// Volatilities are annualised. Skew and kurtosis are bias-adjusted sample
/// estimates; kurtosis is excess kurtosis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationQuality {
    pub historical_vol: f64,
    pub simulated_vol: f64,
    /// `|historical_vol − simulated_vol| / historical_vol`.
    pub vol_difference: f64,
    pub historical_skew: f64,
    pub simulated_skew: f64,
    pub historical_kurtosis: f64,
    pub simulated_kurtosis: f64,
}

impl SimulationQuality {
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("historical_vol".to_string(), self.historical_vol),
            ("simulated_vol".to_string(), self.simulated_vol),
            ("vol_difference".to_string(), self.vol_difference),
            ("historical_skew".to_string(), self.historical_skew),
            ("simulated_skew".to_string(), self.simulated_skew),
            ("historical_kurtosis".to_string(), self.historical_kurtosis),
            ("simulated_kurtosis".to_string(), self.simulated_kurtosis),
        ])
    }
}

/// Everything derived from one simulated ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    /// One row per simulated step, starting at the simulation start.
    pub summary: Vec<RiskSummaryRow>,
    /// One row per step after the first.
    pub step_volatility: Vec<StepVolatilityRow>,
    pub metrics: RiskMetrics,
    pub sensitivities: SensitivityEstimate,
}

/// `0.05` → `"5%"`, `-0.1` → `"-10%"`; fractional percents keep their decimals.
fn percent_label(fraction: f64) -> String {
    let percent = fraction * 100.0;
    if (percent - percent.round()).abs() < 1e-9 {
        format!("{}%", percent.round() as i64)
    } else {
        format!("{}%", percent)
    }
}
