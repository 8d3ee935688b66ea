use crate::error::SimulationError;
use configuration::CalibrationParams;
use core_types::{stats, validate_history, Ohlc, Tick, VolatilityParameters};
use serde::{Deserialize, Serialize};
use std::fmt;

const TRADING_DAYS: f64 = 252.0;

/// Rolling vols averaged for the initial variance.
const RECENT_VOL_COUNT: usize = 10;
/// Regression pairs needed before the mean-reversion rate is estimated.
const MIN_KAPPA_PAIRS: usize = 30;
/// Return/vol-change pairs needed before the correlation is estimated.
const MIN_RHO_PAIRS: usize = 10;

const DEFAULT_KAPPA: f64 = 2.0;
const DEFAULT_XI: f64 = 0.3;
const DEFAULT_RHO: f64 = -0.3;

/// The outcome of a calibration attempt.
///
/// Both variants carry usable parameters; `Fallback` says they came from the
/// simple variance-only estimate instead of the full procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Calibration {
    Calibrated {
        params: VolatilityParameters,
        diagnostics: CalibrationDiagnostics,
    },
    Fallback {
        params: VolatilityParameters,
        reason: FallbackReason,
    },
}

impl Calibration {
    pub fn params(&self) -> &VolatilityParameters {
        match self {
            Calibration::Calibrated { params, .. } | Calibration::Fallback { params, .. } => params,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Calibration::Fallback { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FallbackReason {
    /// Fewer usable rows than the calibration window after the rolling warm-up.
    InsufficientHistory { window: usize, usable_rows: usize },
    /// An intermediate estimate was NaN or infinite.
    NonFinite { quantity: String },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::InsufficientHistory { window, usable_rows } => write!(
                f,
                "insufficient history: {} usable rows for a window of {}",
                usable_rows, window
            ),
            FallbackReason::NonFinite { quantity } => {
                write!(f, "non-finite intermediate value in {}", quantity)
            }
        }
    }
}

/// Intermediate figures reported alongside a successful calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationDiagnostics {
    /// Window actually used after adaptive shrinking.
    pub window: usize,
    /// Rows remaining once the rolling estimates are defined.
    pub usable_rows: usize,
    /// Annualised Yang–Zhang volatility over the whole history.
    pub realized_vol: f64,
    /// Most recent rolling close-to-close volatility (annualised).
    pub latest_rolling_vol: f64,
    /// Whether the mean-reversion rate was estimated or defaulted.
    pub kappa_estimated: bool,
    /// Whether the price/vol correlation was estimated or defaulted.
    pub rho_estimated: bool,
}

/// Estimates Heston parameters from a single instrument's daily OHLC history.
#[derive(Debug, Clone)]
pub struct VolatilityCalibrator {
    params: CalibrationParams,
}

/// Per-bar return series; index `i` describes the move from bar `i` to bar `i + 1`.
struct Returns {
    log: Vec<f64>,
    overnight: Vec<f64>,
    intraday: Vec<f64>,
    rogers_satchell: Vec<f64>,
}

impl VolatilityCalibrator {
    pub fn new(params: CalibrationParams) -> Self {
        Self { params }
    }

    /// The window used for a history of `observations` bars.
    ///
    /// With `adaptive_window` the configured window shrinks to half the history
    /// (never below 2), so short histories still calibrate.
    pub fn effective_window(&self, observations: usize) -> usize {
        if self.params.adaptive_window {
            self.params.window.min(observations / 2).max(2)
        } else {
            self.params.window
        }
    }

    /// Calibrates the model to `ticks`, an ascending single-instrument history.
    ///
    /// Returns `SimulationError::NoData` for fewer than two bars. A history that
    /// is too short for the window, or that produces a non-finite estimate, is
    /// reported as `Calibration::Fallback` rather than as an error.
    pub fn calibrate(&self, ticks: &[Tick]) -> Result<Calibration, SimulationError> {
        validate_history(ticks)?;
        if ticks.len() < 2 {
            return Err(SimulationError::NoData(format!(
                "calibration needs at least two closes, got {}",
                ticks.len()
            )));
        }

        let bars = ticks.iter().map(Tick::ohlc_f64).collect::<Result<Vec<_>, _>>()?;
        let spot = bars[bars.len() - 1].close;
        let returns = Returns::from_bars(&bars);
        let window = self.effective_window(bars.len());

        let outcome = match estimate(&returns, window, spot) {
            Ok((params, diagnostics)) => {
                tracing::info!(
                    instrument = %ticks[0].instrument,
                    window,
                    v0 = params.v0,
                    theta = params.theta,
                    kappa = params.kappa,
                    xi = params.xi,
                    rho = params.rho,
                    mu = params.mu,
                    "Calibrated volatility parameters"
                );
                Calibration::Calibrated { params, diagnostics }
            }
            Err(reason) => {
                tracing::warn!(
                    instrument = %ticks[0].instrument,
                    %reason,
                    "Calibration fell back to the variance-only estimate"
                );
                Calibration::Fallback { params: fallback_params(&returns.log, spot), reason }
            }
        };

        Ok(outcome)
    }
}

impl Returns {
    fn from_bars(bars: &[Ohlc]) -> Self {
        let mut log = Vec::with_capacity(bars.len() - 1);
        let mut overnight = Vec::with_capacity(bars.len() - 1);
        let mut intraday = Vec::with_capacity(bars.len() - 1);
        let mut rogers_satchell = Vec::with_capacity(bars.len() - 1);

        for pair in bars.windows(2) {
            let (prev, bar) = (pair[0], pair[1]);
            log.push((bar.close / prev.close).ln());
            overnight.push((bar.open / prev.close).ln());
            intraday.push((bar.close / bar.open).ln());

            let ho = (bar.high / bar.open).ln();
            let lo = (bar.low / bar.open).ln();
            let co = (bar.close / bar.open).ln();
            rogers_satchell.push(ho * (ho - co) + lo * (lo - co));
        }

        Self { log, overnight, intraday, rogers_satchell }
    }
}

/// Annualised Yang–Zhang volatility of the given bars.
///
/// `σ² = var(overnight) + k·var(open→close) + (1 − k)·mean(RS)` with
/// `k = 0.34 / (1.34 + (n + 1)/(n − 1))`.
pub fn yang_zhang(overnight: &[f64], intraday: &[f64], rogers_satchell: &[f64]) -> f64 {
    let n = overnight.len();
    if n < 2 {
        return f64::NAN;
    }
    let k = 0.34 / (1.34 + (n as f64 + 1.0) / (n as f64 - 1.0));
    let variance = stats::variance(overnight, 1)
        + k * stats::variance(intraday, 1)
        + (1.0 - k) * stats::mean(rogers_satchell);
    (TRADING_DAYS * variance).sqrt()
}

fn require_finite(quantity: &str, value: f64) -> Result<f64, FallbackReason> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FallbackReason::NonFinite { quantity: quantity.to_string() })
    }
}

/// The full estimation procedure over returns indexed as in `Returns`.
fn estimate(
    returns: &Returns,
    window: usize,
    spot: f64,
) -> Result<(VolatilityParameters, CalibrationDiagnostics), FallbackReason> {
    let n = returns.log.len();
    // Rolling estimates are defined once `window` returns are available.
    let usable_rows = (n + 1).saturating_sub(window);
    if window < 2 || usable_rows < window {
        return Err(FallbackReason::InsufficientHistory { window, usable_rows });
    }
    let first = n - usable_rows;

    let sqrt_year = TRADING_DAYS.sqrt();
    let mut rolling_vol = Vec::with_capacity(usable_rows);
    let mut realized_vol = Vec::with_capacity(usable_rows);
    for end in first..n {
        let range = end + 1 - window..=end;
        rolling_vol.push(stats::std_dev(&returns.log[range.clone()], 1) * sqrt_year);
        realized_vol.push(yang_zhang(
            &returns.overnight[range.clone()],
            &returns.intraday[range.clone()],
            &returns.rogers_satchell[range],
        ));
    }
    let log_returns = &returns.log[first..];

    let recent = &rolling_vol[rolling_vol.len().saturating_sub(RECENT_VOL_COUNT)..];
    let v0 = require_finite("v0", (stats::mean(recent) / sqrt_year).powi(2))?;
    let theta = require_finite("theta", (stats::mean(&rolling_vol) / sqrt_year).powi(2))?;

    let vol_changes: Vec<f64> = rolling_vol.windows(2).map(|w| w[1] - w[0]).collect();
    let estimated_kappa = mean_reversion_rate(&rolling_vol);
    let kappa_estimated = estimated_kappa.is_some();
    let kappa = match estimated_kappa {
        Some(rate) => require_finite("kappa", rate)?.clamp(0.1, 5.0),
        None => DEFAULT_KAPPA,
    };

    let vol_returns: Vec<f64> = realized_vol.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
    let xi = stats::std_dev(&vol_returns, 1) * sqrt_year * theta.sqrt();
    let xi = require_finite("xi", xi)?.clamp(0.01, 2.0);

    let rho_estimated = vol_changes.len() >= MIN_RHO_PAIRS;
    let rho = if rho_estimated {
        require_finite("rho", stats::pearson(&log_returns[1..], &vol_changes))?.clamp(-0.9, 0.1)
    } else {
        DEFAULT_RHO
    };

    let mu = require_finite("mu", stats::mean(log_returns) * TRADING_DAYS + 0.5 * v0)?;

    let params = VolatilityParameters { v0, theta, kappa, xi, rho, mu, spot };
    let diagnostics = CalibrationDiagnostics {
        window,
        usable_rows,
        realized_vol: yang_zhang(&returns.overnight, &returns.intraday, &returns.rogers_satchell),
        latest_rolling_vol: rolling_vol[rolling_vol.len() - 1],
        kappa_estimated,
        rho_estimated,
    };
    Ok((params, diagnostics))
}

/// Mean-reversion rate of a rolling volatility series: the negated slope of
/// each change regressed on the level it started from.
///
/// `None` with fewer than `MIN_KAPPA_PAIRS` pairs. Unclamped; NaN when the
/// levels have no variance.
fn mean_reversion_rate(rolling_vol: &[f64]) -> Option<f64> {
    if rolling_vol.len() < MIN_KAPPA_PAIRS + 2 {
        return None;
    }
    let levels = &rolling_vol[1..rolling_vol.len() - 1];
    let changes: Vec<f64> = rolling_vol[1..].windows(2).map(|w| w[1] - w[0]).collect();
    let slope = stats::covariance(levels, &changes, 1) / stats::variance(levels, 1);
    Some(-slope)
}

/// Variance-only parameters used when the full procedure cannot run.
fn fallback_params(log_returns: &[f64], spot: f64) -> VolatilityParameters {
    let variance = if log_returns.len() >= 2 { stats::variance(log_returns, 1) } else { 0.0 };
    VolatilityParameters {
        v0: variance,
        theta: variance,
        kappa: DEFAULT_KAPPA,
        xi: DEFAULT_XI,
        rho: DEFAULT_RHO,
        mu: stats::mean(log_returns) * TRADING_DAYS,
        spot,
    }
}
