//! Column-wise indicator calculations over a complete `f64` series.
//!
//! Every function returns one value per input element; `None` marks positions
//! where the window is not yet filled or the statistic is undefined.

use crate::error::IndicatorError;
use ta::indicators::{ExponentialMovingAverage as Ema, SimpleMovingAverage as Sma};
use ta::Next;

/// Arithmetic mean of the trailing `window` values.
pub fn moving_average(values: &[f64], window: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    let mut sma = Sma::new(window)?;
    Ok(values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            // `ta` averages over a partially filled window; the warm-up is reported as None.
            let mean = sma.next(*v);
            (i + 1 >= window).then_some(mean)
        })
        .collect())
}

/// Sample (n − 1) standard deviation of the trailing `window` values.
///
/// `ta::indicators::StandardDeviation` is the population deviation, so this one
/// is computed directly from each window slice.
pub fn rolling_std(values: &[f64], window: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    if window < 2 {
        return Err(IndicatorError::InvalidParameters(
            "a sample standard deviation needs a window of at least 2".to_string(),
        ));
    }

    Ok((0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let mean = slice.iter().sum::<f64>() / window as f64;
            let variance =
                slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
            Some(variance.sqrt())
        })
        .collect())
}

/// Exponentially weighted mean with span `span`, using normalised weights.
///
/// `y_t = Σ (1 − α)^k · x_{t−k} / Σ (1 − α)^k` over all `k ≤ t`, with
/// `α = 2 / (span + 1)`. Unlike the recursive EMA this is not biased towards
/// the first value early in the series.
pub fn adjusted_ewm(values: &[f64], span: usize) -> Result<Vec<f64>, IndicatorError> {
    if span == 0 {
        return Err(IndicatorError::InvalidParameters("ewm span must be greater than zero".to_string()));
    }
    let decay = 1.0 - 2.0 / (span as f64 + 1.0);
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    Ok(values
        .iter()
        .map(|x| {
            numerator = x + decay * numerator;
            denominator = 1.0 + decay * denominator;
            numerator / denominator
        })
        .collect())
}

/// Relative strength index with exponentially weighted gains and losses.
///
/// The change at the first bar counts as zero gain and zero loss. Gains and
/// losses are smoothed with `adjusted_ewm` of span `period`; the first value is
/// reported once `period` price changes have been seen. A series with no
/// downward moves reads 100; a completely flat series is undefined.
pub fn rsi(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    let changes: Vec<f64> = std::iter::once(0.0)
        .chain(closes.windows(2).map(|w| w[1] - w[0]))
        .take(closes.len())
        .collect();
    let gains: Vec<f64> = changes.iter().map(|c| c.max(0.0)).collect();
    let losses: Vec<f64> = changes.iter().map(|c| (-c).max(0.0)).collect();
    let avg_gain = adjusted_ewm(&gains, period)?;
    let avg_loss = adjusted_ewm(&losses, period)?;

    Ok(avg_gain
        .iter()
        .zip(&avg_loss)
        .enumerate()
        .map(|(i, (&gain, &loss))| {
            if i < period {
                return None;
            }
            let value = if loss > 0.0 {
                100.0 - 100.0 / (1.0 + gain / loss)
            } else if gain > 0.0 {
                100.0
            } else {
                return None;
            };
            Some(value).filter(|v| v.is_finite())
        })
        .collect())
}

/// The MACD line and its signal line.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
}

/// MACD = EMA(fast) − EMA(slow); signal = EMA(MACD, signal).
///
/// The MACD line is reported once the slow EMA has seen `slow` closes, and the
/// signal EMA is only fed defined MACD values.
pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<MacdSeries, IndicatorError> {
    let mut fast_ema = Ema::new(fast)?;
    let mut slow_ema = Ema::new(slow)?;
    let mut signal_ema = Ema::new(signal)?;

    let mut macd_line = Vec::with_capacity(closes.len());
    let mut signal_line = Vec::with_capacity(closes.len());
    let mut seen = 0usize;

    for (i, close) in closes.iter().enumerate() {
        let trend = fast_ema.next(*close) - slow_ema.next(*close);
        if i + 1 < slow {
            macd_line.push(None);
            signal_line.push(None);
            continue;
        }
        seen += 1;
        let smoothed = signal_ema.next(trend);
        macd_line.push(Some(trend));
        signal_line.push((seen >= signal).then_some(smoothed));
    }

    Ok(MacdSeries { macd: macd_line, signal: signal_line })
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandSeries {
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Bollinger bands: moving average ± `multiplier` sample standard deviations.
pub fn bollinger_bands(
    closes: &[f64],
    window: usize,
    multiplier: f64,
) -> Result<BandSeries, IndicatorError> {
    let center = moving_average(closes, window)?;
    let spread = rolling_std(closes, window)?;

    let (upper, lower) = center
        .iter()
        .zip(spread.iter())
        .map(|(c, s)| match (c, s) {
            (Some(c), Some(s)) => (Some(c + multiplier * s), Some(c - multiplier * s)),
            _ => (None, None),
        })
        .unzip();

    Ok(BandSeries { upper, lower })
}
