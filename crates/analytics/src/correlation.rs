use crate::error::AnalyticsError;
use chrono::{DateTime, Utc};
use configuration::CorrelationParams;
use core_types::{stats, CorrelationRow, Tick};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};

/// Rolling pairwise correlation of simple returns across instruments.
#[derive(Debug, Clone)]
pub struct CorrelationEngine {
    params: CorrelationParams,
}

/// One instrument's close series after the lookback cut.
struct Series {
    instrument: String,
    closes: BTreeMap<DateTime<Utc>, f64>,
}

impl CorrelationEngine {
    pub fn new(params: CorrelationParams) -> Result<Self, AnalyticsError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Computes one row per unordered instrument pair per window-end timestamp.
    ///
    /// `ticks` may interleave any number of instruments in any order. Instruments
    /// with fewer than `window` ticks after the lookback cut are left out. Pairs
    /// are emitted with `instrument_a < instrument_b`; self-pairs are never emitted.
    pub fn compute(&self, ticks: &[Tick]) -> Result<Vec<CorrelationRow>, AnalyticsError> {
        if ticks.is_empty() {
            return Err(AnalyticsError::NoData("no ticks to correlate".to_string()));
        }

        let series = self.collect_series(ticks)?;
        if series.len() < 2 {
            tracing::debug!(
                instruments = series.len(),
                "Fewer than two eligible instruments, no correlations produced"
            );
            return Ok(Vec::new());
        }

        // Union timestamp axis; an instrument without a bar at a timestamp is absent there.
        let axis: Vec<DateTime<Utc>> = series
            .iter()
            .flat_map(|s| s.closes.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let returns: Vec<Vec<Option<f64>>> = series
            .iter()
            .map(|s| {
                let aligned: Vec<Option<f64>> =
                    axis.iter().map(|ts| s.closes.get(ts).copied()).collect();
                pct_change(&aligned)
            })
            .collect();

        let window = self.params.window;
        let mut rows = Vec::new();
        for end in window.saturating_sub(1)..axis.len() {
            let start = end + 1 - window;
            for (a, b) in (0..series.len()).tuple_combinations() {
                let correlation = pairwise_complete_pearson(
                    &returns[a][start..=end],
                    &returns[b][start..=end],
                );
                rows.push(CorrelationRow {
                    instrument_a: series[a].instrument.clone(),
                    instrument_b: series[b].instrument.clone(),
                    timestamp: axis[end],
                    correlation,
                });
            }
        }

        tracing::debug!(
            instruments = series.len(),
            timestamps = axis.len(),
            rows = rows.len(),
            "Computed rolling correlations"
        );

        Ok(rows)
    }

    /// Groups ticks by instrument (sorted by name, so pair order is `a < b`) and
    /// keeps the `lookback` most recent closes of each.
    fn collect_series(&self, ticks: &[Tick]) -> Result<Vec<Series>, AnalyticsError> {
        let mut grouped: BTreeMap<&str, BTreeMap<DateTime<Utc>, f64>> = BTreeMap::new();
        for tick in ticks {
            let close = tick.close_f64()?;
            if close <= 0.0 {
                return Err(AnalyticsError::InvalidInput(format!(
                    "non-positive close for {} at {}",
                    tick.instrument, tick.timestamp
                )));
            }
            let closes = grouped.entry(tick.instrument.as_str()).or_default();
            if closes.insert(tick.timestamp, close).is_some() {
                return Err(AnalyticsError::InvalidInput(format!(
                    "duplicate tick for {} at {}",
                    tick.instrument, tick.timestamp
                )));
            }
        }

        let mut series = Vec::with_capacity(grouped.len());
        for (instrument, mut closes) in grouped {
            while closes.len() > self.params.lookback {
                closes.pop_first();
            }
            if closes.len() < self.params.window {
                tracing::info!(
                    instrument,
                    observations = closes.len(),
                    window = self.params.window,
                    "Excluding instrument with too little history from correlations"
                );
                continue;
            }
            series.push(Series { instrument: instrument.to_string(), closes });
        }
        Ok(series)
    }
}

/// Simple percentage returns; absent when either end of the step is absent.
fn pct_change(closes: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(closes.len());
    out.push(None);
    for pair in closes.windows(2) {
        out.push(match (pair[0], pair[1]) {
            (Some(prev), Some(curr)) => Some(curr / prev - 1.0),
            _ => None,
        });
    }
    out.truncate(closes.len());
    out
}

/// Pearson correlation over the positions where both series are present.
fn pairwise_complete_pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .unzip();
    stats::pearson(&xs, &ys)
}
