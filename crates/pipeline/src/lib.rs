//! # Batch Pipeline
//!
//! Runs the indicator, correlation and simulation engines over a mixed
//! multi-instrument history and hands the resulting rows to a `RecordSink`.

use crate::seed::instrument_seed;
use analytics::{CorrelationEngine, RiskAggregator, RiskReport, SimulationQuality};
use chrono::{DateTime, Duration, Utc};
use configuration::Config;
use core_types::{CorrelationRow, RiskSummaryRow, StepVolatilityRow, TechnicalFeatureRow, Tick};
use indicatif::{ProgressBar, ProgressStyle};
use indicators::IndicatorEngine;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use simulation::{Calibration, FellerAdjustment, PathSimulator, VolatilityCalibrator};
use std::collections::BTreeMap;

pub mod error;
pub mod seed;
pub mod sink;

pub use error::PipelineError;
pub use sink::{JsonSink, MemorySink, RecordSink};

/// Everything produced by calibrating, simulating and aggregating one instrument.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutcome {
    pub instrument: String,
    /// The seed of this instrument's random stream.
    pub seed: u64,
    pub calibration: Calibration,
    pub feller_adjustment: Option<FellerAdjustment>,
    pub start: DateTime<Utc>,
    pub report: RiskReport,
    /// Simulated return moments set against the calibration history.
    pub quality: SimulationQuality,
}

/// An instrument whose processing failed at one stage; the rest of the batch continues.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentFailure {
    pub instrument: String,
    pub stage: &'static str,
    pub error: String,
}

/// The result of a full `run_all` pass.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub base_seed: u64,
    pub instruments: usize,
    pub feature_rows: usize,
    pub correlation_rows: usize,
    pub summary_rows: usize,
    pub volatility_rows: usize,
    pub simulations: Vec<SimulationOutcome>,
    pub failures: Vec<InstrumentFailure>,
}

/// Splits a mixed tick list into per-instrument histories, each sorted by timestamp.
pub fn group_by_instrument(ticks: &[Tick]) -> BTreeMap<String, Vec<Tick>> {
    let mut grouped: BTreeMap<String, Vec<Tick>> = BTreeMap::new();
    for tick in ticks {
        grouped.entry(tick.instrument.clone()).or_default().push(tick.clone());
    }
    for history in grouped.values_mut() {
        history.sort_by_key(|tick| tick.timestamp);
    }
    grouped
}

/// Drives the engines over a multi-instrument history.
///
/// Instruments are independent jobs on the rayon pool; each simulation job owns
/// a `StdRng` seeded from the base seed and the instrument id.
pub struct Pipeline {
    config: Config,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config, show_progress: false })
    }

    /// Draw a progress bar on stderr while instruments are processed.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The configured seed, or a fresh random one when none is set.
    pub fn base_seed(&self) -> u64 {
        self.config.simulation.seed.unwrap_or_else(rand::random)
    }

    /// Technical feature rows for every instrument, in instrument then timestamp order.
    pub fn compute_indicators(&self, ticks: &[Tick]) -> Result<Vec<TechnicalFeatureRow>, PipelineError> {
        let groups = group_by_instrument(ticks);
        let mut rows = Vec::new();
        for (_, result) in self.indicator_jobs(&groups)? {
            rows.extend(result?);
        }
        Ok(rows)
    }

    pub fn compute_correlations(&self, ticks: &[Tick]) -> Result<Vec<CorrelationRow>, PipelineError> {
        let engine = CorrelationEngine::new(self.config.correlation.clone())?;
        Ok(engine.compute(ticks)?)
    }

    /// Calibrates, simulates and aggregates one instrument from its own history.
    pub fn simulate_instrument(
        &self,
        instrument: &str,
        history: &[Tick],
        base_seed: u64,
    ) -> Result<SimulationOutcome, PipelineError> {
        let calibration = VolatilityCalibrator::new(self.config.calibration.clone()).calibrate(history)?;
        let params = *calibration.params();

        let seed = instrument_seed(base_seed, instrument);
        let mut rng = StdRng::seed_from_u64(seed);
        let ensemble = PathSimulator::new(self.config.simulation.clone())?
            .simulate(&params, params.spot, &mut rng)?;

        let last = history
            .last()
            .ok_or_else(|| PipelineError::UnknownInstrument(instrument.to_string()))?;
        let start = last.timestamp + Duration::days(1);
        let aggregator = RiskAggregator::new(self.config.risk.clone());
        let report = aggregator.aggregate(instrument, &ensemble, params.spot, start)?;
        let quality = aggregator.assess_quality(history, &ensemble)?;

        Ok(SimulationOutcome {
            instrument: instrument.to_string(),
            seed,
            calibration,
            feller_adjustment: ensemble.feller_adjustment,
            start,
            report,
            quality,
        })
    }

    /// Runs `simulate_instrument` for the one instrument named in a mixed tick list.
    pub fn simulate_one(
        &self,
        ticks: &[Tick],
        instrument: &str,
        base_seed: u64,
    ) -> Result<SimulationOutcome, PipelineError> {
        let history: Vec<Tick> = ticks.iter().filter(|t| t.instrument == instrument).cloned().collect();
        if history.is_empty() {
            return Err(PipelineError::UnknownInstrument(instrument.to_string()));
        }
        let history = group_by_instrument(&history).remove(instrument).unwrap_or_default();
        self.simulate_instrument(instrument, &history, base_seed)
    }

    /// Every engine over every instrument, with the rows handed to `sink`.
    ///
    /// A failing instrument is logged and reported in `BatchReport::failures`;
    /// it does not stop the others.
    pub fn run_all<S: RecordSink>(&self, ticks: &[Tick], sink: &mut S) -> Result<BatchReport, PipelineError> {
        let groups = group_by_instrument(ticks);
        let base_seed = self.base_seed();
        tracing::info!(
            instruments = groups.len(),
            base_seed,
            threads = rayon::current_num_threads(),
            "Starting batch run"
        );

        let mut failures = Vec::new();

        let mut features = Vec::new();
        for (instrument, result) in self.indicator_jobs(&groups)? {
            match result {
                Ok(rows) => features.extend(rows),
                Err(e) => failures.push(failure(instrument, "indicators", e)),
            }
        }
        let feature_rows = sink.insert_or_ignore(&features)?;

        let correlations = self.compute_correlations(ticks)?;
        let correlation_rows = sink.insert_or_ignore(&correlations)?;

        let mut simulations = Vec::new();
        for (instrument, result) in self.simulation_jobs(&groups, base_seed)? {
            match result {
                Ok(outcome) => simulations.push(outcome),
                Err(e) => failures.push(failure(instrument, "simulation", e)),
            }
        }
        // Each table gets a single insert per batch.
        let summaries: Vec<RiskSummaryRow> =
            simulations.iter().flat_map(|o| o.report.summary.iter().cloned()).collect();
        let volatilities: Vec<StepVolatilityRow> =
            simulations.iter().flat_map(|o| o.report.step_volatility.iter().cloned()).collect();
        let summary_rows = sink.insert_or_ignore(&summaries)?;
        let volatility_rows = sink.insert_or_ignore(&volatilities)?;

        tracing::info!(
            feature_rows,
            correlation_rows,
            summary_rows,
            volatility_rows,
            failures = failures.len(),
            "Batch run complete"
        );

        Ok(BatchReport {
            base_seed,
            instruments: groups.len(),
            feature_rows,
            correlation_rows,
            summary_rows,
            volatility_rows,
            simulations,
            failures,
        })
    }

    fn indicator_jobs<'a>(
        &self,
        groups: &'a BTreeMap<String, Vec<Tick>>,
    ) -> Result<Vec<(&'a str, Result<Vec<TechnicalFeatureRow>, PipelineError>)>, PipelineError> {
        let engine = IndicatorEngine::new(self.config.indicators.clone())?;
        let progress_bar = self.progress_bar(groups.len(), "indicators")?;
        let jobs: Vec<(&'a str, &'a [Tick])> =
            groups.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();

        let results: Vec<_> = jobs
            .par_iter()
            .map(|&(instrument, history)| {
                let result = engine.compute(history).map_err(PipelineError::from);
                progress_bar.inc(1);
                (instrument, result)
            })
            .collect();

        progress_bar.finish_and_clear();
        Ok(results)
    }

    fn simulation_jobs<'a>(
        &self,
        groups: &'a BTreeMap<String, Vec<Tick>>,
        base_seed: u64,
    ) -> Result<Vec<(&'a str, Result<SimulationOutcome, PipelineError>)>, PipelineError> {
        let progress_bar = self.progress_bar(groups.len(), "simulations")?;
        let jobs: Vec<(&'a str, &'a [Tick])> =
            groups.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();

        let results: Vec<_> = jobs
            .par_iter()
            .map(|&(instrument, history)| {
                let result = self.simulate_instrument(instrument, history, base_seed);
                progress_bar.inc(1);
                (instrument, result)
            })
            .collect();

        progress_bar.finish_and_clear();
        Ok(results)
    }

    fn progress_bar(&self, len: usize, label: &'static str) -> Result<ProgressBar, PipelineError> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let progress_bar = ProgressBar::new(len as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("=>-"),
        );
        progress_bar.set_message(label);
        Ok(progress_bar)
    }
}

fn failure(instrument: &str, stage: &'static str, error: PipelineError) -> InstrumentFailure {
    tracing::error!(instrument, stage, error = %error, "Instrument failed");
    InstrumentFailure { instrument: instrument.to_string(), stage, error: error.to_string() }
}
