use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use configuration::{load_config, logging, Config, ConfigOverrides};
use core_types::Tick;
use pipeline::{BatchReport, JsonSink, Pipeline, RecordSink, SimulationOutcome};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// The main entry point for the bankvault analytics application.
fn main() -> anyhow::Result<()> {
    // Load BANKVAULT__* overrides from a .env file when one exists.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    cli.overrides.apply(&mut config);
    // Keep the guard alive so buffered file logs are flushed on exit.
    let _guard = logging::init(&config.logging)?;

    let ticks = read_ticks(&cli.input)?;
    tracing::info!(ticks = ticks.len(), input = %cli.input.display(), "Loaded tick history");

    let mut sink = JsonSink::new(&cli.out)?;

    match cli.command {
        Commands::Indicators => handle_indicators(config, &ticks, &mut sink),
        Commands::Correlations => handle_correlations(config, &ticks, &mut sink),
        Commands::Simulate(args) => handle_simulate(args, config, &ticks, &mut sink, &cli.out),
        Commands::RunAll(args) => handle_run_all(args, config, &ticks, &mut sink, &cli.out),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Technical indicators, correlations and stochastic-volatility risk simulation over daily bars.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON array of ticks to analyse.
    #[arg(long)]
    input: PathBuf,

    /// Configuration file; `config.toml` is used when present and this is omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the output tables are written to.
    #[arg(long, default_value = "output")]
    out: PathBuf,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute technical feature rows for every instrument.
    Indicators,
    /// Compute rolling pairwise correlations across instruments.
    Correlations,
    /// Calibrate, simulate and summarise the risk of one instrument.
    Simulate(SimulateArgs),
    /// Run every instrument through every engine.
    RunAll(RunAllArgs),
}

#[derive(Parser)]
struct SimulateArgs {
    /// The instrument to simulate (e.g., "AAPL").
    #[arg(long)]
    instrument: String,

    /// Base seed; takes precedence over the global --seed and the config file.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Parser)]
struct RunAllArgs {
    /// Base seed; takes precedence over the global --seed and the config file.
    #[arg(long)]
    seed: Option<u64>,
}

// ==============================================================================
// Command Handlers
// ==============================================================================

fn handle_indicators(config: Config, ticks: &[Tick], sink: &mut JsonSink) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(config)?.with_progress(true);
    let rows = pipeline.compute_indicators(ticks)?;
    let inserted = sink.insert_or_ignore(&rows)?;
    println!("Computed {} feature rows ({} new).", rows.len(), inserted);
    Ok(())
}

fn handle_correlations(config: Config, ticks: &[Tick], sink: &mut JsonSink) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(config)?;
    let rows = pipeline.compute_correlations(ticks)?;
    let inserted = sink.insert_or_ignore(&rows)?;
    let undefined = rows.iter().filter(|row| !row.is_defined()).count();
    println!(
        "Computed {} correlation rows ({} new, {} undefined).",
        rows.len(),
        inserted,
        undefined
    );
    Ok(())
}

fn handle_simulate(
    args: SimulateArgs,
    mut config: Config,
    ticks: &[Tick],
    sink: &mut JsonSink,
    out: &Path,
) -> anyhow::Result<()> {
    if args.seed.is_some() {
        config.simulation.seed = args.seed;
    }
    let pipeline = Pipeline::new(config)?;
    let base_seed = pipeline.base_seed();
    let outcome = pipeline.simulate_one(ticks, &args.instrument, base_seed)?;

    sink.insert_or_ignore(&outcome.report.summary)?;
    sink.insert_or_ignore(&outcome.report.step_volatility)?;
    write_json(&out.join(format!("simulation_{}.json", args.instrument)), &outcome)?;

    print_outcome(&outcome);
    Ok(())
}

fn handle_run_all(
    args: RunAllArgs,
    mut config: Config,
    ticks: &[Tick],
    sink: &mut JsonSink,
    out: &Path,
) -> anyhow::Result<()> {
    if args.seed.is_some() {
        config.simulation.seed = args.seed;
    }
    let pipeline = Pipeline::new(config)?.with_progress(true);
    let report = pipeline.run_all(ticks, sink)?;
    write_json(&out.join("batch_report.json"), &report)?;

    print_batch(&report);
    Ok(())
}

// ==============================================================================
// Input / Output
// ==============================================================================

fn read_ticks(path: &Path) -> anyhow::Result<Vec<Tick>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let ticks = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not a JSON array of ticks", path.display()))?;
    Ok(ticks)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    tracing::info!(path = %path.display(), "Wrote report");
    Ok(())
}

fn metrics_table(title: &str, values: &BTreeMap<String, f64>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![title, "Value"]);
    for (name, value) in values {
        table.add_row(vec![Cell::new(name), Cell::new(format!("{:.6}", value))]);
    }
    table
}

fn print_outcome(outcome: &SimulationOutcome) {
    let params = outcome.calibration.params();
    println!(
        "{} from {} (seed {}): v0={:.4} theta={:.4} kappa={:.3} xi={:.3} rho={:.3} mu={:.4}",
        outcome.instrument,
        outcome.start.format("%Y-%m-%d"),
        outcome.seed,
        params.v0,
        params.theta,
        params.kappa,
        params.xi,
        params.rho,
        params.mu
    );
    if let simulation::Calibration::Fallback { reason, .. } = &outcome.calibration {
        println!("Calibration fell back to defaults: {}", reason);
    }
    if let Some(adjustment) = &outcome.feller_adjustment {
        println!(
            "Feller condition violated: xi lowered from {:.4} to {:.4}",
            adjustment.original_xi, adjustment.adjusted_xi
        );
    }
    println!("{}", metrics_table("Risk metric", &outcome.report.metrics.to_map()));
    println!("{}", metrics_table("Sensitivity", &outcome.report.sensitivities.to_map()));
    println!("{}", metrics_table("Simulation quality", &outcome.quality.to_map()));
}

fn print_batch(report: &BatchReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Instrument", "Calibration", "VaR 5%", "CVaR 5%", "Sharpe", "Max DD (mean)"]);
    for outcome in &report.simulations {
        let metrics = outcome.report.metrics.to_map();
        let value = |key: &str| {
            metrics
                .get(key)
                .map(|v| format!("{:.4}", v))
                .unwrap_or_else(|| "-".to_string())
        };
        let calibration = if outcome.calibration.is_fallback() { "fallback" } else { "calibrated" };
        table.add_row(vec![
            Cell::new(&outcome.instrument),
            Cell::new(calibration),
            Cell::new(value("VaR_5%")),
            Cell::new(value("CVaR_5%")),
            Cell::new(value("sharpe_ratio")),
            Cell::new(value("max_drawdown_mean")),
        ]);
    }
    println!("{}", table);

    println!(
        "Base seed {}: {} instruments, {} feature rows, {} correlation rows, {} summary rows, {} volatility rows.",
        report.base_seed,
        report.instruments,
        report.feature_rows,
        report.correlation_rows,
        report.summary_rows,
        report.volatility_rows
    );
    for failure in &report.failures {
        eprintln!("{} failed during {}: {}", failure.instrument, failure.stage, failure.error);
    }
}
