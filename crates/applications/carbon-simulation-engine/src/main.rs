//! Carbon Simulation Engine CLI
//!
//! Command-line interface for comparing carbon-aware routing policies

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carbon_simulation_engine::{SimConfig, Simulator, report};

#[derive(Parser, Debug)]
#[command(name = "carbon-sim")]
#[command(about = "Simulate carbon-aware routing of AI inference requests", long_about = None)]
struct Args {
    /// JSON configuration file (defaults to the built-in scenario)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulation duration in hours
    #[arg(long)]
    hours: Option<usize>,

    /// Requests generated per simulated hour
    #[arg(long)]
    reqs_per_hour: Option<usize>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for output tables
    #[arg(short, long, default_value = "outputs")]
    output_dir: PathBuf,

    /// Also write full results as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Print the built-in configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn load_config(args: &Args) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SimConfig::default(),
    };

    if let Some(hours) = args.hours {
        config.simulation.hours = hours;
    }
    if let Some(rph) = args.reqs_per_hour {
        config.simulation.requests_per_hour = rph;
    }
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carbon_sim=info,carbon_simulation_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&SimConfig::default())?);
        return Ok(());
    }

    let config = load_config(&args)?;
    let p = &config.simulation;

    println!("Configuration:");
    println!("  Duration: {} hours", p.hours);
    println!("  Requests/hour: {}", p.requests_per_hour);
    println!("  Seed: {}", p.seed);
    println!("  Regions: {}", config.region_names().join(", "));
    println!("  Hybrid alphas: {:?}\n", p.hybrid_alphas);

    let simulator = Simulator::new(config).context("Failed to build simulation")?;
    let report = simulator.run_all();

    println!(
        "{:<22} {:>10} {:>10} {:>10} {:>12} {:>12}",
        "Policy", "Avg (ms)", "P95 (ms)", "SLO viol%", "Avg carbon", "Reduction%"
    );
    println!("{}", "-".repeat(81));
    for result in &report.results {
        println!(
            "{:<22} {:>10.1} {:>10.1} {:>10.2} {:>12.1} {:>12.1}",
            result.policy_name,
            result.mean_latency_ms,
            result.p95_latency_ms,
            result.slo_violation_rate,
            result.mean_carbon,
            result.carbon_reduction,
        );
    }

    let paths = report::write_outputs(
        &args.output_dir,
        &report,
        simulator.carbon_trace(),
        simulator.latency_matrix(),
    )
    .with_context(|| format!("Failed to write outputs to {}", args.output_dir.display()))?;

    if let Some(json_path) = &args.json {
        report::write_json(json_path, &report)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;
    }

    info!(results = %paths.results.display(), "Simulation complete");
    Ok(())
}
