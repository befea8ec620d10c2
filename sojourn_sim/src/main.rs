//! Sojourn Simulator CLI
//!
//! Estimates the mean sojourn time of an M/M/c queue by repeated simulation
//! and compares it with the closed-form value.

use clap::Parser;
use sojourn_sim::scenarios::ScenarioId;
use sojourn_sim::{
    AveragingMode, ExperimentConfig, ExperimentRunner, ExperimentSample, HarnessError,
    SampleExport, SeedContext,
};
use sojourn_core::TrialConfig;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// M/M/c sojourn-time simulator
#[derive(Parser, Debug)]
#[command(name = "sojourn-sim")]
#[command(about = "Estimate queue sojourn times by repeated simulation", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of trials
    #[arg(short = 'n', long, default_value = "20")]
    trials: usize,

    /// Scenario preset (short, medium, standard, long, dual_server, overloaded)
    #[arg(short = 'S', long)]
    scenario: Option<String>,

    /// Trial duration in simulated seconds (overrides the scenario)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Arrival rate λ (overrides the scenario)
    #[arg(long)]
    arrival_rate: Option<f64>,

    /// Service rate μ per server (overrides the scenario)
    #[arg(long)]
    service_rate: Option<f64>,

    /// Number of servers (overrides the scenario)
    #[arg(long)]
    servers: Option<usize>,

    /// Average over all sojourn times seen so far instead of per trial
    #[arg(long)]
    cumulative: bool,

    /// Run trials on a thread pool
    #[arg(long)]
    parallel: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the plot series to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let builder = FmtSubscriber::builder().with_env_filter(filter);
    // In --json mode stdout carries the summary and nothing else
    let installed = if args.json {
        tracing::subscriber::set_global_default(builder.with_writer(std::io::stderr).finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    if let Err(e) = installed {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if let Err(e) = run(&args) {
        if e.is_instability() {
            error!("✗ {}: no finite sojourn time exists", e);
        } else {
            error!("✗ {}", e);
        }
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), HarnessError> {
    let scenario: Option<ScenarioId> = match &args.scenario {
        Some(name) => Some(name.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: short, medium, standard, long, dual_server, overloaded");
            std::process::exit(1);
        })),
        None => None,
    };

    let config = build_config(args, scenario);
    if !args.json {
        info!("Sojourn Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if let Some(scenario) = scenario {
            info!("Scenario {}: {}", scenario, scenario.description());
        }
    }

    let runner = ExperimentRunner::new(config);
    let sample = if args.parallel {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        rt.block_on(runner.run_parallel())?
    } else {
        runner.run()?
    };

    let scenario_name = scenario.map(|s| s.name()).unwrap_or("custom");
    let export = SampleExport::from_sample(scenario_name, &sample);

    if let Some(path) = &args.export {
        export.write_to_file(path)?;
        if !args.json {
            info!("Exported {} points to {}", export.x.len(), path);
        }
    }

    if args.json {
        println!("{}", export.to_json()?);
    } else {
        report(&sample);
    }
    Ok(())
}

/// Builds the experiment config: scenario preset, then CLI overrides.
fn build_config(args: &Args, scenario: Option<ScenarioId>) -> ExperimentConfig {
    let mut trial = scenario.map(|s| s.config()).unwrap_or_default();
    if let Some(duration) = args.duration {
        trial = trial.with_duration(duration);
    }
    if let Some(rate) = args.arrival_rate {
        trial = trial.with_arrival_rate(rate);
    }
    if let Some(rate) = args.service_rate {
        trial = trial.with_service_rate(rate);
    }
    if let Some(servers) = args.servers {
        trial = trial.with_servers(servers);
    }

    let seed = if args.seed == 0 {
        SeedContext::from_clock().seed()
    } else {
        args.seed
    };
    let averaging = if args.cumulative {
        AveragingMode::Cumulative
    } else {
        AveragingMode::PerTrial
    };

    ExperimentConfig::default()
        .with_trial(trial)
        .with_trials(args.trials)
        .with_seed(seed)
        .with_averaging(averaging)
}

fn report(sample: &ExperimentSample) {
    let trial: &TrialConfig = &sample.config.trial;
    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("Theoretical sojourn time: {:.8}s", sample.theoretical);
    info!(
        "Simulated sojourn time:   {:.8}s ± {:.8}s over {} trials",
        sample.sample_mean(),
        sample.std_dev(),
        sample.points.len()
    );
    info!("Relative error:           {:.2}%", sample.relative_error() * 100.0);
    info!("Mean service time:        {:.8}s", trial.mean_service_time());
    if !sample.excluded.is_empty() {
        info!(
            "Excluded {} empty trials: {:?}",
            sample.excluded.len(),
            sample.excluded
        );
    }
    info!("Replay with --seed {}", sample.config.seed);
}
