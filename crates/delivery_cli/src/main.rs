//! delivery-sim: run delivery marketplace scenarios from JSON files.

mod batch;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use delivery_core::scenario::build_environment;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::batch::{load_scenario, run_replications};

#[derive(Parser, Debug)]
#[command(name = "delivery-sim")]
#[command(about = "Discrete-event simulation of a food delivery marketplace", long_about = None)]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario and print the results as JSON
    Run(RunArgs),
    /// Build a scenario without running it
    Validate {
        #[arg(short, long, env = "DELIVERY_SCENARIO")]
        scenario: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Scenario file (JSON)
    #[arg(short, long, env = "DELIVERY_SCENARIO")]
    scenario: PathBuf,

    /// Overrides the scenario seed; replication i uses seed + i
    #[arg(long)]
    seed: Option<u64>,

    #[arg(short, long, default_value_t = 1)]
    replications: usize,

    /// Hard stop after this many dispatched events per replication
    #[arg(long)]
    max_events: Option<u64>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let params = load_scenario(&args.scenario, args.seed, args.max_events)?;
    info!(
        scenario = %args.scenario.display(),
        seed = params.seed,
        replications = args.replications,
        "running scenario"
    );
    let report = run_replications(&params, args.replications.max(1))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn validate(scenario: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let params = load_scenario(&scenario, None, None)?;
    let env = build_environment(&params)?;
    info!(
        scenario = %scenario.display(),
        agents = env.agents().count(),
        sessions = env.sessions().sessions().len(),
        pending_events = env.pending_events(),
        "scenario is valid"
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Command::Run(args) => run(args),
        Command::Validate { scenario } => validate(scenario),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
