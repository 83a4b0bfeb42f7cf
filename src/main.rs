use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::Instrument;

use llm_footprint::analyzer::{Command, FootprintAnalyzer, MixSelection, ProcessOptions};
use llm_footprint::config::{get_config, Config};
use llm_footprint::forecast::{ForecastAnchor, ScenarioKey};
use llm_footprint::logging::{init_logging, new_run_id};
use llm_footprint::store::JsonFileStore;

#[derive(Parser)]
#[command(name = "llm-footprint")]
#[command(about = "Energy and CO₂ footprint of LLM usage: totals, daily series, forecasts and tiers")]
#[command(version)]
struct Cli {
    /// Directory holding footprint.json (overrides configuration)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show reconciled totals and their CO₂ equivalence
    Totals,
    /// Show energy per calendar day
    Daily {
        /// Show last N days
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Forecast daily energy
    Forecast {
        /// conservative, normal or intensive
        #[arg(long)]
        scenario: Option<ScenarioKey>,
        /// Number of days to forecast
        #[arg(long)]
        horizon: Option<usize>,
        /// Start the walk from the historical mean or the last observed day (mean, last)
        #[arg(long)]
        anchor: Option<ForecastAnchor>,
    },
    /// Compare projected monthly usage with reference tiers
    Tiers,
    /// Show the most recent exchanges
    Recent {
        /// Show last N exchanges
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Select an energy mix and recalculate stored CO₂
    Mix {
        /// Mix key, see `mixes`
        #[arg(required_unless_present = "intensity", conflicts_with = "intensity")]
        key: Option<String>,
        /// Custom carbon intensity in g/kWh
        #[arg(long)]
        intensity: Option<f64>,
    },
    /// List available energy mixes
    Mixes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = get_config();
    let json = cli.json;

    let _log_guard = init_logging(&config.logging, &config.paths.log_directory);

    let (command, options) = into_command(cli.command.unwrap_or(Commands::Totals), json);
    let span = tracing::info_span!("run", run_id = %new_run_id());

    match run(config, cli.data_dir, &command, &options).instrument(span).await {
        Ok(_) => Ok(()),
        Err(e) => handle_error(e, json),
    }
}

async fn run(
    config: &Config,
    data_dir: Option<PathBuf>,
    command: &Command,
    options: &ProcessOptions,
) -> Result<()> {
    let data_dir = data_dir.unwrap_or_else(|| config.paths.data_directory.clone());
    tracing::debug!(data_dir = %data_dir.display(), ?command, "Starting command");

    let store = JsonFileStore::in_dir(&data_dir);
    let analyzer = FootprintAnalyzer::from_config(store, config)?;
    analyzer.run_command(command, options).await
}

fn into_command(command: Commands, json: bool) -> (Command, ProcessOptions) {
    let mut options = ProcessOptions {
        json_output: json,
        ..ProcessOptions::default()
    };

    let command = match command {
        Commands::Totals => Command::Totals,
        Commands::Daily { limit } => {
            options.limit = limit;
            Command::Daily
        }
        Commands::Forecast {
            scenario,
            horizon,
            anchor,
        } => {
            options.scenario = scenario;
            options.horizon_days = horizon;
            options.anchor = anchor;
            Command::Forecast
        }
        Commands::Tiers => Command::Tiers,
        Commands::Recent { limit } => {
            options.limit = limit;
            Command::Recent
        }
        Commands::Mix { key, intensity } => match (key, intensity) {
            (Some(key), _) => Command::Mix(MixSelection::Named(key)),
            (None, Some(value)) => Command::Mix(MixSelection::Intensity(value)),
            (None, None) => Command::Mixes,
        },
        Commands::Mixes => Command::Mixes,
    };

    (command, options)
}

fn handle_error(e: anyhow::Error, json: bool) -> Result<(), anyhow::Error> {
    if json {
        println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
    } else {
        eprintln!("❌ Error: {:#}", e);
    }
    process::exit(1);
}
