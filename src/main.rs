//! NUMEROX: Numerai tournament client
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the HTTP gateway and dispatches one subcommand. Tables go to
//! stdout, logs to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use numerox::config::{self, AppConfig};
use numerox::engine::dataset;
use numerox::engine::earnings::EarningsAggregator;
use numerox::engine::poller::{upload_status, TokioClock};
use numerox::engine::stakes::{self, StakeSort};
use numerox::gateway::numerai::NumeraiClient;
use numerox::gateway::TournamentGateway;
use numerox::report::{self, TableRow};

#[derive(Parser)]
#[command(name = "numerox", about = "Numerai tournament client")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = config::CONFIG_PATH)]
    config: String,

    /// Print tables as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the current dataset (overwrites the file)
    Download { path: PathBuf },

    /// Upload a predictions file and, by default, wait for scoring
    Upload {
        path: PathBuf,
        /// Return right after the upload instead of waiting
        #[arg(long)]
        no_block: bool,
    },

    /// Show the current status of an upload
    Status { upload_id: String },

    /// Stake leaderboard in prize-pool order
    Stakes {
        #[arg(long)]
        round: Option<u32>,
        /// One of: "prize pool", c, soc, s, days, user
        #[arg(long, default_value = "prize pool")]
        sort_by: String,
    },

    /// Payouts per user and round
    Earnings {
        #[arg(long)]
        start: Option<u32>,
        #[arg(long)]
        end: Option<u32>,
    },

    /// Controlling-capital leaderboard per round
    Leaderboard {
        #[arg(long)]
        start: Option<u32>,
        #[arg(long)]
        end: Option<u32>,
    },

    /// A user's earnings for a tax year
    Ten99 { user: String, year: i32 },

    /// Print the current round number
    Round,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let args = Args::parse();
    let cfg = AppConfig::load_or_default(&args.config)?;

    init_logging();
    info!(api = %cfg.api.url, "numerox starting");

    let client = NumeraiClient::new(&cfg.api)?;
    run(&args, &cfg, &client).await
}

async fn run(args: &Args, cfg: &AppConfig, gateway: &dyn TournamentGateway) -> Result<()> {
    match &args.command {
        Command::Download { path } => {
            let written = dataset::download_dataset(gateway, path).await?;
            println!("Downloaded dataset to {}", written.display());
        }
        Command::Upload { path, no_block } => {
            let creds = cfg.credentials()?;
            let verbose = cfg.poll.verbose && !args.json;
            let (upload_id, status) =
                dataset::upload(gateway, &TokioClock, path, &creds, !no_block, verbose).await?;
            if args.json {
                report::print_json(&serde_json::json!({
                    "upload_id": upload_id,
                    "status": status,
                }))?;
            } else {
                println!("upload id: {upload_id}");
            }
        }
        Command::Status { upload_id } => {
            let creds = cfg.credentials()?;
            let status = upload_status(gateway, upload_id, &creds).await?;
            if args.json {
                report::print_json(&status)?;
            } else {
                for (metric, value) in status.iter() {
                    println!("{metric:<19} {value}");
                }
            }
        }
        Command::Stakes { round, sort_by } => {
            let sort: StakeSort = sort_by.parse()?;
            let table = stakes::get_stakes(gateway, *round).await?;
            if args.json {
                report::print_json(&table)?;
            } else {
                println!("{}", stakes::render_stakes(&table, sort));
            }
        }
        Command::Earnings { start, end } => {
            let rows = aggregator(cfg, gateway)
                .download_earnings(*start, *end)
                .await?;
            emit(&rows, args.json)?;
        }
        Command::Leaderboard { start, end } => {
            let rows = aggregator(cfg, gateway).get_leaderboard(*start, *end).await?;
            emit(&rows, args.json)?;
        }
        Command::Ten99 { user, year } => {
            let rows = aggregator(cfg, gateway).ten99(user, *year).await?;
            emit(&rows, args.json)?;
        }
        Command::Round => {
            let round = gateway.get_current_round().await?;
            println!("{round}");
        }
    }
    Ok(())
}

fn aggregator<'a>(cfg: &AppConfig, gateway: &'a dyn TournamentGateway) -> EarningsAggregator<'a> {
    EarningsAggregator::new(gateway).with_concurrency(cfg.fetch.concurrency)
}

fn emit<T: TableRow + serde::Serialize>(rows: &[T], json: bool) -> Result<()> {
    if json {
        report::print_json(rows)
    } else {
        println!("{}", report::render(rows));
        Ok(())
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("numerox=info"));

    let json_logging = std::env::var("NUMEROX_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
