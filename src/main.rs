//! Command line entry point for the bridge ladder
//!
//! Ingests friend challenges, applies them to a ratings snapshot, and deals
//! tournament teams from the stored ratings.

use anyhow::{Context, Result};
use bridge_ladder::config::{validate_config, AppConfig};
use bridge_ladder::rating::InMemoryRatingStorage;
use bridge_ladder::service::{LadderService, ReportRating};
use bridge_ladder::tournament::TeamAssigner;
use bridge_ladder::types::MatchReport;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Bridge Ladder - friend challenge ratings and balanced team tournaments
#[derive(Parser)]
#[command(
    name = "bridge-ladder",
    version,
    about = "Rate friend challenge results and deal balanced tournament teams",
    long_about = "Bridge Ladder reads friend challenge results pages from the trusted results host, \
                 keeps a Bayesian skill belief for every competitor, and splits tournament entrants \
                 into teams that each draw from every skill tier."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Ratings snapshot
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "JSON ratings snapshot to read and update"
    )]
    ratings: Option<PathBuf>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without running a command")]
    dry_run: bool,

    /// Print metrics after the command
    #[arg(long, help = "Print Prometheus metrics to stderr when done")]
    print_metrics: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and parse a friend challenge matchlink
    Ingest {
        #[arg(value_name = "URL")]
        matchlink: String,

        /// Rate the match and update the ratings snapshot
        #[arg(long)]
        apply: bool,
    },
    /// Parse a results page saved to disk
    Parse {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Rate the match and update the ratings snapshot
        #[arg(long)]
        apply: bool,
    },
    /// Deal competitors onto balanced teams
    Teams {
        /// Number of teams (defaults to the configured value)
        #[arg(short, long)]
        teams: Option<usize>,

        /// Seed for a reproducible deal
        #[arg(short, long)]
        seed: Option<u64>,

        #[arg(value_name = "COMPETITOR", required = true)]
        competitors: Vec<String>,
    },
    /// Show standings by conservative estimate
    Ratings,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    validate_config(&config)?;
    Ok(config)
}

fn load_storage(path: Option<&Path>) -> Result<Arc<InMemoryRatingStorage>> {
    let storage = match path {
        Some(path) => {
            info!("Loading ratings from {}", path.display());
            InMemoryRatingStorage::load_snapshot(path)?
        }
        None => InMemoryRatingStorage::new(),
    };
    Ok(Arc::new(storage))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn apply(
    service: &LadderService,
    storage: &InMemoryRatingStorage,
    snapshot: Option<&Path>,
    report: &MatchReport,
) -> Result<()> {
    match service.apply_report(report).await? {
        ReportRating::Rated(result) => print_json(&result.rating_changes)?,
        ReportRating::Tied => println!("Tied match: ratings unchanged"),
    }

    match snapshot {
        Some(path) => {
            storage.save_snapshot(path)?;
            info!("Saved ratings to {}", path.display());
        }
        None => info!("No ratings file given; updated ratings are not kept"),
    }
    Ok(())
}

async fn run(args: &Args, config: AppConfig) -> Result<Arc<LadderService>> {
    let storage = load_storage(args.ratings.as_deref())?;
    let service = Arc::new(LadderService::from_config(config, storage.clone())?);
    let snapshot = args.ratings.as_deref();

    match &args.command {
        Some(Command::Ingest { matchlink, apply: rate }) => {
            let report = service.ingest_challenge(matchlink).await?;
            print_json(&report)?;
            if *rate {
                apply(&service, &storage, snapshot, &report).await?;
            }
        }
        Some(Command::Parse { file, apply: rate }) => {
            let document = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let report = service.ingest_document(&document)?;
            print_json(&report)?;
            if *rate {
                apply(&service, &storage, snapshot, &report).await?;
            }
        }
        Some(Command::Teams {
            teams,
            seed,
            competitors,
        }) => {
            let mut tournament_config = service.config().tournament.clone();
            if let Some(teams) = teams {
                tournament_config.number_of_teams = *teams;
            }
            service.open_tournament_with("command line", &tournament_config)?;
            for competitor in competitors {
                service.signup(competitor)?;
            }

            let mut assigner = match seed {
                Some(seed) => TeamAssigner::with_seed(*seed),
                None => TeamAssigner::from_entropy(),
            };
            service.start_active_tournament(&mut assigner)?;
            let tournament = service
                .active_tournament()?
                .context("Started tournament is no longer active")?;
            for team in 0..tournament.number_of_teams {
                let members: Vec<&str> = tournament.team(team).into_iter().map(String::as_str).collect();
                println!("Team {}: {}", team + 1, members.join(", "));
            }
        }
        Some(Command::Ratings) => {
            for (rank, entry) in service.standings()?.iter().enumerate() {
                println!(
                    "{:>3}. {:<20} {:>8.1}  (mean {:.1}, stddev {:.1}, {} matches)",
                    rank + 1,
                    entry.competitor_id,
                    entry.belief.conservative_estimate(),
                    entry.belief.mean,
                    entry.belief.stddev,
                    entry.matches_played
                );
            }
        }
        None => info!("No command given"),
    }

    Ok(service)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        info!("   Service: {}", config.service.name);
        info!("   Trusted host: {}", config.source.trusted_host);
        info!(
            "   Prior: mean {} stddev {}",
            config.rating.initial_mean, config.rating.initial_stddev
        );
        info!("Dry run completed - exiting without running a command");
        return Ok(());
    }

    match run(&args, config).await {
        Ok(service) => {
            if args.print_metrics {
                eprintln!("{}", service.metrics().gather_text()?);
            }
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
