use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use pricekeep::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Keep every cache in memory for this run only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for pricekeep::AppCommand {
    fn from(cmd: Commands) -> pricekeep::AppCommand {
        match cmd {
            Commands::Install => pricekeep::AppCommand::Install,
            Commands::Activate => pricekeep::AppCommand::Activate,
            Commands::Fetch {
                url,
                method,
                destination,
            } => pricekeep::AppCommand::Fetch {
                url,
                method,
                destination,
            },
            Commands::Status => pricekeep::AppCommand::Status,
            Commands::Clear { partition } => pricekeep::AppCommand::Clear { partition },
            Commands::Prefetch { urls } => pricekeep::AppCommand::Prefetch { urls },
            Commands::Update { partition, urls } => {
                pricekeep::AppCommand::Update { partition, urls }
            }
            Commands::Sweep => pricekeep::AppCommand::Sweep,
            Commands::Enqueue { domain, payload } => {
                pricekeep::AppCommand::Enqueue { domain, payload }
            }
            Commands::Sync => pricekeep::AppCommand::Sync,
            Commands::Daemon => pricekeep::AppCommand::Daemon,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Pre-populate the static partition from the asset manifest
    Install,
    /// Remove partitions left over from previous versions
    Activate,
    /// Send one request through the cache
    Fetch {
        url: String,
        #[arg(short, long, default_value = "GET")]
        method: String,
        /// document, script, style, font, image, manifest or other
        #[arg(short, long, default_value = "other")]
        destination: String,
    },
    /// Show entry counts per partition
    Status,
    /// Delete one partition, or all of them
    Clear { partition: Option<String> },
    /// Warm the dynamic partition with the given URLs
    Prefetch {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Fetch URLs into a specific partition
    Update {
        partition: String,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Evict expired entries once
    Sweep,
    /// Queue a write for later replay
    Enqueue { domain: String, payload: String },
    /// Replay queued writes
    Sync,
    /// Serve JSON commands on stdin until EOF
    Daemon,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => pricekeep::cli::setup::setup(),
        Some(cmd) => {
            pricekeep::run_command(cmd.into(), cli.config_path.as_deref(), cli.ephemeral).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
