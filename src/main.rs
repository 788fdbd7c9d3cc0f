use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod fingerprint;
mod sandbox;
mod session;

#[derive(Parser)]
#[command(name = "berth")]
#[command(
    author,
    version,
    about = "Persistent sandbox sessions for named AI agents"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = config::CONFIG_FILE)]
    config: PathBuf,

    /// Directory holding persisted sessions (overrides the config file)
    #[arg(long, global = true, env = "BERTH_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a sandbox for an agent, or reuse the recorded one
    Up {
        /// Agent name
        agent: String,

        /// Always create a fresh sandbox and record nothing
        #[arg(long)]
        no_persist: bool,
    },

    /// Show persisted sessions
    Status {
        /// Agent name (lists all agents when omitted)
        agent: Option<String>,
    },

    /// Stop an agent's sandbox, keeping its session record
    Stop {
        /// Agent name
        agent: String,
    },

    /// Delete an agent's session record
    Forget {
        /// Agent name
        agent: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("berth=debug")
        } else {
            EnvFilter::new("berth=info")
        }
    });
    let (writer, _log_guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();

    let ctx = commands::Context::load(&cli.config, cli.state_dir)?;

    match cli.command {
        Commands::Up { agent, no_persist } => {
            commands::up::run(&ctx, &agent, !no_persist).await?;
        }
        Commands::Status { agent } => {
            commands::status::run(&ctx, agent.as_deref()).await?;
        }
        Commands::Stop { agent } => {
            commands::stop::run(&ctx, &agent).await?;
        }
        Commands::Forget { agent } => {
            commands::forget::run(&ctx, &agent).await?;
        }
    }

    Ok(())
}
