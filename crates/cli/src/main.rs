//! jitctx CLI: a thin harness around the context engine.
//!
//! Commands:
//! - `load`    Assemble the context bundle for one turn
//! - `stats`   Show the skill index and configured limits
//! - `skills`  List indexed skills, or the selection for a phase
//! - `config`  Show, validate or locate configuration

use clap::{Parser, Subcommand};
use jitctx_core::Phase;

mod commands;

#[derive(Parser)]
#[command(
    name = "jitctx",
    about = "jitctx: just-in-time context assembly for AI coding workflows",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the context bundle for one conversational turn
    Load {
        /// The user's message
        input: String,

        /// Earlier turns, oldest first (repeatable)
        #[arg(long = "history", value_name = "TURN")]
        history: Vec<String>,

        /// JSON object describing the current situation (file, branch, ...)
        #[arg(long, value_name = "JSON")]
        context: Option<String>,

        /// Print the bundle and metrics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the skill index and configured budgets (static, nothing is loaded)
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List indexed skills
    Skills {
        /// Show what would be selected for this phase instead
        #[arg(short, long)]
        phase: Option<Phase>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the built-in defaults as TOML
    Defaults,
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Load {
            input,
            history,
            context,
            json,
        } => commands::load::run(&input, history, context.as_deref(), json).await?,
        Commands::Stats { json } => commands::stats::run(json).await?,
        Commands::Skills { phase } => commands::skills::run(phase).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Defaults => commands::config_cmd::defaults().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
    }

    Ok(())
}
