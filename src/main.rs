use anyhow::Result;
use clap::{Parser, Subcommand};

use guardrail_console::config;

mod cli;

#[derive(Debug, Parser)]
#[command(name = "guardrail")]
#[command(about = "Operator console for a guardrail redaction backend")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan a prompt and compare raw vs redacted output
    Scan {
        /// The prompt text
        #[arg(trailing_var_arg = true, required = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Send a chat message through the guardrail
    Chat {
        /// The message text
        #[arg(trailing_var_arg = true, required = true, allow_hyphen_values = true)]
        message: Vec<String>,
        /// User label to send instead of the configured one
        #[arg(long)]
        user: Option<String>,
    },
    /// Show KPI cards and recent incidents
    Dashboard {
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Poll the backend until it wakes up or the deadline passes
    Wake,
    /// Check configuration and probe the backend once
    Health,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write the default config to ~/.guardrail/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let app = App::parse();
    let cfg = config::load();
    init_logging(&cfg.logging.level);

    match app.command {
        Commands::Scan { prompt } => cli::run_scan(&cfg, &prompt.join(" ")),
        Commands::Chat { message, user } => {
            cli::run_chat(&cfg, user.as_deref(), &message.join(" "))
        }
        Commands::Dashboard { format } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_dashboard(&cfg, fmt)
        }
        Commands::Wake => cli::run_wake(&cfg),
        Commands::Health => cli::run_health(&cfg),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
        },
    }
}

/// `RUST_LOG`, when set, overrides the configured level.
fn init_logging(level: &str) {
    let filter = level.parse().unwrap_or(log::LevelFilter::Warn);
    env_logger::Builder::new()
        .filter_level(filter)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}
