mod cli;
mod core;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "costwatch",
    about = "Daily cloud cost check with Slack notifications",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: $XDG_CONFIG_HOME/costwatch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check yesterday's cost and notify Slack
    Check {
        /// Provider to check (aws|gcp|gcp_budgets|digitalocean)
        #[arg(short, long)]
        provider: Option<String>,

        /// Threshold in USD, overriding environment and config
        #[arg(short, long)]
        threshold: Option<String>,

        /// Print the message instead of posting it
        #[arg(long)]
        dry_run: bool,
    },
    /// Run checks on HTTP requests to /check
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "0.0.0.0:8080")]
        bind: String,

        /// Provider checked when the request does not name one
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init {
        /// Default provider to record
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// Validate config file
    Check,
    /// Print the effective config
    Show,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "costwatch=debug" } else { "costwatch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output_opts = cli::output::OutputOptions {
        format: if cli.json {
            cli::output::OutputFormat::Json
        } else {
            match cli.format.as_deref() {
                Some("json") => cli::output::OutputFormat::Json,
                _ => cli::output::OutputFormat::Text,
            }
        },
        pretty: cli.pretty,
        use_color: cli::output::detect_color(!cli.no_color),
        verbose: cli.verbose,
    };
    let config_path = cli.config.as_deref();

    match cli.command {
        None | Some(Commands::Check { .. }) => {
            let args = match cli.command {
                Some(Commands::Check {
                    provider,
                    threshold,
                    dry_run,
                }) => cli::check_cmd::CheckArgs {
                    provider,
                    threshold,
                    dry_run,
                },
                _ => cli::check_cmd::CheckArgs::default(),
            };
            let code = cli::check_cmd::run(args, config_path, &output_opts).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Some(Commands::Serve { bind, provider }) => {
            let config = cli::check_cmd::load_config(config_path);
            cli::serve_cmd::run(&bind, config, provider).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { provider } => {
                cli::config_cmd::init(config_path, provider.as_deref(), &output_opts)?
            }
            ConfigAction::Check => cli::config_cmd::check(config_path, &output_opts)?,
            ConfigAction::Show => cli::config_cmd::show(config_path, &output_opts)?,
        },
    }

    Ok(())
}
