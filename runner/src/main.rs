//! Match Runner - command execution and match container teardown over HTTP

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use match_runner::web::{self, state::AppState, WebConfig};
use match_runner::{CommandPolicy, Config, RunnerService};

#[derive(Parser)]
#[command(name = "match-runner")]
#[command(about = "Run allow-listed commands and stop match containers over HTTP")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the TOML config file
    #[arg(long, short, env = "RUNNER_CONFIG_PATH", global = true)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config)
    #[arg(long, env = "RUNNER_HOST", global = true)]
    host: Option<String>,

    /// Port to bind (overrides config)
    #[arg(long, env = "RUNNER_PORT", global = true)]
    port: Option<u16>,

    /// Allow arbitrary shell commands instead of the allow-list
    #[arg(long, global = true)]
    unrestricted: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    runner_common::init_tracing("match_runner")?;

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.unrestricted {
        config.commands.policy = CommandPolicy::Unrestricted;
    }
    config.validate()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!(
                policy = ?config.commands.policy,
                runtime = %config.containers.runtime_bin,
                prefix = %config.containers.name_prefix,
                "Starting match runner"
            );
            let state = AppState::new(RunnerService::new(&config));
            let web_config = WebConfig {
                host: config.server.host.clone(),
                port: config.server.port,
            };
            web::serve(web_config, state).await?;
        }
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
