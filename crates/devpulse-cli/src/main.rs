// DevPulse CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json output formats for scripting.
// Design Decision: `tail` drives the same live feeds a dashboard would, so the
// buffer, dedup and reconnect behaviour can be watched from a terminal.

mod client;
mod commands;
mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use devpulse_core::EndpointConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "devpulse")]
#[command(about = "DevPulse CLI - Follow live logs and alerts, query history")]
#[command(version)]
pub struct Cli {
    /// API base URL
    #[arg(
        long,
        env = "DEVPULSE_API_URL",
        default_value = EndpointConfig::DEFAULT_API_URL
    )]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json"])]
    pub output: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Follow a live feed until interrupted
    Tail {
        #[arg(value_enum)]
        feed: commands::tail::TailFeed,
    },

    /// Query stored logs
    Logs {
        #[command(subcommand)]
        command: commands::logs::LogsCommand,
    },

    /// Query stored alerts
    Alerts {
        #[command(subcommand)]
        command: commands::alerts::AlertsCommand,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devpulse=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let output_format = output::OutputFormat::from_str(&cli.output);

    // The flag wins over the environment for the API base URL
    let api_url = cli.api_url.clone();
    let endpoints = EndpointConfig::from_lookup(|key| match key {
        "DEVPULSE_API_URL" => Some(api_url.clone()),
        _ => std::env::var(key).ok(),
    })
    .context("Invalid configuration")?;

    match cli.command {
        Commands::Tail { feed } => commands::tail::run(feed, &endpoints, output_format).await,
        Commands::Logs { command } => {
            let client = client::Client::new(&endpoints.api_url)?;
            commands::logs::run(command, &client, output_format).await
        }
        Commands::Alerts { command } => {
            let client = client::Client::new(&endpoints.api_url)?;
            commands::alerts::run(command, &client, output_format).await
        }
    }
}
