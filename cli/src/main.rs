use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coldmail::{Campaign, CampaignConfig, Trigger};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coldmail", about = "One cold-outreach email per invocation")]
struct Cli {
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbosity: u8,

    /// Read settings from this file instead of `./.env`.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API for an external scheduler.
    Serve {
        /// Overrides PORT.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Send to the next contact if the business-hours gate allows it.
    #[command(alias = "cron")]
    SendNext,
    /// Send to the next contact now, marked as a manual test.
    TestEmail,
    /// Show list, cursor and credential state.
    Status,
    /// List the next few contacts without sending.
    Preview,
    /// Move the cursor back to the first contact.
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let default_level = match cli.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = &cli.env_file {
        dotenvy::from_path(path).with_context(|| format!("reading {}", path.display()))?;
    }
    let config = CampaignConfig::load().context("loading configuration")?;
    let campaign = Arc::new(Campaign::from_config(&config));

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            coldmail::serve_campaign(campaign, port)
                .await
                .context("error running HTTP server")?;
        }
        Commands::SendNext => dispatch(&campaign, Trigger::Scheduled).await?,
        Commands::TestEmail => dispatch(&campaign, Trigger::Manual).await?,
        Commands::Status => print_json(&campaign.status().await)?,
        Commands::Preview => print_json(&campaign.preview().await?)?,
        Commands::Reset => {
            let report = campaign.reset().await?;
            tracing::info!(counter_file = %campaign.counter_location(), "counter reset to 0");
            print_json(&report)?;
        }
    }
    Ok(())
}

async fn dispatch(campaign: &Campaign, trigger: Trigger) -> Result<()> {
    let report = campaign.send_next(trigger).await?;
    report.trace();
    print_json(&report)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serializing result")?;
    println!("{text}");
    Ok(())
}
