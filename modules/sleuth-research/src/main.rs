use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sleuth_common::{duration_from_minutes, Config, InitialContext, ResearchOutput};
use sleuth_research::Researcher;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sleuth", about = "Automated web research: people profiles and topic summaries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a free-text query and research it
    Query {
        /// The research question
        text: String,
    },
    /// Build an identity-verified profile of a person
    Person {
        #[arg(long)]
        name: String,
        /// What the person is known for
        #[arg(long, default_value = "")]
        known_for: String,
        /// Time budget in minutes (defaults to RESEARCH_DURATION_MINUTES)
        #[arg(long)]
        minutes: Option<u64>,
    },
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("sleuth=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if std::env::var("SLEUTH_LOG_JSON").is_ok_and(|v| v == "1") {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing with what has been gathered");
                cancel.cancel();
            }
        });
    }

    let researcher = Researcher::from_config(&config)
        .context("Failed to set up research collaborators")?
        .with_cancellation(cancel);

    let output = match cli.command {
        Command::Query { text } => {
            info!(query = %text, "Research query");
            researcher.research_query(&text).await
        }
        Command::Person { name, known_for, minutes } => {
            let duration = match minutes {
                Some(m) => match duration_from_minutes(m) {
                    Some(duration) => duration,
                    None => {
                        eprintln!("--minutes is too large: {m}");
                        return Ok(ExitCode::FAILURE);
                    }
                },
                None => researcher.settings().duration,
            };
            let profile = researcher
                .research_person(&InitialContext::new(name, known_for), duration)
                .await;
            ResearchOutput::Profile(Box::new(profile))
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(if output.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
