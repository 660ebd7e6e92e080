//! Repo Rhythm CLI
//!
//! Command-line interface for inspecting a running Repo Rhythm exporter.
//!
//! # Usage
//!
//! ```bash
//! rhythm --help
//! rhythm health
//! rhythm scrape --filter repo_rhythm_open_issue_age
//! ```

#![deny(unsafe_code)]

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Repo Rhythm CLI - inspect a running exporter
#[derive(Parser)]
#[command(name = "rhythm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Exporter URL
    #[arg(short, long, env = "RHYTHM_URL", default_value = "http://127.0.0.1:9123")]
    url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check exporter health
    Health,
    /// Print the current metrics
    Scrape {
        /// Only show metrics whose name starts with this prefix
        #[arg(short, long)]
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Health) => {
            let body = fetch(&cli.url, "/health").await?;
            let health: serde_json::Value =
                serde_json::from_str(&body).context("Exporter returned invalid health JSON")?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Some(Commands::Scrape { filter }) => {
            let body = fetch(&cli.url, "/metrics").await?;
            match filter {
                Some(prefix) => {
                    for line in filter_exposition(&body, &prefix) {
                        println!("{line}");
                    }
                }
                None => print!("{body}"),
            }
        }
        None => {
            println!("Repo Rhythm CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

/// GETs `path` from the exporter and returns the body.
async fn fetch(base: &str, path: &str) -> anyhow::Result<String> {
    let url = endpoint(base, path);
    tracing::debug!(%url, "Requesting");

    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Failed to reach exporter at {url}"))?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        bail!("Exporter returned {status}: {body}");
    }
    Ok(body)
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

/// Keeps samples and their `# HELP`/`# TYPE` lines for metrics starting with `prefix`.
fn filter_exposition<'a>(text: &'a str, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    text.lines().filter(move |line| {
        let name = match line.strip_prefix("# ") {
            Some(comment) => comment.split_whitespace().nth(1).unwrap_or_default(),
            None => line.split(&['{', ' '][..]).next().unwrap_or_default(),
        };
        !name.is_empty() && name.starts_with(prefix)
    })
}
