use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use modkit::batch::{BatchOrchestrator, DEFAULT_CONCURRENCY};
use modkit::cancel::CancelHandle;
use modkit::category;
use modkit::client::{ModerationClient, ModerationConfig};
use modkit::compare::{ServiceClient, run_comparison};
use modkit::server::{AppState, serve};
use modkit::transcript;

#[derive(Parser, Debug)]
#[command(
    name = "modkit",
    version,
    about = "Content moderation pipeline: batch CLI, HTTP service, and comparison tooling"
)]
struct Cli {
    /// Enable info-level logging
    #[arg(long, global = true)]
    verbose: bool,
    /// Enable debug-level logging
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a raw transcript into structured batch input
    Parse {
        input: PathBuf,
        output: PathBuf,
    },
    /// Run batch moderation over structured conversations
    Moderate {
        input: PathBuf,
        output: PathBuf,
        /// Comma-separated categories; empty selects the full catalog
        #[arg(long, default_value = "")]
        categories: String,
        /// Maximum concurrent upstream calls
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
        /// File containing the upstream API key (OPENAI_API_KEY wins)
        #[arg(long, default_value = "openai_key.txt")]
        api_key_file: PathBuf,
    },
    /// Start the moderation HTTP service
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8000)]
        port: u16,
        /// File containing the upstream API key (OPENAI_API_KEY wins)
        #[arg(long, default_value = "openai_key.txt")]
        api_key_file: PathBuf,
    },
    /// Compare batch results against a live moderation service
    Compare {
        results_file: PathBuf,
        /// Bearer token for the service
        #[arg(long)]
        token: String,
        #[arg(long, default_value = "http://localhost:8000/moderate")]
        api_url: String,
        /// Comma-separated categories; empty selects the full catalog
        #[arg(long, default_value = "")]
        categories: String,
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.cmd {
        Commands::Parse { input, output } => cmd_parse(&input, &output),
        Commands::Moderate {
            input,
            output,
            categories,
            concurrency,
            api_key_file,
        } => cmd_moderate(&input, &output, &categories, concurrency, &api_key_file).await,
        Commands::Serve {
            host,
            port,
            api_key_file,
        } => cmd_serve(&host, port, &api_key_file).await,
        Commands::Compare {
            results_file,
            token,
            api_url,
            categories,
            concurrency,
        } => cmd_compare(&results_file, &token, &api_url, &categories, concurrency).await,
    }
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn cmd_parse(input: &PathBuf, output: &PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let conversations = transcript::parse_transcript(&text)?;
    transcript::write_conversations(output, &conversations)?;
    println!(
        "Conversion complete! {} conversations saved to {}",
        conversations.len(),
        output.display()
    );
    Ok(())
}

async fn cmd_moderate(
    input: &PathBuf,
    output: &PathBuf,
    categories: &str,
    concurrency: usize,
    api_key_file: &PathBuf,
) -> Result<()> {
    let categories = category::parse_selection(categories)?;
    let conversations = transcript::load_conversations(input)?;
    let messages = BatchOrchestrator::flatten(conversations);
    let total = messages.len();

    let config = ModerationConfig::resolve(Some(api_key_file))?;
    let client = Arc::new(ModerationClient::new(config)?);

    let cancel = CancelHandle::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupt received, cancelling batch...");
                cancel.cancel();
            }
        });
    }

    let bar = ProgressBar::new(total as u64);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} {msg}",
    )?);

    let orchestrator = BatchOrchestrator::new(client, concurrency, cancel);
    let outcome = orchestrator
        .run(messages, &categories, |_| bar.inc(1))
        .await;
    bar.finish_and_clear();

    if outcome.interrupted {
        eprintln!(
            "Batch interrupted; persisting {} partial results.",
            outcome.results.len()
        );
    }
    transcript::write_records(output, &outcome.results)?;
    println!(
        "Moderation complete! {} of {} messages scored, results saved to {}",
        outcome.results.len(),
        total,
        output.display()
    );
    Ok(())
}

async fn cmd_serve(host: &str, port: u16, api_key_file: &PathBuf) -> Result<()> {
    let config = ModerationConfig::resolve(Some(api_key_file))?;
    let client = Arc::new(ModerationClient::new(config)?);
    let state = AppState::from_env(client)?;

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))?;
    println!("Serving moderation API on {addr}");
    serve(addr, state).await?;
    Ok(())
}

async fn cmd_compare(
    results_file: &PathBuf,
    token: &str,
    api_url: &str,
    categories: &str,
    concurrency: usize,
) -> Result<()> {
    let categories = category::parse_selection(categories)?;
    let baseline = transcript::load_records_by_id(results_file)?;
    let service = ServiceClient::new(api_url, token);

    println!(
        "Comparing {} batch results against {}",
        baseline.len(),
        api_url
    );
    run_comparison(&baseline, &service, &categories, concurrency).await;
    Ok(())
}
