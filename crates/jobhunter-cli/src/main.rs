use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use jobhunter_client::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use jobhunter_client::{Channel, ConsoleNotifier, TelegramNotifier};
use jobhunter_core::{DedupStore, RunConfig, RunOutcome};

/// 128 + SIGINT
const INTERRUPTED_EXIT_CODE: u8 = 130;

#[derive(Parser)]
#[command(name = "jh", version, about = "Find new job postings, classify them with an LLM, and report the relevant ones")]
struct Cli {
    /// Path to the TOML run configuration
    #[arg(short, long, global = true, env = "JH_CONFIG", default_value = "jobhunter.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl, classify and deliver new postings
    Run(RunArgs),

    /// List delivered postings, newest first
    History {
        /// Number of entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Load and validate the configuration, then print it
    CheckConfig,
}

#[derive(Args)]
struct RunArgs {
    /// LLM model to use (e.g., "gemini-2.5-flash", "gpt-4o-mini")
    #[arg(short, long, env = "JH_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// OpenAI-compatible API base URL
    #[arg(short, long, env = "JH_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// LLM request timeout in seconds
    #[arg(long, env = "JH_LLM_TIMEOUT", default_value_t = 120)]
    llm_timeout: u64,

    /// API key (reads from JH_API_KEY env var if not provided)
    #[arg(short, long, env = "JH_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Telegram bot token
    #[arg(long, env = "JH_TELEGRAM_TOKEN", hide_env_values = true)]
    telegram_token: Option<String>,

    /// Telegram chat id to deliver to
    #[arg(long, env = "JH_TELEGRAM_CHAT_ID")]
    telegram_chat_id: Option<String>,

    /// Print to the console even when Telegram is configured
    #[arg(long, default_value_t = false)]
    console: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jobhunter=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let outcome = cmd_run(&cli.config, args).await?;
            Ok(exit_code(outcome))
        }
        Commands::History { limit } => {
            cmd_history(&cli.config, limit)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckConfig => {
            cmd_check_config(&cli.config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(outcome: RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Interrupted { .. } => ExitCode::from(INTERRUPTED_EXIT_CODE),
        outcome if outcome.is_success() => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

/// Telegram when both settings are present and `--console` is not set,
/// the console otherwise.
fn build_channels(args: &RunArgs) -> Result<Vec<Channel>> {
    if !args.console
        && let (Some(token), Some(chat_id)) = (&args.telegram_token, &args.telegram_chat_id)
    {
        let telegram =
            TelegramNotifier::new(token, chat_id).context("Failed to create Telegram client")?;
        return Ok(vec![Channel::Telegram(telegram)]);
    }
    Ok(vec![Channel::Console(ConsoleNotifier)])
}

#[cfg(feature = "browser")]
async fn cmd_run(config_path: &Path, args: RunArgs) -> Result<RunOutcome> {
    use jobhunter_client::{ChromiumPage, OpenAiGenerator};
    use jobhunter_core::{HuntService, Notifier};
    use std::time::Duration;

    let config = RunConfig::load(config_path)
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    let channels = build_channels(&args)?;
    let generator = OpenAiGenerator::with_base_url(&args.api_key, &args.model, &args.base_url)
        .and_then(|g| g.with_timeout(Duration::from_secs(args.llm_timeout)))
        .context("Failed to create LLM client")?;

    let cancel = CancellationToken::new();
    tokio::spawn(handle_interrupts(cancel.clone()));

    tracing::info!(
        targets = config.targets.len(),
        model = generator.model(),
        channels = ?channels.iter().map(|c| c.name()).collect::<Vec<_>>(),
        "Starting run"
    );

    let page = ChromiumPage::launch()
        .await
        .context("Failed to launch browser")?;

    let mut service = HuntService::from_config(&config, page, generator, channels)
        .context("Failed to set up run")?;
    let outcome = service.run(&cancel).await;
    service.into_page().close().await;

    Ok(outcome)
}

/// First Ctrl-C cancels the run after the current phase, a second one exits.
#[cfg(feature = "browser")]
async fn handle_interrupts(cancel: CancellationToken) {
    while tokio::signal::ctrl_c().await.is_ok() {
        if interrupt_forces_exit(&cancel) {
            tracing::warn!("Second interrupt, exiting now");
            std::process::exit(i32::from(INTERRUPTED_EXIT_CODE));
        }
        tracing::info!("Interrupt received, stopping after the current phase (Ctrl-C again to force)");
    }
}

/// Cancels on the first interrupt; true once the run was already cancelled.
fn interrupt_forces_exit(cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return true;
    }
    cancel.cancel();
    false
}

#[cfg(not(feature = "browser"))]
async fn cmd_run(_config_path: &Path, _args: RunArgs) -> Result<RunOutcome> {
    anyhow::bail!("`jh run` needs the `browser` feature")
}

fn cmd_history(config_path: &Path, limit: usize) -> Result<()> {
    let config = RunConfig::read(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let store = DedupStore::open(config.storage_path.clone(), config.retention())
        .context("Failed to open dedup store")?;

    if store.is_empty() {
        println!("No delivered postings in {}", store.path().display());
        return Ok(());
    }

    println!("Delivered postings ({}):\n", store.path().display());
    for (url, delivered_at) in store.entries().into_iter().take(limit) {
        println!("  {}  {}", delivered_at.format("%Y-%m-%d %H:%M:%S UTC"), url);
    }
    println!("\nTotal: {} delivered postings", store.len());

    Ok(())
}

fn cmd_check_config(config_path: &Path) -> Result<()> {
    let config = RunConfig::load(config_path)
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    if let Some(warning) = config.base_prompt_warning() {
        tracing::warn!("{warning}");
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    println!("\nConfiguration OK ({} targets)", config.targets.len());

    Ok(())
}
