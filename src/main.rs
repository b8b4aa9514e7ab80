use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hyphae::config::AppConfig;
use hyphae::pipeline::Pipeline;
use hyphae::platform::github::GitHubPlatform;
use hyphae::server::{create_router, AppState};
use hyphae::shutdown::{graceful_shutdown, wait_for_shutdown};
use hyphae::webhook::parser::{EventService, GitHubEventService};

#[derive(Parser)]
#[command(name = "hyphae", about = "Turns GitHub issues into pull requests")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve GitHub webhooks (default)
    Serve,
    /// Handle a single event payload, e.g. from a GitHub Actions run
    Run {
        /// Webhook event name, such as `issues` or `issue_comment`
        #[arg(long, env = "GITHUB_EVENT_NAME")]
        event_name: String,
        /// Path to the JSON event payload
        #[arg(long, env = "GITHUB_EVENT_PATH")]
        event_path: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Run {
            event_name,
            event_path,
        } => run_once(config, &event_name, &event_path).await,
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        brain = %config.brain.id,
        "Starting Hyphae server"
    );

    let state = Arc::new(AppState::new(config.clone())?);

    let queue_state = Arc::clone(&state);
    tokio::spawn(async move {
        hyphae::queue::run_queue_processor(queue_state).await;
    });

    let app = create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        config.server.host, config.server.port
    ))
    .await?;

    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    graceful_shutdown(&state).await;

    Ok(())
}

async fn run_once(
    config: AppConfig,
    event_name: &str,
    event_path: &std::path::Path,
) -> anyhow::Result<()> {
    let payload = tokio::fs::read(event_path)
        .await
        .with_context(|| format!("Failed to read event payload {}", event_path.display()))?;

    let platform = Arc::new(GitHubPlatform::new(config.github_token())?);
    let events = GitHubEventService::new(platform.clone(), &config.github.trigger_label);
    let event = events.parse_event(event_name, &payload).await?;

    if !event.triggers(&config.github.trigger_label) {
        tracing::info!(
            event = %event.description(),
            trigger_label = %config.github.trigger_label,
            "Event does not trigger generation, nothing to do"
        );
        return Ok(());
    }

    let pipeline = Pipeline::new(config, platform)?;
    pipeline.run(&event).await?;
    Ok(())
}
