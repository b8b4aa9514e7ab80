use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::platform::github::GitHubPlatform;
use crate::platform::Platform;
use crate::queue::EventQueue;
use crate::webhook::parser::{EventService, GitHubEventService};

pub struct AppState {
    pub config: AppConfig,
    pub events: Arc<dyn EventService>,
    pub pipeline: Pipeline,
    pub queue: RwLock<EventQueue>,
}

impl AppState {
    pub fn new(config: AppConfig) -> crate::error::Result<Self> {
        let platform = Arc::new(GitHubPlatform::new(config.github_token())?);
        Self::with_platform(config, platform)
    }

    pub fn with_platform(
        config: AppConfig,
        platform: Arc<dyn Platform>,
    ) -> crate::error::Result<Self> {
        Ok(Self {
            events: Arc::new(GitHubEventService::new(
                Arc::clone(&platform),
                &config.github.trigger_label,
            )),
            pipeline: Pipeline::new(config.clone(), platform)?,
            queue: RwLock::new(EventQueue::new()),
            config,
        })
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks/github", post(crate::webhook::handler::handle_webhook))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}
