//! The brain sequences one pull-request generation.
//!
//! A [`BrainStrategy`] decides what to generate; [`Brain::generate_pr`]
//! owns the lifecycle around it: placeholder publish, model advisory,
//! logging and exactly one `finalize` call on every exit path.

pub mod linear;

#[cfg(test)]
pub(crate) mod testing;

use std::any::Any;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::config::{BrainConfig, BrainOptions};
use crate::error::{AppError, Result};
use crate::events::Event;
use crate::services::{
    ChainService, CodegenAgent, CommitService, CompletionService, DiffService, PublishService,
    PullRequestAgent,
};
use crate::workspace::Workspace;

pub use linear::LinearBrain;

/// Completion model that is known to produce poor pull requests.
pub const UNDERPOWERED_MODEL: &str = "gpt-3.5-turbo";

pub const UNDERPOWERED_MODEL_ADVISORY: &str = ":warning: This pull request is being generated \
with `gpt-3.5-turbo`, which often produces incomplete or incorrect changes. \
Consider configuring a more capable model.";

/// Collaborators handed to a strategy for one generation.
pub struct Services {
    pub completions: Arc<dyn CompletionService>,
    pub chain: Arc<dyn ChainService>,
    pub diff: Arc<dyn DiffService>,
    pub codegen: Arc<dyn CodegenAgent>,
    pub pull_request: Arc<dyn PullRequestAgent>,
    pub commit: Arc<dyn CommitService>,
    pub publish: Arc<dyn PublishService>,
    pub workspace: Workspace,
}

#[async_trait]
pub trait BrainStrategy: Send + Sync {
    /// Stable identifier, attached to every log record.
    fn id(&self) -> &'static str;

    /// Option keys this strategy reads from `[brain]`.
    fn known_options(&self) -> &'static [&'static str] {
        &[]
    }

    /// Produce the pull request content. Must not call `finalize`.
    async fn run_generation(&self, services: &Services, event: &Event) -> Result<()>;
}

pub trait BrainLog: Send + Sync {
    fn info(&self, message: &str, event: &Event);
    fn exception(&self, message: &str, event: &Event, error: &dyn Display);
    fn unused_options(&self, keys: &[String]);
}

/// Writes brain records as `tracing` events.
pub struct TracingLog {
    brain_id: &'static str,
}

impl TracingLog {
    pub fn new(brain_id: &'static str) -> Self {
        Self { brain_id }
    }
}

impl BrainLog for TracingLog {
    fn info(&self, message: &str, event: &Event) {
        tracing::info!(
            service = "brain",
            id = self.brain_id,
            event = %event.description(),
            event_payload = %event_payload(event),
            "{message}"
        );
    }

    fn exception(&self, message: &str, event: &Event, error: &dyn Display) {
        tracing::error!(
            service = "brain",
            id = self.brain_id,
            event = %event.description(),
            event_payload = %event_payload(event),
            error = %error,
            "{message}"
        );
    }

    fn unused_options(&self, keys: &[String]) {
        tracing::warn!(
            service = "brain",
            id = self.brain_id,
            options = ?keys,
            "Brain did not use additional options"
        );
    }
}

/// The event as JSON, for log records.
fn event_payload(event: &Event) -> String {
    serde_json::to_string(event).unwrap_or_else(|e| format!("<unserializable event: {e}>"))
}

/// Resolve a strategy from the `[brain]` table.
pub fn strategy_for(config: &BrainConfig) -> Result<Arc<dyn BrainStrategy>> {
    match config.id.as_str() {
        LinearBrain::ID => Ok(Arc::new(LinearBrain::from_options(&config.options)?)),
        other => Err(AppError::Config(format!(
            "Unknown brain '{other}' (available: {})",
            LinearBrain::ID
        ))),
    }
}

pub struct Brain {
    strategy: Arc<dyn BrainStrategy>,
    services: Services,
    log: Arc<dyn BrainLog>,
}

impl Brain {
    pub fn new(
        strategy: Arc<dyn BrainStrategy>,
        services: Services,
        options: &BrainOptions,
        log: Arc<dyn BrainLog>,
    ) -> Self {
        let unused = options.unused(strategy.known_options());
        if !unused.is_empty() {
            log.unused_options(&unused);
        }
        Self {
            strategy,
            services,
            log,
        }
    }

    /// Build a brain that logs through `tracing`.
    pub fn with_tracing(
        strategy: Arc<dyn BrainStrategy>,
        services: Services,
        options: &BrainOptions,
    ) -> Self {
        let log = Arc::new(TracingLog::new(strategy.id()));
        Self::new(strategy, services, options, log)
    }

    pub fn id(&self) -> &'static str {
        self.strategy.id()
    }

    /// Generate the pull request for `event`.
    ///
    /// The pull request is finalized exactly once whatever happens: with
    /// success after a clean run, with failure after an error, a panic or
    /// cancellation. Errors are returned unchanged and panics are resumed.
    pub async fn generate_pr(&self, event: &Event) -> Result<()> {
        let generation = Generation::begin(Arc::clone(&self.services.publish));

        match AssertUnwindSafe(self.generate(event)).catch_unwind().await {
            Ok(Ok(())) => {
                self.log.info("Generated changes", event);
                generation.finish(true).await
            }
            Ok(Err(error)) => {
                self.log
                    .exception("Failed to generate pull request", event, &error);
                generation.fail().await;
                Err(error)
            }
            Err(payload) => {
                let message = panic_message(&*payload);
                self.log
                    .exception("Failed to generate pull request", event, &message);
                generation.fail().await;
                std::panic::resume_unwind(payload)
            }
        }
    }

    async fn generate(&self, event: &Event) -> Result<()> {
        let publish = &self.services.publish;
        publish.update().await?;

        if self.services.completions.model() == UNDERPOWERED_MODEL {
            publish.publish_update(UNDERPOWERED_MODEL_ADVISORY).await?;
        }

        self.log.info("Generating changes", event);
        self.strategy.run_generation(&self.services, event).await
    }
}

/// A generation whose pull request still owes its `finalize` call.
///
/// Dropping it unfinished (the `generate_pr` future was cancelled)
/// finalizes as failed on the current runtime.
struct Generation {
    publish: Option<Arc<dyn PublishService>>,
}

impl Generation {
    fn begin(publish: Arc<dyn PublishService>) -> Self {
        Self {
            publish: Some(publish),
        }
    }

    async fn finish(mut self, success: bool) -> Result<()> {
        match self.publish.take() {
            Some(publish) => publish.finalize(success).await,
            None => Ok(()),
        }
    }

    async fn fail(self) {
        if let Err(e) = self.finish(false).await {
            tracing::warn!(error = %e, "Failed to finalize pull request as failed");
        }
    }
}

impl Drop for Generation {
    fn drop(&mut self) {
        let Some(publish) = self.publish.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("Generation cancelled, finalizing pull request as failed");
                handle.spawn(async move {
                    if let Err(e) = publish.finalize(false).await {
                        tracing::warn!(error = %e, "Failed to finalize cancelled generation");
                    }
                });
            }
            Err(_) => {
                tracing::error!("Generation dropped outside a runtime, pull request left open");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}
