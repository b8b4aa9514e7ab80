//! Collaborators the brain delegates to.
//!
//! Each trait is a narrow seam; the brain never looks behind it. The modules
//! below hold the implementations the service wires up at startup.

pub mod chain;
pub mod commit;
pub mod completion;
pub mod diff;
pub mod publish;
pub mod pull_request;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::events::Event;
use crate::workspace::Workspace;

/// One commit the pull request is split into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPlan {
    pub message: String,
    /// Files the commit is expected to touch, as a hint for code generation.
    #[serde(default)]
    pub files: Vec<String>,
}

/// Title, description and commit breakdown of the pull request to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestPlan {
    pub title: String,
    pub body: String,
    pub commits: Vec<CommitPlan>,
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Identifier of the model completions are served by.
    fn model(&self) -> &str;

    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait ChainService: Send + Sync {
    /// Run one instruction step through the model and return its raw reply.
    async fn run(&self, system: &str, instructions: &str) -> Result<String>;
}

#[async_trait]
pub trait DiffService: Send + Sync {
    /// Unified diff of the uncommitted changes in the workspace.
    async fn get_diff(&self, workspace: &Workspace) -> Result<String>;
}

#[async_trait]
pub trait CodegenAgent: Send + Sync {
    /// Edit the workspace so it implements `commit`; returns a short summary.
    async fn generate_changes(
        &self,
        workspace: &Workspace,
        event: &Event,
        plan: &PullRequestPlan,
        commit: &CommitPlan,
    ) -> Result<String>;
}

#[async_trait]
pub trait PullRequestAgent: Send + Sync {
    async fn plan_pull_request(&self, workspace: &Workspace, event: &Event)
        -> Result<PullRequestPlan>;
}

#[async_trait]
pub trait CommitService: Send + Sync {
    /// Reset the head branch to the base branch and publish it, so a pull
    /// request can be opened before any code exists.
    async fn prepare_branch(&self, workspace: &Workspace) -> Result<()>;

    /// Commit all workspace changes as `commit`. Returns `false` when there
    /// was nothing to commit.
    async fn commit(&self, workspace: &Workspace, commit: &CommitPlan, push: bool)
        -> Result<bool>;
}

/// User-visible rendering of the pull request and its progress log.
#[async_trait]
pub trait PublishService: Send + Sync {
    /// Push the current state of the pull request, creating it if needed.
    async fn update(&self) -> Result<()>;

    /// Append a progress line and push.
    async fn publish_update(&self, text: &str) -> Result<()>;

    /// Append a collapsible code block to the progress log and push.
    async fn publish_code_block(&self, heading: &str, code: &str, language: &str) -> Result<()>;

    async fn set_title(&self, title: &str) -> Result<()>;

    async fn set_body(&self, body: &str) -> Result<()>;

    /// Mark the run as finished. Called exactly once per run.
    async fn finalize(&self, success: bool) -> Result<()>;
}
