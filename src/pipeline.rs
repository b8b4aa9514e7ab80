//! One generation run per event: workspace, collaborators, brain, cleanup.

use std::sync::Arc;

use crate::brain::{self, Brain, BrainStrategy, Services};
use crate::codegen::ToolLoopCodegen;
use crate::config::AppConfig;
use crate::error::Result;
use crate::events::Event;
use crate::platform::Platform;
use crate::services::chain::PromptChain;
use crate::services::commit::GitCommitService;
use crate::services::completion::ClaudeClient;
use crate::services::diff::GitDiffService;
use crate::services::publish::PullRequestPublisher;
use crate::services::pull_request::ChainPullRequestAgent;
use crate::services::{CommitService, CompletionService};
use crate::workspace::{Workspace, WorkspaceManager};

pub struct Pipeline {
    config: AppConfig,
    /// Resolved once from `[brain]` and shared by every run.
    strategy: Arc<dyn BrainStrategy>,
    platform: Arc<dyn Platform>,
    workspaces: WorkspaceManager,
}

impl Pipeline {
    /// Fails when `[brain]` names an unknown strategy or carries invalid options.
    pub fn new(config: AppConfig, platform: Arc<dyn Platform>) -> Result<Self> {
        let strategy = brain::strategy_for(&config.brain)?;
        tracing::info!(brain = strategy.id(), "Brain strategy selected");

        Ok(Self {
            strategy,
            workspaces: WorkspaceManager::new(&config.workspace),
            config,
            platform,
        })
    }

    pub fn brain_id(&self) -> &'static str {
        self.strategy.id()
    }

    pub async fn run(&self, event: &Event) -> Result<()> {
        let repository = event.repository();
        let issue_number = event.issue().number;
        tracing::info!(
            repo = %repository.full_name,
            issue = issue_number,
            kind = event.kind(),
            "Starting pull request generation"
        );

        let workspace = self
            .workspaces
            .checkout(repository, self.config.github_token(), issue_number)
            .await?;

        let result = self.generate(&workspace, event).await;

        if let Err(e) = self.workspaces.cleanup(&workspace).await {
            tracing::warn!(path = %workspace.path.display(), error = %e, "Failed to clean up workspace");
        }
        result
    }

    async fn generate(&self, workspace: &Workspace, event: &Event) -> Result<()> {
        let services = self.services(workspace, event);
        services.commit.prepare_branch(workspace).await?;

        let brain = Brain::with_tracing(
            Arc::clone(&self.strategy),
            services,
            &self.config.brain.options,
        );
        brain.generate_pr(event).await
    }

    fn services(&self, workspace: &Workspace, event: &Event) -> Services {
        let client = Arc::new(ClaudeClient::new(&self.config.completion));
        let completions: Arc<dyn CompletionService> = client.clone();
        let chain = Arc::new(PromptChain::new(Arc::clone(&completions)));
        let commit: Arc<dyn CommitService> = Arc::new(GitCommitService::new(
            self.config.github_token(),
            &self.config.commit,
        ));

        Services {
            completions,
            pull_request: Arc::new(ChainPullRequestAgent::new(chain.clone())),
            chain,
            diff: Arc::new(GitDiffService),
            codegen: Arc::new(ToolLoopCodegen::new(
                client,
                self.config.agent.max_file_size_bytes,
                self.config.completion.max_turns,
            )),
            commit,
            publish: Arc::new(PullRequestPublisher::new(
                Arc::clone(&self.platform),
                workspace,
                event,
            )),
            workspace: workspace.clone(),
        }
    }
}
