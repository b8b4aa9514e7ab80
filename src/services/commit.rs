use async_trait::async_trait;

use crate::config::CommitConfig;
use crate::error::Result;
use crate::services::{CommitPlan, CommitService};
use crate::workspace::git::{self, Author};
use crate::workspace::Workspace;

const EMPTY_COMMIT_MESSAGE: &str = "[empty]";

/// Builds commits in the workspace and pushes them with an access token.
pub struct GitCommitService {
    token: String,
    author: Author,
}

impl GitCommitService {
    pub fn new(token: &str, config: &CommitConfig) -> Self {
        Self {
            token: token.to_string(),
            author: Author {
                name: config.author_name.clone(),
                email: config.author_email.clone(),
            },
        }
    }
}

#[async_trait]
impl CommitService for GitCommitService {
    async fn prepare_branch(&self, workspace: &Workspace) -> Result<()> {
        tracing::info!(
            repo = %workspace.repo_full_name,
            branch = %workspace.branch,
            base = %workspace.base_branch,
            "Resetting head branch"
        );

        git::reset_branch(&workspace.path, &workspace.branch, &workspace.base_branch).await?;
        // GitHub refuses a pull request whose head has no commits beyond the base.
        git::commit(&workspace.path, EMPTY_COMMIT_MESSAGE, &self.author).await?;
        git::push(&workspace.path, &workspace.branch, &self.token, true).await
    }

    async fn commit(
        &self,
        workspace: &Workspace,
        commit: &CommitPlan,
        push: bool,
    ) -> Result<bool> {
        if !git::has_changes(&workspace.path).await? {
            tracing::info!(message = %commit.message, "No changes to commit");
            return Ok(false);
        }

        git::add_all(&workspace.path).await?;
        git::commit(&workspace.path, &commit.message, &self.author).await?;
        if push {
            git::push(&workspace.path, &workspace.branch, &self.token, false).await?;
        }

        tracing::info!(message = %commit.message, pushed = push, "Committed changes");
        Ok(true)
    }
}
