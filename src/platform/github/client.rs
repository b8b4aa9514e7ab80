use async_trait::async_trait;
use octocrab::{params, Octocrab};

use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::Platform;

use super::mapper;

/// GitHub REST client authenticated with a repository-scoped token.
pub struct GitHubPlatform {
    client: Octocrab,
}

impl GitHubPlatform {
    pub fn new(token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(AppError::Config("GitHub token is empty".to_string()));
        }

        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))?;

        Ok(Self { client })
    }

    fn parse_repo(repo_full_name: &str) -> Result<(&str, &str)> {
        match repo_full_name.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => Ok((owner, repo)),
            _ => Err(AppError::GitHubApi(format!(
                "Invalid repo name: {repo_full_name}"
            ))),
        }
    }
}

#[async_trait]
impl Platform for GitHubPlatform {
    async fn list_issue_comments(
        &self,
        repo_full_name: &str,
        issue_number: u64,
    ) -> Result<Vec<IssueComment>> {
        let (owner, repo) = Self::parse_repo(repo_full_name)?;

        let first_page = self
            .client
            .issues(owner, repo)
            .list_comments(issue_number)
            .per_page(100)
            .send()
            .await?;
        let comments = self.client.all_pages(first_page).await?;

        tracing::debug!(
            repo = repo_full_name,
            issue = issue_number,
            count = comments.len(),
            "Fetched issue comments"
        );

        Ok(comments.into_iter().map(mapper::map_comment).collect())
    }

    async fn find_open_pull_request(
        &self,
        repo_full_name: &str,
        head_branch: &str,
    ) -> Result<Option<PullRequest>> {
        let (owner, repo) = Self::parse_repo(repo_full_name)?;

        let page = self
            .client
            .pulls(owner, repo)
            .list()
            .state(params::State::Open)
            .head(format!("{owner}:{head_branch}"))
            .per_page(1)
            .send()
            .await?;

        Ok(page.items.into_iter().next().map(mapper::map_pull_request))
    }

    async fn create_pull_request(
        &self,
        repo_full_name: &str,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest> {
        let (owner, repo) = Self::parse_repo(repo_full_name)?;

        let created = self
            .client
            .pulls(owner, repo)
            .create(&pr.title, &pr.head_branch, &pr.base_branch)
            .body(&pr.body)
            .send()
            .await?;

        Ok(mapper::map_pull_request(created))
    }

    async fn update_pull_request(
        &self,
        repo_full_name: &str,
        pr_number: u64,
        update: &UpdatePullRequest,
    ) -> Result<()> {
        let (owner, repo) = Self::parse_repo(repo_full_name)?;

        self.client
            .pulls(owner, repo)
            .update(pr_number)
            .title(&update.title)
            .body(&update.body)
            .send()
            .await?;

        Ok(())
    }
}
