pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

/// Code-hosting operations the pipeline needs.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Comments on an issue in creation order.
    async fn list_issue_comments(
        &self,
        repo_full_name: &str,
        issue_number: u64,
    ) -> Result<Vec<IssueComment>>;

    /// The open pull request whose head is `head_branch`, if any.
    async fn find_open_pull_request(
        &self,
        repo_full_name: &str,
        head_branch: &str,
    ) -> Result<Option<PullRequest>>;

    async fn create_pull_request(
        &self,
        repo_full_name: &str,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest>;

    async fn update_pull_request(
        &self,
        repo_full_name: &str,
        pr_number: u64,
        update: &UpdatePullRequest,
    ) -> Result<()>;
}
