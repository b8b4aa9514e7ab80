//! Raw GitHub webhook payloads, trimmed to the fields the event service reads.

use serde::Deserialize;

use crate::events::RepositoryRef;

#[derive(Debug, Deserialize)]
pub struct IssuesPayload {
    pub action: String,
    pub issue: IssuePayload,
    pub repository: RepositoryPayload,
    pub label: Option<LabelPayload>,
}

#[derive(Debug, Deserialize)]
pub struct IssueCommentPayload {
    pub action: String,
    pub issue: IssuePayload,
    pub comment: CommentPayload,
    pub repository: RepositoryPayload,
}

#[derive(Debug, Deserialize)]
pub struct IssuePayload {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<LabelPayload>,
    pub user: UserPayload,
    /// Present when the issue is a pull request.
    pub pull_request: Option<serde_json::Value>,
}

impl IssuePayload {
    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct LabelPayload {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentPayload {
    pub id: u64,
    pub body: Option<String>,
    pub user: UserPayload,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryPayload {
    pub full_name: String,
    pub clone_url: String,
    pub default_branch: String,
}

impl From<RepositoryPayload> for RepositoryRef {
    fn from(repo: RepositoryPayload) -> Self {
        Self {
            full_name: repo.full_name,
            clone_url: repo.clone_url,
            default_branch: repo.default_branch,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserPayload {
    pub login: String,
    #[serde(rename = "type", default)]
    pub user_type: String,
}

impl UserPayload {
    pub fn is_bot(&self) -> bool {
        self.user_type == "Bot" || self.login.ends_with("[bot]")
    }
}
