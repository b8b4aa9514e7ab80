use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::events::Event;
use crate::platform::types::{CreatePullRequest, UpdatePullRequest};
use crate::platform::Platform;
use crate::services::PublishService;
use crate::workspace::Workspace;

const FOOTER: &str = "---\n*Generated by Hyphae*";

/// One entry of the progress log.
#[derive(Debug, Clone, PartialEq)]
enum ProgressEntry {
    Line(String),
    CodeBlock {
        heading: String,
        code: String,
        language: String,
    },
}

#[derive(Debug, Default)]
struct PublishState {
    title: String,
    body: String,
    progress: Vec<ProgressEntry>,
    pr_number: Option<u64>,
    /// `Some(success)` once finalized.
    outcome: Option<bool>,
}

/// Renders the run into a single pull request on the code host.
///
/// The pull request is created on the first push (or an open one for the
/// head branch is adopted) and rewritten in place on every later push.
pub struct PullRequestPublisher {
    platform: Arc<dyn Platform>,
    repo_full_name: String,
    head_branch: String,
    base_branch: String,
    issue_number: u64,
    state: Mutex<PublishState>,
}

impl PullRequestPublisher {
    pub fn new(platform: Arc<dyn Platform>, workspace: &Workspace, event: &Event) -> Self {
        let issue = event.issue();
        Self {
            platform,
            repo_full_name: workspace.repo_full_name.clone(),
            head_branch: workspace.branch.clone(),
            base_branch: workspace.base_branch.clone(),
            issue_number: issue.number,
            state: Mutex::new(PublishState {
                title: format!("Fix #{}: {}", issue.number, issue.title),
                ..PublishState::default()
            }),
        }
    }

    async fn push(&self, state: &mut PublishState) -> Result<()> {
        let body = render_body(state, self.issue_number);

        match state.pr_number {
            Some(number) => {
                self.platform
                    .update_pull_request(
                        &self.repo_full_name,
                        number,
                        &UpdatePullRequest {
                            title: state.title.clone(),
                            body,
                        },
                    )
                    .await
            }
            None => {
                if let Some(existing) = self
                    .platform
                    .find_open_pull_request(&self.repo_full_name, &self.head_branch)
                    .await?
                {
                    tracing::info!(pr = existing.number, "Adopting open pull request");
                    state.pr_number = Some(existing.number);
                    return self
                        .platform
                        .update_pull_request(
                            &self.repo_full_name,
                            existing.number,
                            &UpdatePullRequest {
                                title: state.title.clone(),
                                body,
                            },
                        )
                        .await;
                }

                let created = self
                    .platform
                    .create_pull_request(
                        &self.repo_full_name,
                        &CreatePullRequest {
                            title: state.title.clone(),
                            body,
                            head_branch: self.head_branch.clone(),
                            base_branch: self.base_branch.clone(),
                        },
                    )
                    .await?;
                tracing::info!(pr = created.number, "Opened pull request");
                state.pr_number = Some(created.number);
                Ok(())
            }
        }
    }

    async fn push_entry(&self, entry: ProgressEntry) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.outcome.is_some() {
            return Err(AppError::Publish(
                "Progress published after finalize".to_string(),
            ));
        }
        state.progress.push(entry);
        self.push(&mut state).await
    }
}

#[async_trait]
impl PublishService for PullRequestPublisher {
    async fn update(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.push(&mut state).await
    }

    async fn publish_update(&self, text: &str) -> Result<()> {
        tracing::info!(update = text, "Publishing progress");
        self.push_entry(ProgressEntry::Line(text.to_string())).await
    }

    async fn publish_code_block(&self, heading: &str, code: &str, language: &str) -> Result<()> {
        self.push_entry(ProgressEntry::CodeBlock {
            heading: heading.to_string(),
            code: code.to_string(),
            language: language.to_string(),
        })
        .await
    }

    async fn set_title(&self, title: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.title = title.to_string();
        self.push(&mut state).await
    }

    async fn set_body(&self, body: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.body = body.to_string();
        self.push(&mut state).await
    }

    async fn finalize(&self, success: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(previous) = state.outcome {
            tracing::warn!(previous, success, "Pull request already finalized, ignoring");
            return Ok(());
        }
        state.outcome = Some(success);
        self.push(&mut state).await
    }
}

fn render_body(state: &PublishState, issue_number: u64) -> String {
    let mut sections = Vec::new();

    if !state.body.is_empty() {
        sections.push(state.body.clone());
    }
    sections.push(format!("Fixes #{issue_number}"));

    let progress = render_progress(&state.progress);
    match state.outcome {
        None => {
            let mut block = String::from("## Progress\n\n:hourglass_flowing_sand: Generation in progress...");
            if !progress.is_empty() {
                block.push_str("\n\n");
                block.push_str(&progress);
            }
            sections.push(block);
        }
        Some(success) => {
            let status = if success {
                ":white_check_mark: Generation complete"
            } else {
                ":x: Generation failed"
            };
            sections.push(format!(
                "<details>\n<summary>{status}</summary>\n\n{progress}\n\n</details>"
            ));
        }
    }

    sections.push(FOOTER.to_string());
    sections.join("\n\n")
}

fn render_progress(entries: &[ProgressEntry]) -> String {
    entries
        .iter()
        .map(|entry| match entry {
            ProgressEntry::Line(text) => format!("- {text}"),
            ProgressEntry::CodeBlock {
                heading,
                code,
                language,
            } => format!(
                "<details>\n<summary>{heading}</summary>\n\n```{language}\n{}\n```\n\n</details>",
                code.trim_end()
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
