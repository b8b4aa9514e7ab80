use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::events::Event;
use crate::services::chain::parse_json_reply;
use crate::services::{ChainService, PullRequestAgent, PullRequestPlan};
use crate::workspace::Workspace;

const MAX_LISTED_ENTRIES: usize = 200;

const SYSTEM_PROMPT: &str = "You are Hyphae, an expert software engineer planning a pull request. \
Reply with a single JSON object and nothing else.";

/// Plans the pull request with one chain step that returns JSON.
pub struct ChainPullRequestAgent {
    chain: Arc<dyn ChainService>,
}

impl ChainPullRequestAgent {
    pub fn new(chain: Arc<dyn ChainService>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl PullRequestAgent for ChainPullRequestAgent {
    async fn plan_pull_request(
        &self,
        workspace: &Workspace,
        event: &Event,
    ) -> Result<PullRequestPlan> {
        let files = list_top_level(workspace).await?;
        let instructions = planning_prompt(workspace, event, &files);

        let reply = self.chain.run(SYSTEM_PROMPT, &instructions).await?;
        let plan: PullRequestPlan = parse_json_reply(&reply)?;

        if plan.title.trim().is_empty() {
            return Err(AppError::MalformedOutput(
                "Pull request plan has an empty title".to_string(),
            ));
        }
        if plan.commits.is_empty() {
            return Err(AppError::MalformedOutput(
                "Pull request plan has no commits".to_string(),
            ));
        }

        tracing::info!(
            title = %plan.title,
            commits = plan.commits.len(),
            "Planned pull request"
        );
        Ok(plan)
    }
}

fn planning_prompt(workspace: &Workspace, event: &Event, files: &[String]) -> String {
    let issue = event.issue();
    format!(
        r#"Repository: `{repo}`

## Issue #{number}: {title}

{transcript}

## Repository root
{files}

## Task
Plan a pull request that resolves the issue. Split the work into a small
number of focused commits. Respond with JSON in exactly this shape:

{{
  "title": "Short pull request title",
  "body": "Markdown description of the change",
  "commits": [
    {{"message": "Commit message", "files": ["path/to/file"]}}
  ]
}}"#,
        repo = workspace.repo_full_name,
        number = issue.number,
        title = issue.title,
        transcript = issue.transcript(),
        files = files.join("\n"),
    )
}

async fn list_top_level(workspace: &Workspace) -> Result<Vec<String>> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(&workspace.path)
        .await
        .map_err(|e| AppError::Workspace(format!("Failed to read workspace: {e}")))?;

    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| AppError::Workspace(format!("Failed to read workspace entry: {e}")))?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        entries.push(if is_dir { format!("{name}/") } else { name });
    }

    entries.sort();
    entries.truncate(MAX_LISTED_ENTRIES);
    Ok(entries)
}
