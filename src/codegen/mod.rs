//! Code generation through a tool-use loop confined to the workspace.

pub mod engine;
pub mod tools;

use async_trait::async_trait;

use crate::error::Result;
use crate::events::Event;
use crate::services::{CodegenAgent, CommitPlan, PullRequestPlan};
use crate::workspace::Workspace;
use engine::{AgentEngine, ToolUseModel};
use tools::ToolRegistry;

pub struct ToolLoopCodegen<M> {
    engine: AgentEngine<M>,
}

impl<M: ToolUseModel> ToolLoopCodegen<M> {
    pub fn new(model: M, max_file_size: usize, max_turns: u32) -> Self {
        Self {
            engine: AgentEngine::new(model, ToolRegistry::new(max_file_size), max_turns),
        }
    }
}

#[async_trait]
impl<M: ToolUseModel> CodegenAgent for ToolLoopCodegen<M> {
    async fn generate_changes(
        &self,
        workspace: &Workspace,
        event: &Event,
        plan: &PullRequestPlan,
        commit: &CommitPlan,
    ) -> Result<String> {
        let system = system_prompt(workspace, event, plan);
        let initial_message = commit_request(commit);
        self.engine.run(&system, workspace, &initial_message).await
    }
}

fn system_prompt(workspace: &Workspace, event: &Event, plan: &PullRequestPlan) -> String {
    let issue = event.issue();
    let planned = plan
        .commits
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.message))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are Hyphae, an expert software engineer. You are working on repository `{repo}`.

## Issue #{number}: {title}

{transcript}

## Pull request
**{pr_title}**

{pr_body}

Planned commits:
{planned}

## Guidelines
- Make minimal, focused changes for the commit you are asked to implement.
- Follow the existing code style and patterns in the repository.
- Read files before changing them.
- Do not touch files unrelated to the commit.
- When you are done, reply with a one-paragraph summary of what you changed."#,
        repo = workspace.repo_full_name,
        number = issue.number,
        title = issue.title,
        transcript = issue.transcript(),
        pr_title = plan.title,
        pr_body = plan.body,
    )
}

fn commit_request(commit: &CommitPlan) -> String {
    if commit.files.is_empty() {
        format!("Implement this commit: {}", commit.message)
    } else {
        format!(
            "Implement this commit: {}\n\nFiles likely involved:\n{}",
            commit.message,
            commit
                .files
                .iter()
                .map(|f| format!("- {f}"))
                .collect::<Vec<_>>()
                .join("\n")
        )
    }
}
