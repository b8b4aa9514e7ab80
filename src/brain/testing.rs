//! Recording fakes for brain and strategy tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::brain::{BrainLog, Services};
use crate::error::{AppError, Result};
use crate::events::Event;
use crate::services::*;
use crate::workspace::testing::workspace_at;
use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Update,
    PublishUpdate(String),
    CodeBlock(String),
    SetTitle(String),
    SetBody(String),
    Finalize(bool),
    Info(String),
    Exception(String),
    UnusedOptions(Vec<String>),
    Run,
    Plan,
    Codegen(String),
    Diff,
    Commit(String),
}

#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Call>>>);

impl Recorder {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }
}

/// Every collaborator in one struct, each call appended to the recorder.
pub struct Fake {
    pub recorder: Recorder,
    pub model: String,
    pub plan: PullRequestPlan,
    pub diff: String,
    pub diff_error: Option<String>,
    /// Fails `update()` with a GitHub API error.
    pub update_error: Option<String>,
    /// Fails `finalize()` with a publish error.
    pub finalize_error: Option<String>,
}

impl Fake {
    pub fn new(recorder: &Recorder) -> Self {
        Self {
            recorder: recorder.clone(),
            model: "claude-sonnet-4-20250514".to_string(),
            plan: PullRequestPlan {
                title: "Flip widgets".to_string(),
                body: "Renders widgets upright.".to_string(),
                commits: vec![
                    CommitPlan {
                        message: "Flip renderer".to_string(),
                        files: vec!["src/render.rs".to_string()],
                    },
                    CommitPlan {
                        message: "Add regression test".to_string(),
                        files: Vec::new(),
                    },
                ],
            },
            diff: "+fn flip() {}\n".to_string(),
            diff_error: None,
            update_error: None,
            finalize_error: None,
        }
    }

    pub fn into_services(self) -> Services {
        let fake = Arc::new(self);
        Services {
            completions: fake.clone(),
            chain: fake.clone(),
            diff: fake.clone(),
            codegen: fake.clone(),
            pull_request: fake.clone(),
            commit: fake.clone(),
            publish: fake,
            workspace: workspace_at(Path::new("/tmp/hyphae-brain-test")),
        }
    }
}

#[async_trait]
impl CompletionService for Fake {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
        Err(AppError::Internal("completions are not scripted".to_string()))
    }
}

#[async_trait]
impl ChainService for Fake {
    async fn run(&self, _system: &str, _instructions: &str) -> Result<String> {
        Err(AppError::Internal("chain is not scripted".to_string()))
    }
}

#[async_trait]
impl DiffService for Fake {
    async fn get_diff(&self, _workspace: &Workspace) -> Result<String> {
        self.recorder.push(Call::Diff);
        match &self.diff_error {
            Some(msg) => Err(AppError::Diff(msg.clone())),
            None => Ok(self.diff.clone()),
        }
    }
}

#[async_trait]
impl CodegenAgent for Fake {
    async fn generate_changes(
        &self,
        _workspace: &Workspace,
        _event: &Event,
        _plan: &PullRequestPlan,
        commit: &CommitPlan,
    ) -> Result<String> {
        self.recorder.push(Call::Codegen(commit.message.clone()));
        Ok(format!("Implemented {}", commit.message))
    }
}

#[async_trait]
impl PullRequestAgent for Fake {
    async fn plan_pull_request(
        &self,
        _workspace: &Workspace,
        _event: &Event,
    ) -> Result<PullRequestPlan> {
        self.recorder.push(Call::Plan);
        Ok(self.plan.clone())
    }
}

#[async_trait]
impl CommitService for Fake {
    async fn prepare_branch(&self, _workspace: &Workspace) -> Result<()> {
        Ok(())
    }

    async fn commit(
        &self,
        _workspace: &Workspace,
        commit: &CommitPlan,
        _push: bool,
    ) -> Result<bool> {
        self.recorder.push(Call::Commit(commit.message.clone()));
        Ok(true)
    }
}

#[async_trait]
impl PublishService for Fake {
    async fn update(&self) -> Result<()> {
        self.recorder.push(Call::Update);
        match &self.update_error {
            Some(msg) => Err(AppError::GitHubApi(msg.clone())),
            None => Ok(()),
        }
    }

    async fn publish_update(&self, text: &str) -> Result<()> {
        self.recorder.push(Call::PublishUpdate(text.to_string()));
        Ok(())
    }

    async fn publish_code_block(&self, heading: &str, _code: &str, _language: &str) -> Result<()> {
        self.recorder.push(Call::CodeBlock(heading.to_string()));
        Ok(())
    }

    async fn set_title(&self, title: &str) -> Result<()> {
        self.recorder.push(Call::SetTitle(title.to_string()));
        Ok(())
    }

    async fn set_body(&self, body: &str) -> Result<()> {
        self.recorder.push(Call::SetBody(body.to_string()));
        Ok(())
    }

    async fn finalize(&self, success: bool) -> Result<()> {
        self.recorder.push(Call::Finalize(success));
        match &self.finalize_error {
            Some(msg) => Err(AppError::Publish(msg.clone())),
            None => Ok(()),
        }
    }
}

pub struct RecordingLog(pub Recorder);

impl BrainLog for RecordingLog {
    fn info(&self, message: &str, _event: &Event) {
        self.0.push(Call::Info(message.to_string()));
    }

    fn exception(&self, message: &str, _event: &Event, error: &dyn std::fmt::Display) {
        self.0.push(Call::Exception(format!("{message}: {error}")));
    }

    fn unused_options(&self, keys: &[String]) {
        self.0.push(Call::UnusedOptions(keys.to_vec()));
    }
}
