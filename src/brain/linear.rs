use async_trait::async_trait;

use crate::brain::{BrainStrategy, Services};
use crate::config::BrainOptions;
use crate::error::Result;
use crate::events::Event;

/// Plans the pull request up front, then generates and pushes one commit
/// at a time in plan order.
#[derive(Debug, Clone)]
pub struct LinearBrain {
    publish_diffs: bool,
}

impl LinearBrain {
    pub const ID: &'static str = "linear-v1";

    const OPTIONS: &'static [&'static str] = &["publish_diffs"];

    pub fn from_options(options: &BrainOptions) -> Result<Self> {
        Ok(Self {
            publish_diffs: options.get("publish_diffs")?.unwrap_or(true),
        })
    }
}

impl Default for LinearBrain {
    fn default() -> Self {
        Self {
            publish_diffs: true,
        }
    }
}

#[async_trait]
impl BrainStrategy for LinearBrain {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn known_options(&self) -> &'static [&'static str] {
        Self::OPTIONS
    }

    async fn run_generation(&self, services: &Services, event: &Event) -> Result<()> {
        let publish = &services.publish;
        let workspace = &services.workspace;

        publish
            .publish_update(&format!(
                "Planning changes for issue #{}",
                event.issue().number
            ))
            .await?;
        let plan = services
            .pull_request
            .plan_pull_request(workspace, event)
            .await?;
        publish.set_title(&plan.title).await?;
        publish.set_body(&plan.body).await?;

        let total = plan.commits.len();
        for (i, commit) in plan.commits.iter().enumerate() {
            publish
                .publish_update(&format!("[{}/{total}] {}", i + 1, commit.message))
                .await?;

            let summary = services
                .codegen
                .generate_changes(workspace, event, &plan, commit)
                .await?;
            if !summary.trim().is_empty() {
                publish.publish_update(summary.trim()).await?;
            }

            let diff = services.diff.get_diff(workspace).await?;
            if diff.trim().is_empty() {
                publish
                    .publish_update(&format!("No changes for `{}`, skipped", commit.message))
                    .await?;
                continue;
            }
            if self.publish_diffs {
                publish
                    .publish_code_block(&commit.message, &diff, "diff")
                    .await?;
            }

            services.commit.commit(workspace, commit, true).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::testing::{Call, Fake, Recorder};
    use crate::error::AppError;
    use crate::events::fixtures::issue_opened;

    fn options(value: serde_json::Value) -> BrainOptions {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_plans_then_builds_each_commit_in_order() {
        let recorder = Recorder::default();
        let services = Fake::new(&recorder).into_services();

        LinearBrain::default()
            .run_generation(&services, &issue_opened(42))
            .await
            .unwrap();

        assert_eq!(
            recorder.calls(),
            vec![
                Call::PublishUpdate("Planning changes for issue #42".to_string()),
                Call::Plan,
                Call::SetTitle("Flip widgets".to_string()),
                Call::SetBody("Renders widgets upright.".to_string()),
                Call::PublishUpdate("[1/2] Flip renderer".to_string()),
                Call::Codegen("Flip renderer".to_string()),
                Call::PublishUpdate("Implemented Flip renderer".to_string()),
                Call::Diff,
                Call::CodeBlock("Flip renderer".to_string()),
                Call::Commit("Flip renderer".to_string()),
                Call::PublishUpdate("[2/2] Add regression test".to_string()),
                Call::Codegen("Add regression test".to_string()),
                Call::PublishUpdate("Implemented Add regression test".to_string()),
                Call::Diff,
                Call::CodeBlock("Add regression test".to_string()),
                Call::Commit("Add regression test".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_diff_skips_commit() {
        let recorder = Recorder::default();
        let mut fake = Fake::new(&recorder);
        fake.diff = "\n".to_string();
        let services = fake.into_services();

        LinearBrain::default()
            .run_generation(&services, &issue_opened(42))
            .await
            .unwrap();

        assert_eq!(recorder.count(|c| matches!(c, Call::Commit(_))), 0);
        assert!(recorder.calls().contains(&Call::PublishUpdate(
            "No changes for `Flip renderer`, skipped".to_string()
        )));
    }

    #[tokio::test]
    async fn test_publish_diffs_can_be_disabled() {
        let recorder = Recorder::default();
        let services = Fake::new(&recorder).into_services();
        let brain =
            LinearBrain::from_options(&options(serde_json::json!({"publish_diffs": false})))
                .unwrap();

        brain
            .run_generation(&services, &issue_opened(42))
            .await
            .unwrap();

        assert_eq!(recorder.count(|c| matches!(c, Call::CodeBlock(_))), 0);
        assert_eq!(recorder.count(|c| matches!(c, Call::Commit(_))), 2);
    }

    #[tokio::test]
    async fn test_diff_failure_stops_generation() {
        let recorder = Recorder::default();
        let mut fake = Fake::new(&recorder);
        fake.diff_error = Some("diff failed".to_string());
        let services = fake.into_services();

        let err = LinearBrain::default()
            .run_generation(&services, &issue_opened(42))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Diff(msg) if msg == "diff failed"));
        assert_eq!(recorder.count(|c| matches!(c, Call::Codegen(_))), 1);
        assert_eq!(recorder.count(|c| matches!(c, Call::Commit(_))), 0);
    }

    #[test]
    fn test_invalid_option_type_is_config_error() {
        let err =
            LinearBrain::from_options(&options(serde_json::json!({"publish_diffs": "yes"})))
                .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
