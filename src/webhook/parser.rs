use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::events::{Event, Issue, Message};
use crate::platform::Platform;
use crate::webhook::payload::{IssueCommentPayload, IssuePayload, IssuesPayload};

/// Turns a raw webhook delivery into an [`Event`].
#[async_trait]
pub trait EventService: Send + Sync {
    async fn parse_event(&self, event_name: &str, payload: &[u8]) -> Result<Event>;
}

/// Parses GitHub deliveries and fills in the issue conversation from the API.
///
/// Comments are only fetched for events that trigger generation; other events
/// carry the issue body alone.
pub struct GitHubEventService {
    platform: Arc<dyn Platform>,
    trigger_label: String,
}

impl GitHubEventService {
    pub fn new(platform: Arc<dyn Platform>, trigger_label: &str) -> Self {
        Self {
            platform,
            trigger_label: trigger_label.to_string(),
        }
    }

    /// Append the issue comments, in creation order, after the body.
    async fn with_conversation(&self, mut event: Event) -> Result<Event> {
        if !event.triggers(&self.trigger_label) {
            tracing::debug!(event = %event.description(), "Not triggered, skipping comment fetch");
            return Ok(event);
        }

        let repo = event.repository().full_name.clone();
        let number = event.issue().number;
        let comments = self.platform.list_issue_comments(&repo, number).await?;
        event
            .issue_mut()
            .messages
            .extend(comments.into_iter().map(|c| Message {
                author: c.author,
                body: c.body,
            }));
        Ok(event)
    }
}

/// The issue with its body as the first message, even when the body is empty.
fn issue(payload: &IssuePayload) -> Result<Issue> {
    if payload.pull_request.is_some() {
        return Err(AppError::UnsupportedEvent(format!(
            "#{} is a pull request, not an issue",
            payload.number
        )));
    }
    Ok(Issue {
        number: payload.number,
        title: payload.title.clone(),
        author: payload.user.login.clone(),
        labels: payload.label_names(),
        messages: vec![Message {
            author: payload.user.login.clone(),
            body: payload.body.clone().unwrap_or_default(),
        }],
    })
}

#[async_trait]
impl EventService for GitHubEventService {
    async fn parse_event(&self, event_name: &str, payload: &[u8]) -> Result<Event> {
        let event = match event_name {
            "issues" => {
                let payload: IssuesPayload = serde_json::from_slice(payload)?;
                match (payload.action.as_str(), payload.label) {
                    ("opened", _) => Event::IssueOpened {
                        issue: issue(&payload.issue)?,
                        repository: payload.repository.into(),
                    },
                    ("labeled", Some(label)) => Event::IssueLabeled {
                        issue: issue(&payload.issue)?,
                        repository: payload.repository.into(),
                        label: label.name,
                    },
                    (action, _) => {
                        return Err(AppError::UnsupportedEvent(format!("issues.{action}")))
                    }
                }
            }
            "issue_comment" => {
                let payload: IssueCommentPayload = serde_json::from_slice(payload)?;
                if payload.action != "created" {
                    return Err(AppError::UnsupportedEvent(format!(
                        "issue_comment.{}",
                        payload.action
                    )));
                }
                tracing::debug!(
                    repo = %payload.repository.full_name,
                    comment_id = payload.comment.id,
                    bot = payload.comment.user.is_bot(),
                    "Parsing issue comment"
                );
                Event::CommentAdded {
                    issue: issue(&payload.issue)?,
                    comment: Message {
                        author: payload.comment.user.login,
                        body: payload.comment.body.unwrap_or_default(),
                    },
                    repository: payload.repository.into(),
                }
            }
            other => return Err(AppError::UnsupportedEvent(other.to_string())),
        };

        self.with_conversation(event).await
    }
}
