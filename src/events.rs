//! Trigger events the pipeline reacts to.
//!
//! An [`Event`] is built once by the event service and only ever read after
//! that: strategies, agents and log records all see the same value.

use serde::{Deserialize, Serialize};

/// Repository the event originated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub full_name: String,
    pub clone_url: String,
    pub default_branch: String,
}

/// A single authored message: the issue body or one of its comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub labels: Vec<String>,
    /// Issue body first, then comments in creation order.
    pub messages: Vec<Message>,
}

impl Issue {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Render the conversation for a prompt.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("**@{}:** {}", m.author, m.body))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    IssueOpened {
        repository: RepositoryRef,
        issue: Issue,
    },
    IssueLabeled {
        repository: RepositoryRef,
        issue: Issue,
        label: String,
    },
    CommentAdded {
        repository: RepositoryRef,
        issue: Issue,
        comment: Message,
    },
}

impl Event {
    pub fn repository(&self) -> &RepositoryRef {
        match self {
            Event::IssueOpened { repository, .. }
            | Event::IssueLabeled { repository, .. }
            | Event::CommentAdded { repository, .. } => repository,
        }
    }

    pub fn issue(&self) -> &Issue {
        match self {
            Event::IssueOpened { issue, .. }
            | Event::IssueLabeled { issue, .. }
            | Event::CommentAdded { issue, .. } => issue,
        }
    }

    pub fn issue_mut(&mut self) -> &mut Issue {
        match self {
            Event::IssueOpened { issue, .. }
            | Event::IssueLabeled { issue, .. }
            | Event::CommentAdded { issue, .. } => issue,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::IssueOpened { .. } => "issue_opened",
            Event::IssueLabeled { .. } => "issue_labeled",
            Event::CommentAdded { .. } => "comment_added",
        }
    }

    /// Whether this event should start a generation run.
    ///
    /// A label event fires only for the trigger label itself. Opened issues and
    /// new comments fire when the issue already carries the trigger label; bot
    /// comments never fire so our own progress comments cannot loop.
    pub fn triggers(&self, trigger_label: &str) -> bool {
        match self {
            Event::IssueLabeled { label, .. } => label == trigger_label,
            Event::IssueOpened { issue, .. } => issue.has_label(trigger_label),
            Event::CommentAdded { issue, comment, .. } => {
                !comment.author.ends_with("[bot]") && issue.has_label(trigger_label)
            }
        }
    }

    pub fn description(&self) -> String {
        format!(
            "{} #{} on {}",
            self.kind(),
            self.issue().number,
            self.repository().full_name
        )
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_label_event_triggers_only_on_trigger_label() {
        let labeled = |label: &str| Event::IssueLabeled {
            repository: repository(),
            issue: issue(7, &[label]),
            label: label.to_string(),
        };
        assert!(labeled("hyphae").triggers("hyphae"));
        assert!(!labeled("bug").triggers("hyphae"));
    }

    #[test]
    fn test_opened_issue_needs_label() {
        assert!(!issue_opened(1).triggers("hyphae"));

        let event = Event::IssueOpened {
            repository: repository(),
            issue: issue(1, &["hyphae"]),
        };
        assert!(event.triggers("hyphae"));
    }

    #[test]
    fn test_bot_comment_never_triggers() {
        let comment = |author: &str| Event::CommentAdded {
            repository: repository(),
            issue: issue(3, &["hyphae"]),
            comment: Message {
                author: author.to_string(),
                body: "ping".to_string(),
            },
        };
        assert!(comment("bob").triggers("hyphae"));
        assert!(!comment("hyphae[bot]").triggers("hyphae"));
    }

    #[test]
    fn test_transcript_keeps_message_order() {
        let mut issue = issue(5, &[]);
        issue.messages.push(Message {
            author: "bob".to_string(),
            body: "Same here".to_string(),
        });
        assert_eq!(
            issue.transcript(),
            "**@alice:** Every widget is flipped.\n\n**@bob:** Same here"
        );
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let value = serde_json::to_value(issue_opened(42)).unwrap();
        assert_eq!(value["type"], "issue_opened");
        assert_eq!(value["issue"]["number"], 42);
    }
}
