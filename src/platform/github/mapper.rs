use crate::platform::types;

pub fn map_comment(comment: octocrab::models::issues::Comment) -> types::IssueComment {
    types::IssueComment {
        id: comment.id.into_inner(),
        author: comment.user.login,
        body: comment.body.unwrap_or_default(),
    }
}

pub fn map_pull_request(pr: octocrab::models::pulls::PullRequest) -> types::PullRequest {
    types::PullRequest {
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        body: pr.body.unwrap_or_default(),
        head_branch: pr.head.ref_field,
        base_branch: pr.base.ref_field,
    }
}
