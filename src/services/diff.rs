use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::services::DiffService;
use crate::workspace::{git, Workspace};

/// Diffs the workspace with git2.
#[derive(Default)]
pub struct GitDiffService;

#[async_trait]
impl DiffService for GitDiffService {
    async fn get_diff(&self, workspace: &Workspace) -> Result<String> {
        git::diff(&workspace.path).await.map_err(|e| match e {
            AppError::Git(msg) => AppError::Diff(msg),
            other => other,
        })
    }
}
