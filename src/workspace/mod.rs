pub mod git;

use std::path::{Component, Path, PathBuf};

use crate::config::WorkspaceConfig;
use crate::error::{AppError, Result};
use crate::events::RepositoryRef;

/// A checked-out repository that a generation run works in.
///
/// This is the repository handle handed to every collaborator. It is never
/// mutated after checkout; git state changes happen on disk through [`git`].
#[derive(Debug, Clone)]
pub struct Workspace {
    pub path: PathBuf,
    pub repo_full_name: String,
    pub base_branch: String,
    pub branch: String,
}

impl Workspace {
    /// Resolve a repository-relative path, refusing anything outside the workspace.
    ///
    /// Missing parent directories are not created; the path only has to be
    /// lexically inside the root and, if its nearest existing ancestor is a
    /// symlink, that ancestor must still resolve inside the root.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf> {
        let requested_path = Path::new(requested);
        if requested_path.is_absolute()
            || requested_path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(AppError::Workspace(format!(
                "Path traversal detected: {requested} is outside workspace"
            )));
        }

        let root = self
            .path
            .canonicalize()
            .map_err(|e| AppError::Workspace(format!("Failed to resolve workspace root: {e}")))?;
        let full_path = root.join(requested_path);

        let mut existing = full_path.as_path();
        while !existing.exists() {
            existing = match existing.parent() {
                Some(parent) => parent,
                None => break,
            };
        }
        let canonical = existing
            .canonicalize()
            .map_err(|e| AppError::Workspace(format!("Failed to resolve path: {e}")))?;
        if !canonical.starts_with(&root) {
            return Err(AppError::Workspace(format!(
                "Path traversal detected: {requested} is outside workspace"
            )));
        }

        if full_path.starts_with(root.join(".git")) {
            return Err(AppError::Workspace(format!(
                "Refusing to touch git metadata: {requested}"
            )));
        }

        Ok(full_path)
    }
}

/// Creates and removes per-issue workspace directories.
pub struct WorkspaceManager {
    base_dir: PathBuf,
}

impl WorkspaceManager {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
        }
    }

    /// Clone the repository into a fresh directory for `issue_number`.
    ///
    /// The head branch is only named here; the commit service creates it.
    pub async fn checkout(
        &self,
        repository: &RepositoryRef,
        token: &str,
        issue_number: u64,
    ) -> Result<Workspace> {
        let branch = branch_for_issue(issue_number);
        let path = self.workspace_path(&repository.full_name, &branch);

        if path.exists() {
            tokio::fs::remove_dir_all(&path)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to clean workspace: {e}")))?;
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to create workspace dir: {e}")))?;
        }

        git::clone(&repository.clone_url, &path, token).await?;

        Ok(Workspace {
            path,
            repo_full_name: repository.full_name.clone(),
            base_branch: repository.default_branch.clone(),
            branch,
        })
    }

    pub async fn cleanup(&self, workspace: &Workspace) -> Result<()> {
        if workspace.path.exists() {
            tokio::fs::remove_dir_all(&workspace.path)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to cleanup workspace: {e}")))?;
        }
        Ok(())
    }

    fn workspace_path(&self, repo_full_name: &str, branch: &str) -> PathBuf {
        let safe_name = repo_full_name.replace('/', "__");
        let safe_branch = branch.replace('/', "__");
        self.base_dir.join(format!("{safe_name}__{safe_branch}"))
    }
}

pub fn branch_for_issue(issue_number: u64) -> String {
    format!("hyphae/issue-{issue_number}")
}


#[cfg(test)]
mod tests {
    use super::testing::workspace_at;
    use super::*;

    #[test]
    fn test_resolve_accepts_nested_new_file() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = workspace_at(tmp.path());

        let resolved = ws.resolve("src/widgets/flip.rs").unwrap();
        assert!(resolved.ends_with("src/widgets/flip.rs"));
        assert!(!tmp.path().join("src").exists());
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = workspace_at(tmp.path());

        assert!(ws.resolve("../etc/passwd").is_err());
        assert!(ws.resolve("src/../../outside").is_err());
        assert!(ws.resolve("/etc/passwd").is_err());
    }

    #[test]
    fn test_resolve_rejects_git_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(".git")).unwrap();
        let ws = workspace_at(tmp.path());

        assert!(ws.resolve(".git/config").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink_escape() {
        let tmp = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("link")).unwrap();
        let ws = workspace_at(tmp.path());

        assert!(ws.resolve("link/secret.txt").is_err());
    }

    #[test]
    fn test_workspace_path_is_flat() {
        let mgr = WorkspaceManager::new(&WorkspaceConfig {
            base_dir: PathBuf::from("/tmp/ws"),
        });
        assert_eq!(
            mgr.workspace_path("octo/widgets", "hyphae/issue-9"),
            PathBuf::from("/tmp/ws/octo__widgets__hyphae__issue-9")
        );
    }
}
