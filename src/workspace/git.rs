use std::path::Path;

use git2::{
    build::RepoBuilder, Cred, DiffFormat, DiffOptions, FetchOptions, IndexAddOption, PushOptions,
    RemoteCallbacks, Repository, Signature,
};

use crate::error::{AppError, Result};

/// Commit author identity.
#[derive(Debug, Clone)]
pub struct Author {
    pub name: String,
    pub email: String,
}

/// Reject branch names starting with `-` so they can never be read as options.
fn validate_branch_name(name: &str) -> Result<()> {
    if name.starts_with('-') {
        return Err(AppError::Git(format!(
            "Invalid branch name (starts with '-'): {name}"
        )));
    }
    Ok(())
}

fn token_callbacks(token: &str) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username_from_url, _allowed_types| {
        Cred::userpass_plaintext("x-access-token", token)
    });
    callbacks
}

/// Run a blocking git2 closure on the blocking pool.
async fn blocking<T, F>(label: &'static str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Git(format!("{label} task panicked: {e}")))?
}

/// Clone a repository into the target directory.
///
/// The remote URL stored in `.git/config` stays the plain URL; the token only
/// lives in the credential callback.
pub async fn clone(url: &str, target: &Path, token: &str) -> Result<()> {
    if !url.starts_with("https://") {
        return Err(AppError::Git(format!(
            "Expected HTTPS clone URL, got: {url}"
        )));
    }

    let url = url.to_string();
    let target = target.to_path_buf();
    let token = token.to_string();

    blocking("Clone", move || {
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(token_callbacks(&token));
        RepoBuilder::new()
            .fetch_options(fetch_opts)
            .clone(&url, &target)?;
        Ok(())
    })
    .await
}

/// Point `branch` at the tip of `base` (creating or overwriting it) and check it out.
pub async fn reset_branch(dir: &Path, branch: &str, base: &str) -> Result<()> {
    validate_branch_name(branch)?;
    validate_branch_name(base)?;

    let dir = dir.to_path_buf();
    let branch = branch.to_string();
    let base = base.to_string();

    blocking("Reset-branch", move || {
        let repo = Repository::open(&dir)?;
        let base_commit = repo
            .revparse_single(&format!("refs/remotes/origin/{base}"))
            .or_else(|_| repo.revparse_single(&format!("refs/heads/{base}")))?
            .peel_to_commit()?;

        repo.branch(&branch, &base_commit, true)?;
        let obj = repo.revparse_single(&format!("refs/heads/{branch}"))?;
        repo.checkout_tree(&obj, Some(git2::build::CheckoutBuilder::new().force()))?;
        repo.set_head(&format!("refs/heads/{branch}"))?;
        Ok(())
    })
    .await
}

/// Stage every change in the working tree, deletions included.
pub async fn add_all(dir: &Path) -> Result<()> {
    let dir = dir.to_path_buf();

    blocking("Add-all", move || {
        let repo = Repository::open(&dir)?;
        let mut index = repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    })
    .await
}

/// Commit the current index on top of HEAD.
pub async fn commit(dir: &Path, message: &str, author: &Author) -> Result<()> {
    let dir = dir.to_path_buf();
    let message = message.to_string();
    let author = author.clone();

    blocking("Commit", move || {
        let repo = Repository::open(&dir)?;
        let sig = Signature::now(&author.name, &author.email)?;
        let mut index = repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = repo.find_tree(tree_oid)?;
        let parent = repo.head()?.peel_to_commit()?;
        repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&parent])?;
        Ok(())
    })
    .await
}

/// Push `branch` to origin, overwriting the remote branch when `force` is set.
pub async fn push(dir: &Path, branch: &str, token: &str, force: bool) -> Result<()> {
    validate_branch_name(branch)?;

    let dir = dir.to_path_buf();
    let branch = branch.to_string();
    let token = token.to_string();

    blocking("Push", move || {
        let repo = Repository::open(&dir)?;
        let mut remote = repo.find_remote("origin")?;
        let prefix = if force { "+" } else { "" };
        let refspec = format!("{prefix}refs/heads/{branch}:refs/heads/{branch}");
        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(token_callbacks(&token));
        remote.push(&[&refspec], Some(&mut push_opts))?;
        Ok(())
    })
    .await
}

/// Check if there are any staged, unstaged or untracked changes.
pub async fn has_changes(dir: &Path) -> Result<bool> {
    let dir = dir.to_path_buf();

    blocking("Has-changes", move || {
        let repo = Repository::open(&dir)?;
        let statuses = repo.statuses(None)?;
        Ok(!statuses.is_empty())
    })
    .await
}

/// Unified patch of HEAD against the index and working tree, untracked files included.
pub async fn diff(dir: &Path) -> Result<String> {
    let dir = dir.to_path_buf();

    blocking("Diff", move || {
        let repo = Repository::open(&dir)?;
        let head_tree = repo.head()?.peel_to_tree()?;

        let mut opts = DiffOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .show_untracked_content(true);

        let diff = repo.diff_tree_to_workdir_with_index(Some(&head_tree), Some(&mut opts))?;

        let mut patch = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                patch.push(line.origin());
            }
            patch.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        Ok(patch)
    })
    .await
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Initialise a repository with one commit on `main`.
    pub fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join("README.md"), "# widgets\n").unwrap();
        {
            let mut index = repo.index().unwrap();
            index
                .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
                .unwrap();
            index.write().unwrap();
            let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
            let sig = Signature::now("Test", "test@example.com").unwrap();
            repo.commit(Some("refs/heads/main"), &sig, &sig, "init", &tree, &[])
                .unwrap();
        }
        repo.set_head("refs/heads/main").unwrap();
        repo
    }
}

#[cfg(test)]
mod tests {
    use super::testing::init_repo;
    use super::*;
    use std::fs;

    fn author() -> Author {
        Author {
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
        }
    }

    #[test]
    fn test_validate_branch_name() {
        assert!(validate_branch_name("--upload-pack").is_err());
        assert!(validate_branch_name("hyphae/issue-42").is_ok());
    }

    #[tokio::test]
    async fn test_clone_rejects_non_https() {
        let err = clone("git@github.com:owner/repo.git", Path::new("/tmp/x"), "token")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Expected HTTPS clone URL"));
    }

    #[tokio::test]
    async fn test_clean_repo_has_no_changes() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        assert!(!has_changes(tmp.path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_diff_includes_untracked_files() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        fs::write(tmp.path().join("src.rs"), "fn main() {}\n").unwrap();
        fs::write(tmp.path().join("README.md"), "# gadgets\n").unwrap();

        let patch = diff(tmp.path()).await.unwrap();
        assert!(patch.contains("+fn main() {}"));
        assert!(patch.contains("-# widgets"));
        assert!(patch.contains("+# gadgets"));
    }

    #[tokio::test]
    async fn test_add_and_commit_clears_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = init_repo(tmp.path());
        fs::write(tmp.path().join("new.txt"), "hello").unwrap();

        add_all(tmp.path()).await.unwrap();
        commit(tmp.path(), "add new.txt", &author()).await.unwrap();

        assert!(!has_changes(tmp.path()).await.unwrap());
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.message(), Some("add new.txt"));
    }

    #[tokio::test]
    async fn test_reset_branch_checks_out_from_base() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = init_repo(tmp.path());

        reset_branch(tmp.path(), "hyphae/issue-1", "main").await.unwrap();

        let head = repo.head().unwrap();
        assert_eq!(head.shorthand(), Some("hyphae/issue-1"));
    }
}
