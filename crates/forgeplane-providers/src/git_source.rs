// Git-sourced provider manifests: clone+checkout with an on-disk cache keyed
// by sha256(repo_url + "#" + ref). The workspace has no libgit2 binding, so
// this shells out to the system `git` binary the same way the step backends
// shell out to terraform/kubectl/ansible-playbook — a subprocess boundary,
// not a new ecosystem dependency.

use crate::error::LoaderError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub struct GitSource {
    cache_root: PathBuf,
}

impl GitSource {
    pub fn new(cache_root: PathBuf) -> Self {
        Self { cache_root }
    }

    fn cache_key(repo_url: &str, git_ref: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(repo_url.as_bytes());
        hasher.update(b"#");
        hasher.update(git_ref.as_bytes());
        let digest = hasher.finalize();
        hex::encode(digest)[..16].to_string()
    }

    /// Ensure `repo_url` at `git_ref` is checked out under the cache dir,
    /// returning its path. Reuses an existing checkout if present.
    pub async fn checkout(&self, repo_url: &str, git_ref: &str) -> Result<PathBuf, LoaderError> {
        let dest = self.cache_root.join(Self::cache_key(repo_url, git_ref));

        if dest.join(".git").exists() {
            tracing::info!(repo = %repo_url, git_ref = %git_ref, path = %dest.display(), "reusing cached provider checkout");
            return Ok(dest);
        }

        tokio::fs::create_dir_all(&self.cache_root)
            .await
            .map_err(LoaderError::Io)?;

        tracing::info!(repo = %repo_url, git_ref = %git_ref, path = %dest.display(), "cloning provider source");
        run_git(&["clone", "--quiet", repo_url, dest.to_str().unwrap_or_default()]).await?;
        run_git_in(&dest, &["checkout", "--quiet", git_ref]).await?;

        Ok(dest)
    }
}

async fn run_git(args: &[&str]) -> Result<(), LoaderError> {
    let output = Command::new("git")
        .args(args)
        .output()
        .await
        .map_err(LoaderError::Io)?;
    check_git_output(output)
}

async fn run_git_in(dir: &Path, args: &[&str]) -> Result<(), LoaderError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(LoaderError::Io)?;
    check_git_output(output)
}

fn check_git_output(output: std::process::Output) -> Result<(), LoaderError> {
    if output.status.success() {
        Ok(())
    } else {
        Err(LoaderError::Git(String::from_utf8_lossy(&output.stderr).trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_and_distinguishes_refs() {
        let a = GitSource::cache_key("https://example.com/repo.git", "main");
        let b = GitSource::cache_key("https://example.com/repo.git", "main");
        let c = GitSource::cache_key("https://example.com/repo.git", "v2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }
}
