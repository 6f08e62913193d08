// FlowCompare — Local git operations

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

pub const INITIAL_COMMIT_MESSAGE: &str = "Initial setup for Contact Flow Comparison";

/// Runs `git` in a fixed working directory.
pub struct Git {
    working_dir: PathBuf,
    timeout: Duration,
}

impl Git {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run `git <args>`; a non-zero exit becomes an error carrying stderr.
    pub async fn run(&self, args: &[&str]) -> anyhow::Result<String> {
        tracing::debug!(args = ?args, cwd = %self.working_dir.display(), "git");

        let output = tokio::time::timeout(
            self.timeout,
            Command::new("git")
                .args(args)
                .current_dir(&self.working_dir)
                .output(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("git {} timed out after {:?}", args.join(" "), self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "git {} failed ({}): {}",
                args.join(" "),
                output.status,
                stderr.trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn is_repository(&self) -> bool {
        self.working_dir.join(".git").exists()
    }

    /// `git init` unless a repository is already there; returns whether it ran.
    pub async fn init_if_needed(&self) -> anyhow::Result<bool> {
        if self.is_repository() {
            return Ok(false);
        }
        self.run(&["init"]).await?;
        Ok(true)
    }

    /// Add `origin`, or repoint it when it exists. Returns true when added.
    pub async fn set_origin(&self, url: &str) -> anyhow::Result<bool> {
        match self.run(&["remote", "add", "origin", url]).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::debug!(error = %e, "origin exists, updating url");
                self.run(&["remote", "set-url", "origin", url]).await?;
                Ok(false)
            }
        }
    }

    pub async fn commit_all(&self, message: &str) -> anyhow::Result<()> {
        self.run(&["add", "."]).await?;
        self.run(&["commit", "-m", message]).await?;
        Ok(())
    }

    pub async fn push_main(&self) -> anyhow::Result<()> {
        self.run(&["branch", "-M", "main"]).await?;
        self.run(&["push", "-u", "origin", "main"]).await?;
        Ok(())
    }
}

/// Whether `program` resolves to an executable on PATH.
pub fn on_path(program: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(program);
        candidate.is_file() || candidate.with_extension("exe").is_file()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_and_origin() {
        if !on_path("git") {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let git = Git::new(tmp.path());

        assert!(git.init_if_needed().await.unwrap());
        assert!(!git.init_if_needed().await.unwrap());

        assert!(git.set_origin("https://example.com/a.git").await.unwrap());
        assert!(!git.set_origin("https://example.com/b.git").await.unwrap());
        let url = git.run(&["remote", "get-url", "origin"]).await.unwrap();
        assert_eq!(url, "https://example.com/b.git");
    }

    #[tokio::test]
    async fn test_failure_carries_command() {
        if !on_path("git") {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let err = Git::new(tmp.path())
            .run(&["rev-parse", "HEAD"])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("git rev-parse HEAD failed"));
    }
}
