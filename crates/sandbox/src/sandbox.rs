use std::path::{Path, PathBuf};
use std::process::Stdio;

use rand::Rng;
use tokio::process::Command;

use crate::diff::DiffStats;
use crate::error::{Result, SandboxError};
use crate::subprocess::{run_with_timeout, GIT_CLONE_TIMEOUT, GIT_TIMEOUT};

const GITHUB_HOST_PREFIX: &str = "https://github.com/";
const COMMIT_EMAIL: &str = "starforge@example.com";
const COMMIT_NAME: &str = "Starforge Bot";

/// A scoped, exclusively-owned working tree for one attempt.
///
/// Acquired via [`Sandbox::acquire`]; callers are responsible for calling
/// [`Sandbox::release`] on every exit path (success, failure, or
/// cancellation) to guarantee the per-sandbox directory is removed.
#[derive(Debug)]
pub struct Sandbox {
    root: PathBuf,
    path: PathBuf,
    repo_url: String,
    base_branch: String,
    branch_name: String,
}

impl Sandbox {
    /// Working tree path (the cloned `repo/` directory).
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub fn base_branch(&self) -> &str {
        &self.base_branch
    }

    pub fn branch_name(&self) -> &str {
        &self.branch_name
    }

    /// Acquire a fresh sandbox: create a directory under `base_dir`, clone
    /// `repo_url` shallowly at `base_branch` (falling back to the remote's
    /// default branch if it doesn't exist), create and check out a new
    /// attempt branch, and configure a local commit identity.
    pub async fn acquire(
        base_dir: &Path,
        repo_url: &str,
        base_branch: &str,
        credential_token: Option<&str>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(base_dir)
            .await
            .map_err(|source| SandboxError::CreateDir {
                path: base_dir.to_path_buf(),
                source,
            })?;

        let root = tokio::task::spawn_blocking({
            let base_dir = base_dir.to_path_buf();
            move || tempfile::Builder::new().prefix("attempt_").tempdir_in(base_dir)
        })
        .await
        .map_err(|source| SandboxError::CreateDir {
            path: base_dir.to_path_buf(),
            source: std::io::Error::other(source),
        })?
        .map_err(|source| SandboxError::CreateDir {
            path: base_dir.to_path_buf(),
            source,
        })?
        .keep();

        match Self::clone_and_checkout(&root, repo_url, base_branch, credential_token).await {
            Ok(sandbox) => Ok(sandbox),
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&root).await;
                Err(e)
            }
        }
    }

    async fn clone_and_checkout(
        root: &Path,
        repo_url: &str,
        base_branch: &str,
        credential_token: Option<&str>,
    ) -> Result<Self> {
        let repo_path = root.join("repo");
        let clone_url = add_auth_to_url(repo_url, credential_token);

        let mut clone_cmd = git_command(None);
        clone_cmd
            .args(["clone", "--depth", "1", "-b", base_branch, &clone_url])
            .arg(&repo_path);
        let output = run_with_timeout(clone_cmd, GIT_CLONE_TIMEOUT, "git clone").await?;

        let output = if !output.status.success()
            && String::from_utf8_lossy(&output.stderr)
                .to_lowercase()
                .contains("not found")
        {
            let mut retry_cmd = git_command(None);
            retry_cmd
                .args(["clone", "--depth", "1", &clone_url])
                .arg(&repo_path);
            run_with_timeout(retry_cmd, GIT_CLONE_TIMEOUT, "git clone (default branch)").await?
        } else {
            output
        };

        if !output.status.success() {
            return Err(SandboxError::CloneFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let branch_name = format!("claude/attempt-{}", random_hex8());

        let mut checkout_cmd = git_command(Some(&repo_path));
        checkout_cmd.args(["checkout", "-b", &branch_name]);
        let output = run_with_timeout(checkout_cmd, GIT_TIMEOUT, "git checkout -b").await?;
        if !output.status.success() {
            return Err(SandboxError::CheckoutFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let mut email_cmd = git_command(Some(&repo_path));
        email_cmd.args(["config", "user.email", COMMIT_EMAIL]);
        let _ = run_with_timeout(email_cmd, GIT_TIMEOUT, "git config user.email").await?;

        let mut name_cmd = git_command(Some(&repo_path));
        name_cmd.args(["config", "user.name", COMMIT_NAME]);
        let _ = run_with_timeout(name_cmd, GIT_TIMEOUT, "git config user.name").await?;

        Ok(Sandbox {
            root: root.to_path_buf(),
            path: repo_path,
            repo_url: repo_url.to_string(),
            base_branch: base_branch.to_string(),
            branch_name,
        })
    }

    /// Recursively delete the per-sandbox directory. Best-effort: errors
    /// are swallowed, never propagated.
    pub async fn release(self) {
        let _ = tokio::fs::remove_dir_all(&self.root).await;
    }

    pub async fn get_diff_stats(&self) -> Result<DiffStats> {
        let mut cmd = git_command(Some(&self.path));
        cmd.args(["diff", "--numstat", "HEAD"]);
        let output = run_with_timeout(cmd, GIT_TIMEOUT, "git diff --numstat").await?;
        let stdout =
            String::from_utf8(output.stdout).map_err(|_| SandboxError::InvalidDiffOutput)?;
        Ok(DiffStats::parse(&stdout))
    }

    pub async fn get_diff(&self) -> Result<String> {
        let mut cmd = git_command(Some(&self.path));
        cmd.args(["diff", "HEAD"]);
        let output = run_with_timeout(cmd, GIT_TIMEOUT, "git diff").await?;
        String::from_utf8(output.stdout).map_err(|_| SandboxError::InvalidDiffOutput)
    }

    /// Stage and commit all changes. Returns `false` if there was nothing
    /// to commit.
    pub async fn commit_changes(&self, message: &str) -> Result<bool> {
        let mut add_cmd = git_command(Some(&self.path));
        add_cmd.args(["add", "-A"]);
        let _ = run_with_timeout(add_cmd, GIT_TIMEOUT, "git add -A").await?;

        let mut commit_cmd = git_command(Some(&self.path));
        commit_cmd.args(["commit", "-m", message]);
        let output = run_with_timeout(commit_cmd, GIT_TIMEOUT, "git commit").await?;
        Ok(output.status.success())
    }

    /// Push the attempt branch to `origin`, rewriting the remote URL with
    /// `credential_token` inlined when supplied. Returns `false` on
    /// failure rather than erroring, matching the caller's soft-fail
    /// handling of push outcomes.
    pub async fn push_branch(&self, credential_token: Option<&str>) -> Result<bool> {
        if let Some(token) = credential_token {
            let remote_url = add_auth_to_url(&self.repo_url, Some(token));
            let mut remote_cmd = git_command(Some(&self.path));
            remote_cmd.args(["remote", "set-url", "origin", &remote_url]);
            let _ = run_with_timeout(remote_cmd, GIT_TIMEOUT, "git remote set-url").await?;
        }

        let mut push_cmd = git_command(Some(&self.path));
        push_cmd.args(["push", "-u", "origin", &self.branch_name]);
        let output = run_with_timeout(push_cmd, GIT_CLONE_TIMEOUT, "git push").await?;
        Ok(output.status.success())
    }
}

fn git_command(cwd: Option<&Path>) -> Command {
    let mut cmd = Command::new("git");
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd
}

/// Inline a credential token into a GitHub HTTPS clone/push URL.
///
/// Restricted to `https://github.com/...` URLs; any other host is
/// returned unchanged. The token is never logged by this module.
fn add_auth_to_url(url: &str, token: Option<&str>) -> String {
    match token {
        Some(token) if url.starts_with(GITHUB_HOST_PREFIX) => {
            format!("https://{token}@github.com/{}", &url[GITHUB_HOST_PREFIX.len()..])
        }
        _ => url.to_string(),
    }
}

fn random_hex8() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 4] = rng.r#gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_is_inlined_for_github_urls() {
        let url = add_auth_to_url("https://github.com/acme/widgets", Some("ghp_secret"));
        assert_eq!(url, "https://ghp_secret@github.com/acme/widgets");
    }

    #[test]
    fn auth_is_skipped_without_token() {
        let url = add_auth_to_url("https://github.com/acme/widgets", None);
        assert_eq!(url, "https://github.com/acme/widgets");
    }

    #[test]
    fn auth_is_skipped_for_non_github_hosts() {
        let url = add_auth_to_url("https://gitlab.example.com/acme/widgets", Some("secret"));
        assert_eq!(url, "https://gitlab.example.com/acme/widgets");
    }

    #[test]
    fn random_hex8_is_eight_lowercase_hex_chars() {
        let hex = random_hex8();
        assert_eq!(hex.len(), 8);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
