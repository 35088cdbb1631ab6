use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::auth::{mask_secrets, redact_url, url_password};
use crate::error::GitError;

/// Ref name to object id, captured around a fetch
pub type RefSnapshot = BTreeMap<String, String>;

/// An opened local mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorHandle {
    pub path: PathBuf,
}

/// Version control capability used by the synchronizer
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Create a full mirror clone of `url` at `dest`
    async fn clone_mirror(&self, url: &str, dest: &Path) -> Result<(), GitError>;

    /// Open an existing mirror, validating that it is a repository
    async fn open(&self, path: &Path) -> Result<MirrorHandle, GitError>;

    /// URL currently configured for the `origin` remote
    async fn remote_url(&self, repo: &MirrorHandle) -> Result<String, GitError>;

    async fn set_remote_url(&self, repo: &MirrorHandle, url: &str) -> Result<(), GitError>;

    /// Fetch every ref from `origin`, pruning refs deleted upstream
    async fn fetch_all(&self, repo: &MirrorHandle) -> Result<(), GitError>;

    async fn list_refs(&self, repo: &MirrorHandle) -> Result<RefSnapshot, GitError>;
}

/// `Vcs` implementation that shells out to the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    /// Use a specific git executable instead of the one on PATH
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run git with `args`, returning trimmed stdout on success
    ///
    /// Authenticated URLs among the arguments are redacted in the recorded
    /// command, and their passwords are masked in the captured output.
    async fn run<I, S>(&self, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<String> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_string_lossy().into_owned())
            .collect();
        let secrets: Vec<String> = args.iter().filter_map(|arg| url_password(arg)).collect();
        let command = std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(args.iter().map(|arg| redact_url(arg)))
            .collect::<Vec<_>>()
            .join(" ");

        debug!("Running: {}", command);

        let output = AsyncCommand::new(&self.program)
            .args(&args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => GitError::ToolingMissing,
                _ => GitError::Other(format!("Failed to execute {}: {}", command, e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let combined = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(GitError::CommandFailed {
                command,
                output: mask_secrets(&combined, &secrets),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run_in(&self, repo: &MirrorHandle, args: &[&str]) -> Result<String, GitError> {
        let mut full: Vec<&OsStr> = vec![OsStr::new("--git-dir"), repo.path.as_os_str()];
        full.extend(args.iter().map(OsStr::new));
        self.run(full).await
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn clone_mirror(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|_| GitError::NoSuchPath(parent.to_path_buf()))?;
        }

        self.run([
            OsStr::new("clone"),
            OsStr::new("--mirror"),
            OsStr::new(url),
            dest.as_os_str(),
        ])
        .await
        .map(|_| ())
    }

    async fn open(&self, path: &Path) -> Result<MirrorHandle, GitError> {
        if !path.is_dir() {
            return Err(GitError::NoSuchPath(path.to_path_buf()));
        }

        let handle = MirrorHandle {
            path: path.to_path_buf(),
        };

        match self.run_in(&handle, &["rev-parse", "--git-dir"]).await {
            Ok(_) => Ok(handle),
            Err(GitError::CommandFailed { .. }) => Err(GitError::InvalidRepository(path.to_path_buf())),
            Err(other) => Err(other),
        }
    }

    async fn remote_url(&self, repo: &MirrorHandle) -> Result<String, GitError> {
        self.run_in(repo, &["remote", "get-url", "origin"]).await
    }

    async fn set_remote_url(&self, repo: &MirrorHandle, url: &str) -> Result<(), GitError> {
        self.run_in(repo, &["remote", "set-url", "origin", url])
            .await
            .map(|_| ())
    }

    async fn fetch_all(&self, repo: &MirrorHandle) -> Result<(), GitError> {
        self.run_in(repo, &["fetch", "--prune", "origin"])
            .await
            .map(|_| ())
    }

    async fn list_refs(&self, repo: &MirrorHandle) -> Result<RefSnapshot, GitError> {
        let stdout = self
            .run_in(repo, &["for-each-ref", "--format=%(objectname) %(refname)"])
            .await?;
        Ok(parse_ref_listing(&stdout))
    }
}

/// Parse `for-each-ref` output of the form `<objectname> <refname>`
fn parse_ref_listing(output: &str) -> RefSnapshot {
    output
        .lines()
        .filter_map(|line| {
            let (object, name) = line.trim().split_once(' ')?;
            Some((name.to_string(), object.to_string()))
        })
        .collect()
}
