//! Sync Engine - Orchestrates parallel repository synchronization
//!
//! [`Synchronizer`] runs the clone-or-fetch state machine for one repository;
//! [`SyncEngine`] fans it out over every known repository with a bounded
//! number of concurrent workers and aggregates the outcomes.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::auth::{mask_secrets, redact_url, Credentials};
use crate::discovery::RemoteRepository;
use crate::error::GitError;
use crate::git::Vcs;
use crate::report::{Reporter, SyncEvent};

/// Default number of repositories synchronized at once
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// What the synchronizer did (or tried to do) with a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Clone,
    Fetch,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Clone => write!(f, "clone"),
            SyncAction::Fetch => write!(f, "fetch"),
        }
    }
}

/// Why a repository failed to synchronize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The git executable could not be found
    ToolingMissing,
    /// The local path does not exist or cannot be used
    LocalPathInvalid,
    /// The local directory exists but is not a repository
    LocalRepoCorrupt,
    /// A git command exited non-zero
    CommandFailed,
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureKind::ToolingMissing => "git missing",
            FailureKind::LocalPathInvalid => "invalid local path",
            FailureKind::LocalRepoCorrupt => "corrupt local repository",
            FailureKind::CommandFailed => "git command failed",
            FailureKind::Unknown => "unexpected error",
        };
        f.write_str(text)
    }
}

impl From<&GitError> for FailureKind {
    fn from(error: &GitError) -> Self {
        match error {
            GitError::ToolingMissing => FailureKind::ToolingMissing,
            GitError::NoSuchPath(_) => FailureKind::LocalPathInvalid,
            GitError::InvalidRepository(_) => FailureKind::LocalRepoCorrupt,
            GitError::CommandFailed { .. } => FailureKind::CommandFailed,
            GitError::Other(_) => FailureKind::Unknown,
        }
    }
}

/// Result of synchronizing one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub repository: String,
    pub action: SyncAction,
    pub success: bool,
    /// True when the mirror now differs from before the run
    pub changed: bool,
    pub failure: Option<FailureKind>,
    /// Masked diagnostic text for failures
    pub detail: Option<String>,
}

impl SyncOutcome {
    pub fn succeeded(repository: impl Into<String>, action: SyncAction, changed: bool) -> Self {
        Self {
            repository: repository.into(),
            action,
            success: true,
            changed,
            failure: None,
            detail: None,
        }
    }

    pub fn failed(
        repository: impl Into<String>,
        action: SyncAction,
        kind: FailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            action,
            success: false,
            changed: false,
            failure: Some(kind),
            detail: Some(detail.into()),
        }
    }
}

/// Outcomes of a whole batch
#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub all_succeeded: bool,
    pub outcomes: Vec<SyncOutcome>,
    pub duration: Duration,
}

impl AggregateResult {
    pub fn from_outcomes(outcomes: Vec<SyncOutcome>, duration: Duration) -> Self {
        Self {
            all_succeeded: outcomes.iter().all(|outcome| outcome.success),
            outcomes,
            duration,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &SyncOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.success)
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn changed_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.changed).count()
    }

    pub fn cloned_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.success && outcome.action == SyncAction::Clone)
            .count()
    }
}

/// Per-run settings shared read-only by every worker
#[derive(Debug, Clone)]
pub struct SyncContext {
    /// Directory holding one mirror per repository name
    pub root: PathBuf,
    pub credentials: Credentials,
    pub max_workers: usize,
    /// Limit on a single repository's sync, if any
    pub timeout: Option<Duration>,
}

impl SyncContext {
    pub fn new(root: impl Into<PathBuf>, credentials: Credentials) -> Self {
        Self {
            root: root.into(),
            credentials,
            max_workers: DEFAULT_MAX_WORKERS,
            timeout: None,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// Local mirror path for `name`, or `None` if the name would escape the root
    pub fn mirror_path(&self, name: &str) -> Option<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.root.join(name)),
            _ => None,
        }
    }
}

/// Clone-or-fetch state machine for a single repository
#[derive(Clone)]
pub struct Synchronizer {
    context: Arc<SyncContext>,
    vcs: Arc<dyn Vcs>,
    reporter: Arc<dyn Reporter>,
}

impl Synchronizer {
    pub fn new(context: Arc<SyncContext>, vcs: Arc<dyn Vcs>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            context,
            vcs,
            reporter,
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    /// Whether `name` would be cloned or fetched right now
    pub fn planned_action(&self, name: &str) -> SyncAction {
        match self.context.mirror_path(name) {
            Some(path) if path.exists() => SyncAction::Fetch,
            _ => SyncAction::Clone,
        }
    }

    /// Bring the local mirror of `repo` up to date
    ///
    /// Never returns an error: every failure is classified into the outcome.
    pub async fn sync_one(&self, name: &str, repo: &RemoteRepository) -> SyncOutcome {
        let Some(path) = self.context.mirror_path(name) else {
            return self.fail(
                name,
                SyncAction::Clone,
                FailureKind::LocalPathInvalid,
                format!("Repository name {:?} is not a valid directory name", name),
            );
        };

        let action = if path.exists() {
            SyncAction::Fetch
        } else {
            SyncAction::Clone
        };

        let url = match self.context.credentials.embed(&repo.clone_url) {
            Ok(url) => url,
            Err(e) => return self.fail(name, action, FailureKind::Unknown, e.to_string()),
        };

        let result = match action {
            SyncAction::Clone => self.clone_mirror(&url, &path).await.map(|_| true),
            SyncAction::Fetch => self.fetch_mirror(name, &url, &path).await,
        };

        match result {
            Ok(changed) => {
                let event = match action {
                    SyncAction::Clone => SyncEvent::Cloned {
                        repository: name.to_string(),
                        clone_url: redact_url(&repo.clone_url),
                    },
                    SyncAction::Fetch => SyncEvent::Fetched {
                        repository: name.to_string(),
                        changed,
                    },
                };
                self.reporter.report(&event);
                SyncOutcome::succeeded(name, action, changed)
            }
            Err(e) => self.fail(name, action, FailureKind::from(&e), e.to_string()),
        }
    }

    /// [`Self::sync_one`] bounded by the configured timeout
    pub async fn sync_with_timeout(&self, name: &str, repo: &RemoteRepository) -> SyncOutcome {
        let Some(limit) = self.context.timeout else {
            return self.sync_one(name, repo).await;
        };

        let action = self.planned_action(name);
        match timeout(limit, self.sync_one(name, repo)).await {
            Ok(outcome) => outcome,
            Err(_) => self.fail(
                name,
                action,
                FailureKind::Unknown,
                format!("Operation timed out after {}s", limit.as_secs()),
            ),
        }
    }

    async fn clone_mirror(&self, url: &str, path: &Path) -> Result<(), GitError> {
        debug!("Cloning mirror into {}", path.display());
        self.vcs.clone_mirror(url, path).await
    }

    /// Fetch into an existing mirror, returning whether any ref moved
    async fn fetch_mirror(&self, name: &str, url: &str, path: &Path) -> Result<bool, GitError> {
        let mirror = self.vcs.open(path).await?;

        if self.vcs.remote_url(&mirror).await? != url {
            self.vcs.set_remote_url(&mirror, url).await?;
            self.reporter.report(&SyncEvent::UrlCorrected {
                repository: name.to_string(),
            });
        }

        let before = self.vcs.list_refs(&mirror).await?;
        self.vcs.fetch_all(&mirror).await?;
        let after = self.vcs.list_refs(&mirror).await?;

        Ok(before != after)
    }

    fn fail(&self, name: &str, action: SyncAction, kind: FailureKind, detail: String) -> SyncOutcome {
        let detail = mask_secrets(&detail, &[self.context.credentials.token().to_string()]);
        self.reporter.report(&SyncEvent::Failed {
            repository: name.to_string(),
            action,
            kind,
            detail: detail.clone(),
        });
        SyncOutcome::failed(name, action, kind, detail)
    }
}

/// The main sync engine that orchestrates repository synchronization
#[derive(Clone)]
pub struct SyncEngine {
    synchronizer: Synchronizer,
}

impl SyncEngine {
    pub fn new(context: SyncContext, vcs: Arc<dyn Vcs>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            synchronizer: Synchronizer::new(Arc::new(context), vcs, reporter),
        }
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.synchronizer
    }

    /// Synchronize every repository in `known`, at most `max_workers` at a time
    ///
    /// Waits for the whole batch; one repository's failure never stops the
    /// others.
    pub async fn sync_all(&self, known: &BTreeMap<String, RemoteRepository>) -> AggregateResult {
        let start_time = Instant::now();
        let workers = self.synchronizer.context().max_workers.max(1);

        info!(
            "Syncing {} repositories with {} workers",
            known.len(),
            workers
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut futures = FuturesUnordered::new();

        for (name, repo) in known {
            let semaphore = semaphore.clone();
            let synchronizer = self.synchronizer.clone();
            let action = synchronizer.planned_action(name);
            let task_name = name.clone();
            let task_repo = repo.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return SyncOutcome::failed(
                        task_name,
                        action,
                        FailureKind::Unknown,
                        "Worker pool shut down",
                    );
                };
                synchronizer.sync_with_timeout(&task_name, &task_repo).await
            });

            let name = name.clone();
            futures.push(async move { (name, action, handle.await) });
        }

        let mut outcomes = Vec::with_capacity(known.len());

        while let Some((name, action, joined)) = futures.next().await {
            match joined {
                Ok(outcome) => {
                    debug!("Sync completed: {:?}", outcome);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    error!("Sync task for {} did not finish: {}", name, e);
                    outcomes.push(self.synchronizer.fail(
                        &name,
                        action,
                        FailureKind::Unknown,
                        format!("Sync task did not finish: {}", e),
                    ));
                }
            }
        }

        let result = AggregateResult::from_outcomes(outcomes, start_time.elapsed());

        info!(
            "Sync completed in {:.2}s: {} repositories, {} changed, {} failed",
            result.duration.as_secs_f64(),
            result.outcomes.len(),
            result.changed_count(),
            result.failed_count()
        );

        result
    }
}
