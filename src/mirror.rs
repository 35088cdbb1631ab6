//! Mirroring run pipeline
//!
//! A run has two phases. [`Mirror::discover`] authenticates, fetches the
//! remote inventory and reconciles it against the configuration.
//! [`Mirror::synchronize`] then mirrors every known repository and produces
//! the [`RunReport`]. Callers that classify unknown repositories do so
//! between the two phases via [`Discovery::apply_classification`].

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::Credentials;
use crate::config::MirrorSettings;
use crate::discovery::{fetch_inventory, AuthenticatedUser, RemoteRepository, RepositorySource};
use crate::error::MirrorError;
use crate::git::Vcs;
use crate::reconcile::{reconcile, Classification, Reconciliation};
use crate::report::Reporter;
use crate::sync::{AggregateResult, SyncAction, SyncContext, SyncEngine};

/// Exit code bit for a fatal error
pub const EXIT_FATAL: i32 = 1;
/// Exit code bit for too many unknown repositories
pub const EXIT_UNKNOWN_REPOS: i32 = 2;
/// Exit code bit for at least one failed repository
pub const EXIT_SYNC_FAILED: i32 = 4;

/// Result of the discovery phase
#[derive(Debug, Clone)]
pub struct Discovery {
    pub user: AuthenticatedUser,
    pub inventory_size: usize,
    pub reconciliation: Reconciliation,
    /// Unknown count before any classification
    pub unknown_count: usize,
}

impl Discovery {
    /// Move classified repositories out of the unknown set
    ///
    /// Tracked repositories join the known set and are synchronized in the
    /// same run.
    pub fn apply_classification(&mut self, delta: &Classification) {
        let reconciliation = &mut self.reconciliation;
        let mut remaining = Vec::with_capacity(reconciliation.unknown.len());

        for repo in std::mem::take(&mut reconciliation.unknown) {
            if let Some(entry) = delta.track.get(&repo.name) {
                let mut known = repo;
                known.clone_url = entry.clone_url.clone();
                reconciliation.known.insert(known.name.clone(), known);
            } else if delta.exclude.contains(&repo.name) {
                reconciliation.excluded.push(repo.name);
            } else {
                remaining.push(repo);
            }
        }

        reconciliation.unknown = remaining;
    }
}

/// Summary of a complete run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub user: String,
    pub inventory_size: usize,
    pub known_count: usize,
    pub unknown_count: usize,
    pub excluded_count: usize,
    pub unlisted_count: usize,
    pub unknown_threshold: usize,
    pub interactive: bool,
    pub sync: AggregateResult,
}

impl RunReport {
    /// Whether the unknown-repository warning applies to this run
    ///
    /// Never in interactive runs, and never when the threshold is 0.
    pub fn unknown_threshold_exceeded(&self) -> bool {
        !self.interactive
            && self.unknown_threshold > 0
            && self.unknown_count >= self.unknown_threshold
    }

    /// Process exit code: a bit set of [`EXIT_UNKNOWN_REPOS`] and [`EXIT_SYNC_FAILED`]
    pub fn exit_code(&self) -> i32 {
        let mut code = 0;
        if self.unknown_threshold_exceeded() {
            code |= EXIT_UNKNOWN_REPOS;
        }
        if !self.sync.all_succeeded {
            code |= EXIT_SYNC_FAILED;
        }
        code
    }
}

/// One mirroring run over a repository source and a VCS
pub struct Mirror {
    settings: MirrorSettings,
    source: Arc<dyn RepositorySource>,
    vcs: Arc<dyn Vcs>,
    reporter: Arc<dyn Reporter>,
}

impl Mirror {
    pub fn new(
        settings: MirrorSettings,
        source: Arc<dyn RepositorySource>,
        vcs: Arc<dyn Vcs>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            settings,
            source,
            vcs,
            reporter,
        }
    }

    pub fn settings(&self) -> &MirrorSettings {
        &self.settings
    }

    /// Authenticate, fetch the inventory and reconcile it
    pub async fn discover(&self) -> Result<Discovery, MirrorError> {
        info!("Testing auth token and loading user");
        let user = self.source.authenticated_user().await?;

        info!("{} repos configured", self.settings.repos.len());
        info!("{} repos excluded", self.settings.exclude.len());

        info!("Loading repo data from {}", self.source.provider_name());
        let inventory = fetch_inventory(self.source.as_ref(), self.settings.only_personal).await?;

        let reconciliation = reconcile(&inventory, &self.settings.repos, &self.settings.exclude);

        for name in reconciliation.conflicts() {
            warn!("Repo {} is both configured and excluded, keeping it", name);
        }
        for repo in &reconciliation.unlisted {
            if self.settings.sync_unlisted {
                warn!(
                    "Repo {} was not found on {}, syncing it from its configured url",
                    repo.name,
                    self.source.provider_name()
                );
            } else {
                warn!(
                    "Repo {} is configured but was not found on {}, skipping",
                    repo.name,
                    self.source.provider_name()
                );
            }
        }

        info!(
            "{} repos found on {} of which {} are unknown",
            inventory.len(),
            self.source.provider_name(),
            reconciliation.unknown.len()
        );

        Ok(Discovery {
            user,
            inventory_size: inventory.len(),
            unknown_count: reconciliation.unknown.len(),
            reconciliation,
        })
    }

    /// Mirror every known repository and build the run report
    pub async fn synchronize(
        &self,
        discovery: &Discovery,
        interactive: bool,
    ) -> Result<RunReport, MirrorError> {
        let root = &self.settings.repo_root;
        if !root.exists() {
            info!("Repo path does not exist, creating");
            tokio::fs::create_dir_all(root)
                .await
                .map_err(|source| MirrorError::RepoRoot {
                    path: root.clone(),
                    source,
                })?;
        }

        let targets = self.sync_targets(&discovery.reconciliation);

        info!("Updating repositories");
        let engine = SyncEngine::new(
            self.sync_context(&discovery.user),
            self.vcs.clone(),
            self.reporter.clone(),
        );
        let sync = engine.sync_all(&targets).await;

        let report = RunReport {
            user: discovery.user.login.clone(),
            inventory_size: discovery.inventory_size,
            known_count: targets.len(),
            unknown_count: discovery.unknown_count,
            excluded_count: discovery.reconciliation.excluded.len(),
            unlisted_count: discovery.reconciliation.unlisted.len(),
            unknown_threshold: self.settings.unknown_repo_warning,
            interactive,
            sync,
        };

        if !report.sync.all_succeeded {
            error!("Some repos failed to fetch or clone");
        }
        if report.unknown_threshold_exceeded() {
            error!(
                "There are {} unknown repos on {}. This is more than your limit of {}",
                report.unknown_count,
                self.source.provider_name(),
                report.unknown_threshold
            );
        }

        Ok(report)
    }

    /// Non-interactive run: discover, then synchronize
    pub async fn run(&self) -> Result<RunReport, MirrorError> {
        let discovery = self.discover().await?;
        self.synchronize(&discovery, false).await
    }

    /// What [`Self::synchronize`] would do to each repository, touching nothing
    pub fn plan(&self, discovery: &Discovery) -> Vec<(String, SyncAction)> {
        let context = self.sync_context(&discovery.user);
        self.sync_targets(&discovery.reconciliation)
            .into_keys()
            .map(|name| {
                let action = match context.mirror_path(&name) {
                    Some(path) if path.exists() => SyncAction::Fetch,
                    _ => SyncAction::Clone,
                };
                (name, action)
            })
            .collect()
    }

    fn sync_context(&self, user: &AuthenticatedUser) -> SyncContext {
        SyncContext::new(
            self.settings.repo_root.clone(),
            Credentials::new(user.login.clone(), self.settings.token.clone()),
        )
        .with_max_workers(self.settings.max_workers)
        .with_timeout(self.settings.timeout)
    }

    fn sync_targets(&self, reconciliation: &Reconciliation) -> BTreeMap<String, RemoteRepository> {
        let mut targets = reconciliation.known.clone();
        if self.settings.sync_unlisted {
            for repo in &reconciliation.unlisted {
                targets.entry(repo.name.clone()).or_insert_with(|| {
                    RemoteRepository::new(repo.name.clone(), repo.clone_url.clone())
                });
            }
        }
        targets
    }
}
