//! Known/unknown repository reconciliation
//!
//! Partitions a freshly fetched inventory against the configured (known)
//! repositories and the exclusion list.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::RepoEntry;
use crate::discovery::{RemoteRepository, RepositoryInventory};

/// A repository recorded in configuration but absent from the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredRepository {
    pub name: String,
    pub clone_url: String,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Inventory entries that are configured, carrying the configured clone URL
    pub known: BTreeMap<String, RemoteRepository>,

    /// Inventory entries neither configured nor excluded, in inventory order
    pub unknown: Vec<RemoteRepository>,

    /// Inventory names dropped by the exclusion list
    pub excluded: Vec<String>,

    /// Configured repositories the inventory did not contain
    pub unlisted: Vec<ConfiguredRepository>,

    conflicts: Vec<String>,
}

impl Reconciliation {
    /// Names present in both the configured set and the exclusion list
    ///
    /// Such names are treated as known.
    pub fn conflicts(&self) -> &[String] {
        &self.conflicts
    }
}

/// Partition `inventory` into known, unknown and excluded repositories
pub fn reconcile(
    inventory: &RepositoryInventory,
    configured: &BTreeMap<String, RepoEntry>,
    excluded: &BTreeSet<String>,
) -> Reconciliation {
    let mut result = Reconciliation::default();

    for repo in inventory.iter() {
        if let Some(entry) = configured.get(&repo.name) {
            if excluded.contains(&repo.name) {
                result.conflicts.push(repo.name.clone());
            }
            let mut known = repo.clone();
            known.clone_url = entry.clone_url.clone();
            result.known.insert(repo.name.clone(), known);
        } else if excluded.contains(&repo.name) {
            result.excluded.push(repo.name.clone());
        } else {
            result.unknown.push(repo.clone());
        }
    }

    result.unlisted = configured
        .iter()
        .filter(|(name, _)| !inventory.contains(name))
        .map(|(name, entry)| ConfiguredRepository {
            name: name.clone(),
            clone_url: entry.clone_url.clone(),
        })
        .collect();

    result
}

/// Operator decisions about previously unknown repositories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Repositories to start mirroring
    pub track: BTreeMap<String, RepoEntry>,

    /// Repositories never to mirror
    pub exclude: BTreeSet<String>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.track.is_empty() && self.exclude.is_empty()
    }

    pub fn track(&mut self, repo: &RemoteRepository) {
        self.track.insert(
            repo.name.clone(),
            RepoEntry {
                clone_url: repo.clone_url.clone(),
            },
        );
    }

    pub fn exclude(&mut self, repo: &RemoteRepository) {
        self.exclude.insert(repo.name.clone());
    }
}
