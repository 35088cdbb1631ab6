//! Remote inventory discovery
//!
//! This module defines the provider-agnostic view of a remote repository, the
//! [`RepositorySource`] capability a hosting provider must offer, and the
//! paginated fetch that turns it into a complete [`RepositoryInventory`].

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::FetchError;

/// Page size requested from the provider unless told otherwise
pub const DEFAULT_PAGE_SIZE: u8 = 30;

/// Upper bound on pages requested in a single fetch
///
/// The GitHub listing endpoint addresses pages with a `u8`.
pub const MAX_PAGES: u32 = u8::MAX as u32;

/// Snapshot of a repository as reported by the remote API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    /// Repository name, unique within an inventory
    pub name: String,

    /// Plain (credential-free) clone URL
    pub clone_url: String,

    /// Whether the repository is a fork
    pub is_fork: bool,

    pub description: Option<String>,

    /// Numeric id of the owning account, when reported
    pub owner_id: Option<u64>,

    /// Browser URL, shown when classifying unknown repositories
    pub html_url: Option<String>,
}

impl RemoteRepository {
    pub fn new(name: impl Into<String>, clone_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clone_url: clone_url.into(),
            is_fork: false,
            description: None,
            owner_id: None,
            html_url: None,
        }
    }

    /// URL to show a human: the browser URL if known, else the clone URL
    pub fn display_url(&self) -> &str {
        self.html_url.as_deref().unwrap_or(&self.clone_url)
    }
}

/// Ownership filter passed through to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affiliation {
    /// Only repositories owned by the authenticated identity
    Owner,
}

impl Affiliation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Affiliation::Owner => "owner",
        }
    }
}

/// The account the token belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub login: String,
    pub id: u64,
}

/// Remote repository provider capability
///
/// Implement this trait to back the fetcher with a hosting provider. Errors
/// must already be classified: a non-success response is a
/// [`FetchError::Status`], anything below HTTP is a [`FetchError::Transport`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Fetch one page of the repositories visible to the authenticated user
    async fn list_page(
        &self,
        page: u32,
        per_page: u8,
        affiliation: Option<Affiliation>,
    ) -> Result<Vec<RemoteRepository>, FetchError>;

    /// Resolve the identity behind the token
    async fn authenticated_user(&self) -> Result<AuthenticatedUser, FetchError>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

/// Name-keyed repository collection that remembers page order
#[derive(Debug, Clone, Default)]
pub struct RepositoryInventory {
    repos: Vec<RemoteRepository>,
    index: HashMap<String, usize>,
}

impl RepositoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a repository; a duplicate name replaces the earlier entry in
    /// place and returns it
    pub fn insert(&mut self, repo: RemoteRepository) -> Option<RemoteRepository> {
        match self.index.get(&repo.name) {
            Some(&position) => Some(std::mem::replace(&mut self.repos[position], repo)),
            None => {
                self.index.insert(repo.name.clone(), self.repos.len());
                self.repos.push(repo);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&RemoteRepository> {
        self.index.get(name).map(|&position| &self.repos[position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// Repositories in the order they were first seen
    pub fn iter(&self) -> impl Iterator<Item = &RemoteRepository> {
        self.repos.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.repos.iter().map(|repo| repo.name.as_str())
    }
}

impl FromIterator<RemoteRepository> for RepositoryInventory {
    fn from_iter<I: IntoIterator<Item = RemoteRepository>>(iter: I) -> Self {
        let mut inventory = Self::new();
        for repo in iter {
            inventory.insert(repo);
        }
        inventory
    }
}

/// Fetch the complete inventory using the default page size
pub async fn fetch_inventory(
    source: &dyn RepositorySource,
    only_owned_by_caller: bool,
) -> Result<RepositoryInventory, FetchError> {
    fetch_inventory_paged(source, only_owned_by_caller, DEFAULT_PAGE_SIZE).await
}

/// Fetch the complete inventory, `per_page` repositories at a time
///
/// Stops at the first empty page or the first short page. Any error aborts
/// the whole fetch; repositories from earlier pages are discarded with it.
pub async fn fetch_inventory_paged(
    source: &dyn RepositorySource,
    only_owned_by_caller: bool,
    per_page: u8,
) -> Result<RepositoryInventory, FetchError> {
    let per_page = per_page.max(1);
    let affiliation = only_owned_by_caller.then_some(Affiliation::Owner);
    let mut inventory = RepositoryInventory::new();

    for page in 1..=MAX_PAGES {
        let items = source.list_page(page, per_page, affiliation).await?;
        let count = items.len();
        debug!(
            "Fetched page {} from {}: {} repositories",
            page,
            source.provider_name(),
            count
        );

        for repo in items {
            if let Some(previous) = inventory.insert(repo) {
                debug!("Repository {} reported twice, keeping the later entry", previous.name);
            }
        }

        // Empty page means we are done; a short page must be the last
        if count < usize::from(per_page) {
            info!(
                "Found {} repositories on {} in {} pages",
                inventory.len(),
                source.provider_name(),
                page
            );
            return Ok(inventory);
        }
    }

    Err(FetchError::TooManyPages(MAX_PAGES))
}
