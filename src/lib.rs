//! ghmirror - Mirror GitHub repositories to local storage
//!
//! ghmirror keeps a local mirror of every repository a GitHub account owns,
//! and flags repositories on GitHub that are not tracked locally yet.
//!
//! ## Core Features
//!
//! - **Inventory**: Paginated repository discovery via the GitHub API
//! - **Reconciliation**: Configured, excluded and unknown repository sets
//! - **Mirroring**: Clone-or-fetch per repository with change detection
//! - **Concurrency**: Bounded worker pool with aggregated outcomes
//! - **Configuration**: YAML-based configuration with XDG compliance
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`discovery`]: Repository source capability and inventory fetch
//! - [`github`]: GitHub API integration
//! - [`reconcile`]: Known/unknown partitioning
//! - [`auth`]: Credential embedding and redaction for clone URLs
//! - [`git`]: Git capability and the `git` executable backend
//! - [`sync`]: Per-repository synchronizer and the concurrent engine
//! - [`mirror`]: The run pipeline tying everything together

pub mod auth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod git;
pub mod github;
pub mod mirror;
pub mod reconcile;
pub mod report;
pub mod sync;

pub use config::{Config, MirrorSettings};
pub use discovery::{RemoteRepository, RepositoryInventory, RepositorySource};
pub use error::{ConfigError, FetchError, GitError, MirrorError};
pub use git::{GitCli, Vcs};
pub use github::GitHubClient;
pub use mirror::{Discovery, Mirror, RunReport};
pub use reconcile::{Classification, Reconciliation};
pub use report::{Reporter, SyncEvent, TracingReporter};
pub use sync::{AggregateResult, SyncEngine, SyncOutcome, Synchronizer};
