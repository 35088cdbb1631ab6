//! Error types for ghmirror
//!
//! Fatal errors (`ConfigError`, `FetchError`) abort a run before any
//! repository is touched. `GitError` and `AuthUrlError` only ever affect the
//! repository being synchronized and end up as a failed `SyncOutcome`.
//! `MirrorError` wraps the fatal ones for the run pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration is missing a required value or cannot be read
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Must either specify an auth token on the command line, in GITHUB_TOKEN, or in the config")]
    MissingToken,

    #[error("Config must specify a repopath in the general section")]
    MissingRepoPath,

    #[error("Worker count must be at least 1 (got {0})")]
    InvalidWorkers(usize),

    #[error("Failed to expand repopath {path:?}: {message}")]
    PathExpansion { path: String, message: String },

    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write config file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Remote inventory retrieval failed; the run cannot continue safely
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to authenticate to GitHub, please check the value of the token")]
    Unauthorized,

    #[error("Too many attempts with an invalid token or rate limited, please wait and try again later")]
    Forbidden,

    #[error("GitHub returned status {status} for page {page}: {message}")]
    Status {
        status: u16,
        page: u32,
        message: String,
    },

    #[error("GitHub request failed: {0}")]
    Transport(String),

    #[error("Stopped after {0} pages without reaching the end of the repository list")]
    TooManyPages(u32),
}

impl FetchError {
    /// Classify a non-success status returned while resolving the
    /// authenticated user
    pub fn from_user_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 => FetchError::Unauthorized,
            403 => FetchError::Forbidden,
            _ => FetchError::Status {
                status,
                page: 0,
                message: message.into(),
            },
        }
    }
}

/// A clone URL could not carry embedded credentials
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthUrlError {
    #[error("Invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("URL {0:?} cannot carry credentials")]
    CannotHaveCredentials(String),
}

/// Failure of a single git operation
///
/// Display output is always safe to log: commands and captured output are
/// masked before they are stored here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    #[error("Failed to find git binary, please install git")]
    ToolingMissing,

    #[error("Cannot operate on repo path: {0}")]
    NoSuchPath(PathBuf),

    #[error(
        "Problem with the repo contained in {0}. If the repository still exists on GitHub, \
         try deleting the local copy and retrieving a fresh clone"
    )]
    InvalidRepository(PathBuf),

    #[error("Git operation failed:\nArgs: {command}\nOutput:\n{output}")]
    CommandFailed { command: String, output: String },

    #[error("Unexpected git failure: {0}")]
    Other(String),
}

/// A mirroring run stopped before synchronizing anything
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to create repo path {path:?}: {source}")]
    RepoRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
