use dirs::config_dir;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::reconcile::Classification;
use crate::sync::DEFAULT_MAX_WORKERS;

/// Main configuration structure for ghmirror
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    /// Run-wide settings
    #[serde(default, deserialize_with = "null_as_default")]
    pub general: GeneralConfig,

    /// Repositories to mirror, keyed by name
    #[serde(default, deserialize_with = "null_as_default")]
    pub repos: BTreeMap<String, RepoEntry>,

    /// Repository names never to mirror
    #[serde(default, deserialize_with = "null_as_default")]
    pub exclude: BTreeSet<String>,
}

/// The `general` section
#[derive(Deserialize, Serialize, Clone, PartialEq)]
pub struct GeneralConfig {
    /// Directory holding the mirrors (shell-expanded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repopath: Option<String>,

    /// GitHub personal access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Unknown repository count that triggers a warning (0 disables)
    #[serde(
        default = "default_unknown_repo_warning",
        deserialize_with = "null_as_default_warning"
    )]
    pub unknown_repo_warning: usize,

    /// Only list repositories owned by the authenticated user
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub only_personal: bool,

    /// Maximum concurrent repository syncs
    #[serde(default = "default_workers", deserialize_with = "null_as_default_workers")]
    pub workers: usize,

    /// Per-repository sync limit in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Also sync configured repositories the listing no longer returns
    #[serde(default, deserialize_with = "null_as_default")]
    pub sync_unlisted: bool,
}

/// A configured repository
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RepoEntry {
    pub clone_url: String,
}

fn default_unknown_repo_warning() -> usize {
    5
}
fn default_true() -> bool {
    true
}
fn default_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

// An empty YAML value (`key:` with nothing after it) means "use the default"
fn null_as<'de, D, T>(deserializer: D, default: fn() -> T) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_else(default))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    null_as(deserializer, T::default)
}

fn null_as_default_warning<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    null_as(deserializer, default_unknown_repo_warning)
}

fn null_as_true<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    null_as(deserializer, default_true)
}

fn null_as_default_workers<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    null_as(deserializer, default_workers)
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            repopath: None,
            token: None,
            unknown_repo_warning: default_unknown_repo_warning(),
            only_personal: default_true(),
            workers: default_workers(),
            timeout_secs: None,
            sync_unlisted: false,
        }
    }
}

impl fmt::Debug for GeneralConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneralConfig")
            .field("repopath", &self.repopath)
            .field("token", &self.token.as_ref().map(|_| crate::auth::REDACTED))
            .field("unknown_repo_warning", &self.unknown_repo_warning)
            .field("only_personal", &self.only_personal)
            .field("workers", &self.workers)
            .field("timeout_secs", &self.timeout_secs)
            .field("sync_unlisted", &self.sync_unlisted)
            .finish()
    }
}

const DEFAULT_CONF_BODY: &str = r#"general:
  repopath: {repopath}
  # GitHub personal access token
  # Created at: https://github.com/settings/tokens
  # Must have the 'repo' scope to access private as well as public repos
{token}
  # Number of unknown repos required to prompt a warning in
  # non-interactive mode. (Default: 5, set to 0 to disable)
  unknown_repo_warning: 5
  # Only look for repos owned by the authenticated user (Default: true)
  only_personal: true
  # Number of repositories synchronized at once (Default: 8)
  workers: 8
repos: {}
exclude: []
"#;

/// Validated settings for one mirroring run
#[derive(Clone)]
pub struct MirrorSettings {
    pub token: String,
    pub repo_root: PathBuf,
    pub only_personal: bool,
    pub unknown_repo_warning: usize,
    pub repos: BTreeMap<String, RepoEntry>,
    pub exclude: BTreeSet<String>,
    pub max_workers: usize,
    pub timeout: Option<Duration>,
    pub sync_unlisted: bool,
}

impl fmt::Debug for MirrorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorSettings")
            .field("token", &crate::auth::REDACTED)
            .field("repo_root", &self.repo_root)
            .field("only_personal", &self.only_personal)
            .field("unknown_repo_warning", &self.unknown_repo_warning)
            .field("repos", &self.repos.len())
            .field("exclude", &self.exclude.len())
            .field("max_workers", &self.max_workers)
            .field("timeout", &self.timeout)
            .field("sync_unlisted", &self.sync_unlisted)
            .finish()
    }
}

impl Config {
    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path`, generating a bare-bones config there first if it is missing
    ///
    /// Returns the config and whether it was freshly generated.
    pub fn load_or_generate(path: &Path, token: Option<&str>) -> Result<(Self, bool), ConfigError> {
        if path.exists() {
            return Ok((Self::load(path)?, false));
        }

        tracing::info!("No config file found, generating a bare-bones one at {:?}", path);
        Self::generate_default(path, token, &default_repo_path())?;
        Ok((Self::load(path)?, true))
    }

    /// Write the commented default configuration to `path`
    pub fn generate_default(
        path: &Path,
        token: Option<&str>,
        repopath: &Path,
    ) -> Result<(), ConfigError> {
        let token_line = match token.filter(|t| !t.is_empty()) {
            Some(token) => format!("  token: {}", yaml_scalar(token)?),
            None => "  # token: \"XXXXXXXX\"".to_string(),
        };
        let body = DEFAULT_CONF_BODY
            .replace("{repopath}", &yaml_scalar(&repopath.to_string_lossy())?)
            .replace("{token}", &token_line);

        write_file(path, &body)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        write_file(path, &content)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("ghmirror").join("config.yml"))
    }

    /// Fold interactive decisions into the tracked and excluded sets
    pub fn apply_classification(&mut self, delta: &Classification) {
        for (name, entry) in &delta.track {
            self.exclude.remove(name);
            self.repos.insert(name.clone(), entry.clone());
        }
        self.exclude.extend(delta.exclude.iter().cloned());
    }

    /// Validate the configuration into run settings
    ///
    /// A non-empty `token_override` wins over the configured token, and
    /// `workers_override` over the configured worker count.
    pub fn settings(
        &self,
        token_override: Option<&str>,
        workers_override: Option<usize>,
    ) -> Result<MirrorSettings, ConfigError> {
        let token = token_override
            .filter(|t| !t.is_empty())
            .or_else(|| self.general.token.as_deref().filter(|t| !t.is_empty()))
            .ok_or(ConfigError::MissingToken)?
            .to_string();

        let repopath = self
            .general
            .repopath
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(ConfigError::MissingRepoPath)?;
        let repo_root = expand_path(repopath)?;

        let max_workers = workers_override.unwrap_or(self.general.workers);
        if max_workers == 0 {
            return Err(ConfigError::InvalidWorkers(max_workers));
        }

        Ok(MirrorSettings {
            token,
            repo_root,
            only_personal: self.general.only_personal,
            unknown_repo_warning: self.general.unknown_repo_warning,
            repos: self.repos.clone(),
            exclude: self.exclude.clone(),
            max_workers,
            timeout: self.general.timeout_secs.map(Duration::from_secs),
            sync_unlisted: self.general.sync_unlisted,
        })
    }
}

/// Expand `~` and environment variables in a configured path
pub fn expand_path(path: &str) -> Result<PathBuf, ConfigError> {
    shellexpand::full(path)
        .map(|expanded| PathBuf::from(expanded.into_owned()))
        .map_err(|e| ConfigError::PathExpansion {
            path: path.to_string(),
            message: e.to_string(),
        })
}

/// `repos` under the current directory, used for freshly generated configs
fn default_repo_path() -> PathBuf {
    std::env::current_dir()
        .map(|dir| dir.join("repos"))
        .unwrap_or_else(|_| PathBuf::from("repos"))
}

fn yaml_scalar(value: &str) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(value)?.trim_end().to_string())
}

fn write_file(path: &Path, content: &str) -> Result<(), ConfigError> {
    let write_error = |source: std::io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }
    std::fs::write(path, content).map_err(write_error)
}
