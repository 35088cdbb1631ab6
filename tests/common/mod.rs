//! Common test utilities and helpers for ghmirror tests
#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Scratch directory with a config file location inside it
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_dir = temp_dir.path().join("ghmirror");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        Self {
            temp_dir,
            config_dir,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.yml")
    }

    pub fn repo_root(&self) -> PathBuf {
        self.temp_dir.path().join("mirrors")
    }

    pub fn create_test_config(&self, content: &str) -> PathBuf {
        let config_path = self.config_path();
        std::fs::write(&config_path, content).expect("Failed to write test config");
        config_path
    }

    /// Config with a repo path and the given tracked repositories, no token
    pub fn create_minimal_config(&self, repos: &[&str]) -> PathBuf {
        let mut content = format!("general:\n  repopath: {:?}\n", self.repo_root());
        content.push_str(if repos.is_empty() { "repos: {}\n" } else { "repos:\n" });
        for name in repos {
            content.push_str(&format!(
                "  {}:\n    clone_url: \"https://github.com/octocat/{}.git\"\n",
                name, name
            ));
        }
        self.create_test_config(&content)
    }
}

/// Minimal repository object as returned by `GET /user/repos`
pub fn repo_json(owner: &str, name: &str) -> Value {
    json!({
        "id": name.bytes().map(u64::from).sum::<u64>(),
        "name": name,
        "full_name": format!("{}/{}", owner, name),
        "url": format!("https://api.github.com/repos/{}/{}", owner, name),
        "html_url": format!("https://github.com/{}/{}", owner, name),
        "clone_url": format!("https://github.com/{}/{}.git", owner, name),
        "description": format!("The {} project", name),
        "fork": false,
        "private": false
    })
}

/// A page of `count` repositories named `<prefix>-<n>`
pub fn repo_page(owner: &str, prefix: &str, count: usize) -> Value {
    Value::Array(
        (0..count)
            .map(|n| repo_json(owner, &format!("{}-{}", prefix, n)))
            .collect(),
    )
}

/// User object as returned by `GET /user`
pub fn user_json(login: &str) -> Value {
    let api = format!("https://api.github.com/users/{}", login);
    json!({
        "login": login,
        "id": 583231,
        "node_id": "MDQ6VXNlcjU4MzIzMQ==",
        "avatar_url": "https://avatars.githubusercontent.com/u/583231?v=4",
        "gravatar_id": "",
        "url": api,
        "html_url": format!("https://github.com/{}", login),
        "followers_url": format!("{}/followers", api),
        "following_url": format!("{}/following{{/other_user}}", api),
        "gists_url": format!("{}/gists{{/gist_id}}", api),
        "starred_url": format!("{}/starred{{/owner}}{{/repo}}", api),
        "subscriptions_url": format!("{}/subscriptions", api),
        "organizations_url": format!("{}/orgs", api),
        "repos_url": format!("{}/repos", api),
        "events_url": format!("{}/events{{/privacy}}", api),
        "received_events_url": format!("{}/received_events", api),
        "type": "User",
        "site_admin": false
    })
}

/// GitHub-style error body
pub fn error_json(message: &str) -> Value {
    json!({
        "message": message,
        "documentation_url": "https://docs.github.com/rest"
    })
}

/// Whether a usable `git` is on PATH
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Run git in `dir` with a throwaway identity, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(["-c", "init.defaultBranch=main", "-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Bare upstream repository with one commit, plus a work tree pushing to it
pub struct Upstream {
    pub temp_dir: TempDir,
    pub bare: PathBuf,
    pub work: PathBuf,
}

impl Upstream {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let bare = temp_dir.path().join("upstream.git");
        let work = temp_dir.path().join("work");
        std::fs::create_dir_all(&bare).expect("Failed to create bare dir");
        std::fs::create_dir_all(&work).expect("Failed to create work dir");

        git(&bare, &["init", "--bare"]);
        git(&work, &["init"]);
        git(&work, &["remote", "add", "origin", &bare.to_string_lossy()]);

        let upstream = Self {
            temp_dir,
            bare,
            work,
        };
        upstream.commit("README.md", "first");
        upstream
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.bare.display())
    }

    /// Commit `content` to `file` on main and push it
    pub fn commit(&self, file: &str, content: &str) {
        std::fs::write(self.work.join(file), content).expect("Failed to write file");
        git(&self.work, &["add", file]);
        git(&self.work, &["commit", "-m", content]);
        git(&self.work, &["push", "origin", "HEAD:refs/heads/main"]);
    }

    pub fn tag(&self, name: &str) {
        git(&self.work, &["tag", name]);
        git(&self.work, &["push", "origin", name]);
    }
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}

pub fn assert_contains_any(text: &str, expected: &[&str]) {
    let found = expected.iter().any(|item| text.contains(item));
    assert!(
        found,
        "Expected text to contain at least one of {:?}, but it didn't. Text: {}",
        expected,
        text
    );
}
