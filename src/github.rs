use async_trait::async_trait;
use octocrab::models::Repository;
use octocrab::Octocrab;
use tracing::{debug, info};

use crate::discovery::{Affiliation, AuthenticatedUser, RemoteRepository, RepositorySource};
use crate::error::FetchError;

/// GitHub client wrapper backed by octocrab
pub struct GitHubClient {
    client: Octocrab,
}

impl GitHubClient {
    /// Create a new GitHub client authenticated with a personal access token
    pub fn new(token: &str) -> Result<Self, FetchError> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to create GitHub client: {}", e)))?;

        Ok(Self { client })
    }

    /// Create a client that talks to a different API root (GitHub Enterprise, test servers)
    pub fn with_base_uri(token: &str, base_uri: &str) -> Result<Self, FetchError> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .base_uri(base_uri)
            .map_err(|e| FetchError::Transport(format!("Invalid GitHub API root {}: {}", base_uri, e)))?
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to create GitHub client: {}", e)))?;

        Ok(Self { client })
    }

    /// Turn an octocrab failure into a fetch error for the given page
    fn classify(error: octocrab::Error, page: u32) -> FetchError {
        match error {
            octocrab::Error::GitHub { source, .. } => FetchError::Status {
                status: source.status_code.as_u16(),
                page,
                message: source.message.clone(),
            },
            other => FetchError::Transport(other.to_string()),
        }
    }
}

impl From<&Repository> for RemoteRepository {
    fn from(repo: &Repository) -> Self {
        // clone_url is always present on the authenticated user listing;
        // fall back to the canonical https form just in case
        let clone_url = repo
            .clone_url
            .as_ref()
            .map(|url| url.to_string())
            .or_else(|| {
                repo.full_name
                    .as_ref()
                    .map(|full_name| format!("https://github.com/{}.git", full_name))
            })
            .unwrap_or_else(|| repo.url.to_string());

        RemoteRepository {
            name: repo.name.clone(),
            clone_url,
            is_fork: repo.fork.unwrap_or(false),
            description: repo.description.clone(),
            owner_id: repo.owner.as_ref().map(|owner| owner.id.0),
            html_url: repo.html_url.as_ref().map(|url| url.to_string()),
        }
    }
}

#[async_trait]
impl RepositorySource for GitHubClient {
    async fn list_page(
        &self,
        page: u32,
        per_page: u8,
        affiliation: Option<Affiliation>,
    ) -> Result<Vec<RemoteRepository>, FetchError> {
        debug!("Fetching repositories page {} ({} per page)", page, per_page);

        let page_number =
            u8::try_from(page).map_err(|_| FetchError::TooManyPages(page.saturating_sub(1)))?;

        let mut request = self
            .client
            .current()
            .list_repos_for_authenticated_user()
            .per_page(per_page)
            .page(page_number);

        if let Some(affiliation) = affiliation {
            request = request.affiliation(affiliation.as_str());
        }

        let page_repos = request
            .send()
            .await
            .map_err(|e| Self::classify(e, page))?;

        Ok(page_repos.items.iter().map(RemoteRepository::from).collect())
    }

    async fn authenticated_user(&self) -> Result<AuthenticatedUser, FetchError> {
        debug!("Testing auth token and loading user");

        let user = self.client.current().user().await.map_err(|e| match e {
            octocrab::Error::GitHub { source, .. } => {
                FetchError::from_user_status(source.status_code.as_u16(), source.message.clone())
            }
            other => FetchError::Transport(other.to_string()),
        })?;

        info!("Authenticated as GitHub user: {}", user.login);

        Ok(AuthenticatedUser {
            login: user.login,
            id: user.id.0,
        })
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}
