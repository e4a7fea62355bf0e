use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::client::{ApiClient, ApiError};
use crate::config::Token;
use crate::provider::{OrgSource, Repository};

const PER_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    name: String,
    clone_url: String,
    ssh_url: String,
}

impl From<RepositoryResponse> for Repository {
    fn from(repo: RepositoryResponse) -> Self {
        Repository {
            name: repo.name,
            https_url: repo.clone_url,
            ssh_url: repo.ssh_url,
        }
    }
}

/// GitHub API client for organization repository listings
pub struct GitHubClient {
    api: ApiClient,
    base_url: String,
    token: Token,
    page_delay: Duration,
}

impl GitHubClient {
    /// `base_url` is the REST root, e.g. `https://api.github.com`
    pub fn new(api: ApiClient, base_url: impl Into<String>, token: Token) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Using GitHub API at {}", base_url);

        Self {
            api,
            base_url,
            token,
            page_delay: Duration::ZERO,
        }
    }

    /// Pause between consecutive pages
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    fn org_repos_url(&self, org: &str, page: u32) -> String {
        format!(
            "{}/orgs/{}/repos?per_page={}&page={}",
            self.base_url, org, PER_PAGE, page
        )
    }
}

#[async_trait]
impl OrgSource for GitHubClient {
    /// List repositories for an organization, following pages until an empty one
    async fn list_org_repositories(&self, org: &str) -> Result<Vec<Repository>, ApiError> {
        debug!("Fetching repositories for organization: {}", org);

        let repositories: Vec<RepositoryResponse> = self
            .api
            .get_all_pages(
                |page| self.org_repos_url(org, page),
                &self.token,
                self.page_delay,
            )
            .await?;

        info!(
            "Found {} repositories for organization: {}",
            repositories.len(),
            org
        );
        Ok(repositories.into_iter().map(Repository::from).collect())
    }
}
