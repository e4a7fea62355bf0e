//! GitLab REST adapter (groups, subgroups and projects)

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::client::{ApiClient, ApiError};
use crate::config::Token;
use crate::provider::{GroupInfo, GroupSource, Repository, Subgroup};

const PER_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
struct GroupResponse {
    name: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct SubgroupResponse {
    id: u64,
    full_path: String,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    name: String,
    #[serde(default)]
    path: Option<String>,
    http_url_to_repo: String,
    ssh_url_to_repo: String,
}

impl From<ProjectResponse> for Repository {
    fn from(project: ProjectResponse) -> Self {
        // The path slug is what GitLab itself uses as the directory name on clone
        let name = project
            .path
            .filter(|path| !path.is_empty())
            .unwrap_or(project.name);

        Repository {
            name,
            https_url: project.http_url_to_repo,
            ssh_url: project.ssh_url_to_repo,
        }
    }
}

/// GitLab API client for one instance and token
pub struct GitLabClient {
    api: ApiClient,
    base_url: String,
    token: Token,
    page_delay: Duration,
}

impl GitLabClient {
    /// `base_url` is the REST root, e.g. `https://gitlab.com/api/v4`
    pub fn new(api: ApiClient, base_url: impl Into<String>, token: Token) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Using GitLab API at {}", base_url);

        Self {
            api,
            base_url,
            token,
            page_delay: Duration::ZERO,
        }
    }

    /// Pause between consecutive pages of a listing
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn paged_endpoint(&self, path: &str, page: u32) -> String {
        format!(
            "{}{}?per_page={}&page={}",
            self.base_url, path, PER_PAGE, page
        )
    }
}

#[async_trait]
impl GroupSource for GitLabClient {
    async fn group_info(&self, group_id: u64) -> Result<GroupInfo, ApiError> {
        let url = self.endpoint(&format!("/groups/{}", group_id));
        let group: GroupResponse = self.api.get_json(&url, &self.token).await?;

        debug!("Group {} is {} ({})", group_id, group.name, group.path);
        Ok(GroupInfo {
            name: group.name,
            path: group.path,
        })
    }

    async fn list_subgroups(&self, group_id: u64) -> Result<Vec<Subgroup>, ApiError> {
        let path = format!("/groups/{}/subgroups", group_id);
        let subgroups: Vec<SubgroupResponse> = self
            .api
            .get_all_pages(
                |page| self.paged_endpoint(&path, page),
                &self.token,
                self.page_delay,
            )
            .await?;

        debug!("Group {} has {} subgroups", group_id, subgroups.len());
        Ok(subgroups
            .into_iter()
            .map(|subgroup| Subgroup {
                id: subgroup.id,
                full_path: subgroup.full_path,
            })
            .collect())
    }

    async fn list_projects(&self, group_id: u64) -> Result<Vec<Repository>, ApiError> {
        let path = format!("/groups/{}/projects", group_id);
        let projects: Vec<ProjectResponse> = self
            .api
            .get_all_pages(
                |page| self.paged_endpoint(&path, page),
                &self.token,
                self.page_delay,
            )
            .await?;

        debug!("Group {} has {} projects", group_id, projects.len());
        Ok(projects.into_iter().map(Repository::from).collect())
    }
}
