//! Common test utilities: in-memory providers and a git runner that only touches the filesystem
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reposync::client::ApiError;
use reposync::git::GitRunner;
use reposync::provider::{GroupInfo, GroupSource, OrgSource, Repository, Subgroup};
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One group in a fake GitLab tree
#[derive(Debug, Clone)]
pub struct FakeGroup {
    pub name: String,
    pub path: String,
    pub full_path: String,
    pub subgroups: Vec<u64>,
    pub projects: Vec<Repository>,
}

/// In-memory GitLab group hierarchy
#[derive(Debug, Default)]
pub struct FakeGitLab {
    groups: HashMap<u64, FakeGroup>,
    broken: HashSet<u64>,
    broken_listings: HashSet<u64>,
    unauthorized: HashSet<u64>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeGitLab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group; `full_path` is slash-separated and its last segment becomes the path
    pub fn group(mut self, id: u64, full_path: &str, projects: &[&str]) -> Self {
        let path = full_path.rsplit('/').next().unwrap_or(full_path).to_string();
        self.groups.insert(
            id,
            FakeGroup {
                name: path.to_uppercase(),
                path,
                full_path: full_path.to_string(),
                subgroups: Vec::new(),
                projects: projects
                    .iter()
                    .map(|name| repository(full_path, name))
                    .collect(),
            },
        );
        self
    }

    pub fn child(mut self, parent: u64, child: u64) -> Self {
        if let Some(group) = self.groups.get_mut(&parent) {
            group.subgroups.push(child);
        }
        self
    }

    /// Every call for this group answers with a 500
    pub fn broken(mut self, id: u64) -> Self {
        self.broken.insert(id);
        self
    }

    /// Only the subgroup listing of this group answers with a 500
    pub fn broken_listing(mut self, id: u64) -> Self {
        self.broken_listings.insert(id);
        self
    }

    /// Every call for this group answers with a 401
    pub fn unauthorized(mut self, id: u64) -> Self {
        self.unauthorized.insert(id);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn lookup(&self, call: &str, id: u64) -> Result<&FakeGroup, ApiError> {
        self.calls.lock().unwrap().push(format!("{} {}", call, id));
        let url = format!("fake://groups/{}", id);

        if self.unauthorized.contains(&id) {
            return Err(ApiError::Unauthorized { url });
        }
        if self.broken.contains(&id) {
            return Err(ApiError::Status {
                url,
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        self.groups.get(&id).ok_or(ApiError::Status {
            url,
            status: StatusCode::NOT_FOUND,
        })
    }
}

#[async_trait]
impl GroupSource for FakeGitLab {
    async fn group_info(&self, group_id: u64) -> Result<GroupInfo, ApiError> {
        let group = self.lookup("info", group_id)?;
        Ok(GroupInfo {
            name: group.name.clone(),
            path: group.path.clone(),
        })
    }

    async fn list_subgroups(&self, group_id: u64) -> Result<Vec<Subgroup>, ApiError> {
        let group = self.lookup("subgroups", group_id)?;
        if self.broken_listings.contains(&group_id) {
            return Err(ApiError::Status {
                url: format!("fake://groups/{}/subgroups", group_id),
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        Ok(group
            .subgroups
            .iter()
            .filter_map(|id| {
                self.groups.get(id).map(|child| Subgroup {
                    id: *id,
                    full_path: child.full_path.clone(),
                })
            })
            .collect())
    }

    async fn list_projects(&self, group_id: u64) -> Result<Vec<Repository>, ApiError> {
        Ok(self.lookup("projects", group_id)?.projects.clone())
    }
}

/// In-memory GitHub organization
#[derive(Debug, Default)]
pub struct FakeGitHub {
    pub org: String,
    pub repositories: Vec<Repository>,
}

impl FakeGitHub {
    pub fn new(org: &str, names: &[&str]) -> Self {
        Self {
            org: org.to_string(),
            repositories: names
                .iter()
                .map(|name| Repository {
                    name: name.to_string(),
                    https_url: format!("https://github.com/{}/{}.git", org, name),
                    ssh_url: format!("git@github.com:{}/{}.git", org, name),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl OrgSource for FakeGitHub {
    async fn list_org_repositories(&self, org: &str) -> Result<Vec<Repository>, ApiError> {
        if org != self.org {
            return Err(ApiError::Status {
                url: format!("fake://orgs/{}/repos", org),
                status: StatusCode::NOT_FOUND,
            });
        }
        Ok(self.repositories.clone())
    }
}

pub fn repository(group_path: &str, name: &str) -> Repository {
    Repository {
        name: name.to_string(),
        https_url: format!("https://gitlab.com/{}/{}.git", group_path, name),
        ssh_url: format!("git@gitlab.com:{}/{}.git", group_path, name),
    }
}

/// Stands in for `git clone`: records the call and creates the target directory
#[derive(Debug, Default)]
pub struct DirCreatingRunner {
    failing: HashSet<String>,
    calls: std::sync::Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl DirCreatingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clones of repositories whose URL ends with `/<name>.git` always fail
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(format!("/{}.git", name));
        self
    }

    /// Shared view of the calls, usable after the runner is boxed
    pub fn call_log(&self) -> std::sync::Arc<Mutex<Vec<(String, PathBuf)>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl GitRunner for DirCreatingRunner {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), dest.to_path_buf()));

        if self.failing.iter().any(|suffix| url.ends_with(suffix)) {
            return Err(anyhow!("git clone exited with exit status: 128"));
        }

        std::fs::create_dir_all(dest)?;
        Ok(())
    }
}
