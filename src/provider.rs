//! Provider-neutral repository model
//!
//! The GitLab and GitHub adapters both produce [`Repository`] listings, and the
//! orchestrator talks to them only through [`GroupSource`] and [`OrgSource`],
//! so traversal can be exercised against in-memory fakes.

use async_trait::async_trait;
use std::fmt;

use crate::client::ApiError;

/// Supported hosting providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Provider {
    Gitlab,
    Github,
}

impl Provider {
    /// Environment variable consulted when no token is configured
    pub fn token_env_var(&self) -> &'static str {
        match self {
            Provider::Gitlab => "GITLAB_TOKEN",
            Provider::Github => "GITHUB_TOKEN",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gitlab => f.write_str("gitlab"),
            Provider::Github => f.write_str("github"),
        }
    }
}

/// Clone protocol preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CloneMethod {
    /// Use HTTPS (https://host/group/repo.git)
    #[default]
    Https,
    /// Use SSH (git@host:group/repo.git)
    Ssh,
}

impl CloneMethod {
    /// Interpret a free-form setting; anything but `ssh` means HTTPS
    pub fn from_setting(value: &str) -> Self {
        if value == "ssh" {
            CloneMethod::Ssh
        } else {
            CloneMethod::Https
        }
    }

    /// Pick the URL matching this method
    pub fn select<'a>(&self, https_url: &'a str, ssh_url: &'a str) -> &'a str {
        match self {
            CloneMethod::Ssh => ssh_url,
            CloneMethod::Https => https_url,
        }
    }
}

/// Select the clone URL for a method setting (`ssh` or anything else for HTTPS)
pub fn select_url<'a>(https_url: &'a str, ssh_url: &'a str, method: &str) -> &'a str {
    CloneMethod::from_setting(method).select(https_url, ssh_url)
}

/// A remote repository (GitLab project or GitHub repository)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Leaf directory name
    pub name: String,
    pub https_url: String,
    pub ssh_url: String,
}

impl Repository {
    pub fn clone_url(&self, method: CloneMethod) -> &str {
        method.select(&self.https_url, &self.ssh_url)
    }
}

/// Child group reference, only used to recurse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subgroup {
    pub id: u64,
    pub full_path: String,
}

/// Identity of a GitLab group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub name: String,
    /// Single path segment used as the group's directory name
    pub path: String,
}

/// Hierarchical source of repositories (GitLab groups)
#[async_trait]
pub trait GroupSource: Send + Sync {
    async fn group_info(&self, group_id: u64) -> Result<GroupInfo, ApiError>;

    /// Direct child groups, all pages
    async fn list_subgroups(&self, group_id: u64) -> Result<Vec<Subgroup>, ApiError>;

    /// Projects at this level only, all pages
    async fn list_projects(&self, group_id: u64) -> Result<Vec<Repository>, ApiError>;
}

/// Flat source of repositories (GitHub organizations)
#[async_trait]
pub trait OrgSource: Send + Sync {
    async fn list_org_repositories(&self, org: &str) -> Result<Vec<Repository>, ApiError>;
}
