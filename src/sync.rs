//! Sync Engine - Orchestrates mirroring of a GitLab group tree or a GitHub organization
//!
//! GitLab groups are walked depth-first with an explicit work-list: entering a
//! group creates its directory and queues its subgroups ahead of its own
//! projects, so every subgroup subtree is finished before the repositories at
//! that level are cloned. GitHub organizations are a single flat listing.
//!
//! Only two conditions abort a run: the root group or organization cannot be
//! resolved (or its directory created), or the provider rejects the token. Everything else is reported and
//! the walk continues with the next item.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::client::{ApiClient, ApiError};
use crate::config::{Config, Token};
use crate::git::{CloneExecutor, CloneOutcome, GitRunner};
use crate::github::GitHubClient;
use crate::gitlab::GitLabClient;
use crate::output::{Reporter, SyncEvent};
use crate::provider::{CloneMethod, GroupSource, OrgSource, Provider, Repository};
use crate::retry::Backoff;
use crate::validate::{parse_group_id, validate_organization_name, validate_token};

/// A group whose listing could not be completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFailure {
    pub path: String,
    pub error: String,
}

/// Results from a complete sync operation
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub cloned: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failed_groups: Vec<GroupFailure>,
    pub duration: Duration,
    pub results: Vec<CloneOutcome>,
}

impl SyncSummary {
    fn compile(
        results: Vec<CloneOutcome>,
        failed_groups: Vec<GroupFailure>,
        duration: Duration,
    ) -> Self {
        let mut cloned = 0;
        let mut skipped = 0;
        let mut failed = 0;

        for result in &results {
            match result {
                CloneOutcome::Cloned { .. } => cloned += 1,
                CloneOutcome::Skipped { .. } => skipped += 1,
                CloneOutcome::Failed { .. } => failed += 1,
            }
        }

        Self {
            total_repositories: results.len(),
            cloned,
            skipped,
            failed,
            failed_groups,
            duration,
            results,
        }
    }

    /// True when any repository or group could not be mirrored
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || !self.failed_groups.is_empty()
    }
}

/// Pending unit of GitLab traversal
#[derive(Debug)]
enum Task {
    /// Resolve a group, create its directory and queue its children.
    /// `full_path` is `None` for the root group.
    Enter {
        id: u64,
        parent_dir: PathBuf,
        full_path: Option<String>,
    },
    /// Clone the projects that sit directly in a group
    CloneProjects { id: u64, dir: PathBuf, label: String },
}

/// Drives traversal and hands each repository to the clone executor
pub struct SyncEngine {
    executor: CloneExecutor,
    reporter: Arc<dyn Reporter>,
    clone_method: CloneMethod,
    request_delay: Duration,
}

impl SyncEngine {
    pub fn new(executor: CloneExecutor, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            executor,
            reporter,
            clone_method: CloneMethod::default(),
            request_delay: Duration::ZERO,
        }
    }

    pub fn with_clone_method(mut self, clone_method: CloneMethod) -> Self {
        self.clone_method = clone_method;
        self
    }

    /// Pause applied once per GitLab group level
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Mirror a GitLab group and all of its subgroups under `base_dir`
    pub async fn sync_gitlab_group(
        &self,
        source: &dyn GroupSource,
        group_id: u64,
        base_dir: &Path,
        token: &Token,
    ) -> Result<SyncSummary> {
        let start_time = Instant::now();
        info!(
            "Starting GitLab sync of group {} into {}",
            group_id,
            base_dir.display()
        );
        self.reporter.report(SyncEvent::Started {
            provider: Provider::Gitlab,
        });

        let mut results = Vec::new();
        let mut failed_groups = Vec::new();
        let mut pending = vec![Task::Enter {
            id: group_id,
            parent_dir: base_dir.to_path_buf(),
            full_path: None,
        }];

        while let Some(task) = pending.pop() {
            match task {
                Task::Enter {
                    id,
                    parent_dir,
                    full_path,
                } => {
                    if let Some(full_path) = &full_path {
                        self.reporter.report(SyncEvent::SubgroupStarted {
                            full_path: full_path.clone(),
                        });
                    }

                    let (dir, path) = match self.enter_group(source, id, &parent_dir).await {
                        Ok(entered) => entered,
                        Err(err) if full_path.is_none() || is_fatal(&err) => return Err(err),
                        Err(err) => {
                            let path = full_path.unwrap_or_else(|| id.to_string());
                            self.group_failed(&mut failed_groups, path, &err);
                            self.pace().await;
                            continue;
                        }
                    };
                    let label = full_path.unwrap_or(path);

                    // Projects at this level are still cloned when the subgroup listing fails
                    let subgroups = match source.list_subgroups(id).await {
                        Ok(subgroups) => subgroups,
                        Err(err) => {
                            let fatal = err.is_fatal();
                            let err = anyhow::Error::new(err).context("Failed to fetch subgroups");
                            if fatal {
                                return Err(err);
                            }
                            self.group_failed(&mut failed_groups, label.clone(), &err);
                            Vec::new()
                        }
                    };
                    debug!("Group {} ({}) has {} subgroups", id, label, subgroups.len());

                    pending.push(Task::CloneProjects {
                        id,
                        dir: dir.clone(),
                        label,
                    });
                    for subgroup in subgroups.into_iter().rev() {
                        pending.push(Task::Enter {
                            id: subgroup.id,
                            parent_dir: dir.clone(),
                            full_path: Some(subgroup.full_path),
                        });
                    }
                }
                Task::CloneProjects { id, dir, label } => {
                    match source.list_projects(id).await {
                        Ok(repositories) => {
                            results.extend(self.clone_all(&repositories, &dir, token).await);
                        }
                        Err(err) if err.is_fatal() => {
                            return Err(
                                anyhow::Error::new(err).context("Failed to fetch repositories")
                            );
                        }
                        Err(err) => {
                            let err =
                                anyhow::Error::new(err).context("Failed to fetch repositories");
                            self.group_failed(&mut failed_groups, label, &err);
                        }
                    }

                    self.pace().await;
                }
            }
        }

        Ok(self.finish(results, failed_groups, start_time))
    }

    /// Resolve a group and create its directory
    async fn enter_group(
        &self,
        source: &dyn GroupSource,
        id: u64,
        parent_dir: &Path,
    ) -> Result<(PathBuf, String)> {
        let info = source
            .group_info(id)
            .await
            .context("Failed to fetch group info")?;

        let dir = parent_dir.join(&info.path);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        self.reporter.report(SyncEvent::GroupEntered {
            name: info.name,
            path: info.path.clone(),
        });

        Ok((dir, info.path))
    }

    /// Pause once per finished group level
    async fn pace(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }

    /// Mirror a GitHub organization into `base_dir/org`
    pub async fn sync_github_org(
        &self,
        source: &dyn OrgSource,
        org: &str,
        base_dir: &Path,
        token: &Token,
    ) -> Result<SyncSummary> {
        validate_organization_name(org).context("Invalid organization name")?;

        let start_time = Instant::now();
        info!(
            "Starting GitHub sync of organization {} into {}",
            org,
            base_dir.display()
        );
        self.reporter.report(SyncEvent::Started {
            provider: Provider::Github,
        });

        let repositories = source
            .list_org_repositories(org)
            .await
            .context("Failed to fetch repositories")?;

        let dir = base_dir.join(org);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        let results = self.clone_all(&repositories, &dir, token).await;

        Ok(self.finish(results, Vec::new(), start_time))
    }

    async fn clone_all(
        &self,
        repositories: &[Repository],
        dir: &Path,
        token: &Token,
    ) -> Vec<CloneOutcome> {
        let total = repositories.len();
        self.reporter.report(SyncEvent::RepositoriesFound { count: total });

        let mut results = Vec::with_capacity(total);
        for (index, repository) in repositories.iter().enumerate() {
            self.reporter.report(SyncEvent::Progress {
                current: index + 1,
                total,
            });

            let url = repository.clone_url(self.clone_method);
            let outcome = self
                .executor
                .clone_or_skip(url, dir, &repository.name, token)
                .await;
            results.push(outcome);
        }

        results
    }

    fn group_failed(
        &self,
        failed_groups: &mut Vec<GroupFailure>,
        path: String,
        err: &anyhow::Error,
    ) {
        let error = format!("{:#}", err);
        warn!("Failed to process group {}: {}", path, error);
        self.reporter.report(SyncEvent::GroupFailed {
            path: path.clone(),
            error: error.clone(),
        });
        failed_groups.push(GroupFailure { path, error });
    }

    fn finish(
        &self,
        results: Vec<CloneOutcome>,
        failed_groups: Vec<GroupFailure>,
        start_time: Instant,
    ) -> SyncSummary {
        let summary = SyncSummary::compile(results, failed_groups, start_time.elapsed());

        info!(
            "Sync completed in {:.2}s: {} cloned, {} skipped, {} failed, {} groups failed",
            summary.duration.as_secs_f64(),
            summary.cloned,
            summary.skipped,
            summary.failed,
            summary.failed_groups.len()
        );
        self.reporter.report(SyncEvent::Finished {
            cloned: summary.cloned,
            skipped: summary.skipped,
            failed: summary.failed,
            failed_groups: summary.failed_groups.len(),
            elapsed: summary.duration,
        });

        summary
    }
}

fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>()
        .map(ApiError::is_fatal)
        .unwrap_or(false)
}

/// Resolved tokens for both providers
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub gitlab: Token,
    pub github: Token,
}

impl Credentials {
    pub fn for_provider(&self, provider: Provider) -> &Token {
        match provider {
            Provider::Gitlab => &self.gitlab,
            Provider::Github => &self.github,
        }
    }
}

/// What to mirror and where
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub provider: Provider,
    /// Numeric GitLab group ID or GitHub organization name
    pub target: String,
    pub clone_method: CloneMethod,
    pub base_dir: PathBuf,
}

/// Endpoints and pacing for a run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub gitlab_api_url: String,
    pub github_api_url: String,
    pub request_delay: Duration,
    pub backoff: Backoff,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            gitlab_api_url: config.api_url(Provider::Gitlab),
            github_api_url: config.api_url(Provider::Github),
            request_delay: config.sync.request_delay(),
            backoff: config.sync.backoff(),
        }
    }
}

/// Validate the request, build the provider client and run the sync
pub async fn run(
    credentials: Credentials,
    request: SyncRequest,
    settings: &RunSettings,
    runner: Box<dyn GitRunner>,
    reporter: Arc<dyn Reporter>,
) -> Result<SyncSummary> {
    let token = credentials.for_provider(request.provider).clone();
    validate_token(&token)
        .map_err(|err| anyhow!("Invalid {} token: {}", request.provider, err))?;

    let api = ApiClient::new()?.with_backoff(settings.backoff);
    let executor = CloneExecutor::new(runner, reporter.clone()).with_backoff(settings.backoff);
    let engine = SyncEngine::new(executor, reporter)
        .with_clone_method(request.clone_method)
        .with_request_delay(settings.request_delay);

    match request.provider {
        Provider::Gitlab => {
            let group_id = parse_group_id(&request.target).context("Invalid group ID")?;
            let client = GitLabClient::new(api, &settings.gitlab_api_url, token.clone())
                .with_page_delay(settings.request_delay);
            engine
                .sync_gitlab_group(&client, group_id, &request.base_dir, &token)
                .await
        }
        Provider::Github => {
            let client = GitHubClient::new(api, &settings.github_api_url, token.clone())
                .with_page_delay(settings.request_delay);
            engine
                .sync_github_org(&client, &request.target, &request.base_dir, &token)
                .await
        }
    }
}
