//! reposync - Mirror GitLab group trees and GitHub organizations onto local disk
//!
//! A GitLab group is mirrored with its full subgroup hierarchy as nested
//! directories; a GitHub organization is mirrored flat under a directory named
//! after it. Syncing only ever clones repositories that are not present yet.
//!
//! ## Modules
//!
//! - [`client`]: Authenticated HTTP access and failure classification
//! - [`gitlab`] and [`github`]: Provider adapters with transparent pagination
//! - [`git`]: Clone-or-skip execution with retry
//! - [`sync`]: Traversal orchestration and the [`sync::run`] entry point
//! - [`config`]: YAML configuration with XDG compliance

pub mod client;
pub mod config;
pub mod git;
pub mod github;
pub mod gitlab;
pub mod output;
pub mod provider;
pub mod retry;
pub mod sync;
pub mod validate;

pub use client::{ApiClient, ApiError};
pub use config::{Config, Token};
pub use git::{CloneExecutor, CloneOutcome, GitCli, GitRunner};
pub use github::GitHubClient;
pub use gitlab::GitLabClient;
pub use output::{ConsoleReporter, RecordingReporter, Reporter, SyncEvent};
pub use provider::{select_url, CloneMethod, GroupSource, OrgSource, Provider, Repository};
pub use retry::Backoff;
pub use sync::{run, Credentials, RunSettings, SyncEngine, SyncRequest, SyncSummary};
