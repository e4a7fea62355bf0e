use anyhow::{anyhow, Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::provider::{CloneMethod, Provider};
use crate::retry::{Backoff, DEFAULT_MAX_ATTEMPTS};

/// Default GitLab instance
pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";

/// Default GitHub API base
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Personal access token.
///
/// The value is only reachable through [`Token::expose`]; `Debug` output is redacted.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Token(<empty>)")
        } else {
            f.write_str("Token(<redacted>)")
        }
    }
}

/// Main configuration structure for reposync
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// GitLab credentials and instance
    #[serde(default)]
    pub gitlab: ProviderConfig,

    /// GitHub credentials and API base
    #[serde(default)]
    pub github: ProviderConfig,

    /// Traversal and clone behavior
    #[serde(default)]
    pub sync: SyncConfig,

    /// Terminal output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Per-provider settings
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProviderConfig {
    /// Personal access token
    #[serde(default, skip_serializing_if = "Token::is_empty")]
    pub token: Token,

    /// Self-hosted instance (GitLab) or enterprise API base (GitHub)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Preferred clone protocol
    #[serde(default = "default_clone_method")]
    pub clone_method: String, // "https", "ssh"

    /// Clone attempts per repository (also applied to rate-limited API calls)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between API pages and after each group, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Linear backoff unit between attempts, in milliseconds
    #[serde(default = "default_retry_step_ms")]
    pub retry_step_ms: u64,

    /// Directory the mirror is rooted at
    #[serde(default = "default_base_directory")]
    pub base_directory: String,
}

/// Output configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_clone_method() -> String {
    "https".to_string()
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_request_delay_ms() -> u64 {
    100
}
fn default_retry_step_ms() -> u64 {
    1000
}
fn default_base_directory() -> String {
    ".".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            clone_method: default_clone_method(),
            max_retries: default_max_retries(),
            request_delay_ms: default_request_delay_ms(),
            retry_step_ms: default_retry_step_ms(),
            base_directory: default_base_directory(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: default_true(),
        }
    }
}

impl SyncConfig {
    pub fn clone_method(&self) -> CloneMethod {
        CloneMethod::from_setting(&self.clone_method)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::linear(self.max_retries, Duration::from_millis(self.retry_step_ms))
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file, readable by the owner only
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict permissions on {:?}", path))?;
        }

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("reposync").join("config.yml"))
    }

    /// Expand environment variables and `~` in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.sync.base_directory = shellexpand::full(&self.sync.base_directory)
            .context("Failed to expand base_directory path")?
            .into_owned();

        Ok(())
    }

    fn provider(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Gitlab => &self.gitlab,
            Provider::Github => &self.github,
        }
    }

    /// Token for a provider: the configured value, then `GITLAB_TOKEN` / `GITHUB_TOKEN`
    pub fn token(&self, provider: Provider) -> Result<Token> {
        let configured = &self.provider(provider).token;
        if !configured.is_empty() {
            return Ok(configured.clone());
        }

        let var = provider.token_env_var();
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Ok(Token::new(value)),
            _ => Err(anyhow!(
                "No token found for provider {}. Please run 'reposync config' to configure your tokens (or set {}).",
                provider,
                var
            )),
        }
    }

    /// Resolved API base URL for a provider
    pub fn api_url(&self, provider: Provider) -> String {
        let configured = self.provider(provider).url.as_deref();
        match provider {
            Provider::Gitlab => gitlab_api_base(configured),
            Provider::Github => github_api_base(configured),
        }
    }
}

/// GitLab REST base for an instance URL (`/api/v4` appended unless present)
pub fn gitlab_api_base(instance: Option<&str>) -> String {
    let instance = instance
        .map(|url| url.trim().trim_end_matches('/'))
        .filter(|url| !url.is_empty())
        .unwrap_or(DEFAULT_GITLAB_URL);

    if instance.ends_with("/api/v4") {
        instance.to_string()
    } else {
        format!("{}/api/v4", instance)
    }
}

/// GitHub REST base (enterprise installs pass `https://host/api/v3`)
pub fn github_api_base(api_url: Option<&str>) -> String {
    api_url
        .map(|url| url.trim().trim_end_matches('/'))
        .filter(|url| !url.is_empty())
        .unwrap_or(DEFAULT_GITHUB_API_URL)
        .to_string()
}
