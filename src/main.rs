use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reposync::{
    run, CloneMethod, Config, ConsoleReporter, Credentials, GitCli, Provider, RunSettings,
    SyncRequest, Token,
};

#[derive(Parser)]
#[command(name = "reposync")]
#[command(about = "Mirror GitLab groups and GitHub organizations onto local disk")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store access tokens and self-hosted instance URLs
    Config {
        /// Self-hosted GitLab instance URL
        #[arg(long)]
        gitlab_url: Option<String>,

        /// GitHub Enterprise API URL
        #[arg(long)]
        github_url: Option<String>,
    },

    /// Clone every repository of a group or organization that is not present yet
    Sync {
        /// Hosting provider
        #[arg(short, long, value_enum)]
        provider: Provider,

        /// GitLab group ID or GitHub organization name
        #[arg(short = 'g', long = "group")]
        target: String,

        /// Clone protocol (defaults to the configured method)
        #[arg(short = 'm', long = "method", value_enum)]
        clone_method: Option<CloneMethod>,

        /// Directory the mirror is rooted at (defaults to the configured base directory)
        #[arg(short = 'd', long = "dir")]
        base_dir: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    info!("Starting reposync v{}", env!("CARGO_PKG_VERSION"));

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };

    match cli.command {
        Commands::Config {
            gitlab_url,
            github_url,
        } => cmd_config(&config_path, gitlab_url, github_url),
        Commands::Sync {
            provider,
            target,
            clone_method,
            base_dir,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let color = config.output.color && !cli.no_color;
            cmd_sync(&config, color, provider, target, clone_method, base_dir).await
        }
    }
}

/// Initialize logging based on verbosity level. Logs go to stderr so status
/// lines on stdout stay readable.
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Load configuration from the specified path or the default location
fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Prompt for a value, returning `None` when the user just presses enter
fn prompt(label: &str) -> Result<Option<String>> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Failed to read from stdin")?;

    let input = input.trim();
    Ok((!input.is_empty()).then(|| input.to_string()))
}

fn cmd_config(
    config_path: &std::path::Path,
    gitlab_url: Option<String>,
    github_url: Option<String>,
) -> Result<()> {
    let mut config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    println!("Leave a token empty to keep the current value.");
    if let Some(token) = prompt("Enter your GitLab token")? {
        config.gitlab.token = Token::new(token);
    }
    if let Some(token) = prompt("Enter your GitHub token")? {
        config.github.token = Token::new(token);
    }

    if gitlab_url.is_some() {
        config.gitlab.url = gitlab_url;
    }
    if github_url.is_some() {
        config.github.url = github_url;
    }

    config.save(config_path)?;
    debug!("Configuration written to {:?}", config_path);

    println!("✅ Configuration saved to {}", config_path.display());
    Ok(())
}

async fn cmd_sync(
    config: &Config,
    color: bool,
    provider: Provider,
    target: String,
    clone_method: Option<CloneMethod>,
    base_dir: Option<String>,
) -> Result<()> {
    let token = config.token(provider)?;
    let credentials = match provider {
        Provider::Gitlab => Credentials {
            gitlab: token,
            ..Credentials::default()
        },
        Provider::Github => Credentials {
            github: token,
            ..Credentials::default()
        },
    };

    let base_dir = match base_dir {
        Some(dir) => shellexpand::full(&dir)
            .context("Failed to expand base directory")?
            .into_owned(),
        None => config.sync.base_directory.clone(),
    };

    let request = SyncRequest {
        provider,
        target,
        clone_method: clone_method.unwrap_or_else(|| config.sync.clone_method()),
        base_dir: PathBuf::from(base_dir),
    };
    debug!("Sync request: {:?}", request);

    let settings = RunSettings::from_config(config);
    let reporter = Arc::new(ConsoleReporter::new(color));

    let summary = run(credentials, request, &settings, Box::new(GitCli), reporter).await?;

    if summary.has_failures() {
        info!(
            "{} repositories and {} groups could not be mirrored",
            summary.failed,
            summary.failed_groups.len()
        );
    }

    Ok(())
}
