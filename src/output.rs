//! User-facing status lines
//!
//! Traversal and cloning emit [`SyncEvent`]s into a [`Reporter`]. The console
//! reporter colors them for the terminal; the recording reporter keeps them
//! in memory so tests can assert on events instead of escape codes.

use crossterm::style::{Color, Stylize};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use crate::provider::Provider;

/// Something worth telling the user about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Started { provider: Provider },
    GroupEntered { name: String, path: String },
    SubgroupStarted { full_path: String },
    GroupFailed { path: String, error: String },
    RepositoriesFound { count: usize },
    Progress { current: usize, total: usize },
    Cloning { name: String },
    Retrying { name: String, attempt: u32, delay: Duration },
    Cloned { name: String },
    Skipped { name: String },
    CloneFailed { name: String, error: String },
    Finished {
        cloned: usize,
        skipped: usize,
        failed: usize,
        failed_groups: usize,
        elapsed: Duration,
    },
}

/// How an event should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Info,
    Success,
    Warning,
    Error,
    Summary,
}

impl SyncEvent {
    pub fn tone(&self) -> Tone {
        match self {
            SyncEvent::Started { .. } => Tone::Info,
            SyncEvent::GroupEntered { .. }
            | SyncEvent::RepositoriesFound { .. }
            | SyncEvent::Progress { .. } => Tone::Plain,
            SyncEvent::SubgroupStarted { .. }
            | SyncEvent::Retrying { .. }
            | SyncEvent::Skipped { .. } => Tone::Warning,
            SyncEvent::Cloning { .. } | SyncEvent::Cloned { .. } => Tone::Success,
            SyncEvent::GroupFailed { .. } | SyncEvent::CloneFailed { .. } => Tone::Error,
            SyncEvent::Finished { .. } => Tone::Summary,
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::Started { provider } => {
                let name = match provider {
                    Provider::Gitlab => "GitLab",
                    Provider::Github => "GitHub",
                };
                write!(f, "Fetching {} repositories...", name)
            }
            SyncEvent::GroupEntered { name, path } => {
                write!(f, "Creating directory structure for group: {} ({})", name, path)
            }
            SyncEvent::SubgroupStarted { full_path } => {
                write!(f, "Processing subgroup: {}", full_path)
            }
            SyncEvent::GroupFailed { path, error } => {
                write!(f, "Failed to process group {}: {}", path, error)
            }
            SyncEvent::RepositoriesFound { count } => write!(f, "Found {} repositories", count),
            SyncEvent::Progress { current, total } => {
                let percent = if *total == 0 {
                    100.0
                } else {
                    *current as f64 / *total as f64 * 100.0
                };
                write!(f, "Progress: {}/{} ({:.1}%)", current, total, percent)
            }
            SyncEvent::Cloning { name } => write!(f, "Cloning: {}", name),
            SyncEvent::Retrying { attempt, delay, .. } => write!(
                f,
                "Attempt {} failed, retrying with authentication in {} seconds...",
                attempt,
                delay.as_secs_f64()
            ),
            SyncEvent::Cloned { name } => write!(f, "Cloned: {}", name),
            SyncEvent::Skipped { name } => write!(f, "Skipping: {} (Already cloned)", name),
            SyncEvent::CloneFailed { name, error } => {
                write!(f, "Failed to clone {}: {}", name, error)
            }
            SyncEvent::Finished {
                cloned,
                skipped,
                failed,
                failed_groups,
                elapsed,
            } => {
                write!(
                    f,
                    "Repository sync complete in {:.2}s: {} cloned, {} skipped, {} failed",
                    elapsed.as_secs_f64(),
                    cloned,
                    skipped,
                    failed
                )?;
                if *failed_groups > 0 {
                    write!(f, ", {} groups failed", failed_groups)?;
                }
                Ok(())
            }
        }
    }
}

/// Sink for status events
pub trait Reporter: Send + Sync {
    fn report(&self, event: SyncEvent);
}

/// Color scheme for console output
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub info: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub summary: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            info: Color::Cyan,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            summary: Color::Blue,
        }
    }
}

impl ColorScheme {
    fn color_for(&self, tone: Tone) -> Option<Color> {
        match tone {
            Tone::Plain => None,
            Tone::Info => Some(self.info),
            Tone::Success => Some(self.success),
            Tone::Warning => Some(self.warning),
            Tone::Error => Some(self.error),
            Tone::Summary => Some(self.summary),
        }
    }
}

/// Writes status lines to stdout
#[derive(Debug, Clone)]
pub struct ConsoleReporter {
    color: bool,
    scheme: ColorScheme,
}

impl ConsoleReporter {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            scheme: ColorScheme::default(),
        }
    }

    pub fn render(&self, event: &SyncEvent) -> String {
        let line = event.to_string();
        match self.scheme.color_for(event.tone()) {
            Some(color) if self.color => line.with(color).to_string(),
            _ => line,
        }
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, event: SyncEvent) {
        println!("{}", self.render(&event));
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
