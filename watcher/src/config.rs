//! Configuration for the change detector.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatcherError};

/// Default poll interval, in seconds.
pub const DEFAULT_POLL_INTERVAL: f64 = 0.2;

/// Whether directories themselves are tracked by default.
pub const DEFAULT_WATCH_DIRECTORIES: bool = true;

/// Whether access-time changes are reported by default.
pub const DEFAULT_WATCH_FOR_ACCESS: bool = false;

/// Whether modification-time changes are reported by default.
pub const DEFAULT_WATCH_FOR_MODIFICATIONS: bool = true;

/// Whether metadata (ctime) changes are reported by default.
pub const DEFAULT_WATCH_FOR_CHANGES: bool = false;

/// What to watch and how often.
///
/// All `with_*` methods consume `self` and return the updated value, so a
/// configuration is built once and then shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Poll interval in seconds.
    pub poll_interval: f64,

    /// Directories to watch.
    pub directories: Vec<PathBuf>,

    /// Extensions to admit (empty = all).
    pub extensions: Vec<String>,

    /// Path prefixes to exclude.
    pub excluded_directories: Vec<PathBuf>,

    /// Extensions to exclude.
    pub excluded_extensions: Vec<String>,

    /// Specific files to exclude.
    pub excluded_files: Vec<PathBuf>,

    /// Track directories as nodes, not only files.
    pub watch_directories: bool,

    /// Report access-time changes.
    pub watch_for_access: bool,

    /// Report modification-time changes.
    pub watch_for_modifications: bool,

    /// Report metadata (ctime) changes.
    pub watch_for_changes: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            directories: Vec::new(),
            extensions: Vec::new(),
            excluded_directories: Vec::new(),
            excluded_extensions: Vec::new(),
            excluded_files: Vec::new(),
            watch_directories: DEFAULT_WATCH_DIRECTORIES,
            watch_for_access: DEFAULT_WATCH_FOR_ACCESS,
            watch_for_modifications: DEFAULT_WATCH_FOR_MODIFICATIONS,
            watch_for_changes: DEFAULT_WATCH_FOR_CHANGES,
        }
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch `directories` for every kind of change.
    pub fn for_directories<I, P>(directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::default()
            .with_directories(directories)
            .with_watch_for_access(true)
            .with_watch_for_modifications(true)
            .with_watch_for_changes(true)
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let configuration: Self = toml::from_str(source)?;
        Ok(configuration.normalized())
    }

    /// Read and parse a TOML configuration file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Set the poll interval, in seconds.
    pub fn with_poll_interval(mut self, seconds: f64) -> Self {
        self.poll_interval = seconds;
        self
    }

    /// Set the directories to watch.
    pub fn with_directories<I, P>(mut self, directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.directories = directories.into_iter().map(Into::into).collect();
        self
    }

    /// Only admit entries with one of these extensions.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = normalize_extensions(extensions);
        self
    }

    /// Exclude every entry whose path starts with one of these prefixes.
    pub fn with_excluded_directories<I, P>(mut self, directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.excluded_directories = directories.into_iter().map(Into::into).collect();
        self
    }

    /// Exclude entries with one of these extensions.
    pub fn with_excluded_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_extensions = normalize_extensions(extensions);
        self
    }

    /// Exclude these exact paths.
    pub fn with_excluded_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.excluded_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_watch_directories(mut self, watch_directories: bool) -> Self {
        self.watch_directories = watch_directories;
        self
    }

    pub fn with_watch_for_access(mut self, watch_for_access: bool) -> Self {
        self.watch_for_access = watch_for_access;
        self
    }

    pub fn with_watch_for_modifications(mut self, watch_for_modifications: bool) -> Self {
        self.watch_for_modifications = watch_for_modifications;
        self
    }

    pub fn with_watch_for_changes(mut self, watch_for_changes: bool) -> Self {
        self.watch_for_changes = watch_for_changes;
        self
    }

    /// Check that the configuration can drive a watcher.
    pub fn validate(&self) -> Result<()> {
        if !self.poll_interval.is_finite() || self.poll_interval <= 0.0 {
            return Err(WatcherError::InvalidPollInterval(self.poll_interval));
        }

        if let Some(empty) = self
            .directories
            .iter()
            .find(|dir| dir.as_os_str().is_empty())
        {
            return Err(WatcherError::Config(format!(
                "empty directory path in watch list: {empty:?}"
            )));
        }

        Ok(())
    }

    /// The poll interval as a [`Duration`], or `None` if it is not a
    /// positive, finite number of seconds.
    pub fn poll_interval_duration(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.poll_interval)
            .ok()
            .filter(|interval| !interval.is_zero())
    }

    fn normalized(mut self) -> Self {
        self.extensions = normalize_extensions(&self.extensions);
        self.excluded_extensions = normalize_extensions(&self.excluded_extensions);
        self
    }
}

pub(crate) fn normalize_extensions<I, S>(extensions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
        .collect()
}
