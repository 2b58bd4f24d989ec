//! `pollwatch`: print one line per filesystem change until Ctrl-C.
//!
//! Logs go to stderr and are filtered through `RUST_LOG` (default `info`),
//! so stdout carries nothing but events.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pollwatch::{Configuration, Event, EventKind, Watcher};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pollwatch", version, about = "Watch directories for changes by polling")]
struct Cli {
    /// Directories to watch. Defaults to the current directory unless a
    /// config file lists some.
    directories: Vec<PathBuf>,

    /// TOML configuration file; command-line flags override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between polls.
    #[arg(short, long)]
    poll_interval: Option<f64>,

    /// Only watch files with this extension (repeatable).
    #[arg(short = 'e', long = "ext")]
    extensions: Vec<String>,

    /// Ignore everything under this directory (repeatable).
    #[arg(long = "exclude-dir")]
    excluded_directories: Vec<PathBuf>,

    /// Ignore files with this extension (repeatable).
    #[arg(long = "exclude-ext")]
    excluded_extensions: Vec<String>,

    /// Ignore this exact file (repeatable).
    #[arg(long = "exclude-file")]
    excluded_files: Vec<PathBuf>,

    /// Do not report changes to directories themselves.
    #[arg(long)]
    no_directories: bool,

    /// Report access time changes.
    #[arg(long)]
    access: bool,

    /// Do not report modification time changes.
    #[arg(long)]
    no_modifications: bool,

    /// Report metadata (ctime) changes.
    #[arg(long)]
    changes: bool,
}

impl Cli {
    fn configuration(&self) -> Result<Configuration> {
        let mut configuration = match &self.config {
            Some(path) => Configuration::from_toml_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => Configuration::new(),
        };

        if !self.directories.is_empty() {
            configuration = configuration.with_directories(&self.directories);
        } else if configuration.directories.is_empty() {
            configuration = configuration.with_directories([std::env::current_dir()?]);
        }
        if let Some(seconds) = self.poll_interval {
            configuration = configuration.with_poll_interval(seconds);
        }
        if !self.extensions.is_empty() {
            configuration = configuration.with_extensions(&self.extensions);
        }
        if !self.excluded_directories.is_empty() {
            configuration = configuration.with_excluded_directories(&self.excluded_directories);
        }
        if !self.excluded_extensions.is_empty() {
            configuration = configuration.with_excluded_extensions(&self.excluded_extensions);
        }
        if !self.excluded_files.is_empty() {
            configuration = configuration.with_excluded_files(&self.excluded_files);
        }
        if self.no_directories {
            configuration = configuration.with_watch_directories(false);
        }
        if self.access {
            configuration = configuration.with_watch_for_access(true);
        }
        if self.no_modifications {
            configuration = configuration.with_watch_for_modifications(false);
        }
        if self.changes {
            configuration = configuration.with_watch_for_changes(true);
        }

        configuration.validate()?;
        Ok(configuration)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// One line per event; moves show both paths.
fn describe(event: &Event) -> Result<String> {
    let line = match event.kind {
        EventKind::Moved => {
            let before = event.old_index.node(&event.id)?;
            let after = event.new_index.node(&event.id)?;
            format!(
                "{}: {} -> {}",
                event.kind,
                before.path.display(),
                after.path.display()
            )
        }
        _ => format!("{}: {}", event.kind, event.node()?.path.display()),
    };
    Ok(line)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let configuration = cli.configuration()?;
    let watcher = Watcher::create(configuration)?;

    for kind in EventKind::ALL {
        watcher.register(kind, |event: Event| async move {
            println!("{}", describe(&event)?);
            anyhow::Ok(())
        });
    }

    watcher.enable();
    watcher.reference();

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("Interrupted, shutting down");
            watcher.disable();
            watcher.unreference();
        }
        _ = watcher.unreferenced() => {}
    }

    Ok(())
}
