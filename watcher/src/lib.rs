//! # Pollwatch
//!
//! Polling filesystem change detection. The watched directories are
//! snapshotted on a timer, successive snapshots are diffed, and every
//! difference is delivered to listeners as a typed event.
//!
//! ## Features
//!
//! - **No OS notification APIs**: works anywhere `stat` works
//! - **Move detection**: nodes are identified by inode and device, so a
//!   rename is reported as a move rather than a delete plus create
//! - **Filtering**: extension allow-lists, excluded extensions, directories
//!   and files
//! - **Concurrent delivery**: listeners for one event run concurrently;
//!   events are delivered one after another
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Watcher                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  RepeatingTimer ──► Indexer ──► compare ──► produce ──► Emitter │
//! │                        │           │           │           │    │
//! │                        ▼           ▼           ▼           ▼    │
//! │                   FileSystem     Index   ComparisonResult Event │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use pollwatch::{Configuration, Event, EventKind, Watcher};
//!
//! # async fn run() -> pollwatch::Result<()> {
//! let configuration = Configuration::new()
//!     .with_directories(["/srv/app"])
//!     .with_extensions(["rs"]);
//!
//! let watcher = Watcher::create(configuration)?;
//! watcher.register(EventKind::Modified, |event: Event| async move {
//!     println!("modified: {}", event.node()?.path.display());
//!     anyhow::Ok(())
//! });
//! watcher.enable();
//! watcher.unreferenced().await;
//! # Ok(())
//! # }
//! ```

pub mod comparator;
pub mod config;
pub mod emitter;
pub mod error;
pub mod event;
pub mod fs;
pub mod index;
pub mod indexer;
pub mod node;
pub mod timer;
pub mod watcher;

pub use comparator::{ComparisonResult, compare};
pub use config::Configuration;
pub use emitter::{Delivery, Emitter, Listener};
pub use error::{Result, WatcherError};
pub use event::{Event, EventKind, Events, produce};
pub use fs::{FileSystem, LocalFileSystem, MemoryFileSystem};
pub use index::Index;
pub use indexer::Indexer;
pub use node::{Node, NodeId, Statistics};
pub use timer::RepeatingTimer;
pub use watcher::{CycleReport, Watcher};
