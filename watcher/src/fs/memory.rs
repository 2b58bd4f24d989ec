//! In-memory [`FileSystem`] for tests and embedding.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::FileSystem;
use crate::error::Result;
use crate::node::Statistics;

const DEVICE_ID: u64 = 1;
const FILE_MODE: u32 = 0o100644;
const DIR_MODE: u32 = 0o040755;

#[derive(Debug, Clone)]
struct MemoryEntry {
    is_dir: bool,
    inode: u64,
    size: u64,
    accessed: i64,
    modified: i64,
    changed: i64,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<PathBuf, MemoryEntry>,
    vanished: BTreeSet<PathBuf>,
    unlistable: BTreeSet<PathBuf>,
    next_inode: u64,
    clock: i64,
}

impl MemoryState {
    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn allocate(&mut self, is_dir: bool, size: u64) -> MemoryEntry {
        self.next_inode += 1;
        let now = self.tick();
        MemoryEntry {
            is_dir,
            inode: self.next_inode,
            size,
            accessed: now,
            modified: now,
            changed: now,
        }
    }

    fn ensure_dir(&mut self, path: &Path) {
        if path.as_os_str().is_empty() || self.entries.contains_key(path) {
            return;
        }
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent);
        }
        let entry = self.allocate(true, 0);
        let now = entry.modified;
        self.entries.insert(path.to_path_buf(), entry);
        self.touch_parent(path, now);
    }

    fn ensure_parent(&mut self, path: &Path) {
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent);
        }
    }

    /// Adding or removing a child updates the directory, as on disk.
    fn touch_parent(&mut self, path: &Path, now: i64) {
        if let Some(parent) = path.parent().and_then(|parent| self.entries.get_mut(parent)) {
            parent.modified = now;
            parent.changed = now;
        }
    }

    fn entry_mut(&mut self, path: &Path) -> io::Result<&mut MemoryEntry> {
        self.entries
            .get_mut(path)
            .ok_or_else(|| not_found(path))
    }

    /// Paths of `path` and everything below it.
    fn subtree(&self, path: &Path) -> Vec<PathBuf> {
        self.entries
            .keys()
            .filter(|candidate| candidate.starts_with(path))
            .cloned()
            .collect()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such entry: {}", path.display()),
    )
}

/// A filesystem that lives entirely in memory.
///
/// Every entry gets its own inode on creation, and keeps it across
/// [`rename`](Self::rename), so moves are detectable exactly as on disk.
/// Timestamps come from a logical clock that advances on every mutation.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a directory and any missing ancestors.
    pub fn create_dir(&self, path: impl AsRef<Path>) {
        self.state().ensure_dir(path.as_ref());
    }

    /// Create a file, or rewrite an existing one (bumping mtime and ctime).
    pub fn write(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
        let path = path.as_ref();
        let size = contents.as_ref().len() as u64;
        let mut state = self.state();
        state.ensure_parent(path);

        if !state.entries.contains_key(path) {
            let entry = state.allocate(false, size);
            let now = entry.modified;
            state.entries.insert(path.to_path_buf(), entry);
            state.touch_parent(path, now);
            return;
        }

        let now = state.tick();
        if let Some(entry) = state.entries.get_mut(path) {
            entry.size = size;
            entry.modified = now;
            entry.changed = now;
        }
    }

    /// Move an entry (and, for a directory, everything below it) keeping
    /// inode numbers.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        let (from, to) = (from.as_ref(), to.as_ref());
        let mut state = self.state();
        if !state.entries.contains_key(from) {
            return Err(not_found(from).into());
        }
        state.ensure_parent(to);

        let now = state.tick();
        for old_path in state.subtree(from) {
            let Some(mut entry) = state.entries.remove(&old_path) else {
                continue;
            };
            let new_path = match old_path.strip_prefix(from) {
                Ok(rest) if rest.as_os_str().is_empty() => to.to_path_buf(),
                Ok(rest) => to.join(rest),
                Err(_) => continue,
            };
            if new_path == to {
                entry.changed = now;
            }
            state.entries.insert(new_path, entry);
        }
        state.touch_parent(from, now);
        state.touch_parent(to, now);
        Ok(())
    }

    /// Delete an entry and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut state = self.state();
        if !state.entries.contains_key(path) {
            return Err(not_found(path).into());
        }
        for doomed in state.subtree(path) {
            state.entries.remove(&doomed);
        }
        let now = state.tick();
        state.touch_parent(path, now);
        Ok(())
    }

    /// Bump the access time only.
    pub fn touch_accessed(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut state = self.state();
        let now = state.tick();
        state.entry_mut(path.as_ref())?.accessed = now;
        Ok(())
    }

    /// Bump the modification time (and ctime, as a real write would).
    pub fn touch_modified(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut state = self.state();
        let now = state.tick();
        let entry = state.entry_mut(path.as_ref())?;
        entry.modified = now;
        entry.changed = now;
        Ok(())
    }

    /// Bump the metadata change time only, as `chmod` would.
    pub fn touch_changed(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut state = self.state();
        let now = state.tick();
        state.entry_mut(path.as_ref())?.changed = now;
        Ok(())
    }

    /// Keep listing `path` but fail every `stat` on it, as if it disappeared
    /// between the two calls.
    pub fn vanish_on_stat(&self, path: impl AsRef<Path>) {
        self.state().vanished.insert(path.as_ref().to_path_buf());
    }

    /// Make listing `path` fail with a permission error.
    pub fn deny_listing(&self, path: impl AsRef<Path>) {
        self.state().unlistable.insert(path.as_ref().to_path_buf());
    }

    /// Current inode of `path`, if it exists.
    pub fn inode_of(&self, path: impl AsRef<Path>) -> Option<u64> {
        self.state()
            .entries
            .get(path.as_ref())
            .map(|entry| entry.inode)
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn exists(&self, path: &Path) -> bool {
        self.state().entries.contains_key(path)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        self.state()
            .entries
            .get(path)
            .is_some_and(|entry| entry.is_dir)
    }

    async fn list_entries(&self, path: &Path) -> Result<Vec<OsString>> {
        let state = self.state();
        if state.unlistable.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("listing denied: {}", path.display()),
            )
            .into());
        }
        match state.entries.get(path) {
            Some(entry) if entry.is_dir => Ok(state
                .entries
                .keys()
                .filter(|candidate| candidate.parent() == Some(path))
                .filter_map(|candidate| candidate.file_name())
                .map(ToOwned::to_owned)
                .collect()),
            _ => Err(not_found(path).into()),
        }
    }

    async fn stat(&self, path: &Path) -> Option<Statistics> {
        let state = self.state();
        if state.vanished.contains(path) {
            return None;
        }
        let entry = state.entries.get(path)?;
        Some(Statistics {
            device_id: DEVICE_ID,
            inode: entry.inode,
            mode: if entry.is_dir { DIR_MODE } else { FILE_MODE },
            link_count: 1,
            user_id: 1000,
            group_id: 1000,
            device_type: 0,
            size: entry.size,
            last_access_time: entry.accessed,
            last_modified_time: entry.modified,
            last_change_time: entry.changed,
            block_size: 4096,
            block_count: entry.size.div_ceil(512),
        })
    }
}
