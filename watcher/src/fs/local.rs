//! [`FileSystem`] backed by the local disk through `tokio::fs`.

use std::ffi::OsString;
use std::fs::Metadata;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tracing::trace;

use super::FileSystem;
use crate::error::Result;
use crate::node::Statistics;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// The host filesystem.
///
/// Entries are examined with `lstat` semantics: a symbolic link is a node of
/// its own and is never followed, so link cycles cannot trap the indexer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).await.is_ok()
    }

    async fn is_dir(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false)
    }

    async fn resolves_to_dir(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false)
    }

    async fn list_entries(&self, path: &Path) -> Result<Vec<OsString>> {
        let mut entries = Vec::new();
        let mut reader = fs::read_dir(path).await?;
        while let Some(entry) = reader.next_entry().await? {
            entries.push(entry.file_name());
        }
        Ok(entries)
    }

    async fn stat(&self, path: &Path) -> Option<Statistics> {
        match fs::symlink_metadata(path).await {
            Ok(metadata) => Some(statistics_from(&metadata, path)),
            Err(e) => {
                trace!("stat failed for {}: {e}", path.display());
                None
            }
        }
    }
}

fn to_nanos(seconds: i64, nanos: i64) -> i64 {
    seconds
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(nanos)
}

#[cfg(unix)]
fn statistics_from(metadata: &Metadata, _path: &Path) -> Statistics {
    use std::os::unix::fs::MetadataExt;

    Statistics {
        device_id: metadata.dev(),
        inode: metadata.ino(),
        mode: metadata.mode(),
        link_count: metadata.nlink(),
        user_id: metadata.uid(),
        group_id: metadata.gid(),
        device_type: metadata.rdev(),
        size: metadata.size(),
        last_access_time: to_nanos(metadata.atime(), metadata.atime_nsec()),
        last_modified_time: to_nanos(metadata.mtime(), metadata.mtime_nsec()),
        last_change_time: to_nanos(metadata.ctime(), metadata.ctime_nsec()),
        block_size: metadata.blksize(),
        block_count: metadata.blocks(),
    }
}

/// Without inode numbers the identity falls back to a hash of the path, so
/// a rename shows up as a deletion plus a creation.
#[cfg(not(unix))]
fn statistics_from(metadata: &Metadata, path: &Path) -> Statistics {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn since_epoch(time: std::io::Result<SystemTime>) -> i64 {
        time.ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| to_nanos(d.as_secs() as i64, i64::from(d.subsec_nanos())))
            .unwrap_or(0)
    }

    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);

    let mode = match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, _) => 0o040755,
        (false, true) => 0o100444,
        (false, false) => 0o100644,
    };

    Statistics {
        device_id: 0,
        inode: hasher.finish(),
        mode,
        link_count: 1,
        user_id: 0,
        group_id: 0,
        device_type: 0,
        size: metadata.len(),
        last_access_time: since_epoch(metadata.accessed()),
        last_modified_time: since_epoch(metadata.modified()),
        last_change_time: since_epoch(metadata.modified()),
        block_size: 0,
        block_count: 0,
    }
}
