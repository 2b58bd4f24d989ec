//! Snapshot entries: filesystem metadata and the node identity built from it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadata for one filesystem entry, as reported by `stat`.
///
/// Every field is an opaque integer from the underlying filesystem.
/// Timestamps are nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statistics {
    /// Device id.
    #[serde(rename = "dev")]
    pub device_id: u64,

    /// Inode number.
    #[serde(rename = "ino")]
    pub inode: u64,

    /// File type and permission bits.
    pub mode: u32,

    /// Number of hard links.
    #[serde(rename = "nlink")]
    pub link_count: u64,

    /// User id of the owner.
    #[serde(rename = "uid")]
    pub user_id: u32,

    /// Group id of the owner.
    #[serde(rename = "gid")]
    pub group_id: u32,

    /// Device type (if inode device).
    #[serde(rename = "rdev")]
    pub device_type: u64,

    /// Total size, in bytes.
    pub size: u64,

    /// Last access time.
    #[serde(rename = "atime")]
    pub last_access_time: i64,

    /// Last modification time.
    #[serde(rename = "mtime")]
    pub last_modified_time: i64,

    /// Last status change time.
    #[serde(rename = "ctime")]
    pub last_change_time: i64,

    /// Block size for filesystem I/O.
    #[serde(rename = "blksize")]
    pub block_size: u64,

    /// Number of 512B blocks allocated.
    #[serde(rename = "blocks")]
    pub block_count: u64,
}

impl Statistics {
    /// Identity of the underlying file: `"<inode>-<device>"`.
    pub fn identifier(&self) -> NodeId {
        NodeId(format!("{}-{}", self.inode, self.device_id))
    }

    /// Serialize to a JSON value with the `stat` field names.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Stable identity of a filesystem entry across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an already formatted identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A filesystem entry at the time of one snapshot.
///
/// Two nodes with the same [`NodeId`] are the same underlying file, even
/// when their paths differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Identity derived from inode and device.
    pub id: NodeId,

    /// Path of the entry when the snapshot was taken.
    pub path: PathBuf,

    /// Metadata of the entry.
    pub statistics: Statistics,
}

impl Node {
    pub fn new(id: NodeId, path: impl Into<PathBuf>, statistics: Statistics) -> Self {
        Self {
            id,
            path: path.into(),
            statistics,
        }
    }

    /// Create a node whose id is derived from the statistics.
    pub fn from_path_and_statistics(path: impl Into<PathBuf>, statistics: Statistics) -> Self {
        Self::new(statistics.identifier(), path, statistics)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize to a JSON value: `{ id, path, statistics }`.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
