//! Filesystem access used by the indexer.
//!
//! The indexer never touches `std::fs` directly; it goes through
//! [`FileSystem`], which lets hosts substitute their own storage and lets
//! tests run against [`MemoryFileSystem`].

use std::ffi::OsString;
use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::node::Statistics;

mod local;
mod memory;

pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;

/// Abstract filesystem capability consumed by the indexer.
#[async_trait]
pub trait FileSystem: Send + Sync + Debug {
    async fn exists(&self, path: &Path) -> bool;

    /// Whether `path` itself is a directory. A symbolic link is not.
    async fn is_dir(&self, path: &Path) -> bool;

    /// Whether `path` is a directory once symbolic links are resolved.
    /// Only used for the configured roots.
    async fn resolves_to_dir(&self, path: &Path) -> bool {
        self.is_dir(path).await
    }

    /// Names of the entries directly inside `path`, exactly as the
    /// filesystem stores them.
    async fn list_entries(&self, path: &Path) -> Result<Vec<OsString>>;

    /// Metadata for `path`, or `None` if it vanished or cannot be read.
    async fn stat(&self, path: &Path) -> Option<Statistics>;
}

/// Lowercased extension of `path`, or `""` when it has none.
pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Whether `path` starts with `prefix` as a plain string.
pub(crate) fn has_prefix(path: &Path, prefix: &Path) -> bool {
    path.to_string_lossy()
        .starts_with(prefix.to_string_lossy().as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("/a/b/Index.PHP")), "php");
        assert_eq!(extension_of(Path::new("/a/b/Makefile")), "");
        assert_eq!(extension_of(Path::new("/a/b.d/file")), "");
    }

    #[test]
    fn test_has_prefix_is_string_based() {
        assert!(has_prefix(Path::new("/srv/vendor/x.php"), Path::new("/srv/vendor")));
        assert!(has_prefix(Path::new("/srv/vendored.php"), Path::new("/srv/vendor")));
        assert!(!has_prefix(Path::new("/srv/src/x.php"), Path::new("/srv/vendor")));
    }
}
