//! Builds an [`Index`] by walking the configured directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::config::{Configuration, normalize_extensions};
use crate::fs::{FileSystem, extension_of, has_prefix};
use crate::index::Index;
use crate::node::{Node, NodeId};

/// Snapshots the watched tree through a [`FileSystem`].
///
/// Indexing is best effort: an entry that vanishes, cannot be listed or
/// cannot be stated is left out of the snapshot rather than reported.
#[derive(Debug, Clone)]
pub struct Indexer {
    fs: Arc<dyn FileSystem>,
}

impl Indexer {
    /// Create an indexer over the given filesystem.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Walk every configured directory and collect the admitted nodes.
    ///
    /// When two directories yield the same id the later one wins.
    pub async fn index(&self, configuration: &Configuration) -> Index {
        let start = Instant::now();
        let rules = Admission::new(configuration);
        let mut nodes = IndexMap::new();

        for directory in &configuration.directories {
            self.index_directory(directory, &rules, &mut nodes).await;
        }

        debug!(
            "Indexed {} nodes across {} directories in {:?}",
            nodes.len(),
            configuration.directories.len(),
            start.elapsed()
        );

        Index::from_map(nodes)
    }

    /// Depth-first walk of one root. Subdirectories are always descended
    /// into; whether they become nodes themselves depends on
    /// `watch_directories`.
    ///
    /// A root may be a symbolic link to a directory. Below the root, links
    /// are never followed.
    async fn index_directory(
        &self,
        root: &Path,
        rules: &Admission<'_>,
        nodes: &mut IndexMap<NodeId, Node>,
    ) {
        if !self.fs.resolves_to_dir(root).await {
            debug!("Skipping {}: not a directory", root.display());
            return;
        }

        let mut pending = vec![root.to_path_buf()];
        while let Some(directory) = pending.pop() {
            if rules.configuration.watch_directories {
                if let Some(node) = self.node_for(&directory, rules).await {
                    nodes.insert(node.id.clone(), node);
                }
            }

            let entries = match self.fs.list_entries(&directory).await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Failed to list {}: {e}", directory.display());
                    continue;
                }
            };

            let mut subdirectories: Vec<PathBuf> = Vec::new();
            for name in entries {
                let path = directory.join(&name);

                if self.fs.is_dir(&path).await {
                    // Every descendant would fail the same prefix test.
                    if rules.is_under_excluded_directory(&path) {
                        trace!("Pruning excluded directory {}", path.display());
                    } else {
                        subdirectories.push(path);
                    }
                    continue;
                }

                if let Some(node) = self.node_for(&path, rules).await {
                    nodes.insert(node.id.clone(), node);
                }
            }

            // Reversed so the stack pops them in listing order.
            pending.extend(subdirectories.into_iter().rev());
        }
    }

    /// Apply the admission rules to one entry and stat it.
    async fn node_for(&self, path: &Path, rules: &Admission<'_>) -> Option<Node> {
        if !self.fs.exists(path).await {
            trace!("Entry vanished before admission: {}", path.display());
            return None;
        }

        let extension = extension_of(path);
        if !rules.extensions.is_empty() && !rules.extensions.contains(&extension) {
            return None;
        }

        if rules.excluded_extensions.contains(&extension) {
            return None;
        }

        if rules.is_under_excluded_directory(path) {
            return None;
        }

        if rules
            .configuration
            .excluded_files
            .iter()
            .any(|excluded| excluded == path)
        {
            return None;
        }

        let Some(statistics) = self.fs.stat(path).await else {
            trace!("Entry could not be stated: {}", path.display());
            return None;
        };

        Some(Node::from_path_and_statistics(path, statistics))
    }
}

/// Admission rules for one indexing pass. Extension lists are normalized
/// here as well, so a configuration assembled field by field behaves like
/// one built with the `with_*` methods.
struct Admission<'a> {
    configuration: &'a Configuration,
    extensions: Vec<String>,
    excluded_extensions: Vec<String>,
}

impl<'a> Admission<'a> {
    fn new(configuration: &'a Configuration) -> Self {
        Self {
            configuration,
            extensions: normalize_extensions(&configuration.extensions),
            excluded_extensions: normalize_extensions(&configuration.excluded_extensions),
        }
    }

    fn is_under_excluded_directory(&self, path: &Path) -> bool {
        self.configuration
            .excluded_directories
            .iter()
            .any(|prefix| has_prefix(path, prefix))
    }
}
