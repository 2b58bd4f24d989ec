//! Diffing two snapshots into categorized node ids.

use serde::Serialize;

use crate::config::Configuration;
use crate::index::Index;
use crate::node::NodeId;

/// Node ids grouped by what happened to them between two snapshots.
///
/// Categories are not exclusive: a node that was renamed and rewritten
/// appears in both `moved` and `modified`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    pub created: Vec<NodeId>,
    pub modified: Vec<NodeId>,
    pub accessed: Vec<NodeId>,
    pub changed: Vec<NodeId>,
    pub moved: Vec<NodeId>,
    pub deleted: Vec<NodeId>,
}

impl ComparisonResult {
    /// True when no category holds any id.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.modified.is_empty()
            && self.accessed.is_empty()
            && self.changed.is_empty()
            && self.moved.is_empty()
            && self.deleted.is_empty()
    }

    /// Total number of ids across all categories.
    pub fn len(&self) -> usize {
        self.created.len()
            + self.modified.len()
            + self.accessed.len()
            + self.changed.len()
            + self.moved.len()
            + self.deleted.len()
    }
}

/// Compare `old` against `new`.
///
/// Timestamp categories are only evaluated when the matching `watch_for_*`
/// flag is set. A path change is always reported as `moved`.
pub fn compare(old: &Index, new: &Index, configuration: &Configuration) -> ComparisonResult {
    let mut result = ComparisonResult::default();

    for id in new.ids() {
        if !old.contains(id) {
            result.created.push(id.clone());
        }
    }

    for (id, before) in old.entries() {
        let Some(after) = new.get(id) else {
            result.deleted.push(id.clone());
            continue;
        };

        let (old_stats, new_stats) = (&before.statistics, &after.statistics);

        if configuration.watch_for_access
            && old_stats.last_access_time != new_stats.last_access_time
        {
            result.accessed.push(id.clone());
        }

        if configuration.watch_for_modifications
            && old_stats.last_modified_time != new_stats.last_modified_time
        {
            result.modified.push(id.clone());
        }

        if configuration.watch_for_changes
            && old_stats.last_change_time != new_stats.last_change_time
        {
            result.changed.push(id.clone());
        }

        if before.path != after.path {
            result.moved.push(id.clone());
        }
    }

    result
}
