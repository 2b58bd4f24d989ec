//! Change events and the producer that expands a comparison into them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::comparator::ComparisonResult;
use crate::config::Configuration;
use crate::error::Result;
use crate::index::Index;
use crate::node::{Node, NodeId};

/// Kind of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Node appeared.
    Created,

    /// Node's access time changed.
    Accessed,

    /// Node's modification time changed.
    Modified,

    /// Node's metadata (ctime) changed.
    Changed,

    /// Node's path changed.
    Moved,

    /// Node disappeared.
    Deleted,
}

impl EventKind {
    /// Every kind, in the order the producer emits them.
    pub const ALL: [EventKind; 6] = [
        Self::Created,
        Self::Accessed,
        Self::Modified,
        Self::Changed,
        Self::Moved,
        Self::Deleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Accessed => "accessed",
            Self::Modified => "modified",
            Self::Changed => "changed",
            Self::Moved => "moved",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened to one node between two snapshots.
///
/// The event carries both snapshots rather than the node itself, so a
/// listener can look at the node before and after the change.
#[derive(Debug, Clone)]
pub struct Event {
    /// The kind of event.
    pub kind: EventKind,

    /// The affected node.
    pub id: NodeId,

    /// Snapshot taken before the change.
    pub old_index: Index,

    /// Snapshot taken after the change.
    pub new_index: Index,
}

impl Event {
    pub fn new(kind: EventKind, id: NodeId, old_index: Index, new_index: Index) -> Self {
        Self {
            kind,
            id,
            old_index,
            new_index,
        }
    }

    /// The node as it was, if it existed in the old snapshot.
    pub fn old_node(&self) -> Option<&Node> {
        self.old_index.get(&self.id)
    }

    /// The node as it is, if it exists in the new snapshot.
    pub fn new_node(&self) -> Option<&Node> {
        self.new_index.get(&self.id)
    }

    /// The most recent state of the node: the old snapshot for `Deleted`,
    /// the new one for every other kind.
    pub fn node(&self) -> Result<&Node> {
        match self.kind {
            EventKind::Deleted => self.old_index.node(&self.id),
            _ => self.new_index.node(&self.id),
        }
    }
}

type Block = (EventKind, std::vec::IntoIter<NodeId>);

/// One-shot, lazily built sequence of events for a single cycle.
#[derive(Debug)]
pub struct Events {
    blocks: std::vec::IntoIter<Block>,
    current: Option<Block>,
    old_index: Index,
    new_index: Index,
}

impl Iterator for Events {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if let Some((kind, ids)) = &mut self.current {
                if let Some(id) = ids.next() {
                    return Some(Event::new(
                        *kind,
                        id,
                        self.old_index.clone(),
                        self.new_index.clone(),
                    ));
                }
            }
            self.current = Some(self.blocks.next()?);
        }
    }
}

/// Expand a comparison into events.
///
/// Blocks come out in a fixed order: created, accessed, modified, changed,
/// moved, deleted. The three timestamp blocks are skipped unless their
/// `watch_for_*` flag is set. Within a block, ids keep the order of the
/// comparison result.
pub fn produce(
    result: ComparisonResult,
    old_index: &Index,
    new_index: &Index,
    configuration: &Configuration,
) -> Events {
    let ComparisonResult {
        created,
        modified,
        accessed,
        changed,
        moved,
        deleted,
    } = result;

    let blocks = [
        (EventKind::Created, created, true),
        (EventKind::Accessed, accessed, configuration.watch_for_access),
        (
            EventKind::Modified,
            modified,
            configuration.watch_for_modifications,
        ),
        (EventKind::Changed, changed, configuration.watch_for_changes),
        (EventKind::Moved, moved, true),
        (EventKind::Deleted, deleted, true),
    ];

    let blocks: Vec<Block> = blocks
        .into_iter()
        .filter(|(_, ids, enabled)| *enabled && !ids.is_empty())
        .map(|(kind, ids, _)| (kind, ids.into_iter()))
        .collect();

    Events {
        blocks: blocks.into_iter(),
        current: None,
        old_index: old_index.clone(),
        new_index: new_index.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::tests::stats;
    use pretty_assertions::assert_eq;

    fn ids(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|name| NodeId::from(*name)).collect()
    }

    fn kinds_and_ids(events: Events) -> Vec<(EventKind, String)> {
        events
            .map(|event| (event.kind, event.id.to_string()))
            .collect()
    }

    #[test]
    fn test_default_flags_order() {
        let result = ComparisonResult {
            created: ids(&["x"]),
            moved: ids(&["y"]),
            deleted: ids(&["z"]),
            ..Default::default()
        };

        let events = produce(
            result,
            &Index::empty(),
            &Index::empty(),
            &Configuration::new(),
        );

        assert_eq!(
            kinds_and_ids(events),
            vec![
                (EventKind::Created, "x".to_string()),
                (EventKind::Moved, "y".to_string()),
                (EventKind::Deleted, "z".to_string()),
            ]
        );
    }

    #[test]
    fn test_flags_gate_timestamp_blocks() {
        let result = ComparisonResult {
            created: ids(&["c"]),
            modified: ids(&["m1", "m2"]),
            accessed: ids(&["a"]),
            changed: ids(&["ch"]),
            moved: ids(&["mv"]),
            deleted: ids(&["d"]),
        };

        let everything = Configuration::for_directories(["/w"]);
        let events = produce(result.clone(), &Index::empty(), &Index::empty(), &everything);
        let kinds: Vec<_> = events.map(|event| event.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Created,
                EventKind::Accessed,
                EventKind::Modified,
                EventKind::Modified,
                EventKind::Changed,
                EventKind::Moved,
                EventKind::Deleted,
            ]
        );

        let quiet = everything
            .with_watch_for_access(false)
            .with_watch_for_modifications(false)
            .with_watch_for_changes(false);
        let events = produce(result, &Index::empty(), &Index::empty(), &quiet);
        assert_eq!(
            kinds_and_ids(events),
            vec![
                (EventKind::Created, "c".to_string()),
                (EventKind::Moved, "mv".to_string()),
                (EventKind::Deleted, "d".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_result_produces_nothing() {
        let mut events = produce(
            ComparisonResult::default(),
            &Index::empty(),
            &Index::empty(),
            &Configuration::new(),
        );
        assert!(events.next().is_none());
    }

    #[test]
    fn test_event_resolves_nodes() {
        let before = Node::from_path_and_statistics("/w/a.txt", stats(1, 0));
        let after = Node::from_path_and_statistics("/w/b.txt", stats(1, 0));
        let old_index: Index = [before].into_iter().collect();
        let new_index: Index = [after].into_iter().collect();
        let id = NodeId::from("1-7");

        let moved = Event::new(EventKind::Moved, id.clone(), old_index.clone(), new_index);
        assert_eq!(moved.old_node().unwrap().path.to_str(), Some("/w/a.txt"));
        assert_eq!(moved.node().unwrap().path.to_str(), Some("/w/b.txt"));

        let deleted = Event::new(EventKind::Deleted, id, old_index, Index::empty());
        assert_eq!(deleted.node().unwrap().path.to_str(), Some("/w/a.txt"));
        assert!(deleted.new_node().is_none());
    }

    #[test]
    fn test_kind_display_matches_serde() {
        for kind in EventKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.to_string());
        }
    }
}
