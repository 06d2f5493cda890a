/// Content-type resolver.
///
/// The server references pinned entities generically, by (content type id,
/// object id). Content type ids are opaque, so the client learns them from
/// fetched board items: every item whose summary names its kind teaches the
/// mapping kind -> content type id. Entries are never evicted, so a kind seen
/// once stays pinnable after all of its items are unpinned.
use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::{BoardGraph, ContentTypeId, EntityKind};

#[derive(Debug, Default)]
pub struct ContentTypeResolver {
    known: RwLock<HashMap<EntityKind, ContentTypeId>>,
}

impl ContentTypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `kind` is stored under `content_type_id`.
    /// Returns true if the mapping was not known before.
    pub fn observe(&self, kind: EntityKind, content_type_id: ContentTypeId) -> bool {
        let mut known = self.known.write().unwrap_or_else(|e| e.into_inner());
        match known.insert(kind.clone(), content_type_id) {
            None => {
                log::debug!(
                    target: "caseboard.content_types",
                    "Learned content type {} for kind '{}'",
                    content_type_id,
                    kind
                );
                true
            }
            Some(previous) if previous != content_type_id => {
                log::warn!(
                    target: "caseboard.content_types",
                    "Content type for kind '{}' changed from {} to {}",
                    kind,
                    previous,
                    content_type_id
                );
                false
            }
            Some(_) => false,
        }
    }

    /// Learn from every summarized item of a fetched graph.
    /// Returns the number of newly learned kinds.
    pub fn observe_graph(&self, graph: &BoardGraph) -> usize {
        let mut learned = 0;
        for item in &graph.items {
            let Some(summary) = item.content_object_summary.as_ref() else {
                continue;
            };
            let content_type_id = summary.content_type_id.unwrap_or(item.content_type);
            if self.observe(summary.kind.clone(), content_type_id) {
                learned += 1;
            }
        }
        learned
    }

    pub fn resolve(&self, kind: &EntityKind) -> Option<ContentTypeId> {
        self.known
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(kind)
            .copied()
    }

    /// Reverse lookup, used to label candidates that only carry a content type id.
    pub fn kind_of(&self, content_type_id: ContentTypeId) -> Option<EntityKind> {
        self.known
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(_, id)| **id == content_type_id)
            .map(|(kind, _)| kind.clone())
    }

    pub fn known_kinds(&self) -> Vec<EntityKind> {
        let mut kinds: Vec<EntityKind> = self
            .known
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        kinds.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        kinds
    }

    pub fn len(&self) -> usize {
        self.known.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoardItem, ContentObjectSummary};

    fn item(id: u64, content_type: u64, kind: Option<&str>) -> BoardItem {
        BoardItem {
            id,
            content_type,
            object_id: id * 10,
            content_object_summary: kind.map(|k| ContentObjectSummary {
                kind: EntityKind::from_model_name(k),
                label: String::new(),
                content_type_id: None,
            }),
            position_x: 0.0,
            position_y: 0.0,
        }
    }

    #[test]
    fn test_observe_graph_learns_summarized_kinds() {
        let resolver = ContentTypeResolver::new();
        let graph = BoardGraph {
            id: 1,
            case: 1,
            items: vec![
                item(1, 12, Some("suspect")),
                item(2, 12, Some("suspect")),
                item(3, 20, Some("biologicalevidence")),
                item(4, 31, None),
            ],
            connections: vec![],
            notes: vec![],
        };
        assert_eq!(resolver.observe_graph(&graph), 2);
        assert_eq!(resolver.resolve(&EntityKind::Suspect), Some(12));
        assert_eq!(resolver.resolve(&EntityKind::Evidence), Some(20));
        assert_eq!(resolver.resolve(&EntityKind::Case), None);
        assert_eq!(resolver.kind_of(20), Some(EntityKind::Evidence));
        assert_eq!(resolver.kind_of(31), None);
    }

    #[test]
    fn test_entries_survive_graphs_without_that_kind() {
        let resolver = ContentTypeResolver::new();
        resolver.observe(EntityKind::Case, 4);
        let empty = BoardGraph {
            id: 1,
            case: 1,
            items: vec![],
            connections: vec![],
            notes: vec![],
        };
        assert_eq!(resolver.observe_graph(&empty), 0);
        assert_eq!(resolver.resolve(&EntityKind::Case), Some(4));
        assert_eq!(resolver.known_kinds(), vec![EntityKind::Case]);
    }

    #[test]
    fn test_summary_content_type_overrides_item_field() {
        let resolver = ContentTypeResolver::new();
        let mut pinned = item(1, 12, Some("note"));
        if let Some(summary) = pinned.content_object_summary.as_mut() {
            summary.content_type_id = Some(40);
        }
        let graph = BoardGraph {
            id: 1,
            case: 1,
            items: vec![pinned],
            connections: vec![],
            notes: vec![],
        };
        resolver.observe_graph(&graph);
        assert_eq!(resolver.resolve(&EntityKind::Note), Some(40));
    }
}
