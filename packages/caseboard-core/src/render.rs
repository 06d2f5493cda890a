/// Render model: what a canvas draws for one board.
///
/// Composed from the fetched graph, the position overlay and the
/// dispatcher's local edits. Nodes are committed first; an edge is only
/// emitted when both of its endpoints are among the committed nodes.
use std::collections::HashSet;

use serde::Serialize;

use crate::dispatcher::{EdgeKey, LocalEdits};
use crate::overlay::PositionOverlay;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindStyle {
    pub icon: &'static str,
    pub title: &'static str,
    pub color: &'static str,
}

const FALLBACK_STYLE: KindStyle = KindStyle {
    icon: "help-circle",
    title: "Item",
    color: "#7f8c8d",
};

/// Display table per entity kind. Unknown and unsummarized items share the fallback.
pub fn kind_style(kind: Option<&EntityKind>) -> KindStyle {
    match kind {
        Some(EntityKind::Case) => KindStyle {
            icon: "folder",
            title: "Case",
            color: "#3b6fd8",
        },
        Some(EntityKind::Suspect) => KindStyle {
            icon: "user-x",
            title: "Suspect",
            color: "#c0392b",
        },
        Some(EntityKind::Evidence) => KindStyle {
            icon: "archive",
            title: "Evidence",
            color: "#8e6c1f",
        },
        Some(EntityKind::Witness) => KindStyle {
            icon: "eye",
            title: "Witness",
            color: "#16a085",
        },
        Some(EntityKind::Note) => KindStyle {
            icon: "sticky-note",
            title: "Note",
            color: "#d4ac0d",
        },
        Some(EntityKind::Other(_)) | None => FALLBACK_STYLE,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedNode {
    pub item_id: ItemId,
    pub kind: Option<EntityKind>,
    pub label: String,
    pub position: Position,
    /// Position comes from the overlay and is not confirmed yet.
    pub unsaved: bool,
    pub style: KindStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedEdge {
    pub key: EdgeKey,
    pub from_item: ItemId,
    pub to_item: ItemId,
    pub label: String,
    pub optimistic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedBoard {
    pub board_id: BoardId,
    pub case_id: CaseId,
    pub nodes: Vec<RenderedNode>,
    pub edges: Vec<RenderedEdge>,
    pub notes: Vec<BoardNote>,
}

impl RenderedBoard {
    pub fn compose(graph: &BoardGraph, overlay: &PositionOverlay, edits: &LocalEdits) -> Self {
        let nodes: Vec<RenderedNode> = graph
            .items
            .iter()
            .filter(|item| !edits.removed_items.contains(&item.id))
            .map(|item| RenderedNode {
                item_id: item.id,
                kind: item.kind().cloned(),
                label: item.label(),
                position: overlay.resolve(item),
                unsaved: overlay.contains(item.id),
                style: kind_style(item.kind()),
            })
            .collect();

        let committed: HashSet<ItemId> = nodes.iter().map(|n| n.item_id).collect();
        let server_ids: HashSet<ConnectionId> = graph.connections.iter().map(|c| c.id).collect();

        let server_edges = graph
            .connections
            .iter()
            .filter(|c| !edits.removed_connections.contains(&c.id))
            .map(|c| RenderedEdge {
                key: EdgeKey::Server(c.id),
                from_item: c.from_item,
                to_item: c.to_item,
                label: c.label.clone(),
                optimistic: false,
            });
        let local_edges = edits
            .edges
            .iter()
            .filter(|e| match e.key {
                EdgeKey::Server(id) => !server_ids.contains(&id),
                EdgeKey::Pending(_) => true,
            })
            .map(|e| RenderedEdge {
                key: e.key,
                from_item: e.from_item,
                to_item: e.to_item,
                label: e.label.clone(),
                optimistic: e.is_pending(),
            });

        let edges = server_edges
            .chain(local_edges)
            .filter(|e| committed.contains(&e.from_item) && committed.contains(&e.to_item))
            .collect();

        Self {
            board_id: graph.id,
            case_id: graph.case,
            nodes,
            edges,
            notes: graph.notes.clone(),
        }
    }

    pub fn node(&self, item_id: ItemId) -> Option<&RenderedNode> {
        self.nodes.iter().find(|n| n.item_id == item_id)
    }

    pub fn edges_of(&self, item_id: ItemId) -> impl Iterator<Item = &RenderedEdge> {
        self.edges
            .iter()
            .filter(move |e| e.from_item == item_id || e.to_item == item_id)
    }

    /// Top-left and bottom-right node anchor positions.
    pub fn bounds(&self) -> Option<(Position, Position)> {
        let first = self.nodes.first()?.position;
        Some(self.nodes.iter().fold((first, first), |(min, max), node| {
            (
                Position::new(min.x.min(node.position.x), min.y.min(node.position.y)),
                Position::new(max.x.max(node.position.x), max.y.max(node.position.y)),
            )
        }))
    }
}
