/// Structural mutations of one board: pin/unpin, link/unlink, note CRUD.
///
/// Connection creation is optimistic: a temporary edge tagged with a local
/// UUID is visible right away and swapped for the server connection on
/// success, or removed on failure. Everything else is "fire, then
/// invalidate": nothing changes locally until the re-fetched graph arrives.
///
/// Every completed mutation, successful or not for optimistic ones,
/// invalidates the board's graph store entry. Position overlay state is
/// never touched here.
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use uuid::Uuid;

use crate::api::{ApiError, BoardApi};
use crate::content_types::ContentTypeResolver;
use crate::error::BoardError;
use crate::pin::PinTarget;
use crate::store::GraphStore;
use crate::types::*;

/// Identity of a rendered edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EdgeKey {
    Server(ConnectionId),
    Pending(Uuid),
}

/// An edge known locally but not (yet) part of a fetched graph.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalEdge {
    pub key: EdgeKey,
    pub from_item: ItemId,
    pub to_item: ItemId,
    pub label: String,
}

impl LocalEdge {
    pub fn touches(&self, item_id: ItemId) -> bool {
        self.from_item == item_id || self.to_item == item_id
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.key, EdgeKey::Pending(_))
    }
}

/// Local edits the renderer applies on top of the fetched graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalEdits {
    pub edges: Vec<LocalEdge>,
    pub removed_items: HashSet<ItemId>,
    pub removed_connections: HashSet<ConnectionId>,
}

#[derive(Default)]
struct LocalState {
    edits: LocalEdits,
    closed: bool,
}

pub struct MutationDispatcher {
    board_id: BoardId,
    api: Arc<dyn BoardApi>,
    store: Arc<GraphStore>,
    resolver: Arc<ContentTypeResolver>,
    default_position: Position,
    local: Mutex<LocalState>,
}

impl MutationDispatcher {
    pub fn new(
        board_id: BoardId,
        api: Arc<dyn BoardApi>,
        store: Arc<GraphStore>,
        resolver: Arc<ContentTypeResolver>,
        default_position: Position,
    ) -> Self {
        Self {
            board_id,
            api,
            store,
            resolver,
            default_position,
            local: Mutex::new(LocalState::default()),
        }
    }

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    /// Pin an entity. Unknown kinds fail before any request is sent.
    pub async fn pin(&self, target: &PinTarget) -> Result<BoardItem, BoardError> {
        let request = target.to_request(&self.resolver, self.default_position)?;
        let item = self
            .api
            .create_item(self.board_id, &request)
            .await
            .map_err(|source| self.failed("pin item", source))?;

        self.resolver
            .observe(target.kind.clone(), request.content_object.content_type_id);
        log::info!(
            target: "caseboard.dispatcher",
            "Pinned {} {} as item {} on board {}",
            target.kind,
            target.object_id,
            item.id,
            self.board_id
        );
        self.store.invalidate(self.board_id);
        Ok(item)
    }

    /// Remove an item from the board. The server drops its connections;
    /// locally held edges touching it are dropped here.
    pub async fn unpin(&self, item_id: ItemId) -> Result<(), BoardError> {
        self.api
            .delete_item(self.board_id, item_id)
            .await
            .map_err(|source| self.failed("unpin item", source))?;

        {
            let mut local = self.lock_local();
            if !local.closed {
                local.edits.removed_items.insert(item_id);
                local.edits.edges.retain(|e| !e.touches(item_id));
            }
        }
        log::info!(
            target: "caseboard.dispatcher",
            "Unpinned item {} from board {}",
            item_id,
            self.board_id
        );
        self.store.invalidate(self.board_id);
        Ok(())
    }

    /// Optimistically create a connection.
    pub async fn create_connection(
        &self,
        from_item: ItemId,
        to_item: ItemId,
        label: Option<String>,
    ) -> Result<BoardConnection, BoardError> {
        if from_item == to_item {
            return Err(BoardError::SelfLoop(from_item));
        }
        self.ensure_on_board(from_item)?;
        self.ensure_on_board(to_item)?;

        let key = EdgeKey::Pending(Uuid::new_v4());
        {
            let mut local = self.lock_local();
            if local.closed {
                return Err(BoardError::SessionClosed(self.board_id));
            }
            local.edits.edges.push(LocalEdge {
                key,
                from_item,
                to_item,
                label: label.clone().unwrap_or_default(),
            });
        }

        let request = CreateConnectionRequest {
            from_item,
            to_item,
            label,
        };
        let result = self.api.create_connection(self.board_id, &request).await;

        {
            let mut local = self.lock_local();
            match &result {
                Ok(connection) => {
                    if let Some(edge) = local.edits.edges.iter_mut().find(|e| e.key == key) {
                        edge.key = EdgeKey::Server(connection.id);
                        edge.label = connection.label.clone();
                    }
                }
                Err(_) => local.edits.edges.retain(|e| e.key != key),
            }
        }
        // On failure this forces a full re-fetch so the canvas converges.
        self.store.invalidate(self.board_id);

        let connection = result.map_err(|source| self.failed("create connection", source))?;
        log::info!(
            target: "caseboard.dispatcher",
            "Connected item {} -> {} as connection {} on board {}",
            from_item,
            to_item,
            connection.id,
            self.board_id
        );
        Ok(connection)
    }

    pub async fn delete_connection(&self, connection_id: ConnectionId) -> Result<(), BoardError> {
        self.api
            .delete_connection(self.board_id, connection_id)
            .await
            .map_err(|source| self.failed("delete connection", source))?;

        {
            let mut local = self.lock_local();
            if !local.closed {
                local.edits.removed_connections.insert(connection_id);
                local
                    .edits
                    .edges
                    .retain(|e| e.key != EdgeKey::Server(connection_id));
            }
        }
        self.store.invalidate(self.board_id);
        Ok(())
    }

    pub async fn create_note(&self, note: &NoteDraft) -> Result<BoardNote, BoardError> {
        let created = self
            .api
            .create_note(self.board_id, note)
            .await
            .map_err(|source| self.failed("create note", source))?;
        self.store.invalidate(self.board_id);
        Ok(created)
    }

    /// Create a note and pin it in one go. An unknown note content type
    /// fails before the note is created; a failed pin leaves the note
    /// unpinned.
    pub async fn create_pinned_note(
        &self,
        note: &NoteDraft,
        position: Option<Position>,
    ) -> Result<(BoardNote, BoardItem), BoardError> {
        if self.resolver.resolve(&EntityKind::Note).is_none() {
            return Err(BoardError::UnknownKind(EntityKind::Note));
        }
        let created = self.create_note(note).await?;
        let item = self.pin_note(created.id, position).await?;
        Ok((created, item))
    }

    pub async fn pin_note(
        &self,
        note_id: NoteId,
        position: Option<Position>,
    ) -> Result<BoardItem, BoardError> {
        let mut target = PinTarget::new(EntityKind::Note, note_id);
        target.position = position;
        self.pin(&target).await
    }

    pub async fn update_note(
        &self,
        note_id: NoteId,
        note: &NoteDraft,
    ) -> Result<BoardNote, BoardError> {
        let updated = self
            .api
            .update_note(self.board_id, note_id, note)
            .await
            .map_err(|source| self.failed("update note", source))?;
        self.store.invalidate(self.board_id);
        Ok(updated)
    }

    pub async fn delete_note(&self, note_id: NoteId) -> Result<(), BoardError> {
        self.api
            .delete_note(self.board_id, note_id)
            .await
            .map_err(|source| self.failed("delete note", source))?;
        self.store.invalidate(self.board_id);
        Ok(())
    }

    pub fn local_edits(&self) -> LocalEdits {
        self.lock_local().edits.clone()
    }

    /// Forget local edits that a fetched graph already reflects.
    pub fn reconcile(&self, graph: &BoardGraph) {
        let server_ids: HashSet<ConnectionId> = graph.connections.iter().map(|c| c.id).collect();
        let mut local = self.lock_local();
        local.edits.edges.retain(|e| match e.key {
            EdgeKey::Server(id) => !server_ids.contains(&id),
            EdgeKey::Pending(_) => true,
        });
        local.edits.removed_items.retain(|id| graph.has_item(*id));
        local
            .edits
            .removed_connections
            .retain(|id| server_ids.contains(id));
    }

    /// Stop applying results of requests still in flight.
    pub fn close(&self) {
        let mut local = self.lock_local();
        local.closed = true;
        local.edits = LocalEdits::default();
    }

    /// Endpoints must belong to this board. Only checked against a cached
    /// graph; an item pinned since the last fetch is not known yet.
    fn ensure_on_board(&self, item_id: ItemId) -> Result<(), BoardError> {
        let removed = self.lock_local().edits.removed_items.contains(&item_id);
        let missing = self
            .store
            .peek(self.board_id)
            .is_some_and(|graph| !graph.has_item(item_id));
        if removed || missing {
            return Err(BoardError::ForeignItem {
                board_id: self.board_id,
                item_id,
            });
        }
        Ok(())
    }

    fn failed(&self, op: &'static str, source: ApiError) -> BoardError {
        log::warn!(
            target: "caseboard.dispatcher",
            "{} on board {} failed: {}",
            op,
            self.board_id,
            source
        );
        BoardError::Mutation {
            op,
            board_id: self.board_id,
            source,
        }
    }

    fn lock_local(&self) -> MutexGuard<'_, LocalState> {
        self.local.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{Call, MockBoardApi};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct Fixture {
        api: Arc<MockBoardApi>,
        store: Arc<GraphStore>,
        resolver: Arc<ContentTypeResolver>,
        dispatcher: MutationDispatcher,
    }

    async fn fixture() -> Fixture {
        let api = Arc::new(MockBoardApi::new());
        api.add_board(7, 70);
        api.register_kind(12, EntityKind::Suspect);
        api.register_kind(40, EntityKind::Note);
        api.add_item(7, 41, 12, 1, Position::new(0.0, 0.0));
        api.add_item(7, 42, 12, 2, Position::new(10.0, 0.0));
        api.add_item(7, 43, 12, 3, Position::new(20.0, 0.0));
        api.add_connection(7, 501, 41, 42);
        api.add_connection(7, 502, 42, 43);
        api.add_connection(7, 503, 41, 43);

        let resolver = Arc::new(ContentTypeResolver::new());
        let store = Arc::new(GraphStore::new(
            api.clone(),
            resolver.clone(),
            Duration::from_secs(30),
        ));
        store.get(7).await.unwrap();
        let dispatcher = MutationDispatcher::new(
            7,
            api.clone(),
            store.clone(),
            resolver.clone(),
            Position::new(100.0, 100.0),
        );
        Fixture {
            api,
            store,
            resolver,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn test_optimistic_edge_visible_then_replaced() {
        let f = fixture().await;
        f.api.hold();

        let observe = async {
            tokio::task::yield_now().await;
            let edits = f.dispatcher.local_edits();
            assert_eq!(edits.edges.len(), 1);
            assert!(edits.edges[0].is_pending());
            assert_eq!((edits.edges[0].from_item, edits.edges[0].to_item), (43, 41));
            f.api.release();
        };
        let (created, _) = tokio::join!(
            f.dispatcher.create_connection(43, 41, Some("met".to_string())),
            observe
        );
        let created = created.unwrap();

        let edits = f.dispatcher.local_edits();
        assert_eq!(edits.edges.len(), 1);
        assert_eq!(edits.edges[0].key, EdgeKey::Server(created.id));
        assert_eq!(edits.edges[0].label, "met");
        assert!(!f.store.is_cached(7));

        let graph = f.store.get(7).await.unwrap();
        f.dispatcher.reconcile(&graph);
        assert!(f.dispatcher.local_edits().edges.is_empty());
    }

    #[tokio::test]
    async fn test_failed_connection_rolls_back_and_refetches() {
        let f = fixture().await;
        f.api.fail("create_connection");

        let err = f.dispatcher.create_connection(43, 41, None).await.unwrap_err();
        assert!(matches!(
            err,
            BoardError::Mutation { op: "create connection", board_id: 7, .. }
        ));
        assert!(f.dispatcher.local_edits().edges.is_empty());
        assert!(!f.store.is_cached(7));
        f.store.get(7).await.unwrap();
        assert_eq!(f.api.count("fetch_board"), 2);
    }

    #[tokio::test]
    async fn test_connection_endpoints_must_be_on_board() {
        let f = fixture().await;
        assert!(matches!(
            f.dispatcher.create_connection(41, 41, None).await,
            Err(BoardError::SelfLoop(41))
        ));
        assert!(matches!(
            f.dispatcher.create_connection(41, 999, None).await,
            Err(BoardError::ForeignItem { board_id: 7, item_id: 999 })
        ));
        assert_eq!(f.api.count("create_connection"), 0);
    }

    #[tokio::test]
    async fn test_unpin_drops_local_edges_without_deleting_connections() {
        let f = fixture().await;
        f.dispatcher.create_connection(43, 42, None).await.unwrap();
        f.dispatcher.create_connection(43, 41, None).await.unwrap();

        f.dispatcher.unpin(42).await.unwrap();

        let edits = f.dispatcher.local_edits();
        assert_eq!(edits.edges.len(), 1);
        assert_eq!((edits.edges[0].from_item, edits.edges[0].to_item), (43, 41));
        assert!(edits.removed_items.contains(&42));
        assert_eq!(f.api.count("delete_connection"), 0);
        assert_eq!(f.api.count("delete_item"), 1);
    }

    #[tokio::test]
    async fn test_pin_after_unpin_reuses_cached_content_type() {
        let f = fixture().await;
        f.dispatcher.unpin(41).await.unwrap();
        let before = f.api.calls().len();

        let item = f
            .dispatcher
            .pin(&PinTarget::new(EntityKind::Suspect, 9))
            .await
            .unwrap();

        let calls = f.api.calls();
        assert_eq!(calls.len(), before + 1);
        assert_eq!(
            calls.last().unwrap(),
            &Call::CreateItem(
                7,
                CreateItemRequest {
                    content_object: ContentRef { content_type_id: 12, object_id: 9 },
                    position_x: Some(100.0),
                    position_y: Some(100.0),
                }
            )
        );
        assert_eq!(item.kind(), Some(&EntityKind::Suspect));
    }

    #[tokio::test]
    async fn test_pin_unknown_kind_sends_nothing() {
        let f = fixture().await;
        let before = f.api.calls().len();
        let err = f
            .dispatcher
            .pin(&PinTarget::new(EntityKind::Witness, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::UnknownKind(EntityKind::Witness)));
        assert_eq!(f.api.calls().len(), before);
        assert!(f.store.is_cached(7));
    }

    #[tokio::test]
    async fn test_explicit_content_type_is_remembered() {
        let f = fixture().await;
        f.dispatcher
            .pin(&PinTarget::new(EntityKind::Witness, 3).with_content_type(33))
            .await
            .unwrap();
        assert_eq!(f.resolver.resolve(&EntityKind::Witness), Some(33));
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_cache_alone() {
        let f = fixture().await;
        f.api.fail("delete_item");
        assert!(f.dispatcher.unpin(41).await.is_err());
        assert!(f.store.is_cached(7));
        assert!(f.dispatcher.local_edits().removed_items.is_empty());
    }

    #[tokio::test]
    async fn test_note_lifecycle() {
        let f = fixture().await;
        let draft = NoteDraft {
            title: "Lead".to_string(),
            content: "check the alibi".to_string(),
        };
        let err = f
            .dispatcher
            .create_pinned_note(&draft, Some(Position::new(5.0, 6.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::UnknownKind(EntityKind::Note)));
        assert_eq!(f.api.count("create_note"), 0);
        assert!(f.api.graph(7).notes.is_empty());

        let note = f.dispatcher.create_note(&draft).await.unwrap();
        assert_eq!(note.title, "Lead");
        f.resolver.observe(EntityKind::Note, 40);
        let item = f
            .dispatcher
            .pin_note(note.id, Some(Position::new(5.0, 6.0)))
            .await
            .unwrap();
        assert_eq!(item.object_id, note.id);
        assert_eq!(item.position(), Position::new(5.0, 6.0));

        let (other, other_item) = f
            .dispatcher
            .create_pinned_note(&draft, None)
            .await
            .unwrap();
        assert_eq!(other_item.object_id, other.id);
        assert_eq!(f.api.count("create_note"), 2);
        f.dispatcher.delete_note(other.id).await.unwrap();

        let updated = f
            .dispatcher
            .update_note(
                note.id,
                &NoteDraft {
                    title: "Lead".to_string(),
                    content: "alibi holds".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.content, "alibi holds");

        f.dispatcher.delete_note(note.id).await.unwrap();
        assert!(f.store.get(7).await.unwrap().notes.is_empty());
    }
}
