//! In-memory board server for tests.
//!
//! Records every call, can fail selected operations, and can hold requests
//! in flight behind a semaphore gate so tests can observe intermediate state.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{ApiError, BoardApi};
use crate::types::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListBoards,
    CreateBoard(CaseId),
    FetchBoard(BoardId),
    CreateItem(BoardId, CreateItemRequest),
    DeleteItem(BoardId, ItemId),
    UpdatePositions(BoardId, Vec<ItemCoordinates>),
    CreateConnection(BoardId, CreateConnectionRequest),
    DeleteConnection(BoardId, ConnectionId),
    CreateNote(BoardId, NoteDraft),
    UpdateNote(BoardId, NoteId, NoteDraft),
    DeleteNote(BoardId, NoteId),
}

impl Call {
    pub fn op(&self) -> &'static str {
        match self {
            Call::ListBoards => "list_boards",
            Call::CreateBoard(_) => "create_board",
            Call::FetchBoard(_) => "fetch_board",
            Call::CreateItem(..) => "create_item",
            Call::DeleteItem(..) => "delete_item",
            Call::UpdatePositions(..) => "update_positions",
            Call::CreateConnection(..) => "create_connection",
            Call::DeleteConnection(..) => "delete_connection",
            Call::CreateNote(..) => "create_note",
            Call::UpdateNote(..) => "update_note",
            Call::DeleteNote(..) => "delete_note",
        }
    }
}

#[derive(Default)]
struct MockState {
    boards: Vec<Board>,
    graphs: HashMap<BoardId, BoardGraph>,
    kinds: HashMap<ContentTypeId, EntityKind>,
    next_id: u64,
    calls: Vec<Call>,
    failing: HashSet<&'static str>,
    created: HashSet<BoardId>,
    /// Number of upcoming `list_boards` calls that omit boards created
    /// through the API; `usize::MAX` keeps them hidden until reset.
    lagging_lists: usize,
    /// Delay between the server applying a request and its reply arriving.
    latency: HashMap<&'static str, Duration>,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn graph_mut(&mut self, board_id: BoardId) -> Result<&mut BoardGraph, ApiError> {
        self.graphs
            .get_mut(&board_id)
            .ok_or_else(|| ApiError::NotFound(format!("board {}", board_id)))
    }
}

#[derive(Default)]
pub struct MockBoardApi {
    state: Mutex<MockState>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MockBoardApi {
    pub fn new() -> Self {
        let api = Self::default();
        api.state.lock().unwrap().next_id = 1000;
        api
    }

    pub fn add_board(&self, board_id: BoardId, case_id: CaseId) {
        let mut state = self.state.lock().unwrap();
        state.boards.push(Board {
            id: board_id,
            case: case_id,
            investigator: None,
            created_at: None,
        });
        state.graphs.insert(
            board_id,
            BoardGraph {
                id: board_id,
                case: case_id,
                items: vec![],
                connections: vec![],
                notes: vec![],
            },
        );
    }

    pub fn register_kind(&self, content_type_id: ContentTypeId, kind: EntityKind) {
        self.state.lock().unwrap().kinds.insert(content_type_id, kind);
    }

    pub fn add_item(
        &self,
        board_id: BoardId,
        item_id: ItemId,
        content_type_id: ContentTypeId,
        object_id: ObjectId,
        position: Position,
    ) {
        let mut state = self.state.lock().unwrap();
        let item = build_item(&state.kinds, item_id, content_type_id, object_id, position);
        state.graphs.get_mut(&board_id).unwrap().items.push(item);
    }

    pub fn add_connection(&self, board_id: BoardId, id: ConnectionId, from: ItemId, to: ItemId) {
        let mut state = self.state.lock().unwrap();
        state
            .graphs
            .get_mut(&board_id)
            .unwrap()
            .connections
            .push(BoardConnection {
                id,
                from_item: from,
                to_item: to,
                label: String::new(),
            });
    }

    pub fn graph(&self, board_id: BoardId) -> BoardGraph {
        self.state.lock().unwrap().graphs[&board_id].clone()
    }

    pub fn set_list_lag(&self, lags: bool) {
        self.state.lock().unwrap().lagging_lists = if lags { usize::MAX } else { 0 };
    }

    pub fn lag_next_lists(&self, calls: usize) {
        self.state.lock().unwrap().lagging_lists = calls;
    }

    pub fn fail(&self, op: &'static str) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.state.lock().unwrap().failing.remove(op);
    }

    pub fn set_latency(&self, op: &'static str, latency: Duration) {
        self.state.lock().unwrap().latency.insert(op, latency);
    }

    /// Hold every subsequent request until permits are added to the returned gate.
    pub fn hold(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.add_permits(1024);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.op() == op)
            .count()
    }

    pub fn position_updates(&self) -> Vec<Vec<ItemCoordinates>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::UpdatePositions(_, items) => Some(items),
                _ => None,
            })
            .collect()
    }

    /// Record the call, wait for the gate, then report an injected failure if any.
    async fn enter(&self, call: Call) -> Result<(), ApiError> {
        let op = call.op();
        self.state.lock().unwrap().calls.push(call);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if self.state.lock().unwrap().failing.contains(op) {
            return Err(ApiError::Network(format!("injected failure in {}", op)));
        }
        Ok(())
    }

    /// Wait out the configured reply latency of `op`.
    async fn reply(&self, op: &'static str) {
        let latency = self.state.lock().unwrap().latency.get(op).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn build_item(
    kinds: &HashMap<ContentTypeId, EntityKind>,
    item_id: ItemId,
    content_type_id: ContentTypeId,
    object_id: ObjectId,
    position: Position,
) -> BoardItem {
    BoardItem {
        id: item_id,
        content_type: content_type_id,
        object_id,
        content_object_summary: kinds.get(&content_type_id).map(|kind| ContentObjectSummary {
            kind: kind.clone(),
            label: format!("{} {}", kind, object_id),
            content_type_id: None,
        }),
        position_x: position.x,
        position_y: position.y,
    }
}

#[async_trait]
impl BoardApi for MockBoardApi {
    async fn list_boards(&self) -> Result<Vec<Board>, ApiError> {
        self.enter(Call::ListBoards).await?;
        let mut state = self.state.lock().unwrap();
        let lagging = state.lagging_lists > 0;
        if lagging && state.lagging_lists != usize::MAX {
            state.lagging_lists -= 1;
        }
        Ok(state
            .boards
            .iter()
            .filter(|b| !lagging || !state.created.contains(&b.id))
            .cloned()
            .collect())
    }

    async fn create_board(&self, case_id: CaseId) -> Result<Board, ApiError> {
        self.enter(Call::CreateBoard(case_id)).await?;
        let mut state = self.state.lock().unwrap();
        if state.boards.iter().any(|b| b.case == case_id) {
            return Err(ApiError::Conflict(format!("board for case {} exists", case_id)));
        }
        let board = Board {
            id: state.next_id(),
            case: case_id,
            investigator: None,
            created_at: None,
        };
        state.boards.push(board.clone());
        state.created.insert(board.id);
        state.graphs.insert(
            board.id,
            BoardGraph {
                id: board.id,
                case: case_id,
                items: vec![],
                connections: vec![],
                notes: vec![],
            },
        );
        Ok(board)
    }

    async fn fetch_board(&self, board_id: BoardId) -> Result<BoardGraph, ApiError> {
        self.enter(Call::FetchBoard(board_id)).await?;
        let graph = self.state.lock().unwrap().graph_mut(board_id)?.clone();
        self.reply("fetch_board").await;
        Ok(graph)
    }

    async fn create_item(
        &self,
        board_id: BoardId,
        request: &CreateItemRequest,
    ) -> Result<BoardItem, ApiError> {
        self.enter(Call::CreateItem(board_id, request.clone())).await?;
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let item = build_item(
            &state.kinds,
            id,
            request.content_object.content_type_id,
            request.content_object.object_id,
            Position::new(
                request.position_x.unwrap_or(0.0),
                request.position_y.unwrap_or(0.0),
            ),
        );
        state.graph_mut(board_id)?.items.push(item.clone());
        Ok(item)
    }

    async fn delete_item(&self, board_id: BoardId, item_id: ItemId) -> Result<(), ApiError> {
        self.enter(Call::DeleteItem(board_id, item_id)).await?;
        let mut state = self.state.lock().unwrap();
        let graph = state.graph_mut(board_id)?;
        graph.items.retain(|i| i.id != item_id);
        graph.connections.retain(|c| !c.touches(item_id));
        Ok(())
    }

    async fn update_positions(
        &self,
        board_id: BoardId,
        items: &[ItemCoordinates],
    ) -> Result<Vec<ItemCoordinates>, ApiError> {
        self.enter(Call::UpdatePositions(board_id, items.to_vec())).await?;
        {
            let mut state = self.state.lock().unwrap();
            let graph = state.graph_mut(board_id)?;
            for coords in items {
                if let Some(item) = graph.items.iter_mut().find(|i| i.id == coords.id) {
                    item.position_x = coords.position_x;
                    item.position_y = coords.position_y;
                }
            }
        }
        self.reply("update_positions").await;
        Ok(items.to_vec())
    }

    async fn create_connection(
        &self,
        board_id: BoardId,
        request: &CreateConnectionRequest,
    ) -> Result<BoardConnection, ApiError> {
        self.enter(Call::CreateConnection(board_id, request.clone())).await?;
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let connection = BoardConnection {
            id,
            from_item: request.from_item,
            to_item: request.to_item,
            label: request.label.clone().unwrap_or_default(),
        };
        state.graph_mut(board_id)?.connections.push(connection.clone());
        Ok(connection)
    }

    async fn delete_connection(
        &self,
        board_id: BoardId,
        connection_id: ConnectionId,
    ) -> Result<(), ApiError> {
        self.enter(Call::DeleteConnection(board_id, connection_id)).await?;
        let mut state = self.state.lock().unwrap();
        state
            .graph_mut(board_id)?
            .connections
            .retain(|c| c.id != connection_id);
        Ok(())
    }

    async fn create_note(&self, board_id: BoardId, note: &NoteDraft) -> Result<BoardNote, ApiError> {
        self.enter(Call::CreateNote(board_id, note.clone())).await?;
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let created = BoardNote {
            id,
            title: note.title.clone(),
            content: note.content.clone(),
            created_by: None,
            created_at: None,
            updated_at: None,
        };
        state.graph_mut(board_id)?.notes.push(created.clone());
        Ok(created)
    }

    async fn update_note(
        &self,
        board_id: BoardId,
        note_id: NoteId,
        note: &NoteDraft,
    ) -> Result<BoardNote, ApiError> {
        self.enter(Call::UpdateNote(board_id, note_id, note.clone())).await?;
        let mut state = self.state.lock().unwrap();
        let existing = state
            .graph_mut(board_id)?
            .notes
            .iter_mut()
            .find(|n| n.id == note_id)
            .ok_or_else(|| ApiError::NotFound(format!("note {}", note_id)))?;
        existing.title = note.title.clone();
        existing.content = note.content.clone();
        Ok(existing.clone())
    }

    async fn delete_note(&self, board_id: BoardId, note_id: NoteId) -> Result<(), ApiError> {
        self.enter(Call::DeleteNote(board_id, note_id)).await?;
        let mut state = self.state.lock().unwrap();
        state.graph_mut(board_id)?.notes.retain(|n| n.id != note_id);
        Ok(())
    }
}
