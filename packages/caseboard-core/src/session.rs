/// One open canvas on one board.
///
/// Ties the shared graph store to the per-canvas state: the position
/// overlay and its debounced persister, the mutation dispatcher's local
/// edits, and the connection draft. Closing the session discards unsent
/// positions and any draft; mutations after close are refused.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;

use crate::api::BoardApi;
use crate::config::SyncSettings;
use crate::content_types::ContentTypeResolver;
use crate::dispatcher::MutationDispatcher;
use crate::draft::{ConnectionDraft, DraftOutcome};
use crate::error::BoardError;
use crate::export;
use crate::persister::{DebouncedPersister, FlushStatus};
use crate::pin::{exclude_pinned, PinCandidate, PinTarget};
use crate::render::RenderedBoard;
use crate::store::GraphStore;
use crate::types::*;

/// What was thrown away when a session closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CloseReport {
    pub board_id: BoardId,
    pub discarded_positions: usize,
    pub discarded_draft: bool,
}

pub struct BoardSession {
    board_id: BoardId,
    store: Arc<GraphStore>,
    resolver: Arc<ContentTypeResolver>,
    persister: DebouncedPersister,
    dispatcher: MutationDispatcher,
    draft: Mutex<ConnectionDraft>,
    closed: AtomicBool,
}

impl BoardSession {
    pub fn new(
        board_id: BoardId,
        api: Arc<dyn BoardApi>,
        store: Arc<GraphStore>,
        resolver: Arc<ContentTypeResolver>,
        settings: &SyncSettings,
    ) -> Self {
        let persister =
            DebouncedPersister::new(board_id, api.clone(), store.clone(), settings.debounce());
        let dispatcher = MutationDispatcher::new(
            board_id,
            api,
            store.clone(),
            resolver.clone(),
            settings.default_pin_position(),
        );
        Self {
            board_id,
            store,
            resolver,
            persister,
            dispatcher,
            draft: Mutex::new(ConnectionDraft::Idle),
            closed: AtomicBool::new(false),
        }
    }

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    /// Authoritative graph, from cache when fresh.
    pub async fn graph(&self) -> Result<Arc<BoardGraph>, BoardError> {
        self.store.get(self.board_id).await
    }

    /// What the canvas should draw right now.
    pub async fn view(&self) -> Result<RenderedBoard, BoardError> {
        let graph = self.graph().await?;
        Ok(self.compose(&graph))
    }

    pub fn compose(&self, graph: &BoardGraph) -> RenderedBoard {
        self.dispatcher.reconcile(graph);
        RenderedBoard::compose(
            graph,
            &self.persister.overlay(),
            &self.dispatcher.local_edits(),
        )
    }

    pub async fn export_svg(&self) -> Result<String, BoardError> {
        Ok(export::to_svg(&self.view().await?))
    }

    // Positions

    pub fn on_drag(&self, item_id: ItemId, position: Position) {
        self.persister.on_drag(item_id, position);
    }

    pub async fn flush_positions(&self) -> Result<usize, BoardError> {
        self.ensure_open()?;
        self.persister.flush_now().await
    }

    pub fn flush_status(&self) -> FlushStatus {
        self.persister.status()
    }

    pub fn subscribe_flush_status(&self) -> watch::Receiver<FlushStatus> {
        self.persister.subscribe()
    }

    // Connection drafting

    pub fn start_connection(&self, from_item: ItemId) {
        if self.is_closed() {
            return;
        }
        self.lock_draft().start(from_item);
    }

    pub fn cancel_connection(&self) -> bool {
        self.lock_draft().cancel()
    }

    pub fn draft(&self) -> ConnectionDraft {
        *self.lock_draft()
    }

    /// Finish the draft at `to_item`. Returns `Ok(None)` without any request
    /// when nothing was being drafted or the target is the source itself.
    pub async fn complete_connection(
        &self,
        to_item: ItemId,
        label: Option<String>,
    ) -> Result<Option<BoardConnection>, BoardError> {
        self.ensure_open()?;
        let outcome = self.lock_draft().complete(to_item);
        match outcome {
            DraftOutcome::NotDrafting => Ok(None),
            DraftOutcome::SelfLoop => {
                log::debug!(
                    target: "caseboard.session",
                    "Dropped self-loop on item {} of board {}",
                    to_item,
                    self.board_id
                );
                Ok(None)
            }
            DraftOutcome::Connect { from, to } => self
                .dispatcher
                .create_connection(from, to, label)
                .await
                .map(Some),
        }
    }

    pub async fn delete_connection(&self, connection_id: ConnectionId) -> Result<(), BoardError> {
        self.ensure_open()?;
        self.dispatcher.delete_connection(connection_id).await
    }

    // Pinning

    pub async fn pin(&self, target: &PinTarget) -> Result<BoardItem, BoardError> {
        self.ensure_open()?;
        self.dispatcher.pin(target).await
    }

    pub async fn unpin(&self, item_id: ItemId) -> Result<(), BoardError> {
        self.ensure_open()?;
        self.dispatcher.unpin(item_id).await?;
        self.persister.forget(item_id);
        let mut draft = self.lock_draft();
        if draft.from() == Some(item_id) {
            draft.cancel();
        }
        Ok(())
    }

    /// Candidates not already on this board.
    pub async fn pin_candidates(
        &self,
        candidates: Vec<PinCandidate>,
    ) -> Result<Vec<PinCandidate>, BoardError> {
        let graph = self.graph().await?;
        Ok(exclude_pinned(candidates, &graph, &self.resolver))
    }

    // Notes

    /// Create a note, pinning it when `pin_at` is given.
    pub async fn create_note(
        &self,
        note: &NoteDraft,
        pin_at: Option<Position>,
    ) -> Result<(BoardNote, Option<BoardItem>), BoardError> {
        self.ensure_open()?;
        match pin_at {
            Some(position) => {
                let (note, item) = self.dispatcher.create_pinned_note(note, Some(position)).await?;
                Ok((note, Some(item)))
            }
            None => Ok((self.dispatcher.create_note(note).await?, None)),
        }
    }

    pub async fn pin_note(
        &self,
        note_id: NoteId,
        position: Option<Position>,
    ) -> Result<BoardItem, BoardError> {
        self.ensure_open()?;
        self.dispatcher.pin_note(note_id, position).await
    }

    pub async fn update_note(&self, note_id: NoteId, note: &NoteDraft) -> Result<BoardNote, BoardError> {
        self.ensure_open()?;
        self.dispatcher.update_note(note_id, note).await
    }

    pub async fn delete_note(&self, note_id: NoteId) -> Result<(), BoardError> {
        self.ensure_open()?;
        self.dispatcher.delete_note(note_id).await
    }

    // Lifecycle

    pub fn close(&self) -> CloseReport {
        if self.closed.swap(true, Ordering::SeqCst) {
            return CloseReport {
                board_id: self.board_id,
                ..CloseReport::default()
            };
        }
        let discarded_positions = self.persister.close();
        let discarded_draft = self.lock_draft().cancel();
        self.dispatcher.close();
        log::info!(
            target: "caseboard.session",
            "Closed board {} ({} unsaved positions discarded)",
            self.board_id,
            discarded_positions
        );
        CloseReport {
            board_id: self.board_id,
            discarded_positions,
            discarded_draft,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), BoardError> {
        if self.is_closed() {
            return Err(BoardError::SessionClosed(self.board_id));
        }
        Ok(())
    }

    fn lock_draft(&self) -> MutexGuard<'_, ConnectionDraft> {
        self.draft.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for BoardSession {
    fn drop(&mut self) {
        self.close();
    }
}
