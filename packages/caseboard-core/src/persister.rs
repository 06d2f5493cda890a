/// Debounced, batched persistence of dragged item positions.
///
/// Every drag lands in two maps: the overlay (what the canvas renders) and
/// the pending set (what still has to be sent). Each drag restarts the
/// quiescence timer; when it elapses, the pending set is drained into one
/// batched coordinate update.
///
/// At most one flush per board is in flight. A timer that fires during a
/// flight marks a rerun, and the flight's completion sends whatever
/// accumulated meanwhile. Closing the persister cancels the timer and
/// discards unsent positions.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::{ApiError, BoardApi};
use crate::error::BoardError;
use crate::overlay::PositionOverlay;
use crate::store::GraphStore;
use crate::types::{BoardId, BoardItem, ItemCoordinates, ItemId, Position};

/// Transient save indicator for the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushStatus {
    Idle,
    Scheduled { pending: usize },
    Flushing { items: usize },
    Failed { items: usize, message: String },
}

#[derive(Default)]
struct PersisterState {
    overlay: PositionOverlay,
    pending: HashMap<ItemId, Position>,
    timer: Option<JoinHandle<()>>,
    in_flight: bool,
    rerun: bool,
    closed: bool,
}

struct PersisterInner {
    board_id: BoardId,
    api: Arc<dyn BoardApi>,
    store: Arc<GraphStore>,
    debounce: Duration,
    state: Mutex<PersisterState>,
    status: watch::Sender<FlushStatus>,
}

impl PersisterInner {
    fn lock_state(&self) -> MutexGuard<'_, PersisterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drain the pending set into a batch, unless there is nothing to send
    /// or another flush is still in flight.
    fn begin_flush(&self) -> Option<Vec<ItemCoordinates>> {
        let batch = {
            let mut state = self.lock_state();
            if state.closed || state.pending.is_empty() {
                return None;
            }
            if state.in_flight {
                state.rerun = true;
                return None;
            }
            state.in_flight = true;
            let mut batch: Vec<ItemCoordinates> = state
                .pending
                .drain()
                .map(|(id, position)| ItemCoordinates::new(id, position))
                .collect();
            batch.sort_by_key(|c| c.id);
            batch
        };
        self.status.send_replace(FlushStatus::Flushing { items: batch.len() });
        Some(batch)
    }

    /// Apply a flush result. The bool tells whether a deferred flush should
    /// run right away.
    fn finish_flush(
        &self,
        batch: &[ItemCoordinates],
        result: Result<Vec<ItemCoordinates>, ApiError>,
    ) -> (bool, Result<usize, BoardError>) {
        let mut state = self.lock_state();
        state.in_flight = false;
        let rerun = std::mem::take(&mut state.rerun) && !state.closed && !state.pending.is_empty();

        match result {
            Ok(confirmed) => {
                if !state.closed {
                    state.overlay.remove_confirmed(batch);
                }
                let pending = state.pending.len();
                drop(state);

                let confirmed: &[ItemCoordinates] =
                    if confirmed.is_empty() { batch } else { &confirmed };
                self.store.confirm_positions(self.board_id, confirmed);
                log::debug!(
                    target: "caseboard.persister",
                    "Saved {} positions on board {}",
                    batch.len(),
                    self.board_id
                );
                self.status.send_replace(if pending > 0 {
                    FlushStatus::Scheduled { pending }
                } else {
                    FlushStatus::Idle
                });
                (rerun, Ok(batch.len()))
            }
            Err(source) => {
                if !state.closed {
                    // Newer drags of the same items take precedence over the failed values.
                    for coords in batch {
                        state.pending.entry(coords.id).or_insert(coords.position());
                    }
                }
                drop(state);

                log::warn!(
                    target: "caseboard.persister",
                    "Saving {} positions on board {} failed, keeping local positions: {}",
                    batch.len(),
                    self.board_id,
                    source
                );
                self.status.send_replace(FlushStatus::Failed {
                    items: batch.len(),
                    message: source.to_string(),
                });
                (
                    rerun,
                    Err(BoardError::Flush {
                        board_id: self.board_id,
                        items: batch.len(),
                        source,
                    }),
                )
            }
        }
    }
}

async fn run_flush(inner: Arc<PersisterInner>) -> Result<usize, BoardError> {
    let mut flushed = 0;
    let mut last_error = None;
    while let Some(batch) = inner.begin_flush() {
        let result = inner.api.update_positions(inner.board_id, &batch).await;
        let (again, outcome) = inner.finish_flush(&batch, result);
        match outcome {
            Ok(count) => {
                flushed += count;
                last_error = None;
            }
            Err(e) => last_error = Some(e),
        }
        if !again {
            break;
        }
    }
    match last_error {
        Some(e) => Err(e),
        None => Ok(flushed),
    }
}

fn spawn_timer(inner: &Arc<PersisterInner>) -> JoinHandle<()> {
    let weak: Weak<PersisterInner> = Arc::downgrade(inner);
    let delay = inner.debounce;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(inner) = weak.upgrade() {
            // Detached: a later drag aborts the timer, never a request in flight.
            tokio::spawn(async move {
                let _ = run_flush(inner).await;
            });
        }
    })
}

/// Position overlay plus debounced flusher for one board.
pub struct DebouncedPersister {
    inner: Arc<PersisterInner>,
}

impl DebouncedPersister {
    pub fn new(
        board_id: BoardId,
        api: Arc<dyn BoardApi>,
        store: Arc<GraphStore>,
        debounce: Duration,
    ) -> Self {
        let (status, _) = watch::channel(FlushStatus::Idle);
        Self {
            inner: Arc::new(PersisterInner {
                board_id,
                api,
                store,
                debounce,
                state: Mutex::new(PersisterState::default()),
                status,
            }),
        }
    }

    pub fn board_id(&self) -> BoardId {
        self.inner.board_id
    }

    /// Record a drag and restart the quiescence timer. Must be called
    /// from within a tokio runtime.
    pub fn on_drag(&self, item_id: ItemId, position: Position) {
        let scheduled = {
            let mut state = self.inner.lock_state();
            if state.closed {
                log::debug!(
                    target: "caseboard.persister",
                    "Ignoring drag of item {} on closed board {}",
                    item_id,
                    self.inner.board_id
                );
                return;
            }
            state.overlay.set(item_id, position);
            state.pending.insert(item_id, position);
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.timer = Some(spawn_timer(&self.inner));
            (!state.in_flight).then_some(state.pending.len())
        };
        if let Some(pending) = scheduled {
            self.inner.status.send_replace(FlushStatus::Scheduled { pending });
        }
    }

    /// Flush now instead of waiting for the timer; also the explicit retry
    /// after a failed flush. Returns the number of positions saved, or 0
    /// when a flight is already running (the pending set follows it).
    pub async fn flush_now(&self) -> Result<usize, BoardError> {
        let timer = self.inner.lock_state().timer.take();
        if let Some(timer) = timer {
            timer.abort();
        }
        run_flush(self.inner.clone()).await
    }

    /// Position to render for `item`.
    pub fn resolve(&self, item: &BoardItem) -> Position {
        self.inner.lock_state().overlay.resolve(item)
    }

    pub fn overlay(&self) -> PositionOverlay {
        self.inner.lock_state().overlay.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.lock_state().in_flight
    }

    pub fn status(&self) -> FlushStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlushStatus> {
        self.inner.status.subscribe()
    }

    /// Drop local state of an item that no longer exists on the server.
    pub fn forget(&self, item_id: ItemId) {
        let mut state = self.inner.lock_state();
        state.overlay.remove(item_id);
        state.pending.remove(&item_id);
    }

    /// Cancel the timer and discard unsent positions. Returns how many
    /// positions were dropped. A flush already in flight completes, but its
    /// result no longer touches local state.
    pub fn close(&self) -> usize {
        let discarded = {
            let mut state = self.inner.lock_state();
            if state.closed {
                return 0;
            }
            state.closed = true;
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            let discarded = state.pending.len();
            state.pending.clear();
            state.overlay.clear();
            discarded
        };
        if discarded > 0 {
            log::warn!(
                target: "caseboard.persister",
                "Board {} closed with {} unsaved positions; discarding them",
                self.inner.board_id,
                discarded
            );
        }
        self.inner.status.send_replace(FlushStatus::Idle);
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().closed
    }
}

impl Drop for DebouncedPersister {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.lock_state().timer.take() {
            timer.abort();
        }
    }
}
