/// Graph store: per-board cache of the authoritative server graph.
///
/// - One `OnceCell` per board id; concurrent readers of a missing entry
///   await the same fetch, so a miss costs exactly one request
/// - Entries older than the freshness window are replaced on next read
/// - `invalidate` detaches exactly one board's entry; a fetch still in
///   flight for the detached cell completes for its current waiters only
/// - Saved positions are remembered per item and patched into any graph
///   whose fetch started before the save was confirmed
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::OnceCell;
use tokio::time::Instant;

use crate::api::BoardApi;
use crate::content_types::ContentTypeResolver;
use crate::error::BoardError;
use crate::types::{BoardGraph, BoardId, ItemCoordinates, ItemId, Position};

#[derive(Debug, Clone)]
struct CachedGraph {
    graph: Arc<BoardGraph>,
    fetched_at: Instant,
}

type Slot = Arc<OnceCell<CachedGraph>>;

/// Last confirmed position per item, tagged with the confirmation sequence.
type Confirmed = HashMap<ItemId, (u64, Position)>;

pub struct GraphStore {
    api: Arc<dyn BoardApi>,
    resolver: Arc<ContentTypeResolver>,
    freshness: Duration,
    slots: Mutex<HashMap<BoardId, Slot>>,
    confirmed: Mutex<HashMap<BoardId, Confirmed>>,
    sequence: AtomicU64,
}

impl GraphStore {
    pub fn new(
        api: Arc<dyn BoardApi>,
        resolver: Arc<ContentTypeResolver>,
        freshness: Duration,
    ) -> Self {
        Self {
            api,
            resolver,
            freshness,
            slots: Mutex::new(HashMap::new()),
            confirmed: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Cached graph for `board_id`, fetching it if missing or stale.
    pub async fn get(&self, board_id: BoardId) -> Result<Arc<BoardGraph>, BoardError> {
        let slot = self.slot_for(board_id);
        let cached = slot.get_or_try_init(|| self.fetch(board_id)).await?;
        Ok(cached.graph.clone())
    }

    /// Cached graph without fetching, stale or not.
    pub fn peek(&self, board_id: BoardId) -> Option<Arc<BoardGraph>> {
        self.lock_slots()
            .get(&board_id)
            .and_then(|slot| slot.get())
            .map(|cached| cached.graph.clone())
    }

    pub fn is_cached(&self, board_id: BoardId) -> bool {
        self.peek(board_id).is_some()
    }

    /// Mark one board's graph as stale so the next read re-fetches it.
    pub fn invalidate(&self, board_id: BoardId) {
        if self.lock_slots().remove(&board_id).is_some() {
            log::debug!(target: "caseboard.store", "Invalidated board {}", board_id);
        }
    }

    /// Patch server-confirmed positions into the cached graph without a
    /// round trip. A fetch already in flight applies them when it lands.
    /// Returns false when nothing is cached for the board yet.
    pub fn confirm_positions(&self, board_id: BoardId, confirmed: &[ItemCoordinates]) -> bool {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        {
            let mut by_board = self.lock_confirmed();
            let entries = by_board.entry(board_id).or_default();
            for coords in confirmed {
                entries.insert(coords.id, (seq, coords.position()));
            }
        }

        let mut slots = self.lock_slots();
        let Some(cached) = slots.get(&board_id).and_then(|slot| slot.get()).cloned() else {
            return false;
        };
        let mut graph = (*cached.graph).clone();
        apply_positions(&mut graph, confirmed.iter().map(|c| (c.id, c.position())));
        let patched = CachedGraph {
            graph: Arc::new(graph),
            fetched_at: cached.fetched_at,
        };
        slots.insert(board_id, Arc::new(OnceCell::new_with(Some(patched))));
        true
    }

    fn slot_for(&self, board_id: BoardId) -> Slot {
        let mut slots = self.lock_slots();
        if let Some(slot) = slots.get(&board_id) {
            let stale = slot
                .get()
                .is_some_and(|cached| cached.fetched_at.elapsed() >= self.freshness);
            if !stale {
                return slot.clone();
            }
            log::debug!(target: "caseboard.store", "Board {} graph is stale", board_id);
        }
        let slot: Slot = Arc::new(OnceCell::new());
        slots.insert(board_id, slot.clone());
        slot
    }

    async fn fetch(&self, board_id: BoardId) -> Result<CachedGraph, BoardError> {
        log::debug!(target: "caseboard.store", "Fetching board {}", board_id);
        let started = self.sequence.load(Ordering::SeqCst);
        let mut graph = self.api.fetch_board(board_id).await.map_err(|source| {
            log::warn!(
                target: "caseboard.store",
                "Failed to fetch board {}: {}",
                board_id,
                source
            );
            BoardError::Fetch { board_id, source }
        })?;

        let late = self.confirmed_since(board_id, started);
        if !late.is_empty() {
            log::debug!(
                target: "caseboard.store",
                "Applying {} positions confirmed while board {} was loading",
                late.len(),
                board_id
            );
            apply_positions(&mut graph, late);
        }

        let learned = self.resolver.observe_graph(&graph);
        log::info!(
            target: "caseboard.store",
            "Loaded board {}: {} items, {} connections, {} notes ({} new content types)",
            board_id,
            graph.items.len(),
            graph.connections.len(),
            graph.notes.len(),
            learned
        );
        Ok(CachedGraph {
            graph: Arc::new(graph),
            fetched_at: Instant::now(),
        })
    }

    /// Positions confirmed at or after sequence `started`.
    fn confirmed_since(&self, board_id: BoardId, started: u64) -> Vec<(ItemId, Position)> {
        self.lock_confirmed()
            .get(&board_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, (seq, _))| *seq >= started)
                    .map(|(id, (_, position))| (*id, *position))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<BoardId, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_confirmed(&self) -> MutexGuard<'_, HashMap<BoardId, Confirmed>> {
        self.confirmed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn apply_positions(graph: &mut BoardGraph, positions: impl IntoIterator<Item = (ItemId, Position)>) {
    for (id, position) in positions {
        if let Some(item) = graph.items.iter_mut().find(|i| i.id == id) {
            item.position_x = position.x;
            item.position_y = position.y;
        }
    }
}
