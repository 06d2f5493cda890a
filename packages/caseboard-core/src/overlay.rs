/// Client-side position overlay.
///
/// Holds positions the user has dragged items to but the server has not
/// confirmed yet. While an entry exists it wins over the fetched position.
use std::collections::HashMap;

use crate::types::{BoardItem, ItemCoordinates, ItemId, Position};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionOverlay {
    positions: HashMap<ItemId, Position>,
}

impl PositionOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, item_id: ItemId, position: Position) {
        self.positions.insert(item_id, position);
    }

    pub fn get(&self, item_id: ItemId) -> Option<Position> {
        self.positions.get(&item_id).copied()
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.positions.contains_key(&item_id)
    }

    pub fn remove(&mut self, item_id: ItemId) -> Option<Position> {
        self.positions.remove(&item_id)
    }

    /// Drop entries the server now holds. An entry that moved again since
    /// the flush was taken keeps rendering at its newer position.
    pub fn remove_confirmed(&mut self, flushed: &[ItemCoordinates]) -> usize {
        let mut removed = 0;
        for coords in flushed {
            if self.positions.get(&coords.id) == Some(&coords.position()) {
                self.positions.remove(&coords.id);
                removed += 1;
            }
        }
        removed
    }

    /// Position to render for an item: overlay first, then the server value.
    pub fn resolve(&self, item: &BoardItem) -> Position {
        self.get(item.id).unwrap_or_else(|| item.position())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, Position)> + '_ {
        self.positions.iter().map(|(id, pos)| (*id, *pos))
    }
}
