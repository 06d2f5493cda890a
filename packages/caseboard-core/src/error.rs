use crate::api::ApiError;
use crate::types::{BoardId, CaseId, EntityKind, ItemId};

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("Failed to list boards: {0}")]
    Locate(#[source] ApiError),

    #[error("Failed to load board {board_id}: {source}")]
    Fetch {
        board_id: BoardId,
        #[source]
        source: ApiError,
    },

    #[error("Failed to create board for case {case_id}: {source}")]
    Create {
        case_id: CaseId,
        #[source]
        source: ApiError,
    },

    #[error("A board already exists for case {0}")]
    BoardExists(CaseId),

    #[error("Saving {items} positions on board {board_id} failed: {source}")]
    Flush {
        board_id: BoardId,
        items: usize,
        #[source]
        source: ApiError,
    },

    #[error("{op} on board {board_id} failed: {source}")]
    Mutation {
        op: &'static str,
        board_id: BoardId,
        #[source]
        source: ApiError,
    },

    #[error("Unknown entity kind '{0}': no content type has been observed for it")]
    UnknownKind(EntityKind),

    #[error("Item {0} cannot be connected to itself")]
    SelfLoop(ItemId),

    #[error("Item {item_id} is not on board {board_id}")]
    ForeignItem { board_id: BoardId, item_id: ItemId },

    #[error("Board session for board {0} is closed")]
    SessionClosed(BoardId),
}

impl BoardError {
    /// Whether repeating the same action may succeed. Validation conditions
    /// are not retryable; transport failures are, except conflicts.
    pub fn is_retryable(&self) -> bool {
        match self {
            BoardError::Locate(source)
            | BoardError::Fetch { source, .. }
            | BoardError::Create { source, .. }
            | BoardError::Flush { source, .. }
            | BoardError::Mutation { source, .. } => !source.is_conflict(),
            BoardError::BoardExists(_)
            | BoardError::UnknownKind(_)
            | BoardError::SelfLoop(_)
            | BoardError::ForeignItem { .. }
            | BoardError::SessionClosed(_) => false,
        }
    }
}
