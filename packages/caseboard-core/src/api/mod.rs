#[cfg(feature = "http")]
pub mod http;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::types::*;

/// Abstract transport for the board REST endpoints.
/// Implementations: HttpBoardApi (reqwest), MockBoardApi (tests).
#[async_trait]
pub trait BoardApi: Send + Sync {
    /// All boards visible to the current user.
    async fn list_boards(&self) -> Result<Vec<Board>, ApiError>;

    /// Create the board of a case. A second board for the same case is a conflict.
    async fn create_board(&self, case_id: CaseId) -> Result<Board, ApiError>;

    /// Items, connections and notes of one board in a single round trip.
    async fn fetch_board(&self, board_id: BoardId) -> Result<BoardGraph, ApiError>;

    async fn create_item(
        &self,
        board_id: BoardId,
        request: &CreateItemRequest,
    ) -> Result<BoardItem, ApiError>;

    async fn delete_item(&self, board_id: BoardId, item_id: ItemId) -> Result<(), ApiError>;

    /// Batched coordinate update. Returns the items as stored by the server.
    async fn update_positions(
        &self,
        board_id: BoardId,
        items: &[ItemCoordinates],
    ) -> Result<Vec<ItemCoordinates>, ApiError>;

    async fn create_connection(
        &self,
        board_id: BoardId,
        request: &CreateConnectionRequest,
    ) -> Result<BoardConnection, ApiError>;

    async fn delete_connection(
        &self,
        board_id: BoardId,
        connection_id: ConnectionId,
    ) -> Result<(), ApiError>;

    async fn create_note(&self, board_id: BoardId, note: &NoteDraft) -> Result<BoardNote, ApiError>;

    async fn update_note(
        &self,
        board_id: BoardId,
        note_id: NoteId,
        note: &NoteDraft,
    ) -> Result<BoardNote, ApiError>;

    async fn delete_note(&self, board_id: BoardId, note_id: NoteId) -> Result<(), ApiError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map a non-success HTTP status to an error. The server reports a
    /// duplicate board either as 409 or as a 400 validation error.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            409 => ApiError::Conflict(body),
            404 => ApiError::NotFound(body),
            400 if body.to_ascii_lowercase().contains("already exists") => {
                ApiError::Conflict(body)
            }
            _ => ApiError::Status { status, body },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict(_))
    }
}
