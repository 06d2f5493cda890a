/// Board locator: finds (or lazily creates) the single board of a case.
///
/// The board list may lag behind a creation, so a board id created in this
/// process is remembered per case and used until the list shows a board.
/// A listed board always wins over the remembered one.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::api::BoardApi;
use crate::error::BoardError;
use crate::types::{BoardId, CaseId};

pub struct BoardLocator {
    api: Arc<dyn BoardApi>,
    created: Mutex<HashMap<CaseId, BoardId>>,
}

impl BoardLocator {
    pub fn new(api: Arc<dyn BoardApi>) -> Self {
        Self {
            api,
            created: Mutex::new(HashMap::new()),
        }
    }

    /// Board id of `case_id`, or None if the case has no board yet.
    pub async fn locate(&self, case_id: CaseId) -> Result<Option<BoardId>, BoardError> {
        let boards = self.api.list_boards().await.map_err(BoardError::Locate)?;
        if let Some(board) = boards.iter().find(|b| b.case == case_id) {
            return Ok(Some(board.id));
        }
        Ok(self.remembered(case_id))
    }

    /// Create the board of `case_id`. Fails with `BoardExists` if the server
    /// already has one.
    pub async fn create_board(&self, case_id: CaseId) -> Result<BoardId, BoardError> {
        match self.api.create_board(case_id).await {
            Ok(board) => {
                log::info!(
                    target: "caseboard.locator",
                    "Created board {} for case {}",
                    board.id,
                    case_id
                );
                self.created
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(case_id, board.id);
                Ok(board.id)
            }
            Err(source) if source.is_conflict() => Err(BoardError::BoardExists(case_id)),
            Err(source) => Err(BoardError::Create { case_id, source }),
        }
    }

    /// Locate the board of `case_id`, creating it when missing. Losing a
    /// creation race counts as success.
    pub async fn ensure_board(&self, case_id: CaseId) -> Result<BoardId, BoardError> {
        if let Some(board_id) = self.locate(case_id).await? {
            return Ok(board_id);
        }
        match self.create_board(case_id).await {
            Ok(board_id) => Ok(board_id),
            Err(BoardError::BoardExists(_)) => {
                log::debug!(
                    target: "caseboard.locator",
                    "Board for case {} already exists, locating it",
                    case_id
                );
                self.locate(case_id)
                    .await?
                    .ok_or(BoardError::BoardExists(case_id))
            }
            Err(e) => Err(e),
        }
    }

    pub fn remembered(&self, case_id: CaseId) -> Option<BoardId> {
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&case_id)
            .copied()
    }
}
