/// Process-wide entry point: one transport, one graph store and one
/// content type registry shared by every open board session.
use std::sync::Arc;

use crate::api::BoardApi;
use crate::config::SyncSettings;
use crate::content_types::ContentTypeResolver;
use crate::error::BoardError;
use crate::locator::BoardLocator;
use crate::session::BoardSession;
use crate::store::GraphStore;
use crate::types::{BoardId, CaseId};

pub struct BoardEngine {
    api: Arc<dyn BoardApi>,
    resolver: Arc<ContentTypeResolver>,
    store: Arc<GraphStore>,
    locator: BoardLocator,
    settings: SyncSettings,
}

impl BoardEngine {
    pub fn new(api: Arc<dyn BoardApi>, settings: SyncSettings) -> Self {
        let resolver = Arc::new(ContentTypeResolver::new());
        let store = Arc::new(GraphStore::new(
            api.clone(),
            resolver.clone(),
            settings.freshness(),
        ));
        Self {
            locator: BoardLocator::new(api.clone()),
            api,
            resolver,
            store,
            settings,
        }
    }

    /// Engine talking to the REST backend described by `settings`.
    #[cfg(feature = "http")]
    pub fn connect(settings: SyncSettings) -> Result<Self, crate::api::ApiError> {
        let api = crate::api::http::HttpBoardApi::from_settings(&settings)?;
        Ok(Self::new(Arc::new(api), settings))
    }

    pub fn open_session(&self, board_id: BoardId) -> BoardSession {
        log::debug!(target: "caseboard.engine", "Opening board {}", board_id);
        BoardSession::new(
            board_id,
            self.api.clone(),
            self.store.clone(),
            self.resolver.clone(),
            &self.settings,
        )
    }

    /// Open the board of a case, creating it on first use.
    pub async fn open_case(&self, case_id: CaseId) -> Result<BoardSession, BoardError> {
        let board_id = self.locator.ensure_board(case_id).await?;
        Ok(self.open_session(board_id))
    }

    pub fn locator(&self) -> &BoardLocator {
        &self.locator
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn resolver(&self) -> &Arc<ContentTypeResolver> {
        &self.resolver
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }
}
