/// Two-step link drawing: pick the source item, then the target.
use crate::types::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionDraft {
    #[default]
    Idle,
    Drafting { from: ItemId },
}

/// What completing a draft asks the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftOutcome {
    /// No draft was in progress.
    NotDrafting,
    /// Source and target are the same item; dropped without a request.
    SelfLoop,
    Connect { from: ItemId, to: ItemId },
}

impl ConnectionDraft {
    /// Start (or restart) a draft from `from`.
    pub fn start(&mut self, from: ItemId) {
        *self = ConnectionDraft::Drafting { from };
    }

    /// Finish the draft at `to`. The draft is always back to `Idle` afterwards.
    pub fn complete(&mut self, to: ItemId) -> DraftOutcome {
        match std::mem::take(self) {
            ConnectionDraft::Idle => DraftOutcome::NotDrafting,
            ConnectionDraft::Drafting { from } if from == to => DraftOutcome::SelfLoop,
            ConnectionDraft::Drafting { from } => DraftOutcome::Connect { from, to },
        }
    }

    /// Abandon the draft. Returns true if one was in progress.
    pub fn cancel(&mut self) -> bool {
        let was_drafting = self.is_drafting();
        *self = ConnectionDraft::Idle;
        was_drafting
    }

    pub fn from(&self) -> Option<ItemId> {
        match self {
            ConnectionDraft::Idle => None,
            ConnectionDraft::Drafting { from } => Some(*from),
        }
    }

    pub fn is_drafting(&self) -> bool {
        matches!(self, ConnectionDraft::Drafting { .. })
    }
}
