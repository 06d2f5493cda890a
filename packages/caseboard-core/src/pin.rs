/// Pinning: turning an entity reference into a create-item request, and
/// filtering the candidate list offered to the user.
use serde::{Deserialize, Serialize};

use crate::content_types::ContentTypeResolver;
use crate::error::BoardError;
use crate::types::*;

/// What the user asked to pin.
#[derive(Debug, Clone, PartialEq)]
pub struct PinTarget {
    pub kind: EntityKind,
    pub object_id: ObjectId,
    /// Explicit content type id; bypasses the resolver when set.
    pub content_type_id: Option<ContentTypeId>,
    pub position: Option<Position>,
}

impl PinTarget {
    pub fn new(kind: EntityKind, object_id: ObjectId) -> Self {
        Self {
            kind,
            object_id,
            content_type_id: None,
            position: None,
        }
    }

    pub fn with_content_type(mut self, content_type_id: ContentTypeId) -> Self {
        self.content_type_id = Some(content_type_id);
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Build the create-item request. Fails without touching the network
    /// when the kind's content type is neither supplied nor known.
    pub fn to_request(
        &self,
        resolver: &ContentTypeResolver,
        default_position: Position,
    ) -> Result<CreateItemRequest, BoardError> {
        let content_type_id = match self.content_type_id {
            Some(id) => id,
            None => resolver
                .resolve(&self.kind)
                .ok_or_else(|| BoardError::UnknownKind(self.kind.clone()))?,
        };
        let position = self.position.unwrap_or(default_position);
        Ok(CreateItemRequest {
            content_object: ContentRef {
                content_type_id,
                object_id: self.object_id,
            },
            position_x: Some(position.x),
            position_y: Some(position.y),
        })
    }
}

/// An entity the user may pin, as listed by the surrounding CRUD pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinCandidate {
    pub kind: EntityKind,
    pub object_id: ObjectId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub content_type_id: Option<ContentTypeId>,
}

impl PinCandidate {
    pub fn content_ref(&self, resolver: &ContentTypeResolver) -> Option<ContentRef> {
        let content_type_id = self
            .content_type_id
            .or_else(|| resolver.resolve(&self.kind))?;
        Some(ContentRef {
            content_type_id,
            object_id: self.object_id,
        })
    }

    pub fn to_target(&self) -> PinTarget {
        PinTarget {
            kind: self.kind.clone(),
            object_id: self.object_id,
            content_type_id: self.content_type_id,
            position: None,
        }
    }
}

/// Drop candidates whose (content type, object) pair is already pinned.
/// A candidate whose kind has no known content type cannot already be on
/// the board, so it is kept.
pub fn exclude_pinned(
    candidates: Vec<PinCandidate>,
    graph: &BoardGraph,
    resolver: &ContentTypeResolver,
) -> Vec<PinCandidate> {
    candidates
        .into_iter()
        .filter(|candidate| match candidate.content_ref(resolver) {
            Some(content_ref) => !graph.contains_ref(content_ref),
            None => true,
        })
        .collect()
}
