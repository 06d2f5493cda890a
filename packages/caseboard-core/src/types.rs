use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

pub type BoardId = u64;
pub type CaseId = u64;
pub type ItemId = u64;
pub type ConnectionId = u64;
pub type NoteId = u64;
pub type ObjectId = u64;
pub type ContentTypeId = u64;
pub type UserId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Kind of a domain entity that can be pinned onto a board.
///
/// The server reports model names ("case", "suspect", "testimonyevidence",
/// "boardnote", ...). They are folded into a closed set, with `Other`
/// keeping the raw name for kinds the client has no dedicated handling for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Case,
    Suspect,
    Evidence,
    Witness,
    Note,
    Other(String),
}

impl EntityKind {
    pub fn from_model_name(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "case" => EntityKind::Case,
            "suspect" => EntityKind::Suspect,
            "witness" => EntityKind::Witness,
            "note" | "boardnote" => EntityKind::Note,
            n if n.ends_with("evidence") => EntityKind::Evidence,
            _ => EntityKind::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntityKind::Case => "case",
            EntityKind::Suspect => "suspect",
            EntityKind::Evidence => "evidence",
            EntityKind::Witness => "witness",
            EntityKind::Note => "note",
            EntityKind::Other(name) => name,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EntityKind {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityKind {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(EntityKind::from_model_name(&s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub case: CaseId,
    #[serde(default)]
    pub investigator: Option<UserId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Generic entity reference: which model (content type) and which row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub content_type_id: ContentTypeId,
    pub object_id: ObjectId,
}

/// Server-resolved projection of the entity behind a board item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentObjectSummary {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default, alias = "display_name", alias = "title")]
    pub label: String,
    #[serde(default)]
    pub content_type_id: Option<ContentTypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardItem {
    pub id: ItemId,
    pub content_type: ContentTypeId,
    pub object_id: ObjectId,
    #[serde(default)]
    pub content_object_summary: Option<ContentObjectSummary>,
    pub position_x: f64,
    pub position_y: f64,
}

impl BoardItem {
    pub fn position(&self) -> Position {
        Position::new(self.position_x, self.position_y)
    }

    pub fn content_ref(&self) -> ContentRef {
        ContentRef {
            content_type_id: self.content_type,
            object_id: self.object_id,
        }
    }

    pub fn kind(&self) -> Option<&EntityKind> {
        self.content_object_summary.as_ref().map(|s| &s.kind)
    }

    pub fn label(&self) -> String {
        match &self.content_object_summary {
            Some(summary) if !summary.label.is_empty() => summary.label.clone(),
            Some(summary) => format!("{} #{}", summary.kind, self.object_id),
            None => format!("#{}", self.object_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConnection {
    pub id: ConnectionId,
    pub from_item: ItemId,
    pub to_item: ItemId,
    #[serde(default)]
    pub label: String,
}

impl BoardConnection {
    pub fn touches(&self, item_id: ItemId) -> bool {
        self.from_item == item_id || self.to_item == item_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardNote {
    pub id: NoteId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Full board payload as returned by the board-full endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardGraph {
    pub id: BoardId,
    pub case: CaseId,
    #[serde(default)]
    pub items: Vec<BoardItem>,
    #[serde(default)]
    pub connections: Vec<BoardConnection>,
    #[serde(default)]
    pub notes: Vec<BoardNote>,
}

impl BoardGraph {
    pub fn item(&self, item_id: ItemId) -> Option<&BoardItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn has_item(&self, item_id: ItemId) -> bool {
        self.item(item_id).is_some()
    }

    pub fn contains_ref(&self, content_ref: ContentRef) -> bool {
        self.items.iter().any(|i| i.content_ref() == content_ref)
    }

    /// Connections touching `item_id`, in either direction.
    pub fn connections_of(&self, item_id: ItemId) -> impl Iterator<Item = &BoardConnection> {
        self.connections.iter().filter(move |c| c.touches(item_id))
    }

    /// Outgoing adjacency, computed from the flat edge list.
    pub fn adjacency(&self) -> HashMap<ItemId, Vec<ItemId>> {
        let mut adjacency: HashMap<ItemId, Vec<ItemId>> = HashMap::new();
        for conn in &self.connections {
            adjacency.entry(conn.from_item).or_default().push(conn.to_item);
        }
        adjacency
    }
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBoardRequest {
    pub case: CaseId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateItemRequest {
    pub content_object: ContentRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_y: Option<f64>,
}

/// One (id, x, y) tuple of a batched coordinate update. Also used to read
/// the server's reply, which may carry more fields per item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemCoordinates {
    pub id: ItemId,
    pub position_x: f64,
    pub position_y: f64,
}

impl ItemCoordinates {
    pub fn new(id: ItemId, position: Position) -> Self {
        Self {
            id,
            position_x: position.x,
            position_y: position.y,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.position_x, self.position_y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCoordinatesRequest {
    pub items: Vec<ItemCoordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateConnectionRequest {
    pub from_item: ItemId,
    pub to_item: ItemId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}
