use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ApiError, BoardApi};
use crate::config::SyncSettings;
use crate::types::*;

/// List endpoints answer either a bare array or a paginated page.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListPayload<T> {
    Page {
        results: Vec<T>,
        #[serde(default)]
        next: Option<String>,
    },
    Plain(Vec<T>),
}

impl<T> ListPayload<T> {
    fn into_parts(self) -> (Vec<T>, Option<String>) {
        match self {
            ListPayload::Page { results, next } => (results, next),
            ListPayload::Plain(items) => (items, None),
        }
    }
}

/// Fetch `first` and every page its `next` links lead to.
async fn collect_pages<T, F, Fut>(first: String, mut fetch: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<ListPayload<T>, ApiError>>,
{
    let mut all = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(first);
    while let Some(url) = next.take() {
        if !visited.insert(url.clone()) {
            return Err(ApiError::Decode(format!("pagination loops back to {}", url)));
        }
        let (items, following) = fetch(url).await?.into_parts();
        all.extend(items);
        next = following.filter(|n| !n.is_empty());
    }
    Ok(all)
}

/// REST transport for the board endpoints, rooted at `base_url`.
pub struct HttpBoardApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBoardApi {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_settings(settings: &SyncSettings) -> Result<Self, ApiError> {
        Self::new(
            &settings.base_url,
            settings.api_token.clone(),
            settings.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of `path` (relative, trailing slash included).
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `next` links are usually absolute; relative ones hang off the base URL.
    fn resolve_link(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else {
            self.url(link)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, self.url(path))
    }

    fn request_url(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(format!("{} failed: {}", what, e)))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        log::debug!(target: "caseboard.http", "{} -> {}: {}", what, status, body);
        Err(ApiError::from_status(status.as_u16(), body))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, ApiError> {
        let response = self.send(builder, what).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("{}: {}", what, e)))
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_json(self.request(Method::POST, path).json(body), path)
            .await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, path), path).await?;
        Ok(())
    }
}

/// Coordinates echoed by the batch endpoint. An empty body or a plain
/// acknowledgement yields an empty list.
fn parse_coordinates(body: &str) -> Result<Vec<ItemCoordinates>, ApiError> {
    #[derive(Deserialize)]
    struct Wrapped {
        items: Vec<ItemCoordinates>,
    }
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ApiError::Decode(format!("batch coordinates: {}", e)))?;
    if let Ok(items) = serde_json::from_value::<Vec<ItemCoordinates>>(value.clone()) {
        return Ok(items);
    }
    Ok(serde_json::from_value::<Wrapped>(value)
        .map(|w| w.items)
        .unwrap_or_default())
}

#[async_trait]
impl BoardApi for HttpBoardApi {
    async fn list_boards(&self) -> Result<Vec<Board>, ApiError> {
        let boards = collect_pages(self.url("boards/"), |url| async move {
            let builder = self.request_url(Method::GET, self.resolve_link(&url));
            self.send_json::<ListPayload<Board>>(builder, &url).await
        })
        .await?;
        Ok(boards)
    }

    async fn create_board(&self, case_id: CaseId) -> Result<Board, ApiError> {
        self.post("boards/", &CreateBoardRequest { case: case_id }).await
    }

    async fn fetch_board(&self, board_id: BoardId) -> Result<BoardGraph, ApiError> {
        let path = format!("boards/{}/full/", board_id);
        self.send_json(self.request(Method::GET, &path), &path).await
    }

    async fn create_item(
        &self,
        board_id: BoardId,
        request: &CreateItemRequest,
    ) -> Result<BoardItem, ApiError> {
        self.post(&format!("boards/{}/items/", board_id), request).await
    }

    async fn delete_item(&self, board_id: BoardId, item_id: ItemId) -> Result<(), ApiError> {
        self.delete(&format!("boards/{}/items/{}/", board_id, item_id))
            .await
    }

    async fn update_positions(
        &self,
        board_id: BoardId,
        items: &[ItemCoordinates],
    ) -> Result<Vec<ItemCoordinates>, ApiError> {
        let path = format!("boards/{}/items/batch-coordinates/", board_id);
        let body = BatchCoordinatesRequest {
            items: items.to_vec(),
        };
        let response = self
            .send(self.request(Method::PATCH, &path).json(&body), &path)
            .await?;
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("{} failed: {}", path, e)))?;
        parse_coordinates(&text)
    }

    async fn create_connection(
        &self,
        board_id: BoardId,
        request: &CreateConnectionRequest,
    ) -> Result<BoardConnection, ApiError> {
        self.post(&format!("boards/{}/connections/", board_id), request)
            .await
    }

    async fn delete_connection(
        &self,
        board_id: BoardId,
        connection_id: ConnectionId,
    ) -> Result<(), ApiError> {
        self.delete(&format!("boards/{}/connections/{}/", board_id, connection_id))
            .await
    }

    async fn create_note(&self, board_id: BoardId, note: &NoteDraft) -> Result<BoardNote, ApiError> {
        self.post(&format!("boards/{}/notes/", board_id), note).await
    }

    async fn update_note(
        &self,
        board_id: BoardId,
        note_id: NoteId,
        note: &NoteDraft,
    ) -> Result<BoardNote, ApiError> {
        let path = format!("boards/{}/notes/{}/", board_id, note_id);
        self.send_json(self.request(Method::PATCH, &path).json(note), &path)
            .await
    }

    async fn delete_note(&self, board_id: BoardId, note_id: NoteId) -> Result<(), ApiError> {
        self.delete(&format!("boards/{}/notes/{}/", board_id, note_id))
            .await
    }
}
