//! Spotify Web API catalog provider
//!
//! API Flow:
//! 1. Playlist items: /playlists/{id}/tracks?limit=&offset= → paged items with nested track objects
//! 2. Genres: /artists/{id} → genre tags for the primary artist
use crate::services::providers::{
    error_for_status, error_from_envelope, CatalogClient, CatalogError, PlaylistPage,
    TokenProvider,
};
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct SpotifyCatalogClient {
    http_client: HttpClient,
    api_url: String,
    tokens: Arc<TokenProvider>,
}

impl SpotifyCatalogClient {
    pub fn new(http_client: HttpClient, api_url: String, tokens: Arc<TokenProvider>) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Authenticated GET returning the parsed JSON body
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, CatalogError> {
        let token = self.tokens.access_token().await?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                self.tokens.invalidate().await;
            }
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &headers, body));
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| CatalogError::Malformed(format!("Invalid JSON body: {}", e)))
    }
}

/// Validates the shape of a playlist page response
fn parse_playlist_page(body: Value) -> Result<PlaylistPage, CatalogError> {
    let object = match body {
        Value::Object(object) => object,
        Value::String(text) => {
            return Err(CatalogError::Malformed(format!(
                "Expected object, got string: {}",
                text
            )))
        }
        other => {
            return Err(CatalogError::Malformed(format!(
                "Expected object, got {}",
                json_type(&other)
            )))
        }
    };

    if let Some(error) = object.get("error") {
        return Err(error_from_envelope(error));
    }

    let items = match object.get("items") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => {
            return Err(CatalogError::Malformed(format!(
                "Expected list of items, got {}",
                json_type(other)
            )))
        }
    };

    let has_next = match object.get("next") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(next)) => !next.is_empty(),
        Some(_) => true,
    };

    Ok(PlaylistPage { items, has_next })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait::async_trait]
impl CatalogClient for SpotifyCatalogClient {
    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<PlaylistPage, CatalogError> {
        let url = format!("{}/playlists/{}/tracks", self.api_url, playlist_id);
        let body = self
            .get_json(
                &url,
                &[("limit", limit.to_string()), ("offset", offset.to_string())],
            )
            .await?;

        let page = parse_playlist_page(body)?;

        tracing::debug!(
            playlist_id = %playlist_id,
            offset,
            items = page.items.len(),
            has_next = page.has_next,
            provider = "spotify",
            "Playlist page fetched"
        );

        Ok(page)
    }

    async fn artist_genres(&self, artist_id: &str) -> Result<Vec<String>, CatalogError> {
        let url = format!("{}/artists/{}", self.api_url, artist_id);
        let body = self.get_json(&url, &[]).await?;

        if let Some(error) = body.get("error") {
            return Err(error_from_envelope(error));
        }

        let genres = body
            .get("genres")
            .and_then(Value::as_array)
            .map(|genres| {
                genres
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(genres)
    }
}
