use reqwest::Client as HttpClient;
use serde_json::Value;
use std::{
    collections::HashMap,
    fmt::Display,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::TrackRecord,
    services::{
        providers::{CatalogClient, CatalogError, SpotifyCatalogClient, TokenProvider},
        retry::{Classify, ErrorClass, RetryPolicy},
    },
    storage,
};

const DEFAULT_PAGE_SIZE: u32 = 100;
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Why a playlist item was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
enum SkipReason {
    NotAnObject,
    NoTrack,
    MissingField(&'static str),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotAnObject => write!(f, "item is not an object"),
            SkipReason::NoTrack => write!(f, "item has no track object"),
            SkipReason::MissingField(field) => write!(f, "missing required field '{}'", field),
        }
    }
}

/// A validated item awaiting genre enrichment
#[derive(Debug, Clone, PartialEq)]
struct ParsedTrack {
    record: TrackRecord,
    artist_id: Option<String>,
}

/// Fetches playlist items from the catalog and appends normalized rows to the tracks dataset
pub struct Crawler {
    client: Arc<dyn CatalogClient>,
    policy: RetryPolicy,
    tracks_path: PathBuf,
    page_size: u32,
}

impl Crawler {
    pub fn new(
        client: Arc<dyn CatalogClient>,
        policy: RetryPolicy,
        tracks_path: impl AsRef<Path>,
    ) -> Self {
        Self {
            client,
            policy,
            tracks_path: tracks_path.as_ref().to_path_buf(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Crawler backed by the Spotify Web API; fails without client credentials
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let policy = RetryPolicy::new(config.max_retries, config.retry_delay());
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        let tokens = TokenProvider::from_config(config, http_client.clone())?;
        let client = SpotifyCatalogClient::new(
            http_client,
            config.spotify_api_url.clone(),
            Arc::new(tokens),
        );

        Ok(Self::new(Arc::new(client), policy, config.artifact_paths().tracks())
            .with_page_size(config.page_size))
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn tracks_path(&self) -> &Path {
        &self.tracks_path
    }

    /// Crawls one playlist; returns whether any valid track was persisted
    ///
    /// Upstream failures abandon the playlist with `Ok(false)`. Only fatal
    /// catalog errors (bad credentials) and local I/O errors are `Err`.
    pub async fn crawl(&self, playlist_id: &str) -> AppResult<bool> {
        tracing::info!(playlist_id = %playlist_id, "Crawling playlist");

        let items = match self.fetch_playlist_items(playlist_id).await {
            Ok(items) => items,
            Err(e) => return Self::abandon(playlist_id, e),
        };

        if items.is_empty() {
            tracing::warn!(playlist_id = %playlist_id, "No tracks found for playlist");
            return Ok(false);
        }

        let mut genre_cache: HashMap<String, String> = HashMap::new();
        let mut records = Vec::with_capacity(items.len());

        for item in &items {
            let parsed = match parse_item(playlist_id, item) {
                Ok(parsed) => parsed,
                Err(reason) => {
                    tracing::warn!(
                        playlist_id = %playlist_id,
                        reason = %reason,
                        "Skipping invalid playlist item"
                    );
                    continue;
                }
            };

            let mut record = parsed.record;
            if let Some(artist_id) = parsed.artist_id {
                record.artist_genres = self
                    .artist_genres(playlist_id, &artist_id, &mut genre_cache)
                    .await;
            }
            records.push(record);
        }

        if records.is_empty() {
            tracing::warn!(
                playlist_id = %playlist_id,
                items = items.len(),
                "No valid tracks found for playlist"
            );
            return Ok(false);
        }

        storage::append_rows(&self.tracks_path, &records)?;

        tracing::info!(
            playlist_id = %playlist_id,
            saved = records.len(),
            skipped = items.len() - records.len(),
            path = %self.tracks_path.display(),
            "Saved playlist tracks"
        );

        Ok(true)
    }

    /// Follows the offset cursor until the API reports no further page
    async fn fetch_playlist_items(&self, playlist_id: &str) -> Result<Vec<Value>, CatalogError> {
        let client = &self.client;
        let limit = self.page_size;
        let mut items = Vec::new();
        let mut offset = 0u32;

        loop {
            tracing::debug!(playlist_id = %playlist_id, offset, "Fetching playlist page");

            let page = self
                .policy
                .run("playlist_tracks", move || {
                    client.playlist_tracks(playlist_id, limit, offset)
                })
                .await?;

            if page.items.is_empty() {
                break;
            }

            offset += page.items.len() as u32;
            items.extend(page.items);

            if !page.has_next {
                break;
            }
        }

        tracing::info!(playlist_id = %playlist_id, items = items.len(), "Fetched playlist items");
        Ok(items)
    }

    /// Comma-joined genres for the artist; lookup failures degrade to no genres
    async fn artist_genres(
        &self,
        playlist_id: &str,
        artist_id: &str,
        cache: &mut HashMap<String, String>,
    ) -> String {
        if let Some(genres) = cache.get(artist_id) {
            return genres.clone();
        }

        let client = &self.client;
        match self
            .policy
            .run("artist_genres", move || client.artist_genres(artist_id))
            .await
        {
            Ok(genres) => {
                let joined = genres.join(",");
                cache.insert(artist_id.to_string(), joined.clone());
                joined
            }
            Err(e) => {
                tracing::warn!(
                    playlist_id = %playlist_id,
                    artist_id = %artist_id,
                    error = %e,
                    "Error fetching artist genres"
                );
                // Remember the miss so later tracks by this artist skip the lookup
                cache.insert(artist_id.to_string(), String::new());
                String::new()
            }
        }
    }

    fn abandon(playlist_id: &str, error: CatalogError) -> AppResult<bool> {
        match error.classify() {
            ErrorClass::Fatal => {
                tracing::error!(
                    playlist_id = %playlist_id,
                    error = %error,
                    "Fatal catalog error"
                );
                Err(AppError::Configuration(error.to_string()))
            }
            _ => {
                tracing::warn!(
                    playlist_id = %playlist_id,
                    error = %error,
                    "Abandoning playlist"
                );
                Ok(false)
            }
        }
    }
}

/// Extracts a track record from one raw playlist item
fn parse_item(playlist_id: &str, item: &Value) -> Result<ParsedTrack, SkipReason> {
    let item = item.as_object().ok_or(SkipReason::NotAnObject)?;
    let track = item
        .get("track")
        .and_then(Value::as_object)
        .filter(|track| !track.is_empty())
        .ok_or(SkipReason::NoTrack)?;

    let primary_artist = track
        .get("artists")
        .and_then(Value::as_array)
        .and_then(|artists| artists.first())
        .and_then(Value::as_object);

    let track_id = non_empty_str(track.get("id")).ok_or(SkipReason::MissingField("id"))?;
    let track_name = non_empty_str(track.get("name")).ok_or(SkipReason::MissingField("name"))?;
    let artist_name = non_empty_str(primary_artist.and_then(|a| a.get("name")))
        .ok_or(SkipReason::MissingField("artist name"))?;
    let popularity = track
        .get("popularity")
        .and_then(Value::as_u64)
        .filter(|p| *p <= 100)
        .ok_or(SkipReason::MissingField("popularity"))? as u8;
    let explicit = track
        .get("explicit")
        .and_then(Value::as_bool)
        .ok_or(SkipReason::MissingField("explicit"))?;

    let release_date = non_empty_str(
        track
            .get("album")
            .and_then(Value::as_object)
            .and_then(|album| album.get("release_date")),
    );
    let external_url = non_empty_str(
        track
            .get("external_urls")
            .and_then(Value::as_object)
            .and_then(|urls| urls.get("spotify")),
    );
    let artist_id = non_empty_str(primary_artist.and_then(|a| a.get("id")));

    Ok(ParsedTrack {
        record: TrackRecord {
            playlist_id: playlist_id.to_string(),
            track_id,
            track_name,
            artist_name,
            release_date,
            popularity,
            explicit,
            external_url,
            artist_genres: String::new(),
        },
        artist_id,
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
