//! Music catalog provider abstraction
//!
//! The crawler only needs paginated playlist items and per-artist genres.
//! Providers own authentication; callers receive a ready client.
use reqwest::{header::HeaderMap, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::services::retry::{Classify, ErrorClass};

pub mod spotify;
pub mod token;

pub use spotify::SpotifyCatalogClient;
pub use token::TokenProvider;

/// Upstream catalog failures, classified for the retry policy
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("Rate limited by catalog API (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed catalog response: {0}")]
    Malformed(String),

    #[error("Catalog API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Catalog transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Catalog authentication failed: {0}")]
    Auth(String),
}

impl Classify for CatalogError {
    fn classify(&self) -> ErrorClass {
        match self {
            CatalogError::RateLimited { retry_after } => ErrorClass::RateLimited(*retry_after),
            CatalogError::Transport(_) => ErrorClass::Retryable,
            // 401 means our cached token went stale; the next attempt fetches a new one
            CatalogError::Api { status, .. } if *status >= 500 || *status == 401 => {
                ErrorClass::Retryable
            }
            CatalogError::Api { .. } | CatalogError::NotFound(_) | CatalogError::Malformed(_) => {
                ErrorClass::AbandonUnit
            }
            CatalogError::Auth(_) => ErrorClass::Fatal,
        }
    }
}

/// One page of raw playlist items
///
/// Items stay untyped so the crawler can skip malformed entries one by one
/// instead of rejecting the whole page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistPage {
    pub items: Vec<Value>,
    pub has_next: bool,
}

/// Trait for music catalog providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch one page of playlist items starting at `offset`
    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<PlaylistPage, CatalogError>;

    /// Fetch the genre tags of an artist
    async fn artist_genres(&self, artist_id: &str) -> Result<Vec<String>, CatalogError>;
}

/// Maps a non-success HTTP status to a catalog error
pub(crate) fn error_for_status(
    status: StatusCode,
    headers: &HeaderMap,
    body: String,
) -> CatalogError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => CatalogError::RateLimited {
            retry_after: parse_retry_after(headers),
        },
        StatusCode::NOT_FOUND => CatalogError::NotFound(body),
        _ => CatalogError::Api {
            status: status.as_u16(),
            message: body,
        },
    }
}

/// Maps an `{"error": {"status", "message"}}` envelope delivered with a 2xx status
pub(crate) fn error_from_envelope(error: &Value) -> CatalogError {
    let status = error.get("status").and_then(Value::as_u64).unwrap_or(0);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown error")
        .to_string();

    match status {
        404 => CatalogError::NotFound(message),
        429 => CatalogError::RateLimited { retry_after: None },
        _ => CatalogError::Api {
            status: u16::try_from(status).unwrap_or(0),
            message,
        },
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
