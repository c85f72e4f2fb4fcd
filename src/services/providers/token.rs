use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    services::providers::{error_for_status, CatalogError},
};

/// Tokens are refreshed this long before the server-reported expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Client-credentials bearer token source with in-memory caching
///
/// Each refresh is a single request. Retrying is left to the caller's
/// `RetryPolicy`, which wraps the catalog call that needed the token.
pub struct TokenProvider {
    http_client: HttpClient,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(
        http_client: HttpClient,
        token_url: String,
        client_id: String,
        client_secret: String,
    ) -> AppResult<Self> {
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(AppError::Configuration(
                "Missing client_id or client_secret".to_string(),
            ));
        }

        Ok(Self {
            http_client,
            token_url,
            client_id,
            client_secret,
            cached: Mutex::new(None),
        })
    }

    pub fn from_config(config: &Config, http_client: HttpClient) -> AppResult<Self> {
        let (client_id, client_secret) = config.credentials()?;
        Self::new(
            http_client,
            config.spotify_token_url.clone(),
            client_id,
            client_secret,
        )
    }

    /// Returns a valid access token, requesting a new one when the cache is stale
    pub async fn access_token(&self) -> Result<String, CatalogError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.access_token.clone());
        }

        let response = self.request_token().await?;

        let token = CachedToken {
            access_token: response.access_token,
            expires_at: Utc::now() + token_lifetime(response.expires_in),
        };
        tracing::info!(expires_at = %token.expires_at, "Obtained client credentials token");

        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drops the cached token so the next call requests a fresh one
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn request_token(&self) -> Result<TokenResponse, CatalogError> {
        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TokenResponse>()
                .await
                .map_err(|e| CatalogError::Malformed(format!("Token response: {}", e)));
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, body = %body, "Failed to get token");

        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(CatalogError::Auth(format!("{}: {}", status, body)))
            }
            _ => Err(error_for_status(status, &headers, body)),
        }
    }

    #[cfg(test)]
    async fn seed(&self, access_token: &str, expires_at: DateTime<Utc>) {
        *self.cached.lock().await = Some(CachedToken {
            access_token: access_token.to_string(),
            expires_at,
        });
    }
}

/// How long a token is reused; short-lived tokens keep half their lifetime
fn token_lifetime(expires_in: i64) -> ChronoDuration {
    let secs = if expires_in > EXPIRY_MARGIN_SECS {
        expires_in - EXPIRY_MARGIN_SECS
    } else {
        expires_in.max(0) / 2
    };
    ChronoDuration::seconds(secs)
}
