use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::RecommendationEdge,
};

use super::AppState;

const DEFAULT_TOP_K: usize = 5;

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to the track recommendation API" }))
}

/// Stored recommendations for one track
pub async fn recommend(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    Query(params): Query<RecommendQuery>,
) -> AppResult<Json<Vec<RecommendationEdge>>> {
    let edges = state.index.for_track(&track_id, params.top_k)?;
    tracing::debug!(track_id = %track_id, results = edges.len(), "Recommendations served");
    Ok(Json(edges))
}

/// Recommendations whose recommended track name contains `name`
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<Vec<RecommendationEdge>>> {
    let name = params
        .name
        .ok_or_else(|| AppError::InvalidInput("Query parameter 'name' is required".to_string()))?;
    let edges = state.index.search_by_name(&name, params.top_k)?;
    tracing::debug!(name = %name, results = edges.len(), "Search served");
    Ok(Json(edges))
}
