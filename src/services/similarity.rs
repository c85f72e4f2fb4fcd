use std::cmp::Ordering;

use crate::{
    error::{AppError, AppResult},
    models::{CleanTrackRecord, FeatureMatrix, RecommendationEdge},
};

/// Genre placeholder column plus popularity and explicit
const DEGRADED_FEATURE_COLUMNS: usize = 3;
const PROGRESS_EVERY: usize = 100;

/// Scores every track against every other one and keeps the `top_k` best per track
///
/// Pairwise cosine similarity is quadratic in the number of tracks.
pub fn score(
    tracks: &[CleanTrackRecord],
    features: &FeatureMatrix,
    top_k: usize,
) -> AppResult<Vec<RecommendationEdge>> {
    features.validate()?;

    if features.rows() != tracks.len() {
        tracing::error!(
            matrix_rows = features.rows(),
            tracks = tracks.len(),
            "Feature matrix and track table are not aligned"
        );
        return Err(AppError::Invariant(format!(
            "Feature matrix has {} rows but the track table has {}",
            features.rows(),
            tracks.len()
        )));
    }

    if features.cols() == DEGRADED_FEATURE_COLUMNS {
        tracing::warn!(
            cols = features.cols(),
            "Feature matrix has only placeholder genre features, similarity may be less accurate"
        );
    }

    let norms = features.row_norms();
    let total = tracks.len();
    let mut edges = Vec::with_capacity(total * top_k.min(total.saturating_sub(1)));
    let mut skipped = 0usize;

    tracing::info!(tracks = total, top_k, "Computing pairwise similarity");

    for row in 0..total {
        match row_edges(tracks, features, &norms, row, top_k) {
            Ok(row_edges) => edges.extend(row_edges),
            Err(e) => {
                skipped += 1;
                tracing::error!(row, error = %e, "Failed to score track, skipping");
            }
        }

        if (row + 1) % PROGRESS_EVERY == 0 {
            tracing::info!(processed = row + 1, total, "Similarity progress");
        }
    }

    tracing::info!(edges = edges.len(), skipped, "Generated recommendations");
    Ok(edges)
}

/// Cosine similarity of every row against `row`, with the diagonal forced to -1
fn similarities(features: &FeatureMatrix, norms: &[f64], row: usize) -> Vec<f64> {
    (0..features.rows())
        .map(|other| {
            if other == row {
                return -1.0;
            }
            let denominator = norms[row] * norms[other];
            if denominator == 0.0 {
                0.0
            } else {
                features.row_dot(row, other) / denominator
            }
        })
        .collect()
}

/// Indices of the `top_k` highest scores, excluding `row`
///
/// Equal scores keep ascending column order.
fn top_indices(scores: &[f64], row: usize, top_k: usize) -> Vec<usize> {
    let mut candidates: Vec<usize> = (0..scores.len()).filter(|&i| i != row).collect();
    candidates.sort_by(|&a, &b| match scores[b].total_cmp(&scores[a]) {
        Ordering::Equal => a.cmp(&b),
        other => other,
    });
    candidates.truncate(top_k);
    candidates
}

fn row_edges(
    tracks: &[CleanTrackRecord],
    features: &FeatureMatrix,
    norms: &[f64],
    row: usize,
    top_k: usize,
) -> AppResult<Vec<RecommendationEdge>> {
    let source = tracks
        .get(row)
        .ok_or_else(|| AppError::Invariant(format!("No track at row {}", row)))?;
    let scores = similarities(features, norms, row);

    top_indices(&scores, row, top_k)
        .into_iter()
        .map(|target| {
            let recommended = tracks
                .get(target)
                .ok_or_else(|| AppError::Invariant(format!("No track at row {}", target)))?;
            let similarity_score = scores[target];
            if !similarity_score.is_finite() {
                return Err(AppError::Invariant(format!(
                    "Non-finite similarity between rows {} and {}",
                    row, target
                )));
            }
            Ok(RecommendationEdge {
                track_id: source.track_id.clone(),
                track_name: source.track_name.clone(),
                artist_name: source.artist_name.clone(),
                recommended_id: recommended.track_id.clone(),
                recommended_name: recommended.track_name.clone(),
                recommended_artist: recommended.artist_name.clone(),
                similarity_score,
            })
        })
        .collect()
}
