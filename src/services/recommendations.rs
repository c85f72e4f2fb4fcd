use std::{collections::HashMap, path::Path};

use crate::{
    error::{AppError, AppResult},
    models::RecommendationEdge,
    storage,
};

/// Read-only view of the recommendation artifact
///
/// Edges keep artifact order, so the first `top_k` edges of a track are its
/// best-scored ones.
#[derive(Debug, Clone, Default)]
pub struct RecommendationIndex {
    edges: Vec<RecommendationEdge>,
    by_track: HashMap<String, Vec<usize>>,
}

impl RecommendationIndex {
    /// Loads the artifact; a missing file is a configuration error
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Configuration(format!(
                "Recommendation artifact not found at {}",
                path.display()
            )));
        }

        let edges: Vec<RecommendationEdge> = storage::read_rows(path)?;
        let index = Self::from_edges(edges);
        tracing::info!(
            path = %path.display(),
            edges = index.len(),
            tracks = index.track_count(),
            "Loaded recommendations"
        );
        Ok(index)
    }

    pub fn from_edges(edges: Vec<RecommendationEdge>) -> Self {
        let mut by_track: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, edge) in edges.iter().enumerate() {
            by_track
                .entry(edge.track_id.clone())
                .or_default()
                .push(position);
        }
        Self { edges, by_track }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn track_count(&self) -> usize {
        self.by_track.len()
    }

    /// Up to `top_k` stored edges for a track
    pub fn for_track(&self, track_id: &str, top_k: usize) -> AppResult<Vec<RecommendationEdge>> {
        let edges: Vec<RecommendationEdge> = self
            .by_track
            .get(track_id)
            .into_iter()
            .flatten()
            .take(top_k)
            .map(|&position| self.edges[position].clone())
            .collect();

        if edges.is_empty() {
            return Err(AppError::NotFound(format!(
                "No recommendations found for track_id {}",
                track_id
            )));
        }
        Ok(edges)
    }

    /// Up to `top_k` edges whose recommended track name contains `name`, ignoring case
    pub fn search_by_name(&self, name: &str, top_k: usize) -> AppResult<Vec<RecommendationEdge>> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Err(AppError::InvalidInput(
                "Track name must not be empty".to_string(),
            ));
        }

        let edges: Vec<RecommendationEdge> = self
            .edges
            .iter()
            .filter(|edge| edge.recommended_name.to_lowercase().contains(&needle))
            .take(top_k)
            .cloned()
            .collect();

        if edges.is_empty() {
            return Err(AppError::NotFound(format!(
                "No recommendations found for track name '{}'",
                name
            )));
        }
        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(track_id: &str, recommended_id: &str, name: &str, score: f64) -> RecommendationEdge {
        RecommendationEdge {
            track_id: track_id.to_string(),
            track_name: format!("song {}", track_id),
            artist_name: "band".to_string(),
            recommended_id: recommended_id.to_string(),
            recommended_name: name.to_string(),
            recommended_artist: "band".to_string(),
            similarity_score: score,
        }
    }

    fn index() -> RecommendationIndex {
        RecommendationIndex::from_edges(vec![
            edge("t1", "t2", "blue monday", 0.9),
            edge("t1", "t3", "true faith", 0.8),
            edge("t1", "t4", "regret", 0.7),
            edge("t1", "t5", "crystal", 0.6),
            edge("t2", "t1", "temptation", 0.9),
        ])
    }

    #[test]
    fn test_for_track_respects_top_k_and_order() {
        let edges = index().for_track("t1", 3).unwrap();
        let ids: Vec<&str> = edges.iter().map(|e| e.recommended_id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t3", "t4"]);
    }

    #[test]
    fn test_unknown_track_is_not_found() {
        assert!(matches!(
            index().for_track("missing", 5),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_zero_top_k_is_not_found() {
        assert!(index().for_track("t1", 0).is_err());
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let edges = index().search_by_name("MON", 5).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].recommended_name, "blue monday");

        let edges = index().search_by_name("r", 2).unwrap();
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn test_search_rejects_empty_name() {
        assert!(matches!(
            index().search_by_name("  ", 5),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_search_without_match_is_not_found() {
        assert!(matches!(
            index().search_by_name("atmosphere", 5),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_load_missing_artifact_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RecommendationIndex::load(&dir.path().join("recommend.csv")),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_round_trips_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recommend.csv");
        storage::replace_rows(&path, &index().edges).unwrap();

        let loaded = RecommendationIndex::load(&path).unwrap();

        assert_eq!(loaded.len(), 5);
        assert_eq!(loaded.track_count(), 2);
        assert_eq!(loaded.for_track("t2", 5).unwrap()[0].recommended_id, "t1");
    }
}
