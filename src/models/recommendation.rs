use serde::{Deserialize, Serialize};

/// One row of the recommendation artifact
///
/// Scores are raw cosine similarities in [-1, 1].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationEdge {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub recommended_id: String,
    pub recommended_name: String,
    pub recommended_artist: String,
    pub similarity_score: f64,
}
