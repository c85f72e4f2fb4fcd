use std::{path::Path, sync::Arc};

use crate::{error::AppResult, services::RecommendationIndex};

/// Shared application state
///
/// The recommendation artifact is loaded once at startup and never mutated.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<RecommendationIndex>,
}

impl AppState {
    pub fn new(index: RecommendationIndex) -> Self {
        Self {
            index: Arc::new(index),
        }
    }

    /// Loads the recommendation artifact at `path`
    pub fn load(path: &Path) -> AppResult<Self> {
        RecommendationIndex::load(path).map(Self::new)
    }
}
