use std::path::{Path, PathBuf};

use crate::{
    config::ArtifactPaths,
    error::{AppError, AppResult},
    models::{CheckpointStatus, CleanTrackRecord},
    services::{crawler::Crawler, features, similarity},
    storage::{self, CheckpointStore},
};

/// Outcome of one crawl stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Outcome of a full pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub crawl: CrawlSummary,
    pub features_path: PathBuf,
    pub edges: usize,
}

/// Drives the crawl, feature and similarity stages over the artifact directory
///
/// Stages run strictly in order; each one reads the artifacts the previous
/// one persisted.
pub struct Pipeline {
    paths: ArtifactPaths,
    checkpoints: CheckpointStore,
    crawler: Option<Crawler>,
    top_k: usize,
}

impl Pipeline {
    pub fn new(paths: ArtifactPaths, top_k: usize) -> Self {
        Self {
            checkpoints: CheckpointStore::new(paths.checkpoint()),
            paths,
            crawler: None,
            top_k,
        }
    }

    /// Only the crawl stage needs a catalog client
    pub fn with_crawler(mut self, crawler: Crawler) -> Self {
        self.crawler = Some(crawler);
        self
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Crawls every playlist not yet marked done, saving the checkpoint after each one
    pub async fn crawl_pending(&self) -> AppResult<CrawlSummary> {
        let crawler = self.crawler.as_ref().ok_or_else(|| {
            AppError::Configuration("Crawl stage requires catalog credentials".to_string())
        })?;

        let mut state = self.checkpoints.load()?;
        let pending = state.unfinished();
        tracing::info!(pending = pending.len(), "Starting crawl stage");

        let mut summary = CrawlSummary::default();
        for playlist_id in pending {
            summary.attempted += 1;
            let outcome = crawler.crawl(&playlist_id).await;

            let status = match outcome {
                Ok(true) => CheckpointStatus::Done,
                _ => CheckpointStatus::Failed,
            };
            state.set_status(&playlist_id, status);
            self.checkpoints.save(&state)?;

            match outcome {
                Ok(true) => summary.succeeded += 1,
                Ok(false) => summary.failed += 1,
                Err(e @ AppError::Configuration(_)) => {
                    tracing::error!(playlist_id = %playlist_id, error = %e, "Aborting crawl stage");
                    return Err(e);
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        playlist_id = %playlist_id,
                        error = %e,
                        "Error crawling playlist"
                    );
                }
            }

            tracing::info!(playlist_id = %playlist_id, status = %status, "Updated checkpoint");
        }

        tracing::info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Crawl stage completed"
        );
        Ok(summary)
    }

    /// Builds the clean table and feature matrix; returns the feature matrix path
    pub fn build_features(&self) -> AppResult<PathBuf> {
        let tracks_path = self.paths.tracks();
        require_file(&tracks_path, "Tracks dataset")?;

        let tracks = features::read_tracks(&tracks_path)?;
        if tracks.is_empty() {
            return Err(AppError::Configuration(format!(
                "Tracks dataset {} is empty",
                tracks_path.display()
            )));
        }

        let (clean, matrix) = features::build(&tracks)?;

        let features_path = self.paths.features();
        storage::replace_rows(&self.paths.clean_tracks(), &clean)?;
        storage::save_matrix(&features_path, &matrix)?;

        tracing::info!(
            tracks = clean.len(),
            features = %features_path.display(),
            "Feature stage completed"
        );
        Ok(features_path)
    }

    /// Scores the handed-over feature matrix and replaces the recommendation table
    ///
    /// Returns the number of edges written.
    pub fn score(&self, features_path: Option<&Path>) -> AppResult<usize> {
        let features_path = features_path.ok_or_else(|| {
            AppError::Configuration("No feature matrix path handed to the scoring stage".to_string())
        })?;
        require_file(features_path, "Feature matrix")?;

        let clean_path = self.paths.clean_tracks();
        require_file(&clean_path, "Clean track table")?;

        let matrix = storage::load_matrix(features_path)?;
        let tracks: Vec<CleanTrackRecord> = storage::read_rows(&clean_path)?;

        let edges = similarity::score(&tracks, &matrix, self.top_k)?;

        let recommendations_path = self.paths.recommendations();
        storage::replace_rows(&recommendations_path, &edges)?;

        tracing::info!(
            edges = edges.len(),
            path = %recommendations_path.display(),
            "Scoring stage completed"
        );
        Ok(edges.len())
    }

    /// Runs crawl, feature building and scoring in order
    pub async fn run(&self) -> AppResult<RunReport> {
        let crawl = self.crawl_pending().await?;
        let features_path = self.build_features()?;
        let edges = self.score(Some(&features_path))?;

        Ok(RunReport {
            crawl,
            features_path,
            edges,
        })
    }
}

fn require_file(path: &Path, what: &str) -> AppResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        tracing::error!(path = %path.display(), "{} not found", what);
        Err(AppError::Configuration(format!(
            "{} not found at {}",
            what,
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{RecommendationEdge, TrackRecord},
        services::{
            providers::{CatalogError, MockCatalogClient, PlaylistPage},
            retry::RetryPolicy,
        },
    };
    use serde_json::json;
    use std::sync::Arc;

    fn item(id: &str, artist_id: &str) -> serde_json::Value {
        json!({
            "track": {
                "id": id,
                "name": format!("Song {}", id),
                "popularity": 30,
                "explicit": false,
                "album": {"release_date": "2019"},
                "artists": [{"id": artist_id, "name": "Artist"}]
            }
        })
    }

    fn pipeline_with(mock: MockCatalogClient, dir: &tempfile::TempDir) -> Pipeline {
        let paths = ArtifactPaths::new(dir.path());
        let crawler = Crawler::new(Arc::new(mock), RetryPolicy::immediate(2), paths.tracks());
        Pipeline::new(paths, 2).with_crawler(crawler)
    }

    fn track(id: &str, genres: &str, popularity: u8) -> TrackRecord {
        TrackRecord {
            playlist_id: "p1".to_string(),
            track_id: id.to_string(),
            track_name: format!("Song {}", id),
            artist_name: "Artist".to_string(),
            release_date: Some("2021-03".to_string()),
            popularity,
            explicit: false,
            external_url: None,
            artist_genres: genres.to_string(),
        }
    }

    #[tokio::test]
    async fn test_crawl_marks_done_and_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockCatalogClient::new();
        mock.expect_playlist_tracks().returning(|playlist_id, _, _| {
            if playlist_id == "good" {
                Ok(PlaylistPage {
                    items: vec![item("t1", "a1")],
                    has_next: false,
                })
            } else {
                Err(CatalogError::NotFound(playlist_id.to_string()))
            }
        });
        mock.expect_artist_genres()
            .returning(|_| Ok(vec!["pop".to_string()]));

        let pipeline = pipeline_with(mock, &dir);
        pipeline.checkpoints().register(["good", "gone"]).unwrap();

        let summary = pipeline.crawl_pending().await.unwrap();

        assert_eq!(
            summary,
            CrawlSummary {
                attempted: 2,
                succeeded: 1,
                failed: 1
            }
        );
        let state = pipeline.checkpoints().load().unwrap();
        assert_eq!(state.status("good"), Some(CheckpointStatus::Done));
        assert_eq!(state.status("gone"), Some(CheckpointStatus::Failed));
    }

    #[tokio::test]
    async fn test_crawl_skips_done_and_retries_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockCatalogClient::new();
        mock.expect_playlist_tracks()
            .withf(|playlist_id, _, _| playlist_id == "retry")
            .times(1)
            .returning(|_, _, _| {
                Ok(PlaylistPage {
                    items: vec![item("t2", "a1")],
                    has_next: false,
                })
            });
        mock.expect_artist_genres().returning(|_| Ok(vec![]));

        let pipeline = pipeline_with(mock, &dir);
        let checkpoints = pipeline.checkpoints();
        checkpoints.register(["finished", "retry"]).unwrap();
        let mut state = checkpoints.load().unwrap();
        state.set_status("finished", CheckpointStatus::Done);
        state.set_status("retry", CheckpointStatus::Failed);
        checkpoints.save(&state).unwrap();

        let summary = pipeline.crawl_pending().await.unwrap();

        assert_eq!(summary.attempted, 1);
        assert_eq!(
            checkpoints.load().unwrap().status("retry"),
            Some(CheckpointStatus::Done)
        );
    }

    #[tokio::test]
    async fn test_auth_failure_aborts_after_saving_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockCatalogClient::new();
        mock.expect_playlist_tracks()
            .times(1)
            .returning(|_, _, _| Err(CatalogError::Auth("invalid_client".to_string())));

        let pipeline = pipeline_with(mock, &dir);
        pipeline.checkpoints().register(["p1", "p2"]).unwrap();

        let result = pipeline.crawl_pending().await;

        assert!(matches!(result, Err(AppError::Configuration(_))));
        let state = pipeline.checkpoints().load().unwrap();
        assert_eq!(state.status("p1"), Some(CheckpointStatus::Failed));
        assert_eq!(state.status("p2"), Some(CheckpointStatus::Pending));
    }

    #[tokio::test]
    async fn test_crawl_without_client_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(ArtifactPaths::new(dir.path()), 10);
        assert!(matches!(
            pipeline.crawl_pending().await,
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_features_requires_tracks_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(ArtifactPaths::new(dir.path()), 10);
        assert!(matches!(
            pipeline.build_features(),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_features_rejects_header_only_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        std::fs::write(
            paths.tracks(),
            "playlist_id,track_id,track_name,artist_name,release_date,popularity,explicit,external_url,artist_genres\n",
        )
        .unwrap();

        let pipeline = Pipeline::new(paths, 10);
        assert!(matches!(
            pipeline.build_features(),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_features_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        storage::tables::touch(&paths.tracks()).unwrap();

        let pipeline = Pipeline::new(paths, 10);
        assert!(matches!(
            pipeline.build_features(),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_score_requires_handoff() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(ArtifactPaths::new(dir.path()), 10);
        assert!(matches!(
            pipeline.score(None),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_features_then_score_writes_recommendations() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        storage::append_rows(
            &paths.tracks(),
            &[
                track("a", "pop,rock", 80),
                track("b", "pop", 60),
                track("c", "jazz", 40),
                track("a", "pop,rock", 80),
            ],
        )
        .unwrap();

        let pipeline = Pipeline::new(paths.clone(), 2);
        let features_path = pipeline.build_features().unwrap();
        let edges = pipeline.score(Some(&features_path)).unwrap();

        assert_eq!(edges, 6);
        let written: Vec<RecommendationEdge> = storage::read_rows(&paths.recommendations()).unwrap();
        assert_eq!(written.len(), 6);
        assert_eq!(written[0].track_id, "a");
        assert_eq!(written[0].recommended_id, "b");
        assert!(written.iter().all(|e| e.track_id != e.recommended_id));
    }
}
