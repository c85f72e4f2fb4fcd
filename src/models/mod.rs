pub mod checkpoint;
pub mod recommendation;
pub mod sparse;
pub mod track;

pub use checkpoint::{CheckpointState, CheckpointStatus, PlaylistCheckpoint};
pub use recommendation::RecommendationEdge;
pub use sparse::FeatureMatrix;
pub use track::{CleanTrackRecord, RawTrackRow, TrackRecord, REQUIRED_TRACK_COLUMNS};
