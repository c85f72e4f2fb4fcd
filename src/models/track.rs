use serde::{Deserialize, Serialize};

/// Columns the feature stage requires in the raw tracks dataset
pub const REQUIRED_TRACK_COLUMNS: [&str; 7] = [
    "track_id",
    "track_name",
    "artist_name",
    "release_date",
    "popularity",
    "explicit",
    "artist_genres",
];

/// Normalized track row appended to the tracks dataset by the crawler
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackRecord {
    pub playlist_id: String,
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    /// Release date at whatever precision the catalog reports
    pub release_date: Option<String>,
    pub popularity: u8,
    pub explicit: bool,
    pub external_url: Option<String>,
    /// Comma-joined genre tokens of the primary artist, possibly empty
    pub artist_genres: String,
}

/// Tracks dataset row as read back for feature building
///
/// Every field is optional: the dataset is append-only and may hold rows
/// written by older crawls, so validation happens in the feature stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawTrackRow {
    #[serde(default)]
    pub playlist_id: Option<String>,
    pub track_id: Option<String>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub release_date: Option<String>,
    pub popularity: Option<String>,
    pub explicit: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
    pub artist_genres: Option<String>,
}

impl From<TrackRecord> for RawTrackRow {
    fn from(record: TrackRecord) -> Self {
        Self {
            playlist_id: Some(record.playlist_id),
            track_id: Some(record.track_id),
            track_name: Some(record.track_name),
            artist_name: Some(record.artist_name),
            release_date: record.release_date,
            popularity: Some(record.popularity.to_string()),
            explicit: Some(record.explicit.to_string()),
            external_url: record.external_url,
            artist_genres: Some(record.artist_genres),
        }
    }
}

/// Cleaned, deduplicated track; row order matches the feature matrix
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanTrackRecord {
    pub playlist_id: Option<String>,
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    /// Always `YYYY-MM-DD`
    pub release_date: String,
    pub year: i32,
    pub month: u32,
    pub popularity: f64,
    pub popularity_scaled: f64,
    pub explicit_flag: u8,
    pub external_url: Option<String>,
    pub artist_genres: String,
}
