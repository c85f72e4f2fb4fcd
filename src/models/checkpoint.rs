use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Crawl outcome recorded for a playlist
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    /// Registered but never crawled
    Pending,
    /// Crawled and at least one valid track persisted
    Done,
    /// Last crawl attempt produced nothing usable
    Failed,
}

impl Display for CheckpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointStatus::Pending => write!(f, "pending"),
            CheckpointStatus::Done => write!(f, "done"),
            CheckpointStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One row of the checkpoint table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistCheckpoint {
    pub playlist_id: String,
    pub status: CheckpointStatus,
}

/// Playlist id → status mapping, kept in registration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointState {
    rows: Vec<PlaylistCheckpoint>,
}

impl CheckpointState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from persisted rows, keeping the first row for any repeated id
    pub fn from_rows(rows: Vec<PlaylistCheckpoint>) -> Self {
        let mut state = Self::new();
        for row in rows {
            if state.contains(&row.playlist_id) {
                tracing::warn!(
                    playlist_id = %row.playlist_id,
                    "Duplicate checkpoint row ignored"
                );
                continue;
            }
            state.rows.push(row);
        }
        state
    }

    pub fn rows(&self) -> &[PlaylistCheckpoint] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, playlist_id: &str) -> bool {
        self.status(playlist_id).is_some()
    }

    pub fn status(&self, playlist_id: &str) -> Option<CheckpointStatus> {
        self.rows
            .iter()
            .find(|row| row.playlist_id == playlist_id)
            .map(|row| row.status)
    }

    /// Adds the id as pending; returns false if it was already known
    pub fn insert_pending(&mut self, playlist_id: &str) -> bool {
        if self.contains(playlist_id) {
            return false;
        }
        self.rows.push(PlaylistCheckpoint {
            playlist_id: playlist_id.to_string(),
            status: CheckpointStatus::Pending,
        });
        true
    }

    /// Updates the status of a known id; returns false if the id is unknown
    pub fn set_status(&mut self, playlist_id: &str, status: CheckpointStatus) -> bool {
        match self
            .rows
            .iter_mut()
            .find(|row| row.playlist_id == playlist_id)
        {
            Some(row) => {
                row.status = status;
                true
            }
            None => false,
        }
    }

    /// Ids that still need crawling: everything not marked done
    pub fn unfinished(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|row| row.status != CheckpointStatus::Done)
            .map(|row| row.playlist_id.clone())
            .collect()
    }
}
