use std::path::{Path, PathBuf};

use crate::{
    error::AppResult,
    models::{CheckpointState, PlaylistCheckpoint},
    storage::tables,
};

/// Durable playlist id → crawl status table
///
/// Single-writer: concurrent pipeline runs must be serialized by the caller.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads persisted state; a missing file is an empty state
    pub fn load(&self) -> AppResult<CheckpointState> {
        if !self.path.exists() {
            tracing::warn!(
                path = %self.path.display(),
                "Checkpoint file not found, starting empty"
            );
            return Ok(CheckpointState::new());
        }

        let rows: Vec<PlaylistCheckpoint> = tables::read_rows(&self.path)?;
        let state = CheckpointState::from_rows(rows);
        tracing::info!(playlists = state.len(), "Loaded checkpoint");
        Ok(state)
    }

    /// Atomically replaces the persisted state
    pub fn save(&self, state: &CheckpointState) -> AppResult<()> {
        tracing::info!(playlists = state.len(), "Saving checkpoint");
        tables::replace_rows(&self.path, state.rows())
    }

    /// Registers unseen ids as pending; returns how many were added
    ///
    /// Known ids keep their status. Nothing is written when every id is known.
    pub fn register<I, S>(&self, new_ids: I) -> AppResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.load()?;
        let added = new_ids
            .into_iter()
            .filter(|id| state.insert_pending(id.as_ref()))
            .count();

        if added == 0 {
            tracing::info!("No new playlist IDs to add");
            return Ok(0);
        }

        tracing::info!(added, "Adding new playlist IDs to checkpoint");
        self.save(&state)?;
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckpointStatus;
    use std::fs;

    fn store_in(dir: &tempfile::TempDir) -> CheckpointStore {
        CheckpointStore::new(dir.path().join("playlist_ids_checkpoint.csv"))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_register_adds_new_ids_as_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.register(["p1", "p2"]).unwrap(), 2);

        let state = store.load().unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state.status("p1"), Some(CheckpointStatus::Pending));
        assert_eq!(state.status("p2"), Some(CheckpointStatus::Pending));
    }

    #[test]
    fn test_register_preserves_existing_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.register(["p1"]).unwrap();

        let mut state = store.load().unwrap();
        state.set_status("p1", CheckpointStatus::Done);
        store.save(&state).unwrap();

        assert_eq!(store.register(["p1", "p2"]).unwrap(), 1);

        let state = store.load().unwrap();
        assert_eq!(state.status("p1"), Some(CheckpointStatus::Done));
        assert_eq!(state.status("p2"), Some(CheckpointStatus::Pending));
    }

    #[test]
    fn test_register_twice_is_noop_without_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.register(["p1", "p2"]).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        let modified = fs::metadata(store.path()).unwrap().modified().unwrap();
        assert_eq!(store.register(["p2", "p1"]).unwrap(), 0);

        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
        assert_eq!(
            fs::metadata(store.path()).unwrap().modified().unwrap(),
            modified
        );
    }

    #[test]
    fn test_register_deduplicates_within_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.register(["p1", "p1", "p1"]).unwrap(), 1);
        assert_eq!(store.load().unwrap().len(), 1);
    }
}
