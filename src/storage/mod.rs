//! Flat-file persistence for pipeline artifacts
//!
//! Every artifact is a single file under the data directory. Tables are CSV
//! with a header row; the feature matrix is JSON. Whole-file replacements go
//! through a temp file and a rename so readers never see a half-written file.
pub mod checkpoint;
pub mod matrix;
pub mod tables;

pub use checkpoint::CheckpointStore;
pub use matrix::{load_matrix, save_matrix};
pub use tables::{append_rows, read_headers, read_rows, replace_rows};
