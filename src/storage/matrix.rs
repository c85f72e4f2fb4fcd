use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use crate::{error::AppResult, models::FeatureMatrix, storage::tables::write_atomically};

/// Serializes the feature matrix, replacing any previous file
pub fn save_matrix(path: &Path, matrix: &FeatureMatrix) -> AppResult<()> {
    write_atomically(path, |tmp| {
        let mut writer = BufWriter::new(File::create(tmp)?);
        serde_json::to_writer(&mut writer, matrix)?;
        writer.flush()?;
        Ok(())
    })?;

    tracing::info!(
        path = %path.display(),
        rows = matrix.rows(),
        cols = matrix.cols(),
        nnz = matrix.nnz(),
        "Saved feature matrix"
    );
    Ok(())
}

/// Loads a feature matrix and checks it is a well-formed CSR matrix
pub fn load_matrix(path: &Path) -> AppResult<FeatureMatrix> {
    let reader = BufReader::new(File::open(path)?);
    let matrix: FeatureMatrix = serde_json::from_reader(reader)?;
    matrix.validate()?;

    tracing::info!(
        path = %path.display(),
        rows = matrix.rows(),
        cols = matrix.cols(),
        "Loaded feature matrix"
    );
    Ok(matrix)
}
