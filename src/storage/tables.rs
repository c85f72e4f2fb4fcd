use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use crate::error::{AppError, AppResult};

/// Appends rows to a CSV table, writing the header only when the file is new
pub fn append_rows<T: Serialize>(path: &Path, rows: &[T]) -> AppResult<()> {
    ensure_parent(path)?;
    let write_header = !path.exists();

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    tracing::debug!(
        path = %path.display(),
        rows = rows.len(),
        header = write_header,
        "Appended rows"
    );

    Ok(())
}

/// Replaces a CSV table with the given rows
pub fn replace_rows<T: Serialize>(path: &Path, rows: &[T]) -> AppResult<()> {
    write_atomically(path, |tmp| {
        let mut writer = csv::Writer::from_path(tmp)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    })?;

    tracing::debug!(path = %path.display(), rows = rows.len(), "Replaced table");
    Ok(())
}

/// Reads every row of a CSV table
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> AppResult<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<Result<Vec<T>, _>>()?;
    Ok(rows)
}

/// Reads the header row of a CSV table
pub fn read_headers(path: &Path) -> AppResult<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

/// Writes to a sibling temp file, then renames it over `path`
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> AppResult<()>
where
    F: FnOnce(&Path) -> AppResult<()>,
{
    ensure_parent(path)?;
    let tmp = temp_path(path)?;

    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> AppResult<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| AppError::Internal(format!("Not a file path: {}", path.display())))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    Ok(path.with_file_name(tmp_name))
}

fn ensure_parent(path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Creates an empty file, used by tests to simulate a truncated dataset
#[cfg(test)]
pub(crate) fn touch(path: &Path) -> AppResult<()> {
    ensure_parent(path)?;
    fs::File::create(path)?;
    Ok(())
}
