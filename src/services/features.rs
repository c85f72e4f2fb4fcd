use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
    sync::LazyLock,
};

use crate::{
    error::{AppError, AppResult},
    models::{CleanTrackRecord, FeatureMatrix, RawTrackRow, REQUIRED_TRACK_COLUMNS},
    storage,
};

pub const DEFAULT_RELEASE_DATE: &str = "1970-01-01";

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));
static YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("valid regex"));
static FULL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Reads the raw tracks dataset, failing if any required column is absent
pub fn read_tracks(path: &Path) -> AppResult<Vec<RawTrackRow>> {
    let headers = storage::read_headers(path)?;
    let missing: Vec<&str> = REQUIRED_TRACK_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == column))
        .collect();

    if !missing.is_empty() {
        tracing::error!(path = %path.display(), missing = ?missing, "Missing required columns");
        return Err(AppError::Configuration(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }

    storage::read_rows(path)
}

/// Cleans the raw tracks and encodes them as a feature matrix
///
/// Row `i` of the matrix describes `clean[i]`. Columns are the genre TF-IDF
/// block followed by scaled popularity and the explicit flag.
pub fn build(tracks: &[RawTrackRow]) -> AppResult<(Vec<CleanTrackRecord>, FeatureMatrix)> {
    tracing::info!(rows = tracks.len(), "Building features");

    let unique = dedup(tracks);
    tracing::info!(rows = unique.len(), "After dropping incomplete and duplicate rows");

    if unique.is_empty() {
        return Err(AppError::Invariant(
            "No valid data after cleaning".to_string(),
        ));
    }

    let popularity: Vec<f64> = unique
        .iter()
        .map(|row| parse_popularity(row.popularity.as_deref()))
        .collect();
    let popularity_scaled = min_max_scale(&popularity);

    let clean: Vec<CleanTrackRecord> = unique
        .iter()
        .zip(popularity.iter().zip(&popularity_scaled))
        .map(|(row, (&popularity, &popularity_scaled))| {
            let release_date = repair_date(row.release_date.as_deref());
            let (year, month) = year_month(&release_date);
            CleanTrackRecord {
                playlist_id: row.playlist_id.clone(),
                track_id: row.track_id.clone().unwrap_or_default(),
                track_name: clean_text(row.track_name.as_deref().unwrap_or_default()),
                artist_name: clean_text(row.artist_name.as_deref().unwrap_or_default()),
                release_date,
                year,
                month,
                popularity,
                popularity_scaled,
                explicit_flag: explicit_flag(row.explicit.as_deref()),
                external_url: row.external_url.clone(),
                artist_genres: row.artist_genres.clone().unwrap_or_default(),
            }
        })
        .collect();

    let genres: Vec<&str> = clean.iter().map(|t| t.artist_genres.as_str()).collect();
    let genre_block = genre_tfidf(&genres)?;
    let popularity_block =
        FeatureMatrix::column(&clean.iter().map(|t| t.popularity_scaled).collect::<Vec<_>>());
    let explicit_block = FeatureMatrix::column(
        &clean
            .iter()
            .map(|t| f64::from(t.explicit_flag))
            .collect::<Vec<_>>(),
    );

    let features = FeatureMatrix::hstack(&[&genre_block, &popularity_block, &explicit_block])?;
    if features.rows() != clean.len() {
        return Err(AppError::Invariant(format!(
            "Feature matrix has {} rows for {} tracks",
            features.rows(),
            clean.len()
        )));
    }

    tracing::info!(
        rows = features.rows(),
        cols = features.cols(),
        nnz = features.nnz(),
        "Feature matrix built"
    );

    Ok((clean, features))
}

/// Drops rows without an id or name and keeps the first of each (id, name) pair
fn dedup(tracks: &[RawTrackRow]) -> Vec<&RawTrackRow> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for row in tracks {
        if !present(row.track_id.as_deref()) || !present(row.track_name.as_deref()) {
            continue;
        }
        if seen.insert((row.track_id.as_deref(), row.track_name.as_deref())) {
            unique.push(row);
        }
    }

    unique
}

fn present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Pads a partial release date to `YYYY-MM-DD`
///
/// Anything that is not `YYYY`, `YYYY-MM` or `YYYY-MM-DD` becomes `1970-01-01`.
pub fn repair_date(raw: Option<&str>) -> String {
    let value = raw.map(str::trim).unwrap_or_default();

    if FULL_DATE.is_match(value) {
        value.to_string()
    } else if YEAR_MONTH.is_match(value) {
        format!("{}-01", value)
    } else if YEAR.is_match(value) {
        format!("{}-01-01", value)
    } else {
        tracing::warn!(value = %value, "Invalid release date, using default");
        DEFAULT_RELEASE_DATE.to_string()
    }
}

/// Year and month of a repaired date; 1970/1 when it is not a real calendar date
fn year_month(date: &str) -> (i32, u32) {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| (d.year(), d.month()))
        .unwrap_or((1970, 1))
}

/// Strips punctuation, lowercases and collapses whitespace
pub fn clean_text(text: &str) -> String {
    let stripped = PUNCTUATION.replace_all(text, "");
    WHITESPACE
        .replace_all(&stripped.to_lowercase(), " ")
        .trim()
        .to_string()
}

fn parse_popularity(raw: Option<&str>) -> f64 {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn explicit_flag(raw: Option<&str>) -> u8 {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1" | "yes" | "t" | "y") => 1,
        _ => 0,
    }
}

/// Rescales to [0, 1]; a constant column scales to all zeros
fn min_max_scale(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    values
        .iter()
        .map(|v| if range > 0.0 { (v - min) / range } else { 0.0 })
        .collect()
}

fn genre_tokens(genres: &str) -> Vec<String> {
    genres
        .split(',')
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// TF-IDF over comma-delimited genre tokens with smoothed idf and L2-normalized rows
///
/// Falls back to a single zero column when no row has any genre.
fn genre_tfidf(genres: &[&str]) -> AppResult<FeatureMatrix> {
    let documents: Vec<Vec<String>> = genres.iter().map(|g| genre_tokens(g)).collect();
    let with_genres = documents.iter().filter(|d| !d.is_empty()).count();
    tracing::info!(
        non_empty = with_genres,
        total = documents.len(),
        "Found artist genre entries"
    );

    if with_genres == 0 {
        tracing::warn!("No valid genres found, using placeholder genre feature");
        return Ok(FeatureMatrix::zeros(documents.len(), 1));
    }

    // Sorted vocabulary fixes the column order
    let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
    for document in &documents {
        let distinct: HashSet<&str> = document.iter().map(String::as_str).collect();
        for token in distinct {
            *document_frequency.entry(token).or_default() += 1;
        }
    }

    let n = documents.len() as f64;
    let vocabulary: BTreeMap<&str, (usize, f64)> = document_frequency
        .iter()
        .enumerate()
        .map(|(col, (&token, &df))| {
            let idf = ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0;
            (token, (col, idf))
        })
        .collect();

    let rows = documents
        .iter()
        .map(|document| {
            let mut counts: BTreeMap<usize, (f64, f64)> = BTreeMap::new();
            for token in document {
                if let Some(&(col, idf)) = vocabulary.get(token.as_str()) {
                    counts.entry(col).or_insert((0.0, idf)).0 += 1.0;
                }
            }
            let weights: Vec<(usize, f64)> = counts
                .into_iter()
                .map(|(col, (count, idf))| (col, count * idf))
                .collect();
            let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                weights.into_iter().map(|(col, w)| (col, w / norm)).collect()
            } else {
                weights
            }
        })
        .collect();

    let matrix = FeatureMatrix::from_rows(vocabulary.len(), rows)?;
    tracing::info!(
        rows = matrix.rows(),
        vocabulary = vocabulary.len(),
        "Genre TF-IDF encoding completed"
    );
    Ok(matrix)
}
