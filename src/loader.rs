//! Measure-table discovery and loading.
//!
//! The measures framework writes one canonical `measure_<id>.csv` per measure
//! plus dated per-period snapshots (`measure_<id>_<date>.csv`) beside it.
//! Discovery must pick up exactly the canonical files. Everything about a
//! table beyond its rows, the identifier, the denominator column and the
//! group-by columns, is reconstructed here from the file name and the column
//! order.
//!
//! Discovery and loading are split so callers can process one table fully
//! before the next one is read.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use regex::Regex;
use tracing::debug;

use crate::error::PipelineError;
use crate::table::{Column, MeasureMeta, MeasureTable};

/// Canonical measure file names. Anchored at both ends so that neither dated
/// snapshots (`-` is not a word character) nor files with trailing suffixes
/// sneak through.
static MEASURE_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^measure_(?P<id>\w+)\.csv$").unwrap());

/// The identifier captured from a canonical measure file name, if the name
/// matches.
pub fn measure_id(file_name: &str) -> Option<&str> {
    let captures = MEASURE_FILE.captures(file_name)?;
    Some(captures.name("id")?.as_str())
}

/// Lists the canonical measure files directly under `input_dir`.
///
/// Only immediate children are considered; subdirectories are not entered.
/// Paths come back sorted by file name so repeat runs process tables in the
/// same order.
pub fn discover_paths(input_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !input_dir.is_dir() {
        return Err(PipelineError::NotADirectory(input_dir.to_path_buf()));
    }
    let entries = fs::read_dir(input_dir).map_err(|source| PipelineError::Io {
        path: input_dir.to_path_buf(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PipelineError::Io {
            path: input_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(select_measure_paths(paths))
}

/// Keeps the paths whose file name matches the canonical measure pattern,
/// preserving their order. Everything else is skipped.
pub fn select_measure_paths(paths: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|path| {
            let id = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(measure_id);
            if id.is_none() {
                debug!(path = %path.display(), "Skipping non-measure file");
            }
            id.is_some()
        })
        .collect()
}

/// Loads one measure table, reconstructing its metadata from the file name
/// and the header row.
pub fn load_table(path: &Path) -> Result<MeasureTable, PipelineError> {
    let id = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(measure_id)
        .ok_or_else(|| PipelineError::NotAMeasureFile(path.to_path_buf()))?
        .to_string();

    let mut reader = csv::ReaderBuilder::new()
        .from_path(path)
        .map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    let headers = reader
        .headers()
        .map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    let meta = infer_meta(&id, &headers)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record.map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })?);
    }

    let mut columns = Vec::with_capacity(headers.len());
    for (index, name) in headers.iter().enumerate() {
        let fields: Vec<&str> = rows.iter().map(|row| &row[index]).collect();
        columns.push((name.to_string(), build_column(path, name, &fields)?));
    }
    debug!(
        id = %meta.id,
        rows = rows.len(),
        columns = columns.len(),
        "Loaded measure table"
    );
    Ok(MeasureTable::new(meta, columns))
}

/// Reconstructs the table metadata from the header row.
///
/// The measures framework emits a fixed trailing column order,
/// `[..group_by, numerator, denominator, value, date]`, so the denominator is
/// the third column from the end and everything before the numerator is a
/// group-by column.
fn infer_meta(id: &str, headers: &StringRecord) -> Result<MeasureMeta, PipelineError> {
    if headers.len() < 4 {
        return Err(PipelineError::TooFewColumns {
            id: id.to_string(),
            found: headers.len(),
        });
    }
    let denominator = headers[headers.len() - 3].to_string();
    let group_by = headers
        .iter()
        .take(headers.len() - 4)
        .map(str::to_string)
        .collect();
    Ok(MeasureMeta {
        id: id.to_string(),
        denominator,
        group_by,
    })
}

/// Types a column from its raw fields. The `date` column must parse as
/// temporal values; any other column is numeric when every field is empty or
/// parses as a number, and text otherwise.
fn build_column(path: &Path, name: &str, fields: &[&str]) -> Result<Column, PipelineError> {
    if name == "date" {
        let mut dates = Vec::with_capacity(fields.len());
        for field in fields {
            let date = parse_date(field).map_err(|source| PipelineError::InvalidDate {
                path: path.to_path_buf(),
                field: (*field).to_string(),
                source,
            })?;
            dates.push(date);
        }
        return Ok(Column::Date(dates));
    }
    // The measures framework writes missing ratios (0/0 rows) as empty
    // cells; they read as NaN, not as text.
    let numbers: Option<Vec<f64>> = fields
        .iter()
        .map(|field| {
            if field.is_empty() {
                Some(f64::NAN)
            } else {
                field.parse().ok()
            }
        })
        .collect();
    Ok(match numbers {
        Some(numbers) => Column::Number(numbers),
        None => Column::Text(fields.iter().map(|field| (*field).to_string()).collect()),
    })
}

fn parse_date(field: &str) -> Result<NaiveDate, chrono::ParseError> {
    match NaiveDate::parse_from_str(field, "%Y-%m-%d") {
        Ok(date) => Ok(date),
        Err(err) => {
            // Some framework versions emit midnight timestamps instead of
            // bare dates.
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
                if let Ok(datetime) = NaiveDateTime::parse_from_str(field, format) {
                    return Ok(datetime.date());
                }
            }
            Err(err)
        }
    }
}
