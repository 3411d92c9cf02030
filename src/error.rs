//! Error taxonomy for the measure-table pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong between discovering a measure table and
/// writing its chart.
///
/// All of these are fatal: the run stops at the first error instead of
/// skipping the offending table, so an upstream contract break never passes
/// silently.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input root handed to the table loader was not a directory.
    #[error("input path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// A path handed to the loader does not carry a `measure_<id>.csv` name.
    #[error("file name does not name a measure table: {}", .0.display())]
    NotAMeasureFile(PathBuf),

    /// A measure file has too few columns to infer the trailing
    /// numerator/denominator/value/date layout from.
    #[error("measure table `{id}` has {found} column(s), too few to infer its schema")]
    TooFewColumns { id: String, found: usize },

    /// A measure file could not be parsed as CSV.
    #[error("failed to read `{}`", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A field in the `date` column did not parse as a date.
    #[error("invalid date `{field}` in `{}`", path.display())]
    InvalidDate {
        path: PathBuf,
        field: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A required column is absent from a table reaching a pipeline stage.
    #[error("table `{id}` is missing required column `{column}`")]
    MissingColumn { id: String, column: String },

    /// A column that must hold numbers holds something else.
    #[error("column `{column}` of table `{id}` is not numeric")]
    NotNumeric { id: String, column: String },

    /// The `date` column of a table does not hold dates.
    #[error("the `date` column of table `{id}` does not hold dates")]
    NotTemporal { id: String },

    /// The run configuration carries unknown keys or wrongly typed values.
    #[error("invalid configuration: {0}")]
    Config(#[source] serde_json::Error),

    /// Charts can be faceted by at most one column.
    #[error("cannot facet table `{id}` by more than one column: {columns:?}")]
    UnsupportedFacet { id: String, columns: Vec<String> },

    /// Reading an input file or writing a chart failed.
    #[error("i/o failure on `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Serializing a chart to JSON failed.
    #[error("failed to serialize chart")]
    Json(#[from] serde_json::Error),
}
