//! Data model for measure tables and their derived decile tables.
//!
//! A measure table is columnar: named, typed columns in header order. The
//! parameters the measures framework encodes in the file name and the column
//! positions travel alongside the rows as an explicit [`MeasureMeta`] value,
//! copied by value from stage to stage rather than carried through a side
//! channel.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::error::PipelineError;

/// Per-table metadata reconstructed by the loader.
///
/// Aggregation does not carry this implicitly; every stage that derives a new
/// table copies it onto the output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureMeta {
    /// Measure identifier captured from the file name.
    pub id: String,
    /// Name of the denominator column.
    pub denominator: String,
    /// Names of the leading group-by columns, in header order.
    pub group_by: Vec<String>,
}

/// A single typed column.
///
/// Non-`date` columns are numeric when every field of the source file is
/// empty or parses as a number (empty cells read as NaN), text otherwise;
/// the `date` column is always temporal.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Number(Vec<f64>),
    Text(Vec<String>),
    Date(Vec<NaiveDate>),
}

impl Column {
    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Number(values) => values.len(),
            Column::Text(values) => values.len(),
            Column::Date(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy holding only the rows where `keep` is true.
    pub(crate) fn masked(&self, keep: &[bool]) -> Column {
        fn pick<T: Clone>(values: &[T], keep: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(keep)
                .filter(|(_, keep)| **keep)
                .map(|(value, _)| value.clone())
                .collect()
        }
        match self {
            Column::Number(values) => Column::Number(pick(values, keep)),
            Column::Text(values) => Column::Text(pick(values, keep)),
            Column::Date(values) => Column::Date(pick(values, keep)),
        }
    }

    /// A copy holding the rows at `indices`, in that order. Indices may
    /// repeat.
    pub(crate) fn gathered(&self, indices: &[usize]) -> Column {
        match self {
            Column::Number(values) => {
                Column::Number(indices.iter().map(|index| values[*index]).collect())
            }
            Column::Text(values) => {
                Column::Text(indices.iter().map(|index| values[*index].clone()).collect())
            }
            Column::Date(values) => {
                Column::Date(indices.iter().map(|index| values[*index]).collect())
            }
        }
    }

    /// Renders the cell at `row` as a JSON value. Dates become ISO
    /// `YYYY-MM-DD` strings; non-finite numbers become null, which is all
    /// JSON can hold for them.
    pub(crate) fn json_cell(&self, row: usize) -> Value {
        match self {
            Column::Number(values) => {
                let number = values[row];
                if number.is_finite() {
                    Value::from(number)
                } else {
                    Value::Null
                }
            }
            Column::Text(values) => Value::String(values[row].clone()),
            Column::Date(values) => Value::String(values[row].format("%Y-%m-%d").to_string()),
        }
    }
}

fn find<'a>(columns: &'a [(String, Column)], name: &str) -> Option<&'a Column> {
    columns
        .iter()
        .find(|(column_name, _)| column_name == name)
        .map(|(_, column)| column)
}

fn numbers<'a>(columns: &'a [(String, Column)], name: &str) -> Option<&'a [f64]> {
    match find(columns, name) {
        Some(Column::Number(values)) => Some(values),
        _ => None,
    }
}

/// One named measure: typed columns in header order plus the reconstructed
/// metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureTable {
    pub meta: MeasureMeta,
    columns: Vec<(String, Column)>,
}

impl MeasureTable {
    pub fn new(meta: MeasureMeta, columns: Vec<(String, Column)>) -> Self {
        Self { meta, columns }
    }

    /// Columns with their names, in header order.
    pub fn columns(&self) -> &[(String, Column)] {
        &self.columns
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        find(&self.columns, name)
    }

    /// The `date` column, when present and temporal.
    pub fn dates(&self) -> Option<&[NaiveDate]> {
        match self.column("date") {
            Some(Column::Date(dates)) => Some(dates),
            _ => None,
        }
    }

    /// A named column as numbers, when present and numeric.
    pub fn numbers(&self, name: &str) -> Option<&[f64]> {
        numbers(&self.columns, name)
    }

    /// Number of rows (zero for a table without columns).
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, column)| column.len())
    }

    /// Guard invoked by every stage that consumes a measure table: the
    /// `value` and `date` columns must be present.
    pub fn check_schema(&self) -> Result<(), PipelineError> {
        for required in ["value", "date"] {
            if self.column(required).is_none() {
                return Err(PipelineError::MissingColumn {
                    id: self.meta.id.clone(),
                    column: required.to_string(),
                });
            }
        }
        Ok(())
    }

    /// The error for a column that should be numeric but is missing or holds
    /// text.
    pub(crate) fn missing_or_not_numeric(&self, column: &str) -> PipelineError {
        match self.column(column) {
            Some(_) => PipelineError::NotNumeric {
                id: self.meta.id.clone(),
                column: column.to_string(),
            },
            None => PipelineError::MissingColumn {
                id: self.meta.id.clone(),
                column: column.to_string(),
            },
        }
    }
}

/// Decile aggregation of a measure table: one row per (date, facet values,
/// decile fraction) combination, columns ordered `[date, facets.., deciles,
/// value]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecilesTable {
    pub meta: MeasureMeta,
    columns: Vec<(String, Column)>,
}

impl DecilesTable {
    pub fn new(meta: MeasureMeta, columns: Vec<(String, Column)>) -> Self {
        Self { meta, columns }
    }

    pub fn columns(&self) -> &[(String, Column)] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        find(&self.columns, name)
    }

    pub fn numbers(&self, name: &str) -> Option<&[f64]> {
        numbers(&self.columns, name)
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, column)| column.len())
    }

    /// Columns that are neither the period, the decile fraction, nor the
    /// value: the candidates for chart faceting.
    pub fn facet_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| !matches!(*name, "date" | "deciles" | "value"))
            .collect()
    }

    /// Guard invoked by the chart builder: the `date`, `deciles` and `value`
    /// columns must be present.
    pub fn check_schema(&self) -> Result<(), PipelineError> {
        for required in ["date", "deciles", "value"] {
            if self.column(required).is_none() {
                return Err(PipelineError::MissingColumn {
                    id: self.meta.id.clone(),
                    column: required.to_string(),
                });
            }
        }
        Ok(())
    }

    /// The error for a column that should be numeric but is missing or holds
    /// text.
    pub(crate) fn missing_or_not_numeric(&self, column: &str) -> PipelineError {
        match self.column(column) {
            Some(_) => PipelineError::NotNumeric {
                id: self.meta.id.clone(),
                column: column.to_string(),
            },
            None => PipelineError::MissingColumn {
                id: self.meta.id.clone(),
                column: column.to_string(),
            },
        }
    }
}
