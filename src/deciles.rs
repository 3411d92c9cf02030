//! Decile aggregation across groups and time.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::PipelineError;
use crate::table::{Column, DecilesTable, MeasureTable};
use crate::utility::{DECILE_FRACTIONS, percentile_fractions, quantile};

/// Aggregates a filtered measure table into its deciles table.
///
/// Rows are grouped by `date` plus every group-by column except the first.
/// The first group-by column is the entity the deciles are computed *across*
/// (one value per entity per period feeds each distribution); any further
/// group-by columns partition the output into separate decile series. Each
/// group contributes nine rows, one per decile fraction, and the output
/// columns are `[date, <extra groups..>, deciles, value]` with groups in
/// ascending key order.
pub fn get_deciles_table(table: &MeasureTable) -> Result<DecilesTable, PipelineError> {
    let columns = aggregate(table, &DECILE_FRACTIONS)?;
    Ok(DecilesTable::new(table.meta.clone(), columns))
}

/// Like [`get_deciles_table`], but optionally bracketing the deciles with the
/// 1st..9th and 91st..99th percentiles for charts that draw the outer bands.
pub fn get_percentiles_table(
    table: &MeasureTable,
    show_outer_percentiles: bool,
) -> Result<DecilesTable, PipelineError> {
    let columns = aggregate(table, &percentile_fractions(show_outer_percentiles))?;
    Ok(DecilesTable::new(table.meta.clone(), columns))
}

fn aggregate(
    table: &MeasureTable,
    fractions: &[f64],
) -> Result<Vec<(String, Column)>, PipelineError> {
    table.check_schema()?;
    let values = table
        .numbers("value")
        .ok_or_else(|| table.missing_or_not_numeric("value"))?;
    let dates = table.dates().ok_or_else(|| PipelineError::NotTemporal {
        id: table.meta.id.clone(),
    })?;

    let mut extra_columns: Vec<(&str, &Column)> = Vec::new();
    for name in table.meta.group_by.iter().skip(1) {
        let column = table
            .column(name)
            .ok_or_else(|| PipelineError::MissingColumn {
                id: table.meta.id.clone(),
                column: name.clone(),
            })?;
        extra_columns.push((name.as_str(), column));
    }

    // Group values by key, remembering one representative row per group so
    // the extra-column cells can be copied back out with their types intact.
    let mut groups: BTreeMap<(NaiveDate, Vec<GroupValue>), (usize, Vec<f64>)> = BTreeMap::new();
    for row in 0..table.num_rows() {
        let key = (
            dates[row],
            extra_columns
                .iter()
                .map(|(_, column)| GroupValue::of(column, row))
                .collect(),
        );
        groups
            .entry(key)
            .and_modify(|(_, group)| group.push(values[row]))
            .or_insert_with(|| (row, vec![values[row]]));
    }
    debug!(
        id = %table.meta.id,
        groups = groups.len(),
        "Aggregating measure table"
    );

    let count = groups.len() * fractions.len();
    let mut out_dates = Vec::with_capacity(count);
    let mut representatives = Vec::with_capacity(count);
    let mut out_fractions = Vec::with_capacity(count);
    let mut out_values = Vec::with_capacity(count);
    for ((date, _), (representative, group)) in &groups {
        // Quantiles ignore NaN values.
        let mut sorted: Vec<f64> = group.iter().copied().filter(|value| !value.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);
        for fraction in fractions {
            out_dates.push(*date);
            representatives.push(*representative);
            out_fractions.push(*fraction);
            out_values.push(quantile(&sorted, *fraction));
        }
    }

    let mut columns = Vec::with_capacity(extra_columns.len() + 3);
    columns.push(("date".to_string(), Column::Date(out_dates)));
    for (name, column) in &extra_columns {
        columns.push(((*name).to_string(), column.gathered(&representatives)));
    }
    columns.push(("deciles".to_string(), Column::Number(out_fractions)));
    columns.push(("value".to_string(), Column::Number(out_values)));
    Ok(columns)
}

/// One grouping-key cell, wrapped so keys are totally ordered and can live in
/// a `BTreeMap`. Cells at the same key position always share a type, so the
/// cross-type ordering only has to be consistent.
#[derive(Debug, Clone)]
enum GroupValue {
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl GroupValue {
    fn of(column: &Column, row: usize) -> GroupValue {
        match column {
            Column::Number(values) => GroupValue::Number(values[row]),
            Column::Text(values) => GroupValue::Text(values[row].clone()),
            Column::Date(values) => GroupValue::Date(values[row]),
        }
    }

    fn kind(&self) -> u8 {
        match self {
            GroupValue::Number(_) => 0,
            GroupValue::Text(_) => 1,
            GroupValue::Date(_) => 2,
        }
    }
}

impl PartialEq for GroupValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupValue {}

impl PartialOrd for GroupValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (GroupValue::Number(a), GroupValue::Number(b)) => a.total_cmp(b),
            (GroupValue::Text(a), GroupValue::Text(b)) => a.cmp(b),
            (GroupValue::Date(a), GroupValue::Date(b)) => a.cmp(b),
            (a, b) => a.kind().cmp(&b.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::MeasureMeta;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn meta(group_by: &[&str]) -> MeasureMeta {
        MeasureMeta {
            id: "sbp".to_string(),
            denominator: "population".to_string(),
            group_by: group_by.iter().map(|name| name.to_string()).collect(),
        }
    }

    fn one_date_per_practice(values: Vec<f64>) -> MeasureTable {
        let rows = values.len();
        MeasureTable::new(
            meta(&["practice"]),
            vec![
                (
                    "practice".to_string(),
                    Column::Text((0..rows).map(|n| format!("P{n}")).collect()),
                ),
                ("value".to_string(), Column::Number(values)),
                (
                    "date".to_string(),
                    Column::Date(vec![date("2021-01-01"); rows]),
                ),
            ],
        )
    }

    #[test]
    fn test_single_group_yields_nine_decile_rows() {
        let table = one_date_per_practice((1..=100).map(f64::from).collect());
        let deciles = get_deciles_table(&table).unwrap();

        assert_eq!(deciles.num_rows(), 9);
        assert_eq!(deciles.numbers("deciles"), Some(&DECILE_FRACTIONS[..]));
        let expected = [10.9, 20.8, 30.7, 40.6, 50.5, 60.4, 70.3, 80.2, 90.1];
        for (actual, expected) in deciles.numbers("value").unwrap().iter().zip(expected) {
            assert!((actual - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_output_column_order() {
        let table = one_date_per_practice(vec![1.0, 2.0]);
        let deciles = get_deciles_table(&table).unwrap();
        let names: Vec<&str> = deciles
            .columns()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec!["date", "deciles", "value"]);
    }

    #[test]
    fn test_metadata_is_copied() {
        let table = one_date_per_practice(vec![1.0]);
        let deciles = get_deciles_table(&table).unwrap();
        assert_eq!(deciles.meta, table.meta);
    }

    #[test]
    fn test_extra_group_column_partitions_output() {
        let table = MeasureTable::new(
            meta(&["practice", "stp"]),
            vec![
                (
                    "practice".to_string(),
                    Column::Text(vec!["P0".into(), "P1".into(), "P2".into(), "P3".into()]),
                ),
                (
                    "stp".to_string(),
                    Column::Text(vec!["S1".into(), "S0".into(), "S1".into(), "S0".into()]),
                ),
                (
                    "value".to_string(),
                    Column::Number(vec![10.0, 1.0, 20.0, 2.0]),
                ),
                (
                    "date".to_string(),
                    Column::Date(vec![date("2021-01-01"); 4]),
                ),
            ],
        );
        let deciles = get_deciles_table(&table).unwrap();

        assert_eq!(deciles.num_rows(), 18);
        let names: Vec<&str> = deciles
            .columns()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec!["date", "stp", "deciles", "value"]);

        // Groups come out in ascending key order: S0 before S1.
        let Some(Column::Text(stps)) = deciles.column("stp") else {
            panic!("stp column should be text");
        };
        assert!(stps[..9].iter().all(|stp| stp == "S0"));
        assert!(stps[9..].iter().all(|stp| stp == "S1"));

        // Medians of [1, 2] and [10, 20].
        let values = deciles.numbers("value").unwrap();
        assert!((values[4] - 1.5).abs() < 1e-12);
        assert!((values[13] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_dates_sort_ascending_regardless_of_input_order() {
        let table = MeasureTable::new(
            meta(&["practice"]),
            vec![
                (
                    "practice".to_string(),
                    Column::Text(vec!["P0".into(), "P0".into()]),
                ),
                ("value".to_string(), Column::Number(vec![2.0, 1.0])),
                (
                    "date".to_string(),
                    Column::Date(vec![date("2021-02-01"), date("2021-01-01")]),
                ),
            ],
        );
        let deciles = get_deciles_table(&table).unwrap();
        let Some(Column::Date(dates)) = deciles.column("date") else {
            panic!("date column should be temporal");
        };
        assert_eq!(dates[0], date("2021-01-01"));
        assert_eq!(dates[17], date("2021-02-01"));
    }

    #[test]
    fn test_missing_value_column_is_an_error() {
        let table = MeasureTable::new(
            meta(&["practice"]),
            vec![(
                "date".to_string(),
                Column::Date(vec![date("2021-01-01")]),
            )],
        );
        let err = get_deciles_table(&table).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingColumn { column, .. } if column == "value"
        ));
    }

    #[test]
    fn test_text_value_column_is_an_error() {
        let table = MeasureTable::new(
            meta(&["practice"]),
            vec![
                ("value".to_string(), Column::Text(vec!["high".into()])),
                ("date".to_string(), Column::Date(vec![date("2021-01-01")])),
            ],
        );
        let err = get_deciles_table(&table).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NotNumeric { column, .. } if column == "value"
        ));
    }

    #[test]
    fn test_numeric_date_column_is_an_error() {
        let table = MeasureTable::new(
            meta(&["practice"]),
            vec![
                ("value".to_string(), Column::Number(vec![1.0])),
                ("date".to_string(), Column::Number(vec![20210101.0])),
            ],
        );
        let err = get_deciles_table(&table).unwrap_err();
        assert!(matches!(err, PipelineError::NotTemporal { .. }));
    }

    #[test]
    fn test_missing_extra_group_column_is_an_error() {
        let table = MeasureTable::new(
            meta(&["practice", "stp"]),
            vec![
                ("value".to_string(), Column::Number(vec![1.0])),
                ("date".to_string(), Column::Date(vec![date("2021-01-01")])),
            ],
        );
        let err = get_deciles_table(&table).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingColumn { column, .. } if column == "stp"
        ));
    }

    #[test]
    fn test_empty_input_yields_empty_output_with_schema() {
        let table = one_date_per_practice(vec![]);
        let deciles = get_deciles_table(&table).unwrap();
        assert_eq!(deciles.num_rows(), 0);
        deciles.check_schema().unwrap();
    }

    #[test]
    fn test_nan_values_are_excluded_from_quantiles() {
        let mut values: Vec<f64> = (0..=10).map(f64::from).collect();
        values.push(f64::NAN);
        let deciles = get_deciles_table(&one_date_per_practice(values)).unwrap();

        let expected: Vec<f64> = (1..=9).map(f64::from).collect();
        assert_eq!(deciles.numbers("value").unwrap(), &expected[..]);
    }

    #[test]
    fn test_percentiles_table_covers_outer_bands() {
        let table = one_date_per_practice((1..=100).map(f64::from).collect());
        let percentiles = get_percentiles_table(&table, true).unwrap();
        assert_eq!(percentiles.num_rows(), 27);
        let fractions = percentiles.numbers("deciles").unwrap();
        assert_eq!(fractions[0], 0.01);
        assert_eq!(fractions[26], 0.99);

        let narrow = get_percentiles_table(&table, false).unwrap();
        assert_eq!(narrow.num_rows(), 9);
    }
}
