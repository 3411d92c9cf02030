//! Zero-denominator row filtering.

use tracing::info;

use crate::error::PipelineError;
use crate::table::MeasureTable;

/// Returns a copy of `table` containing only rows whose denominator is
/// strictly positive. A non-positive denominator makes the ratio meaningless
/// and would smear non-finite values into the quantiles downstream.
///
/// The input is left untouched; remaining rows keep their relative order.
pub fn drop_zero_denominator_rows(table: &MeasureTable) -> Result<MeasureTable, PipelineError> {
    table.check_schema()?;
    let denominators = table
        .numbers(&table.meta.denominator)
        .ok_or_else(|| table.missing_or_not_numeric(&table.meta.denominator))?;

    let keep: Vec<bool> = denominators.iter().map(|value| *value > 0.0).collect();
    let dropped = keep.iter().filter(|keep| !**keep).count();
    info!(id = %table.meta.id, dropped, "Dropping zero-denominator rows");

    let columns = table
        .columns()
        .iter()
        .map(|(name, column)| (name.clone(), column.masked(&keep)))
        .collect();
    Ok(MeasureTable::new(table.meta.clone(), columns))
}
