//! Chart assembly.
//!
//! Charts are Vega-Lite documents built as plain serde structs, so the
//! serialized key order follows the struct declarations and repeat runs emit
//! byte-identical output. Data rows are inlined; each row object keeps its
//! keys sorted.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::table::{DecilesTable, MeasureMeta};
use crate::utility::DECILE_FRACTIONS;

const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";
const LINE_MARK: &str = "line";

/// A renderable Vega-Lite document. Build one with [`get_deciles_chart`] or
/// [`get_percentiles_chart`]; it performs no I/O itself.
#[derive(Debug, Serialize)]
pub struct Chart {
    #[serde(rename = "$schema")]
    schema: &'static str,
    data: ChartData,
    #[serde(flatten)]
    view: ChartView,
    usermeta: MeasureMeta,
}

impl Chart {
    /// The identifier of the measure this chart was built from, as embedded
    /// in its metadata block.
    pub fn id(&self) -> &str {
        &self.usermeta.id
    }
}

#[derive(Debug, Serialize)]
struct ChartData {
    values: Vec<Map<String, Value>>,
}

/// An unfaceted chart carries its mark and encoding at the top level; a
/// row-faceted chart nests them under `spec`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChartView {
    Simple {
        mark: &'static str,
        encoding: Encoding,
    },
    Faceted {
        facet: Facet,
        spec: Spec,
    },
}

#[derive(Debug, Serialize)]
struct Spec {
    mark: &'static str,
    encoding: Encoding,
}

#[derive(Debug, Serialize)]
struct Facet {
    row: EncodingField,
}

#[derive(Debug, Serialize)]
struct Encoding {
    x: EncodingField,
    y: EncodingField,
    detail: EncodingField,
    #[serde(rename = "strokeDash", skip_serializing_if = "Option::is_none")]
    stroke_dash: Option<EncodingField>,
}

#[derive(Debug, Serialize)]
struct EncodingField {
    field: String,
    #[serde(rename = "type")]
    kind: &'static str,
}

impl EncodingField {
    fn new(field: &str, kind: &'static str) -> Self {
        Self {
            field: field.to_string(),
            kind,
        }
    }
}

/// One line per decile: `date` on the x-axis, `value` on the y-axis, the
/// decile fraction as line detail. A single extra column in the table
/// row-facets the chart; more than one is unsupported.
pub fn get_deciles_chart(deciles_table: &DecilesTable) -> Result<Chart, PipelineError> {
    deciles_table.check_schema()?;
    build_chart(deciles_table, None)
}

/// The percentile-line variant: one line per percentile fraction, with a
/// `band` field on every data row so the median, the deciles and the outer
/// percentiles render with distinct dash patterns.
pub fn get_percentiles_chart(percentiles_table: &DecilesTable) -> Result<Chart, PipelineError> {
    percentiles_table.check_schema()?;
    let fractions = percentiles_table
        .numbers("deciles")
        .ok_or_else(|| percentiles_table.missing_or_not_numeric("deciles"))?;
    let bands: Vec<&'static str> = fractions.iter().map(|fraction| band(*fraction)).collect();
    build_chart(percentiles_table, Some(bands))
}

fn band(fraction: f64) -> &'static str {
    if fraction == 0.5 {
        "median"
    } else if DECILE_FRACTIONS.contains(&fraction) {
        "decile"
    } else {
        "outer_percentile"
    }
}

fn build_chart(
    table: &DecilesTable,
    bands: Option<Vec<&'static str>>,
) -> Result<Chart, PipelineError> {
    let facets = table.facet_columns();
    if facets.len() > 1 {
        return Err(PipelineError::UnsupportedFacet {
            id: table.meta.id.clone(),
            columns: facets.iter().map(|name| name.to_string()).collect(),
        });
    }

    let mut values = Vec::with_capacity(table.num_rows());
    for row in 0..table.num_rows() {
        let mut cells: Map<String, Value> = table
            .columns()
            .iter()
            .map(|(name, column)| (name.clone(), column.json_cell(row)))
            .collect();
        if let Some(bands) = &bands {
            cells.insert("band".to_string(), Value::String(bands[row].to_string()));
        }
        values.push(cells);
    }

    let encoding = Encoding {
        x: EncodingField::new("date", "temporal"),
        y: EncodingField::new("value", "quantitative"),
        detail: EncodingField::new("deciles", "ordinal"),
        stroke_dash: bands
            .is_some()
            .then(|| EncodingField::new("band", "nominal")),
    };

    let view = match facets.first() {
        Some(facet) => ChartView::Faceted {
            facet: Facet {
                row: EncodingField::new(facet, "nominal"),
            },
            spec: Spec {
                mark: LINE_MARK,
                encoding,
            },
        },
        None => ChartView::Simple {
            mark: LINE_MARK,
            encoding,
        },
    };

    Ok(Chart {
        schema: VEGA_LITE_SCHEMA,
        data: ChartData { values },
        view,
        usermeta: table.meta.clone(),
    })
}
