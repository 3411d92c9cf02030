//! Chart persistence.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::chart::Chart;
use crate::error::PipelineError;

/// Writes `chart` into `output_dir` as `deciles_chart_<id>.vl.json`, where
/// the identifier is read back from the chart's embedded metadata.
///
/// An existing chart file is overwritten; a missing or unwritable directory
/// is an error. The document is UTF-8 JSON with two-space indentation.
pub fn write_deciles_chart(chart: &Chart, output_dir: &Path) -> Result<PathBuf, PipelineError> {
    let path = output_dir.join(format!("deciles_chart_{}.vl.json", chart.id()));
    let file = File::create(&path).map_err(|source| PipelineError::Io {
        path: path.clone(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, chart)?;
    writer.flush().map_err(|source| PipelineError::Io {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), "Wrote deciles chart");
    Ok(path)
}
