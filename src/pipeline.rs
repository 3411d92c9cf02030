//! End-to-end processing of discovered measure tables.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::chart::{get_deciles_chart, get_percentiles_chart};
use crate::config::Config;
use crate::deciles::{get_deciles_table, get_percentiles_table};
use crate::error::PipelineError;
use crate::filter::drop_zero_denominator_rows;
use crate::loader::load_table;
use crate::output::write_deciles_chart;

/// Runs each measure file through load, filter, aggregation, chart assembly
/// and chart writing, fully, before the next file is touched.
///
/// With `charts.output` off the filter still runs so its dropped-row counts
/// stay observable, but nothing is aggregated or written. The first error
/// stops the run. Returns the number of charts written.
pub fn run(paths: &[PathBuf], output_dir: &Path, config: &Config) -> Result<usize, PipelineError> {
    let mut written = 0;
    for path in paths {
        let span = tracing::info_span!("process_measure", path = %path.display());
        let _guard = span.enter();

        let measure_table = load_table(path)?;
        let filtered = drop_zero_denominator_rows(&measure_table)?;
        if !config.charts.output {
            continue;
        }
        let chart = if config.show_outer_percentiles {
            let percentiles_table = get_percentiles_table(&filtered, true)?;
            get_percentiles_chart(&percentiles_table)?
        } else {
            let deciles_table = get_deciles_table(&filtered)?;
            get_deciles_chart(&deciles_table)?
        };
        write_deciles_chart(&chart, output_dir)?;
        written += 1;
    }
    info!(written, "Finished writing deciles charts");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartsConfig;
    use std::fs;
    use tempfile::tempdir;

    const SBP_CSV: &str = "\
practice,numerator,population,value,date
P1,10,100,0.1,2021-01-01
P2,20,100,0.2,2021-01-01
";

    #[test]
    fn test_run_writes_one_chart_per_measure_file() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let path = input.path().join("measure_sbp.csv");
        fs::write(&path, SBP_CSV).unwrap();

        let written = run(&[path], output.path(), &Config::default()).unwrap();
        assert_eq!(written, 1);
        assert!(output.path().join("deciles_chart_sbp.vl.json").exists());
    }

    #[test]
    fn test_charts_can_be_turned_off() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let path = input.path().join("measure_sbp.csv");
        fs::write(&path, SBP_CSV).unwrap();

        let config = Config {
            charts: ChartsConfig { output: false },
            ..Config::default()
        };
        let written = run(&[path], output.path(), &config).unwrap();
        assert_eq!(written, 0);
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_first_error_stops_the_run() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let bad = input.path().join("measure_bad.csv");
        let good = input.path().join("measure_good.csv");
        fs::write(&bad, "value,date\n0.1,2021-01-01\n").unwrap();
        fs::write(&good, SBP_CSV).unwrap();

        let err = run(&[bad, good], output.path(), &Config::default()).unwrap_err();
        assert!(matches!(err, PipelineError::TooFewColumns { .. }));
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    }
}
