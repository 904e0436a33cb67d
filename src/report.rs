use std::io;

use crate::benchmark::load_benchmark_file;
use crate::chart::render_scatter_plot;
use crate::error::ReportError;
use crate::settings::Settings;
use crate::summary::summarize;

/// Loads the benchmark log, prints its summary to stdout and renders the throughput chart.
#[tracing::instrument(
    level = "info",
    skip(settings),
    fields(input_file=?settings.input_file, output_file=?settings.output_file),
)]
pub fn run(settings: &Settings) -> Result<(), ReportError> {
    let table = load_benchmark_file(&settings.input_file)?;

    let stdout = io::stdout();
    summarize(&table, settings.report.preview_rows, stdout.lock())?;

    render_scatter_plot(&table, &settings.output_file, &settings.chart)?;
    Ok(())
}
