use std::fmt;
use std::io::Write;

use itertools::Itertools;
use strum::IntoEnumIterator;

use crate::benchmark::{BenchmarkRecord, BenchmarkTable, Column};

const STATISTIC_LABELS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

/// Descriptive statistics for one numeric column. Non-finite observations are left out, so
/// `count` is the number of finite values the other statistics were computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub column: Column,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub lower_quartile: f64,
    pub median: f64,
    pub upper_quartile: f64,
    pub max: f64,
}

impl ColumnSummary {
    pub fn from_values(column: Column, values: &[f64]) -> Self {
        use statrs::statistics::Statistics;

        let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        finite.sort_by(|lhs, rhs| lhs.total_cmp(rhs));

        if finite.is_empty() {
            return Self {
                column,
                count: 0,
                mean: f64::NAN,
                std_dev: f64::NAN,
                min: f64::NAN,
                lower_quartile: f64::NAN,
                median: f64::NAN,
                upper_quartile: f64::NAN,
                max: f64::NAN,
            };
        }

        Self {
            column,
            count: finite.len(),
            mean: Statistics::mean(finite.iter()),
            std_dev: Statistics::std_dev(finite.iter()),
            min: Statistics::min(finite.iter()),
            lower_quartile: quantile(&finite, 0.25),
            median: quantile(&finite, 0.5),
            upper_quartile: quantile(&finite, 0.75),
            max: Statistics::max(finite.iter()),
        }
    }

    fn statistics(&self) -> [f64; 8] {
        [
            self.count as f64,
            self.mean,
            self.std_dev,
            self.min,
            self.lower_quartile,
            self.median,
            self.upper_quartile,
            self.max,
        ]
    }
}

/// Quantile of ascending `sorted` values, linearly interpolating between the closest ranks.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * weight
    }
}

/// Descriptive statistics over every numeric column of a benchmark table.
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub columns: Vec<ColumnSummary>,
}

impl Description {
    pub fn get(&self, column: Column) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.column == column)
    }
}

#[tracing::instrument(level = "debug", skip(table), fields(nr_records=%table.len()))]
pub fn describe(table: &BenchmarkTable) -> Description {
    let columns = Column::iter()
        .map(|column| ColumnSummary::from_values(column, &table.column(column)))
        .collect();
    Description { columns }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<String> = self.columns.iter().map(|c| c.column.to_string()).collect();
        let rows: Vec<Vec<String>> = (0..STATISTIC_LABELS.len())
            .map(|i| self.columns.iter().map(|c| format_statistic(c.statistics()[i])).collect())
            .collect();

        let labels: Vec<String> = STATISTIC_LABELS.iter().map(|l| l.to_string()).collect();
        write_table(f, &headers, &labels, &rows)
    }
}

/// Preview of the first records of a benchmark table, indexed from zero.
#[derive(Debug, Clone, Copy)]
pub struct Preview<'t> {
    records: &'t [BenchmarkRecord],
}

pub fn head(table: &BenchmarkTable, n: usize) -> Preview<'_> {
    Preview { records: table.head(n) }
}

impl<'t> fmt::Display for Preview<'t> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<String> = Column::iter().map(|c| c.to_string()).collect();
        let labels: Vec<String> = (0..self.records.len()).map(|i| i.to_string()).collect();
        let whole_upload_times = self.records.iter().all(|r| r.upload_time_ms.fract() == 0.0);
        let rows: Vec<Vec<String>> = self
            .records
            .iter()
            .map(|record| Column::iter().map(|c| format_cell(record, c, whole_upload_times)).collect())
            .collect();

        write_table(f, &headers, &labels, &rows)
    }
}

/// Writes the preview of the first `preview_rows` records followed by the descriptive statistics.
#[tracing::instrument(level = "info", skip(table, out), fields(nr_records=%table.len()))]
pub fn summarize<W: Write>(table: &BenchmarkTable, preview_rows: usize, mut out: W) -> std::io::Result<()> {
    writeln!(out, "{}", head(table, preview_rows))?;
    writeln!(out)?;
    writeln!(out, "{}", describe(table))?;
    out.flush()
}

/// Upload times print as integers when every previewed time is whole, as they were logged.
fn format_cell(record: &BenchmarkRecord, column: Column, whole_upload_times: bool) -> String {
    match column {
        Column::FileSize => record.file_size.to_string(),
        Column::ShardCount => record.shard_count.to_string(),
        Column::UploadTimeMs if whole_upload_times => format!("{:.0}", record.upload_time_ms),
        c => format_statistic(record.value(c)),
    }
}

fn format_statistic(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{:.6}", value)
    }
}

/// Right-aligned text table with a left label column, in the layout of a data frame print-out.
fn write_table(f: &mut fmt::Formatter<'_>, headers: &[String], labels: &[String], rows: &[Vec<String>]) -> fmt::Result {
    let label_width = labels.iter().map(|l| l.len()).max().unwrap_or(0);
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| rows.iter().map(|r| r[i].len()).chain(std::iter::once(h.len())).max().unwrap_or(0))
        .collect();

    let header_line = headers.iter().zip(&widths).map(|(h, w)| format!("{:>w$}", h, w = w)).join("  ");
    write!(f, "{:label_width$}  {}", "", header_line, label_width = label_width)?;

    for (label, row) in labels.iter().zip(rows) {
        let line = row.iter().zip(&widths).map(|(cell, w)| format!("{:>w$}", cell, w = w)).join("  ");
        write!(f, "\n{:<label_width$}  {}", label, line, label_width = label_width)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use once_cell::sync::Lazy;
    use pretty_assertions::assert_eq;

    use super::*;

    fn table() -> BenchmarkTable {
        vec![
            BenchmarkRecord::new(104_857_600, 4, 2000.0),
            BenchmarkRecord::new(209_715_200, 8, 3000.0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_column_summary_statistics() {
        Lazy::force(&crate::tracing::TEST_TRACING);
        let main_span = tracing::info_span!("test_column_summary_statistics");
        let _main_span_guard = main_span.enter();

        let actual = ColumnSummary::from_values(Column::MiB, &[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(actual.count, 4);
        assert_relative_eq!(actual.mean, 2.5);
        assert_relative_eq!(actual.std_dev, 1.290_994_448_735_805_6, epsilon = 1e-12);
        assert_relative_eq!(actual.min, 1.0);
        assert_relative_eq!(actual.lower_quartile, 1.75);
        assert_relative_eq!(actual.median, 2.5);
        assert_relative_eq!(actual.upper_quartile, 3.25);
        assert_relative_eq!(actual.max, 4.0);
    }

    #[test]
    fn test_column_summary_single_value() {
        Lazy::force(&crate::tracing::TEST_TRACING);
        let actual = ColumnSummary::from_values(Column::MiBs, &[7.0]);
        assert_eq!(actual.count, 1);
        assert_relative_eq!(actual.mean, 7.0);
        assert!(actual.std_dev.is_nan());
        assert_relative_eq!(actual.median, 7.0);
    }

    #[test]
    fn test_column_summary_skips_non_finite() {
        Lazy::force(&crate::tracing::TEST_TRACING);
        let actual = ColumnSummary::from_values(Column::MiBs, &[f64::INFINITY, 2.0, f64::NAN, 4.0]);
        assert_eq!(actual.count, 2);
        assert_relative_eq!(actual.mean, 3.0);
        assert_relative_eq!(actual.max, 4.0);

        let empty = ColumnSummary::from_values(Column::MiBs, &[f64::INFINITY]);
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_nan());
        assert!(empty.max.is_nan());
    }

    #[test]
    fn test_quantile_interpolates() {
        assert_relative_eq!(quantile(&[10.0, 20.0], 0.25), 12.5);
        assert_relative_eq!(quantile(&[10.0, 20.0, 30.0], 0.5), 20.0);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_describe_covers_every_column() {
        Lazy::force(&crate::tracing::TEST_TRACING);
        let actual = describe(&table());
        let columns: Vec<Column> = actual.columns.iter().map(|c| c.column).collect();
        assert_eq!(columns, Column::iter().collect::<Vec<_>>());

        let mibs = actual.get(Column::MiBs).unwrap();
        assert_eq!(mibs.count, 2);
        assert_relative_eq!(mibs.min, 50.0);
        assert_relative_eq!(mibs.max, 200.0 / 3.0, max_relative = 1e-9);
        assert_relative_eq!(actual.get(Column::ShardCount).unwrap().mean, 6.0);
    }

    #[test]
    fn test_preview_layout() {
        Lazy::force(&crate::tracing::TEST_TRACING);
        let actual = head(&table(), 1).to_string();
        let lines: Vec<&str> = actual.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0].split_whitespace().collect::<Vec<_>>(),
            vec!["FileSize", "ShardCount", "UploadTimeMs", "MiB", "MiBs", "MiBsPerShard"]
        );
        assert_eq!(
            lines[1].split_whitespace().collect::<Vec<_>>(),
            vec!["0", "104857600", "4", "2000", "100.000000", "50.000000", "12.500000"]
        );
    }

    #[test]
    fn test_preview_keeps_fractional_upload_times() {
        Lazy::force(&crate::tracing::TEST_TRACING);
        let table: BenchmarkTable = vec![
            BenchmarkRecord::new(104_857_600, 4, 2000.0),
            BenchmarkRecord::new(104_857_600, 4, 2500.5),
        ]
        .into_iter()
        .collect();

        let upload_times = |preview: String| -> Vec<String> {
            preview
                .lines()
                .skip(1)
                .map(|line| line.split_whitespace().nth(3).unwrap_or_default().to_string())
                .collect()
        };
        assert_eq!(upload_times(head(&table, 2).to_string()), vec!["2000.000000", "2500.500000"]);
        assert_eq!(upload_times(head(&table, 1).to_string()), vec!["2000"]);
    }

    #[test]
    fn test_summarize_writes_preview_and_statistics() -> anyhow::Result<()> {
        Lazy::force(&crate::tracing::TEST_TRACING);
        let mut out = Vec::new();
        summarize(&table(), 5, &mut out)?;
        let actual = String::from_utf8(out)?;

        let first_labels: Vec<&str> = actual
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .collect();
        assert_eq!(
            first_labels,
            vec!["FileSize", "0", "1", "FileSize", "count", "mean", "std", "min", "25%", "50%", "75%", "max"]
        );
        assert!(actual.contains("66.666667"), "{}", actual);
        Ok(())
    }
}
