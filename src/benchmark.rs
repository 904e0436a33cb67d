use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use strum_macros::{Display, EnumIter};

use crate::error::LoadError;

/// Bytes per mebibyte.
pub const MIB: f64 = 1024.0 * 1024.0;

/// Number of fields in every data line: `fileSize;shardCount;uploadTimeMs`.
const FIELDS_PER_LINE: usize = 3;

const COMMENT: u8 = b'#';

/// One parallel upload trial plus the throughput columns derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkRecord {
    pub file_size: u64,
    pub shard_count: u32,
    pub upload_time_ms: f64,
    pub size_mib: f64,
    pub throughput_mibs: f64,
    pub throughput_per_shard_mibs: f64,
}

impl BenchmarkRecord {
    pub fn new(file_size: u64, shard_count: u32, upload_time_ms: f64) -> Self {
        let size_mib = file_size as f64 / MIB;
        let throughput_mibs = size_mib * 1000.0 / upload_time_ms;
        let throughput_per_shard_mibs = throughput_mibs / f64::from(shard_count);

        Self {
            file_size,
            shard_count,
            upload_time_ms,
            size_mib,
            throughput_mibs,
            throughput_per_shard_mibs,
        }
    }

    /// True when a zero upload time or shard count left a derived throughput infinite or NaN.
    pub fn has_throughput_anomaly(&self) -> bool {
        !self.throughput_mibs.is_finite() || !self.throughput_per_shard_mibs.is_finite()
    }

    pub fn value(&self, column: Column) -> f64 {
        match column {
            Column::FileSize => self.file_size as f64,
            Column::ShardCount => f64::from(self.shard_count),
            Column::UploadTimeMs => self.upload_time_ms,
            Column::MiB => self.size_mib,
            Column::MiBs => self.throughput_mibs,
            Column::MiBsPerShard => self.throughput_per_shard_mibs,
        }
    }
}

/// Numeric columns of the benchmark table, in display order.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Column {
    FileSize,
    ShardCount,
    UploadTimeMs,
    MiB,
    MiBs,
    MiBsPerShard,
}

/// Benchmark records in log order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkTable {
    records: Vec<BenchmarkRecord>,
}

impl BenchmarkTable {
    pub fn new(records: Vec<BenchmarkRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[BenchmarkRecord] {
        &self.records
    }

    /// The first `n` records, or all of them for shorter tables.
    pub fn head(&self, n: usize) -> &[BenchmarkRecord] {
        &self.records[..n.min(self.records.len())]
    }

    pub fn column(&self, column: Column) -> Vec<f64> {
        self.records.iter().map(|r| r.value(column)).collect()
    }
}

impl FromIterator<BenchmarkRecord> for BenchmarkTable {
    fn from_iter<I: IntoIterator<Item = BenchmarkRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Opens and loads the benchmark log at `path`.
#[tracing::instrument(level = "info")]
pub fn load_benchmark_file(path: &Path) -> Result<BenchmarkTable, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::InputAccess { path: path.to_path_buf(), source })?;
    load_benchmark_log(file)
}

/// Loads the output generated by the parallel uploads benchmark.
///
/// Each data line holds `fileSize;shardCount;uploadTimeMs` with no header row. Everything from a
/// `#` to the end of its line is a comment, and lines left blank are skipped. Any malformed line
/// fails the whole load.
pub fn load_benchmark_log<R: Read>(source: R) -> Result<BenchmarkTable, LoadError> {
    let (data, line_numbers) = data_lines(source)?;

    // one record per data line, so records pair up with their line numbers
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(data.as_slice());

    let mut records = Vec::with_capacity(line_numbers.len());
    for (row, &line) in reader.records().zip(&line_numbers) {
        let record = parse_record(&row?, line)?;

        if record.has_throughput_anomaly() {
            tracing::warn!(
                line, file_size=%record.file_size, shard_count=%record.shard_count, upload_time_ms=%record.upload_time_ms,
                "benchmark trial yields non-finite throughput"
            );
        }

        records.push(record);
    }

    tracing::info!(nr_records=%records.len(), "loaded benchmark log");
    Ok(BenchmarkTable::new(records))
}

/// Strips comments and blank lines from `source`, returning the remaining data lines joined by
/// `\n` along with the 1-based line number of each in the original log.
fn data_lines<R: Read>(source: R) -> Result<(Vec<u8>, Vec<u64>), LoadError> {
    let mut data = Vec::new();
    let mut line_numbers = Vec::new();

    for (index, line) in BufReader::new(source).split(b'\n').enumerate() {
        let line = line?;
        let content = match line.iter().position(|b| *b == COMMENT) {
            Some(comment_start) => &line[..comment_start],
            None => &line[..],
        };

        if content.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        data.extend(content.iter().map(|&b| if b == b'\r' { b' ' } else { b }));
        data.push(b'\n');
        line_numbers.push(index as u64 + 1);
    }

    Ok((data, line_numbers))
}

fn parse_record(row: &csv::StringRecord, line: u64) -> Result<BenchmarkRecord, LoadError> {
    if row.len() != FIELDS_PER_LINE {
        return Err(LoadError::Parse {
            line,
            reason: format!("expected {} fields but found {}", FIELDS_PER_LINE, row.len()),
        });
    }

    let file_size = parse_field(&row[0], "FileSize", line)?;
    let shard_count = parse_field(&row[1], "ShardCount", line)?;
    let upload_time_ms: f64 = parse_field(&row[2], "UploadTimeMs", line)?;
    if upload_time_ms.is_nan() || upload_time_ms < 0.0 {
        return Err(LoadError::Parse {
            line,
            reason: format!("UploadTimeMs must be a non-negative number: {}", &row[2]),
        });
    }

    Ok(BenchmarkRecord::new(file_size, shard_count, upload_time_ms))
}

fn parse_field<T>(field: &str, name: &str, line: u64) -> Result<T, LoadError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    field.parse().map_err(|err| LoadError::Parse {
        line,
        reason: format!("{} is not numeric ({:?}): {}", name, field, err),
    })
}
