use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("failed to write benchmark summary: {0}")]
    Summary(#[from] std::io::Error),
}

/// Set of errors occurring while loading the benchmark log.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The benchmark log could not be opened.
    #[error("failed to open benchmark log {path:?}: {source}")]
    InputAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A data line has the wrong number of fields or a field that is not numeric.
    #[error("malformed benchmark log line {line}: {reason}")]
    Parse { line: u64, reason: String },

    #[error("failed to read benchmark log: {0}")]
    Read(#[from] std::io::Error),

    #[error("{0}")]
    Csv(#[from] csv::Error),
}

/// Set of errors occurring while rendering the throughput chart.
#[derive(Debug, Error)]
pub enum ChartError {
    /// The output path's directory is missing or the file cannot be written.
    #[error("failed to write chart to {path:?}: {source}")]
    OutputAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported chart format for {0:?}; expected one of svg, png, jpg, jpeg, bmp")]
    UnsupportedFormat(PathBuf),

    #[error("failed to draw chart: {0}")]
    Render(String),

    #[error("failed to encode chart image: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid settings: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}
