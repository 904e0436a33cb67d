pub mod benchmark;
pub mod chart;
pub mod error;
pub mod report;
pub mod settings;
pub mod summary;
pub mod tracing;

pub use benchmark::{load_benchmark_file, load_benchmark_log, BenchmarkRecord, BenchmarkTable, Column};
pub use chart::render_scatter_plot;
pub use report::run;
pub use settings::Settings;
pub use summary::{describe, head, summarize};

pub type ReportResult<T> = Result<T, error::ReportError>;
