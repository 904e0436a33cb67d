use std::path::{Path, PathBuf};

use clap::Parser;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::SettingsError;

/// Number of benchmark records shown in the summary preview.
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "parallel-upload-plots")]
#[command(about = "Summarize the results from running the parallel uploads benchmark")]
#[command(version)]
pub struct CliOptions {
    /// the benchmark output file to load
    #[arg(long)]
    pub input_file: PathBuf,

    /// the name for the output plot
    #[arg(long)]
    pub output_file: PathBuf,

    /// optional settings file tuning the report and chart.
    /// Settings may also be overridden via `APP_` prefixed environment variables, e.g.
    /// `APP_CHART__WIDTH=1600`.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

/// Everything the report pipeline needs, passed explicitly into [`crate::report::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub report: ReportSettings,
    pub chart: ChartSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ReportSettings {
    pub preview_rows: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self { preview_rows: DEFAULT_PREVIEW_ROWS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ChartSettings {
    #[validate(range(min = 64, max = 8192))]
    pub width: u32,

    #[validate(range(min = 64, max = 8192))]
    pub height: u32,

    #[validate(range(min = 1, max = 64))]
    pub point_size: u32,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self { width: 1024, height: 768, point_size: 4 }
    }
}

/// The tunable layers of configuration; input and output paths always come from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct TuningSettings {
    report: ReportSettings,
    chart: ChartSettings,
}

impl Settings {
    /// Parse the command line and resolve the full settings.
    pub fn from_command_line() -> Result<Self, SettingsError> {
        let options = CliOptions::parse();
        tracing::info!(?options, "CLI parsed");
        Self::load(&options)
    }

    /// Resolve settings by layering the optional settings file and `APP_` environment variables
    /// over the defaults.
    pub fn load(options: &CliOptions) -> Result<Self, SettingsError> {
        Self::load_with_environment(
            options,
            Environment::with_prefix("app").prefix_separator("_").separator("__"),
        )
    }

    #[tracing::instrument(level = "debug", skip(environment))]
    fn load_with_environment(options: &CliOptions, environment: Environment) -> Result<Self, SettingsError> {
        let tuning = load_tuning(options.config.as_deref(), environment)?;
        tuning.report.validate()?;
        tuning.chart.validate()?;

        let settings = Self {
            input_file: options.input_file.clone(),
            output_file: options.output_file.clone(),
            report: tuning.report,
            chart: tuning.chart,
        };
        tracing::debug!(?settings, "settings loaded");
        Ok(settings)
    }
}

fn load_tuning(config_path: Option<&Path>, environment: Environment) -> Result<TuningSettings, SettingsError> {
    let mut builder = Config::builder();
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    }

    let tuning = builder.add_source(environment).build()?.try_deserialize()?;
    Ok(tuning)
}
