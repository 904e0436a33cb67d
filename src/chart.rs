use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::ops::Range;
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbImage};
use once_cell::sync::Lazy;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};

use crate::benchmark::{BenchmarkTable, Column};
use crate::error::ChartError;
use crate::settings::ChartSettings;

/// Color of the fewest shards in the benchmark.
pub const LOW_SHARD_COLOR: RGBColor = RGBColor(0x13, 0x2B, 0x43);

/// Color of the most shards in the benchmark.
pub const HIGH_SHARD_COLOR: RGBColor = RGBColor(0x56, 0xB1, 0xF7);

const MARGIN: u32 = 24;
const X_LABEL_AREA_SIZE: u32 = 40;
const Y_LABEL_AREA_SIZE: u32 = 60;
const RANGE_PADDING: f64 = 0.05;

/// Family plotters resolves for tick labels, axis titles and the legend.
const CHART_FONT_FAMILY: &str = "sans-serif";
static CHART_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

static CHART_FONT_REGISTRATION: Lazy<Result<(), String>> = Lazy::new(|| {
    register_font(CHART_FONT_FAMILY, FontStyle::Normal, CHART_FONT).map_err(|_| "embedded chart font is not a valid TrueType font".to_string())
});

/// Chart file formats, selected by the output file's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartFormat {
    Svg,
    Raster(ImageFormat),
}

impl ChartFormat {
    pub fn from_path(path: &Path) -> Result<Self, ChartError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("svg") => Ok(Self::Svg),
            Some("png") => Ok(Self::Raster(ImageFormat::Png)),
            Some("jpg") | Some("jpeg") => Ok(Self::Raster(ImageFormat::Jpeg)),
            Some("bmp") => Ok(Self::Raster(ImageFormat::Bmp)),
            _ => Err(ChartError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Continuous color scale over the shard counts in the benchmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShardColorScale {
    min: f64,
    max: f64,
}

impl ShardColorScale {
    pub fn new(shard_counts: impl IntoIterator<Item = u32>) -> Self {
        let (min, max) = shard_counts
            .into_iter()
            .map(f64::from)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| (lo.min(s), hi.max(s)));
        Self { min, max }
    }

    pub fn color(&self, shard_count: u32) -> RGBColor {
        let span = self.max - self.min;
        let t = if span.is_finite() && 0.0 < span {
            ((f64::from(shard_count) - self.min) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let channel = |lo: u8, hi: u8| (f64::from(lo) + (f64::from(hi) - f64::from(lo)) * t).round() as u8;
        RGBColor(
            channel(LOW_SHARD_COLOR.0, HIGH_SHARD_COLOR.0),
            channel(LOW_SHARD_COLOR.1, HIGH_SHARD_COLOR.1),
            channel(LOW_SHARD_COLOR.2, HIGH_SHARD_COLOR.2),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScatterPoint {
    x: f64,
    y: f64,
    shard_count: u32,
    color: RGBColor,
}

/// Renders throughput (MiB/s) against file size (MiB), colored by shard count, to `output_path`.
///
/// The chart is drawn in memory and written with a single write, so a failed render leaves no
/// file behind. The output directory must already exist.
#[tracing::instrument(level = "info", skip(table, settings), fields(nr_records=%table.len()))]
pub fn render_scatter_plot(
    table: &BenchmarkTable, output_path: &Path, settings: &ChartSettings,
) -> Result<(), ChartError> {
    let format = ChartFormat::from_path(output_path)?;
    check_output_directory(output_path)?;
    CHART_FONT_REGISTRATION
        .clone()
        .map_err(|err| ChartError::Render(format!("failed to load chart font: {}", err)))?;

    let points = scatter_points(table);
    let bytes = match format {
        ChartFormat::Svg => render_svg(&points, settings)?,
        ChartFormat::Raster(image_format) => render_raster(&points, settings, image_format)?,
    };

    fs::write(output_path, &bytes)
        .map_err(|source| ChartError::OutputAccess { path: output_path.to_path_buf(), source })?;
    tracing::info!(?format, nr_points=%points.len(), nr_bytes=%bytes.len(), "chart written");
    Ok(())
}

fn check_output_directory(output_path: &Path) -> Result<(), ChartError> {
    match output_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        Some(dir) if !dir.is_dir() => Err(ChartError::OutputAccess {
            path: output_path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("output directory {:?} does not exist", dir),
            ),
        }),
        _ => Ok(()),
    }
}

fn scatter_points(table: &BenchmarkTable) -> Vec<ScatterPoint> {
    let plottable: Vec<_> = table
        .records()
        .iter()
        .filter(|r| r.size_mib.is_finite() && r.throughput_mibs.is_finite())
        .collect();

    let nr_skipped = table.len() - plottable.len();
    if 0 < nr_skipped {
        tracing::warn!(%nr_skipped, "removed benchmark records with non-finite throughput from chart");
    }

    let scale = ShardColorScale::new(plottable.iter().map(|r| r.shard_count));
    plottable
        .into_iter()
        .map(|r| ScatterPoint {
            x: r.size_mib,
            y: r.throughput_mibs,
            shard_count: r.shard_count,
            color: scale.color(r.shard_count),
        })
        .collect()
}

/// Axis range covering `values` with a little padding on both ends.
fn axis_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }

    let span = hi - lo;
    let padding = if 0.0 < span { span * RANGE_PADDING } else { (hi.abs() * RANGE_PADDING).max(1.0) };
    (lo - padding)..(hi + padding)
}

fn render_svg(points: &[ScatterPoint], settings: &ChartSettings) -> Result<Vec<u8>, ChartError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (settings.width, settings.height)).into_drawing_area();
        draw_scatter(&root, points, settings.point_size)?;
    }
    Ok(svg.into_bytes())
}

fn render_raster(points: &[ScatterPoint], settings: &ChartSettings, format: ImageFormat) -> Result<Vec<u8>, ChartError> {
    let (width, height) = (settings.width, settings.height);
    let mut pixels = vec![0_u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        draw_scatter(&root, points, settings.point_size)?;
    }

    let image = RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| ChartError::Render("pixel buffer does not match chart dimensions".to_string()))?;
    let mut encoded = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image).write_to(&mut encoded, format)?;
    Ok(encoded.into_inner())
}

fn draw_scatter<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>, points: &[ScatterPoint], point_size: u32,
) -> Result<(), ChartError> {
    root.fill(&WHITE).map_err(render_error)?;

    let x_range = axis_range(points.iter().map(|p| p.x));
    let y_range = axis_range(points.iter().map(|p| p.y));
    let mut chart = ChartBuilder::on(root)
        .margin(MARGIN)
        .x_label_area_size(X_LABEL_AREA_SIZE)
        .y_label_area_size(Y_LABEL_AREA_SIZE)
        .build_cartesian_2d(x_range, y_range)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_desc(Column::MiB.to_string())
        .y_desc(Column::MiBs.to_string())
        .draw()
        .map_err(render_error)?;

    // one series per shard count so each gets a legend entry
    let mut by_shard_count: BTreeMap<u32, (RGBColor, Vec<&ScatterPoint>)> = BTreeMap::new();
    for point in points {
        by_shard_count
            .entry(point.shard_count)
            .or_insert_with(|| (point.color, Vec::new()))
            .1
            .push(point);
    }

    for (shard_count, (color, group)) in by_shard_count {
        chart
            .draw_series(group.into_iter().map(|p| Circle::new((p.x, p.y), point_size, p.color.filled())))
            .map_err(render_error)?
            .label(format!("{} {}", Column::ShardCount, shard_count))
            .legend(move |(x, y)| Rectangle::new([(x, y - 4), (x + 8, y + 4)], color.filled()));
    }

    if !points.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(render_error)?;
    }

    root.present().map_err(render_error)?;
    Ok(())
}

fn render_error<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> ChartError {
    ChartError::Render(err.to_string())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use claim::*;
    use once_cell::sync::Lazy;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::benchmark::BenchmarkRecord;

    #[test]
    fn test_format_from_extension() {
        Lazy::force(&crate::tracing::TEST_TRACING);
        assert_eq!(assert_ok!(ChartFormat::from_path(Path::new("report.svg"))), ChartFormat::Svg);
        assert_eq!(
            assert_ok!(ChartFormat::from_path(Path::new("out/report.PNG"))),
            ChartFormat::Raster(ImageFormat::Png)
        );
        assert_eq!(
            assert_ok!(ChartFormat::from_path(Path::new("report.jpeg"))),
            ChartFormat::Raster(ImageFormat::Jpeg)
        );
        assert_eq!(
            assert_ok!(ChartFormat::from_path(Path::new("report.bmp"))),
            ChartFormat::Raster(ImageFormat::Bmp)
        );
        assert_matches!(ChartFormat::from_path(Path::new("report.txt")), Err(ChartError::UnsupportedFormat(_)));
        assert_matches!(ChartFormat::from_path(Path::new("report")), Err(ChartError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_shard_color_scale_spans_gradient() {
        let scale = ShardColorScale::new(vec![2, 8, 32]);
        assert_eq!(scale.color(2), LOW_SHARD_COLOR);
        assert_eq!(scale.color(32), HIGH_SHARD_COLOR);

        let mid = scale.color(17);
        assert!(LOW_SHARD_COLOR.2 < mid.2 && mid.2 < HIGH_SHARD_COLOR.2);
    }

    #[test]
    fn test_shard_color_scale_single_shard_count() {
        let scale = ShardColorScale::new(vec![4, 4]);
        assert_eq!(scale.color(4), LOW_SHARD_COLOR);
        assert_eq!(ShardColorScale::new(Vec::new()).color(1), LOW_SHARD_COLOR);
    }

    #[test]
    fn test_axis_range_pads_data() {
        let range = axis_range(vec![10.0, 30.0].into_iter());
        assert_relative_eq!(range.start, 9.0);
        assert_relative_eq!(range.end, 31.0);

        let flat = axis_range(std::iter::once(5.0));
        assert_relative_eq!(flat.start, 4.0);
        assert_relative_eq!(flat.end, 6.0);

        assert_eq!(axis_range(std::iter::empty()), 0.0..1.0);
    }

    #[test]
    fn test_scatter_points_skip_non_finite_throughput() {
        Lazy::force(&crate::tracing::TEST_TRACING);
        let table: BenchmarkTable = vec![
            BenchmarkRecord::new(104_857_600, 4, 2000.0),
            BenchmarkRecord::new(104_857_600, 8, 0.0),
            BenchmarkRecord::new(209_715_200, 8, 3000.0),
        ]
        .into_iter()
        .collect();

        let actual = scatter_points(&table);
        assert_eq!(actual.len(), 2);
        assert_relative_eq!(actual[0].x, 100.0);
        assert_relative_eq!(actual[0].y, 50.0);
        assert_eq!(actual[0].color, LOW_SHARD_COLOR);
        assert_eq!(actual[1].color, HIGH_SHARD_COLOR);
    }

    #[test]
    fn test_unsupported_format_writes_nothing() -> anyhow::Result<()> {
        Lazy::force(&crate::tracing::TEST_TRACING);
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.txt");
        let actual = render_scatter_plot(&BenchmarkTable::default(), &path, &ChartSettings::default());
        assert_matches!(actual, Err(ChartError::UnsupportedFormat(_)));
        assert!(!path.exists());
        Ok(())
    }
}
