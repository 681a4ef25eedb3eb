use std::{
    fs,
    path::Path,
    sync::{Arc, LazyLock},
};

use common::config::{GraphSettings, OutputFormat, YScale};
use eyre::{Context, Result, eyre};
use plotters::{
    coord::Shift,
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use svg2pdf::{ConversionOptions, PageOptions, usvg};
use tracing::info;

use crate::style::{
    BAR_LINE_WIDTH, GRID_COLOR, Hatch, LABEL_FONT_SIZE, LEGEND_FONT_SIZE, LINE_WIDTH, MARKER_SIZE,
    Marker, Rect, TICK_FONT_SIZE, Y_TICKS, color, hatch, hatch_lines, hatch_points, marker,
};

const YAXIS_ROUND: f64 = 1000.0;
/// Free space on either side of a bar group, in x units
const BAR_MARGIN: f64 = 0.1;

static FONTS: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Bar,
}

/// One line or one bar group, aligned to the chart's x labels
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x_labels: Vec<String>,
    pub x_desc: String,
    pub y_desc: String,
    pub y_scale: YScale,
    pub series: Vec<Series>,
    /// Index of the first palette color and marker
    pub palette_offset: usize,
}

impl ChartSpec {
    /// Values that can be drawn on the y axis; log axes clip everything non-positive
    fn visible(&self, value: Option<f64>) -> Option<f64> {
        value.filter(|v| v.is_finite() && (self.y_scale == YScale::Linear || *v > 0.0))
    }

    fn visible_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.series
            .iter()
            .flat_map(|s| s.values.iter())
            .filter_map(|v| self.visible(*v))
    }
}

pub fn next_power_of_10(n: f64) -> f64 {
    10f64.powf(n.log10().ceil())
}

pub fn get_upper_bound(n: f64) -> f64 {
    (n / YAXIS_ROUND).ceil() * YAXIS_ROUND
}

pub fn log_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| *v > 0.0)
        .fold((f64::INFINITY, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if max == 0.0 {
        return (1.0, 10.0);
    }
    let lo = 10f64.powf(min.log10().floor());
    let hi = next_power_of_10(max);
    if hi <= lo { (lo, lo * 10.0) } else { (lo, hi) }
}

pub fn linear_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let max = values.fold(0.0f64, f64::max);
    (0.0, get_upper_bound(max).max(YAXIS_ROUND))
}

type Root<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// Renders `spec` into an SVG document of `graph.width` x `graph.height` pixels
pub fn render_svg(spec: &ChartSpec, graph: &GraphSettings) -> Result<String> {
    let mut svg = String::new();
    {
        let root =
            SVGBackend::with_string(&mut svg, (graph.width, graph.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let x_range = 0f64..spec.x_labels.len().max(1) as f64;
        let mut builder = ChartBuilder::on(&root);
        builder
            .margin(8)
            .x_label_area_size(44)
            .y_label_area_size(64);

        let axis_desc = ("sans-serif", LABEL_FONT_SIZE)
            .into_font()
            .style(FontStyle::Bold);
        match spec.y_scale {
            YScale::Log => {
                let (lo, hi) = log_bounds(spec.visible_values());
                let mut chart = builder.build_cartesian_2d(x_range, (lo..hi).log_scale())?;
                chart
                    .configure_mesh()
                    .disable_x_mesh()
                    .light_line_style(WHITE)
                    .bold_line_style(GRID_COLOR)
                    .y_labels(Y_TICKS)
                    .x_label_formatter(&|_| String::new())
                    .y_label_formatter(&|y| format!("{y:.0e}"))
                    .label_style(("sans-serif", TICK_FONT_SIZE))
                    .axis_desc_style(axis_desc)
                    .x_desc(spec.x_desc.as_str())
                    .y_desc(spec.y_desc.as_str())
                    .draw()?;
                draw_data(&root, &|x, y| chart.backend_coord(&(x, y)), lo, spec)?;
            }
            YScale::Linear => {
                let (lo, hi) = linear_bounds(spec.visible_values());
                let mut chart = builder.build_cartesian_2d(x_range, lo..hi)?;
                chart
                    .configure_mesh()
                    .disable_x_mesh()
                    .light_line_style(WHITE)
                    .bold_line_style(GRID_COLOR)
                    .y_labels(Y_TICKS)
                    .x_label_formatter(&|_| String::new())
                    .y_label_formatter(&|y| format!("{y:.0}"))
                    .label_style(("sans-serif", TICK_FONT_SIZE))
                    .axis_desc_style(axis_desc)
                    .x_desc(spec.x_desc.as_str())
                    .y_desc(spec.y_desc.as_str())
                    .draw()?;
                draw_data(&root, &|x, y| chart.backend_coord(&(x, y)), lo, spec)?;
            }
        }
        root.present()?;
    }
    Ok(svg)
}

fn draw_data(
    root: &Root,
    to_px: &dyn Fn(f64, f64) -> (i32, i32),
    floor: f64,
    spec: &ChartSpec,
) -> Result<()> {
    let tick_style = TextStyle::from(("sans-serif", TICK_FONT_SIZE).into_font())
        .pos(Pos::new(HPos::Center, VPos::Top));
    for (i, label) in spec.x_labels.iter().enumerate() {
        let (x, y) = to_px(i as f64 + 0.5, floor);
        root.draw(&Text::new(label.as_str(), (x, y + 4), tick_style.clone()))?;
    }

    match spec.kind {
        ChartKind::Line => draw_lines(root, to_px, spec),
        ChartKind::Bar => draw_bars(root, to_px, floor, spec),
    }
}

fn draw_lines(
    root: &Root,
    to_px: &dyn Fn(f64, f64) -> (i32, i32),
    spec: &ChartSpec,
) -> Result<()> {
    for (idx, series) in spec.series.iter().enumerate() {
        let style_idx = idx + spec.palette_offset;
        let line_color = color(style_idx);

        // missing values break the line
        let mut runs: Vec<Vec<(i32, i32)>> = vec![Vec::new()];
        for (i, value) in series.values.iter().enumerate() {
            match spec.visible(*value) {
                Some(v) => {
                    if let Some(run) = runs.last_mut() {
                        run.push(to_px(i as f64 + 0.5, v));
                    }
                }
                None => runs.push(Vec::new()),
            }
        }
        for run in runs.iter().filter(|run| run.len() > 1) {
            root.draw(&PathElement::new(run.clone(), line_color.stroke_width(LINE_WIDTH)))?;
        }
        for point in runs.iter().flatten() {
            draw_marker(root, marker(style_idx), *point, &line_color)?;
        }
    }
    Ok(())
}

fn draw_bars(
    root: &Root,
    to_px: &dyn Fn(f64, f64) -> (i32, i32),
    floor: f64,
    spec: &ChartSpec,
) -> Result<()> {
    let width = (1.0 - 2.0 * BAR_MARGIN) / spec.series.len().max(1) as f64;
    for (group, series) in spec.series.iter().enumerate() {
        let style_idx = group + spec.palette_offset;
        let bar_color = color(style_idx);
        for (i, value) in series.values.iter().enumerate() {
            let Some(v) = spec.visible(*value) else {
                continue;
            };
            let x0 = i as f64 + BAR_MARGIN + group as f64 * width;
            let rect = Rect::new(to_px(x0, floor), to_px(x0 + width, v));
            let corners = [(rect.left, rect.top), (rect.right, rect.bottom)];
            root.draw(&Rectangle::new(corners, bar_color.filled()))?;
            draw_hatch(root, rect, hatch(style_idx))?;
            root.draw(&Rectangle::new(corners, BLACK.stroke_width(BAR_LINE_WIDTH)))?;
        }
    }
    Ok(())
}

fn draw_hatch(root: &Root, rect: Rect, pattern: Hatch) -> Result<()> {
    match pattern {
        Hatch::Forward(spacing) | Hatch::Backward(spacing) => {
            let forward = matches!(pattern, Hatch::Forward(_));
            for (a, b) in hatch_lines(rect, spacing, forward) {
                root.draw(&PathElement::new(vec![a, b], BLACK))?;
            }
        }
        Hatch::Circles(spacing) => {
            for point in hatch_points(rect, spacing, 3) {
                root.draw(&Circle::new(point, 2, BLACK.stroke_width(1)))?;
            }
        }
        Hatch::Dots(spacing) => {
            for point in hatch_points(rect, spacing, 2) {
                root.draw(&Circle::new(point, 1, BLACK.filled()))?;
            }
        }
    }
    Ok(())
}

fn draw_marker(
    root: &Root,
    shape: Marker,
    center: (i32, i32),
    color: &RGBColor,
) -> Result<()> {
    match shape.vertices(center, MARKER_SIZE) {
        None => root.draw(&Circle::new(center, MARKER_SIZE, color.filled()))?,
        Some(vertices) => root.draw(&Polygon::new(vertices, color.filled()))?,
    }
    Ok(())
}

/// A one-row legend strip: a title followed by one line+marker entry per label
pub fn render_legend(title: &str, labels: &[&str], width: u32, height: u32) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let font = ("sans-serif", LEGEND_FONT_SIZE)
            .into_font()
            .style(FontStyle::Bold);
        let text_style = TextStyle::from(font).pos(Pos::new(HPos::Left, VPos::Center));
        let mid = height as i32 / 2;
        let column = width as i32 / (labels.len() as i32 + 1);

        root.draw(&Text::new(title, (8, mid), text_style.clone()))?;
        for (idx, label) in labels.iter().enumerate() {
            let x = column * (idx as i32 + 1);
            let entry_color = color(idx);
            root.draw(&PathElement::new(
                vec![(x, mid), (x + 48, mid)],
                entry_color.stroke_width(LINE_WIDTH),
            ))?;
            draw_marker(&root, marker(idx), (x + 24, mid), &entry_color)?;
            root.draw(&Text::new(*label, (x + 58, mid), text_style.clone()))?;
        }
        root.present()?;
    }
    Ok(svg)
}

pub fn svg_to_pdf(svg: &str) -> Result<Vec<u8>> {
    let mut options = usvg::Options::default();
    options.fontdb = FONTS.clone();
    let tree = usvg::Tree::from_str(svg, &options).context("Parse rendered svg")?;
    svg2pdf::to_pdf(&tree, ConversionOptions::default(), PageOptions::default())
        .map_err(|err| eyre!("Convert svg to pdf: {err:?}"))
}

/// Writes the chart as pdf or svg depending on `format`
pub fn save_chart(svg: &str, path: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Pdf => fs::write(path, svg_to_pdf(svg)?),
        OutputFormat::Svg => fs::write(path, svg),
    }
    .context(format!("Write {}", path.display()))?;
    info!("OUTPUT: {}", path.display());
    Ok(())
}
