use std::path::{Path, PathBuf};

use common::{
    config::Config,
    experiment::ExperimentKind,
    types::{ConfigPoint, Dimension, HierarchyType, Level},
    util::{MAJOR_STRING, clean_up_dir},
};
use csv::{ReaderBuilder, Trim};
use eyre::{Context, Result};
use itertools::Itertools;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tokio::fs::create_dir_all;
use tracing::{debug, info, warn};

pub mod chart;
pub mod style;

use chart::{ChartKind, ChartSpec, Series, render_legend, render_svg, save_chart};

pub const Y_DESC: &str = "Throughput (ops)";
const LEGEND_TITLE: &str = "HIERARCHY TYPES:";
const LEGEND_SIZE: (u32, u32) = (1500, 50);

pub fn chart_kind(kind: ExperimentKind) -> ChartKind {
    match kind {
        ExperimentKind::Latency | ExperimentKind::Cache => ChartKind::Line,
        ExperimentKind::Size | ExperimentKind::SizeRatio | ExperimentKind::Disk => ChartKind::Bar,
    }
}

pub fn x_desc(kind: ExperimentKind) -> &'static str {
    match kind {
        ExperimentKind::Latency => "Latency Types",
        ExperimentKind::Size => "Size Types",
        ExperimentKind::Cache => "Caching Algorithm Types",
        ExperimentKind::SizeRatio => "Size Ratio Types",
        ExperimentKind::Disk => "Disk Modes",
    }
}

fn palette_offset(kind: ExperimentKind) -> usize {
    match kind {
        ExperimentKind::Cache => 1,
        _ => 0,
    }
}

/// Reads a result file; every row is `<independent> , <stat>`
pub fn load_data_file(path: &Path) -> Result<Vec<Vec<f64>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .context(format!("Open {}", path.display()))?;
    reader
        .records()
        .map(|record| -> Result<Vec<f64>> {
            let record = record?;
            record
                .iter()
                .map(|field| {
                    field
                        .parse::<f64>()
                        .context(format!("Invalid value {field:?} in {}", path.display()))
                })
                .collect()
        })
        .collect()
}

/// Places each row's statistic at the position of its independent-variable code.
///
/// Rows arrive in completion order; codes not in `codes` are dropped and a
/// repeated code keeps its last row.
pub fn align_series(rows: &[Vec<f64>], codes: &[u8]) -> Vec<Option<f64>> {
    let mut values = vec![None; codes.len()];
    for row in rows {
        let [code, stat, ..] = row.as_slice() else {
            warn!("Skipping short row {row:?}");
            continue;
        };
        match codes.iter().position(|c| f64::from(*c) == *code) {
            Some(idx) => values[idx] = Some(*stat),
            None => debug!("Skipping row for unknown code {code}"),
        }
    }
    values
}

/// `<kind>-<trace>-<segments...>` for the figure holding `point`
pub fn figure_name(kind: ExperimentKind, point: &ConfigPoint) -> String {
    let segments = kind.result_segments(point);
    // the hierarchy segment is last and varies inside a figure
    let shared = &segments[..segments.len() - 1];
    format!("{kind}-{}", shared.iter().join("-"))
}

fn figure_series(
    config: &Config,
    kind: ExperimentKind,
    figure: &ConfigPoint,
    hierarchies: &[HierarchyType],
    codes: &[u8],
) -> Result<Vec<Series>> {
    let result_dir = config.settings.result_dir(kind);
    hierarchies
        .iter()
        .map(|hierarchy| {
            let point = figure.with(Level::Hierarchy(*hierarchy));
            let file = kind.result_path(&result_dir, &point);
            let values = if file.exists() {
                align_series(&load_data_file(&file)?, codes)
            } else {
                warn!("Missing result file {}", file.display());
                vec![None; codes.len()]
            };
            debug!("group_data = {values:?}");
            Ok(Series {
                label: hierarchy.tick_label().to_owned(),
                values,
            })
        })
        .collect()
}

/// Renders one chart per combination of the non-swept dimensions, one series per hierarchy
pub async fn plot_kind(config: &Config, kind: ExperimentKind) -> Result<Vec<PathBuf>> {
    let settings = &config.settings;
    let grid = config.grid(kind);
    grid.validate(kind)?;

    let image_dir = settings.image_dir(kind);
    clean_up_dir(&image_dir)
        .await
        .context(format!("Clear {}", image_dir.display()))?;
    info!("{MAJOR_STRING}");
    info!("{} PLOTS", kind.name().to_uppercase());

    let swept = grid.levels(kind.swept());
    let codes = swept.iter().map(|level| level.code()).collect::<Vec<_>>();
    let x_labels = swept
        .iter()
        .map(|level| level.tick_label().to_owned())
        .collect::<Vec<_>>();

    let mut plot_jobs = Vec::new();
    for figure in grid.combinations(&[kind.swept(), Dimension::Hierarchy]) {
        let spec = ChartSpec {
            kind: chart_kind(kind),
            x_labels: x_labels.clone(),
            x_desc: x_desc(kind).to_owned(),
            y_desc: Y_DESC.to_owned(),
            y_scale: settings.graph.y_scale,
            series: figure_series(config, kind, &figure, &grid.hierarchies, &codes)?,
            palette_offset: palette_offset(kind),
        };
        let path = image_dir.join(format!(
            "{}.{}",
            figure_name(kind, &figure),
            settings.graph.format.extension()
        ));
        plot_jobs.push((spec, path));
    }

    let results = plot_jobs
        .into_par_iter()
        .map(|(spec, path)| {
            let svg = render_svg(&spec, &settings.graph)?;
            save_chart(&svg, &path, settings.graph.format)?;
            Ok(path)
        })
        .collect::<Vec<Result<_>>>();

    let mut paths = Vec::with_capacity(results.len());
    for item in results {
        paths.push(item?);
    }
    Ok(paths)
}

/// The hierarchy legend shared by every chart
pub async fn plot_legend(config: &Config) -> Result<PathBuf> {
    let settings = &config.settings;
    let legend_dir = settings.images_dir.join("legend");
    create_dir_all(&legend_dir).await?;

    info!("Creating hierarchy type legend");
    let labels = HierarchyType::ALL
        .iter()
        .map(|h| h.tick_label())
        .collect::<Vec<_>>();
    let svg = render_legend(LEGEND_TITLE, &labels, LEGEND_SIZE.0, LEGEND_SIZE.1)?;
    let path = legend_dir.join(format!(
        "legend_hierarchy_type.{}",
        settings.graph.format.extension()
    ));
    save_chart(&svg, &path, settings.graph.format)?;
    Ok(path)
}
