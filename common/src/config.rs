use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs::read_to_string;
use tracing::{debug, info};

use crate::{
    experiment::{ExperimentKind, SweepGrid},
    types::{ConfigPoint, TraceType},
};

/// Operations per run: 100000 scaled by a factor of 50
pub const DEFAULT_OPERATION_COUNT: u64 = 100_000 * 50;
pub const DEFAULT_MIGRATION_FREQUENCY: u32 = 3;
/// Field of the summary line holding throughput
pub const THROUGHPUT_OFFSET: usize = 0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub settings: Settings,
    /// Values used for every dimension a sweep does not vary
    pub defaults: ConfigPoint,
    pub traces: Vec<TraceType>,
    /// Per-experiment overrides of the default grids
    pub grids: HashMap<ExperimentKind, SweepGrid>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            defaults: ConfigPoint::default(),
            traces: vec![TraceType::Tpcc],
            grids: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub program: PathBuf,
    pub trace_dir: PathBuf,
    pub results_dir: PathBuf,
    pub images_dir: PathBuf,
    pub scratch_dir: Option<PathBuf>,
    pub operation_count: u64,
    pub migration_frequency: u32,
    pub stat_offset: usize,
    pub run_duration_secs: u64,
    pub max_parallel: Option<usize>,
    pub graph: GraphSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("../build/test/machine"),
            trace_dir: PathBuf::from("../traces"),
            results_dir: PathBuf::from("results"),
            images_dir: PathBuf::from("images"),
            scratch_dir: None,
            operation_count: DEFAULT_OPERATION_COUNT,
            migration_frequency: DEFAULT_MIGRATION_FREQUENCY,
            stat_offset: THROUGHPUT_OFFSET,
            run_duration_secs: 10,
            max_parallel: None,
            graph: GraphSettings::default(),
        }
    }
}

impl Settings {
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn result_dir(&self, kind: ExperimentKind) -> PathBuf {
        self.results_dir.join(kind.name())
    }

    pub fn image_dir(&self, kind: ExperimentKind) -> PathBuf {
        self.images_dir.join(kind.name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub y_scale: YScale,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            width: 400,
            height: 150,
            format: OutputFormat::Pdf,
            y_scale: YScale::Log,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Svg,
}

/// Throughput axis scale of every chart
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YScale {
    #[default]
    Log,
    Linear,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Svg => "svg",
        }
    }
}

impl Config {
    /// Reads `path`, falling back to the built-in experiment setup when it does not exist
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config: Config = serde_yml::from_str(
            &read_to_string(path)
                .await
                .context(format!("Reading config file {}", path.display()))?,
        )
        .context("Parsing config file")?;
        debug!("Loaded config: {config:?}");
        Ok(config)
    }

    pub fn grid(&self, kind: ExperimentKind) -> SweepGrid {
        match self.grids.get(&kind) {
            Some(grid) => grid.clone(),
            None => kind.default_grid(&self.defaults, &self.traces),
        }
    }
}
