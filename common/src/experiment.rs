use std::path::{Path, PathBuf};

use eyre::{Result, bail};
use itertools::iproduct;
use serde::{Deserialize, Serialize};

use crate::{
    types::{
        CachingType, ConfigPoint, Dimension, DiskModeType, HierarchyType, LatencyType, Level,
        SizeRatioType, SizeType, TraceType,
    },
    util::{get_result_file, result_path},
};

/// The experiments the driver knows how to sweep and plot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExperimentKind {
    Latency,
    Size,
    Cache,
    SizeRatio,
    Disk,
}

impl ExperimentKind {
    pub const ALL: [ExperimentKind; 5] = [
        ExperimentKind::Latency,
        ExperimentKind::Size,
        ExperimentKind::Cache,
        ExperimentKind::SizeRatio,
        ExperimentKind::Disk,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExperimentKind::Latency => "latency",
            ExperimentKind::Size => "size",
            ExperimentKind::Cache => "cache",
            ExperimentKind::SizeRatio => "size-ratio",
            ExperimentKind::Disk => "disk",
        }
    }

    /// The dimension varied innermost; its code is the independent variable
    pub fn swept(self) -> Dimension {
        match self {
            ExperimentKind::Latency => Dimension::Latency,
            ExperimentKind::Size => Dimension::Size,
            ExperimentKind::Cache => Dimension::Caching,
            ExperimentKind::SizeRatio => Dimension::SizeRatio,
            ExperimentKind::Disk => Dimension::DiskMode,
        }
    }

    /// Directory segments below `<results>/<kind>/<trace>/`, hierarchy always last
    pub fn path_dimensions(self) -> &'static [Dimension] {
        match self {
            ExperimentKind::Latency => &[
                Dimension::Caching,
                Dimension::Size,
                Dimension::Hierarchy,
            ],
            ExperimentKind::Size => &[
                Dimension::Caching,
                Dimension::Latency,
                Dimension::Hierarchy,
            ],
            ExperimentKind::Cache => &[
                Dimension::Size,
                Dimension::Latency,
                Dimension::Hierarchy,
            ],
            ExperimentKind::SizeRatio | ExperimentKind::Disk => &[
                Dimension::Caching,
                Dimension::Size,
                Dimension::Latency,
                Dimension::Hierarchy,
            ],
        }
    }

    pub fn csv_name(self) -> String {
        format!("{}.csv", self.name())
    }

    pub fn result_segments(self, point: &ConfigPoint) -> Vec<&'static str> {
        let mut segments = vec![point.trace.label()];
        segments.extend(
            self.path_dimensions()
                .iter()
                .map(|dim| point.level(*dim).label()),
        );
        segments
    }

    /// The result file `point` appends to
    pub fn result_path(self, base: &Path, point: &ConfigPoint) -> PathBuf {
        result_path(base, &self.result_segments(point), &self.csv_name())
    }

    /// Like [`ExperimentKind::result_path`], creating its directory
    pub async fn result_file(self, base: &Path, point: &ConfigPoint) -> Result<PathBuf> {
        Ok(get_result_file(base, &self.result_segments(point), &self.csv_name()).await?)
    }

    pub fn default_grid(self, defaults: &ConfigPoint, traces: &[TraceType]) -> SweepGrid {
        let mut grid = SweepGrid {
            traces: traces.to_vec(),
            hierarchies: HierarchyType::ALL.to_vec(),
            disk_modes: vec![defaults.disk_mode],
            sizes: vec![defaults.size],
            size_ratios: vec![defaults.size_ratio],
            latencies: vec![defaults.latency],
            cachings: vec![defaults.caching],
        };
        match self {
            ExperimentKind::Latency => grid.latencies = LatencyType::ALL.to_vec(),
            ExperimentKind::Size => grid.sizes = SizeType::ALL.to_vec(),
            ExperimentKind::Cache => grid.cachings = CachingType::ALL.to_vec(),
            ExperimentKind::SizeRatio => grid.size_ratios = SizeRatioType::ALL.to_vec(),
            ExperimentKind::Disk => {
                grid.disk_modes = DiskModeType::ALL.to_vec();
                grid.hierarchies.retain(|h| h.has_disk());
            }
        }
        grid
    }
}

impl core::fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// The value lists an experiment enumerates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepGrid {
    pub traces: Vec<TraceType>,
    pub hierarchies: Vec<HierarchyType>,
    pub disk_modes: Vec<DiskModeType>,
    pub sizes: Vec<SizeType>,
    pub size_ratios: Vec<SizeRatioType>,
    pub latencies: Vec<LatencyType>,
    pub cachings: Vec<CachingType>,
}

impl SweepGrid {
    pub fn levels(&self, dimension: Dimension) -> Vec<Level> {
        match dimension {
            Dimension::Hierarchy => self
                .hierarchies
                .iter()
                .map(|v| Level::Hierarchy(*v))
                .collect(),
            Dimension::DiskMode => self
                .disk_modes
                .iter()
                .map(|v| Level::DiskMode(*v))
                .collect(),
            Dimension::Size => self.sizes.iter().map(|v| Level::Size(*v)).collect(),
            Dimension::SizeRatio => self
                .size_ratios
                .iter()
                .map(|v| Level::SizeRatio(*v))
                .collect(),
            Dimension::Latency => self.latencies.iter().map(|v| Level::Latency(*v)).collect(),
            Dimension::Caching => self.cachings.iter().map(|v| Level::Caching(*v)).collect(),
        }
    }

    fn len(&self, dimension: Dimension) -> usize {
        match dimension {
            Dimension::Hierarchy => self.hierarchies.len(),
            Dimension::DiskMode => self.disk_modes.len(),
            Dimension::Size => self.sizes.len(),
            Dimension::SizeRatio => self.size_ratios.len(),
            Dimension::Latency => self.latencies.len(),
            Dimension::Caching => self.cachings.len(),
        }
    }

    /// Lengths of every list, trace first, in nesting order
    pub fn lengths(&self) -> [usize; 7] {
        [
            self.traces.len(),
            self.cachings.len(),
            self.sizes.len(),
            self.size_ratios.len(),
            self.latencies.len(),
            self.disk_modes.len(),
            self.hierarchies.len(),
        ]
    }

    /// Rejects grids where two points would append to the same result file
    pub fn validate(&self, kind: ExperimentKind) -> Result<()> {
        if self.lengths().contains(&0) {
            bail!("Every dimension of the {kind} grid needs at least one value");
        }
        for dimension in [
            Dimension::Hierarchy,
            Dimension::DiskMode,
            Dimension::Size,
            Dimension::SizeRatio,
            Dimension::Latency,
            Dimension::Caching,
        ] {
            if dimension == kind.swept() || kind.path_dimensions().contains(&dimension) {
                continue;
            }
            if self.len(dimension) > 1 {
                bail!(
                    "The {kind} experiment does not separate results by {}, give it a single value",
                    dimension.name()
                );
            }
        }
        Ok(())
    }

    /// Every combination of the grid, with the dimensions in `pinned` held at their first value
    pub fn combinations(&self, pinned: &[Dimension]) -> Vec<ConfigPoint> {
        fn pick<T: Copy>(values: &[T], pin: bool) -> &[T] {
            if pin { &values[..values.len().min(1)] } else { values }
        }
        let pin = |dimension| pinned.contains(&dimension);

        iproduct!(
            self.traces.iter(),
            pick(&self.cachings, pin(Dimension::Caching)).iter(),
            pick(&self.sizes, pin(Dimension::Size)).iter(),
            pick(&self.size_ratios, pin(Dimension::SizeRatio)).iter(),
            pick(&self.latencies, pin(Dimension::Latency)).iter(),
            pick(&self.disk_modes, pin(Dimension::DiskMode)).iter(),
            pick(&self.hierarchies, pin(Dimension::Hierarchy)).iter()
        )
        .map(
            |(trace, caching, size, size_ratio, latency, disk_mode, hierarchy)| ConfigPoint {
                trace: *trace,
                hierarchy: *hierarchy,
                disk_mode: *disk_mode,
                size: *size,
                size_ratio: *size_ratio,
                latency: *latency,
                caching: *caching,
            },
        )
        .collect()
    }

    /// Configuration points of a sweep, swept dimension innermost
    pub fn points(&self, kind: ExperimentKind) -> Vec<ConfigPoint> {
        let swept = self.levels(kind.swept());
        self.combinations(&[kind.swept()])
            .into_iter()
            .flat_map(|base| swept.iter().map(move |level| base.with(*level)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(kind: ExperimentKind) -> SweepGrid {
        kind.default_grid(&ConfigPoint::default(), &[TraceType::Tpcc])
    }

    #[test]
    fn default_grids_are_valid() {
        for kind in ExperimentKind::ALL {
            grid(kind).validate(kind).unwrap();
        }
    }

    #[test]
    fn point_counts() {
        assert_eq!(grid(ExperimentKind::Latency).points(ExperimentKind::Latency).len(), 5 * 4);
        assert_eq!(grid(ExperimentKind::Size).points(ExperimentKind::Size).len(), 5 * 4);
        assert_eq!(grid(ExperimentKind::Cache).points(ExperimentKind::Cache).len(), 5 * 3);
        assert_eq!(
            grid(ExperimentKind::SizeRatio)
                .points(ExperimentKind::SizeRatio)
                .len(),
            5 * 4
        );
        assert_eq!(grid(ExperimentKind::Disk).points(ExperimentKind::Disk).len(), 3 * 2);
    }

    #[test]
    fn swept_dimension_is_innermost() {
        let points = grid(ExperimentKind::Latency).points(ExperimentKind::Latency);
        let first: Vec<_> = points[..4].iter().map(|p| p.latency).collect();
        assert_eq!(first, LatencyType::ALL.to_vec());
        assert!(points[..4].iter().all(|p| p.hierarchy == HierarchyType::Nvm));
        assert_eq!(points[4].hierarchy, HierarchyType::DramNvm);
    }

    #[test]
    fn result_segments_follow_path_dimensions() {
        let point = ConfigPoint::default();
        assert_eq!(
            ExperimentKind::Latency.result_segments(&point),
            vec!["tpcc", "lru", "size-2", "nvm"]
        );
        assert_eq!(
            ExperimentKind::Cache.result_segments(&point),
            vec!["tpcc", "size-2", "2", "nvm"]
        );
        assert_eq!(
            ExperimentKind::Disk.result_segments(&point),
            vec!["tpcc", "lru", "size-2", "2", "nvm"]
        );
    }

    #[test]
    fn collisions_are_rejected() {
        let mut g = grid(ExperimentKind::Latency);
        g.size_ratios = SizeRatioType::ALL.to_vec();
        assert!(g.validate(ExperimentKind::Latency).is_err());

        let mut g = grid(ExperimentKind::Cache);
        g.hierarchies.clear();
        assert!(g.validate(ExperimentKind::Cache).is_err());
    }

    #[test]
    fn combinations_pin_dimensions() {
        let g = grid(ExperimentKind::Size);
        let figures = g.combinations(&[Dimension::Size, Dimension::Hierarchy]);
        assert_eq!(figures.len(), 1);
        assert_eq!(figures[0].size, SizeType::Size1);
    }

    #[test]
    fn disk_grid_only_has_disk_hierarchies() {
        let g = grid(ExperimentKind::Disk);
        assert!(g.hierarchies.iter().all(|h| h.has_disk()));
        assert_eq!(g.disk_modes.len(), 2);
    }
}
