use std::path::PathBuf;

use tracing::warn;

use crate::{
    config::Settings,
    experiment::{ExperimentKind, SweepGrid},
    types::{ConfigPoint, TraceType},
};

/// One invocation of the `machine` binary, without the summary file argument
#[derive(Debug, Clone)]
pub struct Cmd {
    pub args: Vec<String>,
    pub idx: usize,
    pub point: ConfigPoint,
}

#[derive(Debug, Clone)]
pub struct CmdsResult {
    pub program: PathBuf,
    pub cmds: Vec<Cmd>,
}

pub fn trace_file(settings: &Settings, trace: TraceType) -> PathBuf {
    settings.trace_dir.join(format!("{}.txt", trace.label()))
}

/// `-a <hierarchy> -d <disk> -l <latency> -r <ratio> -s <size> -c <caching> -f <trace> -m <freq> -o <ops>`
pub fn machine_args(settings: &Settings, point: &ConfigPoint) -> Vec<String> {
    vec![
        "-a".to_owned(),
        point.hierarchy.code().to_string(),
        "-d".to_owned(),
        point.disk_mode.code().to_string(),
        "-l".to_owned(),
        point.latency.code().to_string(),
        "-r".to_owned(),
        point.size_ratio.code().to_string(),
        "-s".to_owned(),
        point.size.code().to_string(),
        "-c".to_owned(),
        point.caching.code().to_string(),
        "-f".to_owned(),
        trace_file(settings, point.trace).to_string_lossy().into_owned(),
        "-m".to_owned(),
        settings.migration_frequency.to_string(),
        "-o".to_owned(),
        settings.operation_count.to_string(),
    ]
}

pub fn cmds(settings: &Settings, grid: &SweepGrid, kind: ExperimentKind) -> CmdsResult {
    for trace in &grid.traces {
        let path = trace_file(settings, *trace);
        if !path.exists() {
            warn!("Trace file {} does not exist", path.display());
        }
    }

    let cmds = grid
        .points(kind)
        .into_iter()
        .enumerate()
        .map(|(idx, point)| Cmd {
            args: machine_args(settings, &point),
            idx,
            point,
        })
        .collect();

    CmdsResult {
        program: settings.program.clone(),
        cmds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CachingType, HierarchyType, Level};

    #[test]
    fn args_use_codes() {
        let settings = Settings {
            trace_dir: PathBuf::from("/traces"),
            ..Default::default()
        };
        let point = ConfigPoint::default()
            .with(Level::Hierarchy(HierarchyType::NvmDisk))
            .with(Level::Caching(CachingType::Fifo));
        let args = machine_args(&settings, &point);
        assert_eq!(
            args,
            vec![
                "-a", "4", "-d", "1", "-l", "2", "-r", "4", "-s", "2", "-c", "1", "-f",
                "/traces/tpcc.txt", "-m", "3", "-o", "5000000",
            ]
        );
    }

    #[test]
    fn one_cmd_per_point() {
        let settings = Settings::default();
        let grid =
            ExperimentKind::Cache.default_grid(&ConfigPoint::default(), &[TraceType::Tpcc]);
        let result = cmds(&settings, &grid, ExperimentKind::Cache);
        assert_eq!(result.program, settings.program);
        assert_eq!(result.cmds.len(), 15);
        assert!(result.cmds.iter().enumerate().all(|(i, c)| c.idx == i));
    }
}
