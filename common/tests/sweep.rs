#![cfg(unix)]

use std::{
    collections::{HashMap, HashSet},
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use common::{
    config::{Config, Settings},
    experiment::ExperimentKind,
    sweep::{JobInfo, Outcome, Sweep},
    types::HierarchyType,
};
use tempfile::TempDir;

const WRITES_SUMMARY: &str = r#"#!/bin/sh
summary=""
while [ $# -gt 0 ]; do
    case "$1" in
        -z) summary="$2"; shift 2 ;;
        *) shift ;;
    esac
done
echo "Operation : 5000000 Read block : 12"
echo "42.5 100 3" > "$summary"
"#;

const FAILS_WITH_SUMMARY: &str = r#"#!/bin/sh
summary=""
while [ $# -gt 0 ]; do
    case "$1" in
        -z) summary="$2"; shift 2 ;;
        *) shift ;;
    esac
done
echo "migration failed"
echo "7 1 1" > "$summary"
exit 3
"#;

const NO_SUMMARY: &str = "#!/bin/sh\necho \"an error occurred\"\nexit 1\n";

struct Setup {
    dir: TempDir,
    config: Config,
}

impl Setup {
    fn new(script: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("machine");
        fs::write(&program, script).unwrap();
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = Config {
            settings: Settings {
                program,
                trace_dir: dir.path().join("traces"),
                results_dir: dir.path().join("results"),
                images_dir: dir.path().join("images"),
                scratch_dir: Some(dir.path().join("scratch")),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut grid = config.grid(ExperimentKind::Latency);
        grid.hierarchies = vec![HierarchyType::Nvm];
        config.grids = HashMap::from([(ExperimentKind::Latency, grid)]);
        Self { dir, config }
    }

    fn result_file(&self) -> PathBuf {
        self.dir
            .path()
            .join("results/latency/tpcc/lru/size-2/nvm/latency.csv")
    }

    fn scratch(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    fn info(&self) -> Vec<JobInfo> {
        let info = fs::read_to_string(self.dir.path().join("results/latency/info.json")).unwrap();
        serde_json::from_str(&info).unwrap()
    }
}

fn lines(path: &Path) -> Vec<String> {
    let mut lines: Vec<String> = fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect();
    lines.sort();
    lines
}

#[tokio::test(flavor = "multi_thread")]
async fn one_line_per_swept_value() {
    let setup = Setup::new(WRITES_SUMMARY);
    let sweep = Sweep::new(&setup.config, ExperimentKind::Latency).unwrap();
    assert_eq!(sweep.len(), 4);

    let summary = sweep.run(false).await.unwrap();
    assert_eq!(summary.total, 4);
    assert_eq!(summary.ok, 4);

    assert_eq!(
        lines(&setup.result_file()),
        vec!["1 , 42.5", "2 , 42.5", "3 , 42.5", "4 , 42.5"]
    );

    let infos = setup.info();
    let tokens: HashSet<_> = infos.iter().map(|i| i.token.clone()).collect();
    assert_eq!(tokens.len(), 4);
    assert!(
        infos
            .iter()
            .all(|i| i.command.contains(&format!("latency-{}.summary", i.token)))
    );

    assert_eq!(fs::read_dir(setup.scratch()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn rerun_replaces_previous_results() {
    let setup = Setup::new(WRITES_SUMMARY);
    let sweep = Sweep::new(&setup.config, ExperimentKind::Latency).unwrap();
    sweep.run(false).await.unwrap();
    sweep.run(false).await.unwrap();
    assert_eq!(lines(&setup.result_file()).len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn non_zero_exit_still_records() {
    let setup = Setup::new(FAILS_WITH_SUMMARY);
    let mut config = setup.config.clone();
    config.settings.max_parallel = Some(1);
    let summary = Sweep::new(&config, ExperimentKind::Latency)
        .unwrap()
        .run(false)
        .await
        .unwrap();
    assert_eq!(summary.degraded, 4);
    assert_eq!(summary.failed, 0);
    assert_eq!(
        lines(&setup.result_file()),
        vec!["1 , 7.0", "2 , 7.0", "3 , 7.0", "4 , 7.0"]
    );

    for info in setup.info() {
        assert_eq!(
            info.outcome,
            Outcome::Degraded {
                stat: 7.0,
                exit_ok: false,
                failure_markers: 1
            }
        );
    }
    assert_eq!(fs::read_dir(setup.scratch()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_summary_leaves_no_line() {
    let setup = Setup::new(NO_SUMMARY);
    let summary = Sweep::new(&setup.config, ExperimentKind::Latency)
        .unwrap()
        .run(false)
        .await
        .unwrap();
    assert_eq!(summary.failed, 4);
    assert!(!setup.result_file().exists());
    assert!(
        setup
            .info()
            .iter()
            .all(|i| matches!(i.outcome, Outcome::Failed { .. }))
    );
    assert_eq!(fs::read_dir(setup.scratch()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn planned_tokens_are_distinct() {
    let setup = Setup::new(WRITES_SUMMARY);
    let sweep = Sweep::new(&setup.config, ExperimentKind::Latency).unwrap();
    let plan = sweep.plan().await.unwrap();
    let outputs: HashSet<_> = plan.iter().map(|i| i.output_file.clone()).collect();
    let summaries: HashSet<_> = plan.iter().map(|i| i.summary_file.clone()).collect();
    assert_eq!(outputs.len(), 4);
    assert_eq!(summaries.len(), 4);
    let independents: Vec<_> = plan.iter().map(|i| i.independent).collect();
    assert_eq!(independents, vec![1, 2, 3, 4]);
}
