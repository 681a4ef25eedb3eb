use std::{collections::HashMap, path::PathBuf, sync::Arc};

use console::style;
use eyre::{Context, Result};
use flume::Sender;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tokio::{fs::create_dir_all, sync::Semaphore, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    bench::{self, CmdsResult},
    config::{Config, Settings},
    experiment::{ExperimentKind, SweepGrid},
    types::ConfigPoint,
    util::{MAJOR_STRING, MINOR_STRING, clean_up_dir, print_eta, random_token},
    worker::{Invocation, RunReport},
};

/// Sent by every job when its worker returns
#[derive(Debug, Clone)]
pub enum JobEvent {
    Finished(RunReport),
    Failed {
        token: String,
        independent: u8,
        error: String,
    },
}

impl JobEvent {
    pub fn token(&self) -> &str {
        match self {
            JobEvent::Finished(report) => &report.token,
            JobEvent::Failed { token, .. } => token,
        }
    }
}

#[derive(Debug)]
pub struct Job {
    pub point: ConfigPoint,
    pub token: String,
    pub command: String,
    pub result_file: PathBuf,
    pub handle: JoinHandle<()>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Outcome {
    Ok {
        stat: f64,
    },
    /// Statistic written, but the program exited non-zero or printed failure markers
    Degraded {
        stat: f64,
        exit_ok: bool,
        failure_markers: usize,
    },
    Failed {
        error: String,
    },
    /// The job ended without reporting back
    Lost,
}

impl From<JobEvent> for Outcome {
    fn from(event: JobEvent) -> Self {
        match event {
            JobEvent::Finished(report) if report.failed() => Outcome::Degraded {
                stat: report.stat,
                exit_ok: report.exit_ok,
                failure_markers: report.failure_markers,
            },
            JobEvent::Finished(report) => Outcome::Ok { stat: report.stat },
            JobEvent::Failed { error, .. } => Outcome::Failed { error },
        }
    }
}

/// One entry of `<results>/<kind>/info.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub token: String,
    pub point: ConfigPoint,
    pub command: String,
    pub result_file: PathBuf,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub kind: ExperimentKind,
    pub total: usize,
    pub ok: usize,
    pub degraded: usize,
    pub failed: usize,
}

pub struct Sweep {
    kind: ExperimentKind,
    settings: Settings,
    grid: SweepGrid,
    cmds: CmdsResult,
}

impl Sweep {
    pub fn new(config: &Config, kind: ExperimentKind) -> Result<Self> {
        let grid = config.grid(kind);
        grid.validate(kind)
            .wrap_err(format!("Invalid grid for the {kind} experiment"))?;
        let cmds = bench::cmds(&config.settings, &grid, kind);
        debug!("{kind}: {} configuration points", cmds.cmds.len());
        Ok(Self {
            kind,
            settings: config.settings.clone(),
            grid,
            cmds,
        })
    }

    pub fn kind(&self) -> ExperimentKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.cmds.cmds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.cmds.is_empty()
    }

    /// Logs and returns the expected wall time of the sweep in seconds
    pub fn eta(&self) -> u64 {
        print_eta(&self.grid.lengths(), self.settings.run_duration_secs)
    }

    /// Command lines of every run, without the summary file argument
    pub fn commands(&self) -> Vec<String> {
        self.cmds
            .cmds
            .iter()
            .map(|cmd| {
                let mut parts = vec![self.cmds.program.to_string_lossy().into_owned()];
                parts.extend(cmd.args.iter().cloned());
                parts.join(" ")
            })
            .collect()
    }

    /// One invocation per configuration point, each with its own token.
    ///
    /// Creates the result directories, so it must run after the result dir was cleared.
    pub async fn plan(&self) -> Result<Vec<Invocation>> {
        let result_dir = self.settings.result_dir(self.kind);
        let scratch = self.settings.scratch_dir();
        let mut invocations = Vec::with_capacity(self.cmds.cmds.len());
        for cmd in &self.cmds.cmds {
            let token = random_token();
            invocations.push(Invocation {
                program: self.cmds.program.clone(),
                args: cmd.args.clone(),
                result_file: self.kind.result_file(&result_dir, &cmd.point).await?,
                output_file: scratch.join(format!("machine-{token}.txt")),
                summary_file: scratch.join(format!("{}-{token}.summary", self.kind)),
                independent: cmd.point.level(self.kind.swept()).code(),
                stat_offset: self.settings.stat_offset,
                token,
            });
        }
        Ok(invocations)
    }

    /// Clears `<results>/<kind>` and spawns one task per configuration point
    pub async fn launch(&self, tx: Sender<JobEvent>) -> Result<Vec<Job>> {
        let result_dir = self.settings.result_dir(self.kind);
        clean_up_dir(&result_dir)
            .await
            .wrap_err(format!("Clearing {}", result_dir.display()))?;
        create_dir_all(self.settings.scratch_dir())
            .await
            .context("Creating scratch dir")?;

        info!("{MAJOR_STRING}");
        info!("{} EXPERIMENT", self.kind.name().to_uppercase());
        self.eta();

        let limit = self
            .settings
            .max_parallel
            .map(|n| Arc::new(Semaphore::new(n.max(1))));

        let invocations = self.plan().await?;
        let mut jobs = Vec::with_capacity(invocations.len());
        for (cmd, invocation) in self.cmds.cmds.iter().zip(invocations) {
            info!("{MINOR_STRING}");
            info!("{}", cmd.point);

            let job = Job {
                point: cmd.point,
                token: invocation.token.clone(),
                command: invocation.command_line(),
                result_file: invocation.result_file.clone(),
                handle: spawn_worker(invocation, tx.clone(), limit.clone()),
            };
            jobs.push(job);
        }
        Ok(jobs)
    }

    /// Launches every run, waits for all of them and writes `info.json`
    pub async fn run(&self, progress: bool) -> Result<SweepSummary> {
        let (tx, rx) = flume::unbounded();
        let mut jobs = self.launch(tx).await?;

        let bar = if progress {
            let bar = ProgressBar::new(jobs.len() as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "[{elapsed_precise}] {msg} [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
                )?
                .progress_chars("#>-"),
            );
            bar.set_message(self.kind.to_string());
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut events = HashMap::new();
        // closes once every task has dropped its sender
        while let Ok(event) = rx.recv_async().await {
            bar.inc(1);
            events.insert(event.token().to_owned(), event);
        }
        bar.finish_and_clear();

        let (tokens, handles): (Vec<_>, Vec<_>) = jobs
            .iter_mut()
            .map(|job| (job.token.clone(), &mut job.handle))
            .unzip();
        for (token, joined) in tokens.iter().zip(join_all(handles).await) {
            if let Err(err) = joined {
                error!("Job {token} did not complete: {err}");
            }
        }

        let infos: Vec<JobInfo> = jobs
            .into_iter()
            .map(|job| JobInfo {
                outcome: events
                    .remove(&job.token)
                    .map(Outcome::from)
                    .unwrap_or(Outcome::Lost),
                token: job.token,
                point: job.point,
                command: job.command,
                result_file: job.result_file,
            })
            .collect();

        let info_file = self.settings.result_dir(self.kind).join("info.json");
        tokio::fs::write(&info_file, serde_json::to_string_pretty(&infos)?)
            .await
            .wrap_err(format!("Writing {}", info_file.display()))?;

        let summary = summarize(self.kind, &infos);
        report(&summary);
        Ok(summary)
    }
}

fn spawn_worker(
    invocation: Invocation,
    tx: Sender<JobEvent>,
    limit: Option<Arc<Semaphore>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _permit = match limit {
            Some(limit) => limit.acquire_owned().await.ok(),
            None => None,
        };
        let event = match invocation.run().await {
            Ok(report) => JobEvent::Finished(report),
            Err(err) => {
                error!("FAILED: {} :: {err}", invocation.command_line());
                JobEvent::Failed {
                    token: invocation.token.clone(),
                    independent: invocation.independent,
                    error: err.to_string(),
                }
            }
        };
        if tx.send_async(event).await.is_err() {
            warn!("Nobody is listening for job {}", invocation.token);
        }
    })
}

pub fn summarize(kind: ExperimentKind, infos: &[JobInfo]) -> SweepSummary {
    let mut summary = SweepSummary {
        kind,
        total: infos.len(),
        ok: 0,
        degraded: 0,
        failed: 0,
    };
    for info in infos {
        match info.outcome {
            Outcome::Ok { .. } => summary.ok += 1,
            Outcome::Degraded { .. } => summary.degraded += 1,
            Outcome::Failed { .. } | Outcome::Lost => summary.failed += 1,
        }
    }
    summary
}

fn report(summary: &SweepSummary) {
    info!(
        "{} finished: {}/{} ok, {} degraded, {} failed",
        summary.kind, summary.ok, summary.total, summary.degraded, summary.failed
    );
    let counts = format!(
        "{} ok, {} degraded, {} failed",
        summary.ok, summary.degraded, summary.failed
    );
    let counts = if summary.failed > 0 {
        style(counts).red()
    } else if summary.degraded > 0 {
        style(counts).yellow()
    } else {
        style(counts).green()
    };
    println!(
        "{} experiment: {} runs, {counts}",
        style(summary.kind).bold(),
        summary.total
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(token: &str, exit_ok: bool, markers: usize) -> JobEvent {
        JobEvent::Finished(RunReport {
            token: token.to_owned(),
            independent: 1,
            stat: 10.0,
            exit_ok,
            failure_markers: markers,
        })
    }

    #[test]
    fn outcomes_from_events() {
        assert_eq!(Outcome::from(report("a", true, 0)), Outcome::Ok { stat: 10.0 });
        assert_eq!(
            Outcome::from(report("b", false, 0)),
            Outcome::Degraded {
                stat: 10.0,
                exit_ok: false,
                failure_markers: 0
            }
        );
        let failed = JobEvent::Failed {
            token: "c".to_owned(),
            independent: 2,
            error: "Summary file x is empty".to_owned(),
        };
        assert_eq!(failed.token(), "c");
        assert!(matches!(Outcome::from(failed), Outcome::Failed { .. }));
    }

    #[test]
    fn summary_counts() {
        let info = |outcome| JobInfo {
            token: "t".to_owned(),
            point: ConfigPoint::default(),
            command: String::new(),
            result_file: PathBuf::new(),
            outcome,
        };
        let infos = vec![
            info(Outcome::Ok { stat: 1.0 }),
            info(Outcome::Lost),
            info(Outcome::Failed {
                error: "x".to_owned(),
            }),
            info(Outcome::Degraded {
                stat: 1.0,
                exit_ok: true,
                failure_markers: 2,
            }),
        ];
        let summary = summarize(ExperimentKind::Size, &infos);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.ok, 1);
        assert_eq!(summary.degraded, 1);
        assert_eq!(summary.failed, 2);
    }

    #[test]
    fn commands_match_points() {
        let sweep = Sweep::new(&Config::default(), ExperimentKind::Latency).unwrap();
        assert_eq!(sweep.len(), 20);
        let commands = sweep.commands();
        assert!(commands[0].starts_with("../build/test/machine -a 1 -d 1 -l 1 "));
        assert!(commands[3].starts_with("../build/test/machine -a 1 -d 1 -l 4 "));
    }

    #[test]
    fn invalid_grid_is_rejected() {
        let mut config = Config::default();
        let mut grid = config.grid(ExperimentKind::Cache);
        grid.traces.clear();
        config.grids.insert(ExperimentKind::Cache, grid);
        assert!(Sweep::new(&config, ExperimentKind::Cache).is_err());
    }
}
