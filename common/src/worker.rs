use std::{
    io,
    num::ParseFloatError,
    path::{Path, PathBuf},
    process::Stdio,
    sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    fs::{File, OpenOptions, read, read_to_string},
    io::AsyncWriteExt,
    process::Command,
};
use tracing::{debug, error, info};

use crate::util::TemporaryFile;

static FAILURE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("error|fail").expect("valid failure marker regex"));

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Summary file {} unreadable: {source}", .path.display())]
    MissingSummary {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Summary file {} is empty", .0.display())]
    EmptySummary(PathBuf),
    #[error("Summary line has no field at offset {offset}: {line:?}")]
    MissingField { offset: usize, line: String },
    #[error("Statistic {value:?} is not a number: {source}")]
    BadStat {
        value: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Everything one worker needs to run a single configuration point
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub result_file: PathBuf,
    pub output_file: PathBuf,
    pub summary_file: PathBuf,
    pub token: String,
    /// Code of the swept dimension, first column of the result file
    pub independent: u8,
    pub stat_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub token: String,
    pub independent: u8,
    pub stat: f64,
    pub exit_ok: bool,
    pub failure_markers: usize,
}

impl RunReport {
    pub fn failed(&self) -> bool {
        !self.exit_ok || self.failure_markers > 0
    }
}

impl Invocation {
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args.iter().cloned());
        parts.push("-z".to_owned());
        parts.push(self.summary_file.to_string_lossy().into_owned());
        parts.join(" ")
    }

    /// Runs the program, then appends `<independent> , <stat>` to the result file.
    ///
    /// A non-zero exit or failure markers in the output are logged and reported,
    /// but only a missing or malformed summary stops the worker.
    pub async fn run(&self) -> Result<RunReport, WorkerError> {
        let output_guard = TemporaryFile::from(self.output_file.clone());
        let summary_guard = TemporaryFile::from(self.summary_file.clone());
        let program = self.program.to_string_lossy().into_owned();

        info!("{}", self.command_line());
        let output = File::create(output_guard.path()).await?.into_std().await;
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg("-z")
            .arg(summary_guard.path())
            .stdout(Stdio::from(output))
            .status()
            .await
            .map_err(|source| WorkerError::Spawn {
                program: program.clone(),
                source,
            })?;

        let exit_ok = status.success();
        if !exit_ok {
            error!("FAILED: {program} exited with {status}");
        }

        let output = read(output_guard.path()).await?;
        let output = String::from_utf8_lossy(&output);
        let markers = scan_output(&output);
        for line in &markers {
            error!("FAILED: {program}\nERROR :: {line}");
        }

        let stat = collect_stat(summary_guard.path(), self.stat_offset).await?;
        write_stat(&self.result_file, self.independent, stat).await?;

        Ok(RunReport {
            token: self.token.clone(),
            independent: self.independent,
            stat,
            exit_ok,
            failure_markers: markers.len(),
        })
    }
}

/// Lines of program output containing `error` or `fail`
pub fn scan_output(output: &str) -> Vec<&str> {
    output
        .lines()
        .filter(|line| FAILURE_MARKER.is_match(line))
        .collect()
}

/// Parses the field at `offset` of the last line of the summary file
pub fn parse_stat(summary: &str, offset: usize) -> Result<Option<f64>, WorkerError> {
    let Some(line) = summary.lines().map(str::trim).filter(|l| !l.is_empty()).last() else {
        return Ok(None);
    };
    let value = line
        .split_whitespace()
        .nth(offset)
        .ok_or_else(|| WorkerError::MissingField {
            offset,
            line: line.to_owned(),
        })?;
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|source| WorkerError::BadStat {
            value: value.to_owned(),
            source,
        })
}

pub async fn collect_stat(summary_file: &Path, offset: usize) -> Result<f64, WorkerError> {
    let summary =
        read_to_string(summary_file)
            .await
            .map_err(|source| WorkerError::MissingSummary {
                path: summary_file.to_path_buf(),
                source,
            })?;
    let stat = parse_stat(&summary, offset)?
        .ok_or_else(|| WorkerError::EmptySummary(summary_file.to_path_buf()))?;
    info!("stat: {stat}");
    Ok(stat)
}

/// Appends one `<independent> , <stat>` line; earlier lines are never touched
pub async fn write_stat(result_file: &Path, independent: u8, stat: f64) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(result_file)
        .await?;
    // one write per line so concurrent appenders do not interleave;
    // `{:?}` keeps the fraction of whole numbers
    file.write_all(format!("{independent} , {stat:?}\n").as_bytes())
        .await?;
    file.flush().await?;
    debug!("{} <- {independent} , {stat:?}", result_file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_field_is_the_statistic() {
        assert_eq!(parse_stat("42.5 100 3", 0).unwrap(), Some(42.5));
        assert_eq!(parse_stat("42.5 100 3\n", 2).unwrap(), Some(3.0));
    }

    #[test]
    fn last_line_wins() {
        assert_eq!(parse_stat("1 2\n7.25 9\n\n", 0).unwrap(), Some(7.25));
    }

    #[test]
    fn malformed_summaries() {
        assert_eq!(parse_stat("", 0).unwrap(), None);
        assert!(matches!(
            parse_stat("42.5", 1),
            Err(WorkerError::MissingField { offset: 1, .. })
        ));
        assert!(matches!(
            parse_stat("fast 1", 0),
            Err(WorkerError::BadStat { .. })
        ));
    }

    #[test]
    fn markers_are_case_sensitive() {
        let output = "Operation : 1 Read block : 3\nallocation failed\nAn error occurred\nERROR upper\nFailed\n";
        assert_eq!(
            scan_output(output),
            vec!["allocation failed", "An error occurred"]
        );
    }

    #[tokio::test]
    async fn write_stat_appends() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("latency.csv");
        tokio::fs::write(&file, "1 , 10.5\n2 , 20\n").await.unwrap();

        write_stat(&file, 3, 99.1).await.unwrap();
        let content = read_to_string(&file).await.unwrap();
        assert_eq!(content, "1 , 10.5\n2 , 20\n3 , 99.1\n");
    }

    #[tokio::test]
    async fn whole_stats_keep_their_fraction() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("size.csv");
        write_stat(&file, 3, 42.0).await.unwrap();
        write_stat(&file, 4, 1e20).await.unwrap();
        let content = read_to_string(&file).await.unwrap();
        assert_eq!(content, "3 , 42.0\n4 , 1e20\n");
    }

    #[tokio::test]
    async fn collect_stat_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let summary = dir.path().join("latency.summary");
        tokio::fs::write(&summary, "42.5 100 3\n").await.unwrap();
        assert_eq!(collect_stat(&summary, 0).await.unwrap(), 42.5);

        let missing = collect_stat(&dir.path().join("nope.summary"), 0).await;
        assert!(matches!(missing, Err(WorkerError::MissingSummary { .. })));
    }

    #[test]
    fn command_line_ends_with_summary() {
        let invocation = Invocation {
            program: PathBuf::from("machine"),
            args: vec!["-a".to_owned(), "1".to_owned()],
            result_file: PathBuf::from("r.csv"),
            output_file: PathBuf::from("machine-ab.txt"),
            summary_file: PathBuf::from("latency-ab.summary"),
            token: "ab".to_owned(),
            independent: 1,
            stat_offset: 0,
        };
        assert_eq!(invocation.command_line(), "machine -a 1 -z latency-ab.summary");
    }
}
