use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::Duration;
use tokio::fs::{create_dir_all, remove_dir_all};
use tracing::{debug, info};

pub const MAJOR_STRING: &str = "++++++++++++++++++++++++++++";
pub const MINOR_STRING: &str = "----------------";
pub const SUB_MINOR_STRING: &str = "******";

/// `base/seg1/seg2/.../file_name`
pub fn result_path(base: &Path, segments: &[&str], file_name: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    path.extend(segments);
    path.join(file_name)
}

/// Like [`result_path`], creating the directories on the way
pub async fn get_result_file(
    base: &Path,
    segments: &[&str],
    file_name: &str,
) -> io::Result<PathBuf> {
    let path = result_path(base, segments, file_name);
    if let Some(dir) = path.parent() {
        create_dir_all(dir).await?;
    }
    Ok(path)
}

/// Removes `dir` with everything below it and recreates it empty
pub async fn clean_up_dir(dir: &Path) -> io::Result<()> {
    match remove_dir_all(dir).await {
        Ok(()) => debug!("Removed {}", dir.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    create_dir_all(dir).await
}

/// 16 lower-case hex characters, unique enough to keep concurrent runs apart
pub fn random_token() -> String {
    format!("{:016x}", rand::random::<u64>())
}

pub fn format_eta(seconds: u64) -> String {
    let eta = Duration::seconds(seconds as i64);
    format!(
        "{:02}:{:02}:{:02}",
        eta.num_hours(),
        eta.num_minutes() % 60,
        eta.num_seconds() % 60
    )
}

/// Logs the expected runtime of a grid with the given list lengths
pub fn print_eta(lengths: &[usize], run_duration_secs: u64) -> u64 {
    let runs = lengths.iter().product::<usize>() as u64;
    let eta = runs * run_duration_secs;
    info!("EXPECTED TIME TO COMPLETE (HH:MM:SS): {}", format_eta(eta));
    eta
}

/// Deletes the file at `path` when dropped, whether or not it was ever created
#[derive(Debug)]
pub struct TemporaryFile {
    path: PathBuf,
}

impl TemporaryFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl From<PathBuf> for TemporaryFile {
    fn from(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for TemporaryFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Deleted temporary file {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => debug!(
                "Error deleting temporary file {}: {err:#}",
                self.path.display()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn result_file_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = result_path(dir.path(), &["a", "b"], "name.csv");
        assert_eq!(path, dir.path().join("a").join("b").join("name.csv"));
        assert!(!dir.path().join("a").exists());

        let file = get_result_file(dir.path(), &["a", "b"], "name.csv")
            .await
            .unwrap();
        assert_eq!(file, path);
        assert!(dir.path().join("a/b").is_dir());
        assert!(!file.exists());

        let again = get_result_file(dir.path(), &["a", "b"], "name.csv")
            .await
            .unwrap();
        assert_eq!(file, again);
    }

    #[tokio::test]
    async fn clean_up_dir_empties() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("results").join("latency");
        fs::create_dir_all(target.join("tpcc")).unwrap();
        fs::write(target.join("tpcc").join("latency.csv"), "1 , 2\n").unwrap();

        clean_up_dir(&target).await.unwrap();
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);

        let fresh = dir.path().join("never-existed");
        clean_up_dir(&fresh).await.unwrap();
        assert!(fresh.is_dir());
    }

    #[test]
    fn tokens_are_hex_and_distinct() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn eta_format() {
        assert_eq!(format_eta(0), "00:00:00");
        assert_eq!(format_eta(200), "00:03:20");
        assert_eq!(format_eta(90_061), "25:01:01");
        assert_eq!(print_eta(&[1, 1, 1, 4, 5], 10), 200);
    }

    #[test]
    fn temporary_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine-0000.txt");
        fs::write(&path, "x").unwrap();
        {
            let _guard = TemporaryFile::from(path.clone());
        }
        assert!(!path.exists());

        let _missing = TemporaryFile::from(dir.path().join("never"));
    }
}
