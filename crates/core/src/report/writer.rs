//! Crash-safe report persistence.
//!
//! Content is written to a temporary file next to the destination, synced,
//! closed and renamed over the destination. Until the rename the destination
//! is untouched; a dropped or failed [`StagedFile`] removes its temp file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info, warn};

use super::encode::encode_csv;
use super::error::WriteError;
use super::row::ViolationRow;

const TEMP_PREFIX: &str = ".tmp-";

/// Writes files atomically via temp file and rename.
#[derive(Debug, Clone, Default)]
pub struct DurableWriter {
    /// Where temp files are created. Defaults to the destination directory.
    staging_dir: Option<PathBuf>,
}

impl DurableWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage temp files in `dir` instead of the destination directory.
    ///
    /// If `dir` is on another filesystem the commit falls back to copying
    /// into the destination directory before renaming.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Starts a write to `dest`, creating its directory if needed.
    pub fn stage(&self, dest: &Path) -> Result<StagedFile, WriteError> {
        let dest = std::path::absolute(dest).map_err(|source| WriteError::InvalidPath {
            path: dest.to_path_buf(),
            source,
        })?;
        let dest_dir = dest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        debug!("Preparing output directory {:?}", dest_dir);
        fs::create_dir_all(&dest_dir).map_err(|source| WriteError::CreateDir {
            path: dest_dir.clone(),
            source,
        })?;

        let temp_dir = self.staging_dir.clone().unwrap_or_else(|| dest_dir.clone());
        let file = create_temp(&temp_dir, &dest)?;
        debug!("Created temp file {:?}", file.path());

        Ok(StagedFile {
            file,
            dest,
            dest_dir,
        })
    }

    /// Atomically replaces `dest` with `content`. Returns the absolute destination.
    pub fn persist(&self, dest: &Path, content: &[u8]) -> Result<PathBuf, WriteError> {
        let mut staged = self.stage(dest)?;
        staged.write_all(content)?;
        staged.commit()
    }

    /// Encodes rows as CSV and persists them at `dest`.
    pub fn write_rows(&self, dest: &Path, rows: &[ViolationRow]) -> Result<PathBuf, WriteError> {
        let content = encode_csv(rows)?;
        let path = self.persist(dest, &content)?;
        info!("CSV file written successfully: {:?} ({} rows)", path, rows.len());
        Ok(path)
    }

    /// Runs [`write_rows`](Self::write_rows) on the blocking pool.
    pub async fn write_rows_async(
        &self,
        dest: PathBuf,
        rows: Vec<ViolationRow>,
    ) -> Result<PathBuf, WriteError> {
        let writer = self.clone();
        tokio::task::spawn_blocking(move || writer.write_rows(&dest, &rows))
            .await
            .map_err(|e| WriteError::Join(e.to_string()))?
    }
}

/// A temp file waiting to replace its destination.
///
/// Dropping it without calling [`commit`](Self::commit) deletes the temp file
/// and leaves the destination as it was.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    dest: PathBuf,
    dest_dir: PathBuf,
}

impl StagedFile {
    /// Path of the temp file.
    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    /// Absolute destination path.
    pub fn destination(&self) -> &Path {
        &self.dest
    }

    pub fn write_all(&mut self, content: &[u8]) -> Result<(), WriteError> {
        self.file
            .write_all(content)
            .map_err(|source| WriteError::Write {
                path: self.file.path().to_path_buf(),
                source,
            })
    }

    /// Flushes, syncs, closes and renames the temp file onto the destination.
    pub fn commit(self) -> Result<PathBuf, WriteError> {
        let StagedFile {
            mut file,
            dest,
            dest_dir,
        } = self;

        file.flush().map_err(|source| WriteError::Flush {
            path: file.path().to_path_buf(),
            source,
        })?;
        file.as_file().sync_all().map_err(|source| WriteError::Sync {
            path: file.path().to_path_buf(),
            source,
        })?;

        // Closes the handle; the path is still removed on drop until persisted.
        let temp_path = file.into_temp_path();

        // Rename replaces an existing destination atomically, so the old
        // file stays readable until the new one takes its place.
        match temp_path.persist(&dest) {
            Ok(()) => {}
            Err(e) if is_cross_device(&e.error) => {
                warn!(
                    "Temp file {:?} is on another filesystem, copying into {:?}",
                    e.path, dest_dir
                );
                copy_then_rename(&e.path, &dest_dir, &dest)?;
            }
            Err(e) => {
                return Err(WriteError::Persist {
                    from: e.path.to_path_buf(),
                    to: dest,
                    source: e.error,
                });
            }
        }

        set_report_permissions(&dest)?;
        sync_dir(&dest_dir);

        Ok(dest)
    }
}

fn create_temp(dir: &Path, dest: &Path) -> Result<NamedTempFile, WriteError> {
    let suffix = dest
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(|source| WriteError::CreateTemp {
            dir: dir.to_path_buf(),
            source,
        })
}

/// Cross-filesystem fallback: copy into a second temp file in the destination
/// directory, sync it, and rename that. Never truncates the destination.
fn copy_then_rename(staged: &Path, dest_dir: &Path, dest: &Path) -> Result<(), WriteError> {
    let mut local = create_temp(dest_dir, dest)?;

    let mut source = File::open(staged).map_err(|source| WriteError::Write {
        path: staged.to_path_buf(),
        source,
    })?;
    io::copy(&mut source, local.as_file_mut()).map_err(|source| WriteError::Write {
        path: local.path().to_path_buf(),
        source,
    })?;
    local.as_file().sync_all().map_err(|source| WriteError::Sync {
        path: local.path().to_path_buf(),
        source,
    })?;

    local
        .into_temp_path()
        .persist(dest)
        .map_err(|e| WriteError::Persist {
            from: e.path.to_path_buf(),
            to: dest.to_path_buf(),
            source: e.error,
        })
}

fn is_cross_device(error: &io::Error) -> bool {
    // EXDEV is 18 on Linux and macOS
    error.kind() == io::ErrorKind::CrossesDevices || error.raw_os_error() == Some(18)
}

#[cfg(unix)]
fn set_report_permissions(path: &Path) -> Result<(), WriteError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o644)).map_err(|source| {
        WriteError::Permissions {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn set_report_permissions(_path: &Path) -> Result<(), WriteError> {
    Ok(())
}

/// Best effort: make the rename itself durable.
fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!("Could not sync directory {:?}: {}", dir, e);
    }
    #[cfg(not(unix))]
    let _ = dir;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_files_in(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(TEMP_PREFIX))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn sample_row(n: i64) -> ViolationRow {
        ViolationRow {
            application: format!("app-{n}"),
            organization: "Acme".to_string(),
            policy: "Security-High".to_string(),
            format: "npm".to_string(),
            component: "left-pad 1.0.0".to_string(),
            threat: n,
            policy_action: format!("Security-{n}"),
            constraint_name: "High risk".to_string(),
            condition: "Severity >= 7".to_string(),
            cve: String::new(),
        }
    }

    #[test]
    fn test_persist_creates_missing_directories() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("nested/deeper/report.csv");

        let path = DurableWriter::new().persist(&dest, b"hello").unwrap();

        assert!(path.is_absolute());
        assert_eq!(fs::read(&dest).unwrap(), b"hello");
        assert!(temp_files_in(dest.parent().unwrap()).is_empty());
    }

    #[test]
    fn test_persist_replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("report.csv");
        fs::write(&dest, "old content that is longer than the new one").unwrap();

        DurableWriter::new().persist(&dest, b"new").unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
        assert!(temp_files_in(temp.path()).is_empty());
    }

    #[test]
    fn test_dropped_stage_leaves_destination_untouched() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("report.csv");
        fs::write(&dest, "original").unwrap();

        let mut staged = DurableWriter::new().stage(&dest).unwrap();
        staged.write_all(b"half-written").unwrap();
        let temp_path = staged.temp_path().to_path_buf();
        assert!(temp_path.exists());
        assert_eq!(temp_path.parent(), dest.parent());
        drop(staged);

        assert_eq!(fs::read_to_string(&dest).unwrap(), "original");
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_dropped_stage_without_previous_file_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("report.csv");

        let mut staged = DurableWriter::new().stage(&dest).unwrap();
        staged.write_all(b"partial").unwrap();
        drop(staged);

        assert!(!dest.exists());
        assert!(temp_files_in(temp.path()).is_empty());
    }

    #[test]
    fn test_failed_rename_cleans_up_and_keeps_destination() {
        let temp = TempDir::new().unwrap();
        // A non-empty directory at the destination makes the rename fail.
        let dest = temp.path().join("report.csv");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("keep.txt"), "keep").unwrap();

        let err = DurableWriter::new().persist(&dest, b"data").unwrap_err();

        assert!(matches!(err, WriteError::Persist { .. }));
        assert_eq!(fs::read_to_string(dest.join("keep.txt")).unwrap(), "keep");
        assert!(temp_files_in(temp.path()).is_empty());
    }

    #[test]
    fn test_directory_creation_failure() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "i am a file").unwrap();
        let dest = blocker.join("report.csv");

        let err = DurableWriter::new().persist(&dest, b"data").unwrap_err();
        assert!(matches!(err, WriteError::CreateDir { .. }));
    }

    #[test]
    fn test_missing_staging_dir_is_create_temp_error() {
        let temp = TempDir::new().unwrap();
        let writer = DurableWriter::new().with_staging_dir(temp.path().join("does-not-exist"));

        let err = writer
            .persist(&temp.path().join("report.csv"), b"data")
            .unwrap_err();
        assert!(matches!(err, WriteError::CreateTemp { .. }));
    }

    #[test]
    fn test_separate_staging_dir_commits_to_destination() {
        let staging = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let dest = output.path().join("report.csv");

        DurableWriter::new()
            .with_staging_dir(staging.path())
            .persist(&dest, b"staged elsewhere")
            .unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "staged elsewhere");
        assert!(temp_files_in(staging.path()).is_empty());
        assert!(temp_files_in(output.path()).is_empty());
    }

    #[test]
    fn test_write_rows_is_byte_identical_across_runs() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first.csv");
        let second = temp.path().join("second.csv");
        let rows = vec![sample_row(7), sample_row(3)];

        let writer = DurableWriter::new();
        writer.write_rows(&first, &rows).unwrap();
        writer.write_rows(&second, &rows).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_committed_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("report.csv");
        DurableWriter::new().persist(&dest, b"x").unwrap();

        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_copy_then_rename_replaces_destination() {
        let staging = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let staged = staging.path().join(".tmp-staged.csv");
        let dest = output.path().join("report.csv");
        fs::write(&staged, b"No.,Application\n1,app-one\n").unwrap();
        fs::write(&dest, b"previous report with more bytes than the new one").unwrap();

        copy_then_rename(&staged, output.path(), &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"No.,Application\n1,app-one\n");
        assert!(temp_files_in(output.path()).is_empty());
        let names: Vec<_> = fs::read_dir(output.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("report.csv")]);
        // The caller owns the staged file and removes it.
        assert_eq!(fs::read(&staged).unwrap(), b"No.,Application\n1,app-one\n");
    }

    #[test]
    fn test_copy_then_rename_missing_source_keeps_destination() {
        let staging = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let dest = output.path().join("report.csv");
        fs::write(&dest, b"old").unwrap();

        let err = copy_then_rename(&staging.path().join("gone.csv"), output.path(), &dest)
            .unwrap_err();

        assert!(matches!(err, WriteError::Write { .. }));
        assert_eq!(fs::read(&dest).unwrap(), b"old");
        assert!(temp_files_in(output.path()).is_empty());
    }

    #[test]
    fn test_cross_device_detection() {
        let exdev = io::Error::from_raw_os_error(18);
        assert!(is_cross_device(&exdev));
        let other = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(!is_cross_device(&other));
    }

    #[tokio::test]
    async fn test_write_rows_async() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("out/report.csv");

        let path = DurableWriter::new()
            .write_rows_async(dest.clone(), vec![sample_row(5)])
            .await
            .unwrap();

        let text = fs::read_to_string(path).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("1,app-5,"));
    }
}
