//! # Archive Files
//!
//! Reading and writing `.csz` archive files:
//! - **Atomic saves**: write to `.csz.tmp`, fsync, rename over the target
//! - **File locking**: one writer at a time, with a visible `.csz.lock` file
//! - **Version validation**: refuse archives written by a newer schema
//!
//! ## Example
//!
//! ```rust,no_run
//! use cable_core::archive::Archive;
//! use cable_core::file_io::{load_or_default, save_archive, FileLock};
//! use std::path::Path;
//!
//! let path = Path::new("cablesizer.csz");
//! let lock = FileLock::acquire(path, "site-office")?;
//! let archive: Archive = load_or_default(path)?;
//! save_archive(&archive, path)?;
//! drop(lock);
//! # Ok::<(), cable_core::errors::CalcError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::archive::{Archive, ArchiveMetadata, SCHEMA_VERSION};
use crate::errors::{CalcError, CalcResult};

/// Locks older than this are taken over
const STALE_LOCK_HOURS: i64 = 24;

/// Owner metadata written into the `.lock` file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Who holds the lock (user name or e-mail)
    pub user_id: String,
    /// Host the lock was taken on
    pub machine: String,
    pub pid: u32,
    pub locked_at: DateTime<Utc>,
}

impl LockInfo {
    /// Lock info for the current process
    pub fn new(user_id: impl Into<String>) -> Self {
        LockInfo {
            user_id: user_id.into(),
            machine: hostname().unwrap_or_else(|| "unknown".to_string()),
            pid: std::process::id(),
            locked_at: Utc::now(),
        }
    }

    /// A lock is stale when its process is gone (same host) or it is too old
    pub fn is_stale(&self) -> bool {
        if hostname().is_some_and(|ours| ours == self.machine) && !process_alive(self.pid) {
            return true;
        }
        (Utc::now() - self.locked_at).num_hours() > STALE_LOCK_HOURS
    }
}

fn hostname() -> Option<String> {
    #[cfg(windows)]
    {
        std::env::var("COMPUTERNAME").ok()
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOSTNAME").ok().or_else(|| std::env::var("HOST").ok())
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

#[cfg(windows)]
fn process_alive(pid: u32) -> bool {
    use std::process::Command;
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/NH"])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
        .unwrap_or(true)
}

#[cfg(not(any(unix, windows)))]
fn process_alive(_pid: u32) -> bool {
    true
}

/// Exclusive lock on an archive file, released on drop.
///
/// Combines an OS-level lock (fs2) with a `.lock` file other users can read
/// to see who is holding the archive.
pub struct FileLock {
    archive_path: PathBuf,
    lock_path: PathBuf,
    _lock_file: File,
    pub info: LockInfo,
}

impl FileLock {
    /// Acquire an exclusive lock on an archive file.
    ///
    /// # Returns
    ///
    /// * `Ok(FileLock)` - Lock acquired
    /// * `Err(CalcError::FileLocked)` - Someone else holds a live lock
    pub fn acquire(path: &Path, user_id: impl Into<String>) -> CalcResult<Self> {
        let lock_path = lock_path_for(path);
        let info = LockInfo::new(user_id);

        if let Some(existing) = read_lock_info(&lock_path) {
            if !existing.is_stale() {
                return Err(CalcError::file_locked(
                    path.display().to_string(),
                    format!("{} ({})", existing.user_id, existing.machine),
                    existing.locked_at.to_rfc3339(),
                ));
            }
            warn!(path = %lock_path.display(), holder = %existing.user_id, "taking over stale lock");
        }

        let mut lock_file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| CalcError::file_error("create lock", lock_path.display().to_string(), e.to_string()))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| CalcError::file_locked(path.display().to_string(), "another process", "unknown"))?;

        let lock_json = serde_json::to_string_pretty(&info).map_err(|e| CalcError::serialization(e.to_string()))?;
        lock_file
            .write_all(lock_json.as_bytes())
            .and_then(|_| lock_file.sync_all())
            .map_err(|e| CalcError::file_error("write lock", lock_path.display().to_string(), e.to_string()))?;

        debug!(path = %path.display(), "archive locked");
        Ok(FileLock {
            archive_path: path.to_path_buf(),
            lock_path,
            _lock_file: lock_file,
            info,
        })
    }

    /// Current live lock holder, if any
    pub fn check(path: &Path) -> Option<LockInfo> {
        read_lock_info(&lock_path_for(path)).filter(|info| !info.is_stale())
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// `archive.csz` → `archive.csz.lock`
fn lock_path_for(path: &Path) -> PathBuf {
    with_suffix(path, "lock")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let extension = path
        .extension()
        .map(|e| format!("{}.{}", e.to_string_lossy(), suffix))
        .unwrap_or_else(|| suffix.to_string());
    path.with_extension(extension)
}

fn read_lock_info(lock_path: &Path) -> Option<LockInfo> {
    let contents = fs::read_to_string(lock_path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Save an archive with atomic write semantics.
///
/// Serializes to JSON, writes `<path>.tmp`, syncs it to disk, then renames it
/// over `path`. An interrupted save leaves the previous file intact.
pub fn save_archive(archive: &Archive, path: &Path) -> CalcResult<()> {
    let json = serde_json::to_string_pretty(archive).map_err(|e| CalcError::serialization(e.to_string()))?;

    let tmp_path = with_suffix(path, "tmp");
    let mut tmp_file = File::create(&tmp_path)
        .map_err(|e| CalcError::file_error("create temp file", tmp_path.display().to_string(), e.to_string()))?;
    tmp_file
        .write_all(json.as_bytes())
        .and_then(|_| tmp_file.sync_all())
        .map_err(|e| CalcError::file_error("write temp file", tmp_path.display().to_string(), e.to_string()))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        CalcError::file_error("rename to final", path.display().to_string(), e.to_string())
    })?;

    info!(path = %path.display(), entries = archive.len(), "archive saved");
    Ok(())
}

/// Load an archive file.
///
/// # Returns
///
/// * `Err(CalcError::VersionMismatch)` - Written by an incompatible schema
/// * `Err(CalcError::SerializationError)` - Not a valid archive
/// * `Err(CalcError::FileError)` - I/O error, including a missing file
pub fn load_archive(path: &Path) -> CalcResult<Archive> {
    let contents = fs::read_to_string(path)
        .map_err(|e| CalcError::file_error("read", path.display().to_string(), e.to_string()))?;

    let invalid = |e: serde_json::Error| CalcError::serialization(format!("Invalid JSON in {}: {}", path.display(), e));

    // Check the schema before the entries, whose layout depends on it
    let header: ArchiveHeader = serde_json::from_str(&contents).map_err(invalid)?;
    validate_version(&header.meta.version)?;

    let archive: Archive = serde_json::from_str(&contents).map_err(invalid)?;

    info!(path = %path.display(), entries = archive.len(), "archive loaded");
    Ok(archive)
}

/// Load an archive, or start an empty one if the file does not exist yet.
pub fn load_or_default(path: &Path) -> CalcResult<Archive> {
    match fs::metadata(path) {
        Ok(_) => load_archive(path),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no archive yet, starting empty");
            Ok(Archive::new())
        }
        Err(e) => Err(CalcError::file_error("stat", path.display().to_string(), e.to_string())),
    }
}

/// Just the metadata of an archive file
#[derive(Deserialize)]
struct ArchiveHeader {
    meta: ArchiveMetadata,
}

/// Same major version; in 0.x the minor must match too, since 0.x minors change the layout.
fn validate_version(file_version: &str) -> CalcResult<()> {
    let parse = |v: &str| -> Vec<u32> { v.split('.').filter_map(|p| p.parse().ok()).collect() };
    let file = parse(file_version);
    let current = parse(SCHEMA_VERSION);

    let mismatch = || CalcError::VersionMismatch {
        file_version: file_version.to_string(),
        expected_version: SCHEMA_VERSION.to_string(),
    };

    match (file.first(), current.first()) {
        (Some(f), Some(c)) if f == c => {}
        _ => return Err(mismatch()),
    }
    if current[0] == 0 {
        if let (Some(f), Some(c)) = (file.get(1), current.get(1)) {
            if f != c {
                return Err(mismatch());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::{CableSizingInput, CalculationItem, LoadSpec};
    use crate::tables::reference_database;
    use std::env::temp_dir;

    fn temp_archive_path(name: &str) -> PathBuf {
        temp_dir().join(format!("cablesizer_test_{}_{}.csz", name, std::process::id()))
    }

    fn sample_archive() -> Archive {
        let mut archive = Archive::new();
        archive
            .save_evaluated(
                "Workshop feeder",
                CalculationItem::CableSizing(CableSizingInput {
                    load: LoadSpec::Current { amps: 63.0 },
                    length_m: 40.0,
                    ..CableSizingInput::default()
                }),
                reference_database().unwrap(),
            )
            .unwrap();
        archive
    }

    #[test]
    fn test_lock_path_generation() {
        let lock_path = lock_path_for(Path::new("/data/site.csz"));
        assert_eq!(lock_path, Path::new("/data/site.csz.lock"));
        assert_eq!(lock_path_for(Path::new("archive")), Path::new("archive.lock"));
    }

    #[test]
    fn test_lock_info_creation() {
        let info = LockInfo::new("test@example.com");
        assert_eq!(info.user_id, "test@example.com");
        assert!(info.pid > 0);
        assert!(!info.is_stale());
    }

    #[test]
    fn test_old_lock_is_stale() {
        let mut info = LockInfo::new("someone");
        info.machine = "elsewhere".to_string();
        info.locked_at = Utc::now() - chrono::Duration::hours(STALE_LOCK_HOURS + 1);
        assert!(info.is_stale());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = temp_archive_path("roundtrip");
        let archive = sample_archive();
        save_archive(&archive, &path).unwrap();

        let loaded = load_archive(&path).unwrap();
        assert_eq!(loaded, archive);
        assert_eq!(loaded.entries[0].name, "Workshop feeder");

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_atomic_save_leaves_no_tmp_file() {
        let path = temp_archive_path("atomic");
        save_archive(&sample_archive(), &path).unwrap();
        assert!(!with_suffix(&path, "tmp").exists());
        assert!(path.exists());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let path = temp_archive_path("missing");
        let _ = fs::remove_file(&path);
        let archive = load_or_default(&path).unwrap();
        assert!(archive.is_empty());
        assert!(load_archive(&path).is_err());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let path = temp_archive_path("garbage");
        fs::write(&path, "not json").unwrap();
        let err = load_archive(&path).unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_file_lock_acquire_and_release() {
        let path = temp_archive_path("lock");
        File::create(&path).unwrap();

        let lock = FileLock::acquire(&path, "test@example.com").unwrap();
        assert_eq!(lock.info.user_id, "test@example.com");
        assert_eq!(lock.archive_path(), path.as_path());
        let lock_path = lock_path_for(&path);
        assert!(lock_path.exists());

        drop(lock);
        assert!(!lock_path.exists());
        assert!(FileLock::check(&path).is_none());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_version_validation() {
        assert!(validate_version(SCHEMA_VERSION).is_ok());
        assert!(validate_version("0.2.5").is_ok());
        assert!(validate_version("1.0.0").is_err());
        assert!(validate_version("0.1.7").is_err());
        assert!(validate_version("0.3.0").is_err());
        assert!(validate_version("garbage").is_err());
    }

    #[test]
    fn test_load_rejects_newer_schema() {
        let path = temp_archive_path("newer");
        let mut archive = sample_archive();
        archive.meta.version = "0.9.0".to_string();
        save_archive(&archive, &path).unwrap();
        let err = load_archive(&path).unwrap_err();
        assert_eq!(err.error_code(), "VERSION_MISMATCH");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_input_only_archive_is_version_mismatch() {
        let path = temp_archive_path("input_only");
        let old = r#"{
  "meta": { "version": "0.1.0", "created": "2024-03-01T08:00:00Z", "modified": "2024-03-01T08:00:00Z" },
  "entries": [
    {
      "id": "6f1c1a52-8a0b-4a8e-9a35-1f0d7b2b8c11",
      "name": "Old",
      "saved_at": "2024-03-01T08:00:00Z",
      "item": { "type": "CableSizing", "load": { "kind": "current", "amps": 16.0 }, "length_m": 50.0 }
    }
  ]
}"#;
        fs::write(&path, old).unwrap();
        let err = load_archive(&path).unwrap_err();
        assert_eq!(err.error_code(), "VERSION_MISMATCH");
        let _ = fs::remove_file(&path);
    }
}
