use sqlite::{Connection, OpenFlags, State};
use std::path::Path;
use std::time::Duration;

use super::files;
use crate::error::StoreError;

/// A session file is usable only if it exists, is at least `min_size` bytes
/// and opens as SQLite with at least one schema object. Anything else,
/// including a lock that outlasts `timeout`, counts as invalid.
pub fn verify_integrity(path: &Path, min_size: u64, timeout: Duration) -> bool {
    if !has_min_size(path, min_size) {
        return false;
    }

    match schema_object_count(path, timeout) {
        Ok(0) => {
            log::debug!("{} has no schema objects", path.display());
            false
        }
        Ok(_) => true,
        Err(e) => {
            log::debug!("{} failed integrity check: {}", path.display(), e);
            false
        }
    }
}

/// Same checks as `verify_integrity`, run against a scratch copy of the file
/// and its sidecars. Closing the last connection to a WAL database replays
/// and deletes its log, so snapshots that must stay byte-for-byte intact are
/// never opened in place.
pub fn verify_detached(path: &Path, min_size: u64, timeout: Duration) -> bool {
    if !has_min_size(path, min_size) {
        return false;
    }

    let scratch = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            log::debug!("No scratch directory to verify {}: {}", path.display(), e);
            return false;
        }
    };
    let copy = scratch.path().join("candidate.session");
    if let Err(e) = std::fs::copy(path, &copy) {
        log::debug!("Could not copy {} for verification: {}", path.display(), e);
        return false;
    }
    files::copy_sidecars(path, &copy);
    verify_integrity(&copy, min_size, timeout)
}

fn has_min_size(path: &Path, min_size: u64) -> bool {
    let size = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => {
            log::debug!("{} does not exist", path.display());
            return false;
        }
    };
    if size < min_size {
        log::debug!(
            "{} is too small ({} bytes, need {})",
            path.display(),
            size,
            min_size
        );
        return false;
    }
    true
}

fn open(path: &Path, timeout: Duration) -> Result<Connection, StoreError> {
    // No create flag: a vanished file must not be recreated empty.
    let mut conn = Connection::open_with_flags(path, OpenFlags::new().with_read_write())?;
    conn.set_busy_timeout(timeout.as_millis() as usize)?;
    Ok(conn)
}

fn schema_object_count(path: &Path, timeout: Duration) -> Result<i64, StoreError> {
    let conn = open(path, timeout)?;
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM sqlite_master")?;
    let count = match stmt.next()? {
        State::Row => stmt.read::<i64, _>(0)?,
        State::Done => 0,
    };
    Ok(count)
}

/// Merge the write-ahead log into the main file. A database that is not in
/// WAL mode treats this as a no-op.
pub fn checkpoint(path: &Path, timeout: Duration) -> Result<(), StoreError> {
    let conn = open(path, timeout)?;
    conn.execute("PRAGMA wal_checkpoint(TRUNCATE);")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::*;
    use std::time::{Instant, UNIX_EPOCH};

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[test]
    fn test_valid_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.session");
        write_valid_session(&path, "dc2");
        assert!(verify_integrity(&path, 1024, TIMEOUT));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ghost.session");
        assert!(!verify_integrity(&path, 1024, TIMEOUT));
        assert!(!path.exists());
    }

    #[test]
    fn test_zero_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.session");
        std::fs::write(&path, b"").unwrap();
        assert!(!verify_integrity(&path, 1024, TIMEOUT));
        // Even without the size gate an empty database has no schema.
        assert!(!verify_integrity(&path, 0, TIMEOUT));
    }

    #[test]
    fn test_random_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.session");
        write_garbage(&path, 2000);
        assert!(!verify_integrity(&path, 1024, TIMEOUT));
    }

    #[test]
    fn test_no_schema_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hollow.session");
        write_schemaless_db(&path);
        assert!(std::fs::metadata(&path).unwrap().len() >= 1024);
        assert!(!verify_integrity(&path, 1024, TIMEOUT));
    }

    #[test]
    fn test_directory_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!verify_integrity(dir.path(), 0, TIMEOUT));
    }

    #[test]
    fn test_locked_file_fails_within_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.session");
        write_valid_session(&path, "dc2");

        let holder = sqlite::open(&path).unwrap();
        holder.execute("BEGIN EXCLUSIVE;").unwrap();

        let timeout = Duration::from_millis(300);
        let started = Instant::now();
        assert!(!verify_integrity(&path, 1024, timeout));
        assert!(started.elapsed() < timeout + Duration::from_secs(3));

        holder.execute("COMMIT;").unwrap();
        assert!(verify_integrity(&path, 1024, timeout));
    }

    #[test]
    fn test_detached_check_leaves_wal_snapshot_alone() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("eve.session");
        let snapshot = dir.path().join("eve.session.backup");
        write_valid_session(&live, "before");
        let writer = open_wal_writer(&live, "walonly");
        std::fs::copy(&live, &snapshot).unwrap();
        std::fs::copy(files::with_suffix(&live, "-wal"), files::with_suffix(&snapshot, "-wal"))
            .unwrap();
        drop(writer);
        set_mtime(&snapshot, 1_600_000_000);

        let bytes = std::fs::read(&snapshot).unwrap();
        let wal = std::fs::read(files::with_suffix(&snapshot, "-wal")).unwrap();
        assert!(!wal.is_empty());

        assert!(verify_detached(&snapshot, 1024, TIMEOUT));
        assert_eq!(std::fs::read(&snapshot).unwrap(), bytes);
        assert_eq!(std::fs::read(files::with_suffix(&snapshot, "-wal")).unwrap(), wal);
        assert_eq!(mtime(&snapshot), UNIX_EPOCH + Duration::from_secs(1_600_000_000));
    }

    #[test]
    fn test_detached_check_rejects_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let noise = dir.path().join("noise.session.backup");
        write_garbage(&noise, 4096);
        assert!(!verify_detached(&noise, 1024, TIMEOUT));
        assert!(!verify_detached(&dir.path().join("ghost"), 1024, TIMEOUT));
    }

    #[test]
    fn test_checkpoint_rollback_journal_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.session");
        write_valid_session(&path, "dc2");
        let before = std::fs::read(&path).unwrap();
        checkpoint(&path, TIMEOUT).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_checkpoint_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(checkpoint(&dir.path().join("nope.session"), TIMEOUT).is_err());
    }
}
