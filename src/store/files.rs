use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const WAL_SUFFIX: &str = "-wal";
pub const SHM_SUFFIX: &str = "-shm";

/// `path` with `suffix` appended to its file name (`a.session` -> `a.session-wal`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Write-ahead log and shared-memory sidecars of a database file.
pub fn sidecars(path: &Path) -> [PathBuf; 2] {
    [with_suffix(path, WAL_SUFFIX), with_suffix(path, SHM_SUFFIX)]
}

pub fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Regular files directly inside `dir`. A missing directory is empty.
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(rd) = fs::read_dir(dir) else {
        return Vec::new();
    };
    rd.flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect()
}

/// Byte copy that carries the source modification time over to `dst`.
pub fn copy_preserving_mtime(src: &Path, dst: &Path) -> io::Result<u64> {
    let bytes = fs::copy(src, dst)?;
    let mtime = fs::metadata(src)?.modified()?;
    File::options().write(true).open(dst)?.set_modified(mtime)?;
    Ok(bytes)
}

/// Copy whichever sidecars of `src` exist next to `dst`. Failures are only
/// logged: the main file is self-sufficient.
pub fn copy_sidecars(src: &Path, dst: &Path) {
    for (from, to) in sidecars(src).iter().zip(sidecars(dst).iter()) {
        if !from.is_file() {
            continue;
        }
        if let Err(e) = copy_preserving_mtime(from, to) {
            log::debug!(
                "Sidecar copy {} -> {} failed: {}",
                from.display(),
                to.display(),
                e
            );
        }
    }
}

/// Remove sidecars of `path`, returning how many were deleted.
pub fn remove_sidecars(path: &Path) -> usize {
    let mut removed = 0;
    for sidecar in sidecars(path) {
        if !sidecar.exists() {
            continue;
        }
        match fs::remove_file(&sidecar) {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("Failed to remove {}: {}", sidecar.display(), e),
        }
    }
    removed
}

/// Rename, falling back to copy + delete when a rename is not possible
/// (e.g. across devices).
pub fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_preserving_mtime(src, dst)?;
    fs::remove_file(src)
}
