use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{files, integrity, validate_identity, Layout, LockProbe, SessionStore, BACKUP_SUFFIX};
use crate::error::StoreError;

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
/// Length of `_YYYYMMDD_HHMMSS`.
const STAMP_LEN: usize = 16;

/// One snapshot of a session file under the backup root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub identity: String,
    pub layout: Layout,
    pub path: PathBuf,
    pub file_name: String,
    pub modified: SystemTime,
    /// `false` for the single fixed-name legacy backup.
    pub timestamped: bool,
}

pub fn backup_file_name(identity: &str, stamp: Option<DateTime<Local>>) -> String {
    match stamp {
        Some(at) => format!("{}_{}{}", identity, at.format(STAMP_FORMAT), BACKUP_SUFFIX),
        None => format!("{}{}", identity, BACKUP_SUFFIX),
    }
}

/// Owning identity of a backup file name and whether it carries a stamp.
/// `alice_20260101_120000.session.backup` -> `("alice", true)`,
/// `alice.session.backup` -> `("alice", false)`. Sidecars and foreign
/// files yield `None`.
pub fn parse_backup_name(file_name: &str) -> Option<(String, bool)> {
    let stem = file_name.strip_suffix(BACKUP_SUFFIX)?;
    let (identity, timestamped) = if has_stamp(stem) {
        (&stem[..stem.len() - STAMP_LEN], true)
    } else {
        (stem, false)
    };
    validate_identity(identity).ok()?;
    Some((identity.to_string(), timestamped))
}

fn has_stamp(stem: &str) -> bool {
    let bytes = stem.as_bytes();
    if bytes.len() <= STAMP_LEN {
        return false;
    }
    let tail = &bytes[bytes.len() - STAMP_LEN..];
    tail[0] == b'_'
        && tail[9] == b'_'
        && tail[1..9].iter().all(u8::is_ascii_digit)
        && tail[10..].iter().all(u8::is_ascii_digit)
}

/// Newest first. Equal modification times fall back to the file name
/// (stamps sort lexicographically) and then to layout order.
pub fn sort_newest_first(entries: &mut [BackupEntry]) {
    entries.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| b.file_name.cmp(&a.file_name))
            .then_with(|| a.layout.cmp(&b.layout))
    });
}

impl<P: LockProbe> SessionStore<P> {
    /// Every backup file across the mirrored layouts, in no particular order.
    pub(crate) fn scan_backups(&self) -> Vec<BackupEntry> {
        let mut entries = Vec::new();
        for layout in Layout::ALL {
            for path in files::list_files(&self.backup_dir(layout)) {
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let Some((identity, timestamped)) = parse_backup_name(file_name) else {
                    continue;
                };
                entries.push(BackupEntry {
                    identity,
                    layout,
                    file_name: file_name.to_string(),
                    modified: files::modified(&path).unwrap_or(UNIX_EPOCH),
                    path,
                    timestamped,
                });
            }
        }
        entries
    }

    /// Backups owned by `identity`, newest first.
    pub fn list_backups(&self, identity: &str) -> Vec<BackupEntry> {
        if validate_identity(identity).is_err() {
            return Vec::new();
        }
        let mut entries: Vec<BackupEntry> = self
            .scan_backups()
            .into_iter()
            .filter(|e| e.identity == identity)
            .collect();
        sort_newest_first(&mut entries);
        entries
    }

    /// Existence only; the backups may still be corrupt.
    pub fn backup_exists(&self, identity: &str) -> bool {
        !self.list_backups(identity).is_empty()
    }

    /// Identities that have at least one backup, sorted.
    pub fn backup_identities(&self) -> Vec<String> {
        let mut identities: Vec<String> =
            self.scan_backups().into_iter().map(|e| e.identity).collect();
        identities.sort();
        identities.dedup();
        identities
    }

    /// Snapshot the live session file of `identity` into the mirrored backup
    /// directory. With `use_timestamp` off the fixed-name legacy backup is
    /// overwritten instead.
    pub fn create_backup(&self, identity: &str, use_timestamp: bool) -> bool {
        self.create_backup_stamped(identity, use_timestamp.then(Local::now))
    }

    pub(crate) fn create_backup_stamped(
        &self,
        identity: &str,
        stamp: Option<DateTime<Local>>,
    ) -> bool {
        match self.try_create_backup(identity, stamp) {
            Ok(dest) => {
                log::info!("Session {} backed up to {}", identity, dest.display());
                true
            }
            Err(StoreError::NoValidSource(_)) => {
                log::warn!("No valid session file to back up for {}", identity);
                false
            }
            Err(StoreError::Locked(path)) => {
                log::warn!(
                    "Session file {} stayed locked after {} attempts, backup of {} skipped",
                    path.display(),
                    self.config.max_attempts.max(1),
                    identity
                );
                false
            }
            Err(e) => {
                log::error!("Backup of session {} failed: {}", identity, e);
                false
            }
        }
    }

    fn try_create_backup(
        &self,
        identity: &str,
        stamp: Option<DateTime<Local>>,
    ) -> Result<PathBuf, StoreError> {
        validate_identity(identity)?;
        let (layout, source) = self
            .locate_with_layout(identity)
            .ok_or_else(|| StoreError::NoValidSource(identity.to_string()))?;
        if !self.verify_integrity(&source) {
            return Err(StoreError::NoValidSource(identity.to_string()));
        }

        let dest_dir = self.backup_dir(layout);
        std::fs::create_dir_all(&dest_dir)?;
        let dest = dest_dir.join(backup_file_name(identity, stamp));
        if stamp.is_some() && dest.exists() {
            // Stamps have one-second resolution.
            log::debug!("Overwriting {} taken within the same second", dest.display());
        }

        let attempts = self.config.max_attempts.max(1);
        let mut last_err = StoreError::Locked(source.clone());
        for attempt in 1..=attempts {
            if attempt > 1 {
                std::thread::sleep(self.config.retry_delay);
            }
            if !self.probe.is_unlocked(&source) {
                log::debug!(
                    "{} is locked (attempt {}/{})",
                    source.display(),
                    attempt,
                    attempts
                );
                last_err = StoreError::Locked(source.clone());
                continue;
            }
            match self.snapshot(&source, &dest) {
                Ok(()) => return Ok(dest),
                Err(e) => {
                    log::warn!(
                        "Copy of {} failed (attempt {}/{}): {}",
                        source.display(),
                        attempt,
                        attempts,
                        e
                    );
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Checkpoint, let the writer settle, then copy the main file and
    /// whatever sidecars exist.
    fn snapshot(&self, source: &Path, dest: &Path) -> Result<(), StoreError> {
        if let Err(e) = integrity::checkpoint(source, self.config.open_timeout) {
            log::debug!("Checkpoint of {} skipped: {}", source.display(), e);
        }
        std::thread::sleep(self.config.settle_delay);

        // Stale sidecars from an overwritten legacy backup would not match
        // the new main file.
        files::remove_sidecars(dest);
        files::copy_preserving_mtime(source, dest)?;
        files::copy_sidecars(source, dest);
        Ok(())
    }

    /// Back up every live identity. Returns how many backups succeeded.
    pub fn create_all_backups(&self, auto_cleanup: bool) -> usize {
        let identities = self.list_identities();
        let created = identities
            .iter()
            .filter(|identity| self.create_backup(identity, true))
            .count();
        log::info!(
            "Backed up {} of {} sessions",
            created,
            identities.len()
        );

        if auto_cleanup && created > 0 {
            self.clean_old_backups(self.config.keep_count);
        }
        created
    }
}
