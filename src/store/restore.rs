use chrono::Local;
use std::path::{Path, PathBuf};

use super::backup::sort_newest_first;
use super::{files, validate_identity, Layout, LockProbe, SessionStore, ERROR_DIR, SESSION_SUFFIX};
use crate::error::StoreError;

impl<P: LockProbe> SessionStore<P> {
    /// Copy the first valid backup of `identity` back to its live path in
    /// the layout the backup was taken from. Corrupt backups are skipped.
    ///
    /// With `use_latest` the newest backup is tried first; otherwise
    /// candidates go in layout order, then file name order.
    pub fn restore_from_backup(&self, identity: &str, use_latest: bool) -> bool {
        if let Err(e) = validate_identity(identity) {
            log::error!("Cannot restore session: {}", e);
            return false;
        }

        let mut candidates = self.list_backups(identity);
        if candidates.is_empty() {
            log::error!("No backup found for session {}", identity);
            return false;
        }
        if use_latest {
            sort_newest_first(&mut candidates);
        } else {
            candidates.sort_by(|a, b| {
                a.layout
                    .cmp(&b.layout)
                    .then_with(|| a.file_name.cmp(&b.file_name))
            });
        }

        for entry in &candidates {
            if !self.verify_backup(&entry.path) {
                log::warn!("Skipping corrupt backup {}", entry.path.display());
                continue;
            }
            let target = self.live_path(entry.layout, identity);
            match copy_back(&entry.path, &target) {
                Ok(()) => {
                    log::info!(
                        "Session {} restored from {}",
                        identity,
                        entry.path.display()
                    );
                    return true;
                }
                Err(e) => {
                    log::warn!(
                        "Restoring {} from {} failed: {}",
                        identity,
                        entry.path.display(),
                        e
                    );
                }
            }
        }

        log::error!(
            "All {} backups of session {} are unusable",
            candidates.len(),
            identity
        );
        false
    }

    /// Move the live session file of `identity` and its sidecars out of the
    /// way into `<sessions_root>/error/`, keeping the layout subfolder.
    pub fn quarantine(&self, identity: &str) -> bool {
        match self.try_quarantine(identity) {
            Ok(Some(dest)) => {
                log::warn!("Session {} moved to {}", identity, dest.display());
                true
            }
            Ok(None) => {
                log::warn!("No session file to quarantine for {}", identity);
                false
            }
            Err(e) => {
                log::error!("Quarantine of session {} failed: {}", identity, e);
                false
            }
        }
    }

    fn try_quarantine(&self, identity: &str) -> Result<Option<PathBuf>, StoreError> {
        validate_identity(identity)?;
        let Some((layout, source)) = self.locate_with_layout(identity) else {
            return Ok(None);
        };

        let dest_dir = self.error_dir(layout);
        std::fs::create_dir_all(&dest_dir)?;
        let mut dest = dest_dir.join(format!("{}{}", identity, SESSION_SUFFIX));
        if dest.exists() {
            dest = dest_dir.join(format!(
                "{}_{}{}",
                identity,
                Local::now().format("%Y%m%d_%H%M%S"),
                SESSION_SUFFIX
            ));
        }

        files::move_file(&source, &dest)?;
        for (from, to) in files::sidecars(&source).iter().zip(files::sidecars(&dest).iter()) {
            if from.exists() {
                if let Err(e) = files::move_file(from, to) {
                    log::debug!("Sidecar move {} failed: {}", from.display(), e);
                }
            }
        }
        Ok(Some(dest))
    }

    pub fn error_dir(&self, layout: Layout) -> PathBuf {
        layout.under(&self.config.sessions_root.join(ERROR_DIR))
    }
}

/// Replace the live file at `target` with `backup`. Live sidecars are
/// dropped first so a stale log is never replayed onto the restored file.
fn copy_back(backup: &Path, target: &Path) -> Result<(), StoreError> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    files::remove_sidecars(target);
    files::copy_preserving_mtime(backup, target)?;
    files::copy_sidecars(backup, target);
    Ok(())
}
