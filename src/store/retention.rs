use std::collections::BTreeMap;

use super::backup::{sort_newest_first, BackupEntry};
use super::{files, LockProbe, SessionStore};

impl<P: LockProbe> SessionStore<P> {
    /// Keep the `keep_count` most recently modified backups per identity
    /// across all layouts and delete the rest, sidecars included. Returns
    /// the total number of files deleted, sidecars counted.
    pub fn clean_old_backups(&self, keep_count: usize) -> usize {
        let mut groups: BTreeMap<String, Vec<BackupEntry>> = BTreeMap::new();
        for entry in self.scan_backups() {
            groups.entry(entry.identity.clone()).or_default().push(entry);
        }

        let mut deleted = 0;
        for (identity, entries) in groups.iter_mut() {
            if entries.len() <= keep_count {
                continue;
            }
            sort_newest_first(entries);
            for stale in &entries[keep_count..] {
                match std::fs::remove_file(&stale.path) {
                    Ok(()) => {
                        deleted += 1 + files::remove_sidecars(&stale.path);
                        log::debug!("Removed old backup {}", stale.path.display());
                    }
                    Err(e) => log::warn!(
                        "Failed to remove old backup {} of {}: {}",
                        stale.path.display(),
                        identity,
                        e
                    ),
                }
            }
        }

        if deleted > 0 {
            log::info!("Removed {} old session backup files", deleted);
        }
        deleted
    }
}
