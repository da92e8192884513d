use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::Config;
use crate::store::{LockProbe, SessionStore};

/// Outcome of preparing one identity's session file at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Live file present and valid.
    Ready,
    /// Live file was missing or corrupt and a backup was copied in.
    Restored,
    /// Blacklisted, left alone.
    Skipped,
    /// No live file and automatic restore is off.
    Missing,
    /// Live file is corrupt and automatic restore is off.
    Corrupt,
    /// No usable backup either. Needs a fresh login.
    Unrecoverable,
}

impl SessionStatus {
    pub fn is_usable(self) -> bool {
        matches!(self, SessionStatus::Ready | SessionStatus::Restored)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct StartupReport {
    pub sessions: BTreeMap<String, SessionStatus>,
    pub backups_created: usize,
}

/// Make sure `identity` has a usable live session file before the bot
/// starts using it.
pub fn prepare_session<P: LockProbe>(
    store: &SessionStore<P>,
    config: &Config,
    identity: &str,
) -> SessionStatus {
    if config.is_blacklisted(identity) {
        log::info!("Session {} is blacklisted, skipping", identity);
        return SessionStatus::Skipped;
    }

    let corrupt = match store.locate(identity) {
        Some(path) if store.verify_integrity(&path) => return SessionStatus::Ready,
        Some(path) => {
            log::warn!("Session file {} failed integrity check", path.display());
            true
        }
        None => {
            log::warn!("Session file for {} not found", identity);
            false
        }
    };

    if corrupt && config.move_invalid_sessions_to_error {
        store.quarantine(identity);
    }

    if !config.auto_restore_invalid_sessions {
        return if corrupt {
            SessionStatus::Corrupt
        } else {
            SessionStatus::Missing
        };
    }

    if store.restore_from_backup(identity, true) {
        SessionStatus::Restored
    } else {
        SessionStatus::Unrecoverable
    }
}

/// Prepare every identity known from live files or backups, then take a
/// fresh round of backups when enabled.
pub fn startup<P: LockProbe>(store: &SessionStore<P>, config: &Config) -> StartupReport {
    let identities: BTreeSet<String> = store
        .list_identities()
        .into_iter()
        .chain(store.backup_identities())
        .collect();

    let mut report = StartupReport::default();
    for identity in identities {
        let status = prepare_session(store, config, &identity);
        report.sessions.insert(identity, status);
    }

    let usable = report.sessions.values().filter(|s| s.is_usable()).count();
    log::info!(
        "{} of {} sessions ready",
        usable,
        report.sessions.len()
    );

    if config.auto_backup_sessions {
        report.backups_created = store.create_all_backups(true);
    }
    report
}
