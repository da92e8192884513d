//! Per-identity session credential files and their backups.
//!
//! Live files live under the sessions root in one of three layouts (flat,
//! `telethon/`, `pyrogram/`). Backups mirror that layout under `backups/`.
//! Every public operation here reports failure through its return value and
//! the log, never through an error.

pub mod backup;
pub mod files;
pub mod integrity;
pub mod probe;
pub mod restore;
pub mod retention;

#[cfg(test)]
pub(crate) mod test_support;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::error::StoreError;

pub use backup::BackupEntry;
pub use probe::{AppendProbe, LockProbe};

pub const SESSION_SUFFIX: &str = ".session";
pub const BACKUP_SUFFIX: &str = ".session.backup";
pub const BACKUP_DIR: &str = "backups";
pub const ERROR_DIR: &str = "error";
pub const MIN_SESSION_SIZE: u64 = 1024;

/// Where a credential file sits relative to the sessions root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Flat,
    Telethon,
    Pyrogram,
}

impl Layout {
    /// Search order for live files and backups.
    pub const ALL: [Layout; 3] = [Layout::Flat, Layout::Telethon, Layout::Pyrogram];

    pub fn subdir(self) -> Option<&'static str> {
        match self {
            Layout::Flat => None,
            Layout::Telethon => Some("telethon"),
            Layout::Pyrogram => Some("pyrogram"),
        }
    }

    /// `base` itself for the flat layout, `base/<subdir>` otherwise.
    pub fn under(self, base: &Path) -> PathBuf {
        match self.subdir() {
            Some(sub) => base.join(sub),
            None => base.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub sessions_root: PathBuf,
    /// Backups retained per identity by `create_all_backups`.
    pub keep_count: usize,
    pub min_size: u64,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub settle_delay: Duration,
    pub open_timeout: Duration,
}

impl StoreConfig {
    pub fn new(sessions_root: impl Into<PathBuf>) -> Self {
        StoreConfig {
            sessions_root: sessions_root.into(),
            keep_count: 5,
            min_size: MIN_SESSION_SIZE,
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            settle_delay: Duration::from_millis(100),
            open_timeout: Duration::from_secs(2),
        }
    }
}

impl From<&Config> for StoreConfig {
    fn from(config: &Config) -> Self {
        StoreConfig {
            keep_count: config.backup_keep_count,
            ..StoreConfig::new(&config.sessions_path)
        }
    }
}

pub struct SessionStore<P: LockProbe = AppendProbe> {
    config: StoreConfig,
    backup_root: PathBuf,
    probe: P,
}

impl SessionStore<AppendProbe> {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_probe(config, AppendProbe)
    }
}

impl<P: LockProbe> SessionStore<P> {
    pub fn with_probe(config: StoreConfig, probe: P) -> Self {
        let backup_root = config.sessions_root.join(BACKUP_DIR);
        if let Err(e) = std::fs::create_dir_all(&backup_root) {
            log::warn!(
                "Could not create backup directory {}: {}",
                backup_root.display(),
                e
            );
        }
        SessionStore {
            config,
            backup_root,
            probe,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn sessions_root(&self) -> &Path {
        &self.config.sessions_root
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    pub fn live_dir(&self, layout: Layout) -> PathBuf {
        layout.under(&self.config.sessions_root)
    }

    pub fn backup_dir(&self, layout: Layout) -> PathBuf {
        layout.under(&self.backup_root)
    }

    pub fn live_path(&self, layout: Layout, identity: &str) -> PathBuf {
        self.live_dir(layout)
            .join(format!("{}{}", identity, SESSION_SUFFIX))
    }

    /// First existing `<identity>.session` in flat, telethon, pyrogram order.
    pub fn locate(&self, identity: &str) -> Option<PathBuf> {
        self.locate_with_layout(identity).map(|(_, path)| path)
    }

    pub fn locate_with_layout(&self, identity: &str) -> Option<(Layout, PathBuf)> {
        if let Err(e) = validate_identity(identity) {
            log::warn!("Refusing to locate session: {}", e);
            return None;
        }
        Layout::ALL
            .iter()
            .map(|&layout| (layout, self.live_path(layout, identity)))
            .find(|(_, path)| path.is_file())
    }

    pub fn verify_integrity(&self, path: &Path) -> bool {
        integrity::verify_integrity(path, self.config.min_size, self.config.open_timeout)
    }

    /// Integrity check for backups, which must not be modified by checking.
    pub fn verify_backup(&self, path: &Path) -> bool {
        integrity::verify_detached(path, self.config.min_size, self.config.open_timeout)
    }

    /// Every identity with a live file, in layout order then name order.
    /// An identity present in several layouts is listed once.
    pub fn list_identities(&self) -> Vec<String> {
        let mut identities: Vec<String> = Vec::new();
        for layout in Layout::ALL {
            let mut names: Vec<String> = files::list_files(&self.live_dir(layout))
                .into_iter()
                .filter_map(|path| {
                    let name = path.file_name()?.to_str()?;
                    let identity = name.strip_suffix(SESSION_SUFFIX)?;
                    validate_identity(identity).ok()?;
                    Some(identity.to_string())
                })
                .collect();
            names.sort();
            for name in names {
                if !identities.contains(&name) {
                    identities.push(name);
                }
            }
        }
        identities
    }
}

/// Reject names that could escape the layout directories.
pub fn validate_identity(identity: &str) -> Result<(), StoreError> {
    let bad = identity.is_empty()
        || identity == "."
        || identity.contains("..")
        || identity.contains('/')
        || identity.contains('\\')
        || identity.contains('\0');
    if bad {
        Err(StoreError::InvalidIdentity(identity.to_string()))
    } else {
        Ok(())
    }
}
