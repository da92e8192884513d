use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

pub const CONFIG_PATH_ENV: &str = "MINIMON_CONFIG";

/// Process-wide settings. Built once in `run()` and passed down by reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sessions_path: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub debug_logging: bool,
    pub auto_backup_sessions: bool,
    pub auto_restore_invalid_sessions: bool,
    pub move_invalid_sessions_to_error: bool,
    /// Comma separated identity names that are never touched.
    pub blacklisted_sessions: String,
    pub backup_keep_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sessions_path: default_sessions_path(),
            log_dir: None,
            debug_logging: false,
            auto_backup_sessions: true,
            auto_restore_invalid_sessions: true,
            move_invalid_sessions_to_error: true,
            blacklisted_sessions: String::new(),
            backup_keep_count: 5,
        }
    }
}

impl Config {
    /// Load settings from an optional JSON file, then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, StoreError> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)?;
                serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Config(format!("{}: {}", p.display(), e)))?
            }
            None => Config::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SESSIONS_PATH") {
            self.sessions_path = PathBuf::from(v.trim());
        }
        if let Some(v) = get("LOG_DIR") {
            self.log_dir = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = get("DEBUG_LOGGING") {
            self.debug_logging = parse_bool("DEBUG_LOGGING", &v)?;
        }
        if let Some(v) = get("AUTO_BACKUP_SESSIONS") {
            self.auto_backup_sessions = parse_bool("AUTO_BACKUP_SESSIONS", &v)?;
        }
        if let Some(v) = get("AUTO_RESTORE_INVALID_SESSIONS") {
            self.auto_restore_invalid_sessions =
                parse_bool("AUTO_RESTORE_INVALID_SESSIONS", &v)?;
        }
        if let Some(v) = get("MOVE_INVALID_SESSIONS_TO_ERROR") {
            self.move_invalid_sessions_to_error =
                parse_bool("MOVE_INVALID_SESSIONS_TO_ERROR", &v)?;
        }
        if let Some(v) = get("BLACKLISTED_SESSIONS") {
            self.blacklisted_sessions = v;
        }
        if let Some(v) = get("BACKUP_KEEP_COUNT") {
            self.backup_keep_count = v.trim().parse().map_err(|_| {
                StoreError::Config(format!("BACKUP_KEEP_COUNT: not a number: {}", v))
            })?;
        }
        Ok(())
    }

    pub fn blacklisted(&self) -> Vec<String> {
        self.blacklisted_sessions
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn is_blacklisted(&self, identity: &str) -> bool {
        self.blacklisted().iter().any(|s| s == identity)
    }

    pub fn log_dir(&self) -> PathBuf {
        match &self.log_dir {
            Some(dir) => dir.clone(),
            None => self
                .sessions_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("logs"),
        }
    }
}

pub fn default_sessions_path() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("minimon");
    path.push("sessions");
    path
}

fn parse_bool(key: &str, value: &str) -> Result<bool, StoreError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(StoreError::Config(format!(
            "{}: expected a boolean, got {:?}",
            key, other
        ))),
    }
}
