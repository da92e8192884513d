use std::fmt;
use std::path::PathBuf;

/// Internal error type for session store operations.
///
/// Public `SessionStore` methods never hand these out; they are logged and
/// folded into a `false` / `0` / `None` result at the method boundary.
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sqlite(sqlite::Error),
    InvalidIdentity(String),
    NoValidSource(String),
    Locked(PathBuf),
    Config(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Sqlite(e) => write!(f, "SQLite error: {}", e),
            StoreError::InvalidIdentity(name) => write!(f, "invalid identity name: {:?}", name),
            StoreError::NoValidSource(name) => {
                write!(f, "no valid session file for {}", name)
            }
            StoreError::Locked(path) => write!(f, "file is locked: {}", path.display()),
            StoreError::Config(msg) => write!(f, "config error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<sqlite::Error> for StoreError {
    fn from(e: sqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}
