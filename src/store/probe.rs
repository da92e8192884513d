use std::fs::OpenOptions;
use std::path::Path;

/// Cooperative check for whether another process holds a session file
/// exclusively. Best effort only: a writer may grab the file right after.
pub trait LockProbe {
    fn is_unlocked(&self, path: &Path) -> bool;
}

/// Opens the file for append without writing anything. Fails while an
/// exclusive lock is held on platforms that enforce one.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppendProbe;

impl LockProbe for AppendProbe {
    fn is_unlocked(&self, path: &Path) -> bool {
        OpenOptions::new().append(true).open(path).is_ok()
    }
}

impl<F> LockProbe for F
where
    F: Fn(&Path) -> bool,
{
    fn is_unlocked(&self, path: &Path) -> bool {
        self(path)
    }
}
