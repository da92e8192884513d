//! Fixtures shared by the store tests.

use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{AppendProbe, LockProbe, SessionStore, StoreConfig};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Store config with every delay zeroed.
pub fn quick_config(root: &Path) -> StoreConfig {
    StoreConfig {
        retry_delay: Duration::ZERO,
        settle_delay: Duration::ZERO,
        ..StoreConfig::new(root)
    }
}

pub fn test_store(root: &Path) -> SessionStore<AppendProbe> {
    init_logger();
    SessionStore::new(quick_config(root))
}

pub fn test_store_with_probe<P: LockProbe>(root: &Path, probe: P) -> SessionStore<P> {
    init_logger();
    SessionStore::with_probe(quick_config(root), probe)
}

fn create_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
}

/// A small session database shaped like a client's auth store. `marker`
/// ends up in the `server_address` column so copies can be told apart.
pub fn write_valid_session(path: &Path, marker: &str) {
    create_parent(path);
    let _ = std::fs::remove_file(path);
    let conn = sqlite::open(path).unwrap();
    conn.execute(
        "CREATE TABLE sessions (
            dc_id          INTEGER PRIMARY KEY,
            server_address TEXT NOT NULL,
            port           INTEGER NOT NULL,
            auth_key       BLOB
        );
        CREATE TABLE version (version INTEGER PRIMARY KEY);
        INSERT INTO version VALUES (7);",
    )
    .unwrap();
    let mut stmt = conn
        .prepare("INSERT INTO sessions (dc_id, server_address, port) VALUES (2, ?, 443)")
        .unwrap();
    stmt.bind((1, marker)).unwrap();
    stmt.next().unwrap();
}

/// Switch `path` to WAL mode and commit a new marker that stays in the
/// `-wal` sidecar for as long as the returned connection is open.
pub fn open_wal_writer(path: &Path, marker: &str) -> sqlite::Connection {
    let conn = sqlite::open(path).unwrap();
    conn.execute(
        "PRAGMA journal_mode = WAL;
         PRAGMA wal_autocheckpoint = 0;",
    )
    .unwrap();
    {
        let mut stmt = conn
            .prepare("UPDATE sessions SET server_address = ? WHERE dc_id = 2")
            .unwrap();
        stmt.bind((1, marker)).unwrap();
        stmt.next().unwrap();
    }
    conn
}

pub fn read_marker(path: &Path) -> String {
    let conn = sqlite::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT server_address FROM sessions WHERE dc_id = 2")
        .unwrap();
    assert!(matches!(stmt.next().unwrap(), sqlite::State::Row));
    stmt.read::<String, _>(0).unwrap()
}

/// A well-formed database whose only table has been dropped again.
pub fn write_schemaless_db(path: &Path) {
    create_parent(path);
    let conn = sqlite::open(path).unwrap();
    conn.execute(
        "CREATE TABLE scratch (x BLOB);
         INSERT INTO scratch VALUES (zeroblob(2048));
         DROP TABLE scratch;",
    )
    .unwrap();
}

/// Deterministic noise with no SQLite header.
pub fn write_garbage(path: &Path, len: usize) {
    create_parent(path);
    let mut state: u32 = 0x9e37_79b9;
    let bytes: Vec<u8> = (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect();
    std::fs::write(path, bytes).unwrap();
}

pub fn set_mtime(path: &Path, unix_secs: u64) {
    let time = UNIX_EPOCH + Duration::from_secs(unix_secs);
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

pub fn mtime(path: &Path) -> SystemTime {
    std::fs::metadata(path).unwrap().modified().unwrap()
}
