use crate::persistence::Persistence;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tempfile::TempDir;

/// Global test utilities
///
/// Provides a process-wide mutex to serialize tests that mutate process-wide
/// state (like environment variables). Use this to avoid flaky tests when
/// `cargo test` runs tests in parallel.
pub fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fresh database in a temporary directory; keep the `TempDir` alive for the test
pub fn create_test_db() -> (Persistence, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db_path = dir.path().join("test.duckdb");
    let persistence = Persistence::new(&db_path).expect("open test database");
    (persistence, dir)
}
