use log::{debug, error};
use redb::{Database, DatabaseError};
use std::path::Path;
use std::time::{Duration, Instant};

use super::error::Result;

const WAIT_BETWEEN_RETRIES: Duration = Duration::from_millis(50);

/// Opens (or creates) the store file, waiting up to `lock_timeout` for
/// another holder of the file lock to go away.
pub fn open_with_retry(path: &Path, lock_timeout: Duration) -> Result<Database> {
    let deadline = Instant::now() + lock_timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match Database::create(path) {
            Ok(db) => return Ok(db),
            Err(DatabaseError::DatabaseAlreadyOpen) if Instant::now() < deadline => {
                debug!(
                    "Attempt {}: store {} is locked, retrying",
                    attempt,
                    path.display()
                );
                std::thread::sleep(WAIT_BETWEEN_RETRIES);
            }
            Err(e) => {
                error!("Failed to open store {}: {}", path.display(), e);
                return Err(e.into());
            }
        }
    }
}
