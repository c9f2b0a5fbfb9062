//! On-disk record of issued tickets.
//!
//! Each `incident-scan` process starts with empty in-memory slots, so without
//! this file two invocations over the same log window would file the same
//! tickets twice. Writers are serialized by a sibling lock file created with
//! `create_new`; the holder's pid is written into it for diagnostics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::resilience::backoff::Backoff;
use crate::tickets::types::{DedupeKey, TicketRef};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ticket state {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ticket state {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("ticket state is locked by pid {holder}; delete {path} if that process is gone")]
    Locked { path: PathBuf, holder: String },
}

/// One ticket as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTicket {
    pub key: DedupeKey,
    pub reference: TicketRef,
    pub created_at: DateTime<Utc>,
}

/// JSON file holding the tickets created within the dedupe window.
#[derive(Debug, Clone)]
pub struct TicketStore {
    path: PathBuf,
}

impl TicketStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock file guarding this store.
    pub fn lock_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".lock");
        PathBuf::from(path)
    }

    /// Read every stored ticket. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<StoredTicket>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the file contents with `tickets`.
    ///
    /// Written to a temp file and renamed, so a reader never sees a torn file.
    pub fn save(&self, tickets: &[StoredTicket]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let body = serde_json::to_vec_pretty(tickets).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, body).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    /// Take the store's lock, polling with backoff for up to `wait`.
    pub async fn lock(&self, wait: Duration) -> Result<RunLock, StoreError> {
        RunLock::acquire(self.lock_path(), wait).await
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Held for as long as a process may write the store. Removes the lock file on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    async fn acquire(path: PathBuf, wait: Duration) -> Result<Self, StoreError> {
        let backoff = Backoff::new(Duration::from_millis(50), Duration::from_secs(1));
        let deadline = Instant::now() + wait;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let written = writeln!(file, "{}", std::process::id());
                    let lock = RunLock { path };
                    written.map_err(|source| StoreError::Io {
                        path: lock.path.clone(),
                        source,
                    })?;
                    tracing::debug!(path = %lock.path.display(), "Ticket state lock acquired");
                    return Ok(lock);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    let now = Instant::now();
                    if now >= deadline {
                        let holder = fs::read_to_string(&path).unwrap_or_default().trim().to_string();
                        return Err(StoreError::Locked { path, holder });
                    }
                    let delay = backoff.delay(attempt).min(deadline - now);
                    tracing::info!(path = %path.display(), delay = ?delay, "Ticket state locked, waiting");
                    tokio::time::sleep(delay).await;
                }
                Err(source) => return Err(StoreError::Io { path, source }),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove ticket state lock");
        }
    }
}
