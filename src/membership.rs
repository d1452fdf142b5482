//! Persistent record of users the bot has already dealt with.
//!
//! The invitation handler records every user it has invited (or found to be
//! a member already) so that later merges by the same person cost no API
//! calls. The store is a plain set of strings.
//!
//! [`FileMembershipStore`] keeps one key per line in an append-only file.
//! Each `add` is written and fsynced before it returns; a crash can lose at
//! most a partially written final line, which is ignored on reopen.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

/// Errors from a membership store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Keys are stored one per line.
    #[error("invalid key {0:?}: keys must be non-empty and contain no line breaks")]
    InvalidKey(String),
}

/// A set of keys that survives for as long as the implementation allows.
pub trait MembershipStore: Send + Sync {
    fn contains(&self, key: &str) -> Result<bool, StoreError>;

    /// Adds `key`. Adding a key that is already present is a no-op.
    fn add(&self, key: &str) -> Result<(), StoreError>;
}

fn validate(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.contains(['\n', '\r']) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// A store that forgets everything on restart.
#[derive(Debug, Default)]
pub struct InMemoryMembershipStore {
    keys: Mutex<HashSet<String>>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MembershipStore for InMemoryMembershipStore {
    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key))
    }

    fn add(&self, key: &str) -> Result<(), StoreError> {
        validate(key)?;
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
        Ok(())
    }
}

struct FileState {
    keys: HashSet<String>,
    file: File,
}

/// A store backed by an append-only file, one key per line.
pub struct FileMembershipStore {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileMembershipStore {
    /// Opens (creating if necessary) the store at `path` and loads its keys.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        let created = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        if created {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fsync_dir(parent).map_err(io_err)?;
            }
        }

        let contents = std::fs::read(&path).map_err(io_err)?;
        let complete = contents
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        if complete < contents.len() {
            // The last append was cut off before its newline.
            warn!(path = %path.display(), "discarding torn final line");
            file.set_len(complete as u64).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }

        let mut keys = HashSet::new();
        for line in contents[..complete].split(|&b| b == b'\n') {
            match std::str::from_utf8(line) {
                Ok("") => {}
                Ok(key) => {
                    keys.insert(key.to_string());
                }
                Err(_) => warn!(path = %path.display(), "skipping non-UTF-8 line"),
            }
        }

        debug!(path = %path.display(), keys = keys.len(), "membership store opened");
        Ok(Self {
            path,
            state: Mutex::new(FileState { keys, file }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MembershipStore for FileMembershipStore {
    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock().keys.contains(key))
    }

    fn add(&self, key: &str) -> Result<(), StoreError> {
        validate(key)?;
        let mut state = self.lock();
        if state.keys.contains(key) {
            return Ok(());
        }

        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let mut line = Vec::with_capacity(key.len() + 1);
        line.extend_from_slice(key.as_bytes());
        line.push(b'\n');
        state.file.write_all(&line).map_err(io_err)?;
        state.file.sync_all().map_err(io_err)?;

        state.keys.insert(key.to_string());
        Ok(())
    }
}

impl std::fmt::Debug for FileMembershipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMembershipStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Syncs a directory so a newly created entry in it survives a crash.
fn fsync_dir(dir: &Path) -> io::Result<()> {
    OpenOptions::new().read(true).open(dir)?.sync_all()
}
