//! On-disk wallet records, one JSON file per wallet id.
//!
//! Reads and writes on the same id are serialized by a per-id mutex so two
//! concurrent saves cannot interleave their read-modify-write. Writes go to
//! a temporary file in the same directory and are renamed into place, so a
//! crash never leaves a half-written record.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::encryption::WalletRecord;
use crate::error::WalletError;

/// Longest accepted wallet id.
pub const MAX_WALLET_ID_LEN: usize = 64;

/// Check that `id` matches `[A-Za-z0-9_-]{1,64}`.
///
/// This keeps ids usable as file names without path traversal.
pub fn validate_wallet_id(id: &str) -> Result<(), WalletError> {
    let ok = !id.is_empty()
        && id.len() <= MAX_WALLET_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(WalletError::InvalidWalletId(id.chars().take(80).collect()))
    }
}

/// Directory-backed store of [`WalletRecord`]s.
#[derive(Debug)]
pub struct WalletStore {
    dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl WalletStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, WalletError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "store: opened");
        Ok(Self {
            dir,
            locks: DashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the record for `id`.
    pub fn path_for(&self, id: &str) -> Result<PathBuf, WalletError> {
        validate_wallet_id(id)?;
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Run `f` while holding the lock for `id`.
    ///
    /// The lock entry is dropped again once no other caller holds it, so the
    /// map only carries ids with an operation in flight.
    fn with_lock<T>(&self, id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self
            .locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let out = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        self.locks.remove_if(id, |_, l| Arc::strong_count(l) == 1);
        out
    }

    /// Whether a record exists for `id`.
    pub fn exists(&self, id: &str) -> Result<bool, WalletError> {
        Ok(self.path_for(id)?.is_file())
    }

    /// Load the record for `id`.
    pub fn load(&self, id: &str) -> Result<WalletRecord, WalletError> {
        let path = self.path_for(id)?;
        self.with_lock(id, || read_record(id, &path))
    }

    /// Store `record` under `id`.
    ///
    /// Fails with [`WalletError::WalletExists`] if a record is already
    /// present and `overwrite` is false.
    pub fn save(&self, id: &str, record: &WalletRecord, overwrite: bool) -> Result<(), WalletError> {
        self.update(id, |existing| {
            if existing.is_some() && !overwrite {
                return Err(WalletError::WalletExists(id.to_string()));
            }
            Ok(record.clone())
        })
        .map(|_| ())
    }

    /// Read-modify-write the record for `id` while holding its lock.
    ///
    /// `f` receives the current record (if any) and returns the record to
    /// write. Nothing is written when `f` fails.
    pub fn update<F>(&self, id: &str, f: F) -> Result<WalletRecord, WalletError>
    where
        F: FnOnce(Option<WalletRecord>) -> Result<WalletRecord, WalletError>,
    {
        let path = self.path_for(id)?;
        self.with_lock(id, || {
            let existing = match read_record(id, &path) {
                Ok(record) => Some(record),
                Err(WalletError::WalletNotFound(_)) => None,
                Err(e) => return Err(e),
            };
            let replaced = existing.is_some();
            let record = f(existing)?;
            write_atomic(&path, &record)?;
            info!(wallet_id = id, replaced, "store: wallet record written");
            Ok(record)
        })
    }
}

fn read_record(id: &str, path: &Path) -> Result<WalletRecord, WalletError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(WalletError::WalletNotFound(id.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&data).map_err(|e| WalletError::CorruptedFile(format!("{id}: {e}")))
}

fn write_atomic(path: &Path, record: &WalletRecord) -> Result<(), WalletError> {
    let json = serde_json::to_vec_pretty(record)
        .map_err(|e| WalletError::Serialization(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    // A leftover from a crash may carry wider permissions; start fresh.
    match fs::remove_file(&tmp) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    {
        let mut file = options.open(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
