//! File-backed account store.
//!
//! Each account lives in its own JSON document:
//!
//! ```text
//! <data_dir>/<id>.json
//! {"id": "1001", "name": "Ana", "balance": "100.00"}
//! ```
//!
//! Writes go to `<id>.json.tmp`, are synced, then renamed over the
//! record, so a reader never sees a half-written file.

use crate::storage::{Account, AccountStore, StoreError};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extension of account record files
const RECORD_EXTENSION: &str = "json";

/// Extension used while a record is being written
const TEMP_EXTENSION: &str = "json.tmp";

/// Stores one JSON file per account in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "Account store opened");
        Ok(Self { dir })
    }

    /// Returns the directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Maps an account id to its record path.
    fn record_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        let usable = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\'])
            && !id.contains('\0');
        if !usable {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.{RECORD_EXTENSION}")))
    }
}

impl AccountStore for FileStore {
    fn get(&self, id: &str) -> Result<Option<Account>, StoreError> {
        // An id that cannot name a file cannot name an account either
        let Ok(path) = self.record_path(id) else {
            return Ok(None);
        };

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let account = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            id: id.to_string(),
            source,
        })?;
        Ok(Some(account))
    }

    fn put(&mut self, account: &Account) -> Result<(), StoreError> {
        let path = self.record_path(&account.id)?;
        let tmp = path.with_extension(TEMP_EXTENSION);

        let json = serde_json::to_vec_pretty(account).map_err(|source| StoreError::Corrupt {
            id: account.id.clone(),
            source,
        })?;

        {
            let mut file = File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        debug!(account = %account.id, balance = %account.balance, "Account saved");
        Ok(())
    }
}
