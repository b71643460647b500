//! JSON-file-backed [`KvStore`].

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use super::KvStore;
use crate::errors::{Result, VaultSyncError};

/// A flat JSON object on disk, rewritten atomically on every change.
///
/// The whole map is cached in memory after the first read; this process
/// is assumed to be the only writer.
pub struct JsonFileStore {
    path: PathBuf,
    cache: Mutex<Option<BTreeMap<String, String>>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&contents) {
            Ok(map) => Ok(map),
            Err(e) => {
                // A corrupt state file only loses cached tokens and the
                // last-sync time, so start over instead of failing.
                warn!(path = %self.path.display(), error = %e, "discarding unreadable state file");
                Ok(BTreeMap::new())
            }
        }
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_vec_pretty(map)
            .map_err(|e| VaultSyncError::SerializationError(format!("state: {e}")))?;

        let parent = self.path.parent().unwrap_or(Path::new("."));
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
        let tmp = parent.join(format!(
            ".{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        ));
        // A leftover temp file may carry looser permissions; start fresh so
        // the mode below applies from creation.
        match fs::remove_file(&tmp) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut out = options.open(&tmp)?;
        out.write_all(&content)?;
        out.sync_all()?;
        drop(out);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> Result<T> {
        let mut guard = self.cache.lock();
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        let map = guard.get_or_insert_with(BTreeMap::new);
        Ok(f(map))
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_map(|m| m.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.cache.lock();
        let mut map = match guard.take() {
            Some(map) => map,
            None => self.load()?,
        };
        map.insert(key.to_string(), value.to_string());
        let written = self.persist(&map);
        *guard = Some(map);
        written
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.cache.lock();
        let mut map = match guard.take() {
            Some(map) => map,
            None => self.load()?,
        };
        let written = if map.remove(key).is_some() {
            self.persist(&map)
        } else {
            Ok(())
        };
        *guard = Some(map);
        written
    }
}
