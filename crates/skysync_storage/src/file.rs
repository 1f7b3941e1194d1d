//! File-backed cache for persistent mirrors.
//!
//! A file cache owns a directory:
//!
//! ```text
//! <cache_path>/
//! ├─ LOCK               # Advisory lock, one opener at a time
//! ├─ records.cbor       # Committed models
//! └─ records.cbor.tmp   # Transient, only during commit
//! ```
//!
//! Commits serialize the full committed-plus-staged state to the temp file,
//! fsync it, and rename it over `records.cbor`. A crash mid-commit leaves the
//! previous file intact.

use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};
use crate::model::StorageModel;
use crate::staging::ChangeSet;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = "LOCK";
const DATA_FILE: &str = "records.cbor";
const DATA_TEMP: &str = "records.cbor.tmp";

/// On-disk format version written by this build.
pub const FORMAT_VERSION: u16 = 1;

#[derive(Serialize)]
struct CacheFileRef<'a, M> {
    version: u16,
    models: Vec<&'a M>,
}

#[derive(Deserialize)]
struct CacheFile<M> {
    version: u16,
    models: Vec<M>,
}

/// A cache persisted as a single CBOR file in a locked directory.
///
/// # Durability
///
/// `commit()` performs synchronous file I/O on the calling thread
/// (write, `sync_all`, rename). Callers running on an async executor
/// should treat it as a blocking point.
///
/// # Example
///
/// ```rust,ignore
/// use skysync_storage::{Cache, FileCache};
///
/// let mut cache: FileCache<NoteModel> = FileCache::open(Path::new("notes.cache"))?;
/// cache.insert(model)?;
/// cache.commit()?;
/// ```
#[derive(Debug)]
pub struct FileCache<M> {
    path: PathBuf,
    _lock_file: File,
    committed: BTreeMap<String, M>,
    staged: ChangeSet<M>,
}

impl<M> FileCache<M>
where
    M: StorageModel + Serialize + DeserializeOwned,
{
    /// Opens or creates a cache directory and loads its committed models.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path exists and is not a directory
    /// - Another handle holds the lock (returns `Locked`)
    /// - The data file cannot be decoded (returns `Corrupted`)
    pub fn open(path: &Path) -> CacheResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(CacheError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CacheError::Locked {
                path: path.to_path_buf(),
            });
        }

        let committed = Self::load(&path.join(DATA_FILE))?;
        debug!(path = %path.display(), models = committed.len(), "opened file cache");

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
            committed,
            staged: ChangeSet::new(),
        })
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the committed data file.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.path.join(DATA_FILE)
    }

    fn load(data_path: &Path) -> CacheResult<BTreeMap<String, M>> {
        if !data_path.exists() {
            return Ok(BTreeMap::new());
        }

        let reader = BufReader::new(File::open(data_path)?);
        let file: CacheFile<M> = ciborium::from_reader(reader)
            .map_err(|e| CacheError::Corrupted(e.to_string()))?;

        if file.version != FORMAT_VERSION {
            return Err(CacheError::UnsupportedVersion {
                found: file.version,
                expected: FORMAT_VERSION,
            });
        }

        Ok(file
            .models
            .into_iter()
            .map(|m| (m.key().to_string(), m))
            .collect())
    }

    fn write(&self, models: &BTreeMap<String, M>) -> CacheResult<()> {
        let temp_path = self.path.join(DATA_TEMP);
        let contents = CacheFileRef {
            version: FORMAT_VERSION,
            models: models.values().collect(),
        };

        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            ciborium::into_writer(&contents, &mut writer)
                .map_err(|e| CacheError::Encoding(e.to_string()))?;
            writer.flush()?;
            let file = writer
                .into_inner()
                .map_err(|e| CacheError::Io(e.into_error()))?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, self.data_path())?;
        Ok(())
    }
}

impl<M> Cache<M> for FileCache<M>
where
    M: StorageModel + Serialize + DeserializeOwned,
{
    fn fetch_all(&self) -> CacheResult<Vec<M>> {
        Ok(self.staged.overlay(&self.committed).into_values().collect())
    }

    fn get(&self, key: &str) -> CacheResult<Option<M>> {
        Ok(self.staged.get(key, &self.committed).cloned())
    }

    fn insert(&mut self, model: M) -> CacheResult<()> {
        self.staged.stage_insert(model);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> CacheResult<bool> {
        Ok(self.staged.stage_delete(key, &self.committed))
    }

    fn has_changes(&self) -> bool {
        !self.staged.is_empty()
    }

    fn commit(&mut self) -> CacheResult<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let merged = self.staged.overlay(&self.committed);
        self.write(&merged)?;
        debug!(models = merged.len(), "committed file cache");
        self.committed = merged;
        self.staged.clear();
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged.clear();
    }
}
