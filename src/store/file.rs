//! JSON-file-backed fragment store.
//!
//! Every access holds an advisory lock on `<store>.lock`: readers
//! take it shared for the load, `update` takes it exclusive across
//! load, change and save so concurrent writers cannot lose each
//! other's changes. The file is rewritten as a whole through a
//! temporary sibling that is persisted over the target.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Fragment, FragmentStore, MemoryStore, StoreError};

/// Current on-disk format version
pub const STORE_VERSION: u32 = 1;

/// On-disk representation.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreFile
{
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub fragments: Vec<Fragment>,
    #[serde(default)]
    pub folders: IndexMap<String, Vec<String>>,
}

#[derive(Debug)]
pub struct FileStore
{
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore
{
    /// Load `path` for reading, or start empty when it does not exist
    /// yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError>
    {
        let path = path.into();

        if !path.exists()
        {
            debug!(path = %path.display(), "store file missing; starting empty");
            return Ok(Self { path, inner: MemoryStore::new() });
        }

        let mut lock = fd_lock::RwLock::new(lock_file(&path)?);
        let _guard = lock
            .read()
            .map_err(|source| io_error(&path, source))?;

        Self::load(path)
    }

    /// Load, change and (when `persist` is set) save the store while
    /// holding the exclusive lock. Nothing is written if `apply`
    /// fails.
    pub fn update<T, E, F>(
        path: impl Into<PathBuf>,
        persist: bool,
        apply: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&mut FileStore) -> Result<T, E>,
        E: From<StoreError>,
    {
        let path = path.into();
        fs::create_dir_all(parent_dir(&path)).map_err(|source| io_error(&path, source))?;

        let mut lock = fd_lock::RwLock::new(lock_file(&path)?);
        let _guard = lock
            .write()
            .map_err(|source| io_error(&path, source))?;

        let mut store = if path.exists() { Self::load(path)? } else { Self { path, inner: MemoryStore::new() } };
        let out = apply(&mut store)?;

        if persist
        {
            store.write_atomic()?;
        }
        Ok(out)
    }

    pub fn path(&self) -> &Path
    {
        &self.path
    }

    pub fn memory(&self) -> &MemoryStore
    {
        &self.inner
    }

    /// Folder operations go through the wrapped store
    pub fn memory_mut(&mut self) -> &mut MemoryStore
    {
        &mut self.inner
    }

    /// Parse the file; the caller holds the lock.
    fn load(path: PathBuf) -> Result<Self, StoreError>
    {
        let text = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
        let file: StoreFile = serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        debug!(
            path = %path.display(),
            version = file.version,
            fragments = file.fragments.len(),
            "store loaded"
        );
        let inner = MemoryStore::from_parts(file.fragments, file.folders);
        Ok(Self { path, inner })
    }

    /// Replace the file with the current contents; the caller holds
    /// the exclusive lock.
    fn write_atomic(&self) -> Result<(), StoreError>
    {
        let io_err = |source| io_error(&self.path, source);

        let file = StoreFile {
            version: STORE_VERSION,
            saved_at: Utc::now(),
            fragments: self
                .inner
                .fragments(),
            folders: self
                .inner
                .folders()
                .clone(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent_dir(&self.path)).map_err(io_err)?;
        tmp.write_all(json.as_bytes())
            .map_err(io_err)?;
        tmp.as_file()
            .sync_all()
            .map_err(io_err)?;
        tmp.persist(&self.path)
            .map_err(|e| io_err(e.error))?;

        info!(path = %self.path.display(), fragments = file.fragments.len(), "store saved");
        Ok(())
    }
}

fn io_error(
    path: &Path,
    source: std::io::Error,
) -> StoreError
{
    StoreError::Io { path: path.to_path_buf(), source }
}

/// Directory holding the store file
fn parent_dir(path: &Path) -> &Path
{
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Open (creating) `<store>.lock` next to the store file
fn lock_file(path: &Path) -> Result<File, StoreError>
{
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");

    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path.with_file_name(name))
        .map_err(|source| io_error(path, source))
}

impl FragmentStore for FileStore
{
    fn fragments(&self) -> Vec<Fragment>
    {
        self.inner
            .fragments()
    }

    fn get(
        &self,
        label: &str,
    ) -> Option<Fragment>
    {
        self.inner
            .get(label)
    }

    fn add_fragment(
        &mut self,
        fragment: Fragment,
    ) -> bool
    {
        self.inner
            .add_fragment(fragment)
    }

    fn update_fragment(
        &mut self,
        fragment: Fragment,
    ) -> bool
    {
        self.inner
            .update_fragment(fragment)
    }

    fn delete_fragment(
        &mut self,
        label: &str,
    ) -> bool
    {
        self.inner
            .delete_fragment(label)
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn add(
        path: &Path,
        label: &str,
    ) -> Result<bool, StoreError>
    {
        FileStore::update(path, true, |s| Ok(s.add_fragment(Fragment::new(label))))
    }

    #[test]
    fn missing_file_opens_empty()
    {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("none.json")).unwrap();

        assert!(
            store
                .fragments()
                .is_empty()
        );
    }

    #[test]
    fn update_then_open_restores_fragments_and_folders()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/fragments.json");

        let saved = FileStore::update(&path, true, |store| {
            assert!(store.add_fragment(Fragment { body: "for i in range(n):".into(), ..Fragment::new("loop") }));
            store
                .memory_mut()
                .add_folder("basics", None)?;
            store
                .memory_mut()
                .set_children("basics", &["loop".into()])?;
            Ok::<_, StoreError>(store.memory().clone())
        })
        .unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.memory(), &saved);
        assert!(path.with_file_name("fragments.json.lock").exists());
    }

    #[test]
    fn update_without_persist_writes_nothing()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fragments.json");

        FileStore::update(&path, false, |s| Ok::<_, StoreError>(s.add_fragment(Fragment::new("x")))).unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn concurrent_updates_keep_every_change()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = Arc::new(dir.path().join("fragments.json"));

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let path = Arc::clone(&path);
                thread::spawn(move || add(&path, &format!("frag{i}")).unwrap())
            })
            .collect();
        for w in workers
        {
            assert!(w.join().unwrap());
        }

        let store = FileStore::open(path.as_path()).unwrap();
        assert_eq!(store.fragments().len(), 8);
    }

    #[test]
    fn corrupt_file_is_a_json_error()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(FileStore::open(&path), Err(StoreError::Json { .. })));
        assert!(matches!(add(&path, "x"), Err(StoreError::Json { .. })));
    }
}
