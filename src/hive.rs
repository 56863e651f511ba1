//! Hive sessions and path resolution.
//!
//! A [`Hive`] owns one open node store and resolves slash-delimited paths
//! against it. Sessions are handed out by a [`HiveManager`], which keeps at
//! most one live session per path: opening the same path again returns the
//! session that is already open.
//!
//! # Concurrency
//!
//! Every store call goes through a per-session lock, so operations from
//! several threads are serialized. Closing a session while another caller
//! still holds keys or values from it is allowed; those handles keep
//! compiling but every later call on them fails with
//! [`RegistryError::SessionClosed`].

use crate::error::{RegistryError, Result};
use crate::key::RegistryKey;
use crate::store::{NodeId, NodeStore, OpenMode, StoreBackend};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, instrument, warn};

type OpenHives = Mutex<HashMap<PathBuf, Arc<Hive>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Splits a key path into lower-cased node names.
///
/// One leading and one trailing slash are ignored; `""` and `"/"` both mean
/// the root and split to an empty list.
///
/// # Examples
///
/// ```rust
/// # use reghive::path_split;
/// assert_eq!(path_split("/Foo/bar/"), vec!["foo", "bar"]);
/// assert!(path_split("/").is_empty());
/// ```
pub fn path_split(path: &str) -> Vec<String> {
    if path.is_empty() || path == "/" {
        return Vec::new();
    }

    let lowered = path.to_lowercase();
    let mut segments: Vec<String> = lowered.split('/').map(str::to_string).collect();
    if segments.first().is_some_and(String::is_empty) {
        segments.remove(0);
    }
    if segments.last().is_some_and(String::is_empty) {
        segments.pop();
    }
    segments
}

/// Options used when a hive is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HiveOptions {
    /// Store access mode.
    pub mode: OpenMode,
    /// Commit after every mutation. When off, call [`Hive::commit`].
    pub auto_commit: bool,
}

impl Default for HiveOptions {
    fn default() -> Self {
        Self {
            mode: OpenMode::Write,
            auto_commit: true,
        }
    }
}

/// Registry of open hives, one session per path.
pub struct HiveManager {
    backend: Arc<dyn StoreBackend>,
    hives: Arc<OpenHives>,
}

impl HiveManager {
    /// Creates a manager opening stores through `backend`.
    pub fn new<B: StoreBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            hives: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Opens the hive at `path` for reading and writing with auto-commit.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reghive::{HiveManager, MemoryBackend};
    ///
    /// # fn main() -> reghive::Result<()> {
    /// let backend = MemoryBackend::new();
    /// backend.create("BCD");
    ///
    /// let manager = HiveManager::new(backend);
    /// let hive = manager.open("BCD")?;
    /// let key = hive.make_key("/Objects/{bootmgr}")?;
    /// assert_eq!(key.name()?, "{bootmgr}");
    /// hive.close()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Arc<Hive>> {
        self.open_with(path, HiveOptions::default())
    }

    /// Opens the hive at `path`, or returns the session already open for it.
    ///
    /// An existing session keeps the options it was opened with.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn open_with<P: AsRef<Path>>(&self, path: P, options: HiveOptions) -> Result<Arc<Hive>> {
        let path = path.as_ref();
        let mut hives = lock(&self.hives);

        if let Some(hive) = hives.get(path) {
            debug!("Hive already open, sharing session");
            return Ok(Arc::clone(hive));
        }

        info!(mode = ?options.mode, auto_commit = options.auto_commit, "Opening hive");
        let store = self.backend.open(path, options.mode)?;
        let root = store.root()?;

        let hive = Arc::new(Hive {
            path: path.to_path_buf(),
            options,
            root,
            store: Mutex::new(Some(store)),
            registry: Arc::downgrade(&self.hives),
        });
        hives.insert(path.to_path_buf(), Arc::clone(&hive));
        Ok(hive)
    }

    /// Returns true if a session is open for `path`.
    pub fn is_open<P: AsRef<Path>>(&self, path: P) -> bool {
        lock(&self.hives).contains_key(path.as_ref())
    }

    /// Returns the open session for `path`, if any.
    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<Arc<Hive>> {
        lock(&self.hives).get(path.as_ref()).cloned()
    }

    /// Returns the number of open sessions.
    pub fn open_count(&self) -> usize {
        lock(&self.hives).len()
    }
}

impl fmt::Debug for HiveManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HiveManager")
            .field("open", &lock(&self.hives).keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One open hive.
pub struct Hive {
    path: PathBuf,
    options: HiveOptions,
    root: NodeId,
    store: Mutex<Option<Box<dyn NodeStore>>>,
    registry: Weak<OpenHives>,
}

impl Hive {
    /// Returns the path this hive was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the options this hive was opened with.
    pub fn options(&self) -> HiveOptions {
        self.options
    }

    /// Returns true once [`Hive::close`] has succeeded.
    pub fn is_closed(&self) -> bool {
        lock(&self.store).is_none()
    }

    /// Returns the root key.
    pub fn root(self: &Arc<Self>) -> RegistryKey {
        RegistryKey::new(Arc::clone(self), self.root)
    }

    pub(crate) fn root_node(&self) -> NodeId {
        self.root
    }

    /// Runs `f` against the open store.
    pub(crate) fn with_store<T>(
        &self,
        f: impl FnOnce(&mut dyn NodeStore) -> Result<T>,
    ) -> Result<T> {
        let mut guard = lock(&self.store);
        let store = guard
            .as_mut()
            .ok_or_else(|| RegistryError::SessionClosed(self.path.display().to_string()))?;
        f(store.as_mut())
    }

    /// Commits if auto-commit is on.
    pub(crate) fn sync(&self) -> Result<()> {
        if self.options.auto_commit {
            self.with_store(|store| Ok(store.commit()?))?;
        }
        Ok(())
    }

    /// Commits all pending changes to durable storage.
    pub fn commit(&self) -> Result<()> {
        info!(path = %self.path.display(), "Committing hive");
        self.with_store(|store| Ok(store.commit()?))
    }

    /// Closes the store and removes this session from its manager.
    ///
    /// Uncommitted changes are discarded. Closing an already closed hive
    /// does nothing.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn close(&self) -> Result<()> {
        let registry = self.registry.upgrade();
        let mut hives = registry.as_deref().map(lock);
        let mut guard = lock(&self.store);

        let Some(mut store) = guard.take() else {
            warn!("Hive already closed");
            return Ok(());
        };
        if let Err(err) = store.close() {
            *guard = Some(store);
            return Err(err.into());
        }

        if let Some(hives) = hives.as_mut() {
            let registered = hives
                .get(&self.path)
                .is_some_and(|hive| std::ptr::eq(Arc::as_ptr(hive), self));
            if registered {
                hives.remove(&self.path);
            }
        }
        info!("Hive closed");
        Ok(())
    }

    /// Resolves a path to a key (case-insensitive).
    ///
    /// An empty path or `/` returns the root key.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ChildMissing`] at the first segment that
    /// does not exist.
    pub fn get_key(self: &Arc<Self>, path: &str) -> Result<RegistryKey> {
        let mut key = self.root();
        for segment in path_split(path) {
            key = key.child(&segment)?;
        }
        Ok(key)
    }

    /// Makes the key at `path`, creating every missing ancestor.
    ///
    /// If the whole path already exists the existing key is returned.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RootMake`] if the path names the root.
    pub fn make_key(self: &Arc<Self>, path: &str) -> Result<RegistryKey> {
        let segments = path_split(path);
        if segments.is_empty() {
            return Err(RegistryError::RootMake);
        }

        let mut key = self.root();
        let mut existing = segments.len();
        for (i, segment) in segments.iter().enumerate() {
            match key.child(segment) {
                Ok(child) => key = child,
                Err(RegistryError::ChildMissing(_)) => {
                    existing = i;
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        for segment in &segments[existing..] {
            key = key.make_child(segment)?;
        }
        Ok(key)
    }

    /// Deletes the key at `path` and everything below it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RootDelete`] if the path names the root.
    pub fn delete_key(self: &Arc<Self>, path: &str) -> Result<()> {
        let key = self.get_key(path)?;
        if key.is_root() {
            return Err(RegistryError::RootDelete);
        }

        let name = key.name()?;
        let parent = key.parent()?;
        parent.delete_child(&name)
    }
}

impl fmt::Debug for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hive")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_split_root() {
        assert!(path_split("").is_empty());
        assert!(path_split("/").is_empty());
    }

    #[test]
    fn test_path_split_slashes() {
        assert_eq!(path_split("/foo/bar/"), vec!["foo", "bar"]);
        assert_eq!(path_split("foo/bar"), vec!["foo", "bar"]);
        assert_eq!(path_split("/foo"), vec!["foo"]);
    }

    #[test]
    fn test_path_split_case_insensitive() {
        assert_eq!(path_split("/Foo"), path_split("/foo"));
        assert_eq!(path_split("/Objects/{BootMgr}"), vec!["objects", "{bootmgr}"]);
    }

    #[test]
    fn test_path_split_strips_only_one_slash() {
        assert_eq!(path_split("//foo"), vec!["", "foo"]);
    }

    #[test]
    fn test_default_options() {
        let options = HiveOptions::default();
        assert_eq!(options.mode, OpenMode::Write);
        assert!(options.auto_commit);
    }
}
