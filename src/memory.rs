//! In-memory node store.
//!
//! [`MemoryBackend`] keeps one durable image per path. Opening a path hands
//! out a [`MemoryStore`] working on a private copy of that image; `commit`
//! publishes the copy back to the backend and `close` drops it. This gives
//! the same visibility rules as a file-backed hive without any file I/O.

use crate::store::{
    NodeId, NodeStore, OpenMode, StoreBackend, StoreError, StoreResult, StoreValue, ValueId,
};
use crate::utils::datetime_to_filetime;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Name given to the root node of a freshly created hive.
pub const DEFAULT_ROOT_NAME: &str = "ROOT";

#[derive(Debug, Clone)]
struct NodeEntry {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    values: Vec<ValueId>,
    last_written: u64,
}

#[derive(Debug, Clone)]
struct ValueEntry {
    name: String,
    value_type: u32,
    data: Vec<u8>,
}

impl From<&StoreValue> for ValueEntry {
    fn from(value: &StoreValue) -> Self {
        Self {
            name: value.name.clone(),
            value_type: value.value_type,
            data: value.data.clone(),
        }
    }
}

/// Node and value arenas of one hive. Freed slots are reused before the
/// arenas grow.
#[derive(Debug, Clone)]
struct MemoryImage {
    nodes: Vec<Option<NodeEntry>>,
    values: Vec<Option<ValueEntry>>,
    free_nodes: Vec<NodeId>,
    free_values: Vec<ValueId>,
}

fn names_match(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

fn now_filetime() -> u64 {
    datetime_to_filetime(chrono::Utc::now())
}

impl MemoryImage {
    fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Some(NodeEntry {
                name: root_name.to_string(),
                parent: None,
                children: Vec::new(),
                values: Vec::new(),
                last_written: now_filetime(),
            })],
            values: Vec::new(),
            free_nodes: Vec::new(),
            free_values: Vec::new(),
        }
    }

    fn node(&self, id: NodeId) -> StoreResult<&NodeEntry> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(StoreError::InvalidNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> StoreResult<&mut NodeEntry> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(StoreError::InvalidNode(id))
    }

    fn value(&self, id: ValueId) -> StoreResult<&ValueEntry> {
        self.values
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(StoreError::InvalidValue(id))
    }

    fn alloc_node(&mut self, entry: NodeEntry) -> NodeId {
        match self.free_nodes.pop() {
            Some(id) => {
                self.nodes[id.0 as usize] = Some(entry);
                id
            }
            None => {
                self.nodes.push(Some(entry));
                NodeId(self.nodes.len() as u64 - 1)
            }
        }
    }

    fn alloc_value(&mut self, entry: ValueEntry) -> ValueId {
        match self.free_values.pop() {
            Some(id) => {
                self.values[id.0 as usize] = Some(entry);
                id
            }
            None => {
                self.values.push(Some(entry));
                ValueId(self.values.len() as u64 - 1)
            }
        }
    }

    fn free_value(&mut self, id: ValueId) {
        if let Some(slot) = self.values.get_mut(id.0 as usize) {
            if slot.take().is_some() {
                self.free_values.push(id);
            }
        }
    }

    fn touch(&mut self, id: NodeId) -> StoreResult<()> {
        self.node_mut(id)?.last_written = now_filetime();
        Ok(())
    }

    fn free_subtree(&mut self, id: NodeId) {
        let Some(entry) = self.nodes.get_mut(id.0 as usize).and_then(Option::take) else {
            return;
        };
        self.free_nodes.push(id);
        for value in entry.values {
            self.free_value(value);
        }
        for child in entry.children {
            self.free_subtree(child);
        }
    }
}

/// Backend holding durable in-memory hive images keyed by path.
///
/// Cloning the backend shares the same images.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    images: Arc<Mutex<HashMap<PathBuf, MemoryImage>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty hive at `path`, replacing any existing one.
    pub fn create<P: AsRef<Path>>(&self, path: P) {
        self.create_with_root(path, DEFAULT_ROOT_NAME);
    }

    /// Creates an empty hive whose root node has the given name.
    pub fn create_with_root<P: AsRef<Path>>(&self, path: P, root_name: &str) {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), root = root_name, "Creating in-memory hive");
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, MemoryImage::new(root_name));
    }

    /// Returns true if a hive exists at `path`.
    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path.as_ref())
    }
}

impl StoreBackend for MemoryBackend {
    fn open(&self, path: &Path, mode: OpenMode) -> StoreResult<Box<dyn NodeStore>> {
        let image = self
            .images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))?;

        Ok(Box::new(MemoryStore {
            path: path.to_path_buf(),
            mode,
            image: Some(image),
            images: Arc::clone(&self.images),
        }))
    }
}

/// Working copy of one in-memory hive.
#[derive(Debug)]
pub struct MemoryStore {
    path: PathBuf,
    mode: OpenMode,
    image: Option<MemoryImage>,
    images: Arc<Mutex<HashMap<PathBuf, MemoryImage>>>,
}

impl MemoryStore {
    fn image(&self) -> StoreResult<&MemoryImage> {
        self.image.as_ref().ok_or(StoreError::Closed)
    }

    fn image_mut(&mut self) -> StoreResult<&mut MemoryImage> {
        if self.mode == OpenMode::Read {
            return Err(StoreError::ReadOnly);
        }
        self.image.as_mut().ok_or(StoreError::Closed)
    }
}

impl NodeStore for MemoryStore {
    fn commit(&mut self) -> StoreResult<()> {
        let image = self.image_mut()?.clone();
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.path.clone(), image);
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.image.take().map(|_| ()).ok_or(StoreError::Closed)
    }

    fn root(&self) -> StoreResult<NodeId> {
        self.image()?;
        Ok(NodeId(0))
    }

    fn node_name(&self, node: NodeId) -> StoreResult<String> {
        Ok(self.image()?.node(node)?.name.clone())
    }

    fn node_timestamp(&self, node: NodeId) -> StoreResult<u64> {
        Ok(self.image()?.node(node)?.last_written)
    }

    fn node_parent(&self, node: NodeId) -> StoreResult<Option<NodeId>> {
        Ok(self.image()?.node(node)?.parent)
    }

    fn node_children(&self, node: NodeId) -> StoreResult<Vec<NodeId>> {
        Ok(self.image()?.node(node)?.children.clone())
    }

    fn node_get_child(&self, node: NodeId, name: &str) -> StoreResult<Option<NodeId>> {
        let image = self.image()?;
        for &child in &image.node(node)?.children {
            if names_match(&image.node(child)?.name, name) {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    fn node_add_child(&mut self, node: NodeId, name: &str) -> StoreResult<NodeId> {
        if name.is_empty() || name.contains('\\') {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        if self.node_get_child(node, name)?.is_some() {
            return Err(StoreError::ChildExists(name.to_string()));
        }

        let image = self.image_mut()?;
        image.node(node)?;
        let id = image.alloc_node(NodeEntry {
            name: name.to_string(),
            parent: Some(node),
            children: Vec::new(),
            values: Vec::new(),
            last_written: now_filetime(),
        });
        let parent = image.node_mut(node)?;
        parent.children.push(id);
        parent.last_written = now_filetime();
        Ok(id)
    }

    fn node_delete_child(&mut self, node: NodeId) -> StoreResult<()> {
        let image = self.image_mut()?;
        let parent = image.node(node)?.parent.ok_or(StoreError::RootNode)?;

        image.node_mut(parent)?.children.retain(|&child| child != node);
        image.touch(parent)?;
        image.free_subtree(node);
        Ok(())
    }

    fn node_values(&self, node: NodeId) -> StoreResult<Vec<ValueId>> {
        Ok(self.image()?.node(node)?.values.clone())
    }

    fn node_value_key(&self, value: ValueId) -> StoreResult<String> {
        Ok(self.image()?.value(value)?.name.clone())
    }

    fn node_get_value(&self, node: NodeId, name: &str) -> StoreResult<Option<ValueId>> {
        let image = self.image()?;
        for &value in &image.node(node)?.values {
            if names_match(&image.value(value)?.name, name) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn value_value(&self, value: ValueId) -> StoreResult<(u32, Vec<u8>)> {
        let entry = self.image()?.value(value)?;
        Ok((entry.value_type, entry.data.clone()))
    }

    fn node_set_value(&mut self, node: NodeId, value: &StoreValue) -> StoreResult<()> {
        let existing = self.node_get_value(node, &value.name)?;
        let image = self.image_mut()?;
        match existing {
            Some(id) => image.values[id.0 as usize] = Some(ValueEntry::from(value)),
            None => {
                image.node(node)?;
                let id = image.alloc_value(ValueEntry::from(value));
                image.node_mut(node)?.values.push(id);
            }
        }
        image.touch(node)
    }

    fn node_set_values(&mut self, node: NodeId, values: &[StoreValue]) -> StoreResult<()> {
        let image = self.image_mut()?;
        let old = std::mem::take(&mut image.node_mut(node)?.values);
        for id in old {
            image.free_value(id);
        }

        let ids: Vec<ValueId> = values
            .iter()
            .map(|value| image.alloc_value(ValueEntry::from(value)))
            .collect();
        image.node_mut(node)?.values = ids;
        image.touch(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(backend: &MemoryBackend, mode: OpenMode) -> Box<dyn NodeStore> {
        backend.open(Path::new("hive"), mode).unwrap()
    }

    fn sz(name: &str, data: &[u8]) -> StoreValue {
        StoreValue {
            value_type: 1,
            name: name.to_string(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_open_missing() {
        let backend = MemoryBackend::new();
        let result = backend.open(Path::new("nope"), OpenMode::Write);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_children_case_insensitive() {
        let backend = MemoryBackend::new();
        backend.create("hive");
        let mut store = open(&backend, OpenMode::Write);
        let root = store.root().unwrap();

        let child = store.node_add_child(root, "Software").unwrap();
        assert_eq!(store.node_get_child(root, "SOFTWARE").unwrap(), Some(child));
        assert_eq!(store.node_name(child).unwrap(), "Software");
        assert_eq!(store.node_parent(child).unwrap(), Some(root));
        assert_eq!(store.node_parent(root).unwrap(), None);
        assert!(matches!(
            store.node_add_child(root, "software"),
            Err(StoreError::ChildExists(_))
        ));
    }

    #[test]
    fn test_delete_subtree() {
        let backend = MemoryBackend::new();
        backend.create("hive");
        let mut store = open(&backend, OpenMode::Write);
        let root = store.root().unwrap();

        let a = store.node_add_child(root, "a").unwrap();
        let b = store.node_add_child(a, "b").unwrap();
        store.node_set_value(b, &sz("x", b"1")).unwrap();

        store.node_delete_child(a).unwrap();
        assert!(store.node_children(root).unwrap().is_empty());
        assert!(matches!(store.node_name(b), Err(StoreError::InvalidNode(_))));
        assert!(matches!(store.node_delete_child(root), Err(StoreError::RootNode)));
    }

    #[test]
    fn test_set_value_replaces_in_place() {
        let backend = MemoryBackend::new();
        backend.create("hive");
        let mut store = open(&backend, OpenMode::Write);
        let root = store.root().unwrap();

        store.node_set_value(root, &sz("a", b"1")).unwrap();
        store.node_set_value(root, &sz("b", b"2")).unwrap();
        store.node_set_value(root, &sz("A", b"3")).unwrap();

        let values = store.node_values(root).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(store.node_value_key(values[0]).unwrap(), "A");
        assert_eq!(store.value_value(values[0]).unwrap(), (1, b"3".to_vec()));
        assert_eq!(store.node_value_key(values[1]).unwrap(), "b");
    }

    #[test]
    fn test_set_values_bulk_replace() {
        let backend = MemoryBackend::new();
        backend.create("hive");
        let mut store = open(&backend, OpenMode::Write);
        let root = store.root().unwrap();

        store.node_set_value(root, &sz("a", b"1")).unwrap();
        store.node_set_value(root, &sz("b", b"2")).unwrap();
        let old = store.node_values(root).unwrap();
        store.node_set_values(root, &[sz("c", b"3")]).unwrap();

        let current = store.node_values(root).unwrap();
        assert_eq!(current.len(), 1);
        let stale = old.iter().find(|id| !current.contains(id)).unwrap();
        assert!(matches!(store.value_value(*stale), Err(StoreError::InvalidValue(_))));

        store.node_set_values(root, &[sz("c", b"3"), sz("d", b"4")]).unwrap();
        let names: Vec<String> = store
            .node_values(root)
            .unwrap()
            .into_iter()
            .map(|v| store.node_value_key(v).unwrap())
            .collect();
        assert_eq!(names, vec!["c", "d"]);
    }

    #[test]
    fn test_slots_are_reused() {
        let backend = MemoryBackend::new();
        backend.create("hive");
        let mut store = open(&backend, OpenMode::Write);
        let root = store.root().unwrap();

        store
            .node_set_values(root, &[sz("a", b"1"), sz("b", b"2"), sz("c", b"3")])
            .unwrap();
        for _ in 0..100 {
            let a = store.node_add_child(root, "a").unwrap();
            store.node_add_child(a, "b").unwrap();
            store.node_delete_child(a).unwrap();
            store.node_set_values(root, &[sz("a", b"1"), sz("c", b"3")]).unwrap();
            store
                .node_set_values(root, &[sz("a", b"1"), sz("b", b"2"), sz("c", b"3")])
                .unwrap();
        }
        store.commit().unwrap();

        let images = backend.images.lock().unwrap();
        let image = &images[Path::new("hive")];
        assert_eq!(image.values.len(), 3);
        assert_eq!(image.nodes.len(), 3);
    }

    #[test]
    fn test_commit_visibility() {
        let backend = MemoryBackend::new();
        backend.create("hive");

        let mut store = open(&backend, OpenMode::Write);
        let root = store.root().unwrap();
        store.node_add_child(root, "kept").unwrap();
        store.commit().unwrap();
        store.node_add_child(root, "dropped").unwrap();
        store.close().unwrap();

        let store = open(&backend, OpenMode::Read);
        assert!(store.node_get_child(root, "kept").unwrap().is_some());
        assert!(store.node_get_child(root, "dropped").unwrap().is_none());
    }

    #[test]
    fn test_read_only_and_closed() {
        let backend = MemoryBackend::new();
        backend.create("hive");

        let mut store = open(&backend, OpenMode::Read);
        let root = store.root().unwrap();
        assert!(matches!(store.node_add_child(root, "x"), Err(StoreError::ReadOnly)));
        assert!(matches!(store.commit(), Err(StoreError::ReadOnly)));

        store.close().unwrap();
        assert!(matches!(store.root(), Err(StoreError::Closed)));
        assert!(matches!(store.close(), Err(StoreError::Closed)));
    }
}
