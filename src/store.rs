//! Node-store contract.
//!
//! The key/value layer never touches the hive's binary format. Everything it
//! needs is expressed by [`NodeStore`], a tree of opaque node and value
//! handles with primitive get/set operations, and [`StoreBackend`], which
//! opens a store for a path.
//!
//! Implementations are expected to behave like a hive library:
//!
//! - child and value lookups are case-insensitive,
//! - `node_add_child` keeps the name exactly as given,
//! - `node_delete_child` removes the whole subtree,
//! - the empty name addresses a key's default value,
//! - nothing reaches durable storage until `commit`.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for node-store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Opaque handle to a key node inside a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Opaque handle to a value inside a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value#{}", self.0)
    }
}

/// Access mode for opening a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Reads only; every mutation fails with [`StoreError::ReadOnly`].
    Read,
    /// Reads and writes.
    #[default]
    Write,
}

/// A value as handed to the store: type tag, name and raw data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreValue {
    /// Raw registry type tag.
    pub value_type: u32,
    /// Value name; empty for the default value.
    pub name: String,
    /// Raw data.
    pub data: Vec<u8>,
}

/// Errors reported by a node store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No hive exists at the path.
    #[error("No hive at '{}'", .0.display())]
    NotFound(PathBuf),

    /// The store was opened read-only.
    #[error("Hive is opened read-only")]
    ReadOnly,

    /// The store has been closed.
    #[error("Hive store is closed")]
    Closed,

    /// Node handle does not refer to a live node.
    #[error("Invalid node handle: {0}")]
    InvalidNode(NodeId),

    /// Value handle does not refer to a live value.
    #[error("Invalid value handle: {0}")]
    InvalidValue(ValueId),

    /// A child with this name already exists.
    #[error("Child node already exists: '{0}'")]
    ChildExists(String),

    /// Key names may not be empty.
    #[error("Invalid key name: '{0}'")]
    InvalidName(String),

    /// The root node cannot be deleted.
    #[error("Cannot delete the root node")]
    RootNode,

    /// Any other backend failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Primitive tree operations over one open hive.
///
/// Methods mirror a hive library's node/value API one to one.
pub trait NodeStore: Send {
    /// Flushes all changes made so far to durable storage.
    fn commit(&mut self) -> StoreResult<()>;

    /// Releases the store. Uncommitted changes are discarded.
    fn close(&mut self) -> StoreResult<()>;

    /// Returns the root node.
    fn root(&self) -> StoreResult<NodeId>;

    /// Returns a node's name.
    fn node_name(&self, node: NodeId) -> StoreResult<String>;

    /// Returns a node's last-written time as a Windows FILETIME.
    fn node_timestamp(&self, node: NodeId) -> StoreResult<u64>;

    /// Returns a node's parent, or `None` for the root.
    fn node_parent(&self, node: NodeId) -> StoreResult<Option<NodeId>>;

    /// Returns a node's children in store order.
    fn node_children(&self, node: NodeId) -> StoreResult<Vec<NodeId>>;

    /// Finds a child by name, case-insensitively.
    fn node_get_child(&self, node: NodeId, name: &str) -> StoreResult<Option<NodeId>>;

    /// Adds a child with exactly the given name.
    fn node_add_child(&mut self, node: NodeId, name: &str) -> StoreResult<NodeId>;

    /// Deletes a node and its whole subtree.
    fn node_delete_child(&mut self, node: NodeId) -> StoreResult<()>;

    /// Returns a node's values in store order.
    fn node_values(&self, node: NodeId) -> StoreResult<Vec<ValueId>>;

    /// Returns a value's name; empty for the default value.
    fn node_value_key(&self, value: ValueId) -> StoreResult<String>;

    /// Finds a value by name, case-insensitively.
    fn node_get_value(&self, node: NodeId, name: &str) -> StoreResult<Option<ValueId>>;

    /// Returns a value's type tag and data.
    fn value_value(&self, value: ValueId) -> StoreResult<(u32, Vec<u8>)>;

    /// Inserts a value, replacing one with the same name in place.
    fn node_set_value(&mut self, node: NodeId, value: &StoreValue) -> StoreResult<()>;

    /// Replaces a node's whole value set.
    fn node_set_values(&mut self, node: NodeId, values: &[StoreValue]) -> StoreResult<()>;
}

/// Opens node stores by path.
pub trait StoreBackend: Send + Sync {
    /// Opens the hive at `path`.
    fn open(&self, path: &Path, mode: OpenMode) -> StoreResult<Box<dyn NodeStore>>;
}
