//! Registry keys.

use crate::error::{RegistryError, Result};
use crate::hive::Hive;
use crate::store::{NodeId, StoreValue};
use crate::utils::filetime_to_datetime;
use crate::value::{RegistryValue, DEFAULT_VALUE_NAME};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Maps the default-value marker to the store's empty name.
pub(crate) fn store_value_name(name: &str) -> &str {
    if name == DEFAULT_VALUE_NAME {
        ""
    } else {
        name
    }
}

/// A handle to one key of an open hive.
///
/// Keys are cheap locators: they hold the session and a node handle and
/// nothing else. Two keys compare equal when they point at the same node of
/// the same session.
#[derive(Clone)]
pub struct RegistryKey {
    hive: Arc<Hive>,
    node: NodeId,
}

impl RegistryKey {
    pub(crate) fn new(hive: Arc<Hive>, node: NodeId) -> Self {
        Self { hive, node }
    }

    /// Returns the session this key belongs to.
    pub fn hive(&self) -> &Arc<Hive> {
        &self.hive
    }

    /// Returns the node handle.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns true if this is the root key.
    pub fn is_root(&self) -> bool {
        self.node == self.hive.root_node()
    }

    /// Returns the key name.
    pub fn name(&self) -> Result<String> {
        self.hive.with_store(|store| Ok(store.node_name(self.node)?))
    }

    /// Returns when the key was last written, if the timestamp is representable.
    pub fn last_written(&self) -> Result<Option<DateTime<Utc>>> {
        let filetime = self.hive.with_store(|store| Ok(store.node_timestamp(self.node)?))?;
        Ok(filetime_to_datetime(filetime))
    }

    /// Returns the parent key.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ParentRoot`] on the root key.
    pub fn parent(&self) -> Result<RegistryKey> {
        let parent = self
            .hive
            .with_store(|store| Ok(store.node_parent(self.node)?))?
            .ok_or(RegistryError::ParentRoot)?;
        Ok(Self::new(Arc::clone(&self.hive), parent))
    }

    /// Returns the names of all child keys in store order.
    pub fn child_names(&self) -> Result<Vec<String>> {
        self.hive.with_store(|store| {
            store
                .node_children(self.node)?
                .into_iter()
                .map(|child| Ok(store.node_name(child)?))
                .collect()
        })
    }

    /// Returns all child keys in store order.
    pub fn subkeys(&self) -> Result<Vec<RegistryKey>> {
        let children = self.hive.with_store(|store| Ok(store.node_children(self.node)?))?;
        Ok(children
            .into_iter()
            .map(|node| Self::new(Arc::clone(&self.hive), node))
            .collect())
    }

    /// Returns the number of child keys.
    pub fn subkey_count(&self) -> Result<usize> {
        self.hive
            .with_store(|store| Ok(store.node_children(self.node)?.len()))
    }

    /// Gets a child key by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ChildMissing`] if no such child exists.
    pub fn child(&self, name: &str) -> Result<RegistryKey> {
        let node = self
            .hive
            .with_store(|store| Ok(store.node_get_child(self.node, name)?))?
            .ok_or_else(|| RegistryError::ChildMissing(name.to_string()))?;
        Ok(Self::new(Arc::clone(&self.hive), node))
    }

    /// Returns true if a child with this name exists.
    pub fn has_child(&self, name: &str) -> Result<bool> {
        match self.child(name) {
            Ok(_) => Ok(true),
            Err(RegistryError::ChildMissing(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Makes a child key with exactly the given name, then commits.
    pub fn make_child(&self, name: &str) -> Result<RegistryKey> {
        let node = self
            .hive
            .with_store(|store| Ok(store.node_add_child(self.node, name)?))?;
        debug!(parent = %self.node, child = %node, name, "Created key");
        self.hive.sync()?;
        Ok(Self::new(Arc::clone(&self.hive), node))
    }

    /// Deletes a child key and its subtree (case-insensitive), then commits.
    pub fn delete_child(&self, name: &str) -> Result<()> {
        self.hive.with_store(|store| {
            let node = store
                .node_get_child(self.node, name)?
                .ok_or_else(|| RegistryError::ChildMissing(name.to_string()))?;
            store.node_delete_child(node)?;
            debug!(parent = %self.node, child = %node, name, "Deleted key");
            Ok(())
        })?;
        self.hive.sync()
    }

    /// Returns the names of all values in store order.
    ///
    /// The default value is listed as [`DEFAULT_VALUE_NAME`].
    pub fn value_names(&self) -> Result<Vec<String>> {
        self.hive.with_store(|store| {
            store
                .node_values(self.node)?
                .into_iter()
                .map(|value| {
                    let name = store.node_value_key(value)?;
                    Ok(if name.is_empty() {
                        DEFAULT_VALUE_NAME.to_string()
                    } else {
                        name
                    })
                })
                .collect()
        })
    }

    /// Returns all values in store order.
    pub fn values(&self) -> Result<Vec<RegistryValue>> {
        let ids = self.hive.with_store(|store| Ok(store.node_values(self.node)?))?;
        ids.into_iter()
            .map(|id| RegistryValue::decode(self.clone(), id))
            .collect()
    }

    /// Returns the number of values, the default value included.
    pub fn value_count(&self) -> Result<usize> {
        self.hive
            .with_store(|store| Ok(store.node_values(self.node)?.len()))
    }

    /// Gets a value by name (case-insensitive).
    ///
    /// Use [`DEFAULT_VALUE_NAME`] for the default value.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ValueMissing`] if no such value exists.
    pub fn value(&self, name: &str) -> Result<RegistryValue> {
        let id = self
            .hive
            .with_store(|store| Ok(store.node_get_value(self.node, store_value_name(name))?))?
            .ok_or_else(|| RegistryError::ValueMissing(name.to_string()))?;
        RegistryValue::decode(self.clone(), id)
    }

    /// Returns true if a value with this name exists.
    pub fn has_value(&self, name: &str) -> Result<bool> {
        let id = self
            .hive
            .with_store(|store| Ok(store.node_get_value(self.node, store_value_name(name))?))?;
        Ok(id.is_some())
    }

    /// Makes a value with the given name and returns it as stored.
    ///
    /// The new value holds REG_NONE data until it is set. An existing value
    /// with the same name is overwritten.
    pub fn make_value(&self, name: &str) -> Result<RegistryValue> {
        let mut value = RegistryValue::new(self.clone());
        value.attach(name)?;
        self.value(name)
    }

    /// Deletes one value, leaving every other value and its order intact.
    ///
    /// The store has no single-value delete, so the remaining values are read
    /// back and the key's whole value set is replaced in one call.
    pub fn delete_value(&self, name: &str) -> Result<()> {
        self.hive.with_store(|store| {
            let target = store
                .node_get_value(self.node, store_value_name(name))?
                .ok_or_else(|| RegistryError::ValueMissing(name.to_string()))?;

            let mut remaining = Vec::new();
            for id in store.node_values(self.node)? {
                if id == target {
                    continue;
                }
                let (value_type, data) = store.value_value(id)?;
                remaining.push(StoreValue {
                    value_type,
                    name: store.node_value_key(id)?,
                    data,
                });
            }

            store.node_set_values(self.node, &remaining)?;
            debug!(node = %self.node, name, remaining = remaining.len(), "Deleted value");
            Ok(())
        })?;
        self.hive.sync()
    }
}

impl PartialEq for RegistryKey {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && Arc::ptr_eq(&self.hive, &other.hive)
    }
}

impl Eq for RegistryKey {}

impl fmt::Debug for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryKey")
            .field("hive", &self.hive.path())
            .field("node", &self.node)
            .finish()
    }
}
