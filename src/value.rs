//! Registry values.
//!
//! A [`RegistryValue`] buffers a name, a type tag and raw bytes for one value
//! of a key. A value starts out *unready* while it is being built and turns
//! *ready* once it is attached under a name or read from the store. Only a
//! ready value writes through: every setter then pushes the value to the
//! store and commits, so no half-applied state is visible between calls.
//!
//! The byte buffer is also exposed through [`Read`], [`Write`] and [`Seek`].
//! Writes only touch the buffer; [`Write::flush`] synchronizes it.
//!
//! ```rust
//! use byteorder::{LittleEndian, WriteBytesExt};
//! use reghive::{HiveManager, MemoryBackend, ValueData, ValueType};
//! use std::io::{Seek, SeekFrom};
//!
//! # fn main() -> reghive::Result<()> {
//! let backend = MemoryBackend::new();
//! backend.create("BCD");
//! let hive = HiveManager::new(backend).open("BCD")?;
//!
//! let key = hive.make_key("/Objects/{bootmgr}/Elements/25000004")?;
//! let mut value = key.make_value("Element")?;
//! value.seek(SeekFrom::Start(0))?;
//! value.write_u64::<LittleEndian>(30)?;
//! value.set_type(ValueType::Qword)?;
//!
//! assert_eq!(key.value("element")?.data()?, ValueData::Qword(30));
//! # Ok(())
//! # }
//! ```

use crate::data::{HostValue, ValueData, ValueType};
use crate::error::{RegistryError, Result};
use crate::key::RegistryKey;
use crate::store::{StoreValue, ValueId};
use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use tracing::debug;

/// Name used for a key's default (unnamed) value.
pub const DEFAULT_VALUE_NAME: &str = "@";

/// A value of a registry key.
pub struct RegistryValue {
    key: RegistryKey,
    name: String,
    value_type: ValueType,
    buffer: Cursor<Vec<u8>>,
    ready: bool,
}

impl RegistryValue {
    /// Creates an unready value owned by `key`.
    pub(crate) fn new(key: RegistryKey) -> Self {
        Self {
            key,
            name: String::new(),
            value_type: ValueType::None,
            buffer: Cursor::new(Vec::new()),
            ready: false,
        }
    }

    /// Reads a stored value into a ready handle.
    pub(crate) fn decode(key: RegistryKey, id: ValueId) -> Result<Self> {
        let (name, (value_type, data)) = key
            .hive()
            .with_store(|store| Ok((store.node_value_key(id)?, store.value_value(id)?)))?;

        let mut value = Self::new(key);
        value.name = name;
        value.value_type = ValueType::from_u32(value_type);
        value.replace_bytes(data);
        value.ready = true;
        Ok(value)
    }

    /// Names the value, marks it ready and writes it through.
    pub(crate) fn attach(&mut self, name: &str) -> Result<()> {
        self.set_name(name)?;
        self.ready = true;
        self.sync()
    }

    /// Returns the key owning this value.
    pub fn key(&self) -> &RegistryKey {
        &self.key
    }

    /// Returns the value name, [`DEFAULT_VALUE_NAME`] for the default value.
    pub fn name(&self) -> &str {
        if self.name.is_empty() {
            DEFAULT_VALUE_NAME
        } else {
            &self.name
        }
    }

    /// Returns true if this is the key's default value.
    pub fn is_default(&self) -> bool {
        self.name.is_empty()
    }

    /// Returns the value type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Returns the buffered bytes.
    pub fn raw_data(&self) -> &[u8] {
        self.buffer.get_ref()
    }

    /// Returns true if changes are written through to the store.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Returns the parsed value data.
    pub fn data(&self) -> Result<ValueData> {
        ValueData::decode(self.value_type, self.raw_data())
    }

    /// Renames the value.
    ///
    /// [`DEFAULT_VALUE_NAME`] selects the default value. A ready value is
    /// written under the new name; a value under the old name is left as is.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.name = if name == DEFAULT_VALUE_NAME {
            String::new()
        } else {
            name.to_string()
        };
        self.sync()
    }

    /// Changes the type tag without touching the data.
    pub fn set_type(&mut self, value_type: ValueType) -> Result<()> {
        self.value_type = value_type;
        self.sync()
    }

    /// Replaces type and data with the encoding of `data`.
    ///
    /// # Errors
    ///
    /// BCD device and description-type structures are rejected with
    /// [`RegistryError::UnsupportedValue`] and leave the value unchanged.
    pub fn set_value<V: Into<HostValue>>(&mut self, data: V) -> Result<()> {
        let (value_type, bytes) = data.into().encode()?;
        self.value_type = value_type;
        self.replace_bytes(bytes);
        self.sync()
    }

    /// Writes the value to the store and commits. Does nothing while unready.
    pub fn sync(&mut self) -> Result<()> {
        if !self.ready {
            return Ok(());
        }

        let value = self.store_value();
        let node = self.key.node();
        self.key
            .hive()
            .with_store(|store| Ok(store.node_set_value(node, &value)?))?;
        debug!(
            node = %node,
            name = self.name(),
            value_type = %ValueType::from_u32(value.value_type),
            len = value.data.len(),
            "Synced value"
        );
        self.key.hive().sync()
    }

    /// Builds the store representation. Empty data is stored as a single zero
    /// byte of REG_NONE because the store cannot hold zero-length data.
    fn store_value(&self) -> StoreValue {
        let mut value = StoreValue {
            value_type: self.value_type.to_u32(),
            name: self.name.clone(),
            data: self.raw_data().to_vec(),
        };
        if value.data.is_empty() {
            value.data = vec![0];
            value.value_type = ValueType::None.to_u32();
        }
        value
    }

    fn replace_bytes(&mut self, bytes: Vec<u8>) {
        let end = bytes.len() as u64;
        self.buffer = Cursor::new(bytes);
        self.buffer.set_position(end);
    }
}

impl Read for RegistryValue {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.buffer.read(buf)
    }
}

impl Write for RegistryValue {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sync().map_err(|err| match err {
            RegistryError::Io(io) => io,
            other => io::Error::new(io::ErrorKind::Other, other),
        })
    }
}

impl Seek for RegistryValue {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }
}

impl fmt::Debug for RegistryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryValue")
            .field("key", &self.key)
            .field("name", &self.name())
            .field("value_type", &self.value_type)
            .field("data", &hex::encode(self.raw_data()))
            .field("ready", &self.ready)
            .finish()
    }
}
