//! # Registry Hive Key/Value Layer
//!
//! A path-addressable view over a Windows-style registry hive: a tree of
//! named keys holding typed values, plus a codec for the Boot Configuration
//! Data (BCD) fields found inside BCD stores.
//!
//! ## Architecture
//!
//! The crate is built in layers, leaves first:
//!
//! 1. **Type codec** ([`data`]): registry value types and the translation
//!    between host values and raw bytes
//! 2. **BCD codec** ([`bcd`]): the description-type bitfield and device headers
//! 3. **Node store** ([`store`]): the primitive tree API this layer runs on,
//!    with an in-memory implementation in [`memory`]
//! 4. **Keys and values** ([`key`], [`value`]): handles onto nodes and values
//! 5. **Sessions** ([`hive`]): open hives, path resolution and commit
//!
//! The hive's on-disk format is not parsed here. Any library that can expose
//! a hive as a [`NodeStore`] plugs in through a [`StoreBackend`].
//!
//! ## Durability
//!
//! Every mutation (creating or deleting a key, setting or deleting a value)
//! is followed by a commit of the whole hive, unless the hive was opened
//! with [`HiveOptions::auto_commit`] turned off.
//!
//! ## Examples
//!
//! ```rust
//! use reghive::{HiveManager, MemoryBackend, ValueData};
//!
//! # fn main() -> reghive::Result<()> {
//! let backend = MemoryBackend::new();
//! backend.create("SYSTEM");
//!
//! let manager = HiveManager::new(backend);
//! let hive = manager.open("SYSTEM")?;
//!
//! // Missing parents are created on the way
//! let key = hive.make_key("/ControlSet001/Control")?;
//! let mut value = key.make_value("CurrentUser")?;
//! value.set_value("USERNAME")?;
//!
//! let key = hive.get_key("/controlset001/CONTROL")?;
//! assert_eq!(
//!     key.value("currentuser")?.data()?,
//!     ValueData::String("USERNAME".into())
//! );
//!
//! hive.close()?;
//! assert!(!manager.is_open("SYSTEM"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bcd;
pub mod data;
pub mod error;
pub mod hive;
pub mod key;
pub mod memory;
pub mod store;
pub mod utils;
pub mod value;

// Re-export main types for convenience
pub use bcd::{ApplicationType, BcdDescType, BcdDevice, ImageType, InheritType, ObjectType};
pub use data::{HostValue, ValueData, ValueType};
pub use error::{RegistryError, Result};
pub use hive::{path_split, Hive, HiveManager, HiveOptions};
pub use key::RegistryKey;
pub use memory::{MemoryBackend, MemoryStore};
pub use store::{NodeId, NodeStore, OpenMode, StoreBackend, StoreError, StoreValue, ValueId};
pub use value::{RegistryValue, DEFAULT_VALUE_NAME};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
