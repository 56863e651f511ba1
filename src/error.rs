//! Error types for hive operations.
//!
//! Errors fall into three groups: structural errors raised while walking
//! the key tree, validation errors raised by the codecs, and errors that
//! the node store reports, which are passed through untouched.

use crate::store::StoreError;
use std::io;
use thiserror::Error;

/// Result type alias for hive operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while working with a hive.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The node store rejected or failed an operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// I/O error on a value's staging buffer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Requested child key does not exist.
    #[error("Failed to find the requested child: '{0}'")]
    ChildMissing(String),

    /// Requested value does not exist.
    #[error("Failed to find the requested value: '{0}'")]
    ValueMissing(String),

    /// Path resolved to the root key, which cannot be made again.
    #[error("Cannot remake root node")]
    RootMake,

    /// Path resolved to the root key, which cannot be deleted.
    #[error("Cannot delete root node")]
    RootDelete,

    /// `parent()` was called on the root key.
    #[error("Parent not found, trying to get the parent of the root key?")]
    ParentRoot,

    /// The hive behind this handle has been closed.
    #[error("Hive '{0}' is closed")]
    SessionClosed(String),

    /// The host value has no registry encoding.
    #[error("Unsupported value type: {0}")]
    UnsupportedValue(&'static str),

    /// BCD device header was not exactly 16 bytes.
    #[error("BCD device must have header size of 0x10 (16), got {0}")]
    BcdDeviceHeaderSize(usize),

    /// UTF-16 data had an odd number of bytes.
    #[error("Invalid UTF-16 string: odd byte length {length}")]
    InvalidUtf16 {
        /// Length of the rejected byte sequence.
        length: usize,
    },

    /// Fixed-width data was shorter than its type requires.
    #[error("Truncated data: expected {expected} bytes, got {actual} bytes")]
    TruncatedData {
        /// Bytes the type requires.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },
}

impl RegistryError {
    /// Creates a truncated data error.
    ///
    /// # Arguments
    ///
    /// * `expected` - Number of bytes the decoder needs
    /// * `actual` - Number of bytes that were supplied
    pub fn truncated(expected: usize, actual: usize) -> Self {
        Self::TruncatedData { expected, actual }
    }

    /// Returns true for the "not found" family (missing child or value).
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reghive::error::RegistryError;
    /// let err = RegistryError::ChildMissing("Software".into());
    /// assert!(err.is_not_found());
    /// assert!(!RegistryError::RootMake.is_not_found());
    /// ```
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ChildMissing(_) | Self::ValueMissing(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_pass_through() {
        let err: RegistryError = StoreError::ReadOnly.into();
        assert_eq!(err.to_string(), StoreError::ReadOnly.to_string());
        assert!(matches!(err, RegistryError::Store(StoreError::ReadOnly)));
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            RegistryError::BcdDeviceHeaderSize(3).to_string(),
            "BCD device must have header size of 0x10 (16), got 3"
        );
        assert_eq!(
            RegistryError::truncated(4, 2).to_string(),
            "Truncated data: expected 4 bytes, got 2 bytes"
        );
    }
}
