//! Boot Configuration Data (BCD) descriptor codec.
//!
//! BCD stores keep a 32-bit "description type" on every object. The word is
//! a packed bitfield:
//!
//! ```text
//!  31    28 27    24 23    20 19                             0
//! +--------+--------+--------+--------------------------------+
//! | object | ...... | image  |          application           |
//! +--------+--------+--------+--------------------------------+
//! ```
//!
//! Device elements start with a fixed 16-byte header, wrapped here as
//! [`BcdDevice`].

use crate::error::{RegistryError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::Cursor;

const MASK_OBJECT: u32 = 0xF000_0000;
const MASK_IMAGE: u32 = 0x00F0_0000;
const MASK_APPLICATION: u32 = 0x000F_FFFF;

/// Size of a BCD device header in bytes.
pub const BCD_DEVICE_HEADER_SIZE: usize = 0x10;

macro_rules! bcd_enum {
    (
        $(#[$meta:meta])*
        $name:ident($raw:ty), null = $null:literal {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal => $label:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize), serde(into = "u32"))]
        pub enum $name {
            $($(#[$vmeta])* $variant,)*
            /// Value outside the known range.
            Unknown($raw),
        }

        impl $name {
            /// Converts a raw field value.
            pub fn from_raw(raw: $raw) -> Self {
                match raw {
                    $($value => $name::$variant,)*
                    other => $name::Unknown(other),
                }
            }

            /// Returns the raw field value.
            pub fn raw(self) -> $raw {
                match self {
                    $($name::$variant => $value,)*
                    $name::Unknown(other) => other,
                }
            }

            /// Returns the display label, or the NULL label for unknown values.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)*
                    $name::Unknown(_) => $null,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                u32::from(value.raw())
            }
        }
    };
}

bcd_enum! {
    /// Object type (bits 28-31).
    ObjectType(u8), null = "objectNULL" {
        /// Boot application.
        Application = 1 => "objectApplication",
        /// Inheritable settings.
        Inherit = 2 => "objectInherit",
        /// Device options.
        Device = 3 => "objectDevice",
    }
}

bcd_enum! {
    /// Image type of an application object (bits 20-23).
    ImageType(u8), null = "imageNULL" {
        /// Firmware application.
        Firmware = 1 => "imageFirmware",
        /// Windows boot application.
        WindowsBoot = 2 => "imageWindowsBoot",
        /// Legacy loader.
        LegacyLoader = 3 => "imageLegacyLoader",
        /// Real-mode application.
        RealMode = 4 => "imageRealMode",
    }
}

bcd_enum! {
    /// Inheritable object class.
    InheritType(u8), null = "inheritNULL" {
        /// Inheritable by any object.
        AnyObject = 1 => "inheritAnyObject",
        /// Inheritable by application objects only.
        ApplicationObject = 2 => "inheritApplicationObject",
        /// Inheritable by device objects only.
        DeviceObject = 3 => "inheritDeviceObject",
    }
}

bcd_enum! {
    /// Application type (bits 0-19).
    ApplicationType(u32), null = "applicationNULL" {
        /// Firmware boot manager.
        FwBootmgr = 1 => "fwbootmgr",
        /// Windows boot manager.
        Bootmgr = 2 => "bootmgr",
        /// OS loader.
        OsLoader = 3 => "osloader",
        /// Resume from hibernation.
        Resume = 4 => "resume",
        /// Memory diagnostics.
        MemDiag = 5 => "memdiag",
        /// Legacy NTLDR.
        Ntldr = 6 => "ntldr",
        /// Legacy setup loader.
        Setupldr = 7 => "setupldr",
        /// Boot sector.
        BootSector = 8 => "bootsector",
        /// Startup application.
        Startup = 9 => "startup",
        /// Generic boot application.
        BootApp = 10 => "bootapp",
    }
}

/// Decoded view of a BCD description-type value.
///
/// The raw bytes are kept so the value can be written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BcdDescType {
    #[cfg_attr(feature = "serde", serde(skip))]
    source: Vec<u8>,

    /// Object type.
    #[cfg_attr(feature = "serde", serde(rename = "object"))]
    pub object_type: ObjectType,

    /// Image type.
    #[cfg_attr(feature = "serde", serde(rename = "image"))]
    pub image_type: ImageType,

    /// Inherit type.
    #[cfg_attr(feature = "serde", serde(rename = "inherit"))]
    pub inherit_type: InheritType,

    /// Application type.
    #[cfg_attr(feature = "serde", serde(rename = "application"))]
    pub application_type: ApplicationType,
}

impl BcdDescType {
    /// Decodes a description type from its little-endian bytes.
    ///
    /// Only the first four bytes are read; all of `data` is kept as the source.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::TruncatedData`] if fewer than 4 bytes are given.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(RegistryError::truncated(4, data.len()));
        }
        let mut cursor = Cursor::new(data);
        let word = cursor.read_u32::<LittleEndian>()?;

        // Inherit type is read through the image mask, so both fields always
        // carry the same raw number.
        Ok(Self {
            source: data.to_vec(),
            object_type: ObjectType::from_raw(((word & MASK_OBJECT) >> 28) as u8),
            image_type: ImageType::from_raw(((word & MASK_IMAGE) >> 20) as u8),
            inherit_type: InheritType::from_raw(((word & MASK_IMAGE) >> 20) as u8),
            application_type: ApplicationType::from_raw(word & MASK_APPLICATION),
        })
    }

    /// Returns the bytes the view was decoded from.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Returns the raw 32-bit word.
    pub fn word(&self) -> u32 {
        u32::from_le_bytes([self.source[0], self.source[1], self.source[2], self.source[3]])
    }
}

impl fmt::Display for BcdDescType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}",
            self.object_type, self.image_type, self.inherit_type, self.application_type
        )
    }
}

/// Fixed-size BCD device header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BcdDevice {
    header: [u8; BCD_DEVICE_HEADER_SIZE],
}

impl BcdDevice {
    /// Wraps a device header.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::BcdDeviceHeaderSize`] unless `data` is exactly
    /// 16 bytes long.
    pub fn new(data: &[u8]) -> Result<Self> {
        let header = data
            .try_into()
            .map_err(|_| RegistryError::BcdDeviceHeaderSize(data.len()))?;
        Ok(Self { header })
    }

    /// Returns the header bytes.
    pub fn as_bytes(&self) -> &[u8; BCD_DEVICE_HEADER_SIZE] {
        &self.header
    }
}

impl fmt::Display for BcdDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bitfield() {
        let desc = BcdDescType::decode(&0x1020_0001u32.to_le_bytes()).unwrap();
        assert_eq!(desc.object_type, ObjectType::Application);
        assert_eq!(desc.image_type, ImageType::WindowsBoot);
        assert_eq!(desc.application_type, ApplicationType::FwBootmgr);
        assert_eq!(desc.word(), 0x1020_0001);
    }

    #[test]
    fn test_inherit_shares_image_bits() {
        let desc = BcdDescType::decode(&0x2030_0000u32.to_le_bytes()).unwrap();
        assert_eq!(desc.object_type, ObjectType::Inherit);
        assert_eq!(desc.image_type, ImageType::LegacyLoader);
        assert_eq!(desc.inherit_type, InheritType::DeviceObject);
    }

    #[test]
    fn test_unknown_labels() {
        let desc = BcdDescType::decode(&0xF0F0_0FFFu32.to_le_bytes()).unwrap();
        assert_eq!(desc.object_type, ObjectType::Unknown(0xF));
        assert_eq!(
            desc.to_string(),
            "objectNULL, imageNULL, inheritNULL, applicationNULL"
        );
    }

    #[test]
    fn test_display_known() {
        let desc = BcdDescType::decode(&0x1020_0003u32.to_le_bytes()).unwrap();
        assert_eq!(
            desc.to_string(),
            "objectApplication, imageWindowsBoot, inheritApplicationObject, osloader"
        );
    }

    #[test]
    fn test_decode_too_short() {
        assert!(matches!(
            BcdDescType::decode(&[1, 2]),
            Err(RegistryError::TruncatedData { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_raw_roundtrip() {
        for raw in 0..=12u32 {
            assert_eq!(u32::from(ApplicationType::from_raw(raw)), raw);
        }
    }

    #[test]
    fn test_device_header_size() {
        assert!(BcdDevice::new(&[0u8; 16]).is_ok());
        assert!(matches!(BcdDevice::new(&[0u8; 15]), Err(RegistryError::BcdDeviceHeaderSize(15))));
        assert!(matches!(BcdDevice::new(&[0u8; 17]), Err(RegistryError::BcdDeviceHeaderSize(17))));
        assert!(BcdDevice::new(&[]).is_err());
    }

    #[test]
    fn test_device_display() {
        let mut bytes = [0u8; 16];
        bytes[0] = 0xAB;
        let device = BcdDevice::new(&bytes).unwrap();
        assert_eq!(device.to_string(), format!("ab{}", "0".repeat(30)));
        assert_eq!(device.as_bytes()[0], 0xAB);
    }
}
