//! Registry value types and the translation between host values and raw bytes.
//!
//! Encoding goes through [`HostValue`], a tagged input with one variant per
//! supported host kind. Decoding goes through [`ValueData::decode`], which
//! turns a `(ValueType, bytes)` pair back into a typed view.

use crate::bcd::{BcdDescType, BcdDevice};
use crate::error::{RegistryError, Result};
use crate::utils::{
    read_utf16_multi_string, read_utf16_string, write_utf16_multi_string, write_utf16_string,
};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::Cursor;

/// Registry value data types.
///
/// Tags 0-11 mirror the hive format. Tags 0xE and 0xF are only found inside
/// BCD stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// No value type.
    None,

    /// String (null-terminated).
    String,

    /// String with environment variables.
    ExpandString,

    /// Binary data.
    Binary,

    /// 32-bit little-endian integer.
    Dword,

    /// 32-bit big-endian integer.
    DwordBigEndian,

    /// Symbolic link (Unicode).
    Link,

    /// Multiple strings.
    MultiString,

    /// Resource list.
    ResourceList,

    /// Full resource descriptor.
    FullResourceDescriptor,

    /// Resource requirements list.
    ResourceRequirementsList,

    /// 64-bit little-endian integer.
    Qword,

    /// BCD device path header.
    BcdDevice,

    /// BCD description-type bitfield.
    BcdDescType,

    /// Any other tag, kept as its raw value.
    Unknown(u32),
}

impl ValueType {
    /// Converts a raw type tag into a value type.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => ValueType::None,
            1 => ValueType::String,
            2 => ValueType::ExpandString,
            3 => ValueType::Binary,
            4 => ValueType::Dword,
            5 => ValueType::DwordBigEndian,
            6 => ValueType::Link,
            7 => ValueType::MultiString,
            8 => ValueType::ResourceList,
            9 => ValueType::FullResourceDescriptor,
            10 => ValueType::ResourceRequirementsList,
            11 => ValueType::Qword,
            0xE => ValueType::BcdDevice,
            0xF => ValueType::BcdDescType,
            _ => ValueType::Unknown(value),
        }
    }

    /// Returns the raw type tag.
    pub fn to_u32(self) -> u32 {
        match self {
            ValueType::None => 0,
            ValueType::String => 1,
            ValueType::ExpandString => 2,
            ValueType::Binary => 3,
            ValueType::Dword => 4,
            ValueType::DwordBigEndian => 5,
            ValueType::Link => 6,
            ValueType::MultiString => 7,
            ValueType::ResourceList => 8,
            ValueType::FullResourceDescriptor => 9,
            ValueType::ResourceRequirementsList => 10,
            ValueType::Qword => 11,
            ValueType::BcdDevice => 0xE,
            ValueType::BcdDescType => 0xF,
            ValueType::Unknown(value) => value,
        }
    }

    /// Returns the name of this value type.
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::None => "REG_NONE",
            ValueType::String => "REG_SZ",
            ValueType::ExpandString => "REG_EXPAND_SZ",
            ValueType::Binary => "REG_BINARY",
            ValueType::Dword => "REG_DWORD_LITTLE",
            ValueType::DwordBigEndian => "REG_DWORD_BIG",
            ValueType::Link => "REG_LINK",
            ValueType::MultiString => "REG_MULTI_SZ",
            ValueType::ResourceList => "REG_RESOURCE_LIST",
            ValueType::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR",
            ValueType::ResourceRequirementsList => "REG_RESOURCE_REQUIREMENTS_LIST",
            ValueType::Qword => "REG_QWORD",
            ValueType::BcdDevice => "REG_BCD_DEVICE",
            ValueType::BcdDescType => "REG_BCD_DESCTYPE",
            ValueType::Unknown(_) => "REG_NULL",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A host value to be stored in a registry value.
///
/// Narrow integers and booleans are widened to a little-endian DWORD,
/// 64-bit integers become a QWORD, floats are stored as REG_BINARY in their
/// IEEE-754 little-endian layout.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// Stored as DWORD 0 or 1.
    Bool(bool),
    /// Stored as DWORD.
    U8(u8),
    /// Stored as DWORD (sign-extended).
    I8(i8),
    /// Stored as DWORD.
    U16(u16),
    /// Stored as DWORD (sign-extended).
    I16(i16),
    /// Stored as DWORD.
    U32(u32),
    /// Stored as DWORD.
    I32(i32),
    /// Stored as QWORD.
    U64(u64),
    /// Stored as QWORD.
    I64(i64),
    /// Stored as 4 bytes of REG_BINARY.
    F32(f32),
    /// Stored as 8 bytes of REG_BINARY.
    F64(f64),
    /// Stored as REG_BINARY.
    Binary(Vec<u8>),
    /// Stored as REG_SZ (UTF-16LE, null-terminated).
    String(String),
    /// Stored as REG_MULTI_SZ.
    MultiString(Vec<String>),
    /// Not encodable yet; always rejected.
    BcdDevice(BcdDevice),
    /// Not encodable yet; always rejected.
    BcdDescType(BcdDescType),
}

impl HostValue {
    /// Encodes the host value into a type tag and raw bytes.
    ///
    /// # Errors
    ///
    /// BCD device and description-type structures have no defined encoding
    /// and return [`RegistryError::UnsupportedValue`].
    pub fn encode(&self) -> Result<(ValueType, Vec<u8>)> {
        let mut out = Vec::with_capacity(8);
        let value_type = match self {
            HostValue::Bool(b) => {
                out.write_u32::<LittleEndian>(u32::from(*b))?;
                ValueType::Dword
            }
            HostValue::U8(v) => {
                out.write_u32::<LittleEndian>(u32::from(*v))?;
                ValueType::Dword
            }
            HostValue::I8(v) => {
                out.write_i32::<LittleEndian>(i32::from(*v))?;
                ValueType::Dword
            }
            HostValue::U16(v) => {
                out.write_u32::<LittleEndian>(u32::from(*v))?;
                ValueType::Dword
            }
            HostValue::I16(v) => {
                out.write_i32::<LittleEndian>(i32::from(*v))?;
                ValueType::Dword
            }
            HostValue::U32(v) => {
                out.write_u32::<LittleEndian>(*v)?;
                ValueType::Dword
            }
            HostValue::I32(v) => {
                out.write_i32::<LittleEndian>(*v)?;
                ValueType::Dword
            }
            HostValue::U64(v) => {
                out.write_u64::<LittleEndian>(*v)?;
                ValueType::Qword
            }
            HostValue::I64(v) => {
                out.write_i64::<LittleEndian>(*v)?;
                ValueType::Qword
            }
            HostValue::F32(v) => {
                out.write_f32::<LittleEndian>(*v)?;
                ValueType::Binary
            }
            HostValue::F64(v) => {
                out.write_f64::<LittleEndian>(*v)?;
                ValueType::Binary
            }
            HostValue::Binary(bytes) => {
                out.extend_from_slice(bytes);
                ValueType::Binary
            }
            HostValue::String(s) => {
                out = write_utf16_string(s);
                ValueType::String
            }
            HostValue::MultiString(strings) => {
                out = write_utf16_multi_string(strings);
                ValueType::MultiString
            }
            HostValue::BcdDevice(_) => return Err(RegistryError::UnsupportedValue("BCD device")),
            HostValue::BcdDescType(_) => {
                return Err(RegistryError::UnsupportedValue("BCD description type"))
            }
        };
        Ok((value_type, out))
    }
}

macro_rules! host_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for HostValue {
                fn from(value: $ty) -> Self {
                    HostValue::$variant(value.into())
                }
            }
        )*
    };
}

host_value_from! {
    bool => Bool,
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    Vec<u8> => Binary,
    &[u8] => Binary,
    String => String,
    &str => String,
    Vec<String> => MultiString,
    BcdDevice => BcdDevice,
    BcdDescType => BcdDescType,
}

/// Parsed registry value data.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueData {
    /// No data.
    None,

    /// String value.
    String(String),

    /// Expandable string value.
    ExpandString(String),

    /// Symbolic link target.
    Link(String),

    /// Binary data.
    Binary(Vec<u8>),

    /// 32-bit integer.
    Dword(u32),

    /// 32-bit big-endian integer.
    DwordBigEndian(u32),

    /// Multiple strings.
    MultiString(Vec<String>),

    /// 64-bit integer.
    Qword(u64),

    /// BCD device header.
    BcdDevice(BcdDevice),

    /// Decoded BCD description type.
    BcdDescType(BcdDescType),

    /// Resource descriptors and unknown types, kept raw.
    Unknown(Vec<u8>),
}

impl ValueData {
    /// Parses value data based on the value type.
    ///
    /// # Arguments
    ///
    /// * `value_type` - Type tag of the value.
    /// * `data` - Raw value data bytes.
    ///
    /// Empty data decodes to the empty form of its type: `""` for strings,
    /// no bytes for binary data. Fixed-size types report truncation.
    pub fn decode(value_type: ValueType, data: &[u8]) -> Result<Self> {
        match value_type {
            ValueType::None => Ok(ValueData::None),

            ValueType::String => Ok(ValueData::String(read_utf16_string(data)?)),
            ValueType::ExpandString => Ok(ValueData::ExpandString(read_utf16_string(data)?)),
            ValueType::Link => Ok(ValueData::Link(read_utf16_string(data)?)),

            ValueType::Binary => Ok(ValueData::Binary(data.to_vec())),

            ValueType::Dword => {
                require_len(data, 4)?;
                let mut cursor = Cursor::new(data);
                Ok(ValueData::Dword(cursor.read_u32::<LittleEndian>()?))
            }

            ValueType::DwordBigEndian => {
                require_len(data, 4)?;
                let mut cursor = Cursor::new(data);
                Ok(ValueData::DwordBigEndian(cursor.read_u32::<BigEndian>()?))
            }

            ValueType::Qword => {
                require_len(data, 8)?;
                let mut cursor = Cursor::new(data);
                Ok(ValueData::Qword(cursor.read_u64::<LittleEndian>()?))
            }

            ValueType::MultiString => Ok(ValueData::MultiString(read_utf16_multi_string(data)?)),

            ValueType::BcdDevice => Ok(ValueData::BcdDevice(BcdDevice::new(data)?)),
            ValueType::BcdDescType => Ok(ValueData::BcdDescType(BcdDescType::decode(data)?)),

            ValueType::ResourceList
            | ValueType::FullResourceDescriptor
            | ValueType::ResourceRequirementsList
            | ValueType::Unknown(_) => Ok(ValueData::Unknown(data.to_vec())),
        }
    }
}

fn require_len(data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(RegistryError::truncated(expected, data.len()));
    }
    Ok(())
}

impl fmt::Display for ValueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueData::None => f.write_str("(none)"),
            ValueData::String(s) | ValueData::ExpandString(s) | ValueData::Link(s) => {
                f.write_str(s)
            }
            ValueData::Binary(b) | ValueData::Unknown(b) => f.write_str(&hex::encode(b)),
            ValueData::Dword(d) | ValueData::DwordBigEndian(d) => write!(f, "{} (0x{:08X})", d, d),
            ValueData::Qword(q) => write!(f, "{} (0x{:016X})", q, q),
            ValueData::MultiString(strings) => f.write_str(&strings.join(", ")),
            ValueData::BcdDevice(device) => write!(f, "{}", device),
            ValueData::BcdDescType(desc) => write!(f, "{}", desc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_tags() {
        for tag in (0..=11).chain([0xE, 0xF]) {
            assert_eq!(ValueType::from_u32(tag).to_u32(), tag);
        }
        assert_eq!(ValueType::from_u32(0x42), ValueType::Unknown(0x42));
        assert_eq!(ValueType::Unknown(0x42).to_u32(), 0x42);
    }

    #[test]
    fn test_value_type_names() {
        assert_eq!(ValueType::String.name(), "REG_SZ");
        assert_eq!(ValueType::Dword.to_string(), "REG_DWORD_LITTLE");
        assert_eq!(ValueType::BcdDescType.name(), "REG_BCD_DESCTYPE");
        assert_eq!(ValueType::Unknown(99).name(), "REG_NULL");
    }

    #[test]
    fn test_encode_widening() {
        assert_eq!(
            HostValue::Bool(true).encode().unwrap(),
            (ValueType::Dword, vec![1, 0, 0, 0])
        );
        assert_eq!(
            HostValue::U8(0xAB).encode().unwrap(),
            (ValueType::Dword, vec![0xAB, 0, 0, 0])
        );
        assert_eq!(
            HostValue::I16(-1).encode().unwrap(),
            (ValueType::Dword, vec![0xFF, 0xFF, 0xFF, 0xFF])
        );
        assert_eq!(
            HostValue::U64(1).encode().unwrap(),
            (ValueType::Qword, vec![1, 0, 0, 0, 0, 0, 0, 0])
        );
    }

    #[test]
    fn test_encode_float_as_binary() {
        let (value_type, bytes) = HostValue::F64(1.5).encode().unwrap();
        assert_eq!(value_type, ValueType::Binary);
        assert_eq!(bytes, 1.5f64.to_le_bytes().to_vec());

        let (_, bytes) = HostValue::F32(-2.0).encode().unwrap();
        assert_eq!(bytes.len(), 4);
    }

    #[test]
    fn test_encode_string() {
        let (value_type, bytes) = HostValue::from("AB").encode().unwrap();
        assert_eq!(value_type, ValueType::String);
        assert_eq!(bytes, vec![0x41, 0x00, 0x42, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_rejects_bcd() {
        let device = BcdDevice::new(&[0u8; 16]).unwrap();
        assert!(matches!(
            HostValue::from(device).encode(),
            Err(RegistryError::UnsupportedValue(_))
        ));

        let desc = BcdDescType::decode(&[1, 0, 0, 0x10]).unwrap();
        assert!(matches!(
            HostValue::from(desc).encode(),
            Err(RegistryError::UnsupportedValue(_))
        ));
    }

    #[test]
    fn test_decode_dword_variants() {
        let data = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(
            ValueData::decode(ValueType::Dword, &data).unwrap(),
            ValueData::Dword(0x04030201)
        );
        assert_eq!(
            ValueData::decode(ValueType::DwordBigEndian, &data).unwrap(),
            ValueData::DwordBigEndian(0x01020304)
        );
    }

    #[test]
    fn test_decode_truncated() {
        let result = ValueData::decode(ValueType::Qword, &[1, 2, 3]);
        assert!(matches!(
            result,
            Err(RegistryError::TruncatedData { expected: 8, actual: 3 })
        ));
    }

    #[test]
    fn test_decode_multi_string() {
        let (_, bytes) = HostValue::MultiString(vec!["one".into(), "two".into()])
            .encode()
            .unwrap();
        assert_eq!(
            ValueData::decode(ValueType::MultiString, &bytes).unwrap(),
            ValueData::MultiString(vec!["one".into(), "two".into()])
        );
    }

    #[test]
    fn test_decode_empty_and_none() {
        assert_eq!(ValueData::decode(ValueType::None, &[]).unwrap(), ValueData::None);
        assert_eq!(ValueData::decode(ValueType::None, &[0]).unwrap(), ValueData::None);
        assert_eq!(
            ValueData::decode(ValueType::String, &[]).unwrap(),
            ValueData::String(String::new())
        );
        assert_eq!(
            ValueData::decode(ValueType::Binary, &[]).unwrap(),
            ValueData::Binary(Vec::new())
        );
        assert_eq!(
            ValueData::decode(ValueType::ResourceList, &[]).unwrap(),
            ValueData::Unknown(Vec::new())
        );
        assert_eq!(
            ValueData::decode(ValueType::MultiString, &[]).unwrap(),
            ValueData::MultiString(Vec::new())
        );
        assert!(matches!(
            ValueData::decode(ValueType::Dword, &[]),
            Err(RegistryError::TruncatedData { expected: 4, actual: 0 })
        ));
    }

    #[test]
    fn test_empty_binary_roundtrip() {
        let (value_type, bytes) = HostValue::Binary(Vec::new()).encode().unwrap();
        assert_eq!(value_type, ValueType::Binary);
        assert_eq!(
            ValueData::decode(value_type, &bytes).unwrap(),
            ValueData::Binary(Vec::new())
        );
    }

    #[test]
    fn test_multi_string_keeps_empty_elements() {
        for list in [
            vec!["a", "", "b"],
            vec!["a", ""],
            vec![""],
            vec![],
        ] {
            let strings: Vec<String> = list.iter().map(|s| s.to_string()).collect();
            let (_, bytes) = HostValue::MultiString(strings.clone()).encode().unwrap();
            assert_eq!(
                ValueData::decode(ValueType::MultiString, &bytes).unwrap(),
                ValueData::MultiString(strings)
            );
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ValueData::Binary(vec![0xDE, 0xAD]).to_string(), "dead");
        assert_eq!(ValueData::Dword(16).to_string(), "16 (0x00000010)");
        assert_eq!(ValueData::None.to_string(), "(none)");
    }
}
