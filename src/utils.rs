//! Utility functions for string conversion and timestamps.

use crate::error::{RegistryError, Result};
use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Utc};
use encoding_rs::UTF_16LE;

/// Seconds between the FILETIME epoch (1601-01-01) and the Unix epoch.
const FILETIME_UNIX_DIFF: i64 = 11_644_473_600;

/// FILETIME ticks (100ns) per second.
const FILETIME_TICKS: i64 = 10_000_000;

/// Decodes a UTF-16LE string, trimming trailing null code units.
///
/// Only `0x0000` units at the very end are removed; nulls in the middle
/// of the data are kept. Unpaired surrogates are replaced with U+FFFD.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidUtf16`] if the data length is odd.
///
/// # Examples
///
/// ```rust
/// # use reghive::utils::read_utf16_string;
/// let s = read_utf16_string(&[0x41, 0x00, 0x42, 0x00, 0x00, 0x00]).unwrap();
/// assert_eq!(s, "AB");
/// ```
pub fn read_utf16_string(data: &[u8]) -> Result<String> {
    if data.len() % 2 != 0 {
        return Err(RegistryError::InvalidUtf16 { length: data.len() });
    }

    let mut end = data.len();
    while end >= 2 && data[end - 2] == 0 && data[end - 1] == 0 {
        end -= 2;
    }
    if end == 0 {
        return Ok(String::new());
    }

    let (decoded, _had_errors) = UTF_16LE.decode_without_bom_handling(&data[..end]);
    Ok(decoded.into_owned())
}

/// Decodes a REG_MULTI_SZ list.
///
/// Each element ends with a null unit and the list ends with one more.
/// Only that final terminator is dropped, so empty elements survive.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidUtf16`] if the data length is odd.
pub fn read_utf16_multi_string(data: &[u8]) -> Result<Vec<String>> {
    if data.len() % 2 != 0 {
        return Err(RegistryError::InvalidUtf16 { length: data.len() });
    }

    let (decoded, _had_errors) = UTF_16LE.decode_without_bom_handling(data);
    let list = decoded.strip_suffix('\0').unwrap_or(&decoded);
    Ok(list.split_terminator('\0').map(str::to_string).collect())
}

/// Encodes a string as UTF-16LE followed by a single null code unit.
pub fn write_utf16_string(s: &str) -> Vec<u8> {
    let mut units: Vec<u16> = s.encode_utf16().collect();
    units.push(0);

    let mut out = vec![0u8; units.len() * 2];
    LittleEndian::write_u16_into(&units, &mut out);
    out
}

/// Encodes a list of strings as REG_MULTI_SZ: each string null-terminated,
/// followed by one extra terminating null.
pub fn write_utf16_multi_string<S: AsRef<str>>(strings: &[S]) -> Vec<u8> {
    let mut out = Vec::new();
    for s in strings {
        out.extend_from_slice(&write_utf16_string(s.as_ref()));
    }
    out.extend_from_slice(&[0, 0]);
    out
}

/// Converts a Windows FILETIME to a UTC timestamp.
///
/// Returns `None` if the value falls outside chrono's representable range.
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    let seconds = (filetime / FILETIME_TICKS as u64) as i64 - FILETIME_UNIX_DIFF;
    let nanos = ((filetime % FILETIME_TICKS as u64) * 100) as u32;

    DateTime::from_timestamp(seconds, nanos)
}

/// Converts a UTC timestamp to a Windows FILETIME, clamping at the epoch.
pub fn datetime_to_filetime(time: DateTime<Utc>) -> u64 {
    let seconds = time.timestamp() + FILETIME_UNIX_DIFF;
    if seconds < 0 {
        return 0;
    }
    seconds as u64 * FILETIME_TICKS as u64 + u64::from(time.timestamp_subsec_nanos() / 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_utf16_string() {
        assert_eq!(read_utf16_string(&[0x41, 0x00, 0x42, 0x00, 0x00, 0x00]).unwrap(), "AB");
        assert_eq!(read_utf16_string(&[0x41, 0x00, 0x42, 0x00]).unwrap(), "AB");
    }

    #[test]
    fn test_read_utf16_string_empty() {
        assert_eq!(read_utf16_string(&[]).unwrap(), "");
        assert_eq!(read_utf16_string(&[0, 0, 0, 0]).unwrap(), "");
    }

    #[test]
    fn test_read_utf16_string_odd_length() {
        let result = read_utf16_string(&[0x41, 0x00, 0x42]);
        assert!(matches!(result, Err(RegistryError::InvalidUtf16 { length: 3 })));
    }

    #[test]
    fn test_read_utf16_string_with_embedded_null() {
        // Embedded nulls are preserved, only trailing ones are trimmed
        let data = [0x41, 0x00, 0x00, 0x00, 0x42, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(read_utf16_string(&data).unwrap(), "A\0B");
    }

    #[test]
    fn test_write_utf16_string() {
        assert_eq!(write_utf16_string("AB"), vec![0x41, 0x00, 0x42, 0x00, 0x00, 0x00]);
        assert_eq!(write_utf16_string(""), vec![0x00, 0x00]);
        assert_eq!(read_utf16_string(&write_utf16_string("Grüße 🎉")).unwrap(), "Grüße 🎉");
    }

    #[test]
    fn test_write_utf16_multi_string() {
        let data = write_utf16_multi_string(&["a", "b"]);
        assert_eq!(data, vec![0x61, 0, 0, 0, 0x62, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_filetime_roundtrip() {
        // 2020-01-01T00:00:00Z
        let filetime = 132_223_104_000_000_000u64;
        let time = filetime_to_datetime(filetime).unwrap();
        assert_eq!(time.to_rfc3339(), "2020-01-01T00:00:00+00:00");
        assert_eq!(datetime_to_filetime(time), filetime);
    }
}
