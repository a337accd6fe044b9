//! Shared primitives for the "magic + version + count-prefixed table +
//! compressed payload" container shape.
//!
//! Every integer is little-endian and fixed-width: `i32` for counts and sizes,
//! `u64` for absolute offsets. Two string encodings exist and callers pick one
//! per field:
//!
//! - **ASCII, NUL-terminated**: used by the hash manifest name table.
//! - **Unicode, length-prefixed**: an `i32` count of UTF-16 code units
//!   *including* a terminating NUL, followed by that many UTF-16LE units. Used
//!   for merge data entry names.
//!
//! These layouts are a wire format shared with already-shipped packages: the
//! writers here must produce exactly the bytes the readers consume.

use crate::error::{ContainerError, Result};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use std::io::{Read, Write};

/// Identity used for format errors raised before a caller attaches its own
/// container magic via [`ContainerError::within`].
const STREAM: &str = "stream";

/// Upper bound for a single string read from a container. Guards against
/// allocating gigabytes when a corrupt length prefix is encountered.
const MAX_STRING_LEN: usize = 32 * 1024;

/// Write a four-byte magic.
pub fn write_magic<W: Write>(writer: &mut W, magic: &[u8; 4]) -> Result<()> {
    writer.write_all(magic)?;
    Ok(())
}

/// Read four bytes and check them against `expected`.
pub fn read_magic<R: Read>(reader: &mut R, expected: &[u8; 4]) -> Result<()> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != expected {
        return Err(ContainerError::format(
            STREAM,
            format!(
                "invalid magic {:?}, expected {:?}",
                String::from_utf8_lossy(&magic),
                String::from_utf8_lossy(expected)
            ),
        ));
    }
    Ok(())
}

/// Write a magic followed by a one-byte format version.
pub fn write_header<W: Write>(writer: &mut W, magic: &[u8; 4], version: u8) -> Result<()> {
    write_magic(writer, magic)?;
    writer.write_u8(version)?;
    Ok(())
}

/// Read and validate a magic, returning the version byte that follows it.
pub fn read_header<R: Read>(reader: &mut R, expected_magic: &[u8; 4]) -> Result<u8> {
    read_magic(reader, expected_magic)?;
    Ok(reader.read_u8()?)
}

/// Write an `i32` count/size field, rejecting values that do not fit.
pub fn write_i32_len<W: Write>(writer: &mut W, value: usize, what: &str) -> Result<()> {
    let value = i32::try_from(value).map_err(|_| ContainerError::Encode {
        what: what.to_string(),
        reason: format!("{value} does not fit in a 32-bit signed integer"),
    })?;
    writer.write_i32::<LE>(value)?;
    Ok(())
}

/// Read an `i32` count/size field. Negative values are malformed.
pub fn read_i32_len<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let value = reader.read_i32::<LE>()?;
    usize::try_from(value)
        .map_err(|_| ContainerError::format(STREAM, format!("negative {what}: {value}")))
}

/// Write `items.len()` as an `i32` followed by each item.
pub fn write_count_prefixed<W, T, F>(writer: &mut W, items: &[T], mut write_item: F) -> Result<()>
where
    W: Write,
    F: FnMut(&mut W, &T) -> Result<()>,
{
    write_i32_len(writer, items.len(), "item count")?;
    for item in items {
        write_item(writer, item)?;
    }
    Ok(())
}

/// Read an `i32` count followed by that many items.
pub fn read_count_prefixed<R, T, F>(reader: &mut R, mut read_item: F) -> Result<Vec<T>>
where
    R: Read,
    F: FnMut(&mut R) -> Result<T>,
{
    let count = read_i32_len(reader, "item count")?;
    // Cap the preallocation, the count is untrusted.
    let mut items = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        items.push(read_item(reader)?);
    }
    Ok(items)
}

/// Write an ASCII string followed by a NUL byte.
pub fn write_ascii_null<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    if !value.is_ascii() || value.contains('\0') {
        return Err(ContainerError::Encode {
            what: format!("'{value}'"),
            reason: "ASCII strings must not contain non-ASCII or NUL characters".to_string(),
        });
    }
    writer.write_all(value.as_bytes())?;
    writer.write_u8(0)?;
    Ok(())
}

/// Read bytes up to (and consuming) a NUL terminator as an ASCII string.
pub fn read_ascii_null<R: Read>(reader: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let b = reader.read_u8()?;
        if b == 0 {
            break;
        }
        if !b.is_ascii() {
            return Err(ContainerError::format(
                STREAM,
                format!("non-ASCII byte 0x{b:02x} in ASCII string"),
            ));
        }
        if bytes.len() >= MAX_STRING_LEN {
            return Err(ContainerError::format(STREAM, "unterminated ASCII string"));
        }
        bytes.push(b);
    }
    // Every byte was checked to be ASCII above.
    Ok(bytes.into_iter().map(char::from).collect())
}

/// Write a length-prefixed unicode string (UTF-16LE, NUL-terminated, the
/// prefix counts code units including the terminator).
pub fn write_unicode<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let units: Vec<u16> = value.encode_utf16().collect();
    write_i32_len(writer, units.len() + 1, "unicode string length")?;
    for unit in units {
        writer.write_u16::<LE>(unit)?;
    }
    writer.write_u16::<LE>(0)?;
    Ok(())
}

/// Read a string written by [`write_unicode`].
pub fn read_unicode<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_i32_len(reader, "unicode string length")?;
    if len == 0 || len > MAX_STRING_LEN {
        return Err(ContainerError::format(
            STREAM,
            format!("invalid unicode string length {len}"),
        ));
    }
    let mut units = Vec::with_capacity(len);
    for _ in 0..len {
        units.push(reader.read_u16::<LE>()?);
    }
    if units.pop() != Some(0) {
        return Err(ContainerError::format(
            STREAM,
            "unicode string is missing its NUL terminator",
        ));
    }
    String::from_utf16(&units)
        .map_err(|e| ContainerError::format(STREAM, format!("invalid UTF-16 string: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let mut buf = Vec::new();
        write_header(&mut buf, b"CTMD", 1).unwrap();
        assert_eq!(buf, b"CTMD\x01");

        let version = read_header(&mut Cursor::new(&buf), b"CTMD").unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_bad_magic() {
        let err = read_magic(&mut Cursor::new(b"MD5X"), b"MD5T").unwrap_err();
        assert!(matches!(err, ContainerError::Format { .. }));
    }

    #[test]
    fn test_ascii_null_layout() {
        let mut buf = Vec::new();
        write_ascii_null(&mut buf, "b/c.txt").unwrap();
        assert_eq!(buf, b"b/c.txt\0");
        assert_eq!(read_ascii_null(&mut Cursor::new(&buf)).unwrap(), "b/c.txt");
    }

    #[test]
    fn test_ascii_rejects_unicode() {
        let mut buf = Vec::new();
        assert!(write_ascii_null(&mut buf, "caf\u{e9}.txt").is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_unicode_layout() {
        let mut buf = Vec::new();
        write_unicode(&mut buf, "ab").unwrap();
        // 3 units (a, b, NUL) as i32, then UTF-16LE
        assert_eq!(buf, [3, 0, 0, 0, b'a', 0, b'b', 0, 0, 0]);
    }

    #[test]
    fn test_unicode_missing_terminator() {
        let buf = [2u8, 0, 0, 0, b'a', 0, b'b', 0];
        let err = read_unicode(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, ContainerError::Format { .. }));
    }

    #[test]
    fn test_truncated_count_prefixed() {
        let mut buf = Vec::new();
        write_count_prefixed(&mut buf, &[1i32, 2, 3], |w, v| {
            w.write_i32::<LE>(*v)?;
            Ok(())
        })
        .unwrap();
        buf.truncate(buf.len() - 2);

        let err = read_count_prefixed(&mut Cursor::new(&buf), |r| Ok(r.read_i32::<LE>()?))
            .unwrap_err()
            .within("TEST");
        match err {
            ContainerError::Format { container, .. } => assert_eq!(container, "TEST"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_negative_count() {
        let buf = (-1i32).to_le_bytes();
        let err = read_count_prefixed(&mut Cursor::new(&buf), |r| Ok(r.read_u8()?)).unwrap_err();
        assert!(matches!(err, ContainerError::Format { .. }));
    }

    proptest! {
        #[test]
        fn prop_unicode_names_survive(name in "[^\u{0}]{0,64}") {
            let mut buf = Vec::new();
            write_unicode(&mut buf, &name).unwrap();
            let read = read_unicode(&mut Cursor::new(&buf)).unwrap();
            prop_assert_eq!(read, name);
        }

        #[test]
        fn prop_ascii_names_survive(name in "[ -~]{0,64}") {
            let mut buf = Vec::new();
            write_ascii_null(&mut buf, &name).unwrap();
            prop_assert_eq!(buf.len(), name.len() + 1);
            let read = read_ascii_null(&mut Cursor::new(&buf)).unwrap();
            prop_assert_eq!(read, name);
        }
    }
}
