use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::FormatError;
use crate::hash::{HashKey, Int24};

/// Decoded metadata tables are always read from memory.
pub(crate) type TableReader<'a> = Cursor<&'a [u8]>;

pub(crate) trait DeserializeOwned: Sized {
    /// Encoded size of one record in bytes.
    const SIZE: u64;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self>;
}

impl DeserializeOwned for HashKey {
    const SIZE: u64 = 5;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let crc = reader.read_u32::<LittleEndian>()?;
        let len = reader.read_u8()?;
        Ok(HashKey::new(crc, len))
    }
}

impl DeserializeOwned for Int24 {
    const SIZE: u64 = 3;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf)?;
        Ok(Int24::from_le_bytes(buf))
    }
}

impl DeserializeOwned for u32 {
    const SIZE: u64 = 4;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        reader.read_u32::<LittleEndian>()
    }
}

/// Skips the 3 padding bytes that follow most embedded checksums.
#[inline(always)]
pub(crate) fn skip_padding<R: Read>(reader: &mut R) -> std::io::Result<()> {
    reader.read_exact(&mut [0u8; 3])
}

#[inline(always)]
pub(crate) fn remaining(reader: &TableReader<'_>) -> u64 {
    (reader.get_ref().len() as u64).saturating_sub(reader.position())
}

/// Reads a signed 32-bit element count.
pub(crate) fn read_count(
    reader: &mut TableReader<'_>,
    what: &'static str,
) -> Result<usize, FormatError> {
    let count = reader
        .read_i32::<LittleEndian>()
        .map_err(|source| FormatError::Truncated { what, source })?;
    checked_count(reader, count as i64, what)
}

pub(crate) fn checked_count(
    reader: &TableReader<'_>,
    count: i64,
    what: &'static str,
) -> Result<usize, FormatError> {
    if count < 0 {
        return Err(FormatError::InvalidCount {
            what,
            count,
            available: remaining(reader),
        });
    }
    Ok(count as usize)
}

/// Reads `count` consecutive fixed-size records.
pub(crate) fn read_array<T: DeserializeOwned>(
    reader: &mut TableReader<'_>,
    count: usize,
    what: &'static str,
) -> Result<Vec<T>, FormatError> {
    let start = reader.position();
    let available = remaining(reader);

    if (count as u64).saturating_mul(T::SIZE) > available {
        return Err(FormatError::InvalidCount {
            what,
            count: count as i64,
            available,
        });
    }

    let mut buf = Vec::with_capacity(count);
    for _ in 0..count {
        buf.push(
            T::deserialize_owned(reader).map_err(|source| FormatError::Truncated { what, source })?,
        );
    }

    let end = reader.position();
    tracing::debug!(
        start = format_args!("{:#x}", start),
        end = format_args!("{:#x}", end),
        bytes = end - start,
        count,
        "deserialized {}",
        what
    );
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_hash_and_int24() {
        let data = [0x78, 0x56, 0x34, 0x12, 0x09, 0x01, 0x02, 0x03];
        let mut reader = Cursor::new(&data[..]);
        let hash = HashKey::deserialize_owned(&mut reader).unwrap();
        assert_eq!(hash, HashKey::new(0x1234_5678, 9));
        let idx = Int24::deserialize_owned(&mut reader).unwrap();
        assert_eq!(idx.get(), 0x030201);
    }

    #[test]
    fn rejects_negative_count() {
        let data = (-1i32).to_le_bytes();
        let mut reader = Cursor::new(&data[..]);
        assert!(matches!(
            read_count(&mut reader, "things"),
            Err(FormatError::InvalidCount { count: -1, .. })
        ));
    }

    #[test]
    fn rejects_count_past_end() {
        let data = [0u8; 9];
        let mut reader = Cursor::new(&data[..]);
        let result = read_array::<u32>(&mut reader, 3, "words");
        assert!(matches!(
            result,
            Err(FormatError::InvalidCount { available: 9, .. })
        ));

        let mut reader = Cursor::new(&data[..]);
        assert_eq!(read_array::<u32>(&mut reader, 2, "words").unwrap().len(), 2);
        assert_eq!(remaining(&reader), 1);
    }
}
