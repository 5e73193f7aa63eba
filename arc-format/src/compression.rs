use std::fmt;
use std::io::{Read, Write};

#[cfg(feature = "zstd")]
use comde::zstd::ZstdDecompressor;
use comde::{stored::StoredDecompressor, Decompressor};

use crate::error::CorruptBlockError;

#[derive(Clone, Copy, Eq, PartialEq)]
pub enum Compression {
    Stored,
    Zstd,
}

impl Default for Compression {
    fn default() -> Self {
        Self::Stored
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Compression::Stored => "stored",
            Compression::Zstd => "Zstandard",
        };

        write!(f, "{}", s)
    }
}

impl fmt::Debug for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Compression {
    pub fn decompress_write<R: Read, W: Write>(self, reader: R, writer: W) -> std::io::Result<()> {
        match self {
            Compression::Stored => StoredDecompressor.copy(reader, writer),
            #[cfg(feature = "zstd")]
            Compression::Zstd => ZstdDecompressor.copy(reader, writer),
            #[allow(unreachable_patterns)]
            missing => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Compiled without support for {:?}", missing),
            )),
        }?;

        Ok(())
    }
}

/// Turns one stored block into exactly `size` bytes.
///
/// The archive reader holds one of these so that tests can observe or replace
/// the codec.
pub trait BlockDecompressor {
    fn decompress(
        &self,
        reader: &mut dyn Read,
        compressed_size: u64,
        size: u64,
    ) -> Result<Vec<u8>, CorruptBlockError>;
}

/// Largest expansion assumed when reserving output space up front. Blocks
/// that inflate further grow the buffer as they decode.
const RESERVE_RATIO: u64 = 32;

/// Zstandard via `comde`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdBlocks;

impl BlockDecompressor for ZstdBlocks {
    fn decompress(
        &self,
        reader: &mut dyn Read,
        compressed_size: u64,
        size: u64,
    ) -> Result<Vec<u8>, CorruptBlockError> {
        if !cfg!(feature = "zstd") {
            return Err(CorruptBlockError::Unsupported);
        }

        let reserve = size.min(compressed_size.saturating_mul(RESERVE_RATIO));
        let mut out = Vec::with_capacity(reserve as usize);
        Compression::Zstd
            .decompress_write(Read::take(&mut *reader, compressed_size), &mut out)
            .map_err(CorruptBlockError::Codec)?;

        if out.len() as u64 != size {
            return Err(CorruptBlockError::SizeMismatch {
                expected: size,
                actual: out.len() as u64,
            });
        }

        Ok(out)
    }
}

#[cfg(all(test, feature = "zstd"))]
mod tests {
    use std::io::Cursor;

    use comde::zstd::ZstdCompressor;
    use comde::Compressor;

    use super::*;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        ZstdCompressor
            .compress(&mut out, &mut Cursor::new(data))
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn zstd_block() {
        let data = b"fighter/mario/model/body/c00/model.numdlb".repeat(8);
        let packed = compress(&data);
        let out = ZstdBlocks
            .decompress(&mut Cursor::new(&packed), packed.len() as u64, data.len() as u64)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn wrong_size_is_corrupt() {
        let data = vec![7u8; 100];
        let packed = compress(&data);
        let result = ZstdBlocks.decompress(&mut Cursor::new(&packed), packed.len() as u64, 99);
        assert!(matches!(
            result,
            Err(CorruptBlockError::SizeMismatch {
                expected: 99,
                actual: 100
            })
        ));
    }

    #[test]
    fn oversized_declared_size_is_corrupt() {
        let data = vec![7u8; 100];
        let packed = compress(&data);
        let result = ZstdBlocks.decompress(
            &mut Cursor::new(&packed),
            packed.len() as u64,
            u32::MAX as u64,
        );
        assert!(matches!(
            result,
            Err(CorruptBlockError::SizeMismatch {
                expected: 0xFFFF_FFFF,
                actual: 100
            })
        ));
    }

    #[test]
    fn stored_copy() {
        let mut out = Vec::new();
        Compression::Stored
            .decompress_write(&b"model.numdlb"[..], &mut out)
            .unwrap();
        assert_eq!(out, b"model.numdlb");
    }

    #[test]
    fn garbage_is_corrupt() {
        let junk = [0x55u8; 32];
        let result = ZstdBlocks.decompress(&mut Cursor::new(&junk[..]), 32, 64);
        assert!(matches!(result, Err(CorruptBlockError::Codec(_))));
    }
}
