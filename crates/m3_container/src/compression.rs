//! Block compression seam.
//!
//! Containers treat compression as an opaque primitive:
//! `compress(bytes) -> bytes` and `decompress(bytes, expected_size) -> bytes`.
//! [`Lzma`] is the implementation used by shipped packages; it produces the
//! `.lzma` "alone" framing (5 property bytes followed by the 8-byte unpacked
//! size) that the game tooling expects.

use crate::error::{ContainerError, Result};

/// A whole-buffer compression primitive.
///
/// Implementations must be deterministic for a given input so that rebuilding
/// a container from unchanged inputs yields identical bytes.
pub trait BlockCompressor: Send + Sync {
    /// Compress `data` into a self-contained block.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress a block produced by [`compress`](Self::compress).
    ///
    /// `expected_size` is the exact decompressed length; a block that inflates
    /// to any other length is an error.
    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>>;
}

/// LZMA compression backed by `lzma-rs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lzma;

impl BlockCompressor for Lzma {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let options = lzma_rs::compress::Options {
            unpacked_size: lzma_rs::compress::UnpackedSize::WriteToHeader(Some(data.len() as u64)),
        };
        let mut output = Vec::with_capacity(data.len() / 2 + 16);
        lzma_rs::lzma_compress_with_options(&mut &data[..], &mut output, &options)
            .map_err(|e| ContainerError::Compression(e.to_string()))?;
        Ok(output)
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        let options = lzma_rs::decompress::Options {
            unpacked_size: lzma_rs::decompress::UnpackedSize::ReadHeaderButUseProvided(Some(
                expected_size as u64,
            )),
            ..Default::default()
        };
        let mut output = Vec::with_capacity(expected_size);
        lzma_rs::lzma_decompress_with_options(&mut &data[..], &mut output, &options)
            .map_err(|e| ContainerError::Compression(e.to_string()))?;

        if output.len() != expected_size {
            return Err(ContainerError::Compression(format!(
                "decompressed {} bytes, expected {}",
                output.len(),
                expected_size
            )));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lzma_round_trip() {
        let data = b"<TlkFile><String id=\"1\">Shepard</String></TlkFile>".repeat(20);
        let compressed = Lzma.compress(&data).unwrap();
        let decompressed = Lzma.decompress(&compressed, data.len()).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_lzma_empty() {
        let compressed = Lzma.compress(&[]).unwrap();
        assert!(Lzma.decompress(&compressed, 0).unwrap().is_empty());
    }

    #[test]
    fn test_lzma_garbage_input() {
        let err = Lzma.decompress(&[0xFF; 8], 10).unwrap_err();
        assert!(matches!(err, ContainerError::Compression(_)));
    }
}
