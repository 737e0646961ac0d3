//! QuickLZ decompression as used by .NET Reactor.
//!
//! .NET Reactor compresses embedded assemblies and its native stub payloads with QuickLZ level 3
//! and wraps the stream in a 32 byte header:
//!
//! | Offset | Field                               |
//! |--------|-------------------------------------|
//! | 0      | signature `"QCLZ"` (`0x5A4C4351`)   |
//! | 4      | mode                                |
//! | 8      | compressed length, header included  |
//! | 12     | decompressed length                 |
//! | 16     | `1` if the payload is compressed    |
//!
//! The signature is repeated in the last four bytes of the compressed data.
//!
//! # Examples
//!
//! ```rust
//! use dotunpack::utils::quicklz::{decompress_quicklz, is_quicklz};
//!
//! let mut data = vec![0u8; 32];
//! data[0..4].copy_from_slice(b"QCLZ");
//! data[8..12].copy_from_slice(&39i32.to_le_bytes());
//! data[12..16].copy_from_slice(&3i32.to_le_bytes());
//! data.extend_from_slice(b"abcQCLZ");
//!
//! assert!(is_quicklz(&data));
//! assert_eq!(decompress_quicklz(&data)?, b"abc");
//! # Ok::<(), dotunpack::Error>(())
//! ```

use crate::{
    file::io::read_le_at,
    utils::decompress::{DecompressError, DecompressResult},
    Result,
};

/// The `"QCLZ"` signature.
pub const QCLZ_SIG: u32 = 0x5A4C_4351;

const HEADER_LENGTH: usize = 32;

/// Number of literal bytes selected by the low nibble of the control word.
const INDEX_INC: [usize; 16] = [4, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2, 0, 1, 0];

/// Header of a QuickLZ container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickLzHeader {
    /// Compression mode, informational only
    pub mode: i32,
    /// Size of the container including header and trailing signature
    pub compressed_length: usize,
    /// Size of the decompressed payload
    pub decompressed_length: usize,
    /// `false` if the payload is stored verbatim after the header
    pub is_compressed: bool,
}

impl QuickLzHeader {
    /// Parse and validate the container header.
    ///
    /// # Errors
    /// Returns [`crate::Error::Decompress`] if a signature is missing or a length is invalid.
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let sig = read_le_at::<u32>(data, &mut offset)?;
        let mode = read_le_at::<i32>(data, &mut offset)?;
        let compressed_length = read_le_at::<i32>(data, &mut offset)?;
        let decompressed_length = read_le_at::<i32>(data, &mut offset)?;
        let is_compressed = read_le_at::<i32>(data, &mut offset)? == 1;

        let (Ok(compressed_length), Ok(decompressed_length)) = (
            usize::try_from(compressed_length),
            usize::try_from(decompressed_length),
        ) else {
            return Err(quicklz_error("Invalid length").into());
        };

        let trailer = compressed_length
            .checked_sub(4)
            .and_then(|start| data.get(start..compressed_length));
        let trailer_ok = trailer.is_some_and(|bytes| bytes == QCLZ_SIG.to_le_bytes());
        if sig != QCLZ_SIG || !trailer_ok {
            return Err(quicklz_error("No QCLZ sig").into());
        }

        Ok(QuickLzHeader {
            mode,
            compressed_length,
            decompressed_length,
            is_compressed,
        })
    }
}

/// Returns `true` if `data` starts with the QuickLZ signature.
#[must_use]
pub fn is_quicklz(data: &[u8]) -> bool {
    data.get(0..4)
        .is_some_and(|sig| sig == QCLZ_SIG.to_le_bytes())
}

/// Decompress a QuickLZ container.
///
/// # Errors
/// Returns [`crate::Error::Decompress`] for a bad header or a corrupt stream, and
/// [`crate::Error::OutOfBounds`] if the header itself is truncated.
pub fn decompress_quicklz(data: &[u8]) -> Result<Vec<u8>> {
    let header = QuickLzHeader::read(data)?;

    if !header.is_compressed {
        let payload = data
            .get(HEADER_LENGTH..HEADER_LENGTH + header.decompressed_length)
            .ok_or(DecompressError::BufferTooSmall)?;
        return Ok(payload.to_vec());
    }

    let mut out = vec![0u8; header.decompressed_length];
    decompress_stream(data, HEADER_LENGTH, &mut out)?;
    Ok(out)
}

fn quicklz_error(message: &str) -> DecompressError {
    DecompressError::QuickLzError(message.to_string())
}

fn read32(data: &[u8], index: usize) -> DecompressResult<u32> {
    data.get(index..index + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(DecompressError::BufferTooSmall)
}

/// Byte-wise copy within `out`, source and destination may overlap.
fn copy_back(out: &mut [u8], out_index: usize, distance: u32, size: usize) -> DecompressResult<()> {
    let src = out_index
        .checked_sub(distance as usize)
        .ok_or_else(|| quicklz_error("Back reference before start of output"))?;
    if distance == 0 || out_index + size > out.len() {
        return Err(quicklz_error("Back reference out of range"));
    }

    for i in 0..size {
        out[out_index + i] = out[src + i];
    }
    Ok(())
}

fn decompress_stream(data: &[u8], mut in_index: usize, out: &mut [u8]) -> DecompressResult<()> {
    let length = out.len();
    let mut out_index = 0usize;
    let mut control = 1u32;

    if length > 4 {
        loop {
            if control == 1 {
                control = read32(data, in_index)?;
                in_index += 4;
            }

            let fetch = read32(data, in_index)?;
            if control & 1 == 1 {
                control >>= 1;

                if fetch & 3 == 0 {
                    copy_back(out, out_index, (fetch & 0xFF) >> 2, 3)?;
                    out_index += 3;
                    in_index += 1;
                } else if fetch & 2 == 0 {
                    copy_back(out, out_index, (fetch & 0xFFFF) >> 2, 3)?;
                    out_index += 3;
                    in_index += 2;
                } else if fetch & 1 == 0 {
                    let size = ((fetch >> 2) & 0x0F) as usize + 3;
                    copy_back(out, out_index, (fetch & 0xFFFF) >> 6, size)?;
                    out_index += size;
                    in_index += 2;
                } else if fetch & 4 == 0 {
                    let size = ((fetch >> 3) & 0x1F) as usize + 3;
                    copy_back(out, out_index, (fetch & 0x00FF_FFFF) >> 8, size)?;
                    out_index += size;
                    in_index += 3;
                } else if fetch & 8 == 0 {
                    let size = ((fetch >> 4) & 0x07FF) as usize + 3;
                    copy_back(out, out_index, fetch >> 15, size)?;
                    out_index += size;
                    in_index += 4;
                } else {
                    // Run of a single byte
                    let value = (fetch >> 16) as u8;
                    let size = ((fetch >> 4) & 0x0FFF) as usize;
                    let run = out
                        .get_mut(out_index..out_index + size)
                        .ok_or_else(|| quicklz_error("Run exceeds output"))?;
                    run.fill(value);
                    out_index += size;
                    in_index += 3;
                }
            } else {
                let literals = data
                    .get(in_index..in_index + 4)
                    .ok_or(DecompressError::BufferTooSmall)?;
                let dest = out
                    .get_mut(out_index..out_index + 4)
                    .ok_or_else(|| quicklz_error("Literal run exceeds output"))?;
                dest.copy_from_slice(literals);

                let step = INDEX_INC[(control & 0x0F) as usize];
                out_index += step;
                in_index += step;
                control >>= step;

                if out_index >= length - 4 {
                    break;
                }
            }
        }
    }

    while out_index < length {
        if control == 1 {
            in_index += 4;
            control = 0x8000_0000;
        }
        out[out_index] = *data.get(in_index).ok_or(DecompressError::BufferTooSmall)?;
        out_index += 1;
        in_index += 1;
        control >>= 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn container(payload: &[u8], decompressed_length: usize, compressed: bool) -> Vec<u8> {
        let total = HEADER_LENGTH + payload.len() + 4;
        let mut data = vec![0u8; HEADER_LENGTH];
        data[0..4].copy_from_slice(&QCLZ_SIG.to_le_bytes());
        data[4..8].copy_from_slice(&3i32.to_le_bytes());
        data[8..12].copy_from_slice(&(total as i32).to_le_bytes());
        data[12..16].copy_from_slice(&(decompressed_length as i32).to_le_bytes());
        data[16..20].copy_from_slice(&i32::from(compressed).to_le_bytes());
        data.extend_from_slice(payload);
        data.extend_from_slice(&QCLZ_SIG.to_le_bytes());
        data
    }

    #[test]
    fn uncompressed_mode() {
        let data = container(b"stored verbatim", 15, false);
        assert_eq!(decompress_quicklz(&data).unwrap(), b"stored verbatim");
    }

    #[test]
    fn literal_run() {
        let mut payload = 0x8000_0000u32.to_le_bytes().to_vec();
        payload.extend_from_slice(b"ABCDEFGHIJ");

        let data = container(&payload, 10, true);
        assert_eq!(decompress_quicklz(&data).unwrap(), b"ABCDEFGHIJ");
    }

    #[test]
    fn back_reference() {
        // Control bits: 4 literals, a short match (distance 4, 3 bytes), 4 literals, sentinel.
        let mut payload = (0x8000_0000u32 | 0x10).to_le_bytes().to_vec();
        payload.extend_from_slice(b"abcd");
        payload.push(4 << 2);
        payload.extend_from_slice(b"wxyz");
        payload.extend_from_slice(b"123");

        let data = container(&payload, 14, true);
        assert_eq!(decompress_quicklz(&data).unwrap(), b"abcdabcwxyz123");
    }

    #[test]
    fn missing_signature() {
        let mut data = container(b"abc", 3, false);
        let len = data.len();
        data[len - 1] = 0;
        assert!(matches!(
            decompress_quicklz(&data),
            Err(Error::Decompress(DecompressError::QuickLzError(_)))
        ));
        assert!(!is_quicklz(&[0x51, 0x43]));
    }
}
