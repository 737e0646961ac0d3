//! Decompression of obfuscator-embedded payloads.
//!
//! Resource containers of Babel.NET, Crypto Obfuscator and SmartAssembly store their payload as
//! a raw Deflate stream, exactly what `System.IO.Compression.DeflateStream` produces. .NET Reactor
//! uses QuickLZ instead, see [`crate::utils::quicklz`].

use std::io::Read;

use flate2::read::DeflateDecoder;

/// Result type for decompression operations.
pub type DecompressResult<T> = std::result::Result<T, DecompressError>;

/// Error type for decompression operations.
#[derive(Debug)]
pub enum DecompressError {
    /// Deflate decompression failed.
    DeflateError(String),
    /// QuickLZ header or stream is corrupt.
    QuickLzError(String),
    /// Input buffer too small.
    BufferTooSmall,
}

impl std::fmt::Display for DecompressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeflateError(msg) => write!(f, "Deflate decompression error: {msg}"),
            Self::QuickLzError(msg) => write!(f, "QuickLZ decompression error: {msg}"),
            Self::BufferTooSmall => write!(f, "Input buffer too small"),
        }
    }
}

impl std::error::Error for DecompressError {}

/// Decompresses a raw Deflate stream (no zlib or gzip wrapper).
///
/// # Errors
///
/// Returns [`DecompressError::DeflateError`] if the stream is corrupt.
pub fn decompress_deflate(data: &[u8]) -> DecompressResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::new();

    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| DecompressError::DeflateError(e.to_string()))?;

    Ok(decompressed)
}

/// Decompresses a sequence of independently deflated chunks.
///
/// The layout is the one SmartAssembly uses for its "{z}" resources: an `i32` total inflated
/// length, then chunks of (`i32` compressed length, `i32` inflated length, raw Deflate data)
/// until the total length has been produced.
///
/// # Errors
///
/// Returns [`DecompressError::BufferTooSmall`] if a chunk header or body is truncated and
/// [`DecompressError::DeflateError`] for negative lengths or a chunk that does not inflate to
/// its announced size.
pub fn decompress_deflate_chunks(data: &[u8]) -> DecompressResult<Vec<u8>> {
    fn read_length(data: &[u8], offset: &mut usize) -> DecompressResult<usize> {
        let Some(bytes) = data.get(*offset..*offset + 4) else {
            return Err(DecompressError::BufferTooSmall);
        };
        *offset += 4;

        let value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        usize::try_from(value).map_err(|_| DecompressError::DeflateError("Invalid length".into()))
    }

    let mut offset = 0;
    let total = read_length(data, &mut offset)?;
    let mut decompressed = Vec::with_capacity(total);

    while decompressed.len() < total {
        let part_length = read_length(data, &mut offset)?;
        let part_inflated = read_length(data, &mut offset)?;
        let Some(chunk) = data.get(offset..offset + part_length) else {
            return Err(DecompressError::BufferTooSmall);
        };
        offset += part_length;

        let before = decompressed.len();
        let mut decoder = DeflateDecoder::new(chunk);
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| DecompressError::DeflateError(e.to_string()))?;

        if decompressed.len() - before != part_inflated || decompressed.len() > total {
            return Err(DecompressError::DeflateError("Could not inflate".into()));
        }
    }

    Ok(decompressed)
}
