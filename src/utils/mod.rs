//! Shared helpers: framework ciphers, decompression and text decoding.

pub mod crypto;
pub mod decompress;
pub mod quicklz;

use widestring::U16String;

use crate::Result;

fn utf16_units(bytes: &[u8]) -> U16String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect::<Vec<_>>();
    U16String::from_vec(units)
}

/// Decode UTF-16LE bytes, rejecting unpaired surrogates.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for invalid UTF-16.
pub fn decode_utf16le(bytes: &[u8]) -> Result<String> {
    utf16_units(bytes)
        .to_string()
        .map_err(|error| malformed_error!("Invalid UTF-16 string: {}", error))
}

/// Decode UTF-16LE bytes, replacing invalid sequences with U+FFFD the way `Encoding.Unicode`
/// does. A trailing odd byte is ignored.
#[must_use]
pub fn decode_utf16le_lossy(bytes: &[u8]) -> String {
    utf16_units(bytes).to_string_lossy()
}

/// Decode ISO-8859-1 bytes, every byte maps to the code point of the same value.
#[must_use]
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_decoding() {
        assert_eq!(decode_utf16le(&[0x41, 0x00, 0xE4, 0x00]).unwrap(), "Aä");
        assert!(decode_utf16le(&[0x00, 0xD8]).is_err());
        assert_eq!(decode_utf16le_lossy(&[0x00, 0xD8, 0x42, 0x00]), "\u{FFFD}B");
    }

    #[test]
    fn latin1_decoding() {
        assert_eq!(decode_latin1(&[0x48, 0xE9, 0xFF]), "Héÿ");
    }
}
