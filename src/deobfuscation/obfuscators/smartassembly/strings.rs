//! SmartAssembly string storage.
//!
//! The decrypted strings resource is a list of length prefixed records. Each record holds the
//! Base64 form of a UTF-8 string. Call sites pass an id that, corrected by the caller's token
//! and a per-assembly offset, is the record's position in the resource.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{file::parser::Parser, Result};

/// Strings of a SmartAssembly protected assembly.
#[derive(Debug, Clone)]
pub struct SaStringDecrypter {
    data: Vec<u8>,
    string_offset: i32,
}

impl SaStringDecrypter {
    /// Create a decrypter over the decrypted strings resource.
    ///
    /// `string_offset` is the constant the decrypter method subtracts from every id, zero for
    /// older versions.
    #[must_use]
    pub fn new(data: Vec<u8>, string_offset: i32) -> SaStringDecrypter {
        SaStringDecrypter {
            data,
            string_offset,
        }
    }

    /// Decrypt the string with `id`, referenced from the method with `token`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if the id resolves to no record, and
    /// [`crate::Error::Malformed`] if the record is truncated or not Base64 encoded UTF-8.
    pub fn decrypt(&self, token: i32, id: i32) -> Result<String> {
        let index = i64::from(id) - i64::from(token & 0x00FF_FFFF) - i64::from(self.string_offset);
        let index = usize::try_from(index)
            .ok()
            .filter(|&index| index < self.data.len())
            .ok_or_else(|| invalid_argument!("Invalid string id {} for token 0x{:08X}", id, token))?;

        let mut parser = Parser::new(&self.data);
        parser.seek(index)?;
        let length = parser.read_compressed_uint()? as usize;
        let encoded = parser.read_bytes(length)?;

        let decoded = STANDARD
            .decode(encoded)
            .map_err(|error| malformed_error!("Invalid Base64 string at {}: {}", index, error))?;
        String::from_utf8(decoded)
            .map_err(|error| malformed_error!("Invalid UTF-8 string at {}: {}", index, error))
    }
}
