//! Crypto Obfuscator strings.
//!
//! Strings are addressed by their byte offset in the decrypted resource. Each one is a packed
//! byte length followed by UTF-16LE text.

use crate::{file::parser::Parser, utils::decode_utf16le_lossy, Result};

/// The decrypted string resource.
#[derive(Debug, Clone, Default)]
pub struct CoStringDecrypter {
    data: Vec<u8>,
}

impl CoStringDecrypter {
    /// Wrap the decrypted resource.
    #[must_use]
    pub fn new(decrypted: Vec<u8>) -> CoStringDecrypter {
        CoStringDecrypter { data: decrypted }
    }

    /// The string at byte `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the string runs past the end of the resource.
    pub fn decrypt(&self, offset: usize) -> Result<String> {
        let mut parser = Parser::new(&self.data);
        parser.seek(offset)?;
        let length = parser.read_variable_length_uint()? as usize;
        Ok(decode_utf16le_lossy(parser.read_bytes(length)?))
    }
}
