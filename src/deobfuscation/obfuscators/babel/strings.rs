//! Babel.NET string table.
//!
//! The decrypted resource is a plain run of `BinaryWriter` strings. Protected code passes the
//! byte offset of the string it wants.

use std::collections::HashMap;

use crate::{file::parser::Parser, Result};

/// Strings of a decrypted Babel.NET string resource, keyed by byte offset.
#[derive(Debug, Clone, Default)]
pub struct BabelStringDecrypter {
    strings: HashMap<usize, String>,
}

impl BabelStringDecrypter {
    /// Parse the decrypted resource.
    ///
    /// # Errors
    /// Returns an error if a string is truncated or not valid UTF-8.
    pub fn new(decrypted: &[u8]) -> Result<BabelStringDecrypter> {
        let mut parser = Parser::new(decrypted);
        let mut strings = HashMap::new();
        while parser.has_more_data() {
            let offset = parser.pos();
            strings.insert(offset, parser.read_prefixed_string_utf8()?);
        }

        log::debug!("Read {} Babel.NET strings", strings.len());
        Ok(BabelStringDecrypter { strings })
    }

    /// The string starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if no string starts there.
    pub fn decrypt(&self, offset: usize) -> Result<&str> {
        self.strings
            .get(&offset)
            .map(String::as_str)
            .ok_or_else(|| invalid_argument!("No string at offset {}", offset))
    }

    /// Number of strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns `true` if the resource held no strings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
