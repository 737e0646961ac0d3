//! .NET Reactor v4 strings.
//!
//! Older builds keep `(length, UTF-16LE)` records directly in the decrypted strings resource.
//! Builds with a second AES key store only a locator in the resource. The locator is a file
//! offset up to 3.7 and an RVA from 3.8 on, and points at an i32 length prefixed AES blob.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    file::{io::read_le_at, Image},
    utils::{crypto::aes_decrypt, decode_utf16le_lossy},
    Result,
};

/// How keyed strings are located in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringLocator {
    /// Version 3.7 and earlier: the resource holds file offsets
    FileOffset,
    /// Version 3.8 and later: the resource holds RVAs
    Rva,
}

#[derive(Debug, Clone)]
struct StringKey {
    key: Vec<u8>,
    iv: Vec<u8>,
    locator: StringLocator,
}

/// Strings of one .NET Reactor string decrypter method.
#[derive(Debug, Clone)]
pub struct ReactorStringDecrypter {
    data: Vec<u8>,
    key: Option<StringKey>,
}

impl ReactorStringDecrypter {
    /// Create a decrypter over the decrypted strings resource.
    #[must_use]
    pub fn new(data: Vec<u8>) -> ReactorStringDecrypter {
        ReactorStringDecrypter { data, key: None }
    }

    /// Set the AES key and IV of a decrypter method that encrypts every string separately.
    #[must_use]
    pub fn with_key(mut self, key: &[u8], iv: &[u8], locator: StringLocator) -> ReactorStringDecrypter {
        self.key = Some(StringKey {
            key: key.to_vec(),
            iv: iv.to_vec(),
            locator,
        });
        self
    }

    /// Decrypt the string at `offset` of the resource.
    ///
    /// `image` is only read by decrypters with a key.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] or [`crate::Error::Malformed`] if a record or its
    /// blob lies outside the data, and [`crate::Error::DecryptionFailed`] for a bad blob.
    pub fn decrypt<I: Image + ?Sized>(&self, image: &I, offset: usize) -> Result<String> {
        let mut position = offset;
        let Some(key) = &self.key else {
            let length = read_length(&self.data, &mut position)?;
            let end = position.checked_add(length).ok_or(out_of_bounds_error!())?;
            let bytes = self.data.get(position..end).ok_or(out_of_bounds_error!())?;
            return Ok(decode_utf16le_lossy(bytes));
        };

        let locator = read_le_at::<u32>(&self.data, &mut position)?;
        let mut blob = match key.locator {
            StringLocator::FileOffset => locator as usize,
            StringLocator::Rva => image.rva_to_offset(locator)?,
        };
        let length = read_length(image.data(), &mut blob)?;
        let encrypted = image.slice_at_offset(blob, length)?;
        Ok(decode_utf16le_lossy(&aes_decrypt(&key.key, &key.iv, encrypted)?))
    }
}

fn read_length(data: &[u8], offset: &mut usize) -> Result<usize> {
    let length = read_le_at::<i32>(data, offset)?;
    usize::try_from(length).map_err(|_| malformed_error!("Invalid string length {}", length))
}

/// Decode a string passed through the Base64 string decrypter.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `s` is not valid Base64.
///
/// # Examples
///
/// ```rust
/// use dotunpack::deobfuscation::obfuscators::reactor::decrypt_base64;
///
/// assert_eq!(decrypt_base64("SABpAA==")?, "Hi");
/// # Ok::<(), dotunpack::Error>(())
/// ```
pub fn decrypt_base64(s: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(s)
        .map_err(|error| malformed_error!("Invalid Base64 string: {}", error))?;
    Ok(decode_utf16le_lossy(&bytes))
}
