//! AES encrypted .NET Reactor resources.
//!
//! Methods data, strings and merged resources all sit in embedded resources encrypted with
//! AES-256-CBC. Key and IV are static byte arrays in the decrypter method. Some versions
//! reverse the IV at runtime, others interleave the assembly's public key token into it.

use crate::{
    deobfuscation::obfuscators::ResourceDecrypter,
    utils::{
        crypto::{aes_decrypt, aes_encrypt},
        quicklz::decompress_quicklz,
    },
    Result,
};

/// Length of the AES key.
pub const KEY_LENGTH: usize = 32;
/// Length of the AES IV.
pub const IV_LENGTH: usize = 16;

/// Key material of an encrypted .NET Reactor resource.
///
/// # Examples
///
/// ```rust
/// use dotunpack::deobfuscation::obfuscators::{reactor::EncryptedResource, ResourceDecrypter};
///
/// let resource = EncryptedResource::new(&[7; 32], &[1; 16])?.reverse_iv();
/// let encrypted = resource.encrypt(b"methods data")?;
/// assert_eq!(resource.decrypt(&encrypted)?, b"methods data");
/// # Ok::<(), dotunpack::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedResource {
    key: [u8; KEY_LENGTH],
    iv: [u8; IV_LENGTH],
}

impl EncryptedResource {
    /// Create the key material from the arrays found in the decrypter method.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if `key` is not 32 or `iv` not 16 bytes long.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<EncryptedResource> {
        let key = <[u8; KEY_LENGTH]>::try_from(key)
            .map_err(|_| invalid_argument!("Invalid resource decrypter key length {}", key.len()))?;
        let iv = <[u8; IV_LENGTH]>::try_from(iv)
            .map_err(|_| invalid_argument!("Invalid resource decrypter IV length {}", iv.len()))?;
        Ok(EncryptedResource { key, iv })
    }

    /// Reverse the IV, for decrypter methods that call `Array.Reverse` on it.
    #[must_use]
    pub fn reverse_iv(mut self) -> EncryptedResource {
        self.iv.reverse();
        self
    }

    /// Store the public key token in the odd bytes of the IV.
    ///
    /// A token shorter than 8 bytes, as found in unsigned assemblies, leaves the IV alone.
    #[must_use]
    pub fn with_public_key_token(mut self, public_key_token: &[u8]) -> EncryptedResource {
        if let Some(token) = public_key_token.get(..8) {
            for (i, &b) in token.iter().enumerate() {
                self.iv[i * 2 + 1] = b;
            }
        }
        self
    }

    /// The AES key.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The effective AES IV.
    #[must_use]
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Encrypt `data` the way the protector does, used when writing resources back.
    ///
    /// # Errors
    /// Only fails if the cipher cannot be set up.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        aes_encrypt(&self.key, &self.iv, data)
    }

    /// Decrypt a merged resources blob, which is QuickLZ compressed after decryption.
    ///
    /// # Errors
    /// Returns the errors of [`ResourceDecrypter::decrypt`] and
    /// [`decompress_quicklz`].
    pub fn decrypt_compressed(&self, data: &[u8]) -> Result<Vec<u8>> {
        decompress_quicklz(&self.decrypt(data)?)
    }
}

impl ResourceDecrypter for EncryptedResource {
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        aes_decrypt(&self.key, &self.iv, data)
    }
}
