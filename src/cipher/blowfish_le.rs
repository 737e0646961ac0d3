//! Little-endian Blowfish, the block cipher behind MaxtoCode encryption type 7.
//!
//! MaxtoCode feeds Blowfish a 100 byte key, well above the 56 byte limit of the standard
//! `KeyInit` constructor, so the key schedule is driven through the `bcrypt` expansion API of
//! the `blowfish` crate, which accepts keys of any length.

use blowfish::{
    cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt},
    BlowfishLE,
};

/// Length of the key derived from a MaxtoCode key blob.
pub const KEY_LENGTH: usize = 100;

/// Blowfish with both block halves read as little-endian words.
///
/// Only whole 8 byte blocks are processed, a trailing partial block is left untouched.
///
/// # Examples
///
/// ```rust
/// use dotunpack::cipher::LeBlowfish;
///
/// let cipher = LeBlowfish::new(b"a long key, longer than 56 bytes is fine because the schedule cycles");
/// let mut data = *b"0123456789";
/// cipher.encrypt(&mut data);
/// assert_eq!(&data[8..], b"89");
/// cipher.decrypt(&mut data);
/// assert_eq!(&data, b"0123456789");
/// ```
#[derive(Clone)]
pub struct LeBlowfish {
    cipher: BlowfishLE,
}

impl LeBlowfish {
    /// Run the Blowfish key schedule over `key`.
    #[must_use]
    pub fn new(key: &[u8]) -> Self {
        let mut cipher = BlowfishLE::bc_init_state();
        cipher.bc_expand_key(key);
        LeBlowfish { cipher }
    }

    /// Derive the MaxtoCode key from the start of a key blob: the bytes up to the first NUL,
    /// zero padded to [`KEY_LENGTH`], with the last byte always zero.
    #[must_use]
    pub fn derive_key(blob: &[u8]) -> [u8; KEY_LENGTH] {
        let mut key = [0u8; KEY_LENGTH];
        for (dst, &src) in key.iter_mut().zip(blob.iter().take_while(|&&b| b != 0)) {
            *dst = src;
        }
        key[KEY_LENGTH - 1] = 0;
        key
    }

    /// Create a cipher keyed from a MaxtoCode key blob, see [`LeBlowfish::derive_key`].
    #[must_use]
    pub fn from_key_blob(blob: &[u8]) -> Self {
        Self::new(&Self::derive_key(blob))
    }

    /// Decrypt all whole blocks of `data` in place.
    pub fn decrypt(&self, data: &mut [u8]) {
        for chunk in data.chunks_exact_mut(8) {
            self.cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
        }
    }

    /// Encrypt all whole blocks of `data` in place.
    pub fn encrypt(&self, data: &mut [u8]) {
        for chunk in data.chunks_exact_mut(8) {
            self.cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
        }
    }
}

impl std::fmt::Debug for LeBlowfish {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeBlowfish").finish_non_exhaustive()
    }
}
