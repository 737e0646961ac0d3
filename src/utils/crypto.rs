//! Block cipher and hash helpers shared by the resource decrypters.
//!
//! Every product that encrypts resources with a framework cipher uses `DESCryptoServiceProvider`
//! or `RijndaelManaged` with their defaults: CBC mode and PKCS#7 padding. The helpers here
//! mirror that configuration on top of the RustCrypto crates.

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};
use des::Des;
use sha1::{Digest, Sha1};

use crate::{Error::DecryptionFailed, Result};

type DesCbcEnc = Encryptor<Des>;
type DesCbcDec = Decryptor<Des>;

fn decrypt_padded<D: BlockDecryptMut + KeyIvInit>(
    key: &[u8],
    iv: &[u8],
    data: &[u8],
) -> Result<Vec<u8>> {
    let cipher = D::new_from_slices(key, iv)
        .map_err(|_| DecryptionFailed(format!("Invalid key or IV length {}/{}", key.len(), iv.len())))?;
    let mut buf = data.to_vec();
    let result = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| DecryptionFailed("Invalid padding".to_string()))?;
    Ok(result.to_vec())
}

fn encrypt_padded<E: BlockEncryptMut + KeyIvInit>(
    key: &[u8],
    iv: &[u8],
    data: &[u8],
    block_size: usize,
) -> Result<Vec<u8>> {
    let cipher = E::new_from_slices(key, iv)
        .map_err(|_| DecryptionFailed(format!("Invalid key or IV length {}/{}", key.len(), iv.len())))?;
    let padded_len = ((data.len() / block_size) + 1) * block_size;
    let mut buf = vec![0u8; padded_len];
    buf[..data.len()].copy_from_slice(data);
    let result = cipher
        .encrypt_padded_mut::<Pkcs7>(&mut buf, data.len())
        .map_err(|_| DecryptionFailed("Padding failed".to_string()))?;
    Ok(result.to_vec())
}

/// DES-CBC decryption with PKCS#7 padding.
///
/// # Errors
/// Returns [`crate::Error::DecryptionFailed`] if key or IV are not 8 bytes or the padding is invalid.
pub fn des_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    decrypt_padded::<DesCbcDec>(key, iv, data)
}

/// DES-CBC encryption with PKCS#7 padding.
///
/// # Errors
/// Returns [`crate::Error::DecryptionFailed`] if key or IV are not 8 bytes.
pub fn des_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    encrypt_padded::<DesCbcEnc>(key, iv, data, 8)
}

/// AES-CBC decryption with PKCS#7 padding, the key size selects AES-128/192/256.
///
/// # Errors
/// Returns [`crate::Error::DecryptionFailed`] for unsupported key sizes, an IV that is not
/// 16 bytes or invalid padding.
pub fn aes_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    match key.len() {
        16 => decrypt_padded::<Decryptor<Aes128>>(key, iv, data),
        24 => decrypt_padded::<Decryptor<Aes192>>(key, iv, data),
        32 => decrypt_padded::<Decryptor<Aes256>>(key, iv, data),
        len => Err(DecryptionFailed(format!("Unsupported AES key size {len}"))),
    }
}

/// AES-CBC encryption with PKCS#7 padding, the key size selects AES-128/192/256.
///
/// # Errors
/// Returns [`crate::Error::DecryptionFailed`] for unsupported key sizes or an IV that is not
/// 16 bytes.
pub fn aes_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    match key.len() {
        16 => encrypt_padded::<Encryptor<Aes128>>(key, iv, data, 16),
        24 => encrypt_padded::<Encryptor<Aes192>>(key, iv, data, 16),
        32 => encrypt_padded::<Encryptor<Aes256>>(key, iv, data, 16),
        len => Err(DecryptionFailed(format!("Unsupported AES key size {len}"))),
    }
}

/// Computes the SHA-1 digest of `data`.
#[must_use]
pub fn compute_sha1(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Derives the 8 byte public key token of a strong-named assembly from its public key.
///
/// The token is the last 8 bytes of the SHA-1 of the public key, in reverse order.
#[must_use]
pub fn public_key_token(public_key: &[u8]) -> [u8; 8] {
    let hash = compute_sha1(public_key);
    let mut token = [0u8; 8];
    for (dst, src) in token.iter_mut().zip(hash.iter().rev()) {
        *dst = *src;
    }
    token
}
