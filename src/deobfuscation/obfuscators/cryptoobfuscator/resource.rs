//! Crypto Obfuscator resource envelopes.
//!
//! The first byte of a protected resource is a set of stage flags. Stages run in a fixed order:
//! DES, then raw inflate, then bitwise complement. The bit values vary between releases, see
//! [`ResourceFlags`].

use crate::{
    deobfuscation::{config::ResourceFlags, obfuscators::ResourceDecrypter},
    utils::{crypto::des_decrypt, decompress::decompress_deflate},
    Result,
};

/// Decrypter for Crypto Obfuscator resources.
///
/// # Examples
///
/// ```rust
/// use dotunpack::deobfuscation::obfuscators::{
///     cryptoobfuscator::CoResourceDecrypter, ResourceDecrypter,
/// };
///
/// // complement only
/// let decrypter = CoResourceDecrypter::new(None);
/// assert_eq!(decrypter.decrypt(&[4, 0xFE, 0xFD])?, vec![1, 2]);
/// # Ok::<(), dotunpack::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct CoResourceDecrypter {
    public_key_token: Option<Vec<u8>>,
    flags: ResourceFlags,
}

impl CoResourceDecrypter {
    /// Create a decrypter with the default flag bits. `public_key_token` is used when a
    /// resource stores an all-zero DES key.
    #[must_use]
    pub fn new(public_key_token: Option<&[u8]>) -> CoResourceDecrypter {
        CoResourceDecrypter {
            public_key_token: public_key_token.map(<[u8]>::to_vec),
            flags: ResourceFlags::default(),
        }
    }

    /// Use other flag bits.
    #[must_use]
    pub fn with_flags(mut self, flags: ResourceFlags) -> CoResourceDecrypter {
        self.flags = flags;
        self
    }

    fn key<'a>(&'a self, key: &'a [u8]) -> Result<&'a [u8]> {
        if key.iter().any(|&b| b != 0) {
            return Ok(key);
        }
        self.public_key_token
            .as_deref()
            .ok_or_else(|| invalid_argument!("PublicKeyToken is null, can't decrypt resources"))
    }
}

impl ResourceDecrypter for CoResourceDecrypter {
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let (&flags, payload) = data.split_first().ok_or(crate::Error::Empty)?;
        if flags & !self.flags.known() != 0 {
            log::warn!("Found unknown resource encryption flags: 0x{:02X}", flags);
        }

        let mut current = payload.to_vec();
        if flags & self.flags.des != 0 {
            let iv = current.get(..8).ok_or(out_of_bounds_error!())?;
            let key = current.get(8..16).ok_or(out_of_bounds_error!())?;
            current = des_decrypt(self.key(key)?, iv, &current[16..])?;
        }
        if flags & self.flags.deflate != 0 {
            current = decompress_deflate(&current)?;
        }
        if flags & self.flags.bitwise_not != 0 {
            current.iter_mut().for_each(|b| *b = !*b);
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::DeflateEncoder, Compression};

    use super::*;
    use crate::utils::crypto::des_encrypt;

    const PLAIN: &[u8] = b"Crypto Obfuscator resource";
    const IV: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];
    const KEY: [u8; 8] = [0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80];

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn not(data: &[u8]) -> Vec<u8> {
        data.iter().map(|b| !b).collect()
    }

    fn envelope(flags: u8, key: &[u8], encrypt_key: &[u8], plain: &[u8]) -> Vec<u8> {
        let mut data = vec![flags];
        data.extend_from_slice(&IV);
        data.extend_from_slice(key);
        data.extend(des_encrypt(encrypt_key, &IV, plain).unwrap());
        data
    }

    #[test]
    fn all_stages() {
        let staged = deflate(&not(PLAIN));
        let data = envelope(7, &KEY, &KEY, &staged);
        assert_eq!(CoResourceDecrypter::new(None).decrypt(&data).unwrap(), PLAIN);
    }

    #[test]
    fn public_key_token() {
        let token = [9, 8, 7, 6, 5, 4, 3, 2];
        let data = envelope(1, &[0; 8], &token, PLAIN);

        assert_eq!(
            CoResourceDecrypter::new(Some(&token)).decrypt(&data).unwrap(),
            PLAIN
        );
        let error = CoResourceDecrypter::new(None).decrypt(&data).unwrap_err();
        assert_eq!(
            error.to_string(),
            "PublicKeyToken is null, can't decrypt resources"
        );
    }

    #[test]
    fn custom_flags() {
        let flags = ResourceFlags {
            des: 0x10,
            deflate: 0x20,
            bitwise_not: 0x40,
        };
        let mut data = vec![0x20];
        data.extend(deflate(PLAIN));

        let decrypter = CoResourceDecrypter::new(None).with_flags(flags);
        assert_eq!(decrypter.decrypt(&data).unwrap(), PLAIN);
        // bit 2 is unknown with these flags and is ignored
        data[0] |= 2;
        assert_eq!(decrypter.decrypt(&data).unwrap(), PLAIN);
    }

    #[test]
    fn no_stage() {
        let decrypter = CoResourceDecrypter::new(None);
        assert_eq!(decrypter.decrypt(&[0, 1, 2, 3]).unwrap(), vec![1, 2, 3]);
        assert!(decrypter.decrypt(&[]).is_err());
        assert!(decrypter.decrypt(&[1, 0, 0]).is_err());
    }
}
