//! Babel.NET encrypted resources.
//!
//! Babel wraps every protected resource (including its own string, constant and method
//! containers) in a small header that carries the DES IV and, unless the key is derived from
//! the assembly's public key, the DES key itself. Three header generations exist:
//!
//! - **3.0** starts with the IV directly and ends the header with a SHA-1 hash that is skipped.
//! - **3.5+** wraps the header in a length-prefixed block that may be XORed with an 8-byte key.
//! - **5.0 retail** uses a 6-byte XOR key and a reordered header. It cannot be told apart from
//!   3.5+ by looking at the data, so the caller has to ask for it.

use crate::{
    deobfuscation::obfuscators::ResourceDecrypter,
    file::parser::Parser,
    utils::{crypto::des_decrypt, decompress::decompress_deflate},
    Result,
};

/// Header generation of a Babel.NET resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BabelResourceVersion {
    /// Pick 3.0 or 3.5+ from the data.
    #[default]
    Auto,
    /// Babel.NET 3.0.
    V30,
    /// Babel.NET 3.5 up to 4.x.
    V35,
    /// Babel.NET 5.0 retail and later.
    V50,
}

/// Decrypted header fields.
struct KeyIv {
    key: Vec<u8>,
    iv: Vec<u8>,
    compressed: bool,
}

/// Decrypter for Babel.NET resources.
///
/// # Examples
///
/// ```rust,no_run
/// use dotunpack::deobfuscation::obfuscators::{babel::BabelResourceDecrypter, ResourceDecrypter};
///
/// let public_key = std::fs::read("key.snk.pub")?;
/// let encrypted = std::fs::read("resource.bin")?;
///
/// let decrypter = BabelResourceDecrypter::new(Some(&public_key));
/// let plain = decrypter.decrypt(&encrypted)?;
/// # Ok::<(), dotunpack::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct BabelResourceDecrypter {
    public_key: Option<Vec<u8>>,
    version: BabelResourceVersion,
}

impl BabelResourceDecrypter {
    /// Create a decrypter. `public_key` is the assembly's full public key and is only needed
    /// for resources without an embedded key.
    #[must_use]
    pub fn new(public_key: Option<&[u8]>) -> BabelResourceDecrypter {
        BabelResourceDecrypter {
            public_key: public_key.map(<[u8]>::to_vec),
            version: BabelResourceVersion::Auto,
        }
    }

    /// Force a header generation instead of detecting it.
    #[must_use]
    pub fn with_version(mut self, version: BabelResourceVersion) -> BabelResourceDecrypter {
        self.version = version;
        self
    }

    /// The generation that will be used for `data`.
    #[must_use]
    pub fn version_for(&self, data: &[u8]) -> BabelResourceVersion {
        match self.version {
            BabelResourceVersion::Auto if is_v30(data) => BabelResourceVersion::V30,
            BabelResourceVersion::Auto => BabelResourceVersion::V35,
            version => version,
        }
    }

    fn decrypt_v30(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut parser = Parser::new(data);
        let iv = parser.read_u8_prefixed_bytes()?.to_vec();
        let key = if parser.read_bool()? {
            parser.read_u8_prefixed_bytes()?.to_vec()
        } else {
            let length = usize::from(parser.read_le::<u8>()?);
            self.public_key_slice(0, length)?.to_vec()
        };
        // SHA-1 of the plaintext
        parser.read_i32_prefixed_bytes()?;

        let decrypted = des_decrypt(&key, &iv, &data[parser.pos()..])?;
        Ok(decompress_deflate(&decrypted)?)
    }

    fn decrypt_v35(&self, data: &[u8], xor_key_len: usize) -> Result<Vec<u8>> {
        let (header, index) = header_block(data, xor_key_len)?;
        let key_iv = if xor_key_len == 6 {
            self.key_iv_v50(&header)?
        } else {
            self.key_iv_v35(&header)?
        };

        let decrypted = des_decrypt(&key_iv.key, &key_iv.iv, &data[index..])?;
        if key_iv.compressed {
            Ok(decompress_deflate(&decrypted)?)
        } else {
            Ok(decrypted)
        }
    }

    fn key_iv_v35(&self, header: &[u8]) -> Result<KeyIv> {
        let mut parser = Parser::new(header);

        // 3.0 - 3.5 don't have the license string
        if parser.peek_byte()? != 8 {
            parser.read_prefixed_string_utf8()?;
        }
        // 4.2 and earlier always compress
        let compressed = if parser.peek_byte()? != 8 {
            parser.read_bool()?
        } else {
            true
        };

        let iv = parser.read_u8_prefixed_bytes()?.to_vec();
        let key = self.read_key(&mut parser)?;
        Ok(KeyIv {
            key,
            iv,
            compressed,
        })
    }

    fn key_iv_v50(&self, header: &[u8]) -> Result<KeyIv> {
        let mut parser = Parser::new(header);

        parser.read_prefixed_string_utf8()?;
        let compressed = parser.read_bool()?;
        parser.read_i32_prefixed_bytes()?;
        let embedded = parser.read_bool()?;
        let iv = parser.read_u8_prefixed_bytes()?.to_vec();
        let key = if embedded {
            parser.read_u8_prefixed_bytes()?.to_vec()
        } else {
            self.derived_key(usize::from(parser.read_le::<u8>()?))?
        };

        Ok(KeyIv {
            key,
            iv,
            compressed,
        })
    }

    fn read_key(&self, parser: &mut Parser) -> Result<Vec<u8>> {
        if parser.read_bool()? {
            Ok(parser.read_u8_prefixed_bytes()?.to_vec())
        } else {
            self.derived_key(usize::from(parser.read_le::<u8>()?))
        }
    }

    /// Key taken from the public key at offset 12, past the blob header.
    fn derived_key(&self, length: usize) -> Result<Vec<u8>> {
        let mut key = self.public_key_slice(12, length)?.to_vec();
        match key.get_mut(5) {
            Some(b) => *b |= 0x80,
            None => return Err(malformed_error!("Invalid key length {}", length)),
        }
        Ok(key)
    }

    fn public_key_slice(&self, start: usize, length: usize) -> Result<&[u8]> {
        let Some(public_key) = &self.public_key else {
            return Err(invalid_argument!(
                "Resource key is derived from the public key but none was given"
            ));
        };
        public_key
            .get(start..start + length)
            .ok_or_else(|| malformed_error!("Public key is too short for a {} byte key", length))
    }
}

impl ResourceDecrypter for BabelResourceDecrypter {
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.version_for(data) {
            BabelResourceVersion::V30 => self.decrypt_v30(data),
            BabelResourceVersion::V50 => self.decrypt_v35(data, 6),
            BabelResourceVersion::Auto | BabelResourceVersion::V35 => self.decrypt_v35(data, 8),
        }
    }
}

fn is_v30(data: &[u8]) -> bool {
    data.len() > 10 && data[0] == 8 && data[9] <= 1 && data[10] == 8
}

/// Split off the length-prefixed header block, undoing the XOR if the flag is set.
///
/// Returns the header and the index of the ciphertext.
fn header_block(data: &[u8], xor_key_len: usize) -> Result<(Vec<u8>, usize)> {
    let mut parser = Parser::new(data);
    let xored = parser.read_le::<u8>()? != 0;
    let length = usize::from(parser.read_le::<u16>()?);
    let mut header = parser.read_bytes(length)?.to_vec();

    if xored {
        let key = parser.read_bytes(xor_key_len)?;
        for (b, k) in header.iter_mut().zip(key.iter().cycle()) {
            *b ^= k;
        }
    }

    Ok((header, parser.pos()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::DeflateEncoder, Compression};

    use super::*;
    use crate::utils::crypto::des_encrypt;

    const KEY: [u8; 8] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
    const IV: [u8; 8] = [8, 7, 6, 5, 4, 3, 2, 1];
    const PLAIN: &[u8] = b"System.Resources.ResourceReader payload";

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn public_key() -> Vec<u8> {
        (0..160u8).collect()
    }

    fn wrap(header: &[u8], xor_key: Option<&[u8]>, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![u8::from(xor_key.is_some())];
        data.extend_from_slice(&(header.len() as u16).to_le_bytes());
        match xor_key {
            Some(key) => {
                data.extend(header.iter().zip(key.iter().cycle()).map(|(b, k)| b ^ k));
                data.extend_from_slice(key);
            }
            None => data.extend_from_slice(header),
        }
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn v30_embedded_key() {
        let mut data = vec![8];
        data.extend_from_slice(&IV);
        data.push(1);
        data.push(8);
        data.extend_from_slice(&KEY);
        data.extend_from_slice(&20i32.to_le_bytes());
        data.extend_from_slice(&[0xAB; 20]);
        data.extend(des_encrypt(&KEY, &IV, &deflate(PLAIN)).unwrap());

        let decrypter = BabelResourceDecrypter::new(None);
        assert_eq!(decrypter.version_for(&data), BabelResourceVersion::V30);
        assert_eq!(decrypter.decrypt(&data).unwrap(), PLAIN);
    }

    #[test]
    fn v30_public_key() {
        let pk = public_key();
        let mut data = vec![8];
        data.extend_from_slice(&IV);
        data.push(0);
        data.push(8);
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend(des_encrypt(&pk[..8], &IV, &deflate(PLAIN)).unwrap());

        assert_eq!(
            BabelResourceDecrypter::new(Some(&pk)).decrypt(&data).unwrap(),
            PLAIN
        );
        assert!(BabelResourceDecrypter::new(None).decrypt(&data).is_err());
    }

    #[test]
    fn v35_license_uncompressed() {
        let mut header = vec![3, b'L', b'I', b'C', 0];
        header.push(8);
        header.extend_from_slice(&IV);
        header.push(1);
        header.push(8);
        header.extend_from_slice(&KEY);

        let data = wrap(&header, None, &des_encrypt(&KEY, &IV, PLAIN).unwrap());
        let decrypter = BabelResourceDecrypter::new(None);
        assert_eq!(decrypter.version_for(&data), BabelResourceVersion::V35);
        assert_eq!(decrypter.decrypt(&data).unwrap(), PLAIN);
    }

    #[test]
    fn v35_xored_derived_key() {
        let pk = public_key();
        let mut key = pk[12..20].to_vec();
        key[5] |= 0x80;

        // no license, no compressed flag: always compressed
        let mut header = vec![8];
        header.extend_from_slice(&IV);
        header.push(0);
        header.push(8);

        let xor_key = [0x5A, 0xA5, 1, 2, 3, 4, 5, 6];
        let data = wrap(
            &header,
            Some(&xor_key),
            &des_encrypt(&key, &IV, &deflate(PLAIN)).unwrap(),
        );
        assert_eq!(
            BabelResourceDecrypter::new(Some(&pk)).decrypt(&data).unwrap(),
            PLAIN
        );
    }

    #[test]
    fn v50_retail() {
        let mut header = vec![0];
        header.push(1);
        header.extend_from_slice(&3i32.to_le_bytes());
        header.extend_from_slice(&[9, 9, 9]);
        header.push(1);
        header.push(8);
        header.extend_from_slice(&IV);
        header.push(8);
        header.extend_from_slice(&KEY);

        let xor_key = [1, 2, 3, 4, 5, 6];
        let data = wrap(
            &header,
            Some(&xor_key),
            &des_encrypt(&KEY, &IV, &deflate(PLAIN)).unwrap(),
        );
        let decrypter =
            BabelResourceDecrypter::new(None).with_version(BabelResourceVersion::V50);
        assert_eq!(decrypter.decrypt(&data).unwrap(), PLAIN);
    }

    #[test]
    fn truncated_header() {
        let decrypter = BabelResourceDecrypter::new(None);
        assert!(decrypter.decrypt(&[0, 0x40, 0]).is_err());
        assert!(decrypter.decrypt(&[]).is_err());
    }
}
