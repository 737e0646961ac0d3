//! SmartAssembly "{z}" resources.
//!
//! A protected resource starts with a dword whose low three bytes spell `{z}` and whose high
//! byte selects the layer: chunked Deflate, or a DES or AES envelope around another "{z}"
//! resource.

use crate::{
    deobfuscation::obfuscators::ResourceDecrypter,
    file::io::read_le,
    utils::{
        crypto::{aes_decrypt, des_decrypt},
        decompress::decompress_deflate_chunks,
    },
    Error, Result,
};

/// Magic of a zip archive, which SmartAssembly can emit but nobody uses.
const ZIP_MAGIC: u32 = 0x0403_4B50;
/// `{z}` in the low three bytes.
const SA_MAGIC: u32 = 0x007D_7A7B;

/// Key and IV of one cipher.
#[derive(Debug, Clone)]
struct KeyIv {
    key: Vec<u8>,
    iv: Vec<u8>,
}

/// Decrypter for SmartAssembly resources.
///
/// The DES and AES keys are found in the decrypter method of the protected assembly and have
/// to be passed in by the caller.
#[derive(Debug, Clone, Default)]
pub struct SaResourceDecrypter {
    des: Option<KeyIv>,
    aes: Option<KeyIv>,
}

impl SaResourceDecrypter {
    /// Create a decrypter without cipher keys. It can only unwrap compressed resources.
    #[must_use]
    pub fn new() -> SaResourceDecrypter {
        SaResourceDecrypter::default()
    }

    /// Set the DES key and IV.
    #[must_use]
    pub fn with_des(mut self, key: &[u8], iv: &[u8]) -> SaResourceDecrypter {
        self.des = Some(KeyIv {
            key: key.to_vec(),
            iv: iv.to_vec(),
        });
        self
    }

    /// Set the AES key and IV.
    #[must_use]
    pub fn with_aes(mut self, key: &[u8], iv: &[u8]) -> SaResourceDecrypter {
        self.aes = Some(KeyIv {
            key: key.to_vec(),
            iv: iv.to_vec(),
        });
        self
    }
}

impl ResourceDecrypter for SaResourceDecrypter {
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let magic = read_le::<u32>(data)?;
        if magic == ZIP_MAGIC {
            return Err(Error::NotSupported);
        }
        if magic & 0x00FF_FFFF != SA_MAGIC {
            return Err(malformed_error!("Invalid SA header magic 0x{:08X}", magic));
        }

        let body = &data[4..];
        match magic >> 24 {
            1 => Ok(decompress_deflate_chunks(body)?),
            2 => {
                let des = self
                    .des
                    .as_ref()
                    .ok_or_else(|| invalid_argument!("DES key / iv have not been set yet"))?;
                self.decrypt(&des_decrypt(&des.key, &des.iv, body)?)
            }
            3 => {
                let aes = self
                    .aes
                    .as_ref()
                    .ok_or_else(|| invalid_argument!("AES key / iv have not been set yet"))?;
                self.decrypt(&aes_decrypt(&aes.key, &aes.iv, body)?)
            }
            encryption => Err(malformed_error!("Unknown encryption type 0x{:02X}", encryption)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::DeflateEncoder, Compression};

    use super::*;
    use crate::utils::crypto::{aes_encrypt, des_encrypt};

    const PLAIN: &[u8] = b"SmartAssembly protected strings resource";

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zipped(plain: &[u8]) -> Vec<u8> {
        let (first, second) = plain.split_at(plain.len() / 2);
        let mut data = (SA_MAGIC | 1 << 24).to_le_bytes().to_vec();
        data.extend_from_slice(&(plain.len() as i32).to_le_bytes());
        for part in [first, second] {
            let compressed = deflate(part);
            data.extend_from_slice(&(compressed.len() as i32).to_le_bytes());
            data.extend_from_slice(&(part.len() as i32).to_le_bytes());
            data.extend(compressed);
        }
        data
    }

    fn wrapped(layer: u32, encrypted: Vec<u8>) -> Vec<u8> {
        let mut data = (SA_MAGIC | layer << 24).to_le_bytes().to_vec();
        data.extend(encrypted);
        data
    }

    #[test]
    fn chunked() {
        assert_eq!(SaResourceDecrypter::new().decrypt(&zipped(PLAIN)).unwrap(), PLAIN);
    }

    #[test]
    fn nested_ciphers() {
        let des_key = [1, 3, 5, 7, 9, 11, 13, 15];
        let des_iv = [2; 8];
        let aes_key = [0x42; 16];
        let aes_iv = [0x24; 16];

        let inner = wrapped(2, des_encrypt(&des_key, &des_iv, &zipped(PLAIN)).unwrap());
        let outer = wrapped(3, aes_encrypt(&aes_key, &aes_iv, &inner).unwrap());

        let decrypter = SaResourceDecrypter::new()
            .with_des(&des_key, &des_iv)
            .with_aes(&aes_key, &aes_iv);
        assert_eq!(decrypter.decrypt(&outer).unwrap(), PLAIN);

        let error = SaResourceDecrypter::new().decrypt(&inner).unwrap_err();
        assert_eq!(error.to_string(), "DES key / iv have not been set yet");
    }

    #[test]
    fn bad_headers() {
        let decrypter = SaResourceDecrypter::new();
        assert!(matches!(
            decrypter.decrypt(&ZIP_MAGIC.to_le_bytes()),
            Err(Error::NotSupported)
        ));
        assert!(matches!(
            decrypter.decrypt(&0x0112_3456u32.to_le_bytes()),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            decrypter.decrypt(&wrapped(9, Vec::new())),
            Err(Error::Malformed { .. })
        ));
        assert!(decrypter.decrypt(&[0x7B, 0x7A]).is_err());
    }
}
