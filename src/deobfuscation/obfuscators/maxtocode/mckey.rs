//! The McKey, MaxtoCode's 8 KiB key blob.
//!
//! All stream variants, the string table and both heap ciphers draw their key bytes from this
//! blob. Its location is stored masked in the [`PeHeader`].

use std::sync::OnceLock;

use crate::{
    cipher::LeBlowfish, deobfuscation::obfuscators::maxtocode::header::PeHeader,
    file::io::read_le, Image, Result,
};

/// Size of the key blob.
pub const MC_KEY_SIZE: usize = 0x2000;

/// The McKey blob.
#[derive(Debug)]
pub struct McKey {
    data: Vec<u8>,
    blowfish: OnceLock<LeBlowfish>,
}

impl McKey {
    /// Read the McKey at the RVA recorded in `header`.
    ///
    /// # Errors
    /// Returns an error if the RVA is unmapped or the blob runs past the end of the file.
    pub fn read<I: Image + ?Sized>(image: &I, header: &PeHeader) -> Result<McKey> {
        let rva = header.mc_key_rva()?;
        log::debug!("McKey at RVA 0x{:08X}", rva);
        McKey::from_bytes(image.slice_at_rva(rva, MC_KEY_SIZE)?.to_vec())
    }

    /// Wrap an already extracted key blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if `data` is not 0x2000 bytes long.
    pub fn from_bytes(data: Vec<u8>) -> Result<McKey> {
        if data.len() != MC_KEY_SIZE {
            return Err(invalid_argument!("Invalid McKey size"));
        }

        Ok(McKey {
            data,
            blowfish: OnceLock::new(),
        })
    }

    /// Byte at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `index` is past the blob.
    pub fn byte(&self, index: usize) -> Result<u8> {
        self.data.get(index).copied().ok_or(out_of_bounds_error!())
    }

    /// Little-endian dword at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `offset + 4` is past the blob.
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        read_le::<u32>(self.data.get(offset..).ok_or(out_of_bounds_error!())?)
    }

    /// `len` bytes at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range is past the blob.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data
            .get(offset..offset + len)
            .ok_or(out_of_bounds_error!())
    }

    /// The whole blob.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The Blowfish engine keyed from this blob, set up on first use.
    pub fn blowfish(&self) -> &LeBlowfish {
        self.blowfish
            .get_or_init(|| LeBlowfish::from_key_blob(&self.data))
    }

    /// Magic pair at offsets 0x8C0 / 0x8C4.
    ///
    /// # Errors
    /// Never fails for a blob of full size.
    pub fn magic(&self) -> Result<(u32, u32)> {
        Ok((self.read_u32(0x8C0)?, self.read_u32(0x8C4)?))
    }
}

impl Clone for McKey {
    fn clone(&self) -> Self {
        McKey {
            data: self.data.clone(),
            blowfish: OnceLock::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deobfuscation::obfuscators::maxtocode::header::XOR_KEY, MappedImage};

    #[test]
    fn read_through_header() {
        let mut data = vec![0u8; 0x4000];
        data[0xFFC..0x1000].copy_from_slice(&(0x2000 ^ XOR_KEY).to_le_bytes());
        data[0x2000..0x2004].copy_from_slice(&0xDEAD_BEEF_u32.to_le_bytes());
        data[0x28C0..0x28C4].copy_from_slice(&1u32.to_le_bytes());
        data[0x28C4..0x28C8].copy_from_slice(&2u32.to_le_bytes());
        data[0x3FFF] = 0x7F;

        let image = MappedImage::identity(data);
        let header = PeHeader::new(&image).unwrap();
        let key = McKey::read(&image, &header).unwrap();

        assert_eq!(key.read_u32(0).unwrap(), 0xDEAD_BEEF);
        assert_eq!(key.byte(0x1FFF).unwrap(), 0x7F);
        assert_eq!(key.magic().unwrap(), (1, 2));
        assert_eq!(key.bytes(1, 2).unwrap(), &[0xBE, 0xAD]);
    }

    #[test]
    fn bounds() {
        let key = McKey::from_bytes(vec![0u8; MC_KEY_SIZE]).unwrap();
        assert!(key.byte(MC_KEY_SIZE).is_err());
        assert!(key.read_u32(MC_KEY_SIZE - 2).is_err());
        assert!(key.bytes(MC_KEY_SIZE - 1, 2).is_err());
        assert!(McKey::from_bytes(vec![0u8; 12]).is_err());
    }
}
