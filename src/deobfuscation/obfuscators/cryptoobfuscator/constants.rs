//! Crypto Obfuscator constants, read at byte offsets of the decrypted resource.

use crate::{file::io::read_le, Result};

/// The decrypted constants resource.
#[derive(Debug, Clone, Default)]
pub struct CoConstantsDecrypter {
    data: Vec<u8>,
}

impl CoConstantsDecrypter {
    /// Wrap the decrypted resource.
    #[must_use]
    pub fn new(decrypted: Vec<u8>) -> CoConstantsDecrypter {
        CoConstantsDecrypter { data: decrypted }
    }

    fn at(&self, offset: usize) -> Result<&[u8]> {
        self.data.get(offset..).ok_or(out_of_bounds_error!())
    }

    /// The `i32` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value is not inside the resource.
    pub fn decrypt_int32(&self, offset: usize) -> Result<i32> {
        read_le(self.at(offset)?)
    }

    /// The `i64` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value is not inside the resource.
    pub fn decrypt_int64(&self, offset: usize) -> Result<i64> {
        read_le(self.at(offset)?)
    }

    /// The `f32` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value is not inside the resource.
    pub fn decrypt_single(&self, offset: usize) -> Result<f32> {
        read_le(self.at(offset)?)
    }

    /// The `f64` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value is not inside the resource.
    pub fn decrypt_double(&self, offset: usize) -> Result<f64> {
        read_le(self.at(offset)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_reads() {
        let mut data = Vec::new();
        data.extend_from_slice(&(-7i32).to_le_bytes());
        data.extend_from_slice(&0x1122_3344_5566_7788i64.to_le_bytes());
        data.extend_from_slice(&0.25f64.to_le_bytes());
        let constants = CoConstantsDecrypter::new(data);

        assert_eq!(constants.decrypt_int32(0).unwrap(), -7);
        assert_eq!(constants.decrypt_int64(4).unwrap(), 0x1122_3344_5566_7788);
        assert_eq!(constants.decrypt_double(12).unwrap(), 0.25);
        assert_eq!(constants.decrypt_int32(4).unwrap(), 0x5566_7788);
        assert!(constants.decrypt_single(18).is_err());
        assert!(constants.decrypt_int32(100).is_err());
    }
}
