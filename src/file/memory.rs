use super::Backend;

/// Input file backed by an owned buffer, for images that were unpacked or decrypted in memory.
#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Take ownership of `data`.
    pub fn new(data: Vec<u8>) -> Memory {
        Memory { data }
    }
}

impl Backend for Memory {
    fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error::OutOfBounds;

    #[test]
    fn slices() {
        let mut data = vec![0xCC_u8; 0x2000];
        data[0x10..0x14].copy_from_slice(&0x0007_ABF9_u32.to_le_bytes());

        let memory = Memory::new(data);
        assert_eq!(memory.len(), 0x2000);
        assert_eq!(memory.data_slice(0x10, 4).unwrap(), &[0xF9, 0xAB, 0x07, 0x00]);
        assert!(memory.data_slice(0x1FFF, 2).is_err());
        assert!(memory.data_slice(0x2000, 0).unwrap().is_empty());
        assert!(matches!(
            memory.data_slice(usize::MAX, 1),
            Err(OutOfBounds { .. })
        ));
    }
}
