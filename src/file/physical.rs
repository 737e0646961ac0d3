//! Memory-mapped file backend.
//!
//! Protected executables and their runtime DLLs are mapped read-only instead of being copied
//! into memory, only the pages that hold key blobs and record tables get touched.

use std::{fs, path::Path};

use memmap2::Mmap;

use super::Backend;
use crate::{Error, Result};

/// A read-only memory map of a file on disk.
#[derive(Debug)]
pub struct Physical {
    map: Mmap,
}

impl Physical {
    /// Map the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// [`crate::Error::Error`] if it cannot be mapped.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path)?;
        // The map is read-only; the file may still change underneath, as with any mmap reader.
        let map = unsafe { Mmap::map(&file) }.map_err(|error| Error::Error(error.to_string()))?;
        Ok(Physical { map })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file() {
        match Physical::new("/nonexistent/path/to/mcruntime.dll") {
            Err(Error::FileError(error)) => assert_eq!(error.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected result {:?}", other.map(|physical| physical.len())),
        }
    }

    #[test]
    fn mapped_file() {
        let path = std::env::temp_dir().join("dotunpack_physical_test.bin");
        std::fs::write(&path, [0x4D, 0x5A, 0x90, 0x00, 0x03]).unwrap();

        let physical = Physical::new(&path).unwrap();
        assert_eq!(physical.len(), 5);
        assert_eq!(physical.data_slice(0, 2).unwrap(), b"MZ");
        assert!(physical.data_slice(4, 2).is_err());

        drop(physical);
        std::fs::remove_file(&path).unwrap();
    }
}
