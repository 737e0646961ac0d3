//! The encrypted PE header blob that MaxtoCode embeds in protected images.
//!
//! The blob is 0x1000 bytes long and holds XOR-masked RVAs of every table the runtime needs.
//! Older builds place it at the very start of the file, newer ones hide it somewhere inside the
//! raw data of `.rsrc`. The blob is found by scanning for a known magic pair at offset 0x900.

use crate::{
    deobfuscation::obfuscators::maxtocode::infos::{detect_version, EncryptionVersion, RVA_900H},
    file::io::read_le,
    Image, Result,
};

/// Size of the header blob.
pub const HEADER_SIZE: usize = 0x1000;

/// Mask of the McKey RVA stored at offset 0xFFC.
pub const XOR_KEY: u32 = 0x07AB_F931;

const MAGIC_OFFSET: usize = 0x900;

/// The MaxtoCode PE header blob and the epoch its magic identifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeHeader {
    version: EncryptionVersion,
    header_offset: usize,
    header_data: Vec<u8>,
}

impl PeHeader {
    /// Locate the header blob in `image`.
    ///
    /// Offset 0 is checked first, then every byte offset of the `.rsrc` raw data that leaves room
    /// for a full blob. Without a match the blob at offset 0 is used and the version is
    /// [`EncryptionVersion::Unknown`], so that the McKey magic can still identify the epoch.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the image is shorter than one blob.
    pub fn new<I: Image + ?Sized>(image: &I) -> Result<PeHeader> {
        let (header_offset, version) = Self::find(image);
        if version == EncryptionVersion::Unknown {
            log::warn!("No MaxtoCode header magic found, falling back to offset 0");
        } else {
            log::debug!(
                "MaxtoCode {} header at file offset 0x{:X}",
                version,
                header_offset
            );
        }

        let header_data = image.slice_at_offset(header_offset, HEADER_SIZE)?.to_vec();
        Ok(PeHeader {
            version,
            header_offset,
            header_data,
        })
    }

    /// Build a header from a blob that was already extracted.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if `header_data` is not 0x1000 bytes long.
    pub fn from_data(header_data: Vec<u8>) -> Result<PeHeader> {
        if header_data.len() != HEADER_SIZE {
            return Err(invalid_argument!("Invalid header size"));
        }

        let version = Self::magic_version(&header_data, 0);
        Ok(PeHeader {
            version,
            header_offset: 0,
            header_data,
        })
    }

    fn find<I: Image + ?Sized>(image: &I) -> (usize, EncryptionVersion) {
        let data = image.data();

        let version = Self::magic_version(data, 0);
        if version != EncryptionVersion::Unknown {
            return (0, version);
        }

        if let Some(rsrc) = image.section_by_name(".rsrc") {
            let start = rsrc.pointer_to_raw_data as usize;
            let end = (start + rsrc.size_of_raw_data as usize).saturating_sub(HEADER_SIZE - 1);
            for offset in start..end {
                let version = Self::magic_version(data, offset);
                if version != EncryptionVersion::Unknown {
                    return (offset, version);
                }
            }
        }

        (0, EncryptionVersion::Unknown)
    }

    fn magic_version(data: &[u8], header_offset: usize) -> EncryptionVersion {
        let magic = header_offset + MAGIC_OFFSET;
        match (
            data.get(magic..).map(read_le::<u32>),
            data.get(magic + 4..).map(read_le::<u32>),
        ) {
            (Some(Ok(lo)), Some(Ok(hi))) => detect_version(RVA_900H, lo, hi),
            _ => EncryptionVersion::Unknown,
        }
    }

    /// Epoch identified by the header magic.
    #[must_use]
    pub fn version(&self) -> EncryptionVersion {
        self.version
    }

    /// File offset of the blob.
    #[must_use]
    pub fn header_offset(&self) -> usize {
        self.header_offset
    }

    /// The raw blob.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.header_data
    }

    /// Read the dword at `offset` of the blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `offset + 4` exceeds the blob.
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        read_le::<u32>(self.header_data.get(offset..).ok_or(out_of_bounds_error!())?)
    }

    /// The dword at `offset` unmasked with `xor_key`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `offset + 4` exceeds the blob.
    pub fn rva(&self, offset: usize, xor_key: u32) -> Result<u32> {
        Ok(self.read_u32(offset)? ^ xor_key)
    }

    /// RVA of the McKey.
    ///
    /// # Errors
    /// Never fails for a blob of full size.
    pub fn mc_key_rva(&self) -> Result<u32> {
        self.rva(0x0FFC, XOR_KEY)
    }
}
