//! CLR 2.0 (Cor20) header parsing.
//!
//! Protectors routinely leave junk in the reserved fields of this header, so only the fields
//! needed to find the metadata are validated. Everything else is reported as-is.
//!
//! # Reference
//! - [ECMA-335 II.25.3.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::Parser, Image, Result};

/// Size of the header in bytes, as stored in its `cb` field.
pub const COR20_HEADER_SIZE: usize = 72;

/// The CLR runtime header, located by the `IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR` data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cor20Header {
    /// Size of header in bytes
    pub cb: u32,
    /// The minimum version of runtime required to run this program
    pub major_runtime_version: u16,
    /// The minor portion of the version
    pub minor_runtime_version: u16,
    /// RVA of the `MetaData`
    pub meta_data_rva: u32,
    /// Size of the `MetaData`
    pub meta_data_size: u32,
    /// Flags describing this runtime
    pub flags: u32,
    /// Token for the `MethodDef` or File of the entry point for the image
    pub entry_point_token: u32,
    /// RVA of the managed resources
    pub resource_rva: u32,
    /// Size of the managed resources
    pub resource_size: u32,
    /// RVA of the strong name signature
    pub strong_name_signature_rva: u32,
    /// Size of the strong name signature
    pub strong_name_signature_size: u32,
    /// RVA of the vtable fixups
    pub vtable_fixups_rva: u32,
    /// Size of the vtable fixups
    pub vtable_fixups_size: u32,
}

impl Cor20Header {
    /// Parse the header from a sequence of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is too short and
    /// [`crate::Error::Malformed`] if `cb` or the metadata directory are invalid.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if data.len() < COR20_HEADER_SIZE {
            return Err(out_of_bounds_error!());
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb as usize != COR20_HEADER_SIZE {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;

        let meta_data_rva = parser.read_le::<u32>()?;
        let meta_data_size = parser.read_le::<u32>()?;
        if meta_data_rva == 0 || meta_data_size == 0 {
            return Err(malformed_error!("Metadata directory is empty"));
        }

        let flags = parser.read_le::<u32>()?;
        let entry_point_token = parser.read_le::<u32>()?;
        let resource_rva = parser.read_le::<u32>()?;
        let resource_size = parser.read_le::<u32>()?;
        let strong_name_signature_rva = parser.read_le::<u32>()?;
        let strong_name_signature_size = parser.read_le::<u32>()?;

        // code manager table, always zero
        parser.advance_by(8)?;

        let vtable_fixups_rva = parser.read_le::<u32>()?;
        let vtable_fixups_size = parser.read_le::<u32>()?;

        Ok(Cor20Header {
            cb,
            major_runtime_version,
            minor_runtime_version,
            meta_data_rva,
            meta_data_size,
            flags,
            entry_point_token,
            resource_rva,
            resource_size,
            strong_name_signature_rva,
            strong_name_signature_size,
            vtable_fixups_rva,
            vtable_fixups_size,
        })
    }

    /// Locate and parse the header of `image` through its CLR data directory.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for native images, otherwise the errors of
    /// [`Cor20Header::read`] and of the RVA translation.
    pub fn from_image<I: Image + ?Sized>(image: &I) -> Result<Cor20Header> {
        let Some((rva, _)) = image.clr_directory() else {
            return Err(crate::Error::NotSupported);
        };

        Self::read(image.slice_at_rva(rva, COR20_HEADER_SIZE)?)
    }
}
