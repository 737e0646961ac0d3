//! PE image access.
//!
//! Obfuscator key blobs, method-info tables and heaps live at RVAs inside the protected
//! executable. This module provides the address arithmetic needed to get at them, independent
//! of where the bytes come from.
//!
//! # Key Components
//!
//! - [`crate::file::Image`] - Trait over "bytes plus a section table", with RVA translation
//! - [`crate::file::Section`] - Owned section header
//! - [`crate::file::File`] - A PE parsed by `goblin`, backed by a memory map or a buffer
//! - [`crate::file::MappedImage`] - An image whose layout is already known to the caller
//! - [`crate::file::parser::Parser`] - Cursor used by every container parser in the crate
//! - [`crate::file::io`] - Low-level little/big-endian primitive reads
//!
//! # Examples
//!
//! ```rust
//! use dotunpack::{Image, MappedImage, Section};
//!
//! let mut data = vec![0u8; 0x400];
//! data[0x210] = 0xAA;
//!
//! let image = MappedImage::new(
//!     data,
//!     vec![Section::new(".text", 0x2000, 0x200, 0x200, 0x200)],
//! );
//!
//! assert_eq!(image.rva_to_offset(0x2010)?, 0x210);
//! assert_eq!(image.slice_at_rva(0x2010, 1)?, &[0xAA]);
//! assert_eq!(image.offset_to_rva(0x210)?, 0x2010);
//! # Ok::<(), dotunpack::Error>(())
//! ```

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use crate::{
    Error::{Empty, GoblinErr},
    Result,
};
use goblin::pe::{section_table::SectionTable, PE};
use memory::Memory;
use ouroboros::self_referencing;
use physical::Physical;

/// Source of the raw bytes of a [`File`].
///
/// Implemented by the memory-mapped and the owned-buffer backend. Both must be shareable
/// across threads.
pub trait Backend: Send + Sync {
    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns a bounds-checked slice of the data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset.checked_add(len).ok_or(out_of_bounds_error!())?;
        self.data().get(offset..end).ok_or(out_of_bounds_error!())
    }

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize {
        self.data().len()
    }
}

/// An owned PE section header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name, without trailing NULs
    pub name: String,
    /// RVA of the first byte of the section
    pub virtual_address: u32,
    /// Size of the section once mapped
    pub virtual_size: u32,
    /// File offset of the section data
    pub pointer_to_raw_data: u32,
    /// Size of the section data in the file
    pub size_of_raw_data: u32,
}

impl Section {
    /// Create a new section header.
    #[must_use]
    pub fn new(
        name: &str,
        virtual_address: u32,
        virtual_size: u32,
        pointer_to_raw_data: u32,
        size_of_raw_data: u32,
    ) -> Self {
        Section {
            name: name.to_string(),
            virtual_address,
            virtual_size,
            pointer_to_raw_data,
            size_of_raw_data,
        }
    }

    /// Returns `true` if `rva` lies within the mapped extent of this section.
    #[must_use]
    pub fn contains_rva(&self, rva: u32) -> bool {
        let extent = self.virtual_size.max(self.size_of_raw_data);
        rva >= self.virtual_address
            && u64::from(rva) < u64::from(self.virtual_address) + u64::from(extent)
    }

    /// Returns `true` if the file `offset` lies within the raw data of this section.
    #[must_use]
    pub fn contains_offset(&self, offset: usize) -> bool {
        let start = self.pointer_to_raw_data as usize;
        offset >= start && offset < start + self.size_of_raw_data as usize
    }
}

impl From<&SectionTable> for Section {
    fn from(table: &SectionTable) -> Self {
        let name = table.name().unwrap_or_default().trim_end_matches('\0');
        Section::new(
            name,
            table.virtual_address,
            table.virtual_size,
            table.pointer_to_raw_data,
            table.size_of_raw_data,
        )
    }
}

/// Read access to a PE image: the raw file bytes plus its section table.
///
/// Implementors only provide [`Image::data`] and [`Image::sections`], the address translation
/// is shared.
pub trait Image {
    /// The raw file bytes.
    fn data(&self) -> &[u8];

    /// The section table.
    fn sections(&self) -> &[Section];

    /// RVA and size of the CLR runtime header directory, if the image has one.
    fn clr_directory(&self) -> Option<(u32, u32)> {
        None
    }

    /// Convert an RVA to a file offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no section contains `rva`.
    fn rva_to_offset(&self, rva: u32) -> Result<usize> {
        self.sections()
            .iter()
            .find(|section| section.contains_rva(rva))
            .map(|section| {
                (rva - section.virtual_address) as usize + section.pointer_to_raw_data as usize
            })
            .ok_or_else(|| malformed_error!("RVA could not be converted to offset - {:08X}", rva))
    }

    /// Convert a file offset to an RVA.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no section contains `offset`.
    fn offset_to_rva(&self, offset: usize) -> Result<u32> {
        let section = self
            .sections()
            .iter()
            .find(|section| section.contains_offset(offset))
            .ok_or_else(|| {
                malformed_error!("Offset could not be converted to RVA - {:08X}", offset)
            })?;

        #[allow(clippy::cast_possible_truncation)]
        let delta = (offset - section.pointer_to_raw_data as usize) as u32;
        Ok(section.virtual_address + delta)
    }

    /// Find a section by its name, e.g. `.rsrc`.
    fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections().iter().find(|section| section.name == name)
    }

    /// Returns `len` bytes starting at `rva`.
    ///
    /// # Errors
    /// Returns an error if the RVA is unmapped or the range exceeds the file.
    fn slice_at_rva(&self, rva: u32, len: usize) -> Result<&[u8]> {
        let offset = self.rva_to_offset(rva)?;
        self.slice_at_offset(offset, len)
    }

    /// Returns `len` bytes starting at the file offset `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the file.
    fn slice_at_offset(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset.checked_add(len).ok_or(out_of_bounds_error!())?;
        self.data().get(offset..end).ok_or(out_of_bounds_error!())
    }
}

/// An image whose bytes and layout are supplied by the caller.
///
/// Useful for hosts that already parsed the PE with their own loader, and for synthetic images.
#[derive(Debug, Clone)]
pub struct MappedImage {
    data: Vec<u8>,
    sections: Vec<Section>,
    clr: Option<(u32, u32)>,
}

impl MappedImage {
    /// Create an image from raw bytes and a section table.
    #[must_use]
    pub fn new(data: Vec<u8>, sections: Vec<Section>) -> Self {
        MappedImage {
            data,
            sections,
            clr: None,
        }
    }

    /// Create an image in which every RVA equals its file offset.
    #[must_use]
    pub fn identity(data: Vec<u8>) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let len = data.len() as u32;
        MappedImage::new(data, vec![Section::new(".text", 0, len, 0, len)])
    }

    /// Attach the CLR runtime header directory (`rva`, `size`).
    #[must_use]
    pub fn with_clr_directory(mut self, rva: u32, size: u32) -> Self {
        self.clr = Some((rva, size));
        self
    }

    /// Mutable access to the raw bytes, for in-place heap decryption.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the image and return its bytes.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl Image for MappedImage {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn sections(&self) -> &[Section] {
        &self.sections
    }

    fn clr_directory(&self) -> Option<(u32, u32)> {
        self.clr
    }
}

#[self_referencing]
struct PeFile {
    data: Box<dyn Backend>,
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

/// A PE file parsed with `goblin`.
///
/// The bytes either come from a memory-mapped file ([`File::from_file`]) or from an owned
/// buffer ([`File::from_mem`]). Native images are accepted as well, the CLR header is optional.
///
/// # Examples
///
/// ```rust,no_run
/// use dotunpack::{File, Image};
/// use std::path::Path;
///
/// let file = File::from_file(Path::new("protected.exe"))?;
/// if let Some(rsrc) = file.section_by_name(".rsrc") {
///     println!(".rsrc at {:08X}", rsrc.virtual_address);
/// }
/// # Ok::<(), dotunpack::Error>(())
/// ```
pub struct File {
    inner: PeFile,
    sections: Vec<Section>,
    clr: Option<(u32, u32)>,
    timestamp: u32,
}

impl File {
    /// Loads and memory-maps a PE file from the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, is empty or is not a valid PE.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Loads a PE file from a memory buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is empty or is not a valid PE.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let data = Box::new(data);
        let inner = PeFile::try_new(data, |data| match PE::parse(data.data()) {
            Ok(pe) => Ok(pe),
            Err(error) => Err(GoblinErr(error)),
        })?;

        let (sections, clr, timestamp) = inner.with_pe(|pe| {
            let sections = pe.sections.iter().map(Section::from).collect::<Vec<_>>();
            let clr = pe.header.optional_header.as_ref().and_then(|optional| {
                optional
                    .data_directories
                    .get_clr_runtime_header()
                    .as_ref()
                    .map(|dir| (dir.virtual_address, dir.size))
            });
            (sections, clr, pe.header.coff_header.time_date_stamp)
        });

        Ok(File {
            inner,
            sections,
            clr,
            timestamp,
        })
    }

    /// Returns the total size of the loaded file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        Image::data(self).len()
    }

    /// Returns `true` if the file has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The COFF `TimeDateStamp`, i.e. the link time of the image.
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }
}

impl Image for File {
    fn data(&self) -> &[u8] {
        self.inner.borrow_data().data()
    }

    fn sections(&self) -> &[Section] {
        &self.sections
    }

    fn clr_directory(&self) -> Option<(u32, u32)> {
        self.clr.filter(|(rva, _)| *rva != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_sections() -> MappedImage {
        MappedImage::new(
            vec![0u8; 0x800],
            vec![
                Section::new(".text", 0x2000, 0x180, 0x200, 0x200),
                Section::new(".rsrc", 0x4000, 0x100, 0x400, 0x200),
            ],
        )
    }

    #[test]
    fn rva_round_trip() {
        let image = two_sections();
        assert_eq!(image.rva_to_offset(0x2000).unwrap(), 0x200);
        assert_eq!(image.rva_to_offset(0x41FF).unwrap(), 0x5FF);
        assert_eq!(image.offset_to_rva(0x450).unwrap(), 0x4050);
        assert!(image.rva_to_offset(0x1000).is_err());
        assert!(image.offset_to_rva(0x700).is_err());
    }

    #[test]
    fn section_lookup() {
        let image = two_sections();
        assert_eq!(image.section_by_name(".rsrc").unwrap().pointer_to_raw_data, 0x400);
        assert!(image.section_by_name(".reloc").is_none());
    }

    #[test]
    fn slices_are_bounds_checked() {
        let image = two_sections();
        assert_eq!(image.slice_at_rva(0x2000, 0x10).unwrap().len(), 0x10);
        assert!(image.slice_at_offset(0x7FF, 2).is_err());
        assert!(image.slice_at_offset(usize::MAX, 2).is_err());
    }

    #[test]
    fn identity_image() {
        let image = MappedImage::identity(vec![1, 2, 3, 4]).with_clr_directory(2, 72);
        assert_eq!(image.rva_to_offset(3).unwrap(), 3);
        assert_eq!(image.clr_directory(), Some((2, 72)));
    }

    #[test]
    fn load_invalid() {
        assert!(matches!(File::from_mem(vec![]), Err(Empty)));
        assert!(File::from_mem(vec![0xCC; 64]).is_err());
    }
}
