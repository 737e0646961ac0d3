//! Just enough of the ECMA-335 physical layout to find what protectors encrypt.
//!
//! The deobfuscators in this crate never need the metadata tables. They need the CLR header (for
//! the managed resources directory), the stream directory (for the `#US` heap) and the method
//! body format (to tell a correct decryption from garbage).
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotunpack::{metadata::Metadata, File};
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("protected.exe"))?;
//! let metadata = Metadata::read(&file)?;
//! if let Some((offset, size)) = metadata.stream_range("#US") {
//!     println!("#US heap at file offset 0x{:X}, {} bytes", offset, size);
//! }
//! # Ok::<(), dotunpack::Error>(())
//! ```

pub mod cor20header;
pub mod method;
pub mod root;
pub mod streams;

use crate::{
    metadata::{cor20header::Cor20Header, root::MetadataRoot},
    Image, Result,
};

/// The CLR header and metadata root of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// The CLR runtime header
    pub cor20: Cor20Header,
    /// The metadata root with its stream directory
    pub root: MetadataRoot,
    /// File offset of the metadata root
    pub root_offset: usize,
}

impl Metadata {
    /// Read the CLR header and the metadata root of `image`.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for images without a CLR header and the parse errors
    /// of [`Cor20Header`] and [`MetadataRoot`] otherwise.
    pub fn read<I: Image + ?Sized>(image: &I) -> Result<Metadata> {
        let cor20 = Cor20Header::from_image(image)?;
        let root_offset = image.rva_to_offset(cor20.meta_data_rva)?;
        let data = image.slice_at_offset(root_offset, cor20.meta_data_size as usize)?;
        let root = MetadataRoot::read(data)?;

        Ok(Metadata {
            cor20,
            root,
            root_offset,
        })
    }

    /// File offset and size of the stream called `name`.
    #[must_use]
    pub fn stream_range(&self, name: &str) -> Option<(usize, usize)> {
        self.root
            .stream(name)
            .map(|stream| (self.root_offset + stream.offset as usize, stream.size as usize))
    }

    /// RVA and size of the stream called `name`.
    #[must_use]
    pub fn stream_rva(&self, name: &str) -> Option<(u32, u32)> {
        self.root
            .stream(name)
            .map(|stream| (self.cor20.meta_data_rva + stream.offset, stream.size))
    }

    /// RVA and size of the managed resources directory, if present.
    #[must_use]
    pub fn resources(&self) -> Option<(u32, u32)> {
        (self.cor20.resource_rva != 0).then_some((self.cor20.resource_rva, self.cor20.resource_size))
    }
}
