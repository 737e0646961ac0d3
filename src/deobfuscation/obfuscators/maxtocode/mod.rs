//! MaxtoCode method, heap and string decryption.
//!
//! MaxtoCode hides everything it protects behind two blobs inside the image: an encrypted copy
//! of the PE header ([`PeHeader`]), which holds masked RVAs of all protected regions, and the
//! 8 KiB [`McKey`], which keys every cipher.
//!
//! # Architecture
//!
//! - [`infos`] - Magic tables that identify the encryption epoch
//! - [`header`] / [`mckey`] - The two key blobs
//! - [`stream`] - The cipher family and the per-epoch tag tables
//! - [`methods`] - The encrypted method-body table
//! - [`heaps`] - Managed resources and the `#US` heap
//! - [`strings`] - The runtime string table
//! - [`runtime`] - Epoch detection from the runtime DLL
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotunpack::deobfuscation::{obfuscators::maxtocode::MaxtoCode, DecryptConfig};
//! use dotunpack::{File, Image};
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("protected.exe"))?;
//! let config = DecryptConfig::default();
//! let maxtocode = MaxtoCode::new(&file)?;
//!
//! let methods = maxtocode.methods(&file, &config.maxtocode)?;
//! let mut data = file.data().to_vec();
//! maxtocode.decrypt_heaps(&file, &mut data)?;
//! println!("{} methods", methods.len());
//! # Ok::<(), dotunpack::Error>(())
//! ```

pub mod header;
pub mod heaps;
pub mod infos;
pub mod mckey;
pub mod methods;
pub mod runtime;
pub mod stream;
pub mod strings;

pub use header::PeHeader;
pub use heaps::{decrypt_resources, decrypt_us_heap};
pub use infos::{detect_version, EncryptionInfo, EncryptionVersion, MCKEY_8C0H, RVA_900H};
pub use mckey::McKey;
pub use methods::{
    is_placeholder, resolve_version, DecryptedMethodInfo, EncryptedDataInfo, MethodInfos,
};
pub use runtime::detect_runtime_version;
pub use stream::{
    tables_for, HandlerTable, KeyCursor, StreamVariant, ALL_TABLES, HANDLERS_V1, HANDLERS_V2,
    HANDLERS_V3, HANDLERS_V4, HANDLERS_V5A, HANDLERS_V5B, HANDLERS_V5C, HANDLERS_V6A,
};
pub use strings::McStringDecrypter;

use crate::{deobfuscation::config::MaxtoCodeConfig, Image, Result};

/// The key blobs of one protected image.
#[derive(Debug, Clone)]
pub struct MaxtoCode {
    header: PeHeader,
    mc_key: McKey,
}

impl MaxtoCode {
    /// Locate the header and the McKey in `image`.
    ///
    /// # Errors
    /// Returns an error if the McKey is not mapped.
    pub fn new<I: Image + ?Sized>(image: &I) -> Result<MaxtoCode> {
        let header = PeHeader::new(image)?;
        let mc_key = McKey::read(image, &header)?;
        Ok(MaxtoCode { header, mc_key })
    }

    /// The decrypted PE header blob.
    #[must_use]
    pub fn header(&self) -> &PeHeader {
        &self.header
    }

    /// The McKey.
    #[must_use]
    pub fn mc_key(&self) -> &McKey {
        &self.mc_key
    }

    /// Decrypt all method bodies, see [`MethodInfos::decrypt`].
    ///
    /// # Errors
    /// See [`MethodInfos::decrypt`].
    pub fn methods<I: Image + ?Sized>(
        &self,
        image: &I,
        config: &MaxtoCodeConfig,
    ) -> Result<MethodInfos> {
        MethodInfos::decrypt(image, &self.header, &self.mc_key, config)
    }

    /// Decrypt the managed resources and the `#US` heap inside `file_data`.
    ///
    /// Returns the number of resource bytes and heap strings that were decrypted.
    ///
    /// # Errors
    /// See [`decrypt_resources`] and [`decrypt_us_heap`].
    pub fn decrypt_heaps<I: Image + ?Sized>(
        &self,
        image: &I,
        file_data: &mut [u8],
    ) -> Result<(usize, usize)> {
        let resources = decrypt_resources(image, &self.header, &self.mc_key, file_data)?;
        let strings = decrypt_us_heap(image, &self.header, &self.mc_key, file_data)?;
        Ok((resources, strings))
    }

    /// Decrypt the runtime string table.
    ///
    /// # Errors
    /// See [`McStringDecrypter::new`].
    pub fn strings<I: Image + ?Sized>(
        &self,
        image: &I,
        config: &MaxtoCodeConfig,
    ) -> Result<McStringDecrypter> {
        McStringDecrypter::new(image, &self.header, &self.mc_key, config.string_encoding)
    }
}
