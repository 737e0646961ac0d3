//! Product specific decrypters.
//!
//! Each submodule handles one protector. They share the primitives in [`crate::cipher`] and
//! [`crate::utils`] and never touch the file system except where noted.
//!
//! # Products
//!
//! - [`babel`] - Babel.NET resources, strings, constants and the method container
//! - [`cryptoobfuscator`] - Crypto Obfuscator resources, strings and constants
//! - [`maxtocode`] - MaxtoCode methods, heaps and strings
//! - [`reactor`] - .NET Reactor 4.x resources, methods and strings
//! - [`smartassembly`] - SmartAssembly resources and strings
//!
//! Every resource format implements [`ResourceDecrypter`], so callers that only need the
//! plaintext of an embedded resource can treat them alike.
//!
//! # Example
//!
//! ```rust
//! use dotunpack::deobfuscation::obfuscators::{
//!     cryptoobfuscator::CoResourceDecrypter, ResourceDecrypter,
//! };
//!
//! let decrypter = CoResourceDecrypter::new(None);
//! // flags byte 0: nothing applied
//! assert_eq!(decrypter.decrypt(&[0, 1, 2, 3])?, vec![1, 2, 3]);
//! # Ok::<(), dotunpack::Error>(())
//! ```

pub mod babel;
pub mod cryptoobfuscator;
pub mod maxtocode;
pub mod reactor;
pub mod smartassembly;

use crate::Result;

/// Decrypts an embedded resource that a protector wrapped in its own header.
pub trait ResourceDecrypter {
    /// Returns the plaintext of `data`.
    ///
    /// # Errors
    /// Returns an error if the header is not recognized or a cipher or decompression stage
    /// fails.
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>>;
}
