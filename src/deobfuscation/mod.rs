//! Decryption pipelines for protected .NET assemblies.
//!
//! [`obfuscators`] holds one module per protector, [`config`] the knobs they share. Each
//! pipeline works on bytes the caller extracted from the assembly: resources, key arrays, heap
//! streams, or a whole PE [`Image`](crate::Image) when method bodies have to be located.
//!
//! # Example
//!
//! ```rust
//! use dotunpack::deobfuscation::{
//!     obfuscators::{smartassembly::SaResourceDecrypter, ResourceDecrypter},
//!     DecryptConfig,
//! };
//!
//! let config = DecryptConfig::default();
//! assert!(config.crypto_obfuscator.resource_flags.known() != 0);
//!
//! // "{z}" with an unknown layer
//! let error = SaResourceDecrypter::new().decrypt(&[0x7B, 0x7A, 0x7D, 0x09]);
//! assert!(error.is_err());
//! ```

pub mod config;
pub mod obfuscators;

pub use config::{
    BabelConfig, CryptoObfuscatorConfig, DecryptConfig, InstructionLength, MaxtoCodeConfig,
    ResourceFlags, StringEncoding,
};
