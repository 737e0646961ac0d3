//! SmartAssembly resources and strings.
//!
//! Resources carry a `{z}` header selecting chunked Deflate, DES or AES, see
//! [`SaResourceDecrypter`]. The strings resource unwrapped that way is read by
//! [`SaStringDecrypter`].

pub mod resource;
pub mod strings;

pub use resource::SaResourceDecrypter;
pub use strings::SaStringDecrypter;
