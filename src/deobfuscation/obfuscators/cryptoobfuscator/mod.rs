//! Crypto Obfuscator resources, strings and constants.
//!
//! Strings and constants live in resources wrapped by [`CoResourceDecrypter`]. The decrypted
//! resources are read at byte offsets that the protected code passes to its helper methods.

pub mod constants;
pub mod resource;
pub mod strings;

pub use constants::CoConstantsDecrypter;
pub use resource::CoResourceDecrypter;
pub use strings::CoStringDecrypter;
