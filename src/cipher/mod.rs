//! Custom block ciphers used by MaxtoCode.
//!
//! These are the fixed-key, fixed-block engines of the MaxtoCode method encryption. Stream
//! ciphers that index into the key blob live with the rest of the MaxtoCode code in
//! [`crate::deobfuscation::obfuscators::maxtocode`], standard DES and AES are provided by
//! [`crate::utils::crypto`].
//!
//! # Key Components
//!
//! - [`CryptDecrypter`] - Two-key triple DES variant with LSB-first bit numbering (type 5)
//! - [`Decrypter6`] - Substitution/rotate Feistel cipher with a 32 byte key (type 6)
//! - [`LeBlowfish`] - Blowfish with little-endian block halves (type 7)
//!
//! All ciphers work on 8 byte blocks. [`CryptDecrypter`] and [`Decrypter6`] reject input that
//! is not a multiple of the block size, [`LeBlowfish`] leaves a trailing partial block alone.

mod blowfish_le;
mod crypt;
mod decrypter6;

pub use blowfish_le::{LeBlowfish, KEY_LENGTH as BLOWFISH_KEY_LENGTH};
pub use crypt::CryptDecrypter;
pub use decrypter6::Decrypter6;
