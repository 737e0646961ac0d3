// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # dotunpack
//!
//! Decryption and unpacking primitives for .NET assemblies protected by commercial obfuscators.
//! `dotunpack` reverses the byte-level protection layers of Babel.NET, Crypto Obfuscator,
//! MaxtoCode, SmartAssembly and .NET Reactor 4: custom block ciphers, XOR/rotate stream ciphers,
//! header-driven resource encryption, encrypted method-body tables and Babel.NET's out-of-band
//! method container.
//!
//! Locating the obfuscator's helper types inside an assembly is not part of this crate. Callers
//! hand over the material that such a search produces (key blobs, resource bytes, a readable PE
//! image, a description of the target method) and get back decrypted buffers, strings, constants,
//! method bodies and patch descriptions.
//!
//! ## Features
//!
//! - **🔐 Cipher engines** - `CryptDecrypter`, `Decrypter6`, little-endian Blowfish and the MaxtoCode stream family
//! - **📦 Resource decrypters** - Header parsing for every supported product, DES/AES + inflate + NOT stages
//! - **🧭 Epoch detection** - MaxtoCode magic tables, runtime build timestamps and brute-force fallback
//! - **🧩 Container parsing** - Babel.NET `ImageReader` with forward-reference fixups and CIL reconstruction
//! - **📄 PE access** - Memory-mapped files, RVA translation and CLR header lookup
//!
//! ## Quick Start
//!
//! ```rust
//! use dotunpack::prelude::*;
//!
//! let key = [0x11u8; 16];
//! let plain = *b"8 bytes!";
//! let encrypted = CryptDecrypter::encrypt(&key, &plain)?;
//! assert_eq!(CryptDecrypter::decrypt(&key, &encrypted)?, plain);
//! # Ok::<(), dotunpack::Error>(())
//! ```
//!
//! ### MaxtoCode
//!
//! ```rust,no_run
//! use dotunpack::prelude::*;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("protected.exe"))?;
//! let header = PeHeader::new(&file)?;
//! let mc_key = McKey::read(&file, &header)?;
//! let infos = MethodInfos::decrypt(&file, &header, &mc_key, &MaxtoCodeConfig::default())?;
//! for info in infos.iter() {
//!     println!("{:08X}: {} bytes", info.body_rva, info.body.len());
//! }
//! # Ok::<(), dotunpack::Error>(())
//! ```
//!
//! ## Logging
//!
//! Non-fatal conditions (unknown flag bits, ambiguous MaxtoCode epochs, mismatching heap
//! locations) are reported through the [`log`](https://docs.rs/log) facade. The library never
//! installs a logger itself.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`], using the crate wide [`Error`] enum.

#[macro_use]
pub(crate) mod error;

pub mod assembly;
pub mod cipher;
pub mod deobfuscation;
pub mod file;
pub mod metadata;
pub mod prelude;
pub mod utils;

pub use error::Error;

/// The generic Result type of this crate
pub type Result<T> = std::result::Result<T, Error>;

pub use file::{parser::Parser, File, Image, MappedImage, Section};
