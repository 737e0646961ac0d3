//! The MaxtoCode method-body cipher family.
//!
//! Every encrypted method body fragment carries a one-based cipher tag. The tag indexes into a
//! [`HandlerTable`] that depends on the encryption epoch, and every entry of a table is a
//! [`StreamVariant`] with its key parameters. All variants draw their key material from the
//! [`McKey`].
//!
//! The epoch tables only cover the variants 1 to 7. The nibble-swapping variants 8, 9 and 11
//! and the differencing variant 10 are not part of any table and are built by the caller.
//!
//! # Examples
//!
//! ```rust
//! use dotunpack::deobfuscation::obfuscators::maxtocode::{
//!     McKey, StreamVariant, KeyCursor, HANDLERS_V3,
//! };
//!
//! let key = McKey::from_bytes((0..0x2000).map(|i| (i * 7) as u8).collect())?;
//! let variant = StreamVariant::Xor(KeyCursor::new(0, 0, 0x2000));
//!
//! let encrypted = variant.encrypt(&key, b"method body")?;
//! assert_eq!(variant.decrypt(&key, &encrypted)?, b"method body");
//!
//! // tag 1 of the V3 table is the same cipher
//! assert_eq!(HANDLERS_V3.decrypt(&key, 1, &encrypted)?, b"method body");
//! # Ok::<(), dotunpack::Error>(())
//! ```

use crate::{
    cipher::{CryptDecrypter, Decrypter6},
    deobfuscation::obfuscators::maxtocode::{infos::EncryptionVersion, mckey::McKey},
    Error, Result,
};

/// Rotation amounts of the table-rotation variant, applied in order.
const ROTATE_TABLE_SHIFTS: [u32; 16] = [5, 11, 14, 21, 6, 20, 17, 29, 4, 10, 3, 2, 7, 1, 26, 18];

/// Key range of the CryptDecrypter variant.
const CRYPT_KEY: (usize, usize) = (0x32, 15);
/// Key range of the Decrypter6 variant.
const FEISTEL_KEY: (usize, usize) = (0x96, 32);
/// Chaining seeds of the two halves of the differencing variant.
const DIFFERENCE_SEEDS: [u8; 2] = [0xA1, 0x1A];

/// A wrapping index into the McKey.
///
/// Starts at `start`, and whenever the incremented index reaches `end` it restarts at `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCursor {
    /// First key index
    pub start: usize,
    /// Index to continue at after wrapping
    pub reset: usize,
    /// Exclusive end of the key window
    pub end: usize,
}

impl KeyCursor {
    /// Create a cursor.
    #[must_use]
    pub const fn new(start: usize, reset: usize, end: usize) -> Self {
        KeyCursor { start, reset, end }
    }

    fn next(&self, ki: usize) -> usize {
        let next = ki + 1;
        if next == self.end {
            self.reset
        } else {
            next
        }
    }
}

/// One member of the cipher family, with its key parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamVariant {
    /// #1, XOR with a key cursor
    Xor(KeyCursor),
    /// #2, 64-bit rotation by 6 and XOR with two key dwords at `key_offset + 16`
    Rotate6 {
        /// Offset of the key dword block
        key_offset: usize,
    },
    /// #3, sixteen 64-bit rotations and XOR with the key dwords at `key_offset` and `+12`
    RotateTable {
        /// Offset of the key dword block
        key_offset: usize,
    },
    /// #4, three encrypted bytes carry two plain bytes
    Compact(KeyCursor),
    /// #5, [`CryptDecrypter`] keyed with 15 McKey bytes at 0x32
    Crypt,
    /// #6, [`Decrypter6`] keyed with 32 McKey bytes at 0x96
    Feistel,
    /// #7, little-endian Blowfish keyed from the McKey prefix
    Blowfish,
    /// #8 and #9, XOR and swap the nibbles of every `stride`-th byte
    XorSwap {
        /// Key cursor
        cursor: KeyCursor,
        /// Every byte with `i % stride == stride - 1` is nibble-swapped
        stride: usize,
    },
    /// #10, XOR with the previous ciphertext byte, restarted in each half
    Difference,
    /// #11, swap the nibbles of every third byte, then XOR
    SwapXor {
        /// Key cursor
        cursor: KeyCursor,
    },
}

/// Variant 1a.
pub const DECRYPT_1A: StreamVariant = StreamVariant::Xor(KeyCursor::new(0, 0, 0x2000));
/// Variant 1b.
pub const DECRYPT_1B: StreamVariant = StreamVariant::Xor(KeyCursor::new(6, 6, 0x500));
/// Variant 1c.
pub const DECRYPT_1C: StreamVariant = StreamVariant::Xor(KeyCursor::new(6, 0, 0x1000));
/// Variant 1d.
pub const DECRYPT_1D: StreamVariant = StreamVariant::Xor(KeyCursor::new(5, 5, 0x500));

/// Variant 2a.
pub const DECRYPT_2A: StreamVariant = StreamVariant::Rotate6 { key_offset: 0xFA };
/// Variant 2b.
pub const DECRYPT_2B: StreamVariant = StreamVariant::Rotate6 { key_offset: 0xFA + 9 };
/// Variant 2c.
pub const DECRYPT_2C: StreamVariant = StreamVariant::Rotate6 { key_offset: 0xFA + 0x24 };
/// Variant 2d.
pub const DECRYPT_2D: StreamVariant = StreamVariant::Rotate6 { key_offset: 0xFA + 7 };

/// Variant 3a.
pub const DECRYPT_3A: StreamVariant = StreamVariant::RotateTable { key_offset: 0x15E };
/// Variant 3b.
pub const DECRYPT_3B: StreamVariant = StreamVariant::RotateTable { key_offset: 0x15E + 0xE5 };
/// Variant 3c.
pub const DECRYPT_3C: StreamVariant = StreamVariant::RotateTable { key_offset: 0x15E + 0x28 };
/// Variant 3d.
pub const DECRYPT_3D: StreamVariant = StreamVariant::RotateTable { key_offset: 0x15E + 8 };

/// Variant 4a.
pub const DECRYPT_4A: StreamVariant = StreamVariant::Compact(KeyCursor::new(0, 0, 0x2000));
/// Variant 4b.
pub const DECRYPT_4B: StreamVariant = StreamVariant::Compact(KeyCursor::new(0x14, 0x14, 0x1000));
/// Variant 4c.
pub const DECRYPT_4C: StreamVariant = StreamVariant::Compact(KeyCursor::new(5, 0, 0x2000));
/// Variant 4d.
pub const DECRYPT_4D: StreamVariant = StreamVariant::Compact(KeyCursor::new(0x0B, 0x0B, 0x1000));

/// Variant 5.
pub const DECRYPT_5: StreamVariant = StreamVariant::Crypt;
/// Variant 6.
pub const DECRYPT_6: StreamVariant = StreamVariant::Feistel;
/// Variant 7.
pub const DECRYPT_7: StreamVariant = StreamVariant::Blowfish;

impl StreamVariant {
    /// Decrypt `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the rotation variants get a length that is not a
    /// multiple of 8, [`crate::Error::InvalidArgument`] for a nibble swap stride of 0, the errors of the block ciphers for [`StreamVariant::Crypt`] and
    /// [`StreamVariant::Feistel`], and [`crate::Error::OutOfBounds`] if a key cursor leaves the
    /// McKey.
    pub fn decrypt(&self, key: &McKey, data: &[u8]) -> Result<Vec<u8>> {
        match *self {
            StreamVariant::Xor(cursor) => xor(key, cursor, data),
            StreamVariant::Rotate6 { key_offset } => {
                let (key4, key5) = (key.read_u32(key_offset + 16)?, key.read_u32(key_offset + 20)?);
                map_blocks(data, "Invalid encryption #2 length", |block| {
                    rotate_split(block, 6, key4, key5)
                })
            }
            StreamVariant::RotateTable { key_offset } => {
                let (key0, key3) = (key.read_u32(key_offset)?, key.read_u32(key_offset + 12)?);
                map_blocks(data, "Invalid encryption #3 length", |block| {
                    let block = ROTATE_TABLE_SHIFTS
                        .iter()
                        .fold(block, |value, &shift| value.rotate_left(shift));
                    rotate_split(block, 0, key0, key3)
                })
            }
            StreamVariant::Compact(cursor) => compact(key, cursor, data),
            StreamVariant::Crypt => {
                CryptDecrypter::decrypt(key.bytes(CRYPT_KEY.0, CRYPT_KEY.1)?, data)
            }
            StreamVariant::Feistel => {
                Decrypter6::decrypt(key.bytes(FEISTEL_KEY.0, FEISTEL_KEY.1)?, data)
            }
            StreamVariant::Blowfish => {
                let mut decrypted = data.to_vec();
                key.blowfish().decrypt(&mut decrypted);
                Ok(decrypted)
            }
            StreamVariant::XorSwap { cursor, stride } => {
                let mut decrypted = xor(key, cursor, data)?;
                swap_every(&mut decrypted, stride)?;
                Ok(decrypted)
            }
            StreamVariant::Difference => {
                let mut decrypted = data.to_vec();
                let (first, second) = decrypted.split_at_mut(data.len() / 2);
                undo_difference(first, DIFFERENCE_SEEDS[0]);
                undo_difference(second, DIFFERENCE_SEEDS[1]);
                Ok(decrypted)
            }
            StreamVariant::SwapXor { cursor } => {
                let mut swapped = data.to_vec();
                swap_every(&mut swapped, 3)?;
                xor(key, cursor, &swapped)
            }
        }
    }

    /// Encrypt `data`, the inverse of [`StreamVariant::decrypt`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for [`StreamVariant::Compact`], which loses the
    /// information needed to invert it, and otherwise the same errors as
    /// [`StreamVariant::decrypt`].
    pub fn encrypt(&self, key: &McKey, data: &[u8]) -> Result<Vec<u8>> {
        match *self {
            StreamVariant::Xor(cursor) => xor(key, cursor, data),
            StreamVariant::Rotate6 { key_offset } => {
                let (key4, key5) = (key.read_u32(key_offset + 16)?, key.read_u32(key_offset + 20)?);
                map_blocks(data, "Invalid encryption #2 length", |block| {
                    unmask(block, key4, key5).rotate_right(6)
                })
            }
            StreamVariant::RotateTable { key_offset } => {
                let (key0, key3) = (key.read_u32(key_offset)?, key.read_u32(key_offset + 12)?);
                map_blocks(data, "Invalid encryption #3 length", |block| {
                    ROTATE_TABLE_SHIFTS
                        .iter()
                        .rev()
                        .fold(unmask(block, key0, key3), |value, &shift| {
                            value.rotate_right(shift)
                        })
                })
            }
            StreamVariant::Compact(_) => Err(Error::NotSupported),
            StreamVariant::Crypt => {
                CryptDecrypter::encrypt(key.bytes(CRYPT_KEY.0, CRYPT_KEY.1)?, data)
            }
            StreamVariant::Feistel => {
                Decrypter6::encrypt(key.bytes(FEISTEL_KEY.0, FEISTEL_KEY.1)?, data)
            }
            StreamVariant::Blowfish => {
                let mut encrypted = data.to_vec();
                key.blowfish().encrypt(&mut encrypted);
                Ok(encrypted)
            }
            StreamVariant::XorSwap { cursor, stride } => {
                let mut swapped = data.to_vec();
                swap_every(&mut swapped, stride)?;
                xor(key, cursor, &swapped)
            }
            StreamVariant::Difference => {
                let mut encrypted = data.to_vec();
                let (first, second) = encrypted.split_at_mut(data.len() / 2);
                apply_difference(first, DIFFERENCE_SEEDS[0]);
                apply_difference(second, DIFFERENCE_SEEDS[1]);
                Ok(encrypted)
            }
            StreamVariant::SwapXor { cursor } => {
                let mut encrypted = xor(key, cursor, data)?;
                swap_every(&mut encrypted, 3)?;
                Ok(encrypted)
            }
        }
    }
}

fn xor(key: &McKey, cursor: KeyCursor, data: &[u8]) -> Result<Vec<u8>> {
    let mut ki = cursor.start;
    data.iter()
        .map(|&b| {
            let out = b ^ key.byte(ki)?;
            ki = cursor.next(ki);
            Ok(out)
        })
        .collect()
}

fn compact(key: &McKey, cursor: KeyCursor, data: &[u8]) -> Result<Vec<u8>> {
    let mut decrypted = Vec::with_capacity(data.len() / 3 * 2 + 1);
    let mut ki = cursor.start;

    let mut groups = data.chunks_exact(3);
    for group in &mut groups {
        let (k1, k2, k3) = (key.byte(ki + 1)?, key.byte(ki + 2)?, key.byte(ki + 3)?);
        let middle = group[1] ^ k2;
        decrypted.push((middle >> 4) | ((group[0] ^ k1) & 0xF0));
        decrypted.push((middle << 4).wrapping_add((group[2] ^ k3) & 0x0F));

        ki += 4;
        if ki >= cursor.end {
            ki = cursor.reset;
        }
    }

    // One trailing byte is always emitted, zero unless a partial group remains.
    match groups.remainder().first() {
        Some(&b) => decrypted.push(b ^ key.byte(ki)?),
        None => decrypted.push(0),
    }

    Ok(decrypted)
}

/// Apply `op` to every 8-byte block, read as a little-endian `u64`.
fn map_blocks(data: &[u8], length_error: &str, op: impl Fn(u64) -> u64) -> Result<Vec<u8>> {
    if data.len() % 8 != 0 {
        return Err(malformed_error!(length_error));
    }

    let mut out = Vec::with_capacity(data.len());
    for chunk in data.chunks_exact(8) {
        let mut block = [0u8; 8];
        block.copy_from_slice(chunk);
        out.extend_from_slice(&op(u64::from_le_bytes(block)).to_le_bytes());
    }
    Ok(out)
}

/// Rotate left by `shift` and XOR the low and high dwords with `lo` and `hi`.
fn rotate_split(block: u64, shift: u32, lo: u32, hi: u32) -> u64 {
    block.rotate_left(shift) ^ (u64::from(hi) << 32 | u64::from(lo))
}

fn unmask(block: u64, lo: u32, hi: u32) -> u64 {
    block ^ (u64::from(hi) << 32 | u64::from(lo))
}

fn swap_every(data: &mut [u8], stride: usize) -> Result<()> {
    if stride == 0 {
        return Err(invalid_argument!("Invalid nibble swap stride 0"));
    }
    for b in data.iter_mut().skip(stride - 1).step_by(stride) {
        *b = b.rotate_left(4);
    }
    Ok(())
}

fn undo_difference(half: &mut [u8], seed: u8) {
    let mut previous = seed;
    for b in half {
        let cipher = *b;
        *b ^= previous;
        previous = cipher;
    }
}

fn apply_difference(half: &mut [u8], seed: u8) {
    let mut previous = seed;
    for b in half {
        *b ^= previous;
        previous = *b;
    }
}

/// The cipher table of one epoch, indexed by the one-based tag of an encrypted fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerTable {
    /// Table name, e.g. `V5b`
    pub name: &'static str,
    /// Epoch the table belongs to
    pub version: EncryptionVersion,
    /// Variants in tag order
    pub handlers: &'static [StreamVariant],
}

impl HandlerTable {
    /// The variant for `tag`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `tag` is outside `1..=handlers.len()`.
    pub fn variant(&self, tag: i32) -> Result<&StreamVariant> {
        usize::try_from(tag)
            .ok()
            .and_then(|tag| tag.checked_sub(1))
            .and_then(|index| self.handlers.get(index))
            .ok_or_else(|| malformed_error!("Invalid encryption type: {:02X}", tag))
    }

    /// Decrypt `data` with the variant for `tag`.
    ///
    /// # Errors
    /// The errors of [`HandlerTable::variant`] and [`StreamVariant::decrypt`].
    pub fn decrypt(&self, key: &McKey, tag: i32, data: &[u8]) -> Result<Vec<u8>> {
        self.variant(tag)?.decrypt(key, data)
    }
}

/// Tag table V1.
pub const HANDLERS_V1: HandlerTable = HandlerTable {
    name: "V1",
    version: EncryptionVersion::V1,
    handlers: &[DECRYPT_1A, DECRYPT_4A, DECRYPT_2A, DECRYPT_3A, DECRYPT_5, DECRYPT_6, DECRYPT_7],
};
/// Tag table V2.
pub const HANDLERS_V2: HandlerTable = HandlerTable {
    name: "V2",
    version: EncryptionVersion::V2,
    handlers: &[DECRYPT_3A, DECRYPT_2A, DECRYPT_1A, DECRYPT_4A, DECRYPT_5, DECRYPT_6, DECRYPT_7],
};
/// Tag table V3.
pub const HANDLERS_V3: HandlerTable = HandlerTable {
    name: "V3",
    version: EncryptionVersion::V3,
    handlers: &[DECRYPT_1A, DECRYPT_2A, DECRYPT_3A, DECRYPT_4A, DECRYPT_5, DECRYPT_6, DECRYPT_7],
};
/// Tag table V4.
pub const HANDLERS_V4: HandlerTable = HandlerTable {
    name: "V4",
    version: EncryptionVersion::V4,
    handlers: &[DECRYPT_2A, DECRYPT_1A, DECRYPT_3A, DECRYPT_4A, DECRYPT_5, DECRYPT_6, DECRYPT_7],
};
/// Tag table V5a.
pub const HANDLERS_V5A: HandlerTable = HandlerTable {
    name: "V5a",
    version: EncryptionVersion::V5,
    handlers: &[DECRYPT_4A, DECRYPT_2A, DECRYPT_3A, DECRYPT_1A, DECRYPT_5, DECRYPT_6, DECRYPT_7],
};
/// Tag table V5b.
pub const HANDLERS_V5B: HandlerTable = HandlerTable {
    name: "V5b",
    version: EncryptionVersion::V5,
    handlers: &[DECRYPT_4B, DECRYPT_2B, DECRYPT_3B, DECRYPT_1B, DECRYPT_6, DECRYPT_7, DECRYPT_5],
};
/// Tag table V5c.
pub const HANDLERS_V5C: HandlerTable = HandlerTable {
    name: "V5c",
    version: EncryptionVersion::V5,
    handlers: &[DECRYPT_4C, DECRYPT_2C, DECRYPT_3C, DECRYPT_1C, DECRYPT_6, DECRYPT_7, DECRYPT_5],
};
/// Tag table V6a.
pub const HANDLERS_V6A: HandlerTable = HandlerTable {
    name: "V6a",
    version: EncryptionVersion::V6,
    handlers: &[DECRYPT_4D, DECRYPT_2D, DECRYPT_3D, DECRYPT_1D, DECRYPT_6, DECRYPT_7, DECRYPT_5],
};

/// Every table, oldest epoch first.
pub const ALL_TABLES: &[HandlerTable] = &[
    HANDLERS_V1,
    HANDLERS_V2,
    HANDLERS_V3,
    HANDLERS_V4,
    HANDLERS_V5A,
    HANDLERS_V5B,
    HANDLERS_V5C,
    HANDLERS_V6A,
];

/// The tables of `version`, in the order they are tried.
#[must_use]
pub fn tables_for(version: EncryptionVersion) -> Vec<&'static HandlerTable> {
    ALL_TABLES
        .iter()
        .filter(|table| table.version == version)
        .collect()
}
