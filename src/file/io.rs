//! Bounds-checked little-endian reads of primitive values.
//!
//! Every obfuscator format handled by this crate is a little-endian byte soup: key blobs are
//! addressed as `u32` words, record tables are XOR-decoded dwords, container offsets are `i64`s.
//! The helpers here make a truncated or hostile input produce [`crate::Error::OutOfBounds`]
//! instead of a panic.
//!
//! # Examples
//!
//! ```rust
//! use dotunpack::file::io::{read_le, read_le_at};
//!
//! let data = [0x01, 0x00, 0x00, 0x00, 0xFF, 0xFF];
//! assert_eq!(read_le::<u32>(&data)?, 1);
//!
//! let mut offset = 4;
//! assert_eq!(read_le_at::<i16>(&data, &mut offset)?, -1);
//! assert_eq!(offset, 6);
//! # Ok::<(), dotunpack::Error>(())
//! ```

use crate::Result;

/// Primitive types that can be decoded from a fixed number of little-endian bytes.
pub trait CilIO: Sized {
    /// The byte array holding one value, e.g. `[u8; 4]` for `u32`.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Decode a value from little-endian bytes.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_cil_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_cil_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Read `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too short.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    read_le_at(data, &mut 0)
}

/// Read `T` at `offset`, advancing `offset` past it. On error `offset` is left untouched.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too short.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let end = offset
        .checked_add(std::mem::size_of::<T>())
        .ok_or(out_of_bounds_error!())?;
    let bytes = data
        .get(*offset..end)
        .and_then(|slice| <T::Bytes>::try_from(slice).ok())
        .ok_or(out_of_bounds_error!())?;
    *offset = end;
    Ok(T::from_le_bytes(bytes))
}
