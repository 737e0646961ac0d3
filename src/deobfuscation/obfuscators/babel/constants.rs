//! Babel.NET constant tables.
//!
//! Four arrays in a fixed order (`i32`, `i64`, `f32`, `f64`), each an `i32` count followed by
//! the values written back to front.

use crate::{
    file::{io::CilIO, parser::Parser},
    Result,
};

/// Decrypted Babel.NET constants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BabelConstants {
    ints: Vec<i32>,
    longs: Vec<i64>,
    floats: Vec<f32>,
    doubles: Vec<f64>,
}

fn read_array<T: CilIO + Default + Clone>(parser: &mut Parser) -> Result<Vec<T>> {
    let count = parser.read_le::<i32>()?;
    let count =
        usize::try_from(count).map_err(|_| malformed_error!("Invalid constant count {}", count))?;
    parser.ensure_remaining(count.saturating_mul(std::mem::size_of::<T>()))?;

    let mut values = vec![T::default(); count];
    for slot in values.iter_mut().rev() {
        *slot = parser.read_le::<T>()?;
    }
    Ok(values)
}

impl BabelConstants {
    /// Parse the decrypted resource.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a negative count and
    /// [`crate::Error::OutOfBounds`] if an array is truncated.
    pub fn new(decrypted: &[u8]) -> Result<BabelConstants> {
        let mut parser = Parser::new(decrypted);
        Ok(BabelConstants {
            ints: read_array(&mut parser)?,
            longs: read_array(&mut parser)?,
            floats: read_array(&mut parser)?,
            doubles: read_array(&mut parser)?,
        })
    }

    /// The `i32` at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if `index` is out of range.
    pub fn decrypt_int32(&self, index: usize) -> Result<i32> {
        get(&self.ints, index, "Int32")
    }

    /// The `i64` at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if `index` is out of range.
    pub fn decrypt_int64(&self, index: usize) -> Result<i64> {
        get(&self.longs, index, "Int64")
    }

    /// The `f32` at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if `index` is out of range.
    pub fn decrypt_single(&self, index: usize) -> Result<f32> {
        get(&self.floats, index, "Single")
    }

    /// The `f64` at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if `index` is out of range.
    pub fn decrypt_double(&self, index: usize) -> Result<f64> {
        get(&self.doubles, index, "Double")
    }
}

fn get<T: Copy>(values: &[T], index: usize, kind: &str) -> Result<T> {
    values
        .get(index)
        .copied()
        .ok_or_else(|| invalid_argument!("Invalid {} constant index {}", kind, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&3i32.to_le_bytes());
        for v in [30i32, 20, 10] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&(-5i64).to_le_bytes());
        data.extend_from_slice(&2i32.to_le_bytes());
        data.extend_from_slice(&2.5f32.to_le_bytes());
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&0i32.to_le_bytes());
        data
    }

    #[test]
    fn reversed_arrays() {
        let constants = BabelConstants::new(&table()).unwrap();
        assert_eq!(constants.decrypt_int32(0).unwrap(), 10);
        assert_eq!(constants.decrypt_int32(2).unwrap(), 30);
        assert_eq!(constants.decrypt_int64(0).unwrap(), -5);
        assert_eq!(constants.decrypt_single(0).unwrap(), 1.5);
        assert_eq!(constants.decrypt_single(1).unwrap(), 2.5);
        assert!(constants.decrypt_int32(3).is_err());
        assert!(constants.decrypt_double(0).is_err());
    }

    #[test]
    fn corrupt_counts() {
        let mut data = table();
        data.truncate(data.len() - 4);
        assert!(BabelConstants::new(&data).is_err());

        assert!(BabelConstants::new(&(-1i32).to_le_bytes()).is_err());
        assert!(BabelConstants::new(&i32::MAX.to_le_bytes()).is_err());
    }
}
