//! Cursor-based byte stream parser.
//!
//! [`crate::file::parser::Parser`] is the workhorse behind every container format in this crate.
//! It wraps a byte slice with a position and exposes bounds-checked reads for primitive values
//! and the handful of variable-length encodings obfuscators borrow from the .NET runtime:
//!
//! - ECMA-335 compressed integers ([`crate::file::parser::Parser::read_compressed_uint`])
//! - the looser "variable length" integer used by Babel.NET and Crypto Obfuscator, which
//!   accepts a 4-byte form with a 6-bit head ([`crate::file::parser::Parser::read_variable_length_uint`])
//! - `BinaryReader` style 7-bit integers and length prefixed UTF-8 strings
//!   ([`crate::file::parser::Parser::read_prefixed_string_utf8`])
//!
//! # Examples
//!
//! ```rust
//! use dotunpack::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
//! let mut parser = Parser::new(&data);
//!
//! let first = parser.read_le::<u32>()?;
//! assert_eq!(first, 0x04030201);
//!
//! parser.seek(6)?;
//! let last_bytes = parser.read_le::<u16>()?;
//! assert_eq!(last_bytes, 0x0807);
//! # Ok::<(), dotunpack::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, CilIO},
    Result,
};

/// A generic binary data parser.
///
/// The parser maintains an internal position cursor and provides bounds checking to prevent
/// buffer overruns when reading malformed or truncated data. Reads that fail leave the cursor
/// where it was before the read.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// Seeking to `len()` is allowed and leaves the parser at end of data.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let end = self.calc_end_position(step)?;
        self.position = end;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is at or beyond the data length.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.position)
            .copied()
            .ok_or(out_of_bounds_error!())
    }

    /// Peek at a value of type `T` in little-endian format without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `T` would exceed the data length.
    pub fn peek_le<T: CilIO>(&self) -> Result<T> {
        let mut temp_position = self.position;
        read_le_at::<T>(self.data, &mut temp_position)
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a `System.IO.BinaryReader` style boolean, any non-zero byte is `true`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if no byte is left.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_le::<u8>()? != 0)
    }

    /// Read a compressed unsigned integer as defined in ECMA-335 II.23.2.
    ///
    /// - Values 0-127: 1 byte (0xxxxxxx)
    /// - Values 128-16383: 2 bytes (10xxxxxx xxxxxxxx)
    /// - Values 16384-536870911: 4 bytes (110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for invalid compressed uint format.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.peek_byte()?;
        if (first_byte & 0xE0) == 0xE0 {
            return Err(malformed_error!("Invalid compressed uint - {}", first_byte));
        }

        self.read_packed_uint(0x1F)
    }

    /// Read the variable length integer used by Babel.NET and Crypto Obfuscator.
    ///
    /// The layout matches [`Parser::read_compressed_uint`] for the 1 and 2 byte forms, but every
    /// lead byte with the two top bits set selects the 4-byte form and contributes its low
    /// 6 bits.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_variable_length_uint(&mut self) -> Result<u32> {
        self.read_packed_uint(0x3F)
    }

    fn read_packed_uint(&mut self, wide_mask: u8) -> Result<u32> {
        let start = self.position;
        let result = (|| {
            let first_byte = self.read_le::<u8>()?;

            // 1-byte encoding: 0xxxxxxx
            if (first_byte & 0x80) == 0 {
                return Ok(u32::from(first_byte));
            }

            // 2-byte encoding: 10xxxxxx xxxxxxxx
            if (first_byte & 0x40) == 0 {
                let second_byte = self.read_le::<u8>()?;
                return Ok(((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte));
            }

            let b1 = u32::from(self.read_le::<u8>()?);
            let b2 = u32::from(self.read_le::<u8>()?);
            let b3 = u32::from(self.read_le::<u8>()?);
            Ok((u32::from(first_byte & wide_mask) << 24) | (b1 << 16) | (b2 << 8) | b3)
        })();

        if result.is_err() {
            self.position = start;
        }
        result
    }

    /// Read a 7-bit encoded integer, as written by `System.IO.BinaryWriter.Write7BitEncodedInt`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] if the value does not fit into 32 bits.
    pub fn read_7bit_encoded_int(&mut self) -> Result<u32> {
        let start = self.position;
        let mut value = 0u32;
        let mut shift = 0;

        loop {
            let Some(&byte) = self.data.get(self.position) else {
                self.position = start;
                return Err(out_of_bounds_error!());
            };
            self.position += 1;

            value |= u32::from(byte & 0x7F) << shift;
            shift += 7;

            if (byte & 0x80) == 0 {
                break;
            }

            if shift >= 32 {
                self.position = start;
                return Err(malformed_error!(
                    "7-bit encoded integer overflow after {} bits",
                    shift
                ));
            }
        }

        Ok(value)
    }

    /// Read a length prefixed UTF-8 string, as written by `System.IO.BinaryWriter.Write(string)`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the string exceeds the data length or
    /// [`crate::Error::Malformed`] for invalid UTF-8.
    pub fn read_prefixed_string_utf8(&mut self) -> Result<String> {
        let start = self.position;
        let length = self.read_7bit_encoded_int()? as usize;
        let bytes = match self.read_bytes(length) {
            Ok(bytes) => bytes,
            Err(error) => {
                self.position = start;
                return Err(error);
            }
        };

        String::from_utf8(bytes.to_vec()).map_err(|e| {
            malformed_error!(
                "Invalid UTF-8 string at offset {}-{}: {}",
                self.position - length,
                self.position,
                e.utf8_error()
            )
        })
    }

    /// Returns the number of bytes left after the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Verify that at least `needed` bytes are left.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer bytes are available.
    pub fn ensure_remaining(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(out_of_bounds_error!());
        }
        Ok(())
    }

    /// Calculate the end position of a read of `length` bytes from the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on overflow or if the end lies past the data.
    pub fn calc_end_position(&self, length: usize) -> Result<usize> {
        let end = self
            .position
            .checked_add(length)
            .ok_or(out_of_bounds_error!())?;

        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(end)
    }

    /// Read `length` raw bytes and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `length` bytes remain.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.calc_end_position(length)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Read an `i32` length followed by that many raw bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a negative length and
    /// [`crate::Error::OutOfBounds`] if the blob exceeds the data length.
    pub fn read_i32_prefixed_bytes(&mut self) -> Result<&'a [u8]> {
        let start = self.position;
        let length = self.read_le::<i32>()?;
        let Ok(length) = usize::try_from(length) else {
            self.position = start;
            return Err(malformed_error!("Invalid blob length - {}", length));
        };

        match self.read_bytes(length) {
            Ok(bytes) => Ok(bytes),
            Err(error) => {
                self.position = start;
                Err(error)
            }
        }
    }

    /// Read a byte length followed by that many raw bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the blob exceeds the data length.
    pub fn read_u8_prefixed_bytes(&mut self) -> Result<&'a [u8]> {
        let start = self.position;
        let length = self.read_le::<u8>()?;
        match self.read_bytes(usize::from(length)) {
            Ok(bytes) => Ok(bytes),
            Err(error) => {
                self.position = start;
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_read_compressed_uint() {
        let test_cases = vec![
            (vec![0x03], 3),
            (vec![0x7F], 0x7F),
            (vec![0x80, 0x80], 0x80),
            (vec![0xBF, 0xFF], 0x3FFF),
            (vec![0xC0, 0x00, 0x40, 0x00], 0x4000),
            (vec![0xDF, 0xFF, 0xFF, 0xFF], 0x1FFF_FFFF),
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            assert_eq!(parser.read_compressed_uint().unwrap(), expected);
            assert!(!parser.has_more_data());
        }

        let mut parser = Parser::new(&[0xE0, 0x00, 0x00, 0x00]);
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_read_variable_length_uint() {
        let mut parser = Parser::new(&[0xE1, 0x02, 0x03, 0x04]);
        assert_eq!(parser.read_variable_length_uint().unwrap(), 0x2102_0304);

        let mut parser = Parser::new(&[0x81, 0x05]);
        assert_eq!(parser.read_variable_length_uint().unwrap(), 0x105);

        let mut parser = Parser::new(&[0xC1, 0x02]);
        assert!(parser.read_variable_length_uint().is_err());
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn test_read_7bit_encoded_int() {
        let mut parser = Parser::new(&[0x7F]);
        assert_eq!(parser.read_7bit_encoded_int().unwrap(), 0x7F);

        let mut parser = Parser::new(&[0x80, 0x01]);
        assert_eq!(parser.read_7bit_encoded_int().unwrap(), 0x80);

        let mut parser = Parser::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert_eq!(parser.read_7bit_encoded_int().unwrap(), u32::MAX);

        let mut parser = Parser::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        assert!(parser.read_7bit_encoded_int().is_err());
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn test_read_prefixed_string_utf8() {
        let mut parser = Parser::new(&[0x05, b'H', b'e', b'l', b'l', b'o', 0x01]);
        assert_eq!(parser.read_prefixed_string_utf8().unwrap(), "Hello");
        assert_eq!(parser.pos(), 6);

        let mut parser = Parser::new(&[0x05, b'H', b'e']);
        assert!(parser.read_prefixed_string_utf8().is_err());
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn test_seek_and_advance() {
        let data = [0u8; 8];
        let mut parser = Parser::new(&data);
        parser.advance_by(3).unwrap();
        assert_eq!(parser.pos(), 3);
        assert!(parser.advance_by(6).is_err());
        assert_eq!(parser.pos(), 3);

        parser.seek(8).unwrap();
        assert!(!parser.has_more_data());
        assert!(parser.seek(9).is_err());
        assert!(parser.read_le::<u8>().is_err());
    }

    #[test]
    fn test_prefixed_bytes() {
        let data = [0x02, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0x01, 0xCC];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_i32_prefixed_bytes().unwrap(), &[0xAA, 0xBB]);
        assert_eq!(parser.read_u8_prefixed_bytes().unwrap(), &[0xCC]);

        let negative = [0xFF, 0xFF, 0xFF, 0xFF];
        let mut parser = Parser::new(&negative);
        assert!(matches!(
            parser.read_i32_prefixed_bytes(),
            Err(Error::Malformed { .. })
        ));
        assert_eq!(parser.pos(), 0);
    }
}
