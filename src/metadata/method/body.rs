//! Parsing and verification of CIL method bodies.
//!
//! A method body starts with either a one byte tiny header or a twelve byte fat header, followed
//! by the code and, for fat bodies with `MORE_SECTS`, a 4-byte aligned list of extra data sections
//! that carry the exception handling clauses.
//!
//! # Examples
//!
//! ```rust
//! use dotunpack::metadata::method::{verify_method_body, MethodBody};
//!
//! // tiny header, 2 bytes of code: ldnull; ret
//! let data = [0x0A, 0x14, 0x2A];
//! assert!(verify_method_body(&data));
//!
//! let body = MethodBody::from(&data)?;
//! assert_eq!(body.header.code_size, 2);
//! assert_eq!(body.size(), 3);
//! # Ok::<(), dotunpack::Error>(())
//! ```
//!
//! # References
//! - ECMA-335 6th Edition, Partition II, Section 25.4 - Method Header Format

use crate::{
    file::io::{read_le, read_le_at},
    metadata::method::{
        ExceptionHandler, ExceptionHandlerFlags, MethodBodyFlags, SectionFlags,
        SECTION_RESERVED_MASK, STANDALONE_SIG_TABLE,
    },
    Result,
};

/// Size of a fat header in bytes.
const FAT_HEADER_SIZE: usize = 12;
/// Size of one fat exception clause.
const FAT_CLAUSE_SIZE: usize = 24;
/// Size of one small exception clause.
const SMALL_CLAUSE_SIZE: usize = 12;

/// The tiny or fat header of a method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodBodyHeader {
    /// `true` for a fat header
    pub is_fat: bool,
    /// Header flags, only the format bits for tiny headers
    pub flags: MethodBodyFlags,
    /// Size of the header in bytes
    pub header_size: usize,
    /// Maximum evaluation stack depth, 8 for tiny headers
    pub max_stack: u16,
    /// Size of the code in bytes
    pub code_size: usize,
    /// `StandAloneSig` token of the local variables, or 0
    pub local_var_sig_token: u32,
}

impl MethodBodyHeader {
    /// Parse the header at the start of `data`.
    ///
    /// The code itself is not required to be present, see [`MethodBody::from`] for that.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the header is neither tiny nor a 12 byte fat header,
    /// or the code size does not fit into an `i32`, and [`crate::Error::OutOfBounds`] if the
    /// header is truncated.
    pub fn parse(data: &[u8]) -> Result<MethodBodyHeader> {
        if data.is_empty() {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        }

        let first_byte = read_le::<u8>(data)?;
        match MethodBodyFlags::from_bits_truncate(u16::from(first_byte & 0b_00000011_u8)) {
            MethodBodyFlags::TINY_FORMAT => Ok(MethodBodyHeader {
                is_fat: false,
                flags: MethodBodyFlags::TINY_FORMAT,
                header_size: 1,
                max_stack: 8,
                code_size: usize::from(first_byte >> 2),
                local_var_sig_token: 0,
            }),
            MethodBodyFlags::FAT_FORMAT => {
                let mut offset = 0;
                let first_duo = read_le_at::<u16>(data, &mut offset)?;
                let max_stack = read_le_at::<u16>(data, &mut offset)?;
                let code_size = read_le_at::<u32>(data, &mut offset)?;
                let local_var_sig_token = read_le_at::<u32>(data, &mut offset)?;

                let header_size = usize::from(first_duo >> 12) * 4;
                if header_size != FAT_HEADER_SIZE {
                    return Err(malformed_error!("Invalid fat header size - {}", header_size));
                }
                if i32::try_from(code_size).is_err() {
                    return Err(malformed_error!("Invalid code size - 0x{:08X}", code_size));
                }

                Ok(MethodBodyHeader {
                    is_fat: true,
                    flags: MethodBodyFlags::from_bits_truncate(first_duo & 0x0FFF),
                    header_size,
                    max_stack,
                    code_size: code_size as usize,
                    local_var_sig_token,
                })
            }
            _ => Err(malformed_error!(
                "MethodHeader is neither FAT nor TINY - {}",
                first_byte
            )),
        }
    }

    /// Header plus code size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.header_size + self.code_size
    }

    /// `true` if the locals are zero-initialised.
    #[must_use]
    pub fn is_init_locals(&self) -> bool {
        self.is_fat && self.flags.contains(MethodBodyFlags::INIT_LOCALS)
    }

    /// `true` if extra data sections follow the code.
    #[must_use]
    pub fn has_more_sections(&self) -> bool {
        self.is_fat && self.flags.contains(MethodBodyFlags::MORE_SECTS)
    }
}

/// A method body header together with its exception handling clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// The tiny or fat header
    pub header: MethodBodyHeader,
    /// Exception clauses from all extra sections, in file order
    pub exception_handlers: Vec<ExceptionHandler>,
    /// Size of the extra sections including alignment padding
    pub size_sections: usize,
}

impl MethodBody {
    /// Parse and validate a complete method body.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an invalid header, local signature token or extra
    /// section, and [`crate::Error::OutOfBounds`] if the code or a section runs past `data`.
    pub fn from(data: &[u8]) -> Result<MethodBody> {
        let header = MethodBodyHeader::parse(data)?;

        let sig_table = header.local_var_sig_token >> 24;
        if header.local_var_sig_token != 0 && sig_table != STANDALONE_SIG_TABLE {
            return Err(malformed_error!(
                "Invalid local variable signature token - 0x{:08X}",
                header.local_var_sig_token
            ));
        }

        let code_end = header.size();
        if code_end > data.len() {
            return Err(out_of_bounds_error!());
        }

        let (exception_handlers, sections_end) = if header.has_more_sections() {
            read_sections(data, code_end)?
        } else {
            (Vec::new(), code_end)
        };

        Ok(MethodBody {
            header,
            exception_handlers,
            size_sections: sections_end - code_end,
        })
    }

    /// Total size of the body, header, code and extra sections.
    #[must_use]
    pub fn size(&self) -> usize {
        self.header.size() + self.size_sections
    }
}

/// Walk the extra data sections starting at the aligned `code_end`. Returns the clauses and the
/// offset just past the last section.
fn read_sections(data: &[u8], code_end: usize) -> Result<(Vec<ExceptionHandler>, usize)> {
    let mut handlers = Vec::new();
    let mut cursor = code_end;

    loop {
        cursor = (cursor + 3) & !3;

        let raw_flags = read_le::<u8>(data.get(cursor..).ok_or(out_of_bounds_error!())?)?;
        if raw_flags & SECTION_RESERVED_MASK != 0 {
            return Err(malformed_error!(
                "Reserved method section flags set - 0x{:02X}",
                raw_flags
            ));
        }

        let flags = SectionFlags::from_bits_truncate(raw_flags);
        if !flags.contains(SectionFlags::EHTABLE) {
            return Err(malformed_error!("Method section is not an exception table"));
        }

        let mut offset = cursor;
        if flags.contains(SectionFlags::FAT_FORMAT) {
            let size = (read_le_at::<u32>(data, &mut offset)? >> 8) as usize;
            let clauses = size / FAT_CLAUSE_SIZE;
            if offset + clauses * FAT_CLAUSE_SIZE > data.len() {
                return Err(out_of_bounds_error!());
            }

            for _ in 0..clauses {
                // The fat flags field is 32 bit wide but only the low 16 bits are defined
                #[allow(clippy::cast_possible_truncation)]
                let kind = read_le_at::<u32>(data, &mut offset)? as u16;
                handlers.push(ExceptionHandler {
                    flags: ExceptionHandlerFlags::from_bits_truncate(kind),
                    try_offset: read_le_at::<u32>(data, &mut offset)?,
                    try_length: read_le_at::<u32>(data, &mut offset)?,
                    handler_offset: read_le_at::<u32>(data, &mut offset)?,
                    handler_length: read_le_at::<u32>(data, &mut offset)?,
                    class_token_or_filter: read_le_at::<u32>(data, &mut offset)?,
                });
            }
        } else {
            offset += 1;
            let size = usize::from(read_le_at::<u8>(data, &mut offset)?);
            offset += 2;
            let clauses = size / SMALL_CLAUSE_SIZE;
            if offset + clauses * SMALL_CLAUSE_SIZE > data.len() {
                return Err(out_of_bounds_error!());
            }

            for _ in 0..clauses {
                handlers.push(ExceptionHandler {
                    flags: ExceptionHandlerFlags::from_bits_truncate(read_le_at::<u16>(
                        data,
                        &mut offset,
                    )?),
                    try_offset: u32::from(read_le_at::<u16>(data, &mut offset)?),
                    try_length: u32::from(read_le_at::<u8>(data, &mut offset)?),
                    handler_offset: u32::from(read_le_at::<u16>(data, &mut offset)?),
                    handler_length: u32::from(read_le_at::<u8>(data, &mut offset)?),
                    class_token_or_filter: read_le_at::<u32>(data, &mut offset)?,
                });
            }
        }

        cursor = offset;
        if !flags.contains(SectionFlags::MORE_SECTS) {
            return Ok((handlers, cursor));
        }
    }
}

/// Check that `data` starts with a structurally valid method body.
///
/// The header must be tiny or a 12 byte fat header, the code must fit, a local signature token
/// must reference `StandAloneSig`, and every extra section must be an exception table with the
/// reserved bits clear that lies entirely within `data`.
#[must_use]
pub fn verify_method_body(data: &[u8]) -> bool {
    MethodBody::from(data).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fat_header(flags: u16, max_stack: u16, code_size: u32, local_sig: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&((3u16 << 12) | flags).to_le_bytes());
        data.extend_from_slice(&max_stack.to_le_bytes());
        data.extend_from_slice(&code_size.to_le_bytes());
        data.extend_from_slice(&local_sig.to_le_bytes());
        data
    }

    #[test]
    fn tiny() {
        // ldarg.0; ldfld; ret with a 4 byte token
        let data = [0x1A, 0x02, 0x7B, 0x01, 0x00, 0x00, 0x04, 0x2A];

        let body = MethodBody::from(&data).unwrap();

        assert!(!body.header.is_fat);
        assert!(!body.header.is_init_locals());
        assert_eq!(body.header.max_stack, 8);
        assert_eq!(body.header.code_size, 6);
        assert_eq!(body.header.header_size, 1);
        assert_eq!(body.size(), 7);
        assert!(body.exception_handlers.is_empty());
        assert!(verify_method_body(&data));
    }

    #[test]
    fn tiny_truncated() {
        assert!(!verify_method_body(&[0x1A, 0x02, 0x7B]));
        assert!(!verify_method_body(&[]));
    }

    #[test]
    fn fat() {
        let mut data = fat_header(0x10, 5, 4, 0x1100_0059);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x2A]);

        let body = MethodBody::from(&data).unwrap();

        assert!(body.header.is_fat);
        assert!(body.header.is_init_locals());
        assert_eq!(body.header.max_stack, 5);
        assert_eq!(body.header.code_size, 4);
        assert_eq!(body.header.local_var_sig_token, 0x1100_0059);
        assert_eq!(body.size(), 16);
    }

    #[test]
    fn fat_invalid() {
        let mut data = fat_header(0x10, 5, 4, 0x1B00_0001);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x2A]);
        assert!(!verify_method_body(&data));

        let mut data = fat_header(0x10, 5, 0x8000_0000, 0);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x2A]);
        assert!(!verify_method_body(&data));

        let mut data = fat_header(0x10, 5, 4, 0);
        data[1] = 0x20;
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x2A]);
        assert!(!verify_method_body(&data));

        let data = fat_header(0x10, 5, 4, 0);
        assert!(!verify_method_body(&data));
    }

    #[test]
    fn fat_small_exception_section() {
        let mut data = fat_header(0x18, 1, 6, 0);
        data.extend_from_slice(&[0x00, 0xDE, 0x00, 0x00, 0x00, 0x2A]);
        // padding to 4
        data.extend_from_slice(&[0x00, 0x00]);
        // small EH section, one clause
        data.extend_from_slice(&[0x01, 0x10, 0x00, 0x00]);
        data.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x03]);
        data.extend_from_slice(&0u32.to_le_bytes());

        let body = MethodBody::from(&data).unwrap();

        assert_eq!(body.exception_handlers.len(), 1);
        let clause = body.exception_handlers[0];
        assert_eq!(clause.flags, ExceptionHandlerFlags::FINALLY);
        assert_eq!(clause.try_offset, 0);
        assert_eq!(clause.try_length, 2);
        assert_eq!(clause.handler_offset, 2);
        assert_eq!(clause.handler_length, 3);
        assert_eq!(body.size(), data.len());
    }

    #[test]
    fn fat_exception_sections_chained() {
        let mut data = fat_header(0x18, 1, 4, 0);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x2A]);
        // small section with MORE_SECTS and no clauses
        data.extend_from_slice(&[0x81, 0x04, 0x00, 0x00]);
        // fat section with one clause
        data.extend_from_slice(&[0x41, 0x1C, 0x00, 0x00]);
        for value in [1u32, 0, 2, 2, 1, 3] {
            data.extend_from_slice(&value.to_le_bytes());
        }

        let body = MethodBody::from(&data).unwrap();

        assert_eq!(body.exception_handlers.len(), 1);
        assert_eq!(body.exception_handlers[0].flags, ExceptionHandlerFlags::FILTER);
        assert_eq!(body.exception_handlers[0].class_token_or_filter, 3);
        assert!(verify_method_body(&data));
    }

    #[test]
    fn fat_exception_section_invalid() {
        let mut base = fat_header(0x18, 1, 4, 0);
        base.extend_from_slice(&[0x00, 0x00, 0x00, 0x2A]);

        // not an exception table
        let mut data = base.clone();
        data.extend_from_slice(&[0x00, 0x04, 0x00, 0x00]);
        assert!(!verify_method_body(&data));

        // reserved bit
        let mut data = base.clone();
        data.extend_from_slice(&[0x03, 0x04, 0x00, 0x00]);
        assert!(!verify_method_body(&data));

        // clause past the end
        let mut data = base.clone();
        data.extend_from_slice(&[0x01, 0x10, 0x00, 0x00, 0x00]);
        assert!(!verify_method_body(&data));

        // missing section
        assert!(!verify_method_body(&base));
    }
}
