//! Stream header of the metadata stream directory.
//!
//! # Reference
//! - [ECMA-335 II.24.2.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::io::read_le, Result};

/// Longest stream name the runtime accepts, terminator excluded.
const MAX_NAME_LENGTH: usize = 31;

/// One entry of the stream directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream, relative to the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Name of the stream, e.g. `#US`
    pub name: String,
}

impl StreamHeader {
    /// Parse one stream header from the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for truncated input and [`crate::Error::Malformed`]
    /// if the name is unterminated or does not start with `#`.
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(out_of_bounds_error!());
        }

        let name_bytes = &data[8..];
        let Some(name_len) = name_bytes
            .iter()
            .take(MAX_NAME_LENGTH + 1)
            .position(|&b| b == 0)
        else {
            return Err(malformed_error!("Unterminated stream header name"));
        };

        let name = name_bytes[..name_len]
            .iter()
            .map(|&b| char::from(b))
            .collect::<String>();
        if !name.starts_with('#') {
            return Err(malformed_error!("Invalid stream header name - {}", name));
        }
        if !["#Strings", "#US", "#Blob", "#GUID", "#~", "#-"].contains(&name.as_str()) {
            log::debug!("Non-standard metadata stream {}", name);
        }

        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            name,
        })
    }

    /// Bytes occupied by this header in the directory, name padded to 4.
    #[must_use]
    pub fn header_size(&self) -> usize {
        8 + ((self.name.len() + 1 + 3) & !3)
    }
}
