//! Metadata root header and stream directory.
//!
//! The root sits at the metadata RVA of the [`crate::metadata::cor20header::Cor20Header`] and
//! names every heap of the assembly. Protectors add bogus or duplicated streams, so the directory
//! is read leniently: any `#`-prefixed name is accepted and the first stream of a given name wins
//! on lookup, which is how the runtime resolves them as well.
//!
//! # Example
//!
//! ```rust
//! use dotunpack::metadata::root::MetadataRoot;
//! let root = MetadataRoot::read(&[
//!            0x42, 0x53, 0x4A, 0x42,
//!            0x01, 0x00,
//!            0x01, 0x00,
//!            0x00, 0x00, 0x00, 0x00,
//!            0x04, 0x00, 0x00, 0x00,
//!            b'v', b'4', 0x00, 0x00,
//!            0x00, 0x00,
//!            0x01, 0x00,
//!            0x20, 0x00, 0x00, 0x00, // StreamHeader
//!            0x04, 0x00, 0x00, 0x00,
//!            b'#', b'U', b'S', 0x00,
//!            0x00, 0x00, 0x00, 0x00,
//!        ])?;
//! assert_eq!(root.version, "v4");
//! assert_eq!(root.stream("#US").map(|s| s.size), Some(4));
//! # Ok::<(), dotunpack::Error>(())
//! ```
//!
//! # References
//!
//! - [ECMA-335 II.24.2.1: Metadata root](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Result,
};

/// The magic signature `BSJB` at the start of every metadata root.
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// Upper bound on the number of stream headers accepted in a directory.
const MAX_STREAMS: u16 = 16;

/// The metadata root, ECMA-335 II.24.2.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRoot {
    /// Magic signature, always [`CIL_HEADER_MAGIC`]
    pub signature: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Length of the padded version string
    pub length: u32,
    /// Version string, trailing NULs removed
    pub version: String,
    /// Reserved flags
    pub flags: u16,
    /// Stream directory in file order
    pub stream_headers: Vec<StreamHeader>,
}

impl MetadataRoot {
    /// Parse the root from the bytes at the start of the metadata directory.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if a stream lies outside `data`, and
    /// [`crate::Error::Malformed`] for a bad magic or a stream directory that cannot be read.
    pub fn read(data: &[u8]) -> Result<MetadataRoot> {
        if data.len() < 20 {
            return Err(out_of_bounds_error!());
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - 0x{:08X}",
                signature
            ));
        }

        let mut offset = 4;
        let major_version = read_le_at::<u16>(data, &mut offset)?;
        let minor_version = read_le_at::<u16>(data, &mut offset)?;
        offset += 4;
        let length = read_le_at::<u32>(data, &mut offset)?;

        let Some(version_bytes) = (length as usize)
            .checked_add(16)
            .and_then(|end| data.get(16..end))
        else {
            return Err(out_of_bounds_error!());
        };
        let version = version_bytes
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| char::from(b))
            .collect::<String>();

        offset = 16 + length as usize;
        let flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_count = read_le_at::<u16>(data, &mut offset)?;
        if stream_count == 0 || stream_count > MAX_STREAMS {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut stream_headers = Vec::with_capacity(stream_count as usize);
        for _ in 0..stream_count {
            let Some(remaining) = data.get(offset..) else {
                return Err(out_of_bounds_error!());
            };

            let stream = StreamHeader::from(remaining)?;
            match stream.offset.checked_add(stream.size) {
                Some(end) if end as usize <= data.len() => {}
                Some(_) => return Err(out_of_bounds_error!()),
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        stream.offset,
                        stream.size
                    ))
                }
            }

            offset += stream.header_size();
            stream_headers.push(stream);
        }

        Ok(MetadataRoot {
            signature,
            major_version,
            minor_version,
            length,
            version,
            flags,
            stream_headers,
        })
    }

    /// The first stream header called `name`.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const ROOT: [u8; 56] = [
        0x42, 0x53, 0x4A, 0x42,
        0x01, 0x00,
        0x01, 0x00,
        0x00, 0x00, 0x00, 0x00,
        0x08, 0x00, 0x00, 0x00,
        b'v', b'4', b'.', b'0', 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00,
        0x02, 0x00,

        0x30, 0x00, 0x00, 0x00, // StreamHeader #US
        0x04, 0x00, 0x00, 0x00,
        b'#', b'U', b'S', 0x00,

        0x34, 0x00, 0x00, 0x00, // StreamHeader #Blob
        0x04, 0x00, 0x00, 0x00,
        b'#', b'B', b'l', b'o', b'b', 0x00, 0x00, 0x00,
    ];

    fn with_heaps() -> Vec<u8> {
        let mut data = ROOT.to_vec();
        data.resize(0x38, 0);
        data
    }

    #[test]
    fn crafted() {
        let root = MetadataRoot::read(&with_heaps()).unwrap();

        assert_eq!(root.signature, CIL_HEADER_MAGIC);
        assert_eq!(root.major_version, 1);
        assert_eq!(root.minor_version, 1);
        assert_eq!(root.length, 8);
        assert_eq!(root.version, "v4.0");
        assert_eq!(root.stream_headers.len(), 2);
        assert_eq!(root.stream("#US").unwrap().offset, 0x30);
        assert_eq!(root.stream("#Blob").unwrap().offset, 0x34);
        assert!(root.stream("#Strings").is_none());
    }

    #[test]
    fn stream_past_end() {
        let mut data = with_heaps();
        data[28] = 0x40;
        assert!(matches!(
            MetadataRoot::read(&data),
            Err(crate::Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn bad_magic() {
        let mut data = with_heaps();
        data[0] = 0;
        assert!(MetadataRoot::read(&data).is_err());
    }
}
