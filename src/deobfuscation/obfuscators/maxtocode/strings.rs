//! The MaxtoCode string table.
//!
//! Protected code calls a runtime helper with a one-based string id. The strings themselves
//! sit in an encrypted table whose RVA is recorded masked in the [`PeHeader`]: a count, then
//! length-prefixed entries, all XORed with a running McKey index.

use crate::{
    deobfuscation::{
        config::StringEncoding,
        obfuscators::maxtocode::{header::PeHeader, mckey::McKey},
    },
    file::io::read_le,
    utils::{decode_latin1, decode_utf16le_lossy},
    Image, Result,
};

/// The key index wraps at this value.
const KEY_WINDOW: usize = 0x1FF0;

/// Decrypted MaxtoCode string table.
///
/// # Examples
///
/// ```rust,no_run
/// use dotunpack::deobfuscation::obfuscators::maxtocode::{McKey, McStringDecrypter, PeHeader};
/// use dotunpack::deobfuscation::StringEncoding;
/// use dotunpack::File;
/// use std::path::Path;
///
/// let file = File::from_file(Path::new("protected.exe"))?;
/// let header = PeHeader::new(&file)?;
/// let mc_key = McKey::read(&file, &header)?;
///
/// let strings = McStringDecrypter::new(&file, &header, &mc_key, StringEncoding::Utf16Le)?;
/// println!("{}", strings.decrypt(1)?);
/// # Ok::<(), dotunpack::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct McStringDecrypter {
    strings: Vec<String>,
}

impl McStringDecrypter {
    /// Decrypt the whole table of `image`. An image without a table gives an empty decrypter.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a negative count or length and
    /// [`crate::Error::OutOfBounds`] if the table runs past the end of the file.
    pub fn new<I: Image + ?Sized>(
        image: &I,
        header: &PeHeader,
        mc_key: &McKey,
        encoding: StringEncoding,
    ) -> Result<McStringDecrypter> {
        let rva = header.rva(0x0AF0, mc_key.read_u32(0x46)?)?;
        if rva == 0 {
            return Ok(McStringDecrypter::default());
        }

        let data = image.data();
        let mut offset = image.rva_to_offset(rva)?;
        let count = read_i32(data, offset)? ^ mc_key.read_u32(0)? as i32;
        let count =
            usize::try_from(count).map_err(|_| malformed_error!("Invalid string count {}", count))?;
        offset += 4;

        let mut strings = Vec::new();
        let mut ki = 2;
        for _ in 0..count {
            let length = read_i32(data, offset)? ^ mc_key.read_u32(ki)? as i32;
            let length = usize::try_from(length)
                .map_err(|_| malformed_error!("Invalid string length {}", length))?;
            ki += 2;
            if ki >= KEY_WINDOW {
                ki = 0;
            }
            offset += 4;

            let encrypted = data
                .get(offset..offset + length)
                .ok_or(out_of_bounds_error!())?;
            let mut bytes = Vec::with_capacity(length);
            for b in encrypted {
                bytes.push(b ^ mc_key.byte(ki)?);
                ki = (ki + 1) % KEY_WINDOW;
            }
            offset += length;

            strings.push(decode(&bytes, encoding));
        }

        log::debug!("Decrypted {} MaxtoCode strings", strings.len());
        Ok(McStringDecrypter { strings })
    }

    /// The string with the one-based `id`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if there is no such string.
    pub fn decrypt(&self, id: u32) -> Result<&str> {
        (id as usize)
            .checked_sub(1)
            .and_then(|index| self.strings.get(index))
            .map(String::as_str)
            .ok_or_else(|| invalid_argument!("Invalid string id {}", id))
    }

    /// All strings in id order.
    #[must_use]
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Number of strings in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns `true` if the image had no string table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

fn read_i32(data: &[u8], offset: usize) -> Result<i32> {
    read_le::<i32>(data.get(offset..).ok_or(out_of_bounds_error!())?)
}

fn decode(bytes: &[u8], encoding: StringEncoding) -> String {
    let text = match encoding {
        StringEncoding::Utf16Le => decode_utf16le_lossy(bytes),
        StringEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        StringEncoding::Latin1 => decode_latin1(bytes),
    };
    text.trim_end_matches('\0').to_string()
}
