//! In-place decryption of the managed resources and the `#US` heap.
//!
//! Both regions are decrypted inside a caller-owned copy of the file bytes, which the caller
//! writes back or hands to its metadata reader. The image is only used for address translation
//! and for cross-checking the locations against the CLR header.

use crate::{
    deobfuscation::obfuscators::maxtocode::{
        header::PeHeader,
        mckey::{McKey, MC_KEY_SIZE},
    },
    file::parser::Parser,
    metadata::Metadata,
    utils::decode_utf16le_lossy,
    Image, Result,
};

/// Decrypt the managed resources in `file_data`.
///
/// Returns the number of decrypted bytes, 0 if the image has no encrypted resources.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the recorded region is not inside `file_data`.
pub fn decrypt_resources<I: Image + ?Sized>(
    image: &I,
    header: &PeHeader,
    mc_key: &McKey,
    file_data: &mut [u8],
) -> Result<usize> {
    let rva = header.rva(0x0E10, mc_key.read_u32(0x00A0)?)?;
    let size = header.read_u32(0x0E14)? ^ mc_key.read_u32(0x00AA)?;
    if rva == 0 || size == 0 {
        return Ok(0);
    }

    let resources = Metadata::read(image).ok().and_then(|metadata| metadata.resources());
    if resources != Some((rva, size)) {
        log::warn!("Invalid resource RVA and size found");
    }

    log::debug!("Decrypting resources @ RVA {:08X}, {} bytes", rva, size);
    let offset = image.rva_to_offset(rva)?;
    let region = file_data
        .get_mut(offset..offset + size as usize)
        .ok_or(out_of_bounds_error!())?;
    for (b, k) in region.iter_mut().zip(mc_key.as_bytes().iter().cycle()) {
        *b ^= k;
    }

    Ok(region.len())
}

/// Decrypt every string of the `#US` heap in `file_data`.
///
/// Returns the number of decrypted strings, 0 if the heap is not encrypted.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the heap or one of its blobs is not inside
/// `file_data`, and [`crate::Error::Malformed`] for a corrupt blob length.
pub fn decrypt_us_heap<I: Image + ?Sized>(
    image: &I,
    header: &PeHeader,
    mc_key: &McKey,
    file_data: &mut [u8],
) -> Result<usize> {
    let rva = header.rva(0x0E00, mc_key.read_u32(0x0078)?)?;
    let size = header.read_u32(0x0E04)? ^ mc_key.read_u32(0x0082)?;
    if rva == 0 || size == 0 {
        return Ok(0);
    }

    let start = image.rva_to_offset(rva)?;
    let end = start + size as usize;
    let heap = Metadata::read(image)
        .ok()
        .and_then(|metadata| metadata.stream_range("#US"));
    if heap != Some((start, size as usize)) {
        log::warn!("Invalid #US heap RVA and size found");
    }
    if end > file_data.len() {
        return Err(out_of_bounds_error!());
    }

    log::debug!("Decrypting strings @ RVA {:08X}, {} bytes", rva, size);

    let mut key_index = 0;
    let mut decrypted = 0;
    let mut position = start + 1;
    while position < end {
        if file_data[position] <= 1 {
            position += 1;
            continue;
        }

        let blob_start = position;
        let mut parser = Parser::new(&file_data[position..end]);
        let length = parser.read_compressed_uint()? as usize;
        let prefix = parser.pos();
        position += prefix;

        let string_start = position;
        let encrypted = length.saturating_sub(if prefix == 1 { 1 } else { 2 });
        let region = file_data
            .get_mut(position..position + encrypted)
            .ok_or(out_of_bounds_error!())?;
        for b in region {
            let k = mc_key.byte(key_index % MC_KEY_SIZE)?;
            key_index += 1;
            *b = (*b ^ k).rotate_left(3);
        }
        position += encrypted;

        match file_data.get(string_start..string_start + length.saturating_sub(1)) {
            Some(text) => log::debug!("Decrypted string: {:?}", decode_utf16le_lossy(text)),
            None => log::debug!("Could not decrypt string at offset {:08X}", blob_start),
        }

        decrypted += 1;
        position += 1;
    }

    Ok(decrypted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deobfuscation::obfuscators::maxtocode::header::HEADER_SIZE, MappedImage};

    fn mc_key() -> McKey {
        McKey::from_bytes((0..MC_KEY_SIZE).map(|i| (i * 5 + 1) as u8).collect()).unwrap()
    }

    fn header(mc_key: &McKey, fields: &[(usize, u32, usize)]) -> PeHeader {
        let mut blob = vec![0u8; HEADER_SIZE];
        for &(offset, value, key_offset) in fields {
            let masked = value ^ mc_key.read_u32(key_offset).unwrap();
            blob[offset..offset + 4].copy_from_slice(&masked.to_le_bytes());
        }
        PeHeader::from_data(blob).unwrap()
    }

    /// CLR header at 0x10 with resources at 0x200/0x40, metadata at 0x80 with `#US` at
    /// 0x100/0x20.
    fn managed_image() -> MappedImage {
        let mut data = vec![0u8; 0x400];

        let mut cor20 = Vec::new();
        for value in [72u32, 0x0005_0002, 0x80, 0x100, 1, 0, 0x200, 0x40] {
            cor20.extend_from_slice(&value.to_le_bytes());
        }
        cor20.resize(72, 0);
        data[0x10..0x10 + 72].copy_from_slice(&cor20);

        #[rustfmt::skip]
        let root = [
            0x42, 0x53, 0x4A, 0x42,
            0x01, 0x00, 0x01, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x04, 0x00, 0x00, 0x00,
            b'v', b'4', 0x00, 0x00,
            0x00, 0x00,
            0x01, 0x00,
            0x80, 0x00, 0x00, 0x00,
            0x20, 0x00, 0x00, 0x00,
            b'#', b'U', b'S', 0x00,
        ];
        data[0x80..0x80 + root.len()].copy_from_slice(&root);

        MappedImage::identity(data).with_clr_directory(0x10, 72)
    }

    #[test]
    fn resources() {
        let key = mc_key();
        let image = managed_image();
        let header = header(&key, &[(0xE10, 0x200, 0xA0), (0xE14, 0x40, 0xAA)]);

        let mut file_data = image.clone().into_data();
        file_data[0x200..0x240]
            .iter_mut()
            .zip(key.as_bytes())
            .for_each(|(b, k)| *b = 0x77 ^ k);

        assert_eq!(
            decrypt_resources(&image, &header, &key, &mut file_data).unwrap(),
            0x40
        );
        assert!(file_data[0x200..0x240].iter().all(|&b| b == 0x77));
        assert_eq!(file_data[0x240], 0);
    }

    #[test]
    fn nothing_encrypted() {
        let key = mc_key();
        let image = managed_image();
        let header = header(
            &key,
            &[(0xE10, 0, 0xA0), (0xE14, 0, 0xAA), (0xE00, 0, 0x78), (0xE04, 0, 0x82)],
        );
        let mut file_data = image.clone().into_data();

        assert_eq!(
            decrypt_resources(&image, &header, &key, &mut file_data).unwrap(),
            0
        );
        assert_eq!(
            decrypt_us_heap(&image, &header, &key, &mut file_data).unwrap(),
            0
        );
        assert_eq!(file_data, image.into_data());
    }

    fn encrypt_string(key: &McKey, key_index: &mut usize, text: &str) -> Vec<u8> {
        let mut blob = text
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .map(|b| {
                let k = key.byte(*key_index % MC_KEY_SIZE).unwrap();
                *key_index += 1;
                b.rotate_right(3) ^ k
            })
            .collect::<Vec<_>>();
        blob.insert(0, (text.len() * 2 + 1) as u8);
        blob.push(0);
        blob
    }

    #[test]
    fn us_heap() {
        let key = mc_key();
        let image = managed_image();
        let header = header(&key, &[(0xE00, 0x100, 0x78), (0xE04, 0x20, 0x82)]);

        let mut key_index = 0;
        let mut heap = vec![0u8];
        heap.extend(encrypt_string(&key, &mut key_index, "Hello"));
        heap.extend(encrypt_string(&key, &mut key_index, "MC"));

        let mut file_data = image.clone().into_data();
        file_data[0x100..0x100 + heap.len()].copy_from_slice(&heap);

        assert_eq!(
            decrypt_us_heap(&image, &header, &key, &mut file_data).unwrap(),
            2
        );
        assert_eq!(decode_utf16le_lossy(&file_data[0x102..0x10C]), "Hello");
        assert_eq!(decode_utf16le_lossy(&file_data[0x10E..0x112]), "MC");
        assert_eq!(file_data[0x10C], 0);
    }

    #[test]
    fn heap_outside_file() {
        let key = mc_key();
        let image = managed_image();
        let header = header(&key, &[(0xE00, 0x3F0, 0x78), (0xE04, 0x100, 0x82)]);
        let mut file_data = image.clone().into_data();

        assert!(decrypt_us_heap(&image, &header, &key, &mut file_data).is_err());
    }
}
