//! Decryption of the MaxtoCode encrypted method-body table.
//!
//! MaxtoCode replaces every protected method body with a 0xFFF3 placeholder and stores the
//! real body as a set of encrypted fragments. The fragment descriptors live in a record table,
//! the fragments themselves in a separate data area. Both locations are recorded masked in the
//! [`PeHeader`].
//!
//! Record layout (all fields XORed with the method count):
//!
//! ```text
//! +0x00  body RVA
//! +0x04  total body size
//! +0x08  instruction RVA
//! +0x0C  fragment descriptors, 0x13 bytes each
//!          +0x00 index
//!          +0x01 cipher tag (i16)
//!          +0x03 data offset
//!          +0x07 encrypted size
//!          +0x0B real size
//!          +0x0F exception offset (second descriptor only)
//! ```
//!
//! The first fragment holds the method header, the second the exception sections at their own
//! offset, and the remaining ones the code, concatenated after the header.

use std::collections::BTreeMap;

use crate::{
    deobfuscation::{
        config::MaxtoCodeConfig,
        obfuscators::maxtocode::{
            header::PeHeader,
            infos::{detect_version, EncryptionVersion, MCKEY_8C0H},
            mckey::McKey,
            runtime::detect_runtime_version,
            stream::{tables_for, HandlerTable, ALL_TABLES},
        },
    },
    file::io::read_le,
    metadata::method::{verify_method_body, MethodBody},
    Error, Image, Result,
};

/// Size of one fragment descriptor.
pub const ENCRYPTED_DATA_INFO_SIZE: usize = 0x13;

/// First word of a method body that was moved into the encrypted table.
pub const PLACEHOLDER_MAGIC: u16 = 0xFFF3;

const RECORD_HEADER_SIZE: usize = 0x0C;

/// One decoded fragment descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptedDataInfo {
    /// Position of the descriptor inside its record
    pub index: usize,
    /// One-based cipher tag
    pub encryption_type: i32,
    /// Offset into the encrypted data area
    pub data_offset: u32,
    /// Number of encrypted bytes
    pub encrypted_size: u32,
    /// Number of plaintext bytes kept after decryption
    pub real_size: u32,
    /// Destination of the exception fragment, only set for the second descriptor
    pub ex_offset: i32,
}

/// A decrypted method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMethodInfo {
    /// RVA of the placeholder the body belongs to
    pub body_rva: u32,
    /// Complete CIL method body, header and extra sections included
    pub body: Vec<u8>,
}

impl DecryptedMethodInfo {
    /// Parse the body into header, code range and exception handlers.
    ///
    /// # Errors
    /// Never fails for bodies produced by [`MethodInfos::decrypt`], which verifies every body.
    pub fn method_body(&self) -> Result<MethodBody> {
        MethodBody::from(&self.body)
    }

    /// The CIL code without header and extra sections.
    ///
    /// # Errors
    /// See [`DecryptedMethodInfo::method_body`].
    pub fn code(&self) -> Result<&[u8]> {
        let body = self.method_body()?;
        let start = body.header.header_size;
        self.body
            .get(start..start + body.header.code_size)
            .ok_or(out_of_bounds_error!())
    }
}

/// Resolve the encryption epoch of an image.
///
/// The header magic wins, then the McKey magic, then the build time of the runtime DLL if
/// `config` names one.
///
/// # Errors
/// Only fails if the McKey is truncated.
pub fn resolve_version(
    header: &PeHeader,
    mc_key: &McKey,
    config: &MaxtoCodeConfig,
) -> Result<EncryptionVersion> {
    if header.version() != EncryptionVersion::Unknown {
        return Ok(header.version());
    }

    let (magic_lo, magic_hi) = mc_key.magic()?;
    let version = detect_version(MCKEY_8C0H, magic_lo, magic_hi);
    if version != EncryptionVersion::Unknown {
        return Ok(version);
    }
    log::warn!(
        "Could not detect MC version. Magic2: {:08X} {:08X}",
        magic_lo,
        magic_hi
    );

    Ok(config
        .runtime_path
        .as_deref()
        .map_or(EncryptionVersion::Unknown, detect_runtime_version))
}

/// Returns `true` if the method body at `body_rva` is a MaxtoCode placeholder.
#[must_use]
pub fn is_placeholder<I: Image + ?Sized>(image: &I, body_rva: u32) -> bool {
    image
        .slice_at_rva(body_rva, 2)
        .and_then(read_le::<u16>)
        .is_ok_and(|magic| magic == PLACEHOLDER_MAGIC)
}

/// Location and shape of the record table inside one image.
struct RecordTable<'a> {
    data: &'a [u8],
    infos_offset: usize,
    encrypted_offset: usize,
    record_size: usize,
    count: usize,
    xor_key: u32,
}

impl<'a> RecordTable<'a> {
    fn new<I: Image + ?Sized>(image: &'a I, header: &PeHeader, mc_key: &McKey) -> Result<Self> {
        let (magic_lo, magic_hi) = mc_key.magic()?;
        let slots = if detect_version(MCKEY_8C0H, magic_lo, magic_hi) == EncryptionVersion::Unknown
        {
            3
        } else {
            6
        };

        let infos_rva = header.rva(0x0FF8, mc_key.read_u32(0x005A)?)?;
        let encrypted_rva = header.rva(0x0FF0, mc_key.read_u32(0x0046)?)?;
        log::debug!(
            "Method infos at RVA 0x{:08X}, encrypted data at RVA 0x{:08X}",
            infos_rva,
            encrypted_rva
        );

        let mut table = RecordTable {
            data: image.data(),
            infos_offset: image.rva_to_offset(infos_rva)?,
            encrypted_offset: image.rva_to_offset(encrypted_rva)?,
            record_size: RECORD_HEADER_SIZE + slots * ENCRYPTED_DATA_INFO_SIZE,
            count: 0,
            xor_key: 0,
        };

        let count = table.raw_u32(0)? ^ table.raw_u32(4)?;
        if (count as i32) < 0 {
            return Err(malformed_error!("Invalid number of encrypted methods"));
        }
        table.count = count as usize;
        table.xor_key = count;
        Ok(table)
    }

    fn slots(&self) -> usize {
        (self.record_size - RECORD_HEADER_SIZE) / ENCRYPTED_DATA_INFO_SIZE
    }

    fn raw_u32(&self, offset: usize) -> Result<u32> {
        read_le::<u32>(
            self.data
                .get(self.infos_offset + offset..)
                .ok_or(out_of_bounds_error!())?,
        )
    }

    fn u32(&self, offset: usize) -> Result<u32> {
        Ok(self.raw_u32(offset)? ^ self.xor_key)
    }

    fn i16(&self, offset: usize) -> Result<i16> {
        let raw = read_le::<u16>(
            self.data
                .get(self.infos_offset + offset..)
                .ok_or(out_of_bounds_error!())?,
        )?;
        Ok((raw ^ self.xor_key as u16) as i16)
    }

    fn descriptor(&self, offset: usize, index: usize) -> Result<EncryptedDataInfo> {
        Ok(EncryptedDataInfo {
            index,
            encryption_type: i32::from(self.i16(offset + 1)?),
            data_offset: self.u32(offset + 3)?,
            encrypted_size: self.u32(offset + 7)?,
            real_size: self.u32(offset + 11)?,
            ex_offset: if index == 1 {
                self.u32(offset + 15)? as i32
            } else {
                0
            },
        })
    }

    fn fragment(
        &self,
        table: &HandlerTable,
        mc_key: &McKey,
        info: &EncryptedDataInfo,
    ) -> Result<Option<Vec<u8>>> {
        if info.real_size == 0 {
            return Ok(None);
        }
        if info.real_size > info.encrypted_size {
            return Err(malformed_error!("Invalid realSize"));
        }

        let start = self.encrypted_offset + info.data_offset as usize;
        let encrypted = self
            .data
            .get(start..start + info.encrypted_size as usize)
            .ok_or(out_of_bounds_error!())?;

        let mut decrypted = table.decrypt(mc_key, info.encryption_type, encrypted)?;
        if (info.real_size as usize) > decrypted.len() {
            return Err(malformed_error!("Invalid decrypted length"));
        }
        decrypted.truncate(info.real_size as usize);
        Ok(Some(decrypted))
    }

    fn decrypt_all(
        &self,
        table: &HandlerTable,
        mc_key: &McKey,
    ) -> Result<BTreeMap<u32, DecryptedMethodInfo>> {
        let mut infos = BTreeMap::new();

        for record in 0..self.count {
            let offset = 8 + record * self.record_size;
            let body_rva = self.u32(offset)?;
            let total_size = self.u32(offset + 4)? as usize;
            if total_size > self.data.len() {
                return Err(malformed_error!("Invalid method body size {}", total_size));
            }

            let mut fragments = Vec::with_capacity(self.slots());
            let mut ex_offset = 0;
            for index in 0..self.slots() {
                let info = self.descriptor(
                    offset + RECORD_HEADER_SIZE + index * ENCRYPTED_DATA_INFO_SIZE,
                    index,
                )?;
                if index == 1 {
                    ex_offset = info.ex_offset;
                    if ex_offset == 0 {
                        fragments.push(None);
                        continue;
                    }
                }
                fragments.push(self.fragment(table, mc_key, &info)?);
            }

            let mut body = vec![0u8; total_size];
            let mut position = splice(&mut body, fragments[0].as_deref(), 0)?;
            for fragment in &fragments[2..] {
                position = splice(&mut body, fragment.as_deref(), position)?;
            }
            let ex_offset = usize::try_from(ex_offset).map_err(|_| out_of_bounds_error!())?;
            splice(&mut body, fragments[1].as_deref(), ex_offset)?;

            if !verify_method_body(&body) {
                return Err(Error::InvalidMethodBody);
            }
            infos.insert(body_rva, DecryptedMethodInfo { body_rva, body });
        }

        Ok(infos)
    }
}

fn splice(body: &mut [u8], fragment: Option<&[u8]>, offset: usize) -> Result<usize> {
    let Some(fragment) = fragment else {
        return Ok(offset);
    };

    body.get_mut(offset..offset + fragment.len())
        .ok_or(out_of_bounds_error!())?
        .copy_from_slice(fragment);
    Ok(offset + fragment.len())
}

/// All decrypted method bodies of an image, keyed by body RVA.
///
/// # Examples
///
/// ```rust,no_run
/// use dotunpack::deobfuscation::obfuscators::maxtocode::{McKey, MethodInfos, PeHeader};
/// use dotunpack::deobfuscation::MaxtoCodeConfig;
/// use dotunpack::File;
/// use std::path::Path;
///
/// let file = File::from_file(Path::new("protected.exe"))?;
/// let header = PeHeader::new(&file)?;
/// let mc_key = McKey::read(&file, &header)?;
///
/// let infos = MethodInfos::decrypt(&file, &header, &mc_key, &MaxtoCodeConfig::default())?;
/// if let Some(info) = infos.lookup(0x2050) {
///     println!("{} bytes", info.body.len());
/// }
/// # Ok::<(), dotunpack::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct MethodInfos {
    infos: BTreeMap<u32, DecryptedMethodInfo>,
    version: EncryptionVersion,
    table: &'static str,
}

impl MethodInfos {
    /// Decrypt every method body of `image`.
    ///
    /// The tables of the resolved epoch are tried first and the first one that yields only valid
    /// bodies is used. If none does, or the epoch has no tables, every other table is tried
    /// unless [`MaxtoCodeConfig::search_unknown_epochs`] is off; should several of them succeed,
    /// the oldest one is kept.
    ///
    /// # Errors
    /// - [`crate::Error::UnknownVersion`] if the epoch has no tables and
    ///   [`MaxtoCodeConfig::search_unknown_epochs`] is off
    /// - [`crate::Error::Malformed`] for a negative method count, or if no table decrypts all
    ///   bodies (`"Could not decrypt methods"`)
    /// - [`crate::Error::OutOfBounds`] if the record table is not mapped
    pub fn decrypt<I: Image + ?Sized>(
        image: &I,
        header: &PeHeader,
        mc_key: &McKey,
        config: &MaxtoCodeConfig,
    ) -> Result<MethodInfos> {
        let version = resolve_version(header, mc_key, config)?;
        let preferred = tables_for(version);
        if preferred.is_empty() && !config.search_unknown_epochs {
            return Err(Error::UnknownVersion);
        }

        let records = RecordTable::new(image, header, mc_key)?;
        log::debug!(
            "{} encrypted methods, MaxtoCode {}",
            records.count,
            version
        );

        for table in &preferred {
            match records.decrypt_all(table, mc_key) {
                Ok(infos) => return Ok(Self::with_table(infos, table)),
                Err(error) => log::debug!("Decrypter table {} failed: {}", table.name, error),
            }
        }

        if !config.search_unknown_epochs {
            return Err(malformed_error!("Could not decrypt methods"));
        }
        if preferred.is_empty() {
            log::warn!("No decrypter tables for MaxtoCode {}, trying all of them", version);
        }

        let mut found = ALL_TABLES
            .iter()
            .filter(|table| !preferred.iter().any(|p| p.name == table.name))
            .filter_map(|table| match records.decrypt_all(table, mc_key) {
                Ok(infos) => Some((table, infos)),
                Err(error) => {
                    log::debug!("Decrypter table {} failed: {}", table.name, error);
                    None
                }
            })
            .collect::<Vec<_>>();

        if found.len() > 1 {
            log::warn!(
                "{} decrypter tables produced valid method bodies, keeping {}",
                found.len(),
                found[0].0.name
            );
        }

        if found.is_empty() {
            return Err(malformed_error!("Could not decrypt methods"));
        }
        let (table, infos) = found.swap_remove(0);
        Ok(Self::with_table(infos, table))
    }

    fn with_table(infos: BTreeMap<u32, DecryptedMethodInfo>, table: &HandlerTable) -> Self {
        log::debug!("Decrypted {} methods with table {}", infos.len(), table.name);
        MethodInfos {
            infos,
            version: table.version,
            table: table.name,
        }
    }

    /// The body stored for `body_rva`.
    #[must_use]
    pub fn lookup(&self, body_rva: u32) -> Option<&DecryptedMethodInfo> {
        self.infos.get(&body_rva)
    }

    /// All bodies in RVA order.
    pub fn iter(&self) -> impl Iterator<Item = &DecryptedMethodInfo> {
        self.infos.values()
    }

    /// Number of decrypted bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Returns `true` if the table was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Epoch of the table that decrypted the bodies.
    #[must_use]
    pub fn version(&self) -> EncryptionVersion {
        self.version
    }

    /// Name of the table that decrypted the bodies, e.g. `V5b`.
    #[must_use]
    pub fn table_name(&self) -> &'static str {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        deobfuscation::obfuscators::maxtocode::{
            header::HEADER_SIZE,
            mckey::MC_KEY_SIZE,
            stream::{DECRYPT_1A, DECRYPT_2A},
        },
        MappedImage,
    };

    const INFOS_RVA: usize = 0x3000;
    const DATA_RVA: usize = 0x3800;
    const BODY_RVA: u32 = 0x2050;
    const XOR: u32 = 1;

    // tiny header, nop, ret
    const BODY: [u8; 3] = [0x0A, 0x00, 0x2A];

    fn mc_key() -> McKey {
        McKey::from_bytes(
            (0..MC_KEY_SIZE)
                .map(|i| (i as u8).wrapping_mul(0x3B) ^ 0x5C)
                .collect(),
        )
        .unwrap()
    }

    fn header(mc_key: &McKey, magic: (u32, u32)) -> PeHeader {
        let mut blob = vec![0u8; HEADER_SIZE];
        blob[0x900..0x904].copy_from_slice(&magic.0.to_le_bytes());
        blob[0x904..0x908].copy_from_slice(&magic.1.to_le_bytes());
        let infos = INFOS_RVA as u32 ^ mc_key.read_u32(0x5A).unwrap();
        let data = DATA_RVA as u32 ^ mc_key.read_u32(0x46).unwrap();
        blob[0xFF8..0xFFC].copy_from_slice(&infos.to_le_bytes());
        blob[0xFF0..0xFF4].copy_from_slice(&data.to_le_bytes());
        PeHeader::from_data(blob).unwrap()
    }

    fn put(data: &mut [u8], offset: usize, value: u32) {
        data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn descriptor(data: &mut [u8], offset: usize, tag: u16, data_offset: u32, sizes: (u32, u32)) {
        data[offset + 1..offset + 3].copy_from_slice(&(tag ^ XOR as u16).to_le_bytes());
        put(data, offset + 3, data_offset ^ XOR);
        put(data, offset + 7, sizes.0 ^ XOR);
        put(data, offset + 11, sizes.1 ^ XOR);
    }

    /// One method: the header byte under tag 1, the code padded to 8 bytes under tag 2.
    fn image(mc_key: &McKey, count_words: (u32, u32)) -> MappedImage {
        let mut data = vec![0u8; 0x4000];
        put(&mut data, 0x2050, u32::from(PLACEHOLDER_MAGIC));

        put(&mut data, INFOS_RVA, count_words.0);
        put(&mut data, INFOS_RVA + 4, count_words.1);

        let record = INFOS_RVA + 8;
        put(&mut data, record, BODY_RVA ^ XOR);
        put(&mut data, record + 4, BODY.len() as u32 ^ XOR);
        put(&mut data, record + 8, (BODY_RVA + 1) ^ XOR);

        let header_fragment = DECRYPT_1A.encrypt(mc_key, &BODY[..1]).unwrap();
        let mut code = BODY[1..].to_vec();
        code.resize(8, 0xCC);
        let code_fragment = DECRYPT_2A.encrypt(mc_key, &code).unwrap();

        data[DATA_RVA..DATA_RVA + 1].copy_from_slice(&header_fragment);
        data[DATA_RVA + 0x10..DATA_RVA + 0x18].copy_from_slice(&code_fragment);

        let slots = record + RECORD_HEADER_SIZE;
        descriptor(&mut data, slots, 1, 0, (1, 1));
        descriptor(&mut data, slots + ENCRYPTED_DATA_INFO_SIZE, 0, 0, (0, 0));
        put(&mut data, slots + ENCRYPTED_DATA_INFO_SIZE + 15, XOR);
        descriptor(&mut data, slots + 2 * ENCRYPTED_DATA_INFO_SIZE, 2, 0x10, (8, 2));

        MappedImage::identity(data)
    }

    const V3_MAGIC: (u32, u32) = (0xAA98_3B87, 0xF28E_ECA3);

    #[test]
    fn decrypt_v3() {
        let key = mc_key();
        let header = header(&key, V3_MAGIC);
        let image = image(&key, (0x1357_0000, 0x1357_0000 ^ XOR));

        let infos = MethodInfos::decrypt(&image, &header, &key, &MaxtoCodeConfig::default())
            .unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos.table_name(), "V3");
        assert_eq!(infos.version(), EncryptionVersion::V3);

        let info = infos.lookup(BODY_RVA).unwrap();
        assert_eq!(info.body, BODY);
        assert_eq!(info.code().unwrap(), &BODY[1..]);
        assert!(infos.lookup(BODY_RVA + 4).is_none());
        assert_eq!(infos.iter().count(), 1);

        assert!(is_placeholder(&image, BODY_RVA));
        assert!(!is_placeholder(&image, BODY_RVA + 1));
        assert!(!is_placeholder(&image, 0xFFFF_0000));
    }

    #[test]
    fn unknown_epoch() {
        let key = mc_key();
        let header = header(&key, (0, 0));
        let image = image(&key, (0x1357_0000, 0x1357_0000 ^ XOR));

        let strict = MaxtoCodeConfig::new().with_search_unknown_epochs(false);
        assert!(matches!(
            MethodInfos::decrypt(&image, &header, &key, &strict),
            Err(Error::UnknownVersion)
        ));

        let infos = MethodInfos::decrypt(&image, &header, &key, &MaxtoCodeConfig::default())
            .unwrap();
        assert_eq!(infos.len(), 1);
        assert!(infos.lookup(BODY_RVA).is_some());
        // V1 decodes the code with variant 4, which still leaves a well-formed tiny body,
        // so V1 and V3 both succeed and the oldest is kept.
        assert_eq!(infos.table_name(), "V1");
    }

    #[test]
    fn negative_count() {
        let key = mc_key();
        let header = header(&key, V3_MAGIC);
        let image = image(&key, (0x8000_0000, 0));

        assert!(matches!(
            MethodInfos::decrypt(&image, &header, &key, &MaxtoCodeConfig::default()),
            Err(Error::Malformed { message, .. }) if message == "Invalid number of encrypted methods"
        ));
    }

    #[test]
    fn resolution_order() {
        let key = mc_key();
        let config = MaxtoCodeConfig::default();

        let header_v6 = header(&key, (0xBA68_3B87, 0xF28E_CDA3));
        assert_eq!(
            resolve_version(&header_v6, &key, &config).unwrap(),
            EncryptionVersion::V6
        );

        let unknown = header(&key, (0, 0));
        assert_eq!(
            resolve_version(&unknown, &key, &config).unwrap(),
            EncryptionVersion::Unknown
        );

        let mut blob = key.as_bytes().to_vec();
        blob[0x8C0..0x8C4].copy_from_slice(&0x8A73_1B13u32.to_le_bytes());
        blob[0x8C4..0x8C8].copy_from_slice(&0x8723_891Fu32.to_le_bytes());
        let key_v7 = McKey::from_bytes(blob).unwrap();
        assert_eq!(
            resolve_version(&unknown, &key_v7, &config).unwrap(),
            EncryptionVersion::V7
        );

        let missing_runtime = MaxtoCodeConfig::new().with_runtime_path("/nonexistent/MRuntime.dll");
        assert_eq!(
            resolve_version(&unknown, &key, &missing_runtime).unwrap(),
            EncryptionVersion::Unknown
        );
    }

    #[test]
    fn splice_bounds() {
        let mut body = [0u8; 4];
        assert_eq!(splice(&mut body, Some(&[1, 2]), 1).unwrap(), 3);
        assert_eq!(body, [0, 1, 2, 0]);
        assert_eq!(splice(&mut body, None, 7).unwrap(), 7);
        assert!(splice(&mut body, Some(&[1, 2]), 3).is_err());
    }
}
