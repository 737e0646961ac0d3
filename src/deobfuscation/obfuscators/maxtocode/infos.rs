//! MaxtoCode encryption epochs and the magic tables that identify them.
//!
//! Every MaxtoCode release line writes a pair of magic dwords into the protected image: one at
//! offset 0x900 of the encrypted PE header blob and one at offset 0x8C0 of the McKey. The pair
//! selects the decrypter table of the matching epoch.

use strum::{Display, EnumIter};

/// MaxtoCode encryption epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum EncryptionVersion {
    /// Unrecognized magic
    Unknown,
    /// First release line, 2007
    V1,
    /// 2008 to 2011
    V2,
    /// Late 2011
    V3,
    /// Early 2012
    V4,
    /// Mid 2012, three table layouts
    V5,
    /// Late 2012
    V6,
    /// Early 2013, adds the nibble-swap variants
    V7,
    /// 2013 and later, adds the difference and swap-first variants
    V8,
}

/// One row of a magic table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionInfo {
    /// Dword at the low offset
    pub magic_lo: u32,
    /// Dword at the high offset
    pub magic_hi: u32,
    /// Epoch the pair belongs to
    pub version: EncryptionVersion,
}

const fn info(magic_lo: u32, magic_hi: u32, version: EncryptionVersion) -> EncryptionInfo {
    EncryptionInfo {
        magic_lo,
        magic_hi,
        version,
    }
}

/// Magics at offsets 0x900 / 0x904 of the PE header blob.
pub const RVA_900H: &[EncryptionInfo] = &[
    info(0xA098_B387, 0x1E8E_BCA3, EncryptionVersion::V1),
    info(0xAA98_B387, 0x1E8E_ECA3, EncryptionVersion::V2),
    info(0xAA98_B387, 0x128E_ECA3, EncryptionVersion::V2),
    info(0xAA98_B387, 0xF28E_ECA3, EncryptionVersion::V2),
    info(0xAA98_B387, 0xF28E_EAA3, EncryptionVersion::V2),
    info(0xAA98_3B87, 0xF28E_ECA3, EncryptionVersion::V3),
    info(0xAA91_3B87, 0xF28E_E0A3, EncryptionVersion::V4),
    info(0xBA98_3B87, 0xF28E_DDA3, EncryptionVersion::V5),
    info(0xBA68_3B87, 0xF28E_CDA3, EncryptionVersion::V6),
    info(0x8A68_3B87, 0x828E_CDA3, EncryptionVersion::V7),
    info(0x1A68_3B87, 0x128E_CDA3, EncryptionVersion::V8),
    info(0x7A64_3B87, 0x624E_CDA3, EncryptionVersion::V8),
    info(0x9A68_3B87, 0x928E_CDA3, EncryptionVersion::V8),
];

/// Magics at offsets 0x8C0 / 0x8C4 of the McKey.
pub const MCKEY_8C0H: &[EncryptionInfo] = &[
    info(0x6AA1_3B13, 0xD72B_991F, EncryptionVersion::V1),
    info(0x6A71_3B13, 0xD72B_891F, EncryptionVersion::V2),
    info(0x6A73_1B13, 0xD72B_891F, EncryptionVersion::V3),
    info(0x6AD3_1B13, 0xD72B_8A1F, EncryptionVersion::V4),
    info(0xAA73_1B13, 0xD723_891F, EncryptionVersion::V5),
    info(0x64D6_CE53, 0xDEC2_844E, EncryptionVersion::V5),
    info(0x8A73_1B13, 0x8723_891F, EncryptionVersion::V7),
    info(0x1A73_1B13, 0x1723_891F, EncryptionVersion::V8),
    info(0x7A73_1B13, 0x1723_891F, EncryptionVersion::V8),
    info(0xDD98_0712, 0xF36F_3511, EncryptionVersion::V8),
    info(0x49DC_30A2, 0x3BE5_1694, EncryptionVersion::V8),
    info(0x5842_5DA8, 0xDF80_B317, EncryptionVersion::V8),
    info(0xC00C_A8DC, 0xEFBC_F433, EncryptionVersion::V8),
];

/// Build timestamps of runtime DLLs, grouped by epoch.
const RUNTIME_TIMESTAMPS: &[(EncryptionVersion, &[u32])] = &[
    (EncryptionVersion::V1, &[0x462F_A2D2, 0x4712_99D3]),
    (
        EncryptionVersion::V2,
        &[
            0x4823_84FB,
            0x4A5E_EC64,
            0x4C62_20EC,
            0x4C62_2357,
            0x4C6E_4605,
            0x4D0E_220D,
            0x4DC2_FC75,
            0x4DC2_FE0C,
            0x4DFA_3D5D,
        ],
    ),
    (EncryptionVersion::V3, &[0x4ED7_6740, 0x4EE1_FAD1]),
    (EncryptionVersion::V4, &[0x4F83_2868]),
    (
        EncryptionVersion::V5,
        &[0x4F8E_262C, 0x4FBE_81DE, 0x4FCE_BD7B],
    ),
    (EncryptionVersion::V6, &[0x50A0_963C]),
    (EncryptionVersion::V7, &[0x50D3_67A5]),
    (
        EncryptionVersion::V8,
        &[
            0x513D_4492,
            0x513D_7124,
            0x5141_3BD8,
            0x5141_3D68,
            0x5166_DB4F,
            0x5192_7495,
            0x526B_C020,
            0x526B_DD12,
            0x5296_E242,
            0x52B2_B2A3,
            0x52B3_043C,
            0x5317_2907,
            0x5317_29C4,
            0x55F5_B112,
            0x5892_EF00,
            0x5999_5527,
            0x5AAF_874A,
            0x5B37_D998,
        ],
    ),
];

/// Find the epoch of a magic pair. The first matching row wins.
#[must_use]
pub fn detect_version(table: &[EncryptionInfo], magic_lo: u32, magic_hi: u32) -> EncryptionVersion {
    table
        .iter()
        .find(|info| info.magic_lo == magic_lo && info.magic_hi == magic_hi)
        .map_or(EncryptionVersion::Unknown, |info| info.version)
}

impl EncryptionVersion {
    /// Epoch of a runtime DLL with the COFF `TimeDateStamp` `timestamp`.
    #[must_use]
    pub fn from_runtime_timestamp(timestamp: u32) -> EncryptionVersion {
        RUNTIME_TIMESTAMPS
            .iter()
            .find(|(_, stamps)| stamps.contains(&timestamp))
            .map_or(EncryptionVersion::Unknown, |(version, _)| *version)
    }
}
