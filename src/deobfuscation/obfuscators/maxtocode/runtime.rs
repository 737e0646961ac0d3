//! Epoch detection from the MaxtoCode runtime DLL.
//!
//! Protected assemblies ship with a native runtime (`MRuntime*.dll`) whose link time identifies
//! the release line. This is the last resort when neither magic table knows the image.

use std::path::Path;

use goblin::pe::header::Header;

use crate::deobfuscation::obfuscators::maxtocode::infos::EncryptionVersion;

/// Epoch of the runtime DLL at `path`.
///
/// Failures to read or parse the DLL are logged and reported as [`EncryptionVersion::Unknown`].
#[must_use]
pub fn detect_runtime_version(path: &Path) -> EncryptionVersion {
    match std::fs::read(path) {
        Ok(data) => runtime_version_from_bytes(&data),
        Err(error) => {
            log::warn!("Could not read runtime DLL {}: {}", path.display(), error);
            EncryptionVersion::Unknown
        }
    }
}

/// Epoch of a runtime DLL that is already in memory.
#[must_use]
pub fn runtime_version_from_bytes(data: &[u8]) -> EncryptionVersion {
    match Header::parse(data) {
        Ok(header) => {
            let timestamp = header.coff_header.time_date_stamp;
            let version = EncryptionVersion::from_runtime_timestamp(timestamp);
            if version == EncryptionVersion::Unknown {
                log::warn!("Unknown runtime DLL timestamp 0x{:08X}", timestamp);
            } else {
                log::debug!("Runtime DLL timestamp 0x{:08X} is {}", timestamp, version);
            }
            version
        }
        Err(error) => {
            log::warn!("Could not parse runtime DLL: {}", error);
            EncryptionVersion::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_dll(timestamp: u32) -> Vec<u8> {
        let mut data = vec![0u8; 0x200];
        data[0..2].copy_from_slice(b"MZ");
        data[0x3C..0x40].copy_from_slice(&0x80u32.to_le_bytes());
        data[0x80..0x84].copy_from_slice(b"PE\0\0");
        // COFF: i386, no sections, no optional header
        data[0x84..0x86].copy_from_slice(&0x014Cu16.to_le_bytes());
        data[0x88..0x8C].copy_from_slice(&timestamp.to_le_bytes());
        data[0x96..0x98].copy_from_slice(&0x2102u16.to_le_bytes());
        data
    }

    #[test]
    fn known_timestamp() {
        assert_eq!(
            runtime_version_from_bytes(&native_dll(0x50A0_963C)),
            EncryptionVersion::V6
        );
        assert_eq!(
            runtime_version_from_bytes(&native_dll(0x1234_5678)),
            EncryptionVersion::Unknown
        );
    }

    #[test]
    fn unreadable_runtime() {
        assert_eq!(
            runtime_version_from_bytes(b"not a dll"),
            EncryptionVersion::Unknown
        );
        assert_eq!(
            detect_runtime_version(Path::new("/nonexistent/MRuntime3.dll")),
            EncryptionVersion::Unknown
        );
    }
}
