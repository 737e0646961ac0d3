//! Configuration for the decryption pipelines.
//!
//! Every product has its own knobs, collected in [`DecryptConfig`]. All of them default to the
//! behaviour of the most common protector builds, so `DecryptConfig::default()` is the right
//! starting point for almost every input.

use std::path::PathBuf;

/// Configuration for all decryption pipelines.
#[derive(Debug, Clone, Default)]
pub struct DecryptConfig {
    /// MaxtoCode method, heap and string decryption.
    pub maxtocode: MaxtoCodeConfig,

    /// Babel.NET method container parsing.
    pub babel: BabelConfig,

    /// Crypto Obfuscator resource decryption.
    pub crypto_obfuscator: CryptoObfuscatorConfig,
}

impl DecryptConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the MaxtoCode configuration.
    #[must_use]
    pub fn with_maxtocode(mut self, maxtocode: MaxtoCodeConfig) -> Self {
        self.maxtocode = maxtocode;
        self
    }

    /// Sets the Babel.NET configuration.
    #[must_use]
    pub fn with_babel(mut self, babel: BabelConfig) -> Self {
        self.babel = babel;
        self
    }

    /// Sets the Crypto Obfuscator configuration.
    #[must_use]
    pub fn with_crypto_obfuscator(mut self, crypto_obfuscator: CryptoObfuscatorConfig) -> Self {
        self.crypto_obfuscator = crypto_obfuscator;
        self
    }
}

/// Text encoding of the MaxtoCode string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEncoding {
    /// UTF-16 little endian, what the runtime uses by default.
    #[default]
    Utf16Le,
    /// UTF-8.
    Utf8,
    /// ISO-8859-1, one byte per character.
    Latin1,
}

/// Configuration for MaxtoCode.
#[derive(Debug, Clone)]
pub struct MaxtoCodeConfig {
    /// Path of the MaxtoCode runtime DLL shipped next to the protected file.
    ///
    /// Its build timestamp is the last resort for identifying the encryption epoch when neither
    /// magic table matches.
    pub runtime_path: Option<PathBuf>,

    /// Try every decrypter table when the epoch has no table of its own.
    ///
    /// On by default. When off, an unknown epoch fails with [`crate::Error::UnknownVersion`].
    pub search_unknown_epochs: bool,

    /// Encoding of the encrypted string table.
    pub string_encoding: StringEncoding,
}

impl Default for MaxtoCodeConfig {
    fn default() -> Self {
        MaxtoCodeConfig {
            runtime_path: None,
            search_unknown_epochs: true,
            string_encoding: StringEncoding::default(),
        }
    }
}

impl MaxtoCodeConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path of the runtime DLL.
    #[must_use]
    pub fn with_runtime_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime_path = Some(path.into());
        self
    }

    /// Enables or disables the brute-force search over all decrypter tables.
    #[must_use]
    pub fn with_search_unknown_epochs(mut self, enabled: bool) -> Self {
        self.search_unknown_epochs = enabled;
        self
    }

    /// Sets the encoding of the string table.
    #[must_use]
    pub fn with_string_encoding(mut self, encoding: StringEncoding) -> Self {
        self.string_encoding = encoding;
        self
    }
}

/// How the instruction length field of a Babel.NET method body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstructionLength {
    /// Logical CIL code size in bytes. Tokens count as 4 bytes whatever
    /// their encoding in the container, so this is the length the restored
    /// body will have, not the number of bytes the record occupies.
    #[default]
    CodeSize,
    /// Number of instructions.
    Count,
}

/// Configuration for Babel.NET.
#[derive(Debug, Clone, Default)]
pub struct BabelConfig {
    /// Interpretation of the instruction length of method bodies.
    pub instruction_length: InstructionLength,
}

impl BabelConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interpretation of the instruction length field.
    #[must_use]
    pub fn with_instruction_length(mut self, instruction_length: InstructionLength) -> Self {
        self.instruction_length = instruction_length;
        self
    }
}

/// Bit values of the Crypto Obfuscator resource flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceFlags {
    /// DES-CBC stage.
    pub des: u8,
    /// Raw inflate stage.
    pub deflate: u8,
    /// Bitwise complement stage.
    pub bitwise_not: u8,
}

impl Default for ResourceFlags {
    fn default() -> Self {
        Self {
            des: 1,
            deflate: 2,
            bitwise_not: 4,
        }
    }
}

impl ResourceFlags {
    /// All bits that select a stage.
    #[must_use]
    pub fn known(&self) -> u8 {
        self.des | self.deflate | self.bitwise_not
    }
}

/// Configuration for Crypto Obfuscator.
#[derive(Debug, Clone, Default)]
pub struct CryptoObfuscatorConfig {
    /// Meaning of the bits in the resource flags byte.
    pub resource_flags: ResourceFlags,
}

impl CryptoObfuscatorConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the resource flag bits.
    #[must_use]
    pub fn with_resource_flags(mut self, resource_flags: ResourceFlags) -> Self {
        self.resource_flags = resource_flags;
        self
    }
}
