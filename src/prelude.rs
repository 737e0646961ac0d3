//! # dotunpack Prelude
//!
//! The commonly used types of the crate in one import: the PE image types, the cipher engines,
//! the configuration and every product decrypter.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotunpack operations
pub use crate::Error;

/// The result type used throughout dotunpack
pub use crate::Result;

// ================================================================================================
// PE Access
// ================================================================================================

/// PE image access and low-level parsing
pub use crate::{File, Image, MappedImage, Parser, Section};

/// CLR header and metadata root
pub use crate::metadata::{cor20header::Cor20Header, root::MetadataRoot, Metadata};

/// Method body header check
pub use crate::metadata::method::verify_method_body;

// ================================================================================================
// Ciphers
// ================================================================================================

/// Block cipher engines
pub use crate::cipher::{CryptDecrypter, Decrypter6, LeBlowfish};

// ================================================================================================
// Configuration
// ================================================================================================

/// Pipeline configuration
pub use crate::deobfuscation::{
    BabelConfig, CryptoObfuscatorConfig, DecryptConfig, InstructionLength, MaxtoCodeConfig,
    ResourceFlags, StringEncoding,
};

// ================================================================================================
// Product Decrypters
// ================================================================================================

/// Shared resource decryption interface
pub use crate::deobfuscation::obfuscators::ResourceDecrypter;

/// MaxtoCode
pub use crate::deobfuscation::obfuscators::maxtocode::{
    EncryptionVersion, MaxtoCode, McKey, McStringDecrypter, MethodInfos, PeHeader,
};

/// Babel.NET
pub use crate::deobfuscation::obfuscators::babel::{
    BabelConstants, BabelMethodsDecrypter, BabelResourceDecrypter, BabelStringDecrypter,
    ImageReader, TargetMethod,
};

/// Crypto Obfuscator
pub use crate::deobfuscation::obfuscators::cryptoobfuscator::{
    CoConstantsDecrypter, CoResourceDecrypter, CoStringDecrypter,
};

/// SmartAssembly
pub use crate::deobfuscation::obfuscators::smartassembly::{SaResourceDecrypter, SaStringDecrypter};

/// .NET Reactor
pub use crate::deobfuscation::obfuscators::reactor::{
    EncryptedResource, MethodsData, ReactorStringDecrypter,
};
