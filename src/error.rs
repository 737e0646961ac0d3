use thiserror::Error;

use crate::utils::decompress::DecompressError;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! invalid_argument {
    ($msg:expr) => {
        crate::Error::InvalidArgument($msg.to_string())
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvalidArgument(format!($fmt, $($arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Format problems in obfuscator containers (bad magics, unknown tags, truncated tables) are
/// reported as [`Error::Malformed`] and are always fatal for the operation that raised them.
/// Recoverable situations such as an ambiguous MaxtoCode epoch never surface here, they are
/// reported through the `log` facade instead.
///
/// # Error Categories
///
/// ## Container Errors
/// - [`Error::Malformed`] - Corrupted or unrecognized structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond buffer boundaries
/// - [`Error::NotSupported`] - Recognized but unsupported format
/// - [`Error::Empty`] - Empty input provided
///
/// ## Decryption Errors
/// - [`Error::InvalidArgument`] - Key or data length contract violated
/// - [`Error::UnknownVersion`] - No MaxtoCode epoch could be determined
/// - [`Error::InvalidMethodBody`] - A decrypted method body failed the structural check
/// - [`Error::DecryptionFailed`] - Padding or key schedule failure in a block cipher
/// - [`Error::Decompress`] - Inflate or QuickLZ failure
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - PE parsing errors from goblin crate
///
/// # Examples
///
/// ```rust
/// use dotunpack::{Error, cipher::CryptDecrypter};
///
/// match CryptDecrypter::decrypt(&[0u8; 4], &[0u8; 8]) {
///     Err(Error::InvalidArgument(message)) => assert_eq!(message, "Invalid key size"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged or not in the expected format.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing.
    #[error("Out of Bound read would have occurred! - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This format is recognized but not supported.
    #[error("This format is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// A cipher was called with a key or data length it does not accept.
    #[error("{0}")]
    InvalidArgument(String),

    /// No MaxtoCode encryption version could be determined for the image.
    #[error("Unknown MC version")]
    UnknownVersion,

    /// A decrypted method body does not look like a valid CIL method body.
    #[error("Invalid method body")]
    InvalidMethodBody,

    /// A block cipher rejected the key, IV or padding.
    #[error("Decryption failed - {0}")]
    DecryptionFailed(String),

    /// Decompression of a payload failed.
    #[error("{0}")]
    Decompress(#[from] DecompressError),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),
}
