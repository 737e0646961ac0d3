//! Babel.NET resources, strings, constants and encrypted methods.
//!
//! Everything Babel.NET hides lives in embedded resources wrapped by
//! [`BabelResourceDecrypter`]. Once unwrapped, the string resource is read by
//! [`BabelStringDecrypter`], the constants resource by [`BabelConstants`], and encrypted methods
//! by [`ImageReader`] through [`BabelMethodsDecrypter`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotunpack::deobfuscation::obfuscators::{
//!     babel::{BabelResourceDecrypter, BabelStringDecrypter},
//!     ResourceDecrypter,
//! };
//!
//! let resource = std::fs::read("strings.resource")?;
//! let plain = BabelResourceDecrypter::new(None).decrypt(&resource)?;
//! let strings = BabelStringDecrypter::new(&plain)?;
//! println!("{}", strings.decrypt(0)?);
//! # Ok::<(), dotunpack::Error>(())
//! ```

pub mod constants;
pub mod image;
pub mod methods;
pub mod resource;
pub mod strings;

pub use constants::BabelConstants;
pub use image::{
    ContainerVersion, ImageReader, MethodDefinition, Operand, Parameter, RestoredBody,
    TargetMethod,
};
pub use methods::{split_feature_name, BabelMethodsDecrypter};
pub use resource::{BabelResourceDecrypter, BabelResourceVersion};
pub use strings::BabelStringDecrypter;
