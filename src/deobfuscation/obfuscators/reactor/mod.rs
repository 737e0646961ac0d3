//! .NET Reactor v4 resources, methods data and strings.
//!
//! All three share the AES key material modelled by [`EncryptedResource`]. The decrypted
//! methods data is parsed by [`MethodsData`], strings by [`ReactorStringDecrypter`].

pub mod methods;
pub mod resource;
pub mod strings;

pub use methods::{
    convert_native_stub, BodyPatch, DwordPatch, JittedMethod, MethodsData, MethodsLayout,
};
pub use resource::EncryptedResource;
pub use strings::{decrypt_base64, ReactorStringDecrypter, StringLocator};
