//! Metadata stream directory entries.

mod streamheader;

pub use streamheader::StreamHeader;
