//! CIL method body headers, exception sections and their structural verification.
//!
//! Decrypted method bodies come out of cipher pipelines that cannot tell a right key from a wrong
//! one. [`verify_method_body`] is the plausibility check that decides between candidate
//! decryptions.

mod body;
mod exceptions;
mod types;

pub use body::{verify_method_body, MethodBody, MethodBodyHeader};
pub use exceptions::{ExceptionHandler, ExceptionHandlerFlags};
pub use types::{MethodBodyFlags, SectionFlags, SECTION_RESERVED_MASK, STANDALONE_SIG_TABLE};
