//! Exception handler clauses of CIL method bodies.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// The kind of an exception handler clause
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause
        const EXCEPTION = 0x0000;
        /// An exception filter and handler clause
        const FILTER = 0x0001;
        /// A finally clause
        const FINALLY = 0x0002;
        /// Fault clause (finally that is called on exception only)
        const FAULT = 0x0004;
    }
}

/// One clause of an exception handling section, ECMA-335 II.25.4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Kind of the clause
    pub flags: ExceptionHandlerFlags,
    /// Offset in bytes of the try block from the start of the code
    pub try_offset: u32,
    /// Length in bytes of the try block
    pub try_length: u32,
    /// Offset of the handler for this try block
    pub handler_offset: u32,
    /// Size of the handler code in bytes
    pub handler_length: u32,
    /// Type token of a typed clause, or the filter offset of a filter clause
    pub class_token_or_filter: u32,
}
