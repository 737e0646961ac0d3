//! CIL instruction set tables.
//!
//! The crate never disassembles whole images. These tables exist for the places where a
//! protector stores CIL in its own encoding (Babel.NET's method container) or where native
//! stubs are replaced with equivalent CIL (.NET Reactor).

mod instruction;
mod instructions;
pub mod opcodes;

pub use instruction::{lookup, opcode_size, CilInstruction, OperandType};
pub use instructions::{INSTRUCTIONS, INSTRUCTIONS_FE};
