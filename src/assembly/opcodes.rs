//! CIL opcode byte constants used when emitting replacement code.
//!
//! Two-byte opcodes that use the `0xFE` prefix are stored with an `FE_` prefix holding the
//! second byte, [`FE_PREFIX`] is the shared first byte.
#![allow(missing_docs)]

pub const NOP: u8 = 0x00;
pub const LDARG_0: u8 = 0x02;
pub const LDNULL: u8 = 0x14;
pub const LDC_I4_0: u8 = 0x16;
pub const LDC_I4_S: u8 = 0x1F;
pub const LDC_I4: u8 = 0x20;
pub const CALL: u8 = 0x28;
pub const RET: u8 = 0x2A;
pub const BR_S: u8 = 0x2B;
pub const BR: u8 = 0x38;
pub const SWITCH: u8 = 0x45;
pub const CONV_U4: u8 = 0x6D;
pub const LDSTR: u8 = 0x72;
pub const THROW: u8 = 0x7A;
pub const LDFLD: u8 = 0x7B;
pub const LDTOKEN: u8 = 0xD0;
pub const LEAVE_S: u8 = 0xDE;

pub const FE_PREFIX: u8 = 0xFE;
pub const FE_CEQ: u8 = 0x01;
pub const FE_LDARG: u8 = 0x09;
pub const FE_LDLOC: u8 = 0x0C;
