//! CIL opcode descriptors and operand encodings.
//!
//! Decoders that rebuild CIL from a protector's private encoding need two facts per opcode: its
//! mnemonic and the ECMA-335 operand kind, which fixes how many bytes the operand occupies in a
//! standard method body. [`CilInstruction`] carries both, [`lookup`] finds it for a one or two
//! byte opcode.
//!
//! # Examples
//!
//! ```rust
//! use dotunpack::assembly::{lookup, opcode_size, OperandType};
//!
//! let ldfld = lookup(0x7B).unwrap();
//! assert_eq!(ldfld.instr, "ldfld");
//! assert_eq!(ldfld.op_type, OperandType::InlineField);
//! assert_eq!(ldfld.op_type.size(), Some(4));
//!
//! let ceq = lookup(0xFE01).unwrap();
//! assert_eq!(ceq.instr, "ceq");
//! assert_eq!(opcode_size(0xFE01), 2);
//! ```

use crate::assembly::{INSTRUCTIONS, INSTRUCTIONS_FE};

/// Operand kinds of CIL instructions, named after ECMA-335 III.1.
///
/// # Thread Safety
///
/// [`OperandType`] is [`std::marker::Send`] and [`std::marker::Sync`] as it only contains primitive data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandType {
    /// No operand
    InlineNone,
    /// Signed 8-bit branch offset
    ShortInlineBrTarget,
    /// Signed 32-bit branch offset
    InlineBrTarget,
    /// Target count followed by 32-bit offsets
    InlineSwitch,
    /// 16-bit local variable index
    InlineVar,
    /// 8-bit local variable index
    ShortInlineVar,
    /// 16-bit argument index
    InlineArg,
    /// 8-bit argument index
    ShortInlineArg,
    /// 32-bit integer
    InlineI,
    /// 8-bit integer
    ShortInlineI,
    /// 64-bit integer
    InlineI8,
    /// 64-bit float
    InlineR,
    /// 32-bit float
    ShortInlineR,
    /// User string token
    InlineString,
    /// Field token
    InlineField,
    /// Method token
    InlineMethod,
    /// Type token
    InlineType,
    /// Type, field or method token
    InlineTok,
    /// Stand-alone signature token
    InlineSig,
}

impl OperandType {
    /// Encoded size of the operand in a standard method body.
    ///
    /// Returns `None` for [`OperandType::InlineSwitch`], whose size is `4 + 4 * count`.
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        match self {
            OperandType::InlineNone => Some(0),
            OperandType::ShortInlineBrTarget
            | OperandType::ShortInlineVar
            | OperandType::ShortInlineArg
            | OperandType::ShortInlineI => Some(1),
            OperandType::InlineVar | OperandType::InlineArg => Some(2),
            OperandType::InlineBrTarget
            | OperandType::InlineI
            | OperandType::ShortInlineR
            | OperandType::InlineString
            | OperandType::InlineField
            | OperandType::InlineMethod
            | OperandType::InlineType
            | OperandType::InlineTok
            | OperandType::InlineSig => Some(4),
            OperandType::InlineI8 | OperandType::InlineR => Some(8),
            OperandType::InlineSwitch => None,
        }
    }

    /// `true` for operands that are encoded as a metadata token.
    #[must_use]
    pub const fn is_token(&self) -> bool {
        matches!(
            self,
            OperandType::InlineString
                | OperandType::InlineField
                | OperandType::InlineMethod
                | OperandType::InlineType
                | OperandType::InlineTok
                | OperandType::InlineSig
        )
    }
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CilInstruction {
    /// Mnemonic, empty for reserved opcodes
    pub instr: &'static str,
    /// Operand encoding
    pub op_type: OperandType,
}

impl CilInstruction {
    /// Placeholder for opcodes that ECMA-335 leaves undefined.
    pub const RESERVED: CilInstruction = CilInstruction::new("", OperandType::InlineNone);

    /// Create a table entry.
    #[must_use]
    pub const fn new(instr: &'static str, op_type: OperandType) -> Self {
        CilInstruction { instr, op_type }
    }

    /// `true` if the opcode is not defined.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        self.instr.is_empty()
    }
}

/// Find the descriptor of `opcode`.
///
/// Two byte opcodes are passed with their `0xFE` prefix in the high byte, e.g. `0xFE01` for
/// `ceq`. Returns `None` for reserved or out-of-range opcodes.
#[must_use]
pub fn lookup(opcode: u16) -> Option<&'static CilInstruction> {
    let [high, low] = opcode.to_be_bytes();
    let entry = match high {
        0x00 if low != 0xFE => INSTRUCTIONS.get(usize::from(low)),
        0xFE => INSTRUCTIONS_FE.get(usize::from(low)),
        _ => None,
    }?;

    (!entry.is_reserved()).then_some(entry)
}

/// Encoded size of `opcode` itself, 2 for `0xFE` prefixed opcodes.
#[must_use]
pub const fn opcode_size(opcode: u16) -> usize {
    if opcode > 0xFF {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_byte_opcodes() {
        let ldc = lookup(0x1F).unwrap();
        assert_eq!(ldc.instr, "ldc.i4.s");
        assert_eq!(ldc.op_type, OperandType::ShortInlineI);

        assert_eq!(lookup(0x45).unwrap().op_type, OperandType::InlineSwitch);
        assert_eq!(lookup(0xD0).unwrap().op_type, OperandType::InlineTok);
        assert_eq!(lookup(0xE0).unwrap().instr, "conv.u");
        assert_eq!(opcode_size(0x2A), 1);
    }

    #[test]
    fn two_byte_opcodes() {
        let ldloc = lookup(0xFE0C).unwrap();
        assert_eq!(ldloc.instr, "ldloc");
        assert_eq!(ldloc.op_type, OperandType::InlineVar);
        assert_eq!(lookup(0xFE1E).unwrap().instr, "readonly.");
    }

    #[test]
    fn reserved_opcodes() {
        assert!(lookup(0x24).is_none());
        assert!(lookup(0xA6).is_none());
        assert!(lookup(0xFE).is_none());
        assert!(lookup(0xFE08).is_none());
        assert!(lookup(0xFE1F).is_none());
        assert!(lookup(0x1234).is_none());
    }

    #[test]
    fn operand_sizes() {
        assert_eq!(OperandType::InlineNone.size(), Some(0));
        assert_eq!(OperandType::ShortInlineBrTarget.size(), Some(1));
        assert_eq!(OperandType::InlineArg.size(), Some(2));
        assert_eq!(OperandType::ShortInlineR.size(), Some(4));
        assert_eq!(OperandType::InlineSig.size(), Some(4));
        assert_eq!(OperandType::InlineR.size(), Some(8));
        assert_eq!(OperandType::InlineSwitch.size(), None);
        assert!(OperandType::InlineTok.is_token());
        assert!(!OperandType::InlineI.is_token());
    }
}
