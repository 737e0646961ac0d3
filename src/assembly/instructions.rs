//! Opcode tables for one byte and `0xFE` prefixed CIL instructions.
//!
//! Indexed by the opcode byte (the second byte for prefixed opcodes). Undefined slots hold
//! [`CilInstruction::RESERVED`].

use crate::assembly::{CilInstruction, OperandType};

/// One byte opcodes `0x00..=0xFF`.
pub const INSTRUCTIONS: [CilInstruction; 256] = [
    CilInstruction::new("nop", OperandType::InlineNone), // 0x00
    CilInstruction::new("break", OperandType::InlineNone), // 0x01
    CilInstruction::new("ldarg.0", OperandType::InlineNone), // 0x02
    CilInstruction::new("ldarg.1", OperandType::InlineNone), // 0x03
    CilInstruction::new("ldarg.2", OperandType::InlineNone), // 0x04
    CilInstruction::new("ldarg.3", OperandType::InlineNone), // 0x05
    CilInstruction::new("ldloc.0", OperandType::InlineNone), // 0x06
    CilInstruction::new("ldloc.1", OperandType::InlineNone), // 0x07
    CilInstruction::new("ldloc.2", OperandType::InlineNone), // 0x08
    CilInstruction::new("ldloc.3", OperandType::InlineNone), // 0x09
    CilInstruction::new("stloc.0", OperandType::InlineNone), // 0x0A
    CilInstruction::new("stloc.1", OperandType::InlineNone), // 0x0B
    CilInstruction::new("stloc.2", OperandType::InlineNone), // 0x0C
    CilInstruction::new("stloc.3", OperandType::InlineNone), // 0x0D
    CilInstruction::new("ldarg.s", OperandType::ShortInlineArg), // 0x0E
    CilInstruction::new("ldarga.s", OperandType::ShortInlineArg), // 0x0F
    CilInstruction::new("starg.s", OperandType::ShortInlineArg), // 0x10
    CilInstruction::new("ldloc.s", OperandType::ShortInlineVar), // 0x11
    CilInstruction::new("ldloca.s", OperandType::ShortInlineVar), // 0x12
    CilInstruction::new("stloc.s", OperandType::ShortInlineVar), // 0x13
    CilInstruction::new("ldnull", OperandType::InlineNone), // 0x14
    CilInstruction::new("ldc.i4.m1", OperandType::InlineNone), // 0x15
    CilInstruction::new("ldc.i4.0", OperandType::InlineNone), // 0x16
    CilInstruction::new("ldc.i4.1", OperandType::InlineNone), // 0x17
    CilInstruction::new("ldc.i4.2", OperandType::InlineNone), // 0x18
    CilInstruction::new("ldc.i4.3", OperandType::InlineNone), // 0x19
    CilInstruction::new("ldc.i4.4", OperandType::InlineNone), // 0x1A
    CilInstruction::new("ldc.i4.5", OperandType::InlineNone), // 0x1B
    CilInstruction::new("ldc.i4.6", OperandType::InlineNone), // 0x1C
    CilInstruction::new("ldc.i4.7", OperandType::InlineNone), // 0x1D
    CilInstruction::new("ldc.i4.8", OperandType::InlineNone), // 0x1E
    CilInstruction::new("ldc.i4.s", OperandType::ShortInlineI), // 0x1F
    CilInstruction::new("ldc.i4", OperandType::InlineI), // 0x20
    CilInstruction::new("ldc.i8", OperandType::InlineI8), // 0x21
    CilInstruction::new("ldc.r4", OperandType::ShortInlineR), // 0x22
    CilInstruction::new("ldc.r8", OperandType::InlineR), // 0x23
    CilInstruction::RESERVED, // 0x24
    CilInstruction::new("dup", OperandType::InlineNone), // 0x25
    CilInstruction::new("pop", OperandType::InlineNone), // 0x26
    CilInstruction::new("jmp", OperandType::InlineMethod), // 0x27
    CilInstruction::new("call", OperandType::InlineMethod), // 0x28
    CilInstruction::new("calli", OperandType::InlineSig), // 0x29
    CilInstruction::new("ret", OperandType::InlineNone), // 0x2A
    CilInstruction::new("br.s", OperandType::ShortInlineBrTarget), // 0x2B
    CilInstruction::new("brfalse.s", OperandType::ShortInlineBrTarget), // 0x2C
    CilInstruction::new("brtrue.s", OperandType::ShortInlineBrTarget), // 0x2D
    CilInstruction::new("beq.s", OperandType::ShortInlineBrTarget), // 0x2E
    CilInstruction::new("bge.s", OperandType::ShortInlineBrTarget), // 0x2F
    CilInstruction::new("bgt.s", OperandType::ShortInlineBrTarget), // 0x30
    CilInstruction::new("ble.s", OperandType::ShortInlineBrTarget), // 0x31
    CilInstruction::new("blt.s", OperandType::ShortInlineBrTarget), // 0x32
    CilInstruction::new("bne.un.s", OperandType::ShortInlineBrTarget), // 0x33
    CilInstruction::new("bge.un.s", OperandType::ShortInlineBrTarget), // 0x34
    CilInstruction::new("bgt.un.s", OperandType::ShortInlineBrTarget), // 0x35
    CilInstruction::new("ble.un.s", OperandType::ShortInlineBrTarget), // 0x36
    CilInstruction::new("blt.un.s", OperandType::ShortInlineBrTarget), // 0x37
    CilInstruction::new("br", OperandType::InlineBrTarget), // 0x38
    CilInstruction::new("brfalse", OperandType::InlineBrTarget), // 0x39
    CilInstruction::new("brtrue", OperandType::InlineBrTarget), // 0x3A
    CilInstruction::new("beq", OperandType::InlineBrTarget), // 0x3B
    CilInstruction::new("bge", OperandType::InlineBrTarget), // 0x3C
    CilInstruction::new("bgt", OperandType::InlineBrTarget), // 0x3D
    CilInstruction::new("ble", OperandType::InlineBrTarget), // 0x3E
    CilInstruction::new("blt", OperandType::InlineBrTarget), // 0x3F
    CilInstruction::new("bne.un", OperandType::InlineBrTarget), // 0x40
    CilInstruction::new("bge.un", OperandType::InlineBrTarget), // 0x41
    CilInstruction::new("bgt.un", OperandType::InlineBrTarget), // 0x42
    CilInstruction::new("ble.un", OperandType::InlineBrTarget), // 0x43
    CilInstruction::new("blt.un", OperandType::InlineBrTarget), // 0x44
    CilInstruction::new("switch", OperandType::InlineSwitch), // 0x45
    CilInstruction::new("ldind.i1", OperandType::InlineNone), // 0x46
    CilInstruction::new("ldind.u1", OperandType::InlineNone), // 0x47
    CilInstruction::new("ldind.i2", OperandType::InlineNone), // 0x48
    CilInstruction::new("ldind.u2", OperandType::InlineNone), // 0x49
    CilInstruction::new("ldind.i4", OperandType::InlineNone), // 0x4A
    CilInstruction::new("ldind.u4", OperandType::InlineNone), // 0x4B
    CilInstruction::new("ldind.i8", OperandType::InlineNone), // 0x4C
    CilInstruction::new("ldind.i", OperandType::InlineNone), // 0x4D
    CilInstruction::new("ldind.r4", OperandType::InlineNone), // 0x4E
    CilInstruction::new("ldind.r8", OperandType::InlineNone), // 0x4F
    CilInstruction::new("ldind.ref", OperandType::InlineNone), // 0x50
    CilInstruction::new("stind.ref", OperandType::InlineNone), // 0x51
    CilInstruction::new("stind.i1", OperandType::InlineNone), // 0x52
    CilInstruction::new("stind.i2", OperandType::InlineNone), // 0x53
    CilInstruction::new("stind.i4", OperandType::InlineNone), // 0x54
    CilInstruction::new("stind.i8", OperandType::InlineNone), // 0x55
    CilInstruction::new("stind.r4", OperandType::InlineNone), // 0x56
    CilInstruction::new("stind.r8", OperandType::InlineNone), // 0x57
    CilInstruction::new("add", OperandType::InlineNone), // 0x58
    CilInstruction::new("sub", OperandType::InlineNone), // 0x59
    CilInstruction::new("mul", OperandType::InlineNone), // 0x5A
    CilInstruction::new("div", OperandType::InlineNone), // 0x5B
    CilInstruction::new("div.un", OperandType::InlineNone), // 0x5C
    CilInstruction::new("rem", OperandType::InlineNone), // 0x5D
    CilInstruction::new("rem.un", OperandType::InlineNone), // 0x5E
    CilInstruction::new("and", OperandType::InlineNone), // 0x5F
    CilInstruction::new("or", OperandType::InlineNone), // 0x60
    CilInstruction::new("xor", OperandType::InlineNone), // 0x61
    CilInstruction::new("shl", OperandType::InlineNone), // 0x62
    CilInstruction::new("shr", OperandType::InlineNone), // 0x63
    CilInstruction::new("shr.un", OperandType::InlineNone), // 0x64
    CilInstruction::new("neg", OperandType::InlineNone), // 0x65
    CilInstruction::new("not", OperandType::InlineNone), // 0x66
    CilInstruction::new("conv.i1", OperandType::InlineNone), // 0x67
    CilInstruction::new("conv.i2", OperandType::InlineNone), // 0x68
    CilInstruction::new("conv.i4", OperandType::InlineNone), // 0x69
    CilInstruction::new("conv.i8", OperandType::InlineNone), // 0x6A
    CilInstruction::new("conv.r4", OperandType::InlineNone), // 0x6B
    CilInstruction::new("conv.r8", OperandType::InlineNone), // 0x6C
    CilInstruction::new("conv.u4", OperandType::InlineNone), // 0x6D
    CilInstruction::new("conv.u8", OperandType::InlineNone), // 0x6E
    CilInstruction::new("callvirt", OperandType::InlineMethod), // 0x6F
    CilInstruction::new("cpobj", OperandType::InlineType), // 0x70
    CilInstruction::new("ldobj", OperandType::InlineType), // 0x71
    CilInstruction::new("ldstr", OperandType::InlineString), // 0x72
    CilInstruction::new("newobj", OperandType::InlineMethod), // 0x73
    CilInstruction::new("castclass", OperandType::InlineType), // 0x74
    CilInstruction::new("isinst", OperandType::InlineType), // 0x75
    CilInstruction::new("conv.r.un", OperandType::InlineNone), // 0x76
    CilInstruction::RESERVED, // 0x77
    CilInstruction::RESERVED, // 0x78
    CilInstruction::new("unbox", OperandType::InlineType), // 0x79
    CilInstruction::new("throw", OperandType::InlineNone), // 0x7A
    CilInstruction::new("ldfld", OperandType::InlineField), // 0x7B
    CilInstruction::new("ldflda", OperandType::InlineField), // 0x7C
    CilInstruction::new("stfld", OperandType::InlineField), // 0x7D
    CilInstruction::new("ldsfld", OperandType::InlineField), // 0x7E
    CilInstruction::new("ldsflda", OperandType::InlineField), // 0x7F
    CilInstruction::new("stsfld", OperandType::InlineField), // 0x80
    CilInstruction::new("stobj", OperandType::InlineType), // 0x81
    CilInstruction::new("conv.ovf.i1.un", OperandType::InlineNone), // 0x82
    CilInstruction::new("conv.ovf.i2.un", OperandType::InlineNone), // 0x83
    CilInstruction::new("conv.ovf.i4.un", OperandType::InlineNone), // 0x84
    CilInstruction::new("conv.ovf.i8.un", OperandType::InlineNone), // 0x85
    CilInstruction::new("conv.ovf.u1.un", OperandType::InlineNone), // 0x86
    CilInstruction::new("conv.ovf.u2.un", OperandType::InlineNone), // 0x87
    CilInstruction::new("conv.ovf.u4.un", OperandType::InlineNone), // 0x88
    CilInstruction::new("conv.ovf.u8.un", OperandType::InlineNone), // 0x89
    CilInstruction::new("conv.ovf.i.un", OperandType::InlineNone), // 0x8A
    CilInstruction::new("conv.ovf.u.un", OperandType::InlineNone), // 0x8B
    CilInstruction::new("box", OperandType::InlineType), // 0x8C
    CilInstruction::new("newarr", OperandType::InlineType), // 0x8D
    CilInstruction::new("ldlen", OperandType::InlineNone), // 0x8E
    CilInstruction::new("ldelema", OperandType::InlineType), // 0x8F
    CilInstruction::new("ldelem.i1", OperandType::InlineNone), // 0x90
    CilInstruction::new("ldelem.u1", OperandType::InlineNone), // 0x91
    CilInstruction::new("ldelem.i2", OperandType::InlineNone), // 0x92
    CilInstruction::new("ldelem.u2", OperandType::InlineNone), // 0x93
    CilInstruction::new("ldelem.i4", OperandType::InlineNone), // 0x94
    CilInstruction::new("ldelem.u4", OperandType::InlineNone), // 0x95
    CilInstruction::new("ldelem.i8", OperandType::InlineNone), // 0x96
    CilInstruction::new("ldelem.i", OperandType::InlineNone), // 0x97
    CilInstruction::new("ldelem.r4", OperandType::InlineNone), // 0x98
    CilInstruction::new("ldelem.r8", OperandType::InlineNone), // 0x99
    CilInstruction::new("ldelem.ref", OperandType::InlineNone), // 0x9A
    CilInstruction::new("stelem.i", OperandType::InlineNone), // 0x9B
    CilInstruction::new("stelem.i1", OperandType::InlineNone), // 0x9C
    CilInstruction::new("stelem.i2", OperandType::InlineNone), // 0x9D
    CilInstruction::new("stelem.i4", OperandType::InlineNone), // 0x9E
    CilInstruction::new("stelem.i8", OperandType::InlineNone), // 0x9F
    CilInstruction::new("stelem.r4", OperandType::InlineNone), // 0xA0
    CilInstruction::new("stelem.r8", OperandType::InlineNone), // 0xA1
    CilInstruction::new("stelem.ref", OperandType::InlineNone), // 0xA2
    CilInstruction::new("ldelem", OperandType::InlineType), // 0xA3
    CilInstruction::new("stelem", OperandType::InlineType), // 0xA4
    CilInstruction::new("unbox.any", OperandType::InlineType), // 0xA5
    CilInstruction::RESERVED, // 0xA6
    CilInstruction::RESERVED, // 0xA7
    CilInstruction::RESERVED, // 0xA8
    CilInstruction::RESERVED, // 0xA9
    CilInstruction::RESERVED, // 0xAA
    CilInstruction::RESERVED, // 0xAB
    CilInstruction::RESERVED, // 0xAC
    CilInstruction::RESERVED, // 0xAD
    CilInstruction::RESERVED, // 0xAE
    CilInstruction::RESERVED, // 0xAF
    CilInstruction::RESERVED, // 0xB0
    CilInstruction::RESERVED, // 0xB1
    CilInstruction::RESERVED, // 0xB2
    CilInstruction::new("conv.ovf.i1", OperandType::InlineNone), // 0xB3
    CilInstruction::new("conv.ovf.u1", OperandType::InlineNone), // 0xB4
    CilInstruction::new("conv.ovf.i2", OperandType::InlineNone), // 0xB5
    CilInstruction::new("conv.ovf.u2", OperandType::InlineNone), // 0xB6
    CilInstruction::new("conv.ovf.i4", OperandType::InlineNone), // 0xB7
    CilInstruction::new("conv.ovf.u4", OperandType::InlineNone), // 0xB8
    CilInstruction::new("conv.ovf.i8", OperandType::InlineNone), // 0xB9
    CilInstruction::new("conv.ovf.u8", OperandType::InlineNone), // 0xBA
    CilInstruction::RESERVED, // 0xBB
    CilInstruction::RESERVED, // 0xBC
    CilInstruction::RESERVED, // 0xBD
    CilInstruction::RESERVED, // 0xBE
    CilInstruction::RESERVED, // 0xBF
    CilInstruction::RESERVED, // 0xC0
    CilInstruction::RESERVED, // 0xC1
    CilInstruction::new("refanyval", OperandType::InlineType), // 0xC2
    CilInstruction::new("ckfinite", OperandType::InlineNone), // 0xC3
    CilInstruction::RESERVED, // 0xC4
    CilInstruction::RESERVED, // 0xC5
    CilInstruction::new("mkrefany", OperandType::InlineType), // 0xC6
    CilInstruction::RESERVED, // 0xC7
    CilInstruction::RESERVED, // 0xC8
    CilInstruction::RESERVED, // 0xC9
    CilInstruction::RESERVED, // 0xCA
    CilInstruction::RESERVED, // 0xCB
    CilInstruction::RESERVED, // 0xCC
    CilInstruction::RESERVED, // 0xCD
    CilInstruction::RESERVED, // 0xCE
    CilInstruction::RESERVED, // 0xCF
    CilInstruction::new("ldtoken", OperandType::InlineTok), // 0xD0
    CilInstruction::new("conv.u2", OperandType::InlineNone), // 0xD1
    CilInstruction::new("conv.u1", OperandType::InlineNone), // 0xD2
    CilInstruction::new("conv.i", OperandType::InlineNone), // 0xD3
    CilInstruction::new("conv.ovf.i", OperandType::InlineNone), // 0xD4
    CilInstruction::new("conv.ovf.u", OperandType::InlineNone), // 0xD5
    CilInstruction::new("add.ovf", OperandType::InlineNone), // 0xD6
    CilInstruction::new("add.ovf.un", OperandType::InlineNone), // 0xD7
    CilInstruction::new("mul.ovf", OperandType::InlineNone), // 0xD8
    CilInstruction::new("mul.ovf.un", OperandType::InlineNone), // 0xD9
    CilInstruction::new("sub.ovf", OperandType::InlineNone), // 0xDA
    CilInstruction::new("sub.ovf.un", OperandType::InlineNone), // 0xDB
    CilInstruction::new("endfinally", OperandType::InlineNone), // 0xDC
    CilInstruction::new("leave", OperandType::InlineBrTarget), // 0xDD
    CilInstruction::new("leave.s", OperandType::ShortInlineBrTarget), // 0xDE
    CilInstruction::new("stind.i", OperandType::InlineNone), // 0xDF
    CilInstruction::new("conv.u", OperandType::InlineNone), // 0xE0
    CilInstruction::RESERVED, // 0xE1
    CilInstruction::RESERVED, // 0xE2
    CilInstruction::RESERVED, // 0xE3
    CilInstruction::RESERVED, // 0xE4
    CilInstruction::RESERVED, // 0xE5
    CilInstruction::RESERVED, // 0xE6
    CilInstruction::RESERVED, // 0xE7
    CilInstruction::RESERVED, // 0xE8
    CilInstruction::RESERVED, // 0xE9
    CilInstruction::RESERVED, // 0xEA
    CilInstruction::RESERVED, // 0xEB
    CilInstruction::RESERVED, // 0xEC
    CilInstruction::RESERVED, // 0xED
    CilInstruction::RESERVED, // 0xEE
    CilInstruction::RESERVED, // 0xEF
    CilInstruction::RESERVED, // 0xF0
    CilInstruction::RESERVED, // 0xF1
    CilInstruction::RESERVED, // 0xF2
    CilInstruction::RESERVED, // 0xF3
    CilInstruction::RESERVED, // 0xF4
    CilInstruction::RESERVED, // 0xF5
    CilInstruction::RESERVED, // 0xF6
    CilInstruction::RESERVED, // 0xF7
    CilInstruction::RESERVED, // 0xF8
    CilInstruction::RESERVED, // 0xF9
    CilInstruction::RESERVED, // 0xFA
    CilInstruction::RESERVED, // 0xFB
    CilInstruction::RESERVED, // 0xFC
    CilInstruction::RESERVED, // 0xFD
    CilInstruction::RESERVED, // 0xFE
    CilInstruction::RESERVED, // 0xFF
];

/// Second bytes of `0xFE` prefixed opcodes.
pub const INSTRUCTIONS_FE: [CilInstruction; 31] = [
    CilInstruction::new("arglist", OperandType::InlineNone), // 0x00
    CilInstruction::new("ceq", OperandType::InlineNone), // 0x01
    CilInstruction::new("cgt", OperandType::InlineNone), // 0x02
    CilInstruction::new("cgt.un", OperandType::InlineNone), // 0x03
    CilInstruction::new("clt", OperandType::InlineNone), // 0x04
    CilInstruction::new("clt.un", OperandType::InlineNone), // 0x05
    CilInstruction::new("ldftn", OperandType::InlineMethod), // 0x06
    CilInstruction::new("ldvirtftn", OperandType::InlineMethod), // 0x07
    CilInstruction::RESERVED, // 0x08
    CilInstruction::new("ldarg", OperandType::InlineArg), // 0x09
    CilInstruction::new("ldarga", OperandType::InlineArg), // 0x0A
    CilInstruction::new("starg", OperandType::InlineArg), // 0x0B
    CilInstruction::new("ldloc", OperandType::InlineVar), // 0x0C
    CilInstruction::new("ldloca", OperandType::InlineVar), // 0x0D
    CilInstruction::new("stloc", OperandType::InlineVar), // 0x0E
    CilInstruction::new("localloc", OperandType::InlineNone), // 0x0F
    CilInstruction::RESERVED, // 0x10
    CilInstruction::new("endfilter", OperandType::InlineNone), // 0x11
    CilInstruction::new("unaligned.", OperandType::ShortInlineI), // 0x12
    CilInstruction::new("volatile.", OperandType::InlineNone), // 0x13
    CilInstruction::new("tail.", OperandType::InlineNone), // 0x14
    CilInstruction::new("initobj", OperandType::InlineType), // 0x15
    CilInstruction::new("constrained.", OperandType::InlineType), // 0x16
    CilInstruction::new("cpblk", OperandType::InlineNone), // 0x17
    CilInstruction::new("initblk", OperandType::InlineNone), // 0x18
    CilInstruction::new("no.", OperandType::ShortInlineI), // 0x19
    CilInstruction::new("rethrow", OperandType::InlineNone), // 0x1A
    CilInstruction::RESERVED, // 0x1B
    CilInstruction::new("sizeof", OperandType::InlineType), // 0x1C
    CilInstruction::new("refanytype", OperandType::InlineNone), // 0x1D
    CilInstruction::new("readonly.", OperandType::InlineNone), // 0x1E
];
