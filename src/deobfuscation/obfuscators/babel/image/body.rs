//! Method body decoding.
//!
//! Babel.NET writes instructions with their standard opcodes and operand encodings, except that
//! every metadata token is replaced by an inline sub-record (a string index, a type index, a
//! member reference). Instruction offsets, and therefore branch targets, are still computed as
//! if tokens took their usual 4 bytes.

use std::collections::HashMap;

use crate::{
    assembly::{lookup, opcode_size, opcodes::LDC_I4_S, CilInstruction, OperandType},
    deobfuscation::{
        config::InstructionLength,
        obfuscators::babel::image::{
            types::{
                ExceptionHandler, ExceptionHandlerKind, Instruction, MemberRef, MethodBodyFlags,
                MethodDefinition, MethodRef, Operand, Parameter,
            },
            ImageReader,
        },
    },
    file::parser::Parser,
    Result,
};

/// Encoded size of an instruction in a standard CIL body.
pub(super) fn encoded_size(opcode: u16, operand: &Operand) -> u32 {
    let operand_size = match operand {
        Operand::Switch(targets) => 4 + 4 * targets.len(),
        _ => lookup(opcode)
            .and_then(|instruction| instruction.op_type.size())
            .unwrap_or(0),
    };
    (opcode_size(opcode) + operand_size) as u32
}

/// Argument and local counts the operands are checked against.
struct Frame {
    has_this: bool,
    parameters: usize,
    locals: usize,
}

impl Frame {
    fn parameter(&self, index: usize) -> Result<Parameter> {
        let parameter = match (self.has_this, index) {
            (true, 0) => return Ok(Parameter::This),
            (true, index) => index - 1,
            (false, index) => index,
        };
        if parameter < self.parameters {
            Ok(Parameter::Param(parameter))
        } else {
            Err(malformed_error!("Invalid parameter index {}", index))
        }
    }

    fn local(&self, index: u16) -> Result<Operand> {
        if usize::from(index) < self.locals {
            Ok(Operand::Local(index))
        } else {
            Err(malformed_error!("Invalid local index {}", index))
        }
    }
}

/// An instruction whose branch targets are still offsets.
struct Decoded {
    instruction: Instruction,
    targets: Option<Vec<i64>>,
    size: u32,
}

/// Maps logical offsets to instruction indices.
struct OffsetMap {
    indices: HashMap<i64, usize>,
    code_size: i64,
}

impl OffsetMap {
    fn get(&self, offset: i64) -> Result<usize> {
        self.indices
            .get(&offset)
            .copied()
            .ok_or_else(|| malformed_error!("No instruction found at offset {:04X}", offset))
    }

    /// Like [`OffsetMap::get`], but the end of the code maps to `None`.
    fn get_or_end(&self, offset: i64) -> Result<Option<usize>> {
        if offset == self.code_size {
            Ok(None)
        } else {
            self.get(offset).map(Some)
        }
    }
}

impl ImageReader {
    /// Read the body part of a method whose reference part is `reference`.
    pub(super) fn read_body(
        &self,
        parser: &mut Parser,
        reference: MethodRef,
    ) -> Result<MethodDefinition> {
        let flags = MethodBodyFlags::from_bits_retain(parser.read_le::<u16>()?);
        let max_stack = parser.read_le::<u16>()?;
        let locals = self.read_type_refs(parser)?;
        let length = parser.read_variable_length_uint()?;

        let frame = Frame {
            has_this: reference.has_this(),
            parameters: reference.parameters.len(),
            locals: locals.len(),
        };

        let mut decoded = Vec::new();
        let mut offset = 0u32;
        match self.config.instruction_length {
            InstructionLength::CodeSize => {
                // offsets are logical CIL offsets, not container positions
                while offset < length {
                    let instruction = self.read_instruction(parser, offset, &frame)?;
                    offset += instruction.size;
                    decoded.push(instruction);
                }
                if offset != length {
                    return Err(malformed_error!("Could not read all instructions"));
                }
            }
            InstructionLength::Count => {
                for _ in 0..length {
                    let instruction = self.read_instruction(parser, offset, &frame)?;
                    offset += instruction.size;
                    decoded.push(instruction);
                }
            }
        }

        let offsets = OffsetMap {
            indices: decoded
                .iter()
                .enumerate()
                .map(|(index, d)| (i64::from(d.instruction.offset), index))
                .collect(),
            code_size: i64::from(offset),
        };

        let mut instructions = Vec::with_capacity(decoded.len());
        for Decoded {
            mut instruction,
            targets,
            ..
        } in decoded
        {
            if let Some(targets) = targets {
                instruction.operand = match instruction.operand {
                    Operand::Switch(_) => Operand::Switch(
                        targets
                            .iter()
                            .map(|&target| offsets.get(target))
                            .collect::<Result<_>>()?,
                    ),
                    _ => Operand::Branch(offsets.get(targets[0])?),
                };
            }
            instructions.push(instruction);
        }

        let count = parser.read_variable_length_uint()?;
        let mut exception_handlers = Vec::new();
        for _ in 0..count {
            exception_handlers.push(self.read_exception_handler(parser, &offsets)?);
        }

        Ok(MethodDefinition {
            reference,
            flags,
            max_stack,
            locals,
            instructions,
            exception_handlers,
        })
    }

    fn read_instruction(&self, parser: &mut Parser, offset: u32, frame: &Frame) -> Result<Decoded> {
        let first = parser.read_le::<u8>()?;
        let opcode = if first == 0xFE {
            0xFE00 | u16::from(parser.read_le::<u8>()?)
        } else {
            u16::from(first)
        };
        let Some(&CilInstruction { instr, op_type }) = lookup(opcode) else {
            return Err(malformed_error!("Invalid opcode 0x{:X} at offset {:04X}", opcode, offset));
        };

        let mut size = (opcode_size(opcode) + op_type.size().unwrap_or(0)) as u32;
        let next = i64::from(offset) + i64::from(size);
        let mut targets = None;

        let operand = match op_type {
            OperandType::InlineNone => Operand::None,
            OperandType::ShortInlineBrTarget => {
                targets = Some(vec![next + i64::from(parser.read_le::<i8>()?)]);
                Operand::Branch(0)
            }
            OperandType::InlineBrTarget => {
                targets = Some(vec![next + i64::from(parser.read_le::<i32>()?)]);
                Operand::Branch(0)
            }
            OperandType::InlineSwitch => {
                let count = parser.read_le::<i32>()?;
                let count = usize::try_from(count)
                    .map_err(|_| malformed_error!("Invalid switch target count {}", count))?;
                parser.ensure_remaining(count.saturating_mul(4))?;

                size = (opcode_size(opcode) + 4 + 4 * count) as u32;
                let base = i64::from(offset) + i64::from(size);
                let mut list = Vec::with_capacity(count);
                for _ in 0..count {
                    list.push(base + i64::from(parser.read_le::<i32>()?));
                }
                targets = Some(list);
                Operand::Switch(vec![0; count])
            }
            OperandType::InlineVar => frame.local(parser.read_le::<u16>()?)?,
            OperandType::ShortInlineVar => frame.local(u16::from(parser.read_le::<u8>()?))?,
            OperandType::InlineArg => {
                Operand::Parameter(frame.parameter(usize::from(parser.read_le::<u16>()?))?)
            }
            OperandType::ShortInlineArg => {
                Operand::Parameter(frame.parameter(usize::from(parser.read_le::<u8>()?))?)
            }
            OperandType::InlineI => Operand::Int32(parser.read_le::<i32>()?),
            OperandType::ShortInlineI if opcode == u16::from(LDC_I4_S) => {
                Operand::Int8(parser.read_le::<i8>()?)
            }
            OperandType::ShortInlineI => Operand::UInt8(parser.read_le::<u8>()?),
            OperandType::InlineI8 => Operand::Int64(parser.read_le::<i64>()?),
            OperandType::InlineR => Operand::Float64(parser.read_le::<f64>()?),
            OperandType::ShortInlineR => Operand::Float32(parser.read_le::<f32>()?),
            OperandType::InlineString => Operand::String(self.read_string(parser)?.to_string()),
            OperandType::InlineField => Operand::Field(self.read_field_ref(parser)?),
            OperandType::InlineMethod => Operand::Method(self.read_method_ref(parser)?),
            OperandType::InlineType => Operand::Type(self.read_type_ref(parser)?),
            OperandType::InlineSig => Operand::Signature(self.read_call_site(parser)?),
            OperandType::InlineTok => Operand::Token(match parser.read_le::<u8>()? {
                0 => MemberRef::Type(self.read_type_ref(parser)?),
                1 => MemberRef::Field(self.read_field_ref(parser)?),
                2 => MemberRef::Method(self.read_method_ref(parser)?),
                _ => return Err(malformed_error!("Unknown token type")),
            }),
        };

        Ok(Decoded {
            instruction: Instruction {
                offset,
                opcode,
                mnemonic: instr,
                operand,
            },
            targets,
            size,
        })
    }

    fn read_exception_handler(
        &self,
        parser: &mut Parser,
        offsets: &OffsetMap,
    ) -> Result<ExceptionHandler> {
        let kind = ExceptionHandlerKind::try_from(parser.read_le::<u8>()?)?;
        let try_offset = i64::from(parser.read_variable_length_uint()?);
        let try_length = i64::from(parser.read_variable_length_uint()?);
        let handler_offset = i64::from(parser.read_variable_length_uint()?);
        let handler_length = i64::from(parser.read_variable_length_uint()?);
        let catch_type = self.read_type_ref(parser)?;
        let filter_offset = i64::from(parser.read_variable_length_uint()?);

        Ok(ExceptionHandler {
            kind,
            try_start: offsets.get(try_offset)?,
            try_end: offsets.get_or_end(try_offset + try_length)?,
            handler_start: offsets.get(handler_offset)?,
            handler_end: offsets.get_or_end(handler_offset + handler_length)?,
            filter_start: if kind == ExceptionHandlerKind::Filter {
                Some(offsets.get(filter_offset)?)
            } else {
                None
            },
            catch_type,
        })
    }
}
