//! Values read from a Babel.NET method container.
//!
//! Type references are kept in the reader's arena and referred to by index, see
//! [`crate::deobfuscation::obfuscators::babel::ImageReader::type_ref`]. Index 0 of the arena is
//! the null type, which is why type fields are `Option<usize>`.

use bitflags::bitflags;

bitflags! {
    /// Flags byte of a method reference.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MethodRefFlags: u8 {
        /// Instance method, argument 0 is `this`
        const HAS_THIS = 0x01;
        /// Generic method instantiation, generic arguments follow
        const GENERIC = 0x02;
    }
}

bitflags! {
    /// Flags of an encrypted method body.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MethodBodyFlags: u16 {
        /// Static method
        const STATIC = 0x0010;
        /// Needs fat exception handler sections
        const FAT_EH = 0x0020;
        /// Locals are zero initialized
        const INIT_LOCALS = 0x0040;
        /// The runtime caches the decrypted method
        const CACHE = 0x0080;
    }
}

/// An entry of the type reference table.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRefEntry {
    /// A named type.
    TypeRef {
        /// Namespace, empty for nested and global types
        namespace: String,
        /// Simple name
        name: String,
        /// Defining assembly, as written in the assembly name table
        assembly: String,
        /// Enclosing type of a nested type
        declaring_type: Option<usize>,
    },
    /// A generic instantiation.
    GenericInstance {
        /// The generic type definition
        element: Option<usize>,
        /// Type arguments, resolved after the whole table was read
        arguments: Vec<Option<usize>>,
    },
    /// An unmanaged pointer.
    Pointer {
        /// Pointee
        element: Option<usize>,
    },
    /// An array type.
    Array {
        /// Element type
        element: Option<usize>,
        /// Number of dimensions
        rank: u32,
    },
    /// A managed reference.
    ByRef {
        /// Referenced type
        element: Option<usize>,
    },
}

/// A field reference.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    /// Field name
    pub name: String,
    /// Declaring type
    pub declaring_type: Option<usize>,
}

/// A method reference.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodRef {
    /// Method name
    pub name: String,
    /// Declaring type
    pub declaring_type: Option<usize>,
    /// Return type
    pub return_type: Option<usize>,
    /// Parameter types, without `this`
    pub parameters: Vec<Option<usize>>,
    /// Reference flags
    pub flags: MethodRefFlags,
    /// Method generic arguments, empty unless [`MethodRefFlags::GENERIC`] is set
    pub generic_arguments: Vec<Option<usize>>,
}

impl MethodRef {
    /// `true` for instance methods.
    #[must_use]
    pub fn has_this(&self) -> bool {
        self.flags.contains(MethodRefFlags::HAS_THIS)
    }

    /// `true` for generic method instantiations.
    #[must_use]
    pub fn is_generic(&self) -> bool {
        self.flags.contains(MethodRefFlags::GENERIC)
    }
}

/// Unmanaged calling convention of a `calli` signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    /// Platform default
    Default,
    /// cdecl
    C,
    /// stdcall
    StdCall,
    /// thiscall
    ThisCall,
    /// fastcall
    FastCall,
}

impl TryFrom<i32> for CallingConvention {
    type Error = crate::Error;

    fn try_from(value: i32) -> crate::Result<Self> {
        match value {
            1 => Ok(CallingConvention::Default),
            2 => Ok(CallingConvention::C),
            3 => Ok(CallingConvention::StdCall),
            4 => Ok(CallingConvention::ThisCall),
            5 => Ok(CallingConvention::FastCall),
            _ => Err(malformed_error!("Unknown CallingConvention {}", value)),
        }
    }
}

/// A `calli` signature.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    /// Return type
    pub return_type: Option<usize>,
    /// Parameter types
    pub parameters: Vec<Option<usize>>,
    /// Calling convention
    pub calling_convention: CallingConvention,
}

/// Operand of `ldtoken`.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberRef {
    /// A type
    Type(Option<usize>),
    /// A field
    Field(FieldRef),
    /// A method
    Method(MethodRef),
}

/// An argument as the container sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    /// The `this` argument of an instance method
    This,
    /// The declared parameter with this zero-based index
    Param(usize),
}

/// Instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// `ldc.i4.s` constant
    Int8(i8),
    /// Unsigned byte operand, `unaligned.`
    UInt8(u8),
    /// 32-bit integer
    Int32(i32),
    /// 64-bit integer
    Int64(i64),
    /// 32-bit float
    Float32(f32),
    /// 64-bit float
    Float64(f64),
    /// Index of the branch target in the instruction list
    Branch(usize),
    /// Indices of the switch targets in the instruction list
    Switch(Vec<usize>),
    /// Local variable index
    Local(u16),
    /// Argument of the container method
    Parameter(Parameter),
    /// Argument slot of the method the body was restored into
    Argument(u16),
    /// String literal
    String(String),
    /// Type reference
    Type(Option<usize>),
    /// Field reference
    Field(FieldRef),
    /// Method reference
    Method(MethodRef),
    /// `calli` signature
    Signature(CallSite),
    /// `ldtoken` member
    Token(MemberRef),
}

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Offset in a standard CIL encoding of the body
    pub offset: u32,
    /// Opcode, `0xFE` prefixed opcodes keep the prefix in the high byte
    pub opcode: u16,
    /// Mnemonic
    pub mnemonic: &'static str,
    /// Operand
    pub operand: Operand,
}

/// Kind of an exception handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionHandlerKind {
    /// `catch`
    Catch,
    /// `filter`
    Filter,
    /// `finally`
    Finally,
    /// `fault`
    Fault,
}

impl TryFrom<u8> for ExceptionHandlerKind {
    type Error = crate::Error;

    fn try_from(value: u8) -> crate::Result<Self> {
        match value {
            0 => Ok(ExceptionHandlerKind::Catch),
            1 => Ok(ExceptionHandlerKind::Filter),
            2 => Ok(ExceptionHandlerKind::Finally),
            4 => Ok(ExceptionHandlerKind::Fault),
            _ => Err(malformed_error!("Unknown exception handler type {}", value)),
        }
    }
}

/// An exception handler, boundaries are instruction indices.
///
/// An end of `None` is the end of the method body.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    /// Handler kind
    pub kind: ExceptionHandlerKind,
    /// First instruction of the protected block
    pub try_start: usize,
    /// First instruction after the protected block
    pub try_end: Option<usize>,
    /// First instruction of the handler
    pub handler_start: usize,
    /// First instruction after the handler
    pub handler_end: Option<usize>,
    /// First instruction of the filter, only for [`ExceptionHandlerKind::Filter`]
    pub filter_start: Option<usize>,
    /// Caught type, only meaningful for [`ExceptionHandlerKind::Catch`]
    pub catch_type: Option<usize>,
}

/// A method read from the container.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDefinition {
    /// Signature part
    pub reference: MethodRef,
    /// Body flags
    pub flags: MethodBodyFlags,
    /// Maximum evaluation stack depth
    pub max_stack: u16,
    /// Local variable types
    pub locals: Vec<Option<usize>>,
    /// Instructions in code order
    pub instructions: Vec<Instruction>,
    /// Exception handlers
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodDefinition {
    /// `true` if locals are zero initialized.
    #[must_use]
    pub fn init_locals(&self) -> bool {
        self.flags.contains(MethodBodyFlags::INIT_LOCALS)
    }

    /// `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodBodyFlags::STATIC)
    }

    /// Size of the body in a standard CIL encoding.
    #[must_use]
    pub fn code_size(&self) -> u32 {
        self.instructions.last().map_or(0, |last| {
            last.offset + super::body::encoded_size(last.opcode, &last.operand)
        })
    }
}

/// Shape of the method a container body is restored into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetMethod {
    /// The target is an instance method
    pub has_this: bool,
    /// Number of declared parameters
    pub parameter_count: usize,
}

/// A container body mapped onto a target method.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredBody {
    /// Maximum evaluation stack depth
    pub max_stack: u16,
    /// Locals are zero initialized
    pub init_locals: bool,
    /// Local variable types
    pub locals: Vec<Option<usize>>,
    /// Instructions, argument operands use [`Operand::Argument`]
    pub instructions: Vec<Instruction>,
    /// Exception handlers
    pub exception_handlers: Vec<ExceptionHandler>,
}
