//! The Babel.NET encrypted method container.
//!
//! When Babel.NET encrypts methods it moves their bodies into a resource and leaves a stub
//! behind that calls the runtime with the method's name. The resource decrypts (see
//! [`crate::deobfuscation::obfuscators::babel::BabelResourceDecrypter`]) to a container with
//! its own tiny metadata system:
//!
//! ```text
//! +-----------+---------------------+--------------------------------------+
//! | METHODS   | method records ...  | strings | asm names | names | types  |
//! | signature |                     |   ... METADATA header (near the end) |
//! +-----------+---------------------+--------------------------------------+
//! ```
//!
//! The METADATA header holds the offsets of four tables. Method records reference strings and
//! types through indices into those tables, and carry their instructions with every token
//! replaced by an inline reference.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotunpack::deobfuscation::obfuscators::babel::{ImageReader, TargetMethod};
//! use dotunpack::deobfuscation::BabelConfig;
//!
//! let data = std::fs::read("methods.bin")?;
//! let mut reader = ImageReader::new(data, &BabelConfig::default());
//! if reader.initialize()? {
//!     let target = TargetMethod { has_this: true, parameter_count: 1 };
//!     let body = reader.restore("Method1", &target)?;
//!     println!("{} instructions", body.instructions.len());
//! }
//! # Ok::<(), dotunpack::Error>(())
//! ```

mod body;
pub mod types;

use std::collections::HashMap;

pub use types::{
    CallSite, CallingConvention, ExceptionHandler, ExceptionHandlerKind, FieldRef, Instruction,
    MemberRef, MethodBodyFlags, MethodDefinition, MethodRef, MethodRefFlags, Operand, Parameter,
    RestoredBody, TargetMethod, TypeRefEntry,
};

use crate::{
    deobfuscation::config::BabelConfig,
    file::{io::read_le, parser::Parser},
    Result,
};

/// First dword of every container.
pub const METHODS_SIG: i32 = 0x0000_BEBA;
/// Signature of the table directory.
pub const METADATA_SIG: i32 = 0x0100_BEBA;
/// Signature of the method name table.
pub const METHOD_NAMES_SIG: i32 = 0x0200_BEBA;
/// Signature of the assembly name table.
pub const ASSEMBLY_NAMES_SIG: i32 = 0x0201_BEBA;
/// Signature of the type reference table.
pub const TYPEREFS_SIG: i32 = 0x0202_BEBA;
/// Signature of the string table.
pub const STRINGS_SIG: i32 = 0x0203_BEBA;

/// The directory is looked for in at most this many dwords from the end.
const METADATA_SEARCH_LIMIT: usize = 30;

/// Version 5.5 masks the table offsets with these values.
const V55_KEYS: [i32; 4] = [
    METADATA_SIG,
    METADATA_SIG << 1,
    (METADATA_SIG << 1) + 1,
    ((METADATA_SIG << 1) + 1) << 1,
];

/// Layout generation of the table directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerVersion {
    /// Plain offsets behind a version field of 1
    V10,
    /// Masked offsets, no version field
    V55,
}

/// Reader for a decrypted method container.
#[derive(Debug, Clone)]
pub struct ImageReader {
    data: Vec<u8>,
    config: BabelConfig,
    version: Option<ContainerVersion>,
    strings: Vec<String>,
    assembly_names: Vec<String>,
    method_offsets: HashMap<String, usize>,
    type_refs: Vec<Option<TypeRefEntry>>,
}

impl ImageReader {
    /// Wrap the decrypted container `data`. Nothing is parsed until
    /// [`ImageReader::initialize`].
    #[must_use]
    pub fn new(data: Vec<u8>, config: &BabelConfig) -> ImageReader {
        ImageReader {
            data,
            config: config.clone(),
            version: None,
            strings: Vec::new(),
            assembly_names: Vec::new(),
            method_offsets: HashMap::new(),
            type_refs: vec![None],
        }
    }

    /// Parse the table directory and all tables.
    ///
    /// Returns `Ok(false)` if the data is not a method container.
    ///
    /// # Errors
    /// Returns an error if the directory was found but a table is corrupt.
    pub fn initialize(&mut self) -> Result<bool> {
        if read_le::<i32>(&self.data).ok() != Some(METHODS_SIG) {
            return Ok(false);
        }
        let Some(metadata_offset) = self.metadata_offset() else {
            return Ok(false);
        };

        let (version, offsets) = self.table_offsets(metadata_offset + 4)?;
        let [method_names, type_refs, assembly_names, strings] = offsets;
        log::debug!("Babel.NET method container {:?}", version);

        self.strings = self.read_string_table(strings)?;
        self.assembly_names = self.read_assembly_names(assembly_names)?;
        self.method_offsets = self.read_method_names(method_names)?;
        self.type_refs = self.read_type_ref_table(type_refs)?;
        self.version = Some(version);
        Ok(true)
    }

    /// Directory layout, `None` before a successful [`ImageReader::initialize`].
    #[must_use]
    pub fn version(&self) -> Option<ContainerVersion> {
        self.version
    }

    /// Names of the methods that have not been read yet.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.method_offsets.keys().map(String::as_str)
    }

    /// The type reference table, entry 0 is the null type.
    #[must_use]
    pub fn type_refs(&self) -> &[Option<TypeRefEntry>] {
        &self.type_refs
    }

    /// The type at `index`, `None` for the null type or an invalid index.
    #[must_use]
    pub fn type_ref(&self, index: usize) -> Option<&TypeRefEntry> {
        self.type_refs.get(index).and_then(Option::as_ref)
    }

    /// Display name of a type, e.g. ``System.Collections.Generic.List`1<System.Int32>``.
    #[must_use]
    pub fn type_name(&self, index: Option<usize>) -> String {
        self.format_type(index, 0)
    }

    fn format_type(&self, index: Option<usize>, depth: usize) -> String {
        if depth > 32 {
            return "...".to_string();
        }
        let Some(entry) = index.and_then(|index| self.type_ref(index)) else {
            return "null".to_string();
        };

        match entry {
            TypeRefEntry::TypeRef {
                namespace,
                name,
                declaring_type: Some(declaring_type),
                ..
            } if namespace.is_empty() => {
                format!("{}/{}", self.format_type(Some(*declaring_type), depth + 1), name)
            }
            TypeRefEntry::TypeRef {
                namespace, name, ..
            } => {
                if namespace.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", namespace, name)
                }
            }
            TypeRefEntry::GenericInstance { element, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(|argument| self.format_type(*argument, depth + 1))
                    .collect::<Vec<_>>();
                format!("{}<{}>", self.format_type(*element, depth + 1), arguments.join(","))
            }
            TypeRefEntry::Pointer { element } => {
                format!("{}*", self.format_type(*element, depth + 1))
            }
            TypeRefEntry::ByRef { element } => {
                format!("{}&", self.format_type(*element, depth + 1))
            }
            TypeRefEntry::Array { element, rank } => format!(
                "{}[{}]",
                self.format_type(*element, depth + 1),
                ",".repeat((*rank).max(1) as usize - 1)
            ),
        }
    }

    /// Read the method called `name`. Each method can be read once.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if there is no such method (or it was already
    /// read) and an error if its record is corrupt.
    pub fn read_method(&mut self, name: &str) -> Result<MethodDefinition> {
        let offset = self
            .method_offsets
            .remove(name)
            .ok_or_else(|| invalid_argument!("Method '{}' not found", name))?;

        let mut parser = Parser::new(&self.data);
        parser.seek(offset)?;
        let reference = self.read_method_ref(&mut parser)?;
        self.read_body(&mut parser, reference)
    }

    /// Read the method called `name` and map its arguments onto `target`.
    ///
    /// Container arguments are positional: `this` becomes slot 0 of an instance target and
    /// parameter `i` becomes slot `i`, shifted by one if the target has `this`.
    ///
    /// # Errors
    /// Everything [`ImageReader::read_method`] returns, and [`crate::Error::Malformed`] if the
    /// body uses an argument the target does not have.
    pub fn restore(&mut self, name: &str, target: &TargetMethod) -> Result<RestoredBody> {
        let method = self.read_method(name)?;
        let this_slot = usize::from(target.has_this);

        let mut instructions = method.instructions;
        for instruction in &mut instructions {
            let Operand::Parameter(parameter) = &instruction.operand else {
                continue;
            };
            let slot = match *parameter {
                Parameter::This if target.has_this => 0,
                Parameter::This => {
                    return Err(malformed_error!("Method '{}' has no this parameter", name))
                }
                Parameter::Param(index) if index < target.parameter_count => index + this_slot,
                Parameter::Param(index) => {
                    return Err(malformed_error!("Invalid parameter index {}", index))
                }
            };
            let slot =
                u16::try_from(slot).map_err(|_| malformed_error!("Invalid parameter index {}", slot))?;
            instruction.operand = Operand::Argument(slot);
        }

        Ok(RestoredBody {
            max_stack: method.max_stack,
            init_locals: method.flags.contains(MethodBodyFlags::INIT_LOCALS),
            locals: method.locals,
            instructions,
            exception_handlers: method.exception_handlers,
        })
    }

    /// Read a string index.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index is out of range.
    pub fn read_string(&self, parser: &mut Parser) -> Result<&str> {
        let index = parser.read_variable_length_uint()? as usize;
        self.strings
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| malformed_error!("Invalid string index {}", index))
    }

    /// Read a type index. `None` is the null type.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index is out of range.
    pub fn read_type_ref(&self, parser: &mut Parser) -> Result<Option<usize>> {
        read_type_index(parser, self.type_refs.len())
    }

    /// Read a counted list of type indices.
    ///
    /// # Errors
    /// See [`ImageReader::read_type_ref`].
    pub fn read_type_refs(&self, parser: &mut Parser) -> Result<Vec<Option<usize>>> {
        let count = parser.read_variable_length_uint()?;
        (0..count).map(|_| self.read_type_ref(parser)).collect()
    }

    /// Read a field reference: name and declaring type.
    ///
    /// # Errors
    /// Returns an error if an index is out of range or the data is truncated.
    pub fn read_field_ref(&self, parser: &mut Parser) -> Result<FieldRef> {
        Ok(FieldRef {
            name: self.read_string(parser)?.to_string(),
            declaring_type: self.read_type_ref(parser)?,
        })
    }

    /// Read a method reference.
    ///
    /// # Errors
    /// Returns an error if an index is out of range or the data is truncated.
    pub fn read_method_ref(&self, parser: &mut Parser) -> Result<MethodRef> {
        let name = self.read_string(parser)?.to_string();
        let declaring_type = self.read_type_ref(parser)?;
        let return_type = self.read_type_ref(parser)?;
        let parameters = self.read_type_refs(parser)?;
        let flags = MethodRefFlags::from_bits_retain(parser.read_le::<u8>()?);
        let generic_arguments = if flags.contains(MethodRefFlags::GENERIC) {
            self.read_type_refs(parser)?
        } else {
            Vec::new()
        };

        Ok(MethodRef {
            name,
            declaring_type,
            return_type,
            parameters,
            flags,
            generic_arguments,
        })
    }

    /// Read a `calli` signature.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown calling convention.
    pub fn read_call_site(&self, parser: &mut Parser) -> Result<CallSite> {
        let return_type = self.read_type_ref(parser)?;
        let parameters = self.read_type_refs(parser)?;
        let calling_convention = CallingConvention::try_from(parser.read_le::<i32>()?)?;

        Ok(CallSite {
            return_type,
            parameters,
            calling_convention,
        })
    }

    fn metadata_offset(&self) -> Option<usize> {
        let mut position = self.data.len().checked_sub(4)?;
        for _ in 0..METADATA_SEARCH_LIMIT {
            if read_le::<i32>(&self.data[position..]).ok()? == METADATA_SIG {
                return Some(position);
            }
            position = position.checked_sub(4)?;
        }
        None
    }

    /// Offsets of the method name, type reference, assembly name and string tables.
    fn table_offsets(&self, position: usize) -> Result<(ContainerVersion, [usize; 4])> {
        let mut parser = Parser::new(&self.data);
        parser.seek(position)?;

        let (version, keys) = if parser.read_le::<i16>()? == 0x0001 {
            parser.read_le::<i16>()?;
            (ContainerVersion::V10, [0; 4])
        } else {
            parser.seek(position)?;
            (ContainerVersion::V55, V55_KEYS)
        };

        let mut offsets = [0; 4];
        for (offset, key) in offsets.iter_mut().zip(keys) {
            // only the low dword is used
            let value = parser.read_le::<i64>()? as i32 ^ key;
            *offset = usize::try_from(value)
                .map_err(|_| malformed_error!("Invalid table offset {}", value))?;
        }
        Ok((version, offsets))
    }

    fn table_parser(&self, offset: usize, signature: i32, what: &str) -> Result<Parser<'_>> {
        let mut parser = Parser::new(&self.data);
        parser.seek(offset)?;
        if parser.read_le::<i32>()? != signature {
            return Err(malformed_error!("Invalid {} sig", what));
        }
        Ok(parser)
    }

    fn read_string_table(&self, offset: usize) -> Result<Vec<String>> {
        let mut parser = self.table_parser(offset, STRINGS_SIG, "strings")?;
        let count = parser.read_variable_length_uint()?;
        (0..count)
            .map(|_| parser.read_prefixed_string_utf8())
            .collect()
    }

    fn read_assembly_names(&self, offset: usize) -> Result<Vec<String>> {
        let mut parser = self.table_parser(offset, ASSEMBLY_NAMES_SIG, "assembly names")?;
        let count = parser.read_variable_length_uint()?;
        (0..count)
            .map(|_| self.read_string(&mut parser).map(str::to_string))
            .collect()
    }

    fn read_method_names(&self, offset: usize) -> Result<HashMap<String, usize>> {
        let mut parser = self.table_parser(offset, METHOD_NAMES_SIG, "methods")?;
        let count = parser.read_variable_length_uint()?;
        let mut methods = HashMap::new();
        for _ in 0..count {
            let name = self.read_string(&mut parser)?.to_string();
            let offset = parser.read_variable_length_uint()? as usize;
            methods.insert(name, offset);
        }
        Ok(methods)
    }

    fn read_type_ref_table(&self, offset: usize) -> Result<Vec<Option<TypeRefEntry>>> {
        let mut parser = self.table_parser(offset, TYPEREFS_SIG, "typerefs")?;
        let count = parser.read_le::<i32>()?;
        let count =
            usize::try_from(count).map_err(|_| malformed_error!("Invalid type count {}", count))?;

        let mut table: Vec<Option<TypeRefEntry>> = vec![None];
        let mut fixups = Vec::new();
        for _ in 0..count {
            let entry = match parser.read_le::<u8>()? {
                0 => {
                    let (namespace, name) = parse_type_name(self.read_string(&mut parser)?);
                    let index = parser.read_variable_length_uint()? as usize;
                    let assembly = self
                        .assembly_names
                        .get(index)
                        .cloned()
                        .ok_or_else(|| malformed_error!("Invalid assembly index {}", index))?;
                    TypeRefEntry::TypeRef {
                        namespace,
                        name,
                        assembly,
                        declaring_type: read_type_index(&mut parser, table.len())?,
                    }
                }
                1 => {
                    let element = read_type_index(&mut parser, table.len())?;
                    let count = parser.read_variable_length_uint()?;
                    let arguments = (0..count)
                        .map(|_| parser.read_variable_length_uint().map(|i| i as usize))
                        .collect::<Result<Vec<_>>>()?;
                    fixups.push((table.len(), arguments));
                    TypeRefEntry::GenericInstance {
                        element,
                        arguments: Vec::new(),
                    }
                }
                2 => TypeRefEntry::Pointer {
                    element: read_type_index(&mut parser, table.len())?,
                },
                3 => TypeRefEntry::Array {
                    element: read_type_index(&mut parser, table.len())?,
                    rank: parser.read_variable_length_uint()?,
                },
                4 => TypeRefEntry::ByRef {
                    element: read_type_index(&mut parser, table.len())?,
                },
                id => return Err(malformed_error!("Unknown type id {}", id)),
            };
            table.push(Some(entry));
        }

        // generic arguments may point forward
        let len = table.len();
        for (index, arguments) in fixups {
            let resolved = arguments
                .into_iter()
                .map(|argument| checked_type_index(argument, len))
                .collect::<Result<Vec<_>>>()?;
            if let Some(TypeRefEntry::GenericInstance { arguments, .. }) = &mut table[index] {
                *arguments = resolved;
            }
        }

        Ok(table)
    }
}

fn read_type_index(parser: &mut Parser, len: usize) -> Result<Option<usize>> {
    checked_type_index(parser.read_variable_length_uint()? as usize, len)
}

fn checked_type_index(index: usize, len: usize) -> Result<Option<usize>> {
    match index {
        0 => Ok(None),
        index if index < len => Ok(Some(index)),
        index => Err(malformed_error!("Invalid type reference index {}", index)),
    }
}

/// Index of the last `c` in `name` that is not escaped with a backslash.
fn last_unescaped(name: &str, c: u8) -> Option<usize> {
    let bytes = name.as_bytes();
    let mut end = bytes.len();
    while let Some(index) = bytes[..end].iter().rposition(|&b| b == c) {
        if index == 0 || bytes[index - 1] != b'\\' {
            return Some(index);
        }
        end = index;
    }
    None
}

fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('\\', Some(_)) => result.extend(chars.next()),
            _ => result.push(c),
        }
    }
    result
}

/// Split a reflection type name into namespace and name. Nested types lose their namespace.
fn parse_type_name(full_name: &str) -> (String, String) {
    let (mut namespace, name) = match last_unescaped(full_name, b'.') {
        Some(index) => (unescape(&full_name[..index]), &full_name[index + 1..]),
        None => (String::new(), full_name),
    };

    let name = match last_unescaped(name, b'+') {
        Some(index) => {
            namespace.clear();
            unescape(&name[index + 1..])
        }
        None => unescape(name),
    };
    (namespace, name)
}

#[cfg(test)]
mod tests;
