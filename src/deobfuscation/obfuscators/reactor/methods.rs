//! The decrypted methods data of .NET Reactor v4.
//!
//! After AES decryption (and an optional 64-bit XOR pass) the blob starts with a dword patch
//! table, followed by either encrypted method bodies written back over their RVAs or, when the
//! jitter is hooked, per-method code handed to the JIT at runtime.
//!
//! Three layouts exist:
//!
//! | Versions         | Layout                                                        |
//! |------------------|---------------------------------------------------------------|
//! | 3.7.0.3 to 3.9.0.1 | token + RVA table, then dword patches grouped by token      |
//! | 3.9.8.0 to 4.4   | dword patches, then `(rva, token, size, code)` records        |
//! | 4.0 to 4.4, hooked jitter | dword patches, then `(code rva, index, size, code)` records |

use crate::{
    assembly::opcodes::{CONV_U4, LDC_I4, LDC_I4_0, RET, THROW},
    file::{io::read_le, parser::Parser, Image, MappedImage},
    Result,
};

/// Method indices at or above this value carry native x86 code.
const NATIVE_INDEX: u32 = 0x7000_0000;

/// `push ebp; mov ebp, esp; mov eax, imm32; pop ebp; ret`
const NATIVE_LDC_I4: [Option<u8>; 10] = [
    Some(0x55),
    Some(0x8B),
    Some(0xEC),
    Some(0xB8),
    None,
    None,
    None,
    None,
    Some(0x5D),
    Some(0xC3),
];
/// `push ebp; mov ebp, esp; xor eax, eax; pop ebp; ret`
const NATIVE_LDC_I4_0: [u8; 7] = [0x55, 0x8B, 0xEC, 0x33, 0xC0, 0x5D, 0xC3];

/// A 32-bit value written at an RVA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwordPatch {
    /// Target RVA
    pub rva: u32,
    /// Value to write
    pub value: u32,
}

/// An encrypted method body restored in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPatch {
    /// RVA of the method body
    pub rva: u32,
    /// Method token, or an unused value in some versions
    pub token: u32,
    /// The body bytes, header included
    pub code: Vec<u8>,
}

/// Code of a method that the hooked jitter compiles from the methods data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JittedMethod {
    /// RVA of the first code byte of the method's stub body
    pub code_rva: u32,
    /// Method index, or a native marker at or above `0x70000000`
    pub index: u32,
    /// The raw code
    pub code: Vec<u8>,
    /// `true` if `code` is x86 machine code
    pub is_native: bool,
}

impl JittedMethod {
    /// The method's IL code, with native code replaced by [`convert_native_stub`].
    #[must_use]
    pub fn cil_code(&self) -> Vec<u8> {
        if self.is_native {
            convert_native_stub(&self.code)
        } else {
            self.code.clone()
        }
    }
}

/// How the method bodies are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodsLayout {
    /// Bodies are written over the stubs in the image
    Bodies(Vec<BodyPatch>),
    /// Bodies are handed to the JIT by the hooked compile method
    Jitted(Vec<JittedMethod>),
}

/// The parsed methods data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodsData {
    /// Mode field of the blob
    pub mode: i32,
    /// Dwords written into the image
    pub dword_patches: Vec<DwordPatch>,
    /// Method bodies
    pub layout: MethodsLayout,
}

impl MethodsData {
    /// Parse decrypted methods data.
    ///
    /// `xor_key` is the constant loaded after `ldind.i8` in the decrypter method, zero when there
    /// is none. `hooks_jitter` tells whether the decrypter type has a compile method hook.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncated data and [`crate::Error::Malformed`]
    /// for negative counts or sizes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dotunpack::deobfuscation::obfuscators::reactor::{MethodsData, MethodsLayout};
    ///
    /// let mut data = Vec::new();
    /// for value in [1u32, 1, 0x2050, 0xCAFE, 0x2060, 0x0600_0001, 2] {
    ///     data.extend_from_slice(&value.to_le_bytes());
    /// }
    /// data.extend_from_slice(&[0x16, 0x2A]);
    ///
    /// let parsed = MethodsData::parse(data, 0, false)?;
    /// assert_eq!(parsed.dword_patches[0].value, 0xCAFE);
    /// let MethodsLayout::Bodies(bodies) = &parsed.layout else { unreachable!() };
    /// assert_eq!(bodies[0].code, [0x16, 0x2A]);
    /// # Ok::<(), dotunpack::Error>(())
    /// ```
    pub fn parse(mut decrypted: Vec<u8>, xor_key: i64, hooks_jitter: bool) -> Result<MethodsData> {
        if xor_key != 0 {
            for word in decrypted.chunks_exact_mut(8) {
                let value = read_le::<i64>(word)? ^ xor_key;
                word.copy_from_slice(&value.to_le_bytes());
            }
        }

        let mut parser = Parser::new(&decrypted);
        let mut patch_count = read_count(&mut parser)?;
        let mut mode = parser.read_le::<i32>()?;
        let end = decrypted.len().saturating_sub(1);

        if parser.peek_le::<u32>()? & 0xFF00_0000 == 0x0600_0000 {
            parser.advance_by(patch_count.saturating_mul(8))?;
            patch_count = read_count(&mut parser)?;
            mode = parser.read_le::<i32>()?;

            let mut dword_patches = read_dword_patches(&mut parser, patch_count)?;
            while parser.pos() < end {
                let _token = parser.read_le::<u32>()?;
                let dwords = read_count(&mut parser)?;
                dword_patches.extend(read_dword_patches(&mut parser, dwords / 2)?);
            }
            return Ok(MethodsData {
                mode,
                dword_patches,
                layout: MethodsLayout::Bodies(Vec::new()),
            });
        }

        let dword_patches = read_dword_patches(&mut parser, patch_count)?;
        let layout = if !hooks_jitter || mode == 1 {
            let mut bodies = Vec::new();
            while parser.pos() < end {
                let rva = parser.read_le::<u32>()?;
                let token = parser.read_le::<u32>()?;
                let size = parser.read_le::<i32>()?;
                if let Ok(size @ 1..) = usize::try_from(size) {
                    bodies.push(BodyPatch {
                        rva,
                        token,
                        code: parser.read_bytes(size)?.to_vec(),
                    });
                }
            }
            MethodsLayout::Bodies(bodies)
        } else {
            let _count = parser.read_le::<i32>()?;
            let mut methods = Vec::new();
            while parser.pos() < end {
                let code_rva = parser.read_le::<u32>()?;
                let index = parser.read_le::<u32>()?;
                let size = read_count(&mut parser)?;
                methods.push(JittedMethod {
                    code_rva,
                    index,
                    code: parser.read_bytes(size)?.to_vec(),
                    is_native: index >= NATIVE_INDEX,
                });
            }
            MethodsLayout::Jitted(methods)
        };

        Ok(MethodsData {
            mode,
            dword_patches,
            layout,
        })
    }

    /// Write the dword patches and restored bodies into `image`.
    ///
    /// Jitted methods are left to the caller, they need a rebuilt method table.
    ///
    /// # Errors
    /// Fails if a patch targets an unmapped RVA or runs past the end of the file.
    pub fn apply(&self, image: &mut MappedImage) -> Result<()> {
        for patch in &self.dword_patches {
            write_at_rva(image, patch.rva, &patch.value.to_le_bytes())?;
        }
        if let MethodsLayout::Bodies(bodies) = &self.layout {
            for body in bodies {
                write_at_rva(image, body.rva, &body.code)?;
            }
        }
        Ok(())
    }
}

fn read_count(parser: &mut Parser) -> Result<usize> {
    let count = parser.read_le::<i32>()?;
    usize::try_from(count).map_err(|_| malformed_error!("Invalid methods data count {}", count))
}

fn read_dword_patches(parser: &mut Parser, count: usize) -> Result<Vec<DwordPatch>> {
    parser.ensure_remaining(count.saturating_mul(8))?;
    let mut patches = Vec::with_capacity(count);
    for _ in 0..count {
        patches.push(DwordPatch {
            rva: parser.read_le::<u32>()?,
            value: parser.read_le::<u32>()?,
        });
    }
    Ok(patches)
}

fn write_at_rva(image: &mut MappedImage, rva: u32, bytes: &[u8]) -> Result<()> {
    let offset = image.rva_to_offset(rva)?;
    let end = offset.checked_add(bytes.len()).ok_or(out_of_bounds_error!())?;
    image
        .data_mut()
        .get_mut(offset..end)
        .ok_or(out_of_bounds_error!())?
        .copy_from_slice(bytes);
    Ok(())
}

/// Replace the x86 code of a native method with equivalent IL.
///
/// Methods returning a constant become `ldc.i4 value; ret` (or `ldc.i4.0; ret`), anything else
/// becomes `ldc.i4 0xDEADC0DE; conv.u4; throw`.
///
/// # Examples
///
/// ```rust
/// use dotunpack::deobfuscation::obfuscators::reactor::convert_native_stub;
///
/// let native = [0x55, 0x8B, 0xEC, 0x33, 0xC0, 0x5D, 0xC3];
/// assert_eq!(convert_native_stub(&native), [0x16, 0x2A]);
/// ```
#[must_use]
pub fn convert_native_stub(code: &[u8]) -> Vec<u8> {
    let is_ldc_i4 = code.len() == NATIVE_LDC_I4.len()
        && NATIVE_LDC_I4
            .iter()
            .zip(code)
            .all(|(expected, &b)| expected.map_or(true, |expected| expected == b));
    if is_ldc_i4 {
        let mut il = vec![LDC_I4];
        il.extend_from_slice(&code[4..8]);
        il.push(RET);
        return il;
    }
    if code == NATIVE_LDC_I4_0 {
        return vec![LDC_I4_0, RET];
    }

    let mut il = vec![LDC_I4];
    il.extend_from_slice(&0xDEAD_C0DEu32.to_le_bytes());
    il.extend_from_slice(&[CONV_U4, THROW]);
    il
}
