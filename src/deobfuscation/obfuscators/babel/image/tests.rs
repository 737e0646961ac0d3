use super::*;
use crate::{deobfuscation::config::InstructionLength, Error};

const STRINGS: &[&str] = &[
    "Method1",
    "System.Int32",
    "mscorlib",
    "System.Collections.Generic.List`1",
    "Program",
    "Console",
    "WriteLine",
    "hello",
    "System.Void",
    "System.Exception",
    "Method2",
];

#[rustfmt::skip]
const TYPES: &[u8] = &[
    0, 1, 0, 0,     // 1 System.Int32
    0, 3, 0, 0,     // 2 List`1
    1, 2, 1, 4,     // 3 List`1<#4>
    0, 8, 0, 0,     // 4 System.Void
    0, 4, 0, 0,     // 5 Program
    0, 9, 0, 0,     // 6 System.Exception
    3, 1, 1,        // 7 System.Int32[]
];
const TYPE_COUNT: i32 = 7;

/// Instance method `void Program::Method1(int)`.
#[rustfmt::skip]
fn method1(code_length: u8) -> Vec<u8> {
    vec![
        0, 5, 4, 1, 1, 0x01,
        0x40, 0x00, 8, 0, 1, 3, code_length,
        0x0E, 1,                        // 0  ldarg.s 1
        0x0E, 0,                        // 2  ldarg.s 0
        0x26,                           // 4  pop
        0x72, 7,                        // 5  ldstr
        0x28, 6, 5, 4, 1, 1, 0,         // 10 call
        0x1F, 0xFD,                     // 15 ldc.i4.s -3
        0x2D, 3,                        // 17 brtrue.s 22
        0x11, 0,                        // 19 ldloc.s 0
        0x26,                           // 21 pop
        0x2A,                           // 22 ret
        1,
        0, 0, 15, 15, 8, 6, 0,
    ]
}

/// Static method `void Program::Method2(int, int[])`.
#[rustfmt::skip]
fn method2() -> Vec<u8> {
    vec![
        10, 5, 4, 2, 1, 7, 0x00,
        0x10, 0x00, 2, 0, 0, 29,
        0xFE, 0x09, 1, 0,               // 0  ldarg 1
        0x45, 2, 0, 0, 0,               // 4  switch
        0, 0, 0, 0,
        1, 0, 0, 0,
        0x00,                           // 17 nop
        0xD0, 0, 3,                     // 18 ldtoken
        0x29, 4, 1, 1, 3, 0, 0, 0,      // 23 calli
        0x2A,                           // 28 ret
        0,
    ]
}

fn varint(value: usize) -> Vec<u8> {
    if value < 0x80 {
        vec![value as u8]
    } else {
        vec![0x80 | (value >> 8) as u8, value as u8]
    }
}

struct Container {
    methods: Vec<(usize, Vec<u8>)>,
    types: Vec<u8>,
    type_count: i32,
    version: ContainerVersion,
}

impl Container {
    fn new() -> Container {
        Container {
            methods: vec![(0, method1(23)), (10, method2())],
            types: TYPES.to_vec(),
            type_count: TYPE_COUNT,
            version: ContainerVersion::V10,
        }
    }

    fn build(&self) -> Vec<u8> {
        let mut data = METHODS_SIG.to_le_bytes().to_vec();

        let mut names = Vec::new();
        for (name, record) in &self.methods {
            names.push((*name, data.len()));
            data.extend_from_slice(record);
        }

        let strings = data.len();
        data.extend_from_slice(&STRINGS_SIG.to_le_bytes());
        data.extend(varint(STRINGS.len()));
        for s in STRINGS {
            data.push(s.len() as u8);
            data.extend_from_slice(s.as_bytes());
        }

        let assemblies = data.len();
        data.extend_from_slice(&ASSEMBLY_NAMES_SIG.to_le_bytes());
        data.extend_from_slice(&[1, 2]);

        let methods = data.len();
        data.extend_from_slice(&METHOD_NAMES_SIG.to_le_bytes());
        data.extend(varint(names.len()));
        for (name, offset) in names {
            data.extend(varint(name));
            data.extend(varint(offset));
        }

        let types = data.len();
        data.extend_from_slice(&TYPEREFS_SIG.to_le_bytes());
        data.extend_from_slice(&self.type_count.to_le_bytes());
        data.extend_from_slice(&self.types);

        data.extend_from_slice(&METADATA_SIG.to_le_bytes());
        let offsets = [methods, types, assemblies, strings];
        match self.version {
            ContainerVersion::V10 => {
                data.extend_from_slice(&1i16.to_le_bytes());
                data.extend_from_slice(&0i16.to_le_bytes());
                for offset in offsets {
                    data.extend_from_slice(&(offset as i64).to_le_bytes());
                }
            }
            ContainerVersion::V55 => {
                for (offset, key) in offsets.into_iter().zip(V55_KEYS) {
                    data.extend_from_slice(&i64::from(offset as i32 ^ key).to_le_bytes());
                }
            }
        }
        data
    }

    fn reader(&self, config: &BabelConfig) -> ImageReader {
        let mut reader = ImageReader::new(self.build(), config);
        assert!(reader.initialize().unwrap());
        reader
    }
}

fn message(error: Error) -> String {
    match error {
        Error::Malformed { message, .. } => message,
        Error::InvalidArgument(message) => message,
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn tables() {
    for version in [ContainerVersion::V10, ContainerVersion::V55] {
        let container = Container {
            version,
            ..Container::new()
        };
        let reader = container.reader(&BabelConfig::default());

        assert_eq!(reader.version(), Some(version));
        assert_eq!(reader.type_refs().len(), 8);
        let mut names = reader.method_names().collect::<Vec<_>>();
        names.sort_unstable();
        assert_eq!(names, ["Method1", "Method2"]);

        assert_eq!(
            reader.type_ref(1),
            Some(&TypeRefEntry::TypeRef {
                namespace: "System".to_string(),
                name: "Int32".to_string(),
                assembly: "mscorlib".to_string(),
                declaring_type: None,
            })
        );
        assert_eq!(
            reader.type_name(Some(3)),
            "System.Collections.Generic.List`1<System.Void>"
        );
        assert_eq!(reader.type_name(Some(7)), "System.Int32[]");
        assert_eq!(reader.type_name(None), "null");
    }
}

#[test]
fn instance_method() {
    let mut reader = Container::new().reader(&BabelConfig::default());
    let method = reader.read_method("Method1").unwrap();

    assert!(method.reference.has_this());
    assert_eq!(method.reference.declaring_type, Some(5));
    assert_eq!(method.reference.parameters, vec![Some(1)]);
    assert!(method.init_locals());
    assert!(!method.is_static());
    assert_eq!(method.max_stack, 8);
    assert_eq!(method.locals, vec![Some(3)]);
    assert_eq!(method.code_size(), 23);

    let operands = method
        .instructions
        .iter()
        .map(|i| i.operand.clone())
        .collect::<Vec<_>>();
    assert_eq!(operands[0], Operand::Parameter(Parameter::Param(0)));
    assert_eq!(operands[1], Operand::Parameter(Parameter::This));
    assert_eq!(operands[3], Operand::String("hello".to_string()));
    assert_eq!(operands[5], Operand::Int8(-3));
    assert_eq!(operands[6], Operand::Branch(9));
    assert_eq!(operands[7], Operand::Local(0));

    let Operand::Method(call) = &operands[4] else {
        panic!("call without method operand");
    };
    assert_eq!(call.name, "WriteLine");
    assert!(!call.has_this());

    let offsets = method.instructions.iter().map(|i| i.offset).collect::<Vec<_>>();
    assert_eq!(offsets, [0, 2, 4, 5, 10, 15, 17, 19, 21, 22]);
    assert_eq!(method.instructions[9].mnemonic, "ret");

    assert_eq!(
        method.exception_handlers,
        vec![ExceptionHandler {
            kind: ExceptionHandlerKind::Catch,
            try_start: 0,
            try_end: Some(5),
            handler_start: 5,
            handler_end: None,
            filter_start: None,
            catch_type: Some(6),
        }]
    );

    let error = reader.read_method("Method1").unwrap_err();
    assert_eq!(message(error), "Method 'Method1' not found");
}

#[test]
fn static_method() {
    let mut reader = Container::new().reader(&BabelConfig::default());
    let method = reader.read_method("Method2").unwrap();

    assert!(method.is_static());
    assert_eq!(method.instructions[0].opcode, 0xFE09);
    assert_eq!(
        method.instructions[0].operand,
        Operand::Parameter(Parameter::Param(1))
    );
    assert_eq!(method.instructions[1].operand, Operand::Switch(vec![2, 3]));
    assert_eq!(
        method.instructions[3].operand,
        Operand::Token(MemberRef::Type(Some(3)))
    );
    assert_eq!(
        method.instructions[4].operand,
        Operand::Signature(CallSite {
            return_type: Some(4),
            parameters: vec![Some(1)],
            calling_convention: CallingConvention::StdCall,
        })
    );
    assert!(method.exception_handlers.is_empty());
}

#[test]
fn instruction_count() {
    let container = Container {
        methods: vec![(0, method1(10))],
        ..Container::new()
    };
    let config = BabelConfig::default().with_instruction_length(InstructionLength::Count);
    let method = container.reader(&config).read_method("Method1").unwrap();
    assert_eq!(method.instructions.len(), 10);
    assert_eq!(method.code_size(), 23);
}

#[test]
fn code_size_counts_logical_bytes() {
    // ldstr and call are shorter in the container than in CIL
    let record = method1(23);
    let raw = record.len() - 13 - 8;
    assert_eq!(raw, 22);

    let method = Container::new()
        .reader(&BabelConfig::default())
        .read_method("Method1")
        .unwrap();
    assert_eq!(method.instructions.len(), 10);
    assert_eq!(method.code_size(), 23);

    let container = Container {
        methods: vec![(0, method1(raw as u8))],
        ..Container::new()
    };
    let result = container
        .reader(&BabelConfig::default())
        .read_method("Method1");
    assert!(result.map_or(true, |m| m.instructions.len() != 10));
}

#[test]
fn code_size_mismatch() {
    let container = Container {
        methods: vec![(0, method1(20))],
        ..Container::new()
    };
    let error = container
        .reader(&BabelConfig::default())
        .read_method("Method1")
        .unwrap_err();
    assert_eq!(message(error), "Could not read all instructions");
}

#[test]
fn branch_into_instruction() {
    let mut record = method1(23);
    // brtrue.s 21 -> 23 is past the pop, 20 is inside ldloc.s
    let branch = record.iter().position(|&b| b == 0x2D).unwrap();
    record[branch + 1] = 1;
    let container = Container {
        methods: vec![(0, record)],
        ..Container::new()
    };
    let error = container
        .reader(&BabelConfig::default())
        .read_method("Method1")
        .unwrap_err();
    assert_eq!(message(error), "No instruction found at offset 0014");
}

#[test]
fn restore() {
    let mut reader = Container::new().reader(&BabelConfig::default());
    let target = TargetMethod {
        has_this: true,
        parameter_count: 1,
    };
    let body = reader.restore("Method1", &target).unwrap();
    assert!(body.init_locals);
    assert_eq!(body.max_stack, 8);
    assert_eq!(body.instructions[0].operand, Operand::Argument(1));
    assert_eq!(body.instructions[1].operand, Operand::Argument(0));
    assert_eq!(body.exception_handlers.len(), 1);

    let static_target = TargetMethod {
        has_this: false,
        parameter_count: 2,
    };
    let body = reader.restore("Method2", &static_target).unwrap();
    assert_eq!(body.instructions[0].operand, Operand::Argument(1));

    let mut reader = Container::new().reader(&BabelConfig::default());
    let error = reader.restore("Method1", &static_target).unwrap_err();
    assert_eq!(message(error), "Method 'Method1' has no this parameter");
}

#[test]
fn not_a_container() {
    let config = BabelConfig::default();
    assert!(!ImageReader::new(vec![1, 2, 3, 4, 5], &config).initialize().unwrap());
    assert!(!ImageReader::new(Vec::new(), &config).initialize().unwrap());

    let mut data = METHODS_SIG.to_le_bytes().to_vec();
    data.resize(200, 0);
    assert!(!ImageReader::new(data, &config).initialize().unwrap());
}

#[test]
fn corrupt_tables() {
    let config = BabelConfig::default();

    let mut data = Container::new().build();
    let strings = data
        .windows(4)
        .position(|w| w == STRINGS_SIG.to_le_bytes())
        .unwrap();
    data[strings] ^= 1;
    let error = ImageReader::new(data, &config).initialize().unwrap_err();
    assert_eq!(message(error), "Invalid strings sig");

    let container = Container {
        types: vec![9],
        type_count: 1,
        ..Container::new()
    };
    let error = ImageReader::new(container.build(), &config)
        .initialize()
        .unwrap_err();
    assert_eq!(message(error), "Unknown type id 9");

    // declaring type points at itself
    let container = Container {
        types: vec![0, 1, 0, 1],
        type_count: 1,
        ..Container::new()
    };
    let error = ImageReader::new(container.build(), &config)
        .initialize()
        .unwrap_err();
    assert_eq!(message(error), "Invalid type reference index 1");
}

#[test]
fn unknown_calling_convention() {
    let mut record = method2();
    let calli = record.iter().position(|&b| b == 0x29).unwrap();
    record[calli + 4] = 9;
    let container = Container {
        methods: vec![(10, record)],
        ..Container::new()
    };
    let error = container
        .reader(&BabelConfig::default())
        .read_method("Method2")
        .unwrap_err();
    assert_eq!(message(error), "Unknown CallingConvention 9");
}

#[test]
fn reflection_names() {
    assert_eq!(
        parse_type_name("System.Collections.Generic.List`1"),
        ("System.Collections.Generic".to_string(), "List`1".to_string())
    );
    assert_eq!(
        parse_type_name("NS.Outer+Inner"),
        (String::new(), "Inner".to_string())
    );
    assert_eq!(
        parse_type_name("NS.Weird\\.Name"),
        ("NS".to_string(), "Weird.Name".to_string())
    );
    assert_eq!(parse_type_name("Global"), (String::new(), "Global".to_string()));
    assert_eq!(parse_type_name(".Dot"), (String::new(), "Dot".to_string()));
}
