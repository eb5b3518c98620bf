use wisniac::driver;
use wisniac::elf::VIRT_TEXT;
use wisniac::WisniaError;

#[test]
fn compiles_empty_main_to_sections() {
    let (text, data) = driver::compile_to_sections("fn main() { }").unwrap();
    assert!(!text.is_empty(), "empty main still emits the exit() call sequence");
    assert!(data.is_empty(), "no string literals means no data section bytes");
}

#[test]
fn compiles_arithmetic_and_control_flow() {
    let src = r#"
        fn main() {
            int x = 0;
            while (x < 10) {
                x = x + 1;
            }
            print(x);
        }
    "#;
    let (text, _data) = driver::compile_to_sections(src).unwrap();
    assert!(!text.is_empty());
}

#[test]
fn compiles_if_elif_else() {
    let src = r#"
        fn main() {
            int x = 5;
            if (x < 0) {
                print("negative");
            } elif (x == 0) {
                print("zero");
            } else {
                print("positive");
            }
        }
    "#;
    driver::compile_to_sections(src).unwrap();
}

#[test]
fn compiles_string_literal_into_data_section() {
    let src = r#"fn main() { print("hello, world"); }"#;
    let (_text, data) = driver::compile_to_sections(src).unwrap();
    assert!(data.windows(b"hello, world".len()).any(|w| w == b"hello, world"));
    // every string literal is stored NUL-terminated
    let pos = data.windows(b"hello, world".len()).position(|w| w == b"hello, world").unwrap();
    assert_eq!(data[pos + b"hello, world".len()], 0);
}

#[test]
fn compiles_user_function_call_with_arguments() {
    let src = r#"
        fn add(a: int, b: int) -> int {
            return a + b;
        }
        fn main() {
            int sum = add(2, 3);
            print(sum);
        }
    "#;
    driver::compile_to_sections(src).unwrap();
}

#[test]
fn compiles_nested_loops_and_break_continue() {
    let src = r#"
        fn main() {
            int i = 0;
            while (i < 5) {
                if (i == 2) {
                    i = i + 1;
                    continue;
                }
                if (i == 4) {
                    break;
                }
                print(i);
                i = i + 1;
            }
        }
    "#;
    driver::compile_to_sections(src).unwrap();
}

#[test]
fn compiles_for_loop() {
    let src = r#"
        fn main() {
            for (int i = 0; i < 3; i = i + 1) {
                print(i);
            }
        }
    "#;
    driver::compile_to_sections(src).unwrap();
}

#[test]
fn compiles_division_after_other_locals_are_live() {
    // x and y are live before z is computed, so the allocator won't hand
    // rax to the division's temp by luck alone; lowering has to force it.
    let src = r#"
        fn main() {
            int x = 10;
            int y = 3;
            int z = x / y;
            print(z);
        }
    "#;
    driver::compile_to_sections(src).unwrap();
}

#[test]
fn compiles_read_statement() {
    let src = r#"
        fn main() {
            int x;
            read(x);
            print(x);
        }
    "#;
    driver::compile_to_sections(src).unwrap();
}

#[test]
fn compiles_boolean_printing() {
    let src = r#"
        fn main() {
            bool done = true;
            print(done);
            print(false);
        }
    "#;
    driver::compile_to_sections(src).unwrap();
}

#[test]
fn undefined_variable_is_a_semantic_error() {
    let err = driver::parse("fn main() { print(missing); }").unwrap_err();
    let wisnia_err = err.downcast_ref::<WisniaError>().expect("expected a WisniaError");
    assert!(matches!(wisnia_err, WisniaError::Semantic { .. }));
}

#[test]
fn break_outside_loop_is_rejected_during_lowering() {
    let program = wisniac::driver::parse("fn main() { break; }");
    // name resolution has no loop-nesting concept, so this either surfaces
    // here as a semantic error or during lowering; either is acceptable as
    // long as it is rejected rather than silently accepted.
    if let Ok(program) = program {
        let err = driver::lower(&program).unwrap_err();
        let wisnia_err = err.downcast_ref::<WisniaError>().expect("expected a WisniaError");
        assert!(matches!(wisnia_err, WisniaError::Semantic { .. }));
    }
}

#[test]
fn float_arithmetic_is_rejected_as_not_implemented() {
    let program = driver::parse("fn main() { float x = 1.5; }").unwrap();
    let err = driver::lower(&program).unwrap_err();
    let wisnia_err = err.downcast_ref::<WisniaError>().expect("expected a WisniaError");
    assert!(matches!(wisnia_err, WisniaError::NotImplemented { .. }));
}

#[test]
fn calling_undefined_function_is_a_semantic_error() {
    let program = driver::parse("fn main() { ghost(); }");
    let err = match program {
        Ok(program) => driver::lower(&program).unwrap_err(),
        Err(err) => err,
    };
    let wisnia_err = err.downcast_ref::<WisniaError>().expect("expected a WisniaError");
    assert!(matches!(wisnia_err, WisniaError::Semantic { .. }));
}

#[test]
fn lexer_rejects_unterminated_string() {
    let err = driver::tokenize("fn main() { print(\"unterminated); }").unwrap_err();
    let wisnia_err = err.downcast_ref::<WisniaError>().expect("expected a WisniaError");
    assert!(matches!(wisnia_err, WisniaError::Lexer { .. }));
}

#[test]
fn parser_rejects_malformed_top_level_syntax() {
    let err = driver::parse("not a valid program").unwrap_err();
    let wisnia_err = err.downcast_ref::<WisniaError>().expect("expected a WisniaError");
    assert!(matches!(wisnia_err, WisniaError::Parser { .. }));
}

#[test]
fn writes_a_valid_elf64_executable_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("program");
    driver::compile_to_elf("fn main() { print(1); }", &out_path).unwrap();

    let image = std::fs::read(&out_path).unwrap();
    assert_eq!(&image[0..4], &[0x7f, b'E', b'L', b'F']);

    let entry = u64::from_le_bytes(image[24..32].try_into().unwrap());
    assert!(entry > VIRT_TEXT, "entry point should sit inside the text segment");

    let perms = std::fs::metadata(&out_path).unwrap().permissions();
    use std::os::unix::fs::PermissionsExt;
    assert_eq!(perms.mode() & 0o777, 0o777);
}

#[test]
fn register_allocation_survives_many_live_locals() {
    // more locals than allocatable registers (15), forcing at least one
    // variable to be marked Spilled by the linear-scan allocator; codegen
    // over a spilled operand is expected to fail cleanly rather than panic.
    let mut src = String::from("fn main() {\n");
    for i in 0..20 {
        src.push_str(&format!("int v{i} = {i};\n"));
    }
    src.push_str("int total = 0;\n");
    for i in 0..20 {
        src.push_str(&format!("total = total + v{i};\n"));
    }
    src.push_str("print(total);\n}\n");

    // this is allowed to succeed (if live ranges don't all overlap) or fail
    // with a CodeGeneration error on a spilled operand; it must not panic.
    let result = driver::compile_to_sections(&src);
    if let Err(err) = result {
        let wisnia_err = err.downcast_ref::<WisniaError>().expect("expected a WisniaError");
        assert!(matches!(wisnia_err, WisniaError::CodeGeneration { .. }));
    }
}
