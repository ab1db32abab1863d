use dux::config::Config;
use dux::{compile, CompileError};

fn ir(source: &str) -> String {
    match compile(source, &Config::default()) {
        Ok(ir) => ir,
        Err(e) => panic!("compilation failed:\n{}", e),
    }
}

/// Instruction and label lines of one function, without indentation.
fn function_lines(ir: &str, name: &str) -> Vec<String> {
    let header = format!("@{}(", name);
    ir.lines()
        .skip_while(|l| !(l.starts_with("define") && l.contains(&header)))
        .skip(1)
        .take_while(|l| *l != "}")
        .map(|l| l.trim().to_string())
        .collect()
}

fn is_terminator(line: &str) -> bool {
    line.starts_with("ret") || line.starts_with("br ") || line == "unreachable"
}

/// Every block starts with a label (or the function entry) and contains
/// exactly one terminator, as its last instruction.
fn assert_well_formed_blocks(lines: &[String]) {
    let mut terminators = 0;
    for line in lines {
        if line.ends_with(':') {
            assert_eq!(terminators, 1, "block before {} is not terminated", line);
            terminators = 0;
            continue;
        }
        assert_eq!(terminators, 0, "instruction after terminator: {}", line);
        if is_terminator(line) {
            terminators += 1;
        }
    }
    assert_eq!(terminators, 1, "last block is not terminated");
}

fn registers(lines: &[String]) -> Vec<usize> {
    lines
        .iter()
        .filter_map(|l| l.strip_prefix("%id."))
        .filter_map(|rest| rest.split(' ').next())
        .filter_map(|n| n.parse().ok())
        .collect()
}

#[test]
fn return_of_literal_is_a_single_instruction() {
    let out = ir("fn main() -> i32 { return 42 }");
    assert!(out.starts_with("target triple = \"x86_64-pc-linux-gnu\"\n"));
    assert!(out.contains("define i32 @main() {\n  ret i32 42\n}\n"));
    assert!(out.ends_with("declare i32 @printf(ptr, ...)\n"));
}

#[test]
fn if_without_else_uses_two_labels() {
    let out = ir("fn f(n: i32) -> i32 {\n  if n > 0 {\n    n = 0\n  }\n  return n\n}\n");
    let lines = function_lines(&out, "f");
    let labels: Vec<&String> = lines.iter().filter(|l| l.ends_with(':')).collect();
    assert_eq!(labels.len(), 2);
    assert!(labels[0].starts_with("if_body."));
    assert!(labels[1].starts_with("if_end."));
    assert_well_formed_blocks(&lines);
}

#[test]
fn if_else_uses_three_labels() {
    let out = ir(
        "fn f(n: i32) -> i32 {\n  r := 0\n  if n > 0 {\n    r = 1\n  } else {\n    r = 2\n  }\n  return r\n}\n",
    );
    let lines = function_lines(&out, "f");
    let labels = lines.iter().filter(|l| l.ends_with(':')).count();
    assert_eq!(labels, 3);
    assert_well_formed_blocks(&lines);
}

#[test]
fn else_if_chains_nest() {
    let out = ir(
        "fn sign(n: i32) -> i32 {\n  if n > 0 {\n    return 1\n  } else if n < 0 {\n    return -1\n  } else {\n    return 0\n  }\n}\n",
    );
    let lines = function_lines(&out, "sign");
    assert!(lines.contains(&"ret i32 -1".to_string()));
    assert_eq!(lines.iter().filter(|l| l.starts_with("if_body.")).count(), 2);
    assert_well_formed_blocks(&lines);
}

#[test]
fn registers_are_injective_and_reset_per_function() {
    let out = ir(
        "fn a() -> i32 {\n  x := 1\n  y := x + 2\n  return x * y\n}\nfn b(p: i32, q: i32) -> i32 {\n  return p - q\n}\n",
    );
    let a = registers(&function_lines(&out, "a"));
    assert_eq!(a.first(), Some(&1));
    assert!(a.windows(2).all(|w| w[0] < w[1]));

    let b = registers(&function_lines(&out, "b"));
    assert_eq!(b.first(), Some(&3));
}

#[test]
fn repeated_format_string_is_emitted_once() {
    let out = ir("fn main() {\n  printf(\"%d\\n\", 1)\n  printf(\"%d\\n\", 2)\n}\n");
    let constants: Vec<&str> = out.lines().filter(|l| l.starts_with("@.str.")).collect();
    assert_eq!(constants, vec!["@.str.0 = constant [4 x i8] c\"%d\\0A\\00\""]);
    assert_eq!(out.matches("ptr @.str.0").count(), 2);
}

#[test]
fn distinct_strings_are_numbered_in_order() {
    let out = ir("fn main() {\n  printf(\"a\")\n  printf(\"b\")\n  printf(\"a\")\n}\n");
    let constants: Vec<&str> = out.lines().filter(|l| l.starts_with("@.str.")).collect();
    assert_eq!(
        constants,
        vec![
            "@.str.0 = constant [2 x i8] c\"a\\00\"",
            "@.str.1 = constant [2 x i8] c\"b\\00\"",
        ]
    );
}

#[test]
fn compound_assignment_loads_adds_and_stores() {
    let out = ir("fn main() -> i32 {\n  x := 3\n  x += 4\n  return x\n}\n");
    assert_eq!(
        function_lines(&out, "main"),
        vec![
            "%x = alloca i32",
            "store i32 3, ptr %x",
            "%id.1 = load i32, ptr %x",
            "%id.2 = add nsw i32 %id.1, 4",
            "store i32 %id.2, ptr %x",
            "%id.3 = load i32, ptr %x",
            "ret i32 %id.3",
        ]
    );
}

#[test]
fn every_compound_operator_lowers() {
    let out = ir(
        "fn main() -> i32 {\n  x := 30\n  x -= 1\n  x *= 2\n  x /= 3\n  x %= 7\n  return x\n}\n",
    );
    let lines = function_lines(&out, "main");
    for op in ["sub nsw i32", "mul nsw i32", "sdiv i32", "srem i32"] {
        assert!(lines.iter().any(|l| l.contains(op)), "missing {}", op);
    }
}

#[test]
fn comparison_uses_left_operand_width() {
    let out = ir("fn gt(a: i64, b: i32) -> bool {\n  return a > b\n}\n");
    let lines = function_lines(&out, "gt");
    assert!(lines.contains(&"%id.5 = sext i32 %id.4 to i64".to_string()));
    assert!(lines.contains(&"%id.6 = icmp sgt i64 %id.3, %id.5".to_string()));
    assert_eq!(lines.last().map(String::as_str), Some("ret i1 %id.6"));
}

#[test]
fn loops_are_well_formed() {
    let out = ir(
        "fn main() -> i32 {\n  total := 0\n  for i := 0, i < 10, i += 1 {\n    if i % 2 == 0 {\n      total += i\n    }\n  }\n  for total > 100 {\n    total -= 1\n  }\n  return total\n}\n",
    );
    let lines = function_lines(&out, "main");
    assert_eq!(lines.iter().filter(|l| l.starts_with("for_iteration.")).count(), 1);
    assert_eq!(lines.iter().filter(|l| l.starts_with("for_condition.")).count(), 2);
    assert_well_formed_blocks(&lines);
}

#[test]
fn recursion_and_forward_calls_resolve() {
    let out = ir(
        "fn main() -> i32 {\n  return fib(10)\n}\nfn fib(n: i32) -> i32 {\n  if n < 2 {\n    return n\n  }\n  return fib(n - 1) + fib(n - 2)\n}\n",
    );
    assert!(out.contains("call i32 @fib(i32 10)"));
    assert_eq!(out.matches("define ").count(), 2);
    assert_well_formed_blocks(&function_lines(&out, "fib"));
}

#[test]
fn structs_and_arrays_lower_to_getelementptr() {
    let out = ir(
        "struct Point {\n  x: i32\n  y: i32\n}\nfn main() -> i32 {\n  p : Point\n  p.x = 3\n  xs : [8]i32\n  xs[p.x] = 5\n  return xs[3] + p.x\n}\n",
    );
    assert!(out.contains("%Point = type { i32, i32 }\n"));
    assert!(out.contains("getelementptr inbounds %Point, ptr %p, i32 0, i32 0"));
    assert!(out.contains("getelementptr inbounds [8 x i32], ptr %xs, i64 0, i64 %id."));
}

#[test]
fn target_directive_and_override() {
    let source = "#target aarch64-apple-darwin\nfn main() {\n}\n";
    let out = compile(source, &Config::default()).unwrap();
    assert!(out.starts_with("target triple = \"aarch64-apple-darwin\"\n"));

    let out = compile(source, &Config::with_target("riscv64-unknown-elf")).unwrap();
    assert!(out.starts_with("target triple = \"riscv64-unknown-elf\"\n"));
}

#[test]
fn syntax_errors_are_collected_and_later_code_still_parses() {
    let source = "fn broken() {\n  if {\n  }\n}\nfn fine() -> i32 {\n  x := \n  return 1\n}\n";
    match compile(source, &Config::default()) {
        Err(CompileError::Syntax(errors)) => {
            assert!(errors.len() >= 2);
            assert_eq!(errors[0].pos().line, 2);
            assert!(errors.iter().any(|e| e.pos().line == 6));
            assert!(errors[0].to_string().starts_with("[Line 2:6] Error at '{'"));
        }
        other => panic!("expected syntax errors, got {:?}", other),
    }
}

#[test]
fn semantic_error_stops_compilation() {
    let err = compile("fn main() {\n  y = 1\n}\n", &Config::default()).unwrap_err();
    assert!(matches!(err, CompileError::Semantic(_)));
    assert_eq!(err.to_string(), "[Line 2:3] Undefined variable 'y'");
}

#[test]
fn lexical_error_is_reported() {
    let err = compile("fn main() {\n  x := 1 $ 2\n}\n", &Config::default()).unwrap_err();
    assert!(matches!(err, CompileError::Lex(_)));
}

#[test]
fn mismatched_returns_are_rejected() {
    for source in ["fn f() {\n  return 5\n}\n", "fn g() -> i32 {\n  return\n}\n"] {
        let err = compile(source, &Config::default()).unwrap_err();
        assert!(matches!(err, CompileError::Semantic(_)), "{}", source);
    }
}

#[test]
fn narrower_argument_is_widened_for_the_call() {
    let out = ir("fn g(n: i64) {\n}\nfn f() {\n  x := 1\n  g(x)\n}\n");
    let lines = function_lines(&out, "f");
    assert!(lines.contains(&"%id.2 = sext i32 %id.1 to i64".to_string()));
    assert!(lines.contains(&"call void @g(i64 %id.2)".to_string()));
}

#[test]
fn indexed_compound_assignment_calls_index_once() {
    let out = ir(
        "fn next() -> i32 {\n  return 1\n}\nfn main() {\n  xs : [4]i32\n  xs[next()] += 1\n}\n",
    );
    assert_eq!(function_lines(&out, "main").iter().filter(|l| l.contains("@next()")).count(), 1);
}
