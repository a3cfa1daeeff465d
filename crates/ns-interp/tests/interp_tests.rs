//! Interpreter integration tests: each test runs a small NS program and
//! asserts its printed output, final value, or error.

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

use ns_common::source::Source;
use ns_interp::{Interp, RuntimeError, Value};
use ns_parser::ParseTree;

/// An output sink that can be read back after the interpreter (which
/// owns its boxed writer) is done with it.
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("output is UTF-8")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn parse(body: &str) -> Rc<ParseTree> {
    let source = Source::new("test.ns", body);
    let tokens = ns_lexer::tokenize(&source).expect("lexing failed");
    Rc::new(ns_parser::parse(tokens).expect("parsing failed"))
}

fn run_in(dir: &Path, body: &str) -> (Result<Value, RuntimeError>, String) {
    let buf = SharedBuf::default();
    let mut interp = Interp::with_output(dir, Box::new(buf.clone()));
    let result = interp.run(&parse(body));
    (result, buf.contents())
}

fn run(body: &str) -> (Value, String) {
    let (result, output) = run_in(Path::new("."), body);
    match result {
        Ok(value) => (value, output),
        Err(e) => panic!("program failed: {e}\noutput so far:\n{output}"),
    }
}

fn output(body: &str) -> String {
    run(body).1
}

fn run_err(body: &str) -> RuntimeError {
    let (result, _) = run_in(Path::new("."), body);
    result.expect_err("expected a runtime error")
}

// ── Spec-level evaluation semantics ────────────────────────────────────

#[test]
fn arithmetic_precedence() {
    assert_eq!(output("let x = 1 + 2 * 3; print(x);"), "7\n");
}

#[test]
fn string_repetition() {
    assert_eq!(output("let s = \"ab\" * 3; print(s);"), "ababab\n");
}

#[test]
fn array_push_and_display() {
    assert_eq!(
        output("let xs = [1,2,3]; xs:push(4); print(xs);"),
        "[1, 2, 3, 4]\n"
    );
}

#[test]
fn references_alias_their_target() {
    assert_eq!(output("let a = 0; let r = &a; *r = 5; print(a);"), "5\n");
}

#[test]
fn recursive_factorial() {
    let src = "fn fact(n) { if (n==0) { return 1; } return n * fact(n-1); } print(fact(5));";
    assert_eq!(output(src), "120\n");
}

#[test]
fn for_loop_with_index_counter() {
    let src = "for i,idx in [10,20,30] { print(idx, i); }";
    assert_eq!(output(src), "0 10\n1 20\n2 30\n");
}

#[test]
fn while_yields_break_payload() {
    assert_eq!(output("let x = { while (1) { break 42; } }; print(x);"), "42\n");
}

#[test]
fn top_level_value_is_last_statement() {
    let (value, _) = run("let x = 40; x + 2;");
    assert_eq!(value.as_number(), Some(42.0));
}

// ── Copy semantics ─────────────────────────────────────────────────────

#[test]
fn scalars_are_copied_on_assignment() {
    assert_eq!(output("let a = 1; let b = a; b = 2; print(a, b);"), "1 2\n");
}

#[test]
fn reference_capture_suppresses_the_copy() {
    // Incrementing through the reference must be visible through `a`.
    assert_eq!(output("let a = 1; let r = &a; *r = *r + 1; print(a);"), "2\n");
}

// ── Operators ──────────────────────────────────────────────────────────

#[test]
fn equality_rules() {
    assert_eq!(
        output("print(1 == 1, 1 == 2, \"a\" == \"a\", true == true, null == null);"),
        "true false true true true\n"
    );
    assert_eq!(output("print(1 != 2, \"a\" != \"a\");"), "true false\n");
}

#[test]
fn comparison_operators() {
    assert_eq!(output("print(2 > 1, 1 < 2, 2 >= 2, 1 <= 0);"), "true true true false\n");
    assert_eq!(output("print(\"b\" > \"a\", \"a\" < \"b\");"), "true true\n");
}

#[test]
fn logical_operators_short_circuit() {
    assert_eq!(output("print(0 && 1, 1 && 2, 0 || 3, 4 || 5);"), "0 2 3 4\n");
}

#[test]
fn compound_assignment() {
    assert_eq!(output("let x = 1; x += 4; x *= 2; print(x);"), "10\n");
}

#[test]
fn increment_and_decrement() {
    assert_eq!(output("let x = 1; print(++x, x);"), "2 2\n");
    assert_eq!(output("let y = 1; print(y++, y);"), "1 2\n");
}

#[test]
fn string_decrement_chops() {
    assert_eq!(output("let s = \"abc\"; s--; print(s);"), "ab\n");
}

#[test]
fn numeric_bitwise_operators() {
    assert_eq!(output("print(6 & 3, 6 | 3, 6 ^ 3, 1 << 3, 8 >> 2);"), "2 7 5 8 2\n");
    assert_eq!(output("print(7 % 3, -5, ~0);"), "1 -5 -1\n");
}

#[test]
fn array_concatenation() {
    assert_eq!(output("print([1,2] + [3]);"), "[1, 2, 3]\n");
}

#[test]
fn division_by_zero_is_an_error() {
    let err = run_err("let x = 1 / 0;");
    assert!(err.message.contains("Division by zero"), "{}", err.message);
}

#[test]
fn missing_operator_impl_names_both_types() {
    let err = run_err("let x = \"s\" + 1;");
    assert!(
        err.message.contains("`+`") && err.message.contains("String") && err.message.contains("Number"),
        "{}",
        err.message
    );
}

// ── Control flow ───────────────────────────────────────────────────────

#[test]
fn truthiness_by_kind() {
    let src = "fn check(v) { if (v) { return \"t\"; } return \"f\"; } \
               print(check(0), check(2), check(\"\"), check(\"x\"), check(null), check([]));";
    assert_eq!(output(src), "f t f t f t\n");
}

#[test]
fn if_as_expression() {
    assert_eq!(output("let x = if (0) 1 else 2; print(x);"), "2\n");
    assert_eq!(output("let y = if (1) 1 else 2; print(y);"), "1\n");
}

#[test]
fn continue_skips_an_iteration() {
    let src = "for i in [1,2,3,4] { if (i == 2) { continue; } print(i); }";
    assert_eq!(output(src), "1\n3\n4\n");
}

#[test]
fn stray_return_is_an_error() {
    let err = run_err("return 1;");
    assert!(err.message.contains("`return`"), "{}", err.message);
}

// ── Functions ──────────────────────────────────────────────────────────

#[test]
fn default_parameters_fill_missing_arguments() {
    let src = "fn f(a, b = 10) { return a + b; } print(f(1), f(1, 2));";
    assert_eq!(output(src), "11 3\n");
}

#[test]
fn missing_argument_without_default_is_null() {
    assert_eq!(output("fn f(a) { return a; } print(f());"), "null\n");
}

#[test]
fn extra_argument_is_an_error() {
    let err = run_err("fn f(a) { return a; } f(1, 2);");
    assert!(err.message.contains("extra argument"), "{}", err.message);
}

#[test]
fn closures_capture_their_scope() {
    let src = "let n = 10; fn add(x) { return x + n; } print(add(5));";
    assert_eq!(output(src), "15\n");
}

#[test]
fn function_body_value_is_the_result() {
    assert_eq!(output("fn f() { 42; } print(f());"), "42\n");
}

#[test]
fn function_bind_sets_self() {
    let src = "fn who() { return self; } let bound = who:bind(7); print(bound());";
    assert_eq!(output(src), "7\n");
}

#[test]
fn calling_null_is_an_error_at_the_callee() {
    let err = run_err("let f = null; f();");
    assert!(err.message.contains("not callable"), "{}", err.message);
    assert_eq!((err.line, err.column), (0, 14));
}

// ── Structs, constructors and methods ──────────────────────────────────

#[test]
fn constructor_sets_fields() {
    let src = "struct P { x: Number; y: Number } let p = P { x: 1; y: 2 }; print(p.x, p.y);";
    assert_eq!(output(src), "1 2\n");
}

#[test]
fn methods_bind_self_through_colon() {
    let src = "struct C { v: Number; fn get() { return .v; } } \
               let c = C { v: 9 }; print(c:get());";
    assert_eq!(output(src), "9\n");
}

#[test]
fn property_assignment() {
    let src = "struct P { x: Number } let p = P { x: 1 }; p.x = 5; print(p.x);";
    assert_eq!(output(src), "5\n");
}

#[test]
fn unchecked_field_types_fail_only_at_use() {
    let src = "struct S { a: Number } let v = S { a: \"str\" }; v.a + 1;";
    let err = run_err(src);
    assert!(err.message.contains("`+`"), "{}", err.message);
}

#[test]
fn enum_members_get_ordinals() {
    assert_eq!(output("enum E { A; B; C } print(E:B, E::C);"), "1 2\n");
}

// ── References and ref expressions ─────────────────────────────────────

#[test]
fn ref_equality_is_target_identity() {
    let src = "let a = 1; let b = 1; let r1 = &a; let r2 = &a; let r3 = &b; \
               print(r1 == r2, r1 == r3);";
    assert_eq!(output(src), "true false\n");
}

#[test]
fn property_access_forwards_through_refs() {
    let src = "struct P { x: Number } let p = P { x: 3 }; let r = &p; print(r.x);";
    assert_eq!(output(src), "3\n");
}

#[test]
fn deref_of_non_ref_is_an_error() {
    let err = run_err("let x = 1; *x;");
    assert!(err.message.contains("dereference"), "{}", err.message);
}

#[test]
fn ref_expression_takes_result_with_fat_arrow() {
    assert_eq!(output("let v = 5 => n (n + 1); print(v);"), "6\n");
    assert_eq!(output("let v = 5 => (it * 2); print(v);"), "10\n");
}

#[test]
fn ref_expression_passes_through_with_thin_arrow() {
    assert_eq!(output("let v = 5 -> (it + 1); print(v);"), "5\n");
}

// ── Decorators ─────────────────────────────────────────────────────────

#[test]
fn function_decorator_replaces_the_value() {
    let src = "fn double(v) { return v + v; } @double let x = 3; print(x);";
    assert_eq!(output(src), "6\n");
}

#[test]
fn decorator_with_arguments() {
    let src = "fn scale(v, k) { return v * k; } @scale(10) let x = 3; print(x);";
    assert_eq!(output(src), "30\n");
}

#[test]
fn inline_export_requires_a_named_target() {
    let err = run_err("export(5);");
    assert!(err.message.contains("unnamed"), "{}", err.message);
}

#[test]
fn inline_decorator_requires_a_target() {
    let err = run_err("export();");
    assert!(err.message.contains("requires a target"), "{}", err.message);
}

// ── Logic gates ────────────────────────────────────────────────────────

#[test]
fn gate_constructors_and_wiring() {
    let src = "let g = and(); let h = or(); g:connect(h); print(g.kind, h.kind);";
    assert_eq!(output(src), "and or\n");
}

#[test]
fn gate_wiring_through_greater_than() {
    let src = "let g = nand(); let h = nxor(); g > h; print(g.kind, h.kind);";
    assert_eq!(output(src), "nand nxor\n");
}

#[test]
fn gate_wiring_rejects_non_gates() {
    let err = run_err("let g = xor(); g > 5;");
    assert!(err.message.contains("Invalid connection target"), "{}", err.message);
}

// ── Indexing ───────────────────────────────────────────────────────────

#[test]
fn array_and_string_indexing() {
    assert_eq!(output("let xs = [1,2,3]; print(xs[1]);"), "2\n");
    assert_eq!(output("print(\"abc\"[1]);"), "b\n");
}

#[test]
fn index_out_of_range_is_an_error() {
    let err = run_err("let xs = [1]; xs[5];");
    assert!(err.message.contains("out of range"), "{}", err.message);
}

#[test]
fn colon_separated_index_is_rejected_at_runtime() {
    let err = run_err("let xs = [1,2,3]; xs[0:2];");
    assert!(err.message.contains("not supported"), "{}", err.message);
}

// ── Modules ────────────────────────────────────────────────────────────

#[test]
fn import_binds_a_module_over_the_file_scope() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("util.ns"),
        "let value = 10; fn triple(a) { return a * 3; }",
    )
    .expect("write module");
    let (result, output) = run_in(
        dir.path(),
        "import util; print(util.value, util:triple(2));",
    );
    result.expect("program failed");
    assert_eq!(output, "10 6\n");
}

#[test]
fn missing_module_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (result, _) = run_in(dir.path(), "import nope;");
    let err = result.expect_err("expected an error");
    assert!(err.message.contains("Cannot read module"), "{}", err.message);
}

#[test]
fn require_returns_the_exported_component() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("comp.ns"),
        "fn setup() { @export let component = 7; } setup();",
    )
    .expect("write module");
    let (result, output) = run_in(dir.path(), "let c = require(\"comp\"); print(c);");
    result.expect("program failed");
    assert_eq!(output, "7\n");
}

#[test]
fn module_parse_errors_surface_at_runtime() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("bad.ns"), "let x = ;").expect("write module");
    let (result, _) = run_in(dir.path(), "import bad;");
    let err = result.expect_err("expected an error");
    assert_eq!(err.label, "Syntax error");
    assert!(err.message.contains("empty expression"), "{}", err.message);
    assert!(err.source.name.ends_with("bad.ns"), "{}", err.source.name);
}

// ── Errors ─────────────────────────────────────────────────────────────

#[test]
fn unbound_name_is_an_error() {
    let err = run_err("print(nope);");
    assert!(err.message.contains("No such variable"), "{}", err.message);
}

#[test]
fn assignment_to_unbound_name_is_an_error() {
    let err = run_err("x = 1;");
    assert!(err.message.contains("No such variable"), "{}", err.message);
}

#[test]
fn assignment_to_locked_builtin_is_an_error() {
    let err = run_err("print = 1;");
    assert!(err.message.contains("Cannot assign"), "{}", err.message);
}

#[test]
fn error_carries_the_source_location() {
    let err = run_err("let x = 1;\nnope;");
    assert_eq!(err.line, 1);
    assert_eq!(err.column, 0);
}
