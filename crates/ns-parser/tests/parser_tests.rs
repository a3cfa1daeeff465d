//! Parser integration tests: tree shapes, precedence, associativity and
//! error positions, asserted through a compact s-expression rendering of
//! the parsed tree.

use ns_common::source::Source;
use ns_parser::{EnumMemberForm, NodeId, NodeKind, ParseError, ParseTree};

fn parse(body: &str) -> ParseTree {
    let source = Source::new("test.ns", body);
    let tokens = ns_lexer::tokenize(&source).expect("lexing failed");
    ns_parser::parse(tokens).expect("parsing failed")
}

fn parse_err(body: &str) -> ParseError {
    let source = Source::new("test.ns", body);
    let tokens = ns_lexer::tokenize(&source).expect("lexing failed");
    ns_parser::parse(tokens).expect_err("expected a parse error")
}

/// Children of the root block.
fn statements(tree: &ParseTree) -> Vec<NodeId> {
    match tree.ast.kind(tree.root) {
        NodeKind::Block { children } => children.clone(),
        other => panic!("root is not a block: {other:?}"),
    }
}

/// Render an expression sub-tree as an s-expression, looking through
/// `Expression` wrappers.
fn sexpr(tree: &ParseTree, id: NodeId) -> String {
    match tree.ast.kind(id) {
        NodeKind::Expression { value: Some(v), .. } => sexpr(tree, *v),
        NodeKind::Expression { value: None, .. } => "()".to_string(),
        NodeKind::Name { name } => name.clone(),
        NodeKind::Number { value } => format!("{value}"),
        NodeKind::Str { value } => format!("{value:?}"),
        NodeKind::Binary { op, left, right } => {
            format!("({} {op} {})", sexpr(tree, *left), sexpr(tree, *right))
        }
        NodeKind::Prefix { op, value } => format!("({op} {})", sexpr(tree, *value)),
        NodeKind::Postfix { op, value } => format!("({} {op})", sexpr(tree, *value)),
        NodeKind::Call { callee, args } => {
            let args: Vec<_> = args.iter().map(|a| sexpr(tree, *a)).collect();
            format!("(call {} [{}])", sexpr(tree, *callee), args.join(" "))
        }
        NodeKind::Index { target, indexes, .. } => {
            let idx: Vec<_> = indexes.iter().map(|a| sexpr(tree, *a)).collect();
            format!("(index {} [{}])", sexpr(tree, *target), idx.join(" "))
        }
        NodeKind::AccessDot { target, prop } => match target {
            Some(t) => format!("(. {} {prop})", sexpr(tree, *t)),
            None => format!("(. self {prop})"),
        },
        NodeKind::AccessColon { target, prop } => match target {
            Some(t) => format!("(: {} {prop})", sexpr(tree, *t)),
            None => format!("(: self {prop})"),
        },
        NodeKind::AccessColonColon { target, prop } => match target {
            Some(t) => format!("(:: {} {prop})", sexpr(tree, *t)),
            None => format!("(:: self {prop})"),
        },
        NodeKind::Array { items } => {
            let items: Vec<_> = items.iter().map(|a| sexpr(tree, *a)).collect();
            format!("[{}]", items.join(" "))
        }
        NodeKind::Cast { value, ty } => {
            format!("(cast {} {})", sexpr(tree, *value), sexpr(tree, *ty))
        }
        NodeKind::TypeGeneric { target, args } => {
            let args: Vec<_> = args.iter().map(|a| sexpr(tree, *a)).collect();
            format!("(generic {} [{}])", sexpr(tree, *target), args.join(" "))
        }
        other => format!("<{}>", other.name()),
    }
}

/// The initializer of the first (only) `let` statement.
fn let_init(tree: &ParseTree) -> String {
    for id in statements(tree) {
        if let NodeKind::Let { init: Some(init), .. } = tree.ast.kind(id) {
            return sexpr(tree, *init);
        }
    }
    panic!("no let with initializer found");
}

// ── Precedence and associativity ───────────────────────────────────────

#[test]
fn multiplication_binds_tighter_than_addition() {
    let tree = parse("let r = a + b * c;");
    assert_eq!(let_init(&tree), "(a + (b * c))");
}

#[test]
fn subtraction_is_left_associative() {
    let tree = parse("let r = a - b - c;");
    assert_eq!(let_init(&tree), "((a - b) - c)");
}

#[test]
fn assignment_is_right_associative() {
    let tree = parse("let r = (a = b = c);");
    assert_eq!(let_init(&tree), "(a = (b = c))");
}

#[test]
fn prefix_binds_tighter_than_binary() {
    let tree = parse("let r = -a * b;");
    assert_eq!(let_init(&tree), "((- a) * b)");
}

#[test]
fn comparison_looser_than_arithmetic() {
    let tree = parse("let r = a + 1 < b * 2;");
    assert_eq!(let_init(&tree), "((a + 1) < (b * 2))");
}

#[test]
fn logical_operators_loosest_before_assignment() {
    let tree = parse("let r = a == 1 && b != 2 || c > 3;");
    assert_eq!(let_init(&tree), "(((a == 1) && (b != 2)) || (c > 3))");
}

#[test]
fn postfix_binds_tightest() {
    let tree = parse("let r = a++ * b;");
    assert_eq!(let_init(&tree), "((a ++) * b)");
}

#[test]
fn parenthesized_grouping_overrides() {
    let tree = parse("let r = (a + b) * c;");
    assert_eq!(let_init(&tree), "((a + b) * c)");
}

#[test]
fn compound_assignment_parses() {
    let tree = parse("let r = (a += b * 2);");
    assert_eq!(let_init(&tree), "(a += (b * 2))");
}

// ── Postfix application ────────────────────────────────────────────────

#[test]
fn call_with_arguments() {
    let tree = parse("let r = f(1, x + 2);");
    assert_eq!(let_init(&tree), "(call f [1 (x + 2)])");
}

#[test]
fn chained_call_and_access() {
    let tree = parse("let r = a.b:c(1);");
    assert_eq!(let_init(&tree), "(call (: (. a b) c) [1])");
}

#[test]
fn self_access_with_leading_dot() {
    let tree = parse("let r = .field;");
    assert_eq!(let_init(&tree), "(. self field)");
}

#[test]
fn double_colon_access() {
    let tree = parse("let r = Mod::item;");
    assert_eq!(let_init(&tree), "(:: Mod item)");
}

#[test]
fn index_and_array_literal() {
    let tree = parse("let r = xs[i + 1];");
    assert_eq!(let_init(&tree), "(index xs [(i + 1)])");
    let tree = parse("let r = [1, 2, 3];");
    assert_eq!(let_init(&tree), "[1 2 3]");
}

#[test]
fn index_separator_is_sticky() {
    let tree = parse("let r = xs[1:2];");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Let { init: Some(init), .. } => {
            let NodeKind::Expression { value: Some(v), .. } = tree.ast.kind(*init) else {
                panic!("let initializer is not an expression")
            };
            let NodeKind::Index { sep, indexes, .. } = tree.ast.kind(*v) else {
                panic!("expected an index node")
            };
            assert_eq!(*sep, Some(':'));
            assert_eq!(indexes.len(), 2);
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn reference_taking_operator() {
    let tree = parse("let r = &a;");
    assert_eq!(let_init(&tree), "(& a)");
    let tree = parse("let v = *r;");
    assert_eq!(let_init(&tree), "(* r)");
}

// ── Statements ─────────────────────────────────────────────────────────

#[test]
fn let_modifiers() {
    let tree = parse("let const x = 1;");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Let { name, modifiers, .. } => {
            assert_eq!(name, "x");
            assert!(modifiers.is_const);
            assert!(!modifiers.is_mut);
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn let_with_type_annotation() {
    let tree = parse("let x: Number = 1;");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Let { ty: Some(ty), init: Some(_), .. } => {
            assert_eq!(sexpr(&tree, *ty), "Number");
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn function_with_params_defaults_and_return_type() {
    let tree = parse("fn add(a: Number, b = 2) -> Number { return a + b; }");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Function { name, params, return_ty, body, .. } => {
            assert_eq!(name.as_deref(), Some("add"));
            assert_eq!(params.len(), 2);
            assert_eq!(params[0].name, "a");
            assert!(params[0].ty.is_some());
            assert!(params[0].default.is_none());
            assert_eq!(params[1].name, "b");
            assert!(params[1].ty.is_none());
            assert!(params[1].default.is_some());
            assert!(return_ty.is_some());
            assert!(body.is_some());
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn header_only_function() {
    let tree = parse("fn forward(x);");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Function { body, .. } => assert!(body.is_none()),
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn if_else_chain() {
    let tree = parse("if (a) { 1; } else if (b) { 2; } else { 3; }");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::If { else_branch: Some(else_b), .. } => {
            assert!(matches!(tree.ast.kind(*else_b), NodeKind::If { .. }));
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn if_as_expression_requires_else() {
    let tree = parse("let x = if (c) 1 else 2;");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Let { init: Some(init), .. } => {
            let NodeKind::Expression { value: Some(v), .. } = tree.ast.kind(*init) else {
                panic!("initializer is not an expression")
            };
            assert!(matches!(tree.ast.kind(*v), NodeKind::If { .. }));
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn while_with_single_statement_body() {
    let tree = parse("while (x) x = x - 1;");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::While { body, .. } => {
            let NodeKind::Block { children } = tree.ast.kind(*body) else {
                panic!("while body is not a block")
            };
            assert_eq!(children.len(), 1);
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn for_loop_item_then_index() {
    let tree = parse("for i, idx in [10, 20] { print(idx, i); }");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::For { item, index, .. } => {
            assert_eq!(item, "i");
            assert_eq!(index.as_deref(), Some("idx"));
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn struct_with_typed_props_and_method() {
    let tree = parse("struct S { a: Number; fn get() { return .a; } }");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Struct { name, body: Some(body) } => {
            assert_eq!(name.as_deref(), Some("S"));
            let NodeKind::Block { children } = tree.ast.kind(*body) else {
                panic!("struct body is not a block")
            };
            assert!(matches!(tree.ast.kind(children[0]), NodeKind::StructProp { .. }));
            assert!(matches!(tree.ast.kind(children[1]), NodeKind::Function { .. }));
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn struct_prop_without_trailing_semicolon() {
    let tree = parse("struct S { a: Number }");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Struct { body: Some(body), .. } => {
            let NodeKind::Block { children } = tree.ast.kind(*body) else {
                panic!("struct body is not a block")
            };
            assert_eq!(children.len(), 1);
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn constructor_with_field_initializers() {
    let tree = parse("let v = S { a: 1; b: \"x\" };");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Let { init: Some(init), .. } => {
            let NodeKind::Expression { value: Some(v), .. } = tree.ast.kind(*init) else {
                panic!("initializer is not an expression")
            };
            let NodeKind::Constructor { body: Some(body), .. } = tree.ast.kind(*v) else {
                panic!("expected constructor, got {:?}", tree.ast.kind(*v))
            };
            let NodeKind::Block { children } = tree.ast.kind(*body) else {
                panic!("constructor body is not a block")
            };
            assert_eq!(children.len(), 2);
            assert!(matches!(tree.ast.kind(children[0]), NodeKind::StructProp { .. }));
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn enum_member_forms() {
    let tree = parse("enum E { A; B(Number); C { x: Number } }");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Enum { members, c_repr, .. } => {
            assert!(!c_repr);
            assert_eq!(members.len(), 3);
            let forms: Vec<_> = members
                .iter()
                .map(|m| match tree.ast.kind(*m) {
                    NodeKind::EnumMember { form, .. } => form,
                    other => panic!("not a member: {other:?}"),
                })
                .collect();
            assert!(matches!(forms[0], EnumMemberForm::Unit));
            assert!(matches!(forms[1], EnumMemberForm::Tuple(items) if items.len() == 1));
            assert!(matches!(forms[2], EnumMemberForm::Struct(fields) if fields.len() == 1));
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn c_repr_enum_rejects_payloads() {
    let err = parse_err("enum \"C\" E { A(Number) }");
    assert!(err.message.contains("not allowed for crepr"), "{}", err.message);
}

#[test]
fn import_names() {
    let tree = parse("import util, extra;");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Import { names } => assert_eq!(names, &["util", "extra"]),
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn decorators_attach_to_next_declaration() {
    let tree = parse("@export; let x = 1; let y = 2;");
    let stmts = statements(&tree);
    assert_eq!(stmts.len(), 2, "decorator should move off the child list");
    match tree.ast.kind(stmts[0]) {
        NodeKind::Let { name, decorators, .. } => {
            assert_eq!(name, "x");
            assert_eq!(decorators.len(), 1);
            match tree.ast.kind(decorators[0]) {
                NodeKind::Decorator { name, .. } => assert_eq!(name, "export"),
                other => panic!("not a decorator: {other:?}"),
            }
        }
        other => panic!("unexpected statement: {other:?}"),
    }
    match tree.ast.kind(stmts[1]) {
        NodeKind::Let { name, decorators, .. } => {
            assert_eq!(name, "y");
            assert!(decorators.is_empty());
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn decorator_with_arguments_attaches_to_function() {
    let tree = parse("@trace(1, 2) fn f() { }");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Function { decorators, .. } => {
            assert_eq!(decorators.len(), 1);
            match tree.ast.kind(decorators[0]) {
                NodeKind::Decorator { name, args } => {
                    assert_eq!(name, "trace");
                    assert_eq!(args.len(), 2);
                }
                other => panic!("not a decorator: {other:?}"),
            }
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn ref_expression_forms() {
    let tree = parse("let r = a => (it + 1);");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Let { init: Some(init), .. } => {
            let NodeKind::Expression { value: Some(v), .. } = tree.ast.kind(*init) else {
                panic!("initializer is not an expression")
            };
            let NodeKind::RefExpression { take_result, take_ref, name, body, .. } =
                tree.ast.kind(*v)
            else {
                panic!("expected ref expression")
            };
            assert!(*take_result);
            assert!(!*take_ref);
            assert!(name.is_none());
            assert!(body.is_some());
        }
        other => panic!("unexpected statement: {other:?}"),
    }

    let tree = parse("let r = a -> &v { v; };");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Let { init: Some(init), .. } => {
            let NodeKind::Expression { value: Some(v), .. } = tree.ast.kind(*init) else {
                panic!("initializer is not an expression")
            };
            let NodeKind::RefExpression { take_result, take_ref, name, .. } =
                tree.ast.kind(*v)
            else {
                panic!("expected ref expression")
            };
            assert!(!*take_result);
            assert!(*take_ref);
            assert_eq!(name.as_deref(), Some("v"));
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn cast_and_generic_type_arguments() {
    let tree = parse("let x = v <> List<Number>;");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Let { init: Some(init), .. } => {
            let rendered = sexpr(&tree, *init);
            assert_eq!(rendered, "(cast v (generic List [Number]))");
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn nested_generics_split_shift_right() {
    let tree = parse("let x: Map<Key, List<Number>> = m;");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Let { ty: Some(ty), .. } => {
            assert_eq!(
                sexpr(&tree, *ty),
                "(generic Map [Key (generic List [Number])])"
            );
        }
        other => panic!("unexpected statement: {other:?}"),
    }
}

// ── Errors ─────────────────────────────────────────────────────────────

#[test]
fn empty_expression_is_an_error() {
    let err = parse_err("let x = ;");
    assert!(err.message.contains("empty expression"), "{}", err.message);
    assert_eq!((err.line, err.column), (0, 8));
}

#[test]
fn unmatched_opener_reported_at_opener() {
    let err = parse_err("let x = (1 + 2");
    assert!(err.message.contains("Mismatched `(`"), "{}", err.message);
    assert_eq!((err.line, err.column), (0, 8));
}

#[test]
fn mismatched_closer() {
    let err = parse_err("fn f() { }}");
    assert!(err.message.contains("Mismatched `}`"), "{}", err.message);
}

#[test]
fn object_literals_are_rejected() {
    let err = parse_err("let x = <{ };");
    assert!(err.message.contains("Objects are not supported yet"), "{}", err.message);
}

#[test]
fn for_iterator_type_hint_unsupported() {
    let err = parse_err("for i: Number in xs { }");
    assert!(err.message.contains("not currently supported"), "{}", err.message);
}

#[test]
fn incompatible_let_modifiers() {
    let err = parse_err("let const mut x = 1;");
    assert!(err.message.contains("incompatible"), "{}", err.message);
}

#[test]
fn error_trace_lists_enclosing_nodes() {
    let err = parse_err("fn outer() { let x = ; }");
    assert!(err.message.contains("empty expression"), "{}", err.message);
    let labels: Vec<_> = err.trace.iter().map(|f| f.label.as_str()).collect();
    assert!(labels.contains(&"Expression"), "{labels:?}");
    assert!(labels.contains(&"Let"), "{labels:?}");
    assert!(labels.contains(&"Function"), "{labels:?}");
}

#[test]
fn dangling_accessor_is_an_error() {
    let err = parse_err("let x = a.;");
    assert!(
        err.message.contains("end of expression after `.`"),
        "{}",
        err.message
    );
}

#[test]
fn malformed_expression_suggests_close_tokens() {
    let err = parse_err("let x = 1 2;");
    assert!(err.message.contains("Malformed expression"), "{}", err.message);
}

#[test]
fn while_break_value_parses() {
    let tree = parse("let x = { while (1) { break 42; } };");
    match tree.ast.kind(statements(&tree)[0]) {
        NodeKind::Let { init: Some(_), .. } => {}
        other => panic!("unexpected statement: {other:?}"),
    }
}

#[test]
fn token_roundtrip_with_spacing() {
    // Re-lexing the space-joined token texts of a program yields the same
    // token texts (whitespace is insignificant between tokens).
    let source = Source::new("t.ns", "let x = 1 + 2 * f(a, \"s\"); fn g() { return x; }");
    let tokens = ns_lexer::tokenize(&source).expect("lexing failed");
    let texts: Vec<String> = tokens
        .tokens
        .iter()
        .filter(|t| !t.text.is_empty())
        .map(|t| t.text.clone())
        .collect();
    let rejoined = texts.join(" ");
    let relexed = ns_lexer::tokenize(&Source::new("t2.ns", &rejoined)).expect("relex failed");
    let retexts: Vec<String> = relexed
        .tokens
        .iter()
        .filter(|t| !t.text.is_empty())
        .map(|t| t.text.clone())
        .collect();
    assert_eq!(texts, retexts);
}
