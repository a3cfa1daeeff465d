//! Built-in classes, operator traits and the locked global scope.
//!
//! Every operator the evaluator dispatches goes through a trait: a class
//! implements `Op.Add` to be usable with `+`, and so on. The built-in
//! scalar classes implement the full arithmetic/comparison set plus
//! `Copy`; user classes get trait lookups through the same tables.

use rustc_hash::FxHashMap;

use crate::env::Vars;
use crate::error::RuntimeError;
use crate::value::{Args, ClassDef, NativeFn, TraitDef, Value, ValueKind};
use crate::Interp;

/// Handles to every built-in class and trait, created once per
/// interpreter.
pub struct Builtins {
    // Classes.
    pub number: Value,
    pub string: Value,
    pub boolean: Value,
    pub array: Value,
    pub function: Value,
    pub logic: Value,
    // Marker traits.
    pub to_string: Value,
    pub iterator: Value,
    pub copy: Value,
    // Operator traits.
    pub op_add: Value,
    pub op_sub: Value,
    pub op_mul: Value,
    pub op_div: Value,
    pub op_rem: Value,
    pub op_eq: Value,
    pub op_gt: Value,
    pub op_lt: Value,
    pub op_inc: Value,
    pub op_dec: Value,
    pub op_bit_and: Value,
    pub op_bit_or: Value,
    pub op_bit_xor: Value,
    pub op_shl: Value,
    pub op_shr: Value,
    pub op_neg: Value,
    pub op_bit_not: Value,
}

impl Builtins {
    /// Build the built-in classes and traits and the locked globals scope
    /// that exposes them to programs.
    pub fn install() -> (Builtins, Vars) {
        let to_string = new_trait("ToString", &["toString"]);
        let iterator = new_trait("Iterator", &["items"]);
        let copy = new_trait("Copy", &["copy"]);
        let op_add = new_trait("Op.Add", &["add"]);
        let op_sub = new_trait("Op.Sub", &["sub"]);
        let op_mul = new_trait("Op.Mul", &["mul"]);
        let op_div = new_trait("Op.Div", &["div"]);
        let op_rem = new_trait("Op.Rem", &["rem"]);
        let op_eq = new_trait("Op.Eq", &["eq"]);
        let op_gt = new_trait("Op.Gt", &["gt"]);
        let op_lt = new_trait("Op.Lt", &["lt"]);
        let op_inc = new_trait("Op.Inc", &["inc"]);
        let op_dec = new_trait("Op.Dec", &["dec"]);
        let op_bit_and = new_trait("Op.BitAnd", &["band"]);
        let op_bit_or = new_trait("Op.BitOr", &["bor"]);
        let op_bit_xor = new_trait("Op.BitXor", &["bxor"]);
        let op_shl = new_trait("Op.Shl", &["shl"]);
        let op_shr = new_trait("Op.Shr", &["shr"]);
        let op_neg = new_trait("Op.Neg", &["neg"]);
        let op_bit_not = new_trait("Op.BitNot", &["bnot"]);

        let number = Value::class(ClassDef::new("Number"));
        impl_trait(&number, &copy, &[("copy", copy_self as NativeFn)]);
        impl_trait(&number, &op_add, &[("add", number_add as NativeFn)]);
        impl_trait(&number, &op_sub, &[("sub", number_sub as NativeFn)]);
        impl_trait(&number, &op_mul, &[("mul", number_mul as NativeFn)]);
        impl_trait(&number, &op_div, &[("div", number_div as NativeFn)]);
        impl_trait(&number, &op_rem, &[("rem", number_rem as NativeFn)]);
        impl_trait(&number, &op_eq, &[("eq", number_eq as NativeFn)]);
        impl_trait(&number, &op_gt, &[("gt", number_gt as NativeFn)]);
        impl_trait(&number, &op_lt, &[("lt", number_lt as NativeFn)]);
        impl_trait(&number, &op_inc, &[("inc", number_inc as NativeFn)]);
        impl_trait(&number, &op_dec, &[("dec", number_dec as NativeFn)]);
        impl_trait(&number, &op_bit_and, &[("band", number_band as NativeFn)]);
        impl_trait(&number, &op_bit_or, &[("bor", number_bor as NativeFn)]);
        impl_trait(&number, &op_bit_xor, &[("bxor", number_bxor as NativeFn)]);
        impl_trait(&number, &op_shl, &[("shl", number_shl as NativeFn)]);
        impl_trait(&number, &op_shr, &[("shr", number_shr as NativeFn)]);
        impl_trait(&number, &op_neg, &[("neg", number_neg as NativeFn)]);
        impl_trait(&number, &op_bit_not, &[("bnot", number_bnot as NativeFn)]);

        let string = Value::class(ClassDef::new("String"));
        impl_trait(&string, &copy, &[("copy", copy_self as NativeFn)]);
        impl_trait(&string, &op_add, &[("add", string_add as NativeFn)]);
        impl_trait(&string, &op_mul, &[("mul", string_mul as NativeFn)]);
        impl_trait(&string, &op_eq, &[("eq", string_eq as NativeFn)]);
        impl_trait(&string, &op_gt, &[("gt", string_gt as NativeFn)]);
        impl_trait(&string, &op_lt, &[("lt", string_lt as NativeFn)]);
        impl_trait(&string, &op_dec, &[("dec", string_dec as NativeFn)]);

        let boolean = Value::class(ClassDef::new("Boolean"));
        impl_trait(&boolean, &copy, &[("copy", copy_self as NativeFn)]);
        impl_trait(&boolean, &op_eq, &[("eq", boolean_eq as NativeFn)]);

        let array = Value::class(ClassDef::new("Array"));
        array.set_prop("push", Value::native("push", array_push));
        array.set_prop("pop", Value::native("pop", array_pop));
        impl_trait(&array, &op_add, &[("add", array_add as NativeFn)]);

        let function = Value::class(ClassDef::new("Function"));
        function.set_prop("bind", Value::native("bind", function_bind));
        impl_trait(&function, &copy, &[("copy", copy_self as NativeFn)]);

        let logic = Value::class(ClassDef::new("Logic"));
        logic.set_prop("connect", Value::native("connect", logic_connect));
        impl_trait(&logic, &op_gt, &[("gt", logic_gt as NativeFn)]);

        let mut globals = FxHashMap::default();
        globals.insert("print".to_string(), Value::native("print", builtin_print));
        globals.insert("true".to_string(), Value::boolean(true));
        globals.insert("false".to_string(), Value::boolean(false));
        globals.insert("null".to_string(), Value::null());
        globals.insert("and".to_string(), Value::native("and", gate_and));
        globals.insert("or".to_string(), Value::native("or", gate_or));
        globals.insert("xor".to_string(), Value::native("xor", gate_xor));
        globals.insert("nand".to_string(), Value::native("nand", gate_nand));
        globals.insert("nor".to_string(), Value::native("nor", gate_nor));
        globals.insert("nxor".to_string(), Value::native("nxor", gate_nxor));
        globals.insert("export".to_string(), Value::decorator(None, Some(export_hook)));
        globals.insert("require".to_string(), Value::native("require", builtin_require));
        let globals = Vars::with_map(globals, true);

        (
            Builtins {
                number,
                string,
                boolean,
                array,
                function,
                logic,
                to_string,
                iterator,
                copy,
                op_add,
                op_sub,
                op_mul,
                op_div,
                op_rem,
                op_eq,
                op_gt,
                op_lt,
                op_inc,
                op_dec,
                op_bit_and,
                op_bit_or,
                op_bit_xor,
                op_shl,
                op_shr,
                op_neg,
                op_bit_not,
            },
            globals,
        )
    }
}

fn new_trait(name: &'static str, methods: &'static [&'static str]) -> Value {
    Value::trait_def(TraitDef { name, methods })
}

/// Attach a trait implementation to a class: the methods become props of
/// a fresh impl class registered under the trait's identity.
fn impl_trait(class: &Value, trait_value: &Value, methods: &[(&'static str, NativeFn)]) {
    let impl_name = match &trait_value.borrow().kind {
        ValueKind::Trait(def) => def.name,
        _ => unreachable!("trait impls are keyed by trait values"),
    };
    let impl_class = Value::class(ClassDef::new(impl_name));
    for &(name, f) in methods {
        impl_class.set_prop(name, Value::native(name, f));
    }
    match &class.borrow().kind {
        ValueKind::Class(def) => {
            def.traits.borrow_mut().push((trait_value.clone(), impl_class));
        }
        _ => unreachable!("trait impls go on classes"),
    }
}

/// The "unsupported operation" error every operator impl raises when the
/// right-hand side has the wrong type.
fn unsupported(args: &Args, op: &str, left: &str, right: &Value) -> RuntimeError {
    RuntimeError::at_node(
        format!(
            "Unsupported operation `{op}` between `{left}` and `{}`",
            right.type_name()
        ),
        &args.tree,
        args.node,
    )
}

// ── Shared scalar behavior ─────────────────────────────────────────────

/// `Copy.copy` for scalars: a detached cell with the same contents.
fn copy_self(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    Ok(args.receiver("copy")?.shallow_copy())
}

// ── Number ─────────────────────────────────────────────────────────────

fn number_pair(args: &Args, op: &str) -> Result<(f64, f64), RuntimeError> {
    let left = args.receiver(op)?;
    let left = left.as_number().ok_or_else(|| {
        RuntimeError::at_node(format!("Unbound call to `{op}`"), &args.tree, args.node)
    })?;
    let right = args.arg(0);
    match right.as_number() {
        Some(r) => Ok((left, r)),
        None => Err(unsupported(args, op, "Number", &right)),
    }
}

fn number_add(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let (l, r) = number_pair(args, "+")?;
    Ok(Value::number(l + r))
}

fn number_sub(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let (l, r) = number_pair(args, "-")?;
    Ok(Value::number(l - r))
}

fn number_mul(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let (l, r) = number_pair(args, "*")?;
    Ok(Value::number(l * r))
}

fn number_div(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let (l, r) = number_pair(args, "/")?;
    if r == 0.0 {
        return Err(RuntimeError::at_node("Division by zero", &args.tree, args.node));
    }
    Ok(Value::number(l / r))
}

fn number_rem(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let (l, r) = number_pair(args, "%")?;
    if r == 0.0 {
        return Err(RuntimeError::at_node("Division by zero", &args.tree, args.node));
    }
    Ok(Value::number(l % r))
}

fn number_eq(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let left = args.receiver("==")?.as_number();
    let right = args.arg(0).as_number();
    Ok(Value::boolean(match (left, right) {
        (Some(l), Some(r)) => l == r,
        _ => false,
    }))
}

fn number_gt(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let (l, r) = number_pair(args, ">")?;
    Ok(Value::boolean(l > r))
}

fn number_lt(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let (l, r) = number_pair(args, "<")?;
    Ok(Value::boolean(l < r))
}

fn number_inc(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let n = args.receiver("++")?.as_number().ok_or_else(|| {
        RuntimeError::at_node("Unbound call to `++`", &args.tree, args.node)
    })?;
    Ok(Value::number(n + 1.0))
}

fn number_dec(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let n = args.receiver("--")?.as_number().ok_or_else(|| {
        RuntimeError::at_node("Unbound call to `--`", &args.tree, args.node)
    })?;
    Ok(Value::number(n - 1.0))
}

fn number_band(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let (l, r) = number_pair(args, "&")?;
    Ok(Value::number(((l as i64) & (r as i64)) as f64))
}

fn number_bor(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let (l, r) = number_pair(args, "|")?;
    Ok(Value::number(((l as i64) | (r as i64)) as f64))
}

fn number_bxor(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let (l, r) = number_pair(args, "^")?;
    Ok(Value::number(((l as i64) ^ (r as i64)) as f64))
}

fn number_shl(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let (l, r) = number_pair(args, "<<")?;
    Ok(Value::number(((l as i64) << ((r as i64) & 63)) as f64))
}

fn number_shr(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let (l, r) = number_pair(args, ">>")?;
    Ok(Value::number(((l as i64) >> ((r as i64) & 63)) as f64))
}

fn number_neg(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let n = args.receiver("-")?.as_number().ok_or_else(|| {
        RuntimeError::at_node("Unbound call to `-`", &args.tree, args.node)
    })?;
    Ok(Value::number(-n))
}

fn number_bnot(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let n = args.receiver("~")?.as_number().ok_or_else(|| {
        RuntimeError::at_node("Unbound call to `~`", &args.tree, args.node)
    })?;
    Ok(Value::number(!(n as i64) as f64))
}

// ── String ─────────────────────────────────────────────────────────────

fn string_receiver(args: &Args, op: &str) -> Result<String, RuntimeError> {
    args.receiver(op)?.as_string().ok_or_else(|| {
        RuntimeError::at_node(format!("Unbound call to `{op}`"), &args.tree, args.node)
    })
}

fn string_add(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let l = string_receiver(args, "+")?;
    let right = args.arg(0);
    match right.as_string() {
        Some(r) => Ok(Value::string(format!("{l}{r}"))),
        None => Err(unsupported(args, "+", "String", &right)),
    }
}

/// `*` on a string repeats it; the count is the integer part of the
/// right-hand number, clamped at zero.
fn string_mul(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let l = string_receiver(args, "*")?;
    let right = args.arg(0);
    match right.as_number() {
        Some(n) => {
            let count = if n > 0.0 { n.trunc() as usize } else { 0 };
            Ok(Value::string(l.repeat(count)))
        }
        None => Err(unsupported(args, "*", "String", &right)),
    }
}

fn string_eq(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let l = string_receiver(args, "==")?;
    Ok(Value::boolean(args.arg(0).as_string().is_some_and(|r| l == r)))
}

fn string_gt(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let l = string_receiver(args, ">")?;
    let right = args.arg(0);
    match right.as_string() {
        Some(r) => Ok(Value::boolean(l > r)),
        None => Err(unsupported(args, ">", "String", &right)),
    }
}

fn string_lt(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let l = string_receiver(args, "<")?;
    let right = args.arg(0);
    match right.as_string() {
        Some(r) => Ok(Value::boolean(l < r)),
        None => Err(unsupported(args, "<", "String", &right)),
    }
}

/// `--` on a string chops its last character.
fn string_dec(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let mut s = string_receiver(args, "--")?;
    s.pop();
    Ok(Value::string(s))
}

// ── Boolean ────────────────────────────────────────────────────────────

fn boolean_eq(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let receiver = args.receiver("==")?;
    let l = match &receiver.borrow().kind {
        ValueKind::Boolean(b) => *b,
        _ => {
            return Err(RuntimeError::at_node("Unbound call to `==`", &args.tree, args.node));
        }
    };
    let right = args.arg(0);
    let result = matches!(&right.borrow().kind, ValueKind::Boolean(r) if *r == l);
    Ok(Value::boolean(result))
}

// ── Array ──────────────────────────────────────────────────────────────

fn array_push(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let receiver = args.receiver("push")?;
    let item = args.arg(0);
    match &mut receiver.borrow_mut().kind {
        ValueKind::Array(items) => items.push(item),
        _ => {
            return Err(RuntimeError::at_node("Unbound call to `push`", &args.tree, args.node));
        }
    }
    Ok(Value::null())
}

fn array_pop(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let receiver = args.receiver("pop")?;
    let popped = match &mut receiver.borrow_mut().kind {
        ValueKind::Array(items) => items.pop(),
        _ => {
            return Err(RuntimeError::at_node("Unbound call to `pop`", &args.tree, args.node));
        }
    };
    Ok(popped.unwrap_or_else(Value::null))
}

fn array_add(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let receiver = args.receiver("+")?;
    let right = args.arg(0);
    let left_items = match &receiver.borrow().kind {
        ValueKind::Array(items) => items.clone(),
        _ => {
            return Err(RuntimeError::at_node("Unbound call to `+`", &args.tree, args.node));
        }
    };
    let right_items = match &right.borrow().kind {
        ValueKind::Array(items) => items.clone(),
        _ => return Err(unsupported(args, "+", "Array", &right)),
    };
    let mut items = left_items;
    items.extend(right_items);
    Ok(Value::array(items))
}

// ── Function ───────────────────────────────────────────────────────────

/// `f:bind(target)` -- a copy of the function bound to `target`.
fn function_bind(_interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let receiver = args.receiver("bind")?;
    if args.args.is_empty() {
        return Err(RuntimeError::at_node("Missing bind target", &args.tree, args.node));
    }
    let bound = receiver.shallow_copy();
    match &mut bound.borrow_mut().kind {
        ValueKind::Function { bound: slot, .. } => *slot = Some(args.arg(0)),
        _ => {
            return Err(RuntimeError::at_node("Unbound call to `bind`", &args.tree, args.node));
        }
    }
    Ok(bound)
}

// ── Logic gates ────────────────────────────────────────────────────────

/// Build a gate instance: a `Logic` object with its kind tag and empty
/// wiring arrays.
fn make_gate(interp: &Interp, kind: &str) -> Value {
    let gate = Value::instance(interp.builtins.logic.clone());
    gate.set_prop("kind", Value::string(kind));
    gate.set_prop("children", Value::array(Vec::new()));
    gate.set_prop("parents", Value::array(Vec::new()));
    gate
}

fn is_gate(interp: &Interp, value: &Value) -> bool {
    match &value.borrow().kind {
        ValueKind::Instance { class } => class.ptr_eq(&interp.builtins.logic),
        _ => false,
    }
}

/// Wire `parent > child`: the child is appended to the parent's outputs
/// and vice versa.
fn wire(parent: &Value, child: &Value) {
    if let Some(children) = parent.prop("children") {
        if let ValueKind::Array(items) = &mut children.borrow_mut().kind {
            items.push(child.clone());
        }
    }
    if let Some(parents) = child.prop("parents") {
        if let ValueKind::Array(items) = &mut parents.borrow_mut().kind {
            items.push(parent.clone());
        }
    }
}

fn logic_connect(interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let receiver = args.receiver("connect")?;
    if !is_gate(interp, &receiver) {
        return Err(RuntimeError::at_node("Unbound call to `connect`", &args.tree, args.node));
    }
    for (i, arg) in args.args.iter().enumerate() {
        if !is_gate(interp, arg) {
            return Err(RuntimeError::at_node(
                format!("Invalid argument #{}", i + 1),
                &args.tree,
                args.node,
            ));
        }
        wire(&receiver, arg);
    }
    Ok(Value::null())
}

fn logic_gt(interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let receiver = args.receiver(">")?;
    let other = args.arg(0);
    if !is_gate(interp, &other) {
        return Err(RuntimeError::at_node(
            "Invalid connection target",
            &args.tree,
            args.node,
        ));
    }
    wire(&receiver, &other);
    Ok(Value::null())
}

fn gate_and(interp: &mut Interp, _args: &Args) -> Result<Value, RuntimeError> {
    Ok(make_gate(interp, "and"))
}

fn gate_or(interp: &mut Interp, _args: &Args) -> Result<Value, RuntimeError> {
    Ok(make_gate(interp, "or"))
}

fn gate_xor(interp: &mut Interp, _args: &Args) -> Result<Value, RuntimeError> {
    Ok(make_gate(interp, "xor"))
}

fn gate_nand(interp: &mut Interp, _args: &Args) -> Result<Value, RuntimeError> {
    Ok(make_gate(interp, "nand"))
}

fn gate_nor(interp: &mut Interp, _args: &Args) -> Result<Value, RuntimeError> {
    Ok(make_gate(interp, "nor"))
}

fn gate_nxor(interp: &mut Interp, _args: &Args) -> Result<Value, RuntimeError> {
    Ok(make_gate(interp, "nxor"))
}

// ── Globals ────────────────────────────────────────────────────────────

fn builtin_print(interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let mut parts = Vec::with_capacity(args.args.len());
    for value in &args.args {
        parts.push(interp.display_value(&args.tree, args.node, value, true, false)?);
    }
    interp.write_line(&parts.join(" "));
    Ok(Value::null())
}

/// `require(path)` loads a program and returns its exported `component`.
fn builtin_require(interp: &mut Interp, args: &Args) -> Result<Value, RuntimeError> {
    let path = args.arg(0).as_string().ok_or_else(|| {
        RuntimeError::at_node("Expected a file path", &args.tree, args.node)
    })?;
    let path = if path.ends_with(".ns") { path } else { format!("{path}.ns") };
    let module = interp.load_module(&args.tree, args.node, &path)?;
    let component = match &module.borrow().kind {
        ValueKind::Module { vars } => vars.get("component"),
        _ => None,
    };
    Ok(component.unwrap_or_else(Value::null))
}

/// The `export` decorator: re-binds the decorated value into the root
/// frame of the current program under its declared name.
fn export_hook(
    interp: &mut Interp,
    value: Option<&Value>,
    _args: &[Value],
    tree: &std::rc::Rc<ns_parser::ParseTree>,
    node: ns_parser::NodeId,
) -> Result<Option<Value>, RuntimeError> {
    let Some(value) = value else { return Ok(None) };
    let name = match tree.ast.kind(node) {
        ns_parser::NodeKind::Let { name, .. } => Some(name.clone()),
        ns_parser::NodeKind::Function { name, .. } => name.clone(),
        _ => None,
    };
    let Some(name) = name else {
        return Err(RuntimeError::at_node("Cannot export an unnamed value", tree, node));
    };
    interp.export_binding(name, value.clone());
    Ok(None)
}
