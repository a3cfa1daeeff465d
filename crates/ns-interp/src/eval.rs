//! Per-node executors.
//!
//! Evaluation is a recursive walk over the arena: one `exec` dispatch per
//! node kind, each returning a [`Flow`]. Non-local control flow is a
//! `Flow` variant carried through every return value, never a panic.
//!
//! Most call sites go through [`Interp::eval`], which applies the
//! automatic `Copy.copy` pass after evaluation. Places that need the raw
//! storage cell (reference capture, assignment targets) use
//! [`Interp::eval_lvalue`] instead.

use std::rc::Rc;

use ns_parser::{NodeId, NodeKind, ParseTree};

use crate::env::Frame;
use crate::error::{Exec, Flow, RuntimeError};
use crate::value::{Args, ClassDef, Func, Value, ValueKind};
use crate::Interp;

/// Unwrap a `Flow::Value`, propagating any unwind to the caller.
macro_rules! val {
    ($e:expr) => {
        match $e? {
            Flow::Value(v) => v,
            other => return Ok(other),
        }
    };
}

pub(crate) use val;

impl Interp {
    /// Evaluate a node for its value, applying the automatic copy.
    pub(crate) fn eval(&mut self, tree: &Rc<ParseTree>, node: NodeId, frame: &Frame) -> Exec {
        match self.exec(tree, node, frame, false)? {
            Flow::Value(v) => Ok(Flow::Value(self.maybe_copy(tree, node, v)?)),
            other => Ok(other),
        }
    }

    /// Evaluate a node for its storage cell: no copy is performed, so the
    /// result aliases whatever the expression names.
    pub(crate) fn eval_lvalue(
        &mut self,
        tree: &Rc<ParseTree>,
        node: NodeId,
        frame: &Frame,
    ) -> Exec {
        self.exec(tree, node, frame, true)
    }

    fn exec(
        &mut self,
        tree: &Rc<ParseTree>,
        node: NodeId,
        frame: &Frame,
        want_lvalue: bool,
    ) -> Exec {
        match tree.ast.kind(node) {
            NodeKind::Expression { value, .. } => match value {
                Some(inner) => self.exec(tree, *inner, frame, want_lvalue),
                None => Ok(Flow::Value(Value::null())),
            },

            NodeKind::Block { children } => {
                let frame = frame.child();
                let mut last = Value::null();
                for &child in children {
                    last = val!(self.eval(tree, child, &frame));
                }
                Ok(Flow::Value(last))
            }

            NodeKind::Name { name } => match frame.vars().get(name) {
                Some(value) => Ok(Flow::Value(value)),
                None => Err(RuntimeError::at_node(
                    "No such variable exists in this scope",
                    tree,
                    node,
                )),
            },

            NodeKind::Number { value } => Ok(Flow::Value(Value::number(*value))),
            NodeKind::Str { value } => Ok(Flow::Value(Value::string(value.clone()))),

            NodeKind::Array { items } => {
                let mut values = Vec::with_capacity(items.len());
                for &item in items {
                    values.push(val!(self.eval(tree, item, frame)));
                }
                Ok(Flow::Value(Value::array(values)))
            }

            NodeKind::Let { name, init, decorators, .. } => {
                let hooks = self.resolve_decorators(tree, node, decorators, frame)?;
                let value = match init {
                    Some(init) => val!(self.eval(tree, *init, frame)),
                    None => Value::null(),
                };
                frame.vars().define(name.clone(), value.clone());
                let value = self.apply_decorators(tree, node, &hooks, value)?;
                frame.vars().define(name.clone(), value.clone());
                Ok(Flow::Value(value))
            }

            NodeKind::Function { name, decorators, .. } => {
                let hooks = self.resolve_decorators(tree, node, decorators, frame)?;
                let value = Value::function(Func::Code {
                    tree: tree.clone(),
                    node,
                    frame: frame.clone(),
                });
                if let Some(name) = name {
                    frame.vars().define(name.clone(), value.clone());
                }
                let value = self.apply_decorators(tree, node, &hooks, value)?;
                if let Some(name) = name {
                    frame.vars().define(name.clone(), value.clone());
                }
                Ok(Flow::Value(value))
            }

            NodeKind::Return { value } => {
                let payload = match value {
                    Some(v) => val!(self.eval(tree, *v, frame)),
                    None => Value::null(),
                };
                Ok(Flow::Return(payload))
            }
            NodeKind::Break { value } => {
                let payload = match value {
                    Some(v) => val!(self.eval(tree, *v, frame)),
                    None => Value::null(),
                };
                Ok(Flow::Break(payload))
            }
            NodeKind::Continue { value } => {
                let payload = match value {
                    Some(v) => val!(self.eval(tree, *v, frame)),
                    None => Value::null(),
                };
                Ok(Flow::Continue(payload))
            }

            NodeKind::If { condition, then_branch, else_branch } => {
                let cond = val!(self.eval(tree, *condition, frame));
                if cond.truthy() {
                    self.exec(tree, *then_branch, frame, false)
                } else if let Some(else_branch) = else_branch {
                    self.exec(tree, *else_branch, frame, false)
                } else {
                    Ok(Flow::Value(Value::null()))
                }
            }

            NodeKind::While { condition, body } => {
                let mut last = Value::null();
                loop {
                    let cond = val!(self.eval(tree, *condition, frame));
                    if !cond.truthy() {
                        break;
                    }
                    match self.exec(tree, *body, frame, false)? {
                        Flow::Value(v) => last = v,
                        Flow::Break(v) => return Ok(Flow::Value(v)),
                        Flow::Continue(_) => continue,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Value(last))
            }

            NodeKind::For { item, index, iterable, body } => {
                let iterable_value = val!(self.eval(tree, *iterable, frame)).deref();
                let items = self.iterate(tree, *iterable, iterable_value)?;
                let mut last = Value::null();
                for (i, value) in items.into_iter().enumerate() {
                    let mut bindings = vec![(item.clone(), value)];
                    if let Some(index) = index {
                        bindings.push((index.clone(), Value::number(i as f64)));
                    }
                    let frame = frame.child_with(bindings);
                    match self.exec(tree, *body, &frame, false)? {
                        Flow::Value(v) => last = v,
                        Flow::Break(v) => return Ok(Flow::Value(v)),
                        Flow::Continue(_) => continue,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Value(last))
            }

            NodeKind::Call { callee, args } => {
                let callee_value = val!(self.eval(tree, *callee, frame));
                // A non-callable target is reported at the callee's span.
                let callable = matches!(
                    &callee_value.borrow().kind,
                    ValueKind::Function { .. } | ValueKind::Decorator { .. }
                );
                if !callable {
                    let message = if callee_value.is_null() {
                        "null is not callable"
                    } else {
                        "Value is not callable"
                    };
                    return Err(RuntimeError::at_node(message, tree, *callee));
                }
                let mut arg_values = Vec::with_capacity(args.len());
                for &arg in args {
                    arg_values.push(val!(self.eval(tree, arg, frame)));
                }
                let result = self.call_value(tree, node, callee_value, arg_values)?;
                Ok(Flow::Value(result))
            }

            NodeKind::AccessDot { target, prop } => {
                let receiver = val!(self.receiver(tree, *target, frame));
                let receiver = receiver.deref();
                let value = match &receiver.borrow().kind {
                    ValueKind::Module { vars } => vars.get(prop),
                    // Property access on null quietly yields null.
                    ValueKind::Null => None,
                    _ => receiver.prop(prop),
                };
                Ok(Flow::Value(value.unwrap_or_else(Value::null)))
            }

            NodeKind::AccessColon { target, prop } => {
                let receiver = val!(self.receiver(tree, *target, frame));
                let receiver = receiver.deref();
                let value = self.class_prop(&receiver, prop);
                // A `:` access binds methods to the receiver, so a
                // following call sees it as `self`.
                let value = match value {
                    Some(v) => match &v.borrow().kind {
                        ValueKind::Function { func, .. } => Some(Value::bound_function(
                            func.clone(),
                            Some(receiver.clone()),
                        )),
                        _ => Some(v.clone()),
                    },
                    None => None,
                };
                Ok(Flow::Value(value.unwrap_or_else(Value::null)))
            }

            NodeKind::AccessColonColon { target, prop } => {
                let receiver = val!(self.receiver(tree, *target, frame));
                let receiver = receiver.deref();
                let value = self.class_prop(&receiver, prop);
                Ok(Flow::Value(value.unwrap_or_else(Value::null)))
            }

            NodeKind::Binary { .. } => self.exec_binary(tree, node, frame),
            NodeKind::Prefix { .. } => self.exec_prefix(tree, node, frame),
            NodeKind::Postfix { .. } => self.exec_postfix(tree, node, frame),

            // Type expressions are parsed but never enforced.
            NodeKind::Cast { value, .. } => self.exec(tree, *value, frame, want_lvalue),

            NodeKind::Index { .. } => self.exec_index(tree, node, frame),

            NodeKind::Constructor { .. } => self.exec_constructor(tree, node, frame),
            NodeKind::Struct { .. } => self.exec_struct(tree, node, frame),
            NodeKind::Enum { .. } => self.exec_enum(tree, node, frame),

            NodeKind::RefExpression { value, body, name, take_ref, take_result } => {
                let head = if *take_ref {
                    let cell = val!(self.eval_lvalue(tree, *value, frame));
                    Value::reference(cell)
                } else {
                    val!(self.eval(tree, *value, frame))
                };
                let Some(body) = body else {
                    return Ok(Flow::Value(head));
                };
                let bind_name = name.clone().unwrap_or_else(|| "it".to_string());
                let frame = frame.child_with(vec![
                    (bind_name, head.clone()),
                    ("self".to_string(), head.clone()),
                ]);
                let result = val!(self.eval(tree, *body, &frame));
                Ok(Flow::Value(if *take_result { result } else { head }))
            }

            NodeKind::Import { names } => {
                for name in names {
                    let module = self.load_module(tree, node, &format!("{name}.ns"))?;
                    frame.vars().define(name.clone(), module);
                }
                Ok(Flow::Value(Value::null()))
            }

            NodeKind::TypeGeneric { .. } => Err(RuntimeError::at_node(
                "Unexpected type expression",
                tree,
                node,
            )),
            NodeKind::StructProp { .. } => Err(RuntimeError::at_node(
                "Unexpected property declaration",
                tree,
                node,
            )),
            NodeKind::Decorator { .. } => Err(RuntimeError::at_node(
                "Decorator is not attached to a declaration",
                tree,
                node,
            )),
            NodeKind::EnumMember { .. } => Err(RuntimeError::at_node(
                "Unexpected enum member",
                tree,
                node,
            )),
        }
    }

    /// Resolve an accessor's receiver: the target expression, or the
    /// implicit `self` when the receiver was omitted.
    fn receiver(&mut self, tree: &Rc<ParseTree>, target: Option<NodeId>, frame: &Frame) -> Exec {
        match target {
            Some(node) => self.eval_lvalue(tree, node, frame),
            None => Ok(Flow::Value(
                frame.vars().get("self").unwrap_or_else(Value::null),
            )),
        }
    }

    /// Class-level property lookup: the receiver's class props for
    /// ordinary values, the class's own props for class receivers, and
    /// the exported scope for modules.
    fn class_prop(&self, receiver: &Value, prop: &str) -> Option<Value> {
        if let ValueKind::Module { vars } = &receiver.borrow().kind {
            return vars.get(prop);
        }
        let class = self.class_of(receiver)?;
        class.prop(prop)
    }

    /// The class a value dispatches through, if it has one.
    pub(crate) fn class_of(&self, value: &Value) -> Option<Value> {
        match &value.borrow().kind {
            ValueKind::Number(_) => Some(self.builtins.number.clone()),
            ValueKind::Str(_) => Some(self.builtins.string.clone()),
            ValueKind::Boolean(_) => Some(self.builtins.boolean.clone()),
            ValueKind::Array(_) => Some(self.builtins.array.clone()),
            ValueKind::Function { .. } => Some(self.builtins.function.clone()),
            ValueKind::Instance { class } => Some(class.clone()),
            ValueKind::Class(_) => Some(value.clone()),
            _ => None,
        }
    }

    /// Look up a trait method on a value's class and bind it to the
    /// value, ready to call.
    pub(crate) fn trait_method(
        &self,
        value: &Value,
        trait_value: &Value,
        name: &str,
    ) -> Option<Value> {
        let class = self.class_of(value)?;
        let impl_class = value.trait_impl(&class, trait_value)?;
        let method = impl_class.prop(name)?;
        let func = match &method.borrow().kind {
            ValueKind::Function { func, .. } => func.clone(),
            _ => return None,
        };
        Some(Value::bound_function(func, Some(value.clone())))
    }

    /// Apply `Copy.copy` when the value's class implements it. This is
    /// what detaches scalars on plain evaluation.
    pub(crate) fn maybe_copy(
        &mut self,
        tree: &Rc<ParseTree>,
        node: NodeId,
        value: Value,
    ) -> Result<Value, RuntimeError> {
        let copy_trait = self.builtins.copy.clone();
        match self.trait_method(&value, &copy_trait, "copy") {
            Some(method) => self.call_value(tree, node, method, Vec::new()),
            None => Ok(value),
        }
    }

    /// Call a value with already-evaluated arguments.
    pub(crate) fn call_value(
        &mut self,
        tree: &Rc<ParseTree>,
        node: NodeId,
        callee: Value,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let kind = callee.borrow().kind.clone();
        match kind {
            ValueKind::Function { func, bound } => match &*func {
                Func::Native { f, .. } => f(
                    self,
                    &Args { args, bound, tree: tree.clone(), node },
                ),
                Func::Code { tree: ftree, node: fnode, frame } => {
                    let ftree = ftree.clone();
                    let frame = frame.clone();
                    self.call_code(tree, node, &ftree, *fnode, &frame, bound, args)
                }
            },
            // A decorator used inline decorates its first argument.
            ValueKind::Decorator { post, .. } => {
                if args.is_empty() {
                    return Err(RuntimeError::at_node(
                        "Decorator call requires a target",
                        tree,
                        node,
                    ));
                }
                let target = args[0].clone();
                let rest = &args[1..];
                if let Some(post) = post {
                    if let Some(replacement) = post(self, Some(&target), rest, tree, node)? {
                        return Ok(replacement);
                    }
                }
                Ok(target)
            }
            ValueKind::Null => Err(RuntimeError::at_node("null is not callable", tree, node)),
            _ => Err(RuntimeError::at_node("Value is not callable", tree, node)),
        }
    }

    /// Call user code: map arguments into parameter slots, install
    /// `self`, run the body and catch `Return`.
    fn call_code(
        &mut self,
        call_tree: &Rc<ParseTree>,
        call_node: NodeId,
        ftree: &Rc<ParseTree>,
        fnode: NodeId,
        closure: &Frame,
        bound: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let NodeKind::Function { params, body, .. } = ftree.ast.kind(fnode) else {
            return Err(RuntimeError::at_node("Value is not callable", call_tree, call_node));
        };
        if args.len() > params.len() {
            return Err(RuntimeError::at_node(
                "Unexpected extra argument",
                call_tree,
                call_node,
            ));
        }
        let body = *body;

        let frame = closure.child();
        frame.vars().define("self", bound.unwrap_or_else(Value::null));
        for (i, param) in params.iter().enumerate() {
            let value = match args.get(i) {
                Some(v) => v.clone(),
                None => match param.default {
                    Some(default) => match self.eval(ftree, default, &frame)? {
                        Flow::Value(v) => v,
                        _ => {
                            return Err(RuntimeError::at_node(
                                "Illegal control flow in default argument",
                                ftree,
                                default,
                            ));
                        }
                    },
                    None => Value::null(),
                },
            };
            frame.vars().define(param.name.clone(), value);
        }

        let Some(body) = body else {
            // Header-only declarations are callable and produce null.
            return Ok(Value::null());
        };
        match self.exec(ftree, body, &frame, false)? {
            Flow::Value(v) | Flow::Return(v) => Ok(v),
            Flow::Break(_) => Err(RuntimeError::at_node(
                "Illegal `break` outside of a loop",
                ftree,
                body,
            )),
            Flow::Continue(_) => Err(RuntimeError::at_node(
                "Illegal `continue` outside of a loop",
                ftree,
                body,
            )),
        }
    }

    /// Materialize a for-loop iterable: arrays iterate directly, anything
    /// else must implement `Iterator.items`.
    fn iterate(
        &mut self,
        tree: &Rc<ParseTree>,
        node: NodeId,
        value: Value,
    ) -> Result<Vec<Value>, RuntimeError> {
        if let ValueKind::Array(items) = &value.borrow().kind {
            return Ok(items.clone());
        }
        let iterator_trait = self.builtins.iterator.clone();
        let Some(items_fn) = self.trait_method(&value, &iterator_trait, "items") else {
            return Err(RuntimeError::at_node("Value is not iterable", tree, node));
        };
        let result = self.call_value(tree, node, items_fn, Vec::new())?;
        let result = result.deref();
        let items = match &result.borrow().kind {
            ValueKind::Array(items) => items.clone(),
            _ => {
                return Err(RuntimeError::at_node(
                    "`Iterator.items` must return an Array",
                    tree,
                    node,
                ));
            }
        };
        Ok(items)
    }

    /// Resolve decorator values and run their pre hooks in source order.
    fn resolve_decorators(
        &mut self,
        tree: &Rc<ParseTree>,
        stmt: NodeId,
        decorators: &[NodeId],
        frame: &Frame,
    ) -> Result<Vec<(Value, Vec<Value>, NodeId)>, RuntimeError> {
        let mut resolved = Vec::with_capacity(decorators.len());
        for &dec in decorators {
            let NodeKind::Decorator { name, args } = tree.ast.kind(dec) else {
                continue;
            };
            let Some(value) = frame.vars().get(name) else {
                return Err(RuntimeError::at_node(
                    "No such variable exists in this scope",
                    tree,
                    dec,
                ));
            };
            let mut arg_values = Vec::with_capacity(args.len());
            for &arg in args {
                match self.eval(tree, arg, frame)? {
                    Flow::Value(v) => arg_values.push(v),
                    _ => {
                        return Err(RuntimeError::at_node(
                            "Illegal control flow in decorator arguments",
                            tree,
                            arg,
                        ));
                    }
                }
            }
            let pre = match &value.borrow().kind {
                ValueKind::Decorator { pre, .. } => *pre,
                _ => None,
            };
            if let Some(pre) = pre {
                pre(self, None, &arg_values, tree, stmt)?;
            }
            resolved.push((value, arg_values, dec));
        }
        Ok(resolved)
    }

    /// Run post hooks, threading any replacement value through.
    fn apply_decorators(
        &mut self,
        tree: &Rc<ParseTree>,
        stmt: NodeId,
        hooks: &[(Value, Vec<Value>, NodeId)],
        value: Value,
    ) -> Result<Value, RuntimeError> {
        let mut value = value;
        for (dec_value, args, dec_node) in hooks {
            let kind = dec_value.borrow().kind.clone();
            match kind {
                ValueKind::Decorator { post, .. } => {
                    if let Some(post) = post {
                        if let Some(replacement) = post(self, Some(&value), args, tree, stmt)? {
                            value = replacement;
                        }
                    }
                }
                // A plain function decorates by mapping the value.
                ValueKind::Function { .. } => {
                    let mut call_args = vec![value.clone()];
                    call_args.extend(args.iter().cloned());
                    value = self.call_value(tree, *dec_node, dec_value.clone(), call_args)?;
                }
                _ => {
                    return Err(RuntimeError::at_node(
                        "Value is not a decorator",
                        tree,
                        *dec_node,
                    ));
                }
            }
        }
        Ok(value)
    }

    /// Evaluate a struct declaration into a class value.
    fn exec_struct(&mut self, tree: &Rc<ParseTree>, node: NodeId, frame: &Frame) -> Exec {
        let NodeKind::Struct { name, body } = tree.ast.kind(node) else {
            unreachable!("exec_struct on non-struct node");
        };
        let class_name = name.clone().unwrap_or_else(|| "struct".to_string());
        let class = Value::class(ClassDef::new(class_name));

        if let Some(body) = body {
            let NodeKind::Block { children } = tree.ast.kind(*body) else {
                unreachable!("struct body is always a block");
            };
            let body_frame = frame.child();
            for &child in children {
                match tree.ast.kind(child) {
                    NodeKind::StructProp { name, .. } => {
                        // Field types are parsed, never enforced.
                        if let ValueKind::Class(def) = &class.borrow().kind {
                            def.fields.borrow_mut().push(name.clone());
                        }
                    }
                    NodeKind::Function { name: Some(fn_name), .. } => {
                        let method = val!(self.eval(tree, child, &body_frame));
                        class.set_prop(fn_name.clone(), method);
                    }
                    NodeKind::Let { name, .. } => {
                        let value = val!(self.eval(tree, child, &body_frame));
                        class.set_prop(name.clone(), value);
                    }
                    _ => {
                        val!(self.eval(tree, child, &body_frame));
                    }
                }
            }
        }

        if let Some(name) = name {
            frame.vars().define(name.clone(), class.clone());
        }
        Ok(Flow::Value(class))
    }

    /// Evaluate an enum declaration: a class whose props map member names
    /// to their ordinals. Member payloads are parsed but carry no runtime
    /// representation.
    fn exec_enum(&mut self, tree: &Rc<ParseTree>, node: NodeId, frame: &Frame) -> Exec {
        let NodeKind::Enum { name, members, .. } = tree.ast.kind(node) else {
            unreachable!("exec_enum on non-enum node");
        };
        let class_name = name.clone().unwrap_or_else(|| "enum".to_string());
        let class = Value::class(ClassDef::new(class_name));
        for (i, &member) in members.iter().enumerate() {
            if let NodeKind::EnumMember { name, .. } = tree.ast.kind(member) {
                class.set_prop(name.clone(), Value::number(i as f64));
            }
        }
        if let Some(name) = name {
            frame.vars().define(name.clone(), class.clone());
        }
        Ok(Flow::Value(class))
    }

    /// Evaluate `Name { field: value; ... }` into an instance.
    fn exec_constructor(&mut self, tree: &Rc<ParseTree>, node: NodeId, frame: &Frame) -> Exec {
        let NodeKind::Constructor { target, body } = tree.ast.kind(node) else {
            unreachable!("exec_constructor on non-constructor node");
        };
        let class = val!(self.eval(tree, *target, frame));
        if !matches!(&class.borrow().kind, ValueKind::Class(_)) {
            return Err(RuntimeError::at_node(
                format!("`{}` is not a struct", class.type_name()),
                tree,
                node,
            ));
        }
        let instance = Value::instance(class);
        if let Some(body) = body {
            let NodeKind::Block { children } = tree.ast.kind(*body) else {
                unreachable!("constructor body is always a block");
            };
            for &child in children {
                match tree.ast.kind(child) {
                    NodeKind::StructProp { name, value } => {
                        let v = val!(self.eval(tree, *value, frame));
                        instance.set_prop(name.clone(), v);
                    }
                    _ => {
                        return Err(RuntimeError::at_node(
                            "Expected a field initializer",
                            tree,
                            child,
                        ));
                    }
                }
            }
        }
        Ok(Flow::Value(instance))
    }

    /// Array/string indexing. Only the single-numeric-index form has
    /// runtime semantics; `:`-separated and multi-value indexes parse but
    /// are rejected here.
    fn exec_index(&mut self, tree: &Rc<ParseTree>, node: NodeId, frame: &Frame) -> Exec {
        let NodeKind::Index { target, indexes, sep } = tree.ast.kind(node) else {
            unreachable!("exec_index on non-index node");
        };
        if *sep == Some(':') {
            return Err(RuntimeError::at_node(
                "`:`-separated indexing is not supported",
                tree,
                node,
            ));
        }
        if indexes.len() != 1 {
            return Err(RuntimeError::at_node(
                "Multi-value indexing is not supported",
                tree,
                node,
            ));
        }
        let target_value = val!(self.eval_lvalue(tree, *target, frame)).deref();
        let index_value = val!(self.eval(tree, indexes[0], frame));
        let Some(raw) = index_value.as_number() else {
            return Err(RuntimeError::at_node(
                format!("`{}` is not a valid index", index_value.type_name()),
                tree,
                node,
            ));
        };
        let i = raw.trunc();
        let out_of_range =
            || RuntimeError::at_node("Index out of range", tree, node);
        if i < 0.0 {
            return Err(out_of_range());
        }
        let i = i as usize;
        let result = match &target_value.borrow().kind {
            ValueKind::Array(items) => items.get(i).cloned().ok_or_else(out_of_range)?,
            ValueKind::Str(s) => {
                let ch = s.chars().nth(i).ok_or_else(out_of_range)?;
                Value::string(ch.to_string())
            }
            _ => {
                return Err(RuntimeError::at_node(
                    format!("`{}` is not indexable", target_value.type_name()),
                    tree,
                    node,
                ));
            }
        };
        Ok(Flow::Value(result))
    }
}
