//! Operator semantics: binary/prefix/postfix dispatch, assignment and
//! value display.
//!
//! Every operator resolves through a trait on the left operand's class;
//! the evaluator owns only the non-dispatchable cases (assignment,
//! short-circuiting, equality's identity fallback and reference
//! plumbing).

use std::rc::Rc;

use ns_parser::{NodeId, NodeKind, ParseTree};

use crate::env::{Frame, SetOutcome};
use crate::error::{Exec, Flow, RuntimeError};
use crate::eval::val;
use crate::value::{Value, ValueKind};
use crate::Interp;

impl Interp {
    pub(crate) fn exec_binary(&mut self, tree: &Rc<ParseTree>, node: NodeId, frame: &Frame) -> Exec {
        let NodeKind::Binary { op, left, right } = tree.ast.kind(node) else {
            unreachable!("exec_binary on non-binary node");
        };
        let (left, right) = (*left, *right);

        match op.as_str() {
            "=" => {
                let rhs = val!(self.eval(tree, right, frame));
                self.assign(tree, left, rhs.clone(), frame)?;
                Ok(Flow::Value(rhs))
            }
            "==" | "!=" => {
                let l = val!(self.eval(tree, left, frame));
                let r = val!(self.eval(tree, right, frame));
                let eq = self.eq_values(tree, node, &l, &r)?;
                Ok(Flow::Value(Value::boolean(if op == "==" { eq } else { !eq })))
            }
            // Logical operators short-circuit on truthiness and yield the
            // deciding operand.
            "&&" => {
                let l = val!(self.eval(tree, left, frame));
                if !l.truthy() {
                    return Ok(Flow::Value(l));
                }
                Ok(Flow::Value(val!(self.eval(tree, right, frame))))
            }
            "||" => {
                let l = val!(self.eval(tree, left, frame));
                if l.truthy() {
                    return Ok(Flow::Value(l));
                }
                Ok(Flow::Value(val!(self.eval(tree, right, frame))))
            }
            "&&=" => {
                let l = val!(self.eval(tree, left, frame));
                if !l.truthy() {
                    return Ok(Flow::Value(l));
                }
                let r = val!(self.eval(tree, right, frame));
                self.assign(tree, left, r.clone(), frame)?;
                Ok(Flow::Value(r))
            }
            "||=" => {
                let l = val!(self.eval(tree, left, frame));
                if l.truthy() {
                    return Ok(Flow::Value(l));
                }
                let r = val!(self.eval(tree, right, frame));
                self.assign(tree, left, r.clone(), frame)?;
                Ok(Flow::Value(r))
            }
            "<=" | ">=" => {
                let l = val!(self.eval(tree, left, frame));
                let r = val!(self.eval(tree, right, frame));
                Ok(Flow::Value(self.binop(tree, node, op, l, r)?))
            }
            // Compound assignment: compute through the base operator's
            // trait, then store through the assignment routine.
            op2 if op2.len() > 1 && op2.ends_with('=') => {
                let base = op2[..op2.len() - 1].to_string();
                let l = val!(self.eval(tree, left, frame));
                let r = val!(self.eval(tree, right, frame));
                let result = self.binop(tree, node, &base, l, r)?;
                self.assign(tree, left, result.clone(), frame)?;
                Ok(Flow::Value(result))
            }
            _ => {
                let op = op.clone();
                let l = val!(self.eval(tree, left, frame));
                let r = val!(self.eval(tree, right, frame));
                Ok(Flow::Value(self.binop(tree, node, &op, l, r)?))
            }
        }
    }

    /// Trait-dispatched binary operator on already-evaluated operands.
    pub(crate) fn binop(
        &mut self,
        tree: &Rc<ParseTree>,
        node: NodeId,
        op: &str,
        l: Value,
        r: Value,
    ) -> Result<Value, RuntimeError> {
        // `>=`/`<=` are the strict comparison with an equality fallback.
        if op == ">=" || op == "<=" {
            let strict = self.binop(tree, node, &op[..1], l.clone(), r.clone())?;
            if strict.truthy() {
                return Ok(Value::boolean(true));
            }
            return Ok(Value::boolean(self.eq_values(tree, node, &l, &r)?));
        }

        let (trait_value, method) = match op {
            "+" => (self.builtins.op_add.clone(), "add"),
            "-" => (self.builtins.op_sub.clone(), "sub"),
            "*" => (self.builtins.op_mul.clone(), "mul"),
            "/" => (self.builtins.op_div.clone(), "div"),
            "%" => (self.builtins.op_rem.clone(), "rem"),
            ">" => (self.builtins.op_gt.clone(), "gt"),
            "<" => (self.builtins.op_lt.clone(), "lt"),
            "&" => (self.builtins.op_bit_and.clone(), "band"),
            "|" => (self.builtins.op_bit_or.clone(), "bor"),
            "^" => (self.builtins.op_bit_xor.clone(), "bxor"),
            "<<" => (self.builtins.op_shl.clone(), "shl"),
            ">>" => (self.builtins.op_shr.clone(), "shr"),
            _ => {
                return Err(RuntimeError::at_node(
                    format!("Unsupported operation `{op}`"),
                    tree,
                    node,
                ));
            }
        };
        match self.trait_method(&l, &trait_value, method) {
            Some(m) => self.call_value(tree, node, m, vec![r]),
            None => Err(RuntimeError::at_node(
                format!(
                    "Unsupported operation `{op}` between `{}` and `{}`",
                    l.type_name(),
                    r.type_name()
                ),
                tree,
                node,
            )),
        }
    }

    /// Equality: identity for null/class/trait/ref values, `Op.Eq.eq`
    /// when the left class implements it, cell identity otherwise.
    pub(crate) fn eq_values(
        &mut self,
        tree: &Rc<ParseTree>,
        node: NodeId,
        l: &Value,
        r: &Value,
    ) -> Result<bool, RuntimeError> {
        enum Path {
            Decided(bool),
            Dispatch,
        }
        let path = {
            let lb = l.borrow();
            let rb = r.borrow();
            match (&lb.kind, &rb.kind) {
                (ValueKind::Null, ValueKind::Null) => Path::Decided(true),
                (ValueKind::Null, _) | (_, ValueKind::Null) => Path::Decided(false),
                (ValueKind::Class(_), _)
                | (_, ValueKind::Class(_))
                | (ValueKind::Trait(_), _)
                | (_, ValueKind::Trait(_)) => Path::Decided(l.ptr_eq(r)),
                (ValueKind::Ref(a), ValueKind::Ref(b)) => Path::Decided(a.ptr_eq(b)),
                (ValueKind::Ref(_), _) | (_, ValueKind::Ref(_)) => Path::Decided(false),
                _ => Path::Dispatch,
            }
        };
        match path {
            Path::Decided(b) => Ok(b),
            Path::Dispatch => {
                let eq_trait = self.builtins.op_eq.clone();
                match self.trait_method(l, &eq_trait, "eq") {
                    Some(m) => {
                        let result = self.call_value(tree, node, m, vec![r.clone()])?;
                        let b = match &result.borrow().kind {
                            ValueKind::Boolean(b) => *b,
                            _ => {
                                return Err(RuntimeError::at_node(
                                    "`Op.Eq.eq` must return a Boolean",
                                    tree,
                                    node,
                                ));
                            }
                        };
                        Ok(b)
                    }
                    None => Ok(l.ptr_eq(r)),
                }
            }
        }
    }

    /// Store `value` into the location named by the `target` AST.
    pub(crate) fn assign(
        &mut self,
        tree: &Rc<ParseTree>,
        target: NodeId,
        value: Value,
        frame: &Frame,
    ) -> Result<(), RuntimeError> {
        match tree.ast.kind(target) {
            NodeKind::Expression { value: Some(inner), .. } => {
                self.assign(tree, *inner, value, frame)
            }
            NodeKind::Name { name } => match frame.vars().set(name, value) {
                SetOutcome::Set => Ok(()),
                SetOutcome::Locked => Err(RuntimeError::at_node(
                    format!("Cannot assign to `{name}`"),
                    tree,
                    target,
                )),
                SetOutcome::Missing => Err(RuntimeError::at_node(
                    "No such variable exists in this scope",
                    tree,
                    target,
                )),
            },
            NodeKind::AccessDot { target: recv, prop } => {
                let flow = self.assign_receiver(tree, *recv, frame);
                let receiver = self.expect_value(tree, target, flow)?.deref();
                let assignable = !matches!(
                    &receiver.borrow().kind,
                    ValueKind::Null | ValueKind::Class(_) | ValueKind::Trait(_)
                );
                if !assignable {
                    return Err(RuntimeError::at_node(
                        format!("Cannot set a property on `{}`", receiver.type_name()),
                        tree,
                        target,
                    ));
                }
                receiver.set_prop(prop.clone(), value);
                Ok(())
            }
            // `*ref = v` replaces the referenced cell in place; every
            // alias observes the new contents.
            NodeKind::Prefix { op, value: inner } if op == "*" => {
                let flow = self.eval_lvalue(tree, *inner, frame);
                let r = self.expect_value(tree, target, flow)?;
                let cell = match &r.borrow().kind {
                    ValueKind::Ref(t) => t.clone(),
                    _ => {
                        return Err(RuntimeError::at_node(
                            "Cannot dereference a non-reference value",
                            tree,
                            target,
                        ));
                    }
                };
                cell.replace_with(&value);
                Ok(())
            }
            _ => Err(RuntimeError::at_node("Invalid assignment target", tree, target)),
        }
    }

    pub(crate) fn exec_prefix(&mut self, tree: &Rc<ParseTree>, node: NodeId, frame: &Frame) -> Exec {
        let NodeKind::Prefix { op, value } = tree.ast.kind(node) else {
            unreachable!("exec_prefix on non-prefix node");
        };
        let target = *value;
        match op.as_str() {
            // Reference capture: the operand's storage cell, not a copy.
            "&" => {
                let cell = val!(self.eval_lvalue(tree, target, frame));
                Ok(Flow::Value(Value::reference(cell)))
            }
            "*" => {
                let v = val!(self.eval(tree, target, frame));
                let inner = match &v.borrow().kind {
                    ValueKind::Ref(t) => t.clone(),
                    _ => {
                        return Err(RuntimeError::at_node(
                            "Cannot dereference a non-reference value",
                            tree,
                            node,
                        ));
                    }
                };
                Ok(Flow::Value(inner))
            }
            "++" | "--" => {
                let op = op.clone();
                self.exec_incdec(tree, node, target, &op, frame, true)
            }
            "-" => {
                let v = val!(self.eval(tree, target, frame));
                let neg = self.builtins.op_neg.clone();
                self.unary_op(tree, node, "-", &neg, "neg", v)
            }
            "~" => {
                let v = val!(self.eval(tree, target, frame));
                let bnot = self.builtins.op_bit_not.clone();
                self.unary_op(tree, node, "~", &bnot, "bnot", v)
            }
            "!" => {
                let v = val!(self.eval(tree, target, frame));
                Ok(Flow::Value(Value::boolean(!v.truthy())))
            }
            "+" => {
                let v = val!(self.eval(tree, target, frame));
                if v.as_number().is_some() {
                    Ok(Flow::Value(v))
                } else {
                    Err(RuntimeError::at_node(
                        format!("Unsupported operation `+` on `{}`", v.type_name()),
                        tree,
                        node,
                    ))
                }
            }
            "..." => Err(RuntimeError::at_node("`...` is not supported here", tree, node)),
            _ => Err(RuntimeError::at_node(
                format!("Unsupported operation `{op}`"),
                tree,
                node,
            )),
        }
    }

    pub(crate) fn exec_postfix(&mut self, tree: &Rc<ParseTree>, node: NodeId, frame: &Frame) -> Exec {
        let NodeKind::Postfix { op, value } = tree.ast.kind(node) else {
            unreachable!("exec_postfix on non-postfix node");
        };
        let target = *value;
        match op.as_str() {
            "++" | "--" => {
                let op = op.clone();
                self.exec_incdec(tree, node, target, &op, frame, false)
            }
            _ => Err(RuntimeError::at_node(
                format!("Unsupported operation `{op}`"),
                tree,
                node,
            )),
        }
    }

    /// `++`/`--`: fetch the current value, run `Op.Inc`/`Op.Dec`, store
    /// the result back. Prefix forms produce the new value, postfix the
    /// old one.
    fn exec_incdec(
        &mut self,
        tree: &Rc<ParseTree>,
        node: NodeId,
        target: NodeId,
        op: &str,
        frame: &Frame,
        prefix: bool,
    ) -> Exec {
        let old = val!(self.eval_lvalue(tree, target, frame));
        let (trait_value, method) = if op == "++" {
            (self.builtins.op_inc.clone(), "inc")
        } else {
            (self.builtins.op_dec.clone(), "dec")
        };
        let Some(m) = self.trait_method(&old, &trait_value, method) else {
            return Err(RuntimeError::at_node(
                format!("Unsupported operation `{op}` on `{}`", old.type_name()),
                tree,
                node,
            ));
        };
        let new = self.call_value(tree, node, m, Vec::new())?;
        self.assign(tree, target, new.clone(), frame)?;
        Ok(Flow::Value(if prefix { new } else { old }))
    }

    fn unary_op(
        &mut self,
        tree: &Rc<ParseTree>,
        node: NodeId,
        op: &str,
        trait_value: &Value,
        method: &str,
        value: Value,
    ) -> Exec {
        match self.trait_method(&value, trait_value, method) {
            Some(m) => Ok(Flow::Value(self.call_value(tree, node, m, Vec::new())?)),
            None => Err(RuntimeError::at_node(
                format!("Unsupported operation `{op}` on `{}`", value.type_name()),
                tree,
                node,
            )),
        }
    }

    // ── Display ────────────────────────────────────────────────────────

    /// Render a value the way `print` shows it. `allow_tostring` lets
    /// instances answer through their `ToString` impl; `repr` quotes
    /// strings (used inside arrays).
    pub(crate) fn display_value(
        &mut self,
        tree: &Rc<ParseTree>,
        node: NodeId,
        value: &Value,
        allow_tostring: bool,
        repr: bool,
    ) -> Result<String, RuntimeError> {
        enum Shape {
            Done(String),
            Items(Vec<Value>),
            Target(Value),
            Object(Value),
        }
        let shape = match &value.borrow().kind {
            ValueKind::Null => Shape::Done("null".to_string()),
            ValueKind::Boolean(b) => Shape::Done(b.to_string()),
            ValueKind::Number(n) => Shape::Done(format_number(*n)),
            ValueKind::Str(s) => {
                Shape::Done(if repr { format!("{s:?}") } else { s.clone() })
            }
            ValueKind::Array(items) => Shape::Items(items.clone()),
            ValueKind::Class(def) => Shape::Done(format!("<class {}>", def.name)),
            ValueKind::Trait(_) => Shape::Done("<trait>".to_string()),
            ValueKind::Function { .. } => Shape::Done("<fn>".to_string()),
            ValueKind::Module { .. } => Shape::Done("<module>".to_string()),
            ValueKind::Decorator { .. } => Shape::Done("<decorator>".to_string()),
            ValueKind::Ref(target) => Shape::Target(target.clone()),
            ValueKind::Instance { class } => Shape::Object(class.clone()),
        };
        match shape {
            Shape::Done(s) => Ok(s),
            Shape::Target(target) => {
                self.display_value(tree, node, &target, allow_tostring, repr)
            }
            Shape::Items(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in &items {
                    parts.push(self.display_value(tree, node, item, allow_tostring, true)?);
                }
                Ok(format!("[{}]", parts.join(", ")))
            }
            Shape::Object(class) => {
                if allow_tostring {
                    let to_string = self.builtins.to_string.clone();
                    if let Some(m) = self.trait_method(value, &to_string, "toString") {
                        let result = self.call_value(tree, node, m, Vec::new())?;
                        if let Some(s) = result.as_string() {
                            return Ok(s);
                        }
                    }
                }
                let name = match &class.borrow().kind {
                    ValueKind::Class(def) => def.name.clone(),
                    _ => "instance".to_string(),
                };
                Ok(format!("<{name} instance>"))
            }
        }
    }

    // ── Small plumbing used by `assign` ────────────────────────────────

    fn assign_receiver(
        &mut self,
        tree: &Rc<ParseTree>,
        target: Option<NodeId>,
        frame: &Frame,
    ) -> Exec {
        match target {
            Some(node) => self.eval_lvalue(tree, node, frame),
            None => Ok(Flow::Value(
                frame.vars().get("self").unwrap_or_else(Value::null),
            )),
        }
    }

    fn expect_value(
        &self,
        tree: &Rc<ParseTree>,
        node: NodeId,
        flow: Exec,
    ) -> Result<Value, RuntimeError> {
        match flow? {
            Flow::Value(v) => Ok(v),
            _ => Err(RuntimeError::at_node(
                "Illegal control flow in assignment target",
                tree,
                node,
            )),
        }
    }
}

/// Numbers with an integral value print without a fractional part.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::format_number;

    #[test]
    fn integral_numbers_drop_the_fraction() {
        assert_eq!(format_number(7.0), "7");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn fractional_numbers_keep_it() {
        assert_eq!(format_number(2.5), "2.5");
    }
}
