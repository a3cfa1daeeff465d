//! Indented AST dump for the `--ast` CLI flag.

use std::fmt::Write;

use crate::ast::{EnumMemberForm, NodeId, NodeKind};
use crate::ParseTree;

/// Render the whole tree as an indented outline, one node per line with
/// its salient fields inline and child nodes nested below.
pub fn dump(tree: &ParseTree) -> String {
    let mut out = String::new();
    write_node(tree, tree.root, 0, None, &mut out);
    out
}

fn write_node(tree: &ParseTree, id: NodeId, depth: usize, field: Option<&str>, out: &mut String) {
    let indent = "    ".repeat(depth);
    let prefix = match field {
        Some(name) => format!("{name}: "),
        None => String::new(),
    };
    let kind = tree.ast.kind(id);
    let _ = write!(out, "{indent}{prefix}{}", kind.name());

    match kind {
        NodeKind::Name { name } => {
            let _ = writeln!(out, " `{name}`");
        }
        NodeKind::Number { value } => {
            let _ = writeln!(out, " {value}");
        }
        NodeKind::Str { value } => {
            let _ = writeln!(out, " {value:?}");
        }
        NodeKind::AccessDot { target, prop }
        | NodeKind::AccessColon { target, prop }
        | NodeKind::AccessColonColon { target, prop } => {
            let _ = writeln!(out, " `{prop}`");
            if let Some(target) = target {
                write_node(tree, *target, depth + 1, Some("target"), out);
            }
        }
        NodeKind::Call { callee, args } => {
            let _ = writeln!(out);
            write_node(tree, *callee, depth + 1, Some("callee"), out);
            for arg in args {
                write_node(tree, *arg, depth + 1, None, out);
            }
        }
        NodeKind::Index { target, indexes, sep } => {
            match sep {
                Some(sep) => {
                    let _ = writeln!(out, " sep=`{sep}`");
                }
                None => {
                    let _ = writeln!(out);
                }
            }
            write_node(tree, *target, depth + 1, Some("target"), out);
            for index in indexes {
                write_node(tree, *index, depth + 1, None, out);
            }
        }
        NodeKind::Prefix { op, value } | NodeKind::Postfix { op, value } => {
            let _ = writeln!(out, " `{op}`");
            write_node(tree, *value, depth + 1, None, out);
        }
        NodeKind::Binary { op, left, right } => {
            let _ = writeln!(out, " `{op}`");
            write_node(tree, *left, depth + 1, None, out);
            write_node(tree, *right, depth + 1, None, out);
        }
        NodeKind::Cast { value, ty } => {
            let _ = writeln!(out);
            write_node(tree, *value, depth + 1, Some("value"), out);
            write_node(tree, *ty, depth + 1, Some("type"), out);
        }
        NodeKind::Array { items } => {
            let _ = writeln!(out);
            for item in items {
                write_node(tree, *item, depth + 1, None, out);
            }
        }
        NodeKind::TypeGeneric { target, args } => {
            let _ = writeln!(out);
            write_node(tree, *target, depth + 1, Some("target"), out);
            for arg in args {
                write_node(tree, *arg, depth + 1, None, out);
            }
        }
        NodeKind::Constructor { target, body } => {
            let _ = writeln!(out);
            write_node(tree, *target, depth + 1, Some("struct"), out);
            if let Some(body) = body {
                write_node(tree, *body, depth + 1, Some("body"), out);
            }
        }
        NodeKind::Expression { value, is_type } => {
            let _ = writeln!(out, "{}", if *is_type { " (type)" } else { "" });
            if let Some(value) = value {
                write_node(tree, *value, depth + 1, None, out);
            }
        }
        NodeKind::RefExpression { value, body, name, take_ref, take_result } => {
            let mut flags = Vec::new();
            if let Some(name) = name {
                flags.push(format!("name=`{name}`"));
            }
            if *take_ref {
                flags.push("ref".to_string());
            }
            if *take_result {
                flags.push("take-result".to_string());
            }
            let _ = writeln!(out, " {}", flags.join(" "));
            write_node(tree, *value, depth + 1, Some("value"), out);
            if let Some(body) = body {
                write_node(tree, *body, depth + 1, Some("body"), out);
            }
        }
        NodeKind::Block { children } => {
            let _ = writeln!(out);
            for child in children {
                write_node(tree, *child, depth + 1, None, out);
            }
        }
        NodeKind::Let { name, ty, init, modifiers, decorators } => {
            let mut mods = String::new();
            if modifiers.is_const {
                mods.push_str(" const");
            }
            if modifiers.is_mut {
                mods.push_str(" mut");
            }
            let _ = writeln!(out, "{mods} `{name}`");
            for dec in decorators {
                write_node(tree, *dec, depth + 1, Some("decorator"), out);
            }
            if let Some(ty) = ty {
                write_node(tree, *ty, depth + 1, Some("type"), out);
            }
            if let Some(init) = init {
                write_node(tree, *init, depth + 1, None, out);
            }
        }
        NodeKind::Return { value } | NodeKind::Break { value } | NodeKind::Continue { value } => {
            let _ = writeln!(out);
            if let Some(value) = value {
                write_node(tree, *value, depth + 1, None, out);
            }
        }
        NodeKind::If { condition, then_branch, else_branch } => {
            let _ = writeln!(out);
            write_node(tree, *condition, depth + 1, Some("condition"), out);
            write_node(tree, *then_branch, depth + 1, Some("then"), out);
            if let Some(else_branch) = else_branch {
                write_node(tree, *else_branch, depth + 1, Some("else"), out);
            }
        }
        NodeKind::While { condition, body } => {
            let _ = writeln!(out);
            write_node(tree, *condition, depth + 1, Some("condition"), out);
            write_node(tree, *body, depth + 1, Some("body"), out);
        }
        NodeKind::For { item, index, iterable, body } => {
            match index {
                Some(index) => {
                    let _ = writeln!(out, " `{item}`, `{index}`");
                }
                None => {
                    let _ = writeln!(out, " `{item}`");
                }
            }
            write_node(tree, *iterable, depth + 1, Some("in"), out);
            write_node(tree, *body, depth + 1, Some("body"), out);
        }
        NodeKind::Function { name, params, return_ty, body, decorators } => {
            match name {
                Some(name) => {
                    let _ = writeln!(out, " `{name}`");
                }
                None => {
                    let _ = writeln!(out, " (anonymous)");
                }
            }
            for dec in decorators {
                write_node(tree, *dec, depth + 1, Some("decorator"), out);
            }
            for param in params {
                let indent = "    ".repeat(depth + 1);
                let _ = writeln!(out, "{indent}param `{}`", param.name);
                if let Some(ty) = param.ty {
                    write_node(tree, ty, depth + 2, Some("type"), out);
                }
                if let Some(default) = param.default {
                    write_node(tree, default, depth + 2, Some("default"), out);
                }
            }
            if let Some(return_ty) = return_ty {
                write_node(tree, *return_ty, depth + 1, Some("returns"), out);
            }
            if let Some(body) = body {
                write_node(tree, *body, depth + 1, Some("body"), out);
            }
        }
        NodeKind::Struct { name, body } => {
            match name {
                Some(name) => {
                    let _ = writeln!(out, " `{name}`");
                }
                None => {
                    let _ = writeln!(out, " (anonymous)");
                }
            }
            if let Some(body) = body {
                write_node(tree, *body, depth + 1, Some("body"), out);
            }
        }
        NodeKind::Enum { name, c_repr, members } => {
            let tag = if *c_repr { " \"C\"" } else { "" };
            match name {
                Some(name) => {
                    let _ = writeln!(out, "{tag} `{name}`");
                }
                None => {
                    let _ = writeln!(out, "{tag} (anonymous)");
                }
            }
            for member in members {
                write_node(tree, *member, depth + 1, None, out);
            }
        }
        NodeKind::EnumMember { name, form } => match form {
            EnumMemberForm::Unit => {
                let _ = writeln!(out, " `{name}`");
            }
            EnumMemberForm::Tuple(items) => {
                let _ = writeln!(out, " `{name}` (tuple)");
                for item in items {
                    write_node(tree, *item, depth + 1, None, out);
                }
            }
            EnumMemberForm::Struct(fields) => {
                let _ = writeln!(out, " `{name}` (struct)");
                for (field, ty) in fields {
                    write_node(tree, *ty, depth + 1, Some(field), out);
                }
            }
        },
        NodeKind::StructProp { name, value } => {
            let _ = writeln!(out, " `{name}`");
            write_node(tree, *value, depth + 1, None, out);
        }
        NodeKind::Import { names } => {
            let _ = writeln!(out, " {}", names.join(", "));
        }
        NodeKind::Decorator { name, args } => {
            let _ = writeln!(out, " `{name}`");
            for arg in args {
                write_node(tree, *arg, depth + 1, None, out);
            }
        }
    }
}
