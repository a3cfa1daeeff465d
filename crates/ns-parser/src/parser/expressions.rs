//! The expression feeder and its helpers.
//!
//! Expressions collect into a flat buffer of operator tokens and finished
//! sub-nodes. Nothing is shaped while tokens arrive; when one of the
//! expression's close tokens shows up, a fixed pass over the buffer folds
//! operators into nodes, tightest precedence level first. Within a level
//! operators resolve left to right, except the assignment level which
//! resolves from the right so `a = b = c` nests as `a = (b = c)`.

use ns_common::token::{Token, TokenKind};

use crate::ast::{NodeId, NodeKind};
use crate::error::ParseError;

use super::statements::{
    BlockFeeder, BlockRole, ConstructorFeeder, EnumFeeder, FunctionFeeder, IfFeeder, StructFeeder,
};
use super::{is_ident, Feeder, ParseCtx, Step};

/// How an operator combines with its neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Prefix,
    Binary,
    Postfix,
}

use OpKind::{Binary, Postfix, Prefix};

/// The precedence table, tightest level first.
const PRECEDENCE: &[&[(&str, OpKind)]] = &[
    &[("++", Postfix), ("--", Postfix), ("*", Postfix)],
    &[
        ("++", Prefix),
        ("--", Prefix),
        ("&", Prefix),
        ("*", Prefix),
        ("+", Prefix),
        ("-", Prefix),
        ("!", Prefix),
        ("~", Prefix),
    ],
    &[("*", Binary), ("/", Binary), ("%", Binary)],
    &[("+", Binary), ("-", Binary)],
    &[(">>", Binary), ("<<", Binary)],
    &[("==", Binary), ("!=", Binary)],
    &[(">", Binary), (">=", Binary), ("<=", Binary), ("<", Binary)],
    &[("&", Binary)],
    &[("^", Binary)],
    &[("|", Binary)],
    &[("&&", Binary)],
    &[("||", Binary)],
    &[
        ("=", Binary),
        ("+=", Binary),
        ("-=", Binary),
        ("*=", Binary),
        ("/=", Binary),
        ("%=", Binary),
        ("^=", Binary),
        ("&=", Binary),
        ("|=", Binary),
        ("&&=", Binary),
        ("||=", Binary),
        (">>=", Binary),
        ("<<=", Binary),
    ],
    &[("...", Prefix)],
];

/// Index of the assignment level, the one level that is right-associative.
const ASSIGN_LEVEL: usize = 12;

/// Whether a token is an operator the expression buffer accepts verbatim.
fn is_operator(text: &str) -> bool {
    PRECEDENCE.iter().any(|level| level.iter().any(|(op, _)| *op == text))
}

/// One element of the expression buffer.
enum Elem {
    /// An unresolved operator token.
    Op { token: u32, text: String },
    /// A finished sub-node.
    Node(NodeId),
}

impl Elem {
    fn as_node(&self) -> Option<NodeId> {
        match self {
            Elem::Node(id) => Some(*id),
            Elem::Op { .. } => None,
        }
    }

    fn is_op(&self) -> bool {
        matches!(self, Elem::Op { .. })
    }
}

/// Configuration for spawning an expression feeder.
///
/// `close` lists the token texts that terminate the expression.
/// `handle_parent` re-feeds the closing token to whoever is above, so a
/// parent construct can react to it. `finish_enclose` pops the enclosure
/// stack at close (used when the expression owns a surrounding bracket).
pub(crate) struct ExprSpec {
    close: Vec<String>,
    handle_parent: bool,
    allow_empty: bool,
    finish_enclose: bool,
    is_type: bool,
}

impl ExprSpec {
    pub fn close(tokens: &[&str]) -> Self {
        Self::close_owned(tokens.iter().map(|t| t.to_string()).collect())
    }

    pub fn close_owned(close: Vec<String>) -> Self {
        Self {
            close,
            handle_parent: false,
            allow_empty: false,
            finish_enclose: false,
            is_type: false,
        }
    }

    pub fn handle_parent(mut self) -> Self {
        self.handle_parent = true;
        self
    }

    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    pub fn finish_enclose(mut self) -> Self {
        self.finish_enclose = true;
        self
    }

    pub fn type_context(mut self) -> Self {
        self.is_type = true;
        self
    }

    /// Allocate the wrapper node and build the feeder.
    pub fn spawn(
        self,
        ctx: &mut ParseCtx,
        parent: NodeId,
        token: u32,
    ) -> (NodeId, Box<ExpressionFeeder>) {
        let node = ctx.ast.alloc(
            NodeKind::Expression { value: None, is_type: self.is_type },
            token,
            Some(parent),
        );
        (
            node,
            Box::new(ExpressionFeeder {
                node,
                close: self.close,
                handle_parent: self.handle_parent,
                allow_empty: self.allow_empty,
                finish_enclose: self.finish_enclose,
                is_type: self.is_type,
                buffer: Vec::new(),
            }),
        )
    }
}

pub(crate) struct ExpressionFeeder {
    node: NodeId,
    close: Vec<String>,
    handle_parent: bool,
    allow_empty: bool,
    finish_enclose: bool,
    is_type: bool,
    buffer: Vec<Elem>,
}

impl ExpressionFeeder {
    fn push_node(&mut self, id: NodeId) {
        self.buffer.push(Elem::Node(id));
    }

    /// Fold the buffer into a single node (or nothing, when empty is
    /// allowed) and finish the wrapper.
    fn close_expression(
        &mut self,
        token: &Token,
        ctx: &mut ParseCtx,
    ) -> Result<Step, ParseError> {
        if let Some(Elem::Op { token: op_tok, text }) = self.buffer.last() {
            if matches!(text.as_str(), "." | ":" | "::") {
                let at = ctx.tokens.tokens[*op_tok as usize].clone();
                return Err(ParseError::from_token(
                    format!("Unexpected end of expression after `{text}`"),
                    &at,
                ));
            }
        }
        if !self.allow_empty && self.buffer.is_empty() {
            return Err(ParseError::from_token("Unexpected empty expression", token));
        }
        if self.finish_enclose {
            ctx.close(token)?;
        }

        let buffer = std::mem::take(&mut self.buffer);
        let value = resolve(buffer, self.node, &self.close, ctx)?;
        match ctx.ast.kind_mut(self.node) {
            NodeKind::Expression { value: slot, .. } => *slot = value,
            _ => unreachable!("expression feeder on non-expression node"),
        }
        if self.handle_parent {
            ctx.retreat();
        }
        Ok(Step::Done)
    }
}

impl Feeder for ExpressionFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        // Closing token for this expression?
        if token.kind != TokenKind::Eof && self.close.contains(&token.text) {
            return self.close_expression(token, ctx);
        }

        // A pending `.` / `:` / `::` marker grabs the next identifier.
        if matches!(self.buffer.last(), Some(Elem::Op { text, .. }) if matches!(text.as_str(), "." | ":" | "::"))
        {
            let Some(Elem::Op { token: marker_tok, text: marker }) = self.buffer.pop() else {
                unreachable!("just matched an operator marker");
            };
            if !is_ident(token) {
                return Err(ParseError::from_token(
                    format!("Expected identifier after `{marker}`"),
                    token,
                ));
            }
            let target = match self.buffer.pop() {
                Some(elem) => elem.as_node(),
                None => None,
            };
            let prop = token.text.clone();
            let kind = match marker.as_str() {
                "." => NodeKind::AccessDot { target, prop },
                ":" => NodeKind::AccessColon { target, prop },
                _ => NodeKind::AccessColonColon { target, prop },
            };
            let access = ctx.ast.alloc(kind, marker_tok, Some(self.node));
            if let Some(t) = target {
                ctx.ast.set_parent(t, access);
            }
            self.push_node(access);
            return Ok(Step::Stay);
        }

        match token.text.as_str() {
            "." | ":" | "::" if token.kind == TokenKind::Punct => {
                if self.buffer.last().is_some_and(Elem::is_op) {
                    return Err(ParseError::from_token("Unexpected token", token));
                }
                self.buffer.push(Elem::Op { token: idx, text: token.text.clone() });
                Ok(Step::Stay)
            }
            "(" => {
                if let Some(value) = self.buffer.last().and_then(Elem::as_node) {
                    self.buffer.pop();
                    let call = ctx.ast.alloc(
                        NodeKind::Call { callee: value, args: Vec::new() },
                        idx,
                        Some(self.node),
                    );
                    ctx.ast.set_parent(value, call);
                    self.push_node(call);
                    ctx.open(idx, ")");
                    Ok(Step::Child(CallFeeder::new(call)))
                } else {
                    let (sub, feeder) = {
                        let mut spec =
                            ExprSpec::close(&[")"]).allow_empty().finish_enclose();
                        if self.is_type {
                            spec = spec.type_context();
                        }
                        spec.spawn(ctx, self.node, idx)
                    };
                    self.push_node(sub);
                    ctx.open(idx, ")");
                    Ok(Step::Child(feeder))
                }
            }
            "[" => {
                if let Some(value) = self.buffer.last().and_then(Elem::as_node) {
                    self.buffer.pop();
                    let index = ctx.ast.alloc(
                        NodeKind::Index { target: value, indexes: Vec::new(), sep: None },
                        idx,
                        Some(self.node),
                    );
                    ctx.ast.set_parent(value, index);
                    self.push_node(index);
                    ctx.open(idx, "]");
                    Ok(Step::Child(IndexFeeder::new(index)))
                } else {
                    let array = ctx
                        .ast
                        .alloc(NodeKind::Array { items: Vec::new() }, idx, Some(self.node));
                    self.push_node(array);
                    ctx.open(idx, "]");
                    Ok(Step::Child(ArrayFeeder::new(array)))
                }
            }
            "{" => {
                let is_name = self
                    .buffer
                    .last()
                    .and_then(Elem::as_node)
                    .is_some_and(|id| matches!(ctx.ast.kind(id), NodeKind::Name { .. }));
                if is_name {
                    let Some(Elem::Node(target)) = self.buffer.pop() else { unreachable!() };
                    let ctor = ctx.ast.alloc(
                        NodeKind::Constructor { target, body: None },
                        idx,
                        Some(self.node),
                    );
                    ctx.ast.set_parent(target, ctor);
                    self.push_node(ctor);
                    ctx.retreat();
                    Ok(Step::Child(ConstructorFeeder::new(ctor)))
                } else {
                    let block = BlockFeeder::spawn(
                        ctx,
                        self.node,
                        idx,
                        BlockRole::Normal,
                        false,
                        false,
                    );
                    self.push_node(block.node());
                    ctx.open(idx, "}");
                    Ok(Step::Child(block))
                }
            }
            "<{" => Err(ParseError::from_token("Objects are not supported yet", token)),
            "fn" if is_ident(token) => {
                let child = FunctionFeeder::spawn(ctx, self.node, idx);
                self.push_node(child.node());
                Ok(Step::Child(child))
            }
            "if" if is_ident(token) => {
                let child =
                    IfFeeder::spawn_expression(ctx, self.node, idx, self.close.clone());
                self.push_node(child.node());
                Ok(Step::Child(child))
            }
            "<>" => {
                if let Some(value) = self.buffer.last().and_then(Elem::as_node) {
                    self.buffer.pop();
                    let (ty, feeder) = ExprSpec::close_owned(self.close.clone())
                        .handle_parent()
                        .type_context()
                        .spawn(ctx, self.node, idx);
                    let cast = ctx
                        .ast
                        .alloc(NodeKind::Cast { value, ty }, idx, Some(self.node));
                    ctx.ast.set_parent(value, cast);
                    ctx.ast.set_parent(ty, cast);
                    self.push_node(cast);
                    Ok(Step::Child(feeder))
                } else {
                    Err(ParseError::from_token("Expected expression before type cast", token))
                }
            }
            "<" if self.is_type => {
                if let Some(value) = self.buffer.last().and_then(Elem::as_node) {
                    self.buffer.pop();
                    let generic = ctx.ast.alloc(
                        NodeKind::TypeGeneric { target: value, args: Vec::new() },
                        idx,
                        Some(self.node),
                    );
                    ctx.ast.set_parent(value, generic);
                    self.push_node(generic);
                    ctx.open(idx, ">");
                    Ok(Step::Child(TypeGenericFeeder::new(generic)))
                } else {
                    Err(ParseError::from_token(
                        "Expected expression before generic arguments",
                        token,
                    ))
                }
            }
            "<<" | ">>" if self.is_type => {
                // Nested generics: split `>>` into two `>` and re-read.
                ctx.tokens.split_token(idx as usize);
                ctx.retreat();
                Ok(Step::Stay)
            }
            "=>" | "->" => {
                if let Some(value) = self.buffer.last().and_then(Elem::as_node) {
                    self.buffer.pop();
                    let re = ctx.ast.alloc(
                        NodeKind::RefExpression {
                            value,
                            body: None,
                            name: None,
                            take_ref: false,
                            take_result: token.text == "=>",
                        },
                        idx,
                        Some(self.node),
                    );
                    ctx.ast.set_parent(value, re);
                    self.push_node(re);
                    Ok(Step::Child(RefExpressionFeeder::new(re)))
                } else {
                    Err(ParseError::from_token(
                        "Expected expression before reference expression",
                        token,
                    ))
                }
            }
            _ if is_ident(token) => {
                let child: Box<dyn Feeder> = match token.text.as_str() {
                    "struct" => {
                        let child = StructFeeder::spawn(ctx, self.node, idx, true);
                        self.push_node(child.node());
                        child
                    }
                    "enum" => {
                        let child = EnumFeeder::spawn(ctx, self.node, idx, true);
                        self.push_node(child.node());
                        child
                    }
                    _ => {
                        let name = ctx.ast.alloc(
                            NodeKind::Name { name: token.text.clone() },
                            idx,
                            Some(self.node),
                        );
                        self.push_node(name);
                        return Ok(Step::Stay);
                    }
                };
                Ok(Step::Child(child))
            }
            _ if token.kind == TokenKind::Number => {
                let value: f64 = token.text.parse().expect("number lexemes are all digits");
                let num = ctx
                    .ast
                    .alloc(NodeKind::Number { value }, idx, Some(self.node));
                self.push_node(num);
                Ok(Step::Stay)
            }
            _ if token.kind == TokenKind::Str => {
                let s = ctx.ast.alloc(
                    NodeKind::Str { value: token.str_body().to_string() },
                    idx,
                    Some(self.node),
                );
                self.push_node(s);
                Ok(Step::Stay)
            }
            _ if token.kind == TokenKind::Punct && is_operator(&token.text) => {
                self.buffer.push(Elem::Op { token: idx, text: token.text.clone() });
                Ok(Step::Stay)
            }
            _ if token.kind == TokenKind::Eof => {
                Err(ParseError::from_token("Unexpected EOF", token))
            }
            _ => Err(ParseError::from_token("Unexpected token", token)),
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "Expression"
    }
}

// ── Operator resolution ────────────────────────────────────────────────

/// Fold the mixed buffer into at most one node.
fn resolve(
    mut buffer: Vec<Elem>,
    expr: NodeId,
    close: &[String],
    ctx: &mut ParseCtx,
) -> Result<Option<NodeId>, ParseError> {
    for (li, level) in PRECEDENCE.iter().enumerate() {
        if li == ASSIGN_LEVEL {
            // Right-associative: scan from the right and restart there
            // after every reduction.
            let mut i = buffer.len();
            while i > 0 {
                i -= 1;
                if combine_at(&mut buffer, i, level, expr, ctx) {
                    i = buffer.len();
                }
            }
        } else {
            let mut i = 0;
            while i < buffer.len() {
                if combine_at(&mut buffer, i, level, expr, ctx) {
                    i = 0;
                    continue;
                }
                i += 1;
            }
        }
    }

    // Anything still an operator never found its operands.
    for elem in &buffer {
        if let Elem::Op { token, .. } = elem {
            let tok = ctx.tokens.tokens[*token as usize].clone();
            return Err(ParseError::from_token("Unexpected token", &tok));
        }
    }
    if buffer.len() > 1 {
        let quoted: Vec<String> = close.iter().map(|c| format!("'{c}'")).collect();
        let hint = match quoted.as_slice() {
            [one] => format!("a {one}"),
            many => format!(
                "either {} or {}",
                many[..many.len() - 1].join(", "),
                many[many.len() - 1]
            ),
        };
        let msg = format!("Malformed expression, perhaps you forgot {hint}?");
        let tok = match &buffer[1] {
            Elem::Op { token, .. } => ctx.tokens.tokens[*token as usize].clone(),
            Elem::Node(id) => {
                ctx.tokens.tokens[ctx.ast.node(*id).token as usize].clone()
            }
        };
        return Err(ParseError::from_token(msg, &tok));
    }
    Ok(buffer.pop().and_then(|e| e.as_node()))
}

/// Try to fold the operator at `i` with its neighbors. Returns whether a
/// reduction happened.
fn combine_at(
    buffer: &mut Vec<Elem>,
    i: usize,
    level: &[(&str, OpKind)],
    expr: NodeId,
    ctx: &mut ParseCtx,
) -> bool {
    let Elem::Op { token, text } = &buffer[i] else { return false };
    let Some((_, kind)) = level.iter().find(|(op, _)| *op == text.as_str()) else {
        return false;
    };
    let token = *token;
    let len = buffer.len();

    match kind {
        OpKind::Prefix => {
            let operand_follows = i + 1 < len && !buffer[i + 1].is_op();
            let starts_run = i == 0 || buffer[i - 1].is_op();
            if !(starts_run && operand_follows) {
                return false;
            }
            let Elem::Op { text, .. } = buffer.remove(i) else { unreachable!() };
            let Elem::Node(value) = buffer.remove(i) else { unreachable!() };
            let id = ctx
                .ast
                .alloc(NodeKind::Prefix { op: text, value }, token, Some(expr));
            ctx.ast.set_parent(value, id);
            buffer.insert(i, Elem::Node(id));
            true
        }
        OpKind::Binary => {
            if !(i > 0 && i + 1 < len && !buffer[i - 1].is_op() && !buffer[i + 1].is_op()) {
                return false;
            }
            let Elem::Node(left) = buffer.remove(i - 1) else { unreachable!() };
            let Elem::Op { text, .. } = buffer.remove(i - 1) else { unreachable!() };
            let Elem::Node(right) = buffer.remove(i - 1) else { unreachable!() };
            let id = ctx.ast.alloc(
                NodeKind::Binary { op: text, left, right },
                token,
                Some(expr),
            );
            ctx.ast.set_parent(left, id);
            ctx.ast.set_parent(right, id);
            buffer.insert(i - 1, Elem::Node(id));
            true
        }
        OpKind::Postfix => {
            let operand_precedes = i > 0 && !buffer[i - 1].is_op();
            let ends_run = i == len - 1 || buffer[i + 1].is_op();
            if !(ends_run && operand_precedes) {
                return false;
            }
            let Elem::Node(value) = buffer.remove(i - 1) else { unreachable!() };
            let Elem::Op { text, .. } = buffer.remove(i - 1) else { unreachable!() };
            let id = ctx
                .ast
                .alloc(NodeKind::Postfix { op: text, value }, token, Some(expr));
            ctx.ast.set_parent(value, id);
            buffer.insert(i - 1, Elem::Node(id));
            true
        }
    }
}

// ── Call arguments ─────────────────────────────────────────────────────

pub(crate) struct CallFeeder {
    node: NodeId,
    args: Vec<NodeId>,
    cur: Option<NodeId>,
}

impl CallFeeder {
    pub fn new(node: NodeId) -> Box<CallFeeder> {
        Box::new(CallFeeder { node, args: Vec::new(), cur: None })
    }
}

impl Feeder for CallFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        if token.kind == TokenKind::Eof {
            return Err(ParseError::from_token("Unexpected EOF", token));
        }
        match token.text.as_str() {
            ")" => {
                if let Some(arg) = self.cur.take() {
                    self.args.push(arg);
                }
                ctx.close(token)?;
                match ctx.ast.kind_mut(self.node) {
                    NodeKind::Call { args, .. } => *args = std::mem::take(&mut self.args),
                    _ => unreachable!("call feeder on non-call node"),
                }
                Ok(Step::Done)
            }
            "," => {
                // Empty arguments are allowed and parse as empty
                // expressions.
                let arg = self.cur.take().unwrap_or_else(|| {
                    ctx.ast.alloc(
                        NodeKind::Expression { value: None, is_type: false },
                        idx,
                        Some(self.node),
                    )
                });
                self.args.push(arg);
                Ok(Step::Stay)
            }
            _ => {
                let (expr, feeder) = ExprSpec::close(&[",", ")"])
                    .handle_parent()
                    .allow_empty()
                    .spawn(ctx, self.node, idx);
                self.cur = Some(expr);
                ctx.retreat();
                Ok(Step::Child(feeder))
            }
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "Call"
    }
}

// ── Index ──────────────────────────────────────────────────────────────

pub(crate) struct IndexFeeder {
    node: NodeId,
    indexes: Vec<NodeId>,
    cur: Option<NodeId>,
    sep: Option<char>,
}

impl IndexFeeder {
    pub fn new(node: NodeId) -> Box<IndexFeeder> {
        Box::new(IndexFeeder { node, indexes: Vec::new(), cur: None, sep: None })
    }

    fn sub_close(&self) -> Vec<String> {
        match self.sep {
            Some(sep) => vec![sep.to_string(), "]".to_string()],
            None => vec![",".to_string(), ":".to_string(), "]".to_string()],
        }
    }
}

impl Feeder for IndexFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        if token.kind == TokenKind::Eof {
            return Err(ParseError::from_token("Unexpected EOF", token));
        }
        match token.text.as_str() {
            "]" => {
                if let Some(i) = self.cur.take() {
                    self.indexes.push(i);
                }
                ctx.close(token)?;
                match ctx.ast.kind_mut(self.node) {
                    NodeKind::Index { indexes, sep, .. } => {
                        *indexes = std::mem::take(&mut self.indexes);
                        *sep = self.sep;
                    }
                    _ => unreachable!("index feeder on non-index node"),
                }
                Ok(Step::Done)
            }
            // The first separator observed becomes the only accepted one.
            "," | ":" if token.kind == TokenKind::Punct => {
                let sep_char = token.text.chars().next().expect("separator is one char");
                let sep = *self.sep.get_or_insert(sep_char);
                if sep != sep_char {
                    return Err(ParseError::from_token("Unexpected token", token));
                }
                let item = self.cur.take().unwrap_or_else(|| {
                    ctx.ast.alloc(
                        NodeKind::Expression { value: None, is_type: false },
                        idx,
                        Some(self.node),
                    )
                });
                self.indexes.push(item);
                Ok(Step::Stay)
            }
            _ => {
                let (expr, feeder) = ExprSpec::close_owned(self.sub_close())
                    .handle_parent()
                    .allow_empty()
                    .spawn(ctx, self.node, idx);
                self.cur = Some(expr);
                ctx.retreat();
                Ok(Step::Child(feeder))
            }
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "Index"
    }
}

// ── Array literal ──────────────────────────────────────────────────────

pub(crate) struct ArrayFeeder {
    node: NodeId,
    items: Vec<NodeId>,
    cur: Option<NodeId>,
}

impl ArrayFeeder {
    pub fn new(node: NodeId) -> Box<ArrayFeeder> {
        Box::new(ArrayFeeder { node, items: Vec::new(), cur: None })
    }
}

impl Feeder for ArrayFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        if token.kind == TokenKind::Eof {
            return Err(ParseError::from_token("Unexpected EOF", token));
        }
        match token.text.as_str() {
            "]" => {
                if let Some(item) = self.cur.take() {
                    self.items.push(item);
                }
                ctx.close(token)?;
                match ctx.ast.kind_mut(self.node) {
                    NodeKind::Array { items } => *items = std::mem::take(&mut self.items),
                    _ => unreachable!("array feeder on non-array node"),
                }
                Ok(Step::Done)
            }
            "," => {
                let item = self.cur.take().unwrap_or_else(|| {
                    ctx.ast.alloc(
                        NodeKind::Expression { value: None, is_type: false },
                        idx,
                        Some(self.node),
                    )
                });
                self.items.push(item);
                Ok(Step::Stay)
            }
            _ => {
                let (expr, feeder) = ExprSpec::close(&[",", "]"])
                    .handle_parent()
                    .allow_empty()
                    .spawn(ctx, self.node, idx);
                self.cur = Some(expr);
                ctx.retreat();
                Ok(Step::Child(feeder))
            }
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "Array"
    }
}

// ── Generic type arguments ─────────────────────────────────────────────

pub(crate) struct TypeGenericFeeder {
    node: NodeId,
    args: Vec<NodeId>,
    cur: Option<NodeId>,
}

impl TypeGenericFeeder {
    pub fn new(node: NodeId) -> Box<TypeGenericFeeder> {
        Box::new(TypeGenericFeeder { node, args: Vec::new(), cur: None })
    }
}

impl Feeder for TypeGenericFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        if token.kind == TokenKind::Eof {
            return Err(ParseError::from_token("Unexpected EOF", token));
        }
        match token.text.as_str() {
            ">" => {
                if let Some(arg) = self.cur.take() {
                    self.args.push(arg);
                }
                ctx.close(token)?;
                match ctx.ast.kind_mut(self.node) {
                    NodeKind::TypeGeneric { args, .. } => {
                        *args = std::mem::take(&mut self.args)
                    }
                    _ => unreachable!("generic feeder on non-generic node"),
                }
                Ok(Step::Done)
            }
            "," => {
                let arg = self.cur.take().unwrap_or_else(|| {
                    ctx.ast.alloc(
                        NodeKind::Expression { value: None, is_type: true },
                        idx,
                        Some(self.node),
                    )
                });
                self.args.push(arg);
                Ok(Step::Stay)
            }
            _ => {
                let (expr, feeder) = ExprSpec::close(&[",", ">"])
                    .handle_parent()
                    .allow_empty()
                    .type_context()
                    .spawn(ctx, self.node, idx);
                self.cur = Some(expr);
                ctx.retreat();
                Ok(Step::Child(feeder))
            }
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "TypeGeneric"
    }
}

// ── Reference expression ───────────────────────────────────────────────

pub(crate) struct RefExpressionFeeder {
    node: NodeId,
    name: Option<String>,
    take_ref: bool,
    body: Option<NodeId>,
}

impl RefExpressionFeeder {
    pub fn new(node: NodeId) -> Box<RefExpressionFeeder> {
        Box::new(RefExpressionFeeder { node, name: None, take_ref: false, body: None })
    }

    fn finish(&mut self, ctx: &mut ParseCtx) {
        match ctx.ast.kind_mut(self.node) {
            NodeKind::RefExpression { body, name, take_ref, .. } => {
                *body = self.body;
                *name = self.name.take();
                *take_ref = self.take_ref;
            }
            _ => unreachable!("ref-expression feeder on wrong node"),
        }
    }
}

impl Feeder for RefExpressionFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        if self.body.is_some() {
            // The body hands back its closing `)` / `}`.
            if token.text != ")" && token.text != "}" {
                return Err(ParseError::from_token("Unexpected token", token));
            }
            self.finish(ctx);
            return Ok(Step::Done);
        }
        match token.text.as_str() {
            "(" => {
                let (expr, feeder) = ExprSpec::close(&[")"])
                    .handle_parent()
                    .finish_enclose()
                    .spawn(ctx, self.node, idx);
                self.body = Some(expr);
                ctx.open(idx, ")");
                Ok(Step::Child(feeder))
            }
            "{" => {
                let block =
                    BlockFeeder::spawn(ctx, self.node, idx, BlockRole::Normal, true, false);
                self.body = Some(block.node());
                ctx.open(idx, "}");
                Ok(Step::Child(block))
            }
            "&" if self.name.is_none() && !self.take_ref => {
                self.take_ref = true;
                Ok(Step::Stay)
            }
            _ if is_ident(token) && self.name.is_none() => {
                self.name = Some(token.text.clone());
                Ok(Step::Stay)
            }
            _ => {
                let mut expected = String::from("Expected ");
                if self.name.is_none() {
                    expected.push_str("an identifier / ");
                    if !self.take_ref {
                        expected.push_str("`&` / ");
                    }
                }
                expected.push_str("`(` / `{`");
                Err(ParseError::from_token(expected, token))
            }
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "RefExpression"
    }
}
