//! Statement feeders: blocks, declarations and control flow.
//!
//! Each feeder owns the arena node it is building and fills it in as
//! tokens arrive, writing the completed kind back before it finishes.

use ns_common::token::{Token, TokenKind};

use crate::ast::{EnumMemberForm, LetModifiers, NodeId, NodeKind, Param};
use crate::error::ParseError;

use super::expressions::ExprSpec;
use super::{is_ident, Feeder, ParseCtx, Step};

// ── Block ──────────────────────────────────────────────────────────────

/// What kind of construct a block is the body of. Struct and constructor
/// bodies parse `name: expr` entries through the struct-prop path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockRole {
    Root,
    Normal,
    StructBody,
    ConstructorBody,
}

pub(crate) struct BlockFeeder {
    node: NodeId,
    role: BlockRole,
    handle_parent: bool,
    single_element: bool,
}

impl BlockFeeder {
    pub fn new(node: NodeId, role: BlockRole, handle_parent: bool, single_element: bool) -> Self {
        Self { node, role, handle_parent, single_element }
    }

    /// Allocate a block node and its feeder in one go.
    pub fn spawn(
        ctx: &mut ParseCtx,
        parent: NodeId,
        token: u32,
        role: BlockRole,
        handle_parent: bool,
        single_element: bool,
    ) -> Box<BlockFeeder> {
        let node = ctx
            .ast
            .alloc(NodeKind::Block { children: Vec::new() }, token, Some(parent));
        Box::new(BlockFeeder::new(node, role, handle_parent, single_element))
    }

    fn children(&self, ctx: &ParseCtx) -> Vec<NodeId> {
        match ctx.ast.kind(self.node) {
            NodeKind::Block { children } => children.clone(),
            _ => unreachable!("block feeder on non-block node"),
        }
    }

    fn push_child(&self, ctx: &mut ParseCtx, child: NodeId) {
        match ctx.ast.kind_mut(self.node) {
            NodeKind::Block { children } => children.push(child),
            _ => unreachable!("block feeder on non-block node"),
        }
    }

    /// Attach accumulated decorators to the statement that follows them.
    ///
    /// Runs at the start of every feed: once a non-decorator child has
    /// been appended after one or more decorators, the decorators move
    /// off the child list and onto that statement. Statements that cannot
    /// carry decorators silently drop them.
    fn attach_pending_decorators(&self, ctx: &mut ParseCtx) {
        let children = self.children(ctx);
        let Some(&last) = children.last() else { return };
        let is_dec =
            |ctx: &ParseCtx, id: NodeId| matches!(ctx.ast.kind(id), NodeKind::Decorator { .. });
        if is_dec(ctx, last) {
            return;
        }
        let mut decs: Vec<NodeId> = Vec::new();
        for &id in children[..children.len() - 1].iter().rev() {
            if is_dec(ctx, id) {
                decs.push(id);
            } else {
                break;
            }
        }
        if decs.is_empty() {
            return;
        }
        decs.reverse();
        let new_len = children.len() - 1 - decs.len();
        match ctx.ast.kind_mut(self.node) {
            NodeKind::Block { children } => {
                children.truncate(new_len);
                children.push(last);
            }
            _ => unreachable!(),
        }
        match ctx.ast.kind_mut(last) {
            NodeKind::Let { decorators, .. } | NodeKind::Function { decorators, .. } => {
                decorators.extend(decs);
            }
            // Not a decoratable statement: the decorators are dropped.
            _ => {}
        }
    }
}

impl Feeder for BlockFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        self.attach_pending_decorators(ctx);

        if self.single_element && !self.children(ctx).is_empty() {
            ctx.retreat();
            return Ok(Step::Done);
        }

        if token.kind == TokenKind::Eof {
            return if self.role == BlockRole::Root {
                Ok(Step::Stay)
            } else {
                Err(ParseError::from_token("Unexpected EOF", token))
            };
        }

        match token.text.as_str() {
            ";" => Ok(Step::Stay),
            "," if self.role == BlockRole::ConstructorBody => Ok(Step::Stay),
            "{" => {
                let child =
                    BlockFeeder::spawn(ctx, self.node, idx, BlockRole::Normal, false, false);
                self.push_child(ctx, child.node());
                ctx.open(idx, "}");
                Ok(Step::Child(child))
            }
            "}" => {
                if self.role == BlockRole::Root {
                    return Err(ParseError::from_token("Mismatched `}`", token));
                }
                ctx.close(token)?;
                if self.handle_parent {
                    ctx.retreat();
                }
                Ok(Step::Done)
            }
            "@" => {
                let child = DecoratorFeeder::spawn(ctx, self.node, idx);
                self.push_child(ctx, child.node());
                Ok(Step::Child(child))
            }
            "let" if is_ident(token) => {
                let child = LetFeeder::spawn(ctx, self.node, idx);
                self.push_child(ctx, child.node());
                Ok(Step::Child(child))
            }
            "if" if is_ident(token) => {
                let child = IfFeeder::spawn_statement(ctx, self.node, idx);
                self.push_child(ctx, child.node());
                Ok(Step::Child(child))
            }
            "fn" if is_ident(token) => {
                let child = FunctionFeeder::spawn(ctx, self.node, idx);
                self.push_child(ctx, child.node());
                Ok(Step::Child(child))
            }
            "return" | "break" | "continue" if is_ident(token) => {
                let child = JumpFeeder::spawn(ctx, self.node, idx, &token.text);
                self.push_child(ctx, child.node());
                Ok(Step::Child(child))
            }
            "while" if is_ident(token) => {
                let child = WhileFeeder::spawn(ctx, self.node, idx);
                self.push_child(ctx, child.node());
                Ok(Step::Child(child))
            }
            "for" if is_ident(token) => {
                let child = ForFeeder::spawn(ctx, self.node, idx);
                self.push_child(ctx, child.node());
                Ok(Step::Child(child))
            }
            "struct" if is_ident(token) => {
                let child = StructFeeder::spawn(ctx, self.node, idx, false);
                self.push_child(ctx, child.node());
                Ok(Step::Child(child))
            }
            "enum" if is_ident(token) => {
                let child = EnumFeeder::spawn(ctx, self.node, idx, false);
                self.push_child(ctx, child.node());
                Ok(Step::Child(child))
            }
            "import" if is_ident(token) => {
                let child = ImportFeeder::spawn(ctx, self.node, idx);
                self.push_child(ctx, child.node());
                Ok(Step::Child(child))
            }
            _ if is_ident(token)
                && matches!(self.role, BlockRole::StructBody | BlockRole::ConstructorBody)
                && ctx.peek(idx + 1).is_some_and(|t| t.text == ":") =>
            {
                // `name: ...` -- a typed field declaration inside a struct
                // body, or a field initializer inside a constructor body.
                let spec = if self.role == BlockRole::StructBody {
                    ExprSpec::close(&[";", "}"]).handle_parent().allow_empty().type_context()
                } else {
                    ExprSpec::close(&[";", ",", "}"]).handle_parent().allow_empty()
                };
                let (value, feeder) = spec.spawn(ctx, self.node, idx + 2);
                let prop = ctx.ast.alloc(
                    NodeKind::StructProp { name: token.text.clone(), value },
                    idx,
                    Some(self.node),
                );
                ctx.ast.set_parent(value, prop);
                self.push_child(ctx, prop);
                // Jump past the `:`; the value expression starts after it.
                ctx.skip();
                Ok(Step::Child(feeder))
            }
            _ => {
                let close: &[&str] =
                    if self.single_element || self.role == BlockRole::Root {
                        &[";"]
                    } else {
                        &[";", "}"]
                    };
                let (expr, feeder) = ExprSpec::close(close)
                    .handle_parent()
                    .allow_empty()
                    .spawn(ctx, self.node, idx);
                self.push_child(ctx, expr);
                ctx.retreat();
                Ok(Step::Child(feeder))
            }
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "Block"
    }
}

// ── Let ────────────────────────────────────────────────────────────────

pub(crate) struct LetFeeder {
    node: NodeId,
    state: u8,
    name: String,
    modifiers: LetModifiers,
    ty: Option<NodeId>,
    init: Option<NodeId>,
}

impl LetFeeder {
    pub fn spawn(ctx: &mut ParseCtx, parent: NodeId, token: u32) -> Box<LetFeeder> {
        let node = ctx.ast.alloc(
            NodeKind::Let {
                name: String::new(),
                ty: None,
                init: None,
                modifiers: LetModifiers::default(),
                decorators: Vec::new(),
            },
            token,
            Some(parent),
        );
        Box::new(LetFeeder {
            node,
            state: 0,
            name: String::new(),
            modifiers: LetModifiers::default(),
            ty: None,
            init: None,
        })
    }

    fn finish(&mut self, ctx: &mut ParseCtx) {
        *ctx.ast.kind_mut(self.node) = NodeKind::Let {
            name: std::mem::take(&mut self.name),
            ty: self.ty,
            init: self.init,
            modifiers: self.modifiers,
            decorators: Vec::new(),
        };
    }
}

impl Feeder for LetFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        if token.kind == TokenKind::Eof {
            return Err(ParseError::from_token("Unexpected EOF", token));
        }
        match self.state {
            // Name or modifier.
            0 => {
                if !is_ident(token) {
                    return Err(ParseError::from_token("Expected an identifier", token));
                }
                match token.text.as_str() {
                    "const" | "mut" => {
                        let (flag, other) = if token.text == "const" {
                            (&mut self.modifiers.is_const, self.modifiers.is_mut)
                        } else {
                            (&mut self.modifiers.is_mut, self.modifiers.is_const)
                        };
                        if *flag {
                            return Err(ParseError::from_token("Duplicate modifier", token));
                        }
                        if other {
                            let name = if token.text == "const" { "mut" } else { "const" };
                            return Err(ParseError::from_token(
                                format!("Modifier incompatible with `{name}`"),
                                token,
                            ));
                        }
                        *flag = true;
                        Ok(Step::Stay)
                    }
                    _ => {
                        self.name = token.text.clone();
                        self.state = 1;
                        Ok(Step::Stay)
                    }
                }
            }
            // Assignment, type hint, or end of statement.
            1 => match token.text.as_str() {
                "=" => {
                    let (expr, feeder) =
                        ExprSpec::close(&[";"]).handle_parent().spawn(ctx, self.node, idx + 1);
                    self.init = Some(expr);
                    self.state = 2;
                    Ok(Step::Child(feeder))
                }
                ":" => {
                    let (expr, feeder) = ExprSpec::close(&[";", "="])
                        .handle_parent()
                        .type_context()
                        .spawn(ctx, self.node, idx + 1);
                    self.ty = Some(expr);
                    Ok(Step::Child(feeder))
                }
                ";" => {
                    self.finish(ctx);
                    Ok(Step::Done)
                }
                _ => Err(ParseError::from_token("Expected one of `=:;`", token)),
            },
            // Terminating `;` after the initializer.
            _ => match token.text.as_str() {
                ";" => {
                    self.finish(ctx);
                    Ok(Step::Done)
                }
                _ => Err(ParseError::from_token("Expected `;`", token)),
            },
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "Let"
    }
}

// ── Function ───────────────────────────────────────────────────────────

#[derive(Default)]
struct ParamInProgress {
    name: Option<String>,
    /// `None` = not decided yet; `Some(None)` = explicitly absent.
    ty: Option<Option<NodeId>>,
    default: Option<NodeId>,
}

pub(crate) struct FunctionFeeder {
    node: NodeId,
    state: u8,
    name: Option<String>,
    params: Vec<Param>,
    cur: ParamInProgress,
    return_ty: Option<NodeId>,
    body: Option<NodeId>,
}

impl FunctionFeeder {
    pub fn spawn(ctx: &mut ParseCtx, parent: NodeId, token: u32) -> Box<FunctionFeeder> {
        let node = ctx.ast.alloc(
            NodeKind::Function {
                name: None,
                params: Vec::new(),
                return_ty: None,
                body: None,
                decorators: Vec::new(),
            },
            token,
            Some(parent),
        );
        Box::new(FunctionFeeder {
            node,
            state: 0,
            name: None,
            params: Vec::new(),
            cur: ParamInProgress::default(),
            return_ty: None,
            body: None,
        })
    }

    fn flush_param(&mut self) {
        if let Some(name) = self.cur.name.take() {
            self.params.push(Param {
                name,
                ty: self.cur.ty.take().flatten(),
                default: self.cur.default.take(),
            });
        }
        self.cur = ParamInProgress::default();
    }

    fn finish(&mut self, ctx: &mut ParseCtx) {
        *ctx.ast.kind_mut(self.node) = NodeKind::Function {
            name: self.name.take(),
            params: std::mem::take(&mut self.params),
            return_ty: self.return_ty,
            body: self.body,
            decorators: Vec::new(),
        };
    }
}

impl Feeder for FunctionFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        if token.kind == TokenKind::Eof {
            return Err(ParseError::from_token("Unexpected EOF", token));
        }
        match self.state {
            // Optional name.
            0 => {
                if is_ident(token) {
                    self.name = Some(token.text.clone());
                } else if token.text == "(" {
                    ctx.retreat();
                } else {
                    return Err(ParseError::from_token("Expected an identifier", token));
                }
                self.state = 1;
                Ok(Step::Stay)
            }
            // `(` before the parameter list.
            1 => {
                if token.text != "(" {
                    return Err(ParseError::from_token("Expected `(`", token));
                }
                self.state = 2;
                Ok(Step::Stay)
            }
            // Parameters.
            2 => match token.text.as_str() {
                ")" => {
                    self.flush_param();
                    self.state = 3;
                    Ok(Step::Stay)
                }
                "," => {
                    if self.cur.name.is_some() {
                        self.flush_param();
                        Ok(Step::Stay)
                    } else {
                        Err(ParseError::from_token("Expected parameter declaration", token))
                    }
                }
                _ if self.cur.name.is_none() => {
                    if is_ident(token) {
                        self.cur.name = Some(token.text.clone());
                        Ok(Step::Stay)
                    } else {
                        Err(ParseError::from_token("Expected an identifier or `)`", token))
                    }
                }
                _ if self.cur.ty.is_none() => match token.text.as_str() {
                    ":" => {
                        let (expr, feeder) = ExprSpec::close(&[",", ")"])
                            .handle_parent()
                            .type_context()
                            .spawn(ctx, self.node, idx + 1);
                        self.cur.ty = Some(Some(expr));
                        Ok(Step::Child(feeder))
                    }
                    "=" => {
                        self.cur.ty = Some(None);
                        ctx.retreat();
                        Ok(Step::Stay)
                    }
                    _ => Err(ParseError::from_token("Expected one of `:=,)`", token)),
                },
                _ if self.cur.default.is_none() => match token.text.as_str() {
                    "=" => {
                        let (expr, feeder) = ExprSpec::close(&[")", ","])
                            .handle_parent()
                            .spawn(ctx, self.node, idx);
                        self.cur.default = Some(expr);
                        Ok(Step::Child(feeder))
                    }
                    _ => Err(ParseError::from_token("Expected one of `=,)`", token)),
                },
                _ => Err(ParseError::from_token("Expected `,` or `)`", token)),
            },
            // Return type or body.
            3 => match token.text.as_str() {
                "{" => {
                    let body =
                        BlockFeeder::spawn(ctx, self.node, idx, BlockRole::Normal, true, false);
                    self.body = Some(body.node());
                    ctx.open(idx, "}");
                    self.state = 4;
                    Ok(Step::Child(body))
                }
                "->" if self.return_ty.is_none() => {
                    let (expr, feeder) = ExprSpec::close(&["{", ";"])
                        .handle_parent()
                        .type_context()
                        .spawn(ctx, self.node, idx + 1);
                    self.return_ty = Some(expr);
                    Ok(Step::Child(feeder))
                }
                ";" => {
                    // Header-only declaration.
                    self.finish(ctx);
                    Ok(Step::Done)
                }
                _ => {
                    let arrow = if self.return_ty.is_none() { ", `->`" } else { "" };
                    Err(ParseError::from_token(
                        format!("Expected one of `{{`, `;`{arrow}"),
                        token,
                    ))
                }
            },
            // The body block hands its `}` back; consume it and finish.
            _ => {
                self.finish(ctx);
                Ok(Step::Done)
            }
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "Function"
    }
}

// ── If ─────────────────────────────────────────────────────────────────

#[derive(PartialEq)]
enum IfState {
    Cond,
    AfterCond,
    Then,
    AfterThen,
    Else,
    Complete,
}

pub(crate) struct IfFeeder {
    node: NodeId,
    /// Statement form (`if (c) {..} else {..}`) vs. expression form,
    /// where both branches are expressions and `else` is mandatory.
    statement: bool,
    close: Vec<String>,
    handle_parent: bool,
    state: IfState,
    condition: Option<NodeId>,
    then_branch: Option<NodeId>,
    else_branch: Option<NodeId>,
}

impl IfFeeder {
    fn alloc(ctx: &mut ParseCtx, parent: NodeId, token: u32) -> NodeId {
        // The condition/branch ids are patched in on completion; seed with
        // the node's own id so the slot is never dangling.
        let placeholder = ctx.ast.alloc(
            NodeKind::Expression { value: None, is_type: false },
            token,
            Some(parent),
        );
        ctx.ast.alloc(
            NodeKind::If {
                condition: placeholder,
                then_branch: placeholder,
                else_branch: None,
            },
            token,
            Some(parent),
        )
    }

    pub fn spawn_statement(ctx: &mut ParseCtx, parent: NodeId, token: u32) -> Box<IfFeeder> {
        let node = Self::alloc(ctx, parent, token);
        Box::new(IfFeeder {
            node,
            statement: true,
            close: Vec::new(),
            handle_parent: false,
            state: IfState::Cond,
            condition: None,
            then_branch: None,
            else_branch: None,
        })
    }

    pub fn spawn_expression(
        ctx: &mut ParseCtx,
        parent: NodeId,
        token: u32,
        close: Vec<String>,
    ) -> Box<IfFeeder> {
        let node = Self::alloc(ctx, parent, token);
        Box::new(IfFeeder {
            node,
            statement: false,
            close,
            handle_parent: true,
            state: IfState::Cond,
            condition: None,
            then_branch: None,
            else_branch: None,
        })
    }

    fn finish(&mut self, ctx: &mut ParseCtx) {
        *ctx.ast.kind_mut(self.node) = NodeKind::If {
            condition: self.condition.expect("condition parsed before finish"),
            then_branch: self.then_branch.expect("then branch parsed before finish"),
            else_branch: self.else_branch,
        };
    }
}

impl Feeder for IfFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        match self.state {
            IfState::Cond => {
                if token.text != "(" {
                    return Err(ParseError::from_token("Expected `(`", token));
                }
                let (cond, feeder) = ExprSpec::close(&[")"])
                    .handle_parent()
                    .finish_enclose()
                    .spawn(ctx, self.node, idx);
                self.condition = Some(cond);
                ctx.open(idx, ")");
                self.state = IfState::AfterCond;
                Ok(Step::Child(feeder))
            }
            IfState::AfterCond => {
                if token.text != ")" {
                    return Err(ParseError::from_token("Expected `)`", token));
                }
                if self.statement {
                    self.state = IfState::Then;
                    Ok(Step::Stay)
                } else {
                    let (expr, feeder) =
                        ExprSpec::close(&["else"]).handle_parent().spawn(ctx, self.node, idx + 1);
                    self.then_branch = Some(expr);
                    self.state = IfState::AfterThen;
                    Ok(Step::Child(feeder))
                }
            }
            IfState::Then => {
                let child = if token.text == "{" {
                    ctx.open(idx, "}");
                    BlockFeeder::spawn(ctx, self.node, idx, BlockRole::Normal, false, false)
                } else {
                    ctx.retreat();
                    BlockFeeder::spawn(ctx, self.node, idx, BlockRole::Normal, false, true)
                };
                self.then_branch = Some(child.node());
                self.state = IfState::AfterThen;
                Ok(Step::Child(child))
            }
            IfState::AfterThen => {
                if token.text == "else" && is_ident(token) {
                    if self.statement {
                        self.state = IfState::Else;
                        Ok(Step::Stay)
                    } else {
                        let (expr, feeder) = ExprSpec::close_owned(self.close.clone())
                            .handle_parent()
                            .spawn(ctx, self.node, idx + 1);
                        self.else_branch = Some(expr);
                        self.state = IfState::Complete;
                        Ok(Step::Child(feeder))
                    }
                } else if self.statement {
                    ctx.retreat();
                    self.finish(ctx);
                    Ok(Step::Done)
                } else {
                    Err(ParseError::from_token("Expected `else`", token))
                }
            }
            IfState::Else => {
                let child: Box<dyn Feeder> = if token.text == "{" {
                    ctx.open(idx, "}");
                    BlockFeeder::spawn(ctx, self.node, idx, BlockRole::Normal, false, false)
                } else if token.text == "if" && is_ident(token) {
                    IfFeeder::spawn_statement(ctx, self.node, idx)
                } else {
                    ctx.retreat();
                    BlockFeeder::spawn(ctx, self.node, idx, BlockRole::Normal, false, true)
                };
                self.else_branch = Some(child.node());
                self.state = IfState::Complete;
                Ok(Step::Child(child))
            }
            IfState::Complete => {
                if self.handle_parent || self.statement {
                    ctx.retreat();
                }
                self.finish(ctx);
                Ok(Step::Done)
            }
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "If"
    }
}

// ── While ──────────────────────────────────────────────────────────────

pub(crate) struct WhileFeeder {
    node: NodeId,
    condition: Option<NodeId>,
    body: Option<NodeId>,
}

impl WhileFeeder {
    pub fn spawn(ctx: &mut ParseCtx, parent: NodeId, token: u32) -> Box<WhileFeeder> {
        let placeholder = ctx.ast.alloc(
            NodeKind::Expression { value: None, is_type: false },
            token,
            Some(parent),
        );
        let node = ctx.ast.alloc(
            NodeKind::While { condition: placeholder, body: placeholder },
            token,
            Some(parent),
        );
        Box::new(WhileFeeder { node, condition: None, body: None })
    }
}

impl Feeder for WhileFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        if self.condition.is_none() {
            if token.text != "(" {
                return Err(ParseError::from_token("Expected `(` before condition", token));
            }
            let (cond, feeder) =
                ExprSpec::close(&[")"]).finish_enclose().spawn(ctx, self.node, idx);
            self.condition = Some(cond);
            ctx.open(idx, ")");
            Ok(Step::Child(feeder))
        } else if self.body.is_none() {
            let child = if token.text == "{" {
                ctx.open(idx, "}");
                BlockFeeder::spawn(ctx, self.node, idx, BlockRole::Normal, false, false)
            } else {
                ctx.retreat();
                BlockFeeder::spawn(ctx, self.node, idx, BlockRole::Normal, false, true)
            };
            self.body = Some(child.node());
            Ok(Step::Child(child))
        } else {
            *ctx.ast.kind_mut(self.node) = NodeKind::While {
                condition: self.condition.expect("condition parsed"),
                body: self.body.expect("body parsed"),
            };
            ctx.retreat();
            Ok(Step::Done)
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "While"
    }
}

// ── For ────────────────────────────────────────────────────────────────

#[derive(PartialEq)]
enum ForState {
    Item,
    AfterItem,
    Index,
    OpenBrace,
    End,
}

pub(crate) struct ForFeeder {
    node: NodeId,
    state: ForState,
    item: String,
    index: Option<String>,
    iterable: Option<NodeId>,
    body: Option<NodeId>,
}

impl ForFeeder {
    pub fn spawn(ctx: &mut ParseCtx, parent: NodeId, token: u32) -> Box<ForFeeder> {
        let placeholder = ctx.ast.alloc(
            NodeKind::Expression { value: None, is_type: false },
            token,
            Some(parent),
        );
        let node = ctx.ast.alloc(
            NodeKind::For {
                item: String::new(),
                index: None,
                iterable: placeholder,
                body: placeholder,
            },
            token,
            Some(parent),
        );
        Box::new(ForFeeder {
            node,
            state: ForState::Item,
            item: String::new(),
            index: None,
            iterable: None,
            body: None,
        })
    }
}

impl Feeder for ForFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        match self.state {
            ForState::Item => {
                if !is_ident(token) {
                    return Err(ParseError::from_token("Expected iterator name", token));
                }
                self.item = token.text.clone();
                self.state = ForState::AfterItem;
                Ok(Step::Stay)
            }
            ForState::AfterItem => match token.text.as_str() {
                "," if self.index.is_none() => {
                    self.state = ForState::Index;
                    Ok(Step::Stay)
                }
                "in" if is_ident(token) => {
                    let (expr, feeder) =
                        ExprSpec::close(&["{"]).handle_parent().spawn(ctx, self.node, idx + 1);
                    self.iterable = Some(expr);
                    self.state = ForState::OpenBrace;
                    Ok(Step::Child(feeder))
                }
                ":" => Err(ParseError::from_token(
                    "Type hint on for loop iterator is not currently supported",
                    token,
                )),
                _ => Err(ParseError::from_token("Expected `in`", token)),
            },
            ForState::Index => {
                if !is_ident(token) {
                    return Err(ParseError::from_token("Expected iterator name", token));
                }
                self.index = Some(token.text.clone());
                self.state = ForState::AfterItem;
                Ok(Step::Stay)
            }
            ForState::OpenBrace => {
                if token.text != "{" {
                    return Err(ParseError::from_token("Expected `{`", token));
                }
                let body = BlockFeeder::spawn(ctx, self.node, idx, BlockRole::Normal, true, false);
                self.body = Some(body.node());
                ctx.open(idx, "}");
                self.state = ForState::End;
                Ok(Step::Child(body))
            }
            ForState::End => {
                *ctx.ast.kind_mut(self.node) = NodeKind::For {
                    item: std::mem::take(&mut self.item),
                    index: self.index.take(),
                    iterable: self.iterable.expect("iterable parsed"),
                    body: self.body.expect("body parsed"),
                };
                Ok(Step::Done)
            }
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "For"
    }
}

// ── Struct ─────────────────────────────────────────────────────────────

pub(crate) struct StructFeeder {
    node: NodeId,
    allow_unnamed: bool,
    name: Option<String>,
    named: bool,
    body: Option<NodeId>,
}

impl StructFeeder {
    pub fn spawn(
        ctx: &mut ParseCtx,
        parent: NodeId,
        token: u32,
        allow_unnamed: bool,
    ) -> Box<StructFeeder> {
        let node = ctx
            .ast
            .alloc(NodeKind::Struct { name: None, body: None }, token, Some(parent));
        Box::new(StructFeeder { node, allow_unnamed, name: None, named: false, body: None })
    }
}

impl Feeder for StructFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        if !self.named {
            if is_ident(token) {
                self.name = Some(token.text.clone());
                self.named = true;
                Ok(Step::Stay)
            } else if token.text == "{" && self.allow_unnamed {
                self.named = true;
                ctx.retreat();
                Ok(Step::Stay)
            } else {
                Err(ParseError::from_token("Expected identifier", token))
            }
        } else if self.body.is_none() {
            if token.text != "{" {
                return Err(ParseError::from_token("Expected `{`", token));
            }
            let body = BlockFeeder::spawn(ctx, self.node, idx, BlockRole::StructBody, true, false);
            self.body = Some(body.node());
            ctx.open(idx, "}");
            Ok(Step::Child(body))
        } else {
            *ctx.ast.kind_mut(self.node) =
                NodeKind::Struct { name: self.name.take(), body: self.body };
            Ok(Step::Done)
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "Struct"
    }
}

// ── Enum ───────────────────────────────────────────────────────────────

#[derive(PartialEq)]
enum EnumState {
    Name,
    OpenBrace,
    Members,
}

pub(crate) struct EnumFeeder {
    node: NodeId,
    allow_unnamed: bool,
    state: EnumState,
    name: Option<String>,
    c_repr: bool,
    members: Vec<NodeId>,
}

impl EnumFeeder {
    pub fn spawn(
        ctx: &mut ParseCtx,
        parent: NodeId,
        token: u32,
        allow_unnamed: bool,
    ) -> Box<EnumFeeder> {
        let node = ctx.ast.alloc(
            NodeKind::Enum { name: None, c_repr: false, members: Vec::new() },
            token,
            Some(parent),
        );
        Box::new(EnumFeeder {
            node,
            allow_unnamed,
            state: EnumState::Name,
            name: None,
            c_repr: false,
            members: Vec::new(),
        })
    }
}

impl Feeder for EnumFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        match self.state {
            EnumState::Name => {
                if is_ident(token) {
                    self.name = Some(token.text.clone());
                    self.state = EnumState::OpenBrace;
                    Ok(Step::Stay)
                } else if token.kind == TokenKind::Str && token.str_body() == "C" {
                    self.c_repr = true;
                    Ok(Step::Stay)
                } else if token.text == "{" && self.allow_unnamed {
                    ctx.retreat();
                    self.state = EnumState::OpenBrace;
                    Ok(Step::Stay)
                } else {
                    Err(ParseError::from_token("Expected identifier", token))
                }
            }
            EnumState::OpenBrace => {
                if token.text != "{" {
                    return Err(ParseError::from_token("Expected `{`", token));
                }
                ctx.open(idx, "}");
                self.state = EnumState::Members;
                Ok(Step::Stay)
            }
            EnumState::Members => match token.text.as_str() {
                ";" | "," => Ok(Step::Stay),
                "}" => {
                    ctx.close(token)?;
                    *ctx.ast.kind_mut(self.node) = NodeKind::Enum {
                        name: self.name.take(),
                        c_repr: self.c_repr,
                        members: std::mem::take(&mut self.members),
                    };
                    Ok(Step::Done)
                }
                _ if is_ident(token) => {
                    let child = EnumMemberFeeder::spawn(ctx, self.node, idx, self.c_repr);
                    self.members.push(child.node());
                    ctx.retreat();
                    Ok(Step::Child(child))
                }
                _ => Err(ParseError::from_token("Unexpected token", token)),
            },
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "Enum"
    }
}

// ── Enum member ────────────────────────────────────────────────────────

enum EnumMemberState {
    Name,
    Form,
    Tuple,
    StructField,
    StructColon,
    StructCommit,
}

pub(crate) struct EnumMemberFeeder {
    node: NodeId,
    c_repr: bool,
    state: EnumMemberState,
    name: String,
    tuple: Vec<NodeId>,
    fields: Vec<(String, NodeId)>,
    cur_field: Option<(String, Option<NodeId>)>,
}

impl EnumMemberFeeder {
    pub fn spawn(
        ctx: &mut ParseCtx,
        parent: NodeId,
        token: u32,
        c_repr: bool,
    ) -> Box<EnumMemberFeeder> {
        let node = ctx.ast.alloc(
            NodeKind::EnumMember { name: String::new(), form: EnumMemberForm::Unit },
            token,
            Some(parent),
        );
        Box::new(EnumMemberFeeder {
            node,
            c_repr,
            state: EnumMemberState::Name,
            name: String::new(),
            tuple: Vec::new(),
            fields: Vec::new(),
            cur_field: None,
        })
    }

    fn finish(&mut self, ctx: &mut ParseCtx, form: EnumMemberForm) {
        *ctx.ast.kind_mut(self.node) =
            NodeKind::EnumMember { name: std::mem::take(&mut self.name), form };
    }
}

impl Feeder for EnumMemberFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        if token.kind == TokenKind::Eof {
            return Err(ParseError::from_token("Unexpected EOF", token));
        }
        match self.state {
            EnumMemberState::Name => {
                if !is_ident(token) {
                    return Err(ParseError::from_token("Expected identifier", token));
                }
                self.name = token.text.clone();
                self.state = EnumMemberState::Form;
                Ok(Step::Stay)
            }
            EnumMemberState::Form => match token.text.as_str() {
                ";" | "," => {
                    self.finish(ctx, EnumMemberForm::Unit);
                    Ok(Step::Done)
                }
                "}" => {
                    self.finish(ctx, EnumMemberForm::Unit);
                    ctx.retreat();
                    Ok(Step::Done)
                }
                "(" => {
                    if self.c_repr {
                        return Err(ParseError::from_token(
                            "Tuples are not allowed for crepr",
                            token,
                        ));
                    }
                    ctx.open(idx, ")");
                    self.state = EnumMemberState::Tuple;
                    Ok(Step::Stay)
                }
                "{" => {
                    if self.c_repr {
                        return Err(ParseError::from_token(
                            "Structs are not allowed for crepr",
                            token,
                        ));
                    }
                    ctx.open(idx, "}");
                    self.state = EnumMemberState::StructField;
                    Ok(Step::Stay)
                }
                _ => Err(ParseError::from_token("Unexpected token", token)),
            },
            EnumMemberState::Tuple => match token.text.as_str() {
                "," | ";" => Ok(Step::Stay),
                ")" => {
                    ctx.close(token)?;
                    let items = std::mem::take(&mut self.tuple);
                    self.finish(ctx, EnumMemberForm::Tuple(items));
                    Ok(Step::Done)
                }
                _ => {
                    let (expr, feeder) = ExprSpec::close(&[",", ";", ")"])
                        .handle_parent()
                        .type_context()
                        .spawn(ctx, self.node, idx);
                    self.tuple.push(expr);
                    ctx.retreat();
                    Ok(Step::Child(feeder))
                }
            },
            EnumMemberState::StructField => match token.text.as_str() {
                "," | ";" => Ok(Step::Stay),
                "}" => {
                    ctx.close(token)?;
                    let fields = std::mem::take(&mut self.fields);
                    self.finish(ctx, EnumMemberForm::Struct(fields));
                    Ok(Step::Done)
                }
                _ if is_ident(token) => {
                    self.cur_field = Some((token.text.clone(), None));
                    self.state = EnumMemberState::StructColon;
                    Ok(Step::Stay)
                }
                _ => Err(ParseError::from_token("Expected identifier", token)),
            },
            EnumMemberState::StructColon => {
                if token.text != ":" {
                    return Err(ParseError::from_token("Expected `:`", token));
                }
                let (expr, feeder) = ExprSpec::close(&[",", ";", "}"])
                    .handle_parent()
                    .type_context()
                    .spawn(ctx, self.node, idx + 1);
                if let Some(field) = &mut self.cur_field {
                    field.1 = Some(expr);
                }
                self.state = EnumMemberState::StructCommit;
                Ok(Step::Child(feeder))
            }
            EnumMemberState::StructCommit => {
                if let Some((name, Some(ty))) = self.cur_field.take() {
                    self.fields.push((name, ty));
                }
                if token.text == "}" {
                    ctx.close(token)?;
                    let fields = std::mem::take(&mut self.fields);
                    self.finish(ctx, EnumMemberForm::Struct(fields));
                    Ok(Step::Done)
                } else {
                    self.state = EnumMemberState::StructField;
                    Ok(Step::Stay)
                }
            }
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "EnumMember"
    }
}

// ── Import ─────────────────────────────────────────────────────────────

pub(crate) struct ImportFeeder {
    node: NodeId,
    names: Vec<String>,
}

impl ImportFeeder {
    pub fn spawn(ctx: &mut ParseCtx, parent: NodeId, token: u32) -> Box<ImportFeeder> {
        let node = ctx
            .ast
            .alloc(NodeKind::Import { names: Vec::new() }, token, Some(parent));
        Box::new(ImportFeeder { node, names: Vec::new() })
    }
}

impl Feeder for ImportFeeder {
    fn feed(&mut self, token: &Token, _idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        if is_ident(token) {
            self.names.push(token.text.clone());
            Ok(Step::Stay)
        } else if token.text == ";" {
            *ctx.ast.kind_mut(self.node) =
                NodeKind::Import { names: std::mem::take(&mut self.names) };
            Ok(Step::Done)
        } else if token.text == "," {
            Ok(Step::Stay)
        } else {
            Err(ParseError::from_token("Expected import name or `,`", token))
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "Import"
    }
}

// ── Decorator ──────────────────────────────────────────────────────────

enum DecoratorState {
    Name,
    AfterName,
    Args,
    End,
}

pub(crate) struct DecoratorFeeder {
    node: NodeId,
    state: DecoratorState,
    name: String,
    args: Vec<NodeId>,
    cur_arg: Option<NodeId>,
}

impl DecoratorFeeder {
    pub fn spawn(ctx: &mut ParseCtx, parent: NodeId, token: u32) -> Box<DecoratorFeeder> {
        let node = ctx.ast.alloc(
            NodeKind::Decorator { name: String::new(), args: Vec::new() },
            token,
            Some(parent),
        );
        Box::new(DecoratorFeeder {
            node,
            state: DecoratorState::Name,
            name: String::new(),
            args: Vec::new(),
            cur_arg: None,
        })
    }

    fn finish(&mut self, ctx: &mut ParseCtx) {
        *ctx.ast.kind_mut(self.node) = NodeKind::Decorator {
            name: std::mem::take(&mut self.name),
            args: std::mem::take(&mut self.args),
        };
    }
}

impl Feeder for DecoratorFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        match self.state {
            DecoratorState::Name => {
                if !is_ident(token) {
                    return Err(ParseError::from_token(
                        "Expected decorator name to be an identifier",
                        token,
                    ));
                }
                self.name = token.text.clone();
                self.state = DecoratorState::AfterName;
                Ok(Step::Stay)
            }
            DecoratorState::AfterName => match token.text.as_str() {
                "(" => {
                    ctx.open(idx, ")");
                    self.state = DecoratorState::Args;
                    Ok(Step::Stay)
                }
                ";" => {
                    self.finish(ctx);
                    Ok(Step::Done)
                }
                _ => {
                    ctx.retreat();
                    self.finish(ctx);
                    Ok(Step::Done)
                }
            },
            DecoratorState::Args => match token.text.as_str() {
                "," | ")" => {
                    if let Some(arg) = self.cur_arg.take() {
                        self.args.push(arg);
                    }
                    if token.text == ")" {
                        ctx.close(token)?;
                        self.state = DecoratorState::End;
                    }
                    Ok(Step::Stay)
                }
                _ => {
                    let (expr, feeder) =
                        ExprSpec::close(&[",", ")"]).handle_parent().spawn(ctx, self.node, idx);
                    self.cur_arg = Some(expr);
                    ctx.retreat();
                    Ok(Step::Child(feeder))
                }
            },
            DecoratorState::End => {
                if token.text != ";" {
                    ctx.retreat();
                }
                self.finish(ctx);
                Ok(Step::Done)
            }
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "Decorator"
    }
}

// ── Return / break / continue ──────────────────────────────────────────

pub(crate) struct JumpFeeder {
    node: NodeId,
    keyword: &'static str,
    value: Option<NodeId>,
    fed: bool,
}

impl JumpFeeder {
    pub fn spawn(ctx: &mut ParseCtx, parent: NodeId, token: u32, keyword: &str) -> Box<JumpFeeder> {
        let (kind, keyword) = match keyword {
            "return" => (NodeKind::Return { value: None }, "return"),
            "break" => (NodeKind::Break { value: None }, "break"),
            _ => (NodeKind::Continue { value: None }, "continue"),
        };
        let node = ctx.ast.alloc(kind, token, Some(parent));
        Box::new(JumpFeeder { node, keyword, value: None, fed: false })
    }
}

impl Feeder for JumpFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        if token.kind == TokenKind::Eof {
            return Err(ParseError::from_token("Unexpected EOF", token));
        }
        if token.text == ";" {
            let value = self.value;
            match ctx.ast.kind_mut(self.node) {
                NodeKind::Return { value: slot }
                | NodeKind::Break { value: slot }
                | NodeKind::Continue { value: slot } => *slot = value,
                _ => unreachable!("jump feeder on non-jump node"),
            }
            Ok(Step::Done)
        } else if !self.fed {
            self.fed = true;
            let (expr, feeder) =
                ExprSpec::close(&[";"]).handle_parent().spawn(ctx, self.node, idx);
            self.value = Some(expr);
            ctx.retreat();
            Ok(Step::Child(feeder))
        } else {
            Err(ParseError::from_token("Expected an expression or `;`", token))
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        match self.keyword {
            "return" => "Return",
            "break" => "Break",
            _ => "Continue",
        }
    }
}

// ── Constructor ────────────────────────────────────────────────────────

pub(crate) struct ConstructorFeeder {
    node: NodeId,
    body: Option<NodeId>,
}

impl ConstructorFeeder {
    pub fn new(node: NodeId) -> Box<ConstructorFeeder> {
        Box::new(ConstructorFeeder { node, body: None })
    }
}

impl Feeder for ConstructorFeeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError> {
        if self.body.is_none() {
            if token.text != "{" {
                return Err(ParseError::from_token("Expected `{`", token));
            }
            let body =
                BlockFeeder::spawn(ctx, self.node, idx, BlockRole::ConstructorBody, true, false);
            self.body = Some(body.node());
            ctx.open(idx, "}");
            Ok(Step::Child(body))
        } else {
            match ctx.ast.kind_mut(self.node) {
                NodeKind::Constructor { body, .. } => *body = self.body,
                _ => unreachable!("constructor feeder on non-constructor node"),
            }
            Ok(Step::Done)
        }
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> &'static str {
        "Constructor"
    }
}
