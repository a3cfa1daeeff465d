//! Arena-allocated AST.
//!
//! Nodes live in a flat `Vec` and reference each other through stable
//! [`NodeId`] indices. Every node records its originating token index and a
//! parent link; following parents always terminates at the root block,
//! whose parent is `None`.

/// Stable index of a node inside an [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One AST node: a tagged kind plus its token and parent links.
#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    /// Index of the token this node was opened at.
    pub token: u32,
    pub parent: Option<NodeId>,
}

/// The node arena. Nodes are only ever added, never removed, so ids stay
/// valid for the lifetime of the tree.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: NodeKind, token: u32, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, token, parent });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    pub fn set_parent(&mut self, id: NodeId, parent: NodeId) {
        self.nodes[id.index()].parent = Some(parent);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Modifier set accepted by `let`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LetModifiers {
    pub is_const: bool,
    pub is_mut: bool,
}

/// One declared function parameter.
#[derive(Debug)]
pub struct Param {
    pub name: String,
    pub ty: Option<NodeId>,
    pub default: Option<NodeId>,
}

/// Shape of an enum member.
#[derive(Debug)]
pub enum EnumMemberForm {
    Unit,
    Tuple(Vec<NodeId>),
    Struct(Vec<(String, NodeId)>),
}

/// Every kind of AST node.
///
/// Statement-shaped kinds mirror the language's statement feeders;
/// `Expression` is the wrapper produced by the expression feeder, with the
/// resolved operator tree (if any) underneath it.
#[derive(Debug)]
pub enum NodeKind {
    // ── Literals and names ─────────────────────────────────────────────
    Name { name: String },
    Number { value: f64 },
    Str { value: String },

    // ── Accessors ──────────────────────────────────────────────────────
    /// `expr.prop`; a missing target means the implicit `self`.
    AccessDot { target: Option<NodeId>, prop: String },
    /// `expr:prop` (class property, binds methods).
    AccessColon { target: Option<NodeId>, prop: String },
    /// `expr::prop` (class property, no binding).
    AccessColonColon { target: Option<NodeId>, prop: String },

    // ── Application ────────────────────────────────────────────────────
    Call { callee: NodeId, args: Vec<NodeId> },
    /// `expr[...]`; the separator (`,` or `:`) is sticky once observed.
    Index { target: NodeId, indexes: Vec<NodeId>, sep: Option<char> },

    // ── Operators ──────────────────────────────────────────────────────
    Prefix { op: String, value: NodeId },
    Postfix { op: String, value: NodeId },
    Binary { op: String, left: NodeId, right: NodeId },
    /// `value <> type-expr`.
    Cast { value: NodeId, ty: NodeId },

    // ── Containers and complex expressions ─────────────────────────────
    Array { items: Vec<NodeId> },
    /// `Name<...>` in type context.
    TypeGeneric { target: NodeId, args: Vec<NodeId> },
    /// `Name { field: expr; ... }`.
    Constructor { target: NodeId, body: Option<NodeId> },
    /// Expression wrapper; `is_type` marks type context.
    Expression { value: Option<NodeId>, is_type: bool },
    /// `head => [&] [name] (body)` / `head -> ...`.
    RefExpression {
        value: NodeId,
        body: Option<NodeId>,
        name: Option<String>,
        take_ref: bool,
        take_result: bool,
    },

    // ── Statements ─────────────────────────────────────────────────────
    Block { children: Vec<NodeId> },
    Let {
        name: String,
        ty: Option<NodeId>,
        init: Option<NodeId>,
        modifiers: LetModifiers,
        decorators: Vec<NodeId>,
    },
    Return { value: Option<NodeId> },
    Break { value: Option<NodeId> },
    Continue { value: Option<NodeId> },
    If { condition: NodeId, then_branch: NodeId, else_branch: Option<NodeId> },
    While { condition: NodeId, body: NodeId },
    /// `for item[, index] in iterable { body }`.
    For { item: String, index: Option<String>, iterable: NodeId, body: NodeId },
    Function {
        name: Option<String>,
        params: Vec<Param>,
        return_ty: Option<NodeId>,
        /// `None` for header-only declarations (`fn f();`).
        body: Option<NodeId>,
        decorators: Vec<NodeId>,
    },
    Struct { name: Option<String>, body: Option<NodeId> },
    Enum { name: Option<String>, c_repr: bool, members: Vec<NodeId> },
    EnumMember { name: String, form: EnumMemberForm },
    /// `name: expr` -- a typed field in a struct body, or a field
    /// initializer in a constructor body.
    StructProp { name: String, value: NodeId },
    Import { names: Vec<String> },
    Decorator { name: String, args: Vec<NodeId> },
}

impl NodeKind {
    /// Kind name used by error traces and the AST dump.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Name { .. } => "Name",
            NodeKind::Number { .. } => "Number",
            NodeKind::Str { .. } => "String",
            NodeKind::AccessDot { .. } => "AccessDot",
            NodeKind::AccessColon { .. } => "AccessColon",
            NodeKind::AccessColonColon { .. } => "AccessColonColon",
            NodeKind::Call { .. } => "Call",
            NodeKind::Index { .. } => "Index",
            NodeKind::Prefix { .. } => "Prefix",
            NodeKind::Postfix { .. } => "Postfix",
            NodeKind::Binary { .. } => "Binary",
            NodeKind::Cast { .. } => "Cast",
            NodeKind::Array { .. } => "Array",
            NodeKind::TypeGeneric { .. } => "TypeGeneric",
            NodeKind::Constructor { .. } => "Constructor",
            NodeKind::Expression { .. } => "Expression",
            NodeKind::RefExpression { .. } => "RefExpression",
            NodeKind::Block { .. } => "Block",
            NodeKind::Let { .. } => "Let",
            NodeKind::Return { .. } => "Return",
            NodeKind::Break { .. } => "Break",
            NodeKind::Continue { .. } => "Continue",
            NodeKind::If { .. } => "If",
            NodeKind::While { .. } => "While",
            NodeKind::For { .. } => "For",
            NodeKind::Function { .. } => "Function",
            NodeKind::Struct { .. } => "Struct",
            NodeKind::Enum { .. } => "Enum",
            NodeKind::EnumMember { .. } => "EnumMember",
            NodeKind::StructProp { .. } => "StructProp",
            NodeKind::Import { .. } => "Import",
            NodeKind::Decorator { .. } => "Decorator",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_parent_links() {
        let mut ast = Ast::new();
        let root = ast.alloc(NodeKind::Block { children: vec![] }, 0, None);
        let child = ast.alloc(NodeKind::Number { value: 1.0 }, 2, Some(root));
        assert_eq!(ast.node(child).parent, Some(root));
        assert_eq!(ast.node(root).parent, None);
        assert_eq!(ast.len(), 2);
    }

    #[test]
    fn set_parent_rewires() {
        let mut ast = Ast::new();
        let root = ast.alloc(NodeKind::Block { children: vec![] }, 0, None);
        let a = ast.alloc(NodeKind::Number { value: 1.0 }, 1, Some(root));
        let op = ast.alloc(
            NodeKind::Prefix { op: "-".into(), value: a },
            2,
            Some(root),
        );
        ast.set_parent(a, op);
        assert_eq!(ast.node(a).parent, Some(op));
    }
}
