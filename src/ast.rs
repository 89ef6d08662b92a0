//! # Abstract Syntax Tree (AST)
//!
//! AST nodes for Lumen programs. The tree mirrors the surface grammar: a
//! program is a list of top-level declarations (pages, models, components,
//! routes, auth, roles), and a page owns its reactive state, derived values,
//! functions, effects, checks and layout tree.
//!
//! Blocks introduced by indentation are plain child vectors here; the
//! indentation structure is already resolved by the lexer's
//! `Indent`/`Dedent` tokens, so the AST never deals in whitespace.

use crate::lexer::Span;

/// The root node of a Lumen program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub decls: Vec<Decl>,
}

/// Top-level declarations.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    /// `page Name:` — a routable UI unit with its own scope
    Page(PageDecl),
    /// `component Name:` — a reusable UI unit, same shape as a page
    Component(PageDecl),
    /// `model Name:` — a named record type with fields and rules
    Model(ModelDecl),
    /// `route /path -> Page`
    Route(RouteDecl),
    /// `auth:` configuration block
    Auth(AuthDecl),
    /// `roles:` declaration listing role names
    Roles(RolesDecl),
}

/// A page or component declaration. Pages and components share one shape;
/// components may additionally declare `prop`s.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDecl {
    pub name: String,
    pub props: Vec<PropDecl>,
    pub states: Vec<StateDecl>,
    pub derived: Vec<DerivedDecl>,
    pub functions: Vec<FnDecl>,
    pub checks: Vec<CheckDecl>,
    pub effects: Vec<EffectDecl>,
    pub apis: Vec<ApiDecl>,
    pub types: Vec<TypeDecl>,
    /// `style key=value ...` attributes
    pub styles: Vec<Attr>,
    /// `seo key=value ...` attributes
    pub seo: Vec<Attr>,
    pub layout: Option<Vec<LayoutChild>>,
    /// Nested component declarations
    pub components: Vec<PageDecl>,
    pub span: Span,
}

impl PageDecl {
    pub fn empty(name: String, span: Span) -> Self {
        Self {
            name,
            props: Vec::new(),
            states: Vec::new(),
            derived: Vec::new(),
            functions: Vec::new(),
            checks: Vec::new(),
            effects: Vec::new(),
            apis: Vec::new(),
            types: Vec::new(),
            styles: Vec::new(),
            seo: Vec::new(),
            layout: None,
            components: Vec::new(),
            span,
        }
    }
}

/// `state name: type = init`
#[derive(Debug, Clone, PartialEq)]
pub struct StateDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub init: Expr,
    pub span: Span,
}

/// `derived name = expr` — read-only, recomputed from its dependencies.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedDecl {
    pub name: String,
    pub expr: Expr,
    pub span: Span,
}

/// `prop name: type` on a component.
#[derive(Debug, Clone, PartialEq)]
pub struct PropDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

/// `fn name(params):` with an indented statement block.
#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// `check EXPR "message"` / `validate EXPR "message"`.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckDecl {
    pub kind: CheckKind,
    pub expr: Expr,
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Check,
    Validate,
}

impl CheckKind {
    /// The surface keyword, for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Check => "check",
            CheckKind::Validate => "validate",
        }
    }
}

/// Effect blocks: `on mount:` and `watch name:`.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectDecl {
    Mount { body: Vec<Stmt>, span: Span },
    Watch { target: String, body: Vec<Stmt>, span: Span },
}

/// `api name URL [await]` — a named fetch endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiDecl {
    pub name: String,
    pub url: Expr,
    pub awaited: bool,
    pub span: Span,
}

/// `type Name:` with an indented field block (a local record type).
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

/// A model declaration: typed fields plus validation, permission and query
/// capability clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub validates: Vec<CheckDecl>,
    pub permissions: Vec<PermissionDecl>,
    pub searchable: Vec<String>,
    pub sortable: Vec<String>,
    pub filterable: Vec<String>,
    pub span: Span,
}

/// One model/type field: `name: type [= default] [required] [unique]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub default: Option<Expr>,
    pub required: bool,
    pub unique: bool,
    pub span: Span,
}

/// `permission read|write|delete SCOPE`
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionDecl {
    pub action: PermAction,
    pub scope: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermAction {
    Read,
    Write,
    Delete,
}

impl PermAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermAction::Read => "read",
            PermAction::Write => "write",
            PermAction::Delete => "delete",
        }
    }
}

/// `route /path -> Page`
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecl {
    pub path: String,
    pub target: String,
    pub span: Span,
}

/// `auth:` block. Each line is a clause like `provider email` or
/// `redirect "/login"`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthDecl {
    pub clauses: Vec<(String, Expr)>,
    pub span: Span,
}

/// `roles:` block listing role names.
#[derive(Debug, Clone, PartialEq)]
pub struct RolesDecl {
    pub roles: Vec<String>,
    pub span: Span,
}

/// Declared types. `list[T]` nests; `Named` refers to a model or a local
/// `type` declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Int,
    Float,
    Str,
    Bool,
    Datetime,
    List(Box<TypeExpr>),
    Named(String),
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeExpr::Int => write!(f, "int"),
            TypeExpr::Float => write!(f, "float"),
            TypeExpr::Str => write!(f, "str"),
            TypeExpr::Bool => write!(f, "bool"),
            TypeExpr::Datetime => write!(f, "datetime"),
            TypeExpr::List(inner) => write!(f, "list[{}]", inner),
            TypeExpr::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Statements inside `fn` bodies and effect blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `target = expr` (target may be an identifier or member/index path)
    Assign { target: Expr, value: Expr, span: Span },
    /// `if COND:` block with optional `else:` block
    If { cond: Expr, then: Vec<Stmt>, els: Vec<Stmt>, span: Span },
    /// A bare expression statement: a call or collection mutation
    Expr { expr: Expr, span: Span },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Assign { span, .. } | Stmt::If { span, .. } | Stmt::Expr { span, .. } => *span,
        }
    }
}

/// A node in the layout tree: a container (`col`, `row`, `grid`) or a leaf
/// element (`text`, `button`, `input`, ...). Containers own ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    /// Element keyword (`col`, `text`, `button`, ...)
    pub kind: String,
    /// Optional leading argument (`text "hello"`, `form Task`)
    pub arg: Option<Expr>,
    /// Ordered `key=value` attributes
    pub attrs: Vec<Attr>,
    /// Event bindings: `-> handler()` (default event) or `message -> handler()`
    pub events: Vec<EventBinding>,
    pub children: Vec<LayoutChild>,
    pub span: Span,
}

/// An entry in a layout child list, optionally wrapped in control flow.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutChild {
    Node(LayoutNode),
    /// `for item in collection:` wrapping a child list
    For { var: String, iter: Expr, body: Vec<LayoutChild>, span: Span },
    /// `if COND:` / `else:` wrapping child lists
    If { cond: Expr, then: Vec<LayoutChild>, els: Vec<LayoutChild>, span: Span },
}

/// One `key=value` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub key: String,
    pub value: Expr,
    pub span: Span,
}

/// `-> handler(...)`, optionally prefixed with an event name
/// (`message -> onMessage(m)` on a realtime element).
#[derive(Debug, Clone, PartialEq)]
pub struct EventBinding {
    pub event: Option<String>,
    pub handler: Expr,
    pub span: Span,
}

/// A parsed run of an interpolated string: literal text or an embedded
/// expression. Literal text is preserved verbatim through code generation.
#[derive(Debug, Clone, PartialEq)]
pub enum StrSeg {
    Text(String),
    Expr(Box<Expr>),
}

/// Binary operators. Precedence is handled by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    /// The operator's spelling in the generation targets (JS semantics).
    pub fn js(&self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "===",
            BinOp::Ne => "!==",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Expressions. Collection methods (`filter`, `map`, `reduce`, `find`,
/// `push`, `length`) are ordinary member/call syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Interpolated string literal
    Str(Vec<StrSeg>),
    /// `[a, b, c]` list literal
    List(Vec<Expr>),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Ternary { cond: Box<Expr>, then: Box<Expr>, els: Box<Expr> },
    /// `x => expr` single-parameter lambda, used by collection methods
    Lambda { param: String, body: Box<Expr> },
    Await(Box<Expr>),
}

impl Expr {
    /// Plain string content if this is an interpolation-free string literal.
    pub fn as_plain_str(&self) -> Option<&str> {
        match self {
            Expr::Str(segs) => match segs.as_slice() {
                [StrSeg::Text(t)] => Some(t),
                [] => Some(""),
                _ => None,
            },
            _ => None,
        }
    }
}
