//! # Intermediate Representation
//!
//! The backend-agnostic tree produced by semantic analysis and consumed by
//! every code generator. It is the AST minus surface concerns, plus the
//! facts the backends need but should not recompute: derived values arrive
//! in topological order with their dependency sets attached, functions and
//! effects know whether they contain `await`, and `for` wrappers carry the
//! key field to use for list rendering.
//!
//! Expressions and statements are shared with the AST — analysis validates
//! them but does not change their shape.

use crate::ast::{Expr, Stmt, TypeExpr};

/// A whole analyzed program.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramIr {
    pub pages: Vec<PageIr>,
    pub components: Vec<PageIr>,
    pub models: Vec<ModelIr>,
    pub routes: Vec<RouteIr>,
    pub auth: Vec<(String, Expr)>,
    pub roles: Vec<String>,
}

/// An analyzed page or component.
#[derive(Debug, Clone, PartialEq)]
pub struct PageIr {
    pub name: String,
    pub is_component: bool,
    pub props: Vec<PropIr>,
    pub states: Vec<StateIr>,
    /// Topologically ordered: every entry only reads states, props, and
    /// earlier entries.
    pub derived: Vec<DerivedIr>,
    pub functions: Vec<FunctionIr>,
    pub effects: Vec<EffectIr>,
    pub checks: Vec<CheckIr>,
    pub apis: Vec<ApiIr>,
    /// Page-level `style` attributes, applied to the page root wrapper.
    pub styles: Vec<(String, Expr)>,
    /// `seo` attributes, exported as page metadata.
    pub seo: Vec<(String, Expr)>,
    pub layout: Vec<LayoutIr>,
    /// Nested components, emitted alongside the page.
    pub components: Vec<PageIr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropIr {
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateIr {
    pub name: String,
    pub ty: TypeExpr,
    pub init: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedIr {
    pub name: String,
    pub expr: Expr,
    /// State/prop/derived identifiers this value reads.
    pub deps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionIr {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    /// True if the body contains `await` anywhere.
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EffectIr {
    Mount { body: Vec<Stmt>, is_async: bool },
    Watch { target: String, body: Vec<Stmt>, is_async: bool },
}

/// A `check`/`validate` rule. Backends insert a guard after every mutation
/// of a state named in `deps`; the message text is carried verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckIr {
    pub expr: Expr,
    pub message: String,
    /// State identifiers the rule reads.
    pub deps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiIr {
    pub name: String,
    pub url: Expr,
    pub awaited: bool,
}

/// The layout tree: elements plus `for`/`if` control wrappers.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutIr {
    Element(ElementIr),
    For {
        var: String,
        iter: Expr,
        /// Field to key list rendering by, when the iterated items have one.
        key_field: Option<String>,
        body: Vec<LayoutIr>,
    },
    If {
        cond: Expr,
        then: Vec<LayoutIr>,
        els: Vec<LayoutIr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementIr {
    pub kind: ElementKind,
    pub arg: Option<Expr>,
    pub attrs: Vec<(String, Expr)>,
    pub events: Vec<EventIr>,
    pub children: Vec<LayoutIr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventIr {
    /// `None` is the element's default event (click for buttons, submit for
    /// forms, change for inputs).
    pub name: Option<String>,
    pub handler: Expr,
}

/// Element kinds. `Component` references a declared component by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Col,
    Row,
    Grid,
    Text,
    Button,
    Input,
    Toggle,
    Image,
    Select,
    Table,
    Chart,
    Nav,
    Stat,
    Modal,
    Toast,
    Upload,
    Realtime,
    Form,
    Field,
    Submit,
    Hero,
    Crud,
    Stats,
    Breadcrumb,
    Drawer,
    Mobile,
    Media,
    Social,
    Pay,
    Confirm,
    Animate,
    Component(String),
}

impl ElementKind {
    pub fn from_word(word: &str) -> Option<ElementKind> {
        Some(match word {
            "col" => ElementKind::Col,
            "row" => ElementKind::Row,
            "grid" => ElementKind::Grid,
            "text" => ElementKind::Text,
            "button" => ElementKind::Button,
            "input" => ElementKind::Input,
            "toggle" => ElementKind::Toggle,
            "image" => ElementKind::Image,
            "select" => ElementKind::Select,
            "table" => ElementKind::Table,
            "chart" => ElementKind::Chart,
            "nav" => ElementKind::Nav,
            "stat" => ElementKind::Stat,
            "modal" => ElementKind::Modal,
            "toast" => ElementKind::Toast,
            "upload" => ElementKind::Upload,
            "realtime" => ElementKind::Realtime,
            "form" => ElementKind::Form,
            "field" => ElementKind::Field,
            "submit" => ElementKind::Submit,
            "hero" => ElementKind::Hero,
            "crud" => ElementKind::Crud,
            "stats" => ElementKind::Stats,
            "breadcrumb" => ElementKind::Breadcrumb,
            "drawer" => ElementKind::Drawer,
            "mobile" => ElementKind::Mobile,
            "media" => ElementKind::Media,
            "social" => ElementKind::Social,
            "pay" => ElementKind::Pay,
            "confirm" => ElementKind::Confirm,
            "animate" => ElementKind::Animate,
            _ => return None,
        })
    }

    /// The surface keyword, or the component name.
    pub fn word(&self) -> &str {
        match self {
            ElementKind::Col => "col",
            ElementKind::Row => "row",
            ElementKind::Grid => "grid",
            ElementKind::Text => "text",
            ElementKind::Button => "button",
            ElementKind::Input => "input",
            ElementKind::Toggle => "toggle",
            ElementKind::Image => "image",
            ElementKind::Select => "select",
            ElementKind::Table => "table",
            ElementKind::Chart => "chart",
            ElementKind::Nav => "nav",
            ElementKind::Stat => "stat",
            ElementKind::Modal => "modal",
            ElementKind::Toast => "toast",
            ElementKind::Upload => "upload",
            ElementKind::Realtime => "realtime",
            ElementKind::Form => "form",
            ElementKind::Field => "field",
            ElementKind::Submit => "submit",
            ElementKind::Hero => "hero",
            ElementKind::Crud => "crud",
            ElementKind::Stats => "stats",
            ElementKind::Breadcrumb => "breadcrumb",
            ElementKind::Drawer => "drawer",
            ElementKind::Mobile => "mobile",
            ElementKind::Media => "media",
            ElementKind::Social => "social",
            ElementKind::Pay => "pay",
            ElementKind::Confirm => "confirm",
            ElementKind::Animate => "animate",
            ElementKind::Component(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelIr {
    pub name: String,
    pub fields: Vec<FieldIr>,
    pub validates: Vec<CheckIr>,
    pub permissions: Vec<(String, String)>,
    pub searchable: Vec<String>,
    pub sortable: Vec<String>,
    pub filterable: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldIr {
    pub name: String,
    pub ty: TypeExpr,
    pub default: Option<Expr>,
    pub required: bool,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteIr {
    pub path: String,
    pub target: String,
}
