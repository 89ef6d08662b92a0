//! # Code Generation
//!
//! Lowers the IR into source for one of three reactive UI frameworks. The
//! three backends implement one capability interface ([`Backend`]); the
//! shared driver in this module walks the IR in a fixed order — states,
//! derived values in topological order, api helpers, functions, effects,
//! then the layout tree — so ordering correctness is proven once and reused
//! by every backend.
//!
//! Output is deterministic: the same IR and target produce byte-identical
//! text. Literal string payloads pass through verbatim; interpolation slots
//! are re-rendered in each target's own syntax.

pub mod react;
pub mod svelte;
pub mod vue;

use crate::ast::{BinOp, Expr, StrSeg, UnaryOp};
use crate::ir::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The supported generation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    React,
    Vue,
    Svelte,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::React => "react",
            Target::Vue => "vue",
            Target::Svelte => "svelte",
        }
    }
}

impl std::str::FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "react" => Ok(Target::React),
            "vue" => Ok(Target::Vue),
            "svelte" => Ok(Target::Svelte),
            other => Err(format!(
                "unknown target `{}` (expected react, vue, or svelte)",
                other
            )),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Code generation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodeGenError {
    /// A parsed construct has no defined lowering for the requested target.
    #[error("construct `{construct}` has no lowering for target {target}")]
    UnsupportedConstruct { construct: String, target: Target },
}

/// Generated output plus the statistics the driver reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub code: String,
    /// Non-blank output lines.
    pub line_count: usize,
    /// Whitespace-delimited tokens in the output.
    pub token_count: usize,
}

/// Generates code for one target.
pub fn generate(ir: &ProgramIr, target: Target) -> Result<GeneratedCode, CodeGenError> {
    let backend: &dyn Backend = match target {
        Target::React => &react::ReactBackend,
        Target::Vue => &vue::VueBackend,
        Target::Svelte => &svelte::SvelteBackend,
    };
    let mut e = Emitter::new();

    if !ir.models.is_empty() {
        emit_models(ir, &mut e);
    }
    for component in &ir.components {
        emit_page_tree(component, backend, &mut e)?;
    }
    for page in &ir.pages {
        emit_page_tree(page, backend, &mut e)?;
    }
    if !ir.routes.is_empty() || !ir.auth.is_empty() || !ir.roles.is_empty() {
        emit_routes(ir, backend, &mut e);
    }

    let code = e.finish();
    let line_count = code.lines().filter(|l| !l.trim().is_empty()).count();
    let token_count = code.split_whitespace().count();
    log::debug!(
        "generated {} for {}: {} lines, {} tokens",
        if ir.pages.len() == 1 { "1 page" } else { "pages" },
        target,
        line_count,
        token_count
    );
    Ok(GeneratedCode {
        code,
        line_count,
        token_count,
    })
}

/// Emits nested components depth-first, then the page itself, each as its
/// own file section.
fn emit_page_tree(page: &PageIr, backend: &dyn Backend, e: &mut Emitter) -> Result<(), CodeGenError> {
    for nested in &page.components {
        emit_page_tree(nested, backend, e)?;
    }
    emit_page(page, backend, e)
}

/// The fixed emission order shared by all backends.
fn emit_page(page: &PageIr, backend: &dyn Backend, e: &mut Emitter) -> Result<(), CodeGenError> {
    let mut cx = Cx::new(page);
    // Subscriptions hoist to mount scope, where loop variables do not
    // resolve.
    if realtime_in_loop(&page.layout, false) {
        return Err(CodeGenError::UnsupportedConstruct {
            construct: "realtime element inside a for block".to_string(),
            target: backend.target(),
        });
    }
    // Realtime subscriptions live in the layout tree but lower to effects.
    let (layout, subscriptions) = split_realtime(&page.layout);

    backend.open_page(page, &cx, e);
    for state in &page.states {
        backend.emit_state(state, &cx, e);
    }
    if !page.states.is_empty() && !page.derived.is_empty() {
        e.blank();
    }
    for derived in &page.derived {
        backend.emit_derived(derived, &cx, e);
    }
    for api in &page.apis {
        e.blank();
        backend.emit_api(api, &cx, e);
    }
    for function in &page.functions {
        e.blank();
        backend.emit_function(function, &cx, e);
    }
    for effect in &page.effects {
        e.blank();
        backend.emit_effect(effect, &cx, e);
    }
    for subscription in &subscriptions {
        e.blank();
        backend.emit_subscription(subscription, &cx, e)?;
    }
    backend.begin_layout(page, e);
    backend.emit_layout(&layout, &mut cx, e)?;
    backend.close_page(page, e);
    e.blank();
    Ok(())
}

/// Removes `realtime` elements from the tree; they lower to subscription
/// effects with teardown rather than markup.
fn split_realtime(layout: &[LayoutIr]) -> (Vec<LayoutIr>, Vec<ElementIr>) {
    let mut kept = Vec::new();
    let mut subs = Vec::new();
    for node in layout {
        match node {
            LayoutIr::Element(el) if el.kind == ElementKind::Realtime => subs.push(el.clone()),
            LayoutIr::Element(el) => {
                let (children, mut inner) = split_realtime(&el.children);
                subs.append(&mut inner);
                kept.push(LayoutIr::Element(ElementIr {
                    children,
                    ..el.clone()
                }));
            }
            LayoutIr::For { var, iter, key_field, body } => {
                let (body, mut inner) = split_realtime(body);
                subs.append(&mut inner);
                kept.push(LayoutIr::For {
                    var: var.clone(),
                    iter: iter.clone(),
                    key_field: key_field.clone(),
                    body,
                });
            }
            LayoutIr::If { cond, then, els } => {
                let (then, mut a) = split_realtime(then);
                let (els, mut b) = split_realtime(els);
                subs.append(&mut a);
                subs.append(&mut b);
                kept.push(LayoutIr::If {
                    cond: cond.clone(),
                    then,
                    els,
                });
            }
        }
    }
    (kept, subs)
}

/// True if a `realtime` element sits under a `for` wrapper anywhere in the
/// tree.
fn realtime_in_loop(nodes: &[LayoutIr], in_loop: bool) -> bool {
    nodes.iter().any(|node| match node {
        LayoutIr::Element(el) => {
            (in_loop && el.kind == ElementKind::Realtime)
                || realtime_in_loop(&el.children, in_loop)
        }
        LayoutIr::For { body, .. } => realtime_in_loop(body, true),
        LayoutIr::If { then, els, .. } => {
            realtime_in_loop(then, in_loop) || realtime_in_loop(els, in_loop)
        }
    })
}

/// The capability interface every backend implements. Adding a target means
/// implementing this trait, not touching the pipeline.
pub trait Backend {
    fn target(&self) -> Target;

    /// File-section header, imports, and the opening of the page scope.
    fn open_page(&self, page: &PageIr, cx: &Cx, e: &mut Emitter);
    /// Transition from script to markup.
    fn begin_layout(&self, page: &PageIr, e: &mut Emitter);
    /// Closes the markup and the page scope.
    fn close_page(&self, page: &PageIr, e: &mut Emitter);

    fn emit_state(&self, state: &StateIr, cx: &Cx, e: &mut Emitter);
    fn emit_derived(&self, derived: &DerivedIr, cx: &Cx, e: &mut Emitter);
    fn emit_api(&self, api: &ApiIr, cx: &Cx, e: &mut Emitter);
    fn emit_function(&self, function: &FunctionIr, cx: &Cx, e: &mut Emitter);
    fn emit_effect(&self, effect: &EffectIr, cx: &Cx, e: &mut Emitter);
    /// Lowers a `realtime` element to a mount-time subscription with
    /// teardown.
    fn emit_subscription(&self, el: &ElementIr, cx: &Cx, e: &mut Emitter)
        -> Result<(), CodeGenError>;

    fn emit_layout(&self, nodes: &[LayoutIr], cx: &mut Cx, e: &mut Emitter)
        -> Result<(), CodeGenError>;
    fn emit_element(&self, el: &ElementIr, cx: &mut Cx, e: &mut Emitter)
        -> Result<(), CodeGenError>;
    /// `for`/`if` wrappers in the markup.
    fn emit_control_flow(&self, node: &LayoutIr, cx: &mut Cx, e: &mut Emitter)
        -> Result<(), CodeGenError>;
    /// One event binding as markup attribute text.
    fn emit_event_binding(&self, el: &ElementIr, ev: &EventIr, cx: &Cx) -> String;
    /// An expression in the target's script syntax.
    fn emit_expression(&self, expr: &Expr, cx: &Cx) -> String;

    /// Import path for a generated component file.
    fn component_import(&self, name: &str) -> String;
    /// Section file name for a page.
    fn page_file(&self, name: &str) -> String;
}

/// Per-page emission context: which names are reactive, which are state,
/// and the local names currently shadowing them (loop variables).
pub struct Cx<'a> {
    pub page: &'a PageIr,
    pub locals: Vec<String>,
}

impl<'a> Cx<'a> {
    pub fn new(page: &'a PageIr) -> Self {
        Self {
            page,
            locals: Vec::new(),
        }
    }

    /// True for state/derived/prop reads not shadowed by a local.
    pub fn is_reactive(&self, name: &str) -> bool {
        if self.locals.iter().any(|l| l == name) {
            return false;
        }
        self.page.states.iter().any(|s| s.name == name)
            || self.page.derived.iter().any(|d| d.name == name)
            || self.page.props.iter().any(|p| p.name == name)
    }

    pub fn is_state(&self, name: &str) -> bool {
        !self.locals.iter().any(|l| l == name)
            && self.page.states.iter().any(|s| s.name == name)
    }

    /// True for page-declared functions and api helpers.
    pub fn is_callable(&self, name: &str) -> bool {
        self.page.functions.iter().any(|f| f.name == name)
            || self.page.apis.iter().any(|a| a.name == name)
    }
}

/// How reactive identifiers render in script position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefMode {
    /// Plain name (React, Svelte, and all template positions)
    Plain,
    /// `.value` suffix (Vue `<script setup>`)
    Value,
}

/// An indentation-aware output buffer.
pub struct Emitter {
    out: String,
    depth: usize,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            depth: 0,
        }
    }

    pub fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.out.push('\n');
            return;
        }
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        // Collapse runs of blank lines.
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

// ---- shared expression printing --------------------------------------

/// Operator precedence for parenthesization, higher binds tighter.
fn prec(expr: &Expr) -> u8 {
    match expr {
        Expr::Ternary { .. } | Expr::Lambda { .. } => 1,
        Expr::Binary { op, .. } => match op {
            BinOp::Or => 2,
            BinOp::And => 3,
            BinOp::Eq | BinOp::Ne => 4,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 5,
            BinOp::Add | BinOp::Sub => 6,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 7,
        },
        Expr::Unary { .. } | Expr::Await(_) => 8,
        _ => 9,
    }
}

/// Escapes text for a double-quoted JS string.
pub(crate) fn js_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Escapes literal text inside a template literal.
fn template_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '`' => out.push_str("\\`"),
            '\\' => out.push_str("\\\\"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            _ => out.push(ch),
        }
    }
    out
}

/// Renders an expression as JS. `rename` substitutes identifiers (used for
/// the pending-value pattern around state mutation guards).
pub(crate) fn expr_js(
    expr: &Expr,
    cx: &Cx,
    mode: RefMode,
    rename: &HashMap<String, String>,
) -> String {
    let mut locals = Vec::new();
    write_expr(expr, cx, mode, rename, &mut locals)
}

fn write_expr(
    expr: &Expr,
    cx: &Cx,
    mode: RefMode,
    rename: &HashMap<String, String>,
    locals: &mut Vec<String>,
) -> String {
    let child = |e: &Expr, min: u8, locals: &mut Vec<String>| {
        let text = write_expr(e, cx, mode, rename, locals);
        if prec(e) < min {
            format!("({})", text)
        } else {
            text
        }
    };
    match expr {
        Expr::Int(n) => n.to_string(),
        Expr::Float(n) => {
            if n.fract() == 0.0 {
                format!("{:.1}", n)
            } else {
                n.to_string()
            }
        }
        Expr::Bool(b) => b.to_string(),
        Expr::Ident(name) => {
            if locals.iter().any(|l| l == name) {
                return name.clone();
            }
            if let Some(renamed) = rename.get(name) {
                return renamed.clone();
            }
            if cx.is_reactive(name) && mode == RefMode::Value {
                return format!("{}.value", name);
            }
            name.clone()
        }
        Expr::Str(segs) => {
            if let [StrSeg::Text(text)] = segs.as_slice() {
                return js_quote(text);
            }
            if segs.is_empty() {
                return "\"\"".to_string();
            }
            let mut out = String::from("`");
            for seg in segs {
                match seg {
                    StrSeg::Text(text) => out.push_str(&template_escape(text)),
                    StrSeg::Expr(inner) => {
                        out.push_str("${");
                        out.push_str(&write_expr(inner, cx, mode, rename, locals));
                        out.push('}');
                    }
                }
            }
            out.push('`');
            out
        }
        Expr::List(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|item| write_expr(item, cx, mode, rename, locals))
                .collect();
            format!("[{}]", rendered.join(", "))
        }
        Expr::Member(base, field) => {
            format!("{}.{}", child(base, 9, locals), field)
        }
        Expr::Index(base, index) => {
            let idx = write_expr(index, cx, mode, rename, locals);
            format!("{}[{}]", child(base, 9, locals), idx)
        }
        Expr::Call { callee, args } => {
            let rendered: Vec<String> = args
                .iter()
                .map(|arg| write_expr(arg, cx, mode, rename, locals))
                .collect();
            // Builtins, unless shadowed by a declared function or local.
            if let Expr::Ident(name) = callee.as_ref() {
                if !locals.iter().any(|l| l == name) && !cx.is_callable(name) {
                    match name.as_str() {
                        "log" => return format!("console.log({})", rendered.join(", ")),
                        "now" => return "Date.now()".to_string(),
                        _ => {}
                    }
                }
            }
            format!("{}({})", child(callee, 9, locals), rendered.join(", "))
        }
        Expr::Unary { op, expr } => {
            let inner = child(expr, 8, locals);
            match op {
                UnaryOp::Neg => format!("-{}", inner),
                UnaryOp::Not => format!("!{}", inner),
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let my = prec(expr);
            let left = child(lhs, my, locals);
            let right = child(rhs, my + 1, locals);
            format!("{} {} {}", left, op.js(), right)
        }
        Expr::Ternary { cond, then, els } => {
            let c = child(cond, 2, locals);
            let t = child(then, 2, locals);
            let f = child(els, 1, locals);
            format!("{} ? {} : {}", c, t, f)
        }
        Expr::Lambda { param, body } => {
            locals.push(param.clone());
            let rendered = write_expr(body, cx, mode, rename, locals);
            locals.pop();
            format!("({}) => {}", param, rendered)
        }
        Expr::Await(inner) => format!("await {}", child(inner, 8, locals)),
    }
}

// ---- mutation analysis (check guards) --------------------------------

/// The identifier at the root of a member/index path.
pub(crate) fn expr_root(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Ident(name) => Some(name),
        Expr::Member(base, _) | Expr::Index(base, _) => expr_root(base),
        _ => None,
    }
}

/// The state-owned list a `push` call appends to, if the expression is one.
pub(crate) fn push_target<'a>(expr: &'a Expr, cx: &Cx) -> Option<(&'a str, &'a Expr)> {
    if let Expr::Call { callee, args } = expr {
        if let Expr::Member(base, method) = callee.as_ref() {
            if method == "push" && args.len() == 1 {
                let name = expr_root(base)?;
                if cx.is_state(name) && matches!(base.as_ref(), Expr::Ident(_)) {
                    return Some((name, &args[0]));
                }
            }
        }
    }
    None
}

/// Checks whose dependency set includes the given state.
pub(crate) fn triggered_checks<'c>(state: &str, checks: &'c [CheckIr]) -> Vec<&'c CheckIr> {
    checks
        .iter()
        .filter(|check| check.deps.iter().any(|d| d == state))
        .collect()
}

// ---- shared sections -------------------------------------------------

/// Capitalizes a name for use in generated helper names.
pub(crate) fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// A page context with nothing reactive, for rendering expressions in
/// plain-JS sections.
fn empty_page() -> PageIr {
    PageIr {
        name: String::new(),
        is_component: false,
        props: Vec::new(),
        states: Vec::new(),
        derived: Vec::new(),
        functions: Vec::new(),
        effects: Vec::new(),
        checks: Vec::new(),
        apis: Vec::new(),
        styles: Vec::new(),
        seo: Vec::new(),
        layout: Vec::new(),
        components: Vec::new(),
    }
}

/// Lowers an auth/roles clause value to a JS literal. Bare identifiers in
/// configuration position mean their own name.
fn config_value(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => js_quote(name),
        Expr::Str(_) | Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) | Expr::List(_) => {
            let page = empty_page();
            expr_js(expr, &Cx::new(&page), RefMode::Plain, &HashMap::new())
        }
        _ => js_quote("unsupported"),
    }
}

/// The models section: one schema object and one validator per model,
/// identical plain JS for every target.
fn emit_models(ir: &ProgramIr, e: &mut Emitter) {
    e.line("// ===== models.js =====");
    let page = empty_page();
    let cx = Cx::new(&page);
    for model in &ir.models {
        e.blank();
        e.line(&format!("export const {}Schema = {{", title_case(&model.name)));
        e.indent();
        e.line(&format!("name: {},", js_quote(&model.name)));
        e.line("fields: {");
        e.indent();
        for field in &model.fields {
            let mut parts = vec![format!("type: {}", js_quote(&field.ty.to_string()))];
            if let Some(default) = &field.default {
                parts.push(format!(
                    "default: {}",
                    expr_js(default, &cx, RefMode::Plain, &HashMap::new())
                ));
            }
            if field.required {
                parts.push("required: true".to_string());
            }
            if field.unique {
                parts.push("unique: true".to_string());
            }
            e.line(&format!("{}: {{ {} }},", field.name, parts.join(", ")));
        }
        e.dedent();
        e.line("},");
        if !model.permissions.is_empty() {
            let entries: Vec<String> = model
                .permissions
                .iter()
                .map(|(action, scope)| format!("{}: {}", action, js_quote(scope)))
                .collect();
            e.line(&format!("permissions: {{ {} }},", entries.join(", ")));
        }
        for (key, list) in [
            ("search", &model.searchable),
            ("sort", &model.sortable),
            ("filter", &model.filterable),
        ] {
            if !list.is_empty() {
                let quoted: Vec<String> = list.iter().map(|f| js_quote(f)).collect();
                e.line(&format!("{}: [{}],", key, quoted.join(", ")));
            }
        }
        e.dedent();
        e.line("};");

        if !model.validates.is_empty() {
            e.blank();
            e.line(&format!(
                "export function validate{}(record) {{",
                title_case(&model.name)
            ));
            e.indent();
            e.line("const errors = [];");
            for rule in &model.validates {
                let rename: HashMap<String, String> = rule
                    .deps
                    .iter()
                    .map(|field| (field.clone(), format!("record.{}", field)))
                    .collect();
                let cond = expr_js(&rule.expr, &cx, RefMode::Plain, &rename);
                e.line(&format!(
                    "if (!({})) errors.push({});",
                    cond,
                    js_quote(&rule.message)
                ));
            }
            e.line("return errors;");
            e.dedent();
            e.line("}");
        }
    }
    e.blank();
}

/// The routes/auth/roles section.
fn emit_routes(ir: &ProgramIr, backend: &dyn Backend, e: &mut Emitter) {
    e.line("// ===== routes.js =====");
    if !ir.routes.is_empty() {
        let mut imported: Vec<&str> = Vec::new();
        for route in &ir.routes {
            if !imported.contains(&route.target.as_str()) {
                imported.push(&route.target);
                e.line(&format!(
                    "import {} from {};",
                    route.target,
                    js_quote(&backend.component_import(&route.target))
                ));
            }
        }
        e.blank();
        e.line("export const routes = [");
        e.indent();
        for route in &ir.routes {
            e.line(&format!(
                "{{ path: {}, component: {} }},",
                js_quote(&route.path),
                route.target
            ));
        }
        e.dedent();
        e.line("];");
    }
    if !ir.auth.is_empty() {
        e.blank();
        e.line("export const authConfig = {");
        e.indent();
        for (key, value) in &ir.auth {
            e.line(&format!("{}: {},", key, config_value(value)));
        }
        e.dedent();
        e.line("};");
    }
    if !ir.roles.is_empty() {
        e.blank();
        let quoted: Vec<String> = ir.roles.iter().map(|r| js_quote(r)).collect();
        e.line(&format!("export const roles = [{}];", quoted.join(", ")));
    }
    e.blank();
}

// ---- shared element metadata -----------------------------------------

/// HTML tag and optional class for an element kind, shared by all backends
/// so the structural expansion of high-level widgets stays consistent.
pub(crate) fn element_tag(kind: &ElementKind) -> (&'static str, Option<&'static str>) {
    match kind {
        ElementKind::Col => ("div", Some("col")),
        ElementKind::Row => ("div", Some("row")),
        ElementKind::Grid => ("div", Some("grid")),
        ElementKind::Text => ("span", None),
        ElementKind::Button => ("button", None),
        ElementKind::Input => ("input", None),
        ElementKind::Toggle => ("input", None),
        ElementKind::Image => ("img", None),
        ElementKind::Select => ("select", None),
        ElementKind::Table => ("table", Some("table")),
        ElementKind::Chart => ("div", Some("chart")),
        ElementKind::Nav => ("nav", None),
        ElementKind::Stat => ("div", Some("stat")),
        ElementKind::Modal => ("div", Some("modal")),
        ElementKind::Toast => ("div", Some("toast")),
        ElementKind::Upload => ("input", None),
        ElementKind::Realtime => ("template", None),
        ElementKind::Form => ("form", None),
        ElementKind::Field => ("label", Some("field")),
        ElementKind::Submit => ("button", None),
        ElementKind::Hero => ("section", Some("hero")),
        ElementKind::Crud => ("section", Some("crud")),
        ElementKind::Stats => ("div", Some("stats")),
        ElementKind::Breadcrumb => ("nav", Some("breadcrumb")),
        ElementKind::Drawer => ("aside", Some("drawer")),
        ElementKind::Mobile => ("div", Some("mobile")),
        ElementKind::Media => ("div", Some("media")),
        ElementKind::Social => ("div", Some("social")),
        ElementKind::Pay => ("button", Some("pay")),
        ElementKind::Confirm => ("dialog", Some("confirm")),
        ElementKind::Animate => ("div", Some("animate")),
        ElementKind::Component(_) => ("", None),
    }
}

/// Attribute keys lowered into inline style rather than passed as props.
pub(crate) fn style_key(key: &str) -> Option<&'static str> {
    match key {
        "gap" => Some("gap"),
        "padding" => Some("padding"),
        "align" => Some("align-items"),
        "justify" => Some("justify-content"),
        _ => None,
    }
}

/// The default DOM event for an element kind.
pub(crate) fn default_event(kind: &ElementKind) -> &'static str {
    match kind {
        ElementKind::Form => "submit",
        ElementKind::Input | ElementKind::Select | ElementKind::Field => "change",
        ElementKind::Toggle | ElementKind::Upload => "change",
        _ => "click",
    }
}

/// Extra fixed attributes an element kind always carries.
pub(crate) fn fixed_attrs(kind: &ElementKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        ElementKind::Toggle => &[("type", "checkbox")],
        ElementKind::Upload => &[("type", "file")],
        ElementKind::Submit => &[("type", "submit")],
        _ => &[],
    }
}

/// True if any `realtime` element appears in the tree.
pub(crate) fn has_realtime(layout: &[LayoutIr]) -> bool {
    layout.iter().any(|node| match node {
        LayoutIr::Element(el) => el.kind == ElementKind::Realtime || has_realtime(&el.children),
        LayoutIr::For { body, .. } => has_realtime(body),
        LayoutIr::If { then, els, .. } => has_realtime(then) || has_realtime(els),
    })
}

/// Component names referenced by the tree, deduplicated in first-use order.
pub(crate) fn used_components(layout: &[LayoutIr]) -> Vec<String> {
    fn walk(layout: &[LayoutIr], out: &mut Vec<String>) {
        for node in layout {
            match node {
                LayoutIr::Element(el) => {
                    if let ElementKind::Component(name) = &el.kind {
                        if !out.contains(name) {
                            out.push(name.clone());
                        }
                    }
                    walk(&el.children, out);
                }
                LayoutIr::For { body, .. } => walk(body, out),
                LayoutIr::If { then, els, .. } => {
                    walk(then, out);
                    walk(els, out);
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(layout, &mut out);
    out
}

/// A literal attribute value as CSS text: bare numbers become pixel sizes.
pub(crate) fn css_value(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Int(n) => Some(format!("{}px", n)),
        _ => expr.as_plain_str().map(str::to_string),
    }
}

/// Partitions attributes into inline-style declarations and everything
/// else. Style keys with non-literal values fall through as ordinary props.
pub(crate) fn split_style_attrs(
    attrs: &[(String, Expr)],
) -> (Vec<(&'static str, String)>, Vec<&(String, Expr)>) {
    let mut style = Vec::new();
    let mut rest = Vec::new();
    for attr in attrs {
        match (style_key(&attr.0), css_value(&attr.1)) {
            (Some(key), Some(value)) => style.push((key, value)),
            _ => rest.push(attr),
        }
    }
    (style, rest)
}

/// Page-level `style` attributes as CSS key/value pairs. Known layout keys
/// map to their CSS property names; everything else passes through.
pub(crate) fn page_style_entries(page: &PageIr) -> Vec<(String, String)> {
    let cx = Cx::new(page);
    page.styles
        .iter()
        .map(|(key, value)| {
            let css = css_value(value)
                .unwrap_or_else(|| expr_js(value, &cx, RefMode::Plain, &HashMap::new()));
            (style_key(key).unwrap_or(key).to_string(), css)
        })
        .collect()
}

/// Page `style` attributes as one inline-style string.
pub(crate) fn page_style_css(page: &PageIr) -> String {
    let entries: Vec<String> = page_style_entries(page)
        .into_iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect();
    entries.join("; ")
}

/// `seo` attributes as JS object entries. Values follow configuration
/// rules: bare identifiers mean their own name.
pub(crate) fn seo_entries(page: &PageIr) -> Vec<String> {
    page.seo
        .iter()
        .map(|(key, value)| format!("{}: {}", key, config_value(value)))
        .collect()
}

/// States written by a two-way bound input that a check rule watches.
/// Backends guard these writes outside the ordinary assignment path.
pub(crate) fn bound_checked_states(page: &PageIr) -> Vec<String> {
    fn walk(nodes: &[LayoutIr], page: &PageIr, out: &mut Vec<String>) {
        for node in nodes {
            match node {
                LayoutIr::Element(el) => {
                    if matches!(
                        el.kind,
                        ElementKind::Input | ElementKind::Select | ElementKind::Toggle
                    ) {
                        if let Some(Expr::Ident(name)) = &el.arg {
                            if page.states.iter().any(|s| &s.name == name)
                                && !triggered_checks(name, &page.checks).is_empty()
                                && !out.contains(name)
                            {
                                out.push(name.clone());
                            }
                        }
                    }
                    walk(&el.children, page, out);
                }
                LayoutIr::For { body, .. } => walk(body, page, out),
                LayoutIr::If { then, els, .. } => {
                    walk(then, page, out);
                    walk(els, page, out);
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(&page.layout, page, &mut out);
    out
}

/// The concrete event name for a binding, falling back to the element's
/// default.
pub(crate) fn event_name<'a>(el: &ElementIr, ev: &'a EventIr) -> &'a str {
    match &ev.name {
        Some(name) => name.as_str(),
        None => default_event(&el.kind),
    }
}

/// The implicit parameter name an event handler may reference, matching
/// what analysis puts in scope.
pub(crate) fn implicit_param(kind: &ElementKind, event: &str) -> &'static str {
    match kind {
        ElementKind::Realtime if event == "error" => "error",
        ElementKind::Realtime => "message",
        ElementKind::Input | ElementKind::Select | ElementKind::Toggle | ElementKind::Field => {
            "value"
        }
        ElementKind::Upload => "file",
        ElementKind::Form | ElementKind::Submit | ElementKind::Crud => "form",
        _ => "event",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn ir_of(src: &str) -> ProgramIr {
        analyze(&parse(&tokenize(src).unwrap()).unwrap(), true).unwrap()
    }

    #[test]
    fn expression_precedence_is_preserved() {
        let ir = ir_of("page P:\n  state a: int = 0\n  derived x = (a + 1) * 2\n");
        let cx = Cx::new(&ir.pages[0]);
        let text = expr_js(
            &ir.pages[0].derived[0].expr,
            &cx,
            RefMode::Plain,
            &HashMap::new(),
        );
        assert_eq!(text, "(a + 1) * 2");
    }

    #[test]
    fn vue_mode_adds_value_suffix_to_reactive_reads() {
        let ir = ir_of("page P:\n  state a: int = 0\n  derived x = a + 1\n");
        let cx = Cx::new(&ir.pages[0]);
        let text = expr_js(
            &ir.pages[0].derived[0].expr,
            &cx,
            RefMode::Value,
            &HashMap::new(),
        );
        assert_eq!(text, "a.value + 1");
    }

    #[test]
    fn lambda_parameters_shadow_reactive_names() {
        let ir = ir_of(
            "page P:\n  state items: list[int] = []\n  derived big = items.filter(x => x > 10)\n",
        );
        let cx = Cx::new(&ir.pages[0]);
        let text = expr_js(
            &ir.pages[0].derived[0].expr,
            &cx,
            RefMode::Value,
            &HashMap::new(),
        );
        assert_eq!(text, "items.value.filter((x) => x > 10)");
    }

    #[test]
    fn interpolated_string_becomes_template_literal() {
        let ir = ir_of("page P:\n  state n: int = 0\n  derived label = \"n = {n}\"\n");
        let cx = Cx::new(&ir.pages[0]);
        let text = expr_js(
            &ir.pages[0].derived[0].expr,
            &cx,
            RefMode::Plain,
            &HashMap::new(),
        );
        assert_eq!(text, "`n = ${n}`");
    }

    #[test]
    fn generate_is_deterministic() {
        let ir = ir_of(
            "page Counter:\n  state count: int = 0\n  derived doubled = count * 2\n  fn increment():\n    count = count + 1\n  layout:\n    col gap=16:\n      text \"Count: {doubled}\"\n      button \"+1\" -> increment()\n",
        );
        for target in [Target::React, Target::Vue, Target::Svelte] {
            let a = generate(&ir, target).unwrap();
            let b = generate(&ir, target).unwrap();
            assert_eq!(a.code, b.code);
            assert_eq!(a.line_count, b.line_count);
            assert_eq!(a.token_count, b.token_count);
            assert!(a.line_count > 0);
            assert!(a.token_count > 0);
        }
    }

    #[test]
    fn targets_differ_in_reactivity_markers() {
        let ir = ir_of(
            "page Counter:\n  state count: int = 0\n  derived doubled = count * 2\n  layout:\n    text \"{doubled}\"\n",
        );
        let react = generate(&ir, Target::React).unwrap().code;
        let vue = generate(&ir, Target::Vue).unwrap().code;
        let svelte = generate(&ir, Target::Svelte).unwrap().code;
        assert!(react.contains("useState"));
        assert!(vue.contains("ref(") && vue.contains("computed("));
        assert!(svelte.contains("$:"));
        assert!(!react.contains("$:"));
        assert!(!svelte.contains("useState"));
    }

    #[test]
    fn model_section_carries_messages_verbatim() {
        let ir = ir_of(
            "model Task:\n  title: str required\n  validate title.length > 0 \"Title is required\"\n",
        );
        for target in [Target::React, Target::Vue, Target::Svelte] {
            let out = generate(&ir, target).unwrap();
            assert!(out.code.contains("\"Title is required\""));
            assert!(out.code.contains("export const TaskSchema"));
            assert!(out.code.contains("validateTask"));
        }
    }

    #[test]
    fn routes_and_auth_are_emitted() {
        let ir = ir_of(
            "page Home:\n  layout:\n    text \"hi\"\nroute / -> Home\nauth:\n  provider email\nroles: admin, viewer\n",
        );
        let out = generate(&ir, Target::React).unwrap().code;
        assert!(out.contains("export const routes"));
        assert!(out.contains("{ path: \"/\", component: Home }"));
        assert!(out.contains("provider: \"email\""));
        assert!(out.contains("export const roles = [\"admin\", \"viewer\"];"));
    }
}
