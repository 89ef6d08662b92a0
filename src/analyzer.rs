//! # Semantic Analyzer
//!
//! Turns a parsed [`Program`](crate::ast::Program) into the backend-agnostic
//! [`ProgramIr`](crate::ir::ProgramIr). Responsibilities, in order:
//!
//! 1. one symbol table per page/component scope, rejecting duplicates;
//! 2. resolution of every identifier to the nearest enclosing scope;
//! 3. the derived-value dependency graph, topologically sorted — cycles are
//!    an error naming the participating identifiers;
//! 4. boolean-ness of every `check`/`validate` expression;
//! 5. `watch` targets must be declared state;
//! 6. minimal static typing over declared types.
//!
//! Steps 4 and 6 are skipped when the caller disables validation; identifier
//! resolution always runs. Analysis is fail-fast: the first error aborts and
//! no partial IR is produced.

use crate::ast::*;
use crate::ir::*;
use indexmap::IndexMap;
use thiserror::Error;

/// Semantic errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    #[error("duplicate declaration of `{name}` in {scope}")]
    DuplicateDeclaration { name: String, scope: String },

    #[error("undefined identifier `{name}` in {scope}")]
    UndefinedIdentifier { name: String, scope: String },

    #[error("dependency cycle among derived values: {}", names.join(", "))]
    DependencyCycle { names: Vec<String> },

    #[error("`{keyword}` expression must be boolean, found {found} (rule: \"{message}\")")]
    NonBooleanCheck {
        keyword: String,
        found: String,
        message: String,
    },

    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
        context: String,
    },

    #[error("`watch {name}` must reference a declared state variable")]
    InvalidWatchTarget { name: String },

    #[error("unknown type `{name}`")]
    UnknownType { name: String },

    #[error("component `{name}` is not declared")]
    UndefinedComponent { name: String },
}

type SResult<T> = Result<T, SemanticError>;

/// Inferred types. `Unknown` is deliberately infectious: anything the
/// analyzer cannot pin down passes every later test rather than producing a
/// spurious mismatch.
#[derive(Debug, Clone, PartialEq)]
enum Ty {
    Int,
    Float,
    Str,
    Bool,
    Datetime,
    List(Box<Ty>),
    Record(String),
    Fn,
    Void,
    Unknown,
}

impl Ty {
    fn is_numeric(&self) -> bool {
        matches!(self, Ty::Int | Ty::Float | Ty::Unknown)
    }
}

impl std::fmt::Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ty::Int => write!(f, "int"),
            Ty::Float => write!(f, "float"),
            Ty::Str => write!(f, "str"),
            Ty::Bool => write!(f, "bool"),
            Ty::Datetime => write!(f, "datetime"),
            Ty::List(inner) => write!(f, "list[{}]", inner),
            Ty::Record(name) => write!(f, "{}", name),
            Ty::Fn => write!(f, "fn"),
            Ty::Void => write!(f, "void"),
            Ty::Unknown => write!(f, "?"),
        }
    }
}

/// What a page-scope name refers to.
#[derive(Debug, Clone, PartialEq)]
enum Symbol {
    State(Ty),
    Derived(Ty),
    Prop(Ty),
    Function,
    Api,
}

/// Entry point: analyzes a program. `validate` controls check/type-rule
/// enforcement; identifier resolution and cycle detection always run.
pub fn analyze(program: &Program, validate: bool) -> SResult<ProgramIr> {
    Analyzer::new(validate).run(program)
}

struct Analyzer {
    validate: bool,
    /// Model name -> field name -> type
    records: IndexMap<String, IndexMap<String, Ty>>,
    /// Declared page names (route targets)
    pages: Vec<String>,
    /// Declared component names (usable in layouts)
    components: Vec<String>,
}

impl Analyzer {
    fn new(validate: bool) -> Self {
        Self {
            validate,
            records: IndexMap::new(),
            pages: Vec::new(),
            components: Vec::new(),
        }
    }

    fn run(mut self, program: &Program) -> SResult<ProgramIr> {
        // Pass 1: collect global names so forward references work.
        for decl in &program.decls {
            match decl {
                Decl::Model(m) => {
                    if self.records.contains_key(&m.name) {
                        return Err(SemanticError::DuplicateDeclaration {
                            name: m.name.clone(),
                            scope: "program".to_string(),
                        });
                    }
                    self.records.insert(m.name.clone(), IndexMap::new());
                }
                Decl::Page(p) => self.pages.push(p.name.clone()),
                Decl::Component(c) => self.components.push(c.name.clone()),
                _ => {}
            }
        }
        for decl in &program.decls {
            if let Decl::Model(m) = decl {
                let mut fields = IndexMap::new();
                for field in &m.fields {
                    if fields.contains_key(&field.name) {
                        return Err(SemanticError::DuplicateDeclaration {
                            name: field.name.clone(),
                            scope: format!("model `{}`", m.name),
                        });
                    }
                    fields.insert(field.name.clone(), self.lower_type(&field.ty)?);
                }
                self.records[&m.name] = fields;
            }
        }

        // Pass 2: analyze each declaration.
        let mut ir = ProgramIr {
            pages: Vec::new(),
            components: Vec::new(),
            models: Vec::new(),
            routes: Vec::new(),
            auth: Vec::new(),
            roles: Vec::new(),
        };
        for decl in &program.decls {
            match decl {
                Decl::Page(p) => ir.pages.push(self.analyze_page(p, false)?),
                Decl::Component(c) => ir.components.push(self.analyze_page(c, true)?),
                Decl::Model(m) => ir.models.push(self.analyze_model(m)?),
                Decl::Route(r) => {
                    if !self.pages.contains(&r.target) && !self.components.contains(&r.target) {
                        return Err(SemanticError::UndefinedIdentifier {
                            name: r.target.clone(),
                            scope: format!("route `{}`", r.path),
                        });
                    }
                    ir.routes.push(RouteIr {
                        path: r.path.clone(),
                        target: r.target.clone(),
                    });
                }
                Decl::Auth(a) => ir.auth.extend(a.clauses.iter().cloned()),
                Decl::Roles(r) => ir.roles.extend(r.roles.iter().cloned()),
            }
        }
        log::debug!(
            "analyzed {} pages, {} components, {} models",
            ir.pages.len(),
            ir.components.len(),
            ir.models.len()
        );
        Ok(ir)
    }

    fn lower_type(&self, ty: &TypeExpr) -> SResult<Ty> {
        Ok(match ty {
            TypeExpr::Int => Ty::Int,
            TypeExpr::Float => Ty::Float,
            TypeExpr::Str => Ty::Str,
            TypeExpr::Bool => Ty::Bool,
            TypeExpr::Datetime => Ty::Datetime,
            TypeExpr::List(inner) => Ty::List(Box::new(self.lower_type(inner)?)),
            TypeExpr::Named(name) => {
                if !self.records.contains_key(name) {
                    return Err(SemanticError::UnknownType { name: name.clone() });
                }
                Ty::Record(name.clone())
            }
        })
    }

    // ---- models ------------------------------------------------------

    fn analyze_model(&mut self, model: &ModelDecl) -> SResult<ModelIr> {
        let scope_name = format!("model `{}`", model.name);
        let mut fields = Vec::new();
        for field in &model.fields {
            let ty = self.lower_type(&field.ty)?;
            if let Some(default) = &field.default {
                let mut scope = PageScope::for_model(&self.records[&model.name], &scope_name);
                let found = self.infer(&mut scope, default)?;
                if self.validate && !assignable(&ty, &found) {
                    return Err(SemanticError::TypeMismatch {
                        expected: ty.to_string(),
                        found: found.to_string(),
                        context: format!("default of field `{}.{}`", model.name, field.name),
                    });
                }
            }
            fields.push(FieldIr {
                name: field.name.clone(),
                ty: field.ty.clone(),
                default: field.default.clone(),
                required: field.required,
                unique: field.unique,
            });
        }

        let mut validates = Vec::new();
        for rule in &model.validates {
            let mut scope = PageScope::for_model(&self.records[&model.name], &scope_name);
            let ty = self.infer(&mut scope, &rule.expr)?;
            if self.validate && !matches!(ty, Ty::Bool | Ty::Unknown) {
                return Err(SemanticError::NonBooleanCheck {
                    keyword: rule.kind.as_str().to_string(),
                    found: ty.to_string(),
                    message: rule.message.clone(),
                });
            }
            validates.push(CheckIr {
                expr: rule.expr.clone(),
                message: rule.message.clone(),
                deps: collect_idents(&rule.expr),
            });
        }

        Ok(ModelIr {
            name: model.name.clone(),
            fields,
            validates,
            permissions: model
                .permissions
                .iter()
                .map(|p| (p.action.as_str().to_string(), p.scope.clone()))
                .collect(),
            searchable: model.searchable.clone(),
            sortable: model.sortable.clone(),
            filterable: model.filterable.clone(),
        })
    }

    // ---- pages -------------------------------------------------------

    fn analyze_page(&mut self, page: &PageDecl, is_component: bool) -> SResult<PageIr> {
        let scope_name = format!(
            "{} `{}`",
            if is_component { "component" } else { "page" },
            page.name
        );

        // Local `type` declarations extend the record environment for the
        // duration of this page.
        let saved_records = self.records.clone();
        for tdecl in &page.types {
            let mut fields = IndexMap::new();
            for field in &tdecl.fields {
                fields.insert(field.name.clone(), self.lower_type(&field.ty)?);
            }
            self.records.insert(tdecl.name.clone(), fields);
        }
        // Nested components are visible inside this page's layout.
        let saved_components = self.components.clone();
        for nested in &page.components {
            self.components.push(nested.name.clone());
        }

        let result = self.analyze_page_inner(page, is_component, &scope_name);

        self.records = saved_records;
        self.components = saved_components;
        result
    }

    fn analyze_page_inner(
        &mut self,
        page: &PageDecl,
        is_component: bool,
        scope_name: &str,
    ) -> SResult<PageIr> {
        let mut scope = PageScope::new(scope_name);

        for prop in &page.props {
            let ty = self.lower_type(&prop.ty)?;
            scope.declare(&prop.name, Symbol::Prop(ty))?;
        }
        for state in &page.states {
            let ty = self.lower_type(&state.ty)?;
            scope.declare(&state.name, Symbol::State(ty))?;
        }
        for derived in &page.derived {
            scope.declare(&derived.name, Symbol::Derived(Ty::Unknown))?;
        }
        for function in &page.functions {
            scope.declare(&function.name, Symbol::Function)?;
        }
        for api in &page.apis {
            scope.declare(&api.name, Symbol::Api)?;
        }

        // State initializers.
        let mut states = Vec::new();
        for state in &page.states {
            let declared = self.lower_type(&state.ty)?;
            let found = self.infer(&mut scope, &state.init)?;
            if self.validate && !assignable(&declared, &found) {
                return Err(SemanticError::TypeMismatch {
                    expected: declared.to_string(),
                    found: found.to_string(),
                    context: format!("initializer of state `{}`", state.name),
                });
            }
            states.push(StateIr {
                name: state.name.clone(),
                ty: state.ty.clone(),
                init: state.init.clone(),
            });
        }

        // Derived values: resolve, collect dependencies, topo-sort.
        let derived = self.order_derived(&mut scope, page)?;

        // Functions.
        let mut functions = Vec::new();
        for function in &page.functions {
            scope.push_locals(&function.params);
            self.check_stmts(&mut scope, &function.body)?;
            scope.pop_locals();
            functions.push(FunctionIr {
                name: function.name.clone(),
                params: function.params.clone(),
                body: function.body.clone(),
                is_async: stmts_await(&function.body),
            });
        }

        // Effects.
        let mut effects = Vec::new();
        for effect in &page.effects {
            match effect {
                EffectDecl::Mount { body, .. } => {
                    self.check_stmts(&mut scope, body)?;
                    effects.push(EffectIr::Mount {
                        body: body.clone(),
                        is_async: stmts_await(body),
                    });
                }
                EffectDecl::Watch { target, body, .. } => {
                    if !matches!(scope.lookup(target), Some(Symbol::State(_))) {
                        return Err(SemanticError::InvalidWatchTarget {
                            name: target.clone(),
                        });
                    }
                    self.check_stmts(&mut scope, body)?;
                    effects.push(EffectIr::Watch {
                        target: target.clone(),
                        body: body.clone(),
                        is_async: stmts_await(body),
                    });
                }
            }
        }

        // Checks. Identifier resolution always; boolean-ness only when
        // validation is on.
        let mut checks = Vec::new();
        for check in &page.checks {
            let ty = self.infer(&mut scope, &check.expr)?;
            if self.validate && !matches!(ty, Ty::Bool | Ty::Unknown) {
                return Err(SemanticError::NonBooleanCheck {
                    keyword: check.kind.as_str().to_string(),
                    found: ty.to_string(),
                    message: check.message.clone(),
                });
            }
            let state_names: Vec<String> = collect_idents(&check.expr)
                .into_iter()
                .filter(|n| matches!(scope.lookup(n), Some(Symbol::State(_))))
                .collect();
            checks.push(CheckIr {
                expr: check.expr.clone(),
                message: check.message.clone(),
                deps: state_names,
            });
        }

        // APIs: url must be a string expression.
        let mut apis = Vec::new();
        for api in &page.apis {
            let ty = self.infer(&mut scope, &api.url)?;
            if self.validate && !matches!(ty, Ty::Str | Ty::Unknown) {
                return Err(SemanticError::TypeMismatch {
                    expected: "str".to_string(),
                    found: ty.to_string(),
                    context: format!("url of api `{}`", api.name),
                });
            }
            apis.push(ApiIr {
                name: api.name.clone(),
                url: api.url.clone(),
                awaited: api.awaited,
            });
        }

        // Page-level style/seo attributes resolve like any other attribute.
        for attr in page.styles.iter().chain(&page.seo) {
            self.infer(&mut scope, &attr.value)?;
        }

        // Layout.
        let layout = match &page.layout {
            Some(children) => self.lower_layout(&mut scope, children)?,
            None => Vec::new(),
        };

        // Nested components.
        let mut components = Vec::new();
        for nested in &page.components {
            components.push(self.analyze_page(nested, true)?);
        }

        Ok(PageIr {
            name: page.name.clone(),
            is_component,
            props: page
                .props
                .iter()
                .map(|p| PropIr {
                    name: p.name.clone(),
                    ty: p.ty.clone(),
                })
                .collect(),
            states,
            derived,
            functions,
            effects,
            checks,
            apis,
            styles: page
                .styles
                .iter()
                .map(|a| (a.key.clone(), a.value.clone()))
                .collect(),
            seo: page
                .seo
                .iter()
                .map(|a| (a.key.clone(), a.value.clone()))
                .collect(),
            layout,
            components,
        })
    }

    /// Resolves derived expressions, builds the dependency graph restricted
    /// to reactive names, and returns the declarations in topological order.
    fn order_derived(&self, scope: &mut PageScope, page: &PageDecl) -> SResult<Vec<DerivedIr>> {
        let derived_names: Vec<String> = page.derived.iter().map(|d| d.name.clone()).collect();

        let mut deps_of: IndexMap<String, Vec<String>> = IndexMap::new();
        for d in &page.derived {
            // Resolution pass (errors on undefined identifiers).
            self.infer(scope, &d.expr)?;
            let reactive: Vec<String> = collect_idents(&d.expr)
                .into_iter()
                .filter(|n| {
                    matches!(
                        scope.lookup(n),
                        Some(Symbol::State(_) | Symbol::Derived(_) | Symbol::Prop(_))
                    )
                })
                .collect();
            deps_of.insert(d.name.clone(), reactive);
        }

        // Kahn's algorithm over derived-to-derived edges, declaration order
        // breaking ties so emission is deterministic.
        let mut in_degree: IndexMap<&str, usize> = IndexMap::new();
        for name in &derived_names {
            let count = deps_of[name]
                .iter()
                .filter(|dep| derived_names.contains(dep))
                .count();
            in_degree.insert(name.as_str(), count);
        }
        let mut ordered: Vec<String> = Vec::new();
        while !in_degree.is_empty() {
            let next = in_degree
                .iter()
                .find(|(_, deg)| **deg == 0)
                .map(|(name, _)| name.to_string());
            let Some(next) = next else {
                // Everything left participates in (or depends on) a cycle.
                let cycle: Vec<String> = in_degree.keys().map(|name| name.to_string()).collect();
                return Err(SemanticError::DependencyCycle { names: cycle });
            };
            in_degree.shift_remove(next.as_str());
            // Release dependents.
            for name in &derived_names {
                if deps_of[name].contains(&next) {
                    if let Some(deg) = in_degree.get_mut(name.as_str()) {
                        *deg = deg.saturating_sub(1);
                    }
                }
            }
            ordered.push(next);
        }

        // Infer types in topological order so later entries see earlier ones.
        let mut result = Vec::new();
        for name in &ordered {
            let decl = page.derived.iter().find(|d| &d.name == name).unwrap();
            let ty = self.infer(scope, &decl.expr)?;
            scope.update(name, Symbol::Derived(ty));
            result.push(DerivedIr {
                name: decl.name.clone(),
                expr: decl.expr.clone(),
                deps: deps_of[name].clone(),
            });
        }
        Ok(result)
    }

    // ---- statements --------------------------------------------------

    fn check_stmts(&self, scope: &mut PageScope, stmts: &[Stmt]) -> SResult<()> {
        for stmt in stmts {
            match stmt {
                Stmt::Assign { target, value, .. } => {
                    let target_ty = self.infer(scope, target)?;
                    let value_ty = self.infer(scope, value)?;
                    if let Expr::Ident(name) = target {
                        if let Some(Symbol::Derived(_)) = scope.lookup(name) {
                            return Err(SemanticError::TypeMismatch {
                                expected: "a mutable state variable".to_string(),
                                found: format!("derived value `{}`", name),
                                context: "assignment target".to_string(),
                            });
                        }
                    }
                    if self.validate && !assignable(&target_ty, &value_ty) {
                        return Err(SemanticError::TypeMismatch {
                            expected: target_ty.to_string(),
                            found: value_ty.to_string(),
                            context: "assignment".to_string(),
                        });
                    }
                }
                Stmt::If { cond, then, els, .. } => {
                    let ty = self.infer(scope, cond)?;
                    if self.validate && !matches!(ty, Ty::Bool | Ty::Unknown) {
                        return Err(SemanticError::TypeMismatch {
                            expected: "bool".to_string(),
                            found: ty.to_string(),
                            context: "if condition".to_string(),
                        });
                    }
                    self.check_stmts(scope, then)?;
                    self.check_stmts(scope, els)?;
                }
                Stmt::Expr { expr, .. } => {
                    self.infer(scope, expr)?;
                }
            }
        }
        Ok(())
    }

    // ---- layout ------------------------------------------------------

    fn lower_layout(
        &self,
        scope: &mut PageScope,
        children: &[LayoutChild],
    ) -> SResult<Vec<LayoutIr>> {
        let mut out = Vec::new();
        for child in children {
            out.push(match child {
                LayoutChild::Node(node) => LayoutIr::Element(self.lower_element(scope, node)?),
                LayoutChild::For { var, iter, body, .. } => {
                    let iter_ty = self.infer(scope, iter)?;
                    let item_ty = match &iter_ty {
                        Ty::List(inner) => (**inner).clone(),
                        _ => Ty::Unknown,
                    };
                    let key_field = match &item_ty {
                        Ty::Record(name) => self
                            .records
                            .get(name)
                            .filter(|fields| fields.contains_key("id"))
                            .map(|_| "id".to_string()),
                        _ => None,
                    };
                    scope.push_local(var, item_ty);
                    let body = self.lower_layout(scope, body)?;
                    scope.pop_locals();
                    LayoutIr::For {
                        var: var.clone(),
                        iter: iter.clone(),
                        key_field,
                        body,
                    }
                }
                LayoutChild::If { cond, then, els, .. } => {
                    let ty = self.infer(scope, cond)?;
                    if self.validate && !matches!(ty, Ty::Bool | Ty::Unknown) {
                        return Err(SemanticError::TypeMismatch {
                            expected: "bool".to_string(),
                            found: ty.to_string(),
                            context: "layout if condition".to_string(),
                        });
                    }
                    LayoutIr::If {
                        cond: cond.clone(),
                        then: self.lower_layout(scope, then)?,
                        els: self.lower_layout(scope, els)?,
                    }
                }
            });
        }
        Ok(out)
    }

    fn lower_element(&self, scope: &mut PageScope, node: &LayoutNode) -> SResult<ElementIr> {
        let kind = match ElementKind::from_word(&node.kind) {
            Some(kind) => kind,
            None => {
                if !self.components.contains(&node.kind) {
                    return Err(SemanticError::UndefinedComponent {
                        name: node.kind.clone(),
                    });
                }
                ElementKind::Component(node.kind.clone())
            }
        };

        // `form Task` / `crud Task` reference a model by name; other args are
        // ordinary expressions.
        if let Some(arg) = &node.arg {
            let is_model_ref = matches!(
                (&kind, arg),
                (ElementKind::Form | ElementKind::Crud | ElementKind::Table, Expr::Ident(name))
                    if self.records.contains_key(name)
            );
            if !is_model_ref {
                self.infer(scope, arg)?;
            }
        }
        for attr in &node.attrs {
            self.infer(scope, &attr.value)?;
        }
        for event in &node.events {
            scope.push_locals(&implicit_event_names(&kind));
            self.infer(scope, &event.handler)?;
            scope.pop_locals();
        }

        let children = self.lower_layout(scope, &node.children)?;
        Ok(ElementIr {
            kind,
            arg: node.arg.clone(),
            attrs: node
                .attrs
                .iter()
                .map(|a| (a.key.clone(), a.value.clone()))
                .collect(),
            events: node
                .events
                .iter()
                .map(|e| EventIr {
                    name: e.event.clone(),
                    handler: e.handler.clone(),
                })
                .collect(),
            children,
        })
    }

    // ---- expression inference ----------------------------------------

    fn infer(&self, scope: &mut PageScope, expr: &Expr) -> SResult<Ty> {
        match expr {
            Expr::Int(_) => Ok(Ty::Int),
            Expr::Float(_) => Ok(Ty::Float),
            Expr::Bool(_) => Ok(Ty::Bool),
            Expr::Str(segs) => {
                for seg in segs {
                    if let StrSeg::Expr(inner) = seg {
                        self.infer(scope, inner)?;
                    }
                }
                Ok(Ty::Str)
            }
            Expr::List(items) => {
                let mut inner = Ty::Unknown;
                for item in items {
                    let ty = self.infer(scope, item)?;
                    if inner == Ty::Unknown {
                        inner = ty;
                    } else if inner != ty {
                        inner = Ty::Unknown;
                    }
                }
                Ok(Ty::List(Box::new(inner)))
            }
            Expr::Ident(name) => scope.resolve(name),
            Expr::Member(base, field) => {
                let base_ty = self.infer(scope, base)?;
                match (&base_ty, field.as_str()) {
                    (Ty::List(_) | Ty::Str, "length") => Ok(Ty::Int),
                    (Ty::List(_), "filter" | "map" | "reduce" | "find" | "push") => Ok(Ty::Fn),
                    (Ty::Record(record), _) => {
                        match self.records.get(record).and_then(|f| f.get(field)) {
                            Some(ty) => Ok(ty.clone()),
                            None => Err(SemanticError::UndefinedIdentifier {
                                name: format!("{}.{}", record, field),
                                scope: scope.name.clone(),
                            }),
                        }
                    }
                    _ => Ok(Ty::Unknown),
                }
            }
            Expr::Index(base, index) => {
                let base_ty = self.infer(scope, base)?;
                self.infer(scope, index)?;
                Ok(match base_ty {
                    Ty::List(inner) => *inner,
                    Ty::Str => Ty::Str,
                    _ => Ty::Unknown,
                })
            }
            Expr::Call { callee, args } => self.infer_call(scope, callee, args),
            Expr::Unary { op, expr } => {
                let ty = self.infer(scope, expr)?;
                match op {
                    UnaryOp::Neg => {
                        if self.validate && !ty.is_numeric() {
                            return Err(SemanticError::TypeMismatch {
                                expected: "int or float".to_string(),
                                found: ty.to_string(),
                                context: "unary `-`".to_string(),
                            });
                        }
                        Ok(ty)
                    }
                    UnaryOp::Not => {
                        if self.validate && !matches!(ty, Ty::Bool | Ty::Unknown) {
                            return Err(SemanticError::TypeMismatch {
                                expected: "bool".to_string(),
                                found: ty.to_string(),
                                context: "logical negation".to_string(),
                            });
                        }
                        Ok(Ty::Bool)
                    }
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let lt = self.infer(scope, lhs)?;
                let rt = self.infer(scope, rhs)?;
                self.infer_binary(*op, lt, rt)
            }
            Expr::Ternary { cond, then, els } => {
                let cond_ty = self.infer(scope, cond)?;
                if self.validate && !matches!(cond_ty, Ty::Bool | Ty::Unknown) {
                    return Err(SemanticError::TypeMismatch {
                        expected: "bool".to_string(),
                        found: cond_ty.to_string(),
                        context: "ternary condition".to_string(),
                    });
                }
                let then_ty = self.infer(scope, then)?;
                let els_ty = self.infer(scope, els)?;
                Ok(if then_ty == els_ty { then_ty } else { Ty::Unknown })
            }
            Expr::Lambda { param, body } => {
                scope.push_local(param, Ty::Unknown);
                self.infer(scope, body)?;
                scope.pop_locals();
                Ok(Ty::Fn)
            }
            Expr::Await(inner) => self.infer(scope, inner),
        }
    }

    fn infer_call(&self, scope: &mut PageScope, callee: &Expr, args: &[Expr]) -> SResult<Ty> {
        // Collection methods get their element types threaded through.
        if let Expr::Member(base, method) = callee {
            let base_ty = self.infer(scope, base)?;
            if let Ty::List(inner) = &base_ty {
                match method.as_str() {
                    "filter" => {
                        self.infer_args(scope, args)?;
                        return Ok(base_ty.clone());
                    }
                    "map" => {
                        self.infer_args(scope, args)?;
                        return Ok(Ty::List(Box::new(Ty::Unknown)));
                    }
                    "reduce" => {
                        self.infer_args(scope, args)?;
                        return Ok(Ty::Unknown);
                    }
                    "find" => {
                        self.infer_args(scope, args)?;
                        return Ok((**inner).clone());
                    }
                    "push" => {
                        for arg in args {
                            let arg_ty = self.infer(scope, arg)?;
                            if self.validate && !assignable(inner, &arg_ty) {
                                return Err(SemanticError::TypeMismatch {
                                    expected: inner.to_string(),
                                    found: arg_ty.to_string(),
                                    context: "push argument".to_string(),
                                });
                            }
                        }
                        return Ok(Ty::Void);
                    }
                    _ => {}
                }
            }
            self.infer_args(scope, args)?;
            return Ok(Ty::Unknown);
        }

        if let Expr::Ident(name) = callee {
            self.infer_args(scope, args)?;
            return match scope.lookup(name) {
                Some(Symbol::Function) => Ok(Ty::Unknown),
                Some(Symbol::Api) => Ok(Ty::Unknown),
                Some(_) => Ok(Ty::Unknown),
                None => match name.as_str() {
                    // Ambient builtins available in every scope.
                    "log" => Ok(Ty::Void),
                    "now" => Ok(Ty::Datetime),
                    _ => {
                        if scope.has_local(name) {
                            Ok(Ty::Unknown)
                        } else {
                            Err(SemanticError::UndefinedIdentifier {
                                name: name.clone(),
                                scope: scope.name.clone(),
                            })
                        }
                    }
                },
            };
        }

        self.infer(scope, callee)?;
        self.infer_args(scope, args)?;
        Ok(Ty::Unknown)
    }

    fn infer_args(&self, scope: &mut PageScope, args: &[Expr]) -> SResult<()> {
        for arg in args {
            self.infer(scope, arg)?;
        }
        Ok(())
    }

    fn infer_binary(&self, op: BinOp, lt: Ty, rt: Ty) -> SResult<Ty> {
        match op {
            BinOp::Add => {
                if lt == Ty::Str || rt == Ty::Str {
                    return Ok(Ty::Str);
                }
                if self.validate && (!lt.is_numeric() || !rt.is_numeric()) {
                    return Err(SemanticError::TypeMismatch {
                        expected: "int, float, or str".to_string(),
                        found: format!("{} + {}", lt, rt),
                        context: "binary `+`".to_string(),
                    });
                }
                Ok(numeric_join(lt, rt))
            }
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                if self.validate && (!lt.is_numeric() || !rt.is_numeric()) {
                    return Err(SemanticError::TypeMismatch {
                        expected: "int or float".to_string(),
                        found: format!("{} and {}", lt, rt),
                        context: "arithmetic".to_string(),
                    });
                }
                Ok(numeric_join(lt, rt))
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                if self.validate
                    && !(lt.is_numeric() && rt.is_numeric()
                        || lt == Ty::Str && rt == Ty::Str
                        || lt == Ty::Datetime && rt == Ty::Datetime
                        || lt == Ty::Unknown
                        || rt == Ty::Unknown)
                {
                    return Err(SemanticError::TypeMismatch {
                        expected: "comparable operands".to_string(),
                        found: format!("{} and {}", lt, rt),
                        context: "comparison".to_string(),
                    });
                }
                Ok(Ty::Bool)
            }
            BinOp::Eq | BinOp::Ne => Ok(Ty::Bool),
            BinOp::And | BinOp::Or => {
                if self.validate
                    && !(matches!(lt, Ty::Bool | Ty::Unknown) && matches!(rt, Ty::Bool | Ty::Unknown))
                {
                    return Err(SemanticError::TypeMismatch {
                        expected: "bool".to_string(),
                        found: format!("{} and {}", lt, rt),
                        context: "logical operator".to_string(),
                    });
                }
                Ok(Ty::Bool)
            }
        }
    }
}

fn numeric_join(lt: Ty, rt: Ty) -> Ty {
    match (lt, rt) {
        (Ty::Int, Ty::Int) => Ty::Int,
        (Ty::Unknown, _) | (_, Ty::Unknown) => Ty::Unknown,
        _ => Ty::Float,
    }
}

fn assignable(expected: &Ty, found: &Ty) -> bool {
    match (expected, found) {
        (Ty::Unknown, _) | (_, Ty::Unknown) => true,
        (Ty::Float, Ty::Int) => true,
        (Ty::List(a), Ty::List(b)) => assignable(a, b),
        (a, b) => a == b,
    }
}

/// Implicit identifiers available inside an event handler, by element.
fn implicit_event_names(kind: &ElementKind) -> Vec<String> {
    let names: &[&str] = match kind {
        ElementKind::Realtime => &["event", "message", "error"],
        ElementKind::Input | ElementKind::Select | ElementKind::Toggle | ElementKind::Field => {
            &["event", "value"]
        }
        ElementKind::Upload => &["event", "file"],
        ElementKind::Form | ElementKind::Submit | ElementKind::Crud => &["event", "form"],
        _ => &["event"],
    };
    names.iter().map(|s| s.to_string()).collect()
}

/// All identifiers read by an expression, in reading order, minus names
/// shadowed by lambda parameters. Deduplicated, order preserved.
fn collect_idents(expr: &Expr) -> Vec<String> {
    fn walk(expr: &Expr, shadowed: &mut Vec<String>, out: &mut Vec<String>) {
        match expr {
            Expr::Ident(name) => {
                if !shadowed.contains(name) && !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Str(segs) => {
                for seg in segs {
                    if let StrSeg::Expr(inner) = seg {
                        walk(inner, shadowed, out);
                    }
                }
            }
            Expr::List(items) => {
                for item in items {
                    walk(item, shadowed, out);
                }
            }
            Expr::Member(base, _) => walk(base, shadowed, out),
            Expr::Index(base, index) => {
                walk(base, shadowed, out);
                walk(index, shadowed, out);
            }
            Expr::Call { callee, args } => {
                walk(callee, shadowed, out);
                for arg in args {
                    walk(arg, shadowed, out);
                }
            }
            Expr::Unary { expr, .. } | Expr::Await(expr) => walk(expr, shadowed, out),
            Expr::Binary { lhs, rhs, .. } => {
                walk(lhs, shadowed, out);
                walk(rhs, shadowed, out);
            }
            Expr::Ternary { cond, then, els } => {
                walk(cond, shadowed, out);
                walk(then, shadowed, out);
                walk(els, shadowed, out);
            }
            Expr::Lambda { param, body } => {
                shadowed.push(param.clone());
                walk(body, shadowed, out);
                shadowed.pop();
            }
            Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) => {}
        }
    }
    let mut out = Vec::new();
    walk(expr, &mut Vec::new(), &mut out);
    out
}

/// True if any statement in the block contains an `await`.
fn stmts_await(stmts: &[Stmt]) -> bool {
    fn expr_awaits(expr: &Expr) -> bool {
        match expr {
            Expr::Await(_) => true,
            Expr::Str(segs) => segs.iter().any(|s| match s {
                StrSeg::Expr(e) => expr_awaits(e),
                StrSeg::Text(_) => false,
            }),
            Expr::List(items) => items.iter().any(expr_awaits),
            Expr::Member(base, _) => expr_awaits(base),
            Expr::Index(base, index) => expr_awaits(base) || expr_awaits(index),
            Expr::Call { callee, args } => expr_awaits(callee) || args.iter().any(expr_awaits),
            Expr::Unary { expr, .. } => expr_awaits(expr),
            Expr::Binary { lhs, rhs, .. } => expr_awaits(lhs) || expr_awaits(rhs),
            Expr::Ternary { cond, then, els } => {
                expr_awaits(cond) || expr_awaits(then) || expr_awaits(els)
            }
            Expr::Lambda { body, .. } => expr_awaits(body),
            Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) | Expr::Ident(_) => false,
        }
    }
    stmts.iter().any(|stmt| match stmt {
        Stmt::Assign { target, value, .. } => expr_awaits(target) || expr_awaits(value),
        Stmt::If { cond, then, els, .. } => {
            expr_awaits(cond) || stmts_await(then) || stmts_await(els)
        }
        Stmt::Expr { expr, .. } => expr_awaits(expr),
    })
}

/// A page scope: the page-level symbol table plus a stack of local frames
/// (function parameters, loop variables, lambda parameters).
struct PageScope {
    name: String,
    symbols: IndexMap<String, Symbol>,
    locals: Vec<IndexMap<String, Ty>>,
    /// For model validation rules: field names resolve directly.
    model_fields: IndexMap<String, Ty>,
}

impl PageScope {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            symbols: IndexMap::new(),
            locals: Vec::new(),
            model_fields: IndexMap::new(),
        }
    }

    fn for_model(fields: &IndexMap<String, Ty>, name: &str) -> Self {
        let mut scope = Self::new(name);
        scope.model_fields = fields.clone();
        scope
    }

    fn declare(&mut self, name: &str, symbol: Symbol) -> SResult<()> {
        if self.symbols.contains_key(name) {
            return Err(SemanticError::DuplicateDeclaration {
                name: name.to_string(),
                scope: self.name.clone(),
            });
        }
        self.symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    fn update(&mut self, name: &str, symbol: Symbol) {
        self.symbols.insert(name.to_string(), symbol);
    }

    fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    fn has_local(&self, name: &str) -> bool {
        self.locals.iter().rev().any(|frame| frame.contains_key(name))
    }

    fn push_local(&mut self, name: &str, ty: Ty) {
        let mut frame = IndexMap::new();
        frame.insert(name.to_string(), ty);
        self.locals.push(frame);
    }

    fn push_locals(&mut self, names: &[String]) {
        let mut frame = IndexMap::new();
        for name in names {
            frame.insert(name.clone(), Ty::Unknown);
        }
        self.locals.push(frame);
    }

    fn pop_locals(&mut self) {
        self.locals.pop();
    }

    /// Resolves an identifier to its type, innermost frame first.
    fn resolve(&self, name: &str) -> SResult<Ty> {
        for frame in self.locals.iter().rev() {
            if let Some(ty) = frame.get(name) {
                return Ok(ty.clone());
            }
        }
        if let Some(ty) = self.model_fields.get(name) {
            return Ok(ty.clone());
        }
        match self.symbols.get(name) {
            Some(Symbol::State(ty) | Symbol::Derived(ty) | Symbol::Prop(ty)) => Ok(ty.clone()),
            Some(Symbol::Function | Symbol::Api) => Ok(Ty::Fn),
            None => Err(SemanticError::UndefinedIdentifier {
                name: name.to_string(),
                scope: self.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn analyze_src(src: &str) -> SResult<ProgramIr> {
        analyze(&parse(&tokenize(src).unwrap()).unwrap(), true)
    }

    #[test]
    fn duplicate_state_is_rejected() {
        let err = analyze_src("page P:\n  state count: int = 0\n  state count: int = 1\n")
            .unwrap_err();
        assert!(matches!(err, SemanticError::DuplicateDeclaration { ref name, .. } if name == "count"));
        assert!(err.to_string().contains("duplicate declaration"));
    }

    #[test]
    fn state_and_derived_names_are_disjoint() {
        let err = analyze_src("page P:\n  state total: int = 0\n  derived total = 1 + 2\n")
            .unwrap_err();
        assert!(matches!(err, SemanticError::DuplicateDeclaration { .. }));
    }

    #[test]
    fn undefined_identifier_in_derived() {
        let err = analyze_src("page P:\n  derived doubled = missing * 2\n").unwrap_err();
        assert!(matches!(err, SemanticError::UndefinedIdentifier { ref name, .. } if name == "missing"));
    }

    #[test]
    fn derived_cycle_names_participants() {
        let err = analyze_src("page P:\n  derived a = b + 1\n  derived b = a + 1\n").unwrap_err();
        let SemanticError::DependencyCycle { names } = err else {
            panic!("expected cycle, got {:?}", err)
        };
        assert!(names.contains(&"a".to_string()));
        assert!(names.contains(&"b".to_string()));
    }

    #[test]
    fn derived_chain_is_topologically_ordered() {
        let ir = analyze_src(
            "page P:\n  state n: int = 1\n  derived c = b + 1\n  derived b = a + 1\n  derived a = n + 1\n",
        )
        .unwrap();
        let order: Vec<&str> = ir.pages[0].derived.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn check_must_reference_declared_identifiers() {
        let err =
            analyze_src("page P:\n  check items.length <= 500 \"too many\"\n").unwrap_err();
        assert!(matches!(err, SemanticError::UndefinedIdentifier { ref name, .. } if name == "items"));
    }

    #[test]
    fn check_on_declared_list_passes_and_records_deps() {
        let ir = analyze_src(
            "page P:\n  state items: list[str] = []\n  check items.length <= 500 \"too many\"\n",
        )
        .unwrap();
        assert_eq!(ir.pages[0].checks[0].deps, vec!["items"]);
        assert_eq!(ir.pages[0].checks[0].message, "too many");
    }

    #[test]
    fn non_boolean_check_is_rejected() {
        let err = analyze_src("page P:\n  state n: int = 0\n  check n + 1 \"nope\"\n").unwrap_err();
        assert!(matches!(err, SemanticError::NonBooleanCheck { .. }));
        assert!(err.to_string().contains("`check`"));
    }

    #[test]
    fn non_boolean_model_validate_names_its_keyword() {
        let err = analyze_src("model Task:\n  title: str\n  validate title.length \"nope\"\n")
            .unwrap_err();
        assert!(matches!(err, SemanticError::NonBooleanCheck { .. }));
        assert!(err.to_string().contains("`validate`"));
    }

    #[test]
    fn non_boolean_check_passes_without_validation() {
        let program =
            parse(&tokenize("page P:\n  state n: int = 0\n  check n + 1 \"nope\"\n").unwrap())
                .unwrap();
        assert!(analyze(&program, false).is_ok());
    }

    #[test]
    fn identifiers_still_resolved_without_validation() {
        let program = parse(&tokenize("page P:\n  derived d = missing + 1\n").unwrap()).unwrap();
        let err = analyze(&program, false).unwrap_err();
        assert!(matches!(err, SemanticError::UndefinedIdentifier { .. }));
    }

    #[test]
    fn watch_requires_declared_state() {
        let err = analyze_src("page P:\n  watch ghost:\n    log(ghost)\n").unwrap_err();
        assert!(matches!(err, SemanticError::InvalidWatchTarget { ref name, .. } if name == "ghost"));
    }

    #[test]
    fn state_initializer_type_mismatch() {
        let err = analyze_src("page P:\n  state count: int = \"zero\"\n").unwrap_err();
        assert!(matches!(err, SemanticError::TypeMismatch { .. }));
    }

    #[test]
    fn int_initializer_allowed_for_float_state() {
        assert!(analyze_src("page P:\n  state ratio: float = 1\n").is_ok());
    }

    #[test]
    fn assignment_to_derived_is_rejected() {
        let err = analyze_src(
            "page P:\n  state n: int = 0\n  derived d = n * 2\n  fn f():\n    d = 3\n",
        )
        .unwrap_err();
        assert!(matches!(err, SemanticError::TypeMismatch { ref found, .. } if found.contains("derived")));
    }

    #[test]
    fn loop_variable_is_scoped_to_for_body() {
        let ir = analyze_src(
            "model Task:\n  id: int\n  title: str\npage P:\n  state tasks: list[Task] = []\n  layout:\n    for task in tasks:\n      text \"{task.title}\"\n",
        )
        .unwrap();
        let LayoutIr::For { key_field, .. } = &ir.pages[0].layout[0] else {
            panic!()
        };
        assert_eq!(key_field.as_deref(), Some("id"));
    }

    #[test]
    fn for_over_plain_list_has_no_key_field() {
        let ir = analyze_src(
            "page P:\n  state names: list[str] = []\n  layout:\n    for name in names:\n      text \"{name}\"\n",
        )
        .unwrap();
        let LayoutIr::For { key_field, .. } = &ir.pages[0].layout[0] else {
            panic!()
        };
        assert!(key_field.is_none());
    }

    #[test]
    fn unknown_model_field_is_rejected() {
        let err = analyze_src(
            "model Task:\n  title: str\npage P:\n  state tasks: list[Task] = []\n  derived total = tasks.find(t => t.missing == 1)\n",
        )
        .unwrap_err();
        assert!(matches!(err, SemanticError::UndefinedIdentifier { ref name, .. } if name == "Task.missing"));
    }

    #[test]
    fn model_validate_scope_is_its_fields() {
        let ir = analyze_src(
            "model Task:\n  title: str\n  validate title.length > 0 \"Title required\"\n",
        )
        .unwrap();
        assert_eq!(ir.models[0].validates[0].deps, vec!["title"]);
    }

    #[test]
    fn route_target_must_exist() {
        let err = analyze_src("route /x -> Missing\n").unwrap_err();
        assert!(matches!(err, SemanticError::UndefinedIdentifier { ref name, .. } if name == "Missing"));
    }

    #[test]
    fn async_effect_is_flagged() {
        let ir = analyze_src(
            "page P:\n  state data: list[str] = []\n  api fetchData \"/api/data\" await\n  on mount:\n    data = await fetchData()\n",
        )
        .unwrap();
        let EffectIr::Mount { is_async, .. } = &ir.pages[0].effects[0] else {
            panic!()
        };
        assert!(is_async);
    }

    #[test]
    fn undeclared_component_in_layout_is_rejected() {
        let err = analyze_src("page P:\n  layout:\n    Card title=\"x\"\n").unwrap_err();
        assert!(matches!(err, SemanticError::UndefinedComponent { ref name } if name == "Card"));
    }
}
