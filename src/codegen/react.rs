//! React backend.
//!
//! Pages become function components: `useState` pairs for state, `useMemo`
//! with explicit dependency arrays for derived values, `useEffect` for
//! lifecycle and watchers, JSX for the layout tree. State never mutates in
//! place; every write goes through the setter, and check guards read the
//! pending value through a rename so they observe the write they follow.

use super::*;
use crate::ast::{Expr, Stmt, StrSeg};
use crate::ir::*;
use std::collections::HashMap;

pub struct ReactBackend;

fn setter(name: &str) -> String {
    format!("set{}", title_case(name))
}

fn pending(name: &str) -> String {
    format!("next{}", title_case(name))
}

fn event_attr(name: &str) -> String {
    format!("on{}", title_case(name))
}

fn no_rename() -> HashMap<String, String> {
    HashMap::new()
}

impl ReactBackend {
    fn js(&self, expr: &Expr, cx: &Cx) -> String {
        expr_js(expr, cx, RefMode::Plain, &no_rename())
    }

    /// Guard lines for checks watching `state`, reading the pending value.
    fn guards(&self, state: &str, value_name: &str, cx: &Cx, e: &mut Emitter) {
        let rename: HashMap<String, String> =
            [(state.to_string(), value_name.to_string())].into();
        for check in triggered_checks(state, &cx.page.checks) {
            let cond = expr_js(&check.expr, cx, RefMode::Plain, &rename);
            e.line(&format!(
                "if (!({})) console.warn({});",
                cond,
                js_quote(&check.message)
            ));
        }
    }

    fn emit_stmts(&self, stmts: &[Stmt], cx: &mut Cx, e: &mut Emitter) {
        for stmt in stmts {
            match stmt {
                Stmt::Assign { target, value, .. } => self.emit_assign(target, value, cx, e),
                Stmt::If { cond, then, els, .. } => {
                    e.line(&format!("if ({}) {{", self.js(cond, cx)));
                    e.indent();
                    self.emit_stmts(then, cx, e);
                    e.dedent();
                    if els.is_empty() {
                        e.line("}");
                    } else {
                        e.line("} else {");
                        e.indent();
                        self.emit_stmts(els, cx, e);
                        e.dedent();
                        e.line("}");
                    }
                }
                Stmt::Expr { expr, .. } => {
                    if let Some((state, arg)) = push_target(expr, cx) {
                        let state = state.to_string();
                        self.emit_push(&state, arg, cx, e);
                    } else {
                        e.line(&format!("{};", self.js(expr, cx)));
                    }
                }
            }
        }
    }

    fn emit_push(&self, state: &str, arg: &Expr, cx: &Cx, e: &mut Emitter) {
        let appended = format!("[...{}, {}]", state, self.js(arg, cx));
        if triggered_checks(state, &cx.page.checks).is_empty() {
            e.line(&format!("{}({});", setter(state), appended));
        } else {
            let next = pending(state);
            e.line(&format!("const {} = {};", next, appended));
            e.line(&format!("{}({});", setter(state), next));
            self.guards(state, &next, cx, e);
        }
    }

    fn emit_assign(&self, target: &Expr, value: &Expr, cx: &mut Cx, e: &mut Emitter) {
        let root = match expr_root(target) {
            Some(root) => root.to_string(),
            None => {
                e.line(&format!("{} = {};", self.js(target, cx), self.js(value, cx)));
                return;
            }
        };
        if !cx.is_state(&root) {
            if matches!(target, Expr::Ident(_)) && !cx.locals.contains(&root) {
                e.line(&format!("let {} = {};", root, self.js(value, cx)));
                cx.locals.push(root);
            } else {
                e.line(&format!("{} = {};", self.js(target, cx), self.js(value, cx)));
            }
            return;
        }
        let has_guards = !triggered_checks(&root, &cx.page.checks).is_empty();
        match target {
            Expr::Ident(_) => {
                if has_guards {
                    let next = pending(&root);
                    e.line(&format!("const {} = {};", next, self.js(value, cx)));
                    e.line(&format!("{}({});", setter(&root), next));
                    self.guards(&root, &next, cx, e);
                } else {
                    e.line(&format!("{}({});", setter(&root), self.js(value, cx)));
                }
            }
            _ => {
                // Clone, write the path on the clone, publish.
                let next = pending(&root);
                let spread = if path_starts_with_index(target, &root) {
                    format!("[...{}]", root)
                } else {
                    format!("{{ ...{} }}", root)
                };
                e.line(&format!("const {} = {};", next, spread));
                let rename: HashMap<String, String> = [(root.clone(), next.clone())].into();
                let path = expr_js(target, cx, RefMode::Plain, &rename);
                e.line(&format!("{} = {};", path, self.js(value, cx)));
                e.line(&format!("{}({});", setter(&root), next));
                if has_guards {
                    self.guards(&root, &next, cx, e);
                }
            }
        }
    }

    /// One event handler as the body of an inline arrow, or a bare function
    /// reference when nothing needs wrapping.
    fn handler_attr(&self, el: &ElementIr, ev: &EventIr, cx: &Cx) -> String {
        let event = event_name(el, ev);
        let param = implicit_param(&el.kind, event);
        let mut rename = no_rename();
        match param {
            "value" if el.kind == ElementKind::Toggle => {
                rename.insert("value".into(), "event.target.checked".into());
            }
            "value" => {
                rename.insert("value".into(), "event.target.value".into());
            }
            "file" => {
                rename.insert("file".into(), "event.target.files[0]".into());
            }
            "form" => {
                rename.insert(
                    "form".into(),
                    "Object.fromEntries(new FormData(event.target))".into(),
                );
            }
            _ => {}
        }
        let prevent = event == "submit";
        if let Expr::Ident(name) = &ev.handler {
            if !prevent && !cx.is_reactive(name) {
                return format!("{}={{{}}}", event_attr(event), name);
            }
        }
        let mut parts = Vec::new();
        if prevent {
            parts.push("event.preventDefault();".to_string());
        }
        if let Some((state, arg)) = push_target(&ev.handler, cx) {
            let arg = expr_js(arg, cx, RefMode::Plain, &rename);
            parts.push(format!("{}([...{}, {}]);", setter(state), state, arg));
            for check in triggered_checks(state, &cx.page.checks) {
                let guard_rename: HashMap<String, String> =
                    [(state.to_string(), format!("[...{}, {}]", state, arg))].into();
                parts.push(format!(
                    "if (!({})) console.warn({});",
                    expr_js(&check.expr, cx, RefMode::Plain, &guard_rename),
                    js_quote(&check.message)
                ));
            }
        } else {
            let body = expr_js(&ev.handler, cx, RefMode::Plain, &rename);
            if parts.is_empty() {
                return format!("{}={{(event) => {}}}", event_attr(event), body);
            }
            parts.push(format!("{};", body));
        }
        format!("{}={{(event) => {{ {} }}}}", event_attr(event), parts.join(" "))
    }

    /// Interpolated text in JSX position: literal runs stay literal unless
    /// they contain JSX-significant characters, expressions become slots.
    fn jsx_text(&self, segs: &[StrSeg], cx: &Cx) -> String {
        let mut out = String::new();
        for seg in segs {
            match seg {
                StrSeg::Text(text) => {
                    if text.contains(['{', '}', '<', '>']) {
                        out.push('{');
                        out.push_str(&js_quote(text));
                        out.push('}');
                    } else {
                        out.push_str(text);
                    }
                }
                StrSeg::Expr(inner) => {
                    out.push('{');
                    out.push_str(&self.js(inner, cx));
                    out.push('}');
                }
            }
        }
        out
    }

    fn attr_value(&self, expr: &Expr, cx: &Cx) -> String {
        match expr.as_plain_str() {
            Some(text) => js_quote(text),
            None => format!("{{{}}}", self.js(expr, cx)),
        }
    }

    /// Opening-tag attribute text shared by DOM elements.
    fn open_attrs(&self, el: &ElementIr, cx: &Cx) -> String {
        let (_, class) = element_tag(&el.kind);
        let mut parts = Vec::new();
        if let Some(class) = class {
            parts.push(format!("className=\"{}\"", class));
        }
        for (key, value) in fixed_attrs(&el.kind) {
            parts.push(format!("{}=\"{}\"", key, value));
        }

        let (style, rest) = split_style_attrs(&el.attrs);
        if !style.is_empty() {
            let entries: Vec<String> = style
                .iter()
                .map(|(key, value)| format!("{}: {}", react_style_key(key), js_quote(value)))
                .collect();
            parts.push(format!("style={{{{ {} }}}}", entries.join(", ")));
        }
        for (key, value) in rest {
            parts.push(format!("{}={}", key, self.attr_value(value, cx)));
        }

        // Two-way binding for value-carrying inputs bound to a state.
        let bound = bound_state(el, cx);
        if let Some(state) = &bound {
            let accessor = if el.kind == ElementKind::Toggle {
                "event.target.checked"
            } else {
                "event.target.value"
            };
            let prop = if el.kind == ElementKind::Toggle {
                "checked"
            } else {
                "value"
            };
            parts.push(format!("{}={{{}}}", prop, state));
            let checks = triggered_checks(state, &cx.page.checks);
            let mut body: Vec<String> = Vec::new();
            if checks.is_empty() {
                body.push(format!("{}({});", setter(state), accessor));
            } else {
                // Guards read the pending value; the state variable is
                // stale until the next render.
                let next = pending(state);
                body.push(format!("const {} = {};", next, accessor));
                body.push(format!("{}({});", setter(state), next));
                let rename: HashMap<String, String> =
                    [(state.to_string(), next.clone())].into();
                for check in checks {
                    body.push(format!(
                        "if (!({})) console.warn({});",
                        expr_js(&check.expr, cx, RefMode::Plain, &rename),
                        js_quote(&check.message)
                    ));
                }
            }
            for ev in &el.events {
                if event_name(el, ev) == "change" {
                    let rename: HashMap<String, String> =
                        [("value".to_string(), accessor.to_string())].into();
                    body.push(format!(
                        "{};",
                        expr_js(&ev.handler, cx, RefMode::Plain, &rename)
                    ));
                }
            }
            parts.push(format!("onChange={{(event) => {{ {} }}}}", body.join(" ")));
        }
        for ev in &el.events {
            if bound.is_some() && event_name(el, ev) == "change" {
                continue;
            }
            parts.push(self.handler_attr(el, ev, cx));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!(" {}", parts.join(" "))
        }
    }

    fn emit_nodes(&self, nodes: &[LayoutIr], cx: &mut Cx, e: &mut Emitter)
        -> Result<(), CodeGenError> {
        for node in nodes {
            match node {
                LayoutIr::Element(el) => self.emit_element(el, cx, e)?,
                _ => self.emit_control_flow(node, cx, e)?,
            }
        }
        Ok(())
    }

    /// A branch of a conditional: single node inline, several in a fragment.
    fn emit_branch(&self, nodes: &[LayoutIr], cx: &mut Cx, e: &mut Emitter)
        -> Result<(), CodeGenError> {
        if nodes.len() > 1 {
            e.line("<>");
            e.indent();
            self.emit_nodes(nodes, cx, e)?;
            e.dedent();
            e.line("</>");
        } else {
            self.emit_nodes(nodes, cx, e)?;
        }
        Ok(())
    }
}

/// True when the first step off the path root indexes into a list.
fn path_starts_with_index(target: &Expr, root: &str) -> bool {
    match target {
        Expr::Index(base, _) => matches!(base.as_ref(), Expr::Ident(name) if name == root),
        Expr::Member(base, _) => path_starts_with_index(base, root),
        _ => false,
    }
}

/// The state an input-like element's argument binds, for two-way wiring.
fn bound_state<'a>(el: &'a ElementIr, cx: &Cx) -> Option<&'a str> {
    if !matches!(
        el.kind,
        ElementKind::Input | ElementKind::Select | ElementKind::Toggle
    ) {
        return None;
    }
    match &el.arg {
        Some(Expr::Ident(name)) if cx.is_state(name) => Some(name),
        _ => None,
    }
}

/// Kebab-case CSS property to the camelCase React style object key.
fn react_style_key(key: &str) -> String {
    let mut out = String::new();
    let mut upper = false;
    for ch in key.chars() {
        if ch == '-' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

impl Backend for ReactBackend {
    fn target(&self) -> Target {
        Target::React
    }

    fn open_page(&self, page: &PageIr, _cx: &Cx, e: &mut Emitter) {
        e.line(&format!("// ===== {} =====", self.page_file(&page.name)));
        let mut hooks = Vec::new();
        if !page.states.is_empty() {
            hooks.push("useState");
        }
        if !page.derived.is_empty() {
            hooks.push("useMemo");
        }
        if !page.effects.is_empty() || has_realtime(&page.layout) {
            hooks.push("useEffect");
        }
        if hooks.is_empty() {
            e.line("import React from \"react\";");
        } else {
            e.line(&format!(
                "import React, {{ {} }} from \"react\";",
                hooks.join(", ")
            ));
        }
        if has_realtime(&page.layout) {
            e.line("import { subscribe } from \"./runtime\";");
        }
        for name in used_components(&page.layout) {
            e.line(&format!("import {} from \"./{}.jsx\";", name, name));
        }
        e.blank();
        if !page.seo.is_empty() {
            e.line(&format!(
                "export const seo = {{ {} }};",
                seo_entries(page).join(", ")
            ));
            e.blank();
        }
        if page.props.is_empty() {
            e.line(&format!("export default function {}() {{", page.name));
        } else {
            let props: Vec<&str> = page.props.iter().map(|p| p.name.as_str()).collect();
            e.line(&format!(
                "export default function {}({{ {} }}) {{",
                page.name,
                props.join(", ")
            ));
        }
        e.indent();
    }

    fn begin_layout(&self, page: &PageIr, e: &mut Emitter) {
        e.blank();
        e.line("return (");
        e.indent();
        if !page.styles.is_empty() {
            let entries: Vec<String> = page_style_entries(page)
                .iter()
                .map(|(key, value)| format!("{}: {}", react_style_key(key), js_quote(value)))
                .collect();
            e.line(&format!(
                "<div className=\"page\" style={{{{ {} }}}}>",
                entries.join(", ")
            ));
            e.indent();
        }
    }

    fn close_page(&self, page: &PageIr, e: &mut Emitter) {
        if !page.styles.is_empty() {
            e.dedent();
            e.line("</div>");
        }
        e.dedent();
        e.line(");");
        e.dedent();
        e.line("}");
    }

    fn emit_state(&self, state: &StateIr, cx: &Cx, e: &mut Emitter) {
        e.line(&format!(
            "const [{}, {}] = useState({});",
            state.name,
            setter(&state.name),
            self.js(&state.init, cx)
        ));
    }

    fn emit_derived(&self, derived: &DerivedIr, cx: &Cx, e: &mut Emitter) {
        e.line(&format!(
            "const {} = useMemo(() => {}, [{}]);",
            derived.name,
            self.js(&derived.expr, cx),
            derived.deps.join(", ")
        ));
    }

    fn emit_api(&self, api: &ApiIr, cx: &Cx, e: &mut Emitter) {
        e.line(&format!("async function {}() {{", api.name));
        e.indent();
        e.line(&format!("const response = await fetch({});", self.js(&api.url, cx)));
        e.line("return response.json();");
        e.dedent();
        e.line("}");
    }

    fn emit_function(&self, function: &FunctionIr, cx: &Cx, e: &mut Emitter) {
        let keyword = if function.is_async {
            "async function"
        } else {
            "function"
        };
        e.line(&format!(
            "{} {}({}) {{",
            keyword,
            function.name,
            function.params.join(", ")
        ));
        e.indent();
        let mut body_cx = Cx {
            page: cx.page,
            locals: function.params.clone(),
        };
        self.emit_stmts(&function.body, &mut body_cx, e);
        e.dedent();
        e.line("}");
    }

    fn emit_effect(&self, effect: &EffectIr, cx: &Cx, e: &mut Emitter) {
        let (body, is_async, deps) = match effect {
            EffectIr::Mount { body, is_async } => (body, *is_async, String::new()),
            EffectIr::Watch { target, body, is_async } => (body, *is_async, target.clone()),
        };
        e.line("useEffect(() => {");
        e.indent();
        let mut body_cx = Cx {
            page: cx.page,
            locals: Vec::new(),
        };
        if is_async {
            e.line("(async () => {");
            e.indent();
            self.emit_stmts(body, &mut body_cx, e);
            e.dedent();
            e.line("})();");
        } else {
            self.emit_stmts(body, &mut body_cx, e);
        }
        e.dedent();
        e.line(&format!("}}, [{}]);", deps));
    }

    fn emit_subscription(&self, el: &ElementIr, cx: &Cx, e: &mut Emitter)
        -> Result<(), CodeGenError> {
        let channel = match &el.arg {
            Some(arg) => self.js(arg, cx),
            None => js_quote("default"),
        };
        e.line("useEffect(() => {");
        e.indent();
        e.line(&format!("const subscription = subscribe({}, {{", channel));
        e.indent();
        for ev in &el.events {
            let event = match &ev.name {
                Some(name) => name.clone(),
                None => "message".to_string(),
            };
            let param = if event == "error" { "error" } else { "message" };
            let mut body_cx = Cx {
                page: cx.page,
                locals: vec![param.to_string()],
            };
            let mut inner = Emitter::new();
            if let Some((state, arg)) = push_target(&ev.handler, &body_cx) {
                let state = state.to_string();
                let arg = arg.clone();
                self.emit_push(&state, &arg, &body_cx, &mut inner);
            } else {
                inner.line(&format!("{};", self.js(&ev.handler, &mut body_cx)));
            }
            let body = inner.finish();
            let lines: Vec<&str> = body.lines().collect();
            if lines.len() == 1 {
                e.line(&format!("{}: ({}) => {{ {} }},", event, param, lines[0]));
            } else {
                e.line(&format!("{}: ({}) => {{", event, param));
                e.indent();
                for line in lines {
                    e.line(line);
                }
                e.dedent();
                e.line("},");
            }
        }
        e.dedent();
        e.line("});");
        e.line("return () => subscription.unsubscribe();");
        e.dedent();
        e.line("}, []);");
        Ok(())
    }

    fn emit_layout(&self, nodes: &[LayoutIr], cx: &mut Cx, e: &mut Emitter)
        -> Result<(), CodeGenError> {
        if nodes.is_empty() {
            e.line("null");
            return Ok(());
        }
        if nodes.len() > 1 {
            e.line("<>");
            e.indent();
            self.emit_nodes(nodes, cx, e)?;
            e.dedent();
            e.line("</>");
            return Ok(());
        }
        self.emit_nodes(nodes, cx, e)
    }

    fn emit_element(&self, el: &ElementIr, cx: &mut Cx, e: &mut Emitter)
        -> Result<(), CodeGenError> {
        if let ElementKind::Component(name) = &el.kind {
            let mut parts = Vec::new();
            if let Some(arg) = &el.arg {
                parts.push(format!("value={}", self.attr_value(arg, cx)));
            }
            for (key, value) in &el.attrs {
                parts.push(format!("{}={}", key, self.attr_value(value, cx)));
            }
            for ev in &el.events {
                parts.push(self.handler_attr(el, ev, cx));
            }
            let attrs = if parts.is_empty() {
                String::new()
            } else {
                format!(" {}", parts.join(" "))
            };
            if el.children.is_empty() {
                e.line(&format!("<{}{} />", name, attrs));
            } else {
                e.line(&format!("<{}{}>", name, attrs));
                e.indent();
                self.emit_nodes(&el.children, cx, e)?;
                e.dedent();
                e.line(&format!("</{}>", name));
            }
            return Ok(());
        }

        let (tag, _) = element_tag(&el.kind);
        let mut attrs = self.open_attrs(el, cx);
        let mut text_child: Option<String> = None;
        if let Some(arg) = &el.arg {
            match &el.kind {
                ElementKind::Image => {
                    attrs.push_str(&format!(" src={}", self.attr_value(arg, cx)));
                }
                ElementKind::Input | ElementKind::Select | ElementKind::Toggle => {
                    if bound_state(el, cx).is_none() {
                        attrs.push_str(&format!(" placeholder={}", self.attr_value(arg, cx)));
                    }
                }
                ElementKind::Form | ElementKind::Crud | ElementKind::Table => match arg {
                    Expr::Ident(name) => {
                        attrs.push_str(&format!(" data-model=\"{}\"", name));
                    }
                    _ => {
                        attrs.push_str(&format!(" data={{{}}}", self.js(arg, cx)));
                    }
                },
                _ => match arg {
                    Expr::Str(segs) => text_child = Some(self.jsx_text(segs, cx)),
                    other => text_child = Some(format!("{{{}}}", self.js(other, cx))),
                },
            }
        }

        if el.children.is_empty() {
            match text_child {
                Some(text) => e.line(&format!("<{}{}>{}</{}>", tag, attrs, text, tag)),
                None => e.line(&format!("<{}{} />", tag, attrs)),
            }
        } else {
            e.line(&format!("<{}{}>", tag, attrs));
            e.indent();
            if let Some(text) = text_child {
                e.line(&text);
            }
            self.emit_nodes(&el.children, cx, e)?;
            e.dedent();
            e.line(&format!("</{}>", tag));
        }
        Ok(())
    }

    fn emit_control_flow(&self, node: &LayoutIr, cx: &mut Cx, e: &mut Emitter)
        -> Result<(), CodeGenError> {
        match node {
            LayoutIr::For { var, iter, key_field, body } => {
                let iter_js = self.js(iter, cx);
                let (params, key) = match key_field {
                    Some(field) => (var.clone(), format!("{}.{}", var, field)),
                    None => (format!("{}, index", var), "index".to_string()),
                };
                e.line(&format!("{{{}.map(({}) => (", iter_js, params));
                e.indent();
                e.line(&format!("<React.Fragment key={{{}}}>", key));
                e.indent();
                cx.locals.push(var.clone());
                if key_field.is_none() {
                    cx.locals.push("index".to_string());
                }
                self.emit_nodes(body, cx, e)?;
                if key_field.is_none() {
                    cx.locals.pop();
                }
                cx.locals.pop();
                e.dedent();
                e.line("</React.Fragment>");
                e.dedent();
                e.line("))}");
            }
            LayoutIr::If { cond, then, els } => {
                e.line(&format!("{{{} ? (", self.js(cond, cx)));
                e.indent();
                self.emit_branch(then, cx, e)?;
                e.dedent();
                if els.is_empty() {
                    e.line(") : null}");
                } else {
                    e.line(") : (");
                    e.indent();
                    self.emit_branch(els, cx, e)?;
                    e.dedent();
                    e.line(")}");
                }
            }
            LayoutIr::Element(el) => self.emit_element(el, cx, e)?,
        }
        Ok(())
    }

    fn emit_event_binding(&self, el: &ElementIr, ev: &EventIr, cx: &Cx) -> String {
        self.handler_attr(el, ev, cx)
    }

    fn emit_expression(&self, expr: &Expr, cx: &Cx) -> String {
        self.js(expr, cx)
    }

    fn component_import(&self, name: &str) -> String {
        format!("./{}.jsx", name)
    }

    fn page_file(&self, name: &str) -> String {
        format!("{}.jsx", name)
    }
}
