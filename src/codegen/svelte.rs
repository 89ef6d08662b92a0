//! Svelte backend.
//!
//! Reactivity is inferred from assignment, so the script section is nearly
//! plain JS: `let` for state, `$:` for derived values and watchers,
//! `onMount` for lifecycle. List appends compile to a reassignment so the
//! compiler sees the write. Markup uses `{#each}`/`{#if}` blocks, `on:`
//! event directives, and `bind:` for two-way wiring.

use super::*;
use crate::ast::{Expr, Stmt, StrSeg};
use crate::ir::*;
use std::collections::HashMap;

pub struct SvelteBackend;

fn no_rename() -> HashMap<String, String> {
    HashMap::new()
}

/// Literal braces are block-syntax in Svelte markup.
fn markup_escape(text: &str) -> String {
    text.replace('{', "&#123;").replace('}', "&#125;")
}

impl SvelteBackend {
    fn js(&self, expr: &Expr, cx: &Cx) -> String {
        expr_js(expr, cx, RefMode::Plain, &no_rename())
    }

    fn guards(&self, state: &str, cx: &Cx, e: &mut Emitter) {
        for check in triggered_checks(state, &cx.page.checks) {
            e.line(&format!(
                "if (!({})) console.warn({});",
                self.js(&check.expr, cx),
                js_quote(&check.message)
            ));
        }
    }

    fn emit_stmts(&self, stmts: &[Stmt], cx: &mut Cx, e: &mut Emitter) {
        for stmt in stmts {
            match stmt {
                Stmt::Assign { target, value, .. } => {
                    let root = expr_root(target).map(str::to_string);
                    match root {
                        Some(root) if cx.is_state(&root) => {
                            e.line(&format!(
                                "{} = {};",
                                self.js(target, cx),
                                self.js(value, cx)
                            ));
                            self.guards(&root, cx, e);
                        }
                        Some(root)
                            if matches!(target, Expr::Ident(_))
                                && !cx.locals.contains(&root) =>
                        {
                            e.line(&format!("let {} = {};", root, self.js(value, cx)));
                            cx.locals.push(root);
                        }
                        _ => {
                            e.line(&format!(
                                "{} = {};",
                                self.js(target, cx),
                                self.js(value, cx)
                            ));
                        }
                    }
                }
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
                    // Appends reassign so the compiler notices the write.
                    if let Some((state, arg)) = push_target(expr, cx) {
                        let state = state.to_string();
                        let arg = self.js(arg, cx);
                        e.line(&format!("{} = [...{}, {}];", state, state, arg));
                        self.guards(&state, cx, e);
                    } else {
                        e.line(&format!("{};", self.js(expr, cx)));
                    }
                }
            }
        }
    }

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
        let modifier = if event == "submit" { "|preventDefault" } else { "" };
        if let Expr::Ident(name) = &ev.handler {
            if !cx.is_reactive(name) {
                return format!("on:{}{}={{{}}}", event, modifier, name);
            }
        }
        let mut parts = Vec::new();
        if let Some((state, arg)) = push_target(&ev.handler, cx) {
            let arg = expr_js(arg, cx, RefMode::Plain, &rename);
            parts.push(format!("{} = [...{}, {}];", state, state, arg));
            for check in triggered_checks(state, &cx.page.checks) {
                parts.push(format!(
                    "if (!({})) console.warn({});",
                    self.js(&check.expr, cx),
                    js_quote(&check.message)
                ));
            }
        } else {
            let body = expr_js(&ev.handler, cx, RefMode::Plain, &rename);
            return format!("on:{}{}={{(event) => {}}}", event, modifier, body);
        }
        format!(
            "on:{}{}={{(event) => {{ {} }}}}",
            event,
            modifier,
            parts.join(" ")
        )
    }

    fn markup_text(&self, segs: &[StrSeg], cx: &Cx) -> String {
        let mut out = String::new();
        for seg in segs {
            match seg {
                StrSeg::Text(text) => out.push_str(&markup_escape(text)),
                StrSeg::Expr(inner) => {
                    out.push('{');
                    out.push_str(&self.js(inner, cx));
                    out.push('}');
                }
            }
        }
        out
    }

    fn attr(&self, key: &str, value: &Expr, cx: &Cx) -> String {
        match value.as_plain_str() {
            Some(text) => format!("{}=\"{}\"", key, text),
            None => format!("{}={{{}}}", key, self.js(value, cx)),
        }
    }

    fn open_attrs(&self, el: &ElementIr, cx: &Cx) -> String {
        let (_, class) = element_tag(&el.kind);
        let mut parts = Vec::new();
        if let Some(class) = class {
            parts.push(format!("class=\"{}\"", class));
        }
        for (key, value) in fixed_attrs(&el.kind) {
            parts.push(format!("{}=\"{}\"", key, value));
        }
        let (style, rest) = split_style_attrs(&el.attrs);
        if !style.is_empty() {
            let entries: Vec<String> = style
                .iter()
                .map(|(key, value)| format!("{}: {}", key, value))
                .collect();
            parts.push(format!("style=\"{}\"", entries.join("; ")));
        }
        for (key, value) in rest {
            parts.push(self.attr(key, value, cx));
        }
        if let Some(state) = bound_state(el, cx) {
            let prop = if el.kind == ElementKind::Toggle {
                "checked"
            } else {
                "value"
            };
            parts.push(format!("bind:{}={{{}}}", prop, state));
        }
        for ev in &el.events {
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
}

/// Name for a watcher body function, numbered when one state has several
/// watchers.
fn watch_fn_name(page: &PageIr, effect: &EffectIr, target: &str) -> String {
    let base = format!("watch{}", title_case(target));
    let same: Vec<&EffectIr> = page
        .effects
        .iter()
        .filter(|fx| matches!(fx, EffectIr::Watch { target: t, .. } if t == target))
        .collect();
    if same.len() <= 1 {
        return base;
    }
    match same.iter().position(|fx| std::ptr::eq(*fx, effect)) {
        Some(0) | None => base,
        Some(nth) => format!("{}{}", base, nth + 1),
    }
}

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

impl Backend for SvelteBackend {
    fn target(&self) -> Target {
        Target::Svelte
    }

    fn open_page(&self, page: &PageIr, _cx: &Cx, e: &mut Emitter) {
        e.line(&format!(
            "<!-- ===== {} ===== -->",
            self.page_file(&page.name)
        ));
        if !page.seo.is_empty() {
            e.line("<script context=\"module\">");
            e.indent();
            e.line(&format!(
                "export const seo = {{ {} }};",
                seo_entries(page).join(", ")
            ));
            e.dedent();
            e.line("</script>");
            e.blank();
        }
        e.line("<script>");
        e.indent();
        let subscribed = has_realtime(&page.layout);
        let mounts = subscribed
            || page.effects.iter().any(|fx| matches!(fx, EffectIr::Mount { .. }));
        if mounts {
            e.line("import { onMount } from \"svelte\";");
        }
        if subscribed {
            e.line("import { subscribe } from \"./runtime\";");
        }
        for name in used_components(&page.layout) {
            e.line(&format!("import {} from \"./{}.svelte\";", name, name));
        }
        for prop in &page.props {
            e.line(&format!("export let {};", prop.name));
        }
        if mounts || subscribed || !page.props.is_empty() || !used_components(&page.layout).is_empty() {
            e.blank();
        }
    }

    fn begin_layout(&self, page: &PageIr, e: &mut Emitter) {
        // `bind:` writes bypass the statement-level guards, so checks on
        // bound states re-run reactively.
        let checked = bound_checked_states(page);
        if !checked.is_empty() {
            let cx = Cx::new(page);
            for check in &page.checks {
                if check.deps.iter().any(|dep| checked.contains(dep)) {
                    e.line(&format!(
                        "$: if (!({})) console.warn({});",
                        self.js(&check.expr, &cx),
                        js_quote(&check.message)
                    ));
                }
            }
        }
        e.dedent();
        e.line("</script>");
        e.blank();
        if !page.styles.is_empty() {
            e.line(&format!(
                "<div class=\"page\" style=\"{}\">",
                page_style_css(page)
            ));
            e.indent();
        }
    }

    fn close_page(&self, page: &PageIr, e: &mut Emitter) {
        if !page.styles.is_empty() {
            e.dedent();
            e.line("</div>");
        }
    }

    fn emit_state(&self, state: &StateIr, cx: &Cx, e: &mut Emitter) {
        e.line(&format!(
            "let {} = {};",
            state.name,
            self.js(&state.init, cx)
        ));
    }

    fn emit_derived(&self, derived: &DerivedIr, cx: &Cx, e: &mut Emitter) {
        e.line(&format!(
            "$: {} = {};",
            derived.name,
            self.js(&derived.expr, cx)
        ));
    }

    fn emit_api(&self, api: &ApiIr, cx: &Cx, e: &mut Emitter) {
        e.line(&format!("async function {}() {{", api.name));
        e.indent();
        e.line(&format!(
            "const response = await fetch({});",
            self.js(&api.url, cx)
        ));
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
        let mut body_cx = Cx {
            page: cx.page,
            locals: Vec::new(),
        };
        match effect {
            EffectIr::Mount { body, is_async } => {
                let arrow = if *is_async { "async () =>" } else { "() =>" };
                e.line(&format!("onMount({} {{", arrow));
                e.indent();
                self.emit_stmts(body, &mut body_cx, e);
                e.dedent();
                e.line("});");
            }
            EffectIr::Watch { target, body, is_async } => {
                // The body lives in a named function so the compiler only
                // tracks the leading reference, not every name the body
                // reads.
                let keyword = if *is_async { "async function" } else { "function" };
                let name = watch_fn_name(cx.page, effect, target);
                e.line(&format!("{} {}() {{", keyword, name));
                e.indent();
                self.emit_stmts(body, &mut body_cx, e);
                e.dedent();
                e.line("}");
                e.line(&format!("$: {}, {}();", target, name));
            }
        }
    }

    fn emit_subscription(&self, el: &ElementIr, cx: &Cx, e: &mut Emitter)
        -> Result<(), CodeGenError> {
        let channel = match &el.arg {
            Some(arg) => self.js(arg, cx),
            None => js_quote("default"),
        };
        e.line("onMount(() => {");
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
            self.emit_stmts(
                &[Stmt::Expr {
                    expr: ev.handler.clone(),
                    span: crate::lexer::Span::point(0),
                }],
                &mut body_cx,
                &mut inner,
            );
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
        e.line("});");
        Ok(())
    }

    fn emit_layout(&self, nodes: &[LayoutIr], cx: &mut Cx, e: &mut Emitter)
        -> Result<(), CodeGenError> {
        self.emit_nodes(nodes, cx, e)
    }

    fn emit_element(&self, el: &ElementIr, cx: &mut Cx, e: &mut Emitter)
        -> Result<(), CodeGenError> {
        if let ElementKind::Component(name) = &el.kind {
            let mut parts = Vec::new();
            if let Some(arg) = &el.arg {
                parts.push(self.attr("value", arg, cx));
            }
            for (key, value) in &el.attrs {
                parts.push(self.attr(key, value, cx));
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
                    attrs.push_str(&format!(" {}", self.attr("src", arg, cx)));
                }
                ElementKind::Input | ElementKind::Select | ElementKind::Toggle => {
                    if bound_state(el, cx).is_none() {
                        attrs.push_str(&format!(" {}", self.attr("placeholder", arg, cx)));
                    }
                }
                ElementKind::Form | ElementKind::Crud | ElementKind::Table => match arg {
                    Expr::Ident(name) => {
                        attrs.push_str(&format!(" data-model=\"{}\"", name));
                    }
                    _ => {
                        attrs.push_str(&format!(" {}", self.attr("data", arg, cx)));
                    }
                },
                _ => match arg {
                    Expr::Str(segs) => text_child = Some(self.markup_text(segs, cx)),
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
                let iter_text = self.js(iter, cx);
                let opening = match key_field {
                    Some(field) => {
                        format!("{{#each {} as {} ({}.{})}}", iter_text, var, var, field)
                    }
                    None => format!("{{#each {} as {}, index}}", iter_text, var),
                };
                e.line(&opening);
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
                e.line("{/each}");
            }
            LayoutIr::If { cond, then, els } => {
                e.line(&format!("{{#if {}}}", self.js(cond, cx)));
                e.indent();
                self.emit_nodes(then, cx, e)?;
                e.dedent();
                if !els.is_empty() {
                    e.line("{:else}");
                    e.indent();
                    self.emit_nodes(els, cx, e)?;
                    e.dedent();
                }
                e.line("{/if}");
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
        format!("./{}.svelte", name)
    }

    fn page_file(&self, name: &str) -> String {
        format!("{}.svelte", name)
    }
}
