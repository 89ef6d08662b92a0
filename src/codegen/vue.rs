//! Vue backend.
//!
//! Pages become single-file components with `<script setup>`: `ref` for
//! state, `computed` for derived values, `watch`/`onMounted` for effects.
//! Script-position reads of reactive names get the `.value` suffix; the
//! template relies on automatic unwrapping and uses directives (`v-for`,
//! `v-if`, `v-model`, `@event`) for structure and wiring.

use super::*;
use crate::ast::{Expr, Stmt, StrSeg, TypeExpr};
use crate::ir::*;
use std::collections::HashMap;

pub struct VueBackend;

/// Double quotes inside directive values must be entity-escaped.
fn attr_escape(text: &str) -> String {
    text.replace('"', "&quot;")
}

/// `defineProps` runtime type for a surface type.
fn prop_type(ty: &TypeExpr) -> &'static str {
    match ty {
        TypeExpr::Int | TypeExpr::Float => "Number",
        TypeExpr::Str => "String",
        TypeExpr::Bool => "Boolean",
        TypeExpr::Datetime => "Date",
        TypeExpr::List(_) => "Array",
        TypeExpr::Named(_) => "Object",
    }
}

impl VueBackend {
    /// Script-position rendering: `.value` on refs, `props.` on props.
    fn script_js(&self, expr: &Expr, cx: &Cx) -> String {
        let rename: HashMap<String, String> = cx
            .page
            .props
            .iter()
            .map(|p| (p.name.clone(), format!("props.{}", p.name)))
            .collect();
        expr_js(expr, cx, RefMode::Value, &rename)
    }

    /// Template-position rendering: refs unwrap, props are in scope.
    fn template_js(&self, expr: &Expr, cx: &Cx) -> String {
        expr_js(expr, cx, RefMode::Plain, &HashMap::new())
    }

    fn guards(&self, state: &str, cx: &Cx, e: &mut Emitter) {
        for check in triggered_checks(state, &cx.page.checks) {
            e.line(&format!(
                "if (!({})) console.warn({});",
                self.script_js(&check.expr, cx),
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
                                self.script_js(target, cx),
                                self.script_js(value, cx)
                            ));
                            self.guards(&root, cx, e);
                        }
                        Some(root)
                            if matches!(target, Expr::Ident(_))
                                && !cx.locals.contains(&root) =>
                        {
                            e.line(&format!("let {} = {};", root, self.script_js(value, cx)));
                            cx.locals.push(root);
                        }
                        _ => {
                            e.line(&format!(
                                "{} = {};",
                                self.script_js(target, cx),
                                self.script_js(value, cx)
                            ));
                        }
                    }
                }
                Stmt::If { cond, then, els, .. } => {
                    e.line(&format!("if ({}) {{", self.script_js(cond, cx)));
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
                    let pushed = push_target(expr, cx).map(|(state, _)| state.to_string());
                    e.line(&format!("{};", self.script_js(expr, cx)));
                    if let Some(state) = pushed {
                        self.guards(&state, cx, e);
                    }
                }
            }
        }
    }

    /// An event directive: `@click="increment()"`, submit gets `.prevent`.
    fn handler_attr(&self, el: &ElementIr, ev: &EventIr, cx: &Cx) -> String {
        let event = event_name(el, ev);
        let param = implicit_param(&el.kind, event);
        let mut rename: HashMap<String, String> =
            [("event".to_string(), "$event".to_string())].into();
        match param {
            "value" if el.kind == ElementKind::Toggle => {
                rename.insert("value".into(), "$event.target.checked".into());
            }
            "value" => {
                rename.insert("value".into(), "$event.target.value".into());
            }
            "file" => {
                rename.insert("file".into(), "$event.target.files[0]".into());
            }
            "form" => {
                rename.insert(
                    "form".into(),
                    "Object.fromEntries(new FormData($event.target))".into(),
                );
            }
            _ => {}
        }
        let suffix = if event == "submit" { ".prevent" } else { "" };
        if let Expr::Ident(name) = &ev.handler {
            if !cx.is_reactive(name) {
                return format!("@{}{}=\"{}\"", event, suffix, name);
            }
        }
        let body = expr_js(&ev.handler, cx, RefMode::Plain, &rename);
        format!("@{}{}=\"{}\"", event, suffix, attr_escape(&body))
    }

    /// Interpolated text in template position.
    fn template_text(&self, segs: &[StrSeg], cx: &Cx) -> String {
        let mut out = String::new();
        for seg in segs {
            match seg {
                StrSeg::Text(text) => out.push_str(text),
                StrSeg::Expr(inner) => {
                    out.push_str("{{ ");
                    out.push_str(&self.template_js(inner, cx));
                    out.push_str(" }}");
                }
            }
        }
        out
    }

    fn attr(&self, key: &str, value: &Expr, cx: &Cx) -> String {
        match value.as_plain_str() {
            Some(text) => format!("{}=\"{}\"", key, attr_escape(text)),
            None => format!(
                ":{}=\"{}\"",
                key,
                attr_escape(&self.template_js(value, cx))
            ),
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
            parts.push(format!("v-model=\"{}\"", state));
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

impl Backend for VueBackend {
    fn target(&self) -> Target {
        Target::Vue
    }

    fn open_page(&self, page: &PageIr, _cx: &Cx, e: &mut Emitter) {
        e.line(&format!("<!-- ===== {} ===== -->", self.page_file(&page.name)));
        if !page.seo.is_empty() {
            e.line("<script>");
            e.line(&format!(
                "export const seo = {{ {} }};",
                seo_entries(page).join(", ")
            ));
            e.line("</script>");
            e.blank();
        }
        e.line("<script setup>");
        let mut imports = Vec::new();
        if !page.states.is_empty() {
            imports.push("ref");
        }
        if !page.derived.is_empty() {
            imports.push("computed");
        }
        if page.effects.iter().any(|fx| matches!(fx, EffectIr::Watch { .. }))
            || !bound_checked_states(page).is_empty()
        {
            imports.push("watch");
        }
        let subscribed = has_realtime(&page.layout);
        if subscribed
            || page.effects.iter().any(|fx| matches!(fx, EffectIr::Mount { .. }))
        {
            imports.push("onMounted");
        }
        if subscribed {
            imports.push("onUnmounted");
        }
        if !imports.is_empty() {
            e.line(&format!("import {{ {} }} from \"vue\";", imports.join(", ")));
        }
        if subscribed {
            e.line("import { subscribe } from \"./runtime\";");
        }
        for name in used_components(&page.layout) {
            e.line(&format!("import {} from \"./{}.vue\";", name, name));
        }
        if !page.props.is_empty() {
            let entries: Vec<String> = page
                .props
                .iter()
                .map(|p| format!("{}: {}", p.name, prop_type(&p.ty)))
                .collect();
            e.line(&format!(
                "const props = defineProps({{ {} }});",
                entries.join(", ")
            ));
        }
        e.blank();
    }

    fn begin_layout(&self, page: &PageIr, e: &mut Emitter) {
        // `v-model` writes bypass the statement-level guards, so checked
        // bound states get a watcher.
        let checked = bound_checked_states(page);
        if !checked.is_empty() {
            let cx = Cx::new(page);
            for state in &checked {
                e.line(&format!("watch({}, () => {{", state));
                e.indent();
                self.guards(state, &cx, e);
                e.dedent();
                e.line("});");
            }
        }
        e.line("</script>");
        e.blank();
        e.line("<template>");
        e.indent();
        if !page.styles.is_empty() {
            e.line(&format!(
                "<div class=\"page\" style=\"{}\">",
                attr_escape(&page_style_css(page))
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
        e.line("</template>");
    }

    fn emit_state(&self, state: &StateIr, cx: &Cx, e: &mut Emitter) {
        e.line(&format!(
            "const {} = ref({});",
            state.name,
            self.script_js(&state.init, cx)
        ));
    }

    fn emit_derived(&self, derived: &DerivedIr, cx: &Cx, e: &mut Emitter) {
        e.line(&format!(
            "const {} = computed(() => {});",
            derived.name,
            self.script_js(&derived.expr, cx)
        ));
    }

    fn emit_api(&self, api: &ApiIr, cx: &Cx, e: &mut Emitter) {
        e.line(&format!("async function {}() {{", api.name));
        e.indent();
        e.line(&format!(
            "const response = await fetch({});",
            self.script_js(&api.url, cx)
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
                e.line(&format!("onMounted({} {{", arrow));
                e.indent();
                self.emit_stmts(body, &mut body_cx, e);
                e.dedent();
                e.line("});");
            }
            EffectIr::Watch { target, body, is_async } => {
                let arrow = if *is_async { "async () =>" } else { "() =>" };
                e.line(&format!("watch({}, {} {{", target, arrow));
                e.indent();
                self.emit_stmts(body, &mut body_cx, e);
                e.dedent();
                e.line("});");
            }
        }
    }

    fn emit_subscription(&self, el: &ElementIr, cx: &Cx, e: &mut Emitter)
        -> Result<(), CodeGenError> {
        let channel = match &el.arg {
            Some(arg) => self.script_js(arg, cx),
            None => js_quote("default"),
        };
        e.line("let subscription;");
        e.line("onMounted(() => {");
        e.indent();
        e.line(&format!("subscription = subscribe({}, {{", channel));
        e.indent();
        for ev in &el.events {
            let event = match &ev.name {
                Some(name) => name.clone(),
                None => "message".to_string(),
            };
            let param = if event == "error" { "error" } else { "message" };
            let body_cx = Cx {
                page: cx.page,
                locals: vec![param.to_string()],
            };
            let pushed = push_target(&ev.handler, &body_cx).map(|(s, _)| s.to_string());
            let mut lines = vec![format!("{};", self.script_js(&ev.handler, &body_cx))];
            if let Some(state) = pushed {
                for check in triggered_checks(&state, &body_cx.page.checks) {
                    lines.push(format!(
                        "if (!({})) console.warn({});",
                        self.script_js(&check.expr, &body_cx),
                        js_quote(&check.message)
                    ));
                }
            }
            if lines.len() == 1 {
                e.line(&format!("{}: ({}) => {{ {} }},", event, param, lines[0]));
            } else {
                e.line(&format!("{}: ({}) => {{", event, param));
                e.indent();
                for line in &lines {
                    e.line(line);
                }
                e.dedent();
                e.line("},");
            }
        }
        e.dedent();
        e.line("});");
        e.dedent();
        e.line("});");
        e.line("onUnmounted(() => subscription.unsubscribe());");
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
                    Expr::Str(segs) => text_child = Some(self.template_text(segs, cx)),
                    other => {
                        text_child = Some(format!("{{{{ {} }}}}", self.template_js(other, cx)))
                    }
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
                let iter_text = self.template_js(iter, cx);
                let directive = match key_field {
                    Some(field) => format!(
                        "v-for=\"{} in {}\" :key=\"{}.{}\"",
                        var, iter_text, var, field
                    ),
                    None => format!(
                        "v-for=\"({}, index) in {}\" :key=\"index\"",
                        var, iter_text
                    ),
                };
                e.line(&format!("<template {}>", directive));
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
                e.line("</template>");
            }
            LayoutIr::If { cond, then, els } => {
                e.line(&format!(
                    "<template v-if=\"{}\">",
                    attr_escape(&self.template_js(cond, cx))
                ));
                e.indent();
                self.emit_nodes(then, cx, e)?;
                e.dedent();
                e.line("</template>");
                if !els.is_empty() {
                    e.line("<template v-else>");
                    e.indent();
                    self.emit_nodes(els, cx, e)?;
                    e.dedent();
                    e.line("</template>");
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
        self.template_js(expr, cx)
    }

    fn component_import(&self, name: &str) -> String {
        format!("./{}.vue", name)
    }

    fn page_file(&self, name: &str) -> String {
        format!("{}.vue", name)
    }
}
