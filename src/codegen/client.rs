//! Client lowering: reactive signals, JSX, RPC auto-await, component
//! props/slots, stores, scoped CSS, and the mount/hydrate entry point.
//!
//! The client generator is the only one that transforms expressions on top
//! of the base lowering: signal reads become getter calls, signal writes
//! become setter calls, and RPC calls in async context gain `await`.

use crate::ast::*;
use crate::merge::MergedBlock;

use super::css;
use super::expr::{emit_expr, quote_string};
use super::pattern::{is_irrefutable, lower_pattern};
use super::stmt::{emit_stmt, emit_stmts};
use super::writer::CodeWriter;
use super::{Codegen, GeneratedModule, SignalRegistry, Target};

/// Generate one client module from a merged client block.
pub fn generate(block: &MergedBlock, sources: &[String], runtime_import: &str) -> GeneratedModule {
    let mut cg = Codegen::new(Target::Client);
    for source in sources {
        cg.map.add_source(source);
    }

    register_signals(&mut cg, block);

    let mut w = CodeWriter::new();
    w.line(&format!(
        "import {{ createSignal, createComputed, createEffect, tova_el, tova_fragment, tova_keyed, mount, hydrate, rpc, tova_action, tova_transition, fade, slide, scale, fly }} from \"{}\";",
        runtime_import
    ));
    w.blank();
    w.line("const server = new Proxy({}, { get: (_t, __name) => (...__args) => rpc(__name, __args) });");
    w.blank();

    for merged in &block.stmts {
        cg.source_index = merged.source;
        emit_stmt(&mut cg, &mut w, &merged.stmt);
    }

    cg.helpers.emit_used(&mut w);

    if !cg.collected_css.is_empty() {
        w.blank();
        w.line("const __styles = document.createElement(\"style\");");
        let css_text: String = cg.collected_css.join("\n");
        w.line(&format!("__styles.textContent = {};", quote_string(&css_text)));
        w.line("document.head.appendChild(__styles);");
    }

    // Mount the first declared component; hydrate when the container
    // already has server-rendered children.
    if let Some(root) = first_component(block) {
        w.blank();
        w.line("const __root = document.getElementById(\"app\") ?? document.body;");
        w.block_open("if (__root.childNodes.length > 0)");
        w.line(&format!("hydrate(() => {}({{}}), __root);", root));
        w.block_else();
        w.line(&format!("mount(() => {}({{}}), __root);", root));
        w.block_close();
    }

    GeneratedModule {
        code: w.finish(),
        map: cg.map,
    }
}

/// Pre-scan pass: the signal registry is built before emission so reads
/// that precede a declaration in merged order still transform.
pub fn register_signals(cg: &mut Codegen, block: &MergedBlock) {
    for merged in &block.stmts {
        match &merged.stmt.kind {
            StmtKind::StateDeclaration(decl) => {
                cg.signals.state.insert(decl.name.clone());
            }
            StmtKind::ComputedDeclaration(decl) => {
                cg.signals.computed.insert(decl.name.clone());
            }
            StmtKind::ComponentDeclaration(decl) => {
                cg.signals.components.insert(decl.name.clone());
            }
            StmtKind::StoreDeclaration(decl) => {
                cg.signals.stores.insert(decl.name.clone());
            }
            _ => {}
        }
    }
}

fn first_component(block: &MergedBlock) -> Option<String> {
    block.stmts.iter().find_map(|m| match &m.stmt.kind {
        StmtKind::ComponentDeclaration(decl) => Some(decl.name.clone()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// RPC and signal-read detection
// ---------------------------------------------------------------------------

/// Shallow test: a call whose callee is a member expression on the
/// reserved identifier `server`.
pub fn is_rpc_call(expr: &Expr) -> bool {
    if let Expr::CallExpression { callee, .. } = expr {
        if let Expr::MemberExpression { object, .. } = callee.as_ref() {
            return matches!(object.as_ref(), Expr::Identifier { name } if name == "server");
        }
    }
    false
}

/// Deep test, memoized by node identity: does the expression transitively
/// contain an RPC call (crossing into lambda bodies)?
pub fn contains_rpc(cg: &mut Codegen, expr: &Expr) -> bool {
    let key = expr as *const Expr as usize;
    if let Some(hit) = cg.rpc_memo_get(key) {
        return hit;
    }
    let result = contains_rpc_uncached(cg, expr);
    cg.rpc_memo_put(key, result);
    result
}

fn contains_rpc_uncached(cg: &mut Codegen, expr: &Expr) -> bool {
    if is_rpc_call(expr) {
        return true;
    }
    walk_subexprs(expr, &mut RpcWalker { cg })
}

pub fn stmts_contain_rpc(cg: &mut Codegen, stmts: &[Stmt]) -> bool {
    RpcWalker { cg }.on_stmts(stmts)
}

/// Deep test, memoized by node identity: does the expression read any
/// registered signal, computed, store, or reactive prop?
pub fn reads_signal(cg: &mut Codegen, expr: &Expr) -> bool {
    let key = expr as *const Expr as usize;
    if let Some(hit) = cg.reads_memo_get(key) {
        return hit;
    }
    let result = reads_signal_uncached(cg, expr);
    cg.reads_memo_put(key, result);
    result
}

fn reads_signal_uncached(cg: &mut Codegen, expr: &Expr) -> bool {
    if let Expr::Identifier { name } = expr {
        return cg.signals.is_signal(name) || cg.signals.stores.contains(name);
    }
    walk_subexprs(expr, &mut ReadsWalker { cg })
}

/// One deep-walk skeleton serves both predicates.
trait DeepWalk {
    fn on_expr(&mut self, expr: &Expr) -> bool;
    fn on_stmts(&mut self, stmts: &[Stmt]) -> bool;
}

struct RpcWalker<'a> {
    cg: &'a mut Codegen,
}

impl DeepWalk for RpcWalker<'_> {
    fn on_expr(&mut self, expr: &Expr) -> bool {
        contains_rpc(self.cg, expr)
    }

    fn on_stmts(&mut self, stmts: &[Stmt]) -> bool {
        stmts.iter().any(|stmt| match &stmt.kind {
            StmtKind::Assignment(s) => s.values.iter().any(|e| self.on_expr(e)),
            StmtKind::VarDeclaration(s) => s.values.iter().any(|e| self.on_expr(e)),
            StmtKind::LetDestructure(s) => self.on_expr(&s.value),
            // Nested functions are their own async boundary.
            StmtKind::FunctionDeclaration(_) => false,
            StmtKind::IfStatement(s) => {
                self.on_expr(&s.condition)
                    || self.on_stmts(&s.consequent)
                    || s.alternates
                        .iter()
                        .any(|a| self.on_expr(&a.condition) || self.on_stmts(&a.body))
                    || s.else_body.as_deref().is_some_and(|b| self.on_stmts(b))
            }
            StmtKind::ForStatement(s) => {
                self.on_expr(&s.iterable)
                    || self.on_stmts(&s.body)
                    || s.else_body.as_deref().is_some_and(|b| self.on_stmts(b))
            }
            StmtKind::WhileStatement(s) => {
                self.on_expr(&s.condition) || self.on_stmts(&s.body)
            }
            StmtKind::TryCatchStatement(s) => {
                self.on_stmts(&s.body)
                    || self.on_stmts(&s.catch_body)
                    || s.finally_body.as_deref().is_some_and(|b| self.on_stmts(b))
            }
            StmtKind::ReturnStatement(s) => {
                s.value.as_ref().is_some_and(|e| self.on_expr(e))
            }
            StmtKind::BlockStatement(s) => self.on_stmts(&s.body),
            StmtKind::CompoundAssignment(s) => self.on_expr(&s.value),
            StmtKind::GuardStatement(s) => {
                self.on_expr(&s.condition) || self.on_stmts(&s.else_body)
            }
            StmtKind::ExpressionStatement(s) => self.on_expr(&s.expression),
            StmtKind::EffectDeclaration(s) => self.on_stmts(&s.body),
            _ => false,
        })
    }
}

struct ReadsWalker<'a> {
    cg: &'a mut Codegen,
}

impl DeepWalk for ReadsWalker<'_> {
    fn on_expr(&mut self, expr: &Expr) -> bool {
        reads_signal(self.cg, expr)
    }

    fn on_stmts(&mut self, stmts: &[Stmt]) -> bool {
        stmts.iter().any(|stmt| match &stmt.kind {
            StmtKind::Assignment(s) => s.values.iter().any(|e| self.on_expr(e)),
            StmtKind::ExpressionStatement(s) => self.on_expr(&s.expression),
            StmtKind::ReturnStatement(s) => {
                s.value.as_ref().is_some_and(|e| self.on_expr(e))
            }
            StmtKind::IfStatement(s) => {
                self.on_expr(&s.condition)
                    || self.on_stmts(&s.consequent)
                    || s.else_body.as_deref().is_some_and(|b| self.on_stmts(b))
            }
            _ => false,
        })
    }
}

/// Walk one level of sub-expressions, descending into lambda bodies.
fn walk_subexprs<W: DeepWalk>(expr: &Expr, w: &mut W) -> bool {
    match expr {
        Expr::BinaryExpression { left, right, .. }
        | Expr::LogicalExpression { left, right, .. }
        | Expr::PipeExpression { left, right } => w.on_expr(left) || w.on_expr(right),
        Expr::UnaryExpression { operand, .. } => w.on_expr(operand),
        Expr::ChainedComparison { operands, .. } => operands.iter().any(|e| w.on_expr(e)),
        Expr::MembershipExpression { value, collection, .. } => {
            w.on_expr(value) || w.on_expr(collection)
        }
        Expr::CallExpression { callee, arguments } => {
            w.on_expr(callee) || arguments.iter().any(|e| w.on_expr(e))
        }
        Expr::NamedArgument { value, .. } => w.on_expr(value),
        Expr::MemberExpression { object, property, computed } => {
            w.on_expr(object) || (*computed && w.on_expr(property))
        }
        Expr::OptionalChain { object, .. } => w.on_expr(object),
        Expr::LambdaExpression { body, .. } => match body {
            LambdaBody::Expr { expression } => w.on_expr(expression),
            LambdaBody::Block { body } => w.on_stmts(body),
        },
        Expr::MatchExpression { subject, arms } => {
            w.on_expr(subject)
                || arms.iter().any(|arm| {
                    arm.guard.as_ref().is_some_and(|g| w.on_expr(g))
                        || match &arm.body {
                            MatchArmBody::Expr { expression } => w.on_expr(expression),
                            MatchArmBody::Block { body } => w.on_stmts(body),
                        }
                })
        }
        Expr::IfExpression { condition, then_branch, else_branch } => {
            w.on_expr(condition)
                || body_expr_any(then_branch, w)
                || body_expr_any(else_branch, w)
        }
        Expr::ArrayLiteral { elements } => elements.iter().any(|e| w.on_expr(e)),
        Expr::ObjectLiteral { properties } => properties.iter().any(|p| w.on_expr(&p.value)),
        Expr::ListComprehension { expression, iterable, condition, .. } => {
            w.on_expr(expression)
                || w.on_expr(iterable)
                || condition.as_deref().is_some_and(|c| w.on_expr(c))
        }
        Expr::DictComprehension { key, value, iterable, condition, .. } => {
            w.on_expr(key)
                || w.on_expr(value)
                || w.on_expr(iterable)
                || condition.as_deref().is_some_and(|c| w.on_expr(c))
        }
        Expr::RangeExpression { start, end, .. } => w.on_expr(start) || w.on_expr(end),
        Expr::SliceExpression { object, start, end, step } => {
            w.on_expr(object)
                || start.as_deref().is_some_and(|e| w.on_expr(e))
                || end.as_deref().is_some_and(|e| w.on_expr(e))
                || step.as_deref().is_some_and(|e| w.on_expr(e))
        }
        Expr::SpreadExpression { argument }
        | Expr::PropagateExpression { argument }
        | Expr::AwaitExpression { argument } => w.on_expr(argument),
        Expr::TemplateLiteral { parts } => parts.iter().any(|p| match p {
            TemplatePart::Interp { expression } => w.on_expr(expression),
            TemplatePart::Text { .. } => false,
        }),
        Expr::JSXElement(el) => jsx_element_any(el, w),
        Expr::JSXFragment { children } => children.iter().any(|c| jsx_child_any(c, w)),
        _ => false,
    }
}

fn body_expr_any<W: DeepWalk>(body: &BodyExpr, w: &mut W) -> bool {
    match body {
        BodyExpr::Expr { expression } => w.on_expr(expression),
        BodyExpr::Block { body } => w.on_stmts(body),
    }
}

fn jsx_element_any<W: DeepWalk>(el: &JsxElement, w: &mut W) -> bool {
    el.attributes
        .iter()
        .any(|a| a.value.as_ref().is_some_and(|v| w.on_expr(v)))
        || el.children.iter().any(|c| jsx_child_any(c, w))
}

fn jsx_child_any<W: DeepWalk>(child: &JsxChild, w: &mut W) -> bool {
    match child {
        JsxChild::Element(el) => jsx_element_any(el, w),
        JsxChild::Text { .. } => false,
        JsxChild::ExprChild { expression } => w.on_expr(expression),
        JsxChild::For { iterable, key, body, .. } => {
            w.on_expr(iterable)
                || key.as_ref().is_some_and(|k| w.on_expr(k))
                || body.iter().any(|c| jsx_child_any(c, w))
        }
        JsxChild::If { branches, else_children } => {
            branches.iter().any(|b| {
                w.on_expr(&b.condition) || b.children.iter().any(|c| jsx_child_any(c, w))
            }) || else_children
                .as_deref()
                .is_some_and(|cs| cs.iter().any(|c| jsx_child_any(c, w)))
        }
        JsxChild::Match { subject, arms } => {
            w.on_expr(subject)
                || arms.iter().any(|arm| {
                    arm.guard.as_ref().is_some_and(|g| w.on_expr(g))
                        || arm.children.iter().any(|c| jsx_child_any(c, w))
                })
        }
    }
}

// ---------------------------------------------------------------------------
// Reactive declarations
// ---------------------------------------------------------------------------

pub fn emit_state_declaration(cg: &mut Codegen, w: &mut CodeWriter, decl: &StateDecl) {
    cg.signals.state.insert(decl.name.clone());
    cg.scope.declare(&decl.name);
    let setter = SignalRegistry::setter_name(&decl.name);
    cg.scope.declare(&setter);
    let value = emit_expr(cg, &decl.value);
    w.line(&format!(
        "const [{}, {}] = createSignal({});",
        decl.name, setter, value
    ));
}

pub fn emit_computed_declaration(cg: &mut Codegen, w: &mut CodeWriter, decl: &ComputedDecl) {
    cg.signals.computed.insert(decl.name.clone());
    cg.scope.declare(&decl.name);
    let value = emit_expr(cg, &decl.value);
    w.line(&format!(
        "const {} = createComputed(() => {});",
        decl.name, value
    ));
}

/// `effect { body }` → `createEffect(() => { ... })`. A body containing
/// RPC runs inside an inner async IIFE so the effect's registration stays
/// synchronous.
pub fn emit_effect_declaration(cg: &mut Codegen, w: &mut CodeWriter, decl: &EffectDecl) {
    let has_rpc = stmts_contain_rpc(cg, &decl.body);
    w.block_open("createEffect(() =>");
    cg.scope.push();
    if has_rpc {
        w.block_open("(async () =>");
        let prev = cg.in_async;
        cg.in_async = true;
        emit_stmts(cg, w, &decl.body);
        cg.in_async = prev;
        w.dedent();
        w.line("})();");
    } else {
        emit_stmts(cg, w, &decl.body);
    }
    cg.scope.pop();
    w.dedent();
    w.line("});");
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

pub fn emit_component_declaration(cg: &mut Codegen, w: &mut CodeWriter, decl: &ComponentDecl) {
    cg.signals.components.insert(decl.name.clone());
    cg.scope.declare(&decl.name);

    // Scoped CSS: hash name + body, stamp every element in this component.
    let prev_scope = cg.css_scope.take();
    if let Some(style) = &decl.style {
        let attr = css::scope_attr(&decl.name, style);
        cg.collected_css.push(css::scope_css(style, &attr));
        cg.css_scope = Some(attr);
    }

    cg.scope.push();
    w.block_open(&format!("function {}(__props)", decl.name));

    // Reactive props: each declared parameter re-reads __props on call.
    // Registered as computed so body reads become calls.
    let mut prop_names = Vec::new();
    for param in &decl.params {
        cg.scope.declare(&param.name);
        prop_names.push(param.name.clone());
        match &param.default {
            None => {
                w.line(&format!(
                    "const {} = () => __props.{};",
                    param.name, param.name
                ));
            }
            Some(default) => {
                let default_js = emit_expr(cg, default);
                if is_simple_expr(default) {
                    w.line(&format!(
                        "const {0} = () => (__props.{0} !== undefined ? __props.{0} : {1});",
                        param.name, default_js
                    ));
                } else {
                    // Complex default: memoized to avoid recomputation.
                    w.line(&format!(
                        "const {0} = createComputed(() => (__props.{0} !== undefined ? __props.{0} : {1}));",
                        param.name, default_js
                    ));
                }
            }
        }
    }
    let added: Vec<String> = prop_names
        .iter()
        .filter(|n| !cg.signals.computed.contains(*n))
        .cloned()
        .collect();
    for name in &added {
        cg.signals.computed.insert(name.clone());
    }

    // Body; a trailing JSX expression statement is the rendered view.
    let has_rpc = stmts_contain_rpc(cg, &decl.body);
    let prev_async = cg.in_async;
    cg.in_async = has_rpc;
    if let Some((last, init)) = decl.body.split_last() {
        emit_stmts(cg, w, init);
        match &last.kind {
            StmtKind::ExpressionStatement(stmt)
                if matches!(
                    stmt.expression,
                    Expr::JSXElement(_) | Expr::JSXFragment { .. }
                ) =>
            {
                cg.record_stmt(w, last.loc);
                let view = emit_expr(cg, &stmt.expression);
                w.line(&format!("return {};", view));
            }
            _ => emit_stmt(cg, w, last),
        }
    }
    cg.in_async = prev_async;

    w.block_close();
    w.line(&format!("{0}._componentName = \"{0}\";", decl.name));

    for name in &added {
        cg.signals.computed.remove(name);
    }
    cg.scope.pop();
    cg.css_scope = prev_scope;
}

fn is_simple_expr(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::NumberLiteral { .. }
            | Expr::StringLiteral { .. }
            | Expr::BooleanLiteral { .. }
            | Expr::NilLiteral
            | Expr::Identifier { .. }
    )
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// A store lowers to an IIFE returning an accessor object over private
/// signals. Inner signal names do not leak to the outer registry.
pub fn emit_store_declaration(cg: &mut Codegen, w: &mut CodeWriter, decl: &StoreDecl) {
    cg.signals.stores.insert(decl.name.clone());
    cg.scope.declare(&decl.name);

    let outer_state = std::mem::take(&mut cg.signals.state);
    let outer_computed = std::mem::take(&mut cg.signals.computed);

    w.block_open(&format!("const {} = (() =>", decl.name));
    cg.scope.push();

    let mut state_names = Vec::new();
    let mut computed_names = Vec::new();
    let mut method_names = Vec::new();
    for stmt in &decl.body {
        match &stmt.kind {
            StmtKind::StateDeclaration(s) => state_names.push(s.name.clone()),
            StmtKind::ComputedDeclaration(c) => computed_names.push(c.name.clone()),
            StmtKind::FunctionDeclaration(f) => method_names.push(f.name.clone()),
            _ => {}
        }
    }

    for stmt in &decl.body {
        emit_stmt(cg, w, stmt);
    }

    w.block_open("return");
    for name in &state_names {
        w.line(&format!("get {0}() {{ return {0}(); }},", name));
        w.line(&format!(
            "set {0}(__v) {{ {1}(__v); }},",
            name,
            SignalRegistry::setter_name(name)
        ));
    }
    for name in &computed_names {
        w.line(&format!("get {0}() {{ return {0}(); }},", name));
    }
    for name in &method_names {
        w.line(&format!("{},", name));
    }
    w.block_close_semi();

    cg.scope.pop();
    w.dedent();
    w.line("})();");

    cg.signals.state = outer_state;
    cg.signals.computed = outer_computed;
}

// ---------------------------------------------------------------------------
// JSX lowering
// ---------------------------------------------------------------------------

/// Wrap an attribute/child expression in a thunk when it reads a signal,
/// so the runtime can re-evaluate it fine-grained.
fn reactive_value(cg: &mut Codegen, expr: &Expr) -> String {
    let reactive = reads_signal(cg, expr);
    let js = emit_expr(cg, expr);
    if reactive {
        format!("() => {}", js)
    } else {
        js
    }
}

pub fn emit_jsx_fragment(cg: &mut Codegen, children: &[JsxChild]) -> String {
    format!("tova_fragment({})", emit_children_array(cg, children))
}

pub fn emit_jsx_element(cg: &mut Codegen, el: &JsxElement) -> String {
    if el.tag == "slot" {
        return emit_slot(cg, el);
    }
    if el.is_component() {
        return emit_component_call(cg, el);
    }

    let props = emit_props(cg, el, true);
    let children = emit_children_array(cg, &el.children);
    if el.children.is_empty() {
        format!("tova_el({}, {})", quote_string(&el.tag), props)
    } else {
        format!("tova_el({}, {}, {})", quote_string(&el.tag), props, children)
    }
}

/// `<slot/>` renders `__props.children`; `<slot name="x"/>` renders the
/// named slot; a slot with other attributes is scoped and passes them to a
/// function-valued children prop.
fn emit_slot(cg: &mut Codegen, el: &JsxElement) -> String {
    let name = el.attributes.iter().find(|a| a.name == "name");
    let slot_expr = match name {
        Some(attr) => match &attr.value {
            Some(Expr::StringLiteral { value }) => format!("__props.{}", value),
            Some(other) => format!("__props[{}]", emit_expr(cg, other)),
            None => "__props.children".into(),
        },
        None => "__props.children".into(),
    };
    let scoped: Vec<&JsxAttr> = el
        .attributes
        .iter()
        .filter(|a| a.name != "name")
        .collect();
    if scoped.is_empty() {
        return slot_expr;
    }
    let props: Vec<String> = scoped
        .iter()
        .map(|a| {
            let value = match &a.value {
                Some(v) => reactive_value(cg, v),
                None => "true".into(),
            };
            format!("{}: {}", a.name, value)
        })
        .collect();
    format!(
        "(typeof {0} === \"function\" ? {0}({{ {1} }}) : {0})",
        slot_expr,
        props.join(", ")
    )
}

fn emit_component_call(cg: &mut Codegen, el: &JsxElement) -> String {
    let mut entries = collect_props(cg, el, false);
    if !el.children.is_empty() {
        entries.push(format!(
            "children: {}",
            emit_children_array(cg, &el.children)
        ));
    }
    let props = if entries.is_empty() {
        "{}".into()
    } else {
        format!("{{ {} }}", entries.join(", "))
    };
    format!("{}({})", el.tag, props)
}

struct EventModifiers {
    prevent: bool,
    stop: bool,
    self_only: bool,
    capture: bool,
    once: bool,
    key: Option<&'static str>,
}

fn parse_modifiers(mods: &[&str]) -> EventModifiers {
    let mut out = EventModifiers {
        prevent: false,
        stop: false,
        self_only: false,
        capture: false,
        once: false,
        key: None,
    };
    for m in mods {
        match *m {
            "prevent" => out.prevent = true,
            "stop" => out.stop = true,
            "self" => out.self_only = true,
            "capture" => out.capture = true,
            "once" => out.once = true,
            "enter" => out.key = Some("Enter"),
            "escape" => out.key = Some("Escape"),
            "space" => out.key = Some(" "),
            "tab" => out.key = Some("Tab"),
            "up" => out.key = Some("ArrowUp"),
            "down" => out.key = Some("ArrowDown"),
            "left" => out.key = Some("ArrowLeft"),
            "right" => out.key = Some("ArrowRight"),
            "delete" => out.key = Some("Delete"),
            _ => {}
        }
    }
    out
}

fn emit_props(cg: &mut Codegen, el: &JsxElement, is_html: bool) -> String {
    let entries = collect_props(cg, el, is_html);
    if entries.is_empty() {
        "{}".into()
    } else {
        format!("{{ {} }}", entries.join(", "))
    }
}

fn collect_props(cg: &mut Codegen, el: &JsxElement, is_html: bool) -> Vec<String> {
    let mut entries: Vec<String> = Vec::new();
    let mut class_parts: Vec<String> = Vec::new();
    let mut base_class: Option<String> = None;
    let mut class_reactive = false;
    let mut uses: Vec<String> = Vec::new();

    let input_type = el.attributes.iter().find_map(|a| match (&*a.name, &a.value) {
        ("type", Some(Expr::StringLiteral { value })) => Some(value.clone()),
        _ => None,
    });
    let numeric_input = matches!(input_type.as_deref(), Some("number") | Some("range"));

    for attr in &el.attributes {
        let name = attr.name.as_str();

        if let Some(event_spec) = name.strip_prefix("on:") {
            entries.push(emit_event_attr(cg, event_spec, attr.value.as_ref()));
            continue;
        }
        if let Some(rest) = name.strip_prefix("bind:") {
            emit_bind_attr(cg, rest, attr.value.as_ref(), numeric_input, &el.attributes, &mut entries);
            continue;
        }
        if let Some(class_name) = name.strip_prefix("class:") {
            if let Some(cond) = &attr.value {
                if reads_signal(cg, cond) {
                    class_reactive = true;
                }
                let cond_js = emit_expr(cg, cond);
                class_parts.push(format!(
                    "(({}) ? \" {}\" : \"\")",
                    cond_js, class_name
                ));
            }
            continue;
        }
        if let Some(action) = name.strip_prefix("use:") {
            let param = match &attr.value {
                Some(v) => reactive_value(cg, v),
                None => "null".into(),
            };
            uses.push(format!("[{}, {}]", action, param));
            continue;
        }
        if let Some((kind, param_name)) = split_transition(name) {
            let transition_fn = match param_name {
                "fade" | "slide" | "scale" | "fly" => param_name.to_string(),
                other => other.to_string(),
            };
            let param = match &attr.value {
                Some(v) => emit_expr(cg, v),
                None => "null".into(),
            };
            entries.push(format!("\"{}\": [{}, {}]", kind, transition_fn, param));
            continue;
        }
        if name == "show" {
            if let Some(cond) = &attr.value {
                let value = reactive_value(cg, cond);
                entries.push(format!("show: {}", value));
            }
            continue;
        }
        if name == "class" {
            if let Some(value) = &attr.value {
                if reads_signal(cg, value) {
                    class_reactive = true;
                }
                base_class = Some(emit_expr(cg, value));
            }
            continue;
        }

        match &attr.value {
            Some(value) => {
                let value_js = reactive_value(cg, value);
                entries.push(format!("{}: {}", quote_prop_key(name), value_js));
            }
            None => entries.push(format!("{}: true", quote_prop_key(name))),
        }
    }

    // `class` + `class:x` directives merge into one className expression.
    if base_class.is_some() || !class_parts.is_empty() {
        let base = base_class.unwrap_or_else(|| "\"\"".into());
        let mut class_js = base;
        for part in &class_parts {
            class_js = format!("{} + {}", class_js, part);
        }
        if class_reactive {
            entries.push(format!("class: () => {}", class_js));
        } else {
            entries.push(format!("class: {}", class_js));
        }
    }

    if !uses.is_empty() {
        entries.push(format!("use: [{}]", uses.join(", ")));
    }

    // Scope attribute on every HTML element inside a styled component.
    if is_html {
        if let Some(scope) = &cg.css_scope {
            entries.push(format!("\"{}\": \"\"", scope));
        }
    }

    entries
}

fn split_transition(name: &str) -> Option<(&str, &str)> {
    for kind in ["in", "out", "transition"] {
        if let Some(rest) = name.strip_prefix(kind) {
            if let Some(param) = rest.strip_prefix(':') {
                return Some((kind, param));
            }
        }
    }
    None
}

fn emit_event_attr(cg: &mut Codegen, event_spec: &str, handler: Option<&Expr>) -> String {
    let mut parts = event_spec.split('.');
    let event = parts.next().unwrap_or(event_spec);
    let mods: Vec<&str> = parts.collect();
    let modifiers = parse_modifiers(&mods);

    let handler_js = match handler {
        Some(h) => emit_expr(cg, h),
        None => "() => {}".into(),
    };

    let mut guards = String::new();
    if let Some(key) = modifiers.key {
        guards.push_str(&format!("if (__e.key !== {}) return; ", quote_string(key)));
    }
    if modifiers.self_only {
        guards.push_str("if (__e.target !== __e.currentTarget) return; ");
    }
    if modifiers.prevent {
        guards.push_str("__e.preventDefault(); ");
    }
    if modifiers.stop {
        guards.push_str("__e.stopPropagation(); ");
    }

    let wrapped = if guards.is_empty() {
        handler_js
    } else {
        format!("(__e) => {{ {}({})(__e); }}", guards, handler_js)
    };

    // `capture`/`once` ride on the key; the runtime reads them as listener
    // options.
    let mut key = format!("on:{}", event);
    if modifiers.capture {
        key.push_str(".capture");
    }
    if modifiers.once {
        key.push_str(".once");
    }
    format!("\"{}\": {}", key, wrapped)
}

fn emit_bind_attr(
    cg: &mut Codegen,
    kind: &str,
    value: Option<&Expr>,
    numeric_input: bool,
    attributes: &[JsxAttr],
    entries: &mut Vec<String>,
) {
    let Some(target) = value else { return };

    match kind {
        "value" => {
            if let Some(name) = target.as_identifier() {
                let setter = SignalRegistry::setter_name(name);
                let read = emit_expr(cg, target);
                let coerce = if numeric_input {
                    "Number(__e.target.value)"
                } else {
                    "__e.target.value"
                };
                entries.push(format!("value: () => {}", read));
                entries.push(format!("\"on:input\": (__e) => {}({})", setter, coerce));
            }
        }
        "checked" => {
            if let Some(name) = target.as_identifier() {
                let setter = SignalRegistry::setter_name(name);
                let read = emit_expr(cg, target);
                entries.push(format!("checked: () => {}", read));
                entries.push(format!(
                    "\"on:change\": (__e) => {}(__e.target.checked)",
                    setter
                ));
            }
        }
        "group" => {
            let Some(name) = target.as_identifier() else { return };
            let setter = SignalRegistry::setter_name(name);
            let read = emit_expr(cg, target);
            let own_value = attributes
                .iter()
                .find(|a| a.name == "value")
                .and_then(|a| a.value.as_ref())
                .map(|v| emit_expr(cg, v))
                .unwrap_or_else(|| "undefined".into());
            let is_checkbox = attributes.iter().any(|a| {
                a.name == "type"
                    && matches!(&a.value, Some(Expr::StringLiteral { value }) if value == "checkbox")
            });
            if is_checkbox {
                // Checkbox group: the signal holds an array of values.
                entries.push(format!(
                    "checked: () => {}.includes({})",
                    read, own_value
                ));
                entries.push(format!(
                    "\"on:change\": (__e) => {setter}(__e.target.checked ? [...{read}, {value}] : {read}.filter((__x) => __x !== {value}))",
                    setter = setter,
                    read = read,
                    value = own_value
                ));
            } else {
                // Radio group: single value.
                entries.push(format!("checked: () => {} === {}", read, own_value));
                entries.push(format!(
                    "\"on:change\": (__e) => {{ if (__e.target.checked) {}({}); }}",
                    setter, own_value
                ));
            }
        }
        "this" => {
            let ref_js = emit_expr(cg, target);
            entries.push(format!(
                "ref: (__el) => {{ const __r = {}; if (typeof __r === \"function\") __r(__el); else if (__r) __r.current = __el; }}",
                ref_js
            ));
        }
        _ => {}
    }
}

fn quote_prop_key(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if plain {
        name.to_string()
    } else {
        quote_string(name)
    }
}

fn emit_children_array(cg: &mut Codegen, children: &[JsxChild]) -> String {
    let rendered: Vec<String> = children.iter().map(|c| emit_jsx_child(cg, c)).collect();
    format!("[{}]", rendered.join(", "))
}

fn emit_jsx_child(cg: &mut Codegen, child: &JsxChild) -> String {
    match child {
        JsxChild::Element(el) => emit_jsx_element(cg, el),
        JsxChild::Text { value } => quote_string(value),
        JsxChild::ExprChild { expression } => reactive_value(cg, expression),
        JsxChild::For {
            variables,
            iterable,
            key,
            body,
        } => emit_jsx_for(cg, variables, iterable, key.as_ref(), body),
        JsxChild::If {
            branches,
            else_children,
        } => emit_jsx_if(cg, branches, else_children.as_deref()),
        JsxChild::Match { subject, arms } => emit_jsx_match(cg, subject, arms),
    }
}

fn emit_jsx_for(
    cg: &mut Codegen,
    variables: &[String],
    iterable: &Expr,
    key: Option<&Expr>,
    body: &[JsxChild],
) -> String {
    let reactive = reads_signal(cg, iterable);
    let iterable_js = emit_expr(cg, iterable);

    cg.scope.push();
    for variable in variables {
        cg.scope.declare(variable);
    }
    let binding = if variables.len() == 1 {
        variables[0].clone()
    } else {
        format!("[{}]", variables.join(", "))
    };
    let child_js = if body.len() == 1 {
        emit_jsx_child(cg, &body[0])
    } else {
        emit_children_array(cg, body)
    };
    let mapped = match key {
        Some(key) => {
            let key_js = emit_expr(cg, key);
            format!(
                "{}.map(({}) => tova_keyed({}, {}))",
                iterable_js, binding, key_js, child_js
            )
        }
        None => format!("{}.map(({}) => {})", iterable_js, binding, child_js),
    };
    cg.scope.pop();

    if reactive {
        format!("() => {}", mapped)
    } else {
        mapped
    }
}

fn emit_jsx_if(
    cg: &mut Codegen,
    branches: &[JsxIfBranch],
    else_children: Option<&[JsxChild]>,
) -> String {
    let any_reactive = branches
        .iter()
        .any(|b| reads_signal(cg, &b.condition));

    let mut out = String::new();
    for branch in branches {
        let cond = emit_expr(cg, &branch.condition);
        let then = if branch.children.len() == 1 {
            emit_jsx_child(cg, &branch.children[0])
        } else {
            emit_children_array(cg, &branch.children)
        };
        out.push_str(&format!("({}) ? {} : ", cond, then));
    }
    match else_children {
        Some(children) if children.len() == 1 => out.push_str(&emit_jsx_child(cg, &children[0])),
        Some(children) => out.push_str(&emit_children_array(cg, children)),
        None => out.push_str("null"),
    }

    if any_reactive {
        format!("() => ({})", out)
    } else {
        format!("({})", out)
    }
}

fn emit_jsx_match(cg: &mut Codegen, subject: &Expr, arms: &[JsxMatchArm]) -> String {
    let reactive = reads_signal(cg, subject);
    let subject_js = emit_expr(cg, subject);

    let mut body = String::new();
    for (i, arm) in arms.iter().enumerate() {
        let lowered = lower_pattern(cg, &arm.pattern, "__m");
        let is_default =
            i == arms.len() - 1 && arm.guard.is_none() && is_irrefutable(&arm.pattern);

        cg.scope.push();
        for (name, _) in &lowered.bindings {
            cg.scope.declare(name);
        }
        let children_js = if arm.children.len() == 1 {
            emit_jsx_child(cg, &arm.children[0])
        } else {
            emit_children_array(cg, &arm.children)
        };
        let test = match &arm.guard {
            Some(guard) => {
                let guard_js = emit_expr(cg, guard);
                if lowered.bindings.is_empty() {
                    format!("{} && ({})", lowered.test, guard_js)
                } else {
                    let names: Vec<&str> =
                        lowered.bindings.iter().map(|(n, _)| n.as_str()).collect();
                    let paths: Vec<&str> =
                        lowered.bindings.iter().map(|(_, p)| p.as_str()).collect();
                    format!(
                        "{} && (({}) => ({}))({})",
                        lowered.test,
                        names.join(", "),
                        guard_js,
                        paths.join(", ")
                    )
                }
            }
            None => lowered.test.clone(),
        };
        cg.scope.pop();

        if is_default {
            for (name, path) in &lowered.bindings {
                body.push_str(&format!("const {} = {};\n", name, path));
            }
            body.push_str(&format!("return {};\n", children_js));
            break;
        }
        body.push_str(&format!("if ({}) {{\n", test));
        for (name, path) in &lowered.bindings {
            body.push_str(&format!("  const {} = {};\n", name, path));
        }
        body.push_str(&format!("  return {};\n", children_js));
        body.push_str("}\n");
    }
    // No irrefutable final arm: fall through to null.
    if body.is_empty() || body.ends_with("}\n") {
        body.push_str("return null;\n");
    }

    let iife = format!("((__m) => {{\n{}}})({})", body, subject_js);
    if reactive {
        format!("() => {}", iife)
    } else {
        iife
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MergedStmt;

    fn client_cg() -> Codegen {
        Codegen::new(Target::Client)
    }

    fn merged(stmts: Vec<Stmt>) -> MergedBlock {
        MergedBlock {
            label: String::new(),
            stmts: stmts
                .into_iter()
                .map(|stmt| MergedStmt { source: 0, stmt })
                .collect(),
        }
    }

    #[test]
    fn state_emits_signal_pair() {
        let mut cg = client_cg();
        let mut w = CodeWriter::new();
        emit_state_declaration(
            &mut cg,
            &mut w,
            &StateDecl {
                name: "count".into(),
                value: Expr::num(0.0),
            },
        );
        assert_eq!(w.finish(), "const [count, setCount] = createSignal(0);\n");
    }

    #[test]
    fn signal_read_becomes_getter_call() {
        let mut cg = client_cg();
        cg.signals.state.insert("count".into());
        let js = emit_expr(&mut cg, &Expr::binary("+", Expr::ident("count"), Expr::num(1.0)));
        assert_eq!(js, "(count() + 1)");
    }

    #[test]
    fn compound_signal_write_uses_functional_setter() {
        let block = merged(vec![
            Stmt::of(StmtKind::StateDeclaration(StateDecl {
                name: "count".into(),
                value: Expr::num(0.0),
            })),
            Stmt::of(StmtKind::FunctionDeclaration(FunctionDecl {
                name: "inc".into(),
                params: vec![],
                body: vec![Stmt::of(StmtKind::CompoundAssignment(CompoundAssign {
                    target: Expr::ident("count"),
                    operator: "+=".into(),
                    value: Expr::num(1.0),
                }))],
                is_async: false,
                is_public: false,
                return_type: None,
                is_wasm: false,
            })),
        ]);
        let module = generate(&block, &["app.tova".into()], "./runtime.js");
        assert!(module.code.contains("const [count, setCount] = createSignal(0);"));
        assert!(module.code.contains("setCount(__p => __p + 1);"));
    }

    #[test]
    fn rpc_in_effect_wraps_async_iife_and_awaits() {
        let block = merged(vec![
            Stmt::of(StmtKind::StateDeclaration(StateDecl {
                name: "users".into(),
                value: Expr::ArrayLiteral { elements: vec![] },
            })),
            Stmt::of(StmtKind::EffectDeclaration(EffectDecl {
                body: vec![Stmt::of(StmtKind::Assignment(AssignStmt {
                    targets: vec!["users".into()],
                    values: vec![Expr::rpc_call("get_users", vec![])],
                }))],
            })),
        ]);
        let module = generate(&block, &["app.tova".into()], "./runtime.js");
        assert!(module.code.contains("createEffect(() => {"));
        assert!(module.code.contains("(async () => {"));
        assert!(module.code.contains("setUsers((await server.get_users()));"));
    }

    #[test]
    fn function_with_rpc_becomes_async() {
        let block = merged(vec![Stmt::of(StmtKind::FunctionDeclaration(FunctionDecl {
            name: "load".into(),
            params: vec![],
            body: vec![Stmt::of(StmtKind::ReturnStatement(ReturnStmt {
                value: Some(Expr::rpc_call("fetch_data", vec![])),
            }))],
            is_async: false,
            is_public: false,
            return_type: None,
            is_wasm: false,
        }))]);
        let module = generate(&block, &["app.tova".into()], "./runtime.js");
        assert!(module.code.contains("async function load()"));
        assert!(module.code.contains("return (await server.fetch_data());"));
    }

    #[test]
    fn jsx_element_lowers_to_factory_call() {
        let mut cg = client_cg();
        let el = JsxElement {
            tag: "div".into(),
            attributes: vec![JsxAttr {
                name: "id".into(),
                value: Some(Expr::str("main")),
            }],
            children: vec![JsxChild::Text {
                value: "hello".into(),
            }],
        };
        let js = emit_jsx_element(&mut cg, &el);
        assert_eq!(js, "tova_el(\"div\", { id: \"main\" }, [\"hello\"])");
    }

    #[test]
    fn reactive_attribute_wrapped_in_thunk() {
        let mut cg = client_cg();
        cg.signals.state.insert("count".into());
        let el = JsxElement {
            tag: "span".into(),
            attributes: vec![JsxAttr {
                name: "title".into(),
                value: Some(Expr::ident("count")),
            }],
            children: vec![],
        };
        let js = emit_jsx_element(&mut cg, &el);
        assert!(js.contains("title: () => count()"));
    }

    #[test]
    fn static_attribute_not_wrapped() {
        let mut cg = client_cg();
        let el = JsxElement {
            tag: "span".into(),
            attributes: vec![JsxAttr {
                name: "title".into(),
                value: Some(Expr::str("fixed")),
            }],
            children: vec![],
        };
        let js = emit_jsx_element(&mut cg, &el);
        assert!(js.contains("title: \"fixed\""));
    }

    #[test]
    fn component_call_attaches_children_prop() {
        let mut cg = client_cg();
        let el = JsxElement {
            tag: "Card".into(),
            attributes: vec![JsxAttr {
                name: "title".into(),
                value: Some(Expr::str("Hi")),
            }],
            children: vec![JsxChild::Text {
                value: "body".into(),
            }],
        };
        let js = emit_jsx_element(&mut cg, &el);
        assert!(js.starts_with("Card({"));
        assert!(js.contains("title: \"Hi\""));
        assert!(js.contains("children: [\"body\"]"));
    }

    #[test]
    fn bind_value_produces_value_and_input_handler() {
        let mut cg = client_cg();
        cg.signals.state.insert("text".into());
        let el = JsxElement {
            tag: "input".into(),
            attributes: vec![JsxAttr {
                name: "bind:value".into(),
                value: Some(Expr::ident("text")),
            }],
            children: vec![],
        };
        let js = emit_jsx_element(&mut cg, &el);
        assert!(js.contains("value: () => text()"));
        assert!(js.contains("\"on:input\": (__e) => setText(__e.target.value)"));
    }

    #[test]
    fn bind_value_numeric_coerces() {
        let mut cg = client_cg();
        cg.signals.state.insert("age".into());
        let el = JsxElement {
            tag: "input".into(),
            attributes: vec![
                JsxAttr {
                    name: "type".into(),
                    value: Some(Expr::str("number")),
                },
                JsxAttr {
                    name: "bind:value".into(),
                    value: Some(Expr::ident("age")),
                },
            ],
            children: vec![],
        };
        let js = emit_jsx_element(&mut cg, &el);
        assert!(js.contains("setAge(Number(__e.target.value))"));
    }

    #[test]
    fn event_modifiers_guard_handler() {
        let mut cg = client_cg();
        let js = emit_event_attr(
            &mut cg,
            "keydown.enter.prevent",
            Some(&Expr::ident("submit")),
        );
        assert!(js.contains("if (__e.key !== \"Enter\") return;"));
        assert!(js.contains("__e.preventDefault();"));
        assert!(js.starts_with("\"on:keydown\":"));
    }

    #[test]
    fn capture_once_ride_on_key() {
        let mut cg = client_cg();
        let js = emit_event_attr(&mut cg, "click.capture.once", Some(&Expr::ident("f")));
        assert!(js.starts_with("\"on:click.capture.once\":"));
    }

    #[test]
    fn class_directive_merges_into_class() {
        let mut cg = client_cg();
        cg.signals.state.insert("active".into());
        let el = JsxElement {
            tag: "button".into(),
            attributes: vec![
                JsxAttr {
                    name: "class".into(),
                    value: Some(Expr::str("btn")),
                },
                JsxAttr {
                    name: "class:active".into(),
                    value: Some(Expr::ident("active")),
                },
            ],
            children: vec![],
        };
        let js = emit_jsx_element(&mut cg, &el);
        assert!(js.contains("class: () => \"btn\" + ((active()) ? \" active\" : \"\")"));
    }

    #[test]
    fn keyed_for_uses_tova_keyed() {
        let mut cg = client_cg();
        cg.signals.state.insert("items".into());
        let js = emit_jsx_for(
            &mut cg,
            &["item".into()],
            &Expr::ident("items"),
            Some(&Expr::member(Expr::ident("item"), "id")),
            &[JsxChild::Text {
                value: "x".into(),
            }],
        );
        assert_eq!(
            js,
            "() => items().map((item) => tova_keyed(item.id, \"x\"))"
        );
    }

    #[test]
    fn jsx_if_chain_is_nested_ternary() {
        let mut cg = client_cg();
        let js = emit_jsx_if(
            &mut cg,
            &[JsxIfBranch {
                condition: Expr::ident("ready"),
                children: vec![JsxChild::Text {
                    value: "yes".into(),
                }],
            }],
            Some(&[JsxChild::Text {
                value: "no".into(),
            }]),
        );
        assert_eq!(js, "((ready) ? \"yes\" : \"no\")");
    }

    #[test]
    fn store_accessors_do_not_leak_inner_signals() {
        let block = merged(vec![Stmt::of(StmtKind::StoreDeclaration(StoreDecl {
            name: "cart".into(),
            body: vec![
                Stmt::of(StmtKind::StateDeclaration(StateDecl {
                    name: "items".into(),
                    value: Expr::ArrayLiteral { elements: vec![] },
                })),
                Stmt::of(StmtKind::ComputedDeclaration(ComputedDecl {
                    name: "total".into(),
                    value: Expr::call(
                        Expr::ident("len"),
                        vec![Expr::ident("items")],
                    ),
                })),
            ],
        }))]);
        let mut cg = client_cg();
        register_signals(&mut cg, &block);
        // Store-internal names are not in the outer registry.
        assert!(!cg.signals.state.contains("items"));
        let module = generate(&block, &["app.tova".into()], "./runtime.js");
        assert!(module.code.contains("get items() { return items(); }"));
        assert!(module.code.contains("set items(__v) { setItems(__v); }"));
        assert!(module.code.contains("get total() { return total(); }"));
    }

    #[test]
    fn component_props_are_reactive_getters() {
        let block = merged(vec![Stmt::of(StmtKind::ComponentDeclaration(
            ComponentDecl {
                name: "Greeting".into(),
                params: vec![Param::simple("name")],
                body: vec![Stmt::of(StmtKind::ExpressionStatement(ExprStmt {
                    expression: Expr::JSXElement(JsxElement {
                        tag: "p".into(),
                        attributes: vec![],
                        children: vec![JsxChild::ExprChild {
                            expression: Expr::ident("name"),
                        }],
                    }),
                }))],
                style: None,
            },
        ))]);
        let module = generate(&block, &["app.tova".into()], "./runtime.js");
        assert!(module.code.contains("const name = () => __props.name;"));
        // Prop read in JSX is a reactive thunk over the getter.
        assert!(module.code.contains("() => name()"));
        assert!(module.code.contains("Greeting._componentName = \"Greeting\";"));
    }

    #[test]
    fn styled_component_scopes_elements_and_collects_css() {
        let block = merged(vec![Stmt::of(StmtKind::ComponentDeclaration(
            ComponentDecl {
                name: "Card".into(),
                params: vec![],
                body: vec![Stmt::of(StmtKind::ExpressionStatement(ExprStmt {
                    expression: Expr::JSXElement(JsxElement {
                        tag: "div".into(),
                        attributes: vec![],
                        children: vec![],
                    }),
                }))],
                style: Some(".card { color: red; }".into()),
            },
        ))]);
        let module = generate(&block, &["app.tova".into()], "./runtime.js");
        let attr = css::scope_attr("Card", ".card { color: red; }");
        assert!(module.code.contains(&format!("\"{}\": \"\"", attr)));
        assert!(module.code.contains("__styles.textContent ="));
        assert!(module.code.contains("mount(() => Card({}), __root);"));
        assert!(module.code.contains("hydrate(() => Card({}), __root);"));
    }
}
