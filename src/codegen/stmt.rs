//! Base statement lowering: AST statements → JavaScript written through a
//! `CodeWriter`.
//!
//! Every statement records its source-map entry first, then dispatches by
//! variant. Assignment lowering consults the scope tracker to pick between
//! a fresh `const` binding and a reassignment; the client generator's
//! signal transforms are applied here when the target is registered.

use crate::ast::*;
use crate::codegen::SignalRegistry;

use super::client;
use super::expr::{emit_expr, emit_params, render_destructure_pattern};
use super::pattern::lower_pattern;
use super::writer::CodeWriter;
use super::Codegen;

/// Emit a run of statements.
pub fn emit_stmts(cg: &mut Codegen, w: &mut CodeWriter, stmts: &[Stmt]) {
    for stmt in stmts {
        emit_stmt(cg, w, stmt);
    }
}

/// Emit one statement, recording its source map entry first.
pub fn emit_stmt(cg: &mut Codegen, w: &mut CodeWriter, stmt: &Stmt) {
    cg.record_stmt(w, stmt.loc);
    match &stmt.kind {
        StmtKind::Assignment(assign) => emit_assignment(cg, w, assign),
        StmtKind::VarDeclaration(decl) => emit_var_declaration(cg, w, decl),
        StmtKind::LetDestructure(destructure) => {
            let lowered = lower_pattern(cg, &destructure.pattern, "__d");
            for (name, _) in &lowered.bindings {
                cg.scope.declare(name);
            }
            let target = render_destructure_pattern(&destructure.pattern);
            let value = emit_expr(cg, &destructure.value);
            w.line(&format!("const {} = {};", target, value));
        }
        StmtKind::FunctionDeclaration(decl) => emit_function(cg, w, decl),
        StmtKind::TypeDeclaration(decl) => emit_type_declaration(cg, w, decl),
        StmtKind::ImportDeclaration(decl) => {
            if decl.names.is_empty() {
                w.line(&format!("import \"{}\";", decl.path));
            } else {
                for name in &decl.names {
                    cg.scope.declare(name);
                }
                w.line(&format!(
                    "import {{ {} }} from \"{}\";",
                    decl.names.join(", "),
                    decl.path
                ));
            }
        }
        StmtKind::IfStatement(stmt) => emit_if(cg, w, stmt),
        StmtKind::ForStatement(stmt) => emit_for(cg, w, stmt),
        StmtKind::WhileStatement(stmt) => {
            let cond = emit_expr(cg, &stmt.condition);
            w.block_open(&format!("while ({})", cond));
            cg.scope.push();
            emit_stmts(cg, w, &stmt.body);
            cg.scope.pop();
            w.block_close();
        }
        StmtKind::TryCatchStatement(stmt) => emit_try_catch(cg, w, stmt),
        StmtKind::ReturnStatement(stmt) => match &stmt.value {
            Some(value) => {
                let value = emit_expr(cg, value);
                w.line(&format!("return {};", value));
            }
            None => w.line("return;"),
        },
        StmtKind::BlockStatement(stmt) => {
            w.block_open("");
            cg.scope.push();
            emit_stmts(cg, w, &stmt.body);
            cg.scope.pop();
            w.block_close();
        }
        StmtKind::CompoundAssignment(assign) => emit_compound_assignment(cg, w, assign),
        StmtKind::GuardStatement(stmt) => {
            let cond = emit_expr(cg, &stmt.condition);
            w.block_open(&format!("if (!({}))", cond));
            cg.scope.push();
            emit_stmts(cg, w, &stmt.else_body);
            cg.scope.pop();
            w.block_close();
        }
        StmtKind::InterfaceDeclaration(decl) => {
            // Type-only: documentation comment, no runtime code.
            let members: Vec<String> = decl
                .members
                .iter()
                .map(|m| match &m.type_annotation {
                    Some(ty) => format!("{}: {}", m.name, ty),
                    None => m.name.clone(),
                })
                .collect();
            w.line(&format!(
                "// interface {} {{ {} }}",
                decl.name,
                members.join(", ")
            ));
        }
        StmtKind::BreakStatement => w.line("break;"),
        StmtKind::ContinueStatement => w.line("continue;"),
        StmtKind::ExpressionStatement(stmt) => {
            let value = emit_expr(cg, &stmt.expression);
            w.line(&format!("{};", value));
        }

        StmtKind::StateDeclaration(decl) => client::emit_state_declaration(cg, w, decl),
        StmtKind::ComputedDeclaration(decl) => client::emit_computed_declaration(cg, w, decl),
        StmtKind::EffectDeclaration(decl) => client::emit_effect_declaration(cg, w, decl),
        StmtKind::ComponentDeclaration(decl) => client::emit_component_declaration(cg, w, decl),
        StmtKind::StoreDeclaration(decl) => client::emit_store_declaration(cg, w, decl),

        // Routes and discovers are collected and emitted by the server
        // generator, not lowered in statement position.
        StmtKind::RouteDeclaration(_) | StmtKind::DiscoverDeclaration(_) => {}

        StmtKind::Unknown => w.line("/* unknown: statement */"),
    }
}

// ---------------------------------------------------------------------------
// Assignment semantics
// ---------------------------------------------------------------------------

fn emit_assignment(cg: &mut Codegen, w: &mut CodeWriter, assign: &AssignStmt) {
    let values: Vec<String> = assign.values.iter().map(|v| emit_expr(cg, v)).collect();
    let value = if values.len() == 1 {
        values[0].clone()
    } else {
        format!("[{}]", values.join(", "))
    };

    if assign.targets.len() == 1 {
        let target = &assign.targets[0];
        // Wildcard: evaluate for side effects only.
        if target == "_" {
            w.line(&format!("{};", value));
            return;
        }
        // Signal write → setter call.
        if cg.is_client() && cg.signals.state.contains(target) {
            w.line(&format!("{}({});", SignalRegistry::setter_name(target), value));
            return;
        }
        if cg.scope.is_declared(target) {
            w.line(&format!("{} = {};", target, value));
        } else {
            cg.scope.declare(target);
            w.line(&format!("const {} = {};", target, value));
        }
        return;
    }

    // Multi-target: parallel reassignment when every target is already
    // declared (preserves swap atomicity), fresh destructuring otherwise.
    let all_declared = assign
        .targets
        .iter()
        .all(|t| t == "_" || cg.scope.is_declared(t));
    let target_list = assign.targets.join(", ");
    let value = if assign.values.len() == 1 {
        values[0].clone()
    } else {
        format!("[{}]", values.join(", "))
    };
    if all_declared {
        w.line(&format!("[{}] = {};", target_list, value));
    } else {
        for target in &assign.targets {
            if target != "_" {
                cg.scope.declare(target);
            }
        }
        w.line(&format!("const [{}] = {};", target_list, value));
    }
}

fn emit_var_declaration(cg: &mut Codegen, w: &mut CodeWriter, decl: &VarDecl) {
    let values: Vec<String> = decl.values.iter().map(|v| emit_expr(cg, v)).collect();
    for target in &decl.targets {
        cg.scope.declare(target);
    }
    if decl.targets.len() == 1 {
        w.line(&format!("let {} = {};", decl.targets[0], values[0]));
    } else {
        let value = if values.len() == 1 {
            values[0].clone()
        } else {
            format!("[{}]", values.join(", "))
        };
        w.line(&format!("let [{}] = {};", decl.targets.join(", "), value));
    }
}

fn emit_compound_assignment(cg: &mut Codegen, w: &mut CodeWriter, assign: &CompoundAssign) {
    let op = assign.operator.trim_end_matches('=');
    // Signal compound write → functional setter.
    if cg.is_client() {
        if let Some(name) = assign.target.as_identifier() {
            if cg.signals.state.contains(name) {
                let value = emit_expr(cg, &assign.value);
                w.line(&format!(
                    "{}(__p => __p {} {});",
                    SignalRegistry::setter_name(name),
                    op,
                    value
                ));
                return;
            }
        }
    }
    let target = emit_assignment_target(cg, &assign.target);
    let value = emit_expr(cg, &assign.value);
    w.line(&format!("{} {}= {};", target, op, value));
}

/// Lower the left-hand side of a write: never apply the signal read
/// transform to the target itself.
fn emit_assignment_target(cg: &mut Codegen, target: &Expr) -> String {
    match target {
        Expr::Identifier { name } => name.clone(),
        Expr::MemberExpression {
            object,
            property,
            computed,
        } => {
            let obj = emit_expr(cg, object);
            if *computed {
                format!("{}[{}]", obj, emit_expr(cg, property))
            } else {
                match property.as_identifier() {
                    Some(name) => format!("{}.{}", obj, name),
                    None => format!("{}.{}", obj, emit_expr(cg, property)),
                }
            }
        }
        other => emit_expr(cg, other),
    }
}

// ---------------------------------------------------------------------------
// Control flow
// ---------------------------------------------------------------------------

fn emit_if(cg: &mut Codegen, w: &mut CodeWriter, stmt: &IfStmt) {
    let cond = emit_expr(cg, &stmt.condition);
    w.block_open(&format!("if ({})", cond));
    cg.scope.push();
    emit_stmts(cg, w, &stmt.consequent);
    cg.scope.pop();

    for alternate in &stmt.alternates {
        let cond = emit_expr(cg, &alternate.condition);
        w.dedent();
        w.line(&format!("}} else if ({}) {{", cond));
        w.indent();
        cg.scope.push();
        emit_stmts(cg, w, &alternate.body);
        cg.scope.pop();
    }

    if let Some(else_body) = &stmt.else_body {
        w.block_else();
        cg.scope.push();
        emit_stmts(cg, w, else_body);
        cg.scope.pop();
    }
    w.block_close();
}

fn emit_for(cg: &mut Codegen, w: &mut CodeWriter, stmt: &ForStmt) {
    let iterable = emit_expr(cg, &stmt.iterable);
    let binding = if stmt.variables.len() == 1 {
        stmt.variables[0].clone()
    } else {
        format!("[{}]", stmt.variables.join(", "))
    };

    let open_loop = |cg: &mut Codegen, w: &mut CodeWriter, iterable: &str| {
        w.block_open(&format!("for (const {} of {})", binding, iterable));
        cg.scope.push();
        for variable in &stmt.variables {
            cg.scope.declare(variable);
        }
        emit_stmts(cg, w, &stmt.body);
        cg.scope.pop();
        w.block_close();
    };

    match &stmt.else_body {
        // for-else: the else arm runs when the iterable was empty.
        Some(else_body) => {
            let items = cg.fresh("items");
            w.line(&format!("const {} = [...{}];", items, iterable));
            w.block_open(&format!("if ({}.length === 0)", items));
            cg.scope.push();
            emit_stmts(cg, w, else_body);
            cg.scope.pop();
            w.block_else();
            open_loop(cg, w, &items);
            w.block_close();
        }
        None => open_loop(cg, w, &iterable),
    }
}

fn emit_try_catch(cg: &mut Codegen, w: &mut CodeWriter, stmt: &TryCatchStmt) {
    w.block_open("try");
    cg.scope.push();
    emit_stmts(cg, w, &stmt.body);
    cg.scope.pop();

    let param = stmt.catch_param.as_deref().unwrap_or("__err");
    w.dedent();
    w.line(&format!("}} catch ({}) {{", param));
    w.indent();
    cg.scope.push();
    cg.scope.declare(param);
    emit_stmts(cg, w, &stmt.catch_body);
    cg.scope.pop();

    if let Some(finally_body) = &stmt.finally_body {
        w.dedent();
        w.line("} finally {");
        w.indent();
        cg.scope.push();
        emit_stmts(cg, w, finally_body);
        cg.scope.pop();
    }
    w.block_close();
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// Lower a function declaration: fresh scope for parameters, propagate
/// try/catch wrapping, async marking (explicit or client RPC-driven).
pub fn emit_function(cg: &mut Codegen, w: &mut CodeWriter, decl: &FunctionDecl) {
    if decl.is_wasm {
        w.line(&format!(
            "// fn {} is compiled to WebAssembly",
            decl.name
        ));
        return;
    }

    cg.scope.declare(&decl.name);
    cg.scope.push();
    let params = emit_params(cg, &decl.params);

    let needs_async =
        decl.is_async || (cg.is_client() && client::stmts_contain_rpc(cg, &decl.body));
    let prev_async = cg.in_async;
    cg.in_async = needs_async;

    let prefix = if needs_async { "async " } else { "" };
    let export = if decl.is_public { "export " } else { "" };
    w.block_open(&format!(
        "{}{}function {}({})",
        export, prefix, decl.name, params
    ));

    if stmts_contain_propagate(&decl.body) {
        w.block_open("try");
        emit_stmts(cg, w, &decl.body);
        w.dedent();
        w.line("} catch (__e) {");
        w.indent();
        w.line("if (__e && __e.__lux_propagate) return __e.value;");
        w.line("throw __e;");
        w.block_close();
    } else {
        emit_stmts(cg, w, &decl.body);
    }

    w.block_close();
    cg.in_async = prev_async;
    cg.scope.pop();
}

// ---------------------------------------------------------------------------
// Type declarations
// ---------------------------------------------------------------------------

fn emit_type_declaration(cg: &mut Codegen, w: &mut CodeWriter, decl: &TypeDecl) {
    cg.scope.declare(&decl.name);

    // Record field validators for server RPC validation and form reuse.
    let validated: Vec<(String, Vec<FieldValidator>)> = decl
        .fields
        .iter()
        .filter(|f| !f.validators.is_empty())
        .map(|f| (f.name.clone(), f.validators.clone()))
        .collect();
    if !validated.is_empty() {
        cg.type_validators.insert(decl.name.clone(), validated);
    }

    if decl.is_sum() {
        for variant in &decl.variants {
            let field_names: Vec<String> =
                variant.fields.iter().map(|f| f.name.clone()).collect();
            cg.variant_fields
                .insert(variant.name.clone(), field_names.clone());
            cg.scope.declare(&variant.name);

            let params = field_names.join(", ");
            let mut record = format!("__tag: \"{}\"", variant.name);
            if !field_names.is_empty() {
                record.push_str(&format!(", {}", field_names.join(", ")));
            }
            record.push_str(&derived_methods(&decl.derive, &variant.name, &field_names));
            w.line(&format!(
                "const {} = ({}) => Object.freeze({{ {} }});",
                variant.name, params, record
            ));
        }
        // Namespace object so `Shape.Circle` works too.
        let names: Vec<&str> = decl.variants.iter().map(|v| v.name.as_str()).collect();
        w.line(&format!(
            "const {} = Object.freeze({{ {} }});",
            decl.name,
            names.join(", ")
        ));
    } else {
        let field_names: Vec<String> = decl.fields.iter().map(|f| f.name.clone()).collect();
        let params = field_names.join(", ");
        let mut record = field_names.join(", ");
        let derived = derived_methods(&decl.derive, &decl.name, &field_names);
        if record.is_empty() {
            record = derived.trim_start_matches(", ").to_string();
        } else {
            record.push_str(&derived);
        }
        w.line(&format!(
            "const {} = ({}) => Object.freeze({{ {} }});",
            decl.name, params, record
        ));
    }
}

/// Helper methods added by `derive(Eq, Show, JSON)`.
fn derived_methods(derives: &[String], tag: &str, fields: &[String]) -> String {
    let mut out = String::new();
    for derive in derives {
        match derive.as_str() {
            "Eq" => {
                let cmp: Vec<String> = fields
                    .iter()
                    .map(|f| format!(" && __o.{0} === {0}", f))
                    .collect();
                out.push_str(&format!(
                    ", equals(__o) {{ return __o != null && __o.__tag === \"{}\"{}; }}",
                    tag,
                    cmp.join("")
                ));
            }
            "Show" => {
                let parts: Vec<String> = fields.iter().map(|f| format!("${{{}}}", f)).collect();
                out.push_str(&format!(
                    ", toString() {{ return `{}({})`; }}",
                    tag,
                    parts.join(", ")
                ));
            }
            "JSON" => {
                let mut body = format!("__tag: \"{}\"", tag);
                if !fields.is_empty() {
                    body.push_str(&format!(", {}", fields.join(", ")));
                }
                out.push_str(&format!(", toJSON() {{ return {{ {} }}; }}", body));
            }
            _ => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Nested emission helpers
// ---------------------------------------------------------------------------

/// Emit statements into a detached string (lambda blocks, match arms).
/// Source-map recording is suppressed: the nested writer's lines are not
/// final output lines.
pub fn emit_stmts_to_string(cg: &mut Codegen, stmts: &[Stmt]) -> String {
    let prev = cg.suppress_map;
    cg.suppress_map = true;
    let mut w = CodeWriter::new();
    w.indent();
    emit_stmts(cg, &mut w, stmts);
    cg.suppress_map = prev;
    w.finish().trim_end().to_string()
}

/// Emit a statement block in value position: an IIFE whose trailing
/// expression statement becomes the return value.
pub fn emit_value_block_to_string(cg: &mut Codegen, stmts: &[Stmt]) -> String {
    let prev = cg.suppress_map;
    cg.suppress_map = true;
    let mut w = CodeWriter::new();
    w.indent();
    cg.scope.push();
    if let Some((last, init)) = stmts.split_last() {
        emit_stmts(cg, &mut w, init);
        match &last.kind {
            StmtKind::ExpressionStatement(stmt) => {
                let value = emit_expr(cg, &stmt.expression);
                w.line(&format!("return {};", value));
            }
            _ => emit_stmt(cg, &mut w, last),
        }
    }
    cg.scope.pop();
    cg.suppress_map = prev;
    let body = w.finish();
    let body = body.trim_end();
    if cg.in_async {
        // Keep `await` usable inside the block.
        format!("(await (async () => {{\n{}\n}})())", body)
    } else {
        format!("(() => {{\n{}\n}})()", body)
    }
}

/// Wrap a pre-rendered function body in the propagate-unwrapping try/catch.
pub fn wrap_propagate_body(inner: &str) -> String {
    format!(
        "try {{\n{}\n}} catch (__e) {{\n  if (__e && __e.__lux_propagate) return __e.value;\n  throw __e;\n}}",
        inner
    )
}

// ---------------------------------------------------------------------------
// Propagate detection
// ---------------------------------------------------------------------------

/// Does any statement contain a `PropagateExpression`, without crossing
/// nested function or lambda boundaries?
pub fn stmts_contain_propagate(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_contains_propagate)
}

fn stmt_contains_propagate(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Assignment(s) => s.values.iter().any(expr_contains_propagate),
        StmtKind::VarDeclaration(s) => s.values.iter().any(expr_contains_propagate),
        StmtKind::LetDestructure(s) => expr_contains_propagate(&s.value),
        // Nested functions handle their own propagation.
        StmtKind::FunctionDeclaration(_) => false,
        StmtKind::IfStatement(s) => {
            expr_contains_propagate(&s.condition)
                || stmts_contain_propagate(&s.consequent)
                || s.alternates.iter().any(|a| {
                    expr_contains_propagate(&a.condition) || stmts_contain_propagate(&a.body)
                })
                || s.else_body.as_deref().is_some_and(stmts_contain_propagate)
        }
        StmtKind::ForStatement(s) => {
            expr_contains_propagate(&s.iterable)
                || stmts_contain_propagate(&s.body)
                || s.else_body.as_deref().is_some_and(stmts_contain_propagate)
        }
        StmtKind::WhileStatement(s) => {
            expr_contains_propagate(&s.condition) || stmts_contain_propagate(&s.body)
        }
        StmtKind::TryCatchStatement(s) => {
            stmts_contain_propagate(&s.body)
                || stmts_contain_propagate(&s.catch_body)
                || s.finally_body.as_deref().is_some_and(stmts_contain_propagate)
        }
        StmtKind::ReturnStatement(s) => {
            s.value.as_ref().is_some_and(expr_contains_propagate)
        }
        StmtKind::BlockStatement(s) => stmts_contain_propagate(&s.body),
        StmtKind::CompoundAssignment(s) => {
            expr_contains_propagate(&s.value) || expr_contains_propagate(&s.target)
        }
        StmtKind::GuardStatement(s) => {
            expr_contains_propagate(&s.condition) || stmts_contain_propagate(&s.else_body)
        }
        StmtKind::ExpressionStatement(s) => expr_contains_propagate(&s.expression),
        _ => false,
    }
}

pub fn expr_contains_propagate(expr: &Expr) -> bool {
    match expr {
        Expr::PropagateExpression { .. } => true,
        Expr::BinaryExpression { left, right, .. }
        | Expr::LogicalExpression { left, right, .. } => {
            expr_contains_propagate(left) || expr_contains_propagate(right)
        }
        Expr::UnaryExpression { operand, .. } => expr_contains_propagate(operand),
        Expr::ChainedComparison { operands, .. } => {
            operands.iter().any(expr_contains_propagate)
        }
        Expr::MembershipExpression { value, collection, .. } => {
            expr_contains_propagate(value) || expr_contains_propagate(collection)
        }
        Expr::CallExpression { callee, arguments } => {
            expr_contains_propagate(callee) || arguments.iter().any(expr_contains_propagate)
        }
        Expr::NamedArgument { value, .. } => expr_contains_propagate(value),
        Expr::MemberExpression { object, property, .. } => {
            expr_contains_propagate(object) || expr_contains_propagate(property)
        }
        Expr::OptionalChain { object, .. } => expr_contains_propagate(object),
        Expr::PipeExpression { left, right } => {
            expr_contains_propagate(left) || expr_contains_propagate(right)
        }
        // Lambda bodies are their own propagation boundary.
        Expr::LambdaExpression { .. } => false,
        Expr::MatchExpression { subject, arms } => {
            expr_contains_propagate(subject)
                || arms.iter().any(|arm| {
                    arm.guard.as_ref().is_some_and(expr_contains_propagate)
                        || match &arm.body {
                            MatchArmBody::Expr { expression } => {
                                expr_contains_propagate(expression)
                            }
                            MatchArmBody::Block { body } => stmts_contain_propagate(body),
                        }
                })
        }
        Expr::IfExpression {
            condition,
            then_branch,
            else_branch,
        } => {
            expr_contains_propagate(condition)
                || body_expr_contains_propagate(then_branch)
                || body_expr_contains_propagate(else_branch)
        }
        Expr::ArrayLiteral { elements } => elements.iter().any(expr_contains_propagate),
        Expr::ObjectLiteral { properties } => {
            properties.iter().any(|p| expr_contains_propagate(&p.value))
        }
        Expr::ListComprehension {
            expression,
            iterable,
            condition,
            ..
        } => {
            expr_contains_propagate(expression)
                || expr_contains_propagate(iterable)
                || condition.as_deref().is_some_and(expr_contains_propagate)
        }
        Expr::DictComprehension {
            key,
            value,
            iterable,
            condition,
            ..
        } => {
            expr_contains_propagate(key)
                || expr_contains_propagate(value)
                || expr_contains_propagate(iterable)
                || condition.as_deref().is_some_and(expr_contains_propagate)
        }
        Expr::RangeExpression { start, end, .. } => {
            expr_contains_propagate(start) || expr_contains_propagate(end)
        }
        Expr::SliceExpression {
            object,
            start,
            end,
            step,
        } => {
            expr_contains_propagate(object)
                || start.as_deref().is_some_and(expr_contains_propagate)
                || end.as_deref().is_some_and(expr_contains_propagate)
                || step.as_deref().is_some_and(expr_contains_propagate)
        }
        Expr::SpreadExpression { argument }
        | Expr::AwaitExpression { argument } => expr_contains_propagate(argument),
        Expr::TemplateLiteral { parts } => parts.iter().any(|p| match p {
            TemplatePart::Interp { expression } => expr_contains_propagate(expression),
            TemplatePart::Text { .. } => false,
        }),
        _ => false,
    }
}

fn body_expr_contains_propagate(body: &BodyExpr) -> bool {
    match body {
        BodyExpr::Expr { expression } => expr_contains_propagate(expression),
        BodyExpr::Block { body } => stmts_contain_propagate(body),
    }
}
