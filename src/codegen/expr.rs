//! Base expression lowering: AST expressions → JavaScript expression text.
//!
//! Shared by every output target. The client generator layers its signal
//! read transform and RPC auto-await on top via the `Codegen` flags; no
//! other target transforms expressions.

use crate::ast::*;

use super::client;
use super::pattern::{is_irrefutable, lower_pattern};
use super::stmt;
use super::Codegen;

/// Lower an expression to JavaScript text.
pub fn emit_expr(cg: &mut Codegen, expr: &Expr) -> String {
    match expr {
        Expr::NumberLiteral { value } => fmt_number(*value),
        Expr::StringLiteral { value } => quote_string(value),
        Expr::BooleanLiteral { value } => value.to_string(),
        Expr::NilLiteral => "null".into(),
        Expr::TemplateLiteral { parts } => emit_template(cg, parts),
        Expr::Identifier { name } => emit_identifier(cg, name),
        Expr::BinaryExpression {
            operator,
            left,
            right,
        } => emit_binary(cg, operator, left, right),
        Expr::UnaryExpression { operator, operand } => {
            let inner = emit_expr(cg, operand);
            match operator.as_str() {
                "not" | "!" => format!("!({})", inner),
                op => format!("{}{}", op, maybe_paren(&inner)),
            }
        }
        Expr::LogicalExpression {
            operator,
            left,
            right,
        } => {
            let op = match operator.as_str() {
                "and" => "&&",
                "or" => "||",
                other => other,
            };
            format!("({} {} {})", emit_expr(cg, left), op, emit_expr(cg, right))
        }
        Expr::ChainedComparison {
            operands,
            operators,
        } => {
            let parts: Vec<String> = operands.iter().map(|o| emit_expr(cg, o)).collect();
            let mut tests = Vec::new();
            for (i, op) in operators.iter().enumerate() {
                tests.push(format!("{} {} {}", parts[i], map_operator(op), parts[i + 1]));
            }
            format!("({})", tests.join(" && "))
        }
        Expr::MembershipExpression {
            value,
            collection,
            negated,
        } => {
            cg.helpers.contains = true;
            let call = format!(
                "__tova_contains({}, {})",
                emit_expr(cg, collection),
                emit_expr(cg, value)
            );
            if *negated {
                format!("!{}", call)
            } else {
                call
            }
        }
        Expr::CallExpression { callee, arguments } => {
            let is_rpc = client::is_rpc_call(expr);
            let callee_js = emit_expr(cg, callee);
            let args_js = emit_call_args(cg, arguments);
            let call = format!("{}({})", callee_js, args_js);
            if cg.is_client() && cg.in_async && is_rpc {
                format!("(await {})", call)
            } else {
                call
            }
        }
        // Only meaningful inside a call; bare occurrence emits the value.
        Expr::NamedArgument { value, .. } => emit_expr(cg, value),
        Expr::MemberExpression {
            object,
            property,
            computed,
        } => {
            let obj = emit_expr(cg, object);
            if *computed {
                format!("{}[{}]", obj, emit_expr(cg, property))
            } else {
                let name = property.as_identifier().map(str::to_owned).unwrap_or_else(|| {
                    // Non-identifier property outside computed access only
                    // arises from malformed input; emit it verbatim.
                    emit_expr(cg, property)
                });
                if super::helpers::STRING_PROTO_NAMES.contains(&name.as_str()) {
                    cg.helpers.string_protos = true;
                }
                format!("{}.{}", obj, name)
            }
        }
        Expr::OptionalChain { object, property } => {
            format!("{}?.{}", emit_expr(cg, object), property)
        }
        Expr::PipeExpression { left, right } => emit_pipe(cg, left, right),
        Expr::LambdaExpression {
            params,
            body,
            is_async,
        } => emit_lambda(cg, params, body, *is_async),
        Expr::MatchExpression { subject, arms } => emit_match(cg, subject, arms),
        Expr::IfExpression {
            condition,
            then_branch,
            else_branch,
        } => emit_if_expr(cg, condition, then_branch, else_branch),
        Expr::ArrayLiteral { elements } => {
            let items: Vec<String> = elements.iter().map(|e| emit_expr(cg, e)).collect();
            format!("[{}]", items.join(", "))
        }
        Expr::ObjectLiteral { properties } => {
            if properties.is_empty() {
                return "{}".into();
            }
            let props: Vec<String> = properties
                .iter()
                .map(|p| {
                    if p.shorthand {
                        let value = emit_expr(cg, &p.value);
                        // The client read transform can turn `x` into `x()`,
                        // which shorthand cannot express.
                        if value == p.key {
                            p.key.clone()
                        } else {
                            format!("{}: {}", quote_key(&p.key), value)
                        }
                    } else {
                        format!("{}: {}", quote_key(&p.key), emit_expr(cg, &p.value))
                    }
                })
                .collect();
            format!("{{ {} }}", props.join(", "))
        }
        Expr::ListComprehension {
            expression,
            variable,
            iterable,
            condition,
        } => emit_list_comprehension(cg, expression, variable, iterable, condition.as_deref()),
        Expr::DictComprehension {
            key,
            value,
            variable,
            iterable,
            condition,
        } => emit_dict_comprehension(cg, key, value, variable, iterable, condition.as_deref()),
        Expr::RangeExpression {
            start,
            end,
            inclusive,
        } => {
            let length = if *inclusive {
                "__e - __s + 1"
            } else {
                "__e - __s"
            };
            format!(
                "((__s, __e) => Array.from({{ length: Math.max(0, {}) }}, (_, __i) => __s + __i))({}, {})",
                length,
                emit_expr(cg, start),
                emit_expr(cg, end)
            )
        }
        Expr::SliceExpression {
            object,
            start,
            end,
            step,
        } => {
            cg.helpers.slice = true;
            let opt = |cg: &mut Codegen, e: &Option<Box<Expr>>| match e {
                Some(e) => emit_expr(cg, e),
                None => "null".into(),
            };
            let obj = emit_expr(cg, object);
            let start_js = opt(cg, start);
            let end_js = opt(cg, end);
            let step_js = opt(cg, step);
            format!("__tova_slice({}, {}, {}, {})", obj, start_js, end_js, step_js)
        }
        Expr::SpreadExpression { argument } => format!("...{}", emit_expr(cg, argument)),
        Expr::PropagateExpression { argument } => {
            cg.helpers.propagate = true;
            format!("__tova_propagate({})", emit_expr(cg, argument))
        }
        Expr::AwaitExpression { argument } => format!("(await {})", emit_expr(cg, argument)),
        Expr::JSXElement(element) => client::emit_jsx_element(cg, element),
        Expr::JSXFragment { children } => client::emit_jsx_fragment(cg, children),
        Expr::Unknown => "/* unknown: expression */ undefined".into(),
    }
}

fn emit_identifier(cg: &mut Codegen, name: &str) -> String {
    if cg.is_client() && cg.signals.is_signal(name) {
        return format!("{}()", name);
    }
    if name == "Ok" || name == "Err" || name == "Some" || name == "None" {
        cg.helpers.result_option = true;
    } else {
        cg.helpers.mark_builtin(name);
    }
    name.to_string()
}

fn emit_binary(cg: &mut Codegen, operator: &str, left: &Expr, right: &Expr) -> String {
    if operator == "??" {
        // NaN counts as nil, so a plain `??` is not enough.
        let left_js = emit_expr(cg, left);
        let right_js = emit_expr(cg, right);
        return format!(
            "((__v) => (__v == null || Number.isNaN(__v)) ? ({}) : __v)({})",
            right_js, left_js
        );
    }
    format!(
        "({} {} {})",
        emit_expr(cg, left),
        map_operator(operator),
        emit_expr(cg, right)
    )
}

fn map_operator(op: &str) -> &str {
    match op {
        "==" => "===",
        "!=" => "!==",
        other => other,
    }
}

/// Positional arguments stay positional; named arguments collect into one
/// trailing object, matching the keyed RPC wire mode.
pub fn emit_call_args(cg: &mut Codegen, arguments: &[Expr]) -> String {
    let mut positional = Vec::new();
    let mut named = Vec::new();
    for arg in arguments {
        match arg {
            Expr::NamedArgument { name, value } => {
                named.push(format!("{}: {}", quote_key(name), emit_expr(cg, value)));
            }
            other => positional.push(emit_expr(cg, other)),
        }
    }
    if !named.is_empty() {
        positional.push(format!("{{ {} }}", named.join(", ")));
    }
    positional.join(", ")
}

fn emit_pipe(cg: &mut Codegen, left: &Expr, right: &Expr) -> String {
    let left_js = emit_expr(cg, left);
    match right {
        Expr::CallExpression { callee, arguments } => {
            // `.method(a)` pipes the left-hand side as the receiver.
            if let Some(name) = callee.as_identifier() {
                if let Some(method) = name.strip_prefix('.') {
                    let args = emit_call_args(cg, arguments);
                    return format!("{}.{}({})", maybe_paren(&left_js), method, args);
                }
            }
            let has_placeholder = arguments
                .iter()
                .any(|a| matches!(a, Expr::Identifier { name } if name == "_"));
            let callee_js = emit_expr(cg, callee);
            if has_placeholder {
                let args: Vec<String> = arguments
                    .iter()
                    .map(|a| match a {
                        Expr::Identifier { name } if name == "_" => left_js.clone(),
                        other => emit_expr(cg, other),
                    })
                    .collect();
                format!("{}({})", callee_js, args.join(", "))
            } else {
                let mut args = vec![left_js];
                for a in arguments {
                    args.push(emit_expr(cg, a));
                }
                format!("{}({})", callee_js, args.join(", "))
            }
        }
        // `x |> f` — bare callable.
        other => format!("{}({})", emit_expr(cg, other), left_js),
    }
}

fn emit_lambda(cg: &mut Codegen, params: &[Param], body: &LambdaBody, is_async: bool) -> String {
    cg.scope.push();
    let param_list = emit_params(cg, params);

    let needs_async = is_async
        || (cg.is_client()
            && match body {
                LambdaBody::Expr { expression } => client::contains_rpc(cg, expression),
                LambdaBody::Block { body } => client::stmts_contain_rpc(cg, body),
            });
    let prev_async = cg.in_async;
    cg.in_async = cg.in_async || needs_async;

    let has_propagate = match body {
        LambdaBody::Expr { expression } => stmt::expr_contains_propagate(expression),
        LambdaBody::Block { body } => stmt::stmts_contain_propagate(body),
    };

    let prefix = if needs_async { "async " } else { "" };
    let rendered = match body {
        LambdaBody::Expr { expression } if !has_propagate => {
            // Assignments as lambda bodies (`fn() count += 1`) reach here
            // as expressions only when the parser kept them so; statement
            // bodies go through the block branch.
            format!("{}({}) => {}", prefix, param_list, emit_expr(cg, expression))
        }
        LambdaBody::Expr { expression } => {
            let inner = format!("return {};", emit_expr(cg, expression));
            format!(
                "{}({}) => {{\n{}\n}}",
                prefix,
                param_list,
                stmt::wrap_propagate_body(&inner)
            )
        }
        LambdaBody::Block { body } => {
            let inner = stmt::emit_stmts_to_string(cg, body);
            let inner = if has_propagate {
                stmt::wrap_propagate_body(&inner)
            } else {
                inner
            };
            format!("{}({}) => {{\n{}\n}}", prefix, param_list, inner)
        }
    };

    cg.in_async = prev_async;
    cg.scope.pop();
    rendered
}

/// Render a parameter list, declaring every bound name in the current scope.
pub fn emit_params(cg: &mut Codegen, params: &[Param]) -> String {
    let mut rendered = Vec::new();
    for param in params {
        if let Some(pattern) = &param.pattern {
            // Destructuring parameter: declare all bound names.
            let lowered = lower_pattern(cg, pattern, "__p");
            for (name, _) in &lowered.bindings {
                cg.scope.declare(name);
            }
            rendered.push(render_destructure_pattern(pattern));
        } else {
            cg.scope.declare(&param.name);
            match &param.default {
                Some(default) => {
                    let default_js = emit_expr(cg, default);
                    rendered.push(format!("{} = {}", param.name, default_js));
                }
                None => rendered.push(param.name.clone()),
            }
        }
    }
    rendered.join(", ")
}

/// Render an array/object pattern as a JS destructuring target.
pub fn render_destructure_pattern(pattern: &Pattern) -> String {
    match pattern {
        Pattern::ArrayPattern { elements } => {
            let parts: Vec<String> = elements.iter().map(render_destructure_pattern).collect();
            format!("[{}]", parts.join(", "))
        }
        Pattern::ObjectPattern { fields } => {
            let parts: Vec<String> = fields
                .iter()
                .map(|f| match &f.pattern {
                    Some(sub) => format!("{}: {}", f.key, render_destructure_pattern(sub)),
                    None => f.key.clone(),
                })
                .collect();
            format!("{{ {} }}", parts.join(", "))
        }
        Pattern::BindingPattern { name } => name.clone(),
        Pattern::WildcardPattern => "_".into(),
        _ => "_".into(),
    }
}

fn emit_match(cg: &mut Codegen, subject: &Expr, arms: &[MatchArm]) -> String {
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
        let value_js = emit_arm_value(cg, &arm.body);
        let test = match &arm.guard {
            // The binding must exist before the guard evaluates; the guard
            // runs inside a lambda receiving the bound values.
            Some(guard) => {
                let guard_js = emit_expr(cg, guard);
                if lowered.bindings.is_empty() {
                    join_tests(&lowered.test, &format!("({})", guard_js))
                } else {
                    let names: Vec<&str> =
                        lowered.bindings.iter().map(|(n, _)| n.as_str()).collect();
                    let paths: Vec<&str> =
                        lowered.bindings.iter().map(|(_, p)| p.as_str()).collect();
                    join_tests(
                        &lowered.test,
                        &format!("(({}) => ({}))({})", names.join(", "), guard_js, paths.join(", ")),
                    )
                }
            }
            None => lowered.test.clone(),
        };
        cg.scope.pop();

        if is_default {
            // Final irrefutable arm: no conditional needed.
            for (name, path) in &lowered.bindings {
                body.push_str(&format!("const {} = {};\n", name, path));
            }
            body.push_str(&format!("return {};\n", value_js));
            return format!("((__m) => {{\n{}}})({})", indent_block(&body), subject_js);
        }
        body.push_str(&format!("if ({}) {{\n", test));
        for (name, path) in &lowered.bindings {
            body.push_str(&format!("  const {} = {};\n", name, path));
        }
        body.push_str(&format!("  return {};\n", value_js));
        body.push_str("}\n");
    }

    body.push_str("return undefined;\n");
    format!("((__m) => {{\n{}}})({})", indent_block(&body), subject_js)
}

fn emit_arm_value(cg: &mut Codegen, body: &MatchArmBody) -> String {
    match body {
        MatchArmBody::Expr { expression } => emit_expr(cg, expression),
        MatchArmBody::Block { body } => stmt::emit_value_block_to_string(cg, body),
    }
}

fn emit_if_expr(
    cg: &mut Codegen,
    condition: &Expr,
    then_branch: &BodyExpr,
    else_branch: &BodyExpr,
) -> String {
    let cond_js = emit_expr(cg, condition);
    // Peephole: both branches single expressions → ternary.
    if let (BodyExpr::Expr { expression: t }, BodyExpr::Expr { expression: e }) =
        (then_branch, else_branch)
    {
        let then_js = emit_expr(cg, t);
        let else_js = emit_expr(cg, e);
        return format!("({} ? {} : {})", cond_js, then_js, else_js);
    }
    let then_js = emit_body_expr(cg, then_branch);
    let else_js = emit_body_expr(cg, else_branch);
    format!(
        "(() => {{\nif ({}) {{\nreturn {};\n}} else {{\nreturn {};\n}}\n}})()",
        cond_js, then_js, else_js
    )
}

fn emit_body_expr(cg: &mut Codegen, body: &BodyExpr) -> String {
    match body {
        BodyExpr::Expr { expression } => emit_expr(cg, expression),
        BodyExpr::Block { body } => stmt::emit_value_block_to_string(cg, body),
    }
}

fn emit_list_comprehension(
    cg: &mut Codegen,
    expression: &Expr,
    variable: &str,
    iterable: &Expr,
    condition: Option<&Expr>,
) -> String {
    let iterable_js = emit_expr(cg, iterable);
    cg.scope.push();
    cg.scope.declare(variable);
    let cond_js = condition.map(|c| emit_expr(cg, c));
    // `.map` elided when the expression is the loop variable unchanged.
    let identity = matches!(expression, Expr::Identifier { name } if name == variable);
    let out = match (identity, cond_js) {
        (true, Some(cond)) => format!("{}.filter(({}) => {})", iterable_js, variable, cond),
        (true, None) => format!("[...{}]", iterable_js),
        (false, cond) => {
            let expr_js = emit_expr(cg, expression);
            match cond {
                Some(cond) => format!(
                    "{}.filter(({}) => {}).map(({}) => {})",
                    iterable_js, variable, cond, variable, expr_js
                ),
                None => format!("{}.map(({}) => {})", iterable_js, variable, expr_js),
            }
        }
    };
    cg.scope.pop();
    out
}

fn emit_dict_comprehension(
    cg: &mut Codegen,
    key: &Expr,
    value: &Expr,
    variable: &str,
    iterable: &Expr,
    condition: Option<&Expr>,
) -> String {
    let iterable_js = emit_expr(cg, iterable);
    cg.scope.push();
    cg.scope.declare(variable);
    let key_js = emit_expr(cg, key);
    let value_js = emit_expr(cg, value);
    let out = match condition.map(|c| emit_expr(cg, c)) {
        Some(cond) => format!(
            "Object.fromEntries({}.filter(({}) => {}).map(({}) => [{}, {}]))",
            iterable_js, variable, cond, variable, key_js, value_js
        ),
        None => format!(
            "Object.fromEntries({}.map(({}) => [{}, {}]))",
            iterable_js, variable, key_js, value_js
        ),
    };
    cg.scope.pop();
    out
}

fn emit_template(cg: &mut Codegen, parts: &[TemplatePart]) -> String {
    let mut out = String::from("`");
    for part in parts {
        match part {
            TemplatePart::Text { value } => {
                out.push_str(
                    &value
                        .replace('\\', "\\\\")
                        .replace('`', "\\`")
                        .replace("${", "\\${"),
                );
            }
            TemplatePart::Interp { expression } => {
                out.push_str("${");
                out.push_str(&emit_expr(cg, expression));
                out.push('}');
            }
        }
    }
    out.push('`');
    out
}

fn join_tests(a: &str, b: &str) -> String {
    if a == "true" {
        b.to_string()
    } else {
        format!("{} && {}", a, b)
    }
}

fn maybe_paren(s: &str) -> String {
    let simple = s
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '$');
    if simple {
        s.to_string()
    } else {
        format!("({})", s)
    }
}

fn indent_block(body: &str) -> String {
    body.lines()
        .map(|l| {
            if l.is_empty() {
                String::new()
            } else {
                format!("  {}", l)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

pub fn fmt_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub fn quote_string(s: &str) -> String {
    format!("\"{}\"", escape_string(s))
}

pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

fn quote_key(key: &str) -> String {
    let plain = !key.is_empty()
        && key
            .chars()
            .enumerate()
            .all(|(i, c)| c == '_' || c == '$' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()));
    if plain {
        key.to_string()
    } else {
        quote_string(key)
    }
}
