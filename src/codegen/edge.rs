//! Edge lowering: one merged edge config emitted for five serverless
//! targets (Cloudflare Workers, Deno Deploy, Vercel Edge, AWS Lambda,
//! Bun), plus the Cloudflare wrangler manifest.

use crate::ast::*;
use crate::merge::MergedEdge;

use super::expr::{emit_expr, quote_string};
use super::route::compile_route_pattern;
use super::security;
use super::stmt::{emit_stmt, emit_stmts};
use super::writer::CodeWriter;
use super::{Codegen, GeneratedModule, Target};

/// Generate the edge module for the block's configured target.
pub fn generate(
    edge: &MergedEdge,
    sec: Option<&SecurityBlock>,
    sources: &[String],
) -> GeneratedModule {
    let mut cg = Codegen::new(Target::Edge);
    for source in sources {
        cg.map.add_source(source);
    }
    let mut w = CodeWriter::new();
    let target = edge.config.target;

    emit_bindings(&mut w, edge, target);
    w.blank();

    if let Some(sec) = sec {
        let secret_expr = match target {
            EdgeTarget::Cloudflare => "__env_get(\"{name}\")",
            EdgeTarget::Deno => "Deno.env.get(\"{name}\")",
            _ => "process.env.{name}",
        };
        security::emit_security_support(&mut w, sec, secret_expr);
    }

    emit_cors_helper(&mut w, edge.config.cors.as_ref());
    w.blank();

    // User functions and statements.
    for merged in &edge.body {
        cg.source_index = merged.source;
        emit_stmt(&mut cg, &mut w, &merged.stmt);
    }
    w.blank();

    // Middlewares, emitted as named async functions.
    for middleware in &edge.config.middlewares {
        w.block_open(&format!(
            "async function __mw_{}(__req, __next)",
            middleware.name
        ));
        cg.scope.push();
        cg.scope.declare("__req");
        cg.scope.declare("__next");
        emit_stmts(&mut cg, &mut w, &middleware.body);
        cg.scope.pop();
        w.block_close();
    }

    emit_route_table(&mut cg, &mut w, edge, sec);
    emit_dispatcher(&mut w, edge, sec);
    emit_chain(&mut w, &edge.config.middlewares);
    cg.helpers.emit_used(&mut w);
    w.blank();

    match target {
        EdgeTarget::Cloudflare => emit_cloudflare_shell(&mut w, edge),
        EdgeTarget::Deno => emit_deno_shell(&mut w, edge),
        EdgeTarget::Vercel => emit_vercel_shell(&mut w, edge),
        EdgeTarget::Lambda => emit_lambda_shell(&mut w, edge),
        EdgeTarget::Bun => emit_bun_shell(&mut w, edge),
    }

    GeneratedModule {
        code: w.finish(),
        map: cg.map,
    }
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// Per-target binding initialization. Cloudflare gets module-level `let`s
/// refreshed from `env` on every invocation; the others resolve at module
/// load.
fn emit_bindings(w: &mut CodeWriter, edge: &MergedEdge, target: EdgeTarget) {
    let bindings = &edge.config.bindings;
    match target {
        EdgeTarget::Cloudflare => {
            for binding in bindings
                .kv
                .iter()
                .chain(&bindings.sql)
                .chain(&bindings.storage)
                .chain(&bindings.queue)
            {
                w.line(&format!("let {};", binding.name));
            }
            for env in &edge.config.env {
                w.line(&format!("let {};", env.name));
            }
            for secret in &edge.config.secrets {
                w.line(&format!("let {};", secret));
            }
            w.line("let __env_store = {};");
            w.line("function __env_get(__name) { return __env_store[__name]; }");
            w.block_open("function __initBindings(__env)");
            w.line("__env_store = __env;");
            for binding in bindings
                .kv
                .iter()
                .chain(&bindings.sql)
                .chain(&bindings.storage)
                .chain(&bindings.queue)
            {
                w.line(&format!("{0} = __env.{0};", binding.name));
            }
            for env in &edge.config.env {
                match &env.default {
                    Some(default) => w.line(&format!(
                        "{0} = __env.{0} ?? {1};",
                        env.name,
                        quote_string(default)
                    )),
                    None => w.line(&format!("{0} = __env.{0};", env.name)),
                }
            }
            for secret in &edge.config.secrets {
                w.line(&format!("{0} = __env.{0};", secret));
            }
            w.block_close();
        }
        EdgeTarget::Deno => {
            for binding in &bindings.kv {
                w.line(&format!("const {} = await Deno.openKv();", binding.name));
            }
            for binding in bindings.sql.iter().chain(&bindings.storage).chain(&bindings.queue) {
                w.line(&format!("const {} = null;", binding.name));
            }
            for env in &edge.config.env {
                match &env.default {
                    Some(default) => w.line(&format!(
                        "const {} = Deno.env.get(\"{}\") ?? {};",
                        env.name,
                        env.name,
                        quote_string(default)
                    )),
                    None => w.line(&format!(
                        "const {} = Deno.env.get(\"{}\");",
                        env.name, env.name
                    )),
                }
            }
            for secret in &edge.config.secrets {
                w.line(&format!("const {} = Deno.env.get(\"{}\");", secret, secret));
            }
        }
        EdgeTarget::Vercel | EdgeTarget::Lambda => {
            for binding in bindings
                .kv
                .iter()
                .chain(&bindings.sql)
                .chain(&bindings.storage)
                .chain(&bindings.queue)
            {
                w.line(&format!("const {} = null;", binding.name));
            }
            emit_process_env(w, edge);
        }
        EdgeTarget::Bun => {
            if !bindings.sql.is_empty() {
                w.line("import { Database } from \"bun:sqlite\";");
                for binding in &bindings.sql {
                    let db = binding.resource.as_deref().unwrap_or("app.db");
                    w.line(&format!(
                        "const {} = new Database({});",
                        binding.name,
                        quote_string(db)
                    ));
                }
            }
            for binding in bindings.kv.iter().chain(&bindings.storage).chain(&bindings.queue) {
                w.line(&format!("const {} = null;", binding.name));
            }
            emit_process_env(w, edge);
        }
    }
}

fn emit_process_env(w: &mut CodeWriter, edge: &MergedEdge) {
    for env in &edge.config.env {
        match &env.default {
            Some(default) => w.line(&format!(
                "const {0} = process.env.{0} ?? {1};",
                env.name,
                quote_string(default)
            )),
            None => w.line(&format!("const {0} = process.env.{0};", env.name)),
        }
    }
    for secret in &edge.config.secrets {
        w.line(&format!("const {0} = process.env.{0};", secret));
    }
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

/// Empty `cors {}` means wildcard; explicit origins echo the request
/// origin only when allow-listed.
fn emit_cors_helper(w: &mut CodeWriter, cors: Option<&CorsConfig>) {
    match cors {
        None => {
            w.line("const __corsActive = false;");
            w.line("function __cors(__req) { return {}; }");
        }
        Some(config) if config.origins.is_empty() => {
            w.line("const __corsActive = true;");
            w.raw(
                r#"function __cors(__req) {
  return {
    "Access-Control-Allow-Origin": "*",
    "Access-Control-Allow-Methods": "GET, POST, PUT, DELETE, OPTIONS",
    "Access-Control-Allow-Headers": "Content-Type, Authorization",
  };
}"#,
            );
        }
        Some(config) => {
            let origins: Vec<String> =
                config.origins.iter().map(|o| quote_string(o)).collect();
            w.line("const __corsActive = true;");
            w.line(&format!(
                "const __corsOrigins = [{}];",
                origins.join(", ")
            ));
            w.raw(
                r#"function __cors(__req) {
  const __origin = __req.headers.get("Origin") ?? "";
  if (!__corsOrigins.includes(__origin)) return {};
  return {
    "Access-Control-Allow-Origin": __origin,
    "Access-Control-Allow-Methods": "GET, POST, PUT, DELETE, OPTIONS",
    "Access-Control-Allow-Headers": "Content-Type, Authorization",
    "Vary": "Origin",
  };
}"#,
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Routes and dispatch
// ---------------------------------------------------------------------------

fn emit_route_table(cg: &mut Codegen, w: &mut CodeWriter, edge: &MergedEdge, sec: Option<&SecurityBlock>) {
    let mut entries = Vec::new();
    for route in &edge.config.routes {
        let compiled = compile_route_pattern(&route.path);
        let params: Vec<String> = compiled.params.iter().map(|p| quote_string(p)).collect();
        let handler = emit_expr(cg, &route.handler);
        entries.push(format!(
            "{{ method: \"{}\", regex: new RegExp(\"{}\"), params: [{}], handler: {} }}",
            route.method.to_uppercase(),
            super::expr::escape_string(&compiled.regex),
            params.join(", "),
            handler
        ));
    }

    // Health check registers as a GET route.
    if let Some(health) = &edge.config.health {
        let compiled = compile_route_pattern(&health.path);
        let memory_check = if health.memory {
            "checks: { memory: __memoryCheck() }, "
        } else {
            ""
        };
        entries.push(format!(
            "{{ method: \"GET\", regex: new RegExp(\"{}\"), params: [], handler: () => ({{ status: \"ok\", {}timestamp: new Date().toISOString() }}) }}",
            super::expr::escape_string(&compiled.regex),
            memory_check
        ));
        if health.memory {
            w.raw(
                r#"function __memoryCheck() {
  if (typeof process !== "undefined" && process.memoryUsage) {
    const __m = process.memoryUsage();
    return { heapUsed: __m.heapUsed, heapTotal: __m.heapTotal };
  }
  return { heapUsed: 0, heapTotal: 0 };
}"#,
            );
        }
    }

    w.line(&format!("const __routes = [{}];", entries.join(", ")));
    w.raw(
        r#"function __matchRoute(__method, __path, __table) {
  for (const __route of __table) {
    if (__route.method !== __method) continue;
    const __m = __path.match(__route.regex);
    if (!__m) continue;
    const __params = {};
    __route.params.forEach((__name, __i) => { __params[__name] = __m[__i + 1]; });
    return { handler: __route.handler, params: __params };
  }
  return null;
}"#,
    );

    let sanitize = sec.map(|s| !s.sensitive.is_empty()).unwrap_or(false);
    let body = if sanitize { "__sanitize(__data)" } else { "__data" };
    w.raw(&format!(
        r#"function __json(__data, __status, __headers) {{
  return new Response(JSON.stringify({}), {{
    status: __status ?? 200,
    headers: {{ "Content-Type": "application/json", ...(__headers ?? {{}}) }},
  }});
}}"#,
        body
    ));
}

fn emit_dispatcher(w: &mut CodeWriter, edge: &MergedEdge, sec: Option<&SecurityBlock>) {
    w.block_open("async function __dispatchRoute(__req, __ctx)");
    w.line("const __url = new URL(__req.url);");
    w.block_open("if (__req.method === \"OPTIONS\")");
    w.line("return new Response(null, { status: 204, headers: __cors(__req) });");
    w.block_close();

    if sec.map(|s| s.csrf).unwrap_or(false) {
        w.line("if (!__csrfCheck(__req)) return __json({ error: \"CSRF token mismatch\" }, 403, __cors(__req));");
    }

    if sec.map(|s| !s.protect.is_empty()).unwrap_or(false) {
        w.line("{");
        w.indent();
        w.line("const __rule = __matchProtected(__url.pathname);");
        w.block_open("if (__rule)");
        w.line("const __header = __req.headers.get(\"Authorization\") ?? \"\";");
        w.line("const __user = await __verifyToken(__header.replace(/^Bearer /, \"\"));");
        w.line("if (!__user) return __json({ error: \"Unauthorized\" }, 401, __cors(__req));");
        w.line("if (__rule.require && !__hasRole(__user, __rule.require)) return __json({ error: \"Forbidden\" }, 403, __cors(__req));");
        w.line("__ctx.user = __user;");
        w.block_close();
        w.block_close();
    }

    w.line("const __m = __matchRoute(__req.method, __url.pathname, __routes);");
    w.line("if (!__m) return __json({ error: \"Not found\" }, 404, __cors(__req));");
    w.line("const __result = await __m.handler(__req, __m.params, __ctx);");
    w.block_open("if (__result instanceof Response)");
    w.line("for (const [__k, __v] of Object.entries(__cors(__req))) __result.headers.set(__k, __v);");
    if let Some(sec) = sec {
        if sec.hsts || sec.csp.is_some() {
            w.line("for (const [__k, __v] of Object.entries(__securityHeaders)) __result.headers.set(__k, __v);");
        }
    }
    w.line("return __result;");
    w.block_close();
    let extra = match sec {
        Some(sec) if sec.hsts || sec.csp.is_some() => {
            "{ ...__cors(__req), ...__securityHeaders }"
        }
        _ => "__cors(__req)",
    };
    w.line(&format!("return __json(__result, 200, {});", extra));
    w.block_close();
}

/// Middlewares compose right-to-left around the dispatcher: the first
/// declared runs outermost.
fn emit_chain(w: &mut CodeWriter, middlewares: &[MiddlewareDecl]) {
    w.block_open("async function __runChain(__req, __ctx)");
    w.line("let __handler = (__r) => __dispatchRoute(__r, __ctx);");
    for middleware in middlewares.iter().rev() {
        w.line(&format!(
            "{{ const __next = __handler; __handler = (__r) => __mw_{}(__r, __next); }}",
            middleware.name
        ));
    }
    w.line("return __handler(__req);");
    w.block_close();
}

/// The uniform catch body: a user `on_error` runs first, then a 500 JSON
/// response with CORS merged when active.
fn emit_catch(w: &mut CodeWriter, edge: &MergedEdge, req_available: bool) {
    if let Some(on_error) = &edge.config.on_error {
        w.line(&format!("try {{ await {}(__err); }} catch {{}}", on_error));
    }
    let headers = if req_available { "__cors(__req)" } else { "{}" };
    w.line(&format!(
        "return __json({{ error: String(__err && __err.message ? __err.message : __err) }}, 500, {});",
        headers
    ));
}

// ---------------------------------------------------------------------------
// Target shells
// ---------------------------------------------------------------------------

fn emit_cloudflare_shell(w: &mut CodeWriter, edge: &MergedEdge) {
    w.block_open("export default");
    w.block_open("async fetch(__req, __env, __ctx)");
    w.line("__initBindings(__env);");
    w.block_open("try");
    w.line("return await __runChain(__req, __ctx);");
    w.dedent();
    w.line("} catch (__err) {");
    w.indent();
    emit_catch(w, edge, true);
    w.block_close();
    w.dedent();
    w.line("},");

    if !edge.config.cron.is_empty() {
        w.block_open("async scheduled(__event, __env, __ctx)");
        w.line("__initBindings(__env);");
        w.block_open("try");
        w.block_open("switch (__event.cron)");
        for cron in &edge.config.cron {
            w.line(&format!(
                "case {}: await {}(__event); break;",
                quote_string(&cron.schedule),
                cron.handler
            ));
        }
        w.block_close();
        w.dedent();
        w.line("} catch (__err) {");
        w.indent();
        w.line("console.error(\"scheduled handler failed:\", __err);");
        w.block_close();
        w.dedent();
        w.line("},");
    }

    if !edge.config.queues.is_empty() {
        w.block_open("async queue(__batch, __env, __ctx)");
        w.line("__initBindings(__env);");
        w.block_open("for (const __msg of __batch.messages)");
        w.block_open("try");
        for consumer in &edge.config.queues {
            w.line(&format!(
                "if (__batch.queue === {}) await {}(__msg.body);",
                quote_string(&consumer.queue),
                consumer.handler
            ));
        }
        w.line("__msg.ack();");
        w.dedent();
        w.line("} catch (__err) {");
        w.indent();
        w.line("__msg.retry();");
        w.block_close();
        w.block_close();
        w.dedent();
        w.line("},");
    }

    w.block_close_semi();
}

fn emit_deno_shell(w: &mut CodeWriter, edge: &MergedEdge) {
    for cron in &edge.config.cron {
        w.line(&format!(
            "Deno.cron(\"{}\", {}, () => {}());",
            cron.handler,
            quote_string(&cron.schedule),
            cron.handler
        ));
    }
    w.block_open("Deno.serve(async (__req) =>");
    w.block_open("try");
    w.line("return await __runChain(__req, {});");
    w.dedent();
    w.line("} catch (__err) {");
    w.indent();
    emit_catch(w, edge, true);
    w.block_close();
    w.dedent();
    w.line("});");
}

fn emit_vercel_shell(w: &mut CodeWriter, edge: &MergedEdge) {
    w.line("export const config = { runtime: \"edge\" };");
    w.block_open("export default async function handler(__req)");
    w.block_open("try");
    w.line("return await __runChain(__req, {});");
    w.dedent();
    w.line("} catch (__err) {");
    w.indent();
    emit_catch(w, edge, true);
    w.block_close();
    w.block_close();
}

fn emit_lambda_shell(w: &mut CodeWriter, edge: &MergedEdge) {
    w.raw(
        r#"function __eventToRequest(__event) {
  const __host = (__event.headers && (__event.headers.host ?? __event.headers.Host)) ?? "lambda";
  const __path = __event.rawPath ?? __event.path ?? "/";
  const __qs = __event.rawQueryString ? "?" + __event.rawQueryString : "";
  const __method = __event.requestContext && __event.requestContext.http
    ? __event.requestContext.http.method
    : (__event.httpMethod ?? "GET");
  return new Request("https://" + __host + __path + __qs, {
    method: __method,
    headers: __event.headers ?? {},
    body: __event.body && __method !== "GET" && __method !== "HEAD" ? __event.body : undefined,
  });
}
async function __responseToLambda(__res) {
  return {
    statusCode: __res.status,
    headers: Object.fromEntries(__res.headers.entries()),
    body: await __res.text(),
  };
}"#,
    );
    w.block_open("export async function handler(__event, __context)");
    w.line("const __req = __eventToRequest(__event);");
    w.block_open("try");
    w.line("const __res = await __runChain(__req, __context ?? {});");
    w.line("return await __responseToLambda(__res);");
    w.dedent();
    w.line("} catch (__err) {");
    w.indent();
    if let Some(on_error) = &edge.config.on_error {
        w.line(&format!("try {{ await {}(__err); }} catch {{}}", on_error));
    }
    w.line("return { statusCode: 500, headers: { \"Content-Type\": \"application/json\" }, body: JSON.stringify({ error: String(__err && __err.message ? __err.message : __err) }) };");
    w.block_close();
    w.block_close();
}

fn emit_bun_shell(w: &mut CodeWriter, edge: &MergedEdge) {
    w.line("const __port = Number(process.env.PORT ?? 3000);");
    w.block_open("Bun.serve({ port: __port, fetch: async (__req) =>");
    w.block_open("try");
    w.line("return await __runChain(__req, {});");
    w.dedent();
    w.line("} catch (__err) {");
    w.indent();
    emit_catch(w, edge, true);
    w.block_close();
    w.dedent();
    w.line("} });");
}

// ---------------------------------------------------------------------------
// Wrangler manifest
// ---------------------------------------------------------------------------

/// Cloudflare builds additionally get a `wrangler.toml` next to the edge
/// output.
pub fn generate_wrangler(edge: &MergedEdge, main_file: &str, project: &str) -> String {
    let mut out = String::new();
    let name = edge.config.name.as_deref().unwrap_or(project);
    out.push_str(&format!("name = \"{}\"\n", name));
    out.push_str(&format!("main = \"{}\"\n", main_file));
    out.push_str("compatibility_date = \"2024-11-01\"\n");

    for binding in &edge.config.bindings.kv {
        out.push_str("\n[[kv_namespaces]]\n");
        out.push_str(&format!("binding = \"{}\"\n", binding.name));
        out.push_str(&format!(
            "id = \"{}\"\n",
            binding.resource.as_deref().unwrap_or("")
        ));
    }
    for binding in &edge.config.bindings.sql {
        out.push_str("\n[[d1_databases]]\n");
        out.push_str(&format!("binding = \"{}\"\n", binding.name));
        out.push_str(&format!(
            "database_name = \"{}\"\n",
            binding.resource.as_deref().unwrap_or(name)
        ));
    }
    for binding in &edge.config.bindings.storage {
        out.push_str("\n[[r2_buckets]]\n");
        out.push_str(&format!("binding = \"{}\"\n", binding.name));
        out.push_str(&format!(
            "bucket_name = \"{}\"\n",
            binding.resource.as_deref().unwrap_or(name)
        ));
    }
    for binding in &edge.config.bindings.queue {
        out.push_str("\n[[queues.producers]]\n");
        out.push_str(&format!("binding = \"{}\"\n", binding.name));
        out.push_str(&format!(
            "queue = \"{}\"\n",
            binding.resource.as_deref().unwrap_or(name)
        ));
    }
    for consumer in &edge.config.queues {
        out.push_str("\n[[queues.consumers]]\n");
        out.push_str(&format!("queue = \"{}\"\n", consumer.queue));
        if let Some(batch) = consumer.batch_size {
            out.push_str(&format!("max_batch_size = {}\n", batch));
        }
    }
    if !edge.config.cron.is_empty() {
        let crons: Vec<String> = edge
            .config
            .cron
            .iter()
            .map(|c| format!("\"{}\"", c.schedule))
            .collect();
        out.push_str(&format!("\n[triggers]\ncrons = [{}]\n", crons.join(", ")));
    }
    let with_defaults: Vec<&EnvDecl> = edge
        .config
        .env
        .iter()
        .filter(|e| e.default.is_some())
        .collect();
    if !with_defaults.is_empty() {
        out.push_str("\n[vars]\n");
        for env in with_defaults {
            out.push_str(&format!(
                "{} = \"{}\"\n",
                env.name,
                env.default.as_deref().unwrap_or("")
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_edge(target: EdgeTarget) -> MergedEdge {
        MergedEdge {
            label: String::new(),
            config: EdgeBlock {
                target,
                routes: vec![RouteDecl {
                    method: "GET".into(),
                    path: "/api/users/:id".into(),
                    handler: Expr::ident("getUser"),
                }],
                env: vec![EnvDecl {
                    name: "API_URL".into(),
                    default: Some("https://api.example.com".into()),
                }],
                secrets: vec!["API_KEY".into()],
                bindings: EdgeBindings {
                    kv: vec![NamedBinding {
                        name: "CACHE".into(),
                        resource: Some("cache_ns".into()),
                    }],
                    ..Default::default()
                },
                cors: Some(CorsConfig { origins: vec![] }),
                ..Default::default()
            },
            body: vec![],
        }
    }

    fn gen_code(edge: &MergedEdge) -> String {
        generate(edge, None, &["edge.tova".into()]).code
    }

    #[test]
    fn cloudflare_initializes_bindings_per_invocation() {
        let code = gen_code(&base_edge(EdgeTarget::Cloudflare));
        assert!(code.contains("let CACHE;"));
        assert!(code.contains("function __initBindings(__env)"));
        assert!(code.contains("CACHE = __env.CACHE;"));
        assert!(code.contains("API_URL = __env.API_URL ?? \"https://api.example.com\";"));
        // Secrets read without defaults.
        assert!(code.contains("API_KEY = __env.API_KEY;"));
        assert!(code.contains("async fetch(__req, __env, __ctx)"));
        assert!(code.contains("__initBindings(__env);"));
    }

    #[test]
    fn deno_uses_open_kv() {
        let code = gen_code(&base_edge(EdgeTarget::Deno));
        assert!(code.contains("const CACHE = await Deno.openKv();"));
        assert!(code.contains("Deno.serve(async (__req) =>"));
        assert!(code.contains("Deno.env.get(\"API_KEY\")"));
    }

    #[test]
    fn vercel_stubs_bindings() {
        let code = gen_code(&base_edge(EdgeTarget::Vercel));
        assert!(code.contains("const CACHE = null;"));
        assert!(code.contains("export const config = { runtime: \"edge\" };"));
        assert!(code.contains("const API_KEY = process.env.API_KEY;"));
    }

    #[test]
    fn lambda_converts_events() {
        let code = gen_code(&base_edge(EdgeTarget::Lambda));
        assert!(code.contains("function __eventToRequest(__event)"));
        assert!(code.contains("export async function handler(__event, __context)"));
        assert!(code.contains("statusCode: __res.status"));
    }

    #[test]
    fn bun_uses_sqlite_for_sql_bindings() {
        let mut edge = base_edge(EdgeTarget::Bun);
        edge.config.bindings.sql.push(NamedBinding {
            name: "DB".into(),
            resource: Some("data.db".into()),
        });
        let code = gen_code(&edge);
        assert!(code.contains("import { Database } from \"bun:sqlite\";"));
        assert!(code.contains("const DB = new Database(\"data.db\");"));
        assert!(code.contains("Bun.serve("));
    }

    #[test]
    fn route_table_compiled_at_build_time() {
        let code = gen_code(&base_edge(EdgeTarget::Cloudflare));
        assert!(code.contains("new RegExp(\"^\\\\/api\\\\/users\\\\/([^/]+)$\")"));
        assert!(code.contains("params: [\"id\"]"));
        assert!(code.contains("function __matchRoute(__method, __path, __table)"));
    }

    #[test]
    fn empty_cors_is_wildcard() {
        let code = gen_code(&base_edge(EdgeTarget::Cloudflare));
        assert!(code.contains("\"Access-Control-Allow-Origin\": \"*\""));
    }

    #[test]
    fn explicit_cors_echoes_allowed_origin() {
        let mut edge = base_edge(EdgeTarget::Cloudflare);
        edge.config.cors = Some(CorsConfig {
            origins: vec!["https://app.example.com".into()],
        });
        let code = gen_code(&edge);
        assert!(code.contains("const __corsOrigins = [\"https://app.example.com\"];"));
        assert!(code.contains("if (!__corsOrigins.includes(__origin)) return {};"));
    }

    #[test]
    fn middlewares_compose_first_declared_outermost() {
        let mut edge = base_edge(EdgeTarget::Cloudflare);
        edge.config.middlewares = vec![
            MiddlewareDecl {
                name: "auth".into(),
                body: vec![],
            },
            MiddlewareDecl {
                name: "logger".into(),
                body: vec![],
            },
        ];
        let code = gen_code(&edge);
        let logger_pos = code.find("__handler = (__r) => __mw_logger").unwrap();
        let auth_pos = code.find("__handler = (__r) => __mw_auth").unwrap();
        // Wrapping order: logger first (inner), auth last (outer).
        assert!(logger_pos < auth_pos);
    }

    #[test]
    fn health_check_registers_get_route() {
        let mut edge = base_edge(EdgeTarget::Cloudflare);
        edge.config.health = Some(HealthConfig {
            path: "/health".into(),
            memory: true,
        });
        let code = gen_code(&edge);
        assert!(code.contains("status: \"ok\""));
        assert!(code.contains("timestamp: new Date().toISOString()"));
        assert!(code.contains("function __memoryCheck()"));
    }

    #[test]
    fn scheduled_and_queue_handlers_cloudflare_only() {
        let mut edge = base_edge(EdgeTarget::Cloudflare);
        edge.config.cron = vec![CronDecl {
            schedule: "0 0 * * *".into(),
            handler: "daily".into(),
        }];
        edge.config.queues = vec![QueueConsumer {
            queue: "jobs".into(),
            handler: "processJob".into(),
            batch_size: None,
        }];
        let code = gen_code(&edge);
        assert!(code.contains("async scheduled(__event, __env, __ctx)"));
        assert!(code.contains("case \"0 0 * * *\": await daily(__event); break;"));
        assert!(code.contains("async queue(__batch, __env, __ctx)"));

        let mut deno = base_edge(EdgeTarget::Deno);
        deno.config.cron = vec![CronDecl {
            schedule: "0 0 * * *".into(),
            handler: "daily".into(),
        }];
        let deno_code = gen_code(&deno);
        assert!(deno_code.contains("Deno.cron(\"daily\", \"0 0 * * *\", () => daily());"));
    }

    #[test]
    fn security_block_emits_jwt_and_protect() {
        let sec = SecurityBlock {
            auth: Some(AuthConfig {
                secret: SecretSource::Env {
                    name: "AUTH_SECRET".into(),
                },
                expiry_seconds: None,
            }),
            protect: vec![ProtectRule {
                pattern: "/admin/**".into(),
                require: Some("admin".into()),
            }],
            roles: vec![RoleDecl {
                name: "admin".into(),
                permissions: vec![],
            }],
            ..Default::default()
        };
        let edge = base_edge(EdgeTarget::Cloudflare);
        let code = generate(&edge, Some(&sec), &["edge.tova".into()]).code;
        assert!(code.contains("__verifyToken"));
        assert!(code.contains("const __user = await __verifyToken(__header.replace(/^Bearer /, \"\"));"));
        assert!(code.contains("__hasRole(__user, __rule.require)"));
        // Cloudflare secret reads go through the env store.
        assert!(code.contains("const __authSecret = __env_get(\"AUTH_SECRET\");"));
    }

    #[test]
    fn on_error_runs_before_500() {
        let mut edge = base_edge(EdgeTarget::Cloudflare);
        edge.config.on_error = Some("reportError".into());
        let code = gen_code(&edge);
        assert!(code.contains("try { await reportError(__err); } catch {}"));
        assert!(code.contains("500"));
    }

    #[test]
    fn wrangler_manifest_lists_resources() {
        let mut edge = base_edge(EdgeTarget::Cloudflare);
        edge.config.bindings.sql.push(NamedBinding {
            name: "DB".into(),
            resource: Some("appdb".into()),
        });
        edge.config.cron = vec![CronDecl {
            schedule: "*/5 * * * *".into(),
            handler: "tick".into(),
        }];
        let toml = generate_wrangler(&edge, "src.edge.js", "myapp");
        assert!(toml.contains("name = \"myapp\""));
        assert!(toml.contains("main = \"src.edge.js\""));
        assert!(toml.contains("[[kv_namespaces]]"));
        assert!(toml.contains("binding = \"CACHE\""));
        assert!(toml.contains("id = \"cache_ns\""));
        assert!(toml.contains("[[d1_databases]]"));
        assert!(toml.contains("database_name = \"appdb\""));
        assert!(toml.contains("crons = [\"*/5 * * * *\"]"));
        assert!(toml.contains("[vars]"));
        assert!(toml.contains("API_URL = \"https://api.example.com\""));
    }
}
