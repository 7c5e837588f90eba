//! Server lowering: route table, request dispatcher, RPC endpoint
//! synthesis, Bun.serve startup, and `discover` proxies with circuit
//! breaking and retry.

use crate::ast::*;
use crate::merge::MergedBlock;

use super::expr::emit_expr;
use super::form::validator_condition;
use super::stmt::emit_stmt;
use super::writer::CodeWriter;
use super::{Codegen, GeneratedModule, Target};

/// Generate one server module. `ordinal` is the block's position among the
/// directory's server blocks and fixes its default port (3000, 3001, ...).
pub fn generate(
    block: &MergedBlock,
    sources: &[String],
    ordinal: usize,
    sec: Option<&SecurityBlock>,
) -> GeneratedModule {
    let mut cg = Codegen::new(Target::Server);
    for source in sources {
        cg.map.add_source(source);
    }

    let mut w = CodeWriter::new();
    if let Some(sec) = sec {
        super::security::emit_security_support(&mut w, sec, "process.env.{name}");
    }
    emit_router_prelude(&mut w);

    // Discover proxies come before user code so handlers can call peers.
    let discovers: Vec<&DiscoverDecl> = block
        .stmts
        .iter()
        .filter_map(|m| match &m.stmt.kind {
            StmtKind::DiscoverDeclaration(d) => Some(d),
            _ => None,
        })
        .collect();
    if !discovers.is_empty() {
        emit_discover_helper(&mut w);
        for discover in &discovers {
            let port_var = format!("PORT_{}", discover.name.to_uppercase().replace('-', "_"));
            w.line(&format!(
                "const {} = __discover(\"{}\", \"{}\", \"{}\");",
                discover.name, discover.name, discover.url, port_var
            ));
        }
        w.blank();
    }

    // User statements (functions, types, plain code).
    for merged in &block.stmts {
        cg.source_index = merged.source;
        emit_stmt(&mut cg, &mut w, &merged.stmt);
    }
    w.blank();

    // RPC endpoint per function.
    for merged in &block.stmts {
        if let StmtKind::FunctionDeclaration(decl) = &merged.stmt.kind {
            if !decl.is_wasm {
                emit_rpc_endpoint(&mut cg, &mut w, decl);
            }
        }
    }

    // Explicit routes.
    for merged in &block.stmts {
        if let StmtKind::RouteDeclaration(route) = &merged.stmt.kind {
            cg.source_index = merged.source;
            let handler = emit_expr(&mut cg, &route.handler);
            w.line(&format!(
                "addRoute(\"{}\", \"{}\", async (__req, __params) => {}(__req, __params));",
                route.method.to_uppercase(),
                route.path,
                handler
            ));
        }
    }

    cg.helpers.emit_used(&mut w);

    w.blank();
    emit_startup(&mut w, &block.label, ordinal);

    GeneratedModule {
        code: w.finish(),
        map: cg.map,
    }
}

fn emit_router_prelude(w: &mut CodeWriter) {
    w.raw(ROUTER_JS);
    w.blank();
}

const ROUTER_JS: &str = r#"const __routes = [];

const __corsHeaders = {
  "Access-Control-Allow-Origin": "*",
  "Access-Control-Allow-Methods": "GET, POST, PUT, DELETE, OPTIONS",
  "Access-Control-Allow-Headers": "Content-Type, Authorization",
};

function addRoute(method, path, handler) {
  const pattern = "^" + path.split("/").map((seg) => {
    if (seg.startsWith(":")) return "(?<" + seg.slice(1) + ">[^/]+)";
    if (seg === "*") return "(.*)";
    if (seg.startsWith("*")) return "(.*)";
    return seg.replace(/[\\^$.|?*+()[\]{}]/g, "\\$&");
  }).join("\/") + "$";
  __routes.push({ method, regex: new RegExp(pattern), handler });
}

async function __dispatch(__req) {
  const __url = new URL(__req.url);
  if (__req.method === "OPTIONS") {
    return new Response(null, { status: 204, headers: __corsHeaders });
  }
  if (typeof __matchProtected === "function") {
    const __rule = __matchProtected(__url.pathname);
    if (__rule) {
      const __header = __req.headers.get("Authorization") ?? "";
      const __user = await __verifyToken(__header.replace(/^Bearer /, ""));
      if (!__user) {
        return Response.json({ error: "Unauthorized" }, { status: 401, headers: __corsHeaders });
      }
      if (__rule.require && !__hasRole(__user, __rule.require)) {
        return Response.json({ error: "Forbidden" }, { status: 403, headers: __corsHeaders });
      }
    }
  }
  for (const __route of __routes) {
    if (__route.method !== __req.method) continue;
    const __match = __url.pathname.match(__route.regex);
    if (!__match) continue;
    try {
      let __result = await __route.handler(__req, __match.groups ?? {});
      if (__result instanceof Response) {
        for (const [__k, __v] of Object.entries(__corsHeaders)) __result.headers.set(__k, __v);
        return __result;
      }
      if (typeof __sanitize === "function") __result = __sanitize(__result);
      return Response.json(__result, { headers: __corsHeaders });
    } catch (__err) {
      return Response.json(
        { error: String(__err && __err.message ? __err.message : __err) },
        { status: 500, headers: __corsHeaders },
      );
    }
  }
  return Response.json({ error: "Not found" }, { status: 404, headers: __corsHeaders });
}"#;

/// `POST /rpc/<fn>`: parse the JSON body, extract arguments positionally
/// (`__args`) or by name, validate annotated parameters, call, and wrap
/// the return value in `{ result }`.
fn emit_rpc_endpoint(cg: &mut Codegen, w: &mut CodeWriter, decl: &FunctionDecl) {
    w.block_open(&format!(
        "addRoute(\"POST\", \"/rpc/{}\", async (__req) =>",
        decl.name
    ));
    w.line("const __body = await __req.json().catch(() => ({}));");

    for (i, param) in decl.params.iter().enumerate() {
        w.line(&format!(
            "const {0} = \"__args\" in __body ? __body.__args[{1}] : __body.{0};",
            param.name, i
        ));
    }

    let checks = collect_validation_checks(cg, &decl.params);
    if !checks.is_empty() {
        w.line("const __errors = [];");
        for (condition, field, message) in &checks {
            w.line(&format!(
                "if ({}) __errors.push({{ field: \"{}\", message: \"{}\" }});",
                condition,
                field,
                super::expr::escape_string(message)
            ));
        }
        w.block_open("if (__errors.length > 0)");
        w.line("return Response.json({ error: \"Validation failed\", details: __errors }, { status: 400, headers: __corsHeaders });");
        w.block_close();
    }

    let args: Vec<&str> = decl.params.iter().map(|p| p.name.as_str()).collect();
    w.line(&format!(
        "const __result = await {}({});",
        decl.name,
        args.join(", ")
    ));
    w.line("return { result: __result };");
    w.dedent();
    w.line("});");
}

/// Pre-dispatch validation: primitive annotations get type checks, type
/// names with field validators inherit those checks.
fn collect_validation_checks(
    cg: &Codegen,
    params: &[Param],
) -> Vec<(String, String, String)> {
    let mut checks = Vec::new();
    for param in params {
        let Some(annotation) = &param.type_annotation else {
            continue;
        };
        let name = &param.name;
        match annotation.as_str() {
            "Int" => checks.push((
                format!("typeof {0} !== \"number\" || !Number.isInteger({0})", name),
                name.clone(),
                "Expected Int".into(),
            )),
            "Float" => checks.push((
                format!("typeof {0} !== \"number\" || Number.isNaN({0})", name),
                name.clone(),
                "Expected Float".into(),
            )),
            "String" => checks.push((
                format!("typeof {} !== \"string\"", name),
                name.clone(),
                "Expected String".into(),
            )),
            "Bool" => checks.push((
                format!("typeof {} !== \"boolean\"", name),
                name.clone(),
                "Expected Bool".into(),
            )),
            type_name => {
                // Declared type with per-field validators: reuse them.
                if let Some(fields) = cg.type_validators.get(type_name) {
                    for (field, validators) in fields {
                        for validator in validators {
                            if let Some((condition, message)) =
                                validator_condition(validator, &format!("{}.{}", name, field))
                            {
                                checks.push((
                                    condition,
                                    format!("{}.{}", name, field),
                                    message,
                                ));
                            }
                        }
                    }
                }
            }
        }
    }
    checks
}

/// Inter-server RPC proxy: fetch to the peer's `/rpc/<fn>` wrapped in a
/// circuit breaker (CLOSED/OPEN/HALF-OPEN) with retry backoff.
fn emit_discover_helper(w: &mut CodeWriter) {
    w.raw(DISCOVER_JS);
    w.blank();
}

const DISCOVER_JS: &str = r#"function __discover(__name, __defaultUrl, __portVar) {
  const __baseUrl = process.env[__portVar]
    ? "http://localhost:" + process.env[__portVar]
    : __defaultUrl;
  const __breaker = {
    state: "CLOSED",
    failures: 0,
    openedAt: 0,
    threshold: 5,
    resetTimeout: 30000,
    callTimeout: 10000,
  };
  async function __attempt(__fn, __args) {
    const __controller = new AbortController();
    const __timer = setTimeout(() => __controller.abort(), __breaker.callTimeout);
    try {
      const __res = await fetch(__baseUrl + "/rpc/" + __fn, {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify({ __args }),
        signal: __controller.signal,
      });
      if (!__res.ok) throw new Error("RPC " + __fn + " failed: " + __res.status);
      const __data = await __res.json();
      return __data.result;
    } finally {
      clearTimeout(__timer);
    }
  }
  async function __call(__fn, __args) {
    if (__breaker.state === "OPEN") {
      if (Date.now() - __breaker.openedAt >= __breaker.resetTimeout) {
        __breaker.state = "HALF_OPEN";
      } else {
        throw new Error("Circuit breaker open for " + __name);
      }
    }
    const __delays = [100, 200, 400];
    let __lastError;
    for (let __i = 0; __i <= 2; __i++) {
      try {
        const __result = await __attempt(__fn, __args);
        __breaker.failures = 0;
        __breaker.state = "CLOSED";
        return __result;
      } catch (__err) {
        __lastError = __err;
        if (__breaker.state === "HALF_OPEN") {
          __breaker.state = "OPEN";
          __breaker.openedAt = Date.now();
          break;
        }
        __breaker.failures += 1;
        if (__breaker.failures >= __breaker.threshold) {
          __breaker.state = "OPEN";
          __breaker.openedAt = Date.now();
          break;
        }
        if (__i < 2) await new Promise((__r) => setTimeout(__r, __delays[__i]));
      }
    }
    throw __lastError;
  }
  return new Proxy({}, { get: (_t, __fn) => (...__args) => __call(__fn, __args) });
}"#;

fn emit_startup(w: &mut CodeWriter, label: &str, ordinal: usize) {
    let port_var = if label.is_empty() {
        "PORT".to_string()
    } else {
        format!("PORT_{}", label.to_uppercase().replace('-', "_"))
    };
    let default_port = 3000 + ordinal;
    w.line(&format!(
        "const __port = Number(process.env.{} ?? {});",
        port_var, default_port
    ));
    w.line("Bun.serve({ port: __port, fetch: __dispatch });");
    w.line("console.log(`Server listening on port ${__port}`);");
}
