//! Server and edge routing scenarios: route regex shape, RPC wire
//! contract, and per-target emission.

mod helpers;

use helpers::*;
use tovac::ast::*;
use tovac::build::{compile_ast, BuildOptions};
use tovac::codegen::route::compile_route_pattern;

#[test]
fn route_regex_scenario() {
    // route GET "/api/users/:id/posts/:pid"
    let compiled = compile_route_pattern("/api/users/:id/posts/:pid");
    assert_eq!(
        compiled.regex,
        "^\\/api\\/users\\/([^/]+)\\/posts\\/([^/]+)$"
    );
    assert_eq!(compiled.params, vec!["id", "pid"]);
}

fn compile_server(file: SourceFile) -> String {
    let contents = vec![String::new()];
    let (output, _) = compile_ast(&[file], "api", &contents, &BuildOptions::default()).unwrap();
    output
        .files
        .iter()
        .find(|f| f.path == "api.server.js")
        .expect("api.server.js should be generated")
        .content_str()
        .to_string()
}

#[test]
fn rpc_wire_contract() {
    let file = server_file(
        "api.tova",
        vec![function(
            "get_user",
            vec![Param::typed("id", "Int")],
            vec![Stmt::of(StmtKind::ReturnStatement(ReturnStmt {
                value: Some(Expr::ident("id")),
            }))],
        )],
    );
    let code = compile_server(file);
    assert!(code.contains("addRoute(\"POST\", \"/rpc/get_user\""));
    // Positional mode reads __args[i]; keyed mode reads by name.
    assert!(code.contains("\"__args\" in __body ? __body.__args[0] : __body.id"));
    assert!(code.contains("{ error: \"Validation failed\", details: __errors }"));
    assert!(code.contains("return { result: __result };"));
}

#[test]
fn server_functions_keep_propagate_wrapping() {
    let file = server_file(
        "api.tova",
        vec![function(
            "load",
            vec![],
            vec![assign(
                "data",
                Expr::PropagateExpression {
                    argument: Box::new(Expr::call(Expr::ident("read_config"), vec![])),
                },
            )],
        )],
    );
    let code = compile_server(file);
    assert!(code.contains("__tova_propagate(read_config())"));
    assert!(code.contains("if (__e && __e.__lux_propagate) return __e.value;"));
    // The propagate helper was injected.
    assert!(code.contains("function __tova_propagate(value)"));
}

#[test]
fn two_servers_get_sequential_ports() {
    let ping = || {
        function(
            "ping",
            vec![],
            vec![Stmt::of(StmtKind::ReturnStatement(ReturnStmt {
                value: Some(Expr::str("pong")),
            }))],
        )
    };
    let file = SourceFile {
        path: "api.tova".into(),
        blocks: vec![
            Block::ServerBlock(ServerBlock {
                name: None,
                body: vec![ping()],
            }),
            Block::ServerBlock(ServerBlock {
                name: Some("jobs".into()),
                body: vec![ping()],
            }),
        ],
    };
    let contents = vec![String::new()];
    let (output, _) = compile_ast(&[file], "api", &contents, &BuildOptions::default()).unwrap();
    let default = output
        .files
        .iter()
        .find(|f| f.path == "api.server.js")
        .unwrap();
    let jobs = output
        .files
        .iter()
        .find(|f| f.path == "api.server.jobs.js")
        .unwrap();
    assert!(default.content_str().contains("process.env.PORT ?? 3000"));
    assert!(jobs.content_str().contains("process.env.PORT_JOBS ?? 3001"));
}

#[test]
fn cloudflare_edge_with_wrangler_manifest() {
    let file = SourceFile {
        path: "edge.tova".into(),
        blocks: vec![Block::EdgeBlock(EdgeBlock {
            target: EdgeTarget::Cloudflare,
            routes: vec![RouteDecl {
                method: "GET".into(),
                path: "/ping".into(),
                handler: Expr::ident("ping"),
            }],
            bindings: EdgeBindings {
                kv: vec![NamedBinding {
                    name: "CACHE".into(),
                    resource: Some("cache_ns".into()),
                }],
                ..Default::default()
            },
            env: vec![EnvDecl {
                name: "API_URL".into(),
                default: Some("https://api.example.com".into()),
            }],
            ..Default::default()
        })],
    };
    let contents = vec![String::new()];
    let (output, _) = compile_ast(&[file], "app", &contents, &BuildOptions::default()).unwrap();
    let edge = output
        .files
        .iter()
        .find(|f| f.path == "app.edge.js")
        .unwrap();
    assert!(edge.content_str().contains("export default"));
    assert!(edge.content_str().contains("__initBindings(__env);"));
    let wrangler = output
        .files
        .iter()
        .find(|f| f.path == "wrangler.toml")
        .unwrap();
    assert!(wrangler.content_str().contains("[[kv_namespaces]]"));
    assert!(wrangler.content_str().contains("API_URL = \"https://api.example.com\""));
}

#[test]
fn security_block_wires_into_server_dispatch() {
    let files = vec![SourceFile {
        path: "api.tova".into(),
        blocks: vec![
            Block::SecurityBlock(SecurityBlock {
                auth: Some(AuthConfig {
                    secret: SecretSource::Env {
                        name: "AUTH_SECRET".into(),
                    },
                    expiry_seconds: None,
                }),
                roles: vec![RoleDecl {
                    name: "admin".into(),
                    permissions: vec![],
                }],
                protect: vec![ProtectRule {
                    pattern: "/admin/**".into(),
                    require: Some("admin".into()),
                }],
                sensitive: vec![SensitiveRule {
                    type_name: "User".into(),
                    fields: vec!["password".into()],
                }],
                ..Default::default()
            }),
            Block::ServerBlock(ServerBlock {
                name: None,
                body: vec![function(
                    "whoami",
                    vec![],
                    vec![Stmt::of(StmtKind::ReturnStatement(ReturnStmt {
                        value: Some(Expr::nil()),
                    }))],
                )],
            }),
        ],
    }];
    let contents = vec![String::new()];
    let (output, warnings) =
        compile_ast(&files, "api", &contents, &BuildOptions::default()).unwrap();
    assert!(warnings.is_empty());
    let code = output
        .files
        .iter()
        .find(|f| f.path == "api.server.js")
        .unwrap()
        .content_str()
        .to_string();
    assert!(code.contains("async function __verifyToken(__token)"));
    assert!(code.contains("__matchProtected(__url.pathname)"));
    assert!(code.contains("__sanitize(__result)"));
}

#[test]
fn discover_proxy_in_named_server() {
    let file = SourceFile {
        path: "api.tova".into(),
        blocks: vec![Block::ServerBlock(ServerBlock {
            name: Some("gateway".into()),
            body: vec![Stmt::of(StmtKind::DiscoverDeclaration(DiscoverDecl {
                name: "billing".into(),
                url: "http://billing.internal:3001".into(),
            }))],
        })],
    };
    let contents = vec![String::new()];
    let (output, _) = compile_ast(&[file], "api", &contents, &BuildOptions::default()).unwrap();
    let code = output
        .files
        .iter()
        .find(|f| f.path == "api.server.gateway.js")
        .unwrap()
        .content_str()
        .to_string();
    // CLOSED → OPEN on threshold failures; HALF_OPEN admits one probe.
    assert!(code.contains("threshold: 5"));
    assert!(code.contains("resetTimeout: 30000"));
    assert!(code.contains("callTimeout: 10000"));
    assert!(code.contains("__breaker.state = \"HALF_OPEN\""));
    assert!(code.contains("__baseUrl + \"/rpc/\" + __fn"));
}
