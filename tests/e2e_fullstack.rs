//! Full pipeline over a realistic multi-block app, with snapshot coverage
//! of the generated modules.

mod helpers;

use helpers::*;
use tovac::ast::*;
use tovac::build::{compile_ast, BuildOptions};

/// A todo app: shared helpers, a server with an RPC function, and a
/// client with state, an effect, and a styled component.
fn todo_app() -> Vec<SourceFile> {
    let shared = shared_file(
        "todo.tova",
        vec![function(
            "format_title",
            vec![Param::simple("title")],
            vec![Stmt::of(StmtKind::ReturnStatement(ReturnStmt {
                value: Some(Expr::call(
                    Expr::member(Expr::ident("title"), "capitalize"),
                    vec![],
                )),
            }))],
        )],
    );

    let server = server_file(
        "todo.tova",
        vec![function(
            "list_todos",
            vec![Param::typed("done", "Bool")],
            vec![Stmt::of(StmtKind::ReturnStatement(ReturnStmt {
                value: Some(Expr::ArrayLiteral { elements: vec![] }),
            }))],
        )],
    );

    let client = client_file(
        "todo.tova",
        vec![
            state("todos", Expr::ArrayLiteral { elements: vec![] }),
            Stmt::of(StmtKind::EffectDeclaration(EffectDecl {
                body: vec![assign(
                    "todos",
                    Expr::rpc_call("list_todos", vec![Expr::boolean(false)]),
                )],
            })),
            Stmt::of(StmtKind::ComponentDeclaration(ComponentDecl {
                name: "TodoList".into(),
                params: vec![],
                body: vec![expr_stmt(Expr::JSXElement(JsxElement {
                    tag: "ul".into(),
                    attributes: vec![],
                    children: vec![JsxChild::For {
                        variables: vec!["todo".into()],
                        iterable: Expr::ident("todos"),
                        key: Some(Expr::member(Expr::ident("todo"), "id")),
                        body: vec![JsxChild::Element(JsxElement {
                            tag: "li".into(),
                            attributes: vec![],
                            children: vec![JsxChild::ExprChild {
                                expression: Expr::member(Expr::ident("todo"), "title"),
                            }],
                        })],
                    }],
                }))],
                style: Some("ul { margin: 0; }".into()),
            })),
        ],
    );

    // One source file contributed all three blocks.
    vec![SourceFile {
        path: "todo.tova".into(),
        blocks: shared
            .blocks
            .into_iter()
            .chain(server.blocks)
            .chain(client.blocks)
            .collect(),
    }]
}

fn compile() -> tovac::codegen::CodegenOutput {
    let (output, warnings) = compile_ast(
        &todo_app(),
        "todo",
        &[String::new()],
        &BuildOptions::default(),
    )
    .unwrap();
    assert!(warnings.is_empty());
    output
}

#[test]
fn produces_one_module_per_block_type() {
    let output = compile();
    let names: Vec<&str> = output.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        names,
        vec!["todo.shared.js", "todo.server.js", "todo.client.js"]
    );
}

#[test]
fn shared_module_snapshot() {
    let output = compile();
    let shared = output
        .files
        .iter()
        .find(|f| f.path == "todo.shared.js")
        .unwrap();
    insta::assert_snapshot!("todo_shared_js", shared.content_str());
}

#[test]
fn client_module_structure() {
    let output = compile();
    let client = output
        .files
        .iter()
        .find(|f| f.path == "todo.client.js")
        .unwrap()
        .content_str()
        .to_string();
    // Module shape: runtime import, server proxy, user code, styles, mount.
    let import_pos = client.find("import {").unwrap();
    let proxy_pos = client.find("const server = new Proxy").unwrap();
    let state_pos = client.find("createSignal([])").unwrap();
    let styles_pos = client.find("__styles.textContent").unwrap();
    let mount_pos = client.find("mount(() => TodoList({}), __root);").unwrap();
    assert!(import_pos < proxy_pos);
    assert!(proxy_pos < state_pos);
    assert!(state_pos < styles_pos);
    assert!(styles_pos < mount_pos);
}

#[test]
fn server_module_structure() {
    let output = compile();
    let server = output
        .files
        .iter()
        .find(|f| f.path == "todo.server.js")
        .unwrap()
        .content_str()
        .to_string();
    // Router prelude, user function, RPC endpoint, startup — in order.
    let routes_pos = server.find("const __routes = [];").unwrap();
    let fn_pos = server.find("function list_todos(done)").unwrap();
    let rpc_pos = server.find("addRoute(\"POST\", \"/rpc/list_todos\"").unwrap();
    let serve_pos = server.find("Bun.serve(").unwrap();
    assert!(routes_pos < fn_pos);
    assert!(fn_pos < rpc_pos);
    assert!(rpc_pos < serve_pos);
}

#[test]
fn cross_cutting_pieces_present() {
    let output = compile();
    let shared = output.files[0].content_str();
    // `.capitalize()` pulled the string-prototype helpers in.
    assert!(shared.contains("capitalize()"));

    let server = output.files[1].content_str();
    assert!(server.contains("addRoute(\"POST\", \"/rpc/list_todos\""));
    assert!(server.contains("typeof done !== \"boolean\""));

    let client = output.files[2].content_str();
    assert!(client.contains("setTodos((await server.list_todos(false)));"));
    assert!(client.contains("tova_keyed(todo.id,"));
    // Scoped CSS attribute applied to elements of the styled component.
    assert!(client.contains("data-tova-"));
}
