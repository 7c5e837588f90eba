//! Canonical test ASTs shared by the integration tests.
#![allow(dead_code)]

use tovac::ast::*;

pub fn expr_stmt(expression: Expr) -> Stmt {
    Stmt::of(StmtKind::ExpressionStatement(ExprStmt { expression }))
}

pub fn assign(target: &str, value: Expr) -> Stmt {
    Stmt::of(StmtKind::Assignment(AssignStmt {
        targets: vec![target.into()],
        values: vec![value],
    }))
}

pub fn state(name: &str, value: Expr) -> Stmt {
    Stmt::of(StmtKind::StateDeclaration(StateDecl {
        name: name.into(),
        value,
    }))
}

pub fn function(name: &str, params: Vec<Param>, body: Vec<Stmt>) -> Stmt {
    Stmt::of(StmtKind::FunctionDeclaration(FunctionDecl {
        name: name.into(),
        params,
        body,
        is_async: false,
        is_public: false,
        return_type: None,
        is_wasm: false,
    }))
}

pub fn client_file(path: &str, body: Vec<Stmt>) -> SourceFile {
    SourceFile {
        path: path.into(),
        blocks: vec![Block::ClientBlock(ClientBlock { name: None, body })],
    }
}

pub fn server_file(path: &str, body: Vec<Stmt>) -> SourceFile {
    SourceFile {
        path: path.into(),
        blocks: vec![Block::ServerBlock(ServerBlock { name: None, body })],
    }
}

pub fn shared_file(path: &str, body: Vec<Stmt>) -> SourceFile {
    SourceFile {
        path: path.into(),
        blocks: vec![Block::SharedBlock(SharedBlock { body })],
    }
}

/// The counter app: `state count = 0; fn inc() { count += 1 }` plus a
/// component rendering it.
pub fn counter_app() -> SourceFile {
    client_file(
        "app.tova",
        vec![
            state("count", Expr::num(0.0)),
            function(
                "inc",
                vec![],
                vec![Stmt::of(StmtKind::CompoundAssignment(CompoundAssign {
                    target: Expr::ident("count"),
                    operator: "+=".into(),
                    value: Expr::num(1.0),
                }))],
            ),
            Stmt::of(StmtKind::ComponentDeclaration(ComponentDecl {
                name: "App".into(),
                params: vec![],
                body: vec![expr_stmt(Expr::JSXElement(JsxElement {
                    tag: "button".into(),
                    attributes: vec![JsxAttr {
                        name: "on:click".into(),
                        value: Some(Expr::ident("inc")),
                    }],
                    children: vec![JsxChild::ExprChild {
                        expression: Expr::ident("count"),
                    }],
                }))],
                style: None,
            })),
        ],
    )
}

/// `type Shape { Circle(r: Float), Rectangle(w, h) }` plus an area
/// function that matches on it.
pub fn shapes_shared() -> SourceFile {
    let shape_type = Stmt::of(StmtKind::TypeDeclaration(TypeDecl {
        name: "Shape".into(),
        variants: vec![
            TypeVariant {
                name: "Circle".into(),
                fields: vec![TypeField {
                    name: "r".into(),
                    type_annotation: Some("Float".into()),
                    validators: vec![],
                }],
            },
            TypeVariant {
                name: "Rectangle".into(),
                fields: vec![
                    TypeField {
                        name: "w".into(),
                        type_annotation: None,
                        validators: vec![],
                    },
                    TypeField {
                        name: "h".into(),
                        type_annotation: None,
                        validators: vec![],
                    },
                ],
            },
        ],
        fields: vec![],
        derive: vec![],
    }));

    let area = function(
        "area",
        vec![Param::simple("s")],
        vec![Stmt::of(StmtKind::ReturnStatement(ReturnStmt {
            value: Some(Expr::MatchExpression {
                subject: Box::new(Expr::ident("s")),
                arms: vec![
                    MatchArm {
                        pattern: Pattern::VariantPattern {
                            name: "Circle".into(),
                            fields: vec![Pattern::BindingPattern { name: "r".into() }],
                        },
                        guard: None,
                        body: MatchArmBody::Expr {
                            expression: Expr::binary("*", Expr::ident("r"), Expr::ident("r")),
                        },
                    },
                    MatchArm {
                        pattern: Pattern::VariantPattern {
                            name: "Rectangle".into(),
                            fields: vec![
                                Pattern::BindingPattern { name: "w".into() },
                                Pattern::BindingPattern { name: "h".into() },
                            ],
                        },
                        guard: None,
                        body: MatchArmBody::Expr {
                            expression: Expr::binary("*", Expr::ident("w"), Expr::ident("h")),
                        },
                    },
                ],
            }),
        }))],
    );

    shared_file("shapes.tova", vec![shape_type, area])
}
