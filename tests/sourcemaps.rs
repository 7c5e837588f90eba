//! Source-map construction scenarios: recorded tuples, VLQ segments, and
//! sidecar shape.

mod helpers;

use helpers::*;
use tovac::ast::*;
use tovac::build::{compile_ast, BuildOptions};
use tovac::sourcemap::SourceMapBuilder;

const BASE64: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn decode_vlq(s: &str) -> Vec<i64> {
    let mut values = Vec::new();
    let mut shift = 0u32;
    let mut acc: u64 = 0;
    for c in s.chars() {
        let digit = BASE64.iter().position(|&b| b as char == c).unwrap() as u64;
        acc |= (digit & 0x1f) << shift;
        if digit & 0x20 != 0 {
            shift += 5;
        } else {
            values.push(if acc & 1 != 0 {
                -((acc >> 1) as i64)
            } else {
                (acc >> 1) as i64
            });
            acc = 0;
            shift = 0;
        }
    }
    values
}

#[test]
fn spot_check_mapping_tuple() {
    // Statement at source 3:5 emitted at output 10:2 records (2, 4, 10, 2)
    // 0-based, and the VLQ segment on line 10 decodes to (2, 0, 2, 4).
    let mut builder = SourceMapBuilder::new();
    let src = builder.add_source("app.tova");
    builder.record(src, 3, 5, 10, 2);

    let m = builder.mappings()[0];
    assert_eq!(m.source_line, 2);
    assert_eq!(m.source_col, 4);
    assert_eq!(m.output_line, 10);
    assert_eq!(m.output_col, 2);

    let encoded = builder.encode_mappings();
    let lines: Vec<&str> = encoded.split(';').collect();
    assert_eq!(lines.len(), 11);
    assert!(lines[..10].iter().all(|l| l.is_empty()));
    assert_eq!(decode_vlq(lines[10]), vec![2, 0, 2, 4]);
}

#[test]
fn statements_map_to_their_source_lines() {
    let file = shared_file(
        "lib.tova",
        vec![
            Stmt::new(
                Loc::new(1, 1),
                StmtKind::Assignment(AssignStmt {
                    targets: vec!["a".into()],
                    values: vec![Expr::num(1.0)],
                }),
            ),
            Stmt::new(
                Loc::new(5, 3),
                StmtKind::Assignment(AssignStmt {
                    targets: vec!["b".into()],
                    values: vec![Expr::num(2.0)],
                }),
            ),
        ],
    );
    let contents = vec!["a = 1\n\n\n\n  b = 2".to_string()];
    let (output, _) = compile_ast(&[file], "lib", &contents, &BuildOptions::default()).unwrap();
    let shared = output
        .files
        .iter()
        .find(|f| f.path == "lib.shared.js")
        .unwrap();

    // Trailer points at the sidecar.
    assert!(shared
        .content_str()
        .ends_with("//# sourceMappingURL=lib.shared.js.map\n"));

    let map: serde_json::Value = serde_json::from_str(shared.map.as_deref().unwrap()).unwrap();
    assert_eq!(map["version"], 3);
    assert_eq!(map["file"], "lib.shared.js");
    assert_eq!(map["sources"][0], "lib.tova");
    assert_eq!(map["sourcesContent"][0], "a = 1\n\n\n\n  b = 2");

    let mappings = map["mappings"].as_str().unwrap();
    let lines: Vec<&str> = mappings.split(';').collect();
    // Line 0: (out_col 0, src 0, line 0, col 0); line 1: src line 4, col 2.
    assert_eq!(decode_vlq(lines[0]), vec![0, 0, 0, 0]);
    assert_eq!(decode_vlq(lines[1]), vec![0, 0, 4, 2]);
}

#[test]
fn merged_files_share_one_map_with_two_sources() {
    let stmt = |line| {
        Stmt::new(
            Loc::new(line, 1),
            StmtKind::ExpressionStatement(ExprStmt {
                expression: Expr::call(Expr::ident("print"), vec![Expr::num(1.0)]),
            }),
        )
    };
    let files = vec![
        shared_file("a.tova", vec![stmt(1)]),
        shared_file("b.tova", vec![stmt(2)]),
    ];
    let contents = vec!["print(1)".to_string(), "\nprint(1)".to_string()];
    let (output, _) = compile_ast(&files, "lib", &contents, &BuildOptions::default()).unwrap();
    let shared = output
        .files
        .iter()
        .find(|f| f.path == "lib.shared.js")
        .unwrap();
    let map: serde_json::Value = serde_json::from_str(shared.map.as_deref().unwrap()).unwrap();
    assert_eq!(map["sources"][0], "a.tova");
    assert_eq!(map["sources"][1], "b.tova");

    let mappings = map["mappings"].as_str().unwrap();
    let second_line = mappings.split(';').nth(1).unwrap();
    // Source index delta moves from file 0 to file 1.
    assert_eq!(decode_vlq(second_line)[1], 1);
}
