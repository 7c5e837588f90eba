//! Shared lowering: pure library code plus the helper bundle.

use crate::merge::MergedBlock;

use super::stmt::emit_stmt;
use super::writer::CodeWriter;
use super::{Codegen, GeneratedModule, Target};

/// Generate the shared module for a directory: the block's statements
/// unchanged, followed by whichever runtime helpers they used.
pub fn generate(block: &MergedBlock, sources: &[String]) -> GeneratedModule {
    let mut cg = Codegen::new(Target::Shared);
    for source in sources {
        cg.map.add_source(source);
    }

    let mut w = CodeWriter::new();
    for merged in &block.stmts {
        cg.source_index = merged.source;
        emit_stmt(&mut cg, &mut w, &merged.stmt);
    }

    cg.helpers.emit_used(&mut w);

    GeneratedModule {
        code: w.finish(),
        map: cg.map,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::merge::MergedStmt;

    fn block(stmts: Vec<Stmt>) -> MergedBlock {
        MergedBlock {
            label: String::new(),
            stmts: stmts
                .into_iter()
                .map(|stmt| MergedStmt { source: 0, stmt })
                .collect(),
        }
    }

    #[test]
    fn helpers_appended_after_user_code() {
        let module = generate(
            &block(vec![Stmt::of(StmtKind::Assignment(AssignStmt {
                targets: vec!["total".into()],
                values: vec![Expr::call(Expr::ident("sum"), vec![Expr::ident("xs")])],
            }))]),
            &["lib.tova".into()],
        );
        let user_pos = module.code.find("const total").unwrap();
        let helper_pos = module.code.find("const sum =").unwrap();
        assert!(user_pos < helper_pos);
    }

    #[test]
    fn no_helpers_when_unused() {
        let module = generate(
            &block(vec![Stmt::of(StmtKind::Assignment(AssignStmt {
                targets: vec!["x".into()],
                values: vec![Expr::num(1.0)],
            }))]),
            &["lib.tova".into()],
        );
        assert_eq!(module.code, "const x = 1;\n");
    }

    #[test]
    fn statements_record_source_map_entries() {
        let module = generate(
            &block(vec![Stmt::new(
                Loc::new(4, 2),
                StmtKind::Assignment(AssignStmt {
                    targets: vec!["x".into()],
                    values: vec![Expr::num(1.0)],
                }),
            )]),
            &["lib.tova".into()],
        );
        let m = module.map.mappings()[0];
        assert_eq!((m.source_line, m.source_col, m.output_line), (3, 1, 0));
    }
}
