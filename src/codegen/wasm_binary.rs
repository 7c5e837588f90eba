//! WebAssembly binary emitter for numerically-typed functions.
//!
//! `Int`/`Bool` map to i32, `Float` to f64. Emission follows the binary
//! format directly: magic header, type/function/export/code sections,
//! ULEB128 indices, SLEB128 constants. Unsupported constructs are fatal
//! compilation errors, never silent degradation.

use std::collections::HashMap;

use crate::ast::*;
use crate::error::CompilerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValType {
    I32,
    F64,
}

impl ValType {
    fn byte(self) -> u8 {
        match self {
            ValType::I32 => 0x7F,
            ValType::F64 => 0x7C,
        }
    }

    fn from_annotation(annotation: &str) -> Option<ValType> {
        match annotation {
            "Int" | "Bool" => Some(ValType::I32),
            "Float" => Some(ValType::F64),
            _ => None,
        }
    }
}

struct FuncSig {
    index: u32,
    params: Vec<ValType>,
    result: Option<ValType>,
}

/// Compile a set of functions into one WebAssembly module. Functions may
/// call each other, including direct and mutual recursion.
pub fn compile_functions(functions: &[&FunctionDecl]) -> Result<Vec<u8>, CompilerError> {
    if functions.is_empty() {
        return Err(CompilerError::wasm("W000", "No functions to compile"));
    }

    // Signatures first so calls resolve in any order.
    let mut sigs: HashMap<String, FuncSig> = HashMap::new();
    for (i, f) in functions.iter().enumerate() {
        let mut params = Vec::new();
        for p in &f.params {
            let annotation = p.type_annotation.as_deref().ok_or_else(|| {
                CompilerError::wasm(
                    "W001",
                    format!("fn {}: parameter '{}' needs a numeric type", f.name, p.name),
                )
            })?;
            let ty = ValType::from_annotation(annotation).ok_or_else(|| {
                CompilerError::wasm(
                    "W001",
                    format!(
                        "fn {}: unsupported parameter type '{}' for '{}'",
                        f.name, annotation, p.name
                    ),
                )
            })?;
            params.push(ty);
        }
        let result = match f.return_type.as_deref() {
            None => None,
            Some(annotation) => Some(ValType::from_annotation(annotation).ok_or_else(|| {
                CompilerError::wasm(
                    "W001",
                    format!("fn {}: unsupported return type '{}'", f.name, annotation),
                )
            })?),
        };
        sigs.insert(
            f.name.clone(),
            FuncSig {
                index: i as u32,
                params,
                result,
            },
        );
    }

    let mut bodies = Vec::new();
    for f in functions {
        bodies.push(compile_function(f, &sigs)?);
    }

    Ok(assemble_module(functions, &sigs, &bodies))
}

// ---------------------------------------------------------------------------
// Module assembly
// ---------------------------------------------------------------------------

fn assemble_module(
    functions: &[&FunctionDecl],
    sigs: &HashMap<String, FuncSig>,
    bodies: &[Vec<u8>],
) -> Vec<u8> {
    let mut out = vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];

    // Type section.
    let mut types = Vec::new();
    uleb(functions.len() as u32, &mut types);
    for f in functions {
        let sig = &sigs[&f.name];
        types.push(0x60);
        uleb(sig.params.len() as u32, &mut types);
        for p in &sig.params {
            types.push(p.byte());
        }
        match sig.result {
            Some(r) => {
                uleb(1, &mut types);
                types.push(r.byte());
            }
            None => uleb(0, &mut types),
        }
    }
    section(1, &types, &mut out);

    // Function section: type index per function.
    let mut funcs = Vec::new();
    uleb(functions.len() as u32, &mut funcs);
    for (i, _) in functions.iter().enumerate() {
        uleb(i as u32, &mut funcs);
    }
    section(3, &funcs, &mut out);

    // Export section: every function by name.
    let mut exports = Vec::new();
    uleb(functions.len() as u32, &mut exports);
    for (i, f) in functions.iter().enumerate() {
        uleb(f.name.len() as u32, &mut exports);
        exports.extend_from_slice(f.name.as_bytes());
        exports.push(0x00);
        uleb(i as u32, &mut exports);
    }
    section(7, &exports, &mut out);

    // Code section.
    let mut code = Vec::new();
    uleb(bodies.len() as u32, &mut code);
    for body in bodies {
        uleb(body.len() as u32, &mut code);
        code.extend_from_slice(body);
    }
    section(10, &code, &mut out);

    out
}

fn section(id: u8, payload: &[u8], out: &mut Vec<u8>) {
    out.push(id);
    uleb(payload.len() as u32, out);
    out.extend_from_slice(payload);
}

// ---------------------------------------------------------------------------
// Function compilation
// ---------------------------------------------------------------------------

struct FnCtx<'a> {
    name: &'a str,
    sigs: &'a HashMap<String, FuncSig>,
    /// name → (local index, type); params occupy the first indices.
    locals: HashMap<String, (u32, ValType)>,
    /// Non-param locals in declaration order.
    local_types: Vec<ValType>,
    param_count: u32,
    result: Option<ValType>,
}

impl<'a> FnCtx<'a> {
    fn err(&self, code: &str, message: impl std::fmt::Display) -> CompilerError {
        CompilerError::wasm(code, format!("fn {}: {}", self.name, message))
    }

    fn add_local(&mut self, name: &str, ty: ValType) -> u32 {
        let index = self.param_count + self.local_types.len() as u32;
        self.local_types.push(ty);
        self.locals.insert(name.to_string(), (index, ty));
        index
    }
}

fn compile_function(
    f: &FunctionDecl,
    sigs: &HashMap<String, FuncSig>,
) -> Result<Vec<u8>, CompilerError> {
    let sig = &sigs[&f.name];
    let mut ctx = FnCtx {
        name: &f.name,
        sigs,
        locals: HashMap::new(),
        local_types: Vec::new(),
        param_count: sig.params.len() as u32,
        result: sig.result,
    };
    for (i, p) in f.params.iter().enumerate() {
        ctx.locals
            .insert(p.name.clone(), (i as u32, sig.params[i]));
    }

    let mut code = Vec::new();
    for stmt in &f.body {
        compile_stmt(&mut ctx, stmt, &mut code)?;
    }
    code.push(0x0B); // end

    // Local declarations, consecutive same-type locals grouped.
    let mut header = Vec::new();
    let mut groups: Vec<(u32, ValType)> = Vec::new();
    for ty in &ctx.local_types {
        match groups.last_mut() {
            Some((count, group_ty)) if group_ty == ty => *count += 1,
            _ => groups.push((1, *ty)),
        }
    }
    uleb(groups.len() as u32, &mut header);
    for (count, ty) in groups {
        uleb(count, &mut header);
        header.push(ty.byte());
    }

    header.extend_from_slice(&code);
    Ok(header)
}

fn compile_stmt(ctx: &mut FnCtx, stmt: &Stmt, code: &mut Vec<u8>) -> Result<(), CompilerError> {
    match &stmt.kind {
        StmtKind::ReturnStatement(ret) => {
            if let Some(value) = &ret.value {
                let ty = compile_expr(ctx, value, code)?;
                coerce(ctx, ty, ctx.result, code)?;
            }
            code.push(0x0F);
            Ok(())
        }
        StmtKind::VarDeclaration(decl) => {
            for (target, value) in decl.targets.iter().zip(&decl.values) {
                let ty = infer_type(ctx, value)?;
                let index = ctx.add_local(target, ty);
                let actual = compile_expr(ctx, value, code)?;
                coerce(ctx, actual, Some(ty), code)?;
                code.push(0x21);
                uleb(index, code);
            }
            Ok(())
        }
        StmtKind::Assignment(assign) => {
            if assign.targets.len() != 1 || assign.values.len() != 1 {
                return Err(ctx.err("W003", "multi-target assignment is not supported"));
            }
            let target = &assign.targets[0];
            let value = &assign.values[0];
            // Assignment auto-declares a local on first sight.
            let (index, ty) = match ctx.locals.get(target) {
                Some(&entry) => entry,
                None => {
                    let ty = infer_type(ctx, value)?;
                    (ctx.add_local(target, ty), ty)
                }
            };
            let actual = compile_expr(ctx, value, code)?;
            coerce(ctx, actual, Some(ty), code)?;
            code.push(0x21);
            uleb(index, code);
            Ok(())
        }
        StmtKind::CompoundAssignment(assign) => {
            let Some(target) = assign.target.as_identifier() else {
                return Err(ctx.err("W003", "compound assignment target must be a variable"));
            };
            let (index, ty) = *ctx
                .locals
                .get(target)
                .ok_or_else(|| ctx.err("W002", format!("undefined variable '{}'", target)))?;
            code.push(0x20);
            uleb(index, code);
            let rhs = compile_expr(ctx, &assign.value, code)?;
            coerce(ctx, rhs, Some(ty), code)?;
            let op = assign.operator.trim_end_matches('=');
            let out = emit_binary_op(ctx, op, ty, Some(ty), code)?;
            coerce(ctx, out, Some(ty), code)?;
            code.push(0x21);
            uleb(index, code);
            Ok(())
        }
        StmtKind::IfStatement(stmt) => {
            let cond = compile_expr(ctx, &stmt.condition, code)?;
            require_i32(ctx, cond, "if condition")?;
            code.push(0x04);
            code.push(0x40); // empty blocktype
            for s in &stmt.consequent {
                compile_stmt(ctx, s, code)?;
            }
            if !stmt.alternates.is_empty() {
                return Err(ctx.err("W003", "elif chains are not supported"));
            }
            if let Some(else_body) = &stmt.else_body {
                code.push(0x05);
                for s in else_body {
                    compile_stmt(ctx, s, code)?;
                }
            }
            code.push(0x0B);
            Ok(())
        }
        StmtKind::WhileStatement(stmt) => {
            // block { loop { if !cond br 1; body; br 0 } }
            code.push(0x02);
            code.push(0x40);
            code.push(0x03);
            code.push(0x40);
            let cond = compile_expr(ctx, &stmt.condition, code)?;
            require_i32(ctx, cond, "while condition")?;
            code.push(0x45); // i32.eqz
            code.push(0x0D); // br_if
            uleb(1, code);
            for s in &stmt.body {
                compile_stmt(ctx, s, code)?;
            }
            code.push(0x0C); // br
            uleb(0, code);
            code.push(0x0B);
            code.push(0x0B);
            Ok(())
        }
        StmtKind::ExpressionStatement(stmt) => {
            let ty = compile_expr(ctx, &stmt.expression, code)?;
            if ty.is_some() {
                code.push(0x1A); // drop
            }
            Ok(())
        }
        _ => Err(ctx.err("W003", "unsupported statement in wasm function")),
    }
}

/// Compile an expression; returns the type left on the stack (None for
/// void calls).
fn compile_expr(
    ctx: &mut FnCtx,
    expr: &Expr,
    code: &mut Vec<u8>,
) -> Result<Option<ValType>, CompilerError> {
    match expr {
        Expr::NumberLiteral { value } => {
            if is_i32_literal(*value) {
                code.push(0x41);
                sleb(*value as i64, code);
                Ok(Some(ValType::I32))
            } else {
                code.push(0x44);
                code.extend_from_slice(&value.to_le_bytes());
                Ok(Some(ValType::F64))
            }
        }
        Expr::BooleanLiteral { value } => {
            code.push(0x41);
            sleb(if *value { 1 } else { 0 }, code);
            Ok(Some(ValType::I32))
        }
        Expr::Identifier { name } => {
            let (index, ty) = *ctx
                .locals
                .get(name)
                .ok_or_else(|| ctx.err("W002", format!("undefined variable '{}'", name)))?;
            code.push(0x20);
            uleb(index, code);
            Ok(Some(ty))
        }
        Expr::UnaryExpression { operator, operand } => match operator.as_str() {
            "-" => {
                let ty = infer_type(ctx, operand)?;
                match ty {
                    ValType::F64 => {
                        let actual = compile_expr(ctx, operand, code)?;
                        coerce(ctx, actual, Some(ValType::F64), code)?;
                        code.push(0x9A); // f64.neg
                        Ok(Some(ValType::F64))
                    }
                    ValType::I32 => {
                        code.push(0x41);
                        sleb(0, code);
                        let actual = compile_expr(ctx, operand, code)?;
                        require_i32(ctx, actual, "negation operand")?;
                        code.push(0x6B); // i32.sub
                        Ok(Some(ValType::I32))
                    }
                }
            }
            "not" | "!" => {
                let actual = compile_expr(ctx, operand, code)?;
                require_i32(ctx, actual, "logical not operand")?;
                code.push(0x45); // i32.eqz
                Ok(Some(ValType::I32))
            }
            other => Err(ctx.err("W003", format!("unsupported unary operator '{}'", other))),
        },
        Expr::BinaryExpression {
            operator,
            left,
            right,
        } => {
            let left_ty = infer_type(ctx, left)?;
            let right_ty = infer_type(ctx, right)?;
            let operand_ty = if left_ty == ValType::F64 || right_ty == ValType::F64 {
                ValType::F64
            } else {
                ValType::I32
            };
            let actual = compile_expr(ctx, left, code)?;
            coerce(ctx, actual, Some(operand_ty), code)?;
            let actual = compile_expr(ctx, right, code)?;
            coerce(ctx, actual, Some(operand_ty), code)?;
            emit_binary_op(ctx, operator, operand_ty, Some(operand_ty), code)
        }
        Expr::LogicalExpression {
            operator,
            left,
            right,
        } => {
            let actual = compile_expr(ctx, left, code)?;
            require_i32(ctx, actual, "logical operand")?;
            let actual = compile_expr(ctx, right, code)?;
            require_i32(ctx, actual, "logical operand")?;
            match operator.as_str() {
                "and" | "&&" => code.push(0x71),
                "or" | "||" => code.push(0x72),
                other => {
                    return Err(ctx.err("W003", format!("unsupported logical operator '{}'", other)))
                }
            }
            Ok(Some(ValType::I32))
        }
        Expr::CallExpression { callee, arguments } => {
            let Some(name) = callee.as_identifier() else {
                return Err(ctx.err("W003", "only direct calls to module functions are supported"));
            };
            let (index, params, result) = {
                let sig = ctx.sigs.get(name).ok_or_else(|| {
                    ctx.err("W003", format!("call to '{}' which is not a wasm function", name))
                })?;
                (sig.index, sig.params.clone(), sig.result)
            };
            if arguments.len() != params.len() {
                return Err(ctx.err(
                    "W003",
                    format!(
                        "call to '{}' with {} arguments, expected {}",
                        name,
                        arguments.len(),
                        params.len()
                    ),
                ));
            }
            for (argument, expected) in arguments.iter().zip(&params) {
                let actual = compile_expr(ctx, argument, code)?;
                coerce(ctx, actual, Some(*expected), code)?;
            }
            code.push(0x10);
            uleb(index, code);
            Ok(result)
        }
        Expr::IfExpression {
            condition,
            then_branch,
            else_branch,
        } => {
            let (BodyExpr::Expr { expression: then }, BodyExpr::Expr { expression: els }) =
                (then_branch, else_branch)
            else {
                return Err(ctx.err("W003", "if-expression branches must be expressions"));
            };
            let result_ty = infer_type(ctx, then)?;
            let cond = compile_expr(ctx, condition, code)?;
            require_i32(ctx, cond, "if condition")?;
            code.push(0x04);
            code.push(result_ty.byte()); // blocktype matches the value type
            let actual = compile_expr(ctx, then, code)?;
            coerce(ctx, actual, Some(result_ty), code)?;
            code.push(0x05);
            let actual = compile_expr(ctx, els, code)?;
            coerce(ctx, actual, Some(result_ty), code)?;
            code.push(0x0B);
            Ok(Some(result_ty))
        }
        _ => Err(ctx.err(
            "W003",
            "unsupported expression; only numeric arithmetic, comparisons, calls, if, and while compile to wasm",
        )),
    }
}

fn emit_binary_op(
    ctx: &FnCtx,
    operator: &str,
    operand_ty: ValType,
    _rhs: Option<ValType>,
    code: &mut Vec<u8>,
) -> Result<Option<ValType>, CompilerError> {
    let (opcode, result) = match (operator, operand_ty) {
        ("+", ValType::I32) => (0x6A, ValType::I32),
        ("-", ValType::I32) => (0x6B, ValType::I32),
        ("*", ValType::I32) => (0x6C, ValType::I32),
        ("/", ValType::I32) => (0x6D, ValType::I32),
        ("%", ValType::I32) => (0x6F, ValType::I32),
        ("+", ValType::F64) => (0xA0, ValType::F64),
        ("-", ValType::F64) => (0xA1, ValType::F64),
        ("*", ValType::F64) => (0xA2, ValType::F64),
        ("/", ValType::F64) => (0xA3, ValType::F64),
        ("==", ValType::I32) => (0x46, ValType::I32),
        ("!=", ValType::I32) => (0x47, ValType::I32),
        ("<", ValType::I32) => (0x48, ValType::I32),
        (">", ValType::I32) => (0x4A, ValType::I32),
        ("<=", ValType::I32) => (0x4C, ValType::I32),
        (">=", ValType::I32) => (0x4E, ValType::I32),
        ("==", ValType::F64) => (0x61, ValType::I32),
        ("!=", ValType::F64) => (0x62, ValType::I32),
        ("<", ValType::F64) => (0x63, ValType::I32),
        (">", ValType::F64) => (0x64, ValType::I32),
        ("<=", ValType::F64) => (0x65, ValType::I32),
        (">=", ValType::F64) => (0x66, ValType::I32),
        (op, _) => {
            return Err(ctx.err("W003", format!("unsupported binary operator '{}'", op)));
        }
    };
    code.push(opcode);
    Ok(Some(result))
}

/// Automatic i32 → f64 promotion; anything else must match exactly.
fn coerce(
    ctx: &FnCtx,
    actual: Option<ValType>,
    expected: Option<ValType>,
    code: &mut Vec<u8>,
) -> Result<(), CompilerError> {
    match (actual, expected) {
        (Some(ValType::I32), Some(ValType::F64)) => {
            code.push(0xB7); // f64.convert_i32_s
            Ok(())
        }
        (a, e) if a == e => Ok(()),
        (None, Some(_)) => Err(ctx.err("W003", "void call used as a value")),
        (Some(ValType::F64), Some(ValType::I32)) => {
            Err(ctx.err("W003", "cannot implicitly narrow f64 to i32"))
        }
        _ => Ok(()),
    }
}

fn require_i32(
    ctx: &FnCtx,
    actual: Option<ValType>,
    what: &str,
) -> Result<(), CompilerError> {
    match actual {
        Some(ValType::I32) => Ok(()),
        _ => Err(ctx.err("W003", format!("{} must be Int or Bool", what))),
    }
}

/// Static type of an expression without emitting code.
fn infer_type(ctx: &FnCtx, expr: &Expr) -> Result<ValType, CompilerError> {
    match expr {
        Expr::NumberLiteral { value } => Ok(if is_i32_literal(*value) {
            ValType::I32
        } else {
            ValType::F64
        }),
        Expr::BooleanLiteral { .. } => Ok(ValType::I32),
        Expr::Identifier { name } => ctx
            .locals
            .get(name)
            .map(|(_, ty)| *ty)
            .ok_or_else(|| ctx.err("W002", format!("undefined variable '{}'", name))),
        Expr::UnaryExpression { operator, operand } => match operator.as_str() {
            "-" => infer_type(ctx, operand),
            _ => Ok(ValType::I32),
        },
        Expr::BinaryExpression {
            operator,
            left,
            right,
        } => {
            if matches!(operator.as_str(), "==" | "!=" | "<" | ">" | "<=" | ">=") {
                return Ok(ValType::I32);
            }
            let l = infer_type(ctx, left)?;
            let r = infer_type(ctx, right)?;
            Ok(if l == ValType::F64 || r == ValType::F64 {
                ValType::F64
            } else {
                ValType::I32
            })
        }
        Expr::LogicalExpression { .. } => Ok(ValType::I32),
        Expr::CallExpression { callee, .. } => {
            let Some(name) = callee.as_identifier() else {
                return Err(ctx.err("W003", "only direct calls to module functions are supported"));
            };
            let sig = ctx.sigs.get(name).ok_or_else(|| {
                ctx.err("W003", format!("call to '{}' which is not a wasm function", name))
            })?;
            sig.result
                .ok_or_else(|| ctx.err("W003", format!("call to void function '{}' as value", name)))
        }
        Expr::IfExpression { then_branch, .. } => match then_branch {
            BodyExpr::Expr { expression } => infer_type(ctx, expression),
            BodyExpr::Block { .. } => Err(ctx.err("W003", "if-expression branches must be expressions")),
        },
        _ => Err(ctx.err("W003", "unsupported expression in numeric context")),
    }
}

fn is_i32_literal(value: f64) -> bool {
    value.fract() == 0.0 && value >= i32::MIN as f64 && value <= i32::MAX as f64
}

// ---------------------------------------------------------------------------
// LEB128
// ---------------------------------------------------------------------------

fn uleb(mut value: u32, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            out.push(byte | 0x80);
        } else {
            out.push(byte);
            break;
        }
    }
}

fn sleb(mut value: i64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        let sign_clear = byte & 0x40 == 0;
        if (value == 0 && sign_clear) || (value == -1 && !sign_clear) {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fn_decl(name: &str, params: Vec<(&str, &str)>, ret: Option<&str>, body: Vec<Stmt>) -> FunctionDecl {
        FunctionDecl {
            name: name.into(),
            params: params
                .into_iter()
                .map(|(n, t)| Param::typed(n, t))
                .collect(),
            body,
            is_async: false,
            is_public: false,
            return_type: ret.map(str::to_string),
            is_wasm: true,
        }
    }

    fn ret(expr: Expr) -> Stmt {
        Stmt::of(StmtKind::ReturnStatement(ReturnStmt { value: Some(expr) }))
    }

    #[test]
    fn uleb_encoding() {
        let mut out = Vec::new();
        uleb(0, &mut out);
        uleb(127, &mut out);
        uleb(128, &mut out);
        uleb(624485, &mut out);
        assert_eq!(out, vec![0x00, 0x7F, 0x80, 0x01, 0xE5, 0x8E, 0x26]);
    }

    #[test]
    fn sleb_encoding() {
        let mut out = Vec::new();
        sleb(0, &mut out);
        sleb(1, &mut out);
        sleb(-1, &mut out);
        sleb(63, &mut out);
        sleb(64, &mut out);
        sleb(-64, &mut out);
        sleb(-65, &mut out);
        assert_eq!(
            out,
            vec![0x00, 0x01, 0x7F, 0x3F, 0xC0, 0x00, 0x40, 0xBF, 0x7F]
        );
    }

    #[test]
    fn module_header_and_sections() {
        let add = fn_decl(
            "add",
            vec![("a", "Int"), ("b", "Int")],
            Some("Int"),
            vec![ret(Expr::binary("+", Expr::ident("a"), Expr::ident("b")))],
        );
        let module = compile_functions(&[&add]).unwrap();
        assert_eq!(&module[..8], &[0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00]);
        // Section ids in order: type(1), function(3), export(7), code(10).
        let mut i = 8;
        let mut ids = Vec::new();
        while i < module.len() {
            ids.push(module[i]);
            i += 1;
            // payload length (single-byte for these tiny sections)
            let len = module[i] as usize;
            i += 1 + len;
        }
        assert_eq!(ids, vec![1, 3, 7, 10]);
    }

    #[test]
    fn add_body_uses_i32_add() {
        let add = fn_decl(
            "add",
            vec![("a", "Int"), ("b", "Int")],
            Some("Int"),
            vec![ret(Expr::binary("+", Expr::ident("a"), Expr::ident("b")))],
        );
        let module = compile_functions(&[&add]).unwrap();
        // local.get 0, local.get 1, i32.add, return, end
        let body: &[u8] = &[0x00, 0x20, 0x00, 0x20, 0x01, 0x6A, 0x0F, 0x0B];
        assert!(module.windows(body.len()).any(|w| w == body));
    }

    #[test]
    fn float_params_promote_ints() {
        let scale = fn_decl(
            "scale",
            vec![("x", "Float")],
            Some("Float"),
            vec![ret(Expr::binary("*", Expr::ident("x"), Expr::num(2.0)))],
        );
        let module = compile_functions(&[&scale]).unwrap();
        // i32.const 2 then f64.convert_i32_s, then f64.mul
        let promoted: &[u8] = &[0x41, 0x02, 0xB7, 0xA2];
        assert!(module.windows(promoted.len()).any(|w| w == promoted));
    }

    #[test]
    fn mutual_recursion_resolves() {
        let is_even = fn_decl(
            "is_even",
            vec![("n", "Int")],
            Some("Bool"),
            vec![ret(Expr::IfExpression {
                condition: Box::new(Expr::binary("==", Expr::ident("n"), Expr::num(0.0))),
                then_branch: BodyExpr::Expr {
                    expression: Box::new(Expr::boolean(true)),
                },
                else_branch: BodyExpr::Expr {
                    expression: Box::new(Expr::call(
                        Expr::ident("is_odd"),
                        vec![Expr::binary("-", Expr::ident("n"), Expr::num(1.0))],
                    )),
                },
            })],
        );
        let is_odd = fn_decl(
            "is_odd",
            vec![("n", "Int")],
            Some("Bool"),
            vec![ret(Expr::IfExpression {
                condition: Box::new(Expr::binary("==", Expr::ident("n"), Expr::num(0.0))),
                then_branch: BodyExpr::Expr {
                    expression: Box::new(Expr::boolean(false)),
                },
                else_branch: BodyExpr::Expr {
                    expression: Box::new(Expr::call(
                        Expr::ident("is_even"),
                        vec![Expr::binary("-", Expr::ident("n"), Expr::num(1.0))],
                    )),
                },
            })],
        );
        let module = compile_functions(&[&is_even, &is_odd]).unwrap();
        // call 1 appears in is_even, call 0 in is_odd.
        assert!(module.windows(2).any(|w| w == [0x10, 0x01]));
        assert!(module.windows(2).any(|w| w == [0x10, 0x00]));
    }

    #[test]
    fn while_and_locals_compile() {
        // fn sum_to(n: Int) -> Int { var total = 0; var i = 0; while i < n { total = total + i; i = i + 1 } return total }
        let body = vec![
            Stmt::of(StmtKind::VarDeclaration(VarDecl {
                targets: vec!["total".into()],
                values: vec![Expr::num(0.0)],
            })),
            Stmt::of(StmtKind::VarDeclaration(VarDecl {
                targets: vec!["i".into()],
                values: vec![Expr::num(0.0)],
            })),
            Stmt::of(StmtKind::WhileStatement(WhileStmt {
                condition: Expr::binary("<", Expr::ident("i"), Expr::ident("n")),
                body: vec![
                    Stmt::of(StmtKind::Assignment(AssignStmt {
                        targets: vec!["total".into()],
                        values: vec![Expr::binary("+", Expr::ident("total"), Expr::ident("i"))],
                    })),
                    Stmt::of(StmtKind::Assignment(AssignStmt {
                        targets: vec!["i".into()],
                        values: vec![Expr::binary("+", Expr::ident("i"), Expr::num(1.0))],
                    })),
                ],
            })),
            ret(Expr::ident("total")),
        ];
        let f = fn_decl("sum_to", vec![("n", "Int")], Some("Int"), body);
        let module = compile_functions(&[&f]).unwrap();
        // Two i32 locals grouped as one declaration run: count=1 group, 2 × 0x7F.
        let grouped: &[u8] = &[0x01, 0x02, 0x7F];
        assert!(module.windows(grouped.len()).any(|w| w == grouped));
        // loop/block structure present.
        assert!(module.windows(2).any(|w| w == [0x02, 0x40]));
        assert!(module.windows(2).any(|w| w == [0x03, 0x40]));
    }

    #[test]
    fn unsupported_expression_is_fatal() {
        let f = fn_decl(
            "bad",
            vec![],
            Some("Int"),
            vec![ret(Expr::str("nope"))],
        );
        let err = compile_functions(&[&f]).unwrap_err();
        assert_eq!(err.code, "W003");
        assert!(err.message.contains("fn bad"));
    }

    #[test]
    fn undefined_variable_is_fatal() {
        let f = fn_decl("bad", vec![], Some("Int"), vec![ret(Expr::ident("ghost"))]);
        let err = compile_functions(&[&f]).unwrap_err();
        assert_eq!(err.code, "W002");
        assert!(err.message.contains("ghost"));
    }

    #[test]
    fn non_numeric_param_rejected() {
        let f = fn_decl("bad", vec![("s", "String")], Some("Int"), vec![]);
        let err = compile_functions(&[&f]).unwrap_err();
        assert_eq!(err.code, "W001");
    }
}
