//! CLI lowering: command functions, per-command help printers, and a
//! type-coercing argv dispatcher.
//!
//! Exit codes: 0 on success, 1 on parse or validation errors.

use crate::ast::*;
use crate::merge::MergedCli;

use super::stmt::emit_stmt;
use super::writer::CodeWriter;
use super::{Codegen, GeneratedModule, Target};

/// Generate the CLI executable module. The orchestrator adds the
/// executable bit; the shebang is part of the module text.
pub fn generate(cli: &MergedCli, sources: &[String]) -> GeneratedModule {
    let mut cg = Codegen::new(Target::Cli);
    for source in sources {
        cg.map.add_source(source);
    }

    let name = cli
        .config
        .iter()
        .find(|(k, _)| k == "name")
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| "cli".into());
    let version = cli
        .config
        .iter()
        .find(|(k, _)| k == "version")
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| "0.0.0".into());
    let description = cli
        .config
        .iter()
        .find(|(k, _)| k == "description")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();

    let commands: Vec<&FunctionDecl> = cli
        .commands
        .iter()
        .filter_map(|m| match &m.stmt.kind {
            StmtKind::FunctionDeclaration(f) => Some(f),
            _ => None,
        })
        .collect();

    let mut w = CodeWriter::new();
    w.line("#!/usr/bin/env node");
    w.blank();

    for merged in &cli.commands {
        cg.source_index = merged.source;
        emit_stmt(&mut cg, &mut w, &merged.stmt);
    }
    w.blank();

    for command in &commands {
        emit_command_help(&mut w, &name, command);
        emit_command_runner(&mut cg, &mut w, command);
    }

    emit_top_help(&mut w, &name, &version, &description, &commands);
    emit_main(&mut w, &version, &commands);

    cg.helpers.emit_used(&mut w);

    GeneratedModule {
        code: w.finish(),
        map: cg.map,
    }
}

fn positionals(command: &FunctionDecl) -> Vec<&Param> {
    command.params.iter().filter(|p| !p.is_flag).collect()
}

fn flags(command: &FunctionDecl) -> Vec<&Param> {
    command.params.iter().filter(|p| p.is_flag).collect()
}

fn emit_command_help(w: &mut CodeWriter, cli_name: &str, command: &FunctionDecl) {
    let args: Vec<String> = positionals(command)
        .iter()
        .map(|p| {
            if p.default.is_some() {
                format!("[{}]", p.name)
            } else {
                format!("<{}>", p.name)
            }
        })
        .collect();

    w.block_open(&format!("function __help_{}()", command.name));
    w.line(&format!(
        "console.log(\"Usage: {} {} {}{}\");",
        cli_name,
        command.name,
        args.join(" "),
        if flags(command).is_empty() {
            ""
        } else {
            " [options]"
        }
    ));
    if !positionals(command).is_empty() {
        w.line("console.log(\"\");");
        w.line("console.log(\"Arguments:\");");
        for p in positionals(command) {
            w.line(&format!(
                "console.log(\"  {}  {}\");",
                p.name,
                p.type_annotation.as_deref().unwrap_or("String")
            ));
        }
    }
    if !flags(command).is_empty() {
        w.line("console.log(\"\");");
        w.line("console.log(\"Options:\");");
        for p in flags(command) {
            w.line(&format!(
                "console.log(\"  --{}  {}\");",
                p.name,
                p.type_annotation.as_deref().unwrap_or("Bool")
            ));
        }
    }
    w.block_close();
}

fn emit_command_runner(cg: &mut Codegen, w: &mut CodeWriter, command: &FunctionDecl) {
    w.block_open(&format!("function __run_{}(__argv)", command.name));

    let flag_types: Vec<String> = flags(command)
        .iter()
        .map(|p| {
            format!(
                "{}: \"{}\"",
                p.name,
                p.type_annotation.as_deref().unwrap_or("Bool")
            )
        })
        .collect();
    w.line(&format!("const __flagTypes = {{ {} }};", flag_types.join(", ")));
    w.line("const __positional = [];");
    w.line("const __flags = {};");

    // argv scan: --flag / --flag=value / --no-flag / -h.
    w.block_open("for (let __i = 0; __i < __argv.length; __i++)");
    w.line("const __arg = __argv[__i];");
    w.line(&format!(
        "if (__arg === \"-h\" || __arg === \"--help\") {{ __help_{}(); return 0; }}",
        command.name
    ));
    w.block_open("if (__arg.startsWith(\"--no-\"))");
    w.line("__flags[__arg.slice(5)] = false;");
    w.line("continue;");
    w.block_close();
    w.block_open("if (__arg.startsWith(\"--\"))");
    w.line("let __name = __arg.slice(2);");
    w.line("let __value = null;");
    w.line("const __eq = __name.indexOf(\"=\");");
    w.line("if (__eq !== -1) { __value = __name.slice(__eq + 1); __name = __name.slice(0, __eq); }");
    w.line("const __type = __flagTypes[__name];");
    w.line("if (__type === undefined) { console.error(\"Error: Unknown option --\" + __name); return 1; }");
    w.block_open("if (__type.startsWith(\"[\"))");
    w.line("if (__value === null) { __i++; __value = __argv[__i]; }");
    w.line("(__flags[__name] = __flags[__name] ?? []).push(__value);");
    w.block_else();
    w.line("if (__type === \"Bool\") { __flags[__name] = __value === null ? true : __value !== \"false\"; }");
    w.line("else if (__value !== null) { __flags[__name] = __value; }");
    w.line("else { __i++; __flags[__name] = __argv[__i]; }");
    w.block_close();
    w.line("continue;");
    w.block_close();
    w.line("__positional.push(__arg);");
    w.block_close();

    // Required positionals, then coercion by declared type.
    for (i, param) in positionals(command).iter().enumerate() {
        if param.default.is_none() {
            w.line(&format!(
                "if (__positional.length < {}) {{ console.error(\"Error: Missing required argument <{}>\"); return 1; }}",
                i + 1,
                param.name
            ));
        }
        emit_coercion(cg, w, param, &format!("__positional[{}]", i), true);
    }
    for param in flags(command) {
        emit_coercion(cg, w, param, &format!("__flags.{}", param.name), false);
    }

    let args: Vec<&str> = command.params.iter().map(|p| p.name.as_str()).collect();
    w.line(&format!("{}({});", command.name, args.join(", ")));
    w.line("return 0;");
    w.block_close();
}

/// Coerce one raw argv value by the parameter's declared type.
fn emit_coercion(
    cg: &mut Codegen,
    w: &mut CodeWriter,
    param: &Param,
    raw: &str,
    positional: bool,
) {
    let name = &param.name;
    let ty = param.type_annotation.as_deref().unwrap_or(if positional {
        "String"
    } else {
        "Bool"
    });
    let default_js = param.default.as_ref().map(|d| super::expr::emit_expr(cg, d));
    let parse = |parser: &str| match &default_js {
        Some(default) => format!(
            "const {0} = {1} === undefined ? ({2}) : {3}({1}{4});",
            name,
            raw,
            default,
            parser,
            if parser == "parseInt" { ", 10" } else { "" }
        ),
        None => format!(
            "const {0} = {1}({2}{3});",
            name,
            parser,
            raw,
            if parser == "parseInt" { ", 10" } else { "" }
        ),
    };
    match ty {
        "Int" => {
            w.line(&parse("parseInt"));
            w.line(&format!(
                "if (Number.isNaN({0})) {{ console.error(\"Error: Invalid Int for {0}\"); return 1; }}",
                name
            ));
        }
        "Float" => {
            w.line(&parse("parseFloat"));
            w.line(&format!(
                "if (Number.isNaN({0})) {{ console.error(\"Error: Invalid Float for {0}\"); return 1; }}",
                name
            ));
        }
        "Bool" => {
            w.line(&format!(
                "const {} = {} ?? {};",
                name,
                raw,
                default_js.as_deref().unwrap_or("false")
            ));
        }
        list if list.starts_with('[') => {
            w.line(&format!("const {} = {} ?? [];", name, raw));
        }
        _ => match &default_js {
            Some(default) => w.line(&format!(
                "const {0} = {1} === undefined ? ({2}) : {1};",
                name, raw, default
            )),
            None => w.line(&format!("const {} = {};", name, raw)),
        },
    }
}

fn emit_top_help(
    w: &mut CodeWriter,
    name: &str,
    version: &str,
    description: &str,
    commands: &[&FunctionDecl],
) {
    w.block_open("function __help()");
    w.line(&format!("console.log(\"{} {}\");", name, version));
    if !description.is_empty() {
        w.line(&format!(
            "console.log(\"{}\");",
            super::expr::escape_string(description)
        ));
    }
    if commands.len() > 1 {
        w.line("console.log(\"\");");
        w.line("console.log(\"Commands:\");");
        for command in commands {
            w.line(&format!("console.log(\"  {}\");", command.name));
        }
    }
    w.block_close();
}

fn emit_main(w: &mut CodeWriter, version: &str, commands: &[&FunctionDecl]) {
    w.block_open("function main()");
    w.line("const __argv = process.argv.slice(2);");

    if commands.len() == 1 {
        // Single-command mode: route directly, no subcommand token.
        let command = commands[0];
        w.line(&format!(
            "if (__argv[0] === \"-h\" || __argv[0] === \"--help\") {{ __help_{}(); process.exit(0); }}",
            command.name
        ));
        w.line(&format!(
            "if (__argv[0] === \"--version\") {{ console.log(\"{}\"); process.exit(0); }}",
            version
        ));
        w.line(&format!("process.exit(__run_{}(__argv));", command.name));
    } else {
        w.line("const __cmd = __argv[0];");
        w.line("if (__cmd === undefined || __cmd === \"-h\" || __cmd === \"--help\") { __help(); process.exit(0); }");
        w.line(&format!(
            "if (__cmd === \"--version\") {{ console.log(\"{}\"); process.exit(0); }}",
            version
        ));
        w.block_open("switch (__cmd)");
        for command in commands {
            w.line(&format!(
                "case \"{0}\": process.exit(__run_{0}(__argv.slice(1)));",
                command.name
            ));
        }
        w.line("default:");
        w.indent();
        w.line("console.error(\"Error: Unknown command '\" + __cmd + \"'\");");
        w.line("__help();");
        w.line("process.exit(1);");
        w.dedent();
        w.block_close();
    }

    w.block_close();
    w.line("main();");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MergedStmt;

    fn greet_command() -> Stmt {
        Stmt::of(StmtKind::FunctionDeclaration(FunctionDecl {
            name: "greet".into(),
            params: vec![
                Param::typed("name", "String"),
                Param {
                    name: "loud".into(),
                    type_annotation: Some("Bool".into()),
                    default: None,
                    pattern: None,
                    is_flag: true,
                },
            ],
            body: vec![],
            is_async: false,
            is_public: false,
            return_type: None,
            is_wasm: false,
        }))
    }

    fn cli(config: Vec<(&str, &str)>, commands: Vec<Stmt>) -> MergedCli {
        MergedCli {
            config: config
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            commands: commands
                .into_iter()
                .map(|stmt| MergedStmt { source: 0, stmt })
                .collect(),
        }
    }

    #[test]
    fn shebang_first_line() {
        let module = generate(
            &cli(vec![("name", "mycli")], vec![greet_command()]),
            &["cli.tova".into()],
        );
        assert!(module.code.starts_with("#!/usr/bin/env node\n"));
    }

    #[test]
    fn single_command_routes_directly() {
        let module = generate(
            &cli(vec![("name", "mycli")], vec![greet_command()]),
            &["cli.tova".into()],
        );
        assert!(module.code.contains("process.exit(__run_greet(__argv));"));
        assert!(!module.code.contains("switch (__cmd)"));
    }

    #[test]
    fn missing_required_positional_exits_1() {
        let module = generate(
            &cli(vec![("name", "mycli")], vec![greet_command()]),
            &["cli.tova".into()],
        );
        assert!(module.code.contains(
            "if (__positional.length < 1) { console.error(\"Error: Missing required argument <name>\"); return 1; }"
        ));
    }

    #[test]
    fn bool_flag_defaults_false() {
        let module = generate(
            &cli(vec![("name", "mycli")], vec![greet_command()]),
            &["cli.tova".into()],
        );
        assert!(module.code.contains("const loud = __flags.loud ?? false;"));
    }

    #[test]
    fn flag_forms_parsed() {
        let module = generate(
            &cli(vec![("name", "mycli")], vec![greet_command()]),
            &["cli.tova".into()],
        );
        assert!(module.code.contains("if (__arg.startsWith(\"--no-\"))"));
        assert!(module.code.contains("const __eq = __name.indexOf(\"=\");"));
        assert!(module.code.contains("if (__arg === \"-h\" || __arg === \"--help\")"));
    }

    #[test]
    fn int_coercion_checks_nan() {
        let count = Stmt::of(StmtKind::FunctionDeclaration(FunctionDecl {
            name: "repeat".into(),
            params: vec![Param::typed("times", "Int")],
            body: vec![],
            is_async: false,
            is_public: false,
            return_type: None,
            is_wasm: false,
        }));
        let module = generate(
            &cli(vec![("name", "mycli")], vec![count]),
            &["cli.tova".into()],
        );
        assert!(module.code.contains("const times = parseInt(__positional[0], 10);"));
        assert!(module.code.contains("Number.isNaN(times)"));
    }

    #[test]
    fn multi_command_dispatches_by_name() {
        let second = Stmt::of(StmtKind::FunctionDeclaration(FunctionDecl {
            name: "version_info".into(),
            params: vec![],
            body: vec![],
            is_async: false,
            is_public: false,
            return_type: None,
            is_wasm: false,
        }));
        let module = generate(
            &cli(
                vec![("name", "mycli"), ("version", "2.1.0")],
                vec![greet_command(), second],
            ),
            &["cli.tova".into()],
        );
        assert!(module.code.contains("switch (__cmd)"));
        assert!(module
            .code
            .contains("case \"greet\": process.exit(__run_greet(__argv.slice(1)));"));
        assert!(module.code.contains("console.log(\"2.1.0\");"));
        assert!(module.code.contains("process.exit(1);"));
    }
}
