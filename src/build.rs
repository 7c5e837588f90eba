//! Build orchestrator: groups source files by directory, merges blocks,
//! runs the code generators, and commits output files atomically.
//!
//! Outputs are staged in a temporary directory and moved into place only
//! when the whole build succeeded, so a failed build leaves the previous
//! output intact.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::analyze;
use crate::ast::{self, SourceFile, StmtKind};
use crate::codegen::{
    cli, client, edge, form, security, server, shared, wasm_binary, CodegenOutput,
    GeneratedFile, GeneratedModule,
};
use crate::error::{BuildError, CompilerError, Warning};
use crate::merge::{self, MergedUnit};

/// Parser seam: the external lexer/parser plugged into the orchestrator.
/// The default ingests the parser's JSON AST via serde.
pub type ParseFn = dyn Fn(&str, &str) -> Result<SourceFile, Vec<CompilerError>>;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Hash, bundle, and emit index.html.
    pub production: bool,
    /// Strip blank lines and indentation from the client bundle.
    pub minify: bool,
    /// Import specifier the client module loads the runtime from.
    pub runtime_import: String,
    /// Runtime library source inlined into the client bundle in
    /// production (replaces the runtime import).
    pub runtime_source: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            production: false,
            minify: false,
            runtime_import: "./tova_runtime.js".into(),
            runtime_source: None,
        }
    }
}

/// A successful build: every written file with its byte size, plus the
/// analyzer warnings per directory.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub files: Vec<(PathBuf, u64)>,
    pub warnings: Vec<Warning>,
}

// ---------------------------------------------------------------------------
// Pure compilation (no file system)
// ---------------------------------------------------------------------------

/// Compile pre-parsed files in one directory to output files. `dir_name`
/// drives the output naming convention; `sources_content` parallels the
/// merged unit's source list for `sourcesContent`.
pub fn compile_ast(
    files: &[SourceFile],
    dir_name: &str,
    sources_content: &[String],
    options: &BuildOptions,
) -> Result<(CodegenOutput, Vec<Warning>), Vec<CompilerError>> {
    let unit = merge::merge_files(files)?;
    let warnings = analyze::analyze(&unit);
    let output = compile_unit(&unit, dir_name, sources_content, options)?;
    Ok((output, warnings))
}

fn compile_unit(
    unit: &MergedUnit,
    dir_name: &str,
    sources_content: &[String],
    options: &BuildOptions,
) -> Result<CodegenOutput, Vec<CompilerError>> {
    let mut output = CodegenOutput::default();
    let security_block = unit.security.as_ref();

    // Output order is fixed: shared, servers (lexical), clients, then
    // edge/cli/form.
    if let Some(block) = &unit.shared {
        if !block.stmts.is_empty() {
            let module = shared::generate(block, &unit.sources);
            push_module(
                &mut output,
                format!("{}.shared.js", dir_name),
                module,
                sources_content,
            );
        }
    }

    for (ordinal, block) in unit.servers.iter().enumerate() {
        if block.stmts.is_empty() {
            continue;
        }
        let name = if block.label.is_empty() {
            format!("{}.server.js", dir_name)
        } else {
            format!("{}.server.{}.js", dir_name, block.label)
        };
        let module = server::generate(block, &unit.sources, ordinal, security_block);
        push_module(&mut output, name, module, sources_content);
    }

    for block in &unit.clients {
        if block.stmts.is_empty() {
            continue;
        }
        let name = if block.label.is_empty() {
            format!("{}.client.js", dir_name)
        } else {
            format!("{}.client.{}.js", dir_name, block.label)
        };
        let mut module = client::generate(block, &unit.sources, &options.runtime_import);
        if security_block.is_some() {
            module.code.push('\n');
            module.code.push_str(security::CLIENT_TOKEN_JS);
            module.code.push('\n');
        }
        push_module(&mut output, name, module, sources_content);
    }

    for merged_edge in &unit.edges {
        let name = if merged_edge.label.is_empty() {
            format!("{}.edge.js", dir_name)
        } else {
            format!("{}.edge.{}.js", dir_name, merged_edge.label)
        };
        let module = edge::generate(merged_edge, security_block, &unit.sources);
        let is_cloudflare =
            merged_edge.config.target == crate::ast::EdgeTarget::Cloudflare;
        let main_file = name.clone();
        push_module(&mut output, name, module, sources_content);
        if is_cloudflare {
            output.files.push(GeneratedFile::text(
                "wrangler.toml",
                edge::generate_wrangler(merged_edge, &main_file, dir_name),
            ));
        }
    }

    if let Some(merged_cli) = &unit.cli {
        let module = cli::generate(merged_cli, &unit.sources);
        push_module(
            &mut output,
            format!("{}.cli.js", dir_name),
            module,
            sources_content,
        );
    }

    if !unit.forms.is_empty() {
        let validators = form::collect_type_validators(unit);
        let module = form::generate(
            &unit.forms,
            &unit.sources,
            &options.runtime_import,
            &validators,
        );
        push_module(
            &mut output,
            format!("{}.form.js", dir_name),
            module,
            sources_content,
        );
    }

    // `@wasm` functions from the shared block compile into one module.
    if let Some(block) = &unit.shared {
        let wasm_fns: Vec<&crate::ast::FunctionDecl> = block
            .stmts
            .iter()
            .filter_map(|m| match &m.stmt.kind {
                StmtKind::FunctionDeclaration(f) if f.is_wasm => Some(f),
                _ => None,
            })
            .collect();
        if !wasm_fns.is_empty() {
            let bytes = wasm_binary::compile_functions(&wasm_fns).map_err(|e| vec![e])?;
            output
                .files
                .push(GeneratedFile::binary(format!("{}.wasm", dir_name), bytes));
        }
    }

    Ok(output)
}

/// Attach the source-map sidecar reference and store the module.
fn push_module(
    output: &mut CodegenOutput,
    name: String,
    module: GeneratedModule,
    sources_content: &[String],
) {
    let mut file = GeneratedFile::text(name.clone(), module.code);
    if !module.map.is_empty() {
        // sourcesContent parallels the map's registered sources.
        let contents: Vec<String> = module
            .map
            .sources()
            .iter()
            .enumerate()
            .map(|(i, _)| sources_content.get(i).cloned().unwrap_or_default())
            .collect();
        let map_json = module.map.to_json(&name, &contents);
        let mut code = String::from_utf8(file.content).unwrap_or_default();
        code.push_str(&format!("//# sourceMappingURL={}.map\n", name));
        file.content = code.into_bytes();
        file.map = Some(map_json);
    }
    output.files.push(file);
}

// ---------------------------------------------------------------------------
// Directory builds
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    options: BuildOptions,
    parser: Box<ParseFn>,
}

impl Orchestrator {
    pub fn new(options: BuildOptions) -> Self {
        Orchestrator {
            options,
            parser: Box::new(|path, content| ast::parse_source_file(path, content)),
        }
    }

    /// Replace the JSON-AST ingester with a native parser.
    pub fn with_parser(
        mut self,
        parser: impl Fn(&str, &str) -> Result<SourceFile, Vec<CompilerError>> + 'static,
    ) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Build every directory under `root` containing `.tova` sources,
    /// writing outputs to `out_dir`.
    pub fn build(&self, root: &Path, out_dir: &Path) -> Result<BuildReport, BuildError> {
        let groups = group_by_directory(root)?;
        if groups.is_empty() {
            return Err(CompilerError::build("B001", "No source files found").into());
        }

        // Parse everything first; imports need the full picture.
        let mut parsed: BTreeMap<PathBuf, Vec<SourceFile>> = BTreeMap::new();
        let mut contents: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
        let mut errors = Vec::new();
        for (dir, paths) in &groups {
            let mut files = Vec::new();
            let mut texts = Vec::new();
            for path in paths {
                let text = fs::read_to_string(path)
                    .map_err(|e| BuildError::io(path.display().to_string(), e))?;
                let rel = path
                    .strip_prefix(root)
                    .unwrap_or(path)
                    .display()
                    .to_string();
                match (self.parser)(&rel, &text) {
                    Ok(file) => {
                        files.push(file);
                        texts.push(text);
                    }
                    Err(mut errs) => errors.append(&mut errs),
                }
            }
            parsed.insert(dir.clone(), files);
            contents.insert(dir.clone(), texts);
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let order = resolve_import_order(&parsed)?;

        // Imported directories flatten to `<dirname>.shared.js`; two
        // directories with one name would silently overwrite each other.
        let mut seen_names: HashMap<String, PathBuf> = HashMap::new();
        for dir in &order {
            let name = dir_name(dir);
            if let Some(previous) = seen_names.insert(name.clone(), dir.clone()) {
                return Err(CompilerError::build(
                    "B005",
                    format!(
                        "Directories '{}' and '{}' both produce outputs named '{}.*'",
                        previous.display(),
                        dir.display(),
                        name
                    ),
                )
                .into());
            }
        }

        let mut report = BuildReport::default();
        let mut staged: Vec<GeneratedFile> = Vec::new();
        for dir in &order {
            let name = dir_name(dir);
            let mut files = parsed.remove(dir).unwrap_or_default();
            rewrite_imports(&mut files);
            let texts = contents.remove(dir).unwrap_or_default();
            let (mut output, mut warnings) =
                compile_ast(&files, &name, &texts, &self.options)?;
            if self.options.production {
                finalize_production(&mut output, &name, &self.options);
            }
            report.warnings.append(&mut warnings);
            staged.append(&mut output.files);
        }

        commit_outputs(&staged, out_dir, &mut report)?;
        Ok(report)
    }
}

/// Group `.tova` files by parent directory, filesystem-sorted.
fn group_by_directory(root: &Path) -> Result<BTreeMap<PathBuf, Vec<PathBuf>>, BuildError> {
    let mut groups: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            BuildError::io(
                root.display().to_string(),
                std::io::Error::other(e.to_string()),
            )
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("tova") {
            let dir = path.parent().unwrap_or(root).to_path_buf();
            groups.entry(dir).or_default().push(path.to_path_buf());
        }
    }
    for paths in groups.values_mut() {
        paths.sort();
    }
    Ok(groups)
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("app")
        .to_string()
}

/// Cross-directory imports compile dependency-first; cycles are fatal.
fn resolve_import_order(
    parsed: &BTreeMap<PathBuf, Vec<SourceFile>>,
) -> Result<Vec<PathBuf>, BuildError> {
    let mut graph: DiGraph<PathBuf, ()> = DiGraph::new();
    let mut nodes: BTreeMap<PathBuf, NodeIndex> = BTreeMap::new();
    for dir in parsed.keys() {
        let idx = graph.add_node(dir.clone());
        nodes.insert(dir.clone(), idx);
    }

    for (dir, files) in parsed {
        for file in files {
            for target in imported_tova_dirs(dir, file) {
                if let (Some(&from), Some(&to)) = (nodes.get(&target), nodes.get(dir)) {
                    if from != to {
                        // Edge dependency → dependent.
                        graph.add_edge(from, to, ());
                    }
                }
            }
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|i| graph[i].clone()).collect()),
        Err(cycle) => {
            let dir = &graph[cycle.node_id()];
            Err(CompilerError::build(
                "B003",
                format!(
                    "Circular import involving directory '{}'",
                    dir.display()
                ),
            )
            .into())
        }
    }
}

fn imported_tova_dirs(dir: &Path, file: &SourceFile) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for block in &file.blocks {
        for stmt in block_stmts(block) {
            if let StmtKind::ImportDeclaration(import) = &stmt.kind {
                if import.path.ends_with(".tova") {
                    let target = dir.join(&import.path);
                    if let Some(parent) = target.parent() {
                        out.push(normalize(parent));
                    }
                }
            }
        }
    }
    out
}

fn block_stmts(block: &crate::ast::Block) -> &[crate::ast::Stmt] {
    use crate::ast::Block::*;
    match block {
        SharedBlock(b) => &b.body,
        ServerBlock(b) => &b.body,
        ClientBlock(b) => &b.body,
        DataBlock(b) => &b.body,
        DeployBlock(b) => &b.body,
        TestBlock(b) => &b.body,
        _ => &[],
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

/// Rewrite `.tova` import specifiers to the generated shared module of the
/// imported directory.
fn rewrite_imports(files: &mut [SourceFile]) {
    for file in files {
        for block in &mut file.blocks {
            for stmt in block_stmts_mut(block) {
                if let StmtKind::ImportDeclaration(import) = &mut stmt.kind {
                    if import.path.ends_with(".tova") {
                        let path = Path::new(&import.path);
                        let target_dir = path
                            .parent()
                            .and_then(|p| p.file_name())
                            .and_then(|n| n.to_str())
                            .map(str::to_string);
                        if let Some(name) = target_dir {
                            import.path = format!("./{}.shared.js", name);
                        }
                    }
                }
            }
        }
    }
}

fn block_stmts_mut(block: &mut crate::ast::Block) -> &mut [crate::ast::Stmt] {
    use crate::ast::Block::*;
    match block {
        SharedBlock(b) => &mut b.body,
        ServerBlock(b) => &mut b.body,
        ClientBlock(b) => &mut b.body,
        DataBlock(b) => &mut b.body,
        DeployBlock(b) => &mut b.body,
        TestBlock(b) => &mut b.body,
        _ => &mut [],
    }
}

// ---------------------------------------------------------------------------
// Production finalization
// ---------------------------------------------------------------------------

/// First 12 hex chars of the SHA-256 content hash.
pub fn content_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    hex::encode(digest)[..12].to_string()
}

/// Hash bundles, inline the runtime into the client bundle, minify, and
/// emit index.html referencing the hashed client file.
fn finalize_production(output: &mut CodegenOutput, dir_name: &str, options: &BuildOptions) {
    let client_name = format!("{}.client.js", dir_name);
    let mut hashed_client: Option<String> = None;

    for file in &mut output.files {
        if !file.path.ends_with(".js") {
            continue;
        }
        let mut code = String::from_utf8(std::mem::take(&mut file.content)).unwrap_or_default();

        if file.path == client_name {
            if let Some(runtime) = &options.runtime_source {
                // Inline the runtime: the import line becomes the library
                // itself, stripped of export keywords.
                let import_prefix = "import {";
                code = code
                    .lines()
                    .map(|line| {
                        if line.starts_with(import_prefix)
                            && line.contains(&options.runtime_import)
                        {
                            runtime.replace("export ", "")
                        } else {
                            line.to_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                code.push('\n');
            }
            if options.minify {
                code = minify_js(&code);
            }
        }

        let hash = content_hash(code.as_bytes());
        let stem = file.path.trim_end_matches(".js");
        let hashed = format!("{}.{}.js", stem, hash);
        if file.path == client_name {
            hashed_client = Some(hashed.clone());
        }
        // The sidecar follows the hashed name; the hash itself is computed
        // over the pre-rename trailer, which keeps rebuilds stable.
        code = code.replace(
            &format!("//# sourceMappingURL={}.map", file.path),
            &format!("//# sourceMappingURL={}.map", hashed),
        );
        file.path = hashed;
        file.content = code.into_bytes();
    }

    if let Some(client) = hashed_client {
        output.files.push(GeneratedFile::text(
            "index.html",
            format!(
                "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<div id=\"app\"></div>\n<script type=\"module\" src=\"./{}\"></script>\n</body>\n</html>\n",
                dir_name, client
            ),
        ));
    }
}

/// Conservative whitespace-only minification: leading indentation and
/// blank lines go, everything inside string or template literals stays.
fn minify_js(code: &str) -> String {
    code.lines()
        .map(str::trim_start)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

// ---------------------------------------------------------------------------
// Output commit
// ---------------------------------------------------------------------------

/// Stage into a temp dir, then move into place so failed builds never
/// leave partial output.
fn commit_outputs(
    files: &[GeneratedFile],
    out_dir: &Path,
    report: &mut BuildReport,
) -> Result<(), BuildError> {
    let staging = out_dir.with_extension("tova-staging");
    if staging.exists() {
        fs::remove_dir_all(&staging)
            .map_err(|e| BuildError::io(staging.display().to_string(), e))?;
    }
    fs::create_dir_all(&staging)
        .map_err(|e| BuildError::io(staging.display().to_string(), e))?;

    for file in files {
        let path = staging.join(&file.path);
        fs::write(&path, &file.content)
            .map_err(|e| BuildError::io(path.display().to_string(), e))?;
        if let Some(map) = &file.map {
            let map_path = staging.join(format!("{}.map", file.path));
            fs::write(&map_path, map)
                .map_err(|e| BuildError::io(map_path.display().to_string(), e))?;
        }
        #[cfg(unix)]
        if file.path.ends_with(".cli.js") || file.path.contains(".cli.") {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&path, fs::Permissions::from_mode(0o755));
        }
    }

    fs::create_dir_all(out_dir).map_err(|e| BuildError::io(out_dir.display().to_string(), e))?;
    for entry in
        fs::read_dir(&staging).map_err(|e| BuildError::io(staging.display().to_string(), e))?
    {
        let entry = entry.map_err(|e| BuildError::io(staging.display().to_string(), e))?;
        let target = out_dir.join(entry.file_name());
        if target.exists() {
            let _ = fs::remove_file(&target);
        }
        fs::rename(entry.path(), &target)
            .map_err(|e| BuildError::io(target.display().to_string(), e))?;
        let size = fs::metadata(&target).map(|m| m.len()).unwrap_or(0);
        report.files.push((target, size));
    }
    let _ = fs::remove_dir_all(&staging);
    report.files.sort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    fn client_file(path: &str, stmts: Vec<Stmt>) -> SourceFile {
        SourceFile {
            path: path.into(),
            blocks: vec![Block::ClientBlock(ClientBlock {
                name: None,
                body: stmts,
            })],
        }
    }

    #[test]
    fn content_hash_is_12_hex() {
        let hash = content_hash(b"hello");
        assert_eq!(hash.len(), 12);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, content_hash(b"hello"));
    }

    #[test]
    fn shared_only_produces_single_output() {
        let files = vec![SourceFile {
            path: "lib.tova".into(),
            blocks: vec![Block::SharedBlock(SharedBlock {
                body: vec![Stmt::of(StmtKind::Assignment(AssignStmt {
                    targets: vec!["x".into()],
                    values: vec![Expr::num(1.0)],
                }))],
            })],
        }];
        let (output, _) = compile_ast(
            &files,
            "lib",
            &["x = 1".into()],
            &BuildOptions::default(),
        )
        .unwrap();
        let names: Vec<&str> = output.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(names, vec!["lib.shared.js"]);
    }

    #[test]
    fn empty_blocks_emit_no_files() {
        let files = vec![SourceFile {
            path: "app.tova".into(),
            blocks: vec![
                Block::SharedBlock(SharedBlock { body: vec![] }),
                Block::ClientBlock(ClientBlock {
                    name: None,
                    body: vec![],
                }),
            ],
        }];
        let (output, _) =
            compile_ast(&files, "app", &[String::new()], &BuildOptions::default()).unwrap();
        assert!(output.files.is_empty());
    }

    #[test]
    fn duplicate_state_across_files_is_fatal() {
        let state = |line| {
            Stmt::new(
                Loc::new(line, 1),
                StmtKind::StateDeclaration(StateDecl {
                    name: "count".into(),
                    value: Expr::num(0.0),
                }),
            )
        };
        let files = vec![
            client_file("a.tova", vec![state(3)]),
            client_file("b.tova", vec![state(9)]),
        ];
        let errors = compile_ast(
            &files,
            "app",
            &[String::new(), String::new()],
            &BuildOptions::default(),
        )
        .unwrap_err();
        assert_eq!(errors[0].code, "M001");
    }

    #[test]
    fn compilation_is_deterministic() {
        let files = vec![client_file(
            "app.tova",
            vec![Stmt::of(StmtKind::StateDeclaration(StateDecl {
                name: "count".into(),
                value: Expr::num(0.0),
            }))],
        )];
        let options = BuildOptions {
            production: true,
            ..Default::default()
        };
        let run = || {
            let (output, _) = compile_ast(
                &files,
                "app",
                &["state count = 0".into()],
                &options,
            )
            .unwrap();
            output
                .files
                .iter()
                .map(|f| (f.path.clone(), f.content.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn js_files_get_sourcemap_trailer_and_sidecar() {
        let files = vec![client_file(
            "app.tova",
            vec![Stmt::new(
                Loc::new(1, 1),
                StmtKind::StateDeclaration(StateDecl {
                    name: "count".into(),
                    value: Expr::num(0.0),
                }),
            )],
        )];
        let (output, _) = compile_ast(
            &files,
            "app",
            &["state count = 0".into()],
            &BuildOptions::default(),
        )
        .unwrap();
        let client = &output.files[0];
        assert!(client
            .content_str()
            .contains("//# sourceMappingURL=app.client.js.map"));
        let map: serde_json::Value =
            serde_json::from_str(client.map.as_deref().unwrap()).unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["sourcesContent"][0], "state count = 0");
    }

    #[test]
    fn production_hashes_and_emits_index_html() {
        let files = vec![client_file(
            "app.tova",
            vec![Stmt::of(StmtKind::ComponentDeclaration(ComponentDecl {
                name: "App".into(),
                params: vec![],
                body: vec![],
                style: None,
            }))],
        )];
        let options = BuildOptions {
            production: true,
            ..Default::default()
        };
        let (output, _) =
            compile_ast(&files, "app", &[String::new()], &options).unwrap();
        let client = output
            .files
            .iter()
            .find(|f| f.path.starts_with("app.client."))
            .unwrap();
        // app.client.<12 hex>.js
        let middle = client
            .path
            .trim_start_matches("app.client.")
            .trim_end_matches(".js");
        assert_eq!(middle.len(), 12);
        let html = output
            .files
            .iter()
            .find(|f| f.path == "index.html")
            .unwrap();
        assert!(html.content_str().contains(&client.path));
    }

    #[test]
    fn wasm_functions_compile_to_binary_output() {
        let files = vec![SourceFile {
            path: "math.tova".into(),
            blocks: vec![Block::SharedBlock(SharedBlock {
                body: vec![Stmt::of(StmtKind::FunctionDeclaration(FunctionDecl {
                    name: "add".into(),
                    params: vec![Param::typed("a", "Int"), Param::typed("b", "Int")],
                    body: vec![Stmt::of(StmtKind::ReturnStatement(ReturnStmt {
                        value: Some(Expr::binary("+", Expr::ident("a"), Expr::ident("b"))),
                    }))],
                    is_async: false,
                    is_public: false,
                    return_type: Some("Int".into()),
                    is_wasm: true,
                }))],
            })],
        }];
        let (output, _) =
            compile_ast(&files, "math", &[String::new()], &BuildOptions::default()).unwrap();
        let wasm = output.files.iter().find(|f| f.path == "math.wasm").unwrap();
        assert_eq!(&wasm.content[..4], &[0x00, 0x61, 0x73, 0x6D]);
    }

    #[test]
    fn minify_strips_indentation_only() {
        let code = "function f() {\n  return 1;\n}\n\nf();\n";
        assert_eq!(minify_js(code), "function f() {\nreturn 1;\n}\nf();\n");
    }
}
