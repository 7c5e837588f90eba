//! Block grouping and merging: the front half of the pipeline.
//!
//! All source files of one directory are partitioned by block type and
//! label, same-type-same-label blocks are concatenated in filesystem-sorted
//! file order, and duplicate top-level declarations across the merged
//! result are reported as fatal errors naming both sides.

use std::collections::HashMap;

use crate::ast::*;
use crate::error::CompilerError;

/// A statement tagged with the index of its originating file.
#[derive(Debug, Clone)]
pub struct MergedStmt {
    pub source: u32,
    pub stmt: Stmt,
}

/// Same-type, same-label blocks concatenated across files.
#[derive(Debug, Clone, Default)]
pub struct MergedBlock {
    pub label: String,
    pub stmts: Vec<MergedStmt>,
}

/// A merged edge block: concatenated config plus file-tagged body.
#[derive(Debug, Clone)]
pub struct MergedEdge {
    pub label: String,
    pub config: EdgeBlock,
    pub body: Vec<MergedStmt>,
}

/// Merged CLI blocks: config entries plus file-tagged commands.
#[derive(Debug, Clone, Default)]
pub struct MergedCli {
    pub config: Vec<(String, String)>,
    pub commands: Vec<MergedStmt>,
}

/// One directory's merged compilation unit, ready for codegen.
#[derive(Debug, Clone, Default)]
pub struct MergedUnit {
    /// File paths in filesystem-sorted order; `MergedStmt.source` indexes
    /// into this list.
    pub sources: Vec<String>,
    pub shared: Option<MergedBlock>,
    /// Lexical order by label; the unnamed block (label "") sorts first.
    pub servers: Vec<MergedBlock>,
    pub clients: Vec<MergedBlock>,
    pub data: Option<MergedBlock>,
    pub security: Option<SecurityBlock>,
    pub cli: Option<MergedCli>,
    pub edges: Vec<MergedEdge>,
    pub forms: Vec<(u32, FormDeclaration)>,
    pub tests: Vec<MergedBlock>,
    pub deploy: Option<MergedBlock>,
}

impl MergedUnit {
    pub fn source_path(&self, index: u32) -> &str {
        self.sources
            .get(index as usize)
            .map(String::as_str)
            .unwrap_or("<unknown>")
    }
}

/// Merge a directory's files. Files must already be in filesystem-sorted
/// order; statement order within each file is preserved.
pub fn merge_files(files: &[SourceFile]) -> Result<MergedUnit, Vec<CompilerError>> {
    let mut unit = MergedUnit {
        sources: files.iter().map(|f| f.path.clone()).collect(),
        ..MergedUnit::default()
    };

    let mut servers: HashMap<String, MergedBlock> = HashMap::new();
    let mut clients: HashMap<String, MergedBlock> = HashMap::new();
    let mut edges: HashMap<String, MergedEdge> = HashMap::new();
    let mut tests: HashMap<String, MergedBlock> = HashMap::new();

    for (index, file) in files.iter().enumerate() {
        let source = index as u32;
        for block in &file.blocks {
            match block {
                Block::SharedBlock(b) => {
                    append(unit.shared.get_or_insert_with(Default::default), source, &b.body)
                }
                Block::DataBlock(b) => {
                    append(unit.data.get_or_insert_with(Default::default), source, &b.body)
                }
                Block::DeployBlock(b) => append(
                    unit.deploy.get_or_insert_with(Default::default),
                    source,
                    &b.body,
                ),
                Block::ServerBlock(b) => {
                    let label = block.label().to_string();
                    let entry = servers.entry(label.clone()).or_insert_with(|| MergedBlock {
                        label,
                        stmts: vec![],
                    });
                    append(entry, source, &b.body);
                }
                Block::ClientBlock(b) => {
                    let label = block.label().to_string();
                    let entry = clients.entry(label.clone()).or_insert_with(|| MergedBlock {
                        label,
                        stmts: vec![],
                    });
                    append(entry, source, &b.body);
                }
                Block::TestBlock(b) => {
                    let label = block.label().to_string();
                    let entry = tests.entry(label.clone()).or_insert_with(|| MergedBlock {
                        label,
                        stmts: vec![],
                    });
                    append(entry, source, &b.body);
                }
                Block::SecurityBlock(b) => {
                    merge_security(unit.security.get_or_insert_with(Default::default), b)
                }
                Block::CliBlock(b) => {
                    let cli = unit.cli.get_or_insert_with(Default::default);
                    cli.config.extend(b.config.iter().cloned());
                    for stmt in &b.commands {
                        cli.commands.push(MergedStmt {
                            source,
                            stmt: stmt.clone(),
                        });
                    }
                }
                Block::EdgeBlock(b) => {
                    let label = block.label().to_string();
                    let entry = edges.entry(label.clone()).or_insert_with(|| MergedEdge {
                        label,
                        config: EdgeBlock::default(),
                        body: vec![],
                    });
                    merge_edge(entry, source, b);
                }
                Block::FormDeclaration(form) => unit.forms.push((source, form.clone())),
            }
        }
    }

    unit.servers = sorted_by_label(servers);
    unit.clients = sorted_by_label(clients);
    unit.tests = sorted_by_label(tests);
    unit.edges = {
        let mut list: Vec<MergedEdge> = edges.into_values().collect();
        list.sort_by(|a, b| a.label.cmp(&b.label));
        list
    };

    let errors = check_duplicates(&unit);
    if errors.is_empty() {
        Ok(unit)
    } else {
        Err(errors)
    }
}

fn append(block: &mut MergedBlock, source: u32, body: &[Stmt]) {
    for stmt in body {
        block.stmts.push(MergedStmt {
            source,
            stmt: stmt.clone(),
        });
    }
}

fn sorted_by_label(map: HashMap<String, MergedBlock>) -> Vec<MergedBlock> {
    let mut list: Vec<MergedBlock> = map.into_values().collect();
    list.sort_by(|a, b| a.label.cmp(&b.label));
    list
}

fn merge_security(target: &mut SecurityBlock, other: &SecurityBlock) {
    if target.auth.is_none() {
        target.auth = other.auth.clone();
    }
    target.roles.extend(other.roles.iter().cloned());
    target.protect.extend(other.protect.iter().cloned());
    target.sensitive.extend(other.sensitive.iter().cloned());
    if target.csp.is_none() {
        target.csp = other.csp.clone();
    }
    target.csrf = target.csrf || other.csrf;
    target.hsts = target.hsts || other.hsts;
}

fn merge_edge(target: &mut MergedEdge, source: u32, other: &EdgeBlock) {
    let config = &mut target.config;
    if config.name.is_none() {
        config.name = other.name.clone();
    }
    config.target = other.target;
    config.routes.extend(other.routes.iter().cloned());
    config.middlewares.extend(other.middlewares.iter().cloned());
    config.bindings.kv.extend(other.bindings.kv.iter().cloned());
    config.bindings.sql.extend(other.bindings.sql.iter().cloned());
    config
        .bindings
        .storage
        .extend(other.bindings.storage.iter().cloned());
    config
        .bindings
        .queue
        .extend(other.bindings.queue.iter().cloned());
    config.env.extend(other.env.iter().cloned());
    config.secrets.extend(other.secrets.iter().cloned());
    config.cron.extend(other.cron.iter().cloned());
    config.queues.extend(other.queues.iter().cloned());
    if config.health.is_none() {
        config.health = other.health.clone();
    }
    if config.cors.is_none() {
        config.cors = other.cors.clone();
    }
    if config.on_error.is_none() {
        config.on_error = other.on_error.clone();
    }
    for stmt in &other.body {
        target.body.push(MergedStmt {
            source,
            stmt: stmt.clone(),
        });
    }
}

// ---------------------------------------------------------------------------
// Duplicate detection
// ---------------------------------------------------------------------------

/// Declaration namespaces checked for cross-file duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Namespace {
    Component,
    State,
    Function,
    Route,
    Type,
    Model,
}

impl Namespace {
    fn noun(self) -> &'static str {
        match self {
            Namespace::Component => "component",
            Namespace::State => "state",
            Namespace::Function => "function",
            Namespace::Route => "route",
            Namespace::Type => "type",
            Namespace::Model => "model",
        }
    }
}

fn check_duplicates(unit: &MergedUnit) -> Vec<CompilerError> {
    let mut errors = Vec::new();

    if let Some(shared) = &unit.shared {
        check_block(unit, &shared.stmts, false, &mut errors);
    }
    if let Some(data) = &unit.data {
        check_block(unit, &data.stmts, true, &mut errors);
    }
    for server in &unit.servers {
        check_block(unit, &server.stmts, false, &mut errors);
    }
    for client in &unit.clients {
        check_block(unit, &client.stmts, false, &mut errors);
    }
    if let Some(cli) = &unit.cli {
        check_block(unit, &cli.commands, false, &mut errors);
    }
    for edge in &unit.edges {
        check_block(unit, &edge.body, false, &mut errors);
    }

    errors
}

fn check_block(
    unit: &MergedUnit,
    stmts: &[MergedStmt],
    is_data: bool,
    errors: &mut Vec<CompilerError>,
) {
    let mut seen: HashMap<(Namespace, String), (u32, Loc)> = HashMap::new();

    for merged in stmts {
        let entry: Option<(Namespace, String)> = match &merged.stmt.kind {
            StmtKind::FunctionDeclaration(f) => Some((Namespace::Function, f.name.clone())),
            StmtKind::TypeDeclaration(t) => Some((
                if is_data {
                    Namespace::Model
                } else {
                    Namespace::Type
                },
                t.name.clone(),
            )),
            StmtKind::StateDeclaration(s) => Some((Namespace::State, s.name.clone())),
            StmtKind::ComponentDeclaration(c) => Some((Namespace::Component, c.name.clone())),
            StmtKind::RouteDeclaration(r) => {
                Some((Namespace::Route, format!("{} {}", r.method, r.path)))
            }
            _ => None,
        };
        let Some(key) = entry else { continue };

        match seen.get(&key) {
            Some((first_source, first_loc)) => {
                let (ns, name) = &key;
                errors.push(
                    CompilerError::merge(
                        "M001",
                        format!(
                            "Duplicate {} '{}': first declared at {}:{}",
                            ns.noun(),
                            name,
                            unit.source_path(*first_source),
                            first_loc.line,
                        ),
                    )
                    .at(
                        unit.source_path(merged.source),
                        merged.stmt.loc.line,
                        merged.stmt.loc.column,
                    ),
                );
            }
            None => {
                seen.insert(key, (merged.source, merged.stmt.loc));
            }
        }
    }
}

/// Overlay security-block settings with a server block's inline
/// declarations; inline wins per feature.
pub fn overlay_security(block: Option<&SecurityBlock>, inline: Option<&SecurityBlock>) -> SecurityBlock {
    let mut merged = block.cloned().unwrap_or_default();
    if let Some(inline) = inline {
        if inline.auth.is_some() {
            merged.auth = inline.auth.clone();
        }
        if !inline.roles.is_empty() {
            merged.roles = inline.roles.clone();
        }
        if !inline.protect.is_empty() {
            merged.protect = inline.protect.clone();
        }
        if !inline.sensitive.is_empty() {
            merged.sensitive = inline.sensitive.clone();
        }
        if inline.csp.is_some() {
            merged.csp = inline.csp.clone();
        }
        if inline.csrf {
            merged.csrf = true;
        }
        if inline.hsts {
            merged.hsts = true;
        }
    }
    merged
}
