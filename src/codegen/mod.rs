//! Codegen pass: merged Tova AST → JavaScript modules.
//!
//! One `Codegen` context per output file. The base lowering in
//! `expr`/`stmt`/`pattern` is shared by every target; the per-target
//! modules (`shared`, `server`, `client`, `edge`, `cli`, `form`,
//! `security`) drive it and add their own emission.

pub mod writer;
pub mod helpers;
pub mod expr;
pub mod pattern;
pub mod stmt;
pub mod route;
pub mod css;
pub mod shared;
pub mod server;
pub mod client;
pub mod security;
pub mod edge;
pub mod cli;
pub mod form;
pub mod wasm_binary;

use std::collections::{HashMap, HashSet};

use crate::ast::{FieldValidator, Loc};
use crate::scope::ScopeTracker;
use crate::sourcemap::SourceMapBuilder;
use helpers::HelperFlags;
use writer::CodeWriter;

/// A generated file with its path and content. Binary outputs (wasm) carry
/// bytes; text outputs carry UTF-8.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub path: String,
    pub content: Vec<u8>,
    /// Source-map sidecar JSON, when the generator produced mappings.
    pub map: Option<String>,
}

impl GeneratedFile {
    pub fn text(path: impl Into<String>, content: String) -> Self {
        GeneratedFile {
            path: path.into(),
            content: content.into_bytes(),
            map: None,
        }
    }

    pub fn binary(path: impl Into<String>, content: Vec<u8>) -> Self {
        GeneratedFile {
            path: path.into(),
            content,
            map: None,
        }
    }

    pub fn content_str(&self) -> &str {
        std::str::from_utf8(&self.content).unwrap_or("")
    }
}

/// The complete output of the codegen pass for one directory.
#[derive(Debug, Clone, Default)]
pub struct CodegenOutput {
    pub files: Vec<GeneratedFile>,
}

/// One generated JS module plus its mapping table. The orchestrator turns
/// the table into a `.map` sidecar once it has `sourcesContent`.
#[derive(Debug)]
pub struct GeneratedModule {
    pub code: String,
    pub map: SourceMapBuilder,
}

/// Output target a `Codegen` context is lowering for. Client is the only
/// target with expression-level transforms over the base lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Shared,
    Server,
    Client,
    Edge,
    Cli,
    Form,
}

/// Client-side name sets, consulted during expression and statement
/// lowering to transform signal reads and writes.
#[derive(Debug, Default)]
pub struct SignalRegistry {
    pub state: HashSet<String>,
    pub computed: HashSet<String>,
    pub components: HashSet<String>,
    pub stores: HashSet<String>,
}

impl SignalRegistry {
    /// True if reads of `name` must become getter calls.
    pub fn is_signal(&self, name: &str) -> bool {
        self.state.contains(name) || self.computed.contains(name)
    }

    /// `count` → `setCount`.
    pub fn setter_name(name: &str) -> String {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => format!("set{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => "set".into(),
        }
    }
}

/// Per-output-file code generation state. Reset per generator; never shared
/// between directory compilations.
pub struct Codegen {
    pub target: Target,
    pub scope: ScopeTracker,
    pub helpers: HelperFlags,
    /// `variantName → [fieldName, ...]` — physical field layout recorded at
    /// `TypeDeclaration` lowering, consulted by variant patterns.
    pub variant_fields: HashMap<String, Vec<String>>,
    /// `typeName → [(fieldName, validators)]` for server RPC validation and
    /// form validator inheritance.
    pub type_validators: HashMap<String, Vec<(String, Vec<FieldValidator>)>>,
    pub signals: SignalRegistry,
    pub map: SourceMapBuilder,
    /// Index of the file currently being lowered, into `map.sources()`.
    pub source_index: u32,
    /// True inside an async function/lambda/effect body; RPC calls emitted
    /// here get an `await` prefix.
    pub in_async: bool,
    /// Set while lowering statements nested inside expression strings
    /// (match arms, lambda blocks); their writer lines are not final
    /// output lines, so mappings are suppressed.
    pub suppress_map: bool,
    /// Scope attribute of the component currently being lowered, stamped
    /// on every HTML element it renders (client only).
    pub css_scope: Option<String>,
    /// Scoped CSS collected from component style blocks (client only).
    pub collected_css: Vec<String>,
    rpc_memo: HashMap<usize, bool>,
    reads_memo: HashMap<usize, bool>,
    tmp_counter: u32,
}

impl Codegen {
    pub fn new(target: Target) -> Self {
        Codegen {
            target,
            scope: ScopeTracker::new(),
            helpers: HelperFlags::default(),
            variant_fields: HashMap::new(),
            type_validators: HashMap::new(),
            signals: SignalRegistry::default(),
            map: SourceMapBuilder::new(),
            source_index: 0,
            in_async: false,
            suppress_map: false,
            css_scope: None,
            collected_css: Vec::new(),
            rpc_memo: HashMap::new(),
            reads_memo: HashMap::new(),
            tmp_counter: 0,
        }
    }

    /// Deterministic per-generator temporary name.
    pub fn fresh(&mut self, prefix: &str) -> String {
        self.tmp_counter += 1;
        format!("__{}_{}", prefix, self.tmp_counter)
    }

    pub fn is_client(&self) -> bool {
        self.target == Target::Client
    }

    /// Record a statement's source-map entry against the writer's current
    /// output position. Called before the statement's text is written.
    pub fn record_stmt(&mut self, w: &CodeWriter, loc: Loc) {
        if self.suppress_map || loc.line == 0 {
            return;
        }
        self.map.record(
            self.source_index,
            loc.line,
            loc.column,
            w.current_line(),
            w.current_col(),
        );
    }

    pub(crate) fn rpc_memo_get(&self, key: usize) -> Option<bool> {
        self.rpc_memo.get(&key).copied()
    }

    pub(crate) fn rpc_memo_put(&mut self, key: usize, value: bool) {
        self.rpc_memo.insert(key, value);
    }

    pub(crate) fn reads_memo_get(&self, key: usize) -> Option<bool> {
        self.reads_memo.get(&key).copied()
    }

    pub(crate) fn reads_memo_put(&mut self, key: usize, value: bool) {
        self.reads_memo.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setter_name_capitalizes() {
        assert_eq!(SignalRegistry::setter_name("count"), "setCount");
        assert_eq!(SignalRegistry::setter_name("userName"), "setUserName");
    }

    #[test]
    fn record_respects_suppression() {
        let mut cg = Codegen::new(Target::Shared);
        cg.map.add_source("a.tova");
        let w = CodeWriter::new();
        cg.suppress_map = true;
        cg.record_stmt(&w, Loc::new(1, 1));
        assert!(cg.map.is_empty());
        cg.suppress_map = false;
        cg.record_stmt(&w, Loc::new(1, 1));
        assert_eq!(cg.map.mappings().len(), 1);
    }
}
