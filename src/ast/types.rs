//! AST type definitions for the Tova compiler.
//!
//! A Tova source file is a sequence of named blocks (shared, server, client,
//! cli, edge, form, security, ...). Block bodies are statement lists; the
//! statement/expression/pattern families below are the language-agnostic
//! surface every code generator lowers from. The AST is immutable from
//! parser output through emission.

use serde::{Deserialize, Serialize};

// =============================================================================
// SOURCE LOCATIONS
// =============================================================================

/// 1-based source position attached to every statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loc {
    pub line: u32,
    pub column: u32,
}

impl Loc {
    pub fn new(line: u32, column: u32) -> Self {
        Loc { line, column }
    }
}

// =============================================================================
// SOURCE FILES & PROGRAMS
// =============================================================================

/// One parsed source file: its path plus the top-level blocks it declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub blocks: Vec<Block>,
}

// =============================================================================
// BLOCKS
// =============================================================================

/// A top-level region of source annotated with one of the reserved block
/// names, optionally labelled (`server "auth" { ... }`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Block {
    SharedBlock(SharedBlock),
    ServerBlock(ServerBlock),
    ClientBlock(ClientBlock),
    DataBlock(DataBlock),
    SecurityBlock(SecurityBlock),
    CliBlock(CliBlock),
    EdgeBlock(EdgeBlock),
    FormDeclaration(FormDeclaration),
    DeployBlock(DeployBlock),
    TestBlock(TestBlock),
}

impl Block {
    /// The label used to merge same-type blocks across files. Unnamed blocks
    /// merge under the empty label.
    pub fn label(&self) -> &str {
        match self {
            Block::ServerBlock(b) => b.name.as_deref().unwrap_or(""),
            Block::ClientBlock(b) => b.name.as_deref().unwrap_or(""),
            Block::EdgeBlock(b) => b.name.as_deref().unwrap_or(""),
            Block::TestBlock(b) => b.name.as_deref().unwrap_or(""),
            Block::FormDeclaration(f) => &f.name,
            _ => "",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedBlock {
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerBlock {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientBlock {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

/// Data models. Shares the `type`/`model` declaration namespace with shared
/// blocks for duplicate detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataBlock {
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployBlock {
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestBlock {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

// =============================================================================
// SECURITY BLOCK
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityBlock {
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub roles: Vec<RoleDecl>,
    #[serde(default)]
    pub protect: Vec<ProtectRule>,
    #[serde(default)]
    pub sensitive: Vec<SensitiveRule>,
    #[serde(default)]
    pub csp: Option<CspConfig>,
    #[serde(default)]
    pub csrf: bool,
    #[serde(default)]
    pub hsts: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret source: an env var name, or a hardcoded literal (flagged by
    /// the analyzer).
    pub secret: SecretSource,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub expiry_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SecretSource {
    Env { name: String },
    Literal { value: String },
}

impl Default for SecretSource {
    fn default() -> Self {
        SecretSource::Env {
            name: "AUTH_SECRET".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDecl {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// `protect "/admin/**" require admin`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectRule {
    pub pattern: String,
    #[serde(default)]
    pub require: Option<String>,
}

/// `sensitive User { password, ssn }` — fields stripped by auto-sanitization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitiveRule {
    pub type_name: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CspConfig {
    /// Directive name → source list, e.g. `("script-src", "'self'")`.
    #[serde(default)]
    pub directives: Vec<(String, String)>,
}

// =============================================================================
// CLI BLOCK
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliBlock {
    /// Raw config entries as written; known keys are name/version/description.
    #[serde(default)]
    pub config: Vec<(String, String)>,
    /// Command bodies — each a `FunctionDeclaration` statement.
    #[serde(default)]
    pub commands: Vec<Stmt>,
}

impl CliBlock {
    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.config
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// =============================================================================
// EDGE BLOCK
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeBlock {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target: EdgeTarget,
    #[serde(default)]
    pub routes: Vec<RouteDecl>,
    /// User functions and top-level statements.
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub middlewares: Vec<MiddlewareDecl>,
    #[serde(default)]
    pub bindings: EdgeBindings,
    #[serde(default)]
    pub env: Vec<EnvDecl>,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub cron: Vec<CronDecl>,
    #[serde(default)]
    pub queues: Vec<QueueConsumer>,
    #[serde(default)]
    pub health: Option<HealthConfig>,
    #[serde(default)]
    pub cors: Option<CorsConfig>,
    /// Name of a user function in `body` invoked from dispatch catch blocks.
    #[serde(default)]
    pub on_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeTarget {
    #[default]
    Cloudflare,
    Deno,
    Vercel,
    Lambda,
    Bun,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareDecl {
    pub name: String,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeBindings {
    #[serde(default)]
    pub kv: Vec<NamedBinding>,
    #[serde(default)]
    pub sql: Vec<NamedBinding>,
    #[serde(default)]
    pub storage: Vec<NamedBinding>,
    #[serde(default)]
    pub queue: Vec<NamedBinding>,
}

impl EdgeBindings {
    pub fn is_empty(&self) -> bool {
        self.kv.is_empty() && self.sql.is_empty() && self.storage.is_empty() && self.queue.is_empty()
    }
}

/// A binding variable plus the platform resource it maps to
/// (KV namespace, D1 database, R2 bucket, queue name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedBinding {
    pub name: String,
    #[serde(default)]
    pub resource: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvDecl {
    pub name: String,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronDecl {
    pub schedule: String,
    /// Name of the user function to invoke.
    pub handler: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConsumer {
    pub queue: String,
    pub handler: String,
    #[serde(default)]
    pub batch_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    pub path: String,
    #[serde(default)]
    pub memory: bool,
}

/// Empty `origins` means wildcard CORS.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub origins: Vec<String>,
}

// =============================================================================
// FORM DECLARATION
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormDeclaration {
    pub name: String,
    /// `form checkout: Order` inherits the type's field validators.
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub fields: Vec<FormField>,
    #[serde(default)]
    pub groups: Vec<FormGroup>,
    #[serde(default)]
    pub arrays: Vec<FormArray>,
    #[serde(default)]
    pub steps: Vec<FormStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(default)]
    pub initial: Option<Expr>,
    #[serde(default)]
    pub validators: Vec<FieldValidator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FieldValidator {
    Required {
        #[serde(default)]
        message: Option<String>,
    },
    MinLength {
        value: u32,
        #[serde(default)]
        message: Option<String>,
    },
    MaxLength {
        value: u32,
        #[serde(default)]
        message: Option<String>,
    },
    Min {
        value: f64,
        #[serde(default)]
        message: Option<String>,
    },
    Max {
        value: f64,
        #[serde(default)]
        message: Option<String>,
    },
    Pattern {
        regex: String,
        #[serde(default)]
        message: Option<String>,
    },
    Email {
        #[serde(default)]
        message: Option<String>,
    },
    /// Cross-field equality, e.g. `matches password`.
    Matches {
        field: String,
        #[serde(default)]
        message: Option<String>,
    },
    /// `validate(fn)` / `async validate(fn)`.
    Custom {
        function: Expr,
        #[serde(default)]
        is_async: bool,
    },

    /// Unrecognised validator name; reported by the analyzer, skipped by
    /// codegen.
    #[serde(other)]
    Unknown,
}

/// `group shipping when needs_shipping { ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormGroup {
    pub name: String,
    #[serde(default)]
    pub condition: Option<Expr>,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormArray {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormStep {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

// =============================================================================
// STATEMENTS
// =============================================================================

/// A statement with its source location. The location is what the source-map
/// builder records before the statement's text is emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(default)]
    pub loc: Loc,
    #[serde(flatten)]
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(loc: Loc, kind: StmtKind) -> Self {
        Stmt { loc, kind }
    }

    /// Location-free constructor for tests and synthesized statements.
    pub fn of(kind: StmtKind) -> Self {
        Stmt {
            loc: Loc::default(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StmtKind {
    Assignment(AssignStmt),
    VarDeclaration(VarDecl),
    LetDestructure(LetDestructure),
    FunctionDeclaration(FunctionDecl),
    TypeDeclaration(TypeDecl),
    ImportDeclaration(ImportDecl),
    IfStatement(IfStmt),
    ForStatement(ForStmt),
    WhileStatement(WhileStmt),
    TryCatchStatement(TryCatchStmt),
    ReturnStatement(ReturnStmt),
    BlockStatement(BlockStmt),
    CompoundAssignment(CompoundAssign),
    GuardStatement(GuardStmt),
    InterfaceDeclaration(InterfaceDecl),
    BreakStatement,
    ContinueStatement,
    ExpressionStatement(ExprStmt),

    // Client-only declarations.
    StateDeclaration(StateDecl),
    ComputedDeclaration(ComputedDecl),
    EffectDeclaration(EffectDecl),
    ComponentDeclaration(ComponentDecl),
    StoreDeclaration(StoreDecl),

    // Server-only declarations.
    RouteDeclaration(RouteDecl),
    DiscoverDeclaration(DiscoverDecl),

    /// Forward-compatibility catch-all; lowered to a commented placeholder.
    #[serde(other)]
    Unknown,
}

/// `x = v` or `a, b = f()`. Immutable binding on first sight of the target,
/// reassignment afterwards. The wildcard target `_` discards the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignStmt {
    pub targets: Vec<String>,
    pub values: Vec<Expr>,
}

/// `var x = v` — always a mutable binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDecl {
    pub targets: Vec<String>,
    pub values: Vec<Expr>,
}

/// `let {a, b} = obj` / `let [x, y] = arr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LetDestructure {
    pub pattern: Pattern,
    pub value: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub return_type: Option<String>,
    /// `@wasm` — compiled by the WebAssembly emitter instead of the JS one.
    #[serde(default)]
    pub is_wasm: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub type_annotation: Option<String>,
    #[serde(default)]
    pub default: Option<Expr>,
    /// Destructuring parameter, e.g. `fn draw({x, y})`.
    #[serde(default)]
    pub pattern: Option<Pattern>,
    /// CLI flag parameter (`--loud`).
    #[serde(default)]
    pub is_flag: bool,
}

impl Param {
    pub fn simple(name: &str) -> Self {
        Param {
            name: name.into(),
            type_annotation: None,
            default: None,
            pattern: None,
            is_flag: false,
        }
    }

    pub fn typed(name: &str, ty: &str) -> Self {
        Param {
            name: name.into(),
            type_annotation: Some(ty.into()),
            default: None,
            pattern: None,
            is_flag: false,
        }
    }
}

/// `type Shape { Circle(r: Float), Rectangle(w, h) }` (tagged sum) or
/// `type User { name: String, age: Int }` (struct shape, no variants).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    #[serde(default)]
    pub variants: Vec<TypeVariant>,
    /// Struct-shape fields; empty when `variants` is non-empty.
    #[serde(default)]
    pub fields: Vec<TypeField>,
    #[serde(default)]
    pub derive: Vec<String>,
}

impl TypeDecl {
    pub fn is_sum(&self) -> bool {
        !self.variants.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeVariant {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<TypeField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeField {
    pub name: String,
    #[serde(default)]
    pub type_annotation: Option<String>,
    /// Per-field validators, shared by server RPC validation and forms.
    #[serde(default)]
    pub validators: Vec<FieldValidator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDecl {
    #[serde(default)]
    pub names: Vec<String>,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfStmt {
    pub condition: Expr,
    #[serde(default)]
    pub consequent: Vec<Stmt>,
    #[serde(default)]
    pub alternates: Vec<ElifClause>,
    #[serde(default)]
    pub else_body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElifClause {
    pub condition: Expr,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForStmt {
    pub variables: Vec<String>,
    pub iterable: Expr,
    #[serde(default)]
    pub body: Vec<Stmt>,
    /// Runs when the iterable was empty.
    #[serde(default)]
    pub else_body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhileStmt {
    pub condition: Expr,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryCatchStmt {
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub catch_param: Option<String>,
    #[serde(default)]
    pub catch_body: Vec<Stmt>,
    #[serde(default)]
    pub finally_body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnStmt {
    #[serde(default)]
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockStmt {
    #[serde(default)]
    pub body: Vec<Stmt>,
}

/// `x += v` and friends. The target may be an identifier or member access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompoundAssign {
    pub target: Expr,
    pub operator: String,
    pub value: Expr,
}

/// `guard cond else { ... }` — else body must exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardStmt {
    pub condition: Expr,
    #[serde(default)]
    pub else_body: Vec<Stmt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    #[serde(default)]
    pub members: Vec<InterfaceMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceMember {
    pub name: String,
    #[serde(default)]
    pub type_annotation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExprStmt {
    pub expression: Expr,
}

/// `state count = 0` — reactive signal declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDecl {
    pub name: String,
    pub value: Expr,
}

/// `computed doubled = count * 2`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedDecl {
    pub name: String,
    pub value: Expr,
}

/// `effect { ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectDecl {
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    /// The component's scoped style block, raw CSS.
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDecl {
    pub name: String,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

/// `route GET "/api/users/:id" => handler`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecl {
    pub method: String,
    pub path: String,
    pub handler: Expr,
}

/// `discover "billing" at "http://billing.internal:3001"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverDecl {
    pub name: String,
    pub url: String,
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    NumberLiteral {
        value: f64,
    },
    StringLiteral {
        value: String,
    },
    BooleanLiteral {
        value: bool,
    },
    NilLiteral,
    TemplateLiteral {
        parts: Vec<TemplatePart>,
    },
    Identifier {
        name: String,
    },
    BinaryExpression {
        operator: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryExpression {
        operator: String,
        operand: Box<Expr>,
    },
    /// `and` / `or`.
    LogicalExpression {
        operator: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a < b <= c` — operands.len() == operators.len() + 1.
    ChainedComparison {
        operands: Vec<Expr>,
        operators: Vec<String>,
    },
    /// `x in xs` / `x not in xs`.
    MembershipExpression {
        value: Box<Expr>,
        collection: Box<Expr>,
        #[serde(default)]
        negated: bool,
    },
    CallExpression {
        callee: Box<Expr>,
        #[serde(default)]
        arguments: Vec<Expr>,
    },
    /// `f(to: addr)` — only valid in call argument position.
    NamedArgument {
        name: String,
        value: Box<Expr>,
    },
    MemberExpression {
        object: Box<Expr>,
        property: Box<Expr>,
        #[serde(default)]
        computed: bool,
    },
    OptionalChain {
        object: Box<Expr>,
        property: String,
    },
    /// `x |> f(a)`.
    PipeExpression {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    LambdaExpression {
        #[serde(default)]
        params: Vec<Param>,
        body: LambdaBody,
        #[serde(default)]
        is_async: bool,
    },
    MatchExpression {
        subject: Box<Expr>,
        arms: Vec<MatchArm>,
    },
    IfExpression {
        condition: Box<Expr>,
        then_branch: BodyExpr,
        else_branch: BodyExpr,
    },
    ArrayLiteral {
        #[serde(default)]
        elements: Vec<Expr>,
    },
    ObjectLiteral {
        #[serde(default)]
        properties: Vec<ObjectProp>,
    },
    ListComprehension {
        expression: Box<Expr>,
        variable: String,
        iterable: Box<Expr>,
        #[serde(default)]
        condition: Option<Box<Expr>>,
    },
    DictComprehension {
        key: Box<Expr>,
        value: Box<Expr>,
        variable: String,
        iterable: Box<Expr>,
        #[serde(default)]
        condition: Option<Box<Expr>>,
    },
    /// `a..b` (exclusive) / `a..=b` (inclusive).
    RangeExpression {
        start: Box<Expr>,
        end: Box<Expr>,
        #[serde(default)]
        inclusive: bool,
    },
    SliceExpression {
        object: Box<Expr>,
        #[serde(default)]
        start: Option<Box<Expr>>,
        #[serde(default)]
        end: Option<Box<Expr>>,
        #[serde(default)]
        step: Option<Box<Expr>>,
    },
    SpreadExpression {
        argument: Box<Expr>,
    },
    /// `expr?` — unwrap or propagate Err/None to the enclosing function.
    PropagateExpression {
        argument: Box<Expr>,
    },
    AwaitExpression {
        argument: Box<Expr>,
    },
    JSXElement(JsxElement),
    JSXFragment {
        #[serde(default)]
        children: Vec<JsxChild>,
    },

    /// Forward-compatibility catch-all; lowered to a commented placeholder.
    #[serde(other)]
    Unknown,
}

/// A branch of an `if` expression: a bare expression or a statement block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BodyExpr {
    Expr { expression: Box<Expr> },
    Block { body: Vec<Stmt> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LambdaBody {
    Expr { expression: Box<Expr> },
    Block { body: Vec<Stmt> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TemplatePart {
    Text { value: String },
    Interp { expression: Expr },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectProp {
    pub key: String,
    pub value: Expr,
    #[serde(default)]
    pub shorthand: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    #[serde(default)]
    pub guard: Option<Expr>,
    pub body: MatchArmBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatchArmBody {
    Expr { expression: Expr },
    Block { body: Vec<Stmt> },
}

// =============================================================================
// JSX
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsxElement {
    pub tag: String,
    #[serde(default)]
    pub attributes: Vec<JsxAttr>,
    #[serde(default)]
    pub children: Vec<JsxChild>,
}

impl JsxElement {
    /// Component tags start with an uppercase letter.
    pub fn is_component(&self) -> bool {
        self.tag.chars().next().is_some_and(|c| c.is_ascii_uppercase())
    }
}

/// Attribute name as written, directives included: `value`, `bind:value`,
/// `on:click.prevent`, `class:active`, `use:tooltip`, `in:fade`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsxAttr {
    pub name: String,
    /// None for bare boolean attributes (`<input disabled>`).
    #[serde(default)]
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsxChild {
    Element(JsxElement),
    Text {
        value: String,
    },
    ExprChild {
        expression: Expr,
    },
    /// `for item in items key={item.id} { ... }`.
    For {
        variables: Vec<String>,
        iterable: Expr,
        #[serde(default)]
        key: Option<Expr>,
        #[serde(default)]
        body: Vec<JsxChild>,
    },
    /// `if cond { ... } elif other { ... } else { ... }`.
    If {
        branches: Vec<JsxIfBranch>,
        #[serde(default)]
        else_children: Option<Vec<JsxChild>>,
    },
    Match {
        subject: Expr,
        arms: Vec<JsxMatchArm>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsxIfBranch {
    pub condition: Expr,
    #[serde(default)]
    pub children: Vec<JsxChild>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsxMatchArm {
    pub pattern: Pattern,
    #[serde(default)]
    pub guard: Option<Expr>,
    #[serde(default)]
    pub children: Vec<JsxChild>,
}

// =============================================================================
// PATTERNS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Pattern {
    LiteralPattern {
        value: Expr,
    },
    RangePattern {
        start: Expr,
        end: Expr,
        #[serde(default)]
        inclusive: bool,
    },
    /// `Circle(r)` — sub-patterns bind against the variant's declared fields.
    VariantPattern {
        name: String,
        #[serde(default)]
        fields: Vec<Pattern>,
    },
    ArrayPattern {
        #[serde(default)]
        elements: Vec<Pattern>,
    },
    ObjectPattern {
        #[serde(default)]
        fields: Vec<ObjectPatternField>,
    },
    /// `"user:" + rest`.
    StringConcatPattern {
        prefix: String,
        rest: String,
    },
    WildcardPattern,
    BindingPattern {
        name: String,
    },

    /// Malformed or unrecognised pattern; matches everything so the
    /// analyzer's earlier report stands alone.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectPatternField {
    pub key: String,
    /// None binds the key name itself.
    #[serde(default)]
    pub pattern: Option<Box<Pattern>>,
}

// =============================================================================
// EXPRESSION CONSTRUCTORS
// =============================================================================

impl Expr {
    pub fn num(value: f64) -> Self {
        Expr::NumberLiteral { value }
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::StringLiteral {
            value: value.into(),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Expr::BooleanLiteral { value }
    }

    pub fn nil() -> Self {
        Expr::NilLiteral
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier { name: name.into() }
    }

    pub fn binary(op: &str, left: Expr, right: Expr) -> Self {
        Expr::BinaryExpression {
            operator: op.into(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(callee: Expr, arguments: Vec<Expr>) -> Self {
        Expr::CallExpression {
            callee: Box::new(callee),
            arguments,
        }
    }

    pub fn member(object: Expr, property: &str) -> Self {
        Expr::MemberExpression {
            object: Box::new(object),
            property: Box::new(Expr::ident(property)),
            computed: false,
        }
    }

    /// `server.<name>(args)` — the shape the RPC detector recognises.
    pub fn rpc_call(name: &str, arguments: Vec<Expr>) -> Self {
        Expr::call(Expr::member(Expr::ident("server"), name), arguments)
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expr::Identifier { name } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stmt_roundtrips_with_loc() {
        let stmt = Stmt::new(
            Loc::new(3, 5),
            StmtKind::ReturnStatement(ReturnStmt {
                value: Some(Expr::num(1.0)),
            }),
        );
        let json = serde_json::to_string(&stmt).unwrap();
        let back: Stmt = serde_json::from_str(&json).unwrap();
        assert_eq!(back.loc, Loc::new(3, 5));
        assert!(matches!(back.kind, StmtKind::ReturnStatement(_)));
    }

    #[test]
    fn expr_tags_deserialize_by_name() {
        let json = r#"{"type": "MembershipExpression",
                       "value": {"type": "Identifier", "name": "x"},
                       "collection": {"type": "Identifier", "name": "xs"},
                       "negated": true}"#;
        let expr: Expr = serde_json::from_str(json).unwrap();
        assert!(matches!(expr, Expr::MembershipExpression { negated: true, .. }));
    }

    #[test]
    fn component_tag_detection() {
        let upper = JsxElement {
            tag: "Card".into(),
            attributes: vec![],
            children: vec![],
        };
        let lower = JsxElement {
            tag: "div".into(),
            attributes: vec![],
            children: vec![],
        };
        assert!(upper.is_component());
        assert!(!lower.is_component());
    }

    #[test]
    fn edge_block_defaults() {
        let json = r#"{"type": "EdgeBlock"}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        let Block::EdgeBlock(edge) = block else {
            panic!("expected edge block");
        };
        assert_eq!(edge.target, EdgeTarget::Cloudflare);
        assert!(edge.bindings.is_empty());
    }
}
