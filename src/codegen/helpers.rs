//! Runtime helper injection.
//!
//! Lowering sets usage flags as it encounters constructs that need runtime
//! support; `emit_used` then appends only the helpers the generated code
//! referenced. Helpers are plain JavaScript snippets appended after the
//! user code in the owning module.

use std::collections::BTreeSet;

use super::writer::CodeWriter;

/// Names the tree-shaken stdlib knows. Identifier references to any of
/// these mark the builtin as used.
pub const BUILTIN_NAMES: &[&str] = &[
    "print", "len", "range", "enumerate", "sum", "sorted", "reversed", "zip", "min", "max",
    "filter", "map", "find", "any", "all", "flat_map", "reduce", "unique", "group_by", "chunk",
    "flatten", "take", "drop", "first", "last", "count", "partition", "abs", "floor", "ceil",
    "round", "sqrt", "clamp", "parse_int", "parse_float", "to_string", "keys", "values",
    "entries", "sleep",
];

/// String methods installed on `String.prototype` by the prototype helper.
pub const STRING_PROTO_NAMES: &[&str] = &[
    "upper", "lower", "contains", "starts_with", "ends_with", "chars", "words", "lines",
    "capitalize", "title_case", "snake_case", "camel_case",
];

/// Per-generator helper usage flags. Reset per output file.
#[derive(Debug, Default)]
pub struct HelperFlags {
    pub contains: bool,
    pub propagate: bool,
    pub result_option: bool,
    pub slice: bool,
    pub string_protos: bool,
    pub builtins: BTreeSet<&'static str>,
}

impl HelperFlags {
    /// Mark an identifier reference; returns true if it named a builtin.
    pub fn mark_builtin(&mut self, name: &str) -> bool {
        if let Some(known) = BUILTIN_NAMES.iter().find(|b| **b == name).copied() {
            self.builtins.insert(known);
            true
        } else {
            false
        }
    }

    pub fn any_used(&self) -> bool {
        self.contains
            || self.propagate
            || self.result_option
            || self.slice
            || self.string_protos
            || !self.builtins.is_empty()
    }

    /// Append every helper the generated code used.
    pub fn emit_used(&self, w: &mut CodeWriter) {
        if !self.any_used() {
            return;
        }
        w.blank();
        w.line("// --- runtime helpers ---");
        if self.string_protos {
            w.raw(STRING_PROTOS_JS);
        }
        if self.result_option {
            w.raw(RESULT_OPTION_JS);
        }
        if self.propagate {
            w.raw(PROPAGATE_JS);
        }
        if self.contains {
            w.raw(CONTAINS_JS);
        }
        if self.slice {
            w.raw(SLICE_JS);
        }
        for name in &self.builtins {
            if let Some((_, js)) = BUILTINS_JS.iter().find(|(n, _)| n == name) {
                w.raw(js);
            }
        }
    }
}

const STRING_PROTOS_JS: &str = r#"(() => {
  const defs = {
    upper() { return this.toUpperCase(); },
    lower() { return this.toLowerCase(); },
    contains(s) { return this.includes(s); },
    starts_with(s) { return this.startsWith(s); },
    ends_with(s) { return this.endsWith(s); },
    chars() { return Array.from(this); },
    words() { return this.trim().split(/\s+/).filter(Boolean); },
    lines() { return this.split("\n"); },
    capitalize() { return this.charAt(0).toUpperCase() + this.slice(1); },
    title_case() { return this.replace(/\b\w/g, (c) => c.toUpperCase()); },
    snake_case() {
      return this.replace(/([a-z0-9])([A-Z])/g, "$1_$2").replace(/[\s-]+/g, "_").toLowerCase();
    },
    camel_case() {
      return this.toLowerCase().replace(/[_\s-]+(\w)/g, (_, c) => c.toUpperCase());
    },
  };
  for (const [name, fn] of Object.entries(defs)) {
    Object.defineProperty(String.prototype, name, { value: fn, configurable: true });
  }
})();"#;

const RESULT_OPTION_JS: &str = r#"const Ok = (value) => Object.freeze({
  __tag: "Ok", value,
  map: (f) => Ok(f(value)),
  mapErr: () => Ok(value),
  flatMap: (f) => f(value),
  unwrap: () => value,
  unwrapOr: () => value,
  expect: () => value,
  isOk: () => true,
  isErr: () => false,
  or: () => Ok(value),
  and: (other) => other,
});
const Err = (error) => Object.freeze({
  __tag: "Err", value: error,
  map: () => Err(error),
  mapErr: (f) => Err(f(error)),
  flatMap: () => Err(error),
  unwrap: () => { throw new Error("Called unwrap on an Err: " + error); },
  unwrapOr: (fallback) => fallback,
  expect: (message) => { throw new Error(message); },
  isOk: () => false,
  isErr: () => true,
  or: (other) => other,
  and: () => Err(error),
});
const Some = (value) => Object.freeze({
  __tag: "Some", value,
  map: (f) => Some(f(value)),
  flatMap: (f) => f(value),
  filter: (p) => (p(value) ? Some(value) : None),
  unwrap: () => value,
  unwrapOr: () => value,
  expect: () => value,
  isSome: () => true,
  isNone: () => false,
  or: () => Some(value),
  and: (other) => other,
});
const None = Object.freeze({
  __tag: "None",
  map: () => None,
  flatMap: () => None,
  filter: () => None,
  unwrap: () => { throw new Error("Called unwrap on None"); },
  unwrapOr: (fallback) => fallback,
  expect: (message) => { throw new Error(message); },
  isSome: () => false,
  isNone: () => true,
  or: (other) => other,
  and: () => None,
});"#;

const PROPAGATE_JS: &str = r#"function __tova_propagate(value) {
  if (value && (value.__tag === "Err" || value.__tag === "None")) {
    throw { __lux_propagate: true, value };
  }
  if (value && (value.__tag === "Ok" || value.__tag === "Some")) {
    return value.value;
  }
  return value;
}"#;

const CONTAINS_JS: &str = r#"function __tova_contains(collection, value) {
  if (collection == null) return false;
  if (typeof collection === "string" || Array.isArray(collection)) {
    return collection.includes(value);
  }
  if (collection instanceof Set || collection instanceof Map) {
    return collection.has(value);
  }
  return Object.prototype.hasOwnProperty.call(collection, value);
}"#;

const SLICE_JS: &str = r#"function __tova_slice(target, start, end, step) {
  const s = step == null ? 1 : step;
  const len = target.length;
  let from = start == null ? (s > 0 ? 0 : len - 1) : start;
  let to = end == null ? (s > 0 ? len : -1) : end;
  if (from < 0) from += len;
  if (to < 0 && end != null) to += len;
  const out = [];
  if (s > 0) {
    for (let i = from; i < to; i += s) out.push(target[i]);
  } else {
    for (let i = from; i > to; i += s) out.push(target[i]);
  }
  return typeof target === "string" ? out.join("") : out;
}"#;

/// The tree-shaken stdlib: `(name, definition)` pairs emitted on demand.
const BUILTINS_JS: &[(&str, &str)] = &[
    ("print", "const print = (...args) => console.log(...args);"),
    (
        "len",
        r#"const len = (x) => {
  if (x == null) return 0;
  if (typeof x === "string" || Array.isArray(x)) return x.length;
  if (x instanceof Map || x instanceof Set) return x.size;
  return Object.keys(x).length;
};"#,
    ),
    (
        "range",
        r#"const range = (start, end, step = 1) => {
  if (end === undefined) { end = start; start = 0; }
  const out = [];
  for (let i = start; step > 0 ? i < end : i > end; i += step) out.push(i);
  return out;
};"#,
    ),
    ("enumerate", "const enumerate = (xs) => xs.map((x, i) => [i, x]);"),
    ("sum", "const sum = (xs) => xs.reduce((a, b) => a + b, 0);"),
    (
        "sorted",
        r#"const sorted = (xs, key) => {
  const out = [...xs];
  out.sort((a, b) => {
    const ka = key ? key(a) : a;
    const kb = key ? key(b) : b;
    return ka < kb ? -1 : ka > kb ? 1 : 0;
  });
  return out;
};"#,
    ),
    ("reversed", "const reversed = (xs) => [...xs].reverse();"),
    (
        "zip",
        r#"const zip = (a, b) => a.slice(0, Math.min(a.length, b.length)).map((x, i) => [x, b[i]]);"#,
    ),
    ("min", "const min = (xs) => xs.reduce((a, b) => (b < a ? b : a));"),
    ("max", "const max = (xs) => xs.reduce((a, b) => (b > a ? b : a));"),
    ("filter", "const filter = (xs, f) => xs.filter(f);"),
    ("map", "const map = (xs, f) => xs.map(f);"),
    ("find", "const find = (xs, f) => xs.find(f);"),
    ("any", "const any = (xs, f) => xs.some(f ?? ((x) => !!x));"),
    ("all", "const all = (xs, f) => xs.every(f ?? ((x) => !!x));"),
    ("flat_map", "const flat_map = (xs, f) => xs.flatMap(f);"),
    (
        "reduce",
        "const reduce = (xs, f, init) => (init === undefined ? xs.reduce(f) : xs.reduce(f, init));",
    ),
    ("unique", "const unique = (xs) => [...new Set(xs)];"),
    (
        "group_by",
        r#"const group_by = (xs, f) => {
  const out = {};
  for (const x of xs) {
    const k = f(x);
    (out[k] = out[k] ?? []).push(x);
  }
  return out;
};"#,
    ),
    (
        "chunk",
        r#"const chunk = (xs, size) => {
  const out = [];
  for (let i = 0; i < xs.length; i += size) out.push(xs.slice(i, i + size));
  return out;
};"#,
    ),
    ("flatten", "const flatten = (xs) => xs.flat();"),
    ("take", "const take = (xs, n) => xs.slice(0, n);"),
    ("drop", "const drop = (xs, n) => xs.slice(n);"),
    ("first", "const first = (xs) => xs[0];"),
    ("last", "const last = (xs) => xs[xs.length - 1];"),
    (
        "count",
        "const count = (xs, f) => (f ? xs.filter(f).length : xs.length);",
    ),
    (
        "partition",
        r#"const partition = (xs, f) => {
  const yes = [];
  const no = [];
  for (const x of xs) (f(x) ? yes : no).push(x);
  return [yes, no];
};"#,
    ),
    ("abs", "const abs = Math.abs;"),
    ("floor", "const floor = Math.floor;"),
    ("ceil", "const ceil = Math.ceil;"),
    ("round", "const round = Math.round;"),
    ("sqrt", "const sqrt = Math.sqrt;"),
    (
        "clamp",
        "const clamp = (x, lo, hi) => Math.min(Math.max(x, lo), hi);",
    ),
    ("parse_int", "const parse_int = (s) => parseInt(s, 10);"),
    ("parse_float", "const parse_float = (s) => parseFloat(s);"),
    ("to_string", "const to_string = (x) => String(x);"),
    ("keys", "const keys = (o) => Object.keys(o);"),
    ("values", "const values = (o) => Object.values(o);"),
    ("entries", "const entries = (o) => Object.entries(o);"),
    (
        "sleep",
        "const sleep = (ms) => new Promise((resolve) => setTimeout(resolve, ms));",
    ),
];
