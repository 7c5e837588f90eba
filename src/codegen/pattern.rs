//! Pattern-match lowering: compiles a pattern into a test expression over a
//! subject plus the bindings the arm body sees on match.
//!
//! All match arms compile to inline conditionals; there is no pattern
//! runtime helper.

use crate::ast::{Pattern, Expr};

use super::expr::emit_expr;
use super::Codegen;

/// The lowering of one pattern: a boolean test over the subject expression
/// and `(name, access_path)` bindings established on match.
#[derive(Debug, Clone)]
pub struct PatternLowering {
    pub test: String,
    pub bindings: Vec<(String, String)>,
}

impl PatternLowering {
    fn always(bindings: Vec<(String, String)>) -> Self {
        PatternLowering {
            test: "true".into(),
            bindings,
        }
    }
}

/// Lower `pattern` against the subject expression `subject`.
pub fn lower_pattern(cg: &mut Codegen, pattern: &Pattern, subject: &str) -> PatternLowering {
    match pattern {
        Pattern::LiteralPattern { value } => PatternLowering {
            test: format!("{} === {}", subject, emit_expr(cg, value)),
            bindings: vec![],
        },
        Pattern::RangePattern {
            start,
            end,
            inclusive,
        } => {
            let lo = emit_expr(cg, start);
            let hi = emit_expr(cg, end);
            let cmp = if *inclusive { "<=" } else { "<" };
            PatternLowering {
                test: format!("({0} >= {1} && {0} {2} {3})", subject, lo, cmp, hi),
                bindings: vec![],
            }
        }
        Pattern::VariantPattern { name, fields } => {
            let mut tests = vec![format!("{}?.__tag === \"{}\"", subject, name)];
            let mut bindings = Vec::new();
            // Physical field layout recorded when the TypeDeclaration was
            // lowered; a pattern binding's position selects the field.
            let layout = cg.variant_fields.get(name).cloned();
            for (i, sub) in fields.iter().enumerate() {
                let field_name = match &layout {
                    Some(fields) if i < fields.len() => fields[i].clone(),
                    _ => match sub {
                        Pattern::BindingPattern { name } => name.clone(),
                        _ => format!("_{}", i),
                    },
                };
                let path = format!("{}.{}", subject, field_name);
                let lowered = lower_pattern(cg, sub, &path);
                if lowered.test != "true" {
                    tests.push(lowered.test);
                }
                bindings.extend(lowered.bindings);
            }
            PatternLowering {
                test: tests.join(" && "),
                bindings,
            }
        }
        Pattern::ArrayPattern { elements } => {
            let mut tests = vec![
                format!("Array.isArray({})", subject),
                format!("{}.length === {}", subject, elements.len()),
            ];
            let mut bindings = Vec::new();
            for (i, sub) in elements.iter().enumerate() {
                let path = format!("{}[{}]", subject, i);
                let lowered = lower_pattern(cg, sub, &path);
                if lowered.test != "true" {
                    tests.push(lowered.test);
                }
                bindings.extend(lowered.bindings);
            }
            PatternLowering {
                test: tests.join(" && "),
                bindings,
            }
        }
        Pattern::ObjectPattern { fields } => {
            let mut tests = vec![format!("{} != null", subject)];
            let mut bindings = Vec::new();
            for field in fields {
                let path = format!("{}.{}", subject, field.key);
                match &field.pattern {
                    Some(sub) => {
                        let lowered = lower_pattern(cg, sub, &path);
                        if lowered.test != "true" {
                            tests.push(lowered.test);
                        }
                        bindings.extend(lowered.bindings);
                    }
                    None => bindings.push((field.key.clone(), path)),
                }
            }
            PatternLowering {
                test: tests.join(" && "),
                bindings,
            }
        }
        Pattern::StringConcatPattern { prefix, rest } => {
            let quoted = super::expr::quote_string(prefix);
            PatternLowering {
                test: format!(
                    "typeof {0} === \"string\" && {0}.startsWith({1})",
                    subject, quoted
                ),
                bindings: vec![(
                    rest.clone(),
                    format!("{}.slice({})", subject, prefix.chars().count()),
                )],
            }
        }
        Pattern::WildcardPattern => PatternLowering::always(vec![]),
        Pattern::BindingPattern { name } => {
            PatternLowering::always(vec![(name.clone(), subject.to_string())])
        }
        // Malformed pattern: match everything, the analyzer already spoke.
        Pattern::Unknown => PatternLowering::always(vec![]),
    }
}

/// True when the pattern matches unconditionally (default arm candidates).
pub fn is_irrefutable(pattern: &Pattern) -> bool {
    matches!(
        pattern,
        Pattern::WildcardPattern | Pattern::BindingPattern { .. } | Pattern::Unknown
    )
}
