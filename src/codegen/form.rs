//! Form lowering: per-field signal triples, validator functions, field
//! accessors, groups, arrays, steps, async validators with debounce, and
//! cross-field revalidation.
//!
//! The validator table here is also consulted by server RPC lowering so
//! type-level validators run on both sides of the wire.

use std::collections::HashMap;

use crate::ast::*;
use crate::merge::MergedUnit;

use super::expr::{emit_expr, escape_string, quote_string};
use super::writer::CodeWriter;
use super::{Codegen, GeneratedModule, SignalRegistry, Target};

/// JS failure condition and message for one validator applied to
/// `value_expr`. `Matches` and `Custom` return None: they need form
/// context and are handled by the form emitter.
pub fn validator_condition(
    validator: &FieldValidator,
    value_expr: &str,
) -> Option<(String, String)> {
    let msg = |custom: &Option<String>, fallback: String| {
        custom.clone().unwrap_or(fallback)
    };
    match validator {
        FieldValidator::Required { message } => Some((
            format!("{0} == null || {0} === \"\"", value_expr),
            msg(message, "This field is required".into()),
        )),
        FieldValidator::MinLength { value, message } => Some((
            format!("String({} ?? \"\").length < {}", value_expr, value),
            msg(message, format!("Must be at least {} characters", value)),
        )),
        FieldValidator::MaxLength { value, message } => Some((
            format!("String({} ?? \"\").length > {}", value_expr, value),
            msg(message, format!("Must be at most {} characters", value)),
        )),
        FieldValidator::Min { value, message } => Some((
            format!("Number({}) < {}", value_expr, value),
            msg(message, format!("Must be at least {}", value)),
        )),
        FieldValidator::Max { value, message } => Some((
            format!("Number({}) > {}", value_expr, value),
            msg(message, format!("Must be at most {}", value)),
        )),
        FieldValidator::Pattern { regex, message } => Some((
            format!(
                "!new RegExp({}).test(String({} ?? \"\"))",
                quote_string(regex),
                value_expr
            ),
            msg(message, "Invalid format".into()),
        )),
        FieldValidator::Email { message } => Some((
            format!(
                "!/^[^@\\s]+@[^@\\s]+\\.[^@\\s]+$/.test(String({} ?? \"\"))",
                value_expr
            ),
            msg(message, "Must be a valid email".into()),
        )),
        FieldValidator::Matches { .. }
        | FieldValidator::Custom { .. }
        | FieldValidator::Unknown => None,
    }
}

/// Collect type-level field validators from shared and data blocks for
/// form inheritance.
pub fn collect_type_validators(
    unit: &MergedUnit,
) -> HashMap<String, Vec<(String, Vec<FieldValidator>)>> {
    let mut out = HashMap::new();
    let blocks = unit.shared.iter().chain(unit.data.iter());
    for block in blocks {
        for merged in &block.stmts {
            if let StmtKind::TypeDeclaration(decl) = &merged.stmt.kind {
                let fields: Vec<(String, Vec<FieldValidator>)> = decl
                    .fields
                    .iter()
                    .filter(|f| !f.validators.is_empty())
                    .map(|f| (f.name.clone(), f.validators.clone()))
                    .collect();
                if !fields.is_empty() {
                    out.insert(decl.name.clone(), fields);
                }
            }
        }
    }
    out
}

/// Generate the form module for a directory: one `create<Name>Form`
/// factory per declaration.
pub fn generate(
    forms: &[(u32, FormDeclaration)],
    sources: &[String],
    runtime_import: &str,
    type_validators: &HashMap<String, Vec<(String, Vec<FieldValidator>)>>,
) -> GeneratedModule {
    let mut cg = Codegen::new(Target::Client);
    for source in sources {
        cg.map.add_source(source);
    }
    cg.type_validators = type_validators.clone();

    let mut w = CodeWriter::new();
    w.line(&format!(
        "import {{ createSignal, createComputed, createEffect }} from \"{}\";",
        runtime_import
    ));
    w.blank();

    for (source, form) in forms {
        cg.source_index = *source;
        emit_form(&mut cg, &mut w, form);
        w.blank();
    }

    GeneratedModule {
        code: w.finish(),
        map: cg.map,
    }
}

struct FieldPlan {
    /// Full signal name, group prefix included.
    name: String,
    /// Key in the returned controller (unprefixed).
    key: String,
    group: Option<String>,
    initial: Option<Expr>,
    validators: Vec<FieldValidator>,
    condition: Option<Expr>,
}

fn emit_form(cg: &mut Codegen, w: &mut CodeWriter, form: &FormDeclaration) {
    let fields = plan_fields(cg, form);

    // Field signals are readable from validator conditions and effects.
    let saved_state = std::mem::take(&mut cg.signals.state);
    for field in &fields {
        cg.signals.state.insert(field.name.clone());
    }

    w.block_open(&format!(
        "export function create{}Form()",
        pascal_case(&form.name)
    ));

    for field in &fields {
        emit_field_signals(cg, w, field);
    }
    for field in &fields {
        emit_field_validator_fn(cg, w, field, &fields);
    }
    for field in &fields {
        emit_field_accessor(w, field);
    }
    for field in &fields {
        emit_async_validators(cg, w, field);
        emit_cross_field_effects(w, field, &fields);
    }
    for array in &form.arrays {
        emit_array(cg, w, array);
    }
    if !form.steps.is_empty() {
        emit_steps(w, form, &fields);
    }

    emit_controller_return(w, form, &fields);
    w.block_close();

    cg.signals.state = saved_state;
}

/// Flatten form fields, group fields (prefixed, with the group condition
/// attached), and validators inherited from a backing type.
fn plan_fields(cg: &Codegen, form: &FormDeclaration) -> Vec<FieldPlan> {
    let mut plans: Vec<FieldPlan> = Vec::new();

    // Declared-order list so emission stays deterministic.
    let inherited: &[(String, Vec<FieldValidator>)] = form
        .type_name
        .as_ref()
        .and_then(|t| cg.type_validators.get(t))
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    for field in &form.fields {
        let mut validators = field.validators.clone();
        if let Some((_, extra)) = inherited.iter().find(|(name, _)| *name == field.name) {
            validators.extend(extra.clone());
        }
        plans.push(FieldPlan {
            name: field.name.clone(),
            key: field.name.clone(),
            group: None,
            initial: field.initial.clone(),
            validators,
            condition: None,
        });
    }

    // Type fields the form did not declare still get controllers.
    for (name, validators) in inherited {
        if !form.fields.iter().any(|f| &f.name == name) {
            plans.push(FieldPlan {
                name: name.clone(),
                key: name.clone(),
                group: None,
                initial: None,
                validators: validators.clone(),
                condition: None,
            });
        }
    }

    for group in &form.groups {
        for field in &group.fields {
            plans.push(FieldPlan {
                name: format!("{}_{}", group.name, field.name),
                key: field.name.clone(),
                group: Some(group.name.clone()),
                initial: field.initial.clone(),
                validators: field.validators.clone(),
                condition: group.condition.clone(),
            });
        }
    }

    plans
}

fn emit_field_signals(cg: &mut Codegen, w: &mut CodeWriter, field: &FieldPlan) {
    let initial = match &field.initial {
        Some(expr) => {
            // Initial values are plain data, not signal reads.
            let saved = std::mem::take(&mut cg.signals.state);
            let js = emit_expr(cg, expr);
            cg.signals.state = saved;
            js
        }
        None => "\"\"".into(),
    };
    let name = &field.name;
    w.line(&format!("const __{}_initial = {};", name, initial));
    w.line(&format!(
        "const [{0}, {1}] = createSignal(__{0}_initial);",
        name,
        SignalRegistry::setter_name(name)
    ));
    w.line(&format!(
        "const [{0}Error, set{1}Error] = createSignal(null);",
        name,
        pascal_case(name)
    ));
    w.line(&format!(
        "const [{0}Touched, set{1}Touched] = createSignal(false);",
        name,
        pascal_case(name)
    ));
}

fn emit_field_validator_fn(
    cg: &mut Codegen,
    w: &mut CodeWriter,
    field: &FieldPlan,
    all: &[FieldPlan],
) {
    w.block_open(&format!("function validate_{}(__value)", field.name));

    // Conditional group: skip validation while the condition is false.
    if let Some(condition) = &field.condition {
        let cond_js = emit_expr(cg, condition);
        w.line(&format!("if (!({})) return null;", cond_js));
    }

    for validator in &field.validators {
        if let Some((condition, message)) = validator_condition(validator, "__value") {
            w.line(&format!(
                "if ({}) return \"{}\";",
                condition,
                escape_string(&message)
            ));
        } else if let FieldValidator::Matches { field: other, message } = validator {
            let other_name = all
                .iter()
                .find(|f| f.key == *other && f.group == field.group)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| other.clone());
            let message = message
                .clone()
                .unwrap_or_else(|| format!("Must match {}", other));
            w.line(&format!(
                "if (__value !== {}()) return \"{}\";",
                other_name,
                escape_string(&message)
            ));
        } else if let FieldValidator::Custom { function, is_async } = validator {
            if !is_async {
                let saved = std::mem::take(&mut cg.signals.state);
                let fn_js = emit_expr(cg, function);
                cg.signals.state = saved;
                w.line(&format!(
                    "{{ const __r = ({})(__value); if (__r) return __r; }}",
                    fn_js
                ));
            }
        }
    }

    w.line("return null;");
    w.block_close();
}

fn emit_field_accessor(w: &mut CodeWriter, field: &FieldPlan) {
    let name = &field.name;
    let setter = SignalRegistry::setter_name(name);
    let pascal = pascal_case(name);
    w.block_open(&format!("const __field_{} =", name));
    w.line(&format!("get value() {{ return {}(); }},", name));
    w.line(&format!("get error() {{ return {}Error(); }},", name));
    w.line(&format!("get touched() {{ return {}Touched(); }},", name));
    w.line(&format!(
        "set(__v) {{ {setter}(__v); if ({name}Touched()) set{pascal}Error(validate_{name}(__v)); }},",
    ));
    w.line(&format!(
        "blur() {{ set{pascal}Touched(true); set{pascal}Error(validate_{name}({name}())); }},",
    ));
    w.line(&format!(
        "validate() {{ const __e = validate_{name}({name}()); set{pascal}Error(__e); return __e == null; }},",
    ));
    w.line(&format!(
        "reset() {{ {setter}(__{name}_initial); set{pascal}Error(null); set{pascal}Touched(false); }},",
    ));
    w.block_close_semi();
}

/// `async validate(fn)` → debounced effect with a version counter that
/// discards stale responses.
fn emit_async_validators(cg: &mut Codegen, w: &mut CodeWriter, field: &FieldPlan) {
    let async_validators: Vec<&Expr> = field
        .validators
        .iter()
        .filter_map(|v| match v {
            FieldValidator::Custom { function, is_async: true } => Some(function),
            _ => None,
        })
        .collect();
    if async_validators.is_empty() {
        return;
    }

    let name = &field.name;
    let pascal = pascal_case(name);
    w.line(&format!("let __{}_version = 0;", name));
    w.line(&format!("let __{}_timer = null;", name));
    for function in async_validators {
        let saved = std::mem::take(&mut cg.signals.state);
        let fn_js = emit_expr(cg, function);
        cg.signals.state = saved;
        w.block_open("createEffect(() =>");
        w.line(&format!("const __value = {}();", name));
        w.line(&format!(
            "if (__{}_timer) clearTimeout(__{}_timer);",
            name, name
        ));
        w.line(&format!("const __version = ++__{}_version;", name));
        w.block_open(&format!("__{}_timer = setTimeout(async () =>", name));
        w.line(&format!("const __result = await ({})(__value);", fn_js));
        w.line(&format!(
            "if (__version === __{}_version) set{}Error(__result ?? null);",
            name, pascal
        ));
        w.dedent();
        w.line("}, 300);");
        w.dedent();
        w.line("});");
    }
}

/// `matches password` re-validates this field whenever the source field
/// changes.
fn emit_cross_field_effects(w: &mut CodeWriter, field: &FieldPlan, all: &[FieldPlan]) {
    for validator in &field.validators {
        if let FieldValidator::Matches { field: other, .. } = validator {
            let other_name = all
                .iter()
                .find(|f| f.key == *other && f.group == field.group)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| other.clone());
            let name = &field.name;
            let pascal = pascal_case(name);
            w.block_open("createEffect(() =>");
            w.line(&format!("{}();", other_name));
            w.line(&format!(
                "if ({name}Touched()) set{pascal}Error(validate_{name}({name}()));",
            ));
            w.dedent();
            w.line("});");
        }
    }
}

fn emit_array(cg: &mut Codegen, w: &mut CodeWriter, array: &FormArray) {
    let name = &array.name;
    let pascal = pascal_case(name);
    w.line(&format!("const [{0}, set{1}] = createSignal([]);", name, pascal));

    // Per-item factory: local signals per item field.
    w.block_open(&format!("function __make_{}_item(__init)", name));
    for field in &array.fields {
        let initial = match &field.initial {
            Some(expr) => {
                let saved = std::mem::take(&mut cg.signals.state);
                let js = emit_expr(cg, expr);
                cg.signals.state = saved;
                js
            }
            None => "\"\"".into(),
        };
        let fname = &field.name;
        let fpascal = pascal_case(fname);
        w.line(&format!(
            "const [{0}, set{1}] = createSignal(__init.{0} !== undefined ? __init.{0} : {2});",
            fname, fpascal, initial
        ));
        w.line(&format!(
            "const [{0}Error, set{1}Error] = createSignal(null);",
            fname, fpascal
        ));
    }
    w.block_open("return");
    for field in &array.fields {
        let fname = &field.name;
        let fpascal = pascal_case(fname);
        w.block_open(&format!("{}:", fname));
        w.line(&format!("get value() {{ return {}(); }},", fname));
        w.line(&format!("get error() {{ return {}Error(); }},", fname));
        w.line(&format!("set(__v) {{ set{}(__v); }},", fpascal));
        let checks: Vec<String> = field
            .validators
            .iter()
            .filter_map(|v| validator_condition(v, "__v"))
            .map(|(cond, msg)| {
                format!("if ({}) return \"{}\";", cond, escape_string(&msg))
            })
            .collect();
        w.line(&format!(
            "validate() {{ const __v = {}(); const __e = (() => {{ {} return null; }})(); set{}Error(__e); return __e == null; }},",
            fname,
            checks.join(" "),
            fpascal
        ));
        w.block_close_semi();
    }
    w.block_close_semi();
    w.block_close();

    w.block_open(&format!("const __array_{} =", name));
    w.line(&format!("get items() {{ return {}(); }},", name));
    w.line(&format!(
        "add(__defaults) {{ set{pascal}([...{name}(), __make_{name}_item(__defaults ?? {{}})]); }},",
    ));
    w.line(&format!(
        "remove(__item) {{ set{pascal}({name}().filter((__x) => __x !== __item)); }},",
    ));
    w.line(&format!(
        "move(__from, __to) {{ const __copy = [...{name}()]; const [__x] = __copy.splice(__from, 1); __copy.splice(__to, 0, __x); set{pascal}(__copy); }},",
    ));
    w.block_close_semi();
}

fn emit_steps(w: &mut CodeWriter, form: &FormDeclaration, fields: &[FieldPlan]) {
    w.line("const [currentStep, setCurrentStep] = createSignal(0);");

    let step_lists: Vec<String> = form
        .steps
        .iter()
        .map(|step| {
            let names: Vec<String> = step
                .fields
                .iter()
                .filter(|name| fields.iter().any(|f| &f.name == *name || &f.key == *name))
                .map(|name| {
                    let full = fields
                        .iter()
                        .find(|f| &f.name == name || &f.key == name)
                        .map(|f| f.name.clone())
                        .unwrap_or_else(|| name.clone());
                    format!("[{}, validate_{}]", full, full)
                })
                .collect();
            format!("[{}]", names.join(", "))
        })
        .collect();
    w.line(&format!("const __steps = [{}];", step_lists.join(", ")));
    w.line(&format!("const __stepCount = {};", form.steps.len()));
    w.line("const canNext = createComputed(() => __steps[currentStep()].every(([__get, __check]) => __check(__get()) == null));");
    w.line("const canPrev = createComputed(() => currentStep() > 0);");
    w.line("const progress = createComputed(() => (currentStep() + 1) / __stepCount);");
    w.line("function next() { if (canNext() && currentStep() < __stepCount - 1) setCurrentStep(currentStep() + 1); }");
    w.line("function prev() { if (canPrev()) setCurrentStep(currentStep() - 1); }");
}

fn emit_controller_return(w: &mut CodeWriter, form: &FormDeclaration, fields: &[FieldPlan]) {
    w.block_open("return");

    for field in fields.iter().filter(|f| f.group.is_none()) {
        w.line(&format!("{}: __field_{},", field.key, field.name));
    }
    for group in &form.groups {
        let entries: Vec<String> = fields
            .iter()
            .filter(|f| f.group.as_deref() == Some(group.name.as_str()))
            .map(|f| format!("{}: __field_{}", f.key, f.name))
            .collect();
        w.line(&format!("{}: {{ {} }},", group.name, entries.join(", ")));
    }
    for array in &form.arrays {
        w.line(&format!("{0}: __array_{0},", array.name));
    }
    if !form.steps.is_empty() {
        w.line("get currentStep() { return currentStep(); },");
        w.line("get canNext() { return canNext(); },");
        w.line("get canPrev() { return canPrev(); },");
        w.line("get progress() { return progress(); },");
        w.line("next,");
        w.line("prev,");
    }

    let all_validates: Vec<String> = fields
        .iter()
        .map(|f| format!("__field_{}.validate()", f.name))
        .collect();
    w.line(&format!(
        "validate() {{ return [{}].every(Boolean); }},",
        all_validates.join(", ")
    ));
    let all_resets: Vec<String> = fields
        .iter()
        .map(|f| format!("__field_{}.reset();", f.name))
        .collect();
    w.line(&format!("reset() {{ {} }},", all_resets.join(" ")));

    w.block_close_semi();
}

fn pascal_case(name: &str) -> String {
    name.split('_')
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => format!("{}{}", first.to_ascii_uppercase(), chars.as_str()),
                None => String::new(),
            }
        })
        .collect()
}
