//! Component-scoped CSS: FNV-1a scope ids and selector rewriting.
//!
//! Each component style block is hashed together with the component name
//! to form a scope id; every selector is suffixed with the matching
//! attribute selector so the styles only reach that component's elements.

const FNV_SEED: u32 = 0x811C9DC5;
const FNV_PRIME: u32 = 0x01000193;

/// 8-hex-char FNV-1a hash of `componentName + ':' + cssBody`.
pub fn scope_hash(component: &str, css: &str) -> String {
    let mut hash = FNV_SEED;
    for byte in component.bytes().chain([b':']).chain(css.bytes()) {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{:08x}", hash)
}

/// The scoping attribute stamped on every element of the component.
pub fn scope_attr(component: &str, css: &str) -> String {
    format!("data-tova-{}", scope_hash(component, css))
}

/// Rewrite a style block so each selector is suffixed with `[attr]`.
/// Keyframe bodies, `from`/`to`/percentage selectors, and `:global(...)`
/// portions are left unscoped.
pub fn scope_css(css: &str, attr: &str) -> String {
    let mut out = String::new();
    let mut buf = String::new();
    let mut keyframes_depth: Option<usize> = None;
    let mut depth = 0usize;
    // Brace depths that opened a rule body (buffered text before `{` was a
    // selector); other text at those depths is declarations.
    let mut body_depths: Vec<usize> = Vec::new();

    for c in css.chars() {
        match c {
            '{' => {
                let header = buf.trim().to_string();
                buf.clear();
                depth += 1;
                if header.starts_with('@') {
                    if header.starts_with("@keyframes") && keyframes_depth.is_none() {
                        keyframes_depth = Some(depth);
                    }
                    out.push_str(&header);
                    out.push_str(" {\n");
                } else if in_declaration_body(&body_depths, depth) {
                    // Nested block inside a rule body (unusual); emit as-is.
                    out.push_str(&header);
                    out.push_str(" {\n");
                } else {
                    let scoped = if keyframes_depth.is_some() {
                        header.clone()
                    } else {
                        scope_selector_list(&header, attr)
                    };
                    out.push_str(&scoped);
                    out.push_str(" {\n");
                    body_depths.push(depth);
                }
            }
            '}' => {
                let decl = buf.trim().to_string();
                if !decl.is_empty() {
                    out.push_str("  ");
                    out.push_str(&decl);
                    out.push('\n');
                }
                buf.clear();
                if body_depths.last() == Some(&depth) {
                    body_depths.pop();
                }
                if keyframes_depth == Some(depth) {
                    keyframes_depth = None;
                }
                depth = depth.saturating_sub(1);
                out.push_str("}\n");
            }
            ';' => {
                buf.push(';');
                let decl = buf.trim().to_string();
                if !decl.is_empty() {
                    out.push_str("  ");
                    out.push_str(&decl);
                    out.push('\n');
                }
                buf.clear();
            }
            _ => buf.push(c),
        }
    }

    out
}

fn in_declaration_body(body_depths: &[usize], depth: usize) -> bool {
    body_depths.last() == Some(&(depth - 1))
}

fn scope_selector_list(header: &str, attr: &str) -> String {
    header
        .split(',')
        .map(|s| scope_selector(s.trim(), attr))
        .collect::<Vec<_>>()
        .join(", ")
}

fn scope_selector(selector: &str, attr: &str) -> String {
    // `from`/`to`/percentages only occur inside keyframes, but be safe.
    if selector == "from" || selector == "to" || selector.ends_with('%') {
        return selector.to_string();
    }
    selector
        .split_whitespace()
        .map(|part| scope_compound(part, attr))
        .collect::<Vec<_>>()
        .join(" ")
}

fn scope_compound(part: &str, attr: &str) -> String {
    // Combinators pass through untouched.
    if part == ">" || part == "+" || part == "~" {
        return part.to_string();
    }
    // `:global(...)` escapes scoping: unwrap and emit verbatim.
    if let Some(inner) = part.strip_prefix(":global(") {
        if let Some(inner) = inner.strip_suffix(')') {
            return inner.to_string();
        }
    }
    // Split off the pseudo-element/pseudo-class chain (first `:` at paren
    // depth zero) and append it after the attribute selector.
    let mut paren_depth = 0usize;
    let mut split_at = part.len();
    for (i, c) in part.char_indices() {
        match c {
            '(' => paren_depth += 1,
            ')' => paren_depth = paren_depth.saturating_sub(1),
            ':' if paren_depth == 0 => {
                split_at = i;
                break;
            }
            _ => {}
        }
    }
    let (base, pseudo) = part.split_at(split_at);
    if base.is_empty() {
        format!("[{}]{}", attr, pseudo)
    } else {
        format!("{}[{}]{}", base, attr, pseudo)
    }
}
