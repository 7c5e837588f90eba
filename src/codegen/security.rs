//! Security lowering: HS256 JWT verification, role checks, protect-pattern
//! matching, response auto-sanitization, CSP/CSRF/HSTS headers, and the
//! client token injector.
//!
//! Consumed by the edge generator (and appended to server/client outputs by
//! the build orchestrator when a security block is present).

use crate::ast::*;

use super::expr::{escape_string, quote_string};
use super::writer::CodeWriter;

/// Compile a protect glob into regex source: `**` crosses segments, `*`
/// stays within one, everything else is escaped.
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '*' {
            if i + 1 < chars.len() && chars[i + 1] == '*' {
                out.push_str(".*");
                i += 2;
                continue;
            }
            out.push_str("[^/]*");
        } else if "\\^$.|?+()[]{}".contains(c) {
            out.push('\\');
            out.push(c);
        } else {
            out.push(c);
        }
        i += 1;
    }
    out.push('$');
    out
}

/// Emit the security support functions. `secret_expr` is the host-specific
/// expression the auth secret is read from.
pub fn emit_security_support(w: &mut CodeWriter, sec: &SecurityBlock, secret_expr: &str) {
    if let Some(auth) = &sec.auth {
        let secret = match &auth.secret {
            SecretSource::Env { name } => secret_expr.replace("{name}", name),
            // Hardcoded secrets are flagged by the analyzer but still work.
            SecretSource::Literal { value } => quote_string(value),
        };
        w.line(&format!("const __authSecret = {};", secret));
        w.raw(VERIFY_TOKEN_JS);
        w.blank();
    }

    if !sec.roles.is_empty() {
        let entries: Vec<String> = sec
            .roles
            .iter()
            .map(|role| {
                let perms: Vec<String> =
                    role.permissions.iter().map(|p| quote_string(p)).collect();
                format!("{}: [{}]", role.name, perms.join(", "))
            })
            .collect();
        w.line(&format!("const __roles = {{ {} }};", entries.join(", ")));
        w.raw(HAS_ROLE_JS);
        w.blank();
    }

    if !sec.protect.is_empty() {
        let entries: Vec<String> = sec
            .protect
            .iter()
            .map(|rule| {
                let require = match &rule.require {
                    Some(role) => quote_string(role),
                    None => "null".into(),
                };
                format!(
                    "{{ pattern: new RegExp(\"{}\"), require: {} }}",
                    escape_string(&glob_to_regex(&rule.pattern)),
                    require
                )
            })
            .collect();
        w.line(&format!("const __protected = [{}];", entries.join(", ")));
        w.raw(MATCH_PROTECTED_JS);
        w.blank();
    }

    if !sec.sensitive.is_empty() {
        let entries: Vec<String> = sec
            .sensitive
            .iter()
            .map(|rule| {
                let fields: Vec<String> =
                    rule.fields.iter().map(|f| quote_string(f)).collect();
                format!("{}: [{}]", rule.type_name, fields.join(", "))
            })
            .collect();
        w.line(&format!(
            "const __sensitiveFields = {{ {} }};",
            entries.join(", ")
        ));
        w.raw(SANITIZE_JS);
        w.blank();
    }

    emit_security_headers(w, sec);

    if sec.csrf {
        w.raw(CSRF_JS);
        w.blank();
    }
}

fn emit_security_headers(w: &mut CodeWriter, sec: &SecurityBlock) {
    let mut entries: Vec<String> = Vec::new();
    if let Some(csp) = &sec.csp {
        let directives: Vec<String> = csp
            .directives
            .iter()
            .map(|(name, value)| format!("{} {}", name, value))
            .collect();
        let header = if directives.is_empty() {
            "default-src 'self'".to_string()
        } else {
            directives.join("; ")
        };
        entries.push(format!(
            "\"Content-Security-Policy\": \"{}\"",
            escape_string(&header)
        ));
    }
    if sec.hsts {
        entries.push(
            "\"Strict-Transport-Security\": \"max-age=31536000; includeSubDomains\"".into(),
        );
    }
    if !entries.is_empty() {
        w.line(&format!(
            "const __securityHeaders = {{ {} }};",
            entries.join(", ")
        ));
        w.blank();
    }
}

/// HS256 only; `alg: none` and every other algorithm are rejected.
const VERIFY_TOKEN_JS: &str = r#"function __b64url(__s) {
  return atob(__s.replace(/-/g, "+").replace(/_/g, "/"));
}
async function __verifyToken(__token) {
  if (typeof __token !== "string") return null;
  const __parts = __token.split(".");
  if (__parts.length !== 3) return null;
  let __header;
  try {
    __header = JSON.parse(__b64url(__parts[0]));
  } catch {
    return null;
  }
  if (__header.alg !== "HS256") return null;
  const __data = new TextEncoder().encode(__parts[0] + "." + __parts[1]);
  const __key = await crypto.subtle.importKey(
    "raw",
    new TextEncoder().encode(__authSecret),
    { name: "HMAC", hash: "SHA-256" },
    false,
    ["verify"],
  );
  const __sig = Uint8Array.from(__b64url(__parts[2]), (__c) => __c.charCodeAt(0));
  const __ok = await crypto.subtle.verify("HMAC", __key, __sig, __data);
  if (!__ok) return null;
  let __payload;
  try {
    __payload = JSON.parse(__b64url(__parts[1]));
  } catch {
    return null;
  }
  if (__payload.exp && __payload.exp * 1000 < Date.now()) return null;
  return __payload;
}"#;

const HAS_ROLE_JS: &str = r#"function __hasRole(__user, __role) {
  if (!__user) return false;
  const __list = __user.roles ?? (__user.role ? [__user.role] : []);
  return __list.includes(__role);
}
function __hasPermission(__user, __perm) {
  if (!__user) return false;
  const __list = __user.roles ?? (__user.role ? [__user.role] : []);
  return __list.some((__r) => (__roles[__r] ?? []).includes(__perm));
}"#;

const MATCH_PROTECTED_JS: &str = r#"function __matchProtected(__path) {
  for (const __rule of __protected) {
    if (__rule.pattern.test(__path)) return __rule;
  }
  return null;
}"#;

/// Per-response sanitization dispatching by `__type`/`__tag`.
const SANITIZE_JS: &str = r#"function __sanitize(__value) {
  if (Array.isArray(__value)) return __value.map(__sanitize);
  if (__value && typeof __value === "object") {
    const __tag = __value.__type ?? __value.__tag;
    const __strip = __tag ? __sensitiveFields[__tag] : undefined;
    const __out = {};
    for (const [__k, __v] of Object.entries(__value)) {
      if (__strip && __strip.includes(__k)) continue;
      __out[__k] = __sanitize(__v);
    }
    return __out;
  }
  return __value;
}"#;

const CSRF_JS: &str = r#"function __csrfCheck(__req) {
  if (["GET", "HEAD", "OPTIONS"].includes(__req.method)) return true;
  const __header = __req.headers.get("x-csrf-token");
  const __cookie = (__req.headers.get("cookie") ?? "")
    .split(";")
    .map((__c) => __c.trim())
    .find((__c) => __c.startsWith("tova_csrf="));
  return !!__header && !!__cookie && __cookie.slice(10) === __header;
}"#;

/// Client-side token storage appended to the client bundle when a security
/// block is active; the runtime's `rpc` attaches the token as a bearer
/// header.
pub const CLIENT_TOKEN_JS: &str = r#"export function setAuthToken(__token) {
  localStorage.setItem("tova_token", __token);
}
export function getAuthToken() {
  return localStorage.getItem("tova_token");
}
export function clearAuthToken() {
  localStorage.removeItem("tova_token");
}"#;
