//! Route path → regex compilation, shared by the server and edge
//! generators.
//!
//! `:name` segments capture one path segment; `*` and `*name` capture the
//! rest; everything else is escaped literally and the result is anchored.

/// A compiled route pattern: the regex source and the capture names in
/// order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRoute {
    pub regex: String,
    pub params: Vec<String>,
}

/// Compile a route path like `/api/users/:id/posts/:pid`.
pub fn compile_route_pattern(path: &str) -> CompiledRoute {
    let mut regex = String::from("^");
    let mut params = Vec::new();

    let segments: Vec<&str> = path.split('/').collect();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            regex.push_str("\\/");
        }
        if let Some(name) = segment.strip_prefix(':') {
            regex.push_str("([^/]+)");
            params.push(name.to_string());
        } else if *segment == "*" {
            regex.push_str("(.*)");
            params.push("wildcard".to_string());
        } else if let Some(name) = segment.strip_prefix('*') {
            regex.push_str("(.*)");
            params.push(name.to_string());
        } else {
            regex.push_str(&escape_segment(segment));
        }
    }
    regex.push('$');

    CompiledRoute { regex, params }
}

fn escape_segment(segment: &str) -> String {
    let mut out = String::new();
    for c in segment.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_capture_in_order() {
        let route = compile_route_pattern("/api/users/:id/posts/:pid");
        assert_eq!(route.regex, "^\\/api\\/users\\/([^/]+)\\/posts\\/([^/]+)$");
        assert_eq!(route.params, vec!["id", "pid"]);
    }

    #[test]
    fn root_path() {
        let route = compile_route_pattern("/");
        assert_eq!(route.regex, "^\\/$");
        assert!(route.params.is_empty());
    }

    #[test]
    fn named_wildcard() {
        let route = compile_route_pattern("/static/*path");
        assert_eq!(route.regex, "^\\/static\\/(.*)$");
        assert_eq!(route.params, vec!["path"]);
    }

    #[test]
    fn bare_wildcard() {
        let route = compile_route_pattern("/files/*");
        assert_eq!(route.regex, "^\\/files\\/(.*)$");
        assert_eq!(route.params, vec!["wildcard"]);
    }

    #[test]
    fn regex_specials_are_escaped() {
        let route = compile_route_pattern("/v1.0/items");
        assert_eq!(route.regex, "^\\/v1\\.0\\/items$");
    }
}
