/// Compute the upstream-bound path, per spec.md §4.1's two independent
/// flags:
///
/// - `include_prefix`: whether the forwarded suffix includes the matched
///   prefix itself, or only what comes after it.
/// - `prepend_path`: whether the upstream target's own path component is
///   prepended ahead of that suffix.
pub fn rewrite_path(
    matched_prefix: &str,
    request_path: &str,
    target: &str,
    prepend_path: bool,
    include_prefix: bool,
) -> String {
    let suffix = if include_prefix {
        request_path.to_string()
    } else {
        strip_prefix(matched_prefix, request_path)
    };

    if !prepend_path {
        return suffix;
    }

    let target_path = target_path_component(target);
    join_paths(target_path, &suffix)
}

fn strip_prefix(prefix: &str, path: &str) -> String {
    if prefix == "/" {
        return path.to_string();
    }
    let stripped = path.strip_prefix(prefix).unwrap_or(path);
    if stripped.is_empty() {
        "/".to_string()
    } else {
        stripped.to_string()
    }
}

/// Pull the path component (if any) off an upstream target URL, e.g.
/// `http://host:port/base` → `/base`; `http://host:port` → `""`.
fn target_path_component(target: &str) -> &str {
    let without_scheme = target
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(target);
    match without_scheme.find('/') {
        Some(idx) => &without_scheme[idx..],
        None => "",
    }
}

fn join_paths(base: &str, suffix: &str) -> String {
    if base.is_empty() {
        return suffix.to_string();
    }
    let base = base.trim_end_matches('/');
    if suffix.is_empty() || suffix == "/" {
        return if base.is_empty() { "/".to_string() } else { base.to_string() };
    }
    let suffix = suffix.trim_start_matches('/');
    format!("{base}/{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_prepend_and_include_prefix() {
        let out = rewrite_path("/api", "/api/users", "http://127.0.0.1:9000", true, true);
        assert_eq!(out, "/api/users");
    }

    #[test]
    fn strips_prefix_when_include_prefix_false() {
        let out = rewrite_path("/api", "/api/users", "http://127.0.0.1:9000", true, false);
        assert_eq!(out, "/users");
    }

    #[test]
    fn no_prepend_path_forwards_suffix_only() {
        let out = rewrite_path("/api", "/api/users", "http://127.0.0.1:9000/base", false, true);
        assert_eq!(out, "/api/users");
    }

    #[test]
    fn prepends_target_base_path() {
        let out = rewrite_path("/api", "/api/users", "http://127.0.0.1:9000/base", true, false);
        assert_eq!(out, "/base/users");
    }

    #[test]
    fn root_prefix_forwards_full_path() {
        let out = rewrite_path("/", "/anything", "http://127.0.0.1:9000", true, true);
        assert_eq!(out, "/anything");
    }

    #[test]
    fn stripped_suffix_root_stays_root() {
        let out = rewrite_path("/api", "/api", "http://127.0.0.1:9000", true, false);
        assert_eq!(out, "/");
    }

    #[test]
    fn prepend_with_empty_suffix_keeps_base_path() {
        let out = rewrite_path("/api", "/api", "http://127.0.0.1:9000/base", true, false);
        assert_eq!(out, "/base");
    }
}
