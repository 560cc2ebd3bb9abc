use percent_encoding::percent_decode_str;

/// Normalize a path prefix per spec.md §4.1: decode percent-escapes once,
/// collapse consecutive slashes, and strip any trailing slash unless the
/// whole path is `/`.
pub fn normalize_prefix(raw: &str) -> String {
    normalize_path(raw)
}

/// Cut `raw` at the first `?` or `#`, the way a request-target's path
/// component is meant to be matched against — `httparse` hands back the
/// whole request-target including the query string, and that string must
/// never reach the prefix table or `ancestor_prefixes`'s segment walk.
pub fn strip_query(raw: &str) -> &str {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    &raw[..end]
}

/// Normalize a request path the same way, so callers compare apples to
/// apples when matching against the prefix table.
pub fn normalize_path(raw: &str) -> String {
    let raw = strip_query(raw);
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    let decoded = decoded.as_ref();

    let mut collapsed = String::with_capacity(decoded.len() + 1);
    if !decoded.starts_with('/') {
        collapsed.push('/');
    }
    let mut prev_was_slash = false;
    for ch in decoded.chars() {
        if ch == '/' {
            if prev_was_slash {
                continue;
            }
            prev_was_slash = true;
        } else {
            prev_was_slash = false;
        }
        collapsed.push(ch);
    }

    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
    }
    collapsed
}

/// True if `prefix` matches `path` under spec.md §4.1's longest-prefix rule:
/// equal, `path` starts with `prefix + "/"`, or `prefix == "/"`.
pub fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    if prefix == path {
        return true;
    }
    path.len() > prefix.len() && path.starts_with(prefix) && path.as_bytes()[prefix.len()] == b'/'
}

/// Every normalized ancestor prefix of `path`, longest first, ending in `/`.
/// Used by `Store` implementations that walk segments rather than scanning
/// the whole table (spec.md §4.1).
pub fn ancestor_prefixes(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = path;
    loop {
        out.push(current.to_string());
        if current == "/" {
            break;
        }
        match current.rfind('/') {
            Some(0) => {
                out.push("/".to_string());
                break;
            }
            Some(idx) => current = &current[..idx],
            None => break,
        }
    }
    out
}
