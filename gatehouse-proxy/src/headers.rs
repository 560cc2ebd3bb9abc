use std::collections::HashMap;

/// Headers that apply only to a single hop and must never be forwarded
/// verbatim. Grounded on `ando-proxy/src/proxy.rs::build_upstream_request`'s
/// filter list, extended with the rest of RFC 7230 §6.1's hop-by-hop set
/// since spec.md §4.2 asks for the general rule, not just the four the
/// teacher happened to filter.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Build the header set sent upstream: strip hop-by-hop headers, optionally
/// append `X-Forwarded-*`, then apply `custom_headers` last so they win any
/// collision (spec.md §4.2: "custom headers apply last, overriding any
/// value already present").
///
/// `preserve_upgrade` keeps `Connection`/`Upgrade` intact despite them
/// being hop-by-hop headers in the general case — a WebSocket handshake
/// needs them forwarded verbatim for the upstream to switch protocols.
pub fn build_forward_headers(
    original: &[(String, String)],
    client_ip: &str,
    request_scheme: &str,
    request_host: Option<&str>,
    edge_port: u16,
    x_forward: bool,
    custom_headers: &HashMap<String, String>,
    preserve_upgrade: bool,
) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = original
        .iter()
        .filter(|(name, _)| {
            if preserve_upgrade && (name.eq_ignore_ascii_case("connection") || name.eq_ignore_ascii_case("upgrade")) {
                return true;
            }
            !is_hop_by_hop(name)
        })
        .cloned()
        .collect();

    if x_forward {
        append_or_extend(&mut out, "X-Forwarded-For", client_ip);
        set_if_absent(&mut out, "X-Forwarded-Proto", request_scheme);
        if let Some(host) = request_host {
            set_if_absent(&mut out, "X-Forwarded-Host", host);
        }
        set_if_absent(&mut out, "X-Forwarded-Port", &edge_port.to_string());
    }

    for (name, value) in custom_headers {
        set_overwrite(&mut out, name, value);
    }

    out
}

/// Strip hop-by-hop headers from an upstream response before relaying it to
/// the client — the same filter `build_forward_headers` applies to the
/// request, run in the other direction (spec.md §4.3: hop-by-hop headers
/// are stripped "in both directions"). `preserve_upgrade` keeps
/// `Connection`/`Upgrade` on a 101 response so the client sees the
/// handshake it asked for.
pub fn filter_response_headers(original: &[(String, String)], preserve_upgrade: bool) -> Vec<(String, String)> {
    original
        .iter()
        .filter(|(name, _)| {
            if preserve_upgrade && (name.eq_ignore_ascii_case("connection") || name.eq_ignore_ascii_case("upgrade")) {
                return true;
            }
            !is_hop_by_hop(name)
        })
        .cloned()
        .collect()
}

/// `X-Forwarded-For` is a comma-appended list when an upstream hop already
/// added one; every other proxy in the chain is expected to behave the
/// same way.
fn append_or_extend(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    for (k, v) in headers.iter_mut() {
        if k.eq_ignore_ascii_case(name) {
            v.push_str(", ");
            v.push_str(value);
            return;
        }
    }
    headers.push((name.to_string(), value.to_string()));
}

fn set_if_absent(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    if headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name)) {
        return;
    }
    headers.push((name.to_string(), value.to_string()));
}

fn set_overwrite(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    if let Some(existing) = headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        existing.1 = value.to_string();
        return;
    }
    headers.push((name.to_string(), value.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_hop_by_hop_headers() {
        let original = vec![
            ("Connection".to_string(), "close".to_string()),
            ("Upgrade".to_string(), "websocket".to_string()),
            ("X-Custom".to_string(), "keep-me".to_string()),
        ];
        let out = build_forward_headers(&original, "1.2.3.4", "http", None, 8000, false, &HashMap::new(), false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], ("X-Custom".to_string(), "keep-me".to_string()));
    }

    #[test]
    fn x_forward_adds_for_proto_host_port() {
        let out = build_forward_headers(&[], "9.9.9.9", "https", Some("example.com"), 8443, true, &HashMap::new(), false);
        assert!(out.contains(&("X-Forwarded-For".to_string(), "9.9.9.9".to_string())));
        assert!(out.contains(&("X-Forwarded-Proto".to_string(), "https".to_string())));
        assert!(out.contains(&("X-Forwarded-Host".to_string(), "example.com".to_string())));
        assert!(out.contains(&("X-Forwarded-Port".to_string(), "8443".to_string())));
    }

    #[test]
    fn x_forward_for_appends_to_existing_chain() {
        let original = vec![("X-Forwarded-For".to_string(), "1.1.1.1".to_string())];
        let out = build_forward_headers(&original, "2.2.2.2", "http", None, 8000, true, &HashMap::new(), false);
        let (_, v) = out.iter().find(|(k, _)| k == "X-Forwarded-For").unwrap();
        assert_eq!(v, "1.1.1.1, 2.2.2.2");
    }

    #[test]
    fn custom_headers_override_everything_else() {
        let original = vec![("X-Env".to_string(), "staging".to_string())];
        let mut custom = HashMap::new();
        custom.insert("X-Env".to_string(), "production".to_string());
        let out = build_forward_headers(&original, "1.1.1.1", "http", None, 8000, false, &custom, false);
        let (_, v) = out.iter().find(|(k, _)| k == "X-Env").unwrap();
        assert_eq!(v, "production");
    }

    #[test]
    fn x_forward_disabled_adds_nothing() {
        let out = build_forward_headers(&[], "1.1.1.1", "http", Some("h"), 8000, false, &HashMap::new(), false);
        assert!(out.is_empty());
    }

    #[test]
    fn preserve_upgrade_keeps_connection_and_upgrade_headers() {
        let original = vec![
            ("Connection".to_string(), "Upgrade".to_string()),
            ("Upgrade".to_string(), "websocket".to_string()),
        ];
        let out = build_forward_headers(&original, "1.1.1.1", "http", None, 8000, false, &HashMap::new(), true);
        assert!(out.contains(&("Connection".to_string(), "Upgrade".to_string())));
        assert!(out.contains(&("Upgrade".to_string(), "websocket".to_string())));
    }

    #[test]
    fn filter_response_headers_strips_hop_by_hop() {
        let original = vec![
            ("Connection".to_string(), "close".to_string()),
            ("Transfer-Encoding".to_string(), "chunked".to_string()),
            ("Content-Type".to_string(), "text/plain".to_string()),
        ];
        let out = filter_response_headers(&original, false);
        assert_eq!(out, vec![("Content-Type".to_string(), "text/plain".to_string())]);
    }

    #[test]
    fn filter_response_headers_preserve_upgrade_keeps_handshake_headers() {
        let original = vec![
            ("Connection".to_string(), "Upgrade".to_string()),
            ("Upgrade".to_string(), "websocket".to_string()),
            ("Sec-WebSocket-Accept".to_string(), "abc".to_string()),
        ];
        let out = filter_response_headers(&original, true);
        assert_eq!(out.len(), 3);
    }
}
