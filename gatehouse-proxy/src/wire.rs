/// Raw HTTP/1.1 response/request line construction. Grounded on
/// `ando-proxy/src/proxy.rs`'s `build_response`/`build_upstream_request`/
/// `status_text` — buffer-reuse, no `format!` on the hot path.
pub fn status_text(status: u16) -> &'static str {
    match status {
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Build an HTTP/1.1 response into `buf`, clearing any stale contents first.
pub fn build_response(buf: &mut Vec<u8>, status: u16, content_type: &str, body: &[u8]) {
    buf.clear();
    buf.extend_from_slice(b"HTTP/1.1 ");
    let mut itoa_buf = itoa::Buffer::new();
    buf.extend_from_slice(itoa_buf.format(status).as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(status_text(status).as_bytes());
    buf.extend_from_slice(b"\r\ncontent-type: ");
    buf.extend_from_slice(content_type.as_bytes());
    buf.extend_from_slice(b"\r\ncontent-length: ");
    buf.extend_from_slice(itoa_buf.format(body.len()).as_bytes());
    buf.extend_from_slice(b"\r\nconnection: keep-alive\r\n\r\n");
    buf.extend_from_slice(body);
}

/// Build an HTTP/1.1 response into `buf` from an already-parsed upstream
/// status and an already-filtered header set (see
/// `headers::filter_response_headers`). Unlike `build_response`, `headers`
/// is whatever the upstream sent rather than a single content-type — this
/// is the relay path, not the synthetic-error-page path.
pub fn build_proxied_response(buf: &mut Vec<u8>, status: u16, headers: &[(String, String)], body: &[u8]) {
    buf.clear();
    buf.extend_from_slice(b"HTTP/1.1 ");
    let mut itoa_buf = itoa::Buffer::new();
    buf.extend_from_slice(itoa_buf.format(status).as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(status_text(status).as_bytes());
    buf.extend_from_slice(b"\r\n");
    for (name, value) in headers {
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(body);
}

/// Build an HTTP/1.1 request line + headers into `buf`. `headers` is
/// assumed already filtered/augmented (see `headers::build_forward_headers`).
pub fn build_upstream_request(
    buf: &mut Vec<u8>,
    method: &str,
    path: &str,
    headers: &[(String, String)],
    body: &[u8],
) {
    buf.clear();
    buf.extend_from_slice(method.as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(path.as_bytes());
    buf.extend_from_slice(b" HTTP/1.1\r\n");
    for (name, value) in headers {
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"connection: keep-alive\r\n");
    if !body.is_empty() {
        buf.extend_from_slice(b"content-length: ");
        let mut itoa_buf = itoa::Buffer::new();
        buf.extend_from_slice(itoa_buf.format(body.len()).as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"\r\n");
    if !body.is_empty() {
        buf.extend_from_slice(body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_response_status_line_and_body() {
        let mut buf = Vec::new();
        build_response(&mut buf, 200, "text/plain", b"hello");
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("content-length: 5\r\n"));
        assert!(text.ends_with("hello"));
    }

    #[test]
    fn build_response_clears_stale_buffer() {
        let mut buf = b"stale".to_vec();
        build_response(&mut buf, 204, "text/html", b"");
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("stale"));
    }

    #[test]
    fn build_upstream_request_basic_format() {
        let mut buf = Vec::new();
        build_upstream_request(&mut buf, "GET", "/api", &[], b"");
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("GET /api HTTP/1.1\r\n"));
        assert!(!text.contains("content-length:"));
    }

    #[test]
    fn build_upstream_request_adds_content_length_for_body() {
        let mut buf = Vec::new();
        build_upstream_request(&mut buf, "POST", "/", &[], b"body-data");
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("content-length: 9\r\n"));
        assert!(text.ends_with("body-data"));
    }

    #[test]
    fn status_text_unknown_code_returns_unknown() {
        assert_eq!(status_text(999), "Unknown");
    }

    #[test]
    fn build_proxied_response_writes_arbitrary_headers() {
        let mut buf = Vec::new();
        let headers = vec![("X-Upstream".to_string(), "yes".to_string())];
        build_proxied_response(&mut buf, 201, &headers, b"created");
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(text.contains("X-Upstream: yes\r\n"));
        assert!(text.ends_with("created"));
    }

    #[test]
    fn build_proxied_response_clears_stale_buffer() {
        let mut buf = b"stale".to_vec();
        build_proxied_response(&mut buf, 101, &[], b"");
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("stale"));
    }
}
