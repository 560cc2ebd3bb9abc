use std::sync::Arc;
use std::time::{Duration, Instant};

use gatehouse_core::config::ProxyConfig;
use gatehouse_core::error::GatehouseError;
use gatehouse_observability::AccessLogEntry;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error_handler::ErrorHandler;
use crate::headers::{build_forward_headers, filter_response_headers};
use crate::path::rewrite_path;
use crate::state::RequestState;
use crate::websocket::{is_upgrade_request, relay};
use crate::wire::{build_proxied_response, build_response, build_upstream_request};
use gatehouse_router::Router;

/// Parsed request line + headers, owned so they can cross `.await` points
/// freely — unlike the teacher's zero-copy `&str` refs into a
/// thread-local buffer (that design depends on `monoio`'s single-threaded,
/// non-`Send` per-core model, which this crate does not use; see
/// DESIGN.md's "Dropped" section on the runtime swap).
struct ParsedRequest {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

fn parse_request(buf: &[u8]) -> Result<Option<ParsedRequest>, GatehouseError> {
    let mut headers_raw = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut headers_raw);

    match req.parse(buf) {
        Ok(httparse::Status::Complete(body_offset)) => {
            let method = req.method.unwrap_or("GET").to_string();
            let path = req.path.unwrap_or("/").to_string();
            let headers = req
                .headers
                .iter()
                .take_while(|h| !h.name.is_empty())
                .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).to_string()))
                .collect();
            Ok(Some(ParsedRequest {
                method,
                path,
                headers,
                body: buf[body_offset..].to_vec(),
            }))
        }
        Ok(httparse::Status::Partial) => Ok(None),
        Err(e) => Err(GatehouseError::BadRequest(e.to_string())),
    }
}

fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Split an upstream target URL into `(scheme, authority)`, e.g.
/// `http://127.0.0.1:9000/base` → `("http", "127.0.0.1:9000")`.
pub fn parse_target(target: &str) -> Result<(String, String), GatehouseError> {
    let (scheme, rest) = target
        .split_once("://")
        .ok_or_else(|| GatehouseError::BadRequest(format!("target missing scheme: {target}")))?;
    let authority = rest.split('/').next().unwrap_or(rest);
    if authority.is_empty() {
        return Err(GatehouseError::BadRequest(format!("target missing authority: {target}")));
    }
    Ok((scheme.to_string(), authority.to_string()))
}

/// C3: resolves one route and relays one request/response (or, for an
/// upgraded connection, the subsequent opaque byte stream) between
/// `client` and the chosen upstream. Grounded on
/// `ando-proxy/src/connection.rs::handle_connection`'s overall shape
/// (buffer reuse across keepalive requests, read-parse-route-forward loop)
/// ported from `monoio` to `tokio`.
pub async fn handle_connection(
    mut client: TcpStream,
    peer_addr: std::net::SocketAddr,
    router: Arc<Router>,
    error_handler: Arc<ErrorHandler>,
    config: Arc<ProxyConfig>,
) {
    let client_ip = peer_addr.ip().to_string();
    let mut read_buf = vec![0u8; 8192];
    let mut resp_buf: Vec<u8> = Vec::with_capacity(4096);
    let mut req_buf: Vec<u8> = Vec::with_capacity(2048);

    loop {
        let read_fut = client.read(&mut read_buf);
        let n = match read_with_optional_timeout(read_fut, config.timeout_secs).await {
            Ok(Ok(0)) => return,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                debug!(error = %e, %client_ip, "client read error");
                return;
            }
            Err(_) => {
                debug!(%client_ip, "accept-to-first-byte timeout");
                return;
            }
        };

        let parsed = match parse_request(&read_buf[..n]) {
            Ok(Some(p)) => p,
            Ok(None) => {
                write_plain_400(&mut client).await;
                return;
            }
            Err(_) => {
                write_plain_400(&mut client).await;
                return;
            }
        };

        let keep_alive = !header_value(&parsed.headers, "connection")
            .map(|v| v.eq_ignore_ascii_case("close"))
            .unwrap_or(false);

        let started = Instant::now();
        let outcome = serve_request(
            &mut client,
            &parsed,
            &client_ip,
            &router,
            &error_handler,
            &config,
            &mut req_buf,
            &mut resp_buf,
        )
        .await;

        match outcome {
            Ok(ServeOutcome::ResponseSent { prefix, target, status }) => {
                AccessLogEntry::new(
                    prefix,
                    client_ip.clone(),
                    parsed.method.clone(),
                    parsed.path.clone(),
                    status,
                    started.elapsed().as_secs_f64() * 1000.0,
                    target,
                )
                .emit();
            }
            Ok(ServeOutcome::Upgraded) => return,
            Err(e) => {
                warn!(error = %e, path = %parsed.path, "request handling failed");
                return;
            }
        }

        if !keep_alive {
            return;
        }
    }
}

enum ServeOutcome {
    ResponseSent {
        prefix: Option<String>,
        target: Option<String>,
        status: u16,
    },
    Upgraded,
}

#[allow(clippy::too_many_arguments)]
async fn serve_request(
    client: &mut TcpStream,
    parsed: &ParsedRequest,
    client_ip: &str,
    router: &Arc<Router>,
    error_handler: &Arc<ErrorHandler>,
    config: &Arc<ProxyConfig>,
    req_buf: &mut Vec<u8>,
    resp_buf: &mut Vec<u8>,
) -> Result<ServeOutcome, GatehouseError> {
    debug!(state = RequestState::Received.as_str(), path = %parsed.path, "serving request");

    let route = match router.resolve(&parsed.path).await {
        Ok(route) => route,
        Err(GatehouseError::NoRouteMatched(path)) => match &config.default_target {
            Some(target) => gatehouse_core::route::Route::new(
                "/".to_string(),
                target.clone(),
                serde_json::Map::new(),
            ),
            None => {
                let resp = error_handler.render(404, &parsed.headers).await;
                build_response(resp_buf, resp.status, &resp.content_type, &resp.body);
                client.write_all(resp_buf).await?;
                debug!(state = RequestState::Done.as_str(), status = resp.status, "no route matched");
                return Ok(ServeOutcome::ResponseSent {
                    prefix: None,
                    target: None,
                    status: resp.status,
                });
            }
        },
        Err(e) => return Err(e),
    };

    debug!(state = RequestState::Resolved.as_str(), prefix = %route.prefix, target = %route.target, "route resolved");

    let upstream_path = rewrite_path(
        &route.prefix,
        &parsed.path,
        &route.target,
        config.prepend_path,
        config.include_prefix,
    );

    let is_ws = is_upgrade_request(&parsed.headers);
    let request_host = header_value(&parsed.headers, "host");
    let scheme = if route.target.starts_with("ws") { "ws" } else { "http" };

    let forward_headers = build_forward_headers(
        &parsed.headers,
        client_ip,
        scheme,
        request_host,
        config.port,
        config.x_forward,
        &config.custom_headers,
        is_ws,
    );

    let (_upstream_scheme, authority) = parse_target(&route.target)?;

    debug!(state = RequestState::Connecting.as_str(), %authority, "connecting to upstream");

    let connect_fut = TcpStream::connect(&authority);
    let mut upstream = match read_with_optional_timeout(connect_fut, config.timeout_secs).await {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => {
            warn!(error = %e, authority = %authority, "upstream connect failed");
            let resp = error_handler.render(503, &parsed.headers).await;
            build_response(resp_buf, resp.status, &resp.content_type, &resp.body);
            client.write_all(resp_buf).await?;
            debug!(state = RequestState::Done.as_str(), status = resp.status, "upstream connect failed");
            return Ok(ServeOutcome::ResponseSent {
                prefix: Some(route.prefix),
                target: Some(route.target),
                status: resp.status,
            });
        }
        Err(_) => {
            let resp = error_handler.render(504, &parsed.headers).await;
            build_response(resp_buf, resp.status, &resp.content_type, &resp.body);
            client.write_all(resp_buf).await?;
            debug!(state = RequestState::Done.as_str(), status = resp.status, "upstream connect timed out");
            return Ok(ServeOutcome::ResponseSent {
                prefix: Some(route.prefix),
                target: Some(route.target),
                status: resp.status,
            });
        }
    };
    let _ = upstream.set_nodelay(true);

    build_upstream_request(req_buf, &parsed.method, &upstream_path, &forward_headers, &parsed.body);
    upstream.write_all(req_buf).await?;

    let mut upstream_buf = vec![0u8; 65536];
    let read_fut = upstream.read(&mut upstream_buf);
    let resp_n = match read_with_optional_timeout(read_fut, config.timeout_secs).await {
        Ok(Ok(0)) => {
            let resp = error_handler.render(502, &parsed.headers).await;
            build_response(resp_buf, resp.status, &resp.content_type, &resp.body);
            client.write_all(resp_buf).await?;
            debug!(state = RequestState::Done.as_str(), status = resp.status, "upstream closed before responding");
            return Ok(ServeOutcome::ResponseSent {
                prefix: Some(route.prefix),
                target: Some(route.target),
                status: resp.status,
            });
        }
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            warn!(error = %e, %authority, "upstream read failed");
            let resp = error_handler.render(502, &parsed.headers).await;
            build_response(resp_buf, resp.status, &resp.content_type, &resp.body);
            client.write_all(resp_buf).await?;
            debug!(state = RequestState::Done.as_str(), status = resp.status, "upstream aborted mid-response");
            return Ok(ServeOutcome::ResponseSent {
                prefix: Some(route.prefix),
                target: Some(route.target),
                status: resp.status,
            });
        }
        Err(_) => {
            let resp = error_handler.render(504, &parsed.headers).await;
            build_response(resp_buf, resp.status, &resp.content_type, &resp.body);
            client.write_all(resp_buf).await?;
            debug!(state = RequestState::Done.as_str(), status = resp.status, "upstream response timed out");
            return Ok(ServeOutcome::ResponseSent {
                prefix: Some(route.prefix),
                target: Some(route.target),
                status: resp.status,
            });
        }
    };

    // Both directions go through the same hop-by-hop filter (spec.md
    // §4.3); `head` is `None` only if the upstream's headers didn't fit in
    // this one read, in which case we fall back to relaying the raw bytes
    // rather than guessing at a status.
    let head = parse_response_head(&upstream_buf[..resp_n]);
    let is_101 = head
        .as_ref()
        .map(|h| h.status == 101)
        .unwrap_or_else(|| first_response_is_101(&upstream_buf[..resp_n]));

    match &head {
        Some(h) => {
            let filtered = filter_response_headers(&h.headers, is_ws && is_101);
            let first_chunk_body = &upstream_buf[h.header_len..resp_n];
            build_proxied_response(resp_buf, h.status, &filtered, first_chunk_body);
            client.write_all(resp_buf).await?;
        }
        None => {
            client.write_all(&upstream_buf[..resp_n]).await?;
        }
    }

    debug!(state = RequestState::Streaming.as_str(), "relaying upstream response");

    if is_ws && is_101 {
        let idle = idle_duration(config.proxy_timeout_secs);
        match idle {
            Some(d) => {
                let _ = timeout(d, relay(client, &mut upstream)).await;
            }
            None => {
                let _ = relay(client, &mut upstream).await;
            }
        }
        debug!(state = RequestState::Done.as_str(), "websocket relay ended");
        return Ok(ServeOutcome::Upgraded);
    }

    stream_remaining_body(&mut upstream, client, head.as_ref(), &upstream_buf[..resp_n], config.proxy_timeout_secs).await?;

    let status = head
        .as_ref()
        .map(|h| h.status)
        .unwrap_or_else(|| parse_status_code(&upstream_buf[..resp_n]).unwrap_or(200));
    debug!(state = RequestState::Done.as_str(), status, "response sent");
    Ok(ServeOutcome::ResponseSent {
        prefix: Some(route.prefix),
        target: Some(route.target),
        status,
    })
}

fn idle_duration(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

async fn read_with_optional_timeout<F, T>(fut: F, timeout_secs: u64) -> Result<T, tokio::time::error::Elapsed>
where
    F: std::future::Future<Output = T>,
{
    match idle_duration(timeout_secs) {
        Some(d) => timeout(d, fut).await,
        None => Ok(fut.await),
    }
}

/// Status + headers + header byte length parsed once out of an upstream
/// response buffer, shared by the header-filtering, upgrade-detection, and
/// body-length logic below instead of each re-parsing the same bytes.
struct ResponseHead {
    status: u16,
    headers: Vec<(String, String)>,
    header_len: usize,
}

fn parse_response_head(buf: &[u8]) -> Option<ResponseHead> {
    let mut headers_raw = [httparse::EMPTY_HEADER; 64];
    let mut resp = httparse::Response::new(&mut headers_raw);
    match resp.parse(buf) {
        Ok(httparse::Status::Complete(header_len)) => {
            let status = resp.code?;
            let headers = resp
                .headers
                .iter()
                .take_while(|h| !h.name.is_empty())
                .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).to_string()))
                .collect();
            Some(ResponseHead {
                status,
                headers,
                header_len,
            })
        }
        _ => None,
    }
}

/// Fallback used only when `parse_response_head` couldn't parse the first
/// read (e.g. oversized headers split across reads).
fn first_response_is_101(buf: &[u8]) -> bool {
    buf.starts_with(b"HTTP/1.1 101") || buf.starts_with(b"HTTP/1.0 101")
}

fn parse_status_code(buf: &[u8]) -> Option<u16> {
    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut resp = httparse::Response::new(&mut headers);
    match resp.parse(buf) {
        Ok(httparse::Status::Complete(_)) => resp.code,
        _ => None,
    }
}

async fn stream_remaining_body(
    upstream: &mut TcpStream,
    client: &mut TcpStream,
    head: Option<&ResponseHead>,
    first_chunk: &[u8],
    proxy_timeout_secs: u64,
) -> Result<(), GatehouseError> {
    let Some(head) = head else {
        return Ok(());
    };

    let content_length = head
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok());

    let Some(cl) = content_length else {
        return Ok(());
    };

    let body_in_first = first_chunk.len().saturating_sub(head.header_len);
    let mut remaining = cl.saturating_sub(body_in_first);
    let idle = idle_duration(proxy_timeout_secs);

    while remaining > 0 {
        let chunk_size = remaining.min(65536);
        let mut chunk = vec![0u8; chunk_size];
        let read_fut = upstream.read(&mut chunk);
        let n = match idle {
            Some(d) => match timeout(d, read_fut).await {
                Ok(Ok(n)) => n,
                Ok(Err(_)) | Err(_) => break,
            },
            None => match read_fut.await {
                Ok(n) => n,
                Err(_) => break,
            },
        };
        if n == 0 {
            break;
        }
        remaining -= n;
        if client.write_all(&chunk[..n]).await.is_err() {
            break;
        }
    }
    Ok(())
}

async fn write_plain_400(client: &mut TcpStream) {
    let _ = client
        .write_all(b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_target_splits_scheme_and_authority() {
        let (scheme, authority) = parse_target("http://127.0.0.1:9000/base").unwrap();
        assert_eq!(scheme, "http");
        assert_eq!(authority, "127.0.0.1:9000");
    }

    #[test]
    fn parse_target_without_path_works() {
        let (scheme, authority) = parse_target("ws://example.com:8080").unwrap();
        assert_eq!(scheme, "ws");
        assert_eq!(authority, "example.com:8080");
    }

    #[test]
    fn parse_target_rejects_missing_scheme() {
        assert!(parse_target("127.0.0.1:9000").is_err());
    }

    #[test]
    fn parse_request_extracts_method_path_headers() {
        let raw = b"GET /foo?x=1 HTTP/1.1\r\nHost: example.com\r\nConnection: keep-alive\r\n\r\n";
        let parsed = parse_request(raw).unwrap().unwrap();
        assert_eq!(parsed.method, "GET");
        assert_eq!(parsed.path, "/foo?x=1");
        assert_eq!(header_value(&parsed.headers, "host"), Some("example.com"));
    }

    #[test]
    fn parse_request_partial_returns_none() {
        let raw = b"GET /foo HTTP/1.1\r\nHost: exa";
        assert!(parse_request(raw).unwrap().is_none());
    }

    #[test]
    fn first_response_is_101_detects_switching_protocols() {
        assert!(first_response_is_101(b"HTTP/1.1 101 Switching Protocols\r\n\r\n"));
        assert!(!first_response_is_101(b"HTTP/1.1 200 OK\r\n\r\n"));
    }

    #[test]
    fn parse_status_code_reads_response_line() {
        let buf = b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n";
        assert_eq!(parse_status_code(buf), Some(404));
    }

    #[test]
    fn parse_response_head_extracts_status_and_headers() {
        let buf = b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 5\r\n\r\nhello";
        let head = parse_response_head(buf).unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(
            head.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case("content-length")),
            Some(&("Content-Length".to_string(), "5".to_string()))
        );
        assert_eq!(&buf[head.header_len..], b"hello");
    }

    #[test]
    fn parse_response_head_returns_none_for_partial_buffer() {
        let buf = b"HTTP/1.1 200 OK\r\nContent-Len";
        assert!(parse_response_head(buf).is_none());
    }
}
