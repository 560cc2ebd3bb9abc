use tokio::io::{copy_bidirectional, AsyncRead, AsyncWrite};

/// True if the request headers carry a WebSocket upgrade handshake
/// (`Connection: Upgrade` + `Upgrade: websocket`, case-insensitive, and
/// `Connection` may be a comma-separated list per RFC 6455 §4.2.1).
pub fn is_upgrade_request(headers: &[(String, String)]) -> bool {
    let has_upgrade_token = headers.iter().any(|(name, value)| {
        name.eq_ignore_ascii_case("connection")
            && value.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("upgrade"))
    });
    let wants_websocket = headers.iter().any(|(name, value)| {
        name.eq_ignore_ascii_case("upgrade") && value.eq_ignore_ascii_case("websocket")
    });
    has_upgrade_token && wants_websocket
}

/// Relay bytes opaquely between client and upstream after the upgrade
/// handshake's 101 response has already been forwarded. Neither side is
/// parsed further — spec.md §4.2 requires byte-for-byte passthrough once a
/// connection has switched protocols.
pub async fn relay<C, U>(client: &mut C, upstream: &mut U) -> std::io::Result<(u64, u64)>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    copy_bidirectional(client, upstream).await
}
