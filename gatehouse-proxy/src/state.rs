/// Per-request lifecycle, used only for tracing spans/log context — there
/// is no separate scheduler driven by this enum, each request just moves
/// through these states linearly as `connection::serve_request` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Resolved,
    Connecting,
    Streaming,
    Done,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Received => "received",
            RequestState::Resolved => "resolved",
            RequestState::Connecting => "connecting",
            RequestState::Streaming => "streaming",
            RequestState::Done => "done",
        }
    }
}
