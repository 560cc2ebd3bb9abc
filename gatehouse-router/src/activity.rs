use std::sync::Arc;

use gatehouse_core::store::{RoutePatch, Store};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, warn};

/// Coalesced, best-effort `last_activity` updates.
///
/// Grounded on the teacher's `VictoriaLogsExporter`
/// (`ando-observability/src/logger.rs`): a true no-op when disabled (no
/// channel, no task), `try_send` on the hot path so a full channel never
/// blocks the request, and a background loop that drains the channel on a
/// timer. Here the "batch" is deduplicated by prefix instead of shipped
/// verbatim — activity touches are idempotent and only the latest
/// timestamp per route matters, so coalescing collapses a hot route's
/// bursts into one `Store::update` per flush tick instead of one per
/// request.
pub struct ActivityRecorder {
    sender: Option<mpsc::Sender<String>>,
}

impl ActivityRecorder {
    /// Spawns the flush loop against `store`. `flush_interval` controls how
    /// often coalesced touches are applied.
    pub fn new(store: Arc<dyn Store>, flush_interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel(10_000);
        tokio::spawn(Self::flush_loop(store, rx, flush_interval));
        Self { sender: Some(tx) }
    }

    /// No-op recorder: `touch` becomes a branch-predicted return.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Record that `prefix` was just matched. Never blocks; drops the
    /// touch under backpressure rather than slow down the request path.
    pub fn touch(&self, prefix: String) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.try_send(prefix).is_err() {
            warn!("activity recorder channel full, dropping touch");
        }
    }

    async fn flush_loop(store: Arc<dyn Store>, mut rx: mpsc::Receiver<String>, period: Duration) {
        let mut pending: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut ticker = interval(period);

        loop {
            tokio::select! {
                maybe_prefix = rx.recv() => {
                    match maybe_prefix {
                        Some(prefix) => {
                            pending.insert(prefix);
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if pending.is_empty() {
                        continue;
                    }
                    let batch: Vec<String> = pending.drain().collect();
                    let count = batch.len();
                    for prefix in batch {
                        if let Err(e) = store.update(&prefix, RoutePatch::touch_now()).await {
                            debug!(prefix = %prefix, error = %e, "activity touch failed");
                        }
                    }
                    debug!(count, "flushed coalesced activity touches");
                }
            }
        }
    }
}
