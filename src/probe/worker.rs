use crate::probe::counter::EventCounter;
use crate::transport::PerfSession;
use std::sync::Arc;
use tokio::sync::watch;

/// Drive one session until the stream ends, the session fails, or stop is
/// signalled. Each completed chunk is attributed to the shared counter
/// exactly once, before the next stop check. The session is closed before
/// the task returns.
pub(crate) async fn run_worker<S: PerfSession>(
    id: usize,
    mut session: S,
    counter: Arc<EventCounter>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            res = session.recv() => match res {
                Ok(Some(chunk)) => counter.add(chunk.len() as u64),
                Ok(None) => {
                    tracing::debug!(worker = id, "stream finished");
                    break;
                }
                Err(e) => {
                    tracing::debug!(worker = id, error = %e, "session receive failed");
                    break;
                }
            }
        }
    }
    session.close().await;
    tracing::debug!(worker = id, "worker exited");
}
