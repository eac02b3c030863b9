use std::fmt::Display;
use std::future::Future;

use storage::Change;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

const WATCH_BUFFER: usize = 16;

/// Run `fetch` once, then again for every relevant change notice, sending
/// each result to the returned receiver in order.
///
/// The loop ends when the receiver is dropped or the feed closes. Lagged
/// notices collapse into a single refresh.
pub(crate) fn spawn_refresh_loop<T, E, F, Fut>(
    mut changes: broadcast::Receiver<Change>,
    relevant: impl Fn(&Change) -> bool + Send + 'static,
    fetch: F,
) -> mpsc::Receiver<Result<T, E>>
where
    T: Send + 'static,
    E: Display + Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send,
{
    let (tx, rx) = mpsc::channel(WATCH_BUFFER);

    tokio::spawn(async move {
        loop {
            let result = fetch().await;
            if let Err(err) = &result {
                warn!(error = %err, "refresh failed");
            }
            if tx.send(result).await.is_err() {
                debug!("watch receiver dropped");
                return;
            }

            loop {
                let notice = tokio::select! {
                    () = tx.closed() => {
                        debug!("watch receiver dropped");
                        return;
                    }
                    notice = changes.recv() => notice,
                };
                match notice {
                    Ok(change) if relevant(&change) => break,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "change feed lagged");
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    });

    rx
}
