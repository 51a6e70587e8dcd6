//! Debounced cache persistence.
//!
//! Lookups only flip the dirty flag and nudge the writer task; the task
//! coalesces everything that arrives within one debounce window into a single
//! atomic file write. The window opens at the first dirty signal and is not
//! extended by later ones, so a steady stream of lookups still gets written.

use super::cache::{now_ms, write_atomic, StatsCache};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

pub type SharedCache = Arc<Mutex<StatsCache>>;

/// Poisoning only means another thread panicked mid-insert; the map is
/// still usable.
pub fn lock(cache: &SharedCache) -> MutexGuard<'_, StatsCache> {
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum PersistMsg {
    Dirty,
    Flush(oneshot::Sender<()>),
}

pub struct CacheWriter {
    tx: mpsc::UnboundedSender<PersistMsg>,
    handle: JoinHandle<()>,
}

impl CacheWriter {
    /// Must be called from inside a tokio runtime.
    pub fn spawn(cache: SharedCache, path: PathBuf, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(cache, path, debounce, rx));
        Self { tx, handle }
    }

    pub fn mark_dirty(&self) {
        let _ = self.tx.send(PersistMsg::Dirty);
    }

    /// Write now and wait for the write to land.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(PersistMsg::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

impl Drop for CacheWriter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(
    cache: SharedCache,
    path: PathBuf,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<PersistMsg>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            PersistMsg::Dirty => {
                let deadline = tokio::time::Instant::now() + debounce;
                let mut waiting = Vec::new();
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => break,
                        next = rx.recv() => match next {
                            Some(PersistMsg::Dirty) => continue,
                            Some(PersistMsg::Flush(ack)) => {
                                waiting.push(ack);
                                break;
                            }
                            None => break,
                        },
                    }
                }
                persist(&cache, &path);
                for ack in waiting {
                    let _ = ack.send(());
                }
            }
            PersistMsg::Flush(ack) => {
                persist(&cache, &path);
                let _ = ack.send(());
            }
        }
    }
    persist(&cache, &path);
}

/// Snapshot under the lock, write outside it. A failed write re-marks the
/// cache dirty so the next flush retries.
pub fn persist(cache: &SharedCache, path: &Path) {
    let snapshot = lock(cache).take_snapshot(now_ms());
    let json = match snapshot {
        Ok(Some(json)) => json,
        Ok(None) => return,
        Err(e) => {
            error!("stats cache snapshot failed: {:#}", e);
            return;
        }
    };
    match write_atomic(path, &json) {
        Ok(()) => debug!("stats cache written to {}", path.display()),
        Err(e) => {
            error!("stats cache write to {} failed: {:#}", path.display(), e);
            lock(cache).mark_dirty();
        }
    }
}
