//! Periodic sender driven by `LinkManager::send_at`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::LinkError;
use crate::link::manager::LinkManager;
use crate::link::state::LinkState;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a running periodic sender. Dropping it cancels the task.
#[derive(Debug)]
pub struct PeriodicSender {
    handle: JoinHandle<()>,
    sent: Arc<AtomicU64>,
}

impl PeriodicSender {
    pub(crate) fn spawn<F>(link: LinkManager, interval: Duration, mut factory: F) -> Self
    where
        F: FnMut() -> String + Send + 'static,
    {
        let period = interval.max(MIN_INTERVAL);
        let sent = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&sent);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if link.is_shutdown() {
                    break;
                }
                if link.state() != LinkState::Open {
                    continue;
                }
                match link.send(factory()).await {
                    Ok(()) => {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(LinkError::Shutdown) => break,
                    // Already reported to the sink by the link
                    Err(_) => {}
                }
            }
            tracing::debug!(sent = counter.load(Ordering::Relaxed), "periodic sender stopped");
        });

        Self { handle, sent }
    }

    /// Stop sending. The link itself is unaffected.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Messages delivered so far
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl Drop for PeriodicSender {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Factory producing `"<prefix>1"`, `"<prefix>2"`, ...
pub fn numbered_messages(prefix: impl Into<String>) -> impl FnMut() -> String + Send + 'static {
    let prefix = prefix.into();
    let mut n: u64 = 0;
    move || {
        n += 1;
        format!("{}{}", prefix, n)
    }
}
