use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use crate::config::DEFAULT_POLL_INTERVAL;

/// Runs a task on a fixed interval until stopped or dropped.
///
/// The first tick fires immediately. Ticks never overlap: a slow tick delays
/// the next one rather than queueing a burst.
#[derive(Debug)]
pub struct Poller {
    period: Duration,
    running: Option<Running>,
}

#[derive(Debug)]
struct Running {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Poller {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            running: None,
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Start polling with `tick`. A poller already running is restarted.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(&mut self, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.abort();
        let period = self.period;
        let (stop, mut stopped) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => tick().await,
                }
            }
            debug!("poller stopped");
        });
        self.running = Some(Running { stop, handle });
    }

    /// Signal the task to stop and wait for the in-flight tick to finish.
    pub async fn stop(&mut self) {
        if let Some(Running { stop, handle }) = self.running.take() {
            // The task may already have exited; nothing to signal then.
            let _ = stop.send(());
            let _ = handle.await;
        }
    }

    fn abort(&mut self) {
        if let Some(running) = self.running.take() {
            running.handle.abort();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.abort();
    }
}
