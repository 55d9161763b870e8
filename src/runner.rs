//! Runner: the cooperative poll-or-idle loop.
//!
//! The single concurrency primitive of the core. A runner repeatedly calls
//! `process()` on its processor; when a pass reports no activity it sleeps a
//! short interval instead of spinning. One runner drives one gate (or a
//! standalone hub); nothing else owns a thread of control.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::TransportConfig;

/// One unit of cooperative work.
pub trait Processor {
    /// Perform one pass. Returns whether anything happened; `false` lets the
    /// runner idle.
    fn process(&mut self) -> bool;
}

/// Adapter turning a closure into a [`Processor`], handy for driving a bare
/// hub or composing a gate tick with application work.
pub struct PollFn<F>(F);

/// Wrap a `FnMut() -> bool` closure as a [`Processor`].
pub fn poll_fn<F: FnMut() -> bool>(f: F) -> PollFn<F> {
    PollFn(f)
}

impl<F: FnMut() -> bool> Processor for PollFn<F> {
    fn process(&mut self) -> bool {
        (self.0)()
    }
}

/// The poll-or-idle loop.
#[derive(Debug, Clone, Copy)]
pub struct Runner {
    idle_interval: Duration,
}

impl Runner {
    /// Create a runner with the given idle sleep interval.
    pub fn new(idle_interval: Duration) -> Self {
        Self { idle_interval }
    }

    /// Create a runner using the configuration's idle interval.
    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.idle_interval)
    }

    /// Drive the processor inline until the shutdown signal fires (or its
    /// sender is dropped).
    pub async fn drive<P: Processor>(&self, processor: &mut P, shutdown: &mut oneshot::Receiver<()>) {
        loop {
            match shutdown.try_recv() {
                Err(TryRecvError::Empty) => {}
                Ok(()) | Err(TryRecvError::Closed) => break,
            }
            if processor.process() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.idle_interval).await;
            }
        }
        debug!("runner stopped");
    }

    /// Spawn the loop on a new task, returning a stop handle.
    pub fn spawn<P>(self, mut processor: P) -> RunnerHandle
    where
        P: Processor + Send + 'static,
    {
        let (shutdown, mut receiver) = oneshot::channel();
        let join = tokio::spawn(async move {
            self.drive(&mut processor, &mut receiver).await;
        });
        RunnerHandle {
            shutdown: Some(shutdown),
            join,
        }
    }
}

/// Stop handle for a spawned runner. Dropping it also stops the loop.
#[derive(Debug)]
pub struct RunnerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl RunnerHandle {
    /// Signal the loop to stop after its current pass.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }

    /// Stop and wait for the loop to finish.
    pub async fn stopped(mut self) {
        self.stop();
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_runner_drives_processor() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let runner = Runner::new(Duration::from_millis(1));
        let handle = runner.spawn(poll_fn(move || {
            counter.fetch_add(1, Ordering::Relaxed);
            false
        }));

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stopped().await;
        assert!(count.load(Ordering::Relaxed) > 1);
    }

    #[tokio::test]
    async fn test_runner_stops_on_signal() {
        let runner = Runner::new(Duration::from_millis(1));
        let handle = runner.spawn(poll_fn(|| false));

        // Must return promptly rather than loop forever.
        tokio::time::timeout(Duration::from_secs(1), handle.stopped())
            .await
            .expect("runner stopped in time");
    }

    #[tokio::test]
    async fn test_busy_processor_keeps_looping() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        // Always-busy passes never hit the idle sleep.
        let runner = Runner::new(Duration::from_secs(60));
        let handle = runner.spawn(poll_fn(move || {
            counter.fetch_add(1, Ordering::Relaxed);
            true
        }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stopped().await;
        assert!(count.load(Ordering::Relaxed) > 10);
    }
}
