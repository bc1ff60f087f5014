//! Heartbeat scheduling
//!
//! A background task fires the heartbeat callback on a fixed interval.
//! The host's visibility signals pause and resume it; while paused no
//! ticks fire and no time accrues.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

enum HeartbeatCommand {
    Pause,
    Resume,
    Shutdown,
}

/// Handle to the heartbeat task.
#[derive(Clone)]
pub struct HeartbeatHandle {
    tx: mpsc::Sender<HeartbeatCommand>,
}

impl HeartbeatHandle {
    /// Start a heartbeat firing `on_tick` every `interval`.
    pub fn spawn(interval: Duration, on_tick: Arc<dyn Fn() + Send + Sync>) -> Self {
        let (tx, mut rx) = mpsc::channel::<HeartbeatCommand>(8);

        tokio::spawn(async move {
            let mut paused = false;
            let mut ticker = tokio::time::interval(interval);
            // the immediate first tick is not a heartbeat
            ticker.tick().await;

            loop {
                if paused {
                    match rx.recv().await {
                        Some(HeartbeatCommand::Resume) => {
                            paused = false;
                            ticker = tokio::time::interval(interval);
                            ticker.tick().await;
                        }
                        Some(HeartbeatCommand::Pause) => {}
                        Some(HeartbeatCommand::Shutdown) | None => break,
                    }
                    continue;
                }

                tokio::select! {
                    command = rx.recv() => match command {
                        Some(HeartbeatCommand::Pause) => paused = true,
                        Some(HeartbeatCommand::Resume) => {}
                        Some(HeartbeatCommand::Shutdown) | None => break,
                    },
                    _ = ticker.tick() => on_tick(),
                }
            }
            debug!("heartbeat stopped");
        });

        Self { tx }
    }

    /// Stop ticking until resumed.
    pub fn pause(&self) {
        if self.tx.try_send(HeartbeatCommand::Pause).is_err() {
            warn!("heartbeat task unreachable");
        }
    }

    /// Resume ticking with a full fresh interval.
    pub fn resume(&self) {
        if self.tx.try_send(HeartbeatCommand::Resume).is_err() {
            warn!("heartbeat task unreachable");
        }
    }

    /// Stop the task for good.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(HeartbeatCommand::Shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_interval() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handle = HeartbeatHandle::spawn(
            Duration::from_millis(100),
            Arc::new(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_ticks() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handle = HeartbeatHandle::spawn(
            Duration::from_millis(100),
            Arc::new(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );

        handle.pause();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        handle.resume();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_task() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handle = HeartbeatHandle::spawn(
            Duration::from_millis(100),
            Arc::new(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
