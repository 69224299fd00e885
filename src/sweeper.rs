//! Periodic expiry scheduler for the session queue.
//!
//! One dedicated thread ticks at a fixed cadence and sweeps the registry,
//! independent of request traffic. The thread is stopped explicitly (or on
//! drop) by signalling its channel and joining, rather than being abandoned
//! at process exit.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::session::SessionRegistry;

pub struct Sweeper {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub fn start(registry: Arc<SessionRegistry>, interval: Duration) -> anyhow::Result<Self> {
        Self::start_with(move || registry.sweep(), interval)
    }

    fn start_with(mut task: impl FnMut() + Send + 'static, interval: Duration) -> anyhow::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("session-sweeper".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        // One bad cycle must not stop the schedule.
                        if catch_unwind(AssertUnwindSafe(&mut task)).is_err() {
                            tracing::error!("session sweep cycle panicked");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn panicking_cycle_does_not_stop_the_schedule() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&ticks);
        let sweeper = Sweeper::start_with(
            move || {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first cycle fails");
                }
            },
            Duration::from_millis(10),
        )
        .expect("start sweeper");

        for _ in 0..200 {
            if ticks.load(Ordering::SeqCst) >= 3 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(
            ticks.load(Ordering::SeqCst) >= 3,
            "schedule stopped after a failing cycle"
        );

        sweeper.stop();
    }

    #[test]
    fn evicts_idle_sessions_in_the_background() {
        let registry = Arc::new(SessionRegistry::new(Duration::from_millis(50)));
        let sweeper = Sweeper::start(Arc::clone(&registry), Duration::from_millis(10))
            .expect("start sweeper");

        registry.start("idle@x.com");
        assert_eq!(registry.len(), 1);

        // Well past timeout + several sweep cycles.
        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(registry.len(), 0);

        // The schedule keeps running: a second generation expires too.
        registry.start("again@x.com");
        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(registry.len(), 0);

        sweeper.stop();
    }

    #[test]
    fn stop_joins_the_thread() {
        let registry = Arc::new(SessionRegistry::new(Duration::from_secs(60)));
        let sweeper =
            Sweeper::start(Arc::clone(&registry), Duration::from_secs(30)).expect("start sweeper");
        // Must return promptly even though the tick interval is long.
        sweeper.stop();
    }
}
