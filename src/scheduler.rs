//! Periodic work scheduling
//!
//! A [`WorkQueue`] runs a work item on its own named thread: first after an
//! initial delay, then once per interval until the item asks to exit or the
//! schedule is cleared. Only one invocation of an item runs at a time.
//!
//! # Timing
//!
//! Deadlines advance by a fixed interval from the first tick, so a slow
//! cycle shortens the following sleep instead of shifting the whole
//! schedule. If a cycle overruns a full interval the schedule restarts from
//! the current time rather than firing a burst of catch-up ticks.
//!
//! # Cancellation
//!
//! [`ScheduleHandle::clear`] disconnects the cancel channel the worker
//! sleeps on, so a pending sleep ends immediately. A tick that is already
//! running is never interrupted.

use crate::error::{Result, ResultExt};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::OnceLock;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// What a work item wants after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Keep the schedule
    Continue,
    /// Leave the schedule permanently
    Exit,
}

/// Monotonic time in microseconds since the first call in this process
pub fn absolute_time_us() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}

/// Spawns periodic work items on dedicated threads
#[derive(Debug, Clone)]
pub struct WorkQueue {
    name: String,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new("wq:hp_default")
    }
}

impl WorkQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `work` after `initial_delay`, then every `interval`
    pub fn schedule_on_interval<F>(
        &self,
        initial_delay: Duration,
        interval: Duration,
        work: F,
    ) -> Result<ScheduleHandle>
    where
        F: FnMut() -> CycleOutcome + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded::<()>(0);

        let thread = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                run_periodic(initial_delay, interval, work, cancel_rx);
                drop(done_tx);
            })
            .context("Failed to spawn work queue thread")?;

        tracing::debug!(
            "Scheduled work on {} (delay {:?}, interval {:?})",
            self.name,
            initial_delay,
            interval
        );

        Ok(ScheduleHandle {
            cancel_tx: Some(cancel_tx),
            done_rx,
            thread: Some(thread),
        })
    }
}

fn run_periodic<F>(initial_delay: Duration, interval: Duration, mut work: F, cancel_rx: Receiver<()>)
where
    F: FnMut() -> CycleOutcome,
{
    let interval = interval.max(Duration::from_micros(1));
    let mut deadline = Instant::now() + initial_delay;

    loop {
        let wait = deadline.saturating_duration_since(Instant::now());
        match cancel_rx.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("Schedule cleared");
                return;
            }
        }

        if work() == CycleOutcome::Exit {
            return;
        }

        deadline += interval;
        let now = Instant::now();
        if deadline + interval < now {
            tracing::trace!("Cycle overran, restarting schedule");
            deadline = now;
        }
    }
}

/// Handle to a scheduled work item
#[derive(Debug)]
pub struct ScheduleHandle {
    cancel_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl ScheduleHandle {
    /// Stop scheduling further ticks
    pub fn clear(&mut self) {
        self.cancel_tx.take();
    }

    /// Whether the worker thread has left its loop
    pub fn is_finished(&self) -> bool {
        matches!(
            self.done_rx.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }

    /// Wait up to `timeout` for the worker to leave its loop
    pub fn wait(&self, timeout: Duration) -> bool {
        matches!(
            self.done_rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// Join the worker thread if it finishes within `timeout`.
    ///
    /// Returns `false` when the worker is still inside a tick; the thread is
    /// kept so a later call can join it.
    pub fn join(&mut self, timeout: Duration) -> bool {
        if self.thread.is_none() {
            return true;
        }

        if !self.wait(timeout) {
            tracing::error!("Work item did not finish within {:?}", timeout);
            return false;
        }

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Work queue thread panicked");
            }
        }
        true
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.clear();
        self.join(Duration::from_secs(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_absolute_time_is_monotonic() {
        let a = absolute_time_us();
        std::thread::sleep(Duration::from_millis(2));
        let b = absolute_time_us();
        assert!(b > a);
    }

    #[test]
    fn test_runs_until_exit() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();

        let mut handle = WorkQueue::new("test")
            .schedule_on_interval(Duration::ZERO, Duration::from_millis(1), move || {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 >= 5 {
                    CycleOutcome::Exit
                } else {
                    CycleOutcome::Continue
                }
            })
            .unwrap();

        assert!(handle.wait(Duration::from_secs(5)));
        assert!(handle.is_finished());
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert!(handle.join(Duration::from_secs(1)));
    }

    #[test]
    fn test_clear_stops_schedule() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();

        let mut handle = WorkQueue::new("test")
            .schedule_on_interval(Duration::from_secs(60), Duration::from_secs(60), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                CycleOutcome::Continue
            })
            .unwrap();

        assert!(!handle.is_finished());
        handle.clear();
        assert!(handle.wait(Duration::from_secs(5)));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_join_keeps_busy_worker() {
        let (release_tx, release_rx) = bounded::<()>(0);

        let mut handle = WorkQueue::new("test")
            .schedule_on_interval(Duration::ZERO, Duration::from_secs(60), move || {
                let _ = release_rx.recv_timeout(Duration::from_secs(5));
                CycleOutcome::Exit
            })
            .unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert!(!handle.join(Duration::from_millis(10)));
        assert!(!handle.is_finished());

        drop(release_tx);
        assert!(handle.join(Duration::from_secs(5)));
        assert!(handle.is_finished());
    }

    #[test]
    fn test_drop_clears_schedule() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();

        let handle = WorkQueue::default()
            .schedule_on_interval(Duration::ZERO, Duration::from_millis(1), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                CycleOutcome::Continue
            })
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        drop(handle);

        let after_drop = count.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        assert!(after_drop > 0);
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }
}
