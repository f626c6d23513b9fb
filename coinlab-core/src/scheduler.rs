//! Fixed-interval background scheduler for the ingestion job.
//!
//! The job runs on a dedicated thread: once immediately, then every `interval`.
//! A tick that overruns its slot does not queue catch-up runs; the missed slots are
//! counted and the next run is aligned to the following slot. The thread waits on a
//! channel, so [`SchedulerHandle::stop`] interrupts the wait instead of sleeping it out.

use crate::error::SchedulerError;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Per-tick outcome counters shared with the handle.
#[derive(Debug, Default)]
struct TickCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
    missed: AtomicU64,
}

/// Snapshot of the scheduler's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub succeeded: u64,
    pub failed: u64,
    pub missed: u64,
}

impl SchedulerStats {
    pub fn ticks(&self) -> u64 {
        self.succeeded + self.failed
    }
}

/// Clears the running flag when the scheduler thread exits, including by panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler;

impl Scheduler {
    /// Run `job` every `interval` until the returned handle is stopped or dropped.
    pub fn start<F, E>(interval: Duration, job: F) -> Result<SchedulerHandle, SchedulerError>
    where
        F: FnMut() -> Result<(), E> + Send + 'static,
        E: Display,
    {
        Self::start_limited(interval, None, job)
    }

    /// Like [`start`](Self::start), but the thread exits on its own after `max_ticks` runs.
    pub fn start_limited<F, E>(
        interval: Duration,
        max_ticks: Option<u64>,
        mut job: F,
    ) -> Result<SchedulerHandle, SchedulerError>
    where
        F: FnMut() -> Result<(), E> + Send + 'static,
        E: Display,
    {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let counters = Arc::new(TickCounters::default());
        let running = Arc::new(AtomicBool::new(true));

        let thread_counters = Arc::clone(&counters);
        let running_guard = RunningGuard(Arc::clone(&running));
        let join = thread::Builder::new()
            .name("coinlab-scheduler".into())
            .spawn(move || {
                let _running = running_guard;
                info!(interval_ms = interval.as_millis() as u64, "scheduler started");
                let mut next = Instant::now();
                let mut ticks = 0u64;
                loop {
                    ticks += 1;
                    match job() {
                        Ok(()) => {
                            thread_counters.succeeded.fetch_add(1, Ordering::Relaxed);
                            debug!(tick = ticks, "scheduled job succeeded");
                        }
                        Err(e) => {
                            thread_counters.failed.fetch_add(1, Ordering::Relaxed);
                            error!(tick = ticks, error = %e, "scheduled job failed");
                        }
                    }
                    if max_ticks.is_some_and(|max| ticks >= max) {
                        break;
                    }

                    next += interval;
                    let now = Instant::now();
                    if next <= now {
                        let behind = now.duration_since(next);
                        let missed = (behind.as_nanos() / interval.as_nanos()) as u32 + 1;
                        thread_counters
                            .missed
                            .fetch_add(u64::from(missed), Ordering::Relaxed);
                        warn!(missed, "job overran its interval, skipping missed ticks");
                        next += interval * missed;
                    }

                    match stop_rx.recv_timeout(next.saturating_duration_since(now)) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!(ticks, "scheduler stopped");
            })?;

        Ok(SchedulerHandle {
            stop_tx: Some(stop_tx),
            join: Some(join),
            counters,
            running,
        })
    }
}

/// Owner of a running scheduler thread. Dropping it stops the thread.
pub struct SchedulerHandle {
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
    counters: Arc<TickCounters>,
    running: Arc<AtomicBool>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            missed: self.counters.missed.load(Ordering::Relaxed),
        }
    }

    /// Signal the thread and wait for the current tick to finish.
    pub fn stop(mut self) -> SchedulerStats {
        self.shutdown();
        self.stats()
    }

    /// Block until the thread exits on its own (after `max_ticks`).
    pub fn join(mut self) -> SchedulerStats {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!("scheduler thread panicked");
            }
        }
        self.stop_tx = None;
        self.stats()
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // The receiver is gone if the thread already exited.
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!("scheduler thread panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = Scheduler::start(Duration::ZERO, || Ok::<(), String>(()));
        assert!(matches!(result, Err(SchedulerError::ZeroInterval)));
    }

    #[test]
    fn runs_repeatedly_until_stopped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let handle = Scheduler::start(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        })
        .unwrap();

        wait_until(|| runs.load(Ordering::SeqCst) >= 3);
        assert!(handle.is_running());
        let stats = handle.stop();
        assert!(stats.succeeded >= 3);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn failures_are_counted_and_do_not_stop_the_loop() {
        let handle = Scheduler::start_limited(Duration::from_millis(1), Some(3), || {
            Err::<(), _>("upstream down")
        })
        .unwrap();

        let stats = handle.join();
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.succeeded, 0);
    }

    #[test]
    fn overrunning_job_records_missed_ticks() {
        let handle = Scheduler::start_limited(Duration::from_millis(10), Some(2), || {
            thread::sleep(Duration::from_millis(35));
            Ok::<(), String>(())
        })
        .unwrap();

        let stats = handle.join();
        assert_eq!(stats.succeeded, 2);
        assert!(stats.missed >= 1, "missed = {}", stats.missed);
    }

    #[test]
    fn stop_interrupts_a_long_wait() {
        let handle = Scheduler::start(Duration::from_secs(3600), || Ok::<(), String>(())).unwrap();
        wait_until(|| handle.stats().succeeded == 1);

        let started = Instant::now();
        let stats = handle.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(stats.succeeded, 1);
    }

    #[test]
    fn panicking_job_clears_running_flag() {
        let handle = Scheduler::start(Duration::from_millis(1), || -> Result<(), String> {
            panic!("job blew up")
        })
        .unwrap();

        wait_until(|| !handle.is_running());
        let stats = handle.stop();
        assert_eq!(stats.ticks(), 0);
    }

    #[test]
    fn finishes_after_max_ticks() {
        let handle =
            Scheduler::start_limited(Duration::from_millis(1), Some(2), || Ok::<(), String>(()))
                .unwrap();
        wait_until(|| !handle.is_running());
        assert_eq!(handle.stats().ticks(), 2);
    }
}
