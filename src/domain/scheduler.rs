//! Periodic cycle trigger.
//!
//! A single-threaded poller that wakes at a fixed granularity and runs the
//! job when its due time has passed. The job runs inline, so a scheduled
//! cycle can never overlap another scheduled cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub poll: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            interval: Duration::from_secs(300),
            poll: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    next_due: Instant,
}

impl Scheduler {
    /// The first run is due one full interval after `now`.
    pub fn new(config: SchedulerConfig, now: Instant) -> Self {
        let next_due = now + config.interval;
        Scheduler { config, next_due }
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Run `job` if due, then push the due time one interval past `finished`.
    pub fn poll_once<F, C>(&mut self, now: Instant, job: F, clock: C) -> bool
    where
        F: FnOnce(),
        C: FnOnce() -> Instant,
    {
        if !self.is_due(now) {
            return false;
        }
        job();
        self.next_due = clock() + self.config.interval;
        debug!(interval = ?self.config.interval, "scheduled cycle finished");
        true
    }

    /// Poll until `stop` is set.
    pub fn run<F>(&mut self, stop: &AtomicBool, mut job: F)
    where
        F: FnMut(),
    {
        while !stop.load(Ordering::Relaxed) {
            self.poll_once(Instant::now(), &mut job, Instant::now);
            thread::sleep(self.config.poll);
        }
    }
}
