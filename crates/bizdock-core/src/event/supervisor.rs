use std::time::{Duration, Instant};

/// Decision taken when a worker reports an exception. The worker keeps
/// its mailbox and continues with the next message either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Within the retry budget
    Resume,
    /// Retry budget exhausted, the failure is escalated in the logs
    Escalate,
}

/// Retry budget of one worker: at most `retries` failures inside a window
/// of `window`. The window starts at the first failure and restarts with
/// the first failure seen after it has elapsed.
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    retries: u32,
    window: Duration,
    window_start: Option<Instant>,
    failures: u32,
}

impl RestartPolicy {
    pub fn new(retries: u32, window: Duration) -> Self {
        Self {
            retries,
            window,
            window_start: None,
            failures: 0,
        }
    }

    /// Record a failure happening at `now`
    pub fn on_failure_at(&mut self, now: Instant) -> Directive {
        match self.window_start {
            Some(start) if now.saturating_duration_since(start) <= self.window => self.failures += 1,
            _ => {
                self.window_start = Some(now);
                self.failures = 1;
            }
        }
        if self.failures <= self.retries {
            Directive::Resume
        } else {
            Directive::Escalate
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn on_failure(&mut self) -> Directive {
        self.on_failure_at(Instant::now())
    }
}
