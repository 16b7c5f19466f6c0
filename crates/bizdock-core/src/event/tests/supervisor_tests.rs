use std::time::{Duration, Instant};

use crate::event::supervisor::{Directive, RestartPolicy};

#[test]
fn test_no_retries_escalates_every_failure() {
    let mut policy = RestartPolicy::new(0, Duration::ZERO);
    let now = Instant::now();
    assert_eq!(policy.on_failure_at(now), Directive::Escalate);
    assert_eq!(policy.on_failure_at(now + Duration::from_secs(1)), Directive::Escalate);
    assert_eq!(policy.failures(), 1);
}

#[test]
fn test_resumes_up_to_the_retry_count() {
    let mut policy = RestartPolicy::new(2, Duration::from_secs(60));
    let now = Instant::now();
    assert_eq!(policy.on_failure_at(now), Directive::Resume);
    assert_eq!(policy.on_failure_at(now + Duration::from_secs(1)), Directive::Resume);
    assert_eq!(policy.on_failure_at(now + Duration::from_secs(2)), Directive::Escalate);
    assert_eq!(policy.failures(), 3);
}

#[test]
fn test_window_restarts_after_it_elapses() {
    let mut policy = RestartPolicy::new(1, Duration::from_secs(10));
    let now = Instant::now();
    assert_eq!(policy.on_failure_at(now), Directive::Resume);
    // Outside the window: counts as a first failure again
    assert_eq!(policy.on_failure_at(now + Duration::from_secs(11)), Directive::Resume);
    assert_eq!(policy.on_failure_at(now + Duration::from_secs(12)), Directive::Escalate);
}
