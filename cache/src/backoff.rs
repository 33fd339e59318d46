use std::time::{Duration, Instant};

use rand::Rng;

/// A jittered exponential backoff schedule bounded by an overall deadline.
///
/// Each interval is drawn from `[base / 2, base]`, where `base` starts at the
/// initial interval and doubles up to the cap. No interval runs past the
/// deadline.
#[derive(Debug)]
pub(crate) struct Backoff {
  base: Duration,
  cap: Duration,
  started: Instant,
  deadline: Instant,
}

impl Backoff {
  pub(crate) fn new(initial: Duration, cap: Duration, timeout: Duration) -> Self {
    let started = Instant::now();
    Self {
      base: initial,
      cap: cap.max(initial),
      started,
      deadline: started + timeout,
    }
  }

  /// Returns how long to sleep before the next attempt, or `None` once the
  /// deadline has passed.
  pub(crate) fn next_delay(&mut self) -> Option<Duration> {
    let now = Instant::now();
    if now >= self.deadline {
      return None;
    }
    let base = self.base;
    self.base = (self.base * 2).min(self.cap);

    let factor = rand::rng().random_range(0.5..=1.0);
    Some(base.mul_f64(factor).min(self.deadline - now))
  }

  pub(crate) fn elapsed(&self) -> Duration {
    self.started.elapsed()
  }
}
