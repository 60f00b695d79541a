use std::cmp::min;
use std::time::Duration;

use rand::Rng;

/// Backoff yields growing delays between retries.
///
/// The delay doubles after every failure up to `max`. A delay is drawn from its upper half so
/// that replicas retrying together spread out.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    cur: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Backoff {
        Backoff {
            base,
            max,
            cur: base,
        }
    }

    pub fn reset(&mut self) {
        self.cur = self.base;
    }

    /// current returns the delay the next call to `next_delay` is drawn below.
    pub fn current(&self) -> Duration {
        self.cur
    }

    pub fn next_delay(&mut self) -> Duration {
        let d = self.cur;
        self.cur = min(self.cur * 2, self.max);

        let half = d.as_millis() as u64 / 2;
        let jitter = if half > 0 {
            rand::thread_rng().gen_range(0, half + 1)
        } else {
            0
        };

        d - Duration::from_millis(half) + Duration::from_millis(jitter)
    }
}
