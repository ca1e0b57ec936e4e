//! Monotonic idle timer shared by the output file and its background
//! closer thread. One instance per thread that observes it: `ThreadTimer`
//! is `!Sync` by convention (callers must not share a single instance
//! across threads without their own synchronisation).

use std::time::{Duration, Instant};

pub struct ThreadTimer {
    last_activity: Instant,
    timeout: Duration,
}

impl ThreadTimer {
    pub fn new(timeout: Duration) -> Self {
        ThreadTimer {
            last_activity: Instant::now(),
            timeout,
        }
    }

    pub fn reset(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn expired(&self) -> bool {
        self.last_activity.elapsed() > self.timeout
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn expires_after_timeout() {
        let mut timer = ThreadTimer::new(Duration::from_millis(20));
        assert!(!timer.expired());
        sleep(Duration::from_millis(40));
        assert!(timer.expired());
        timer.reset();
        assert!(!timer.expired());
    }
}
