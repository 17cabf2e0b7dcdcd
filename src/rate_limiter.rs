//! # Rate Limiter Module
//!
//! Per-customer cap on outbound messages. Each customer has a sliding window of send
//! timestamps; once the cap is reached inside the window the customer is locked out for a
//! fixed period, after which the window starts over.
//!
//! Time comes from `tokio::time::Instant` so tests can drive it with a paused clock.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::config::RateLimitConfig;

#[derive(Debug, Default)]
struct CustomerWindow {
    sends: VecDeque<Instant>,
    locked_until: Option<Instant>,
}

impl CustomerWindow {
    fn prune(&mut self, now: Instant, config: &RateLimitConfig) {
        while let Some(oldest) = self.sends.front() {
            if now.saturating_duration_since(*oldest) >= config.window {
                self.sends.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Sliding-window limiter shared by the outbound scheduler
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, CustomerWindow>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Whether a message may be sent to `customer_id` right now
    pub fn can_send(&self, customer_id: &str) -> bool {
        self.can_send_at(customer_id, Instant::now())
    }

    pub fn can_send_at(&self, customer_id: &str, now: Instant) -> bool {
        let mut windows = match self.windows.lock() {
            Ok(windows) => windows,
            Err(poisoned) => poisoned.into_inner(),
        };

        let Some(window) = windows.get_mut(customer_id) else {
            return true;
        };

        if let Some(until) = window.locked_until {
            if now < until {
                return false;
            }
            window.locked_until = None;
            window.sends.clear();
        }

        window.prune(now, &self.config);

        if window.sends.len() >= self.config.max_per_window {
            window.locked_until = Some(now + self.config.lockout);
            warn!(
                customer_id,
                sends = window.sends.len(),
                lockout_secs = self.config.lockout.as_secs(),
                "Outbound rate limit reached, customer locked out"
            );
            return false;
        }

        true
    }

    /// Record a send that just happened
    pub fn record_send(&self, customer_id: &str) {
        self.record_send_at(customer_id, Instant::now());
    }

    pub fn record_send_at(&self, customer_id: &str, now: Instant) {
        let mut windows = match self.windows.lock() {
            Ok(windows) => windows,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = windows.entry(customer_id.to_string()).or_default();
        window.prune(now, &self.config);
        window.sends.push_back(now);
    }

    /// Drop windows with no recent sends and no active lockout
    pub fn purge_idle(&self) {
        let now = Instant::now();
        let mut windows = match self.windows.lock() {
            Ok(windows) => windows,
            Err(poisoned) => poisoned.into_inner(),
        };
        windows.retain(|_, window| {
            window.prune(now, &self.config);
            !window.sends.is_empty() || window.locked_until.is_some_and(|until| now < until)
        });
    }

    #[cfg(test)]
    fn tracked_customers(&self) -> usize {
        match self.windows.lock() {
            Ok(windows) => windows.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig::default())
    }

    #[test]
    fn test_cap_then_lockout_then_recovery() {
        let limiter = limiter();
        let start = Instant::now();

        for i in 0..15 {
            let at = start + Duration::from_millis(i * 100);
            assert!(limiter.can_send_at("a", at));
            limiter.record_send_at("a", at);
        }

        let sixteenth = start + Duration::from_secs(2);
        assert!(!limiter.can_send_at("a", sixteenth));

        // Still locked even after the window would have slid
        assert!(!limiter.can_send_at("a", sixteenth + Duration::from_secs(59)));
        assert!(limiter.can_send_at("a", sixteenth + Duration::from_secs(60)));
    }

    #[test]
    fn test_customers_are_independent() {
        let limiter = limiter();
        let now = Instant::now();

        for _ in 0..15 {
            limiter.record_send_at("a", now);
        }

        assert!(!limiter.can_send_at("a", now));
        assert!(limiter.can_send_at("b", now));
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_per_window: 2,
            window: Duration::from_secs(10),
            lockout: Duration::from_secs(30),
        });
        let start = Instant::now();

        limiter.record_send_at("a", start);
        limiter.record_send_at("a", start + Duration::from_secs(5));

        // The first send has left the window
        assert!(limiter.can_send_at("a", start + Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_forgets_quiet_customers() {
        let limiter = limiter();
        limiter.record_send("a");
        limiter.record_send("b");
        assert_eq!(limiter.tracked_customers(), 2);

        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.record_send("b");
        tokio::time::advance(Duration::from_secs(31)).await;

        limiter.purge_idle();
        assert_eq!(limiter.tracked_customers(), 1);
    }
}
