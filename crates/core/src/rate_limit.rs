use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::LimitsConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Sliding-window request counter keyed by caller.
///
/// Owned by whoever starts the process and handed to request handlers; it
/// holds no state outside its own map.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    requests: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests: max_requests.max(1), window, requests: Mutex::new(HashMap::new()) }
    }

    pub fn from_config(limits: &LimitsConfig) -> Self {
        // Windows beyond a day are clamped so `now - window` stays in range.
        let window_secs =
            i64::try_from(limits.rate_limit_window_secs.min(86_400)).unwrap_or(86_400);
        Self::new(limits.rate_limit_requests, Duration::seconds(window_secs))
    }

    /// Records a request at `now` unless the key is already at its limit.
    pub fn check(&self, key: &str, now: DateTime<Utc>) -> RateDecision {
        let mut requests = match self.requests.lock() {
            Ok(requests) => requests,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window_start = now - self.window;
        let timestamps = requests.entry(key.to_owned()).or_default();
        timestamps.retain(|seen| *seen > window_start);

        let in_window = u32::try_from(timestamps.len()).unwrap_or(u32::MAX);
        if in_window >= self.max_requests {
            let oldest = timestamps.iter().min().copied().unwrap_or(now);
            let retry_after_secs = (oldest + self.window - now).num_seconds().max(1);
            warn!(
                event_name = "rate_limit.exceeded",
                key,
                in_window,
                limit = self.max_requests,
                "rate limit exceeded"
            );
            return RateDecision::Limited {
                retry_after_secs: u64::try_from(retry_after_secs).unwrap_or(1),
            };
        }

        timestamps.push(now);
        RateDecision::Allowed { remaining: self.max_requests - in_window - 1 }
    }

    /// Drops keys with no requests inside the window ending at `now`.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut requests = match self.requests.lock() {
            Ok(requests) => requests,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window_start = now - self.window;
        let before = requests.len();
        requests.retain(|_, timestamps| timestamps.iter().any(|seen| *seen > window_start));
        before - requests.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{RateDecision, RateLimiter};
    use crate::config::LimitsConfig;

    #[test]
    fn limits_after_max_requests_within_window() {
        let limiter = RateLimiter::new(2, Duration::seconds(60));
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).single().expect("valid time");

        assert_eq!(limiter.check("u-1", start), RateDecision::Allowed { remaining: 1 });
        assert_eq!(
            limiter.check("u-1", start + Duration::seconds(10)),
            RateDecision::Allowed { remaining: 0 }
        );
        assert_eq!(
            limiter.check("u-1", start + Duration::seconds(20)),
            RateDecision::Limited { retry_after_secs: 40 }
        );
        assert!(limiter.check("u-2", start + Duration::seconds(20)).is_allowed());
    }

    #[test]
    fn window_slides_forward() {
        let limiter = RateLimiter::new(1, Duration::seconds(30));
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).single().expect("valid time");

        assert!(limiter.check("u-1", start).is_allowed());
        assert!(!limiter.check("u-1", start + Duration::seconds(29)).is_allowed());
        assert!(limiter.check("u-1", start + Duration::seconds(31)).is_allowed());
    }

    #[test]
    fn configured_limits_drive_quota_and_window() {
        let limiter = RateLimiter::from_config(&LimitsConfig {
            max_bulk_records: 100,
            rate_limit_requests: 2,
            rate_limit_window_secs: 90,
        });
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).single().expect("valid time");

        assert!(limiter.check("u-1", start).is_allowed());
        assert!(limiter.check("u-1", start).is_allowed());
        assert_eq!(limiter.check("u-1", start), RateDecision::Limited { retry_after_secs: 90 });
        assert!(limiter.check("u-1", start + Duration::seconds(91)).is_allowed());
    }

    #[test]
    fn prune_drops_idle_keys() {
        let limiter = RateLimiter::new(5, Duration::seconds(30));
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).single().expect("valid time");
        limiter.check("idle", start);
        limiter.check("busy", start + Duration::seconds(50));

        assert_eq!(limiter.prune(start + Duration::seconds(60)), 1);
    }
}
