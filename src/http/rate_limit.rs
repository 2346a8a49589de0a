//! Rate Limiting
//!
//! Sliding-window limiter keyed by source address and endpoint class.
//! Windows live in a process-wide map; timestamps older than the window are
//! pruned on every check, and the map itself is pruned once it grows large.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::utils::error::{AppError, AppResult};

/// One endpoint class's budget within a rolling window.
#[derive(Debug, Clone, Copy)]
pub struct LimitRule {
    pub name: &'static str,
    pub max_requests: usize,
    pub window: Duration,
}

/// Research starts: 20 POSTs per minute per address.
pub const RESEARCH_RULE: LimitRule = LimitRule {
    name: "research",
    max_requests: 20,
    window: Duration::from_secs(60),
};

/// History reads: 60 GETs per minute per address.
pub const HISTORY_RULE: LimitRule = LimitRule {
    name: "history",
    max_requests: 60,
    window: Duration::from_secs(60),
};

/// Map size above which stale windows are swept.
const PRUNE_THRESHOLD: usize = 1024;

/// Sliding-window request limiter.
#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<(IpAddr, &'static str), VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or reject one request. Rejection carries the seconds until the
    /// oldest tracked request leaves the window.
    pub fn check(&self, addr: IpAddr, rule: &LimitRule) -> AppResult<()> {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, timestamps| {
                timestamps
                    .back()
                    .is_some_and(|t| now.duration_since(*t) < rule.window)
            });
        }

        let timestamps = windows.entry((addr, rule.name)).or_default();
        while timestamps
            .front()
            .is_some_and(|t| now.duration_since(*t) >= rule.window)
        {
            timestamps.pop_front();
        }

        if timestamps.len() >= rule.max_requests {
            let oldest = timestamps.front().copied().unwrap_or(now);
            let retry_after = rule.window.saturating_sub(now.duration_since(oldest));
            return Err(AppError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        timestamps.push_back(now);
        Ok(())
    }
}
