use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const MAX_FAILED_LOGINS: usize = 5;
const WINDOW: Duration = Duration::from_secs(15 * 60);

/// Per-IP failed-login counter shared across workers.
#[derive(Clone, Default)]
pub struct RateLimiter {
    failures: Arc<Mutex<HashMap<IpAddr, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `ip` has used up its failed attempts inside the window.
    /// Expired timestamps for `ip` are dropped on the way.
    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        self.is_blocked_at(ip, Instant::now())
    }

    fn is_blocked_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut map = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        match map.get_mut(&ip) {
            Some(stamps) => {
                stamps.retain(|t| now.duration_since(*t) < WINDOW);
                stamps.len() >= MAX_FAILED_LOGINS
            }
            None => false,
        }
    }

    pub fn record_failure(&self, ip: IpAddr) {
        let mut map = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(ip).or_default().push(Instant::now());
    }

    /// Forget `ip` after a successful login.
    pub fn clear(&self, ip: IpAddr) {
        let mut map = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(&ip);
    }
}
