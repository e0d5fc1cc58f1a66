//! Rate limiter for login attempts
//!
//! - 5 failed attempts per username per 15 minutes
//! - 10 requests per IP address per minute

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::RwLock;

const MAX_USERNAME_FAILURES: usize = 5;
const USERNAME_WINDOW_MINUTES: i64 = 15;
const MAX_IP_REQUESTS: usize = 10;
const IP_WINDOW_MINUTES: i64 = 1;

/// Sliding-window login rate limiter
pub struct LoginRateLimiter {
    username_attempts: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
    ip_attempts: RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            username_attempts: RwLock::new(HashMap::new()),
            ip_attempts: RwLock::new(HashMap::new()),
        }
    }

    pub async fn is_username_limited(&self, username: &str) -> bool {
        let cutoff = Utc::now() - Duration::minutes(USERNAME_WINDOW_MINUTES);
        let mut attempts = self.username_attempts.write().await;
        let entry = attempts.entry(username.to_lowercase()).or_default();
        entry.retain(|time| *time > cutoff);
        entry.len() >= MAX_USERNAME_FAILURES
    }

    pub async fn record_failed_attempt(&self, username: &str) {
        let mut attempts = self.username_attempts.write().await;
        attempts.entry(username.to_lowercase()).or_default().push(Utc::now());
    }

    /// Forget failures after a successful login
    pub async fn clear_username_attempts(&self, username: &str) {
        self.username_attempts.write().await.remove(&username.to_lowercase());
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        let cutoff = Utc::now() - Duration::minutes(IP_WINDOW_MINUTES);
        let mut attempts = self.ip_attempts.write().await;
        let entry = attempts.entry(ip).or_default();
        entry.retain(|time| *time > cutoff);
        entry.len() >= MAX_IP_REQUESTS
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.ip_attempts.write().await.entry(ip).or_default().push(Utc::now());
    }

    /// Drop expired windows; run from the maintenance task
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let username_cutoff = now - Duration::minutes(USERNAME_WINDOW_MINUTES);
        let ip_cutoff = now - Duration::minutes(IP_WINDOW_MINUTES);

        self.username_attempts.write().await.retain(|_, times| {
            times.retain(|time| *time > username_cutoff);
            !times.is_empty()
        });

        self.ip_attempts.write().await.retain(|_, times| {
            times.retain(|time| *time > ip_cutoff);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked_usernames(&self) -> usize {
        self.username_attempts.read().await.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_username_rate_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            assert!(!limiter.is_username_limited("budi").await);
            limiter.record_failed_attempt("budi").await;
        }
        limiter.record_failed_attempt("budi").await;
        assert!(limiter.is_username_limited("budi").await);

        limiter.clear_username_attempts("budi").await;
        assert!(!limiter.is_username_limited("budi").await);
    }

    #[tokio::test]
    async fn test_ip_rate_limit() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("127.0.0.1").unwrap();

        for _ in 0..9 {
            assert!(!limiter.is_ip_limited(ip).await);
            limiter.record_ip_request(ip).await;
        }
        limiter.record_ip_request(ip).await;
        assert!(limiter.is_ip_limited(ip).await);
    }

    #[tokio::test]
    async fn test_username_is_case_insensitive() {
        let limiter = LoginRateLimiter::new();
        for name in ["Budi", "budi", "BUDI", "bUdi", "budI"] {
            limiter.record_failed_attempt(name).await;
        }
        assert!(limiter.is_username_limited("budi").await);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_entries() {
        let limiter = LoginRateLimiter::new();
        limiter.record_failed_attempt("sari").await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked_usernames().await, 1);
    }
}
