//! Rate limiter for login attempts
//!
//! Protects against credential brute forcing by limiting failed login
//! attempts per username (5 per 15 minutes) and requests per IP address
//! (10 per minute). Entries are swept periodically by a background task.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Login rate limiter
pub struct LoginRateLimiter {
    /// Failed login attempts by username
    username_attempts: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    /// Request attempts by IP address
    ip_attempts: Arc<RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>>,
}

impl LoginRateLimiter {
    /// Create a new rate limiter
    pub fn new() -> Self {
        Self {
            username_attempts: Arc::new(RwLock::new(HashMap::new())),
            ip_attempts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Check if a username is rate limited (5 attempts per 15 minutes)
    pub async fn is_username_limited(&self, username: &str) -> bool {
        let mut attempts = self.username_attempts.write().await;
        let cutoff = Utc::now() - Duration::minutes(15);

        let username_attempts = attempts.entry(username.to_lowercase()).or_default();
        username_attempts.retain(|time| *time > cutoff);

        username_attempts.len() >= 5
    }

    /// Record a failed login attempt for a username
    pub async fn record_failed_attempt(&self, username: &str) {
        let mut attempts = self.username_attempts.write().await;
        attempts
            .entry(username.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Clear failed attempts for a username (on successful login)
    pub async fn clear_username_attempts(&self, username: &str) {
        let mut attempts = self.username_attempts.write().await;
        attempts.remove(&username.to_lowercase());
    }

    /// Check if an IP is rate limited (10 requests per minute)
    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        let mut attempts = self.ip_attempts.write().await;
        let cutoff = Utc::now() - Duration::minutes(1);

        let ip_attempts = attempts.entry(ip).or_default();
        ip_attempts.retain(|time| *time > cutoff);

        ip_attempts.len() >= 10
    }

    /// Record a request from an IP
    pub async fn record_ip_request(&self, ip: IpAddr) {
        let mut attempts = self.ip_attempts.write().await;
        attempts.entry(ip).or_default().push(Utc::now());
    }

    /// Clean up stale entries (called periodically from a background task)
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let username_cutoff = now - Duration::minutes(15);
        let ip_cutoff = now - Duration::minutes(1);

        {
            let mut attempts = self.username_attempts.write().await;
            attempts.retain(|_, times| {
                times.retain(|time| *time > username_cutoff);
                !times.is_empty()
            });
        }

        {
            let mut attempts = self.ip_attempts.write().await;
            attempts.retain(|_, times| {
                times.retain(|time| *time > ip_cutoff);
                !times.is_empty()
            });
        }
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

    #[tokio::test]
    async fn test_username_not_limited_under_threshold() {
        let limiter = LoginRateLimiter::new();
        for _ in 0..4 {
            limiter.record_failed_attempt("alice").await;
        }
        assert!(!limiter.is_username_limited("alice").await);
    }

    #[tokio::test]
    async fn test_username_limited_at_threshold() {
        let limiter = LoginRateLimiter::new();
        for _ in 0..5 {
            limiter.record_failed_attempt("alice").await;
        }
        assert!(limiter.is_username_limited("alice").await);
    }

    #[tokio::test]
    async fn test_username_check_is_case_insensitive() {
        let limiter = LoginRateLimiter::new();
        for _ in 0..5 {
            limiter.record_failed_attempt("Alice").await;
        }
        assert!(limiter.is_username_limited("alice").await);
    }

    #[tokio::test]
    async fn test_clear_resets_username() {
        let limiter = LoginRateLimiter::new();
        for _ in 0..5 {
            limiter.record_failed_attempt("alice").await;
        }
        limiter.clear_username_attempts("alice").await;
        assert!(!limiter.is_username_limited("alice").await);
    }

    #[tokio::test]
    async fn test_ip_limited_at_threshold() {
        let limiter = LoginRateLimiter::new();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        for _ in 0..10 {
            limiter.record_ip_request(ip).await;
        }
        assert!(limiter.is_ip_limited(ip).await);

        let other: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(!limiter.is_ip_limited(other).await);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_entries() {
        let limiter = LoginRateLimiter::new();
        limiter.record_failed_attempt("alice").await;
        limiter.cleanup().await;
        // Recent attempts survive cleanup
        limiter.record_failed_attempt("alice").await;
        for _ in 0..3 {
            limiter.record_failed_attempt("alice").await;
        }
        assert!(limiter.is_username_limited("alice").await);
    }
}
