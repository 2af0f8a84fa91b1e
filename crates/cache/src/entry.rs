use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A cached value and the moment it was stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(value: Value, created_at: DateTime<Utc>) -> Self {
        Self { value, created_at }
    }

    /// Age at `now`; entries stamped in the future count as brand new
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) >= ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expiry_boundary() {
        let created = Utc::now();
        let entry = CacheEntry::new(json!(1), created);
        let ttl = Duration::from_secs(10);

        assert!(!entry.is_expired(created + chrono::Duration::seconds(9), ttl));
        assert!(entry.is_expired(created + chrono::Duration::seconds(10), ttl));
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let now = Utc::now();
        let entry = CacheEntry::new(json!("x"), now + chrono::Duration::hours(1));
        assert_eq!(entry.age(now), Duration::ZERO);
    }
}
