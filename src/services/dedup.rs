//! Event Deduplication
//!
//! At-least-once delivery plus rebalance-induced retry can hand the same
//! (partner, unit) event to the pipeline more than once. A successful
//! claim on the dedup key suppresses the later copies for the key's TTL.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::cache::TtlCache;
use crate::models::OrderEvent;

pub struct DedupService {
    cache: Arc<TtlCache<DateTime<Utc>>>,
}

impl DedupService {
    pub fn new(cache: Arc<TtlCache<DateTime<Utc>>>) -> Self {
        Self { cache }
    }

    /// Atomically claim the event's scope key. Returns true iff this event
    /// is the first holder; a true result keeps the claim until the TTL
    /// lapses.
    pub fn try_acquire(&self, event: &OrderEvent) -> bool {
        let key = event.dedup_key();
        let acquired = self.cache.insert_if_absent(&key, Utc::now());
        if !acquired {
            info!(
                event_id = %event.event_id,
                dedup_key = %key,
                "duplicate event suppressed"
            );
        }
        acquired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn event(id: &str, partner: &str, unit: &str) -> OrderEvent {
        OrderEvent {
            event_id: id.to_string(),
            event_type: "SINGLE_ORDER".to_string(),
            trading_partner_name: partner.to_string(),
            business_unit_name: unit.to_string(),
        }
    }

    fn service(ttl: Duration) -> DedupService {
        DedupService::new(Arc::new(TtlCache::new("dedup", 100, ttl)))
    }

    #[test]
    fn test_second_identical_scope_is_suppressed() {
        let dedup = service(Duration::from_secs(60));
        assert!(dedup.try_acquire(&event("e1", "ACME", "WEST")));
        assert!(!dedup.try_acquire(&event("e2", "ACME", "WEST")));
    }

    #[test]
    fn test_different_scopes_do_not_collide() {
        let dedup = service(Duration::from_secs(60));
        assert!(dedup.try_acquire(&event("e1", "ACME", "WEST")));
        assert!(dedup.try_acquire(&event("e2", "ACME", "EAST")));
        assert!(dedup.try_acquire(&event("e3", "GLOBEX", "WEST")));
    }

    #[test]
    fn test_claim_expires_with_ttl() {
        let dedup = service(Duration::from_millis(20));
        assert!(dedup.try_acquire(&event("e1", "ACME", "WEST")));
        std::thread::sleep(Duration::from_millis(30));
        assert!(dedup.try_acquire(&event("e2", "ACME", "WEST")));
    }
}
