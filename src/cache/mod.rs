//! In-Process Caches
//!
//! Process-wide bounded TTL caches:
//! - Reference-data caches (customer/inventory/pricing) keyed by order id
//! - Partner and business-unit caches keyed by name
//! - Dedup cache keyed by the event scope key
//!
//! All caches are injected dependencies and expose stats/invalidate for
//! tests and the admin surface.

pub mod ttl_cache;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::CacheConfig;
use crate::models::{Customer, Inventory, PartnerStatus, Pricing, UnitStatus};

pub use ttl_cache::{CacheStats, TtlCache};

/// Bundle of all process-wide caches.
pub struct CacheManager {
    pub customers: Arc<TtlCache<Customer>>,
    pub inventory: Arc<TtlCache<Inventory>>,
    pub pricing: Arc<TtlCache<Pricing>>,
    pub partners: Arc<TtlCache<PartnerStatus>>,
    pub units: Arc<TtlCache<UnitStatus>>,
    pub dedup: Arc<TtlCache<DateTime<Utc>>>,
}

impl CacheManager {
    pub fn new(cfg: &CacheConfig) -> Self {
        let data_ttl = Duration::from_secs(cfg.data.ttl_minutes * 60);
        let partner_ttl = Duration::from_secs(cfg.partner.ttl_minutes * 60);
        let dedup_ttl = Duration::from_secs(cfg.dedup.ttl_minutes * 60);

        Self {
            customers: Arc::new(TtlCache::new("customer", cfg.data.max_size, data_ttl)),
            inventory: Arc::new(TtlCache::new("inventory", cfg.data.max_size, data_ttl)),
            pricing: Arc::new(TtlCache::new("pricing", cfg.data.max_size, data_ttl)),
            partners: Arc::new(TtlCache::new("partner", cfg.partner.max_size, partner_ttl)),
            units: Arc::new(TtlCache::new("unit", cfg.partner.max_size, partner_ttl)),
            dedup: Arc::new(TtlCache::new("dedup", cfg.dedup.max_size, dedup_ttl)),
        }
    }

    /// Start one periodic sweep task per cache so sizes stay honest even
    /// on idle keys.
    pub fn start_cleanup_tasks(&self) {
        ttl_cache::start_cleanup(self.customers.clone(), Duration::from_secs(60));
        ttl_cache::start_cleanup(self.inventory.clone(), Duration::from_secs(60));
        ttl_cache::start_cleanup(self.pricing.clone(), Duration::from_secs(60));
        ttl_cache::start_cleanup(self.partners.clone(), Duration::from_secs(120));
        ttl_cache::start_cleanup(self.units.clone(), Duration::from_secs(120));
        ttl_cache::start_cleanup(self.dedup.clone(), Duration::from_secs(300));
    }

    /// Stats for every cache, for the admin surface and tests.
    pub fn stats(&self) -> Vec<(&'static str, CacheStats)> {
        vec![
            ("customer", self.customers.stats()),
            ("inventory", self.inventory.stats()),
            ("pricing", self.pricing.stats()),
            ("partner", self.partners.stats()),
            ("unit", self.units.stats()),
            ("dedup", self.dedup.stats()),
        ]
    }

    pub fn invalidate_all(&self) {
        self.customers.invalidate_all();
        self.inventory.invalidate_all();
        self.pricing.invalidate_all();
        self.partners.invalidate_all();
        self.units.invalidate_all();
        self.dedup.invalidate_all();
    }
}
