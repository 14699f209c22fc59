//! Reference-Data Preloader
//!
//! Loads customer, inventory and pricing data for a list of order ids.
//! The three data types load concurrently; within each type the id list
//! is chunked and the chunks fan out under the db-concurrency semaphore.
//! A chunk that exhausts its retries only costs its own keys.
//!
//! The caching preloader wraps the base loader with the reference-data
//! caches: hits are served locally, only misses touch the store, and
//! fetched values are written back.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::CacheManager;
use crate::db::ReferenceReader;
use crate::error::PipelineError;
use crate::models::{Customer, Inventory, Pricing, ProcessingContext};

#[async_trait]
pub trait Preloader: Send + Sync {
    /// Build the processing context for the given order ids. Returns only
    /// after all three data types are loaded.
    async fn preload(&self, order_ids: &[String]) -> Result<ProcessingContext, PipelineError>;
}

pub struct DataPreloader {
    repo: Arc<dyn ReferenceReader>,
    db_semaphore: Arc<Semaphore>,
    db_concurrency: usize,
}

impl DataPreloader {
    pub fn new(repo: Arc<dyn ReferenceReader>, db_concurrency: usize) -> Self {
        let db_concurrency = db_concurrency.max(1);
        Self {
            repo,
            db_semaphore: Arc::new(Semaphore::new(db_concurrency)),
            db_concurrency,
        }
    }

    pub async fn load_customers(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Customer>, PipelineError> {
        if self.db_concurrency <= 1 {
            return Ok(self.repo.batch_fetch_customer_data(ids).await);
        }
        let repo = self.repo.clone();
        self.load_chunked("customer", ids, move |chunk| {
            let repo = repo.clone();
            async move { repo.fetch_customer_chunk(&chunk).await }
        })
        .await
    }

    pub async fn load_inventory(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Inventory>, PipelineError> {
        if self.db_concurrency <= 1 {
            return Ok(self.repo.batch_fetch_inventory_data(ids).await);
        }
        let repo = self.repo.clone();
        self.load_chunked("inventory", ids, move |chunk| {
            let repo = repo.clone();
            async move { repo.fetch_inventory_chunk(&chunk).await }
        })
        .await
    }

    pub async fn load_pricing(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Pricing>, PipelineError> {
        if self.db_concurrency <= 1 {
            return Ok(self.repo.batch_fetch_pricing_data(ids).await);
        }
        let repo = self.repo.clone();
        self.load_chunked("pricing", ids, move |chunk| {
            let repo = repo.clone();
            async move { repo.fetch_pricing_chunk(&chunk).await }
        })
        .await
    }

    /// Fan chunks of `ids` out over the db semaphore and merge the maps.
    /// Chunk keys are disjoint, so the merge is conflict-free. Exhausted
    /// chunks are dropped; a panicked chunk task is fatal.
    async fn load_chunked<T, F, Fut>(
        &self,
        reader: &'static str,
        ids: &[String],
        fetch: F,
    ) -> Result<HashMap<String, T>, PipelineError>
    where
        T: Send + 'static,
        F: Fn(Vec<String>) -> Fut,
        Fut: std::future::Future<Output = Result<HashMap<String, T>, PipelineError>>
            + Send
            + 'static,
    {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let chunk_size = self.repo.chunk_size().max(1);
        let mut tasks = JoinSet::new();
        for chunk in ids.chunks(chunk_size) {
            let semaphore = self.db_semaphore.clone();
            let future = fetch(chunk.to_vec());
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| PipelineError::Fatal("db semaphore closed".to_string()))?;
                future.await
            });
        }

        let mut merged = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(map)) => {
                    merged.extend(map);
                }
                Ok(Err(PipelineError::ExhaustedData { attempts, source })) => {
                    warn!(
                        reader,
                        attempts,
                        error = %source,
                        "chunk dropped after exhausting retries"
                    );
                    crate::metrics::record_chunk_failure(reader);
                }
                Ok(Err(other)) => return Err(other),
                Err(join_err) => {
                    return Err(PipelineError::Fatal(format!(
                        "{} chunk task failed: {}",
                        reader, join_err
                    )));
                }
            }
        }
        Ok(merged)
    }
}

#[async_trait]
impl Preloader for DataPreloader {
    async fn preload(&self, order_ids: &[String]) -> Result<ProcessingContext, PipelineError> {
        if order_ids.is_empty() {
            return Ok(ProcessingContext::default());
        }

        let (customers, inventory, pricing) = tokio::join!(
            self.load_customers(order_ids),
            self.load_inventory(order_ids),
            self.load_pricing(order_ids),
        );

        let ctx = ProcessingContext {
            customers: customers?,
            inventory: inventory?,
            pricing: pricing?,
        };
        debug!(
            orders = order_ids.len(),
            customers = ctx.customers.len(),
            inventory = ctx.inventory.len(),
            pricing = ctx.pricing.len(),
            "reference data preloaded"
        );
        Ok(ctx)
    }
}

/// Cache layer over the base preloader.
pub struct CachingPreloader {
    inner: DataPreloader,
    caches: Arc<CacheManager>,
}

impl CachingPreloader {
    pub fn new(inner: DataPreloader, caches: Arc<CacheManager>) -> Self {
        Self { inner, caches }
    }

    async fn customers_cached(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Customer>, PipelineError> {
        let mut found = HashMap::new();
        let mut missing = Vec::new();
        for id in ids {
            match self.caches.customers.get(id) {
                Some(customer) => {
                    found.insert(id.clone(), customer);
                }
                None => missing.push(id.clone()),
            }
        }
        if missing.is_empty() {
            return Ok(found);
        }
        let fetched = self.inner.load_customers(&missing).await?;
        for (id, customer) in &fetched {
            self.caches.customers.insert(id.clone(), customer.clone());
        }
        found.extend(fetched);
        Ok(found)
    }

    async fn inventory_cached(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Inventory>, PipelineError> {
        let mut found = HashMap::new();
        let mut missing = Vec::new();
        for id in ids {
            match self.caches.inventory.get(id) {
                Some(inventory) => {
                    found.insert(id.clone(), inventory);
                }
                None => missing.push(id.clone()),
            }
        }
        if missing.is_empty() {
            return Ok(found);
        }
        let fetched = self.inner.load_inventory(&missing).await?;
        for (id, inventory) in &fetched {
            self.caches.inventory.insert(id.clone(), inventory.clone());
        }
        found.extend(fetched);
        Ok(found)
    }

    async fn pricing_cached(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Pricing>, PipelineError> {
        let mut found = HashMap::new();
        let mut missing = Vec::new();
        for id in ids {
            match self.caches.pricing.get(id) {
                Some(pricing) => {
                    found.insert(id.clone(), pricing);
                }
                None => missing.push(id.clone()),
            }
        }
        if missing.is_empty() {
            return Ok(found);
        }
        let fetched = self.inner.load_pricing(&missing).await?;
        for (id, pricing) in &fetched {
            self.caches.pricing.insert(id.clone(), pricing.clone());
        }
        found.extend(fetched);
        Ok(found)
    }
}

#[async_trait]
impl Preloader for CachingPreloader {
    async fn preload(&self, order_ids: &[String]) -> Result<ProcessingContext, PipelineError> {
        if order_ids.is_empty() {
            return Ok(ProcessingContext::default());
        }

        let (customers, inventory, pricing) = tokio::join!(
            self.customers_cached(order_ids),
            self.inventory_cached(order_ids),
            self.pricing_cached(order_ids),
        );

        Ok(ProcessingContext {
            customers: customers?,
            inventory: inventory?,
            pricing: pricing?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::models::{CustomerTier, Order, PartnerStatus, UnitStatus};
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct FakeRepo {
        chunk_size: usize,
        customers: HashMap<String, Customer>,
        inventory: HashMap<String, Inventory>,
        pricing: HashMap<String, Pricing>,
        poison: HashSet<String>,
        customer_chunk_calls: AtomicU32,
        requested_ids: Mutex<Vec<String>>,
    }

    impl FakeRepo {
        fn new(chunk_size: usize) -> Self {
            Self {
                chunk_size,
                customers: HashMap::new(),
                inventory: HashMap::new(),
                pricing: HashMap::new(),
                poison: HashSet::new(),
                customer_chunk_calls: AtomicU32::new(0),
                requested_ids: Mutex::new(Vec::new()),
            }
        }

        fn seed(mut self, id: &str) -> Self {
            self.customers.insert(
                id.to_string(),
                Customer {
                    customer_id: format!("C-{}", id),
                    name: format!("Customer {}", id),
                    email: None,
                    tier: CustomerTier::Gold,
                },
            );
            self.inventory.insert(
                id.to_string(),
                Inventory {
                    order_id: id.to_string(),
                    sku: format!("SKU-{}", id),
                    quantity_available: 20,
                    warehouse_location: Some("WH-1".to_string()),
                },
            );
            self.pricing.insert(
                id.to_string(),
                Pricing {
                    order_id: id.to_string(),
                    base_price: dec!(100),
                    discount: dec!(0),
                    tax_rate: dec!(0.08),
                },
            );
            self
        }
    }

    #[async_trait]
    impl ReferenceReader for FakeRepo {
        fn chunk_size(&self) -> usize {
            self.chunk_size
        }

        async fn fetch_orders_chunk(&self, _ids: &[String]) -> Result<Vec<Order>, PipelineError> {
            Ok(Vec::new())
        }

        async fn fetch_customer_chunk(
            &self,
            ids: &[String],
        ) -> Result<HashMap<String, Customer>, PipelineError> {
            self.customer_chunk_calls.fetch_add(1, Ordering::SeqCst);
            self.requested_ids.lock().unwrap().extend(ids.iter().cloned());
            if ids.iter().any(|id| self.poison.contains(id)) {
                return Err(PipelineError::ExhaustedData {
                    attempts: 3,
                    source: sqlx::Error::PoolTimedOut,
                });
            }
            Ok(ids
                .iter()
                .filter_map(|id| self.customers.get(id).map(|c| (id.clone(), c.clone())))
                .collect())
        }

        async fn fetch_inventory_chunk(
            &self,
            ids: &[String],
        ) -> Result<HashMap<String, Inventory>, PipelineError> {
            Ok(ids
                .iter()
                .filter_map(|id| self.inventory.get(id).map(|v| (id.clone(), v.clone())))
                .collect())
        }

        async fn fetch_pricing_chunk(
            &self,
            ids: &[String],
        ) -> Result<HashMap<String, Pricing>, PipelineError> {
            Ok(ids
                .iter()
                .filter_map(|id| self.pricing.get(id).map(|v| (id.clone(), v.clone())))
                .collect())
        }

        async fn find_trading_partner_by_name(
            &self,
            _name: &str,
        ) -> Result<Option<PartnerStatus>, PipelineError> {
            Ok(None)
        }

        async fn find_business_unit_by_name(
            &self,
            _name: &str,
        ) -> Result<Option<UnitStatus>, PipelineError> {
            Ok(None)
        }
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_preload_fills_all_three_maps() {
        let repo = Arc::new(FakeRepo::new(2).seed("a").seed("b").seed("c"));
        let preloader = DataPreloader::new(repo, 4);
        let ctx = preloader.preload(&ids(&["a", "b", "c"])).await.unwrap();
        assert_eq!(ctx.customers.len(), 3);
        assert_eq!(ctx.inventory.len(), 3);
        assert_eq!(ctx.pricing.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_input_short_circuits() {
        let repo = Arc::new(FakeRepo::new(2));
        let preloader = DataPreloader::new(repo.clone(), 4);
        let ctx = preloader.preload(&[]).await.unwrap();
        assert!(ctx.customers.is_empty());
        assert_eq!(repo.customer_chunk_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_poisoned_chunk_degrades_to_absent_keys() {
        let mut repo = FakeRepo::new(2).seed("a").seed("b").seed("c").seed("d").seed("e");
        repo.poison.insert("c".to_string());
        let preloader = DataPreloader::new(Arc::new(repo), 4);

        let ctx = preloader.preload(&ids(&["a", "b", "c", "d", "e"])).await.unwrap();
        // The [c, d] chunk is gone; the other chunks survive.
        let mut keys: Vec<_> = ctx.customers.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "b", "e"]);
        // Inventory and pricing readers were unaffected.
        assert_eq!(ctx.inventory.len(), 5);
        assert_eq!(ctx.pricing.len(), 5);
    }

    #[tokio::test]
    async fn test_sequential_path_used_when_unparallel() {
        let repo = Arc::new(FakeRepo::new(2).seed("a").seed("b").seed("c"));
        let preloader = DataPreloader::new(repo, 1);
        let ctx = preloader.preload(&ids(&["a", "b", "c"])).await.unwrap();
        assert_eq!(ctx.customers.len(), 3);
    }

    #[tokio::test]
    async fn test_caching_preloader_skips_cached_ids() {
        let repo = Arc::new(FakeRepo::new(10).seed("a").seed("b"));
        let caches = Arc::new(CacheManager::new(&CacheConfig::default()));
        let preloader = CachingPreloader::new(DataPreloader::new(repo.clone(), 4), caches);

        let first = preloader.preload(&ids(&["a", "b"])).await.unwrap();
        assert_eq!(first.customers.len(), 2);

        let second = preloader.preload(&ids(&["a", "b"])).await.unwrap();
        assert_eq!(second.customers.len(), 2);

        // Second pass was served entirely from cache.
        let requested = repo.requested_ids.lock().unwrap();
        assert_eq!(requested.len(), 2);
    }

    #[tokio::test]
    async fn test_caching_preloader_fetches_only_misses() {
        let repo = Arc::new(FakeRepo::new(10).seed("a").seed("b").seed("c"));
        let caches = Arc::new(CacheManager::new(&CacheConfig::default()));
        let preloader = CachingPreloader::new(DataPreloader::new(repo.clone(), 4), caches);

        preloader.preload(&ids(&["a"])).await.unwrap();
        preloader.preload(&ids(&["a", "b", "c"])).await.unwrap();

        let requested = repo.requested_ids.lock().unwrap();
        // "a" was requested once; the second pass only asked for b and c.
        assert_eq!(requested.iter().filter(|id| id.as_str() == "a").count(), 1);
    }
}
