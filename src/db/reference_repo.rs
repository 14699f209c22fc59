//! Reference-Data Repository
//!
//! Typed batch readers over the relational store for customer, inventory
//! and pricing data keyed by order id, plus single-row partner/unit
//! lookups. Batch input is split into fixed-size chunks; each chunk is
//! retried independently and a chunk that exhausts its retries is dropped
//! from the merged result, leaving its keys absent downstream.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::warn;

use crate::config::DbTuningConfig;
use crate::error::PipelineError;
use crate::models::{Customer, Inventory, Order, PartnerStatus, Pricing, UnitStatus};

use super::retry::with_retry;

const ORDERS_SQL: &str = "SELECT order_id, customer_id, status, amount, created_at \
     FROM orders WHERE order_id = ANY($1)";

const CUSTOMERS_SQL: &str = "SELECT o.order_id, c.customer_id, c.name, c.email, c.tier \
     FROM customers c JOIN orders o ON c.customer_id = o.customer_id \
     WHERE o.order_id = ANY($1)";

const INVENTORY_SQL: &str = "SELECT oi.order_id, i.sku, i.quantity_available, i.warehouse_location \
     FROM inventory i JOIN order_items oi ON i.sku = oi.sku \
     WHERE oi.order_id = ANY($1)";

const PRICING_SQL: &str = "SELECT order_id, base_price, discount, tax_rate \
     FROM order_pricing WHERE order_id = ANY($1)";

const PARTNER_SQL: &str =
    "SELECT id, name, status, updated_at FROM trading_partners WHERE name = $1";

const UNIT_SQL: &str = "SELECT id, name, status, updated_at FROM business_units WHERE name = $1";

/// Read-side contract the pipeline consumes from the relational store.
///
/// The chunk-level readers issue exactly one (retried) query; the batch
/// readers are provided on top of them and tolerate per-chunk failures,
/// returning the union of successful chunks.
#[async_trait]
pub trait ReferenceReader: Send + Sync {
    /// Configured IN-clause chunk size.
    fn chunk_size(&self) -> usize;

    async fn fetch_orders_chunk(&self, ids: &[String]) -> Result<Vec<Order>, PipelineError>;

    async fn fetch_customer_chunk(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Customer>, PipelineError>;

    async fn fetch_inventory_chunk(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Inventory>, PipelineError>;

    async fn fetch_pricing_chunk(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Pricing>, PipelineError>;

    async fn find_trading_partner_by_name(
        &self,
        name: &str,
    ) -> Result<Option<PartnerStatus>, PipelineError>;

    async fn find_business_unit_by_name(
        &self,
        name: &str,
    ) -> Result<Option<UnitStatus>, PipelineError>;

    /// Orders for the given ids; missing ids omitted, failed chunks skipped.
    async fn find_orders_by_ids(&self, ids: &[String]) -> Vec<Order> {
        let mut merged = Vec::new();
        for chunk in ids.chunks(self.chunk_size().max(1)) {
            match self.fetch_orders_chunk(chunk).await {
                Ok(orders) => merged.extend(orders),
                Err(err) => {
                    warn!(reader = "orders", chunk_len = chunk.len(), error = %err,
                        "chunk failed, continuing with remaining chunks");
                    crate::metrics::record_chunk_failure("orders");
                }
            }
        }
        merged
    }

    async fn batch_fetch_customer_data(&self, ids: &[String]) -> HashMap<String, Customer> {
        let mut merged = HashMap::new();
        for chunk in ids.chunks(self.chunk_size().max(1)) {
            match self.fetch_customer_chunk(chunk).await {
                Ok(map) => merged.extend(map),
                Err(err) => {
                    warn!(reader = "customer", chunk_len = chunk.len(), error = %err,
                        "chunk failed, continuing with remaining chunks");
                    crate::metrics::record_chunk_failure("customer");
                }
            }
        }
        merged
    }

    async fn batch_fetch_inventory_data(&self, ids: &[String]) -> HashMap<String, Inventory> {
        let mut merged = HashMap::new();
        for chunk in ids.chunks(self.chunk_size().max(1)) {
            match self.fetch_inventory_chunk(chunk).await {
                Ok(map) => merged.extend(map),
                Err(err) => {
                    warn!(reader = "inventory", chunk_len = chunk.len(), error = %err,
                        "chunk failed, continuing with remaining chunks");
                    crate::metrics::record_chunk_failure("inventory");
                }
            }
        }
        merged
    }

    async fn batch_fetch_pricing_data(&self, ids: &[String]) -> HashMap<String, Pricing> {
        let mut merged = HashMap::new();
        for chunk in ids.chunks(self.chunk_size().max(1)) {
            match self.fetch_pricing_chunk(chunk).await {
                Ok(map) => merged.extend(map),
                Err(err) => {
                    warn!(reader = "pricing", chunk_len = chunk.len(), error = %err,
                        "chunk failed, continuing with remaining chunks");
                    crate::metrics::record_chunk_failure("pricing");
                }
            }
        }
        merged
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_id: String,
    customer_id: String,
    status: String,
    amount: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    order_id: String,
    customer_id: String,
    name: String,
    email: Option<String>,
    tier: String,
}

#[derive(sqlx::FromRow)]
struct InventoryRow {
    order_id: String,
    sku: String,
    quantity_available: i32,
    warehouse_location: Option<String>,
}

#[derive(sqlx::FromRow)]
struct PricingRow {
    order_id: String,
    base_price: Decimal,
    discount: Decimal,
    tax_rate: Decimal,
}

#[derive(sqlx::FromRow)]
struct MasterStatusRow {
    id: i64,
    name: String,
    status: String,
    updated_at: DateTime<Utc>,
}

/// Postgres-backed reference reader.
pub struct SqlReferenceRepository {
    pool: PgPool,
    tuning: DbTuningConfig,
}

impl SqlReferenceRepository {
    pub fn new(pool: PgPool, tuning: DbTuningConfig) -> Self {
        Self { pool, tuning }
    }
}

#[async_trait]
impl ReferenceReader for SqlReferenceRepository {
    fn chunk_size(&self) -> usize {
        self.tuning.chunk_size
    }

    async fn fetch_orders_chunk(&self, ids: &[String]) -> Result<Vec<Order>, PipelineError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.pool.clone();
        let ids = ids.to_vec();
        let rows: Vec<OrderRow> = with_retry("orders_chunk", self.tuning, move || {
            let pool = pool.clone();
            let ids = ids.clone();
            async move {
                sqlx::query_as::<_, OrderRow>(ORDERS_SQL)
                    .bind(ids)
                    .fetch_all(&pool)
                    .await
            }
        })
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Order {
                order_id: r.order_id,
                customer_id: r.customer_id,
                status: r.status,
                amount: r.amount,
                created_at: r.created_at,
            })
            .collect())
    }

    async fn fetch_customer_chunk(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Customer>, PipelineError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let pool = self.pool.clone();
        let ids = ids.to_vec();
        let rows: Vec<CustomerRow> = with_retry("customer_chunk", self.tuning, move || {
            let pool = pool.clone();
            let ids = ids.clone();
            async move {
                sqlx::query_as::<_, CustomerRow>(CUSTOMERS_SQL)
                    .bind(ids)
                    .fetch_all(&pool)
                    .await
            }
        })
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let tier = r.tier.parse().unwrap_or_default();
                (
                    r.order_id,
                    Customer {
                        customer_id: r.customer_id,
                        name: r.name,
                        email: r.email,
                        tier,
                    },
                )
            })
            .collect())
    }

    async fn fetch_inventory_chunk(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Inventory>, PipelineError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let pool = self.pool.clone();
        let ids = ids.to_vec();
        let rows: Vec<InventoryRow> = with_retry("inventory_chunk", self.tuning, move || {
            let pool = pool.clone();
            let ids = ids.clone();
            async move {
                sqlx::query_as::<_, InventoryRow>(INVENTORY_SQL)
                    .bind(ids)
                    .fetch_all(&pool)
                    .await
            }
        })
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.order_id.clone(),
                    Inventory {
                        order_id: r.order_id,
                        sku: r.sku,
                        quantity_available: r.quantity_available,
                        warehouse_location: r.warehouse_location,
                    },
                )
            })
            .collect())
    }

    async fn fetch_pricing_chunk(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Pricing>, PipelineError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let pool = self.pool.clone();
        let ids = ids.to_vec();
        let rows: Vec<PricingRow> = with_retry("pricing_chunk", self.tuning, move || {
            let pool = pool.clone();
            let ids = ids.clone();
            async move {
                sqlx::query_as::<_, PricingRow>(PRICING_SQL)
                    .bind(ids)
                    .fetch_all(&pool)
                    .await
            }
        })
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.order_id.clone(),
                    Pricing {
                        order_id: r.order_id,
                        base_price: r.base_price,
                        discount: r.discount,
                        tax_rate: r.tax_rate,
                    },
                )
            })
            .collect())
    }

    async fn find_trading_partner_by_name(
        &self,
        name: &str,
    ) -> Result<Option<PartnerStatus>, PipelineError> {
        let pool = self.pool.clone();
        let name = name.to_string();
        let row: Option<MasterStatusRow> = with_retry("partner_by_name", self.tuning, move || {
            let pool = pool.clone();
            let name = name.clone();
            async move {
                sqlx::query_as::<_, MasterStatusRow>(PARTNER_SQL)
                    .bind(name)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        Ok(row.map(|r| PartnerStatus {
            id: r.id,
            name: r.name,
            status: r.status.parse().unwrap_or(crate::models::EntityStatus::Inactive),
            updated_at: r.updated_at,
        }))
    }

    async fn find_business_unit_by_name(
        &self,
        name: &str,
    ) -> Result<Option<UnitStatus>, PipelineError> {
        let pool = self.pool.clone();
        let name = name.to_string();
        let row: Option<MasterStatusRow> = with_retry("unit_by_name", self.tuning, move || {
            let pool = pool.clone();
            let name = name.clone();
            async move {
                sqlx::query_as::<_, MasterStatusRow>(UNIT_SQL)
                    .bind(name)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        Ok(row.map(|r| UnitStatus {
            id: r.id,
            name: r.name,
            status: r.status.parse().unwrap_or(crate::models::EntityStatus::Inactive),
            updated_at: r.updated_at,
        }))
    }
}
