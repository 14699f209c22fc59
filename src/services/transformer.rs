//! Business Transformer
//!
//! Computes the final price and shipping status for each order from the
//! preloaded context. The per-order computation is pure; the service fans
//! orders out under the global processing semaphore and collects every
//! order into exactly one of the success or failure lists.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::PipelineError;
use crate::models::{
    CustomerTier, FailedOrder, Order, ProcessedOrder, ProcessingContext, ShippingStatus,
};

/// Customer name used when reference data is absent for an order.
const UNKNOWN_CUSTOMER: &str = "Unknown";

/// Quantity above which an order ships immediately.
const READY_THRESHOLD: i32 = 10;

pub struct OrderTransformer {
    semaphore: Arc<Semaphore>,
    processed_by: String,
}

impl OrderTransformer {
    pub fn new(processing_concurrency: usize, processed_by: String) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(processing_concurrency.max(1))),
            processed_by,
        }
    }

    /// Transform all orders concurrently, one permit per in-flight order.
    ///
    /// Failures (including panics and cancellations inside a worker) are
    /// collected as `FailedOrder`s; the batch always accounts for every
    /// input order.
    pub async fn process_orders(
        &self,
        orders: Vec<Order>,
        ctx: Arc<ProcessingContext>,
    ) -> (Vec<ProcessedOrder>, Vec<FailedOrder>) {
        let mut successes = Vec::with_capacity(orders.len());
        let mut failures = Vec::new();
        if orders.is_empty() {
            return (successes, failures);
        }

        let mut tasks = JoinSet::new();
        let mut order_by_task = HashMap::new();
        for order in &orders {
            let fallback = order.clone();
            let order = order.clone();
            let ctx = ctx.clone();
            let semaphore = self.semaphore.clone();
            let processed_by = self.processed_by.clone();
            let handle = tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return Err(FailedOrder {
                            error_message: "processing semaphore closed".to_string(),
                            exception_type: "Cancelled".to_string(),
                            order,
                        })
                    }
                };
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    transform_order(&order, &ctx, &processed_by)
                }));
                match outcome {
                    Ok(Ok(processed)) => Ok(processed),
                    Ok(Err(err)) => Err(FailedOrder {
                        error_message: err.to_string(),
                        exception_type: "TransformError".to_string(),
                        order,
                    }),
                    Err(_) => Err(FailedOrder {
                        error_message: "transform panicked".to_string(),
                        exception_type: "Panic".to_string(),
                        order,
                    }),
                }
            });
            order_by_task.insert(handle.id(), fallback);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, Ok(processed))) => successes.push(processed),
                Ok((_, Err(failed))) => failures.push(failed),
                Err(join_err) => {
                    // Worker died before producing a result; attribute the
                    // loss to its order so the batch still adds up.
                    let exception_type = if join_err.is_cancelled() {
                        "Cancelled"
                    } else {
                        "Panic"
                    };
                    if let Some(order) = order_by_task.get(&join_err.id()) {
                        failures.push(FailedOrder {
                            order: order.clone(),
                            error_message: join_err.to_string(),
                            exception_type: exception_type.to_string(),
                        });
                    }
                }
            }
        }

        debug!(
            successes = successes.len(),
            failures = failures.len(),
            "transform stage finished"
        );
        (successes, failures)
    }
}

/// Pure per-order transform.
///
/// Pricing: `round2(base · (1 − discount_eff) · (1 + tax))` with
/// `discount_eff = discount + tier bonus`, half-up at scale 2. Absent
/// pricing yields a zero price; absent customer degrades to the unknown
/// customer; absent inventory yields `PENDING_INVENTORY`.
pub fn transform_order(
    order: &Order,
    ctx: &ProcessingContext,
    processed_by: &str,
) -> Result<ProcessedOrder, PipelineError> {
    let customer = ctx.customer_for(&order.order_id);
    let inventory = ctx.inventory_for(&order.order_id);
    let pricing = ctx.pricing_for(&order.order_id);

    let tier = customer.map(|c| c.tier).unwrap_or(CustomerTier::Standard);

    let final_price = match pricing {
        Some(pricing) => compute_final_price(order, pricing, tier)?,
        None => Decimal::new(0, 2),
    };

    let status = match inventory {
        Some(inventory) => shipping_status(order, inventory)?,
        None => ShippingStatus::PendingInventory,
    };

    Ok(ProcessedOrder {
        order_id: order.order_id.clone(),
        customer_id: customer
            .map(|c| c.customer_id.clone())
            .unwrap_or_else(|| order.customer_id.clone()),
        customer_name: customer
            .map(|c| c.name.clone())
            .unwrap_or_else(|| UNKNOWN_CUSTOMER.to_string()),
        customer_tier: tier,
        final_price,
        warehouse_location: inventory.and_then(|i| i.warehouse_location.clone()),
        status,
        processed_at: Utc::now(),
        processed_by: processed_by.to_string(),
    })
}

fn compute_final_price(
    order: &Order,
    pricing: &crate::models::Pricing,
    tier: CustomerTier,
) -> Result<Decimal, PipelineError> {
    if pricing.discount < Decimal::ZERO || pricing.discount > Decimal::ONE {
        return Err(PipelineError::Transform {
            order_id: order.order_id.clone(),
            message: format!("discount {} outside [0, 1]", pricing.discount),
        });
    }
    if pricing.tax_rate < Decimal::ZERO || pricing.tax_rate > Decimal::ONE {
        return Err(PipelineError::Transform {
            order_id: order.order_id.clone(),
            message: format!("tax rate {} outside [0, 1]", pricing.tax_rate),
        });
    }

    // The tier bonus can push the combined discount past 100%; the price
    // floors at zero rather than going negative.
    let effective_discount = (pricing.discount + tier.discount_bonus()).min(Decimal::ONE);
    let price = pricing.base_price * (Decimal::ONE - effective_discount)
        * (Decimal::ONE + pricing.tax_rate);
    Ok(price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

fn shipping_status(
    order: &Order,
    inventory: &crate::models::Inventory,
) -> Result<ShippingStatus, PipelineError> {
    let qty = inventory.quantity_available;
    if qty < 0 {
        return Err(PipelineError::Transform {
            order_id: order.order_id.clone(),
            message: format!("negative inventory quantity {}", qty),
        });
    }
    Ok(if qty > READY_THRESHOLD {
        ShippingStatus::ReadyToShip
    } else if qty > 0 {
        ShippingStatus::LowStock
    } else {
        ShippingStatus::Backorder
    })
}
