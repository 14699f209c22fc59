//! Domain Models
//!
//! Wire-facing and internal types for the order-processing pipeline.

pub mod event;
pub mod order;
pub mod reference;

pub use event::OrderEvent;
pub use order::{
    FailedOrder, GroupedMessage, Order, PipelineResult, ProcessedOrder, ShippingStatus,
    StageTimings, PENDING_STATUS,
};
pub use reference::{
    Customer, CustomerTier, EntityStatus, Inventory, PartnerStatus, Pricing, ProcessingContext,
    UnitStatus,
};
