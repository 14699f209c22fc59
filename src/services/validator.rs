//! Partner/Unit Validation
//!
//! Cache-aside lookup of trading-partner and business-unit status. An
//! event is skipped only when both sides are non-ACTIVE; a missing record
//! counts as non-ACTIVE. Found records are cached; misses are not
//! negatively cached, so later lookups retry the store.

use std::sync::Arc;

use tracing::debug;

use crate::cache::TtlCache;
use crate::db::ReferenceReader;
use crate::error::PipelineError;
use crate::models::{OrderEvent, PartnerStatus, UnitStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationDecision {
    Process,
    Skip(String),
}

pub struct PartnerValidator {
    repo: Arc<dyn ReferenceReader>,
    partners: Arc<TtlCache<PartnerStatus>>,
    units: Arc<TtlCache<UnitStatus>>,
}

impl PartnerValidator {
    pub fn new(
        repo: Arc<dyn ReferenceReader>,
        partners: Arc<TtlCache<PartnerStatus>>,
        units: Arc<TtlCache<UnitStatus>>,
    ) -> Self {
        Self {
            repo,
            partners,
            units,
        }
    }

    pub async fn validate_event(
        &self,
        event: &OrderEvent,
    ) -> Result<ValidationDecision, PipelineError> {
        let partner = self.partner_status(&event.trading_partner_name).await?;
        let unit = self.unit_status(&event.business_unit_name).await?;

        let partner_active = partner.as_ref().map(|p| p.status.is_active()).unwrap_or(false);
        let unit_active = unit.as_ref().map(|u| u.status.is_active()).unwrap_or(false);

        if !partner_active && !unit_active {
            let reason = format!(
                "partner {} is {}, unit {} is {}",
                event.trading_partner_name,
                partner.map(|p| p.status.to_string()).unwrap_or_else(|| "MISSING".to_string()),
                event.business_unit_name,
                unit.map(|u| u.status.to_string()).unwrap_or_else(|| "MISSING".to_string()),
            );
            return Ok(ValidationDecision::Skip(reason));
        }

        Ok(ValidationDecision::Process)
    }

    async fn partner_status(&self, name: &str) -> Result<Option<PartnerStatus>, PipelineError> {
        if let Some(cached) = self.partners.get(name) {
            return Ok(Some(cached));
        }
        let found = self.repo.find_trading_partner_by_name(name).await?;
        if let Some(status) = &found {
            self.partners.insert(name.to_string(), status.clone());
        } else {
            debug!(partner = name, "trading partner not found");
        }
        Ok(found)
    }

    async fn unit_status(&self, name: &str) -> Result<Option<UnitStatus>, PipelineError> {
        if let Some(cached) = self.units.get(name) {
            return Ok(Some(cached));
        }
        let found = self.repo.find_business_unit_by_name(name).await?;
        if let Some(status) = &found {
            self.units.insert(name.to_string(), status.clone());
        } else {
            debug!(unit = name, "business unit not found");
        }
        Ok(found)
    }
}
