use crate::model::*;

use super::error::StoreResultExt;
use super::{Engine, EngineError};

/// Per-unit price and duration of one cart line, resolved against the catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PricedLine {
    pub service: Service,
    /// Tier or base price of the service alone.
    pub service_price: Money,
    pub options: Vec<ServiceOption>,
}

impl PricedLine {
    pub fn unit_price(&self) -> Money {
        self.service_price + self.options.iter().map(|o| o.base_price).sum::<Money>()
    }

    pub fn unit_duration(&self) -> Minutes {
        self.service.duration_minutes + self.options.iter().map(|o| o.duration_minutes).sum::<Minutes>()
    }
}

impl Engine {
    /// Effective unit price of a service: the tier for `vehicle_category_id`
    /// if one exists, otherwise the base price.
    pub async fn resolve_price(&self, service_id: Id, vehicle_category_id: Option<Id>) -> Result<Money, EngineError> {
        let service = self.load_service(service_id).await?;
        self.tier_or_base(&service, vehicle_category_id).await
    }

    pub(super) async fn tier_or_base(
        &self,
        service: &Service,
        vehicle_category_id: Option<Id>,
    ) -> Result<Money, EngineError> {
        let Some(category_id) = vehicle_category_id else {
            return Ok(service.base_price);
        };
        let tier = self
            .repos
            .catalog
            .get_price_tier(service.id, category_id)
            .await
            .context("load price tier")?;
        Ok(tier.map_or(service.base_price, |t| t.price))
    }

    pub(super) async fn load_service(&self, service_id: Id) -> Result<Service, EngineError> {
        self.repos
            .catalog
            .get_service(service_id)
            .await
            .context("load service")?
            .ok_or_else(|| EngineError::not_exist("service not found").with_detail("service_id", service_id))
    }

    /// Resolve a service plus its attached options. Options must belong to the service.
    pub(super) async fn price_line(
        &self,
        service_id: Id,
        option_ids: &[Id],
        vehicle_category_id: Option<Id>,
    ) -> Result<PricedLine, EngineError> {
        let service = self.load_service(service_id).await?;
        let service_price = self.tier_or_base(&service, vehicle_category_id).await?;
        let mut options = Vec::with_capacity(option_ids.len());
        for &option_id in option_ids {
            let option = self
                .repos
                .catalog
                .get_service_option(option_id)
                .await
                .context("load service option")?
                .ok_or_else(|| EngineError::not_exist("service option not found").with_detail("option_id", option_id))?;
            if option.service_id != service.id {
                return Err(EngineError::invalid("option does not belong to service")
                    .with_detail("option_id", option_id)
                    .with_detail("service_id", service.id));
            }
            options.push(option);
        }
        Ok(PricedLine {
            service,
            service_price,
            options,
        })
    }
}
