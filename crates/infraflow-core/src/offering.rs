//! Offering selection

use crate::topology::OfferingTier;
use infraflow_store::{
    DatabaseInfraOffering, Offering, Plan, PlanError, ResourceStore, StoreError,
};
use uuid::Uuid;

/// Strong and weak offerings precomputed from a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferingTiers {
    pub strong: Offering,
    pub weak: Offering,
}

impl OfferingTiers {
    pub fn from_plan(plan: &Plan) -> Result<Self, PlanError> {
        Ok(Self {
            strong: plan.stronger_offering()?.clone(),
            weak: plan.weaker_offering()?.clone(),
        })
    }

    pub fn offering(&self, tier: OfferingTier) -> &Offering {
        match tier {
            OfferingTier::Strong => &self.strong,
            OfferingTier::Weak => &self.weak,
        }
    }
}

/// Make sure the infra has its offering assignment
///
/// Only the first call for an infra creates a row; returns whether it did.
pub async fn ensure_infra_offering(
    store: &dyn ResourceStore,
    infra_id: Uuid,
    offering: &Offering,
) -> Result<bool, StoreError> {
    let created = store
        .create_infra_offering_if_absent(&DatabaseInfraOffering {
            infra_id,
            offering_id: offering.id.clone(),
        })
        .await?;

    if created {
        tracing::info!("Created offering assignment {} for infra {}", offering.id, infra_id);
    }
    Ok(created)
}
