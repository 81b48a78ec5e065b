//! Bundle allocation
//!
//! Spreads the VMs of a plan over its active bundles round-robin. The cursor
//! lives in the resource store, so independent runs continue the rotation
//! where the previous run for the same infra (or plan) stopped.

use crate::error::AllocationError;
use infraflow_store::{Bundle, BundleId, ResourceStore};
use uuid::Uuid;

/// Id of the bundle following `current` in `bundles`, wrapping at the end
///
/// An unknown `current` restarts the rotation at the first bundle.
/// `bundles` must not be empty.
pub fn next_bundle<'a>(current: &str, bundles: &'a [Bundle]) -> &'a Bundle {
    match bundles.iter().position(|b| b.id == current) {
        Some(pos) => &bundles[(pos + 1) % bundles.len()],
        None => &bundles[0],
    }
}

fn pick(last: Option<&str>, previous: Option<&Bundle>, active: &[Bundle]) -> BundleId {
    if active.len() == 1 {
        return active[0].id.clone();
    }

    // Within a run, rotate from the bundle just used; the first VM
    // continues from the stored cursor.
    let current = previous.map(|b| b.id.as_str()).or(last);
    match current {
        Some(current) => next_bundle(current, active).id.clone(),
        None => active[0].id.clone(),
    }
}

pub struct BundleAllocator<'a> {
    store: &'a dyn ResourceStore,
}

impl<'a> BundleAllocator<'a> {
    pub fn new(store: &'a dyn ResourceStore) -> Self {
        Self { store }
    }

    /// Choose the bundle for the next VM and record it as last used
    ///
    /// `previous` is the bundle given to the preceding VM of the same run,
    /// `None` for the first VM.
    pub async fn allocate(
        &self,
        plan_id: &str,
        infra_id: Uuid,
        previous: Option<&Bundle>,
        active: &[Bundle],
    ) -> Result<Bundle, AllocationError> {
        if active.is_empty() {
            return Err(AllocationError::NoActiveBundle(plan_id.to_string()));
        }

        let picked = self
            .store
            .advance_bundle_cursor(plan_id, infra_id, &|last| pick(last, previous, active))
            .await?;

        let bundle = active
            .iter()
            .find(|b| b.id == picked)
            .cloned()
            .ok_or(AllocationError::UnknownBundle(picked))?;

        tracing::debug!("Allocated bundle {} for infra {}", bundle.id, infra_id);
        Ok(bundle)
    }
}
