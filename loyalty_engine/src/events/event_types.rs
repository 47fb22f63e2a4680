use crate::{
    db::traits::ApplyOutcome,
    db_types::{AccrualResolution, OrderNumber, OrderStatus, Points},
};

/// Published after an accrual resolution has been persisted for a pending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAccruedEvent {
    pub order: OrderNumber,
    pub status: OrderStatus,
    /// The amount that was added to the owner's balance.
    pub credited: Points,
}

impl OrderAccruedEvent {
    pub fn new(resolution: &AccrualResolution, credited: Points) -> Self {
        Self { order: resolution.order.clone(), status: resolution.status, credited }
    }

    /// Builds the event for a ledger outcome. Resolutions for orders that were already final produce no event.
    pub fn from_outcome(resolution: &AccrualResolution, outcome: ApplyOutcome) -> Option<Self> {
        match outcome {
            ApplyOutcome::Applied { credited } => Some(Self::new(resolution, credited)),
            ApplyOutcome::AlreadyFinal => None,
        }
    }
}
