use std::future::Future;

use crate::{
    db::traits::ApplyOutcome,
    db_types::{AccrualResolution, Order},
};

/// Finds the orders that still need a resolution from the accrual service.
pub trait PendingOrders {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns every order whose status is not final. No ordering is guaranteed.
    fn list_pending_orders(&self) -> impl Future<Output = Result<Vec<Order>, Self::Error>> + Send;
}

/// Persists accrual resolutions.
pub trait AccrualLedger {
    type Error: std::error::Error + Send + Sync + 'static;

    /// In a single atomic transaction,
    /// * resolves the owner of the order,
    /// * credits the owner's balance with the accrual if the new status credits the balance,
    /// * sets the order's status and accrual.
    ///
    /// Only pending orders are updated, so applying the same resolution twice never credits the balance twice. If the
    /// order is already final, [`ApplyOutcome::AlreadyFinal`] is returned and nothing changes.
    fn apply_accrual_result(
        &self,
        resolution: &AccrualResolution,
    ) -> impl Future<Output = Result<ApplyOutcome, Self::Error>> + Send;
}
