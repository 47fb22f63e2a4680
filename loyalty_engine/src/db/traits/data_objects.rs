use loyalty_common::Points;

/// The result of storing an uploaded order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOrderResult {
    Inserted,
    /// The same user uploaded this order number before.
    AlreadyOwned,
    /// Somebody else already uploaded this order number.
    OwnedByAnotherUser,
}

/// The result of applying an accrual resolution to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The order was still pending and has been updated. `credited` was added to the owner's balance.
    Applied { credited: Points },
    /// The order had already reached a final status. Nothing was changed.
    AlreadyFinal,
}
