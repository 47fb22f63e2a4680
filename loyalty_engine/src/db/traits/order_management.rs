use std::future::Future;

use crate::{
    db::traits::InsertOrderResult,
    db_types::{NewOrder, Order, OrderNumber},
};

/// The `OrderManagement` trait defines the behaviour for storing and querying uploaded orders.
pub trait OrderManagement {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stores a newly uploaded order with status `NEW`. Uploading the same number twice is not an error; the result
    /// says who owns the existing record.
    fn insert_order(&self, order: NewOrder) -> impl Future<Output = Result<InsertOrderResult, Self::Error>> + Send;

    fn order_by_number(&self, number: &OrderNumber) -> impl Future<Output = Result<Option<Order>, Self::Error>> + Send;

    /// All orders uploaded by the user, oldest first.
    fn orders_for_user(&self, login: &str) -> impl Future<Output = Result<Vec<Order>, Self::Error>> + Send;
}
