use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use loyalty_common::Points;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------     OrderNumber      ---------------------------------------------------------
/// The purchase-order number a user submitted. Order numbers are globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     OrderStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// The order was uploaded but the accrual service has not been asked about it yet.
    New,
    /// The accrual service knows the order but has not started calculating the reward.
    Registered,
    /// The accrual service is calculating the reward.
    Processing,
    /// The accrual service rejected the order. No reward will be paid. Final.
    Invalid,
    /// The reward has been calculated and credited. Final.
    Processed,
}

impl OrderStatus {
    /// Statuses that still need a resolution from the accrual service.
    pub const PENDING: [OrderStatus; 3] = [OrderStatus::New, OrderStatus::Registered, OrderStatus::Processing];

    pub fn is_pending(&self) -> bool {
        !self.is_final()
    }

    pub fn is_final(&self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    /// Only a processed order adds its accrual to the owner's balance.
    pub fn credits_balance(&self) -> bool {
        matches!(self, OrderStatus::Processed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Registered => "REGISTERED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(Self::New),
            "REGISTERED" => Ok(Self::Registered),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            _ => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Order {
    pub number: OrderNumber,
    pub user_login: String,
    pub status: OrderStatus,
    pub accrual: Option<Points>,
    pub uploaded_at: DateTime<Utc>,
}

//--------------------------------------       NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub number: OrderNumber,
    /// The login of the user that uploaded the order
    pub user_login: String,
}

impl NewOrder {
    pub fn new<N: Into<OrderNumber>, S: Into<String>>(number: N, user_login: S) -> Self {
        Self { number: number.into(), user_login: user_login.into() }
    }
}

//--------------------------------------  AccrualResolution   ---------------------------------------------------------
/// The accrual service's verdict for a single order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualResolution {
    pub order: OrderNumber,
    pub status: OrderStatus,
    /// The reward. Zero when the service did not report one.
    pub accrual: Points,
}

impl AccrualResolution {
    pub fn new<N: Into<OrderNumber>>(order: N, status: OrderStatus, accrual: Points) -> Self {
        Self { order: order.into(), status, accrual }
    }

    /// The amount to add to the owner's balance when this resolution is applied.
    pub fn credit(&self) -> Points {
        if self.status.credits_balance() {
            self.accrual
        } else {
            Points::default()
        }
    }
}

//--------------------------------------     UserBalance      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct UserBalance {
    pub current: Points,
    pub withdrawn: Points,
}

//--------------------------------------      Withdrawal      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Withdrawal {
    pub order: OrderNumber,
    pub sum: Points,
    pub processed_at: DateTime<Utc>,
}
