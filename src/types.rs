//! Core data structures for the funnel event log and the performance cache
//!
//! Tables (see `/sql/`):
//! - `promo_code_events` → [`PromoCodeEvent`]
//! - `promo_code_performance` → [`PerformanceSnapshot`]
//!
//! Collaborator-owned tables read by the backfill:
//! - `orders` → [`Order`]
//! - `promo_codes` → [`PromoCode`]

use crate::money::{Money, Rate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Funnel stage of a promo-code lifecycle action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    View,
    Validate,
    Apply,
    Redeem,
    Abandon,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::View => "view",
            EventType::Validate => "validate",
            EventType::Apply => "apply",
            EventType::Redeem => "redeem",
            EventType::Abandon => "abandon",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "view" => Some(EventType::View),
            "validate" => Some(EventType::Validate),
            "apply" => Some(EventType::Apply),
            "redeem" => Some(EventType::Redeem),
            "abandon" => Some(EventType::Abandon),
            _ => None,
        }
    }
}

/// Outcome of a `validate` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationResult {
    Success,
    Failed,
}

impl ValidationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationResult::Success => "success",
            ValidationResult::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ValidationResult::Success),
            "failed" => Some(ValidationResult::Failed),
            _ => None,
        }
    }
}

macro_rules! text_enum_column {
    ($name:ident, $label:literal) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                $name::parse(text).ok_or_else(|| {
                    FromSqlError::Other(format!("unknown {} `{}`", $label, text).into())
                })
            }
        }
    };
}

text_enum_column!(EventType, "event type");
text_enum_column!(ValidationResult, "validation result");

/// Immutable row of `promo_code_events`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCodeEvent {
    pub id: i64,
    pub promo_code_id: i64,
    pub event_type: EventType,
    pub validation_result: Option<ValidationResult>,
    pub customer_id: Option<i64>,
    pub order_id: Option<i64>,
    pub cart_value: Money,
    pub discount_amount: Money,
    pub revenue: Money,
    pub created_at: i64,
}

/// Event waiting to be appended
///
/// `created_at = None` is stamped with the current time by the recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPromoCodeEvent {
    pub promo_code_id: i64,
    pub event_type: EventType,
    pub validation_result: Option<ValidationResult>,
    pub customer_id: Option<i64>,
    pub order_id: Option<i64>,
    pub cart_value: Money,
    pub discount_amount: Money,
    pub revenue: Money,
    pub created_at: Option<i64>,
}

impl NewPromoCodeEvent {
    pub fn new(promo_code_id: i64, event_type: EventType) -> Self {
        Self {
            promo_code_id,
            event_type,
            validation_result: None,
            customer_id: None,
            order_id: None,
            cart_value: Money::ZERO,
            discount_amount: Money::ZERO,
            revenue: Money::ZERO,
            created_at: None,
        }
    }

    pub fn view(promo_code_id: i64) -> Self {
        Self::new(promo_code_id, EventType::View)
    }

    pub fn validate(promo_code_id: i64, result: ValidationResult) -> Self {
        let mut event = Self::new(promo_code_id, EventType::Validate);
        event.validation_result = Some(result);
        event
    }

    pub fn apply(promo_code_id: i64) -> Self {
        Self::new(promo_code_id, EventType::Apply)
    }

    pub fn redeem(promo_code_id: i64, order_id: i64) -> Self {
        Self::new(promo_code_id, EventType::Redeem).with_order(order_id)
    }

    pub fn abandon(promo_code_id: i64) -> Self {
        Self::new(promo_code_id, EventType::Abandon)
    }

    pub fn with_customer(mut self, customer_id: Option<i64>) -> Self {
        self.customer_id = customer_id;
        self
    }

    pub fn with_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_amounts(mut self, cart_value: Money, discount_amount: Money, revenue: Money) -> Self {
        self.cart_value = cart_value;
        self.discount_amount = discount_amount;
        self.revenue = revenue;
        self
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Deterministic funnel metrics for one promo code
///
/// Every field is a pure function of the code's events; two computations over
/// the same events compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCodePerformance {
    pub promo_code_id: i64,
    pub total_views: i64,
    pub total_validations: i64,
    pub successful_validations: i64,
    pub failed_validations: i64,
    pub total_applications: i64,
    pub total_redemptions: i64,
    pub total_abandons: i64,
    pub total_revenue: Money,
    pub total_discount_given: Money,
    pub avg_order_value: Money,
    pub unique_customers: i64,
    pub conversion_rate: Rate,
    pub validation_success_rate: Rate,
    pub redemption_rate: Rate,
}

/// Row of `promo_code_performance`: metrics plus the time they were written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    #[serde(flatten)]
    pub metrics: PromoCodePerformance,
    pub last_updated: i64,
}

/// Completed order with a promo code (collaborator-owned `orders` row)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: i64,
    pub customer_id: Option<i64>,
    pub promo_code: String,
    pub promo_discount: Money,
    pub subtotal: Money,
    pub total_amount: Money,
    pub created_at: i64,
}

/// Collaborator-owned `promo_codes` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoCode {
    pub id: i64,
    pub code: String,
    pub used_count: i64,
}
