//! Aggregator - event log of one code → [`PromoCodePerformance`]
//!
//! Pure and deterministic: no clock, no I/O in [`compute_snapshot`].
//!
//! Redeem-only metrics:
//! - `total_revenue`, `total_discount_given` (sums)
//! - `avg_order_value` (mean of pre-discount `cart_value`)
//! - `unique_customers` (distinct non-null `customer_id`)

use crate::db::FunnelStore;
use crate::error::FunnelError;
use crate::money::{Money, Rate};
use crate::types::{EventType, PromoCodeEvent, PromoCodePerformance, ValidationResult};
use std::collections::HashSet;

/// Running counters while folding events
#[derive(Debug, Default)]
struct FunnelTally {
    views: i64,
    validations: i64,
    successful_validations: i64,
    failed_validations: i64,
    applications: i64,
    redemptions: i64,
    abandons: i64,
    revenue: Money,
    discount: Money,
    redeemed_cart_value: Money,
    customers: HashSet<i64>,
}

impl FunnelTally {
    fn add_event(&mut self, event: &PromoCodeEvent) {
        match event.event_type {
            EventType::View => self.views += 1,
            EventType::Validate => {
                self.validations += 1;
                match event.validation_result {
                    Some(ValidationResult::Success) => self.successful_validations += 1,
                    Some(ValidationResult::Failed) => self.failed_validations += 1,
                    None => {}
                }
            }
            EventType::Apply => self.applications += 1,
            EventType::Redeem => {
                self.redemptions += 1;
                self.revenue += event.revenue;
                self.discount += event.discount_amount;
                self.redeemed_cart_value += event.cart_value;
                if let Some(customer_id) = event.customer_id {
                    self.customers.insert(customer_id);
                }
            }
            EventType::Abandon => self.abandons += 1,
        }
    }

    fn into_performance(self, promo_code_id: i64) -> PromoCodePerformance {
        PromoCodePerformance {
            promo_code_id,
            total_views: self.views,
            total_validations: self.validations,
            successful_validations: self.successful_validations,
            failed_validations: self.failed_validations,
            total_applications: self.applications,
            total_redemptions: self.redemptions,
            total_abandons: self.abandons,
            total_revenue: self.revenue,
            total_discount_given: self.discount,
            avg_order_value: Money::average(self.redeemed_cart_value, self.redemptions),
            unique_customers: self.customers.len() as i64,
            conversion_rate: Rate::percent(self.redemptions, self.views),
            validation_success_rate: Rate::percent(self.successful_validations, self.validations),
            redemption_rate: Rate::percent(self.redemptions, self.applications),
        }
    }
}

/// Fold the events of `promo_code_id` into its performance metrics
///
/// Events of other codes in `events` are ignored. Every rate is 0 when its
/// denominator is 0.
pub fn compute_snapshot(promo_code_id: i64, events: &[PromoCodeEvent]) -> PromoCodePerformance {
    let mut tally = FunnelTally::default();
    for event in events.iter().filter(|e| e.promo_code_id == promo_code_id) {
        tally.add_event(event);
    }
    tally.into_performance(promo_code_id)
}

impl FunnelStore {
    /// Load the code's events and aggregate them
    pub fn compute_snapshot(&self, promo_code_id: i64) -> Result<PromoCodePerformance, FunnelError> {
        let events = self.events_for_code(promo_code_id)?;
        Ok(compute_snapshot(promo_code_id, &events))
    }
}
