//! Backfill Reconciler - replay historical orders into the funnel log
//!
//! One run:
//! 1. Verify the funnel tables exist (fatal otherwise)
//! 2. Load promo orders oldest first
//! 3. Load the guard set (order ids that already have a redeem event)
//! 4. Record a redeem event for every unguarded order whose code resolves
//! 5. Refresh the snapshot of each touched code exactly once
//! 6. Recount `used_count` for every promo code
//!
//! Unknown codes and per-code cache failures are counted and skipped. A
//! failure reading orders, writing an event or recounting usage aborts the
//! run; re-running is safe because the guard set skips what was recorded.

use crate::db::FunnelStore;
use crate::error::{BackfillIssue, FunnelError};
use crate::money::Money;
use crate::recorder::EventRecorder;
use crate::types::{NewPromoCodeEvent, Order, PromoCode};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

/// Outcome of one backfill run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    /// Orders with a promo code and a positive discount
    pub candidate_orders: usize,
    /// Orders that received a new redeem event this run
    pub orders_processed: usize,
    /// Orders skipped because the guard set already held them
    pub orders_skipped: usize,
    /// Orders whose promo code did not resolve
    pub orders_errored: usize,
    pub codes_refreshed: usize,
    pub cache_failures: usize,
    pub counters_corrected: usize,
    /// Sum of `total_amount` over orders processed this run
    pub revenue_recorded: Money,
    /// Sum of `promo_discount` over orders processed this run
    pub discount_recorded: Money,
    pub issues: Vec<BackfillIssue>,
}

impl BackfillSummary {
    /// Emit the run summary to the log stream
    pub fn log(&self) {
        log::info!("📊 Backfill summary:");
        log::info!("   ├─ Candidate orders: {}", self.candidate_orders);
        log::info!("   ├─ Processed (new redeem events): {}", self.orders_processed);
        log::info!("   ├─ Skipped (already recorded): {}", self.orders_skipped);
        log::info!("   ├─ Errored (unknown promo code): {}", self.orders_errored);
        log::info!("   ├─ Snapshots refreshed: {}", self.codes_refreshed);
        log::info!("   ├─ Snapshot refresh failures: {}", self.cache_failures);
        log::info!("   ├─ Usage counters corrected: {}", self.counters_corrected);
        log::info!("   ├─ Revenue recorded: {}", self.revenue_recorded);
        log::info!("   └─ Discount recorded: {}", self.discount_recorded);

        for issue in &self.issues {
            log::warn!("⚠️  {}", issue);
        }
    }
}

/// Replays historical orders through the recorder, then drives the
/// aggregator, cache store and usage reconciler once per affected code
pub struct BackfillReconciler {
    store: FunnelStore,
}

impl BackfillReconciler {
    pub fn new(store: FunnelStore) -> Self {
        Self { store }
    }

    pub async fn run(&self) -> Result<BackfillSummary, FunnelError> {
        let started = Instant::now();
        log::info!("🚀 Starting promo-code backfill");

        self.store.verify_schema()?;

        let orders = self.store.promo_orders()?;
        let guard = self.store.redeemed_order_ids()?;
        log::info!("   ├─ Candidate orders: {}", orders.len());
        log::info!("   └─ Already recorded: {}", guard.len());

        let mut summary = BackfillSummary {
            candidate_orders: orders.len(),
            ..Default::default()
        };
        let mut resolved: HashMap<String, Option<PromoCode>> = HashMap::new();
        let mut touched: BTreeSet<i64> = BTreeSet::new();

        for order in &orders {
            if guard.contains(&order.id) {
                summary.orders_skipped += 1;
                continue;
            }

            let key = order.promo_code.to_lowercase();
            let promo = match resolved.get(&key) {
                Some(cached) => cached.clone(),
                None => {
                    let found = self.store.find_promo_code(&order.promo_code)?;
                    resolved.insert(key, found.clone());
                    found
                }
            };

            let Some(promo) = promo else {
                log::warn!(
                    "⚠️  Order {} references unknown promo code '{}', skipping",
                    order.id,
                    order.promo_code
                );
                summary.orders_errored += 1;
                summary.issues.push(BackfillIssue::UnknownPromoCode {
                    order_id: order.id,
                    code: order.promo_code.clone(),
                });
                continue;
            };

            self.store.record(redeem_event(promo.id, order)).await?;

            summary.orders_processed += 1;
            summary.revenue_recorded += order.total_amount;
            summary.discount_recorded += order.promo_discount;
            touched.insert(promo.id);
        }

        log::info!(
            "📝 Recorded {} redeem events across {} promo codes",
            summary.orders_processed,
            touched.len()
        );

        for promo_code_id in &touched {
            match self.refresh(*promo_code_id).await {
                Ok(()) => summary.codes_refreshed += 1,
                Err(e) => {
                    log::error!("❌ Failed to refresh snapshot for promo code {}: {}", promo_code_id, e);
                    summary.cache_failures += 1;
                    summary.issues.push(BackfillIssue::CacheRefresh {
                        promo_code_id: *promo_code_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        summary.counters_corrected = self.store.reconcile_all_usage_counts()?.len();

        log::info!("✅ Backfill finished in {:.2?}", started.elapsed());
        Ok(summary)
    }

    async fn refresh(&self, promo_code_id: i64) -> Result<(), FunnelError> {
        let snapshot = self.store.refresh_snapshot(promo_code_id).await?;
        log::debug!(
            "✅ Snapshot refreshed for promo code {} ({} redemptions)",
            promo_code_id,
            snapshot.metrics.total_redemptions
        );
        Ok(())
    }
}

/// Redeem event carrying the order's original timestamp
fn redeem_event(promo_code_id: i64, order: &Order) -> NewPromoCodeEvent {
    NewPromoCodeEvent::redeem(promo_code_id, order.id)
        .with_customer(order.customer_id)
        .with_amounts(order.subtotal, order.promo_discount, order.total_amount)
        .with_created_at(order.created_at)
}
