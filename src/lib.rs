//! # Promo-code funnel analytics
//!
//! Three data surfaces kept consistent by idempotent recomputation:
//!
//! ```text
//! live traffic ──▶ EventRecorder ──▶ promo_code_events (append-only)
//!                                          │
//! orders ──▶ BackfillReconciler ───────────┤ (guard set: redeemed order ids)
//!                                          ▼
//!                              compute_snapshot (pure)
//!                                          │
//!                     ┌────────────────────┴───────────────────┐
//!                     ▼                                        ▼
//!        promo_code_performance (UPSERT)        promo_codes.used_count (recount)
//! ```
//!
//! ## Schema Reference
//!
//! Owned tables are created by the files in `/sql/` (see
//! [`db::run_schema_migrations`]):
//! - `promo_code_events` → [`PromoCodeEvent`]
//! - `promo_code_performance` → [`PerformanceSnapshot`]
//!
//! `orders` and `promo_codes` belong to checkout and the promo admin.

pub mod aggregator;
pub mod audit;
pub mod backfill;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod money;
pub mod recorder;
pub mod sources;
pub mod sqlite_pragma;
pub mod types;
pub mod usage;

#[cfg(test)]
mod test_support;

pub use aggregator::compute_snapshot;
pub use audit::{CacheAudit, RebuildSummary};
pub use backfill::{BackfillReconciler, BackfillSummary};
pub use cache::PerformanceCache;
pub use config::FunnelConfig;
pub use db::{run_schema_migrations, FunnelStore};
pub use error::{BackfillIssue, FunnelError};
pub use money::{Money, Rate};
pub use recorder::EventRecorder;
pub use types::{
    EventType, NewPromoCodeEvent, Order, PerformanceSnapshot, PromoCode, PromoCodeEvent,
    PromoCodePerformance, ValidationResult,
};
pub use usage::UsageCorrection;
