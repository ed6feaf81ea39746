//! Cache audit and full rebuild
//!
//! The cache is correct when every cached row equals a fresh aggregation of
//! the event log. [`FunnelStore::verify_cache`] checks that without writing;
//! [`FunnelStore::rebuild_cache`] rewrites every snapshot from the log.

use crate::cache::PerformanceCache;
use crate::db::FunnelStore;
use crate::error::{BackfillIssue, FunnelError};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheAudit {
    /// Cached snapshots compared against the log
    pub checked: usize,
    /// Cached codes whose metrics differ from a fresh aggregation
    pub stale: Vec<i64>,
    /// Codes with events but no cached snapshot
    pub missing: Vec<i64>,
}

impl CacheAudit {
    pub fn is_clean(&self) -> bool {
        self.stale.is_empty() && self.missing.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    pub codes_refreshed: usize,
    pub issues: Vec<BackfillIssue>,
}

impl FunnelStore {
    /// Compare every cached snapshot with the event log (read-only)
    pub async fn verify_cache(&self) -> Result<CacheAudit, FunnelError> {
        let cached: BTreeSet<i64> = self.cached_promo_code_ids()?.into_iter().collect();
        let mut audit = CacheAudit::default();

        for promo_code_id in &cached {
            let Some(snapshot) = self.get(*promo_code_id).await? else {
                continue;
            };
            audit.checked += 1;

            if snapshot.metrics != self.compute_snapshot(*promo_code_id)? {
                log::warn!("⚠️  Snapshot for promo code {} is stale", promo_code_id);
                audit.stale.push(*promo_code_id);
            }
        }

        audit.missing = self
            .promo_codes_with_events()?
            .into_iter()
            .filter(|id| !cached.contains(id))
            .collect();

        if audit.is_clean() {
            log::info!("✅ Cache audit clean ({} snapshots checked)", audit.checked);
        } else {
            log::warn!(
                "⚠️  Cache audit: {} stale, {} missing ({} checked)",
                audit.stale.len(),
                audit.missing.len(),
                audit.checked
            );
        }
        Ok(audit)
    }

    /// Refresh the snapshot of every code that has events
    ///
    /// A per-code failure is recorded and the rebuild continues.
    pub async fn rebuild_cache(&self) -> Result<RebuildSummary, FunnelError> {
        let codes = self.promo_codes_with_events()?;
        log::info!("🔧 Rebuilding {} snapshots from the event log", codes.len());

        let mut summary = RebuildSummary::default();
        for promo_code_id in codes {
            match self.refresh_snapshot(promo_code_id).await {
                Ok(_) => summary.codes_refreshed += 1,
                Err(e) => {
                    log::error!("❌ Failed to rebuild snapshot for promo code {}: {}", promo_code_id, e);
                    summary.issues.push(BackfillIssue::CacheRefresh {
                        promo_code_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        log::info!(
            "✅ Rebuilt {} snapshots ({} failures)",
            summary.codes_refreshed,
            summary.issues.len()
        );
        Ok(summary)
    }
}
