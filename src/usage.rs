//! Usage Counter Reconciler
//!
//! `promo_codes.used_count` is incremented by checkout during normal operation.
//! Reconciliation never increments: it recounts redeem events and overwrites
//! the column, so re-running it is harmless and any drift heals.

use crate::db::FunnelStore;
use crate::error::FunnelError;
use crate::types::EventType;
use rusqlite::params;
use serde::Serialize;

/// A counter whose stored value differed from the event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageCorrection {
    pub promo_code_id: i64,
    pub previous: i64,
    pub current: i64,
}

impl UsageCorrection {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

impl FunnelStore {
    /// Overwrite `used_count` for one code
    pub fn set_usage_count(&self, promo_code_id: i64, count: i64) -> Result<(), FunnelError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE promo_codes SET used_count = ?1 WHERE id = ?2",
            params![count, promo_code_id],
        )?;
        Ok(())
    }

    /// Recount redeem events for one code and store the result
    ///
    /// Returns `None` when the promo code does not exist.
    pub fn reconcile_usage_count(
        &self,
        promo_code_id: i64,
    ) -> Result<Option<UsageCorrection>, FunnelError> {
        let Some(code) = self.find_promo_code_by_id(promo_code_id)? else {
            return Ok(None);
        };

        let current = self.count_redeems(promo_code_id)?;
        if current != code.used_count {
            self.set_usage_count(promo_code_id, current)?;
        }

        Ok(Some(UsageCorrection {
            promo_code_id,
            previous: code.used_count,
            current,
        }))
    }

    /// Recount every promo code; returns only the counters that drifted
    pub fn reconcile_all_usage_counts(&self) -> Result<Vec<UsageCorrection>, FunnelError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let drifted = {
            let mut stmt = tx.prepare(
                r#"
                SELECT p.id, p.used_count,
                       (SELECT COUNT(*) FROM promo_code_events e
                        WHERE e.promo_code_id = p.id AND e.event_type = ?1) AS redeems
                FROM promo_codes p
                ORDER BY p.id
                "#,
            )?;

            let rows = stmt
                .query_map([EventType::Redeem], |row| {
                    Ok(UsageCorrection {
                        promo_code_id: row.get(0)?,
                        previous: row.get(1)?,
                        current: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter().filter(UsageCorrection::changed).collect::<Vec<_>>()
        };

        for correction in &drifted {
            tx.execute(
                "UPDATE promo_codes SET used_count = ?1 WHERE id = ?2",
                params![correction.current, correction.promo_code_id],
            )?;
            log::info!(
                "🔁 used_count for promo code {}: {} → {}",
                correction.promo_code_id,
                correction.previous,
                correction.current
            );
        }
        tx.commit()?;

        Ok(drifted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::EventRecorder;
    use crate::test_support::{create_test_store, insert_promo_code, used_count};
    use crate::types::NewPromoCodeEvent;

    #[tokio::test]
    async fn test_corrupted_counter_is_restored() {
        let (_dir, store) = create_test_store();
        insert_promo_code(&store, 1, "SAVE10", 99);
        for order_id in 1..=3 {
            store.record(NewPromoCodeEvent::redeem(1, order_id)).await.unwrap();
        }
        store.record(NewPromoCodeEvent::view(1)).await.unwrap();

        let correction = store.reconcile_usage_count(1).unwrap().unwrap();
        assert_eq!(correction, UsageCorrection { promo_code_id: 1, previous: 99, current: 3 });
        assert_eq!(used_count(&store, 1), 3);

        // Second pass is a no-op
        let again = store.reconcile_usage_count(1).unwrap().unwrap();
        assert!(!again.changed());
        assert_eq!(used_count(&store, 1), 3);
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let (_dir, store) = create_test_store();
        assert_eq!(store.reconcile_usage_count(5).unwrap(), None);
    }

    #[tokio::test]
    async fn test_reconcile_all_reports_only_drift() {
        let (_dir, store) = create_test_store();
        insert_promo_code(&store, 1, "A", 2);
        insert_promo_code(&store, 2, "B", 7);
        insert_promo_code(&store, 3, "C", 1);

        store.record(NewPromoCodeEvent::redeem(1, 10)).await.unwrap();
        store.record(NewPromoCodeEvent::redeem(1, 11)).await.unwrap();
        store.record(NewPromoCodeEvent::redeem(2, 12)).await.unwrap();

        let drifted = store.reconcile_all_usage_counts().unwrap();
        assert_eq!(
            drifted,
            vec![
                UsageCorrection { promo_code_id: 2, previous: 7, current: 1 },
                UsageCorrection { promo_code_id: 3, previous: 1, current: 0 },
            ]
        );
        assert_eq!(used_count(&store, 1), 2);
        assert_eq!(used_count(&store, 2), 1);
        assert_eq!(used_count(&store, 3), 0);

        assert!(store.reconcile_all_usage_counts().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_usage_count_overwrites() {
        let (_dir, store) = create_test_store();
        insert_promo_code(&store, 1, "A", 5);

        store.set_usage_count(1, 0).unwrap();
        assert_eq!(used_count(&store, 1), 0);
    }
}
