//! Performance Cache Store - latest snapshot per promo code
//!
//! Table written: `promo_code_performance`
//!
//! Operation: UPSERT (INSERT ... ON CONFLICT(promo_code_id) DO UPDATE), one
//! statement per code. Every metric column is replaced and `last_updated`
//! stamped; there is no read-then-write window for concurrent refreshes.

use crate::db::FunnelStore;
use crate::error::FunnelError;
use crate::types::{PerformanceSnapshot, PromoCodePerformance};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

#[async_trait]
pub trait PerformanceCache: Send + Sync {
    /// Insert or fully replace the snapshot of `metrics.promo_code_id`
    async fn upsert(&self, metrics: &PromoCodePerformance) -> Result<PerformanceSnapshot, FunnelError>;

    async fn get(&self, promo_code_id: i64) -> Result<Option<PerformanceSnapshot>, FunnelError>;
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<PerformanceSnapshot> {
    Ok(PerformanceSnapshot {
        metrics: PromoCodePerformance {
            promo_code_id: row.get(0)?,
            total_views: row.get(1)?,
            total_validations: row.get(2)?,
            successful_validations: row.get(3)?,
            failed_validations: row.get(4)?,
            total_applications: row.get(5)?,
            total_redemptions: row.get(6)?,
            total_abandons: row.get(7)?,
            total_revenue: row.get(8)?,
            total_discount_given: row.get(9)?,
            avg_order_value: row.get(10)?,
            unique_customers: row.get(11)?,
            conversion_rate: row.get(12)?,
            validation_success_rate: row.get(13)?,
            redemption_rate: row.get(14)?,
        },
        last_updated: row.get(15)?,
    })
}

#[async_trait]
impl PerformanceCache for FunnelStore {
    async fn upsert(&self, metrics: &PromoCodePerformance) -> Result<PerformanceSnapshot, FunnelError> {
        let last_updated = chrono::Utc::now().timestamp();

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO promo_code_performance (
                promo_code_id,
                total_views, total_validations, successful_validations, failed_validations,
                total_applications, total_redemptions, total_abandons,
                total_revenue, total_discount_given, avg_order_value, unique_customers,
                conversion_rate, validation_success_rate, redemption_rate,
                last_updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ON CONFLICT(promo_code_id) DO UPDATE SET
                total_views = excluded.total_views,
                total_validations = excluded.total_validations,
                successful_validations = excluded.successful_validations,
                failed_validations = excluded.failed_validations,
                total_applications = excluded.total_applications,
                total_redemptions = excluded.total_redemptions,
                total_abandons = excluded.total_abandons,
                total_revenue = excluded.total_revenue,
                total_discount_given = excluded.total_discount_given,
                avg_order_value = excluded.avg_order_value,
                unique_customers = excluded.unique_customers,
                conversion_rate = excluded.conversion_rate,
                validation_success_rate = excluded.validation_success_rate,
                redemption_rate = excluded.redemption_rate,
                last_updated = excluded.last_updated
            "#,
            params![
                metrics.promo_code_id,
                metrics.total_views,
                metrics.total_validations,
                metrics.successful_validations,
                metrics.failed_validations,
                metrics.total_applications,
                metrics.total_redemptions,
                metrics.total_abandons,
                metrics.total_revenue,
                metrics.total_discount_given,
                metrics.avg_order_value,
                metrics.unique_customers,
                metrics.conversion_rate,
                metrics.validation_success_rate,
                metrics.redemption_rate,
                last_updated,
            ],
        )?;

        Ok(PerformanceSnapshot {
            metrics: metrics.clone(),
            last_updated,
        })
    }

    async fn get(&self, promo_code_id: i64) -> Result<Option<PerformanceSnapshot>, FunnelError> {
        let conn = self.conn()?;
        let snapshot = conn
            .query_row(
                r#"
                SELECT promo_code_id,
                       total_views, total_validations, successful_validations, failed_validations,
                       total_applications, total_redemptions, total_abandons,
                       total_revenue, total_discount_given, avg_order_value, unique_customers,
                       conversion_rate, validation_success_rate, redemption_rate,
                       last_updated
                FROM promo_code_performance
                WHERE promo_code_id = ?1
                "#,
                [promo_code_id],
                snapshot_from_row,
            )
            .optional()?;
        Ok(snapshot)
    }
}

impl FunnelStore {
    /// Aggregate the code's events and write the result to the cache
    pub async fn refresh_snapshot(&self, promo_code_id: i64) -> Result<PerformanceSnapshot, FunnelError> {
        let metrics = self.compute_snapshot(promo_code_id)?;
        self.upsert(&metrics).await
    }

    pub fn cached_promo_code_ids(&self) -> Result<Vec<i64>, FunnelError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT promo_code_id FROM promo_code_performance ORDER BY promo_code_id")?;

        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::{Money, Rate};
    use crate::recorder::EventRecorder;
    use crate::test_support::{create_test_store, mixed_funnel};
    use crate::types::NewPromoCodeEvent;
    use rust_decimal::Decimal;

    fn row_count(store: &FunnelStore) -> i64 {
        store
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM promo_code_performance", [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_new_snapshot() {
        let (_dir, store) = create_test_store();
        let metrics = PromoCodePerformance {
            promo_code_id: 3,
            total_views: 10,
            total_redemptions: 2,
            total_revenue: Money::new(Decimal::new(12345, 2)),
            conversion_rate: Rate::from(20),
            ..Default::default()
        };

        let written = store.upsert(&metrics).await.unwrap();
        let stored = store.get(3).await.unwrap().unwrap();

        assert_eq!(stored, written);
        assert_eq!(stored.metrics, metrics);
        assert!(stored.last_updated > 0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_every_field() {
        let (_dir, store) = create_test_store();

        let first = PromoCodePerformance {
            promo_code_id: 3,
            total_views: 10,
            total_abandons: 4,
            unique_customers: 2,
            avg_order_value: Money::from(80),
            redemption_rate: Rate::from(50),
            ..Default::default()
        };
        store.upsert(&first).await.unwrap();

        // Full overwrite: fields absent from the new metrics go back to zero
        let second = PromoCodePerformance {
            promo_code_id: 3,
            total_views: 11,
            ..Default::default()
        };
        store.upsert(&second).await.unwrap();

        let stored = store.get(3).await.unwrap().unwrap();
        assert_eq!(stored.metrics, second);
        assert_eq!(row_count(&store), 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (_dir, store) = create_test_store();
        assert!(store.get(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_snapshot_from_log() {
        let (_dir, store) = create_test_store();
        for event in mixed_funnel(8, 1) {
            store.record(event).await.unwrap();
        }

        let snapshot = store.refresh_snapshot(8).await.unwrap();
        assert_eq!(snapshot.metrics, store.compute_snapshot(8).unwrap());
        assert_eq!(store.get(8).await.unwrap().unwrap().metrics, snapshot.metrics);
        assert_eq!(store.cached_promo_code_ids().unwrap(), vec![8]);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_same_code() {
        let (_dir, store) = create_test_store();
        for event in mixed_funnel(2, 1) {
            store.record(event).await.unwrap();
        }

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    store.record(NewPromoCodeEvent::view(2)).await.unwrap();
                }
                store.refresh_snapshot(2).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // One row, and a final refresh reflects the whole log
        assert_eq!(row_count(&store), 1);
        let final_snapshot = store.refresh_snapshot(2).await.unwrap();
        assert_eq!(final_snapshot.metrics.total_views, 7);
        assert_eq!(store.get(2).await.unwrap().unwrap().metrics, final_snapshot.metrics);
    }
}
