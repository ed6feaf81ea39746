//! Event Recorder - append-only funnel event log
//!
//! Table written: `promo_code_events` (INSERT only, never UPDATE/DELETE).
//!
//! The recorder does not check cross-event invariants. The one storage-level
//! guarantee is the partial unique index on `order_id` for redeem events; a
//! violation comes back as [`FunnelError::DuplicateRedeem`].

use crate::db::FunnelStore;
use crate::error::FunnelError;
use crate::types::{EventType, NewPromoCodeEvent, PromoCodeEvent};
use async_trait::async_trait;
use rusqlite::{params, Row};
use std::collections::HashSet;

/// Append funnel events
#[async_trait]
pub trait EventRecorder: Send + Sync {
    /// Persist one immutable event and return its id
    async fn record(&self, event: NewPromoCodeEvent) -> Result<i64, FunnelError>;
}

const EVENT_COLUMNS: &str = "id, promo_code_id, event_type, validation_result, customer_id, \
                             order_id, cart_value, discount_amount, revenue, created_at";

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<PromoCodeEvent> {
    Ok(PromoCodeEvent {
        id: row.get(0)?,
        promo_code_id: row.get(1)?,
        event_type: row.get(2)?,
        validation_result: row.get(3)?,
        customer_id: row.get(4)?,
        order_id: row.get(5)?,
        cart_value: row.get(6)?,
        discount_amount: row.get(7)?,
        revenue: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[async_trait]
impl EventRecorder for FunnelStore {
    async fn record(&self, event: NewPromoCodeEvent) -> Result<i64, FunnelError> {
        let created_at = event
            .created_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp());

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO promo_code_events (
                promo_code_id, event_type, validation_result, customer_id, order_id,
                cart_value, discount_amount, revenue, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                event.promo_code_id,
                event.event_type,
                event.validation_result,
                event.customer_id,
                event.order_id,
                event.cart_value,
                event.discount_amount,
                event.revenue,
                created_at,
            ],
        )
        .map_err(|e| FunnelError::from_insert(e, event.order_id))?;

        let id = conn.last_insert_rowid();
        log::debug!(
            "📝 Recorded {} event #{} for promo code {}",
            event.event_type,
            id,
            event.promo_code_id
        );
        Ok(id)
    }
}

impl FunnelStore {
    /// All events of one code in chronological order
    pub fn events_for_code(&self, promo_code_id: i64) -> Result<Vec<PromoCodeEvent>, FunnelError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM promo_code_events WHERE promo_code_id = ?1 ORDER BY created_at, id",
            EVENT_COLUMNS
        ))?;

        let events = stmt
            .query_map([promo_code_id], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Guard set: order ids that already carry a redeem event
    pub fn redeemed_order_ids(&self) -> Result<HashSet<i64>, FunnelError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT order_id FROM promo_code_events
             WHERE event_type = ?1 AND order_id IS NOT NULL",
        )?;

        let ids = stmt
            .query_map([EventType::Redeem], |row| row.get(0))?
            .collect::<Result<HashSet<i64>, _>>()?;
        Ok(ids)
    }

    pub fn count_redeems(&self, promo_code_id: i64) -> Result<i64, FunnelError> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM promo_code_events WHERE promo_code_id = ?1 AND event_type = ?2",
            params![promo_code_id, EventType::Redeem],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Distinct promo codes that have at least one event, ascending
    pub fn promo_codes_with_events(&self) -> Result<Vec<i64>, FunnelError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT promo_code_id FROM promo_code_events ORDER BY promo_code_id",
        )?;

        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }
}
