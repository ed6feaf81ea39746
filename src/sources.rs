//! Read-only access to collaborator tables
//!
//! - `orders`: historical orders carrying a promo code
//! - `promo_codes`: resolved by case-insensitive exact code match
//!
//! `promo_codes.used_count` is written only by [`crate::usage`].

use crate::db::FunnelStore;
use crate::error::FunnelError;
use crate::types::{Order, PromoCode};
use rusqlite::{OptionalExtension, Row};

fn promo_code_from_row(row: &Row<'_>) -> rusqlite::Result<PromoCode> {
    Ok(PromoCode {
        id: row.get(0)?,
        code: row.get(1)?,
        used_count: row.get(2)?,
    })
}

impl FunnelStore {
    /// Backfill candidates, oldest first
    ///
    /// Orders with a non-blank promo code and a positive decoded discount,
    /// ordered by `created_at` then `id`. A malformed amount fails the whole
    /// read rather than being treated as zero.
    pub fn promo_orders(&self) -> Result<Vec<Order>, FunnelError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, customer_id, promo_code, promo_discount, subtotal, total_amount, created_at
            FROM orders
            WHERE promo_code IS NOT NULL AND TRIM(promo_code) != ''
            ORDER BY created_at ASC, id ASC
            "#,
        )?;

        let orders = stmt
            .query_map([], |row| {
                let promo_code: String = row.get(2)?;
                Ok(Order {
                    id: row.get(0)?,
                    customer_id: row.get(1)?,
                    promo_code: promo_code.trim().to_string(),
                    promo_discount: row.get(3)?,
                    subtotal: row.get(4)?,
                    total_amount: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(orders
            .into_iter()
            .filter(|order| order.promo_discount.is_positive())
            .collect())
    }

    /// Case-insensitive exact match on `code`; lowest id wins on duplicates
    pub fn find_promo_code(&self, code: &str) -> Result<Option<PromoCode>, FunnelError> {
        let conn = self.conn()?;
        let promo = conn
            .query_row(
                "SELECT id, code, used_count FROM promo_codes
                 WHERE code = ?1 COLLATE NOCASE
                 ORDER BY id
                 LIMIT 1",
                [code.trim()],
                promo_code_from_row,
            )
            .optional()?;
        Ok(promo)
    }

    pub fn find_promo_code_by_id(&self, promo_code_id: i64) -> Result<Option<PromoCode>, FunnelError> {
        let conn = self.conn()?;
        let promo = conn
            .query_row(
                "SELECT id, code, used_count FROM promo_codes WHERE id = ?1",
                [promo_code_id],
                promo_code_from_row,
            )
            .optional()?;
        Ok(promo)
    }
}
