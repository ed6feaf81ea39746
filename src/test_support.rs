//! Test fixtures: a migrated temp database plus the collaborator tables

use crate::db::FunnelStore;
use crate::types::NewPromoCodeEvent;
use rusqlite::params;
use std::path::PathBuf;
use tempfile::TempDir;

pub fn schema_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("sql")
}

/// Schema of the tables owned by checkout and the promo admin
pub const COLLABORATOR_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS promo_codes (
        id          INTEGER PRIMARY KEY,
        code        TEXT NOT NULL,
        used_count  INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS orders (
        id              INTEGER PRIMARY KEY,
        customer_id     INTEGER,
        promo_code      TEXT,
        promo_discount  TEXT,
        subtotal        TEXT,
        total_amount    TEXT,
        created_at      INTEGER NOT NULL
    );
"#;

/// Migrated store in a temp directory (keep the `TempDir` alive)
pub fn create_test_store() -> (TempDir, FunnelStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = FunnelStore::open(dir.path().join("funnel.db")).unwrap();
    store.migrate(schema_dir()).unwrap();
    store.conn().unwrap().execute_batch(COLLABORATOR_SCHEMA).unwrap();
    (dir, store)
}

pub fn insert_promo_code(store: &FunnelStore, id: i64, code: &str, used_count: i64) {
    store
        .conn()
        .unwrap()
        .execute(
            "INSERT INTO promo_codes (id, code, used_count) VALUES (?1, ?2, ?3)",
            params![id, code, used_count],
        )
        .unwrap();
}

#[allow(clippy::too_many_arguments)]
pub fn insert_order(
    store: &FunnelStore,
    id: i64,
    customer_id: Option<i64>,
    promo_code: Option<&str>,
    promo_discount: &str,
    subtotal: &str,
    total_amount: &str,
    created_at: i64,
) {
    store
        .conn()
        .unwrap()
        .execute(
            "INSERT INTO orders (id, customer_id, promo_code, promo_discount, subtotal, total_amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![id, customer_id, promo_code, promo_discount, subtotal, total_amount, created_at],
        )
        .unwrap();
}

pub fn used_count(store: &FunnelStore, promo_code_id: i64) -> i64 {
    store
        .conn()
        .unwrap()
        .query_row(
            "SELECT used_count FROM promo_codes WHERE id = ?1",
            [promo_code_id],
            |row| row.get(0),
        )
        .unwrap()
}

pub fn event_count(store: &FunnelStore) -> i64 {
    store
        .conn()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM promo_code_events", [], |row| row.get(0))
        .unwrap()
}

/// Events of the canonical mixed funnel for one code:
/// 3 views, 2 validations (1 success, 1 failed), 1 apply, 1 redeem
pub fn mixed_funnel(promo_code_id: i64, order_id: i64) -> Vec<NewPromoCodeEvent> {
    use crate::money::Money;
    use crate::types::ValidationResult;

    vec![
        NewPromoCodeEvent::view(promo_code_id).with_created_at(1_700_000_000),
        NewPromoCodeEvent::view(promo_code_id).with_created_at(1_700_000_010),
        NewPromoCodeEvent::view(promo_code_id).with_created_at(1_700_000_020),
        NewPromoCodeEvent::validate(promo_code_id, ValidationResult::Success)
            .with_created_at(1_700_000_030),
        NewPromoCodeEvent::validate(promo_code_id, ValidationResult::Failed)
            .with_created_at(1_700_000_040),
        NewPromoCodeEvent::apply(promo_code_id).with_created_at(1_700_000_050),
        NewPromoCodeEvent::redeem(promo_code_id, order_id)
            .with_customer(Some(501))
            .with_amounts(Money::from(500), Money::from(50), Money::from(450))
            .with_created_at(1_700_000_060),
    ]
}
