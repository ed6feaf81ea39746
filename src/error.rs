//! Error types
//!
//! [`FunnelError`] is fatal for the operation that returns it. Per-row problems
//! found during a backfill are not errors; they are collected as
//! [`BackfillIssue`]s in the run summary.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FunnelError {
    #[error(
        "missing funnel tables: {}. Apply the schema first: `promo_backfill --migrate` \
         (or run the files in sql/ against the database)",
        .missing.join(", ")
    )]
    MissingTables { missing: Vec<String> },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("order {order_id} already has a redeem event")]
    DuplicateRedeem { order_id: i64 },

    #[error("database connection lock poisoned")]
    LockPoisoned,
}

impl FunnelError {
    /// Map a constraint violation on the redeem-per-order index to
    /// [`FunnelError::DuplicateRedeem`]; every other error passes through.
    pub(crate) fn from_insert(err: rusqlite::Error, order_id: Option<i64>) -> Self {
        if let (rusqlite::Error::SqliteFailure(code, _), Some(order_id)) = (&err, order_id) {
            if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
                return FunnelError::DuplicateRedeem { order_id };
            }
        }
        FunnelError::Database(err)
    }
}

/// Recoverable problem recorded during a backfill or cache rebuild
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackfillIssue {
    /// Historical order references a promo code that no longer resolves
    UnknownPromoCode { order_id: i64, code: String },
    /// Snapshot for one code could not be refreshed; it stays rebuildable
    CacheRefresh { promo_code_id: i64, reason: String },
}

impl fmt::Display for BackfillIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackfillIssue::UnknownPromoCode { order_id, code } => {
                write!(f, "order {}: promo code '{}' not found", order_id, code)
            }
            BackfillIssue::CacheRefresh { promo_code_id, reason } => {
                write!(f, "promo code {}: snapshot refresh failed: {}", promo_code_id, reason)
            }
        }
    }
}
