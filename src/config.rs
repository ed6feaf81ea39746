//! Backfill configuration from environment variables

use std::env;
use std::path::PathBuf;

/// Configuration for the backfill binary
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelConfig {
    /// Path to the SQLite database shared with checkout
    pub db_path: PathBuf,

    /// Directory holding the `*.sql` schema files
    pub schema_dir: PathBuf,
}

impl FunnelConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `PROMO_FUNNEL_DB_PATH` (default: data/promo_funnel.db)
    /// - `PROMO_FUNNEL_SCHEMA_DIR` (default: sql)
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("PROMO_FUNNEL_DB_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "data/promo_funnel.db".to_string())
                .into(),

            schema_dir: env::var("PROMO_FUNNEL_SCHEMA_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "sql".to_string())
                .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Defaults when nothing is set
        env::remove_var("PROMO_FUNNEL_DB_PATH");
        env::remove_var("PROMO_FUNNEL_SCHEMA_DIR");

        let config = FunnelConfig::from_env();
        assert_eq!(config.db_path, PathBuf::from("data/promo_funnel.db"));
        assert_eq!(config.schema_dir, PathBuf::from("sql"));

        // Overrides
        env::set_var("PROMO_FUNNEL_DB_PATH", "/tmp/funnel.db");
        env::set_var("PROMO_FUNNEL_SCHEMA_DIR", "/opt/funnel/sql");

        let config = FunnelConfig::from_env();
        assert_eq!(config.db_path, PathBuf::from("/tmp/funnel.db"));
        assert_eq!(config.schema_dir, PathBuf::from("/opt/funnel/sql"));

        // Blank values fall back to defaults
        env::set_var("PROMO_FUNNEL_DB_PATH", "  ");
        let config = FunnelConfig::from_env();
        assert_eq!(config.db_path, PathBuf::from("data/promo_funnel.db"));

        env::remove_var("PROMO_FUNNEL_DB_PATH");
        env::remove_var("PROMO_FUNNEL_SCHEMA_DIR");
    }
}
