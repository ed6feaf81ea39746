//! Promo Backfill - replay historical orders into the funnel event log
//!
//! Idempotent: safe to run repeatedly, and safe to re-run after a failure.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin promo_backfill -- [--migrate] [--rebuild-cache] [--verify]
//! ```
//!
//! - `--migrate` - apply `sql/*.sql` before the backfill
//! - `--rebuild-cache` - rewrite every snapshot after the backfill
//! - `--verify` - audit the cache against the event log after the backfill
//!
//! ## Environment Variables
//!
//! - PROMO_FUNNEL_DB_PATH - SQLite database path (default: data/promo_funnel.db)
//! - PROMO_FUNNEL_SCHEMA_DIR - Schema directory for --migrate (default: sql)
//! - RUST_LOG - Logging level (optional, default: info)
//!
//! Exit status is 0 on success (including "nothing to do") and nonzero on a
//! fatal setup or database error.

use promo_funnel::{BackfillReconciler, FunnelConfig, FunnelStore};
use std::env;

#[derive(Debug, Default)]
struct RunOptions {
    migrate: bool,
    rebuild_cache: bool,
    verify: bool,
}

fn parse_args() -> Result<RunOptions, String> {
    let mut options = RunOptions::default();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--migrate" => options.migrate = true,
            "--rebuild-cache" => options.rebuild_cache = true,
            "--verify" => options.verify = true,
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let options = parse_args()?;
    let config = FunnelConfig::from_env();

    log::info!("🚀 Promo funnel backfill");
    log::info!("   ├─ Database: {}", config.db_path.display());
    log::info!("   ├─ Migrate: {}", options.migrate);
    log::info!("   ├─ Rebuild cache: {}", options.rebuild_cache);
    log::info!("   └─ Verify: {}", options.verify);

    let store = FunnelStore::open(&config.db_path)?;
    if options.migrate {
        store.migrate(&config.schema_dir)?;
    }

    let summary = match BackfillReconciler::new(store.clone()).run().await {
        Ok(summary) => summary,
        Err(e) => {
            log::error!("❌ Backfill aborted: {}", e);
            log::error!("   └─ Re-run once fixed; already recorded orders are skipped");
            return Err(e.into());
        }
    };
    summary.log();
    println!("{}", serde_json::to_string(&summary)?);

    if options.rebuild_cache {
        let rebuild = store.rebuild_cache().await?;
        println!("{}", serde_json::to_string(&rebuild)?);
    }

    if options.verify {
        let audit = store.verify_cache().await?;
        println!("{}", serde_json::to_string(&audit)?);
    }

    Ok(())
}
