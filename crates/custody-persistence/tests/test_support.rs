#![allow(dead_code)]

use custody_core::{CustodyLedger, RawCustodyEvent};
use custody_persistence::config::DbConfig;
use custody_persistence::pg::{build_pool, PgEventStore, PgPool, PoolProvider};
use once_cell::sync::Lazy;
use uuid::Uuid;

pub static TEST_POOL: Lazy<Option<PgPool>> = Lazy::new(|| {
    if std::env::var("DATABASE_URL").is_err() {
        return None;
    }
    let cfg = DbConfig::from_env().ok()?;
    match build_pool(&cfg.url, 1, 2) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("No se pudo construir pool de test: {e}");
            None
        }
    }
});

pub fn with_pool<F, R>(f: F) -> Option<R>
    where F: FnOnce(&PgPool) -> R
{
    TEST_POOL.as_ref().map(f)
}

pub fn pg_ledger(pool: &PgPool) -> CustodyLedger<PgEventStore<PoolProvider>> {
    CustodyLedger::new(PgEventStore::new(PoolProvider { pool: pool.clone() }))
}

/// Orden de trabajo aleatoria para aislar tests que comparten la base.
pub fn fresh_work_order() -> i64 {
    (Uuid::new_v4().as_u128() % 1_000_000_000) as i64 + 1
}

pub fn driver_event(work_order_id: i64, part: &str, qty: i64, action: &str, from: &str, to: &str) -> RawCustodyEvent {
    RawCustodyEvent::new().work_order(work_order_id)
                          .technician(7)
                          .part(part)
                          .quantity(qty)
                          .action(action)
                          .route(from, to)
                          .actor("DRIVER", 42)
                          .device("scanner-7")
                          .source("driver")
}

pub fn loaded(work_order_id: i64, part: &str, qty: i64) -> RawCustodyEvent {
    driver_event(work_order_id, part, qty, "LOADED", "WAREHOUSE_SHELF", "DRIVER_TRUCK")
}

pub fn dropped(work_order_id: i64, part: &str, qty: i64) -> RawCustodyEvent {
    driver_event(work_order_id, part, qty, "DROPPED_OFF", "DRIVER_TRUCK", "TECH_TRUCK")
}
