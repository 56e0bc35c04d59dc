//! Custody Ledger
//!
//! Fachada del workspace:
//! - Reexporta la API de `custody-core` (modelo, ledger, validador de cadena,
//!   espejo CSV, ayudas de intake).
//! - `open_ledger_from_env` arma el ledger de producción: Postgres
//!   (`custody-persistence`) más el espejo CSV mensual configurado.

use log::info;

pub use custody_core::*;
pub use custody_persistence as persistence;

use custody_persistence::{ExportConfig, PersistenceError, PgEventStore, PgPool, PoolProvider};

/// Ledger respaldado por Postgres.
pub type PgLedger = CustodyLedger<PgEventStore<PoolProvider>>;

/// Ledger sobre un pool existente con espejo en `export.dir`.
pub fn open_ledger(pool: PgPool, export: &ExportConfig) -> PgLedger {
    CustodyLedger::new(PgEventStore::new(PoolProvider { pool })).with_mirror(MonthlyCsvMirror::new(export.dir.clone()))
}

/// Lee `.env`/entorno, construye el pool (migrando el esquema) y devuelve el
/// ledger listo para usar.
pub fn open_ledger_from_env() -> Result<PgLedger, PersistenceError> {
    let pool = custody_persistence::build_dev_pool_from_env()?;
    let export = ExportConfig::from_env();
    info!("ledger:open export_dir={}", export.dir.display());
    Ok(open_ledger(pool, &export))
}
