//! Runner de migraciones embebidas.
//!
//! El esquema se aprovisiona una vez (al construir el pool o con
//! `custody migrate`), nunca en el camino caliente de cada inserción.

use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;

use crate::error::PersistenceError;

// Directorio `migrations/` de este crate.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Corre las migraciones pendientes y devuelve cuántas se aplicaron.
pub fn run_pending_migrations(conn: &mut PgConnection) -> Result<usize, PersistenceError> {
    let applied = conn.run_pending_migrations(MIGRATIONS)
                      .map_err(|e| PersistenceError::Unknown(format!("migration error: {e}")))?;
    for version in &applied {
        info!("migration applied: {version}");
    }
    Ok(applied.len())
}
