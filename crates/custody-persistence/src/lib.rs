//! custody-persistence
//!
//! Backend Postgres (Diesel) del ledger de custodia.
//! Objetivo: proveer la implementación durable de `EventStore` del core más
//! utilidades de conexión y migraciones embebidas.
//!
//! Módulos:
//! - `pg`: `PgEventStore` sobre la tabla append-only `custody_events`.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig, ExportConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgEventStore, PgPool, PoolProvider};
