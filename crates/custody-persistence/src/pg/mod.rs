//! Implementación Postgres (Diesel) del `EventStore` del core.
//!
//! - Tabla append-only `custody_events`: orden total por `id` (BIGSERIAL),
//!   `event_uid` único, sin updates ni deletes (trigger en la migración).
//! - Transacciones read-write con el aislamiento por defecto de Postgres
//!   (READ COMMITTED). Cada inserción dentro de una transacción corre en su
//!   propio savepoint: si falla, la transacción externa sigue utilizable
//!   (necesario para el marcador best-effort de `complete_stop`).
//! - Las escrituras no se reintentan. Las lecturas idempotentes fuera de una
//!   transacción (`aggregate_quantity`, `list_events`) sí, ante errores
//!   transitorios.

use chrono::{DateTime, Utc};
use diesel::dsl::sum;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::result::Error as DieselError;
use log::{debug, error, warn};
use serde_json::Value;
use uuid::Uuid;

use custody_core::{ActorRole, CustodyAction, CustodyError, CustodyEvent, EventStore, LedgerEntry, LedgerTx, Location,
                   QuantityKey, StoreError};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::custody_events;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
///
/// Al construirlo con `build_pool` se corre el set de migraciones pendientes
/// (una sola vez).
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real (producción/tests de integración) o
/// simularlo en tests sin acoplar a r2d2. Debe devolver una conexión válida o
/// `PersistenceError::TransientIo`.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// Implementación concreta de `ConnectionProvider` respaldada por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}
impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Fila para insertar en `custody_events`.
#[derive(Insertable, Debug)]
#[diesel(table_name = custody_events)]
pub struct NewEventRow<'a> {
    pub event_uid: &'a Uuid,
    pub work_order_id: i64,
    pub technician_id: i64,
    pub part_number: &'a str,
    pub quantity: i32,
    pub action: &'static str,
    pub from_location: &'static str,
    pub to_location: &'static str,
    pub actor_role: &'static str,
    pub actor_user_id: i64,
    pub device_id: &'a str,
    pub timestamp_utc: &'a DateTime<Utc>,
    pub source: &'a str,
    pub extra: Option<Value>,
}

impl<'a> NewEventRow<'a> {
    pub fn from_event(event: &'a CustodyEvent) -> Self {
        Self { event_uid: &event.event_uid,
               work_order_id: event.work_order_id,
               technician_id: event.technician_id,
               part_number: &event.part_number,
               quantity: event.quantity,
               action: event.action.as_str(),
               from_location: event.from_location.as_str(),
               to_location: event.to_location.as_str(),
               actor_role: event.actor_role.as_str(),
               actor_user_id: event.actor_user_id,
               device_id: &event.device_id,
               timestamp_utc: &event.timestamp_utc,
               source: &event.source,
               extra: event.extra.clone().map(Value::Object) }
    }
}

/// Fila mapeada de `custody_events` para lecturas (orden de columnas de la
/// tabla).
#[derive(Queryable, Debug)]
pub struct EventRow {
    pub id: i64,
    pub event_uid: Uuid,
    pub work_order_id: i64,
    pub technician_id: i64,
    pub part_number: String,
    pub quantity: i32,
    pub action: String,
    pub from_location: String,
    pub to_location: String,
    pub actor_role: String,
    pub actor_user_id: i64,
    pub device_id: String,
    pub timestamp_utc: DateTime<Utc>,
    pub source: String,
    pub extra: Option<Value>,
}

impl From<EventRow> for LedgerEntry {
    fn from(row: EventRow) -> Self {
        // Los CHECK de la tabla garantizan texto válido; normalize sólo convierte.
        let extra = match row.extra {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };
        LedgerEntry { id: row.id,
                      event: CustodyEvent { event_uid: row.event_uid,
                                            work_order_id: row.work_order_id,
                                            technician_id: row.technician_id,
                                            part_number: row.part_number,
                                            quantity: row.quantity,
                                            action: CustodyAction::normalize(&row.action),
                                            from_location: Location::normalize(&row.from_location),
                                            to_location: Location::normalize(&row.to_location),
                                            actor_role: ActorRole::normalize(&row.actor_role),
                                            actor_user_id: row.actor_user_id,
                                            device_id: row.device_id,
                                            timestamp_utc: row.timestamp_utc,
                                            source: row.source,
                                            extra } }
    }
}

/// Retry simple con backoff muy pequeño (hasta 3 reintentos: 15ms, 30ms, 45ms).
///
/// Sólo para lecturas idempotentes; emite `warn!` por intento.
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if e.is_retryable() && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// `SUM(quantity)` para la clave exacta; 0 si no hay filas.
fn sum_quantity(conn: &mut PgConnection, key: &QuantityKey) -> Result<u64, PersistenceError> {
    let total: Option<i64> = custody_events::table.filter(custody_events::work_order_id.eq(key.work_order_id))
                                                  .filter(custody_events::technician_id.eq(key.technician_id))
                                                  .filter(custody_events::part_number.eq(key.part_number.as_str()))
                                                  .filter(custody_events::action.eq(key.action.as_str()))
                                                  .filter(custody_events::from_location.eq(key.from_location.as_str()))
                                                  .filter(custody_events::to_location.eq(key.to_location.as_str()))
                                                  .select(sum(custody_events::quantity))
                                                  .get_result(conn)?;
    Ok(total.unwrap_or(0).max(0) as u64)
}

/// Vista `LedgerTx` sobre una conexión que ya está dentro de una transacción.
struct PgLedgerTx<'c> {
    conn: &'c mut PgConnection,
}

impl LedgerTx for PgLedgerTx<'_> {
    fn insert_event(&mut self, event: &CustodyEvent) -> Result<(), StoreError> {
        let row = NewEventRow::from_event(event);
        // transacción anidada = SAVEPOINT: un fallo no aborta la transacción externa
        self.conn
            .transaction::<_, DieselError, _>(|sp| diesel::insert_into(custody_events::table).values(&row).execute(sp))
            .map(|_| ())
            .map_err(|e| StoreError::from(PersistenceError::from(e)))
    }

    fn aggregate_quantity(&mut self, key: &QuantityKey) -> Result<u64, StoreError> {
        sum_quantity(self.conn, key).map_err(StoreError::from)
    }
}

/// Error de la clausura de transacción: o lo devolvió el trabajo del ledger o
/// lo produjo Diesel (BEGIN/COMMIT).
enum TxFailure {
    Work(CustodyError),
    Db(DieselError),
}

impl From<DieselError> for TxFailure {
    fn from(err: DieselError) -> Self {
        TxFailure::Db(err)
    }
}

/// Implementación Postgres de `EventStore` (append-only).
pub struct PgEventStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgEventStore<P> {
    /// Crea un `PgEventStore` a partir de un `ConnectionProvider` (generalmente
    /// `PoolProvider`).
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> EventStore for PgEventStore<P> {
    fn transaction<T, F>(&self, work: F) -> Result<T, CustodyError>
        where F: FnOnce(&mut dyn LedgerTx) -> Result<T, CustodyError>
    {
        let mut conn = self.provider
                           .connection()
                           .map_err(|e| CustodyError::StoreWrite(e.into()))?;
        conn.build_transaction()
            .read_write()
            .run(|tx_conn| {
                let mut tx = PgLedgerTx { conn: tx_conn };
                work(&mut tx).map_err(TxFailure::Work)
            })
            .map_err(|failure| match failure {
                TxFailure::Work(err) => err,
                TxFailure::Db(db) => {
                    let err = PersistenceError::from(db);
                    error!("transaction:failed err={err}");
                    CustodyError::StoreWrite(err.into())
                }
            })
    }

    fn aggregate_quantity(&self, key: &QuantityKey) -> Result<u64, StoreError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            sum_quantity(&mut conn, key)
        }).map_err(StoreError::from)
    }

    fn list_events(&self, work_order_id: i64) -> Result<Vec<LedgerEntry>, StoreError> {
        debug!("list_events:start work_order_id={work_order_id}");
        let rows: Vec<EventRow> = with_retry(|| {
                                      let mut conn = self.provider.connection()?;
                                      custody_events::table.filter(custody_events::work_order_id.eq(work_order_id))
                                                           .order(custody_events::id.asc())
                                                           .load(&mut conn)
                                                           .map_err(PersistenceError::from)
                                  }).map_err(|e| {
                                        error!("list_events:load error work_order_id={work_order_id} err={e}");
                                        StoreError::from(e)
                                    })?;
        debug!("list_events:done work_order_id={work_order_id} count={}", rows.len());
        Ok(rows.into_iter().map(LedgerEntry::from).collect())
    }
}

/// Construye un pool Postgres r2d2 a partir de URL.
///
/// Comportamiento:
/// - Tamaños en 0 se elevan a 1; si `min_size > max_size`, usa `min = max`.
/// - Ejecuta las migraciones pendientes en el primer checkout (aprovisiona el
///   esquema antes de cualquier escritura).
/// - Devuelve `PersistenceError::TransientIo` ante errores del pool/manager.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("min_size > max_size ({} > {}), ajustando min=max", validated_min, validated_max);
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Carga `.env`, lee configuración (DATABASE_URL, tamaños) y construye un
/// pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
