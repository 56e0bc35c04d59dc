//! Contrato de almacenamiento del ledger.
//!
//! El ledger no conoce el backend: sólo necesita abrir una transacción y,
//! dentro de ella, insertar eventos y sumar cantidades. Hay dos
//! implementaciones: `InMemoryEventStore` (tests, herramientas) y
//! `PgEventStore` en `custody-persistence`.

mod memory;

pub use memory::InMemoryEventStore;

use crate::errors::{CustodyError, StoreError};
use crate::model::{CustodyEvent, LedgerEntry, QuantityKey};

/// Operaciones disponibles dentro de una transacción abierta.
pub trait LedgerTx {
    /// Persiste un evento ya normalizado.
    ///
    /// Un fallo aquí no debe invalidar la transacción que lo contiene: el
    /// llamador puede ignorarlo y seguir (los backends SQL usan un savepoint).
    fn insert_event(&mut self, event: &CustodyEvent) -> Result<(), StoreError>;
    /// `SUM(quantity)` sobre los eventos que coinciden exactamente con `key`
    /// (0 si no hay ninguno).
    fn aggregate_quantity(&mut self, key: &QuantityKey) -> Result<u64, StoreError>;
}

/// Almacenamiento append-only de eventos de custodia.
pub trait EventStore: Send + Sync {
    /// Ejecuta `work` dentro de una transacción. `Ok` confirma, `Err` revierte.
    ///
    /// Si el backend falla al abrir o confirmar, el error se reporta como
    /// `CustodyError::StoreWrite`.
    fn transaction<T, F>(&self, work: F) -> Result<T, CustodyError>
        where F: FnOnce(&mut dyn LedgerTx) -> Result<T, CustodyError>;

    /// Lectura de agregado fuera de una transacción explícita.
    fn aggregate_quantity(&self, key: &QuantityKey) -> Result<u64, StoreError>;

    /// Eventos de una orden de trabajo, en orden de inserción.
    fn list_events(&self, work_order_id: i64) -> Result<Vec<LedgerEntry>, StoreError>;
}
