use std::sync::Mutex;

use super::{EventStore, LedgerTx};
use crate::errors::{CustodyError, StoreError};
use crate::model::{CustodyEvent, LedgerEntry, QuantityKey};

/// Backend en memoria.
///
/// Las filas son append-only, así que una transacción inserta directamente y
/// al revertir sólo recorta hasta el largo confirmado: un `Err` deja el store
/// intacto sin copiar filas. El mutex se mantiene durante toda la transacción
/// (aislamiento serializable).
#[derive(Default)]
pub struct InMemoryEventStore {
    inner: Mutex<Vec<LedgerEntry>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copia de todas las filas (orden de inserción).
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.inner.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct MemoryTx<'a> {
    rows: &'a mut Vec<LedgerEntry>,
}

fn sum_matching(rows: &[LedgerEntry], key: &QuantityKey) -> u64 {
    rows.iter()
        .filter(|row| row.event.matches(key))
        .map(|row| row.event.quantity.max(0) as u64)
        .sum()
}

impl LedgerTx for MemoryTx<'_> {
    fn insert_event(&mut self, event: &CustodyEvent) -> Result<(), StoreError> {
        if self.rows.iter().any(|row| row.event.event_uid == event.event_uid) {
            return Err(StoreError::UniqueViolation(format!("event_uid {} already stored", event.event_uid)));
        }
        let id = self.rows.last().map(|row| row.id + 1).unwrap_or(1);
        self.rows.push(LedgerEntry { id, event: event.clone() });
        Ok(())
    }

    fn aggregate_quantity(&mut self, key: &QuantityKey) -> Result<u64, StoreError> {
        Ok(sum_matching(&*self.rows, key))
    }
}

impl EventStore for InMemoryEventStore {
    fn transaction<T, F>(&self, work: F) -> Result<T, CustodyError>
        where F: FnOnce(&mut dyn LedgerTx) -> Result<T, CustodyError>
    {
        let mut guard = self.inner
                            .lock()
                            .map_err(|_| CustodyError::StoreWrite(StoreError::Backend("memory store poisoned".into())))?;
        let committed = guard.len();
        let result = work(&mut MemoryTx { rows: &mut *guard });
        match result {
            Ok(out) => Ok(out),
            Err(e) => {
                guard.truncate(committed);
                Err(e)
            }
        }
    }

    fn aggregate_quantity(&self, key: &QuantityKey) -> Result<u64, StoreError> {
        let rows = self.inner.lock().map_err(|_| StoreError::Backend("memory store poisoned".into()))?;
        Ok(sum_matching(&rows, key))
    }

    fn list_events(&self, work_order_id: i64) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = self.inner.lock().map_err(|_| StoreError::Backend("memory store poisoned".into()))?;
        Ok(rows.iter().filter(|row| row.event.work_order_id == work_order_id).cloned().collect())
    }
}
