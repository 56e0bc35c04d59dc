//! `CustodyLedger`: ingesta validada de eventos y consultas de agregado.
//!
//! Flujo de `record_event`:
//! 1. normaliza la entrada (`model::normalize_event`), con un `event_uid` v4
//!    nuevo que nunca proviene del llamador;
//! 2. recién entonces abre una transacción del store e inserta (fallo →
//!    `StoreWrite`, sin reintentos);
//! 3. copia la fila al espejo de auditoría, best-effort.
//!
//! La operación no es idempotente: dos llamadas con los mismos datos producen
//! dos eventos distintos. Detectar "esto ya se registró" es responsabilidad
//! del llamador (ver `intake`).
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::CustodyError;
use crate::mirror::AuditMirror;
use crate::model::{normalize_event, CustodyEvent, LedgerEntry, QuantityKey, RawCustodyEvent};
use crate::store::{EventStore, LedgerTx};

pub struct CustodyLedger<S: EventStore> {
    store: S,
    mirror: Option<Arc<dyn AuditMirror>>,
}

impl<S: EventStore> CustodyLedger<S> {
    /// Ledger sin espejo de auditoría.
    pub fn new(store: S) -> Self {
        Self { store, mirror: None }
    }

    pub fn with_mirror(mut self, mirror: impl AuditMirror + 'static) -> Self {
        self.mirror = Some(Arc::new(mirror));
        self
    }

    pub fn with_shared_mirror(mut self, mirror: Arc<dyn AuditMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registra un evento y devuelve su `event_uid`.
    ///
    /// La entrada se valida antes de abrir la transacción: un rechazo nunca
    /// toca el store.
    pub fn record_event(&self, raw: RawCustodyEvent) -> Result<Uuid, CustodyError> {
        self.record_prepared(self.prepare(&raw)?)
    }

    /// Persiste un evento ya devuelto por `prepare` (transacción propia +
    /// espejo). Permite validar un lote completo antes de escribir.
    pub fn record_prepared(&self, event: CustodyEvent) -> Result<Uuid, CustodyError> {
        self.store.transaction(|tx| self.insert_in(tx, &event))?;
        self.mirror_best_effort(&event);
        info!("record_event:logged source={} event_uid={} work_order_id={} part={}",
              event.source.to_lowercase(),
              event.event_uid,
              event.work_order_id,
              event.part_number);
        Ok(event.event_uid)
    }

    /// Valida e inserta dentro de una transacción abierta por el llamador.
    ///
    /// No escribe el espejo: el evento aún puede revertirse, así que el
    /// llamador lo copia tras confirmar.
    pub fn record_event_in(&self, tx: &mut dyn LedgerTx, raw: &RawCustodyEvent) -> Result<CustodyEvent, CustodyError> {
        let event = self.prepare(raw)?;
        self.insert_in(tx, &event)?;
        Ok(event)
    }

    /// Normaliza `raw` asignando un `event_uid` nuevo.
    pub fn prepare(&self, raw: &RawCustodyEvent) -> Result<CustodyEvent, CustodyError> {
        let event = normalize_event(raw, Uuid::new_v4(), Utc::now()).map_err(|e| {
                                                                            warn!("record_event:rejected {e}");
                                                                            e
                                                                        })?;
        info!("record_event:in source={} work_order_id={} part={} qty={} action={} actor={}",
              event.source.to_lowercase(),
              event.work_order_id,
              event.part_number,
              event.quantity,
              event.action,
              event.actor_role);
        Ok(event)
    }

    /// Inserta un evento ya normalizado en `tx`.
    pub fn insert_in(&self, tx: &mut dyn LedgerTx, event: &CustodyEvent) -> Result<(), CustodyError> {
        tx.insert_event(event).map_err(|e| {
                                  error!("record_event:insert failed event_uid={} err={e}", event.event_uid);
                                  CustodyError::StoreWrite(e)
                              })
    }

    /// Suma de `quantity` para `key`; 0 cuando nada coincide.
    pub fn aggregate_quantity(&self, key: &QuantityKey) -> Result<u64, CustodyError> {
        let total = self.store.aggregate_quantity(key).map_err(CustodyError::StoreRead)?;
        debug!("aggregate_quantity work_order_id={} tech_id={} part={} action={} {}->{} total={total}",
               key.work_order_id,
               key.technician_id,
               key.part_number,
               key.action,
               key.from_location,
               key.to_location);
        Ok(total)
    }

    /// Historial de una orden de trabajo (orden de inserción).
    pub fn history(&self, work_order_id: i64) -> Result<Vec<LedgerEntry>, CustodyError> {
        self.store.list_events(work_order_id).map_err(CustodyError::StoreRead)
    }

    /// Copia `event` al espejo. Nunca falla: los errores quedan en el log.
    pub fn mirror_best_effort(&self, event: &CustodyEvent) {
        let Some(mirror) = &self.mirror else {
            return;
        };
        if let Err(e) = mirror.append(event) {
            warn!("mirror:append failed event_uid={} err={e}", event.event_uid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MirrorError;
    use crate::store::InMemoryEventStore;

    struct BrokenMirror;
    impl AuditMirror for BrokenMirror {
        fn append(&self, _event: &CustodyEvent) -> Result<(), MirrorError> {
            Err(MirrorError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only")))
        }
    }

    fn raw() -> RawCustodyEvent {
        RawCustodyEvent::new().work_order(5)
                              .technician(1)
                              .part("A1")
                              .quantity(2)
                              .action("PICKED")
                              .route("WAREHOUSE_SHELF", "DRIVER_TRUCK")
                              .actor("PICKER", 12)
                              .device("handheld")
                              .source("picker")
    }

    #[test]
    fn mirror_failure_does_not_fail_ingestion() {
        let ledger = CustodyLedger::new(InMemoryEventStore::new()).with_mirror(BrokenMirror);
        let uid = ledger.record_event(raw()).expect("ingesta debe tener éxito");
        let rows = ledger.store().entries();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event.event_uid, uid);
    }

    #[test]
    fn rejected_input_persists_nothing() {
        let ledger = CustodyLedger::new(InMemoryEventStore::new());
        assert!(ledger.record_event(raw().quantity(0)).is_err());
        assert!(ledger.record_event(raw().source("")).is_err());
        assert!(ledger.store().is_empty());
    }
}
