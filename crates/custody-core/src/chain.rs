//! Validación de la cadena de custodia y cierre de paradas.
//!
//! Una parada (orden de trabajo + técnico) se puede cerrar cuando, para cada
//! parte del manifiesto con cantidad requerida > 0:
//! - `LOADED` WAREHOUSE_SHELF → DRIVER_TRUCK suma al menos lo requerido, y
//! - `DROPPED_OFF` DRIVER_TRUCK → TECH_TRUCK suma al menos lo requerido.
//!
//! Entradas con cantidad ≤ 0 se consideran satisfechas y no se evalúan. La
//! primera parte que falla corta la evaluación y se reporta como
//! `ChainShortfall`.
//!
//! `complete_stop` valida dentro de una transacción y, si pasa, intenta dejar
//! un evento marcador `STOCKED` del actor SYSTEM. El marcador es best-effort:
//! si no se puede escribir la parada igual se considera completada.
use std::fmt;

use chrono::Utc;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::constants::{EXPORT_TIMESTAMP_FORMAT, STOP_MARKER_PART};
use crate::errors::{CustodyError, StoreError};
use crate::ledger::CustodyLedger;
use crate::model::{ActorRole, CompletionManifest, CustodyAction, CustodyEvent, Location, QuantityKey, RawCustodyEvent};
use crate::store::{EventStore, LedgerTx};

/// Primera parte que no alcanzó la cantidad requerida en algún tramo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainShortfall {
    pub part_number: String,
    pub required: u64,
    pub loaded: u64,
    pub dropped: u64,
}

impl fmt::Display for ChainShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
               "part={} required={} loaded={} dropped={}",
               self.part_number, self.required, self.loaded, self.dropped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    Complete,
    Incomplete(ChainShortfall),
}

impl ChainStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, ChainStatus::Complete)
    }
}

/// Parámetros de `complete_stop`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopCompletion {
    pub work_order_id: i64,
    pub technician_id: i64,
    pub manifest: CompletionManifest,
    pub actor_user_id: i64,
    pub device_id: String,
    pub source: String,
}

/// Resultado de un cierre exitoso. `marker_uid` es `None` si el marcador no
/// pudo registrarse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    pub marker_uid: Option<Uuid>,
}

/// Recorre el manifiesto usando `aggregate` para leer sumas del ledger.
fn evaluate_chain<F>(work_order_id: i64,
                     technician_id: i64,
                     manifest: &CompletionManifest,
                     mut aggregate: F)
                     -> Result<ChainStatus, StoreError>
    where F: FnMut(&QuantityKey) -> Result<u64, StoreError>
{
    for entry in manifest.iter() {
        if entry.required_quantity <= 0 {
            continue;
        }
        let required = entry.required_quantity as u64;
        let part_number = entry.normalized_part();
        let loaded = aggregate(&QuantityKey::loaded(work_order_id, technician_id, &part_number))?;
        let dropped = aggregate(&QuantityKey::dropped_off(work_order_id, technician_id, &part_number))?;
        if loaded < required || dropped < required {
            warn!("chain incomplete: work_order_id={work_order_id} tech_id={technician_id} part={part_number} \
                   required={required} loaded={loaded} dropped={dropped}");
            return Ok(ChainStatus::Incomplete(ChainShortfall { part_number,
                                                               required,
                                                               loaded,
                                                               dropped }));
        }
    }
    Ok(ChainStatus::Complete)
}

/// Evento crudo del marcador de cierre.
fn marker_event(req: &StopCompletion) -> RawCustodyEvent {
    let parts: Vec<Value> = req.manifest
                               .iter()
                               .map(|entry| {
                                   json!({ "part_number": entry.normalized_part(),
                                           "qty": entry.required_quantity.saturating_abs() })
                               })
                               .collect();
    let mut extra = Map::new();
    extra.insert("completed_at".into(), json!(Utc::now().format(EXPORT_TIMESTAMP_FORMAT).to_string()));
    extra.insert("parts".into(), Value::Array(parts));

    RawCustodyEvent::new().work_order(req.work_order_id)
                          .technician(req.technician_id)
                          .part(STOP_MARKER_PART)
                          .quantity(1)
                          .action(CustodyAction::Stocked.as_str())
                          .route(Location::TechTruck.as_str(), Location::None.as_str())
                          .actor(ActorRole::System.as_str(), req.actor_user_id)
                          .device(req.device_id.clone())
                          .source(req.source.clone())
                          .extra(extra)
}

/// Validador de cadena sobre un ledger concreto.
pub struct ChainValidator<'a, S: EventStore> {
    ledger: &'a CustodyLedger<S>,
}

impl<'a, S: EventStore> ChainValidator<'a, S> {
    pub fn new(ledger: &'a CustodyLedger<S>) -> Self {
        Self { ledger }
    }

    /// Estado de la cadena con el detalle de la primera parte faltante.
    pub fn check_chain(&self,
                       work_order_id: i64,
                       technician_id: i64,
                       manifest: &CompletionManifest)
                       -> Result<ChainStatus, CustodyError> {
        evaluate_chain(work_order_id, technician_id, manifest, |key| {
            self.ledger.store().aggregate_quantity(key)
        }).map_err(CustodyError::StoreRead)
    }

    pub fn is_chain_complete(&self,
                             work_order_id: i64,
                             technician_id: i64,
                             manifest: &CompletionManifest)
                             -> Result<bool, CustodyError> {
        Ok(self.check_chain(work_order_id, technician_id, manifest)?.is_complete())
    }

    /// Valida la cadena y cierra la parada.
    ///
    /// - Cadena incompleta: `IncompleteChain`, transacción revertida, ninguna
    ///   fila nueva.
    /// - Cadena completa: se intenta el marcador; su fallo sólo se loguea.
    /// - Cualquier otro fallo durante la validación o el commit: `Completion`.
    pub fn complete_stop(&self, req: &StopCompletion) -> Result<StopOutcome, CustodyError> {
        info!("complete_stop:start work_order_id={} tech_id={} parts={}",
              req.work_order_id,
              req.technician_id,
              req.manifest.entries.len());
        let result = self.ledger.store().transaction(|tx| {
                                            let status = evaluate_chain(req.work_order_id,
                                                                        req.technician_id,
                                                                        &req.manifest,
                                                                        |key| tx.aggregate_quantity(key))
                                                .map_err(|e| CustodyError::Completion(format!("chain validation: {e}")))?;
                                            if let ChainStatus::Incomplete(shortfall) = status {
                                                return Err(CustodyError::IncompleteChain(shortfall));
                                            }
                                            Ok(self.try_record_marker(tx, req))
                                        });
        match result {
            Ok(marker) => {
                if let Some(event) = &marker {
                    self.ledger.mirror_best_effort(event);
                }
                info!("complete_stop:done work_order_id={} tech_id={} marker={}",
                      req.work_order_id,
                      req.technician_id,
                      marker.is_some());
                Ok(StopOutcome { marker_uid: marker.map(|e| e.event_uid) })
            }
            Err(e @ CustodyError::IncompleteChain(_)) | Err(e @ CustodyError::Completion(_)) => Err(e),
            Err(other) => {
                error!("complete_stop:failed work_order_id={} err={other}", req.work_order_id);
                Err(CustodyError::Completion(other.to_string()))
            }
        }
    }

    fn try_record_marker(&self, tx: &mut dyn LedgerTx, req: &StopCompletion) -> Option<CustodyEvent> {
        match self.ledger.record_event_in(tx, &marker_event(req)) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("complete_stop:marker not recorded work_order_id={} err={e}", req.work_order_id);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_requirements_never_query() {
        let manifest = CompletionManifest::default().with("A1", 0).with("B2", -3);
        let status = evaluate_chain(1, 1, &manifest, |_| panic!("no debe consultar")).unwrap();
        assert_eq!(status, ChainStatus::Complete);
    }

    #[test]
    fn first_failing_part_short_circuits() {
        let manifest = CompletionManifest::default().with("A1", 2).with("B2", 2);
        let mut queried = Vec::new();
        let status = evaluate_chain(1, 1, &manifest, |key| {
                         queried.push(key.part_number.clone());
                         Ok(1)
                     }).unwrap();
        assert_eq!(status,
                   ChainStatus::Incomplete(ChainShortfall { part_number: "A1".into(),
                                                            required: 2,
                                                            loaded: 1,
                                                            dropped: 1 }));
        assert_eq!(queried, vec!["A1".to_string(), "A1".to_string()]);
    }

    #[test]
    fn marker_carries_manifest() {
        let req = StopCompletion { work_order_id: 3,
                                   technician_id: 4,
                                   manifest: CompletionManifest::default().with("A1", 5).with("B2", -2),
                                   actor_user_id: 9,
                                   device_id: "tablet".into(),
                                   source: "driver".into() };
        let raw = marker_event(&req);
        assert_eq!(raw.part_number.as_deref(), Some("N/A"));
        assert_eq!(raw.action.as_deref(), Some("STOCKED"));
        assert_eq!(raw.to_location.as_deref(), Some("N/A"));
        let extra = raw.extra.unwrap();
        assert!(extra.contains_key("completed_at"));
        assert_eq!(extra["parts"], json!([{ "part_number": "A1", "qty": 5 }, { "part_number": "B2", "qty": 2 }]));
    }
}
