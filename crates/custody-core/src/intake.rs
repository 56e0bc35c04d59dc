//! Ayudas para los llamadores que alimentan el ledger (picker, driver).
//!
//! `record_event` no es idempotente, así que los flujos de escaneo comparan
//! el estado guardado anterior con el nuevo y sólo registran las
//! transiciones nuevas. Este módulo hace ese diff y arma los eventos crudos.
use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use uuid::Uuid;

use crate::ledger::CustodyLedger;
use crate::model::normalize::sanitize_text;
use crate::model::{ActorRole, CustodyAction, Location, RawCustodyEvent};
use crate::store::EventStore;

/// Dispositivo por defecto cuando el cliente no se identifica.
pub const UNKNOWN_DEVICE: &str = "unknown";

/// Directorio de técnicos (externo al ledger).
pub trait TechnicianDirectory {
    fn contains(&self, technician_id: i64) -> bool;
    fn find_by_name(&self, name: &str) -> Option<i64>;
}

/// Resuelve un técnico por id numérico o por nombre exacto; 0 si no existe.
pub fn resolve_technician_id<D: TechnicianDirectory + ?Sized>(identifier: &str, directory: &D) -> i64 {
    let identifier = identifier.trim();
    if let Ok(id) = identifier.parse::<i64>() {
        if id > 0 && directory.contains(id) {
            return id;
        }
    }
    if identifier.is_empty() {
        return 0;
    }
    directory.find_by_name(identifier).filter(|id| *id > 0).unwrap_or(0)
}

/// Quién y dónde: datos comunes a todos los eventos de un guardado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeContext {
    pub work_order_id: i64,
    pub technician_id: i64,
    pub actor_user_id: i64,
    pub device_id: String,
}

impl IntakeContext {
    fn device(&self) -> String {
        let device = sanitize_text(&self.device_id);
        if device.is_empty() { UNKNOWN_DEVICE.to_string() } else { device }
    }

    fn base(&self, role: ActorRole, source: &str) -> RawCustodyEvent {
        RawCustodyEvent::new().work_order(self.work_order_id)
                              .technician(self.technician_id)
                              .actor(role.as_str(), self.actor_user_id)
                              .device(self.device())
                              .source(source)
    }
}

/// Fila de la hoja de picking (parte y cantidad requerida).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    pub part_number: String,
    pub quantity: i64,
}

/// Escaneo de estante hecho por el picker para una fila.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickDetail {
    pub bin: String,
    pub shelf: String,
    /// Epoch en segundos; 0 si el cliente no lo envió.
    pub time: i64,
}

/// Cantidad de la hoja en valor absoluto; 0 cuenta como 1.
fn row_quantity(quantity: i64) -> i64 {
    match quantity.saturating_abs() {
        0 => 1,
        q => q,
    }
}

/// Eventos `PICKED` para las filas cuyo estante se escaneó por primera vez.
///
/// Se omiten filas sin parte y todo el lote si el técnico no está resuelto.
pub fn picked_events(ctx: &IntakeContext,
                     rows: &[SheetRow],
                     previous: &BTreeMap<usize, PickDetail>,
                     current: &BTreeMap<usize, PickDetail>)
                     -> Vec<RawCustodyEvent> {
    if ctx.technician_id <= 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for (idx, detail) in current {
        if detail.shelf.trim().is_empty() {
            continue;
        }
        let already_scanned = previous.get(idx).is_some_and(|prev| !prev.shelf.trim().is_empty());
        if already_scanned {
            continue;
        }
        let Some(row) = rows.get(*idx) else {
            continue;
        };
        let part_number = sanitize_text(&row.part_number);
        if part_number.is_empty() {
            continue;
        }
        let pick_time = if detail.time > 0 { detail.time } else { Utc::now().timestamp() };
        let mut extra = Map::new();
        extra.insert("bin".into(), json!(detail.bin));
        extra.insert("shelf".into(), json!(detail.shelf));
        extra.insert("pick_time".into(), json!(pick_time));
        out.push(ctx.base(ActorRole::Picker, "picker")
                    .part(part_number)
                    .quantity(row_quantity(row.quantity))
                    .action(CustodyAction::Picked.as_str())
                    .route(Location::WarehouseShelf.as_str(), Location::DriverTruck.as_str())
                    .extra(extra));
    }
    out
}

/// Estado guardado del driver: partes cargadas y entregadas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverProgress {
    pub loaded: BTreeSet<String>,
    pub delivered: BTreeSet<String>,
}

impl DriverProgress {
    /// Normaliza los part numbers (limpieza + deduplicado).
    pub fn new<I, J>(loaded: I, delivered: J) -> Self
        where I: IntoIterator,
              I::Item: AsRef<str>,
              J: IntoIterator,
              J::Item: AsRef<str>
    {
        let clean = |p: &str| sanitize_text(p);
        Self { loaded: loaded.into_iter().map(|p| clean(p.as_ref())).filter(|p| !p.is_empty()).collect(),
               delivered: delivered.into_iter().map(|p| clean(p.as_ref())).filter(|p| !p.is_empty()).collect() }
    }
}

fn required_for(rows: &[SheetRow], part_number: &str) -> i64 {
    let total: i64 = rows.iter()
                         .filter(|row| sanitize_text(&row.part_number) == part_number)
                         .map(|row| row_quantity(row.quantity))
                         .sum();
    row_quantity(total)
}

/// Eventos `LOADED` / `DROPPED_OFF` para partes recién marcadas por el driver.
///
/// La cantidad de cada evento es la requerida por la hoja para esa parte
/// (1 si la hoja no la trae).
pub fn driver_events(ctx: &IntakeContext,
                     rows: &[SheetRow],
                     previous: &DriverProgress,
                     current: &DriverProgress)
                     -> Vec<RawCustodyEvent> {
    if ctx.technician_id <= 0 {
        return Vec::new();
    }
    let loaded = current.loaded.difference(&previous.loaded).map(|part| {
                                                                  ctx.base(ActorRole::Driver, "driver")
                                                                     .part(part.clone())
                                                                     .quantity(required_for(rows, part))
                                                                     .action(CustodyAction::Loaded.as_str())
                                                                     .route(Location::WarehouseShelf.as_str(),
                                                                            Location::DriverTruck.as_str())
                                                              });
    let dropped = current.delivered.difference(&previous.delivered).map(|part| {
                                                                        ctx.base(ActorRole::Driver, "driver")
                                                                           .part(part.clone())
                                                                           .quantity(required_for(rows, part))
                                                                           .action(CustodyAction::DroppedOff.as_str())
                                                                           .route(Location::DriverTruck.as_str(),
                                                                                  Location::TechTruck.as_str())
                                                                    });
    loaded.chain(dropped).collect()
}

/// Registra cada evento por separado; los fallos se loguean y no cortan el lote.
pub fn record_best_effort<S: EventStore>(ledger: &CustodyLedger<S>, events: Vec<RawCustodyEvent>) -> Vec<Uuid> {
    events.into_iter()
          .filter_map(|raw| {
              let source = raw.source.clone().unwrap_or_default();
              match ledger.record_event(raw) {
                  Ok(uid) => Some(uid),
                  Err(e) => {
                      warn!("{source} event log failed: {e}");
                      None
                  }
              }
          })
          .collect()
}
