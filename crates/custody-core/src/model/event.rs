//! Evento de custodia: entrada cruda, forma normalizada y fila persistida.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::types::{ActorRole, CustodyAction, Location};

/// Campos tal como los entrega un llamador (picker, driver, sistema).
///
/// Todo es opcional para que la validación pueda listar *todos* los campos
/// faltantes en un solo error. Los enums llegan como texto y se normalizan
/// con su política de respaldo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCustodyEvent {
    pub work_order_id: Option<i64>,
    pub technician_id: Option<i64>,
    pub part_number: Option<String>,
    pub quantity: Option<i64>,
    pub action: Option<String>,
    pub from_location: Option<String>,
    pub to_location: Option<String>,
    pub actor_role: Option<String>,
    pub actor_user_id: Option<i64>,
    pub device_id: Option<String>,
    pub source: Option<String>,
    pub timestamp_utc: Option<DateTime<Utc>>,
    pub extra: Option<Map<String, Value>>,
}

impl RawCustodyEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn work_order(mut self, id: i64) -> Self {
        self.work_order_id = Some(id);
        self
    }

    pub fn technician(mut self, id: i64) -> Self {
        self.technician_id = Some(id);
        self
    }

    pub fn part(mut self, part_number: impl Into<String>) -> Self {
        self.part_number = Some(part_number.into());
        self
    }

    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Atajo para el tramo `from → to`.
    pub fn route(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_location = Some(from.into());
        self.to_location = Some(to.into());
        self
    }

    pub fn actor(mut self, role: impl Into<String>, user_id: i64) -> Self {
        self.actor_role = Some(role.into());
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn at(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp_utc = Some(ts);
        self
    }

    pub fn extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Evento normalizado e inmutable, listo para persistir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustodyEvent {
    pub event_uid: Uuid,
    pub work_order_id: i64,
    /// 0 = técnico no resuelto (se tolera en ingesta).
    pub technician_id: i64,
    pub part_number: String,
    pub quantity: i32,
    pub action: CustodyAction,
    pub from_location: Location,
    pub to_location: Location,
    pub actor_role: ActorRole,
    pub actor_user_id: i64,
    pub device_id: String,
    pub timestamp_utc: DateTime<Utc>,
    pub source: String,
    pub extra: Option<Map<String, Value>>,
}

impl CustodyEvent {
    /// Clave de agregación que este evento alimenta.
    pub fn quantity_key(&self) -> QuantityKey {
        QuantityKey { work_order_id: self.work_order_id,
                      technician_id: self.technician_id,
                      part_number: self.part_number.clone(),
                      action: self.action,
                      from_location: self.from_location,
                      to_location: self.to_location }
    }

    pub fn matches(&self, key: &QuantityKey) -> bool {
        self.work_order_id == key.work_order_id
        && self.technician_id == key.technician_id
        && self.part_number == key.part_number
        && self.action == key.action
        && self.from_location == key.from_location
        && self.to_location == key.to_location
    }
}

/// Evento ya persistido; `id` lo asigna el store (monotónico).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub event: CustodyEvent,
}

/// Clave exacta sobre la que se suma `quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantityKey {
    pub work_order_id: i64,
    pub technician_id: i64,
    pub part_number: String,
    pub action: CustodyAction,
    pub from_location: Location,
    pub to_location: Location,
}

impl QuantityKey {
    /// Tramo estante → camión del driver.
    pub fn loaded(work_order_id: i64, technician_id: i64, part_number: &str) -> Self {
        Self { work_order_id,
               technician_id,
               part_number: part_number.to_string(),
               action: CustodyAction::Loaded,
               from_location: Location::WarehouseShelf,
               to_location: Location::DriverTruck }
    }

    /// Tramo camión del driver → camión del técnico.
    pub fn dropped_off(work_order_id: i64, technician_id: i64, part_number: &str) -> Self {
        Self { work_order_id,
               technician_id,
               part_number: part_number.to_string(),
               action: CustodyAction::DroppedOff,
               from_location: Location::DriverTruck,
               to_location: Location::TechTruck }
    }
}
