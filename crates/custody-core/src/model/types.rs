//! Enumeraciones del ledger (acción, ubicación, rol del actor).
//!
//! La normalización es permisiva: un texto fuera del conjunto conocido no es
//! un error, se degrada al valor de respaldo de cada enum. El match es exacto
//! (sensible a mayúsculas), igual que el sistema que alimenta el ledger.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Acción física registrada por un evento de custodia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustodyAction {
    Picked,
    Loaded,
    DroppedOff,
    Stocked,
}

impl CustodyAction {
    pub const FALLBACK: CustodyAction = CustodyAction::Picked;

    pub fn as_str(&self) -> &'static str {
        match self {
            CustodyAction::Picked => "PICKED",
            CustodyAction::Loaded => "LOADED",
            CustodyAction::DroppedOff => "DROPPED_OFF",
            CustodyAction::Stocked => "STOCKED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PICKED" => Some(CustodyAction::Picked),
            "LOADED" => Some(CustodyAction::Loaded),
            "DROPPED_OFF" => Some(CustodyAction::DroppedOff),
            "STOCKED" => Some(CustodyAction::Stocked),
            _ => None,
        }
    }

    /// Valor conocido o `PICKED`.
    pub fn normalize(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::FALLBACK)
    }
}

/// Ubicación dentro de la cadena estante → camión del driver → camión del técnico.
///
/// `None` se escribe como `N/A` (texto heredado que consumen los reportes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Location {
    WarehouseShelf,
    DriverTruck,
    TechTruck,
    #[serde(rename = "N/A")]
    None,
}

impl Location {
    pub const FALLBACK: Location = Location::None;

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::WarehouseShelf => "WAREHOUSE_SHELF",
            Location::DriverTruck => "DRIVER_TRUCK",
            Location::TechTruck => "TECH_TRUCK",
            Location::None => "N/A",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "WAREHOUSE_SHELF" => Some(Location::WarehouseShelf),
            "DRIVER_TRUCK" => Some(Location::DriverTruck),
            "TECH_TRUCK" => Some(Location::TechTruck),
            "N/A" => Some(Location::None),
            _ => None,
        }
    }

    pub fn normalize(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::FALLBACK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Picker,
    Driver,
    Tech,
    System,
}

impl ActorRole {
    pub const FALLBACK: ActorRole = ActorRole::System;

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Picker => "PICKER",
            ActorRole::Driver => "DRIVER",
            ActorRole::Tech => "TECH",
            ActorRole::System => "SYSTEM",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PICKER" => Some(ActorRole::Picker),
            "DRIVER" => Some(ActorRole::Driver),
            "TECH" => Some(ActorRole::Tech),
            "SYSTEM" => Some(ActorRole::System),
            _ => None,
        }
    }

    pub fn normalize(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::FALLBACK)
    }
}

impl fmt::Display for CustodyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_text_falls_back() {
        assert_eq!(CustodyAction::normalize("BOGUS"), CustodyAction::Picked);
        assert_eq!(Location::normalize("ROOF"), Location::None);
        assert_eq!(ActorRole::normalize("ADMIN"), ActorRole::System);
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert_eq!(CustodyAction::parse("loaded"), None);
        assert_eq!(CustodyAction::normalize("loaded"), CustodyAction::Picked);
        assert_eq!(Location::parse("DRIVER_TRUCK"), Some(Location::DriverTruck));
    }

    #[test]
    fn serde_uses_legacy_text() {
        assert_eq!(serde_json::to_string(&Location::None).unwrap(), "\"N/A\"");
        assert_eq!(serde_json::to_string(&CustodyAction::DroppedOff).unwrap(), "\"DROPPED_OFF\"");
        let loc: Location = serde_json::from_str("\"TECH_TRUCK\"").unwrap();
        assert_eq!(loc, Location::TechTruck);
    }
}
