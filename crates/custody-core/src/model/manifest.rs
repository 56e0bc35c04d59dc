//! Manifiesto de cierre: qué cantidades de cada parte deben haber recorrido
//! la cadena para un par (orden de trabajo, técnico). No se persiste.
use serde::{Deserialize, Serialize};

use super::normalize::normalize_part_number;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub part_number: String,
    #[serde(alias = "qty")]
    pub required_quantity: i64,
}

impl ManifestEntry {
    pub fn new(part_number: impl Into<String>, required_quantity: i64) -> Self {
        Self { part_number: part_number.into(), required_quantity }
    }

    /// Part number con la misma limpieza que aplica la ingesta, para que la
    /// búsqueda en el ledger use el mismo texto que se persistió.
    pub fn normalized_part(&self) -> String {
        normalize_part_number(&self.part_number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionManifest {
    pub entries: Vec<ManifestEntry>,
}

impl CompletionManifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Agrega una entrada (estilo builder).
    pub fn with(mut self, part_number: impl Into<String>, required_quantity: i64) -> Self {
        self.entries.push(ManifestEntry::new(part_number, required_quantity));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
