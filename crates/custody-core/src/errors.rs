//! Errores del ledger de custodia.
//!
//! `CustodyError` es la taxonomía visible por los llamadores (ingesta y
//! cierre de paradas). `StoreError` es lo que reporta un backend de
//! `EventStore`; el ledger lo envuelve según la operación (escritura o
//! lectura).

use thiserror::Error;

use crate::chain::ChainShortfall;

/// Fallos reportados por un backend de almacenamiento.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("connection: {0}")]
    Connection(String),
    #[error("backend: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum CustodyError {
    /// Campos requeridos ausentes o vacíos (lista completa, no sólo el primero).
    #[error("missing required fields: {}", missing.join(", "))]
    Validation { missing: Vec<&'static str> },
    #[error("quantity must be greater than 0 (got {value})")]
    InvalidQuantity { value: i64 },
    #[error("failed to insert custody event: {0}")]
    StoreWrite(#[source] StoreError),
    #[error("failed to read custody events: {0}")]
    StoreRead(#[source] StoreError),
    #[error("missing custody events; cannot complete: {0}")]
    IncompleteChain(ChainShortfall),
    #[error("stop completion failed: {0}")]
    Completion(String),
}

impl CustodyError {
    /// `true` para errores cuyo detalle puede mostrarse al operador tal cual
    /// (campos, cantidades). Los errores de almacenamiento se muestran de forma
    /// genérica y el detalle queda en el log.
    pub fn is_user_facing(&self) -> bool {
        matches!(self,
                 CustodyError::Validation { .. } | CustodyError::InvalidQuantity { .. } | CustodyError::IncompleteChain(_))
    }
}

/// Errores del espejo de auditoría (nunca se propagan fuera del ledger).
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("mirror lock poisoned")]
    Poisoned,
}
