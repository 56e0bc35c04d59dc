//! Errores de la CLI y su código de salida.

use custody_core::CustodyError;
use custody_persistence::PersistenceError;
use thiserror::Error;

/// Rechazo de la operación (entrada inválida, cadena incompleta).
pub const EXIT_REJECTED: i32 = 4;
/// Falla de infraestructura (base de datos, archivos, configuración).
pub const EXIT_INFRA: i32 = 5;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("{0}")]
    Custody(#[from] CustodyError),

    /// Falla dentro de un lote de `record`; `recorded` eventos ya quedaron
    /// persistidos.
    #[error("event #{index} failed ({recorded} recorded before it): {source}")]
    Batch {
        index: usize,
        recorded: usize,
        source: CustodyError,
    },
}

pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        CliError::InvalidArgument { message: message.into() }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument { .. } | CliError::Json(_) => EXIT_REJECTED,
            CliError::Custody(e) | CliError::Batch { source: e, .. } if e.is_user_facing() => EXIT_REJECTED,
            _ => EXIT_INFRA,
        }
    }

    /// Texto para el operador: los errores de almacenamiento se muestran sin
    /// detalle (queda en el log).
    pub fn operator_message(&self) -> String {
        match self {
            CliError::Custody(e) if !e.is_user_facing() => {
                log::error!("custody operation failed: {e}");
                "the ledger could not complete the operation; see logs".to_string()
            }
            CliError::Batch { index,
                              recorded,
                              source, } if !source.is_user_facing() => {
                log::error!("custody batch failed at #{index}: {source}");
                format!("event #{index} could not be stored ({recorded} recorded before it); see logs")
            }
            other => other.to_string(),
        }
    }
}
