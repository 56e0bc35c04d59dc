//! Constantes del ledger.
//!
//! Los límites de texto coinciden con el ancho de las columnas de la tabla
//! `custody_events`; el sentinel y el formato de fecha los consumen los
//! reportes que leen la exportación mensual.

pub const PART_NUMBER_MAX_CHARS: usize = 64;
pub const DEVICE_ID_MAX_CHARS: usize = 64;
pub const SOURCE_MAX_CHARS: usize = 32;

/// Part number del evento marcador: representa la parada completa, no una parte.
pub const STOP_MARKER_PART: &str = "N/A";

/// Formato de `timestamp_utc` en la exportación (equivalente a un DATETIME SQL).
pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
