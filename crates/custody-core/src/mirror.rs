//! Espejo de auditoría: copia append-only, mensual, de cada evento persistido.
//!
//! No es autoritativo. Si falla, el evento sigue registrado en el store; el
//! ledger sólo deja constancia en el log (ver `CustodyLedger::mirror_best_effort`).
//!
//! Formato (compatible con los reportes existentes):
//! - archivo `custody_events_YYYY_MM.csv` según el mes UTC del evento;
//! - cabecera sólo al crear el archivo;
//! - 14 columnas en el orden de `EXPORT_HEADER`;
//! - `extra` ausente se escribe como `NULL`.
use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::constants::EXPORT_TIMESTAMP_FORMAT;
use crate::errors::MirrorError;
use crate::model::CustodyEvent;

/// Nombres de columna heredados (los reportes los leen por nombre).
pub const EXPORT_HEADER: [&str; 14] = ["event_uuid",
                                       "pick_sheet_id",
                                       "tech_id",
                                       "part_number",
                                       "qty",
                                       "action",
                                       "from_loc",
                                       "to_loc",
                                       "actor_role",
                                       "actor_user_id",
                                       "device_id",
                                       "ts_utc",
                                       "source",
                                       "extra_json"];

const NULL_EXTRA: &str = "NULL";

/// Destino de la copia de auditoría.
pub trait AuditMirror: Send + Sync {
    fn append(&self, event: &CustodyEvent) -> Result<(), MirrorError>;
}

/// Un CSV por mes UTC dentro de `dir`.
pub struct MonthlyCsvMirror {
    dir: PathBuf,
    // serializa appends dentro del proceso (cabecera + filas sin entrelazar)
    lock: Mutex<()>,
}

impl MonthlyCsvMirror {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), lock: Mutex::new(()) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ruta del archivo mensual que corresponde a `ts`.
    pub fn file_for(&self, ts: DateTime<Utc>) -> PathBuf {
        self.dir.join(monthly_file_name(ts))
    }
}

pub fn monthly_file_name(ts: DateTime<Utc>) -> String {
    format!("custody_events_{}.csv", ts.format("%Y_%m"))
}

impl AuditMirror for MonthlyCsvMirror {
    fn append(&self, event: &CustodyEvent) -> Result<(), MirrorError> {
        let _guard = self.lock.lock().map_err(|_| MirrorError::Poisoned)?;
        fs::create_dir_all(&self.dir)?;
        let path = self.file_for(event.timestamp_utc);
        let existed = path.exists();

        let mut chunk = String::new();
        if !existed {
            push_csv_line(&mut chunk, &EXPORT_HEADER);
        }
        push_csv_line(&mut chunk, &export_row(event)?);

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(chunk.as_bytes())?;
        Ok(())
    }
}

/// Valores de una fila de exportación, en el orden de `EXPORT_HEADER`.
pub fn export_row(event: &CustodyEvent) -> Result<[String; 14], MirrorError> {
    let extra = match &event.extra {
        Some(map) => serde_json::to_string(map)?,
        None => NULL_EXTRA.to_string(),
    };
    Ok([event.event_uid.to_string(),
        event.work_order_id.to_string(),
        event.technician_id.to_string(),
        event.part_number.clone(),
        event.quantity.to_string(),
        event.action.as_str().to_string(),
        event.from_location.as_str().to_string(),
        event.to_location.as_str().to_string(),
        event.actor_role.as_str().to_string(),
        event.actor_user_id.to_string(),
        event.device_id.clone(),
        event.timestamp_utc.format(EXPORT_TIMESTAMP_FORMAT).to_string(),
        event.source.clone(),
        extra])
}

/// Agrega una línea CSV (terminada en `\n`) a `out`.
pub fn push_csv_line<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&csv_field(field.as_ref()));
    }
    out.push('\n');
}

/// Entrecomilla igual que `fputcsv`: cuando el campo contiene separador,
/// comillas, barra invertida o espacio en blanco; las comillas internas se
/// duplican.
fn csv_field(field: &str) -> Cow<'_, str> {
    let needs_quotes = field.chars().any(|c| matches!(c, ',' | '"' | '\\' | ' ' | '\t' | '\r' | '\n'));
    if !needs_quotes {
        return Cow::Borrowed(field);
    }
    let mut quoted = String::with_capacity(field.len() + 2);
    quoted.push('"');
    for c in field.chars() {
        if c == '"' {
            quoted.push('"');
        }
        quoted.push(c);
    }
    quoted.push('"');
    Cow::Owned(quoted)
}
