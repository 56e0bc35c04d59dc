//! Validación y normalización de la entrada cruda.
//!
//! Orden de chequeos:
//! 1. Campos requeridos: se acumulan todos los faltantes y se reporta un único
//!    `CustodyError::Validation`.
//! 2. Cantidad: debe quedar en `1..=i32::MAX`.
//! 3. Enums: texto desconocido se degrada al valor de respaldo (sin error).
//! 4. Textos: sanitizados y truncados a su límite.
use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

use super::event::{CustodyEvent, RawCustodyEvent};
use super::types::{ActorRole, CustodyAction, Location};
use crate::constants::{DEVICE_ID_MAX_CHARS, PART_NUMBER_MAX_CHARS, SOURCE_MAX_CHARS};
use crate::errors::CustodyError;

/// Limpia texto de entrada: elimina tags `<...>`, caracteres de control y
/// colapsa espacios en blanco.
///
/// Sólo cuenta como tag un `<` seguido de letra, `/` o `!` que tenga su `>`
/// de cierre; cualquier otro `<` se conserva (`"X<1"` sigue siendo `"X<1"`).
pub fn sanitize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    let mut rest = raw;
    while let Some(ch) = rest.chars().next() {
        if ch == '<' {
            if let Some(len) = tag_len(rest) {
                rest = &rest[len..];
                continue;
            }
        }
        rest = &rest[ch.len_utf8()..];
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if ch.is_control() {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }
    out
}

/// Largo en bytes del tag que abre `s` (que empieza con `<`), si lo es.
fn tag_len(s: &str) -> Option<usize> {
    let opens_tag = s[1..].chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!');
    if !opens_tag {
        return None;
    }
    s.find('>').map(|idx| idx + 1)
}

/// Trunca a `max` caracteres (nunca corta un code point).
pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

/// Part number tal como se persiste (limpio y truncado).
pub fn normalize_part_number(raw: &str) -> String {
    truncate_chars(&sanitize_text(raw), PART_NUMBER_MAX_CHARS)
}

fn clean(raw: &Option<String>, max: usize) -> Option<String> {
    raw.as_deref()
       .map(|v| truncate_chars(&sanitize_text(v), max))
       .filter(|v| !v.is_empty())
}

fn present_text(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Valida y normaliza `raw`. `event_uid` y `now` los decide el ledger.
pub fn normalize_event(raw: &RawCustodyEvent, event_uid: Uuid, now: DateTime<Utc>) -> Result<CustodyEvent, CustodyError> {
    let mut missing: Vec<&'static str> = Vec::new();

    let work_order_id = raw.work_order_id.filter(|v| *v > 0);
    if work_order_id.is_none() {
        missing.push("work_order_id");
    }
    let technician_id = raw.technician_id.filter(|v| *v >= 0);
    if technician_id.is_none() {
        missing.push("technician_id");
    }
    let part_number = clean(&raw.part_number, PART_NUMBER_MAX_CHARS);
    if part_number.is_none() {
        missing.push("part_number");
    }
    if raw.quantity.is_none() {
        missing.push("quantity");
    }
    let action = present_text(&raw.action);
    if action.is_none() {
        missing.push("action");
    }
    let from_location = present_text(&raw.from_location);
    if from_location.is_none() {
        missing.push("from_location");
    }
    let to_location = present_text(&raw.to_location);
    if to_location.is_none() {
        missing.push("to_location");
    }
    let actor_role = present_text(&raw.actor_role);
    if actor_role.is_none() {
        missing.push("actor_role");
    }
    let actor_user_id = raw.actor_user_id.filter(|v| *v >= 0);
    if actor_user_id.is_none() {
        missing.push("actor_user_id");
    }
    let device_id = clean(&raw.device_id, DEVICE_ID_MAX_CHARS);
    if device_id.is_none() {
        missing.push("device_id");
    }
    let source = clean(&raw.source, SOURCE_MAX_CHARS);
    if source.is_none() {
        missing.push("source");
    }

    match (work_order_id,
           technician_id,
           part_number,
           raw.quantity,
           action,
           from_location,
           to_location,
           actor_role,
           actor_user_id,
           device_id,
           source)
    {
        (Some(work_order_id),
         Some(technician_id),
         Some(part_number),
         Some(quantity),
         Some(action),
         Some(from_location),
         Some(to_location),
         Some(actor_role),
         Some(actor_user_id),
         Some(device_id),
         Some(source)) => {
            let quantity = normalize_quantity(quantity)?;
            let extra = raw.extra.clone().filter(|m| !m.is_empty());
            Ok(CustodyEvent { event_uid,
                              work_order_id,
                              technician_id,
                              part_number,
                              quantity,
                              action: CustodyAction::normalize(action),
                              from_location: Location::normalize(from_location),
                              to_location: Location::normalize(to_location),
                              actor_role: ActorRole::normalize(actor_role),
                              actor_user_id,
                              device_id,
                              timestamp_utc: raw.timestamp_utc.unwrap_or(now).trunc_subsecs(0),
                              source,
                              extra })
        }
        _ => Err(CustodyError::Validation { missing }),
    }
}

fn normalize_quantity(value: i64) -> Result<i32, CustodyError> {
    if value <= 0 {
        return Err(CustodyError::InvalidQuantity { value });
    }
    i32::try_from(value).map_err(|_| CustodyError::InvalidQuantity { value })
}
