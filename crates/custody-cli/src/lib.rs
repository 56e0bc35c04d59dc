//! custody-cli
//!
//! Herramienta de operador sobre el ledger de custodia.
//!
//! ```text
//! custody migrate
//! custody record --file events.json        (objeto o arreglo; `-` = stdin; el lote se valida completo antes de escribir)
//! custody aggregate --work-order 10 --technician 4 --part A1 \
//!                   --action LOADED --from WAREHOUSE_SHELF --to DRIVER_TRUCK
//! custody check --work-order 10 --technician 4 --manifest '[{"part_number":"A1","qty":2}]'
//! custody complete --work-order 10 --technician 4 --manifest '[...]' --actor 7
//! custody history --work-order 10
//! ```
//!
//! Códigos de salida: 0 ok, 4 rechazo, 5 infraestructura.

pub mod error;

use std::fs;
use std::io::{self, Read, Write};

use clap::{Parser, Subcommand};
use serde_json::Value;

use custody_core::intake::UNKNOWN_DEVICE;
use custody_core::model::normalize::normalize_part_number;
use custody_core::{ChainStatus, ChainValidator, CompletionManifest, CustodyAction, CustodyError,
                   CustodyLedger, EventStore, Location, QuantityKey, RawCustodyEvent, StopCompletion};

pub use error::{CliError, CliResult};

#[derive(Parser, Debug)]
#[command(name = "custody")]
#[command(version)]
#[command(about = "Parts chain-of-custody ledger")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Record custody events from a JSON object or array
    Record {
        /// JSON file, or `-` for stdin
        #[arg(long)]
        file: String,
    },
    /// Sum recorded quantities for an exact key
    Aggregate {
        #[arg(long)]
        work_order: i64,
        #[arg(long)]
        technician: i64,
        #[arg(long)]
        part: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Check whether the load/drop-off chain covers a manifest
    Check {
        #[arg(long)]
        work_order: i64,
        #[arg(long)]
        technician: i64,
        /// JSON array of {"part_number", "qty"}
        #[arg(long)]
        manifest: String,
    },
    /// Validate the chain and close the stop
    Complete {
        #[arg(long)]
        work_order: i64,
        #[arg(long)]
        technician: i64,
        #[arg(long)]
        manifest: String,
        #[arg(long)]
        actor: i64,
        #[arg(long, default_value = UNKNOWN_DEVICE)]
        device: String,
        #[arg(long, default_value = "cli")]
        source: String,
    },
    /// Print the events of a work order as JSON lines
    History {
        #[arg(long)]
        work_order: i64,
    },
}

/// Parsea el contenido de `--file`: un objeto o un arreglo de objetos.
pub fn parse_raw_events(text: &str) -> CliResult<Vec<RawCustodyEvent>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => items.into_iter()
                                    .map(|item| serde_json::from_value(item).map_err(CliError::from))
                                    .collect(),
        obj @ Value::Object(_) => Ok(vec![serde_json::from_value(obj)?]),
        _ => Err(CliError::invalid_argument("expected a JSON object or array of objects")),
    }
}

fn read_input(file: &str) -> CliResult<String> {
    if file == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(fs::read_to_string(file)?)
    }
}

fn parse_manifest(text: &str) -> CliResult<CompletionManifest> {
    Ok(serde_json::from_str(text)?)
}

/// Los argumentos de consulta deben usar el texto exacto (sin fallback).
fn exact<T>(value: &str, what: &str, parse: fn(&str) -> Option<T>) -> CliResult<T> {
    parse(value).ok_or_else(|| CliError::invalid_argument(format!("unknown {what}: {value}")))
}

/// Ejecuta un comando de datos contra `ledger` escribiendo el resultado en `out`.
///
/// `migrate` no pasa por aquí (requiere sólo la conexión).
pub fn execute<S: EventStore, W: Write>(command: &Commands, ledger: &CustodyLedger<S>, out: &mut W) -> CliResult<()> {
    match command {
        Commands::Migrate => Err(CliError::invalid_argument("migrate does not operate on a ledger")),
        Commands::Record { file } => {
            let raws = parse_raw_events(&read_input(file)?)?;
            // se valida el lote completo antes de escribir
            let events = raws.iter()
                             .enumerate()
                             .map(|(index, raw)| {
                                 ledger.prepare(raw).map_err(|source| CliError::Batch { index,
                                                                                        recorded: 0,
                                                                                        source })
                             })
                             .collect::<CliResult<Vec<_>>>()?;
            for (index, event) in events.into_iter().enumerate() {
                let uid = ledger.record_prepared(event).map_err(|source| CliError::Batch { index,
                                                                                          recorded: index,
                                                                                          source })?;
                writeln!(out, "{uid}")?;
            }
            Ok(())
        }
        Commands::Aggregate { work_order,
                              technician,
                              part,
                              action,
                              from,
                              to, } => {
            let key = QuantityKey { work_order_id: *work_order,
                                    technician_id: *technician,
                                    part_number: normalize_part_number(part),
                                    action: exact(action, "action", CustodyAction::parse)?,
                                    from_location: exact(from, "location", Location::parse)?,
                                    to_location: exact(to, "location", Location::parse)? };
            writeln!(out, "{}", ledger.aggregate_quantity(&key)?)?;
            Ok(())
        }
        Commands::Check { work_order,
                          technician,
                          manifest, } => {
            let manifest = parse_manifest(manifest)?;
            match ChainValidator::new(ledger).check_chain(*work_order, *technician, &manifest)? {
                ChainStatus::Complete => {
                    writeln!(out, "complete")?;
                    Ok(())
                }
                ChainStatus::Incomplete(shortfall) => Err(CustodyError::IncompleteChain(shortfall).into()),
            }
        }
        Commands::Complete { work_order,
                             technician,
                             manifest,
                             actor,
                             device,
                             source, } => {
            let req = StopCompletion { work_order_id: *work_order,
                                       technician_id: *technician,
                                       manifest: parse_manifest(manifest)?,
                                       actor_user_id: *actor,
                                       device_id: device.clone(),
                                       source: source.clone() };
            let outcome = ChainValidator::new(ledger).complete_stop(&req)?;
            match outcome.marker_uid {
                Some(uid) => writeln!(out, "completed marker={uid}")?,
                None => writeln!(out, "completed marker=none")?,
            }
            Ok(())
        }
        Commands::History { work_order } => {
            for entry in ledger.history(*work_order)? {
                writeln!(out, "{}", serde_json::to_string(&entry)?)?;
            }
            Ok(())
        }
    }
}
