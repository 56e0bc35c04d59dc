//! custody-core: ledger de custodia de partes (estante → camión del driver →
//! camión del técnico).
//!
//! - `model`: eventos, enums con política de respaldo, manifiesto.
//! - `store`: trait `EventStore` + backend en memoria.
//! - `ledger`: ingesta validada (`record_event`) y agregados.
//! - `chain`: validación de cadena y cierre de paradas.
//! - `mirror`: exportación CSV mensual append-only.
//! - `intake`: diff de estado para los flujos de picker y driver.
pub mod chain;
pub mod constants;
pub mod errors;
pub mod intake;
pub mod ledger;
pub mod mirror;
pub mod model;
pub mod store;

pub use chain::{ChainShortfall, ChainStatus, ChainValidator, StopCompletion, StopOutcome};
pub use errors::{CustodyError, MirrorError, StoreError};
pub use ledger::CustodyLedger;
pub use mirror::{AuditMirror, MonthlyCsvMirror, EXPORT_HEADER};
pub use model::{ActorRole, CompletionManifest, CustodyAction, CustodyEvent, LedgerEntry, Location, ManifestEntry, QuantityKey,
                RawCustodyEvent};
pub use store::{EventStore, InMemoryEventStore, LedgerTx};
